//! Editor.js-style JSON documents.
//!
//! ```json
//! { "time": 1700000000000, "version": "2.28.0", "blocks": [
//!     { "id": "t0", "type": "toggle", "data": { "text": "Notes", "status": "closed", "fk": "…", "items": 2 } },
//!     { "id": "p1", "type": "paragraph", "data": { "text": "first" } },
//!     { "id": "i2", "type": "image", "data": { "file": { "url": "…" }, "caption": "" } }
//! ] }
//! ```
//!
//! Block payloads are opaque to the engine. [`Document`] keeps every loaded
//! entry next to the sequence and writes it back as read: original id, type
//! string, unknown data fields, extra block-level keys, and the document's
//! `time`/`version`. Only a block's `text` and a toggle's
//! `{ text, status, fk, items }` are rewritten from the sequence.
//!
//! Members persist nothing beyond their own data. Membership is rebuilt from
//! each root's `items` count when the editor loads the sequence.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::editor::ToggleEditor;
use crate::host::BlockSequence;
use crate::navigator;
use crate::{Block, BlockId, BlockKind, MemorySequence, ToggleData, ToggleError};

/// Errors that can occur reading or writing documents.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toggle error: {0}")]
    Toggle(#[from] ToggleError),
}

// ============================================================================
// Wire format
// ============================================================================

/// One entry of the `blocks` array, as written by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Host block type, kept verbatim (`"paragraph"`, `"image"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    /// Block-level keys the engine does not model (`tunes`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SavedBlock {
    /// The toggle payload, when this entry is a toggle root.
    pub fn toggle_data(&self) -> Result<Option<ToggleData>, DocumentError> {
        if BlockKind::from_str(&self.kind) != Some(BlockKind::Toggle) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(self.data.clone())?))
    }

    /// The entry's `data.text`, or empty.
    pub fn text(&self) -> &str {
        self.data.get("text").and_then(Value::as_str).unwrap_or_default()
    }
}

/// A whole saved document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    pub blocks: Vec<SavedBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SavedDocument {
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_json()? + "\n")?;
        Ok(())
    }

    /// Build the block sequence, remembering each entry for the way back.
    ///
    /// Foreign ids map to stable [`BlockId`]s; a repeated id gets a fresh
    /// one. Types the engine does not know load as [`BlockKind::Other`].
    pub fn into_document(self) -> Result<Document, DocumentError> {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        let mut sources = HashMap::with_capacity(self.blocks.len());

        for saved in self.blocks {
            let mut id = saved.id.as_deref().map(BlockId::from_external).unwrap_or_default();
            if sources.contains_key(&id) {
                tracing::warn!(id = ?saved.id, "duplicate block id, assigning a fresh one");
                id = BlockId::new();
            }

            let mut block = match saved.toggle_data()? {
                Some(data) => Block::toggle_root(data.fk, data.text, data.status).with_items(data.items),
                None => Block::new(
                    BlockKind::from_str(&saved.kind).unwrap_or(BlockKind::Other),
                    saved.text(),
                ),
            };
            block.id = id;
            blocks.push(block);
            sources.insert(id, saved);
        }

        Ok(Document {
            sequence: MemorySequence::from_blocks(blocks),
            time: self.time,
            version: self.version,
            sources,
        })
    }
}

// ============================================================================
// Document
// ============================================================================

/// A loaded document: the sequence the editor works on, plus everything
/// about each block the sequence does not model.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub sequence: MemorySequence,
    time: Option<u64>,
    version: Option<String>,
    sources: HashMap<BlockId, SavedBlock>,
}

impl Document {
    /// A document with no saved origin.
    pub fn new(sequence: MemorySequence) -> Self {
        Self {
            sequence,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        SavedDocument::from_json(text)?.into_document()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        SavedDocument::load(path)?.into_document()
    }

    /// The loaded entry behind block `id`.
    pub fn source(&self, id: BlockId) -> Option<&SavedBlock> {
        self.sources.get(&id)
    }

    /// Serialize the current sequence.
    ///
    /// Roots the editor knows are saved through their instance; any other
    /// root is saved from its own state with a fresh member count.
    pub fn to_saved(&self, editor: &ToggleEditor) -> Result<SavedDocument, DocumentError> {
        let seq = &self.sequence;
        let mut blocks = Vec::with_capacity(seq.block_count());

        for position in 0..seq.block_count() {
            let block = navigator::block(seq, position)?;
            let source = self.sources.get(&block.id);

            let (kind, data) = match &block.toggle {
                Some(state) => {
                    let toggle = match editor.instance(&state.root_id) {
                        Some(instance) => instance.save(seq)?,
                        None => ToggleData {
                            text: block.content.clone(),
                            status: state.status,
                            fk: state.root_id.clone(),
                            items: navigator::direct_members(seq, &state.root_id).len(),
                        },
                    };
                    let mut data = source
                        .and_then(|s| s.data.as_object().cloned())
                        .unwrap_or_default();
                    if let Value::Object(fields) = serde_json::to_value(toggle)? {
                        data.extend(fields);
                    }
                    (BlockKind::Toggle.as_str().to_string(), Value::Object(data))
                }
                None => {
                    let kind = source.map_or_else(|| block.kind.as_str().to_string(), |s| s.kind.clone());
                    (kind, text_payload(source.map(|s| &s.data), &block.content))
                }
            };

            blocks.push(SavedBlock {
                id: source.map_or_else(|| Some(block.id.to_string()), |s| s.id.clone()),
                kind,
                data,
                extra: source.map(|s| s.extra.clone()).unwrap_or_default(),
            });
        }

        Ok(SavedDocument {
            time: self.time,
            blocks,
            version: self.version.clone(),
        })
    }

    pub fn write(&self, path: impl AsRef<Path>, editor: &ToggleEditor) -> Result<(), DocumentError> {
        self.to_saved(editor)?.write(path)
    }
}

/// A non-toggle payload with `text` set to the block's content. Other
/// fields pass through, and no `text` key is invented for empty content.
fn text_payload(original: Option<&Value>, content: &str) -> Value {
    let mut data = original.cloned().unwrap_or_else(|| Value::Object(Map::new()));
    if data.is_null() && !content.is_empty() {
        data = Value::Object(Map::new());
    }
    if let Value::Object(map) = &mut data
        && (map.contains_key("text") || !content.is_empty())
    {
        map.insert("text".to_string(), Value::String(content.to_string()));
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RootId, ToggleStatus};

    const DOC: &str = r#"{
        "time": 1700000000000,
        "blocks": [
            { "id": "t0", "type": "toggle", "data": { "text": "Notes", "status": "closed", "fk": "r-1", "items": 2 } },
            { "id": "oUq2g_tl8y", "type": "paragraph", "data": { "text": "first" }, "tunes": { "align": "left" } },
            { "id": "h", "type": "header", "data": { "text": "Title", "level": 2 } },
            { "id": "l", "type": "list", "data": { "style": "ordered", "items": ["one", "two"] } },
            { "id": "img", "type": "image", "data": { "file": { "url": "https://example.com/a.png" }, "caption": "" } },
            { "id": "d", "type": "delimiter", "data": {} }
        ],
        "version": "2.28.0"
    }"#;

    fn loaded() -> (Document, ToggleEditor) {
        let mut doc = Document::from_json(DOC).unwrap();
        let mut editor = ToggleEditor::default();
        editor.load(&mut doc.sequence).unwrap();
        (doc, editor)
    }

    #[test]
    fn test_parse_editor_document() {
        let (doc, _) = loaded();
        let blocks = doc.sequence.blocks();

        assert_eq!(blocks[0].root_id(), Some(&RootId::parse("r-1").unwrap()));
        assert_eq!(blocks[0].toggle_status(), Some(ToggleStatus::Closed));
        assert_eq!(blocks[2].kind, BlockKind::Header);
        assert_eq!(blocks[2].content, "Title");
        assert_eq!(blocks[4].kind, BlockKind::Other);
        assert!(blocks[1].is_member_of(&RootId::parse("r-1").unwrap()));
        assert!(blocks[1].hidden && blocks[2].hidden && !blocks[3].hidden);
        assert_eq!(doc.source(blocks[3].id).unwrap().kind, "list");
    }

    #[test]
    fn test_unchanged_document_saves_identically() {
        let (doc, editor) = loaded();
        let saved = doc.to_saved(&editor).unwrap();
        assert_eq!(saved, SavedDocument::from_json(DOC).unwrap());
    }

    #[test]
    fn test_edits_keep_foreign_fields() {
        let (mut doc, mut editor) = loaded();
        doc.sequence.block_at_mut(2).unwrap().content = "Renamed".into();
        editor.apply(&mut doc.sequence, crate::Action::Toggle(RootId::parse("r-1").unwrap()));

        let saved = doc.to_saved(&editor).unwrap();
        assert_eq!(saved.blocks[0].data["status"], "open");
        assert_eq!(saved.blocks[2].data["text"], "Renamed");
        assert_eq!(saved.blocks[2].data["level"], 2);
        assert_eq!(saved.blocks[2].id.as_deref(), Some("h"));
        assert_eq!(saved.blocks[1].extra["tunes"]["align"], "left");
        assert!(saved.blocks[3].data.get("text").is_none());
        assert_eq!(saved.time, Some(1_700_000_000_000));
        assert_eq!(saved.version.as_deref(), Some("2.28.0"));
    }

    #[test]
    fn test_block_ids_are_stable_across_loads() {
        let a = Document::from_json(DOC).unwrap();
        let b = Document::from_json(DOC).unwrap();
        assert_eq!(a.sequence.ids(), b.sequence.ids());
        assert_eq!(a.sequence.ids()[1], BlockId::from_external("oUq2g_tl8y"));
    }

    #[test]
    fn test_session_blocks_get_defaults() {
        let (mut doc, mut editor) = loaded();
        doc.sequence.set_caret(5);
        let root = editor.create_toggle(&mut doc.sequence, "Later").unwrap();
        doc.sequence.insert_new(BlockKind::Paragraph, "tail", 7);

        let saved = doc.to_saved(&editor).unwrap();
        assert_eq!(saved.blocks[6].kind, "toggle");
        assert_eq!(saved.blocks[6].data["fk"], root.as_str());
        assert_eq!(saved.blocks[6].data["items"], 0);
        assert_eq!(saved.blocks[7].kind, "paragraph");
        assert_eq!(saved.blocks[7].data["text"], "tail");
        assert!(BlockId::parse(saved.blocks[7].id.as_deref().unwrap()).is_ok());
    }

    #[test]
    fn test_duplicate_ids_get_fresh_blocks() {
        let doc = Document::from_json(
            r#"{"blocks": [{"id": "x", "type": "paragraph", "data": {"text": "a"}},
                           {"id": "x", "type": "paragraph", "data": {"text": "b"}}]}"#,
        )
        .unwrap();
        let ids = doc.sequence.ids();
        assert_ne!(ids[0], ids[1]);
        assert_eq!(doc.source(ids[1]).unwrap().id.as_deref(), Some("x"));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");

        let (doc, editor) = loaded();
        doc.write(&path, &editor).unwrap();

        let reloaded = Document::load(&path).unwrap();
        assert_eq!(reloaded.sequence.ids(), doc.sequence.ids());
        assert_eq!(reloaded.sequence.contents(), doc.sequence.contents());
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(SavedDocument::from_json("{"), Err(DocumentError::Json(_))));
        assert!(matches!(
            Document::from_json(r#"{"blocks": [{"type": "toggle", "data": {"text": "no fk"}}]}"#),
            Err(DocumentError::Json(_))
        ));
        assert!(matches!(Document::load("/nonexistent/doc.json"), Err(DocumentError::Io(_))));
    }
}
