//! Block model: kinds, toggle state, membership tags.
//!
//! A host document is a flat sequence of [`Block`]s. Hierarchy is synthesized
//! on top of it: a toggle root carries a [`ToggleState`] (its `RootId` and
//! open/closed status), and every member carries a [`MembershipTag`] whose
//! `parent_link` names the root it belongs to. A block carries at most one tag.
//!
//! ## Design: tags are the durable truth
//!
//! Positions are never stored on a block. They shift on every insert, delete,
//! and move, so all hierarchy queries resolve positions on demand from the
//! tags.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{BlockId, RootId};

/// What a block *is* (content type).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum BlockKind {
    /// Plain paragraph text.
    #[default]
    #[strum(serialize = "paragraph", serialize = "text")]
    Paragraph,
    /// Section heading.
    Header,
    /// List item.
    List,
    /// Block quote.
    Quote,
    /// Code listing.
    Code,
    /// Collapsible container root.
    Toggle,
    /// A host block type the engine does not model (image, table, ...).
    Other,
}

impl BlockKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Header => "header",
            BlockKind::List => "list",
            BlockKind::Quote => "quote",
            BlockKind::Code => "code",
            BlockKind::Toggle => "toggle",
            BlockKind::Other => "other",
        }
    }

    pub fn is_toggle(&self) -> bool {
        matches!(self, BlockKind::Toggle)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Open/closed state of a toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ToggleStatus {
    /// Members are visible (subject to ancestors).
    #[default]
    Open,
    /// Members are hidden.
    Closed,
}

impl ToggleStatus {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleStatus::Open => "open",
            ToggleStatus::Closed => "closed",
        }
    }

    /// The opposite status.
    pub fn flipped(self) -> Self {
        match self {
            ToggleStatus::Open => ToggleStatus::Closed,
            ToggleStatus::Closed => ToggleStatus::Open,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ToggleStatus::Closed)
    }
}

impl std::fmt::Display for ToggleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Marks a block as a member of a toggle.
///
/// The membership marker is implied by the tag's presence.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipTag {
    pub parent_link: RootId,
}

impl MembershipTag {
    pub fn new(parent_link: RootId) -> Self {
        Self { parent_link }
    }
}

/// Toggle state carried by a root block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleState {
    pub root_id: RootId,
    pub status: ToggleStatus,
    /// Declared number of direct members.
    #[serde(default)]
    pub items: usize,
}

/// Persisted layout of a toggle root: `{ text, status, fk, items }`.
///
/// `items` is the number of direct members at save time; membership itself
/// is not stored and is reconstructed positionally on load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleData {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub status: ToggleStatus,
    pub fk: RootId,
    #[serde(default)]
    pub items: usize,
}

impl ToggleData {
    /// Fresh toggle data with a newly generated root ID.
    pub fn new(text: impl Into<String>, status: ToggleStatus) -> Self {
        Self {
            text: text.into(),
            status,
            fk: RootId::new(),
            items: 0,
        }
    }
}

/// A block as the host stores it, plus the attributes the toggle engine
/// writes onto it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Stable identity.
    pub id: BlockId,
    /// Content type.
    pub kind: BlockKind,
    /// Primary text content (a toggle's title for roots).
    pub content: String,
    /// Present iff this block is a toggle root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle: Option<ToggleState>,
    /// Present iff this block belongs to a toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<MembershipTag>,
    /// Hidden by a closed toggle ancestor.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    /// Part of the currently selected toggle's subtree.
    #[serde(default, skip_serializing_if = "is_false")]
    pub highlighted: bool,
}

/// Helper for `#[serde(skip_serializing_if)]` on bool fields.
fn is_false(v: &bool) -> bool {
    !v
}

impl Block {
    /// Create a plain block of the given kind.
    pub fn new(kind: BlockKind, content: impl Into<String>) -> Self {
        Self {
            id: BlockId::new(),
            kind,
            content: content.into(),
            toggle: None,
            tag: None,
            hidden: false,
            highlighted: false,
        }
    }

    /// Create a paragraph block.
    pub fn paragraph(content: impl Into<String>) -> Self {
        Self::new(BlockKind::Paragraph, content)
    }

    /// Create a toggle root block.
    pub fn toggle_root(root_id: RootId, content: impl Into<String>, status: ToggleStatus) -> Self {
        Self {
            toggle: Some(ToggleState {
                root_id,
                status,
                items: 0,
            }),
            ..Self::new(BlockKind::Toggle, content)
        }
    }

    /// Builder: set the declared member count of a toggle root.
    pub fn with_items(mut self, items: usize) -> Self {
        if let Some(state) = self.toggle.as_mut() {
            state.items = items;
        }
        self
    }

    /// Builder: attach a membership tag.
    pub fn tagged(mut self, parent_link: &RootId) -> Self {
        self.tag = Some(MembershipTag::new(parent_link.clone()));
        self
    }

    /// The root ID if this block is a toggle root.
    pub fn root_id(&self) -> Option<&RootId> {
        self.toggle.as_ref().map(|t| &t.root_id)
    }

    /// The stored status if this block is a toggle root.
    pub fn toggle_status(&self) -> Option<ToggleStatus> {
        self.toggle.as_ref().map(|t| t.status)
    }

    /// The root this block is a member of.
    pub fn parent_link(&self) -> Option<&RootId> {
        self.tag.as_ref().map(|t| &t.parent_link)
    }

    pub fn is_toggle_root(&self) -> bool {
        self.toggle.is_some()
    }

    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }

    /// Check if this block is tagged as a member of `root`.
    pub fn is_member_of(&self, root: &RootId) -> bool {
        self.parent_link() == Some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_flip() {
        assert_eq!(ToggleStatus::from_str("CLOSED"), Some(ToggleStatus::Closed));
        assert_eq!(ToggleStatus::from_str("ajar"), None);
        assert_eq!(ToggleStatus::Open.flipped(), ToggleStatus::Closed);
        assert!(ToggleStatus::Open.flipped().flipped() == ToggleStatus::Open);
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(BlockKind::from_str("text"), Some(BlockKind::Paragraph));
        assert_eq!(BlockKind::from_str("Toggle"), Some(BlockKind::Toggle));
        assert!(BlockKind::Toggle.is_toggle());
        assert_eq!(BlockKind::from_str("image"), None);
        assert_eq!(BlockKind::Other.as_str(), "other");
    }

    #[test]
    fn test_toggle_root_and_member() {
        let root = RootId::parse("r1").unwrap();
        let head = Block::toggle_root(root.clone(), "Title", ToggleStatus::Closed);
        let member = Block::paragraph("body").tagged(&root);

        assert!(head.is_toggle_root());
        assert_eq!(head.root_id(), Some(&root));
        assert_eq!(head.toggle_status(), Some(ToggleStatus::Closed));
        assert!(!head.is_tagged());

        assert!(member.is_member_of(&root));
        assert_eq!(member.parent_link(), Some(&root));
        assert!(member.root_id().is_none());
    }

    #[test]
    fn test_toggle_data_legacy_defaults() {
        let data: ToggleData = serde_json::from_str(r#"{"fk": "abc"}"#).unwrap();
        assert_eq!(data.status, ToggleStatus::Open);
        assert_eq!(data.items, 0);
        assert_eq!(data.text, "");

        let json = serde_json::to_value(ToggleData {
            text: "t".into(),
            status: ToggleStatus::Closed,
            fk: RootId::parse("abc").unwrap(),
            items: 2,
        })
        .unwrap();
        assert_eq!(json["status"], "closed");
        assert_eq!(json["fk"], "abc");
        assert_eq!(json["items"], 2);
    }
}
