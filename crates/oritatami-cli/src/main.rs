//! oritatami command-line driver.
//!
//! Loads an Editor.js-style JSON document, applies one toggle operation, and
//! prints the resulting outline.
//!
//! ## Usage
//!
//! ```bash
//! oritatami notes.json show --all
//! oritatami notes.json toggle 0192f3a1
//! oritatami notes.json --write move-down 0192f3a1
//! oritatami notes.json --write drop 4 1
//! RUST_LOG=oritatami_engine=debug oritatami notes.json nest 3
//! ```

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use oritatami_engine::{
    Action, BlockSequence, Document, EngineConfig, MemorySequence, Outcome, RootId, SettingsAction,
    ToggleEditor, navigator,
};

/// Collapsible toggle containers for flat block documents.
#[derive(Parser, Debug)]
#[command(name = "oritatami")]
#[command(about = "Inspect and restructure toggle blocks in a JSON document")]
struct Args {
    /// Document to operate on
    document: PathBuf,

    /// Engine configuration (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the result back to the document
    #[arg(short, long)]
    write: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the outline
    Show {
        /// Include blocks hidden by closed toggles
        #[arg(short, long)]
        all: bool,
    },
    /// Flip a toggle open/closed
    Toggle { root: String },
    /// Move a toggle above its previous sibling
    MoveUp { root: String },
    /// Move a toggle below its next sibling
    MoveDown { root: String },
    /// Delete a toggle with everything inside it
    Delete { root: String },
    /// Drag the block (or toggle) at FROM to just before TARGET
    Drop { from: usize, target: usize },
    /// Indent a block into the toggle above it
    Nest { position: usize },
    /// Move a block out of its toggle
    Extract { position: usize },
    /// Insert a new toggle after POSITION
    Create {
        title: String,
        #[arg(long)]
        after: Option<usize>,
    },
    /// List the settings menu entries of a toggle
    Settings { root: String },
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    print!("{}", run(&args)?);
    Ok(())
}

fn run(args: &Args) -> Result<String> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let mut document = Document::load(&args.document)
        .with_context(|| format!("reading {}", args.document.display()))?;
    let seq = &mut document.sequence;
    let mut editor = ToggleEditor::new(config);
    editor.load(seq).context("loading toggles")?;
    seq.take_events();

    let mut all = false;
    let action = match &args.command {
        Command::Show { all: show_all } => {
            all = *show_all;
            None
        }
        Command::Toggle { root } => Some(Action::Toggle(resolve_root(&editor, root)?)),
        Command::MoveUp { root } => Some(Action::MoveUp(resolve_root(&editor, root)?)),
        Command::MoveDown { root } => Some(Action::MoveDown(resolve_root(&editor, root)?)),
        Command::Delete { root } => Some(Action::DeleteWhole(resolve_root(&editor, root)?)),
        Command::Drop { from, target } => Some(Action::Drop {
            from: *from,
            target: *target,
        }),
        Command::Nest { position } => Some(Action::Nest(*position)),
        Command::Extract { position } => Some(Action::Extract(*position)),
        Command::Create { title, after } => {
            if let Some(after) = after {
                seq.set_caret(*after);
            } else {
                seq.set_caret(seq.block_count().saturating_sub(1));
            }
            let root = editor.create_toggle(seq, title)?;
            tracing::info!("created toggle {}", root.short());
            None
        }
        Command::Settings { root } => {
            let root = resolve_root(&editor, root)?;
            let mut out = String::new();
            for entry in SettingsAction::ALL {
                writeln!(out, "{:<14} {}", entry.as_str(), entry.label())?;
            }
            tracing::debug!("settings for {}", root.short());
            return Ok(out);
        }
    };

    if let Some(action) = action {
        match editor.apply(seq, action) {
            Outcome::Applied => {}
            Outcome::Unchanged => tracing::info!("nothing to do"),
            Outcome::Rejected(e) => bail!("operation rejected: {e}"),
        }
    }

    if args.write {
        document
            .write(&args.document, &editor)
            .with_context(|| format!("writing {}", args.document.display()))?;
        tracing::info!("wrote {}", args.document.display());
    }

    outline(&document.sequence, &editor, all)
}

/// Match a root ID exactly, or by unique prefix.
fn resolve_root(editor: &ToggleEditor, query: &str) -> Result<RootId> {
    let matches: Vec<&RootId> = editor
        .instances()
        .map(|i| i.root_id())
        .filter(|id| id.as_str().starts_with(query))
        .collect();

    if let Some(exact) = matches.iter().find(|id| id.as_str() == query) {
        return Ok((*exact).clone());
    }
    match matches.as_slice() {
        [only] => Ok((*only).clone()),
        [] => bail!("no toggle matches '{query}'"),
        _ => bail!("'{query}' is ambiguous ({} toggles match)", matches.len()),
    }
}

/// Indented rendering of the sequence, one block per line.
fn outline(seq: &MemorySequence, editor: &ToggleEditor, all: bool) -> Result<String> {
    let mut out = String::new();
    for (position, block) in seq.blocks().iter().enumerate() {
        if block.hidden && !all {
            continue;
        }
        let depth = navigator::ancestors(seq, position)?.len();
        let indent = "  ".repeat(depth);
        let marker = if block.hidden { "·" } else { " " };

        match &block.toggle {
            Some(state) => writeln!(
                out,
                "{position:>3}{marker}{indent}{} {} [{}]",
                editor.config().icon(state.status),
                block.content,
                state.root_id.short(),
            )?,
            None => writeln!(out, "{position:>3}{marker}{indent}{}", block.content)?,
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"blocks": [
        {"type": "paragraph", "data": {"text": "intro"}},
        {"type": "toggle", "data": {"text": "Notes", "status": "closed", "fk": "notes-1", "items": 2}},
        {"type": "paragraph", "data": {"text": "first"}},
        {"type": "paragraph", "data": {"text": "second"}},
        {"type": "paragraph", "data": {"text": "outro"}}
    ]}"#;

    fn doc_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, DOC).unwrap();
        (dir, path)
    }

    fn args(path: &PathBuf, write: bool, command: Command) -> Args {
        Args {
            document: path.clone(),
            config: None,
            write,
            command,
        }
    }

    #[test]
    fn test_show_hides_closed_members() {
        let (_dir, path) = doc_file();
        let out = run(&args(&path, false, Command::Show { all: false })).unwrap();
        assert!(out.contains("Notes"));
        assert!(!out.contains("first"));

        let out = run(&args(&path, false, Command::Show { all: true })).unwrap();
        assert!(out.contains("  2·  first"));
    }

    #[test]
    fn test_toggle_by_prefix_and_write() {
        let (_dir, path) = doc_file();
        let toggle = Command::Toggle {
            root: "notes".into(),
        };
        let out = run(&args(&path, true, toggle)).unwrap();
        assert!(out.contains("first"));

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains(r#""status": "open""#));
    }

    #[test]
    fn test_rejected_operation_is_an_error() {
        let (_dir, path) = doc_file();
        let cyclic = Command::Drop { from: 1, target: 3 };
        assert!(run(&args(&path, true, cyclic)).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DOC);

        let unknown = Command::Delete { root: "zzz".into() };
        assert!(run(&args(&path, false, unknown)).is_err());
    }

    #[test]
    fn test_extract_writes_items() {
        let (_dir, path) = doc_file();
        run(&args(&path, true, Command::Extract { position: 2 })).unwrap();

        let saved = oritatami_engine::SavedDocument::load(&path).unwrap();
        assert_eq!(saved.blocks[1].data["items"], 1);
        assert_eq!(saved.blocks[3].data["text"], "first");
    }

    #[test]
    fn test_write_keeps_foreign_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(
            &path,
            r#"{"time": 1700000000000, "version": "2.28.0", "blocks": [
                {"id": "h", "type": "header", "data": {"text": "Title", "level": 3}},
                {"id": "t", "type": "toggle", "data": {"text": "Notes", "status": "open", "fk": "notes-1", "items": 1}},
                {"id": "oUq2g_tl8y", "type": "image", "data": {"file": {"url": "a.png"}, "caption": "cap"}}
            ]}"#,
        )
        .unwrap();

        let toggle = Command::Toggle {
            root: "notes".into(),
        };
        let out = run(&args(&path, true, toggle)).unwrap();
        assert!(out.contains("Title"));

        let saved = oritatami_engine::SavedDocument::load(&path).unwrap();
        assert_eq!(saved.time, Some(1_700_000_000_000));
        assert_eq!(saved.version.as_deref(), Some("2.28.0"));
        assert_eq!(saved.blocks[0].data["level"], 3);
        assert_eq!(saved.blocks[1].data["status"], "closed");
        assert_eq!(saved.blocks[2].id.as_deref(), Some("oUq2g_tl8y"));
        assert_eq!(saved.blocks[2].kind, "image");
        assert_eq!(saved.blocks[2].data["file"]["url"], "a.png");
    }
}
