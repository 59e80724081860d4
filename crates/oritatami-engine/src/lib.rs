//! Collapsible toggle containers over a flat block sequence.
//!
//! The host editor knows only a flat list of blocks. This crate layers a
//! forest of toggles on top of it: a toggle root carries a root ID, each
//! member carries a tag naming its root, and every structural operation keeps
//! each toggle's subtree contiguous right after its root.
//!
//! # Layers
//!
//! - **host**: the [`BlockSequence`] trait the engine drives, and
//!   [`SequenceEvent`] notifications for mutations the host made itself
//! - **tagger**: [`MembershipTagger`], the only writer of membership tags
//! - **navigator**: position queries derived from tags (descendant counts,
//!   ancestors, sibling resolution, forest verification)
//! - **ordering**: subtree moves, drag and drop, nesting, whole deletion
//! - **visibility**: open/closed propagation through nested toggles
//! - **editor**: [`ToggleEditor`], the host-facing registry
//!
//! # Forest Invariant
//!
//! For a root at position `p` with `n` descendants, positions `p+1..=p+n` are
//! exactly its subtree. It holds after every [`ToggleEditor::apply`]; a
//! violation found afterwards is logged and healed.

pub mod config;
pub mod document;
pub mod editor;
mod error;
pub mod host;
mod memory;
pub mod navigator;
pub mod ordering;
pub mod tagger;
pub mod toggle;
pub mod visibility;

pub use config::{ConfigError, EngineConfig};
pub use document::{Document, DocumentError, SavedBlock, SavedDocument};
pub use editor::{Action, Outcome, ToggleEditor};
pub use error::ToggleError;
pub use host::{BlockSequence, SequenceEvent};
pub use memory::MemorySequence;
pub use ordering::{Direction, DropOutcome};
pub use tagger::MembershipTagger;
pub use toggle::{SettingsAction, ToggleInstance, ToggleView};

pub use oritatami_types::{
    Block, BlockId, BlockKind, MembershipTag, RootId, ToggleData, ToggleState, ToggleStatus,
};

/// Result type for toggle operations.
pub type Result<T> = std::result::Result<T, ToggleError>;

/// Circuit breaker for recursion over nested toggles.
///
/// Well-formed documents never come close; a corrupted document with a tag
/// cycle would otherwise recurse without bound.
pub const MAX_NESTING_DEPTH: usize = 512;
