//! Error types for toggle engine operations.

use thiserror::Error;

use crate::RootId;

/// Errors that can occur while querying or restructuring the forest.
///
/// None of these reach the host as failures: [`crate::ToggleEditor::apply`]
/// turns them into a skipped [`crate::Outcome`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToggleError {
    /// Position beyond the current sequence bounds.
    #[error("position {position} out of range for sequence of length {len}")]
    PositionOutOfRange { position: usize, len: usize },

    /// Attempted to place a toggle inside its own subtree.
    #[error("cannot move toggle {0:?} into its own subtree")]
    CyclicDrop(RootId),

    /// A block is tagged with a root that no longer exists.
    #[error("block at {position} is tagged with missing root {link:?}")]
    OrphanedTag { position: usize, link: RootId },

    /// A member sits outside its root's contiguous range.
    #[error("block at {position} is tagged with {link:?} but lies outside its range")]
    Discontiguous { position: usize, link: RootId },

    /// Declared member count disagrees with the tagged count.
    #[error("toggle {root:?} declares {declared} items but has {actual}")]
    DivergentItemCount {
        root: RootId,
        declared: usize,
        actual: usize,
    },

    /// No root block with this ID is present in the sequence.
    #[error("toggle root not found: {0:?}")]
    RootNotFound(RootId),

    /// Operation requires a toggle root.
    #[error("block at {0} is not a toggle root")]
    NotAToggle(usize),

    /// Operation requires a tagged member.
    #[error("block at {0} is not a toggle member")]
    NotAMember(usize),
}
