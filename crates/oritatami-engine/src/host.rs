//! The host boundary: a flat, mutable sequence of blocks.
//!
//! The engine never owns blocks. It reads and rewrites them through
//! [`BlockSequence`], and learns about mutations it did not cause through
//! [`SequenceEvent`] notifications the host forwards to
//! [`crate::ToggleEditor::on_host_event`].

use serde::{Deserialize, Serialize};

use crate::{Block, BlockId, BlockKind, RootId};

/// Primitives the engine consumes from the editing host.
///
/// `move_block(from, to)` removes the block at `from` and reinserts it so that
/// it ends up at index `to` of the resulting sequence. Each primitive is one
/// atomic reposition; the host offers no transactions.
pub trait BlockSequence {
    /// Block at `position`, or `None` past the end.
    fn block_at(&self, position: usize) -> Option<&Block>;

    /// Mutable access for writing tags, status, and visibility flags.
    fn block_at_mut(&mut self, position: usize) -> Option<&mut Block>;

    fn block_count(&self) -> usize;

    /// Position of the block holding the caret.
    fn current_position(&self) -> usize;

    /// Insert a block so that it ends up at `position` (clamped to the end).
    fn insert_block(&mut self, block: Block, position: usize);

    /// Remove and return the block at `position`.
    fn delete_block_at(&mut self, position: usize) -> Option<Block>;

    fn move_block(&mut self, from: usize, to: usize);

    fn set_caret(&mut self, position: usize);

    fn close_toolbar(&mut self) {}

    /// Insert a fresh block of `kind` with `content`.
    fn insert_new(&mut self, kind: BlockKind, content: &str, position: usize) -> BlockId {
        let block = Block::new(kind, content);
        let id = block.id;
        self.insert_block(block, position);
        id
    }

    /// Current position of the block with identity `id`.
    fn position_of(&self, id: BlockId) -> Option<usize> {
        (0..self.block_count()).find(|&pos| self.block_at(pos).is_some_and(|b| b.id == id))
    }

    /// Current position of the toggle root `root`.
    fn root_position(&self, root: &RootId) -> Option<usize> {
        (0..self.block_count())
            .find(|&pos| self.block_at(pos).is_some_and(|b| b.root_id() == Some(root)))
    }
}

/// A mutation reported by the host.
///
/// Positions are valid at the moment the event is raised; handlers re-read
/// the sequence rather than trusting them after any further mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SequenceEvent {
    /// A block now sits at `position`.
    Inserted { position: usize },
    /// `block` was removed from `position`.
    Removed { position: usize, block: Block },
    /// A block was moved from `from` to `to`.
    Moved { from: usize, to: usize },
}

impl SequenceEvent {
    /// The position the event concerns (the destination for moves).
    pub fn position(&self) -> usize {
        match self {
            SequenceEvent::Inserted { position } | SequenceEvent::Removed { position, .. } => {
                *position
            }
            SequenceEvent::Moved { to, .. } => *to,
        }
    }
}
