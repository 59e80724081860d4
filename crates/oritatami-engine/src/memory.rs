//! In-memory host: a `Vec<Block>` behind [`BlockSequence`].
//!
//! Used by tests and the CLI. Every primitive mutation is appended to an
//! event log so callers can inspect exactly which repositionings the engine
//! performed, and forward genuinely external edits back to the editor.

use crate::host::{BlockSequence, SequenceEvent};
use crate::{Block, BlockId};

/// Flat block sequence backed by a vector.
#[derive(Clone, Debug, Default)]
pub struct MemorySequence {
    blocks: Vec<Block>,
    caret: usize,
    toolbar_open: bool,
    events: Vec<SequenceEvent>,
}

impl MemorySequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            ..Self::default()
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Block identities in sequence order.
    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.id).collect()
    }

    /// Block contents in sequence order.
    pub fn contents(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.content.as_str()).collect()
    }

    pub fn toolbar_open(&self) -> bool {
        self.toolbar_open
    }

    pub fn open_toolbar(&mut self) {
        self.toolbar_open = true;
    }

    /// Recorded mutations since the last drain.
    pub fn events(&self) -> &[SequenceEvent] {
        &self.events
    }

    /// Drain the mutation log.
    pub fn take_events(&mut self) -> Vec<SequenceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl BlockSequence for MemorySequence {
    fn block_at(&self, position: usize) -> Option<&Block> {
        self.blocks.get(position)
    }

    fn block_at_mut(&mut self, position: usize) -> Option<&mut Block> {
        self.blocks.get_mut(position)
    }

    fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn current_position(&self) -> usize {
        self.caret
    }

    fn insert_block(&mut self, block: Block, position: usize) {
        let position = position.min(self.blocks.len());
        if !self.blocks.is_empty() && position <= self.caret {
            self.caret += 1;
        }
        self.blocks.insert(position, block);
        self.events.push(SequenceEvent::Inserted { position });
    }

    fn delete_block_at(&mut self, position: usize) -> Option<Block> {
        if position >= self.blocks.len() {
            return None;
        }
        let block = self.blocks.remove(position);
        self.events.push(SequenceEvent::Removed {
            position,
            block: block.clone(),
        });
        if position < self.caret {
            self.caret -= 1;
        }
        if self.caret >= self.blocks.len() {
            self.caret = self.blocks.len().saturating_sub(1);
        }
        Some(block)
    }

    fn move_block(&mut self, from: usize, to: usize) {
        if from >= self.blocks.len() {
            tracing::warn!("move_block from {from} past end ({})", self.blocks.len());
            return;
        }
        let to = to.min(self.blocks.len() - 1);
        if from == to {
            return;
        }
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        self.events.push(SequenceEvent::Moved { from, to });

        // the caret follows its block
        if self.caret == from {
            self.caret = to;
        } else if from < self.caret && self.caret <= to {
            self.caret -= 1;
        } else if to <= self.caret && self.caret < from {
            self.caret += 1;
        }
    }

    fn set_caret(&mut self, position: usize) {
        self.caret = position.min(self.blocks.len().saturating_sub(1));
    }

    fn close_toolbar(&mut self) {
        self.toolbar_open = false;
    }
}
