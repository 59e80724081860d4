//! Membership tagging: the single writer of parent links.
//!
//! Tags live on the blocks themselves; the tagger additionally keeps an
//! ordered per-root list of member identities so "is this a known member"
//! is answered without scanning the sequence. The list is an index, not a
//! source of truth: [`MembershipTagger::rebuild`] recreates it from tags.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::host::BlockSequence;
use crate::navigator;
use crate::{BlockId, MembershipTag, Result, RootId, ToggleError, MAX_NESTING_DEPTH};

/// Writes and removes membership tags.
#[derive(Debug, Default, Clone)]
pub struct MembershipTagger {
    /// Member identities per root, in tagging order.
    members: HashMap<RootId, IndexSet<BlockId>>,
}

impl MembershipTagger {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Tagging
    // =========================================================================

    /// Tag the block at `position` as a member of `link`.
    ///
    /// Returns `false` when it already carried that tag. Validation happens
    /// before any write, so a failed call leaves the block untouched.
    pub fn tag<S: BlockSequence + ?Sized>(
        &mut self,
        seq: &mut S,
        position: usize,
        link: &RootId,
    ) -> Result<bool> {
        let len = seq.block_count();
        let block = seq
            .block_at_mut(position)
            .ok_or(ToggleError::PositionOutOfRange { position, len })?;

        if block.root_id() == Some(link) {
            return Err(ToggleError::CyclicDrop(link.clone()));
        }
        let id = block.id;
        if block.is_member_of(link) {
            self.register(link, id);
            return Ok(false);
        }

        let previous = block.tag.replace(MembershipTag::new(link.clone()));
        if let Some(previous) = previous {
            self.unregister(&previous.parent_link, id);
        }
        self.register(link, id);
        tracing::trace!(position, block = %id.short(), "tagged into {link:?}");
        Ok(true)
    }

    /// Remove the tag from the block at `position`.
    ///
    /// Returns `false` when the block was not tagged.
    pub fn untag<S: BlockSequence + ?Sized>(&mut self, seq: &mut S, position: usize) -> Result<bool> {
        let len = seq.block_count();
        let block = seq
            .block_at_mut(position)
            .ok_or(ToggleError::PositionOutOfRange { position, len })?;

        let id = block.id;
        match block.tag.take() {
            Some(previous) => {
                self.unregister(&previous.parent_link, id);
                tracing::trace!(position, block = %id.short(), "untagged from {:?}", previous.parent_link);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Tag with `link`, or untag when `link` is `None`.
    pub fn retag<S: BlockSequence + ?Sized>(
        &mut self,
        seq: &mut S,
        position: usize,
        link: Option<&RootId>,
    ) -> Result<bool> {
        match link {
            Some(link) => self.tag(seq, position, link),
            None => self.untag(seq, position),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_tagged<S: BlockSequence + ?Sized>(&self, seq: &S, position: usize) -> Result<bool> {
        Ok(navigator::block(seq, position)?.is_tagged())
    }

    /// Whether the block at `position` is a toggle root. Blocks never wrap
    /// other blocks, so the only block directly containing a root is the
    /// root's own block.
    pub fn is_root<S: BlockSequence + ?Sized>(&self, seq: &S, position: usize) -> Result<bool> {
        Ok(navigator::block(seq, position)?.is_toggle_root())
    }

    /// Check the index for `id` under `root`.
    pub fn is_known_member(&self, root: &RootId, id: BlockId) -> bool {
        self.members.get(root).is_some_and(|set| set.contains(&id))
    }

    /// Known members of `root` in tagging order.
    pub fn members(&self, root: &RootId) -> impl Iterator<Item = &BlockId> + '_ {
        self.members.get(root).into_iter().flatten()
    }

    // =========================================================================
    // Index maintenance
    // =========================================================================

    fn register(&mut self, link: &RootId, id: BlockId) {
        self.members.entry(link.clone()).or_default().insert(id);
    }

    fn unregister(&mut self, link: &RootId, id: BlockId) {
        if let Some(set) = self.members.get_mut(link) {
            set.shift_remove(&id);
            if set.is_empty() {
                self.members.remove(link);
            }
        }
    }

    /// Drop a removed block from the index.
    pub fn forget_block(&mut self, id: BlockId) {
        self.members.retain(|_, set| {
            set.shift_remove(&id);
            !set.is_empty()
        });
    }

    /// Drop a removed root's member list.
    pub fn forget_root(&mut self, root: &RootId) {
        self.members.remove(root);
    }

    /// Recreate the index from the tags currently in the sequence.
    pub fn rebuild<S: BlockSequence + ?Sized>(&mut self, seq: &S) {
        self.members.clear();
        for pos in 0..seq.block_count() {
            if let Some(block) = seq.block_at(pos)
                && let Some(link) = block.parent_link()
            {
                self.register(link, block.id);
            }
        }
    }

    // =========================================================================
    // Reconstruction and repair
    // =========================================================================

    /// Reconstruct membership positionally for the root at `root_position`.
    ///
    /// Claims the first `items` blocks after the root (its declared count),
    /// skipping over the subtree of any claimed toggle using that toggle's own
    /// declared count. Stops early at a block already tagged into another
    /// toggle, or at a second root with the same ID. Returns the number of
    /// positions the subtree spans.
    pub fn reconstruct<S: BlockSequence + ?Sized>(
        &mut self,
        seq: &mut S,
        root_position: usize,
    ) -> Result<usize> {
        let state = navigator::block(seq, root_position)?
            .toggle
            .clone()
            .ok_or(ToggleError::NotAToggle(root_position))?;
        self.claim(seq, root_position, &state.root_id, state.items, 0)
    }

    fn claim<S: BlockSequence + ?Sized>(
        &mut self,
        seq: &mut S,
        root_position: usize,
        root: &RootId,
        items: usize,
        depth: usize,
    ) -> Result<usize> {
        if depth >= MAX_NESTING_DEPTH {
            tracing::warn!("reconstruct hit MAX_NESTING_DEPTH ({MAX_NESTING_DEPTH}), stopping");
            return Ok(0);
        }

        let mut cursor = root_position + 1;
        let mut claimed = 0;
        while claimed < items {
            let Some(block) = seq.block_at(cursor) else { break };
            if block.parent_link().is_some_and(|link| link != root) || block.root_id() == Some(root)
            {
                break;
            }
            let nested = block.toggle.clone();

            self.tag(seq, cursor, root)?;
            claimed += 1;
            cursor += 1;

            if let Some(nested) = nested {
                cursor += self.claim(seq, cursor - 1, &nested.root_id, nested.items, depth + 1)?;
            }
        }

        if claimed < items {
            tracing::debug!("{root:?} declared {items} items, reconstructed {claimed}");
        }
        Ok(cursor - root_position - 1)
    }

    /// Repair every tag that violates the forest invariant.
    ///
    /// A tag naming a missing root, or a root whose range was already closed,
    /// is replaced by the innermost toggle still open at that position; at the
    /// top level it is stripped. Returns the number of blocks rewritten.
    pub fn heal<S: BlockSequence + ?Sized>(&mut self, seq: &mut S) -> Result<usize> {
        let mut open: Vec<RootId> = Vec::new();
        let mut fixed = 0;

        for position in 0..seq.block_count() {
            let block = navigator::block(seq, position)?;
            let link = block.parent_link().cloned();
            let own = block.root_id().cloned();

            match link {
                None => open.clear(),
                Some(link) => match open.iter().rposition(|r| *r == link) {
                    Some(idx) => open.truncate(idx + 1),
                    None => {
                        let replacement = open.last().cloned();
                        tracing::warn!(position, "healing misplaced tag {link:?} -> {replacement:?}");
                        self.retag(seq, position, replacement.as_ref())?;
                        fixed += 1;
                    }
                },
            }

            if let Some(own) = own {
                open.push(own);
            }
        }

        Ok(fixed)
    }

    /// Move the members of a removed root up one level.
    ///
    /// Members of `removed` are retagged with `new_link` (the removed root's
    /// own parent link), or untagged when it sat at the top level.
    pub fn promote_orphans<S: BlockSequence + ?Sized>(
        &mut self,
        seq: &mut S,
        removed: &RootId,
        new_link: Option<&RootId>,
    ) -> Result<usize> {
        let orphans = navigator::direct_members(seq, removed);
        for &position in &orphans {
            self.retag(seq, position, new_link)?;
        }
        self.forget_root(removed);
        if !orphans.is_empty() {
            tracing::debug!("promoted {} members of removed {removed:?}", orphans.len());
        }
        Ok(orphans.len())
    }
}
