//! Structural operations that keep every toggle's subtree contiguous.
//!
//! The host only moves one block per primitive call, so a subtree moves as a
//! replay of single-block moves ([`relocate`]). Each operation validates its
//! request fully before the first mutation; a rejected request leaves the
//! sequence untouched.
//!
//! # Relocation order
//!
//! Moving up, the k-th block of the unit is always found at `src + k` and goes
//! to `target + k`: every earlier move inserted above it and removed above it.
//! Moving down, the next block of the unit is always at `src` and always goes
//! to `target - 1`: each move vacates the slot the next one fills.

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::host::BlockSequence;
use crate::navigator;
use crate::tagger::MembershipTagger;
use crate::{Block, Result, RootId, ToggleError};

/// Direction for settings-menu moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Direction {
    Up,
    Down,
}

/// Result of a drag-and-drop request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// Dropped onto its own position.
    Unchanged,
    /// The unit now starts at `position` under `parent`.
    Moved {
        position: usize,
        parent: Option<RootId>,
    },
}

// ============================================================================
// Relocation
// ============================================================================

#[derive(Clone, Copy, Debug)]
struct Carry {
    src: usize,
    target: usize,
    moving_up: bool,
    limit: usize,
}

impl Carry {
    fn source(&self, drift: usize) -> usize {
        if self.moving_up { self.src + drift } else { self.src }
    }

    fn dest(&self, drift: usize) -> usize {
        if self.moving_up { self.target + drift } else { self.target - 1 }
    }
}

/// Move the unit starting at `src` so it sits just before the block
/// currently at `target` (`target == block_count()` appends).
///
/// Returns the unit's new start position. A target inside or adjacent to the
/// unit leaves it in place.
pub fn relocate<S: BlockSequence + ?Sized>(seq: &mut S, src: usize, target: usize) -> Result<usize> {
    let len = seq.block_count();
    if target > len {
        return Err(ToggleError::PositionOutOfRange { position: target, len });
    }
    let unit = navigator::unit_len(seq, src)?;
    if target >= src && target <= src + unit {
        return Ok(src);
    }

    let plan = Carry {
        src,
        target,
        moving_up: target < src,
        limit: unit,
    };
    let carried = carry(seq, plan, 0)?;
    if carried != unit {
        tracing::warn!(src, target, "carried {carried} blocks, expected {unit}");
    }

    Ok(if plan.moving_up { target } else { target - unit })
}

/// Move the block at the cursor and, when it is a toggle root, each of its
/// members in order, recursing into nested roots.
///
/// `drift` is the number of blocks already carried in this pass; every source
/// and destination index is derived from it. Returns the updated drift.
fn carry<S: BlockSequence + ?Sized>(seq: &mut S, plan: Carry, drift: usize) -> Result<usize> {
    let from = plan.source(drift);
    let root = navigator::block(seq, from)?.root_id().cloned();
    seq.move_block(from, plan.dest(drift));
    let mut drift = drift + 1;

    let Some(root) = root else {
        return Ok(drift);
    };
    while drift < plan.limit {
        let Some(next) = seq.block_at(plan.source(drift)) else {
            break;
        };
        if !next.is_member_of(&root) {
            break;
        }
        drift = carry(seq, plan, drift)?;
    }
    Ok(drift)
}

// ============================================================================
// Settings moves
// ============================================================================

/// Move a toggle and its whole subtree past the neighbouring sibling unit.
///
/// Down swaps with the unit right after the subtree; up swaps with the
/// sibling unit that ends right above the root, however deeply that unit is
/// nested. Both stay within the toggle's parent: at the first or last child
/// position, or at the edges of the sequence, nothing moves.
///
/// Returns the root's new position, or `None` for a no-op.
pub fn move_toggle<S: BlockSequence + ?Sized>(
    seq: &mut S,
    root: &RootId,
    direction: Direction,
) -> Result<Option<usize>> {
    let position = seq
        .root_position(root)
        .ok_or_else(|| ToggleError::RootNotFound(root.clone()))?;
    let link = navigator::block(seq, position)?.parent_link().cloned();
    let unit = navigator::unit_len(seq, position)?;

    let landed = match direction {
        Direction::Down => {
            let next = position + unit;
            let Some(neighbour) = seq.block_at(next) else {
                tracing::debug!("{root:?} already last, not moving down");
                return Ok(None);
            };
            if neighbour.parent_link() != link.as_ref() {
                tracing::debug!("{root:?} is the last child of its parent, not moving down");
                return Ok(None);
            }
            let next_unit = navigator::unit_len(seq, next)?;
            relocate(seq, position, next + next_unit)?
        }
        Direction::Up => {
            if position == 0 {
                tracing::debug!("{root:?} already first, not moving up");
                return Ok(None);
            }
            match navigator::find_enclosing_sibling_root(seq, root, link.as_ref(), position - 1)? {
                Some(start) => relocate(seq, position, start)?,
                None => {
                    tracing::debug!("{root:?} has no sibling above, not moving up");
                    return Ok(None);
                }
            }
        }
    };

    seq.set_caret(landed);
    Ok(Some(landed))
}

/// Undo a host-side displacement of `root` so it sits at `expected` again.
///
/// Hosts with a generic "move block" settings action shift the root block
/// alone before the toggle gets to react. Returns `true` if the root moved.
pub fn restore_root<S: BlockSequence + ?Sized>(
    seq: &mut S,
    root: &RootId,
    expected: usize,
) -> Result<bool> {
    let len = seq.block_count();
    if expected >= len {
        return Err(ToggleError::PositionOutOfRange { position: expected, len });
    }
    let current = seq
        .root_position(root)
        .ok_or_else(|| ToggleError::RootNotFound(root.clone()))?;
    if current == expected {
        return Ok(false);
    }
    seq.move_block(current, expected);
    Ok(true)
}

// ============================================================================
// Drag and drop
// ============================================================================

/// Drop the unit at `from` so that it lands before the block currently at
/// `target`.
///
/// The unit joins whatever toggle the block above the drop point belongs to
/// (or that block's own toggle when it is a root), and leaves every toggle
/// when dropped at the top level. Dropping a toggle inside its own subtree is
/// rejected with [`ToggleError::CyclicDrop`].
pub fn drag_drop<S: BlockSequence + ?Sized>(
    seq: &mut S,
    tagger: &mut MembershipTagger,
    from: usize,
    target: usize,
) -> Result<DropOutcome> {
    let len = seq.block_count();
    if target > len {
        return Err(ToggleError::PositionOutOfRange { position: target, len });
    }
    let dragged = navigator::block(seq, from)?.root_id().cloned();
    let unit = navigator::unit_len(seq, from)?;

    if target == from || target == from + unit {
        tracing::debug!(from, target, "dropped onto its own position");
        return Ok(DropOutcome::Unchanged);
    }
    if let Some(root) = &dragged
        && target > from
        && target < from + unit
    {
        return Err(ToggleError::CyclicDrop(root.clone()));
    }

    let parent = navigator::inherited_link(seq, target);
    if let (Some(root), Some(parent)) = (&dragged, &parent)
        && navigator::is_descendant_of(seq, parent, root)
    {
        return Err(ToggleError::CyclicDrop(root.clone()));
    }

    tagger.retag(seq, from, parent.as_ref())?;
    let position = relocate(seq, from, target)?;
    seq.set_caret(position);
    tracing::debug!(from, position, "dropped under {parent:?}");

    Ok(DropOutcome::Moved { position, parent })
}

// ============================================================================
// Indent / outdent
// ============================================================================

/// Indent the block at `position` into the toggle its predecessor belongs to.
///
/// Returns the new parent link, or `None` when nothing changed (first block,
/// predecessor at the top level, or already a member of that toggle).
pub fn nest_block<S: BlockSequence + ?Sized>(
    seq: &mut S,
    tagger: &mut MembershipTagger,
    position: usize,
) -> Result<Option<RootId>> {
    navigator::block(seq, position)?;
    let Some(link) = navigator::inherited_link(seq, position) else {
        tracing::debug!(position, "nothing to nest into");
        return Ok(None);
    };
    Ok(tagger.tag(seq, position, &link)?.then_some(link))
}

/// Outdent the member at `position` one level.
///
/// The unit moves just past its toggle's full range (unless it already ends
/// there) and takes the toggle's own parent link, so it stays inside any
/// enclosing toggle. Returns the unit's new position.
pub fn extract_block<S: BlockSequence + ?Sized>(
    seq: &mut S,
    tagger: &mut MembershipTagger,
    position: usize,
) -> Result<usize> {
    let Some(link) = navigator::block(seq, position)?.parent_link().cloned() else {
        return Err(ToggleError::NotAMember(position));
    };

    let root_position = match navigator::find_ancestor_root_position(seq, position, &link) {
        Ok(root_position) => root_position,
        Err(ToggleError::RootNotFound(_)) => {
            tracing::debug!(position, "extracting orphaned member of {link:?}");
            tagger.untag(seq, position)?;
            return Ok(position);
        }
        Err(e) => return Err(e),
    };

    let outer = navigator::block(seq, root_position)?.parent_link().cloned();
    let range_end = root_position + navigator::count_descendants(seq, &link);
    let unit = navigator::unit_len(seq, position)?;

    let landed = if position + unit > range_end {
        position
    } else {
        relocate(seq, position, range_end + 1)?
    };
    tagger.retag(seq, landed, outer.as_ref())?;
    seq.set_caret(landed);
    Ok(landed)
}

// ============================================================================
// Deletion
// ============================================================================

/// Delete a toggle root together with its whole subtree.
///
/// Deletes at the root's position `descendants + 1` times: each removal
/// shifts the next subtree block into that slot.
pub fn delete_whole_toggle<S: BlockSequence + ?Sized>(
    seq: &mut S,
    tagger: &mut MembershipTagger,
    root: &RootId,
) -> Result<Vec<Block>> {
    let position = seq
        .root_position(root)
        .ok_or_else(|| ToggleError::RootNotFound(root.clone()))?;
    let descendants = navigator::count_descendants(seq, root);

    let mut removed = Vec::with_capacity(descendants + 1);
    for _ in 0..=descendants {
        let Some(block) = seq.delete_block_at(position) else {
            break;
        };
        tagger.forget_block(block.id);
        if let Some(nested) = block.root_id() {
            tagger.forget_root(nested);
        }
        removed.push(block);
    }

    seq.set_caret(position.saturating_sub(1));
    tracing::debug!("deleted {root:?} with {descendants} descendants");
    Ok(removed)
}
