//! Visibility propagation through nested toggles.
//!
//! Only the `hidden` and `highlighted` flags of blocks are written here. A
//! nested toggle's stored status is never touched: closing a parent hides the
//! child's members without forgetting whether the child itself was open.

use crate::host::BlockSequence;
use crate::navigator;
use crate::{Result, RootId, ToggleError, ToggleStatus, MAX_NESTING_DEPTH};

/// Apply `status` to every descendant of `root`.
///
/// Direct members are hidden iff `status` is closed. Nested toggles recurse
/// with `Closed` forced when the outer status is closed, and with their own
/// stored status otherwise. Returns the number of blocks updated.
pub fn set_visibility<S: BlockSequence + ?Sized>(
    seq: &mut S,
    root: &RootId,
    status: ToggleStatus,
) -> usize {
    propagate(seq, root, status, 0)
}

fn propagate<S: BlockSequence + ?Sized>(
    seq: &mut S,
    root: &RootId,
    status: ToggleStatus,
    depth: usize,
) -> usize {
    if depth >= MAX_NESTING_DEPTH {
        tracing::warn!("set_visibility hit MAX_NESTING_DEPTH ({MAX_NESTING_DEPTH}), truncating");
        return 0;
    }

    let hidden = status.is_closed();
    let mut touched = 0;
    let mut nested = Vec::new();

    for pos in 0..seq.block_count() {
        let Some(block) = seq.block_at_mut(pos) else { continue };
        if !block.is_member_of(root) {
            continue;
        }
        block.hidden = hidden;
        touched += 1;
        if let Some(state) = &block.toggle {
            let effective = if hidden { ToggleStatus::Closed } else { state.status };
            nested.push((state.root_id.clone(), effective));
        }
    }

    for (child, effective) in nested {
        touched += propagate(seq, &child, effective, depth + 1);
    }
    touched
}

/// The status that actually governs `root`'s members: closed if the toggle
/// itself or any enclosing toggle is closed.
pub fn effective_status<S: BlockSequence + ?Sized>(seq: &S, root: &RootId) -> Result<ToggleStatus> {
    let position = seq
        .root_position(root)
        .ok_or_else(|| ToggleError::RootNotFound(root.clone()))?;
    if navigator::block(seq, position)?.toggle_status() == Some(ToggleStatus::Closed) {
        return Ok(ToggleStatus::Closed);
    }
    for ancestor in navigator::ancestors(seq, position)? {
        let closed = seq
            .root_position(&ancestor)
            .and_then(|p| seq.block_at(p))
            .and_then(|b| b.toggle_status())
            .is_some_and(|s| s.is_closed());
        if closed {
            return Ok(ToggleStatus::Closed);
        }
    }
    Ok(ToggleStatus::Open)
}

/// Recompute every block's `hidden` flag from the stored statuses.
///
/// One pass with a stack of open ranges, the same walk as
/// [`navigator::verify_forest`]. Blocks with misplaced or orphaned tags are
/// shown. Returns the number of hidden blocks.
pub fn refresh_all<S: BlockSequence + ?Sized>(seq: &mut S) -> usize {
    // (root, hides its members)
    let mut open: Vec<(RootId, bool)> = Vec::new();
    let mut hidden_count = 0;

    for pos in 0..seq.block_count() {
        let Some(block) = seq.block_at_mut(pos) else { continue };

        let hidden = match block.parent_link() {
            None => {
                open.clear();
                false
            }
            Some(link) => match open.iter().rposition(|(r, _)| r == link) {
                Some(idx) => {
                    open.truncate(idx + 1);
                    open[idx].1
                }
                None => false,
            },
        };
        block.hidden = hidden;
        if hidden {
            hidden_count += 1;
        }

        if let Some(state) = &block.toggle {
            open.push((state.root_id.clone(), hidden || state.status.is_closed()));
        }
    }

    hidden_count
}

/// Mark `root`'s whole subtree as selected. Returns the marked positions.
pub fn highlight_subtree<S: BlockSequence + ?Sized>(seq: &mut S, root: &RootId) -> Vec<usize> {
    let mut marked = Vec::new();
    highlight_within(seq, root, &mut marked, 0);
    marked.sort_unstable();
    marked
}

fn highlight_within<S: BlockSequence + ?Sized>(
    seq: &mut S,
    root: &RootId,
    marked: &mut Vec<usize>,
    depth: usize,
) {
    if depth >= MAX_NESTING_DEPTH {
        tracing::warn!("highlight_subtree hit MAX_NESTING_DEPTH ({MAX_NESTING_DEPTH}), truncating");
        return;
    }
    let mut nested = Vec::new();
    for pos in 0..seq.block_count() {
        let Some(block) = seq.block_at_mut(pos) else { continue };
        if !block.is_member_of(root) {
            continue;
        }
        block.highlighted = true;
        marked.push(pos);
        if let Some(child) = block.root_id() {
            nested.push(child.clone());
        }
    }
    for child in nested {
        highlight_within(seq, &child, marked, depth + 1);
    }
}

/// Clear every selection mark.
pub fn clear_highlights<S: BlockSequence + ?Sized>(seq: &mut S) {
    for pos in 0..seq.block_count() {
        if let Some(block) = seq.block_at_mut(pos) {
            block.highlighted = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Block, MemorySequence};

    fn rid(s: &str) -> RootId {
        RootId::parse(s).unwrap()
    }

    /// `R(closed)[M, T(open)[P]], after`
    fn scenario(r_status: ToggleStatus) -> MemorySequence {
        MemorySequence::from_blocks(vec![
            Block::toggle_root(rid("R"), "R", r_status),
            Block::paragraph("M").tagged(&rid("R")),
            Block::toggle_root(rid("T"), "T", ToggleStatus::Open).tagged(&rid("R")),
            Block::paragraph("P").tagged(&rid("T")),
            Block::paragraph("after"),
        ])
    }

    fn hidden(s: &MemorySequence) -> Vec<bool> {
        s.blocks().iter().map(|b| b.hidden).collect()
    }

    #[test]
    fn test_closing_hides_nested_without_touching_status() {
        let mut s = scenario(ToggleStatus::Closed);
        let touched = set_visibility(&mut s, &rid("R"), ToggleStatus::Closed);

        assert_eq!(touched, 3);
        assert_eq!(hidden(&s), vec![false, true, true, true, false]);
        assert_eq!(s.blocks()[2].toggle_status(), Some(ToggleStatus::Open));
    }

    #[test]
    fn test_reopening_restores_nested_stored_status() {
        let mut s = scenario(ToggleStatus::Closed);
        set_visibility(&mut s, &rid("R"), ToggleStatus::Closed);

        set_visibility(&mut s, &rid("R"), ToggleStatus::Open);
        assert_eq!(hidden(&s), vec![false, false, false, false, false]);

        // Nested toggle remembered as closed stays closed after reopening R.
        s.block_at_mut(2).unwrap().toggle.as_mut().unwrap().status = ToggleStatus::Closed;
        set_visibility(&mut s, &rid("R"), ToggleStatus::Closed);
        set_visibility(&mut s, &rid("R"), ToggleStatus::Open);
        assert_eq!(hidden(&s), vec![false, false, false, true, false]);
    }

    #[test]
    fn test_effective_status_follows_ancestors() {
        let s = scenario(ToggleStatus::Closed);
        assert_eq!(effective_status(&s, &rid("T")).unwrap(), ToggleStatus::Closed);
        assert_eq!(effective_status(&s, &rid("R")).unwrap(), ToggleStatus::Closed);

        let s = scenario(ToggleStatus::Open);
        assert_eq!(effective_status(&s, &rid("T")).unwrap(), ToggleStatus::Open);
        assert!(effective_status(&s, &rid("nope")).is_err());
    }

    #[test]
    fn test_refresh_all_matches_propagation() {
        let mut s = scenario(ToggleStatus::Closed);
        assert_eq!(refresh_all(&mut s), 3);
        assert_eq!(hidden(&s), vec![false, true, true, true, false]);

        let mut s = scenario(ToggleStatus::Open);
        s.block_at_mut(2).unwrap().toggle.as_mut().unwrap().status = ToggleStatus::Closed;
        assert_eq!(refresh_all(&mut s), 1);
        assert_eq!(hidden(&s), vec![false, false, false, true, false]);
    }

    #[test]
    fn test_highlight_subtree() {
        let mut s = scenario(ToggleStatus::Open);
        assert_eq!(highlight_subtree(&mut s, &rid("R")), vec![1, 2, 3]);
        assert!(!s.blocks()[0].highlighted);
        assert!(!s.blocks()[4].highlighted);

        clear_highlights(&mut s);
        assert!(s.blocks().iter().all(|b| !b.highlighted));
        assert_eq!(highlight_subtree(&mut s, &rid("T")), vec![3]);
    }
}
