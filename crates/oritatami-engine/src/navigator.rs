//! Hierarchy queries computed from membership tags.
//!
//! Nothing here is cached: every query re-reads the sequence, so results are
//! only valid until the next mutation. Recursion over nested toggles is
//! circuit-broken at [`MAX_NESTING_DEPTH`] to survive cyclic tags in
//! corrupted documents.

use crate::host::BlockSequence;
use crate::{Block, Result, RootId, ToggleError, MAX_NESTING_DEPTH};

/// Block at `position`, or `PositionOutOfRange`.
pub fn block<S: BlockSequence + ?Sized>(seq: &S, position: usize) -> Result<&Block> {
    seq.block_at(position).ok_or(ToggleError::PositionOutOfRange {
        position,
        len: seq.block_count(),
    })
}

/// Number of blocks in `root`'s full subtree (direct members plus, for
/// members that are toggles themselves, their subtrees).
pub fn count_descendants<S: BlockSequence + ?Sized>(seq: &S, root: &RootId) -> usize {
    count_within(seq, root, 0)
}

fn count_within<S: BlockSequence + ?Sized>(seq: &S, root: &RootId, depth: usize) -> usize {
    if depth >= MAX_NESTING_DEPTH {
        tracing::warn!("count_descendants hit MAX_NESTING_DEPTH ({MAX_NESTING_DEPTH}), truncating");
        return 0;
    }

    let mut total = 0;
    for pos in 0..seq.block_count() {
        let Some(block) = seq.block_at(pos) else { continue };
        if !block.is_member_of(root) {
            continue;
        }
        total += 1;
        if let Some(nested) = block.root_id() {
            total += count_within(seq, nested, depth + 1);
        }
    }
    total
}

/// Positions of the blocks tagged directly with `root`, in sequence order.
pub fn direct_members<S: BlockSequence + ?Sized>(seq: &S, root: &RootId) -> Vec<usize> {
    (0..seq.block_count())
        .filter(|&pos| seq.block_at(pos).is_some_and(|b| b.is_member_of(root)))
        .collect()
}

/// Length of the unit starting at `position`: the block itself plus its
/// subtree when it is a toggle root.
pub fn unit_len<S: BlockSequence + ?Sized>(seq: &S, position: usize) -> Result<usize> {
    let block = block(seq, position)?;
    Ok(match block.root_id() {
        Some(root) => 1 + count_descendants(seq, root),
        None => 1,
    })
}

/// Walk backward from `start` (inclusive) to the root block `target`.
///
/// Used to find where a member's root currently sits after reorderings.
pub fn find_ancestor_root_position<S: BlockSequence + ?Sized>(
    seq: &S,
    start: usize,
    target: &RootId,
) -> Result<usize> {
    block(seq, start)?;
    (0..=start)
        .rev()
        .find(|&pos| seq.block_at(pos).is_some_and(|b| b.root_id() == Some(target)))
        .ok_or_else(|| ToggleError::RootNotFound(target.clone()))
}

/// Resolve where the sibling unit that ends at `search_from` begins.
///
/// `current` is the toggle looking for its predecessor and `sibling_link`
/// its own parent link. When the block at `search_from` belongs to a toggle
/// nested below the sibling level, the search climbs through that toggle's
/// root until it reaches a block at the sibling level.
///
/// Returns `None` when there is no preceding sibling: the climb reached
/// `current`'s own parent root, or ran into an orphaned tag.
pub fn find_enclosing_sibling_root<S: BlockSequence + ?Sized>(
    seq: &S,
    current: &RootId,
    sibling_link: Option<&RootId>,
    search_from: usize,
) -> Result<Option<usize>> {
    resolve_sibling(seq, current, sibling_link, search_from, 0)
}

fn resolve_sibling<S: BlockSequence + ?Sized>(
    seq: &S,
    current: &RootId,
    sibling_link: Option<&RootId>,
    search_from: usize,
    depth: usize,
) -> Result<Option<usize>> {
    if depth >= MAX_NESTING_DEPTH {
        tracing::warn!("sibling resolution hit MAX_NESTING_DEPTH ({MAX_NESTING_DEPTH})");
        return Ok(None);
    }

    let block = block(seq, search_from)?;
    if block.root_id() == Some(current) {
        return Ok(None);
    }
    if sibling_link.is_some() && block.root_id() == sibling_link {
        // First child of its parent: nothing above it inside the toggle.
        return Ok(None);
    }

    let link = block.parent_link();
    if link == sibling_link {
        return Ok(Some(search_from));
    }
    let Some(link) = link else {
        // Climbed out to the top level without meeting the parent.
        return Ok(None);
    };

    match find_ancestor_root_position(seq, search_from, link) {
        Ok(root_pos) => resolve_sibling(seq, current, sibling_link, root_pos, depth + 1),
        Err(ToggleError::RootNotFound(_)) => {
            tracing::debug!(position = search_from, "orphaned tag above {current:?}, no sibling");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Check whether `candidate` is `ancestor` or sits anywhere in its subtree.
pub fn is_descendant_of<S: BlockSequence + ?Sized>(
    seq: &S,
    candidate: &RootId,
    ancestor: &RootId,
) -> bool {
    descends(seq, candidate, ancestor, 0)
}

fn descends<S: BlockSequence + ?Sized>(
    seq: &S,
    candidate: &RootId,
    ancestor: &RootId,
    depth: usize,
) -> bool {
    if candidate == ancestor {
        return true;
    }
    if depth >= MAX_NESTING_DEPTH {
        tracing::warn!("is_descendant_of hit MAX_NESTING_DEPTH ({MAX_NESTING_DEPTH})");
        return false;
    }
    (0..seq.block_count()).any(|pos| {
        seq.block_at(pos).is_some_and(|b| {
            b.is_member_of(ancestor)
                && b.root_id().is_some_and(|nested| descends(seq, candidate, nested, depth + 1))
        })
    })
}

/// The block's parent link, ignoring tags whose root no longer exists.
pub fn live_link<S: BlockSequence + ?Sized>(seq: &S, block: &Block) -> Option<RootId> {
    let link = block.parent_link()?;
    seq.root_position(link).map(|_| link.clone())
}

/// The parent link a block placed at `position` inherits from its
/// predecessor: the predecessor's own root ID if it is a toggle root,
/// otherwise the predecessor's tag. `None` at the top level.
pub fn inherited_link<S: BlockSequence + ?Sized>(seq: &S, position: usize) -> Option<RootId> {
    let prev = seq.block_at(position.checked_sub(1)?)?;
    match prev.root_id() {
        Some(root) => Some(root.clone()),
        None => live_link(seq, prev),
    }
}

/// Enclosing toggles of the block at `position`, innermost first.
pub fn ancestors<S: BlockSequence + ?Sized>(seq: &S, position: usize) -> Result<Vec<RootId>> {
    let mut result = Vec::new();
    let mut current = block(seq, position)?.parent_link().cloned();
    let mut from = position;

    while let Some(link) = current {
        if result.len() >= MAX_NESTING_DEPTH {
            tracing::warn!("ancestors() hit MAX_NESTING_DEPTH ({MAX_NESTING_DEPTH}), truncating");
            break;
        }
        let Ok(root_pos) = find_ancestor_root_position(seq, from, &link) else {
            break;
        };
        result.push(link);
        current = block(seq, root_pos)?.parent_link().cloned();
        from = root_pos;
    }

    Ok(result)
}

/// Check the forest invariant in one pass.
///
/// Walks the sequence keeping a stack of toggles whose range is still open.
/// A tagged block must name a toggle on that stack; everything below that
/// toggle on the stack is closed by it. An untagged block closes every range.
pub fn verify_forest<S: BlockSequence + ?Sized>(seq: &S) -> Result<()> {
    let mut open: Vec<&RootId> = Vec::new();

    for position in 0..seq.block_count() {
        let block = block(seq, position)?;
        match block.parent_link() {
            None => open.clear(),
            Some(link) => match open.iter().rposition(|r| *r == link) {
                Some(idx) => open.truncate(idx + 1),
                None if seq.root_position(link).is_none() => {
                    return Err(ToggleError::OrphanedTag {
                        position,
                        link: link.clone(),
                    });
                }
                None => {
                    return Err(ToggleError::Discontiguous {
                        position,
                        link: link.clone(),
                    });
                }
            },
        }
        if let Some(root) = block.root_id() {
            open.push(root);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySequence, ToggleStatus};

    fn rid(s: &str) -> RootId {
        RootId::parse(s).unwrap()
    }

    fn root(id: &str) -> Block {
        Block::toggle_root(rid(id), id, ToggleStatus::Open)
    }

    fn member(name: &str, of: &str) -> Block {
        Block::paragraph(name).tagged(&rid(of))
    }

    /// `p0, R[a, T[x, y], b], p1`
    fn nested() -> MemorySequence {
        MemorySequence::from_blocks(vec![
            Block::paragraph("p0"),
            root("R"),
            member("a", "R"),
            root("T").tagged(&rid("R")),
            member("x", "T"),
            member("y", "T"),
            member("b", "R"),
            Block::paragraph("p1"),
        ])
    }

    #[test]
    fn test_count_descendants_includes_nested() {
        let s = nested();
        assert_eq!(count_descendants(&s, &rid("R")), 5);
        assert_eq!(count_descendants(&s, &rid("T")), 2);
        assert_eq!(count_descendants(&s, &rid("missing")), 0);
        assert_eq!(unit_len(&s, 1).unwrap(), 6);
        assert_eq!(unit_len(&s, 0).unwrap(), 1);
        assert_eq!(direct_members(&s, &rid("R")), vec![2, 3, 6]);
    }

    #[test]
    fn test_find_ancestor_root_position() {
        let s = nested();
        assert_eq!(find_ancestor_root_position(&s, 5, &rid("T")).unwrap(), 3);
        assert_eq!(find_ancestor_root_position(&s, 5, &rid("R")).unwrap(), 1);
        assert_eq!(find_ancestor_root_position(&s, 3, &rid("T")).unwrap(), 3);
        assert_eq!(
            find_ancestor_root_position(&s, 0, &rid("R")),
            Err(ToggleError::RootNotFound(rid("R")))
        );
        assert!(matches!(
            find_ancestor_root_position(&s, 40, &rid("R")),
            Err(ToggleError::PositionOutOfRange { position: 40, len: 8 })
        ));
    }

    #[test]
    fn test_sibling_resolution_climbs_nested_toggle() {
        let s = nested();
        // b (in R) looks up: y belongs to T, so the sibling unit starts at T.
        let found = find_enclosing_sibling_root(&s, &rid("b"), Some(&rid("R")), 5).unwrap();
        assert_eq!(found, Some(3));
        // a is R's first child: no sibling above it.
        let found = find_enclosing_sibling_root(&s, &rid("a"), Some(&rid("R")), 1).unwrap();
        assert_eq!(found, None);
        // p1 at top level looks above: climbs y -> T -> R.
        let found = find_enclosing_sibling_root(&s, &rid("p1"), None, 6).unwrap();
        assert_eq!(found, Some(1));
    }

    #[test]
    fn test_sibling_resolution_orphan_is_none() {
        let s = MemorySequence::from_blocks(vec![
            Block::paragraph("p"),
            member("ghost", "gone"),
            root("R"),
        ]);
        let found = find_enclosing_sibling_root(&s, &rid("R"), None, 1).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_is_descendant_of() {
        let s = nested();
        assert!(is_descendant_of(&s, &rid("R"), &rid("R")));
        assert!(is_descendant_of(&s, &rid("T"), &rid("R")));
        assert!(!is_descendant_of(&s, &rid("R"), &rid("T")));
        assert!(!is_descendant_of(&s, &rid("T"), &rid("zzz")));
    }

    #[test]
    fn test_inherited_link_and_ancestors() {
        let s = nested();
        assert_eq!(inherited_link(&s, 0), None);
        assert_eq!(inherited_link(&s, 1), None);
        assert_eq!(inherited_link(&s, 2), Some(rid("R")));
        assert_eq!(inherited_link(&s, 4), Some(rid("T")));
        assert_eq!(inherited_link(&s, 7), Some(rid("R")));

        assert_eq!(ancestors(&s, 5).unwrap(), vec![rid("T"), rid("R")]);
        assert!(ancestors(&s, 1).unwrap().is_empty());
    }

    #[test]
    fn test_verify_forest() {
        assert!(verify_forest(&nested()).is_ok());

        let split = MemorySequence::from_blocks(vec![
            root("R"),
            member("a", "R"),
            Block::paragraph("loose"),
            member("b", "R"),
        ]);
        assert_eq!(
            verify_forest(&split),
            Err(ToggleError::Discontiguous { position: 3, link: rid("R") })
        );

        let orphan = MemorySequence::from_blocks(vec![member("a", "gone")]);
        assert_eq!(
            verify_forest(&orphan),
            Err(ToggleError::OrphanedTag { position: 0, link: rid("gone") })
        );

        let before_root = MemorySequence::from_blocks(vec![member("a", "R"), root("R")]);
        assert!(matches!(
            verify_forest(&before_root),
            Err(ToggleError::Discontiguous { position: 0, .. })
        ));
    }

    #[test]
    fn test_cyclic_tags_terminate() {
        // A tagged into B and B into A: corrupted, but queries must return.
        let s = MemorySequence::from_blocks(vec![
            root("A").tagged(&rid("B")),
            root("B").tagged(&rid("A")),
        ]);
        assert!(count_descendants(&s, &rid("A")) <= 2 * MAX_NESTING_DEPTH);
        assert!(is_descendant_of(&s, &rid("A"), &rid("B")));
        assert!(ancestors(&s, 0).unwrap().len() <= MAX_NESTING_DEPTH);
    }
}
