//! Parent-link cycle detection.
//!
//! # Invariants
//! - Walks are linear in chain depth and always terminate: every visited
//!   id is remembered, so a pre-existing loop is reported instead of
//!   spinning.
//! - No side effects beyond the parent lookups.

use std::collections::HashSet;
use std::hash::Hash;

/// Walks parent links upward from `start`.
///
/// Returns `Ok(false)` when the walk revisits a node (including `start`)
/// before reaching a root, `Ok(true)` otherwise.
pub fn check_no_cycle<Id, E, F>(start: Id, mut parent_of: F) -> Result<bool, E>
where
    Id: Copy + Eq + Hash,
    F: FnMut(Id) -> Result<Option<Id>, E>,
{
    let mut visited = HashSet::from([start]);
    let mut cursor = parent_of(start)?;
    while let Some(current) = cursor {
        if !visited.insert(current) {
            return Ok(false);
        }
        cursor = parent_of(current)?;
    }
    Ok(true)
}

/// Returns whether attaching `node` under `candidate_parent` would close a
/// loop, judged against the current (uncommitted) parent links.
pub fn would_create_cycle<Id, E, F>(
    node: Id,
    candidate_parent: Id,
    mut parent_of: F,
) -> Result<bool, E>
where
    Id: Copy + Eq + Hash,
    F: FnMut(Id) -> Result<Option<Id>, E>,
{
    let mut visited = HashSet::new();
    let mut cursor = Some(candidate_parent);
    while let Some(current) = cursor {
        if current == node || !visited.insert(current) {
            return Ok(true);
        }
        cursor = parent_of(current)?;
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{check_no_cycle, would_create_cycle};
    use std::collections::HashMap;
    use std::convert::Infallible;

    fn lookup(links: &HashMap<u32, u32>) -> impl FnMut(u32) -> Result<Option<u32>, Infallible> + '_ {
        move |id| Ok(links.get(&id).copied())
    }

    #[test]
    fn chain_to_root_has_no_cycle() {
        let links = HashMap::from([(3, 2), (2, 1)]);
        assert_eq!(check_no_cycle(3, lookup(&links)), Ok(true));
    }

    #[test]
    fn loop_through_start_is_detected() {
        let links = HashMap::from([(1, 2), (2, 3), (3, 1)]);
        assert_eq!(check_no_cycle(1, lookup(&links)), Ok(false));
    }

    #[test]
    fn self_parent_is_detected() {
        let links = HashMap::from([(7, 7)]);
        assert_eq!(check_no_cycle(7, lookup(&links)), Ok(false));
    }

    #[test]
    fn loop_above_start_still_terminates() {
        let links = HashMap::from([(9, 1), (1, 2), (2, 1)]);
        assert_eq!(check_no_cycle(9, lookup(&links)), Ok(false));
    }

    #[test]
    fn moving_under_own_descendant_would_cycle() {
        let links = HashMap::from([(2, 1), (3, 2)]);
        assert_eq!(would_create_cycle(1, 3, lookup(&links)), Ok(true));
        assert_eq!(would_create_cycle(3, 1, lookup(&links)), Ok(false));
    }
}
