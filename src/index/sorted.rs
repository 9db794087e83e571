use std::sync::Arc;

use parking_lot::RwLock;

use super::{outcome, scan, DedupOutcome, IndexError, IndexKind, NodeIndex};
use crate::arena::{Arena, NodeId, SearchNode, StateKey};

/// `(hash, id)` pairs kept sorted by hash.
///
/// Lookups binary search under the read lock; inserts shift the tail under the write lock.
pub struct SortedListIndex {
    arena: Arc<Arena>,
    entries: RwLock<Vec<(u32, NodeId)>>,
}

/// Range of `entries` whose hash equals `hash`.
pub(super) fn hash_range(entries: &[(u32, NodeId)], hash: u32) -> std::ops::Range<usize> {
    let lo = entries.partition_point(|&(h, _)| h < hash);
    let hi = lo + entries[lo..].partition_point(|&(h, _)| h == hash);
    lo..hi
}

/// Search a hash-sorted slice for a node equal to `key`.
pub(super) fn find_sorted<'a>(
    arena: &'a Arena,
    entries: &[(u32, NodeId)],
    key: &StateKey,
    hash: u32,
) -> Result<Option<&'a SearchNode>, IndexError> {
    let range = hash_range(entries, hash);
    scan(arena, entries[range].iter().map(|&(_, id)| id), key, hash)
}

impl SortedListIndex {
    pub fn new(arena: Arc<Arena>) -> Self {
        Self {
            arena,
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl NodeIndex for SortedListIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::SortedList
    }

    fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    fn add(&self, id: NodeId) -> Result<DedupOutcome, IndexError> {
        let candidate = self.arena.node(id)?;
        let key = candidate.key();
        let mut entries = self.entries.write();
        if let Some(existing) = find_sorted(&self.arena, &entries, &key, candidate.hash)? {
            return Ok(outcome(existing, candidate));
        }
        let at = hash_range(&entries, candidate.hash).end;
        entries.insert(at, (candidate.hash, id));
        Ok(DedupOutcome::Attached)
    }

    fn find_match(&self, key: &StateKey, hash: u32) -> Result<Option<NodeId>, IndexError> {
        let entries = self.entries.read();
        Ok(find_sorted(&self.arena, &entries, key, hash)?.map(|n| n.id))
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_range_covers_equal_run() {
        let entries = [(1, NodeId(0)), (3, NodeId(1)), (3, NodeId(2)), (7, NodeId(3))];
        assert_eq!(hash_range(&entries, 3), 1..3);
        assert_eq!(hash_range(&entries, 4), 3..3);
        assert_eq!(hash_range(&entries, 9), 4..4);
    }
}
