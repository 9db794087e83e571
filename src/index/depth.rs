use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::sorted::{find_sorted, hash_range};
use super::{outcome, DedupOutcome, IndexError, IndexKind, NodeIndex};
use crate::arena::{Arena, NodeId, SearchNode, StateKey};

/// One hash-sorted list per node depth.
///
/// Inserts only shift entries of their own depth, which keeps them cheap when the frontier is
/// many levels deep. A lookup probes every partition, shallowest first.
pub struct DepthPartitionedIndex {
    arena: Arc<Arena>,
    partitions: RwLock<Vec<Vec<(u32, NodeId)>>>,
    len: AtomicUsize,
}

impl DepthPartitionedIndex {
    pub fn new(arena: Arc<Arena>) -> Self {
        Self {
            arena,
            partitions: RwLock::new(Vec::new()),
            len: AtomicUsize::new(0),
        }
    }

    /// Number of depth partitions created so far.
    pub fn depths(&self) -> usize {
        self.partitions.read().len()
    }

    fn find_in<'a>(
        arena: &'a Arena,
        partitions: &[Vec<(u32, NodeId)>],
        key: &StateKey,
        hash: u32,
    ) -> Result<Option<&'a SearchNode>, IndexError> {
        for part in partitions {
            if let Some(hit) = find_sorted(arena, part, key, hash)? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}

impl NodeIndex for DepthPartitionedIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::DepthPartitioned
    }

    fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    fn add(&self, id: NodeId) -> Result<DedupOutcome, IndexError> {
        let candidate = self.arena.node(id)?;
        let key = candidate.key();
        let mut partitions = self.partitions.write();
        if let Some(existing) = Self::find_in(&self.arena, &partitions, &key, candidate.hash)? {
            return Ok(outcome(existing, candidate));
        }
        let depth = candidate.depth as usize;
        if partitions.len() <= depth {
            partitions.resize_with(depth + 1, Vec::new);
        }
        let part = &mut partitions[depth];
        let at = hash_range(part, candidate.hash).end;
        part.insert(at, (candidate.hash, id));
        self.len.fetch_add(1, Ordering::Relaxed);
        Ok(DedupOutcome::Attached)
    }

    fn find_match(&self, key: &StateKey, hash: u32) -> Result<Option<NodeId>, IndexError> {
        let partitions = self.partitions.read();
        Ok(Self::find_in(&self.arena, &partitions, key, hash)?.map(|n| n.id))
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::arena::SearchDirection;

    #[test]
    fn duplicates_are_found_across_depths() {
        let arena = arena();
        let index = DepthPartitionedIndex::new(arena.clone());
        let k = key(&[(2, 2)], &[(3, 3)]);
        let shallow = publish_with(&arena, k, SearchDirection::Forward, 1);
        let deep = publish_with(&arena, k, SearchDirection::Forward, 9);
        assert_eq!(index.add(shallow).unwrap(), DedupOutcome::Attached);
        assert_eq!(index.add(deep).unwrap(), DedupOutcome::Duplicate(shallow));
        assert_eq!(index.depths(), 2);
    }
}
