use std::sync::Arc;

use parking_lot::Mutex;

use super::{outcome, scan, DedupOutcome, IndexError, IndexKind, NodeIndex};
use crate::arena::{Arena, NodeId, StateKey};

/// Every registered id in one list, scanned linearly under a single mutex.
pub struct ListIndex {
    arena: Arc<Arena>,
    entries: Mutex<Vec<NodeId>>,
}

impl ListIndex {
    pub fn new(arena: Arc<Arena>) -> Self {
        Self {
            arena,
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl NodeIndex for ListIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::List
    }

    fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    fn add(&self, id: NodeId) -> Result<DedupOutcome, IndexError> {
        let candidate = self.arena.node(id)?;
        let key = candidate.key();
        let mut entries = self.entries.lock();
        let hit = scan(&self.arena, entries.iter().copied(), &key, candidate.hash)?;
        if let Some(existing) = hit {
            return Ok(outcome(existing, candidate));
        }
        entries.push(id);
        Ok(DedupOutcome::Attached)
    }

    fn find_match(&self, key: &StateKey, hash: u32) -> Result<Option<NodeId>, IndexError> {
        let entries = self.entries.lock();
        Ok(scan(&self.arena, entries.iter().copied(), key, hash)?.map(|n| n.id))
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
