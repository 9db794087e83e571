//! A hot hash map in front of immutable, hash-sorted cold blocks.
//!
//! New entries land in the hot map. When it reaches `hot_capacity` entries it is frozen into a
//! sorted block; once there are more than [`MAX_COLD_BLOCKS`] blocks they are merged into one.
//! Lock order is always hot then cold.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::sorted::find_sorted;
use super::{outcome, scan, DedupOutcome, IndexError, IndexKind, NodeIndex};
use crate::arena::{Arena, NodeId, SearchNode, StateKey};

pub const MAX_COLD_BLOCKS: usize = 8;

type ColdBlock = Arc<[(u32, NodeId)]>;

pub struct LongTermIndex {
    arena: Arc<Arena>,
    hot: RwLock<FxHashMap<u32, Vec<NodeId>>>,
    hot_len: AtomicUsize,
    cold: RwLock<Vec<ColdBlock>>,
    hot_capacity: usize,
    len: AtomicUsize,
}

impl LongTermIndex {
    pub fn new(arena: Arc<Arena>, hot_capacity: usize) -> Self {
        Self {
            arena,
            hot: RwLock::new(FxHashMap::default()),
            hot_len: AtomicUsize::new(0),
            cold: RwLock::new(Vec::new()),
            hot_capacity: hot_capacity.max(1),
            len: AtomicUsize::new(0),
        }
    }

    pub fn cold_blocks(&self) -> usize {
        self.cold.read().len()
    }

    fn find_in<'a>(
        arena: &'a Arena,
        hot: &FxHashMap<u32, Vec<NodeId>>,
        cold: &[ColdBlock],
        key: &StateKey,
        hash: u32,
    ) -> Result<Option<&'a SearchNode>, IndexError> {
        if let Some(ids) = hot.get(&hash) {
            if let Some(hit) = scan(arena, ids.iter().copied(), key, hash)? {
                return Ok(Some(hit));
            }
        }
        for block in cold {
            if let Some(hit) = find_sorted(arena, block, key, hash)? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    /// Freeze the hot map into a cold block. Caller holds the hot write lock.
    fn freeze(&self, hot: &mut FxHashMap<u32, Vec<NodeId>>) {
        let mut block: Vec<(u32, NodeId)> = hot
            .drain()
            .flat_map(|(h, ids)| ids.into_iter().map(move |id| (h, id)))
            .collect();
        block.sort_unstable();
        self.hot_len.store(0, Ordering::Release);

        let mut cold = self.cold.write();
        cold.push(block.into());
        if cold.len() > MAX_COLD_BLOCKS {
            let mut merged: Vec<(u32, NodeId)> =
                cold.iter().flat_map(|b| b.iter().copied()).collect();
            merged.sort_unstable();
            debug!(entries = merged.len(), "merged cold index blocks");
            *cold = vec![merged.into()];
        }
    }
}

impl NodeIndex for LongTermIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::LongTerm
    }

    fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    fn add(&self, id: NodeId) -> Result<DedupOutcome, IndexError> {
        let candidate = self.arena.node(id)?;
        let key = candidate.key();
        let hash = candidate.hash;
        let mut hot = self.hot.write();
        {
            let cold = self.cold.read();
            if let Some(existing) = Self::find_in(&self.arena, &hot, &cold, &key, hash)? {
                return Ok(outcome(existing, candidate));
            }
        }
        hot.entry(hash).or_default().push(id);
        self.len.fetch_add(1, Ordering::AcqRel);
        if self.hot_len.fetch_add(1, Ordering::AcqRel) + 1 >= self.hot_capacity {
            self.freeze(&mut hot);
        }
        Ok(DedupOutcome::Attached)
    }

    fn find_match(&self, key: &StateKey, hash: u32) -> Result<Option<NodeId>, IndexError> {
        let hot = self.hot.read();
        let cold = self.cold.read();
        Ok(Self::find_in(&self.arena, &hot, &cold, key, hash)?.map(|n| n.id))
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    fn flush(&self) -> Result<(), IndexError> {
        let mut hot = self.hot.write();
        if !hot.is_empty() {
            self.freeze(&mut hot);
        }
        Ok(())
    }
}
