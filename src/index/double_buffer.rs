//! Active/alternate ingest buffers in front of a long-lived index.
//!
//! Producers register into the active buffer while holding the shared side of `window`. When the
//! active buffer fills, one producer flips the buffers under the exclusive side of `window`,
//! replays the now-alternate buffer into the inner index and clears it under a second short
//! exclusive window. Between the two windows the alternate buffer is still consulted by lookups,
//! so an entry is visible in at least one place at every moment.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::debug;

use super::{outcome, scan, DedupOutcome, IndexError, IndexKind, NodeIndex};
use crate::arena::{Arena, NodeId, SearchNode, StateKey};

type Buffer = FxHashMap<u32, Vec<NodeId>>;

pub struct DoubleBufferedIndex {
    arena: Arc<Arena>,
    inner: Box<dyn NodeIndex>,
    /// Index of the active buffer.
    window: RwLock<usize>,
    buffers: [RwLock<Buffer>; 2],
    buffered: AtomicUsize,
    flushing: Mutex<()>,
    capacity: usize,
    len: AtomicUsize,
}

impl DoubleBufferedIndex {
    pub fn new(inner: Box<dyn NodeIndex>, arena: Arc<Arena>, capacity: usize) -> Self {
        Self {
            arena,
            inner,
            window: RwLock::new(0),
            buffers: [RwLock::new(Buffer::default()), RwLock::new(Buffer::default())],
            buffered: AtomicUsize::new(0),
            flushing: Mutex::new(()),
            capacity: capacity.max(1),
            len: AtomicUsize::new(0),
        }
    }

    /// Entries waiting in the active buffer.
    pub fn buffered(&self) -> usize {
        self.buffered.load(Ordering::Acquire)
    }

    fn find_in_buffer<'a>(
        arena: &'a Arena,
        buffer: &Buffer,
        key: &StateKey,
        hash: u32,
    ) -> Result<Option<&'a SearchNode>, IndexError> {
        match buffer.get(&hash) {
            Some(ids) => scan(arena, ids.iter().copied(), key, hash),
            None => Ok(None),
        }
    }

    /// Swap the buffers and move the old active one into the inner index.
    /// Returns without doing anything if another thread is already flushing.
    fn swap_and_drain(&self) -> Result<(), IndexError> {
        let Some(_flushing) = self.flushing.try_lock() else {
            return Ok(());
        };
        let old = {
            let mut window = self.window.write();
            let old = *window;
            *window = 1 - old;
            self.buffered.store(0, Ordering::Release);
            old
        };

        let pending: Vec<NodeId> = self.buffers[old]
            .read()
            .values()
            .flat_map(|ids| ids.iter().copied())
            .collect();
        self.inner.add_batch(&pending)?;
        debug!(entries = pending.len(), "drained ingest buffer");

        let _window = self.window.write();
        self.buffers[old].write().clear();
        Ok(())
    }
}

impl NodeIndex for DoubleBufferedIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::DoubleBuffered
    }

    fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    fn add(&self, id: NodeId) -> Result<DedupOutcome, IndexError> {
        let candidate = self.arena.node(id)?;
        let key = candidate.key();
        let hash = candidate.hash;
        let full = {
            let window = self.window.read();
            let active = *window;
            if let Some(existing) = self.inner.find_match(&key, hash)? {
                return Ok(outcome(self.arena.node(existing)?, candidate));
            }
            let alternate = self.buffers[1 - active].read();
            if let Some(existing) = Self::find_in_buffer(&self.arena, &alternate, &key, hash)? {
                return Ok(outcome(existing, candidate));
            }
            drop(alternate);

            let mut buffer = self.buffers[active].write();
            if let Some(existing) = Self::find_in_buffer(&self.arena, &buffer, &key, hash)? {
                return Ok(outcome(existing, candidate));
            }
            buffer.entry(hash).or_default().push(id);
            self.len.fetch_add(1, Ordering::AcqRel);
            self.buffered.fetch_add(1, Ordering::AcqRel) + 1 >= self.capacity
        };
        if full {
            self.swap_and_drain()?;
        }
        Ok(DedupOutcome::Attached)
    }

    fn find_match(&self, key: &StateKey, hash: u32) -> Result<Option<NodeId>, IndexError> {
        let _window = self.window.read();
        for buffer in &self.buffers {
            if let Some(hit) = Self::find_in_buffer(&self.arena, &buffer.read(), key, hash)? {
                return Ok(Some(hit.id));
            }
        }
        self.inner.find_match(key, hash)
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    fn flush(&self) -> Result<(), IndexError> {
        // Twice: the first pass may find the alternate buffer still draining elsewhere.
        self.swap_and_drain()?;
        self.swap_and_drain()
    }
}
