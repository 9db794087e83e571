//! FIFO work queue of attached-but-unexpanded nodes, one per search direction.
//!
//! Besides plain `push`/`try_pop`, the backlog tracks how many popped nodes are still being
//! expanded. A direction is exhausted only when its queue is empty *and* no evaluation is in
//! flight, because an in-flight evaluation may still push children. Both facts live under one
//! mutex so the check is exact.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::arena::NodeId;

/// Result of [`Backlog::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// A node to expand. The caller must call [`Backlog::release`] when done with it.
    Node(NodeId),
    /// Nothing queued right now, but other evaluations are in flight.
    Idle,
    /// Nothing queued and nothing in flight; the direction is exhausted.
    Exhausted,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<NodeId>,
    active: usize,
}

#[derive(Default)]
pub struct Backlog {
    inner: Mutex<Inner>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, ids: impl IntoIterator<Item = NodeId>) {
        self.inner.lock().queue.extend(ids);
    }

    /// Pop without in-flight accounting. `None` on an empty queue.
    pub fn try_pop(&self) -> Option<NodeId> {
        self.inner.lock().queue.pop_front()
    }

    pub fn acquire(&self) -> Acquire {
        let mut inner = self.inner.lock();
        match inner.queue.pop_front() {
            Some(id) => {
                inner.active += 1;
                Acquire::Node(id)
            }
            None if inner.active == 0 => Acquire::Exhausted,
            None => Acquire::Idle,
        }
    }

    /// Finish an evaluation started by [`Backlog::acquire`]. Push its children first.
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        inner.active = inner.active.saturating_sub(1);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Queue empty and no evaluation in flight.
    pub fn is_exhausted(&self) -> bool {
        let inner = self.inner.lock();
        inner.queue.is_empty() && inner.active == 0
    }
}
