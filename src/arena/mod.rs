//! Append-only, capacity-bounded node store addressed by [`NodeId`].
//!
//! Slots are handed out by a single atomic fetch-and-increment, so two workers can never lease
//! the same id. The leasing worker owns the slot until it publishes the payload; after that the
//! payload is immutable and only the tree links and status change. Nodes are never freed during
//! a solve; the whole arena is dropped at the end.
//!
//! Children form a singly linked list through `first_child`/`next_sibling`, newest first.

mod blocks;
mod node;

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

pub use blocks::{BlockChain, DEFAULT_BLOCK_SIZE};
pub use node::{NodeId, NodeStatus, SearchDirection, SearchNode, StateKey};

use node::Slot;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[error("arena capacity of {capacity} nodes exceeded")]
    CapacityExceeded { capacity: usize },
    #[error("node {id} was published twice")]
    AlreadyPublished { id: NodeId },
    #[error("node {id} was never leased")]
    NotLeased { id: NodeId },
    #[error("node {id} has no published payload")]
    Unpublished { id: NodeId },
}

pub struct Arena {
    direction: SearchDirection,
    slots: BlockChain<Slot>,
    next: AtomicUsize,
    attached: AtomicUsize,
}

impl Arena {
    pub fn new(direction: SearchDirection, capacity: usize) -> Self {
        Self::with_block_size(direction, capacity, DEFAULT_BLOCK_SIZE)
    }

    pub fn with_block_size(direction: SearchDirection, capacity: usize, block_size: usize) -> Self {
        // u32::MAX is the NONE sentinel.
        let capacity = capacity.min(u32::MAX as usize);
        Self {
            direction,
            slots: BlockChain::new(capacity, block_size),
            next: AtomicUsize::new(0),
            attached: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn direction(&self) -> SearchDirection {
        self.direction
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Ids handed out so far (clamped to capacity).
    #[inline]
    pub fn leased(&self) -> usize {
        self.next.load(Ordering::Acquire).min(self.capacity())
    }

    /// Nodes linked into the tree (roots included). Duplicates never count.
    #[inline]
    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::Acquire)
    }

    /// Reserve the next free slot.
    pub fn lease(&self) -> Result<NodeId, ArenaError> {
        let idx = self.next.fetch_add(1, Ordering::AcqRel);
        let slot = self
            .slots
            .get_or_alloc(idx)
            .ok_or(ArenaError::CapacityExceeded {
                capacity: self.capacity(),
            })?;
        slot.set_status(NodeStatus::Leased);
        Ok(NodeId(idx as u32))
    }

    /// Write the payload of a leased slot. The payload's `id` selects the slot.
    pub fn publish(&self, node: SearchNode, status: NodeStatus) -> Result<NodeId, ArenaError> {
        let id = node.id;
        let slot = self.slot(id).ok_or(ArenaError::NotLeased { id })?;
        slot.node
            .set(node)
            .map_err(|_| ArenaError::AlreadyPublished { id })?;
        slot.set_status(status);
        Ok(id)
    }

    /// Lease and publish in one step.
    pub fn alloc(
        &self,
        status: NodeStatus,
        build: impl FnOnce(NodeId) -> SearchNode,
    ) -> Result<NodeId, ArenaError> {
        let id = self.lease()?;
        self.publish(build(id), status)
    }

    #[inline]
    fn slot(&self, id: NodeId) -> Option<&Slot> {
        if id.is_none() || id.index() >= self.leased() {
            return None;
        }
        self.slots.get(id.index())
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&SearchNode> {
        self.slot(id)?.node.get()
    }

    pub fn node(&self, id: NodeId) -> Result<&SearchNode, ArenaError> {
        self.get(id).ok_or(ArenaError::Unpublished { id })
    }

    pub fn status(&self, id: NodeId) -> Option<NodeStatus> {
        self.slot(id).map(Slot::status)
    }

    pub fn set_status(&self, id: NodeId, status: NodeStatus) -> Result<(), ArenaError> {
        self.slot(id)
            .ok_or(ArenaError::NotLeased { id })?
            .set_status(status);
        Ok(())
    }

    /// Count a root as attached. Roots have no parent to link under.
    pub fn attach_root(&self, id: NodeId) -> Result<(), ArenaError> {
        self.set_status(id, NodeStatus::Attached)?;
        self.attached.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Link `child` at the head of `parent`'s child list and mark it attached.
    pub fn attach_child(&self, parent: NodeId, child: NodeId) -> Result<(), ArenaError> {
        let p = self.slot(parent).ok_or(ArenaError::NotLeased { id: parent })?;
        let c = self.slot(child).ok_or(ArenaError::NotLeased { id: child })?;
        let mut head = p.first_child.load(Ordering::Acquire);
        loop {
            c.next_sibling.store(head, Ordering::Release);
            match p.first_child.compare_exchange_weak(
                head,
                child.0,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
        c.set_status(NodeStatus::Attached);
        self.attached.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        NodeId::from_raw(self.slot(id)?.first_child.load(Ordering::Acquire))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        NodeId::from_raw(self.slot(id)?.next_sibling.load(Ordering::Acquire))
    }

    /// Attached children of `id`, most recently attached first.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            arena: self,
            next: self.first_child(id),
        }
    }

    /// Published nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SearchNode> + '_ {
        (0..self.leased()).filter_map(move |i| self.get(NodeId(i as u32)))
    }

    /// `id` followed by each ancestor up to and including its root.
    pub fn path_to_root(&self, id: NodeId) -> Result<Vec<NodeId>, ArenaError> {
        let mut out = Vec::new();
        let mut cur = id;
        while !cur.is_none() {
            out.push(cur);
            cur = self.node(cur)?.parent;
        }
        Ok(out)
    }

    /// Mark `id` as a solution and its ancestors as part of the solution path.
    pub fn mark_solution(&self, id: NodeId) -> Result<(), ArenaError> {
        let path = self.path_to_root(id)?;
        for (i, &n) in path.iter().enumerate() {
            let status = if i == 0 {
                NodeStatus::Solution
            } else {
                NodeStatus::SolutionPath
            };
            self.set_status(n, status)?;
        }
        Ok(())
    }
}

pub struct Children<'a> {
    arena: &'a Arena,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.next?;
        self.next = self.arena.next_sibling(cur);
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bitmap::Bitmap;
    use crate::core::coord::Coord;

    fn payload(id: NodeId, parent: NodeId) -> SearchNode {
        let empty = Bitmap::new(4, 4).unwrap();
        SearchNode {
            id,
            parent,
            direction: SearchDirection::Forward,
            hash: 0,
            crate_map: empty,
            move_map: empty,
            player: Coord::ORIGIN,
            push: None,
            depth: 0,
        }
    }

    #[test]
    fn lease_fails_past_capacity() {
        let arena = Arena::with_block_size(SearchDirection::Forward, 3, 2);
        for _ in 0..3 {
            arena.lease().unwrap();
        }
        assert_eq!(
            arena.lease(),
            Err(ArenaError::CapacityExceeded { capacity: 3 })
        );
        assert_eq!(arena.leased(), 3);
    }

    #[test]
    fn publishing_twice_is_rejected() {
        let arena = Arena::new(SearchDirection::Forward, 8);
        let id = arena.lease().unwrap();
        arena.publish(payload(id, NodeId::NONE), NodeStatus::NewChild).unwrap();
        assert_eq!(
            arena.publish(payload(id, NodeId::NONE), NodeStatus::NewChild),
            Err(ArenaError::AlreadyPublished { id })
        );
    }

    #[test]
    fn children_link_newest_first() {
        let arena = Arena::new(SearchDirection::Forward, 8);
        let root = arena
            .alloc(NodeStatus::Leased, |id| payload(id, NodeId::NONE))
            .unwrap();
        arena.attach_root(root).unwrap();
        let a = arena.alloc(NodeStatus::NewChild, |id| payload(id, root)).unwrap();
        let b = arena.alloc(NodeStatus::NewChild, |id| payload(id, root)).unwrap();
        arena.attach_child(root, a).unwrap();
        arena.attach_child(root, b).unwrap();

        assert_eq!(arena.children(root).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(arena.attached(), 3);
        assert_eq!(arena.path_to_root(b).unwrap(), vec![b, root]);

        arena.mark_solution(b).unwrap();
        assert_eq!(arena.status(b), Some(NodeStatus::Solution));
        assert_eq!(arena.status(root), Some(NodeStatus::SolutionPath));
    }

    #[test]
    fn concurrent_leases_hand_out_unique_ids() {
        let arena = Arena::with_block_size(SearchDirection::Reverse, 4000, 64);
        let ids = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| (0..1000).map(|_| arena.lease().unwrap()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });
        let unique: rustc_hash::FxHashSet<NodeId> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 4000);
        assert!(arena.lease().is_err());
    }
}
