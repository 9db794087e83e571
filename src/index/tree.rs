//! Binary search tree on the 32-bit state hash.
//!
//! Each tree node owns the bucket of arena ids that share its hash. Descents are lock-free: the
//! `left`/`right` links are atomics that only ever go from `NONE` to a tree-node id. A tree node's
//! mutex guards both its bucket and the attachment of new children under it, so:
//!
//! - appending to a bucket rechecks the bucket's contents under the lock;
//! - linking a new tree node rechecks that the link is still `NONE` under the parent's lock and
//!   otherwise resumes the descent from the freshly linked node.
//!
//! Locks are taken with a bounded wait; a holder that never lets go surfaces as
//! [`IndexError::LockTimeout`] instead of a hang.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use super::{outcome, scan, DedupOutcome, IndexError, IndexKind, NodeIndex};
use crate::arena::{Arena, BlockChain, NodeId, StateKey, DEFAULT_BLOCK_SIZE};

const NIL: u32 = u32::MAX;

struct TreeNode {
    hash: u32,
    left: AtomicU32,
    right: AtomicU32,
    bucket: Mutex<Vec<NodeId>>,
}

pub struct OptimisticTree {
    arena: Arc<Arena>,
    lock_timeout: Duration,
    root: AtomicU32,
    root_lock: Mutex<()>,
    nodes: BlockChain<OnceLock<TreeNode>>,
    next: AtomicUsize,
    len: AtomicUsize,
}

impl OptimisticTree {
    pub fn new(arena: Arc<Arena>, lock_timeout: Duration) -> Self {
        // At most one tree node per arena node.
        let capacity = arena.capacity();
        Self {
            arena,
            lock_timeout,
            root: AtomicU32::new(NIL),
            root_lock: Mutex::new(()),
            nodes: BlockChain::new(capacity, DEFAULT_BLOCK_SIZE),
            next: AtomicUsize::new(0),
            len: AtomicUsize::new(0),
        }
    }

    /// Tree nodes allocated, i.e. distinct hashes seen.
    pub fn distinct_hashes(&self) -> usize {
        self.next.load(Ordering::Acquire).min(self.nodes.capacity())
    }

    fn lock<'a, T>(&self, m: &'a Mutex<T>, hash: u32) -> Result<MutexGuard<'a, T>, IndexError> {
        m.try_lock_for(self.lock_timeout)
            .ok_or(IndexError::LockTimeout {
                hash,
                timeout: self.lock_timeout,
            })
    }

    #[inline]
    fn tree_node(&self, idx: u32) -> Option<&TreeNode> {
        self.nodes.get(idx as usize)?.get()
    }

    fn new_tree_node(&self, hash: u32, id: NodeId) -> Result<u32, IndexError> {
        let idx = self.next.fetch_add(1, Ordering::AcqRel);
        let full = IndexError::Full {
            capacity: self.nodes.capacity(),
        };
        let cell = self.nodes.get_or_alloc(idx).ok_or(full)?;
        let node = TreeNode {
            hash,
            left: AtomicU32::new(NIL),
            right: AtomicU32::new(NIL),
            bucket: Mutex::new(vec![id]),
        };
        // The index was just reserved, so nobody else can have filled the cell.
        let fresh = cell.set(node).is_ok();
        debug_assert!(fresh, "tree slot {idx} filled twice");
        Ok(idx as u32)
    }

    /// Store a new tree node in `link` if it is still empty. Caller holds the link owner's lock.
    fn try_link(&self, link: &AtomicU32, hash: u32, id: NodeId) -> Result<bool, IndexError> {
        if link.load(Ordering::Acquire) != NIL {
            return Ok(false);
        }
        let idx = self.new_tree_node(hash, id)?;
        link.store(idx, Ordering::Release);
        Ok(true)
    }

    /// Tree node holding `hash`, found without taking any lock.
    fn descend(&self, hash: u32) -> Option<&TreeNode> {
        let mut cur = self.root.load(Ordering::Acquire);
        while cur != NIL {
            let node = self.tree_node(cur)?;
            cur = match hash.cmp(&node.hash) {
                CmpOrdering::Equal => return Some(node),
                CmpOrdering::Less => node.left.load(Ordering::Acquire),
                CmpOrdering::Greater => node.right.load(Ordering::Acquire),
            };
        }
        None
    }
}

impl NodeIndex for OptimisticTree {
    fn kind(&self) -> IndexKind {
        IndexKind::OptimisticTree
    }

    fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    fn add(&self, id: NodeId) -> Result<DedupOutcome, IndexError> {
        let candidate = self.arena.node(id)?;
        let key = candidate.key();
        let hash = candidate.hash;

        let mut link: &AtomicU32 = &self.root;
        let mut owner: Option<&TreeNode> = None;
        loop {
            let cur = link.load(Ordering::Acquire);
            if cur == NIL {
                let linked = match owner {
                    Some(parent) => {
                        let _guard = self.lock(&parent.bucket, parent.hash)?;
                        self.try_link(link, hash, id)?
                    }
                    None => {
                        let _guard = self.lock(&self.root_lock, hash)?;
                        self.try_link(link, hash, id)?
                    }
                };
                if linked {
                    self.len.fetch_add(1, Ordering::AcqRel);
                    return Ok(DedupOutcome::Attached);
                }
                // Lost the race for this link; continue from whatever was linked.
                continue;
            }

            let node = self
                .tree_node(cur)
                .ok_or(IndexError::Full {
                    capacity: self.nodes.capacity(),
                })?;
            match hash.cmp(&node.hash) {
                CmpOrdering::Equal => {
                    let mut bucket = self.lock(&node.bucket, hash)?;
                    if let Some(existing) = scan(&self.arena, bucket.iter().copied(), &key, hash)? {
                        return Ok(outcome(existing, candidate));
                    }
                    bucket.push(id);
                    self.len.fetch_add(1, Ordering::AcqRel);
                    return Ok(DedupOutcome::Attached);
                }
                CmpOrdering::Less => link = &node.left,
                CmpOrdering::Greater => link = &node.right,
            }
            owner = Some(node);
        }
    }

    fn find_match(&self, key: &StateKey, hash: u32) -> Result<Option<NodeId>, IndexError> {
        let Some(node) = self.descend(hash) else {
            return Ok(None);
        };
        let bucket = self.lock(&node.bucket, hash)?;
        Ok(scan(&self.arena, bucket.iter().copied(), key, hash)?.map(|n| n.id))
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }
}
