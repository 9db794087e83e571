//! Deduplication indexes: "have we seen this state before?"
//!
//! Every variant implements [`NodeIndex`] with the same contract:
//!
//! - [`NodeIndex::add`] registers a published node unless a node with the same
//!   `(crate_map, move_map)` is already present, in which case it reports the existing id;
//! - [`NodeIndex::find_match`] looks a state up without registering anything.
//!
//! The check-and-insert in `add` is atomic with respect to every other `add`, so at most one
//! node per distinct state is ever reported [`DedupOutcome::Attached`]. The variants only differ
//! in their space/time trade-offs and are selected at construction through [`IndexKind`].

mod depth;
mod double_buffer;
mod list;
mod long_term;
mod sorted;
mod tree;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arena::{Arena, ArenaError, NodeId, SearchNode, StateKey};

pub use depth::DepthPartitionedIndex;
pub use double_buffer::DoubleBufferedIndex;
pub use list::ListIndex;
pub use long_term::LongTermIndex;
pub use sorted::SortedListIndex;
pub use tree::OptimisticTree;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IndexError {
    #[error("timed out after {timeout:?} waiting for the index node of hash {hash:#010x}")]
    LockTimeout { hash: u32, timeout: Duration },
    #[error("index capacity of {capacity} entries exceeded")]
    Full { capacity: usize },
    #[error(transparent)]
    Arena(#[from] ArenaError),
}

/// Result of registering a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// First node for this state; it is now registered.
    Attached,
    /// An equal state is already registered under `existing`.
    Duplicate(NodeId),
    /// An equal state is registered but was produced by the other search direction.
    ///
    /// How such a chain should be stitched is unresolved, so it is surfaced rather than guessed.
    ChainedSolution { existing: NodeId },
}

pub trait NodeIndex: Send + Sync {
    fn kind(&self) -> IndexKind;

    /// The arena whose nodes this index refers to.
    fn arena(&self) -> &Arc<Arena>;

    /// Register a published node unless its state is already present.
    fn add(&self, id: NodeId) -> Result<DedupOutcome, IndexError>;

    fn add_batch(&self, ids: &[NodeId]) -> Result<Vec<DedupOutcome>, IndexError> {
        ids.iter().map(|&id| self.add(id)).collect()
    }

    /// The registered node equal to `key`, if any. `hash` must be `key.hash32()`.
    fn find_match(&self, key: &StateKey, hash: u32) -> Result<Option<NodeId>, IndexError>;

    /// Registered nodes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move buffered entries into long-lived storage. A no-op for unbuffered variants.
    fn flush(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    /// One mutex-guarded list scanned linearly.
    List,
    /// One list kept sorted by hash, binary searched under a reader/writer lock.
    SortedList,
    /// Hash-sorted lists partitioned by node depth.
    DepthPartitioned,
    /// Binary tree on hash with per-tree-node locks.
    #[default]
    OptimisticTree,
    /// Immutable sorted cold blocks behind a mutable hot buffer.
    LongTerm,
    /// Active/alternate ingest buffers in front of an optimistic tree.
    DoubleBuffered,
}

impl IndexKind {
    pub const ALL: [IndexKind; 6] = [
        IndexKind::List,
        IndexKind::SortedList,
        IndexKind::DepthPartitioned,
        IndexKind::OptimisticTree,
        IndexKind::LongTerm,
        IndexKind::DoubleBuffered,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndexKind::List => "list",
            IndexKind::SortedList => "sorted-list",
            IndexKind::DepthPartitioned => "depth-partitioned",
            IndexKind::OptimisticTree => "optimistic-tree",
            IndexKind::LongTerm => "long-term",
            IndexKind::DoubleBuffered => "double-buffered",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = IndexKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown index kind {s:?}; expected one of {}", names.join(", "))
            })
    }
}

/// Tuning knobs shared by the index variants.
#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    /// Longest wait for a contended tree node before failing with [`IndexError::LockTimeout`].
    pub lock_timeout: Duration,
    /// Hot-buffer size at which [`LongTermIndex`] freezes entries into a cold block.
    pub hot_capacity: usize,
    /// Active-buffer size at which [`DoubleBufferedIndex`] swaps and flushes.
    pub buffer_capacity: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            hot_capacity: 16_384,
            buffer_capacity: 4_096,
        }
    }
}

/// Build the selected variant over `arena`.
pub fn build(kind: IndexKind, arena: Arc<Arena>, options: &IndexOptions) -> Arc<dyn NodeIndex> {
    match kind {
        IndexKind::List => Arc::new(ListIndex::new(arena)),
        IndexKind::SortedList => Arc::new(SortedListIndex::new(arena)),
        IndexKind::DepthPartitioned => Arc::new(DepthPartitionedIndex::new(arena)),
        IndexKind::OptimisticTree => Arc::new(OptimisticTree::new(arena, options.lock_timeout)),
        IndexKind::LongTerm => Arc::new(LongTermIndex::new(arena, options.hot_capacity)),
        IndexKind::DoubleBuffered => Arc::new(DoubleBufferedIndex::new(
            Box::new(OptimisticTree::new(arena.clone(), options.lock_timeout)),
            arena,
            options.buffer_capacity,
        )),
    }
}

/// Classify a full-equality hit.
#[inline]
pub(crate) fn outcome(existing: &SearchNode, candidate: &SearchNode) -> DedupOutcome {
    if existing.direction != candidate.direction {
        DedupOutcome::ChainedSolution {
            existing: existing.id,
        }
    } else {
        DedupOutcome::Duplicate(existing.id)
    }
}

/// First id in `ids` whose node has `hash` and equals `key`.
pub(crate) fn scan<'a>(
    arena: &'a Arena,
    ids: impl IntoIterator<Item = NodeId>,
    key: &StateKey,
    hash: u32,
) -> Result<Option<&'a SearchNode>, IndexError> {
    for id in ids {
        let node = arena.node(id)?;
        if node.hash == hash && node.same_state(key) {
            return Ok(Some(node));
        }
    }
    Ok(None)
}
