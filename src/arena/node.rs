use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::core::bitmap::Bitmap;
use crate::core::coord::{Coord, Dir};

/// Dense arena index. [`NodeId::NONE`] stands for "no node" in tree links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn from_raw(raw: u32) -> Option<NodeId> {
        let id = NodeId(raw);
        (!id.is_none()).then_some(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("#none")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDirection {
    /// Pushes from the start layout towards the goals.
    Forward,
    /// Pulls from the solved layout back towards the start.
    Reverse,
}

impl SearchDirection {
    #[inline]
    pub fn opposite(self) -> SearchDirection {
        match self {
            SearchDirection::Forward => SearchDirection::Reverse,
            SearchDirection::Reverse => SearchDirection::Forward,
        }
    }
}

impl fmt::Display for SearchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchDirection::Forward => "forward",
            SearchDirection::Reverse => "reverse",
        })
    }
}

/// Node lifecycle.
///
/// `Leased → EvalStart → EvalEnd` for a node being expanded; each generated successor is
/// `NewChild` until the index classifies it as `Duplicate` or `Attached`. Once every successor
/// has been published the parent is `EvalAllChildren` while they are registered, then `Complete`.
/// `Solution` marks a node that solves the puzzle, `SolutionPath` its ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeStatus {
    Leased = 0,
    EvalStart = 1,
    EvalEnd = 2,
    NewChild = 3,
    Duplicate = 4,
    Attached = 5,
    EvalAllChildren = 6,
    Complete = 7,
    Solution = 8,
    SolutionPath = 9,
}

impl NodeStatus {
    fn from_u8(v: u8) -> NodeStatus {
        match v {
            1 => NodeStatus::EvalStart,
            2 => NodeStatus::EvalEnd,
            3 => NodeStatus::NewChild,
            4 => NodeStatus::Duplicate,
            5 => NodeStatus::Attached,
            6 => NodeStatus::EvalAllChildren,
            7 => NodeStatus::Complete,
            8 => NodeStatus::Solution,
            9 => NodeStatus::SolutionPath,
            _ => NodeStatus::Leased,
        }
    }
}

/// The identity of a search state: crate layout plus the player's reachable region.
///
/// The exact player cell is irrelevant; two nodes are the same state iff both maps are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub crate_map: Bitmap,
    pub move_map: Bitmap,
}

impl StateKey {
    #[inline]
    pub fn new(crate_map: Bitmap, move_map: Bitmap) -> Self {
        Self {
            crate_map,
            move_map,
        }
    }

    /// Pre-filter hash; collisions are possible and must be resolved by full comparison.
    #[inline]
    pub fn hash32(&self) -> u32 {
        self.crate_map
            .hash32()
            .wrapping_mul(0x0100_0193)
            .rotate_left(13)
            ^ self.move_map.hash32()
    }
}

/// The immutable payload of a search node, written once when the node is published.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub id: NodeId,
    pub parent: NodeId,
    pub direction: SearchDirection,
    pub hash: u32,
    pub crate_map: Bitmap,
    pub move_map: Bitmap,
    /// Forward: where the player stands after the push (the crate's old cell).
    /// Reverse: where the player stands after the pull.
    pub player: Coord,
    /// Direction of the push that produced this node (for reverse nodes, of the push that
    /// undoes the pull). `None` on roots.
    pub push: Option<Dir>,
    /// Pushes from the root.
    pub depth: u32,
}

impl SearchNode {
    #[inline]
    pub fn same_state(&self, key: &StateKey) -> bool {
        self.crate_map == key.crate_map && self.move_map == key.move_map
    }

    #[inline]
    pub fn key(&self) -> StateKey {
        StateKey::new(self.crate_map, self.move_map)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// One arena slot: the write-once payload plus the mutable tree links and status.
pub(crate) struct Slot {
    pub(crate) node: OnceLock<SearchNode>,
    status: AtomicU8,
    pub(crate) first_child: AtomicU32,
    pub(crate) next_sibling: AtomicU32,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            node: OnceLock::new(),
            status: AtomicU8::new(NodeStatus::Leased as u8),
            first_child: AtomicU32::new(NodeId::NONE.0),
            next_sibling: AtomicU32::new(NodeId::NONE.0),
        }
    }
}

impl Slot {
    #[inline]
    pub(crate) fn status(&self) -> NodeStatus {
        NodeStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_status(&self, status: NodeStatus) {
        self.status.store(status as u8, Ordering::Release);
    }
}
