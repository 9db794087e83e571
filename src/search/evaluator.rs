//! Node expansion shared by both search directions.
//!
//! An [`Expander`] knows the move rules of one direction (pushes forward, pulls in reverse).
//! The [`Evaluator`] drives it over one node in two passes:
//!
//! 1. collect the valid moves of the node (pruned moves are only counted);
//! 2. materialize and publish every child, then register each one in the index.
//!
//! Children the index accepts are linked under their parent; duplicates are published but never
//! linked or queued. Accepted children are then checked for being a solution and, in
//! bidirectional solves, probed against the other direction's index.

use std::sync::Arc;

use crate::arena::{Arena, NodeId, NodeStatus, SearchDirection, SearchNode, StateKey};
use crate::config::SolverError;
use crate::core::bitmap::{Bitmap, BitmapError};
use crate::core::coord::{Coord, Dir};
use crate::index::{DedupOutcome, NodeIndex};

/// One push (forward) or pull (reverse): the player stands on `from` and moves towards `dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: Coord,
    pub dir: Dir,
}

/// Valid moves of a node plus the number of moves rejected as dead.
#[derive(Debug, Default, Clone)]
pub struct MoveList {
    pub moves: Vec<Move>,
    pub pruned: u64,
}

/// A state produced by a move, not yet stored anywhere.
#[derive(Debug, Clone, Copy)]
pub struct Successor {
    pub crate_map: Bitmap,
    pub move_map: Bitmap,
    pub player: Coord,
    pub push: Option<Dir>,
}

impl Successor {
    #[inline]
    pub fn key(&self) -> StateKey {
        StateKey::new(self.crate_map, self.move_map)
    }
}

/// Move rules of one search direction.
pub trait Expander: Send + Sync {
    fn direction(&self) -> SearchDirection;

    /// States the search starts from.
    fn roots(&self) -> Result<Vec<Successor>, BitmapError>;

    /// Pass one: valid moves from `node`, in generation order.
    fn moves(&self, node: &SearchNode) -> Result<MoveList, BitmapError>;

    /// Pass two: the state `mv` leads to.
    fn apply(&self, node: &SearchNode, mv: Move) -> Result<Successor, BitmapError>;

    /// Whether a state ends the search on its own.
    fn is_solution(&self, crate_map: &Bitmap, move_map: &Bitmap) -> bool;
}

/// Something worth stopping for, found while expanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Found {
    /// A node of the evaluating direction that solves the puzzle by itself.
    Goal(NodeId),
    /// `here` (evaluating direction) has the same state as `there` (opposite direction).
    Meeting { here: NodeId, there: NodeId },
}

/// Outcome of expanding one node.
#[derive(Debug, Default, Clone)]
pub struct Evaluation {
    /// Newly attached children to queue. Goal nodes are not queued.
    pub attached: Vec<NodeId>,
    pub found: Vec<Found>,
    pub duplicates: u64,
    pub dead: u64,
    /// The node had no valid move at all.
    pub dead_end: bool,
}

pub struct Evaluator {
    expander: Arc<dyn Expander>,
    arena: Arc<Arena>,
    index: Arc<dyn NodeIndex>,
    opposite: Option<Arc<dyn NodeIndex>>,
}

impl Evaluator {
    pub fn new(
        expander: Arc<dyn Expander>,
        arena: Arc<Arena>,
        index: Arc<dyn NodeIndex>,
        opposite: Option<Arc<dyn NodeIndex>>,
    ) -> Self {
        Self {
            expander,
            arena,
            index,
            opposite,
        }
    }

    #[inline]
    pub fn direction(&self) -> SearchDirection {
        self.expander.direction()
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    pub fn index(&self) -> &Arc<dyn NodeIndex> {
        &self.index
    }

    /// Publish and register the root states. Attached roots are returned for queueing.
    pub fn seed(&self) -> Result<Evaluation, SolverError> {
        let mut out = Evaluation::default();
        for root in self.expander.roots()? {
            let id = self.publish(root, NodeId::NONE, 0)?;
            match self.register(id)? {
                DedupOutcome::Attached => {
                    self.arena.attach_root(id)?;
                    self.classify(id, &root, &mut out)?;
                }
                _ => out.duplicates += 1,
            }
        }
        Ok(out)
    }

    /// Expand `id`: generate, publish, deduplicate and link its children.
    pub fn evaluate(&self, id: NodeId) -> Result<Evaluation, SolverError> {
        let node = self.arena.node(id)?;
        self.arena.set_status(id, NodeStatus::EvalStart)?;
        let list = self.expander.moves(node)?;
        self.arena.set_status(id, NodeStatus::EvalEnd)?;

        let mut out = Evaluation {
            dead: list.pruned,
            dead_end: list.moves.is_empty(),
            ..Evaluation::default()
        };
        let mut children = Vec::with_capacity(list.moves.len());
        for mv in list.moves {
            let child = self.expander.apply(node, mv)?;
            children.push((self.publish(child, id, node.depth + 1)?, child));
        }
        self.arena.set_status(id, NodeStatus::EvalAllChildren)?;
        for (child_id, child) in children {
            match self.register(child_id)? {
                DedupOutcome::Attached => {
                    self.arena.attach_child(id, child_id)?;
                    self.classify(child_id, &child, &mut out)?;
                }
                _ => {
                    self.arena.set_status(child_id, NodeStatus::Duplicate)?;
                    out.duplicates += 1;
                }
            }
        }
        self.arena.set_status(id, NodeStatus::Complete)?;
        Ok(out)
    }

    fn publish(&self, s: Successor, parent: NodeId, depth: u32) -> Result<NodeId, SolverError> {
        let direction = self.direction();
        let key = s.key();
        let id = self.arena.alloc(NodeStatus::NewChild, |id| SearchNode {
            id,
            parent,
            direction,
            hash: key.hash32(),
            crate_map: s.crate_map,
            move_map: s.move_map,
            player: s.player,
            push: s.push,
            depth,
        })?;
        Ok(id)
    }

    fn register(&self, id: NodeId) -> Result<DedupOutcome, SolverError> {
        match self.index.add(id)? {
            DedupOutcome::ChainedSolution { existing } => {
                Err(SolverError::ChainedSolutionUnsupported {
                    candidate: id,
                    existing,
                })
            }
            other => Ok(other),
        }
    }

    /// Record whether an attached node is a goal or meets the other direction.
    fn classify(&self, id: NodeId, s: &Successor, out: &mut Evaluation) -> Result<(), SolverError> {
        if self.expander.is_solution(&s.crate_map, &s.move_map) {
            out.found.push(Found::Goal(id));
            return Ok(());
        }
        if let Some(opposite) = &self.opposite {
            let key = s.key();
            if let Some(there) = opposite.find_match(&key, key.hash32())? {
                out.found.push(Found::Meeting { here: id, there });
            }
        }
        out.attached.push(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StaticMaps;
    use crate::index::{self, IndexError, IndexKind, IndexOptions};
    use crate::puzzle::Puzzle;
    use crate::scenarios::{CORRIDOR, TWO_ROWS};
    use crate::search::ForwardExpander;

    fn forward(arena: &Arc<Arena>) -> (Arc<ForwardExpander>, Evaluator) {
        let maps = Arc::new(StaticMaps::new(&Puzzle::parse(CORRIDOR).unwrap()).unwrap());
        let expander = Arc::new(ForwardExpander::new(maps, true));
        let idx = index::build(IndexKind::List, arena.clone(), &IndexOptions::default());
        let evaluator = Evaluator::new(expander.clone(), arena.clone(), idx, None);
        (expander, evaluator)
    }

    #[test]
    fn corridor_is_solved_on_the_second_expansion() {
        let arena = Arc::new(Arena::new(SearchDirection::Forward, 64));
        let (_, ev) = forward(&arena);

        let seeded = ev.seed().unwrap();
        assert_eq!(seeded.attached.len(), 1);
        assert!(seeded.found.is_empty());

        let first = ev.evaluate(seeded.attached[0]).unwrap();
        assert_eq!(first.attached.len(), 1);
        assert!(first.found.is_empty());
        assert_eq!(arena.status(seeded.attached[0]), Some(NodeStatus::Complete));

        let second = ev.evaluate(first.attached[0]).unwrap();
        assert!(second.attached.is_empty());
        assert!(matches!(second.found.as_slice(), [Found::Goal(_)]));
    }

    #[test]
    fn reseeding_reports_the_root_as_duplicate() {
        let arena = Arc::new(Arena::new(SearchDirection::Forward, 64));
        let (_, ev) = forward(&arena);
        ev.seed().unwrap();
        assert_eq!(arena.attached(), 1);
        let again = ev.seed().unwrap();
        assert!(again.attached.is_empty());
        assert_eq!(again.duplicates, 1);
        assert_eq!(arena.attached(), 1);
        assert_eq!(arena.leased(), 2);
    }

    /// Records the parent's status every time a child is registered.
    struct Watching {
        inner: Arc<dyn NodeIndex>,
        seen: parking_lot::Mutex<Vec<Option<NodeStatus>>>,
    }

    impl NodeIndex for Watching {
        fn kind(&self) -> IndexKind {
            self.inner.kind()
        }

        fn arena(&self) -> &Arc<Arena> {
            self.inner.arena()
        }

        fn add(&self, id: NodeId) -> Result<DedupOutcome, IndexError> {
            let arena = self.inner.arena();
            let parent = arena.node(id)?.parent;
            if !parent.is_none() {
                self.seen.lock().push(arena.status(parent));
            }
            self.inner.add(id)
        }

        fn find_match(&self, key: &StateKey, hash: u32) -> Result<Option<NodeId>, IndexError> {
            self.inner.find_match(key, hash)
        }

        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    #[test]
    fn parent_is_eval_all_children_while_children_are_registered() {
        let arena = Arc::new(Arena::new(SearchDirection::Forward, 64));
        let puzzle = Puzzle::parse(TWO_ROWS).unwrap();
        let maps = Arc::new(StaticMaps::new(&puzzle).unwrap());
        let watching = Arc::new(Watching {
            inner: index::build(IndexKind::List, arena.clone(), &IndexOptions::default()),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let ev = Evaluator::new(
            Arc::new(ForwardExpander::new(maps, true)),
            arena.clone(),
            watching.clone(),
            None,
        );
        let root = ev.seed().unwrap().attached[0];
        let e = ev.evaluate(root).unwrap();
        let seen = watching.seen.lock();
        assert_eq!(seen.len(), e.attached.len() + e.duplicates as usize);
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|s| *s == Some(NodeStatus::EvalAllChildren)));
        assert_eq!(arena.status(root), Some(NodeStatus::Complete));
    }

    #[test]
    fn opposite_direction_state_in_the_same_index_is_an_error() {
        let arena = Arc::new(Arena::new(SearchDirection::Forward, 64));
        let (expander, ev) = forward(&arena);
        let root = expander.roots().unwrap()[0];
        let key = root.key();
        let planted = arena
            .alloc(NodeStatus::NewChild, |id| SearchNode {
                id,
                parent: NodeId::NONE,
                direction: SearchDirection::Reverse,
                hash: key.hash32(),
                crate_map: root.crate_map,
                move_map: root.move_map,
                player: root.player,
                push: None,
                depth: 0,
            })
            .unwrap();
        ev.index().add(planted).unwrap();

        match ev.seed() {
            Err(SolverError::ChainedSolutionUnsupported { existing, .. }) => {
                assert_eq!(existing, planted)
            }
            other => panic!("expected chained-solution error, got {other:?}"),
        }
    }

    #[test]
    fn full_arena_surfaces_as_an_arena_error() {
        let arena = Arc::new(Arena::new(SearchDirection::Forward, 1));
        let (_, ev) = forward(&arena);
        let seeded = ev.seed().unwrap();
        assert!(matches!(
            ev.evaluate(seeded.attached[0]),
            Err(SolverError::Arena(_))
        ));
    }
}
