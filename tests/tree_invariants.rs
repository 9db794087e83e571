use std::sync::Arc;
use std::thread;

use rustc_hash::FxHashSet;
use sokoban_search::analysis::StaticMaps;
use sokoban_search::arena::{Arena, NodeId, NodeStatus, SearchDirection, StateKey};
use sokoban_search::index::{self, IndexKind, IndexOptions};
use sokoban_search::puzzle::Puzzle;
use sokoban_search::scenarios::{CROSS_ROOM, TWO_ROWS, WALLED_IN};
use sokoban_search::search::{
    Acquire, Backlog, Evaluator, Expander, ForwardExpander, Found, ReverseExpander,
};

/// Expand every reachable node of one direction with `workers` threads and return the arena
/// together with the seeded roots.
fn exhaust(
    text: &str,
    direction: SearchDirection,
    kind: IndexKind,
    workers: usize,
) -> (Arc<Arena>, Vec<NodeId>) {
    let maps = Arc::new(StaticMaps::new(&Puzzle::parse(text).unwrap()).unwrap());
    let expander: Arc<dyn Expander> = match direction {
        SearchDirection::Forward => Arc::new(ForwardExpander::new(maps, true)),
        SearchDirection::Reverse => Arc::new(ReverseExpander::new(maps)),
    };
    let arena = Arc::new(Arena::new(direction, 200_000));
    let options = IndexOptions {
        hot_capacity: 64,
        buffer_capacity: 32,
        ..IndexOptions::default()
    };
    let idx = index::build(kind, arena.clone(), &options);
    let evaluator = Evaluator::new(expander, arena.clone(), idx, None);
    let backlog = Backlog::new();

    let seeded = evaluator.seed().unwrap();
    let mut roots = seeded.attached.clone();
    // Goal roots are attached but never queued.
    roots.extend(seeded.found.iter().filter_map(|f| match f {
        Found::Goal(id) => Some(*id),
        Found::Meeting { .. } => None,
    }));
    backlog.push(seeded.attached.iter().copied());

    thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                match backlog.acquire() {
                    Acquire::Node(id) => {
                        let e = evaluator.evaluate(id).unwrap();
                        backlog.push(e.attached.iter().copied());
                        backlog.release();
                    }
                    Acquire::Idle => thread::yield_now(),
                    Acquire::Exhausted => break,
                }
            });
        }
    });
    (arena, roots)
}

/// Nodes reachable from `roots` through the child links.
fn linked(arena: &Arena, roots: &[NodeId]) -> Vec<NodeId> {
    let mut out = roots.to_vec();
    let mut i = 0;
    while i < out.len() {
        out.extend(arena.children(out[i]));
        i += 1;
    }
    out
}

fn check(text: &str, direction: SearchDirection, kind: IndexKind, workers: usize) {
    let label = format!("{direction} {kind} x{workers}");
    let (arena, roots) = exhaust(text, direction, kind, workers);
    let tree = linked(&arena, &roots);
    assert_eq!(tree.len(), arena.attached(), "{label}");

    let mut keys: FxHashSet<StateKey> = FxHashSet::default();
    for &id in &tree {
        let node = arena.node(id).unwrap();
        assert_ne!(arena.status(id), Some(NodeStatus::Duplicate), "{label}");
        assert!(keys.insert(node.key()), "{label}: state of {id} attached twice");
        if node.is_root() {
            continue;
        }
        let parent = arena.node(node.parent).unwrap();
        let gone: Vec<_> = parent.crate_map.subtract(&node.crate_map).true_positions().collect();
        let came: Vec<_> = node.crate_map.subtract(&parent.crate_map).true_positions().collect();
        assert_eq!((gone.len(), came.len()), (1, 1), "{label}: {id} moves one crate");
        assert_eq!(gone[0].manhattan(came[0]), 1, "{label}: {id} moves to a neighbour");
        assert_eq!(node.depth, parent.depth + 1, "{label}");
    }

    // Every duplicate shadows an attached state and was never linked.
    for node in arena.iter() {
        if arena.status(node.id) == Some(NodeStatus::Duplicate) {
            assert!(keys.contains(&node.key()), "{label}: duplicate {} has no original", node.id);
        }
    }
    assert!(arena.leased() >= arena.attached(), "{label}");
}

#[test]
fn every_attached_state_is_unique_and_one_push_from_its_parent() {
    for text in [WALLED_IN, TWO_ROWS, CROSS_ROOM] {
        for direction in [SearchDirection::Forward, SearchDirection::Reverse] {
            for kind in IndexKind::ALL {
                check(text, direction, kind, 1);
            }
        }
    }
}

#[test]
fn concurrent_workers_attach_each_state_once() {
    for text in [WALLED_IN, TWO_ROWS, CROSS_ROOM] {
        for direction in [SearchDirection::Forward, SearchDirection::Reverse] {
            for kind in IndexKind::ALL {
                check(text, direction, kind, 4);
            }
        }
    }
}

#[test]
fn worker_count_does_not_change_the_explored_state_space() {
    for direction in [SearchDirection::Forward, SearchDirection::Reverse] {
        let (one, _) = exhaust(TWO_ROWS, direction, IndexKind::OptimisticTree, 1);
        let (four, _) = exhaust(TWO_ROWS, direction, IndexKind::OptimisticTree, 4);
        assert_eq!(one.attached(), four.attached(), "{direction}");
    }
}
