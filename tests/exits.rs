use std::time::Duration;

use sokoban_search::arena::ArenaError;
use sokoban_search::config::{CancelToken, ExitConditions, SolverConfig, SolverError, SolverMode};
use sokoban_search::puzzle::{Puzzle, PuzzleError};
use sokoban_search::scenarios::{TWO_ROWS, WALLED_IN};
use sokoban_search::solver::{solve, ExitResult, StopReason};

fn checked_every_node(exit: ExitConditions) -> SolverConfig {
    let mut cfg = SolverConfig::default().with_exit(exit);
    cfg.check_interval = 1;
    cfg
}

#[test]
fn invalid_puzzles_are_rejected_before_searching() {
    let cases = [
        ("######/# X O#/######", PuzzleError::NoPlayer),
        ("######/#P  O#/######", PuzzleError::NoCrates),
        (
            "#######/#PXX O#/#######",
            PuzzleError::MoreCratesThanGoals { goals: 1, crates: 2 },
        ),
    ];
    for (text, expected) in cases {
        let puzzle = Puzzle::parse(text).unwrap();
        let err = solve(&puzzle, &SolverConfig::default()).unwrap_err();
        assert_eq!(err, SolverError::InvalidPuzzle(expected), "{text}");
    }
}

#[test]
fn open_puzzle_is_rejected() {
    let puzzle = Puzzle::parse("######/ P X O#/######").unwrap();
    assert!(matches!(
        solve(&puzzle, &SolverConfig::default()),
        Err(SolverError::InvalidPuzzle(PuzzleError::OpenBoundary { .. }))
    ));
}

#[test]
fn small_arena_ends_with_a_capacity_error() {
    let puzzle = Puzzle::parse(TWO_ROWS).unwrap();
    let cfg = SolverConfig::default().with_arena_capacity(4);
    let result = solve(&puzzle, &cfg).unwrap();
    assert_eq!(
        result.exit,
        ExitResult::Error(SolverError::Arena(ArenaError::CapacityExceeded { capacity: 4 }))
    );
    assert!(result.solutions.is_empty());
}

#[test]
fn small_arena_with_workers_is_reported_as_a_worker_fault() {
    let puzzle = Puzzle::parse(TWO_ROWS).unwrap();
    let cfg = SolverConfig::default()
        .with_arena_capacity(4)
        .with_threads(2, 0);
    let result = solve(&puzzle, &cfg).unwrap();
    match result.exit {
        ExitResult::Error(SolverError::WorkerFaults(faults)) => {
            assert!(!faults.is_empty());
            assert!(faults[0].message.contains("capacity"), "{}", faults[0]);
        }
        other => panic!("expected worker faults, got {other}"),
    }
}

#[test]
fn cancelled_token_stops_the_solve() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let puzzle = Puzzle::parse(WALLED_IN).unwrap();
    let exit = ExitConditions {
        cancel: cancel.clone(),
        ..ExitConditions::unlimited()
    };

    let single = solve(&puzzle, &checked_every_node(exit.clone())).unwrap();
    assert_eq!(single.exit, ExitResult::Stopped(StopReason::Cancelled));

    let multi = solve(&puzzle, &checked_every_node(exit).with_threads(2, 0)).unwrap();
    assert_eq!(multi.exit, ExitResult::Stopped(StopReason::Cancelled));
}

#[test]
fn node_limit_stops_after_exactly_that_many_evaluations() {
    let puzzle = Puzzle::parse(WALLED_IN).unwrap();
    let cfg = checked_every_node(ExitConditions {
        total_nodes: Some(3),
        ..ExitConditions::unlimited()
    });
    let result = solve(&puzzle, &cfg).unwrap();
    assert_eq!(result.exit, ExitResult::Stopped(StopReason::NodeLimit));
    assert_eq!(result.statistics.total().evaluated, 3);
}

#[test]
fn node_limit_counts_both_directions() {
    let puzzle = Puzzle::parse(WALLED_IN).unwrap();
    let cfg = checked_every_node(ExitConditions {
        total_nodes: Some(4),
        ..ExitConditions::unlimited()
    })
    .with_mode(SolverMode::Bidirectional);
    let result = solve(&puzzle, &cfg).unwrap();
    assert_eq!(result.exit, ExitResult::Stopped(StopReason::NodeLimit));
    assert_eq!(result.statistics.forward.evaluated, 2);
    assert_eq!(result.statistics.reverse.evaluated, 2);
}

#[test]
fn zero_duration_times_out() {
    let puzzle = Puzzle::parse(WALLED_IN).unwrap();
    let cfg = checked_every_node(ExitConditions {
        duration: Some(Duration::ZERO),
        ..ExitConditions::default()
    });
    let result = solve(&puzzle, &cfg).unwrap();
    assert_eq!(result.exit, ExitResult::TimeOut);
}
