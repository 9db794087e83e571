use std::sync::Arc;
use std::time::Duration;

use sokoban_search::analysis::StaticMaps;
use sokoban_search::config::{ExitConditions, SolverConfig, SolverMode};
use sokoban_search::core::coord::Coord;
use sokoban_search::index::IndexKind;
use sokoban_search::puzzle::Puzzle;
use sokoban_search::scenarios::{self, CROSS_ROOM, TWO_ROWS, WALLED_IN};
use sokoban_search::solution::verify;
use sokoban_search::solver::{solve, ExitResult, SolutionOrigin, SolverResult};

fn config(mode: SolverMode) -> SolverConfig {
    SolverConfig::default()
        .with_mode(mode)
        .with_exit(ExitConditions {
            duration: Some(Duration::from_secs(60)),
            ..ExitConditions::default()
        })
}

fn run(text: &str, config: &SolverConfig) -> (Puzzle, SolverResult) {
    let puzzle = Puzzle::parse(text).unwrap();
    let result = solve(&puzzle, config).unwrap();
    (puzzle, result)
}

fn assert_solved(puzzle: &Puzzle, result: &SolverResult) {
    assert_eq!(result.exit, ExitResult::Solution, "{:?}", result.exit);
    assert!(result.is_solved());
    for s in &result.solutions {
        verify(puzzle, &s.moves).unwrap_or_else(|e| panic!("{}: {e}", s.moves));
        assert_eq!(s.steps, s.moves.len());
    }
}

#[test]
fn two_rows_is_solved_forward() {
    let (puzzle, result) = run(TWO_ROWS, &config(SolverMode::Forward));
    assert_solved(&puzzle, &result);
    assert_eq!(result.solutions[0].origin, SolutionOrigin::Forward);
    assert!(result.statistics.forward.evaluated > 0);
    assert_eq!(result.statistics.reverse.evaluated, 0);
}

#[test]
fn two_rows_is_solved_in_reverse() {
    let (puzzle, result) = run(TWO_ROWS, &config(SolverMode::Reverse));
    assert_solved(&puzzle, &result);
    assert_eq!(result.solutions[0].origin, SolutionOrigin::Reverse);
    assert_eq!(result.statistics.forward.evaluated, 0);
}

#[test]
fn two_rows_is_solved_bidirectionally() {
    let (puzzle, result) = run(TWO_ROWS, &config(SolverMode::Bidirectional));
    assert_solved(&puzzle, &result);
}

#[test]
fn two_rows_is_solved_by_worker_threads() {
    for (mode, f, r) in [
        (SolverMode::Forward, 3, 0),
        (SolverMode::Reverse, 0, 2),
        (SolverMode::Bidirectional, 2, 2),
    ] {
        let cfg = config(mode).with_threads(f, r);
        let (puzzle, result) = run(TWO_ROWS, &cfg);
        assert_solved(&puzzle, &result);
    }
}

#[test]
fn zero_workers_for_a_running_direction_still_gets_one() {
    let cfg = config(SolverMode::Bidirectional).with_threads(2, 0);
    let (puzzle, result) = run(TWO_ROWS, &cfg);
    assert_solved(&puzzle, &result);
}

#[test]
fn walled_in_exhausts_without_solutions() {
    for mode in [SolverMode::Forward, SolverMode::Reverse, SolverMode::Bidirectional] {
        let (_, result) = run(WALLED_IN, &config(mode));
        assert_eq!(result.exit, ExitResult::ExhaustedTree, "{mode}");
        assert!(result.solutions.is_empty());
    }
}

#[test]
fn walled_in_exhausts_with_worker_threads() {
    let (_, result) = run(WALLED_IN, &config(SolverMode::Forward).with_threads(4, 0));
    assert_eq!(result.exit, ExitResult::ExhaustedTree);
    assert!(result.solutions.is_empty());
}

#[test]
fn cross_room_has_only_the_four_corners_dead() {
    let maps = StaticMaps::new(&Puzzle::parse(CROSS_ROOM).unwrap()).unwrap();
    let corners = [(1, 1), (5, 1), (1, 5), (5, 5)].map(|(x, y)| Coord::new(x, y));
    for y in 1..=5 {
        for x in 1..=5 {
            let c = Coord::new(x, y);
            assert_eq!(maps.is_dead(c), corners.contains(&c), "{c}");
        }
    }
    assert_eq!(maps.dead_square.count(), 4);
}

#[test]
fn cross_room_is_solved() {
    let (puzzle, result) = run(CROSS_ROOM, &config(SolverMode::Bidirectional));
    assert_solved(&puzzle, &result);
}

#[test]
fn every_index_kind_finds_the_same_solution() {
    let mut found = Vec::new();
    for kind in IndexKind::ALL {
        let cfg = config(SolverMode::Forward).with_index(kind);
        let (puzzle, result) = run(TWO_ROWS, &cfg);
        assert_solved(&puzzle, &result);
        found.push((kind, result.solutions[0].moves.clone()));
    }
    let first = &found[0].1;
    for (kind, moves) in &found {
        assert_eq!(moves, first, "{kind}");
    }
}

#[test]
fn single_threaded_solves_are_deterministic() {
    for mode in [SolverMode::Forward, SolverMode::Reverse, SolverMode::Bidirectional] {
        let cfg = config(mode);
        let (_, a) = run(TWO_ROWS, &cfg);
        let (_, b) = run(TWO_ROWS, &cfg);
        assert_eq!(a.solutions, b.solutions, "{mode}");
        assert_eq!(a.statistics.forward, b.statistics.forward);
        assert_eq!(a.statistics.reverse, b.statistics.reverse);
    }
}

#[test]
fn already_solved_puzzle_needs_no_moves() {
    let (puzzle, result) = run("#####/#@* #/#####", &config(SolverMode::Forward));
    assert_solved(&puzzle, &result);
    assert_eq!(result.solutions[0].moves, "");
    assert_eq!(result.statistics.forward.evaluated, 0);
}

#[test]
fn keep_going_reports_solutions_after_exhaustion() {
    let cfg = SolverConfig::default().with_exit(ExitConditions {
        stop_on_solution: false,
        ..ExitConditions::unlimited()
    });
    let (puzzle, result) = run(scenarios::CORRIDOR, &cfg);
    assert_solved(&puzzle, &result);
    assert_eq!(result.solutions.len(), 1);
    assert_eq!(result.solutions[0].moves, "rRR");

    let (puzzle, result) = run(TWO_ROWS, &cfg);
    assert_solved(&puzzle, &result);
}

#[test]
fn every_built_in_puzzle_is_decided() {
    for name in scenarios::names() {
        let puzzle = scenarios::by_name(name).unwrap().unwrap();
        let result = solve(&puzzle, &config(SolverMode::Bidirectional)).unwrap();
        assert!(
            matches!(result.exit, ExitResult::Solution | ExitResult::ExhaustedTree),
            "{name}: {}",
            result.exit
        );
    }
}

#[test]
fn progress_sink_sees_the_statistics() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = calls.clone();
    let mut cfg = config(SolverMode::Forward).with_progress(move |_| {
        seen.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    });
    cfg.check_interval = 1;
    cfg.progress_interval = Duration::ZERO;
    let (puzzle, result) = run(TWO_ROWS, &cfg);
    assert_solved(&puzzle, &result);
    assert!(calls.load(std::sync::atomic::Ordering::Relaxed) > 0);
}

#[test]
fn report_serializes_the_verified_solution() {
    let cfg = config(SolverMode::Forward);
    let (puzzle, result) = run(scenarios::CORRIDOR, &cfg);
    let report = sokoban_search::solution::SolutionReport::new("corridor", &puzzle, &cfg, &result);
    assert!(report.verified);
    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["exit"], "solution");
    assert_eq!(json["mode"], "forward");
    assert_eq!(json["solutions"][0]["moves"], "rRR");
    assert_eq!(json["solutions"][0]["origin"], "forward");
    assert!(json.get("error").is_none());
}
