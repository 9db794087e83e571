use std::time::Duration;

use sokoban_search::config::{ExitConditions, SolverConfig, SolverMode};
use sokoban_search::index::IndexKind;
use sokoban_search::puzzle::Puzzle;
use sokoban_search::scenarios;
use sokoban_search::solution::SolutionReport;
use sokoban_search::solver::solve;
use tracing::Level;

fn usage() -> ! {
    eprintln!(
        "Usage: sokoban_solve <puzzle|file> [--mode forward|reverse|bidirectional] \
         [--index KIND] [--threads F,R] [--timeout SECS] [--nodes N] [--no-dynamic] [--verbose]\n\n\
         Built-in puzzles:\n  - {}\n\nIndex kinds:\n  - {}",
        scenarios::names().join("\n  - "),
        IndexKind::ALL.map(IndexKind::name).join("\n  - ")
    );
    std::process::exit(2);
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(2);
}

fn value<'a>(args: &mut impl Iterator<Item = &'a String>, flag: &str) -> &'a str {
    args.next()
        .map(String::as_str)
        .unwrap_or_else(|| fail(format!("{flag} needs a value")))
}

fn parse_threads(s: &str) -> Option<(usize, usize)> {
    let (f, r) = s.split_once(',')?;
    Some((f.trim().parse().ok()?, r.trim().parse().ok()?))
}

/// `Some(None)` for no limit (zero or negative), `None` when `s` is not a representable duration.
fn parse_timeout(s: &str) -> Option<Option<Duration>> {
    let secs: f64 = s.trim().parse().ok()?;
    if secs.is_nan() {
        return None;
    }
    if secs <= 0.0 {
        return Some(None);
    }
    Duration::try_from_secs_f64(secs).ok().map(Some)
}

fn load(name: &str) -> Puzzle {
    match scenarios::by_name(name) {
        Ok(Some(p)) => return p,
        Ok(None) => {}
        Err(e) => fail(format!("built-in puzzle {name}: {e}")),
    }
    let text = std::fs::read_to_string(name).unwrap_or_else(|e| {
        eprintln!("{name}: not a built-in puzzle and not readable ({e})");
        usage()
    });
    Puzzle::parse(&text).unwrap_or_else(|e| fail(format!("{name}: {e}")))
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let name = &args[1];
    let mut config = SolverConfig::default();
    let mut exit = ExitConditions::default();
    let mut verbose = false;
    let mut rest = args[2..].iter();
    while let Some(flag) = rest.next() {
        match flag.as_str() {
            "--mode" => {
                config.mode = value(&mut rest, flag)
                    .parse::<SolverMode>()
                    .unwrap_or_else(|e| fail(e));
            }
            "--index" => {
                config.index = value(&mut rest, flag)
                    .parse::<IndexKind>()
                    .unwrap_or_else(|e| fail(e));
            }
            "--threads" => {
                let (f, r) = parse_threads(value(&mut rest, flag))
                    .unwrap_or_else(|| fail("--threads expects F,R (e.g. 2,2)"));
                config = config.with_threads(f, r);
            }
            "--timeout" => {
                exit.duration = parse_timeout(value(&mut rest, flag))
                    .unwrap_or_else(|| fail("--timeout expects a finite number of seconds"));
            }
            "--nodes" => {
                let n: u64 = value(&mut rest, flag)
                    .parse()
                    .unwrap_or_else(|_| fail("--nodes expects a count"));
                exit.total_nodes = Some(n);
            }
            "--no-dynamic" => config.dynamic_deadlocks = false,
            "--verbose" | "-v" => verbose = true,
            _ => usage(),
        }
    }
    config.exit = exit;

    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let puzzle = load(name);
    let result = solve(&puzzle, &config).unwrap_or_else(|e| fail(e));
    let report = SolutionReport::new(name, &puzzle, &config, &result);
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => fail(format!("failed to serialize report: {e}")),
    }
    if !result.is_solved() {
        std::process::exit(1);
    }
}
