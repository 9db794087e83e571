//! Solve coordination.
//!
//! [`solve`] validates the puzzle, builds the static maps and one arena/index/backlog per active
//! direction, seeds the roots and hands over to a coordinator:
//!
//! - [`single`]: everything on the calling thread; bidirectional solves alternate directions;
//! - [`multi`]: worker threads per direction, the calling thread aggregates statistics, checks
//!   limits and drives cancellation.
//!
//! Validation failures are returned as `Err`. Anything that goes wrong once the search runs is
//! reported through [`ExitResult::Error`] together with the partial statistics and solutions.

mod limits;
mod multi;
pub mod path;
mod single;
mod stats;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::StaticMaps;
use crate::arena::{Arena, SearchDirection};
use crate::config::{SolverConfig, SolverError};
use crate::index::{self, NodeIndex};
use crate::puzzle::Puzzle;
use crate::search::{
    Backlog, Evaluation, Evaluator, Expander, ForwardExpander, Found, ReverseExpander,
};

pub use limits::LimitTracker;
pub use stats::{AtomicStats, DirectionStats, Statistics};

/// Why a solve was stopped before finding a solution or exhausting the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    Cancelled,
    NodeLimit,
    DeadLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitResult {
    Solution,
    /// A search direction ran out of nodes: the puzzle has no solution.
    ExhaustedTree,
    TimeOut,
    Stopped(StopReason),
    Error(SolverError),
    /// Workers did not stop within the grace period.
    Aborted(SolverError),
}

impl ExitResult {
    pub fn label(&self) -> &'static str {
        match self {
            ExitResult::Solution => "solution",
            ExitResult::ExhaustedTree => "exhausted-tree",
            ExitResult::TimeOut => "time-out",
            ExitResult::Stopped(_) => "stopped",
            ExitResult::Error(_) => "error",
            ExitResult::Aborted(_) => "aborted",
        }
    }

    pub fn error(&self) -> Option<&SolverError> {
        match self {
            ExitResult::Error(e) | ExitResult::Aborted(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ExitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitResult::Stopped(reason) => write!(f, "stopped ({reason:?})"),
            ExitResult::Error(e) => write!(f, "error: {e}"),
            ExitResult::Aborted(e) => write!(f, "aborted: {e}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Which search produced a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolutionOrigin {
    Forward,
    Reverse,
    /// The two frontiers met on a common state.
    Meeting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// LURD notation: lowercase steps, uppercase pushes.
    pub moves: String,
    pub pushes: usize,
    pub steps: usize,
    pub origin: SolutionOrigin,
}

impl Solution {
    fn new(moves: String, origin: SolutionOrigin) -> Self {
        let pushes = moves.chars().filter(char::is_ascii_uppercase).count();
        Self {
            steps: moves.len(),
            pushes,
            moves,
            origin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolverResult {
    pub exit: ExitResult,
    pub solutions: Vec<Solution>,
    pub statistics: Statistics,
}

impl SolverResult {
    pub fn is_solved(&self) -> bool {
        self.exit == ExitResult::Solution && !self.solutions.is_empty()
    }
}

/// Everything one search direction owns during a solve.
pub(crate) struct Side {
    pub evaluator: Evaluator,
    pub backlog: Backlog,
}

impl Side {
    #[inline]
    pub fn direction(&self) -> SearchDirection {
        self.evaluator.direction()
    }

    #[inline]
    pub fn arena(&self) -> &Arc<Arena> {
        self.evaluator.arena()
    }
}

/// Shared state of a running solve.
pub(crate) struct Search {
    pub maps: Arc<StaticMaps>,
    pub forward: Option<Arc<Side>>,
    pub reverse: Option<Arc<Side>>,
}

impl Search {
    fn build(maps: Arc<StaticMaps>, config: &SolverConfig) -> Self {
        let make_index = |d: SearchDirection| -> Option<(Arc<Arena>, Arc<dyn NodeIndex>)> {
            if !config.mode.runs(d) {
                return None;
            }
            let arena = Arc::new(Arena::new(d, config.arena_capacity));
            let idx = index::build(config.index, arena.clone(), &config.index_options);
            Some((arena, idx))
        };
        let fwd = make_index(SearchDirection::Forward);
        let rev = make_index(SearchDirection::Reverse);

        let side = |own: &Option<(Arc<Arena>, Arc<dyn NodeIndex>)>,
                    other: &Option<(Arc<Arena>, Arc<dyn NodeIndex>)>,
                    expander: Arc<dyn Expander>| {
            own.as_ref().map(|(arena, idx)| {
                Arc::new(Side {
                    evaluator: Evaluator::new(
                        expander,
                        arena.clone(),
                        idx.clone(),
                        other.as_ref().map(|(_, i)| i.clone()),
                    ),
                    backlog: Backlog::new(),
                })
            })
        };
        let forward = side(
            &fwd,
            &rev,
            Arc::new(ForwardExpander::new(maps.clone(), config.dynamic_deadlocks)),
        );
        let reverse = side(&rev, &fwd, Arc::new(ReverseExpander::new(maps.clone())));
        Self {
            maps,
            forward,
            reverse,
        }
    }

    pub fn sides(&self) -> impl Iterator<Item = &Arc<Side>> {
        self.forward.iter().chain(self.reverse.iter())
    }

    /// Seed the roots, forward first so reverse roots can probe the forward index.
    fn seed(&self, collector: &mut Collector) -> Result<(), SolverError> {
        for side in self.sides() {
            let seeded = side.evaluator.seed()?;
            side.backlog.push(seeded.attached.iter().copied());
            let stats = collector.stats.direction_mut(side.direction());
            let goals = seeded
                .found
                .iter()
                .filter(|f| matches!(f, Found::Goal(_)))
                .count() as u64;
            stats.attached += seeded.attached.len() as u64 + goals;
            stats.duplicates += seeded.duplicates;
            stats.solutions += seeded.found.len() as u64;
            collector.absorb(self, side.direction(), &seeded.found)?;
        }
        Ok(())
    }

    fn arena(&self, d: SearchDirection) -> Option<&Arc<Arena>> {
        match d {
            SearchDirection::Forward => self.forward.as_ref().map(|s| s.arena()),
            SearchDirection::Reverse => self.reverse.as_ref().map(|s| s.arena()),
        }
    }

    /// Render a found node (pair) into a solution and mark its chains.
    fn solution(&self, direction: SearchDirection, found: Found) -> Result<Solution, SolverError> {
        let missing = || SolverError::Stitch {
            reason: format!("no {direction} search is running"),
        };
        let (fwd, rev, origin) = match (direction, found) {
            (SearchDirection::Forward, Found::Goal(id)) => (Some(id), None, SolutionOrigin::Forward),
            (SearchDirection::Reverse, Found::Goal(id)) => (None, Some(id), SolutionOrigin::Reverse),
            (SearchDirection::Forward, Found::Meeting { here, there }) => {
                (Some(here), Some(there), SolutionOrigin::Meeting)
            }
            (SearchDirection::Reverse, Found::Meeting { here, there }) => {
                (Some(there), Some(here), SolutionOrigin::Meeting)
            }
        };
        let fwd = match fwd {
            Some(id) => Some((self.arena(SearchDirection::Forward).ok_or_else(missing)?, id)),
            None => None,
        };
        let rev = match rev {
            Some(id) => Some((self.arena(SearchDirection::Reverse).ok_or_else(missing)?, id)),
            None => None,
        };
        let moves = path::render(
            &self.maps,
            fwd.map(|(a, id)| (a.as_ref(), id)),
            rev.map(|(a, id)| (a.as_ref(), id)),
        )?;
        for (arena, id) in fwd.into_iter().chain(rev) {
            arena.mark_solution(id)?;
        }
        Ok(Solution::new(moves, origin))
    }
}

/// Solutions and statistics gathered by a coordinator.
#[derive(Default)]
pub(crate) struct Collector {
    pub solutions: Vec<Solution>,
    pub stats: Statistics,
}

impl Collector {
    pub fn record(&mut self, direction: SearchDirection, e: &Evaluation) {
        self.stats.direction_mut(direction).record(e);
    }

    pub fn absorb(
        &mut self,
        search: &Search,
        direction: SearchDirection,
        found: &[Found],
    ) -> Result<(), SolverError> {
        for &f in found {
            let solution = search.solution(direction, f)?;
            info!(
                origin = ?solution.origin,
                pushes = solution.pushes,
                steps = solution.steps,
                "solution found"
            );
            self.solutions.push(solution);
        }
        Ok(())
    }
}

/// Solve `puzzle` under `config`.
pub fn solve(puzzle: &Puzzle, config: &SolverConfig) -> Result<SolverResult, SolverError> {
    puzzle.validate()?;
    let maps = Arc::new(StaticMaps::new(puzzle)?);
    let started = Instant::now();
    let (fwd_workers, rev_workers) = config.worker_counts();
    info!(
        width = puzzle.width(),
        height = puzzle.height(),
        crates = maps.crate_start.count(),
        dead_squares = maps.dead_square.count(),
        mode = %config.mode,
        index = %config.index,
        fwd_workers,
        rev_workers,
        "solve started"
    );

    let search = Search::build(maps, config);
    let mut collector = Collector::default();
    let seeded = search.seed(&mut collector);

    let exit = match seeded {
        Err(e) => ExitResult::Error(e),
        Ok(()) if !collector.solutions.is_empty() && config.exit.stop_on_solution => {
            ExitResult::Solution
        }
        Ok(()) if fwd_workers + rev_workers == 0 => {
            single::run(&search, config, started, &mut collector)
        }
        Ok(()) => multi::run(&search, config, started, &mut collector),
    };

    // Limits and exhaustion do not hide solutions found on the way.
    let exit = match exit {
        ExitResult::ExhaustedTree | ExitResult::TimeOut | ExitResult::Stopped(_)
            if !collector.solutions.is_empty() =>
        {
            ExitResult::Solution
        }
        other => other,
    };

    collector.stats.stamp(started.elapsed());
    info!(
        exit = %exit,
        solutions = collector.solutions.len(),
        evaluated = collector.stats.total().evaluated,
        elapsed = ?collector.stats.elapsed,
        "solve finished"
    );
    Ok(SolverResult {
        exit,
        solutions: collector.solutions,
        statistics: collector.stats,
    })
}
