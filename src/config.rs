//! Solve configuration: search mode, threading, index choice, budgets and the error taxonomy.
//!
//! [`SolverConfig::default`] is a reasonable single-threaded forward search. Budgets live in
//! [`ExitConditions`]; tripping one ends the solve with a `TimeOut`/`Stopped` exit rather than an
//! error.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arena::{ArenaError, NodeId, SearchDirection};
use crate::core::bitmap::BitmapError;
use crate::index::{IndexError, IndexKind, IndexOptions};
use crate::puzzle::PuzzleError;
use crate::solver::Statistics;

/// Shared cooperative-cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Budgets checked by the coordinator between node evaluations.
///
/// `None` disables a limit. Tripping `duration` ends the solve with `TimeOut`; the node and dead
/// limits and the cancel token end it with `Stopped`.
#[derive(Debug, Clone)]
pub struct ExitConditions {
    pub duration: Option<Duration>,
    /// Evaluated nodes, both directions together.
    pub total_nodes: Option<u64>,
    /// Pruned pushes/pulls, both directions together.
    pub total_dead: Option<u64>,
    pub stop_on_solution: bool,
    pub cancel: CancelToken,
}

impl Default for ExitConditions {
    fn default() -> Self {
        Self {
            duration: Some(Duration::from_secs(60)),
            total_nodes: None,
            total_dead: None,
            stop_on_solution: true,
            cancel: CancelToken::new(),
        }
    }
}

impl ExitConditions {
    /// No budgets at all; the solve runs until a solution or exhaustion.
    pub fn unlimited() -> Self {
        Self {
            duration: None,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverMode {
    #[default]
    Forward,
    Reverse,
    /// Forward and reverse searches that stop when their frontiers meet.
    Bidirectional,
}

impl SolverMode {
    pub fn runs(self, direction: SearchDirection) -> bool {
        match self {
            SolverMode::Forward => direction == SearchDirection::Forward,
            SolverMode::Reverse => direction == SearchDirection::Reverse,
            SolverMode::Bidirectional => true,
        }
    }
}

impl fmt::Display for SolverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SolverMode::Forward => "forward",
            SolverMode::Reverse => "reverse",
            SolverMode::Bidirectional => "bidirectional",
        })
    }
}

impl FromStr for SolverMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" | "fwd" => Ok(SolverMode::Forward),
            "reverse" | "rev" => Ok(SolverMode::Reverse),
            "bidirectional" | "both" => Ok(SolverMode::Bidirectional),
            _ => Err(format!(
                "unknown mode {s:?}; expected forward, reverse or bidirectional"
            )),
        }
    }
}

/// How evaluations are scheduled onto threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Threading {
    /// Everything on the calling thread. Bidirectional mode alternates the two directions.
    #[default]
    Single,
    /// Dedicated worker threads per direction plus the calling thread as coordinator.
    /// Counts for a direction the mode does not run are ignored.
    Multi { forward: usize, reverse: usize },
}

/// Receives aggregated statistics on the coordinator thread.
pub type ProgressSink = Arc<dyn Fn(&Statistics) + Send + Sync>;

#[derive(Clone)]
pub struct SolverConfig {
    pub mode: SolverMode,
    pub threading: Threading,
    pub index: IndexKind,
    pub index_options: IndexOptions,
    /// Node capacity of each direction's arena.
    pub arena_capacity: usize,
    /// Prune pushes that freeze a 2×2 block of walls and crates.
    pub dynamic_deadlocks: bool,
    /// Evaluations between exit checks in single-threaded modes.
    pub check_interval: u64,
    /// Coordinator tick in multi-threaded mode; also the progress reporting period.
    pub progress_interval: Duration,
    /// How long stopped workers get to finish their current node before the solve is aborted.
    pub grace_period: Duration,
    pub exit: ExitConditions,
    pub progress: Option<ProgressSink>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            mode: SolverMode::Forward,
            threading: Threading::Single,
            index: IndexKind::OptimisticTree,
            index_options: IndexOptions::default(),
            arena_capacity: 1_000_000,
            dynamic_deadlocks: true,
            check_interval: 256,
            progress_interval: Duration::from_millis(250),
            grace_period: Duration::from_secs(2),
            exit: ExitConditions::default(),
            progress: None,
        }
    }
}

impl SolverConfig {
    pub fn with_mode(mut self, mode: SolverMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_threads(mut self, forward: usize, reverse: usize) -> Self {
        self.threading = Threading::Multi { forward, reverse };
        self
    }

    pub fn with_index(mut self, index: IndexKind) -> Self {
        self.index = index;
        self
    }

    pub fn with_arena_capacity(mut self, capacity: usize) -> Self {
        self.arena_capacity = capacity;
        self
    }

    pub fn with_exit(mut self, exit: ExitConditions) -> Self {
        self.exit = exit;
        self
    }

    pub fn with_progress(mut self, sink: impl Fn(&Statistics) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }

    pub fn with_dynamic_deadlocks(mut self, enabled: bool) -> Self {
        self.dynamic_deadlocks = enabled;
        self
    }

    /// Worker threads per direction, `(0, 0)` when single-threaded.
    pub fn worker_counts(&self) -> (usize, usize) {
        match self.threading {
            Threading::Single => (0, 0),
            Threading::Multi { forward, reverse } => (
                if self.mode.runs(SearchDirection::Forward) { forward } else { 0 },
                if self.mode.runs(SearchDirection::Reverse) { reverse } else { 0 },
            ),
        }
    }
}

impl fmt::Debug for SolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverConfig")
            .field("mode", &self.mode)
            .field("threading", &self.threading)
            .field("index", &self.index)
            .field("index_options", &self.index_options)
            .field("arena_capacity", &self.arena_capacity)
            .field("dynamic_deadlocks", &self.dynamic_deadlocks)
            .field("check_interval", &self.check_interval)
            .field("progress_interval", &self.progress_interval)
            .field("grace_period", &self.grace_period)
            .field("exit", &self.exit)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// A failure captured inside one worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFault {
    pub worker: usize,
    pub direction: SearchDirection,
    pub message: String,
}

impl fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} worker {}: {}", self.direction, self.worker, self.message)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolverError {
    #[error("invalid puzzle: {0}")]
    InvalidPuzzle(#[from] PuzzleError),
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Bitmap(#[from] BitmapError),
    /// A state was reached by both directions through the index of one of them.
    #[error("node {candidate} duplicates {existing} from the opposite search direction")]
    ChainedSolutionUnsupported { candidate: NodeId, existing: NodeId },
    /// Forward and reverse halves that should meet do not form a valid move sequence.
    #[error("cannot stitch a path: {reason}")]
    Stitch { reason: String },
    #[error("{} worker(s) failed: {}", .0.len(), join_faults(.0))]
    WorkerFaults(Vec<WorkerFault>),
    #[error("{count} worker(s) did not stop within {grace:?}")]
    WorkersUnresponsive { count: usize, grace: Duration },
}

fn join_faults(faults: &[WorkerFault]) -> String {
    faults
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
