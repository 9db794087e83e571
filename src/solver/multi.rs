//! Multi-threaded coordination.
//!
//! Each active direction gets its own pool of OS threads sharing that direction's arena, index and
//! backlog. Workers only expand nodes and report what they find; the calling thread is the
//! coordinator. It polls for solutions, faults and exhaustion, aggregates the per-worker atomic
//! counters, feeds the progress sink and checks the exit conditions. On exit it raises the stop
//! flag and gives the workers `grace_period` to finish their current node.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{AtomicStats, Collector, ExitResult, LimitTracker, Search, Side, Statistics};
use crate::arena::SearchDirection;
use crate::config::{CancelToken, SolverConfig, SolverError, WorkerFault};
use crate::search::{Acquire, Found};

/// Coordinator polling period.
const TICK: Duration = Duration::from_millis(1);
/// Idle polls a worker spins through before it starts sleeping.
const IDLE_SPINS: u32 = 64;
const IDLE_SLEEP: Duration = Duration::from_micros(100);

#[derive(Default)]
struct Shared {
    stop: AtomicBool,
    found: Mutex<Vec<(SearchDirection, Found)>>,
    faults: Mutex<Vec<WorkerFault>>,
    forward_exhausted: AtomicBool,
    reverse_exhausted: AtomicBool,
}

impl Shared {
    fn exhausted(&self, d: SearchDirection) -> &AtomicBool {
        match d {
            SearchDirection::Forward => &self.forward_exhausted,
            SearchDirection::Reverse => &self.reverse_exhausted,
        }
    }

    fn any_exhausted(&self) -> bool {
        self.forward_exhausted.load(Ordering::Acquire)
            || self.reverse_exhausted.load(Ordering::Acquire)
    }

    fn halted(&self, cancel: &CancelToken) -> bool {
        self.stop.load(Ordering::Acquire) || cancel.is_cancelled()
    }
}

struct Worker {
    id: usize,
    direction: SearchDirection,
    stats: Arc<AtomicStats>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

fn work(
    id: usize,
    side: Arc<Side>,
    shared: Arc<Shared>,
    stats: Arc<AtomicStats>,
    cancel: CancelToken,
    stop_on_solution: bool,
) {
    let direction = side.direction();
    debug!(worker = id, %direction, "worker started");
    let mut idle = 0u32;
    while !shared.halted(&cancel) {
        match side.backlog.acquire() {
            Acquire::Node(node) => {
                idle = 0;
                match side.evaluator.evaluate(node) {
                    Ok(e) => {
                        side.backlog.push(e.attached.iter().copied());
                        stats.record(&e);
                        if !e.found.is_empty() {
                            shared
                                .found
                                .lock()
                                .extend(e.found.iter().map(|&f| (direction, f)));
                            if stop_on_solution {
                                shared.stop.store(true, Ordering::Release);
                            }
                        }
                        side.backlog.release();
                    }
                    Err(err) => {
                        side.backlog.release();
                        warn!(worker = id, %direction, node = %node, error = %err, "worker failed");
                        shared.faults.lock().push(WorkerFault {
                            worker: id,
                            direction,
                            message: err.to_string(),
                        });
                        shared.stop.store(true, Ordering::Release);
                        break;
                    }
                }
            }
            Acquire::Idle => {
                idle = idle.saturating_add(1);
                if idle < IDLE_SPINS {
                    thread::yield_now();
                } else {
                    thread::sleep(IDLE_SLEEP);
                }
            }
            Acquire::Exhausted => {
                shared.exhausted(direction).store(true, Ordering::Release);
                break;
            }
        }
    }
    debug!(worker = id, %direction, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

fn spawn_workers(search: &Search, config: &SolverConfig, shared: &Arc<Shared>) -> Vec<Worker> {
    let (forward, reverse) = config.worker_counts();
    let mut workers = Vec::new();
    for side in search.sides() {
        let direction = side.direction();
        // A running direction always gets at least one worker.
        let count = match direction {
            SearchDirection::Forward => forward,
            SearchDirection::Reverse => reverse,
        }
        .max(1);
        for _ in 0..count {
            let id = workers.len();
            let stats = Arc::new(AtomicStats::default());
            let spawned = {
                let side = side.clone();
                let shared = shared.clone();
                let stats = stats.clone();
                let cancel = config.exit.cancel.clone();
                let stop_on_solution = config.exit.stop_on_solution;
                thread::Builder::new()
                    .name(format!("{direction}-{id}"))
                    .spawn(move || work(id, side, shared, stats, cancel, stop_on_solution))
            };
            let handle = match spawned {
                Ok(h) => Some(h),
                Err(e) => {
                    shared.faults.lock().push(WorkerFault {
                        worker: id,
                        direction,
                        message: format!("spawn failed: {e}"),
                    });
                    shared.stop.store(true, Ordering::Release);
                    None
                }
            };
            workers.push(Worker {
                id,
                direction,
                stats,
                handle,
            });
        }
    }
    workers
}

fn aggregate(base: &Statistics, workers: &[Worker], elapsed: Duration) -> Statistics {
    let mut stats = base.clone();
    for w in workers {
        stats.direction_mut(w.direction).merge(&w.stats.snapshot());
    }
    stats.stamp(elapsed);
    stats
}

fn drain_found(
    search: &Search,
    shared: &Shared,
    collector: &mut Collector,
) -> Result<(), SolverError> {
    let found = std::mem::take(&mut *shared.found.lock());
    for (direction, f) in found {
        collector.absorb(search, direction, &[f])?;
    }
    Ok(())
}

pub(super) fn run(
    search: &Search,
    config: &SolverConfig,
    started: Instant,
    collector: &mut Collector,
) -> ExitResult {
    let shared = Arc::new(Shared::default());
    let mut workers = spawn_workers(search, config, &shared);
    info!(workers = workers.len(), "workers spawned");

    let base = collector.stats.clone();
    let limits = LimitTracker::new(&config.exit, started);
    let tick = TICK.min(config.progress_interval.max(Duration::from_micros(100)));
    let mut last_progress = Instant::now();

    // `None`: the outcome is decided by the faults collected at join time.
    let exit: Option<ExitResult> = loop {
        thread::sleep(tick);
        if let Err(e) = drain_found(search, &shared, collector) {
            break Some(ExitResult::Error(e));
        }
        if !collector.solutions.is_empty() && config.exit.stop_on_solution {
            break Some(ExitResult::Solution);
        }
        if !shared.faults.lock().is_empty() {
            break None;
        }
        if shared.any_exhausted() {
            break Some(ExitResult::ExhaustedTree);
        }

        collector.stats = aggregate(&base, &workers, started.elapsed());
        if let Some(exit) = limits.check(&collector.stats) {
            break Some(exit);
        }
        if let Some(sink) = &config.progress {
            if last_progress.elapsed() >= config.progress_interval {
                sink(&collector.stats);
                last_progress = Instant::now();
            }
        }
        // Only a panic ends a worker without a flag the checks above see.
        if workers.iter().any(Worker::is_finished) {
            break None;
        }
    };

    shared.stop.store(true, Ordering::Release);
    let deadline = Instant::now() + config.grace_period;
    while workers.iter().any(|w| !w.is_finished()) && Instant::now() < deadline {
        thread::sleep(TICK);
    }

    let mut panics = Vec::new();
    let mut unresponsive = 0;
    for w in &mut workers {
        if !w.is_finished() {
            unresponsive += 1;
            continue;
        }
        if let Some(handle) = w.handle.take() {
            if let Err(payload) = handle.join() {
                let message = panic_message(payload.as_ref());
                warn!(worker = w.id, direction = %w.direction, %message, "worker panicked");
                panics.push(WorkerFault {
                    worker: w.id,
                    direction: w.direction,
                    message,
                });
            }
        }
    }

    collector.stats = aggregate(&base, &workers, started.elapsed());
    let late = drain_found(search, &shared, collector);

    if unresponsive > 0 {
        warn!(unresponsive, grace = ?config.grace_period, "workers did not stop in time");
        return ExitResult::Aborted(SolverError::WorkersUnresponsive {
            count: unresponsive,
            grace: config.grace_period,
        });
    }
    let mut faults = std::mem::take(&mut *shared.faults.lock());
    faults.extend(panics);
    if !faults.is_empty() {
        return ExitResult::Error(SolverError::WorkerFaults(faults));
    }
    if let Err(e) = late {
        return ExitResult::Error(e);
    }
    // A worker can finish between the loop's checks; look again before giving up.
    exit.or_else(|| shared.any_exhausted().then_some(ExitResult::ExhaustedTree))
        .or_else(|| limits.check(&collector.stats))
        .unwrap_or(ExitResult::Error(SolverError::WorkerFaults(Vec::new())))
}
