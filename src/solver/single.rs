use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::{Collector, ExitResult, LimitTracker, Search, Side};
use crate::config::SolverConfig;

/// Run every active direction on the calling thread, one evaluation each in turn.
///
/// With a single direction this is a plain breadth-first search. Exits and progress are checked
/// every `check_interval` evaluations.
pub(super) fn run(
    search: &Search,
    config: &SolverConfig,
    started: Instant,
    collector: &mut Collector,
) -> ExitResult {
    let limits = LimitTracker::new(&config.exit, started);
    let sides: Vec<&Arc<Side>> = search.sides().collect();
    let interval = config.check_interval.max(1);
    let mut evaluated: u64 = 0;
    let mut last_progress = Instant::now();

    loop {
        for side in &sides {
            let direction = side.direction();
            let Some(id) = side.backlog.try_pop() else {
                debug!(%direction, "search tree exhausted");
                return ExitResult::ExhaustedTree;
            };
            let e = match side.evaluator.evaluate(id) {
                Ok(e) => e,
                Err(err) => {
                    warn!(%direction, node = %id, error = %err, "evaluation failed");
                    return ExitResult::Error(err);
                }
            };
            side.backlog.push(e.attached.iter().copied());
            collector.record(direction, &e);
            if let Err(err) = collector.absorb(search, direction, &e.found) {
                return ExitResult::Error(err);
            }
            if !e.found.is_empty() && config.exit.stop_on_solution {
                return ExitResult::Solution;
            }

            evaluated += 1;
            if evaluated % interval == 0 {
                collector.stats.stamp(started.elapsed());
                if let Some(exit) = limits.check(&collector.stats) {
                    return exit;
                }
                if let Some(sink) = &config.progress {
                    if last_progress.elapsed() >= config.progress_interval {
                        sink(&collector.stats);
                        last_progress = Instant::now();
                    }
                }
            }
        }
    }
}
