//! Exit-condition checks shared by the coordinators.
//!
//! The tracker is polled between evaluations, never inside one, so a node's successor batch is
//! always completed before a limit takes effect.

use std::time::Instant;

use tracing::info;

use super::{ExitResult, Statistics, StopReason};
use crate::config::ExitConditions;

pub struct LimitTracker<'a> {
    exit: &'a ExitConditions,
    started: Instant,
}

impl<'a> LimitTracker<'a> {
    #[inline]
    pub fn new(exit: &'a ExitConditions, started: Instant) -> Self {
        Self { exit, started }
    }

    /// The exit a tripped limit demands, if any. Cancellation wins over the budgets.
    pub fn check(&self, stats: &Statistics) -> Option<ExitResult> {
        if self.exit.cancel.is_cancelled() {
            info!("solve cancelled");
            return Some(ExitResult::Stopped(StopReason::Cancelled));
        }
        if let Some(limit) = self.exit.duration {
            if self.started.elapsed() >= limit {
                info!(?limit, "time limit reached");
                return Some(ExitResult::TimeOut);
            }
        }
        let total = stats.total();
        if let Some(limit) = self.exit.total_nodes {
            if total.evaluated >= limit {
                info!(limit, observed = total.evaluated, "node limit reached");
                return Some(ExitResult::Stopped(StopReason::NodeLimit));
            }
        }
        if let Some(limit) = self.exit.total_dead {
            if total.dead >= limit {
                info!(limit, observed = total.dead, "dead-move limit reached");
                return Some(ExitResult::Stopped(StopReason::DeadLimit));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn node_limit_stops() {
        let exit = ExitConditions {
            total_nodes: Some(5),
            ..ExitConditions::unlimited()
        };
        let tracker = LimitTracker::new(&exit, Instant::now());
        let mut stats = Statistics::default();
        stats.forward.evaluated = 3;
        assert_eq!(tracker.check(&stats), None);
        stats.reverse.evaluated = 2;
        assert_eq!(
            tracker.check(&stats),
            Some(ExitResult::Stopped(StopReason::NodeLimit))
        );
    }

    #[test]
    fn zero_duration_times_out_immediately() {
        let exit = ExitConditions {
            duration: Some(Duration::ZERO),
            ..ExitConditions::unlimited()
        };
        let tracker = LimitTracker::new(&exit, Instant::now());
        assert_eq!(tracker.check(&Statistics::default()), Some(ExitResult::TimeOut));
    }

    #[test]
    fn cancellation_wins() {
        let exit = ExitConditions {
            duration: Some(Duration::ZERO),
            ..ExitConditions::unlimited()
        };
        exit.cancel.cancel();
        let tracker = LimitTracker::new(&exit, Instant::now());
        assert_eq!(
            tracker.check(&Statistics::default()),
            Some(ExitResult::Stopped(StopReason::Cancelled))
        );
    }
}
