use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::arena::SearchDirection;
use crate::search::{Evaluation, Found};

/// Counters of one search direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionStats {
    /// Nodes expanded.
    pub evaluated: u64,
    /// Nodes linked into the tree, roots included.
    pub attached: u64,
    pub duplicates: u64,
    /// Moves pruned by dead-square or freeze checks.
    pub dead: u64,
    /// Expanded nodes without any valid move.
    pub dead_ends: u64,
    pub solutions: u64,
}

impl DirectionStats {
    pub fn record(&mut self, e: &Evaluation) {
        let c = Counts::of(e);
        self.evaluated += c.evaluated;
        self.attached += c.attached;
        self.duplicates += c.duplicates;
        self.dead += c.dead;
        self.dead_ends += c.dead_ends;
        self.solutions += c.solutions;
    }

    pub fn merge(&mut self, other: &DirectionStats) {
        self.evaluated += other.evaluated;
        self.attached += other.attached;
        self.duplicates += other.duplicates;
        self.dead += other.dead;
        self.dead_ends += other.dead_ends;
        self.solutions += other.solutions;
    }
}

/// Per-evaluation deltas.
struct Counts {
    evaluated: u64,
    attached: u64,
    duplicates: u64,
    dead: u64,
    dead_ends: u64,
    solutions: u64,
}

impl Counts {
    fn of(e: &Evaluation) -> Self {
        let goals = e
            .found
            .iter()
            .filter(|f| matches!(f, Found::Goal(_)))
            .count() as u64;
        Counts {
            evaluated: 1,
            attached: e.attached.len() as u64 + goals,
            duplicates: e.duplicates,
            dead: e.dead,
            dead_ends: u64::from(e.dead_end),
            solutions: e.found.len() as u64,
        }
    }
}

/// Aggregated statistics handed to the progress sink and returned with the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub forward: DirectionStats,
    pub reverse: DirectionStats,
    pub elapsed: Duration,
    /// Evaluations per second over `elapsed`, both directions.
    pub nodes_per_sec: f64,
}

impl Statistics {
    pub fn direction(&self, d: SearchDirection) -> &DirectionStats {
        match d {
            SearchDirection::Forward => &self.forward,
            SearchDirection::Reverse => &self.reverse,
        }
    }

    pub fn direction_mut(&mut self, d: SearchDirection) -> &mut DirectionStats {
        match d {
            SearchDirection::Forward => &mut self.forward,
            SearchDirection::Reverse => &mut self.reverse,
        }
    }

    pub fn total(&self) -> DirectionStats {
        let mut t = self.forward;
        t.merge(&self.reverse);
        t
    }

    /// Stamp the elapsed time and derive the rate.
    pub fn stamp(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
        let secs = elapsed.as_secs_f64();
        self.nodes_per_sec = if secs > 0.0 {
            self.total().evaluated as f64 / secs
        } else {
            0.0
        };
    }
}

/// Lock-free counters owned by one worker thread and read by the coordinator.
#[derive(Debug, Default)]
pub struct AtomicStats {
    evaluated: AtomicU64,
    attached: AtomicU64,
    duplicates: AtomicU64,
    dead: AtomicU64,
    dead_ends: AtomicU64,
    solutions: AtomicU64,
}

impl AtomicStats {
    pub fn record(&self, e: &Evaluation) {
        let c = Counts::of(e);
        self.evaluated.fetch_add(c.evaluated, Ordering::Relaxed);
        self.attached.fetch_add(c.attached, Ordering::Relaxed);
        self.duplicates.fetch_add(c.duplicates, Ordering::Relaxed);
        self.dead.fetch_add(c.dead, Ordering::Relaxed);
        self.dead_ends.fetch_add(c.dead_ends, Ordering::Relaxed);
        self.solutions.fetch_add(c.solutions, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DirectionStats {
        DirectionStats {
            evaluated: self.evaluated.load(Ordering::Relaxed),
            attached: self.attached.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            dead: self.dead.load(Ordering::Relaxed),
            dead_ends: self.dead_ends.load(Ordering::Relaxed),
            solutions: self.solutions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::NodeId;

    fn evaluation() -> Evaluation {
        Evaluation {
            attached: vec![NodeId(1), NodeId(2)],
            found: vec![Found::Goal(NodeId(3))],
            duplicates: 4,
            dead: 5,
            dead_end: false,
        }
    }

    #[test]
    fn plain_and_atomic_counters_agree() {
        let mut plain = DirectionStats::default();
        let atomic = AtomicStats::default();
        for _ in 0..3 {
            plain.record(&evaluation());
            atomic.record(&evaluation());
        }
        assert_eq!(plain, atomic.snapshot());
        assert_eq!(plain.attached, 9);
        assert_eq!(plain.evaluated, 3);
    }

    #[test]
    fn rate_is_zero_without_elapsed_time() {
        let mut s = Statistics::default();
        s.forward.evaluated = 10;
        s.stamp(Duration::ZERO);
        assert_eq!(s.nodes_per_sec, 0.0);
        s.stamp(Duration::from_secs(2));
        assert_eq!(s.nodes_per_sec, 5.0);
    }
}
