//! Solver statistics.
//!
//! Counters maintained by the constraint-solving layer and read by
//! reporting components. Updates are lock-free so solver workers can bump
//! them concurrently with a prepared repository in use.
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct SolverStats {
    query_cache_hits: AtomicU64,
    query_cache_misses: AtomicU64,
    cex_cache_hits: AtomicU64,
    cex_cache_misses: AtomicU64,
    query_constructs: AtomicU64,
    queries: AtomicU64,
    queries_valid: AtomicU64,
    queries_invalid: AtomicU64,
    solver_queries: AtomicU64,
    counterexamples: AtomicU64,
    query_time_us: AtomicU64,
    cex_cache_time_us: AtomicU64,
}

/// Point-in-time copy of [`SolverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStatsSnapshot {
    pub query_cache_hits: u64,
    pub query_cache_misses: u64,
    pub cex_cache_hits: u64,
    pub cex_cache_misses: u64,
    pub query_constructs: u64,
    pub queries: u64,
    pub queries_valid: u64,
    pub queries_invalid: u64,
    pub solver_queries: u64,
    pub counterexamples: u64,
    pub query_time_us: u64,
    pub cex_cache_time_us: u64,
}

impl SolverStatsSnapshot {
    pub fn query_time(&self) -> Duration {
        Duration::from_micros(self.query_time_us)
    }

    /// Fraction of query-cache lookups that hit, if any lookup happened.
    pub fn query_cache_hit_rate(&self) -> Option<f64> {
        let total = self.query_cache_hits + self.query_cache_misses;
        (total > 0).then(|| self.query_cache_hits as f64 / total as f64)
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl SolverStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one query-cache lookup.
    pub fn record_query_cache(&self, hit: bool) {
        bump(if hit {
            &self.query_cache_hits
        } else {
            &self.query_cache_misses
        });
    }

    /// Record one counterexample-cache lookup and the time it took.
    pub fn record_cex_cache(&self, hit: bool, elapsed: Duration) {
        bump(if hit {
            &self.cex_cache_hits
        } else {
            &self.cex_cache_misses
        });
        self.cex_cache_time_us
            .fetch_add(micros(elapsed), Ordering::Relaxed);
    }

    pub fn record_query_construct(&self) {
        bump(&self.query_constructs);
    }

    /// Record a query answered by the solver; `valid` is `None` when the
    /// query was not a validity check.
    pub fn record_query(&self, valid: Option<bool>, elapsed: Duration) {
        bump(&self.queries);
        match valid {
            Some(true) => bump(&self.queries_valid),
            Some(false) => bump(&self.queries_invalid),
            None => {}
        }
        self.query_time_us.fetch_add(micros(elapsed), Ordering::Relaxed);
    }

    /// Record a query that reached the underlying solver.
    pub fn record_solver_query(&self) {
        bump(&self.solver_queries);
    }

    pub fn record_counterexample(&self) {
        bump(&self.counterexamples);
    }

    pub fn snapshot(&self) -> SolverStatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        SolverStatsSnapshot {
            query_cache_hits: load(&self.query_cache_hits),
            query_cache_misses: load(&self.query_cache_misses),
            cex_cache_hits: load(&self.cex_cache_hits),
            cex_cache_misses: load(&self.cex_cache_misses),
            query_constructs: load(&self.query_constructs),
            queries: load(&self.queries),
            queries_valid: load(&self.queries_valid),
            queries_invalid: load(&self.queries_invalid),
            solver_queries: load(&self.solver_queries),
            counterexamples: load(&self.counterexamples),
            query_time_us: load(&self.query_time_us),
            cex_cache_time_us: load(&self.cex_cache_time_us),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = SolverStats::new();
        stats.record_query_cache(true);
        stats.record_query_cache(false);
        stats.record_query_cache(true);
        stats.record_query(Some(true), Duration::from_millis(2));
        stats.record_query(Some(false), Duration::from_micros(500));
        stats.record_query(None, Duration::ZERO);
        stats.record_cex_cache(false, Duration::from_micros(10));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.query_cache_hits, 2);
        assert_eq!(snapshot.query_cache_misses, 1);
        assert_eq!(snapshot.queries, 3);
        assert_eq!((snapshot.queries_valid, snapshot.queries_invalid), (1, 1));
        assert_eq!(snapshot.query_time(), Duration::from_micros(2500));
        assert_eq!(snapshot.cex_cache_misses, 1);
        assert_eq!(snapshot.cex_cache_time_us, 10);
        assert_eq!(snapshot.query_cache_hit_rate(), Some(2.0 / 3.0));
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let stats = Arc::new(SolverStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_solver_query();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().solver_queries, 8000);
        assert_eq!(SolverStats::new().snapshot().query_cache_hit_rate(), None);
    }
}
