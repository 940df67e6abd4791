//! Per-invocation engine counters.
//!
//! Every `rewrite`, `search` and `prove_rule` call owns one `EngineMetrics`
//! and returns its `MetricsReport` with the outcome. Counters are atomics so
//! that parallel rule attempts can record into the same instance.
//!
//! ```rust,ignore
//! let metrics = EngineMetrics::new();
//! metrics.record_step();
//! println!("{}", metrics.report());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::rule::RuleId;

/// All counters use relaxed ordering; the report taken after the entry
/// point returns is exact.
pub struct EngineMetrics {
    started: Instant,
    /// Step engine invocations.
    pub steps: AtomicU64,
    /// Unification attempts of a rule against a subject.
    pub rule_attempts: AtomicU64,
    /// Attempts that produced no result.
    pub rule_failures: AtomicU64,
    /// Results discarded because their constraint was false or unsat.
    pub pruned: AtomicU64,
    /// Candidates skipped because they were disabled for the subject.
    pub disabled_skips: AtomicU64,
    /// Distinct states visited.
    pub states: AtomicU64,
    coverage: Mutex<FxHashMap<RuleId, u64>>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            steps: AtomicU64::new(0),
            rule_attempts: AtomicU64::new(0),
            rule_failures: AtomicU64::new(0),
            pruned: AtomicU64::new(0),
            disabled_skips: AtomicU64::new(0),
            states: AtomicU64::new(0),
            coverage: Mutex::new(FxHashMap::default()),
        }
    }

    #[inline]
    pub fn record_step(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_attempt(&self) {
        self.rule_attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.rule_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_pruned(&self) {
        self.pruned.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_disabled_skips(&self, n: usize) {
        self.disabled_skips.fetch_add(n as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_state(&self) {
        self.states.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one application of `rule`.
    pub fn record_application(&self, rule: RuleId) {
        *self.coverage.lock().entry(rule).or_insert(0) += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Snapshot of all counters.
    pub fn report(&self) -> MetricsReport {
        let mut coverage: Vec<(RuleId, u64)> = self.coverage.lock().iter().map(|(r, n)| (*r, *n)).collect();
        coverage.sort_unstable();
        MetricsReport {
            steps: self.steps.load(Ordering::Relaxed),
            rule_attempts: self.rule_attempts.load(Ordering::Relaxed),
            rule_failures: self.rule_failures.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            disabled_skips: self.disabled_skips.load(Ordering::Relaxed),
            states: self.states.load(Ordering::Relaxed),
            elapsed_micros: self.elapsed().as_micros() as u64,
            coverage,
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    pub steps: u64,
    pub rule_attempts: u64,
    pub rule_failures: u64,
    pub pruned: u64,
    pub disabled_skips: u64,
    pub states: u64,
    pub elapsed_micros: u64,
    /// Applications per rule, sorted by rule id.
    pub coverage: Vec<(RuleId, u64)>,
}

impl MetricsReport {
    pub fn success_rate(&self) -> f64 {
        if self.rule_attempts == 0 {
            1.0
        } else {
            (self.rule_attempts - self.rule_failures) as f64 / self.rule_attempts as f64
        }
    }

    pub fn applications(&self, rule: RuleId) -> u64 {
        self.coverage
            .iter()
            .find(|(r, _)| *r == rule)
            .map_or(0, |(_, n)| *n)
    }

    /// The one-line `[states, steps, elapsed]` summary.
    pub fn summary(&self) -> String {
        format!(
            "[{} states, {} steps, {:.3}ms]",
            self.states,
            self.steps,
            self.elapsed_micros as f64 / 1000.0
        )
    }
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Engine Metrics ===")?;
        writeln!(f, "Steps:              {}", self.steps)?;
        writeln!(f, "States:             {}", self.states)?;
        writeln!(
            f,
            "Rule attempts:      {} ({} failures, {:.1}% success)",
            self.rule_attempts,
            self.rule_failures,
            self.success_rate() * 100.0
        )?;
        writeln!(f, "Pruned results:     {}", self.pruned)?;
        writeln!(f, "Disabled skips:     {}", self.disabled_skips)?;
        writeln!(f, "Elapsed:            {}us", self.elapsed_micros)?;
        for (rule, n) in self.coverage.iter() {
            writeln!(f, "  rule {:<12} {}", rule.to_string(), n)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/metrics.rs"]
mod tests;
