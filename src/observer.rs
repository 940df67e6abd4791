//! Hooks around individual rule attempts.

use parking_lot::Mutex;

use crate::constraint::ConstrainedTerm;
use crate::rule::{Rule, RuleId};

/// Result of attempting one rule against one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The rule produced this many results.
    Applied(usize),
    /// Unification failed or every result was pruned.
    Failed,
}

impl AttemptOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, AttemptOutcome::Applied(_))
    }
}

/// Called by the step engine at the start and end of every attempt.
/// Attempts of one class may run concurrently.
pub trait RuleObserver: Send + Sync {
    fn attempt_started(&self, _rule: &Rule, _subject: &ConstrainedTerm) {}

    fn attempt_finished(&self, rule: &Rule, subject: &ConstrainedTerm, outcome: AttemptOutcome);
}

/// One audited attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub subject: ConstrainedTerm,
    pub outcome: AttemptOutcome,
}

/// Records every attempt of a single rule.
#[derive(Debug)]
pub struct AuditObserver {
    rule: RuleId,
    records: Mutex<Vec<AuditRecord>>,
}

impl AuditObserver {
    pub fn new(rule: RuleId) -> Self {
        Self {
            rule,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn successes(&self) -> usize {
        self.records.lock().iter().filter(|r| r.outcome.is_success()).count()
    }
}

impl RuleObserver for AuditObserver {
    fn attempt_finished(&self, rule: &Rule, subject: &ConstrainedTerm, outcome: AttemptOutcome) {
        if rule.id != self.rule {
            return;
        }

        #[cfg(feature = "tracing")]
        crate::trace::debug!(rule = %rule.describe(), ?outcome, "audit");

        self.records.lock().push(AuditRecord {
            subject: subject.clone(),
            outcome,
        });
    }
}
