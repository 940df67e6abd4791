//! One rewrite step: candidate rules, equivalence classes, rule attempts
//! and the disabled-rule bookkeeping for the produced states.
//!
//! Classes are consumed in order and the first class that yields a result
//! ends the step. Every rule of a class is attempted against the same
//! subject, so attempts are independent and may run in parallel; results
//! are always reported in class order.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::builder::{build_pattern, build_result, rule_substitution, unify_pattern, EvalCtx};
use crate::config::EngineConfig;
use crate::constraint::ConstrainedTerm;
use crate::definition::Definition;
use crate::error::EngineResult;
use crate::metrics::EngineMetrics;
use crate::observer::{AttemptOutcome, RuleObserver};
use crate::rule::{Rule, RuleId};
use crate::strategy::RuleClass;
use crate::subst::Subst;

#[cfg(feature = "tracing")]
use crate::trace::{debug_span, trace};

/// Rules known to be inapplicable to a state without re-matching.
pub type DisabledRules = FxHashMap<ConstrainedTerm, FxHashSet<RuleId>>;

/// A successor state with the rule that produced it and the rule-side
/// match substitution.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ConstrainedTerm,
    pub rule: Arc<Rule>,
    pub subst: Subst,
}

#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    /// Successors in class order. Empty when the subject is stuck.
    pub transitions: Vec<Transition>,
    /// Whether the contributing class is a transition class.
    pub transition_class: bool,
    /// Rules disabled on each successor.
    pub disabled: DisabledRules,
}

impl StepOutcome {
    pub fn is_stuck(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Move the disabled set of the successor `produced` into `disabled`
    /// under `state`. Callers pass only the states they go on to explore,
    /// keyed the way they will look them up.
    pub fn carry_to(&mut self, produced: &ConstrainedTerm, state: &ConstrainedTerm, disabled: &mut DisabledRules) {
        if let Some(rules) = self.disabled.remove(produced) {
            disabled.insert(state.clone(), rules);
        }
    }
}

/// Borrowed view of everything a step needs.
#[derive(Clone, Copy)]
pub struct StepEngine<'a> {
    definition: &'a Definition,
    config: &'a EngineConfig,
    ctx: EvalCtx<'a>,
    metrics: &'a EngineMetrics,
    observer: Option<&'a dyn RuleObserver>,
}

impl<'a> StepEngine<'a> {
    pub fn new(
        definition: &'a Definition,
        config: &'a EngineConfig,
        ctx: EvalCtx<'a>,
        metrics: &'a EngineMetrics,
    ) -> Self {
        Self {
            definition,
            config,
            ctx,
            metrics,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Option<&'a dyn RuleObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn ctx(&self) -> EvalCtx<'a> {
        self.ctx
    }

    /// Step `subject`, skipping the rules in `disabled`.
    ///
    /// With `single_result` at most one transition is returned: the first
    /// result of the first rule that applies.
    pub fn step(
        &self,
        subject: &ConstrainedTerm,
        disabled: &FxHashSet<RuleId>,
        single_result: bool,
    ) -> EngineResult<StepOutcome> {
        #[cfg(feature = "tracing")]
        let _span = debug_span!("step", single_result).entered();

        self.metrics.record_step();
        let candidates = self.definition.candidate_rules(subject, self.ctx.terms);
        let total = candidates.len();
        let candidates: Vec<Arc<Rule>> = candidates.into_iter().filter(|r| !disabled.contains(&r.id)).collect();
        self.metrics.record_disabled_skips(total - candidates.len());

        let mut failed: Vec<Arc<Rule>> = Vec::new();
        for class in self.definition.partition(candidates) {
            let mut transitions = Vec::new();
            for (rule, results) in self.attempt_class(subject, &class, single_result)? {
                if results.is_empty() {
                    failed.push(rule);
                } else {
                    transitions.extend(results);
                }
            }
            if transitions.is_empty() {
                continue;
            }
            if single_result {
                transitions.truncate(1);
            }

            #[cfg(feature = "tracing")]
            trace!(results = transitions.len(), transition = class.transition, "step_done");

            let disabled = self.carry_disabled(&transitions, &failed, disabled);
            return Ok(StepOutcome {
                transitions,
                transition_class: class.transition,
                disabled,
            });
        }

        #[cfg(feature = "tracing")]
        trace!("step_stuck");

        Ok(StepOutcome::default())
    }

    /// Step `subject` with the disabled set recorded for it in `disabled`,
    /// which is removed. Successor sets stay in the outcome.
    pub fn step_from(
        &self,
        subject: &ConstrainedTerm,
        disabled: &mut DisabledRules,
        single_result: bool,
    ) -> EngineResult<StepOutcome> {
        let own = disabled.remove(subject).unwrap_or_default();
        self.step(subject, &own, single_result)
    }

    /// Step `subject` with the disabled set recorded for it in `disabled`,
    /// then record the sets of the successors.
    pub fn step_threaded(
        &self,
        subject: &ConstrainedTerm,
        disabled: &mut DisabledRules,
        single_result: bool,
    ) -> EngineResult<StepOutcome> {
        let outcome = self.step_from(subject, disabled, single_result)?;
        for (state, rules) in outcome.disabled.iter() {
            disabled.insert(state.clone(), rules.clone());
        }
        Ok(outcome)
    }

    /// Attempt every rule of `class`; in single-result mode stop at the
    /// first success. Output follows class order.
    fn attempt_class(
        &self,
        subject: &ConstrainedTerm,
        class: &RuleClass,
        single_result: bool,
    ) -> EngineResult<Vec<(Arc<Rule>, Vec<Transition>)>> {
        if !single_result && self.config.parallel_enabled() && class.rules.len() > 1 {
            return self.attempt_class_parallel(subject, class);
        }

        let mut out = Vec::with_capacity(class.rules.len());
        for rule in class.rules.iter() {
            let results = self.attempt(subject, rule, single_result)?;
            let applied = !results.is_empty();
            out.push((rule.clone(), results));
            if single_result && applied {
                break;
            }
        }
        Ok(out)
    }

    #[cfg(feature = "parallel")]
    fn attempt_class_parallel(
        &self,
        subject: &ConstrainedTerm,
        class: &RuleClass,
    ) -> EngineResult<Vec<(Arc<Rule>, Vec<Transition>)>> {
        use rayon::prelude::*;

        class
            .rules
            .par_iter()
            .map(|rule| self.attempt(subject, rule, false).map(|results| (rule.clone(), results)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn attempt_class_parallel(
        &self,
        subject: &ConstrainedTerm,
        class: &RuleClass,
    ) -> EngineResult<Vec<(Arc<Rule>, Vec<Transition>)>> {
        class
            .rules
            .iter()
            .map(|rule| self.attempt(subject, rule, false).map(|results| (rule.clone(), results)))
            .collect()
    }

    /// Apply one rule to the subject. Non-matching and pruning are ordinary
    /// failures; evaluation errors carry the rule's location.
    fn attempt(&self, subject: &ConstrainedTerm, rule: &Arc<Rule>, single_result: bool) -> EngineResult<Vec<Transition>> {
        if let Some(observer) = self.observer {
            observer.attempt_started(rule, subject);
        }
        self.metrics.record_attempt();

        let results = self
            .attempt_inner(subject, rule, single_result)
            .map_err(|e| e.add_trace_frame(format!("while evaluating rule at {}", rule.location)))?;

        let outcome = if results.is_empty() {
            self.metrics.record_failure();
            AttemptOutcome::Failed
        } else {
            self.metrics.record_application(rule.id);
            AttemptOutcome::Applied(results.len())
        };

        #[cfg(feature = "tracing")]
        trace!(rule = %rule.describe(), ?outcome, "rule_attempt");

        if let Some(observer) = self.observer {
            observer.attempt_finished(rule, subject, outcome);
        }
        Ok(results)
    }

    fn attempt_inner(
        &self,
        subject: &ConstrainedTerm,
        rule: &Arc<Rule>,
        single_result: bool,
    ) -> EngineResult<Vec<Transition>> {
        let pattern = build_pattern(rule);
        let mut out = Vec::new();
        for (constraint, _exact) in unify_pattern(subject, &pattern, self.ctx)? {
            let subst = rule_substitution(rule, &constraint, self.ctx.terms);
            match build_result(rule, constraint, Some(subject.term()), true, self.ctx)? {
                Some(state) => {
                    out.push(Transition {
                        state,
                        rule: rule.clone(),
                        subst,
                    });
                    if single_result {
                        break;
                    }
                }
                None => self.metrics.record_pruned(),
            }
        }
        Ok(out)
    }

    /// Rules that stay inapplicable on each successor: those that failed in
    /// this step or were disabled on the subject, and read none of the
    /// cells the applied rule writes.
    fn carry_disabled(
        &self,
        transitions: &[Transition],
        failed: &[Arc<Rule>],
        disabled: &FxHashSet<RuleId>,
    ) -> DisabledRules {
        let mut out = DisabledRules::default();
        if !self.config.incremental_matching {
            return out;
        }
        let inherited = disabled.iter().filter_map(|id| self.definition.rule(*id));
        let candidates: Vec<&Arc<Rule>> = failed.iter().chain(inherited).collect();

        for t in transitions {
            let Some(writes) = t.rule.write_cells() else {
                continue;
            };
            let carried: FxHashSet<RuleId> = candidates
                .iter()
                .filter(|r| r.id != t.rule.id)
                .filter(|r| {
                    r.read_cells()
                        .map_or(false, |reads| reads.iter().all(|c| !writes.contains(c)))
                })
                .map(|r| r.id)
                .collect();
            if !carried.is_empty() {
                out.entry(t.state.clone()).or_default().extend(carried);
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "tests/step.rs"]
mod tests;
