//! Reachability proofs: show that every path from an initial pattern
//! reaches a target pattern, using proven claims as circularities.
//!
//! The first round steps the initial term with the semantics only. From
//! then on a state covered by a claim is rewritten by that
//! rule instead of being stepped, and a state whose continuation has the
//! target's shape over the same frame variable is closed coinductively.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::builder::{build_pattern, build_result, EvalCtx};
use crate::constraint::ConstrainedTerm;
use crate::error::EngineResult;
use crate::metrics::{EngineMetrics, MetricsReport};
use crate::rewriter::SymbolicRewriter;
use crate::rule::Rule;
use crate::step::DisabledRules;
use crate::symbol::Label;
use crate::term::{TermId, TermStore};
use crate::unify::unify;

#[cfg(feature = "tracing")]
use crate::trace::{debug, info_span, trace};

/// Decides whether two continuation prefixes describe the same
/// computations.
pub trait Matchability: Send + Sync {
    /// `Some(true)` when they certainly match, `Some(false)` when they
    /// certainly do not, `None` when undecided.
    fn matchable(&self, left: TermId, right: TermId, terms: &TermStore) -> Option<bool>;
}

/// Prefixes match when they unify with no residual equalities left.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnifyMatchability;

impl Matchability for UnifyMatchability {
    fn matchable(&self, left: TermId, right: TermId, terms: &TermStore) -> Option<bool> {
        match unify(left, right, terms) {
            None => Some(false),
            Some(found) if found.is_exact() => Some(true),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProofOutcome {
    /// States that got stuck without reaching the target, plus the
    /// unexplored frontier when fuel ran out.
    pub obligations: Vec<ConstrainedTerm>,
    /// States closed by a matching continuation frame.
    pub closed: Vec<ConstrainedTerm>,
    /// Whether the round limit stopped the proof.
    pub exhausted: bool,
    pub rounds: usize,
    pub metrics: MetricsReport,
}

impl ProofOutcome {
    pub fn is_proved(&self) -> bool {
        self.obligations.is_empty() && !self.exhausted
    }
}

impl SymbolicRewriter {
    /// Try to prove that every path from `initial` reaches `target`.
    ///
    /// `fuel` limits the number of breadth-first rounds; `None` runs until
    /// the frontier is empty.
    pub fn prove_rule(
        &self,
        initial: &ConstrainedTerm,
        target: &ConstrainedTerm,
        spec_rules: &[Arc<Rule>],
        fuel: Option<usize>,
    ) -> EngineResult<ProofOutcome> {
        #[cfg(feature = "tracing")]
        let _span = info_span!("prove_rule", specs = spec_rules.len(), ?fuel).entered();

        let terms = self.terms();
        let ctx = self.ctx();
        let metrics = EngineMetrics::new();
        let engine = self.engine(&metrics);
        let k_cell = self.definition().k_cell();

        let initial = initial.expand(terms)?;
        let initial_vars = initial.variables(terms);
        let mut visited: FxHashSet<ConstrainedTerm> = FxHashSet::default();
        visited.insert(initial.clone());
        metrics.record_state();

        let mut outcome = ProofOutcome::default();
        let mut disabled = DisabledRules::default();
        let mut queue = vec![initial];
        let mut guarded = false;

        while !queue.is_empty() {
            if fuel.map_or(false, |f| outcome.rounds >= f) {
                outcome.exhausted = true;
                outcome.obligations.extend(queue);
                break;
            }
            outcome.rounds += 1;

            let mut next = Vec::new();
            for term in queue.drain(..) {
                if term.implies(target, ctx.solver, terms)? {
                    #[cfg(feature = "tracing")]
                    trace!("reached_target");
                    continue;
                }
                if self.frames_match(&term, target, k_cell) {
                    outcome.closed.push(term);
                    continue;
                }

                if guarded {
                    if let Some(result) = apply_spec_rules(&term, spec_rules, ctx)? {
                        if visited.insert(result.clone()) {
                            metrics.record_state();
                            next.push(result);
                        }
                        continue;
                    }
                }

                let mut step = engine.step_from(&term, &mut disabled, false)?;
                if step.is_stuck() {
                    outcome.obligations.push(term);
                    continue;
                }
                for transition in std::mem::take(&mut step.transitions) {
                    let (result, constraint) = transition.state.clone().into_parts();
                    let constraint = constraint.remove_bindings(|v| !initial_vars.contains(&v));
                    let result = ConstrainedTerm::new(result, constraint);
                    if visited.insert(result.clone()) {
                        metrics.record_state();
                        step.carry_to(&transition.state, &result, &mut disabled);
                        next.push(result);
                    }
                }
            }

            #[cfg(feature = "tracing")]
            debug!(round = outcome.rounds, frontier = next.len(), obligations = outcome.obligations.len(), "proof_round");

            queue = next;
            guarded = true;
        }

        outcome.metrics = metrics.report();
        Ok(outcome)
    }

    /// Do `term` and `target` share the continuation frame variable, with
    /// prefixes that certainly match?
    fn frames_match(&self, term: &ConstrainedTerm, target: &ConstrainedTerm, k_cell: Label) -> bool {
        let terms = self.terms();
        let (left, right) = match (
            terms.cell_contents(term.term(), k_cell).as_slice(),
            terms.cell_contents(target.term(), k_cell).as_slice(),
        ) {
            ([left], [right]) => (*left, *right),
            _ => return false,
        };
        let (left_prefix, left_frame) = terms.split_frame(left);
        let (right_prefix, right_frame) = terms.split_frame(right);
        left_frame.is_some()
            && left_frame == right_frame
            && self.matchability().matchable(left_prefix, right_prefix, terms) == Some(true)
    }
}

/// Rewrite `term` with the first claim whose pattern it
/// falls under.
fn apply_spec_rules(
    term: &ConstrainedTerm,
    spec_rules: &[Arc<Rule>],
    ctx: EvalCtx<'_>,
) -> EngineResult<Option<ConstrainedTerm>> {
    for rule in spec_rules {
        let pattern = build_pattern(rule);
        let Some(constraint) = term.match_implies(&pattern, ctx.solver, ctx.terms)? else {
            continue;
        };
        if let Some(result) = build_result(rule, constraint, None, true, ctx)? {
            #[cfg(feature = "tracing")]
            trace!(rule = %rule.describe(), "circularity_applied");
            return Ok(Some(result));
        }
    }
    Ok(None)
}

#[cfg(test)]
#[path = "tests/prover.rs"]
mod tests;
