//! Rule patterns and rule results.
//!
//! `build_pattern` turns a rule's left-hand side and conditions into a
//! constrained term; `unify_pattern` intersects it with a subject; and
//! `build_result` materializes the right-hand side under the resulting
//! constraint. All three are pure apart from the fresh-value generator.

use smallvec::SmallVec;

use crate::constraint::{ConjunctiveFormula, ConstrainedTerm};
use crate::error::EngineResult;
use crate::eval::substitute_and_evaluate;
use crate::executor::RuleExecutor;
use crate::fresh::FreshGenerator;
use crate::rule::Rule;
use crate::solver::Solver;
use crate::subst::{apply_subst, Subst};
use crate::symbol::SymbolStore;
use crate::term::{TermId, TermStore, Var};
use crate::unify::unify;

#[cfg(feature = "tracing")]
use crate::trace::trace;

/// The collaborators a rule application needs. Cheap to copy and shareable
/// across threads.
#[derive(Clone, Copy)]
pub struct EvalCtx<'a> {
    pub terms: &'a TermStore,
    pub symbols: &'a SymbolStore,
    pub solver: &'a dyn Solver,
    pub fresh: &'a dyn FreshGenerator,
    pub executor: &'a dyn RuleExecutor,
}

/// `lhs` constrained by the rule's lookups and `requires`.
pub fn build_pattern(rule: &Rule) -> ConstrainedTerm {
    let constraint = rule
        .lookups
        .iter()
        .fold(ConjunctiveFormula::top(), |f, (a, b)| f.add_equality(*a, *b))
        .add_all(rule.requires.iter().copied());
    ConstrainedTerm::new(rule.lhs, constraint)
}

/// Unify `subject` with `pattern` and conjoin both constraints.
///
/// Yields `(constraint, exact)` for every satisfiable unifier; `exact` is
/// false when unevaluated functions were left as residual equalities.
pub fn unify_pattern(
    subject: &ConstrainedTerm,
    pattern: &ConstrainedTerm,
    ctx: EvalCtx<'_>,
) -> EngineResult<SmallVec<[(ConjunctiveFormula, bool); 1]>> {
    let mut out = SmallVec::new();
    let Some(found) = unify(subject.term(), pattern.term(), ctx.terms) else {
        return Ok(out);
    };
    let constraint = subject
        .constraint()
        .clone()
        .and(pattern.constraint())
        .add_unification(&found)
        .simplify(ctx.terms)?;
    if constraint.is_false() || constraint.check_unsat(ctx.solver, ctx.terms) {
        #[cfg(feature = "tracing")]
        trace!("unify_pattern_unsat");
        return Ok(out);
    }
    out.push((constraint, found.is_exact()));
    Ok(out)
}

/// Variables consumed by a rule application: fresh placeholders and
/// variables bound by matching.
fn substituted_vars(rule: &Rule) -> SmallVec<[Var; 8]> {
    let mut vars: SmallVec<[Var; 8]> = rule.fresh_constants.iter().copied().collect();
    for v in rule.matching_vars() {
        if !vars.contains(v) {
            vars.push(*v);
        }
    }
    vars
}

/// The unifier seen from the rule's side: bindings of its matching
/// variables after orienting them as keys.
pub fn rule_substitution(rule: &Rule, constraint: &ConjunctiveFormula, terms: &TermStore) -> Subst {
    constraint
        .clone()
        .orient_substitution(rule.matching_vars(), terms)
        .substitution()
        .restrict(rule.matching_vars())
}

/// Materialize `rule`'s right-hand side under `constraint`.
///
/// `subject` is the term the rule matched; it is required for the fast
/// path. Returns `None` when the result is pruned.
pub fn build_result(
    rule: &Rule,
    constraint: ConjunctiveFormula,
    subject: Option<TermId>,
    expand_pattern: bool,
    ctx: EvalCtx<'_>,
) -> EngineResult<Option<ConstrainedTerm>> {
    let terms = ctx.terms;

    let mut constraint = constraint;
    for var in rule.fresh_constants.iter() {
        let value = ctx.fresh.fresh(var.sort, terms, ctx.symbols)?;
        constraint = constraint.add_binding(*var, value);
    }
    constraint = constraint.add_all(rule.ensures.iter().copied()).simplify(terms)?;
    if expand_pattern && constraint.is_false() {
        return Ok(None);
    }

    let consumed = substituted_vars(rule);
    constraint = constraint.orient_substitution(&consumed, terms);
    let term = match (rule.fast(), subject) {
        (Some(fast), Some(subject)) => {
            ctx.executor
                .apply_build_instructions(subject, fast, constraint.substitution(), terms)?
        }
        _ => substitute_and_evaluate(rule.rhs, constraint.substitution(), terms)?,
    };

    constraint = constraint.remove_bindings(|v| consumed.contains(&v));

    let renaming = Subst::fresh_renaming(rule.variables(), terms);
    let term = apply_subst(term, &renaming, terms);
    let constraint = constraint.substitute(&renaming, terms).simplify(terms)?;

    if !expand_pattern {
        return Ok(Some(ConstrainedTerm::new(term, constraint)));
    }

    let term = substitute_and_evaluate(term, constraint.substitution(), terms)?;
    if constraint.is_false() || constraint.check_unsat(ctx.solver, terms) {
        #[cfg(feature = "tracing")]
        trace!(rule = %rule.describe(), "result_pruned");
        return Ok(None);
    }
    Ok(Some(ConstrainedTerm::new(term, constraint)))
}

#[cfg(test)]
#[path = "tests/builder.rs"]
mod tests;
