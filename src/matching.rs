//! One-way matching: only pattern variables may be bound.
//!
//! The subject's variables are treated as constants. Used by search to test
//! states against a target pattern and by the prover to decide whether a
//! claim or the target covers a state.

use crate::eval::substitute_and_evaluate;
use crate::error::EngineResult;
use crate::subst::Subst;
use crate::term::{Op, Term, TermId, TermStore};
use crate::unify::{solve, Unification};

#[cfg(feature = "tracing")]
use crate::trace::{debug_span, trace};

/// Match `pattern` against `subject`. The returned substitution binds
/// pattern variables only; residual pairs still mention them.
pub fn match_pattern(subject: TermId, pattern: TermId, terms: &TermStore) -> Option<Unification> {
    #[cfg(feature = "tracing")]
    let _span = debug_span!("match_pattern", ?subject, ?pattern).entered();

    let rigid = terms.variables(subject);
    let found = solve(subject, pattern, &rigid, terms);

    #[cfg(feature = "tracing")]
    trace!(matched = found.is_some(), "match_pattern_done");

    found
}

/// Conditions that must hold for a match to be valid: the residual pairs
/// as equalities, instantiated and evaluated.
pub fn residual_conditions(found: &Unification, terms: &TermStore) -> EngineResult<Vec<TermId>> {
    let mut out = Vec::with_capacity(found.residual.len());
    for (a, b) in found.residual.iter() {
        let eq = terms.op2(Op::Eq, *a, *b);
        out.push(substitute_and_evaluate(eq, &found.subst, terms)?);
    }
    Ok(out)
}

/// Instantiate and evaluate side conditions under a match.
pub fn instantiate_conditions(
    conditions: &[TermId],
    subst: &Subst,
    terms: &TermStore,
) -> EngineResult<Vec<TermId>> {
    conditions
        .iter()
        .map(|c| substitute_and_evaluate(*c, subst, terms))
        .collect()
}

/// Is an evaluated condition literally true?
pub fn holds(condition: TermId, terms: &TermStore) -> bool {
    matches!(terms.resolve(condition), Some(Term::Bool(true)))
}

/// Is an evaluated condition literally false?
pub fn fails(condition: TermId, terms: &TermStore) -> bool {
    matches!(terms.resolve(condition), Some(Term::Bool(false)))
}

#[cfg(test)]
#[path = "tests/matching.rs"]
mod tests;
