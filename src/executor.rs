//! Execution of compiled right-hand sides against the subject's cells.

use smallvec::SmallVec;

use crate::error::{EngineError, EngineResult};
use crate::eval::substitute_and_evaluate;
use crate::rule::{BuildInstruction, FastRewrite};
use crate::subst::Subst;
use crate::term::{Term, TermId, TermStore};

pub trait RuleExecutor: Send + Sync {
    /// Build the result of a fast rule from the subject's top-level cell
    /// collection and the match substitution.
    fn apply_build_instructions(
        &self,
        subject: TermId,
        fast: &FastRewrite,
        subst: &Subst,
        terms: &TermStore,
    ) -> EngineResult<TermId>;
}

/// Rewrites only the cells named by `Replace` instructions; every other
/// item of the subject is reused as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct CellExecutor;

impl RuleExecutor for CellExecutor {
    fn apply_build_instructions(
        &self,
        subject: TermId,
        fast: &FastRewrite,
        subst: &Subst,
        terms: &TermStore,
    ) -> EngineResult<TermId> {
        let Some(Term::Bag(items)) = terms.resolve(subject) else {
            return Err(EngineError::evaluation(
                "compiled rule applied to a subject that is not a cell collection",
            ));
        };

        let mut out: SmallVec<[TermId; 4]> = SmallVec::with_capacity(items.len());
        for item in items {
            let replaced = match terms.resolve(item) {
                Some(Term::Cell(label, _)) => fast.instructions().iter().find_map(|i| match i {
                    BuildInstruction::Replace { cell, template } if *cell == label => Some((label, *template)),
                    _ => None,
                }),
                _ => None,
            };
            match replaced {
                Some((label, template)) => {
                    out.push(terms.cell(label, substitute_and_evaluate(template, subst, terms)?));
                }
                None => out.push(item),
            }
        }
        Ok(terms.bag(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleBuilder;
    use crate::term::{Op, Sort, Var};
    use crate::test_utils::setup;

    #[test]
    fn replaces_only_written_cells() {
        let (symbols, terms) = setup();
        let k = symbols.intern("k");
        let state = symbols.intern("state");
        let x = Var::new(0, Sort::Int);
        let rest = terms.var(1, Sort::Bag);
        let lhs = terms.bag([terms.cell(k, terms.var_term(x)), rest]);
        let rhs = terms.bag([terms.cell(k, terms.op2(Op::Add, terms.var_term(x), terms.int(1))), rest]);
        let rule = RuleBuilder::new(0, lhs, rhs).build(&terms);

        let untouched = terms.cell(state, terms.int(9));
        let subject = terms.bag([terms.cell(k, terms.int(1)), untouched]);
        let mut subst = Subst::new();
        subst.bind(x, terms.int(1));

        let out = CellExecutor
            .apply_build_instructions(subject, rule.fast().unwrap(), &subst, &terms)
            .unwrap();
        assert_eq!(out, terms.bag([terms.cell(k, terms.int(2)), untouched]));
    }

    #[test]
    fn non_bag_subject_is_an_error() {
        let (symbols, terms) = setup();
        let k = symbols.intern("k");
        let lhs = terms.bag([terms.cell(k, terms.int(0))]);
        let rhs = terms.bag([terms.cell(k, terms.int(1))]);
        let rule = RuleBuilder::new(0, lhs, rhs).build(&terms);
        let result = CellExecutor.apply_build_instructions(terms.int(0), rule.fast().unwrap(), &Subst::new(), &terms);
        assert!(result.is_err());
    }
}
