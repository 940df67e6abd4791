//! Evaluation of built-in functions.
//!
//! `evaluate` folds every `Op` whose arguments are literals, bottom-up.
//! Terms that are still symbolic are left in place; only genuinely
//! undefined operations (division by zero, overflow, ill-sorted literal
//! arguments) are errors.

use smallvec::SmallVec;

use crate::error::{EngineError, EngineResult};
use crate::subst::{apply_subst, Subst};
use crate::term::{Op, Term, TermId, TermStore};

/// Evaluate every built-in application in `term` that can be evaluated.
pub fn evaluate(term: TermId, terms: &TermStore) -> EngineResult<TermId> {
    let Some(resolved) = terms.resolve(term) else {
        return Ok(term);
    };
    match resolved {
        Term::Var(_) | Term::Int(_) | Term::Bool(_) => Ok(term),
        Term::Op(op, args) => {
            let mut evaluated: SmallVec<[TermId; 2]> = SmallVec::new();
            for arg in args.iter() {
                evaluated.push(evaluate(*arg, terms)?);
            }
            fold(op, &evaluated, terms)
        }
        other => {
            let kids = other.children();
            let mut evaluated: SmallVec<[TermId; 4]> = SmallVec::with_capacity(kids.len());
            let mut changed = false;
            for kid in kids.iter() {
                let e = evaluate(*kid, terms)?;
                changed |= e != *kid;
                evaluated.push(e);
            }
            if changed {
                Ok(terms.with_children(&other, evaluated))
            } else {
                Ok(term)
            }
        }
    }
}

/// Apply `subst` and evaluate the result.
pub fn substitute_and_evaluate(term: TermId, subst: &Subst, terms: &TermStore) -> EngineResult<TermId> {
    evaluate(apply_subst(term, subst, terms), terms)
}

/// A value contains neither variables nor unevaluated functions.
pub fn is_value(term: TermId, terms: &TermStore) -> bool {
    match terms.resolve(term) {
        Some(Term::Var(_)) | Some(Term::Op(_, _)) | None => false,
        Some(other) => other.children().iter().all(|kid| is_value(*kid, terms)),
    }
}

fn fold(op: Op, args: &[TermId], terms: &TermStore) -> EngineResult<TermId> {
    if args.len() != op.arity() {
        return Err(EngineError::evaluation(format!(
            "{} expects {} arguments, got {}",
            op.symbol(),
            op.arity(),
            args.len()
        )));
    }
    let rebuild = || terms.op(op, args.iter().copied().collect());
    let lits: SmallVec<[Option<Term>; 2]> = args.iter().map(|a| terms.resolve(*a)).collect();

    match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let (a, b) = match (&lits[0], &lits[1]) {
                (Some(Term::Int(a)), Some(Term::Int(b))) => (*a, *b),
                (Some(Term::Bool(_)), _) | (_, Some(Term::Bool(_))) => {
                    return Err(EngineError::evaluation(format!(
                        "{} applied to a boolean",
                        op.symbol()
                    )))
                }
                _ => return Ok(rebuild()),
            };
            let overflow = || EngineError::evaluation(format!("integer overflow in {} {} {}", a, op.symbol(), b));
            let result = match op {
                Op::Add => terms.int(a.checked_add(b).ok_or_else(overflow)?),
                Op::Sub => terms.int(a.checked_sub(b).ok_or_else(overflow)?),
                Op::Mul => terms.int(a.checked_mul(b).ok_or_else(overflow)?),
                Op::Div | Op::Mod if b == 0 => {
                    return Err(EngineError::evaluation(format!("division by zero in {} {} 0", a, op.symbol())))
                }
                Op::Div => terms.int(a.checked_div(b).ok_or_else(overflow)?),
                Op::Mod => terms.int(a.checked_rem(b).ok_or_else(overflow)?),
                Op::Lt => terms.bool(a < b),
                Op::Le => terms.bool(a <= b),
                Op::Gt => terms.bool(a > b),
                _ => terms.bool(a >= b),
            };
            Ok(result)
        }
        Op::Eq | Op::Ne => {
            let equal = if args[0] == args[1] {
                Some(true)
            } else if is_value(args[0], terms) && is_value(args[1], terms) {
                // Hash-consing makes structural equality of values id equality.
                Some(false)
            } else {
                None
            };
            Ok(match equal {
                Some(eq) => terms.bool(if op == Op::Eq { eq } else { !eq }),
                None => rebuild(),
            })
        }
        Op::And | Op::Or => {
            let absorbing = op == Op::Or;
            match (&lits[0], &lits[1]) {
                (Some(Term::Bool(a)), _) if *a == absorbing => Ok(terms.bool(absorbing)),
                (_, Some(Term::Bool(b))) if *b == absorbing => Ok(terms.bool(absorbing)),
                (Some(Term::Bool(_)), _) => Ok(args[1]),
                (_, Some(Term::Bool(_))) => Ok(args[0]),
                (Some(Term::Int(_)), _) | (_, Some(Term::Int(_))) => Err(EngineError::evaluation(
                    format!("{} applied to an integer", op.symbol()),
                )),
                _ => Ok(rebuild()),
            }
        }
        Op::Not => match &lits[0] {
            Some(Term::Bool(b)) => Ok(terms.bool(!b)),
            Some(Term::Op(Op::Not, inner)) if inner.len() == 1 => Ok(inner[0]),
            Some(Term::Int(_)) => Err(EngineError::evaluation("notBool applied to an integer")),
            _ => Ok(rebuild()),
        },
    }
}

#[cfg(test)]
#[path = "tests/eval.rs"]
mod tests;
