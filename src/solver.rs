//! Constraint solving seam.
//!
//! The engine only ever asks two questions: is a conjunction unsatisfiable,
//! and does a conjunction entail a goal. `BoundsSolver` answers them for
//! integer interval constraints over single variables, which is what the
//! guard and path conditions of counter-style definitions reduce to.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::term::{Op, Sort, Term, TermId, TermStore, Var};

#[cfg(feature = "tracing")]
use crate::trace::trace;

pub trait Solver: Send + Sync {
    /// `true` only if the conjunction of `predicates` is certainly
    /// unsatisfiable. Unknown means satisfiable.
    fn check_unsat(&self, predicates: &[TermId], terms: &TermStore) -> bool;

    /// `true` only if `premises` certainly entail `goal`.
    fn entails(&self, premises: &[TermId], goal: TermId, terms: &TermStore) -> bool {
        if premises.contains(&goal) {
            return true;
        }
        let mut refutation = premises.to_vec();
        refutation.push(terms.not(goal));
        self.check_unsat(&refutation, terms)
    }
}

/// Interval reasoning over `var (+|-) const  <op>  const` atoms.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundsSolver;

#[derive(Debug, Default, Clone)]
struct Interval {
    lo: Option<i64>,
    hi: Option<i64>,
    excluded: SmallVec<[i64; 2]>,
}

impl Interval {
    fn raise(&mut self, lo: i64) {
        self.lo = Some(self.lo.map_or(lo, |l| l.max(lo)));
    }

    fn lower(&mut self, hi: i64) {
        self.hi = Some(self.hi.map_or(hi, |h| h.min(hi)));
    }

    fn is_empty(&self) -> bool {
        match (self.lo, self.hi) {
            (Some(lo), Some(hi)) if lo > hi => true,
            (Some(lo), Some(hi)) if lo == hi => self.excluded.contains(&lo),
            _ => false,
        }
    }
}

/// A linear atom over one variable: `var + offset`.
fn linear(term: TermId, terms: &TermStore) -> Option<(Var, i64)> {
    match terms.resolve(term)? {
        Term::Var(v) if v.sort == Sort::Int => Some((v, 0)),
        Term::Op(Op::Add, args) => match (terms.resolve(*args.first()?)?, terms.resolve(*args.get(1)?)?) {
            (Term::Var(v), Term::Int(c)) | (Term::Int(c), Term::Var(v)) if v.sort == Sort::Int => Some((v, c)),
            _ => None,
        },
        Term::Op(Op::Sub, args) => match (terms.resolve(*args.first()?)?, terms.resolve(*args.get(1)?)?) {
            (Term::Var(v), Term::Int(c)) if v.sort == Sort::Int => Some((v, c.checked_neg()?)),
            _ => None,
        },
        _ => None,
    }
}

fn constant(term: TermId, terms: &TermStore) -> Option<i64> {
    match terms.resolve(term)? {
        Term::Int(c) => Some(c),
        _ => None,
    }
}

fn mirror(op: Op) -> Op {
    match op {
        Op::Lt => Op::Gt,
        Op::Le => Op::Ge,
        Op::Gt => Op::Lt,
        Op::Ge => Op::Le,
        other => other,
    }
}

fn negate(op: Op) -> Option<Op> {
    Some(match op {
        Op::Lt => Op::Ge,
        Op::Le => Op::Gt,
        Op::Gt => Op::Le,
        Op::Ge => Op::Lt,
        Op::Eq => Op::Ne,
        Op::Ne => Op::Eq,
        _ => return None,
    })
}

impl BoundsSolver {
    /// Record `var + offset <op> c`; returns false when the atom is not
    /// representable.
    fn record(
        bounds: &mut FxHashMap<Var, Interval>,
        op: Op,
        (var, offset): (Var, i64),
        c: i64,
    ) -> bool {
        let Some(c) = c.checked_sub(offset) else {
            return false;
        };
        let entry = bounds.entry(var).or_default();
        match op {
            Op::Lt => c.checked_sub(1).map(|h| entry.lower(h)).is_some(),
            Op::Le => {
                entry.lower(c);
                true
            }
            Op::Gt => c.checked_add(1).map(|l| entry.raise(l)).is_some(),
            Op::Ge => {
                entry.raise(c);
                true
            }
            Op::Eq => {
                entry.raise(c);
                entry.lower(c);
                true
            }
            Op::Ne => {
                entry.excluded.push(c);
                true
            }
            _ => false,
        }
    }

    /// Fold one predicate into the interval map. Returns `true` if the
    /// predicate alone is contradictory.
    fn absorb(
        bounds: &mut FxHashMap<Var, Interval>,
        seen: &mut Vec<(TermId, bool)>,
        predicate: TermId,
        positive: bool,
        terms: &TermStore,
    ) -> bool {
        if seen.contains(&(predicate, !positive)) {
            return true;
        }
        seen.push((predicate, positive));

        let Some(term) = terms.resolve(predicate) else {
            return false;
        };
        match term {
            Term::Bool(b) => b != positive,
            Term::Op(Op::Not, args) => match args.as_slice() {
                [inner] => Self::absorb(bounds, seen, *inner, !positive, terms),
                _ => false,
            },
            Term::Op(Op::And, args) if positive => args
                .iter()
                .any(|a| Self::absorb(bounds, seen, *a, true, terms)),
            Term::Op(Op::Or, args) if !positive => args
                .iter()
                .any(|a| Self::absorb(bounds, seen, *a, false, terms)),
            Term::Op(op, args) if args.len() == 2 => {
                let Some(op) = (if positive { Some(op) } else { negate(op) }) else {
                    return false;
                };
                match (linear(args[0], terms), constant(args[1], terms)) {
                    (Some(atom), Some(c)) => {
                        Self::record(bounds, op, atom, c);
                    }
                    _ => {
                        if let (Some(c), Some(atom)) = (constant(args[0], terms), linear(args[1], terms)) {
                            Self::record(bounds, mirror(op), atom, c);
                        }
                    }
                }
                false
            }
            _ => false,
        }
    }
}

impl Solver for BoundsSolver {
    fn check_unsat(&self, predicates: &[TermId], terms: &TermStore) -> bool {
        let mut bounds: FxHashMap<Var, Interval> = FxHashMap::default();
        let mut seen = Vec::with_capacity(predicates.len());
        for p in predicates {
            if Self::absorb(&mut bounds, &mut seen, *p, true, terms) {
                #[cfg(feature = "tracing")]
                trace!(predicate = ?p, "bounds_contradiction");
                return true;
            }
        }
        let empty = bounds.values().any(Interval::is_empty);

        #[cfg(feature = "tracing")]
        trace!(vars = bounds.len(), unsat = empty, "bounds_checked");

        empty
    }
}
