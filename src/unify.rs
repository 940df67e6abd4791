use crate::subst::{apply_subst, Subst};
use crate::term::{Term, TermId, TermStore, Var};
use smallvec::SmallVec;

#[cfg(feature = "tracing")]
use crate::trace::{debug_span, trace};

/// Outcome of a successful unification.
///
/// `residual` holds pairs that could not be decided syntactically because
/// one side is an unevaluated built-in function; they become equalities in
/// the resulting constraint. A unification without residuals is exact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unification {
    pub subst: Subst,
    pub residual: SmallVec<[(TermId, TermId); 2]>,
}

impl Unification {
    pub fn is_exact(&self) -> bool {
        self.residual.is_empty()
    }
}

/// Unify two terms, returning a most general unifier if one exists.
///
/// Uses an explicit worklist to avoid recursion.
/// Implements occurs-check to prevent infinite terms and only binds a
/// variable to terms its sort admits.
pub fn unify(t1: TermId, t2: TermId, terms: &TermStore) -> Option<Unification> {
    #[cfg(feature = "tracing")]
    let _span = debug_span!("unify", ?t1, ?t2).entered();

    solve(t1, t2, &[], terms)
}

/// Solve `left = right` treating the variables in `rigid` as constants.
///
/// Unification passes no rigid variables; matching passes the subject's.
pub(crate) fn solve(left: TermId, right: TermId, rigid: &[Var], terms: &TermStore) -> Option<Unification> {
    let mut subst = Subst::new();
    let mut residual: SmallVec<[(TermId, TermId); 2]> = SmallVec::new();
    let mut worklist: SmallVec<[(TermId, TermId); 32]> = SmallVec::new();
    worklist.push((left, right));

    while let Some((a, b)) = worklist.pop() {
        let a = deref(a, &subst, terms);
        let b = deref(b, &subst, terms);
        if a == b {
            continue;
        }

        let (ta, tb) = match (terms.resolve(a), terms.resolve(b)) {
            (Some(ta), Some(tb)) => (ta, tb),
            _ => {
                #[cfg(feature = "tracing")]
                trace!("unify_invalid_term");
                return None;
            }
        };

        match (ta, tb) {
            (Term::Var(va), Term::Var(vb)) => {
                let a_free = !rigid.contains(&va) && va.sort.admits(vb.sort);
                let b_free = !rigid.contains(&vb) && vb.sort.admits(va.sort);
                // Prefer binding the higher-indexed variable for determinism
                match (a_free, b_free) {
                    (true, true) if va.index < vb.index => subst.bind(vb, a),
                    (true, _) => subst.bind(va, b),
                    (false, true) => subst.bind(vb, a),
                    (false, false) => {
                        #[cfg(feature = "tracing")]
                        trace!("unify_rigid_variables");
                        return None;
                    }
                }
            }
            (Term::Var(v), _) if !rigid.contains(&v) => {
                if !bind_checked(v, b, &mut subst, terms) {
                    return None;
                }
            }
            (_, Term::Var(v)) if !rigid.contains(&v) => {
                if !bind_checked(v, a, &mut subst, terms) {
                    return None;
                }
            }
            (Term::Op(_, _), _) | (_, Term::Op(_, _)) => residual.push((a, b)),
            (Term::App(f1, kids1), Term::App(f2, kids2)) => {
                if f1 != f2 || kids1.len() != kids2.len() {
                    #[cfg(feature = "tracing")]
                    trace!("unify_functor_mismatch");
                    return None;
                }
                for (c1, c2) in kids1.iter().zip(kids2.iter()) {
                    worklist.push((*c1, *c2));
                }
            }
            (Term::Cell(l1, c1), Term::Cell(l2, c2)) => {
                if l1 != l2 {
                    return None;
                }
                worklist.push((c1, c2));
            }
            (Term::Bag(_), Term::Bag(_)) => {
                if !unify_bags(a, b, rigid, &subst, &mut worklist, terms) {
                    #[cfg(feature = "tracing")]
                    trace!("unify_bag_mismatch");
                    return None;
                }
            }
            // A lone item is stored bare, so any item shape may face a sequence.
            (Term::KSeq(_), Term::KSeq(_))
            | (Term::KSeq(_), Term::App(..) | Term::Int(_) | Term::Bool(_) | Term::Var(_))
            | (Term::App(..) | Term::Int(_) | Term::Bool(_) | Term::Var(_), Term::KSeq(_)) => {
                if !unify_sequences(a, b, rigid, &subst, &mut worklist, terms) {
                    #[cfg(feature = "tracing")]
                    trace!("unify_sequence_mismatch");
                    return None;
                }
            }
            _ => {
                // Distinct literals, rigid variables, or unrelated shapes
                #[cfg(feature = "tracing")]
                trace!("unify_clash");
                return None;
            }
        }
    }

    subst.normalize(terms);
    for pair in residual.iter_mut() {
        pair.0 = apply_subst(pair.0, &subst, terms);
        pair.1 = apply_subst(pair.1, &subst, terms);
    }

    #[cfg(feature = "tracing")]
    trace!(bindings = subst.len(), residual = residual.len(), "unify_success");

    Some(Unification { subst, residual })
}

fn bind_checked(var: Var, term: TermId, subst: &mut Subst, terms: &TermStore) -> bool {
    let admitted = terms.sort_of(term).is_some_and(|s| var.sort.admits(s));
    if !admitted {
        #[cfg(feature = "tracing")]
        trace!(var = var.index, "unify_sort_mismatch");
        return false;
    }
    if occurs(var, term, subst, terms) {
        #[cfg(feature = "tracing")]
        trace!(var = var.index, "unify_occurs_check_failed");
        return false;
    }
    subst.bind(var, term);
    true
}

/// Pair cells of two collections by label. Cells left over on one side
/// are absorbed by the other side's rest variable.
fn unify_bags(
    a: TermId,
    b: TermId,
    rigid: &[Var],
    subst: &Subst,
    worklist: &mut SmallVec<[(TermId, TermId); 32]>,
    terms: &TermStore,
) -> bool {
    let (a_cells, a_rest) = match bag_parts(a, subst, terms) {
        Some(parts) => parts,
        None => return false,
    };
    let (b_cells, b_rest) = match bag_parts(b, subst, terms) {
        Some(parts) => parts,
        None => return false,
    };

    let mut used = vec![false; b_cells.len()];
    let mut a_left: SmallVec<[TermId; 4]> = SmallVec::new();
    for (a_cell, a_label) in a_cells.iter() {
        let partner = b_cells
            .iter()
            .enumerate()
            .position(|(i, (_, l))| !used[i] && l == a_label);
        match partner {
            Some(i) => {
                used[i] = true;
                worklist.push((*a_cell, b_cells[i].0));
            }
            None => a_left.push(*a_cell),
        }
    }
    let mut b_left: SmallVec<[TermId; 4]> = b_cells
        .iter()
        .zip(used.iter())
        .filter(|(_, u)| !**u)
        .map(|((c, _), _)| *c)
        .collect();

    // A rigid rest variable is an opaque item the other side must absorb.
    let a_rest = match a_rest {
        Some(v) if rigid.contains(&v) => {
            a_left.push(terms.var_term(v));
            None
        }
        other => other,
    };
    let b_rest = match b_rest {
        Some(v) if rigid.contains(&v) => {
            b_left.push(terms.var_term(v));
            None
        }
        other => other,
    };
    let a_rest_term = a_rest.map(|v| terms.var_term(v));
    let b_rest_term = b_rest.map(|v| terms.var_term(v));
    match (a_rest_term, b_rest_term) {
        (None, None) => a_left.is_empty() && b_left.is_empty(),
        (Some(ra), None) => {
            if !a_left.is_empty() {
                return false;
            }
            worklist.push((ra, leftover(&b_left, terms)));
            true
        }
        (None, Some(rb)) => {
            if !b_left.is_empty() {
                return false;
            }
            worklist.push((leftover(&a_left, terms), rb));
            true
        }
        (Some(ra), Some(rb)) => match (a_left.is_empty(), b_left.is_empty()) {
            (true, true) => {
                worklist.push((ra, rb));
                true
            }
            (true, false) => {
                worklist.push((ra, terms.bag(b_left.iter().copied().chain([rb]))));
                true
            }
            (false, true) => {
                worklist.push((terms.bag(a_left.iter().copied().chain([ra])), rb));
                true
            }
            // Both sides keep private cells: would need a shared fresh rest.
            (false, false) => false,
        },
    }
}

/// The bag of leftover items; a lone variable stands for itself.
fn leftover(items: &[TermId], terms: &TermStore) -> TermId {
    match items {
        [only] if terms.is_var(*only).is_some() => *only,
        _ => terms.bag(items.iter().copied()),
    }
}

/// Split a (dereferenced) bag into its cells with their labels and its
/// rest variable. Rigid or bound variables count as opaque items and fail.
fn bag_parts(
    bag: TermId,
    subst: &Subst,
    terms: &TermStore,
) -> Option<(SmallVec<[(TermId, crate::symbol::Label); 4]>, Option<Var>)> {
    let mut cells = SmallVec::new();
    let mut rest = None;
    let mut stack: SmallVec<[TermId; 8]> = SmallVec::new();
    stack.push(bag);
    while let Some(item) = stack.pop() {
        let item = deref(item, subst, terms);
        match terms.resolve(item)? {
            Term::Bag(items) => stack.extend(items.iter().rev().copied()),
            Term::Cell(label, _) => cells.push((item, label)),
            Term::Var(v) => {
                if rest.replace(v).is_some() {
                    return None;
                }
            }
            _ => return None,
        }
    }
    Some((cells, rest))
}

/// Unify two continuations item by item; a trailing `K` frame absorbs
/// whatever the other side has left.
fn unify_sequences(
    a: TermId,
    b: TermId,
    rigid: &[Var],
    subst: &Subst,
    worklist: &mut SmallVec<[(TermId, TermId); 32]>,
    terms: &TermStore,
) -> bool {
    let (a_items, a_frame) = sequence_parts(a, rigid, subst, terms);
    let (b_items, b_frame) = sequence_parts(b, rigid, subst, terms);

    let common = a_items.len().min(b_items.len());
    for i in 0..common {
        worklist.push((a_items[i], b_items[i]));
    }
    let a_tail = &a_items[common..];
    let b_tail = &b_items[common..];

    match (a_frame, b_frame) {
        (None, None) => a_tail.is_empty() && b_tail.is_empty(),
        (Some(fa), None) => {
            if !a_tail.is_empty() {
                return false;
            }
            worklist.push((fa, terms.kseq(b_tail.iter().copied())));
            true
        }
        (None, Some(fb)) => {
            if !b_tail.is_empty() {
                return false;
            }
            worklist.push((terms.kseq(a_tail.iter().copied()), fb));
            true
        }
        (Some(fa), Some(fb)) => {
            if a_tail.is_empty() {
                worklist.push((fa, terms.kseq(b_tail.iter().copied().chain([fb]))));
            } else {
                worklist.push((terms.kseq(a_tail.iter().copied().chain([fa])), fb));
            }
            true
        }
    }
}

/// Items of a continuation with bound variables spliced in, plus its
/// trailing unbound non-rigid `K` variable.
fn sequence_parts(
    seq: TermId,
    rigid: &[Var],
    subst: &Subst,
    terms: &TermStore,
) -> (SmallVec<[TermId; 4]>, Option<TermId>) {
    let mut items: SmallVec<[TermId; 4]> = SmallVec::new();
    let mut stack: SmallVec<[TermId; 8]> = SmallVec::new();
    stack.push(seq);
    while let Some(item) = stack.pop() {
        let item = deref(item, subst, terms);
        match terms.resolve(item) {
            Some(Term::KSeq(inner)) => stack.extend(inner.iter().rev().copied()),
            _ => items.push(item),
        }
    }
    let frame = items.last().copied().filter(|last| {
        terms
            .is_var(*last)
            .is_some_and(|v| v.sort == crate::term::Sort::K && !rigid.contains(&v))
    });
    if frame.is_some() {
        items.pop();
    }
    (items, frame)
}

/// Dereference a term through the substitution.
fn deref(term: TermId, subst: &Subst, terms: &TermStore) -> TermId {
    let mut current = term;
    let mut hops = 0usize;
    while let Some(var) = terms.is_var(current) {
        match subst.get(var) {
            Some(bound) if hops <= subst.len() => {
                current = bound;
                hops += 1;
            }
            _ => return current,
        }
    }
    current
}

/// Occurs check: does `var` occur in `term` under `subst`?
fn occurs(var: Var, term: TermId, subst: &Subst, terms: &TermStore) -> bool {
    let mut stack: SmallVec<[TermId; 16]> = SmallVec::new();
    stack.push(term);
    while let Some(t) = stack.pop() {
        let t = deref(t, subst, terms);
        match terms.resolve(t) {
            Some(Term::Var(v)) if v == var => return true,
            Some(other) => stack.extend(other.children()),
            None => {}
        }
    }
    false
}

#[cfg(test)]
#[path = "tests/unify.rs"]
mod tests;
