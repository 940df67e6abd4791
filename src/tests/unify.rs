use super::*;
use crate::term::{Op, Sort};
use crate::test_utils::setup;

// ========== HAPPY PATH ==========

#[test]
fn unify_identical_terms_is_empty() {
    let (symbols, terms) = setup();
    let t = terms.app1(symbols.intern("f"), terms.int(1));
    let u = unify(t, t, &terms).unwrap();
    assert!(u.subst.is_empty());
    assert!(u.is_exact());
}

#[test]
fn unify_binds_variable_to_subterm() {
    let (symbols, terms) = setup();
    let f = symbols.intern("f");
    let x = Var::new(0, Sort::Int);
    let u = unify(terms.app1(f, terms.var_term(x)), terms.app1(f, terms.int(3)), &terms).unwrap();
    assert_eq!(u.subst.get(x), Some(terms.int(3)));
}

#[test]
fn unify_is_symmetric_in_outcome() {
    let (symbols, terms) = setup();
    let f = symbols.intern("f");
    let x = Var::new(0, Sort::Int);
    let y = Var::new(1, Sort::Int);
    let left = terms.app2(f, terms.var_term(x), terms.int(2));
    let right = terms.app2(f, terms.int(1), terms.var_term(y));
    let lr = unify(left, right, &terms).unwrap();
    let rl = unify(right, left, &terms).unwrap();
    assert_eq!(lr.subst, rl.subst);
    assert_eq!(apply_subst(left, &lr.subst, &terms), apply_subst(right, &lr.subst, &terms));
}

#[test]
fn unify_var_var_prefers_binding_higher_index() {
    let (_, terms) = setup();
    let x = Var::new(0, Sort::Int);
    let y = Var::new(5, Sort::Int);
    let u = unify(terms.var_term(x), terms.var_term(y), &terms).unwrap();
    assert_eq!(u.subst.get(y), Some(terms.var_term(x)));
}

#[test]
fn unify_var_var_respects_subsorts() {
    let (_, terms) = setup();
    let k = Var::new(0, Sort::K);
    let i = Var::new(5, Sort::Int);
    let u = unify(terms.var_term(k), terms.var_term(i), &terms).unwrap();
    assert_eq!(u.subst.get(k), Some(terms.var_term(i)), "only the K variable admits an Int");
}

// ========== CONFIGURATIONS ==========

#[test]
fn unify_bag_pairs_cells_by_label() {
    let (symbols, terms) = setup();
    let k = symbols.intern("k");
    let state = symbols.intern("state");
    let x = Var::new(0, Sort::Int);
    let s = Var::new(1, Sort::Int);
    let pattern = terms.bag([terms.cell(state, terms.var_term(s)), terms.cell(k, terms.var_term(x))]);
    let subject = terms.bag([terms.cell(k, terms.int(1)), terms.cell(state, terms.int(2))]);
    let u = unify(subject, pattern, &terms).unwrap();
    assert_eq!(u.subst.get(x), Some(terms.int(1)));
    assert_eq!(u.subst.get(s), Some(terms.int(2)));
}

#[test]
fn unify_bag_rest_absorbs_unmentioned_cells() {
    let (symbols, terms) = setup();
    let k = symbols.intern("k");
    let state = symbols.intern("state");
    let rest = Var::new(0, Sort::Bag);
    let pattern = terms.bag([terms.cell(k, terms.int(1)), terms.var_term(rest)]);
    let state_cell = terms.cell(state, terms.int(2));
    let subject = terms.bag([terms.cell(k, terms.int(1)), state_cell]);
    let u = unify(subject, pattern, &terms).unwrap();
    assert_eq!(u.subst.get(rest), Some(terms.bag([state_cell])));
}

#[test]
fn unify_bag_without_rest_requires_same_cells() {
    let (symbols, terms) = setup();
    let k = symbols.intern("k");
    let pattern = terms.bag([terms.cell(k, terms.int(1))]);
    let subject = terms.bag([terms.cell(k, terms.int(1)), terms.cell(symbols.intern("state"), terms.int(2))]);
    assert!(unify(subject, pattern, &terms).is_none());
}

#[test]
fn unify_sequence_frame_takes_remainder() {
    let (symbols, terms) = setup();
    let a = terms.app0(symbols.intern("a"));
    let b = terms.app0(symbols.intern("b"));
    let c = terms.app0(symbols.intern("c"));
    let frame = Var::new(0, Sort::K);
    let pattern = terms.kseq([a, terms.var_term(frame)]);
    let u = unify(terms.kseq([a, b, c]), pattern, &terms).unwrap();
    assert_eq!(u.subst.get(frame), Some(terms.kseq([b, c])));

    let u = unify(a, pattern, &terms).unwrap();
    assert_eq!(u.subst.get(frame), Some(terms.dot_k()), "a single item is a sequence of one");
}

#[test]
fn lone_literal_unifies_with_sequence_pattern() {
    let (_, terms) = setup();
    let x = Var::new(0, Sort::Int);
    let b = Var::new(1, Sort::Bool);
    let frame = Var::new(2, Sort::K);

    let u = unify(terms.int(5), terms.kseq([terms.var_term(x), terms.var_term(frame)]), &terms).unwrap();
    assert_eq!(u.subst.get(x), Some(terms.int(5)));
    assert_eq!(u.subst.get(frame), Some(terms.dot_k()));

    let u = unify(terms.kseq([terms.var_term(b), terms.var_term(frame)]), terms.bool(true), &terms).unwrap();
    assert_eq!(u.subst.get(b), Some(terms.bool(true)));

    let two = terms.kseq([terms.var_term(x), terms.int(1), terms.var_term(frame)]);
    assert!(unify(terms.int(5), two, &terms).is_none());
}

#[test]
fn rigid_item_matches_sequence_pattern() {
    let (_, terms) = setup();
    let item = Var::new(0, Sort::KItem);
    let x = Var::new(1, Sort::KItem);
    let frame = Var::new(2, Sort::K);
    let pattern = terms.kseq([terms.var_term(x), terms.var_term(frame)]);
    let u = solve(terms.var_term(item), pattern, &[item], &terms).unwrap();
    assert_eq!(u.subst.get(x), Some(terms.var_term(item)));
    assert_eq!(u.subst.get(frame), Some(terms.dot_k()));
}

#[test]
fn unify_two_frames() {
    let (symbols, terms) = setup();
    let a = terms.app0(symbols.intern("a"));
    let b = terms.app0(symbols.intern("b"));
    let f1 = Var::new(0, Sort::K);
    let f2 = Var::new(1, Sort::K);
    let left = terms.kseq([a, terms.var_term(f1)]);
    let right = terms.kseq([a, b, terms.var_term(f2)]);
    let u = unify(left, right, &terms).unwrap();
    assert_eq!(apply_subst(left, &u.subst, &terms), apply_subst(right, &u.subst, &terms));
}

// ========== RESIDUALS ==========

#[test]
fn unevaluated_functions_become_residuals() {
    let (symbols, terms) = setup();
    let f = symbols.intern("f");
    let x = terms.var(0, Sort::Int);
    let sum = terms.op2(Op::Add, x, terms.int(1));
    let u = unify(terms.app1(f, sum), terms.app1(f, terms.int(5)), &terms).unwrap();
    assert!(!u.is_exact());
    assert_eq!(u.residual.as_slice(), &[(sum, terms.int(5))]);
}

// ========== UNHAPPY PATH ==========

#[test]
fn unify_functor_clash() {
    let (symbols, terms) = setup();
    assert!(unify(terms.app0(symbols.intern("a")), terms.app0(symbols.intern("b")), &terms).is_none());
}

#[test]
fn unify_literal_clash() {
    let (_, terms) = setup();
    assert!(unify(terms.int(1), terms.int(2), &terms).is_none());
}

#[test]
fn unify_occurs_check() {
    let (symbols, terms) = setup();
    let f = symbols.intern("f");
    let x = terms.var(0, Sort::KItem);
    assert!(unify(x, terms.app1(f, x), &terms).is_none());
}

#[test]
fn unify_sort_mismatch() {
    let (symbols, terms) = setup();
    let x = terms.var(0, Sort::Int);
    assert!(unify(x, terms.app0(symbols.intern("a")), &terms).is_none());
    assert!(unify(x, terms.bool(true), &terms).is_none());
}

#[test]
fn unify_rigid_variables_act_as_constants() {
    let (_, terms) = setup();
    let x = Var::new(0, Sort::Int);
    assert!(solve(terms.var_term(x), terms.int(1), &[x], &terms).is_none());
    assert!(solve(terms.var_term(x), terms.int(1), &[], &terms).is_some());
}

#[test]
fn rigid_rest_must_be_absorbed() {
    let (symbols, terms) = setup();
    let k = symbols.intern("k");
    let subject_rest = Var::new(0, Sort::Bag);
    let pattern_rest = Var::new(1, Sort::Bag);
    let subject = terms.bag([terms.cell(k, terms.int(1)), terms.var_term(subject_rest)]);

    let closed = terms.bag([terms.cell(k, terms.int(1))]);
    assert!(solve(subject, closed, &[subject_rest], &terms).is_none());

    let open = terms.bag([terms.cell(k, terms.int(1)), terms.var_term(pattern_rest)]);
    let u = solve(subject, open, &[subject_rest], &terms).unwrap();
    assert_eq!(u.subst.get(pattern_rest), Some(terms.var_term(subject_rest)));
}
