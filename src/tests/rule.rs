use super::*;
use crate::term::Sort;
use crate::test_utils::{constant_rule, increment_rule, k_config, setup};

#[test]
fn fast_form_tracks_written_cells() {
    let (symbols, terms) = setup();
    let k = symbols.intern("k");
    let state = symbols.intern("state");
    let x = terms.var(0, Sort::Int);
    let s = terms.var(1, Sort::Int);
    let lhs = terms.bag([terms.cell(k, x), terms.cell(state, s)]);
    let rhs = terms.bag([terms.cell(k, x), terms.cell(state, terms.int(0))]);
    let rule = RuleBuilder::new(0, lhs, rhs).build(&terms);

    let mut reads = rule.read_cells().unwrap().to_vec();
    reads.sort();
    let mut expected = vec![k, state];
    expected.sort();
    assert_eq!(reads, expected);
    assert_eq!(rule.write_cells().unwrap(), &[state]);
    assert_eq!(rule.fast().unwrap().instructions().len(), 1);
}

#[test]
fn fast_form_requires_matching_cell_sets() {
    let (symbols, terms) = setup();
    let k = symbols.intern("k");
    let state = symbols.intern("state");
    let lhs = terms.bag([terms.cell(k, terms.int(0))]);
    let rhs = terms.bag([terms.cell(k, terms.int(0)), terms.cell(state, terms.int(1))]);
    assert!(RuleBuilder::new(0, lhs, rhs).build(&terms).fast().is_none());

    let a = terms.app0(symbols.intern("a"));
    let plain = RuleBuilder::new(1, a, terms.app0(symbols.intern("b"))).build(&terms);
    assert!(plain.read_cells().is_none());
    assert!(plain.write_cells().is_none());
}

#[test]
fn without_fast_form_skips_compilation() {
    let (symbols, terms) = setup();
    let k = symbols.intern("k");
    let rule = RuleBuilder::new(0, k_config(k, terms.int(0), &terms), k_config(k, terms.int(1), &terms))
        .without_fast_form()
        .build(&terms);
    assert!(rule.fast().is_none());
}

#[test]
fn variables_cover_every_part() {
    let (symbols, terms) = setup();
    let rule = increment_rule(3, 10, &symbols, &terms);
    let x = Var::new(103, Sort::Int);
    assert_eq!(rule.matching_vars(), &[x]);
    assert_eq!(rule.variables(), &[x]);

    let k = symbols.intern("k");
    let n = Var::new(7, Sort::Int);
    let with_fresh = RuleBuilder::new(9, k_config(k, terms.int(0), &terms), k_config(k, terms.var_term(n), &terms))
        .fresh(n)
        .build(&terms);
    assert!(with_fresh.matching_vars().is_empty());
    assert_eq!(with_fresh.variables(), &[n]);
}

#[test]
fn rules_compare_by_id() {
    let (symbols, terms) = setup();
    let a = constant_rule(1, "a", "b", &symbols, &terms);
    let b = constant_rule(1, "c", "d", &symbols, &terms);
    assert_eq!(*a, *b);
    assert_ne!(*a, *constant_rule(2, "a", "b", &symbols, &terms));
}

#[test]
fn builder_sets_attributes() {
    let (symbols, terms) = setup();
    let a = terms.app0(symbols.intern("a"));
    let rule = RuleBuilder::new(4, a, a)
        .label("loop")
        .location("counter.k", 12, 3)
        .tag("transition")
        .owise()
        .build(&terms);
    assert_eq!(rule.describe(), "loop");
    assert_eq!(rule.location.to_string(), "counter.k:12:3");
    assert!(rule.has_tag("transition"));
    assert_eq!(rule.priority(), OWISE_PRIORITY);
    assert_eq!(RuleBuilder::new(5, a, a).build(&terms).describe(), "rule #5");
}

#[test]
fn validate_rejects_matched_fresh_variable() {
    let (symbols, terms) = setup();
    let k = symbols.intern("k");
    let x = Var::new(0, Sort::Int);
    let rule = RuleBuilder::new(0, k_config(k, terms.var_term(x), &terms), k_config(k, terms.int(0), &terms))
        .fresh(x)
        .build(&terms);
    assert!(matches!(rule.validate(), Err(EngineError::MalformedRule { .. })));
    assert!(increment_rule(1, 3, &symbols, &terms).validate().is_ok());
}
