use super::*;
use crate::term::{Sort, Var};
use crate::test_utils::setup;

#[test]
fn folds_ground_arithmetic() {
    let (_, terms) = setup();
    let t = terms.op2(Op::Add, terms.int(2), terms.op2(Op::Mul, terms.int(3), terms.int(4)));
    assert_eq!(evaluate(t, &terms), Ok(terms.int(14)));
}

#[test]
fn leaves_symbolic_arithmetic_alone() {
    let (_, terms) = setup();
    let x = terms.var(0, Sort::Int);
    let t = terms.op2(Op::Add, x, terms.op2(Op::Add, terms.int(1), terms.int(1)));
    assert_eq!(evaluate(t, &terms), Ok(terms.op2(Op::Add, x, terms.int(2))));
}

#[test]
fn comparisons_produce_booleans() {
    let (_, terms) = setup();
    assert_eq!(evaluate(terms.op2(Op::Lt, terms.int(0), terms.int(3)), &terms), Ok(terms.bool(true)));
    assert_eq!(evaluate(terms.op2(Op::Ge, terms.int(0), terms.int(3)), &terms), Ok(terms.bool(false)));
}

#[test]
fn division_by_zero_is_a_hard_error() {
    let (_, terms) = setup();
    let t = terms.op2(Op::Div, terms.int(1), terms.int(0));
    match evaluate(t, &terms) {
        Err(EngineError::Evaluation { message, .. }) => assert!(message.contains("division by zero")),
        other => panic!("expected evaluation error, got {:?}", other),
    }
}

#[test]
fn overflow_is_a_hard_error() {
    let (_, terms) = setup();
    let t = terms.op2(Op::Add, terms.int(i64::MAX), terms.int(1));
    assert!(evaluate(t, &terms).is_err());
}

#[test]
fn equality_on_values_and_identical_terms() {
    let (symbols, terms) = setup();
    let a = terms.app0(symbols.intern("a"));
    let b = terms.app0(symbols.intern("b"));
    let x = terms.var(0, Sort::KItem);
    assert_eq!(evaluate(terms.op2(Op::Eq, a, b), &terms), Ok(terms.bool(false)));
    assert_eq!(evaluate(terms.op2(Op::Ne, a, b), &terms), Ok(terms.bool(true)));
    assert_eq!(evaluate(terms.op2(Op::Eq, x, x), &terms), Ok(terms.bool(true)));
    let open = terms.op2(Op::Eq, x, a);
    assert_eq!(evaluate(open, &terms), Ok(open));
}

#[test]
fn boolean_connectives_short_circuit() {
    let (_, terms) = setup();
    let p = terms.op2(Op::Lt, terms.var(0, Sort::Int), terms.int(3));
    assert_eq!(evaluate(terms.op2(Op::And, terms.bool(true), p), &terms), Ok(p));
    assert_eq!(evaluate(terms.op2(Op::And, p, terms.bool(false)), &terms), Ok(terms.bool(false)));
    assert_eq!(evaluate(terms.op2(Op::Or, p, terms.bool(true)), &terms), Ok(terms.bool(true)));
    assert_eq!(evaluate(terms.not(terms.not(p)), &terms), Ok(p));
}

#[test]
fn evaluates_inside_configurations() {
    let (symbols, terms) = setup();
    let k = symbols.intern("k");
    let config = terms.bag([terms.cell(k, terms.op2(Op::Sub, terms.int(5), terms.int(2)))]);
    assert_eq!(evaluate(config, &terms), Ok(terms.bag([terms.cell(k, terms.int(3))])));
}

#[test]
fn substitute_then_evaluate() {
    let (_, terms) = setup();
    let x = Var::new(0, Sort::Int);
    let t = terms.op2(Op::Add, terms.var_term(x), terms.int(1));
    let mut subst = Subst::new();
    subst.bind(x, terms.int(41));
    assert_eq!(substitute_and_evaluate(t, &subst, &terms), Ok(terms.int(42)));
}

#[test]
fn values_exclude_variables_and_functions() {
    let (symbols, terms) = setup();
    let f = symbols.intern("f");
    assert!(is_value(terms.app1(f, terms.int(1)), &terms));
    assert!(!is_value(terms.app1(f, terms.var(0, Sort::Int)), &terms));
    assert!(!is_value(terms.op2(Op::Add, terms.int(1), terms.int(1)), &terms));
}

#[test]
fn wrong_arity_is_an_evaluation_error() {
    let (_, terms) = setup();
    let short = terms.op(Op::Add, smallvec::smallvec![terms.int(1)]);
    assert!(matches!(evaluate(short, &terms), Err(EngineError::Evaluation { .. })));

    let long = terms.op(Op::Not, smallvec::smallvec![terms.bool(true), terms.bool(false)]);
    assert!(matches!(evaluate(long, &terms), Err(EngineError::Evaluation { .. })));
}
