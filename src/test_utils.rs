//! Shared fixtures for unit tests: stores and a small counter language.

use std::sync::Arc;

use crate::rule::{Rule, RuleBuilder};
use crate::symbol::{Label, SymbolStore};
use crate::term::{Op, Sort, TermId, TermStore};

pub(crate) fn setup() -> (SymbolStore, TermStore) {
    (SymbolStore::new(), TermStore::new())
}

/// `<k> X:Int ~> REST </k>` as a one-cell configuration.
pub(crate) fn k_config(k: Label, content: TermId, terms: &TermStore) -> TermId {
    terms.bag([terms.cell(k, content)])
}

/// `<k> X:Int </k> => <k> X +Int 1 </k> requires X <Int limit`
pub(crate) fn increment_rule(
    id: u32,
    limit: i64,
    symbols: &SymbolStore,
    terms: &TermStore,
) -> Arc<Rule> {
    let k = symbols.intern("k");
    let x = terms.var(100 + id, Sort::Int);
    let lhs = k_config(k, x, terms);
    let rhs = k_config(k, terms.op2(Op::Add, x, terms.int(1)), terms);
    Arc::new(
        RuleBuilder::new(id, lhs, rhs)
            .label("increment")
            .requires(terms.op2(Op::Lt, x, terms.int(limit)))
            .build(terms),
    )
}

/// `<k> from </k> => <k> to </k>` on constant constructors.
pub(crate) fn constant_rule(
    id: u32,
    from: &str,
    to: &str,
    symbols: &SymbolStore,
    terms: &TermStore,
) -> Arc<Rule> {
    let k = symbols.intern("k");
    let lhs = k_config(k, terms.app0(symbols.intern(from)), terms);
    let rhs = k_config(k, terms.app0(symbols.intern(to)), terms);
    Arc::new(RuleBuilder::new(id, lhs, rhs).label(format!("{}-{}", from, to)).build(terms))
}

/// `<k> a </k> => <k> b </k>`, `<k> b </k> => <k> c </k>` and
/// `<state> 1 </state> => <state> 2 </state>`, each with a `Bag` rest.
/// On `<k> a </k> <state> 0 </state>` the `<state>` rule fails without
/// reading `<k>`, so it stays disabled along the `<k>` chain.
pub(crate) fn staged_rules(symbols: &SymbolStore, terms: &TermStore) -> Vec<Arc<Rule>> {
    let k = symbols.intern("k");
    let state = symbols.intern("state");
    let rest = terms.var(60, Sort::Bag);
    let cell = |label: Label, content: TermId| terms.bag([terms.cell(label, content), rest]);
    let atom = |name: &str| terms.app0(symbols.intern(name));
    vec![
        Arc::new(RuleBuilder::new(0, cell(k, atom("a")), cell(k, atom("b"))).build(terms)),
        Arc::new(RuleBuilder::new(1, cell(k, atom("b")), cell(k, atom("c"))).build(terms)),
        Arc::new(RuleBuilder::new(2, cell(state, terms.int(1)), cell(state, terms.int(2))).build(terms)),
    ]
}

/// `<k> item </k> <state> value </state>`.
pub(crate) fn staged_config(item: &str, value: i64, symbols: &SymbolStore, terms: &TermStore) -> TermId {
    terms.bag([
        terms.cell(symbols.intern("k"), terms.app0(symbols.intern(item))),
        terms.cell(symbols.intern("state"), terms.int(value)),
    ])
}
