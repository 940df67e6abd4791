//! Step, rewrite and search benchmarks using Criterion.
//!
//! Run with: `cargo bench`
//!
//! The workloads are small counter and branching definitions:
//! - a single step against definitions with a growing number of rules
//! - rewriting a counter to completion
//! - breadth-first search over a branching definition

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use symrw::{
    config::EngineConfig,
    constraint::ConstrainedTerm,
    definition::Definition,
    rewriter::{SearchMode, SymbolicRewriter},
    rule::{Rule, RuleBuilder},
    symbol::SymbolStore,
    term::{Op, Sort, TermId, TermStore},
};

fn k_config(symbols: &SymbolStore, terms: &TermStore, content: TermId) -> TermId {
    terms.bag([terms.cell(symbols.intern("k"), content)])
}

/// `<k> X </k> => <k> X +Int 1 </k> requires X <Int limit`
fn counter_rule(id: u32, limit: i64, symbols: &SymbolStore, terms: &TermStore) -> Arc<Rule> {
    let x = terms.var(id, Sort::Int);
    Arc::new(
        RuleBuilder::new(
            id,
            k_config(symbols, terms, x),
            k_config(symbols, terms, terms.op2(Op::Add, x, terms.int(1))),
        )
        .requires(terms.op2(Op::Lt, x, terms.int(limit)))
        .build(terms),
    )
}

/// `<k> n(i) </k> => <k> n(j) </k>` for the edges of a small graph.
fn edge_rule(id: u32, from: usize, to: usize, symbols: &SymbolStore, terms: &TermStore) -> Arc<Rule> {
    let node = |i: usize| terms.app0(symbols.intern(&format!("n{}", i)));
    Arc::new(
        RuleBuilder::new(id, k_config(symbols, terms, node(from)), k_config(symbols, terms, node(to)))
            .build(terms),
    )
}

fn build(rules: impl FnOnce(&SymbolStore, &TermStore) -> Vec<Arc<Rule>>) -> SymbolicRewriter {
    let symbols = Arc::new(SymbolStore::new());
    let terms = Arc::new(TermStore::new());
    let config = EngineConfig::default();
    let rules = rules(&symbols, &terms);
    let definition = Definition::new(rules, &config, &symbols, &terms).expect("valid definition");
    SymbolicRewriter::new(definition, config, symbols, terms)
}

/// Benchmark one multi-result step as the number of rules grows.
fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");

    for rules in [1u32, 8, 32] {
        group.bench_with_input(BenchmarkId::new("rules", rules), &rules, |b, &rules| {
            let rw = build(|s, t| (0..rules).map(|i| counter_rule(i, 100, s, t)).collect());
            let subject = ConstrainedTerm::of(k_config(rw.symbols(), rw.terms(), rw.terms().int(0)));
            b.iter(|| rw.step(black_box(&subject), false));
        });
    }

    group.finish();
}

/// Benchmark rewriting a counter until it gets stuck.
fn bench_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");

    for limit in [10i64, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("steps", limit), &limit, |b, &limit| {
            let rw = build(|s, t| vec![counter_rule(0, limit, s, t)]);
            let initial = ConstrainedTerm::of(k_config(rw.symbols(), rw.terms(), rw.terms().int(0)));
            b.iter(|| rw.rewrite(black_box(initial.clone()), None, false));
        });
    }

    group.finish();
}

/// Benchmark search over a binary tree of nodes.
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for depth in [3usize, 5, 7] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            let nodes = (1usize << (depth + 1)) - 1;
            let rw = build(|s, t| {
                let mut rules = Vec::new();
                for parent in 0..nodes / 2 {
                    let id = rules.len() as u32;
                    rules.push(edge_rule(id, parent, 2 * parent + 1, s, t));
                    rules.push(edge_rule(id + 1, parent, 2 * parent + 2, s, t));
                }
                rules
            });
            let terms = rw.terms();
            let initial = ConstrainedTerm::of(k_config(rw.symbols(), terms, terms.app0(rw.symbols().intern("n0"))));
            let x = terms.var(0, Sort::KItem);
            let pattern = RuleBuilder::new(u32::MAX, k_config(rw.symbols(), terms, x), k_config(rw.symbols(), terms, x))
                .build(terms);
            b.iter(|| rw.search(black_box(initial.clone()), &pattern, None, None, SearchMode::Final, false));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_step, bench_rewrite, bench_search);
criterion_main!(benches);
