pub mod builder;
pub mod config;
pub mod constraint;
pub mod definition;
pub mod error;
pub mod eval;
pub mod executor;
pub mod fresh;
pub mod graph;
pub mod index;
pub mod matching;
pub mod metrics;
pub mod observer;
pub mod prover;
pub mod rewriter;
pub mod rule;
pub mod solver;
pub mod step;
pub mod strategy;
pub mod subst;
pub mod symbol;
pub mod term;
pub mod trace;
pub mod unify;

#[cfg(test)]
pub(crate) mod test_utils;
