//! Fresh symbolic values for rule placeholders.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{EngineError, EngineResult};
use crate::symbol::SymbolStore;
use crate::term::{Sort, TermId, TermStore};

pub trait FreshGenerator: Send + Sync {
    /// A value of `sort` never returned before by this generator.
    fn fresh(&self, sort: Sort, terms: &TermStore, symbols: &SymbolStore) -> EngineResult<TermId>;
}

/// Counter-backed generator shared by every sort.
///
/// `Int` yields successive integers, `KItem` yields nullary constructors
/// `#KItem<n>`, `K` yields unbound variables. Other sorts have no fresh
/// values.
#[derive(Debug, Default)]
pub struct CounterFresh {
    next: AtomicU64,
}

impl CounterFresh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting at `start`, for definitions that reserve low values.
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl FreshGenerator for CounterFresh {
    fn fresh(&self, sort: Sort, terms: &TermStore, symbols: &SymbolStore) -> EngineResult<TermId> {
        match sort {
            Sort::Int => {
                let n = self.next.fetch_add(1, Ordering::Relaxed);
                let value = i64::try_from(n)
                    .map_err(|_| EngineError::evaluation("fresh integer counter exhausted"))?;
                Ok(terms.int(value))
            }
            Sort::KItem => {
                let n = self.next.fetch_add(1, Ordering::Relaxed);
                Ok(terms.app0(symbols.intern(&format!("#{}{}", sort, n))))
            }
            Sort::K => Ok(terms.var_term(terms.fresh_var(Sort::K))),
            Sort::Bool | Sort::Bag => Err(EngineError::no_fresh_value(sort)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup;

    #[test]
    fn fresh_values_are_distinct() {
        let (symbols, terms) = setup();
        let fresh = CounterFresh::new();
        let values: Vec<_> = (0..10)
            .map(|i| {
                let sort = if i % 2 == 0 { Sort::Int } else { Sort::KItem };
                fresh.fresh(sort, &terms, &symbols).unwrap()
            })
            .collect();
        for (i, a) in values.iter().enumerate() {
            assert!(values[i + 1..].iter().all(|b| a != b));
        }
    }

    #[test]
    fn fresh_kitem_is_named_constant() {
        let (symbols, terms) = setup();
        let fresh = CounterFresh::starting_at(7);
        let t = fresh.fresh(Sort::KItem, &terms, &symbols).unwrap();
        assert_eq!(t, terms.app0(symbols.intern("#KItem7")));
    }

    #[test]
    fn fresh_k_is_variable() {
        let (symbols, terms) = setup();
        let t = CounterFresh::new().fresh(Sort::K, &terms, &symbols).unwrap();
        assert_eq!(terms.is_var(t).map(|v| v.sort), Some(Sort::K));
    }

    #[test]
    fn bool_has_no_fresh_value() {
        let (symbols, terms) = setup();
        let err = CounterFresh::new().fresh(Sort::Bool, &terms, &symbols).unwrap_err();
        assert!(matches!(err, EngineError::NoFreshValue { sort: Sort::Bool, .. }));
    }
}
