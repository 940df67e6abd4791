//! A loaded set of semantic rules with its index and strategy.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::EngineConfig;
use crate::constraint::ConstrainedTerm;
use crate::error::{EngineError, EngineResult};
use crate::index::{HeadIndex, RuleIndex};
use crate::rule::{Rule, RuleId};
use crate::strategy::{RuleClass, Strategy, TransitionStrategy};
use crate::symbol::{Label, SymbolStore};
use crate::term::TermStore;

pub struct Definition {
    rules: Vec<Arc<Rule>>,
    by_id: FxHashMap<RuleId, usize>,
    index: Box<dyn RuleIndex>,
    strategy: Box<dyn Strategy>,
    k_cell: Label,
}

impl Definition {
    /// Validate `rules` and index them on the configured `k` cell.
    pub fn new(
        rules: Vec<Arc<Rule>>,
        config: &EngineConfig,
        symbols: &SymbolStore,
        terms: &TermStore,
    ) -> EngineResult<Self> {
        let mut by_id: FxHashMap<RuleId, usize> = FxHashMap::default();
        for (pos, rule) in rules.iter().enumerate() {
            rule.validate()?;
            // Disabled sets are keyed by id.
            if by_id.insert(rule.id, pos).is_some() {
                return Err(EngineError::MalformedRule {
                    message: format!("rule {} is declared more than once", rule.id),
                });
            }
        }
        let k_cell = symbols.intern(&config.k_cell);
        Ok(Self {
            index: Box::new(HeadIndex::new(rules.clone(), k_cell, terms)),
            strategy: Box::new(TransitionStrategy::new(config.transition_tags.iter().cloned())),
            rules,
            by_id,
            k_cell,
        })
    }

    pub fn with_index(mut self, index: Box<dyn RuleIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> Option<&Arc<Rule>> {
        self.by_id.get(&id).map(|i| &self.rules[*i])
    }

    pub fn k_cell(&self) -> Label {
        self.k_cell
    }

    pub fn candidate_rules(&self, subject: &ConstrainedTerm, terms: &TermStore) -> Vec<Arc<Rule>> {
        self.index.candidate_rules(subject, terms)
    }

    pub fn partition(&self, rules: Vec<Arc<Rule>>) -> Vec<RuleClass> {
        self.strategy.partition(rules)
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("rules", &self.rules.len())
            .field("k_cell", &self.k_cell)
            .finish()
    }
}
