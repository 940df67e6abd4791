//! Grouping candidate rules into ordered equivalence classes.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::rule::Rule;

/// Rules that may fire in the same step.
#[derive(Debug, Clone)]
pub struct RuleClass {
    pub rules: Vec<Arc<Rule>>,
    /// Whether firing a rule of this class counts as an exploration step.
    pub transition: bool,
}

pub trait Strategy: Send + Sync {
    /// Order `rules` into classes, consumed front to back. Within a class
    /// the input order is kept.
    fn partition(&self, rules: Vec<Arc<Rule>>) -> Vec<RuleClass>;
}

/// Splits rules by transition tags and priority.
///
/// With no tags configured every rule is a transition. Otherwise rules
/// carrying one of the tags are transitions and the rest are structural;
/// structural classes come first, then classes by ascending priority.
#[derive(Debug, Clone, Default)]
pub struct TransitionStrategy {
    tags: Vec<String>,
}

impl TransitionStrategy {
    pub fn new(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_transition(&self, rule: &Rule) -> bool {
        self.tags.is_empty() || self.tags.iter().any(|t| rule.has_tag(t))
    }
}

impl Strategy for TransitionStrategy {
    fn partition(&self, rules: Vec<Arc<Rule>>) -> Vec<RuleClass> {
        // `false < true`: structural classes sort first.
        let mut classes: BTreeMap<(bool, i32), Vec<Arc<Rule>>> = BTreeMap::new();
        for rule in rules {
            let key = (self.is_transition(&rule), rule.priority());
            classes.entry(key).or_default().push(rule);
        }
        classes
            .into_iter()
            .map(|((transition, _), rules)| RuleClass { rules, transition })
            .collect()
    }
}
