//! Candidate-rule lookup by term shape.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::constraint::ConstrainedTerm;
use crate::rule::Rule;
use crate::symbol::Label;
use crate::term::{Term, TermId, TermStore};

/// Maps a subject to the rules whose left-hand side could match it.
///
/// Implementations may over-approximate but must never drop a rule that
/// can apply, and must return rules in declaration order.
pub trait RuleIndex: Send + Sync {
    fn candidate_rules(&self, subject: &ConstrainedTerm, terms: &TermStore) -> Vec<Arc<Rule>>;
}

/// No indexing: every rule is a candidate.
#[derive(Debug, Clone, Default)]
pub struct AllRules {
    rules: Vec<Arc<Rule>>,
}

impl AllRules {
    pub fn new(rules: Vec<Arc<Rule>>) -> Self {
        Self { rules }
    }
}

impl RuleIndex for AllRules {
    fn candidate_rules(&self, _subject: &ConstrainedTerm, _terms: &TermStore) -> Vec<Arc<Rule>> {
        self.rules.clone()
    }
}

/// Head of the first computation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Head {
    Ctor(Label),
    Int,
    Bool,
    Empty,
}

/// Index on the head of the first item of the `k` cell.
///
/// Rules whose head is a variable, a function or absent are kept in a
/// wildcard bucket and returned for every subject.
#[derive(Debug, Clone)]
pub struct HeadIndex {
    k_cell: Label,
    rules: Vec<Arc<Rule>>,
    by_head: FxHashMap<Head, Vec<usize>>,
    wildcard: Vec<usize>,
}

impl HeadIndex {
    pub fn new(rules: Vec<Arc<Rule>>, k_cell: Label, terms: &TermStore) -> Self {
        let mut by_head: FxHashMap<Head, Vec<usize>> = FxHashMap::default();
        let mut wildcard = Vec::new();
        for (pos, rule) in rules.iter().enumerate() {
            match head_of(rule.lhs, k_cell, terms) {
                Some(head) => by_head.entry(head).or_default().push(pos),
                None => wildcard.push(pos),
            }
        }
        Self {
            k_cell,
            rules,
            by_head,
            wildcard,
        }
    }

    /// Number of distinct indexed heads.
    pub fn heads(&self) -> usize {
        self.by_head.len()
    }
}

impl RuleIndex for HeadIndex {
    fn candidate_rules(&self, subject: &ConstrainedTerm, terms: &TermStore) -> Vec<Arc<Rule>> {
        let Some(head) = head_of(subject.term(), self.k_cell, terms) else {
            return self.rules.clone();
        };
        let bucket = self.by_head.get(&head).map(Vec::as_slice).unwrap_or(&[]);

        // Merge two sorted position lists to keep declaration order.
        let mut out = Vec::with_capacity(bucket.len() + self.wildcard.len());
        let (mut i, mut j) = (0, 0);
        while i < bucket.len() || j < self.wildcard.len() {
            let take_bucket = j >= self.wildcard.len() || (i < bucket.len() && bucket[i] < self.wildcard[j]);
            let pos = if take_bucket {
                i += 1;
                bucket[i - 1]
            } else {
                j += 1;
                self.wildcard[j - 1]
            };
            out.push(self.rules[pos].clone());
        }
        out
    }
}

fn head_of(term: TermId, k_cell: Label, terms: &TermStore) -> Option<Head> {
    let contents = terms.cell_contents(term, k_cell);
    let [content] = contents.as_slice() else {
        return None;
    };
    let items = terms.kseq_items(*content);
    let Some(first) = items.first() else {
        return Some(Head::Empty);
    };
    match terms.resolve(*first)? {
        Term::App(label, _) => Some(Head::Ctor(label)),
        Term::Int(_) => Some(Head::Int),
        Term::Bool(_) => Some(Head::Bool),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Sort;
    use crate::test_utils::{constant_rule, increment_rule, k_config, setup};

    #[test]
    fn head_index_filters_by_constructor() {
        let (symbols, terms) = setup();
        let k = symbols.intern("k");
        let ab = constant_rule(0, "a", "b", &symbols, &terms);
        let cd = constant_rule(1, "c", "d", &symbols, &terms);
        let inc = increment_rule(2, 3, &symbols, &terms);
        let index = HeadIndex::new(vec![ab.clone(), cd, inc.clone()], k, &terms);
        assert_eq!(index.heads(), 2);

        let subject = ConstrainedTerm::of(k_config(k, terms.app0(symbols.intern("a")), &terms));
        let ids: Vec<_> = index.candidate_rules(&subject, &terms).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![ab.id, inc.id]);
    }

    #[test]
    fn head_index_keeps_declaration_order() {
        let (symbols, terms) = setup();
        let k = symbols.intern("k");
        let inc = increment_rule(0, 3, &symbols, &terms);
        let ab = constant_rule(1, "a", "b", &symbols, &terms);
        let index = HeadIndex::new(vec![inc.clone(), ab.clone()], k, &terms);
        let subject = ConstrainedTerm::of(k_config(k, terms.app0(symbols.intern("a")), &terms));
        let ids: Vec<_> = index.candidate_rules(&subject, &terms).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![inc.id, ab.id]);
    }

    #[test]
    fn symbolic_subject_gets_every_rule() {
        let (symbols, terms) = setup();
        let k = symbols.intern("k");
        let rules = vec![
            constant_rule(0, "a", "b", &symbols, &terms),
            constant_rule(1, "c", "d", &symbols, &terms),
        ];
        let index = HeadIndex::new(rules, k, &terms);
        let subject = ConstrainedTerm::of(k_config(k, terms.var(0, Sort::K), &terms));
        assert_eq!(index.candidate_rules(&subject, &terms).len(), 2);
    }

    #[test]
    fn all_rules_returns_everything() {
        let (symbols, terms) = setup();
        let index = AllRules::new(vec![constant_rule(0, "a", "b", &symbols, &terms)]);
        let subject = ConstrainedTerm::of(terms.int(0));
        assert_eq!(index.candidate_rules(&subject, &terms).len(), 1);
    }
}
