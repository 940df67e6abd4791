//! Rewrite rules and their compiled fast-rewriting form.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{EngineError, EngineResult};
use crate::symbol::Label;
use crate::term::{Term, TermId, TermStore, Var};

/// Priority of rules that carry no explicit priority attribute.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Priority of `owise` rules: tried only after every default rule failed.
pub const OWISE_PRIORITY: i32 = 200;

/// Stable identity of a rule within a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a rule was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            f.write_str("<generated>")
        } else {
            write!(f, "{}:{}:{}", self.source, self.line, self.column)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleAttributes {
    pub tags: SmallVec<[String; 2]>,
    pub priority: i32,
}

impl Default for RuleAttributes {
    fn default() -> Self {
        Self {
            tags: SmallVec::new(),
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// One step of the compiled right-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildInstruction {
    /// Replace the content of the named top-level cell by the instantiated
    /// template.
    Replace { cell: Label, template: TermId },
}

/// Cell-level view of a rule whose both sides are cell collections.
///
/// `read_cells` over-approximates what the left-hand side inspects (every
/// cell it names); `write_cells` is exactly the set of cells whose content
/// the right-hand side changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastRewrite {
    read_cells: SmallVec<[Label; 4]>,
    write_cells: SmallVec<[Label; 4]>,
    instructions: Vec<BuildInstruction>,
}

impl FastRewrite {
    /// Compile `lhs => rhs`. Both sides must be bags naming the same
    /// top-level cells, each at most once, with the same rest variable.
    pub fn compile(lhs: TermId, rhs: TermId, terms: &TermStore) -> Option<FastRewrite> {
        let (left_cells, left_rest) = top_cells(lhs, terms)?;
        let (right_cells, right_rest) = top_cells(rhs, terms)?;
        if left_rest != right_rest || left_cells.len() != right_cells.len() {
            return None;
        }

        let mut read_cells = SmallVec::new();
        let mut write_cells = SmallVec::new();
        let mut instructions = Vec::new();
        for (label, before) in left_cells.iter() {
            let (_, after) = right_cells.iter().find(|(l, _)| l == label)?;
            read_cells.push(*label);
            if before != after {
                write_cells.push(*label);
                instructions.push(BuildInstruction::Replace {
                    cell: *label,
                    template: *after,
                });
            }
        }
        Some(FastRewrite {
            read_cells,
            write_cells,
            instructions,
        })
    }

    pub fn read_cells(&self) -> &[Label] {
        &self.read_cells
    }

    pub fn write_cells(&self) -> &[Label] {
        &self.write_cells
    }

    pub fn instructions(&self) -> &[BuildInstruction] {
        &self.instructions
    }
}

/// Top-level cells of a bag as (label, content), plus its rest variable.
/// `None` if the term is not a bag, repeats a label or has a non-cell item
/// other than the rest variable.
fn top_cells(bag: TermId, terms: &TermStore) -> Option<(SmallVec<[(Label, TermId); 4]>, Option<Var>)> {
    let Term::Bag(items) = terms.resolve(bag)? else {
        return None;
    };
    let mut cells: SmallVec<[(Label, TermId); 4]> = SmallVec::new();
    let mut rest = None;
    for item in items {
        match terms.resolve(item)? {
            Term::Cell(label, content) => {
                if cells.iter().any(|(l, _)| *l == label) {
                    return None;
                }
                cells.push((label, content));
            }
            Term::Var(v) if rest.is_none() => rest = Some(v),
            _ => return None,
        }
    }
    Some((cells, rest))
}

/// A conditional rewrite rule `lhs => rhs requires .. ensures ..`.
///
/// Rules are shared as `Arc<Rule>`; equality and hashing use the id only.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: RuleId,
    pub label: Option<String>,
    pub location: SourceLocation,
    pub lhs: TermId,
    pub rhs: TermId,
    pub requires: Vec<TermId>,
    pub ensures: Vec<TermId>,
    /// Placeholders bound to fresh values each time the rule fires.
    pub fresh_constants: Vec<Var>,
    /// Equalities that must hold for the rule to match.
    pub lookups: Vec<(TermId, TermId)>,
    pub attributes: RuleAttributes,
    matching_vars: Vec<Var>,
    variables: Vec<Var>,
    fast: Option<FastRewrite>,
}

impl Rule {
    /// Variables bound by matching the left-hand side and lookups.
    pub fn matching_vars(&self) -> &[Var] {
        &self.matching_vars
    }

    /// Every variable the rule mentions.
    pub fn variables(&self) -> &[Var] {
        &self.variables
    }

    pub fn fast(&self) -> Option<&FastRewrite> {
        self.fast.as_ref()
    }

    pub fn read_cells(&self) -> Option<&[Label]> {
        self.fast.as_ref().map(FastRewrite::read_cells)
    }

    pub fn write_cells(&self) -> Option<&[Label]> {
        self.fast.as_ref().map(FastRewrite::write_cells)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.attributes.tags.iter().any(|t| t == tag)
    }

    pub fn priority(&self) -> i32 {
        self.attributes.priority
    }

    /// Label if present, otherwise the id.
    pub fn describe(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("rule {}", self.id),
        }
    }

    /// Reject rules whose fresh placeholders also occur on the left-hand
    /// side: a matched variable cannot be re-bound to a fresh value.
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(v) = self.fresh_constants.iter().find(|v| self.matching_vars.contains(v)) {
            return Err(EngineError::MalformedRule {
                message: format!(
                    "{} at {}: fresh variable {} is bound by the left-hand side",
                    self.describe(),
                    self.location,
                    v.index
                ),
            });
        }
        Ok(())
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Incremental construction of a [`Rule`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    id: RuleId,
    label: Option<String>,
    location: SourceLocation,
    lhs: TermId,
    rhs: TermId,
    requires: Vec<TermId>,
    ensures: Vec<TermId>,
    fresh_constants: Vec<Var>,
    lookups: Vec<(TermId, TermId)>,
    attributes: RuleAttributes,
    compile_fast: bool,
}

impl RuleBuilder {
    pub fn new(id: u32, lhs: TermId, rhs: TermId) -> Self {
        Self {
            id: RuleId(id),
            label: None,
            location: SourceLocation::default(),
            lhs,
            rhs,
            requires: Vec::new(),
            ensures: Vec::new(),
            fresh_constants: Vec::new(),
            lookups: Vec::new(),
            attributes: RuleAttributes::default(),
            compile_fast: true,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn location(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.location = SourceLocation {
            source: source.into(),
            line,
            column,
        };
        self
    }

    pub fn requires(mut self, condition: TermId) -> Self {
        self.requires.push(condition);
        self
    }

    pub fn ensures(mut self, condition: TermId) -> Self {
        self.ensures.push(condition);
        self
    }

    pub fn fresh(mut self, var: Var) -> Self {
        self.fresh_constants.push(var);
        self
    }

    pub fn lookup(mut self, left: TermId, right: TermId) -> Self {
        self.lookups.push((left, right));
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.attributes.tags.push(tag.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.attributes.priority = priority;
        self
    }

    pub fn owise(self) -> Self {
        self.priority(OWISE_PRIORITY)
    }

    /// Skip the fast-rewriting form even when the rule qualifies.
    pub fn without_fast_form(mut self) -> Self {
        self.compile_fast = false;
        self
    }

    pub fn build(self, terms: &TermStore) -> Rule {
        let mut matching_vars = terms.variables(self.lhs);
        for (a, b) in self.lookups.iter() {
            terms.collect_variables(*a, &mut matching_vars);
            terms.collect_variables(*b, &mut matching_vars);
        }

        let mut variables = matching_vars.clone();
        terms.collect_variables(self.rhs, &mut variables);
        for t in self.requires.iter().chain(self.ensures.iter()) {
            terms.collect_variables(*t, &mut variables);
        }
        for v in self.fresh_constants.iter() {
            if !variables.contains(v) {
                variables.push(*v);
            }
        }

        let fast = if self.compile_fast {
            FastRewrite::compile(self.lhs, self.rhs, terms)
        } else {
            None
        };

        Rule {
            id: self.id,
            label: self.label,
            location: self.location,
            lhs: self.lhs,
            rhs: self.rhs,
            requires: self.requires,
            ensures: self.ensures,
            fresh_constants: self.fresh_constants,
            lookups: self.lookups,
            attributes: self.attributes,
            matching_vars,
            variables,
            fast,
        }
    }
}

#[cfg(test)]
#[path = "tests/rule.rs"]
mod tests;
