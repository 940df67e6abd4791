use crate::symbol::{Label, SymbolStore};
use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

/// Unique identifier for a term in the term store.
/// Structurally equal terms share the same TermId.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TermId(u32);

impl TermId {
    /// Get the raw u32 value (for debugging/display).
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Sorts of the configuration language.
///
/// `Int` and `Bool` are subsorts of `KItem`, which is a subsort of `K`.
/// `Bag` stands apart: it is the sort of cell collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Sort {
    Int,
    Bool,
    KItem,
    K,
    Bag,
}

impl Sort {
    /// Can a term of sort `other` be bound to a variable of this sort?
    pub fn admits(self, other: Sort) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (Sort::KItem, Sort::Int | Sort::Bool) => true,
            (Sort::K, s) => s != Sort::Bag,
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Sort::Int => "Int",
            Sort::Bool => "Bool",
            Sort::KItem => "KItem",
            Sort::K => "K",
            Sort::Bag => "Bag",
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A logical variable. Identity is the index; the sort restricts bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Var {
    pub index: u32,
    pub sort: Sort,
}

impl Var {
    pub fn new(index: u32, sort: Sort) -> Self {
        Self { index, sort }
    }
}

/// Built-in functions. An `Op` term folds to a literal once its
/// arguments are literals (see `eval`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Not,
}

impl Op {
    pub fn result_sort(self) -> Sort {
        match self {
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => Sort::Int,
            _ => Sort::Bool,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Op::Not => 1,
            _ => 2,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+Int",
            Op::Sub => "-Int",
            Op::Mul => "*Int",
            Op::Div => "/Int",
            Op::Mod => "%Int",
            Op::Lt => "<Int",
            Op::Le => "<=Int",
            Op::Gt => ">Int",
            Op::Ge => ">=Int",
            Op::Eq => "==K",
            Op::Ne => "=/=K",
            Op::And => "andBool",
            Op::Or => "orBool",
            Op::Not => "notBool",
        }
    }
}

/// A configuration term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Var(Var),
    Int(i64),
    Bool(bool),
    /// Constructor application.
    App(Label, SmallVec<[TermId; 4]>),
    /// Built-in function application.
    Op(Op, SmallVec<[TermId; 2]>),
    /// A labelled configuration cell.
    Cell(Label, TermId),
    /// Cell collection in canonical (TermId) order. May hold one `Bag` variable.
    Bag(SmallVec<[TermId; 4]>),
    /// Flattened continuation sequence; never a singleton.
    KSeq(SmallVec<[TermId; 4]>),
}

impl Term {
    /// Direct subterms, in order.
    pub fn children(&self) -> SmallVec<[TermId; 4]> {
        match self {
            Term::Var(_) | Term::Int(_) | Term::Bool(_) => SmallVec::new(),
            Term::App(_, kids) | Term::Bag(kids) | Term::KSeq(kids) => kids.clone(),
            Term::Op(_, args) => args.iter().copied().collect(),
            Term::Cell(_, content) => smallvec::smallvec![*content],
        }
    }
}

/// Indices at or above this value are reserved for generated variables.
pub const FRESH_VAR_BASE: u32 = 1 << 24;

/// Number of shards for hashcons maps (power of 2 for fast modulo).
const NUM_SHARDS: usize = 16;

/// Thread-safe term store with hashconsing.
///
/// Guarantees:
/// - Structurally equal terms get the same TermId
/// - TermId can be resolved back to the term
/// - `Bag` and `KSeq` terms are normalized on construction, so the
///   TermId is a structural identity for configurations too
pub struct TermStore {
    nodes: RwLock<Vec<Term>>,
    shards: [RwLock<HashMap<Term, TermId>>; NUM_SHARDS],
    next_id: AtomicU32,
    next_fresh: AtomicU32,
}

impl TermStore {
    pub fn new() -> Self {
        let shards = std::array::from_fn(|_| RwLock::new(HashMap::new()));
        Self {
            nodes: RwLock::new(Vec::new()),
            shards,
            next_id: AtomicU32::new(0),
            next_fresh: AtomicU32::new(FRESH_VAR_BASE),
        }
    }

    fn intern(&self, term: Term) -> TermId {
        let shard = &self.shards[Self::shard_index(&term)];

        {
            let map = shard.read();
            if let Some(&id) = map.get(&term) {
                return id;
            }
        }

        let mut map = shard.write();
        // Double-check after acquiring write lock
        if let Some(&id) = map.get(&term) {
            return id;
        }

        let id = TermId(self.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut nodes = self.nodes.write();
            let idx = id.0 as usize;
            if nodes.len() <= idx {
                nodes.resize(idx + 1, Term::Bool(false)); // placeholder
            }
            nodes[idx] = term.clone();
        }
        map.insert(term, id);
        id
    }

    fn shard_index(term: &Term) -> usize {
        let mut hasher = FxHasher::default();
        term.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    // ========== CONSTRUCTORS ==========

    /// Create a variable term with an explicit index.
    pub fn var(&self, index: u32, sort: Sort) -> TermId {
        debug_assert!(index < FRESH_VAR_BASE, "index reserved for fresh variables");
        self.intern(Term::Var(Var::new(index, sort)))
    }

    pub fn var_term(&self, var: Var) -> TermId {
        self.intern(Term::Var(var))
    }

    /// Allocate a variable that no other caller has seen.
    pub fn fresh_var(&self, sort: Sort) -> Var {
        Var::new(self.next_fresh.fetch_add(1, Ordering::Relaxed), sort)
    }

    pub fn int(&self, value: i64) -> TermId {
        self.intern(Term::Int(value))
    }

    pub fn bool(&self, value: bool) -> TermId {
        self.intern(Term::Bool(value))
    }

    pub fn app(&self, label: Label, children: SmallVec<[TermId; 4]>) -> TermId {
        self.intern(Term::App(label, children))
    }

    pub fn app0(&self, label: Label) -> TermId {
        self.app(label, SmallVec::new())
    }

    pub fn app1(&self, label: Label, child: TermId) -> TermId {
        self.app(label, smallvec::smallvec![child])
    }

    pub fn app2(&self, label: Label, left: TermId, right: TermId) -> TermId {
        self.app(label, smallvec::smallvec![left, right])
    }

    /// Arity is not checked here; evaluation rejects ill-formed applications.
    pub fn op(&self, op: Op, args: SmallVec<[TermId; 2]>) -> TermId {
        self.intern(Term::Op(op, args))
    }

    pub fn op2(&self, op: Op, left: TermId, right: TermId) -> TermId {
        self.op(op, smallvec::smallvec![left, right])
    }

    pub fn not(&self, arg: TermId) -> TermId {
        self.op(Op::Not, smallvec::smallvec![arg])
    }

    pub fn cell(&self, label: Label, content: TermId) -> TermId {
        self.intern(Term::Cell(label, content))
    }

    /// Build a cell collection. Nested bags are spliced and the items sorted.
    pub fn bag(&self, items: impl IntoIterator<Item = TermId>) -> TermId {
        let mut flat: SmallVec<[TermId; 4]> = SmallVec::new();
        for item in items {
            match self.resolve(item) {
                Some(Term::Bag(inner)) => flat.extend(inner),
                _ => flat.push(item),
            }
        }
        flat.sort_unstable();
        self.intern(Term::Bag(flat))
    }

    /// Build a continuation sequence. Nested sequences are spliced; a
    /// singleton sequence is its only item.
    pub fn kseq(&self, items: impl IntoIterator<Item = TermId>) -> TermId {
        let mut flat: SmallVec<[TermId; 4]> = SmallVec::new();
        for item in items {
            match self.resolve(item) {
                Some(Term::KSeq(inner)) => flat.extend(inner),
                _ => flat.push(item),
            }
        }
        if flat.len() == 1 {
            return flat[0];
        }
        self.intern(Term::KSeq(flat))
    }

    /// The empty continuation `.K`.
    pub fn dot_k(&self) -> TermId {
        self.intern(Term::KSeq(SmallVec::new()))
    }

    /// Rebuild `term` with new children, going through the normalizing
    /// constructors.
    pub fn with_children(&self, term: &Term, kids: SmallVec<[TermId; 4]>) -> TermId {
        match term {
            Term::Var(_) | Term::Int(_) | Term::Bool(_) => self.intern(term.clone()),
            Term::App(label, _) => self.app(*label, kids),
            Term::Op(op, _) => self.op(*op, kids.into_iter().collect()),
            Term::Cell(label, _) => self.cell(*label, kids[0]),
            Term::Bag(_) => self.bag(kids),
            Term::KSeq(_) => self.kseq(kids),
        }
    }

    // ========== QUERIES ==========

    /// Resolve a TermId to its term.
    /// Returns None if the TermId is invalid.
    pub fn resolve(&self, id: TermId) -> Option<Term> {
        let nodes = self.nodes.read();
        nodes.get(id.0 as usize).cloned()
    }

    pub fn is_var(&self, id: TermId) -> Option<Var> {
        match self.resolve(id)? {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn sort_of(&self, id: TermId) -> Option<Sort> {
        Some(match self.resolve(id)? {
            Term::Var(v) => v.sort,
            Term::Int(_) => Sort::Int,
            Term::Bool(_) => Sort::Bool,
            Term::App(_, _) => Sort::KItem,
            Term::Op(op, _) => op.result_sort(),
            Term::Cell(_, _) | Term::Bag(_) => Sort::Bag,
            Term::KSeq(_) => Sort::K,
        })
    }

    /// Variables of a term in first-occurrence order, without duplicates.
    pub fn variables(&self, id: TermId) -> Vec<Var> {
        let mut out = Vec::new();
        self.collect_variables(id, &mut out);
        out
    }

    pub fn collect_variables(&self, id: TermId, out: &mut Vec<Var>) {
        let mut stack: SmallVec<[TermId; 16]> = SmallVec::new();
        stack.push(id);
        while let Some(t) = stack.pop() {
            match self.resolve(t) {
                Some(Term::Var(v)) => {
                    if !out.contains(&v) {
                        out.push(v);
                    }
                }
                Some(term) => {
                    for child in term.children().iter().rev() {
                        stack.push(*child);
                    }
                }
                None => {}
            }
        }
    }

    pub fn is_ground(&self, id: TermId) -> bool {
        self.variables(id).is_empty()
    }

    /// Does `var` occur in `id`?
    pub fn occurs(&self, var: Var, id: TermId) -> bool {
        let mut stack: SmallVec<[TermId; 16]> = SmallVec::new();
        stack.push(id);
        while let Some(t) = stack.pop() {
            match self.resolve(t) {
                Some(Term::Var(v)) if v == var => return true,
                Some(term) => stack.extend(term.children()),
                None => {}
            }
        }
        false
    }

    /// Contents of every cell named `label`, searching through nested
    /// cells and collections.
    pub fn cell_contents(&self, id: TermId, label: Label) -> Vec<TermId> {
        let mut out = Vec::new();
        let mut stack: SmallVec<[TermId; 8]> = SmallVec::new();
        stack.push(id);
        while let Some(t) = stack.pop() {
            match self.resolve(t) {
                Some(Term::Cell(l, content)) => {
                    if l == label {
                        out.push(content);
                    } else {
                        stack.push(content);
                    }
                }
                Some(Term::Bag(items)) => {
                    for item in items.iter().rev() {
                        stack.push(*item);
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Split a continuation into its items and its trailing `K` frame
    /// variable, if it has one.
    pub fn split_frame(&self, id: TermId) -> (TermId, Option<Var>) {
        match self.resolve(id) {
            Some(Term::Var(v)) if v.sort == Sort::K => (self.dot_k(), Some(v)),
            Some(Term::KSeq(items)) => match items.last().and_then(|last| self.is_var(*last)) {
                Some(v) if v.sort == Sort::K => {
                    (self.kseq(items[..items.len() - 1].iter().copied()), Some(v))
                }
                _ => (id, None),
            },
            _ => (id, None),
        }
    }

    /// Items of a continuation; a non-sequence term is a singleton.
    pub fn kseq_items(&self, id: TermId) -> SmallVec<[TermId; 4]> {
        match self.resolve(id) {
            Some(Term::KSeq(items)) => items,
            _ => smallvec::smallvec![id],
        }
    }

    /// Number of terms interned so far.
    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TermStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a term in K-like concrete syntax.
pub fn format_term(term: TermId, terms: &TermStore, symbols: &SymbolStore) -> Result<String, String> {
    fn render(
        term: TermId,
        terms: &TermStore,
        symbols: &SymbolStore,
        out: &mut String,
    ) -> Result<(), String> {
        let resolved = terms
            .resolve(term)
            .ok_or_else(|| format!("Unknown term id {:?}", term))?;
        match resolved {
            Term::Var(v) => {
                if v.index >= FRESH_VAR_BASE {
                    out.push_str(&format!("_{}:{}", v.index - FRESH_VAR_BASE, v.sort));
                } else {
                    out.push_str(&format!("V{}:{}", v.index, v.sort));
                }
            }
            Term::Int(n) => out.push_str(&n.to_string()),
            Term::Bool(b) => out.push_str(if b { "true" } else { "false" }),
            Term::App(label, kids) => {
                let name = symbols
                    .resolve(label)
                    .ok_or_else(|| format!("Unknown symbol for label {:?}", label))?;
                out.push_str(name);
                if !kids.is_empty() {
                    out.push('(');
                    for (i, kid) in kids.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        render(*kid, terms, symbols, out)?;
                    }
                    out.push(')');
                }
            }
            Term::Op(op, args) => {
                out.push('(');
                match args.as_slice() {
                    [arg] => {
                        out.push_str(op.symbol());
                        out.push(' ');
                        render(*arg, terms, symbols, out)?;
                    }
                    [left, right] => {
                        render(*left, terms, symbols, out)?;
                        out.push(' ');
                        out.push_str(op.symbol());
                        out.push(' ');
                        render(*right, terms, symbols, out)?;
                    }
                    _ => return Err(format!("{} applied to {} arguments", op.symbol(), args.len())),
                }
                out.push(')');
            }
            Term::Cell(label, content) => {
                let name = symbols
                    .resolve(label)
                    .ok_or_else(|| format!("Unknown symbol for label {:?}", label))?;
                out.push_str(&format!("<{}> ", name));
                render(content, terms, symbols, out)?;
                out.push_str(&format!(" </{}>", name));
            }
            Term::Bag(items) => {
                if items.is_empty() {
                    out.push_str(".Bag");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    render(*item, terms, symbols, out)?;
                }
            }
            Term::KSeq(items) => {
                if items.is_empty() {
                    out.push_str(".K");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" ~> ");
                    }
                    render(*item, terms, symbols, out)?;
                }
            }
        }
        Ok(())
    }

    let mut out = String::new();
    render(term, terms, symbols, &mut out)?;
    Ok(out)
}

#[cfg(test)]
#[path = "tests/term.rs"]
mod tests;
