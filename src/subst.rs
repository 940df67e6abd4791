use crate::term::{Term, TermId, TermStore, Var};
use smallvec::SmallVec;

/// A substitution maps variables to terms.
///
/// Bindings are kept sorted by variable so that two substitutions with the
/// same bindings are equal and hash alike; constrained terms rely on this
/// when they are used as visited-set keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Subst {
    bindings: SmallVec<[(Var, TermId); 4]>,
}

impl Subst {
    pub fn new() -> Self {
        Self {
            bindings: SmallVec::new(),
        }
    }

    /// Bind a variable to a term, replacing any previous binding.
    pub fn bind(&mut self, var: Var, term: TermId) {
        match self.bindings.binary_search_by(|(v, _)| v.cmp(&var)) {
            Ok(pos) => self.bindings[pos].1 = term,
            Err(pos) => self.bindings.insert(pos, (var, term)),
        }
    }

    pub fn get(&self, var: Var) -> Option<TermId> {
        self.bindings
            .binary_search_by(|(v, _)| v.cmp(&var))
            .ok()
            .map(|pos| self.bindings[pos].1)
    }

    pub fn is_bound(&self, var: Var) -> bool {
        self.get(var).is_some()
    }

    pub fn remove(&mut self, var: Var) -> Option<TermId> {
        match self.bindings.binary_search_by(|(v, _)| v.cmp(&var)) {
            Ok(pos) => Some(self.bindings.remove(pos).1),
            Err(_) => None,
        }
    }

    /// Keep only the bindings for which `keep` holds.
    pub fn retain(&mut self, mut keep: impl FnMut(Var, TermId) -> bool) {
        self.bindings.retain(|(v, t)| keep(*v, *t));
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Iterator over (variable, term) pairs, ordered by variable.
    pub fn iter(&self) -> impl Iterator<Item = (Var, TermId)> + '_ {
        self.bindings.iter().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = Var> + '_ {
        self.bindings.iter().map(|(v, _)| *v)
    }

    /// Substitution restricted to `vars`.
    pub fn restrict(&self, vars: &[Var]) -> Subst {
        let mut out = self.clone();
        out.retain(|v, _| vars.contains(&v));
        out
    }

    /// A renaming of `vars` to freshly allocated variables of the same sort.
    pub fn fresh_renaming(vars: &[Var], terms: &TermStore) -> Subst {
        let mut out = Subst::new();
        for var in vars {
            out.bind(*var, terms.var_term(terms.fresh_var(var.sort)));
        }
        out
    }

    /// Apply this substitution to every bound term, making it idempotent
    /// when the bindings are acyclic.
    pub fn normalize(&mut self, terms: &TermStore) {
        let snapshot = self.clone();
        for entry in self.bindings.iter_mut() {
            entry.1 = apply_subst(entry.1, &snapshot, terms);
        }
    }
}

impl FromIterator<(Var, TermId)> for Subst {
    fn from_iter<I: IntoIterator<Item = (Var, TermId)>>(iter: I) -> Self {
        let mut out = Subst::new();
        for (v, t) in iter {
            out.bind(v, t);
        }
        out
    }
}

/// Apply a substitution to a term, returning a new term.
/// Variables bound in the substitution are replaced by their bound terms.
/// Unbound variables remain as variables.
/// Variable chains are followed iteratively to avoid looping on cycles.
///
/// Uses explicit stack to avoid recursion.
pub fn apply_subst(term: TermId, subst: &Subst, terms: &TermStore) -> TermId {
    if subst.is_empty() {
        return term;
    }

    // Stack contains (term, children_processed)
    let mut work_stack: Vec<(TermId, bool)> = vec![(term, false)];
    let mut result_stack: Vec<TermId> = Vec::new();

    while let Some((tid, children_done)) = work_stack.pop() {
        let Some(resolved) = terms.resolve(tid) else {
            // Invalid term - just keep it
            result_stack.push(tid);
            continue;
        };
        if children_done {
            let n = resolved.children().len();
            let new_children: SmallVec<[TermId; 4]> =
                result_stack.drain(result_stack.len() - n..).collect();
            result_stack.push(terms.with_children(&resolved, new_children));
            continue;
        }
        match resolved {
            Term::Var(_) => {
                let target = resolve_var_chain(tid, subst, terms);
                if target == tid || terms.is_var(target).is_some() {
                    result_stack.push(target);
                } else {
                    work_stack.push((target, false));
                }
            }
            other => {
                let kids = other.children();
                if kids.is_empty() {
                    result_stack.push(tid);
                } else {
                    work_stack.push((tid, true));
                    // Push children in reverse order so leftmost is processed first
                    for child in kids.iter().rev() {
                        work_stack.push((*child, false));
                    }
                }
            }
        }
    }

    debug_assert_eq!(result_stack.len(), 1);
    result_stack.pop().unwrap_or(term)
}

/// Follow a chain of variable bindings until we hit a non-variable,
/// an unbound variable, or a cycle.
fn resolve_var_chain(start: TermId, subst: &Subst, terms: &TermStore) -> TermId {
    let mut current = start;
    let mut visited: SmallVec<[Var; 8]> = SmallVec::new();

    while let Some(var) = terms.is_var(current) {
        if visited.contains(&var) {
            return current;
        }
        visited.push(var);
        match subst.get(var) {
            Some(bound) => current = bound,
            None => return current,
        }
    }
    current
}

#[cfg(test)]
#[path = "tests/subst.rs"]
mod tests;
