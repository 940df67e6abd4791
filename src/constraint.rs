use smallvec::SmallVec;

use crate::error::EngineResult;
use crate::eval::{evaluate, substitute_and_evaluate};
use crate::matching::{match_pattern, residual_conditions};
use crate::solver::Solver;
use crate::subst::{apply_subst, Subst};
use crate::symbol::SymbolStore;
use crate::term::{format_term, Op, Term, TermId, TermStore, Var};
use crate::unify::{unify, Unification};

/// Upper bound on simplification rounds; each round binds a variable or
/// drops an equality, so this is only reached by pathological inputs.
const MAX_SIMPLIFY_ROUNDS: usize = 64;

/// A conjunction of equalities and boolean predicates together with the
/// substitution the equalities have been solved into.
///
/// Values are immutable in spirit: every operation consumes the formula and
/// returns the updated one. Equality and hashing are structural so that
/// constrained terms can be visited-set keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConjunctiveFormula {
    subst: Subst,
    equalities: SmallVec<[(TermId, TermId); 2]>,
    predicates: SmallVec<[TermId; 2]>,
    falsified: bool,
}

impl ConjunctiveFormula {
    /// The trivially true formula.
    pub fn top() -> Self {
        Self::default()
    }

    /// The false formula.
    pub fn bottom() -> Self {
        Self {
            falsified: true,
            ..Self::default()
        }
    }

    pub fn substitution(&self) -> &Subst {
        &self.subst
    }

    pub fn equalities(&self) -> &[(TermId, TermId)] {
        &self.equalities
    }

    pub fn predicates(&self) -> &[TermId] {
        &self.predicates
    }

    pub fn is_false(&self) -> bool {
        self.falsified
    }

    pub fn is_true(&self) -> bool {
        !self.falsified && self.subst.is_empty() && self.equalities.is_empty() && self.predicates.is_empty()
    }

    /// Conjoin a boolean predicate.
    pub fn add(mut self, predicate: TermId) -> Self {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
        self
    }

    pub fn add_all(self, predicates: impl IntoIterator<Item = TermId>) -> Self {
        predicates.into_iter().fold(self, |f, p| f.add(p))
    }

    /// Conjoin `var = term`.
    pub fn add_binding(mut self, var: Var, term: TermId) -> Self {
        match self.subst.get(var) {
            Some(existing) if existing != term => self.equalities.push((existing, term)),
            Some(_) => {}
            None => self.subst.bind(var, term),
        }
        self
    }

    /// Conjoin `left = right`.
    pub fn add_equality(mut self, left: TermId, right: TermId) -> Self {
        if left != right && !self.equalities.contains(&(left, right)) {
            self.equalities.push((left, right));
        }
        self
    }

    /// Conjoin the outcome of a unification.
    pub fn add_unification(self, unification: &Unification) -> Self {
        let with_bindings = unification
            .subst
            .iter()
            .fold(self, |f, (v, t)| f.add_binding(v, t));
        unification
            .residual
            .iter()
            .fold(with_bindings, |f, (a, b)| f.add_equality(*a, *b))
    }

    /// Conjunction of two formulas.
    pub fn and(self, other: &ConjunctiveFormula) -> Self {
        if other.falsified {
            return Self::bottom();
        }
        let with_bindings = other.subst.iter().fold(self, |f, (v, t)| f.add_binding(v, t));
        let with_equalities = other
            .equalities
            .iter()
            .fold(with_bindings, |f, (a, b)| f.add_equality(*a, *b));
        with_equalities.add_all(other.predicates.iter().copied())
    }

    /// Solve equalities into the substitution, evaluate predicates and drop
    /// the ones that hold. Evaluation errors propagate.
    pub fn simplify(mut self, terms: &TermStore) -> EngineResult<Self> {
        if self.falsified {
            return Ok(Self::bottom());
        }

        for _ in 0..MAX_SIMPLIFY_ROUNDS {
            let mut changed = false;
            self.subst.normalize(terms);

            let pending = std::mem::take(&mut self.equalities);
            for (a, b) in pending {
                let a = substitute_and_evaluate(a, &self.subst, terms)?;
                let b = substitute_and_evaluate(b, &self.subst, terms)?;
                if a == b {
                    changed = true;
                    continue;
                }
                match unify(a, b, terms) {
                    None => return Ok(Self::bottom()),
                    Some(u) if u.subst.is_empty() && u.residual.as_slice() == [(a, b)] => {
                        if !self.equalities.contains(&(a, b)) {
                            self.equalities.push((a, b));
                        }
                    }
                    Some(u) => {
                        changed = true;
                        for (v, t) in u.subst.iter() {
                            self.subst.bind(v, t);
                        }
                        self.equalities.extend(u.residual);
                    }
                }
            }

            let pending = std::mem::take(&mut self.predicates);
            for p in pending {
                let p = substitute_and_evaluate(p, &self.subst, terms)?;
                match terms.resolve(p) {
                    Some(Term::Bool(true)) => changed = true,
                    Some(Term::Bool(false)) => return Ok(Self::bottom()),
                    Some(Term::Op(Op::Eq, args)) => {
                        changed = true;
                        self.equalities.push((args[0], args[1]));
                    }
                    Some(Term::Op(Op::And, args)) => {
                        changed = true;
                        self.predicates.extend(args);
                    }
                    _ => {
                        if !self.predicates.contains(&p) {
                            self.predicates.push(p);
                        }
                    }
                }
            }

            if !changed {
                break;
            }
        }
        // Order-insensitive conjuncts, so equal formulas hash alike.
        self.equalities.sort_unstable();
        self.equalities.dedup();
        self.predicates.sort_unstable();
        self.predicates.dedup();
        Ok(self)
    }

    /// Every conjunct as a boolean term: bindings and equalities become
    /// `==K` predicates.
    pub fn as_predicates(&self, terms: &TermStore) -> Vec<TermId> {
        let mut out = Vec::with_capacity(self.subst.len() + self.equalities.len() + self.predicates.len());
        if self.falsified {
            out.push(terms.bool(false));
        }
        for (v, t) in self.subst.iter() {
            out.push(terms.op2(Op::Eq, terms.var_term(v), t));
        }
        for (a, b) in self.equalities.iter() {
            out.push(terms.op2(Op::Eq, *a, *b));
        }
        out.extend(self.predicates.iter().copied());
        out
    }

    /// Ask the solver whether the formula is unsatisfiable. A formula the
    /// solver cannot refute is assumed satisfiable.
    pub fn check_unsat(&self, solver: &dyn Solver, terms: &TermStore) -> bool {
        self.falsified || solver.check_unsat(&self.as_predicates(terms), terms)
    }

    /// Does this formula entail `other`? Variables of `other` not bound by
    /// this formula's substitution are read as universally shared.
    pub fn implies(&self, other: &ConjunctiveFormula, solver: &dyn Solver, terms: &TermStore) -> EngineResult<bool> {
        if self.falsified {
            return Ok(true);
        }
        if other.falsified {
            return Ok(false);
        }
        let premises = self.as_predicates(terms);
        for goal in other.as_predicates(terms) {
            let goal = substitute_and_evaluate(goal, &self.subst, terms)?;
            match terms.resolve(goal) {
                Some(Term::Bool(true)) => continue,
                Some(Term::Bool(false)) => return Ok(false),
                _ => {
                    if !solver.entails(&premises, goal, terms) {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Apply a variable renaming (or any substitution) to every part of the
    /// formula, including the variables it binds.
    pub fn substitute(&self, renaming: &Subst, terms: &TermStore) -> Self {
        let mut subst = Subst::new();
        for (v, t) in self.subst.iter() {
            let key = renaming
                .get(v)
                .and_then(|r| terms.is_var(r))
                .unwrap_or(v);
            subst.bind(key, apply_subst(t, renaming, terms));
        }
        Self {
            subst,
            equalities: self
                .equalities
                .iter()
                .map(|(a, b)| (apply_subst(*a, renaming, terms), apply_subst(*b, renaming, terms)))
                .collect(),
            predicates: self
                .predicates
                .iter()
                .map(|p| apply_subst(*p, renaming, terms))
                .collect(),
            falsified: self.falsified,
        }
    }

    /// Drop the bindings of the variables selected by `remove`.
    pub fn remove_bindings(mut self, mut remove: impl FnMut(Var) -> bool) -> Self {
        self.subst.retain(|v, _| !remove(v));
        self
    }

    /// Make sure every variable in `vars` that is bound to, rather than
    /// bound by, a variable outside `vars` becomes a key of the
    /// substitution.
    pub fn orient_substitution(mut self, vars: &[Var], terms: &TermStore) -> Self {
        let mut swaps = Subst::new();
        let mut flipped: SmallVec<[Var; 4]> = SmallVec::new();
        for (key, value) in self.subst.iter() {
            if vars.contains(&key) {
                continue;
            }
            if let Some(target) = terms.is_var(value) {
                if vars.contains(&target) && !swaps.is_bound(target) && target.sort.admits(key.sort) {
                    swaps.bind(target, terms.var_term(key));
                    flipped.push(key);
                }
            }
        }
        if swaps.is_empty() {
            return self;
        }

        let mut subst = Subst::new();
        for (key, value) in self.subst.iter() {
            if !flipped.contains(&key) {
                subst.bind(key, apply_subst(value, &swaps, terms));
            }
        }
        for (key, value) in swaps.iter() {
            subst.bind(key, value);
        }
        self.subst = subst;
        for pair in self.equalities.iter_mut() {
            *pair = (apply_subst(pair.0, &swaps, terms), apply_subst(pair.1, &swaps, terms));
        }
        for p in self.predicates.iter_mut() {
            *p = apply_subst(*p, &swaps, terms);
        }
        self
    }

    /// Free and bound variables of the formula.
    pub fn variables(&self, terms: &TermStore) -> Vec<Var> {
        let mut out: Vec<Var> = Vec::new();
        for (v, t) in self.subst.iter() {
            if !out.contains(&v) {
                out.push(v);
            }
            terms.collect_variables(t, &mut out);
        }
        for (a, b) in self.equalities.iter() {
            terms.collect_variables(*a, &mut out);
            terms.collect_variables(*b, &mut out);
        }
        for p in self.predicates.iter() {
            terms.collect_variables(*p, &mut out);
        }
        out
    }

    /// Evaluate the formula's terms without touching its structure.
    pub fn evaluate(mut self, terms: &TermStore) -> EngineResult<Self> {
        for p in self.predicates.iter_mut() {
            *p = evaluate(*p, terms)?;
        }
        Ok(self)
    }

    pub fn format(&self, terms: &TermStore, symbols: &SymbolStore) -> Result<String, String> {
        if self.falsified {
            return Ok("false".into());
        }
        let parts: Vec<String> = self
            .as_predicates(terms)
            .into_iter()
            .map(|p| format_term(p, terms, symbols))
            .collect::<Result<_, _>>()?;
        if parts.is_empty() {
            Ok("true".into())
        } else {
            Ok(parts.join(" /\\ "))
        }
    }
}

/// A term paired with the constraint under which it is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstrainedTerm {
    term: TermId,
    constraint: ConjunctiveFormula,
}

impl ConstrainedTerm {
    pub fn new(term: TermId, constraint: ConjunctiveFormula) -> Self {
        Self { term, constraint }
    }

    /// An unconstrained term.
    pub fn of(term: TermId) -> Self {
        Self::new(term, ConjunctiveFormula::top())
    }

    pub fn term(&self) -> TermId {
        self.term
    }

    pub fn constraint(&self) -> &ConjunctiveFormula {
        &self.constraint
    }

    pub fn into_parts(self) -> (TermId, ConjunctiveFormula) {
        (self.term, self.constraint)
    }

    /// Variables of the term and of the constraint.
    pub fn variables(&self, terms: &TermStore) -> Vec<Var> {
        let mut out = terms.variables(self.term);
        for v in self.constraint.variables(terms) {
            if !out.contains(&v) {
                out.push(v);
            }
        }
        out
    }

    /// Does every instance of `self` fall under `target`? Target variables
    /// not shared with `self` are existential.
    pub fn implies(&self, target: &ConstrainedTerm, solver: &dyn Solver, terms: &TermStore) -> EngineResult<bool> {
        Ok(self.match_implies(target, solver, terms)?.is_some())
    }

    /// Match `pattern` against this term and check that this constraint
    /// entails the pattern's. On success returns this constraint conjoined
    /// with the match, so the pattern's variables are bound.
    pub fn match_implies(
        &self,
        pattern: &ConstrainedTerm,
        solver: &dyn Solver,
        terms: &TermStore,
    ) -> EngineResult<Option<ConjunctiveFormula>> {
        let Some(found) = match_pattern(self.term, pattern.term, terms) else {
            return Ok(None);
        };
        let goal = pattern
            .constraint
            .substitute(&found.subst, terms)
            .add_all(residual_conditions(&found, terms)?);
        if !self.constraint.implies(&goal, solver, terms)? {
            return Ok(None);
        }
        let combined = self.constraint.clone().add_unification(&found).simplify(terms)?;
        Ok((!combined.is_false()).then_some(combined))
    }

    /// Substitute the constraint's bindings into the term and evaluate.
    pub fn expand(&self, terms: &TermStore) -> EngineResult<ConstrainedTerm> {
        let term = substitute_and_evaluate(self.term, self.constraint.substitution(), terms)?;
        Ok(ConstrainedTerm::new(term, self.constraint.clone()))
    }

    pub fn format(&self, terms: &TermStore, symbols: &SymbolStore) -> Result<String, String> {
        let term = format_term(self.term, terms, symbols)?;
        if self.constraint.is_true() {
            Ok(term)
        } else {
            Ok(format!("{} #And {}", term, self.constraint.format(terms, symbols)?))
        }
    }
}

#[cfg(test)]
#[path = "tests/constraint.rs"]
mod tests;
