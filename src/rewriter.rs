//! Entry points: bounded rewriting, bounded breadth-first search and single
//! steps over a fixed definition.
//!
//! A `SymbolicRewriter` is immutable once built. Every call creates its own
//! metrics and disabled-rule map, so concurrent calls on the same rewriter
//! do not interfere.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::builder::EvalCtx;
use crate::config::EngineConfig;
use crate::constraint::ConstrainedTerm;
use crate::definition::Definition;
use crate::error::EngineResult;
use crate::executor::{CellExecutor, RuleExecutor};
use crate::fresh::{CounterFresh, FreshGenerator};
use crate::graph::ExecutionGraph;
use crate::matching::{fails, holds, instantiate_conditions, match_pattern, residual_conditions};
use crate::metrics::{EngineMetrics, MetricsReport};
use crate::observer::RuleObserver;
use crate::prover::{Matchability, UnifyMatchability};
use crate::rule::Rule;
use crate::solver::{BoundsSolver, Solver};
use crate::step::{DisabledRules, StepEngine, StepOutcome};
use crate::subst::Subst;
use crate::symbol::SymbolStore;
use crate::term::TermStore;

#[cfg(feature = "tracing")]
use crate::trace::{debug, info, info_span};

/// Which reachable states `search` tests against the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Only the states reached in exactly one step.
    One,
    /// Every state reached in one or more steps.
    #[default]
    Plain,
    /// Every reachable state, including the initial one.
    Star,
    /// Stuck states, and states at the depth limit.
    Final,
}

#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    /// The last state reached.
    pub state: ConstrainedTerm,
    /// Number of rewrite steps applied.
    pub steps: usize,
    pub graph: Option<ExecutionGraph>,
    pub metrics: MetricsReport,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// One substitution over the pattern's variables per matching state,
    /// in discovery order.
    pub solutions: Vec<Subst>,
    /// Breadth-first rounds completed.
    pub rounds: usize,
    pub graph: Option<ExecutionGraph>,
    pub metrics: MetricsReport,
}

pub struct SymbolicRewriter {
    definition: Definition,
    config: EngineConfig,
    symbols: Arc<SymbolStore>,
    terms: Arc<TermStore>,
    solver: Box<dyn Solver>,
    fresh: Box<dyn FreshGenerator>,
    executor: Box<dyn RuleExecutor>,
    matchability: Box<dyn Matchability>,
    observer: Option<Arc<dyn RuleObserver>>,
}

impl SymbolicRewriter {
    /// A rewriter with the default collaborators: `BoundsSolver`,
    /// `CounterFresh`, `CellExecutor` and `UnifyMatchability`.
    pub fn new(
        definition: Definition,
        config: EngineConfig,
        symbols: Arc<SymbolStore>,
        terms: Arc<TermStore>,
    ) -> Self {
        Self {
            definition,
            config,
            symbols,
            terms,
            solver: Box::new(BoundsSolver),
            fresh: Box::new(CounterFresh::new()),
            executor: Box::new(CellExecutor),
            matchability: Box::new(UnifyMatchability),
            observer: None,
        }
    }

    pub fn with_solver(mut self, solver: Box<dyn Solver>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_fresh(mut self, fresh: Box<dyn FreshGenerator>) -> Self {
        self.fresh = fresh;
        self
    }

    pub fn with_executor(mut self, executor: Box<dyn RuleExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_matchability(mut self, matchability: Box<dyn Matchability>) -> Self {
        self.matchability = matchability;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RuleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn terms(&self) -> &TermStore {
        &self.terms
    }

    pub fn symbols(&self) -> &SymbolStore {
        &self.symbols
    }

    pub(crate) fn matchability(&self) -> &dyn Matchability {
        self.matchability.as_ref()
    }

    pub(crate) fn ctx(&self) -> EvalCtx<'_> {
        EvalCtx {
            terms: &self.terms,
            symbols: &self.symbols,
            solver: self.solver.as_ref(),
            fresh: self.fresh.as_ref(),
            executor: self.executor.as_ref(),
        }
    }

    pub(crate) fn engine<'a>(&'a self, metrics: &'a EngineMetrics) -> StepEngine<'a> {
        StepEngine::new(&self.definition, &self.config, self.ctx(), metrics).with_observer(self.observer.as_deref())
    }

    /// One step from `subject` with no rules disabled.
    pub fn step(&self, subject: &ConstrainedTerm, single_result: bool) -> EngineResult<StepOutcome> {
        let metrics = EngineMetrics::new();
        self.engine(&metrics).step(subject, &FxHashSet::default(), single_result)
    }

    /// Follow the first applicable rule until the state is stuck or
    /// `bound` steps have been taken.
    pub fn rewrite(
        &self,
        initial: ConstrainedTerm,
        bound: Option<usize>,
        compute_graph: bool,
    ) -> EngineResult<RewriteOutcome> {
        #[cfg(feature = "tracing")]
        let _span = info_span!("rewrite", ?bound, compute_graph).entered();

        let metrics = EngineMetrics::new();
        let engine = self.engine(&metrics);
        let mut graph = compute_graph.then(ExecutionGraph::new);
        let mut disabled = DisabledRules::default();

        let mut vertex = graph.as_mut().map(|g| g.add_vertex(initial.clone(), Some(0)));
        metrics.record_state();
        let mut state = initial;
        let mut steps = 0;

        while bound.map_or(true, |b| steps < b) {
            let outcome = engine.step_threaded(&state, &mut disabled, true)?;
            let Some(transition) = outcome.transitions.into_iter().next() else {
                break;
            };
            steps += 1;
            metrics.record_state();
            if let (Some(g), Some(source)) = (graph.as_mut(), vertex) {
                let target = g.add_vertex(transition.state.clone(), Some(steps));
                g.add_edge(source, target, transition.rule.id, transition.subst);
                vertex = Some(target);
            }
            state = transition.state;
        }

        let metrics = metrics.report();
        self.log_statistics("rewrite", &metrics);
        Ok(RewriteOutcome {
            state,
            steps,
            graph,
            metrics,
        })
    }

    /// Breadth-first search for states matching `pattern`.
    ///
    /// `bound` caps the number of solutions and `depth` the number of
    /// transition steps from `initial`. Steps of non-transition classes do
    /// not count towards the depth.
    pub fn search(
        &self,
        initial: ConstrainedTerm,
        pattern: &Rule,
        bound: Option<usize>,
        depth: Option<usize>,
        mode: SearchMode,
        compute_graph: bool,
    ) -> EngineResult<SearchOutcome> {
        #[cfg(feature = "tracing")]
        let _span = info_span!("search", ?mode, ?bound, ?depth).entered();

        let metrics = EngineMetrics::new();
        let engine = self.engine(&metrics);
        let mut graph = compute_graph.then(ExecutionGraph::new);
        let mut solutions = Vec::new();
        let mut rounds = 0;

        let finish = |solutions: Vec<Subst>, rounds: usize, graph: Option<ExecutionGraph>, metrics: &EngineMetrics| {
            let metrics = metrics.report();
            self.log_statistics("search", &metrics);
            SearchOutcome {
                solutions,
                rounds,
                graph,
                metrics,
            }
        };

        if bound == Some(0) {
            return Ok(finish(solutions, rounds, graph, &metrics));
        }
        if let Some(g) = graph.as_mut() {
            g.add_vertex(initial.clone(), None);
        }
        metrics.record_state();

        if depth == Some(0) {
            self.collect_solution(&mut solutions, &initial, pattern, bound)?;
            return Ok(finish(solutions, rounds, graph, &metrics));
        }

        let depth = if mode == SearchMode::One { Some(1) } else { depth };
        if mode == SearchMode::Star && self.collect_solution(&mut solutions, &initial, pattern, bound)? {
            return Ok(finish(solutions, rounds, graph, &metrics));
        }

        let mut visited: FxHashSet<ConstrainedTerm> = FxHashSet::default();
        visited.insert(initial.clone());
        let mut queue: IndexMap<ConstrainedTerm, usize> = IndexMap::new();
        queue.insert(initial, 0);
        let mut disabled = DisabledRules::default();

        'search: while !queue.is_empty() {
            let mut next: IndexMap<ConstrainedTerm, usize> = IndexMap::new();
            for (state, current) in std::mem::take(&mut queue) {
                let mut outcome = engine.step_from(&state, &mut disabled, false)?;
                if outcome.is_stuck()
                    && mode == SearchMode::Final
                    && self.collect_solution(&mut solutions, &state, pattern, bound)?
                {
                    break 'search;
                }

                let source = graph.as_mut().map(|g| g.add_vertex(state.clone(), None));
                for transition in std::mem::take(&mut outcome.transitions) {
                    if let (Some(g), Some(source)) = (graph.as_mut(), source) {
                        let target = g.add_vertex(transition.state.clone(), None);
                        g.add_edge(source, target, transition.rule.id, transition.subst.clone());
                    }

                    if !outcome.transition_class {
                        outcome.carry_to(&transition.state, &transition.state, &mut disabled);
                        next.insert(transition.state, current);
                        break;
                    }

                    let at_limit = depth == Some(current + 1);
                    if !at_limit && visited.insert(transition.state.clone()) {
                        metrics.record_state();
                        outcome.carry_to(&transition.state, &transition.state, &mut disabled);
                        next.insert(transition.state.clone(), current + 1);
                    }
                    if (mode != SearchMode::Final || at_limit)
                        && self.collect_solution(&mut solutions, &transition.state, pattern, bound)?
                    {
                        break 'search;
                    }
                }
            }
            queue = next;
            rounds += 1;

            #[cfg(feature = "tracing")]
            debug!(rounds, frontier = queue.len(), solutions = solutions.len(), "search_round");
        }

        Ok(finish(solutions, rounds, graph, &metrics))
    }

    /// Test `state` against `pattern` and record the match. Returns true
    /// once `bound` solutions have been collected.
    fn collect_solution(
        &self,
        solutions: &mut Vec<Subst>,
        state: &ConstrainedTerm,
        pattern: &Rule,
        bound: Option<usize>,
    ) -> EngineResult<bool> {
        if let Some(found) = self.match_target(state, pattern)? {
            solutions.push(found);
        }
        Ok(bound == Some(solutions.len()))
    }

    /// Match `pattern`'s left-hand side against `state`; its `requires`
    /// must not be refuted by the state's constraint.
    fn match_target(&self, state: &ConstrainedTerm, pattern: &Rule) -> EngineResult<Option<Subst>> {
        let terms = self.terms();
        let Some(found) = match_pattern(state.term(), pattern.lhs, terms) else {
            return Ok(None);
        };
        let mut conditions = residual_conditions(&found, terms)?;
        conditions.extend(instantiate_conditions(&pattern.requires, &found.subst, terms)?);
        if conditions.iter().any(|c| fails(*c, terms)) {
            return Ok(None);
        }

        let constraint = state
            .constraint()
            .clone()
            .add_all(conditions.into_iter().filter(|c| !holds(*c, terms)))
            .simplify(terms)?;
        if constraint.is_false() || constraint.check_unsat(self.solver.as_ref(), terms) {
            return Ok(None);
        }
        Ok(Some(found.subst.restrict(pattern.matching_vars())))
    }

    #[cfg(feature = "tracing")]
    pub(crate) fn log_statistics(&self, operation: &str, report: &MetricsReport) {
        if self.config.statistics {
            info!(operation, success_rate = report.success_rate(), "{}", report.summary());
        }
    }

    #[cfg(not(feature = "tracing"))]
    pub(crate) fn log_statistics(&self, _operation: &str, _report: &MetricsReport) {}
}

impl std::fmt::Debug for SymbolicRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolicRewriter")
            .field("definition", &self.definition)
            .field("config", &self.config)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/rewriter.rs"]
mod tests;
