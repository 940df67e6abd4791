//! Execution graph: states reached by rewriting and the rule applications
//! between them.

use indexmap::IndexSet;
use serde::Serialize;

use crate::constraint::ConstrainedTerm;
use crate::rule::RuleId;
use crate::subst::Subst;
use crate::symbol::SymbolStore;
use crate::term::{format_term, TermStore};

/// Index of a vertex in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VertexId(pub usize);

/// A vertex: a state and, for `rewrite` graphs, the step it was reached at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct State {
    pub term: ConstrainedTerm,
    pub step: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: VertexId,
    pub target: VertexId,
    pub rule: RuleId,
    pub subst: Subst,
}

/// Append-only multigraph. Structurally equal states share a vertex.
#[derive(Debug, Clone, Default)]
pub struct ExecutionGraph {
    vertices: IndexSet<State>,
    edges: Vec<Edge>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a state, or find the vertex it already has.
    pub fn add_vertex(&mut self, term: ConstrainedTerm, step: Option<usize>) -> VertexId {
        let (index, _) = self.vertices.insert_full(State { term, step });
        VertexId(index)
    }

    pub fn add_edge(&mut self, source: VertexId, target: VertexId, rule: RuleId, subst: Subst) {
        self.edges.push(Edge {
            source,
            target,
            rule,
            subst,
        });
    }

    pub fn vertex(&self, id: VertexId) -> Option<&State> {
        self.vertices.get_index(id.0)
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &State)> + '_ {
        self.vertices.iter().enumerate().map(|(i, s)| (VertexId(i), s))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn successors(&self, id: VertexId) -> impl Iterator<Item = VertexId> + '_ {
        self.edges.iter().filter(move |e| e.source == id).map(|e| e.target)
    }

    /// Render the graph as JSON with terms in concrete syntax.
    pub fn to_json(&self, terms: &TermStore, symbols: &SymbolStore) -> Result<serde_json::Value, String> {
        #[derive(Serialize)]
        struct JsonVertex {
            id: usize,
            term: String,
            constraint: String,
            step: Option<usize>,
        }

        #[derive(Serialize)]
        struct JsonEdge {
            source: usize,
            target: usize,
            rule: RuleId,
            substitution: Vec<(String, String)>,
        }

        #[derive(Serialize)]
        struct JsonGraph {
            vertices: Vec<JsonVertex>,
            edges: Vec<JsonEdge>,
        }

        let mut vertices = Vec::with_capacity(self.vertices.len());
        for (id, state) in self.vertices() {
            vertices.push(JsonVertex {
                id: id.0,
                term: format_term(state.term.term(), terms, symbols)?,
                constraint: state.term.constraint().format(terms, symbols)?,
                step: state.step,
            });
        }

        let mut edges = Vec::with_capacity(self.edges.len());
        for edge in self.edges.iter() {
            let mut substitution = Vec::with_capacity(edge.subst.len());
            for (var, value) in edge.subst.iter() {
                let key = format_term(terms.var_term(var), terms, symbols)?;
                substitution.push((key, format_term(value, terms, symbols)?));
            }
            edges.push(JsonEdge {
                source: edge.source.0,
                target: edge.target.0,
                rule: edge.rule,
                substitution,
            });
        }

        serde_json::to_value(JsonGraph { vertices, edges }).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Sort;
    use crate::test_utils::setup;

    #[test]
    fn vertices_are_deduplicated() {
        let (_, terms) = setup();
        let mut graph = ExecutionGraph::new();
        let a = graph.add_vertex(ConstrainedTerm::of(terms.int(1)), None);
        let b = graph.add_vertex(ConstrainedTerm::of(terms.int(2)), None);
        let again = graph.add_vertex(ConstrainedTerm::of(terms.int(1)), None);
        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(graph.vertex_count(), 2);
    }

    #[test]
    fn step_index_distinguishes_vertices() {
        let (_, terms) = setup();
        let mut graph = ExecutionGraph::new();
        let a = graph.add_vertex(ConstrainedTerm::of(terms.int(1)), Some(0));
        let b = graph.add_vertex(ConstrainedTerm::of(terms.int(1)), Some(1));
        assert_ne!(a, b);
    }

    #[test]
    fn edges_form_a_multigraph() {
        let (_, terms) = setup();
        let mut graph = ExecutionGraph::new();
        let a = graph.add_vertex(ConstrainedTerm::of(terms.int(1)), None);
        let b = graph.add_vertex(ConstrainedTerm::of(terms.int(2)), None);
        graph.add_edge(a, b, RuleId(0), Subst::new());
        graph.add_edge(a, b, RuleId(1), Subst::new());
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.successors(a).collect::<Vec<_>>(), vec![b, b]);
        assert_eq!(graph.successors(b).count(), 0);
    }

    #[test]
    fn json_export_renders_terms() {
        let (symbols, terms) = setup();
        let mut graph = ExecutionGraph::new();
        let x = crate::term::Var::new(0, Sort::Int);
        let a = graph.add_vertex(ConstrainedTerm::of(terms.int(1)), Some(0));
        let b = graph.add_vertex(ConstrainedTerm::of(terms.int(2)), Some(1));
        let mut subst = Subst::new();
        subst.bind(x, terms.int(1));
        graph.add_edge(a, b, RuleId(3), subst);

        let json = graph.to_json(&terms, &symbols).unwrap();
        assert_eq!(json["vertices"][1]["term"], "2");
        assert_eq!(json["vertices"][0]["constraint"], "true");
        assert_eq!(json["edges"][0]["rule"], 3);
        assert_eq!(json["edges"][0]["substitution"][0][0], "V0:Int");
    }
}
