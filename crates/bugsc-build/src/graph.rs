//! The dependency graph builder (spec.md §4.G): a bespoke deterministic adjacency
//! structure over `BTreeSet`, with acyclicity checking and a topological sort
//! stable with respect to statement discovery order.

use std::collections::{BTreeMap, BTreeSet};

use bugsc_core::errors::{BugsError, BugsResult, ErrorInfo};
use bugsc_core::var::VarId;
use serde::{Deserialize, Serialize};

/// Identity of one graph vertex: either a named model variable, or an auxiliary
/// vertex standing in for an array identifier produced as a unit by a single
/// multivariate assignment (spec.md §4.G, §9 "apparent cycles through array
/// slices are broken by scalarizing to elements").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VertexId {
    /// A scalar or array-element model variable.
    Var(VarId),
    /// The whole-array producer vertex for a multivariate slice assignment.
    ArrayAux(String),
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VertexId::Var(v) => write!(f, "{v}"),
            VertexId::ArrayAux(name) => write!(f, "{name}[*]"),
        }
    }
}

/// A deterministic directed graph over [`VertexId`]s, stored as a discovery-ordered
/// vertex list plus an edge set (not an adjacency map, so the structure serializes
/// to plain JSON arrays regardless of how complex [`VertexId`] is).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    vertices: Vec<VertexId>,
    edges: BTreeSet<(VertexId, VertexId)>,
}

impl Graph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a vertex, in discovery order, if not already present. No-op if
    /// already registered.
    pub fn add_vertex(&mut self, v: VertexId) {
        if !self.vertices.contains(&v) {
            self.vertices.push(v);
        }
    }

    /// Adds a directed edge `from -> to`, registering either endpoint if new.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId) {
        self.add_vertex(from.clone());
        self.add_vertex(to.clone());
        self.edges.insert((from, to));
    }

    /// Every registered vertex, in discovery order.
    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    /// The out-neighbours of `v`.
    pub fn out_neighbours(&self, v: &VertexId) -> BTreeSet<VertexId> {
        self.edges
            .iter()
            .filter(|(from, _)| from == v)
            .map(|(_, to)| to.clone())
            .collect()
    }

    /// True iff `v` is a registered vertex.
    pub fn contains(&self, v: &VertexId) -> bool {
        self.vertices.contains(v)
    }

    fn in_degree(&self, v: &VertexId) -> usize {
        self.edges.iter().filter(|(_, to)| to == v).count()
    }

    /// Checks for cycles and returns a topological order, stable with respect to
    /// discovery order among vertices with no remaining predecessor (Kahn's
    /// algorithm, spec.md §4.G "the sort is stable with respect to statement
    /// discovery order to make the compiler deterministic").
    pub fn topo_sort(&self) -> BugsResult<Vec<VertexId>> {
        let mut remaining: Vec<(VertexId, VertexId)> = self.edges.iter().cloned().collect();
        let mut in_degree: BTreeMap<&VertexId, usize> = BTreeMap::new();
        for v in &self.vertices {
            in_degree.insert(v, self.in_degree(v));
        }

        let mut done: BTreeSet<VertexId> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.vertices.len());

        while order.len() < self.vertices.len() {
            let next = self
                .vertices
                .iter()
                .find(|v| !done.contains(*v) && in_degree.get(*v).copied().unwrap_or(0) == 0);
            let Some(next) = next else {
                let stuck: Vec<String> = self
                    .vertices
                    .iter()
                    .filter(|v| !done.contains(*v))
                    .map(|v| v.to_string())
                    .collect();
                return Err(BugsError::CycleInDependencyGraph(
                    ErrorInfo::new("cycle-in-dependency-graph", "the dependency graph contains a cycle")
                        .with_context("vertices", stuck.join(", ")),
                ));
            };
            done.insert(next.clone());
            order.push(next.clone());
            remaining.retain(|(from, to)| {
                if from == next {
                    if let Some(entry) = in_degree.get_mut(to) {
                        *entry -= 1;
                    }
                    false
                } else {
                    true
                }
            });
        }
        Ok(order)
    }
}
