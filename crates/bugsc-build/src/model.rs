//! Model assembly (spec.md §4.H): stitches the node records and the dependency
//! graph into the compiled artifact returned to callers.

use std::collections::BTreeMap;

use bugsc_core::env::{Cell, Env};
use bugsc_core::errors::BugsResult;
use bugsc_core::registry::PrimitiveRegistry;
use bugsc_collect::{CollectReport, CollectedModel};
use serde::{Deserialize, Serialize};

use crate::graph::{Graph, VertexId};
use crate::nodefn::{build_nodes, NodeKind, NodeRecord};

/// The compiled artifact (spec.md §6 "Output from the core"): the topologically
/// sorted variable list, the parameter sublist, the graph, per-vertex node
/// records, and the initialized value store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Vertices in topological order (spec.md §4.H).
    pub topological_order: Vec<VertexId>,
    /// Stochastic vertices with undetermined value and no logical override
    /// (spec.md §8 property 5).
    pub parameters: Vec<VertexId>,
    /// The dependency graph.
    pub graph: Graph,
    /// Per-vertex node records, one per vertex. Not keyed by `VertexId`: a map
    /// keyed by a data-carrying enum does not round-trip through JSON (object
    /// keys must be plain strings), so lookups build a local index instead.
    pub nodes: Vec<NodeRecord>,
    /// The final environment: data, transformed data, and undetermined model
    /// variable cells.
    pub env: Env,
    /// Diagnostic counters carried through from variable collection (SPEC_FULL.md
    /// `bugsc-collect` module), for `bugsc-sim --verbose` to print.
    pub report: CollectReport,
}

/// Runs §4.F, §4.G and §4.H over the output of variable collection.
pub fn assemble(collected: CollectedModel, reg: &PrimitiveRegistry) -> BugsResult<Model> {
    let CollectedModel { env, assignments, report } = collected;
    let node_list = build_nodes(&assignments, &env, reg)?;

    let mut graph = Graph::new();
    for record in &node_list {
        graph.add_vertex(record.vertex.clone());
    }
    for record in &node_list {
        for dep in &record.deps {
            graph.add_edge(VertexId::Var(dep.clone()), record.vertex.clone());
        }
        // §4.G bullet 2: a multivariate slice producer feeds each of its elements.
        if let VertexId::ArrayAux(name) = &record.vertex {
            for other in &node_list {
                if let VertexId::Var(v) = &other.vertex {
                    if v.name == *name && other.args == vec![name.clone()] {
                        graph.add_edge(record.vertex.clone(), other.vertex.clone());
                    }
                }
            }
        }
    }

    let topological_order = graph.topo_sort()?;

    // Local-only lookup for the parameter filter below; never stored on `Model`.
    let kind_by_vertex: BTreeMap<&VertexId, NodeKind> =
        node_list.iter().map(|r| (&r.vertex, r.kind)).collect();

    let parameters = topological_order
        .iter()
        .filter(|v| matches!(v, VertexId::Var(_)))
        .filter(|v| kind_by_vertex.get(v).copied() == Some(NodeKind::Stochastic))
        .filter(|v| match v {
            VertexId::Var(var) => !is_determined(&env, var),
            VertexId::ArrayAux(_) => false,
        })
        .cloned()
        .collect();

    Ok(Model {
        topological_order,
        parameters,
        graph,
        nodes: node_list,
        env,
        report,
    })
}

fn is_determined(env: &Env, var: &bugsc_core::var::VarId) -> bool {
    match env.get(&var.name) {
        Some(Cell::Scalar(v)) => v.is_some(),
        Some(Cell::Array(a)) => matches!(a.get(&var.indices), Some(Some(_))),
        None => false,
    }
}

/// Serializes a compiled [`Model`] to a JSON value (spec.md §6 output shape, carried
/// to `bugsc-sim`'s `--out` file).
pub fn model_to_json(model: &Model) -> BugsResult<serde_json::Value> {
    Ok(serde_json::to_value(model).map_err(json_error)?)
}

/// Deserializes a compiled [`Model`] previously written by [`model_to_json`].
pub fn model_from_json(value: serde_json::Value) -> BugsResult<Model> {
    serde_json::from_value(value).map_err(json_error)
}

fn json_error(err: serde_json::Error) -> bugsc_core::errors::BugsError {
    bugsc_core::errors::BugsError::UnsupportedExpression(bugsc_core::errors::ErrorInfo::new(
        "model-serialization",
        err.to_string(),
    ))
}
