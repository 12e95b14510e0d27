#![deny(missing_docs)]
//! Node-function builder (spec.md §4.F), dependency graph builder (§4.G) and
//! model assembly (§4.H): turns a collected model into the compiled artifact.

mod graph;
mod model;
mod nodefn;

pub use graph::{Graph, VertexId};
pub use model::{assemble, model_from_json, model_to_json, Model};
pub use nodefn::{build_nodes, NodeFn, NodeKind, NodeRecord};
