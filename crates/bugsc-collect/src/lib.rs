//! Variable collection, repeated-assignment checking and data-transformation for
//! the BUGS model compiler (spec.md components C, D, E).

#![deny(missing_docs)]

mod collector;
mod repeated;
mod transform;

pub use collector::{collect, Assignment, CollectReport, CollectedModel, VarKind};
pub use repeated::RepeatedAssignmentChecker;
pub use transform::{rhs_is_resolved, run_to_fixpoint};
