#![deny(missing_docs)]
#![doc = "AST, value, environment, identity and error types shared across the BUGS model compiler crates."]

/// The expression and statement AST.
pub mod ast;
/// The evaluation environment.
pub mod env;
/// Structured error types.
pub mod errors;
/// The primitive/distribution/link-function registry.
pub mod registry;
/// Variable identity.
pub mod var;
/// Scalar and array values.
pub mod value;

pub use ast::{Expr, Lhs, Program, Stmt};
pub use env::{Cell, Env, Origin};
pub use errors::{BugsError, BugsResult, ErrorInfo};
pub use registry::{Arity, PrimitiveRegistry};
pub use value::{ArrayCell, EvalResult, Scalar};
pub use var::VarId;
