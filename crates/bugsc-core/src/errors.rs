//! Structured error types for the BUGS model compiler (spec.md §7).

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`BugsError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key/value pairs — offending identifier, fragment, sizes, etc.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload, e.g. the offending AST fragment
    /// (spec.md §6 "Errors carry ... the offending AST fragment").
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

/// Canonical error type for the compiler, one variant per spec.md §7 error kind.
/// Every variant is fatal (§7: "All errors are fatal ... no partial results are
/// returned"); there is a single failure channel (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "detail")]
pub enum BugsError {
    /// A `for` loop's bounds never become integer after fixpoint.
    #[error("unresolvable loop bound: {0}")]
    UnresolvableLoopBound(ErrorInfo),
    /// An LHS index remains unresolved after fixpoint.
    #[error("unresolvable index: {0}")]
    UnresolvableIndex(ErrorInfo),
    /// A non-integral index value.
    #[error("non-integer index: {0}")]
    NonIntegerIndex(ErrorInfo),
    /// A logical assignment targets a data-provided cell.
    #[error("overwrite of data cell: {0}")]
    OverwriteData(ErrorInfo),
    /// A multivariate stochastic LHS overlaps observed and missing cells.
    #[error("partial observation not allowed: {0}")]
    PartialObservation(ErrorInfo),
    /// Two logical or two stochastic writes to the same cell.
    #[error("repeated assignment: {0}")]
    RepeatedAssignment(ErrorInfo),
    /// A cell is written both logically and stochastically and is not fully
    /// data-resolved.
    #[error("logical/stochastic conflict: {0}")]
    LogicalStochasticConflict(ErrorInfo),
    /// An LHS link-function name is not in the fixed table.
    #[error("undefined link function: {0}")]
    UndefinedLinkFunction(ErrorInfo),
    /// A stochastic RHS names an unrecognized distribution.
    #[error("undefined distribution: {0}")]
    UndefinedDistribution(ErrorInfo),
    /// A call names a function absent from the primitive registry.
    #[error("undefined function: {0}")]
    UndefinedFunction(ErrorInfo),
    /// More than one `~` assignment targets the same variable.
    #[error("multiple distributions for variable: {0}")]
    MultipleDistributionsFor(ErrorInfo),
    /// The dependency graph contains a cycle.
    #[error("cycle in dependency graph: {0}")]
    CycleInDependencyGraph(ErrorInfo),
    /// LHS and RHS array sizes disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(ErrorInfo),
    /// An expression shape the compiler does not support.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(ErrorInfo),
}

impl BugsError {
    /// Returns a reference to the payload describing the error, regardless of kind.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            BugsError::UnresolvableLoopBound(i)
            | BugsError::UnresolvableIndex(i)
            | BugsError::NonIntegerIndex(i)
            | BugsError::OverwriteData(i)
            | BugsError::PartialObservation(i)
            | BugsError::RepeatedAssignment(i)
            | BugsError::LogicalStochasticConflict(i)
            | BugsError::UndefinedLinkFunction(i)
            | BugsError::UndefinedDistribution(i)
            | BugsError::UndefinedFunction(i)
            | BugsError::MultipleDistributionsFor(i)
            | BugsError::CycleInDependencyGraph(i)
            | BugsError::ShapeMismatch(i)
            | BugsError::UnsupportedExpression(i) => i,
        }
    }
}

/// Convenient `Result` alias used throughout the compiler crates.
pub type BugsResult<T> = Result<T, BugsError>;
