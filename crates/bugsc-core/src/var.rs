//! Variable identity: `(name, indices)` with structural equality, spec.md §3.

use serde::{Deserialize, Serialize};

/// The index portion of a [`VarId`]. Array slices are not independent nodes (spec.md
/// §3); by the time a `VarId` exists, every index has been resolved to a concrete
/// integer. Before that, an unresolved index or range is carried as an
/// [`crate::value::EvalResult`] (or a raw [`crate::ast::Expr`]) until it scalarizes
/// down to the per-element `VarId`s collection produces.
pub type Indices = Vec<i64>;

/// Identity of one scalar model variable: a bare scalar (`indices` empty) or a single
/// array element (`indices` one entry per axis).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId {
    /// The BUGS identifier this variable belongs to.
    pub name: String,
    /// Concrete per-axis indices; empty for a bare scalar.
    pub indices: Indices,
}

impl VarId {
    /// A scalar variable identity.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indices: Vec::new(),
        }
    }

    /// An array element identity.
    pub fn element(name: impl Into<String>, indices: Indices) -> Self {
        Self {
            name: name.into(),
            indices,
        }
    }

    /// True if this identity names a bare scalar rather than an array element.
    pub fn is_scalar(&self) -> bool {
        self.indices.is_empty()
    }
}

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.indices.is_empty() {
            write!(f, "[")?;
            for (i, idx) in self.indices.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{idx}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
