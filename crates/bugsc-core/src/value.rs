//! Scalar values, array cells, and the result type of the partial evaluator
//! (spec.md §3 "Evaluation environment", §4.B).

use serde::{Deserialize, Serialize};

use crate::ast::Expr;

/// A determined scalar: the BUGS language only has integers and floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// An integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
}

impl Scalar {
    /// Returns the value as `f64`, widening integers.
    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Int(v) => *v as f64,
            Scalar::Float(v) => *v,
        }
    }

    /// Returns the value as `i64` iff it is an integer or an exactly-integral float
    /// (spec.md §9 Open Question: "coerce iff value is exactly integral, fatal
    /// otherwise"). Non-integral floats return `None`; callers turn that into
    /// [`crate::errors::BugsError::NonIntegerIndex`].
    pub fn as_exact_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    Some(*v as i64)
                } else {
                    None
                }
            }
        }
    }

    /// True if this value is an integer literal (as opposed to a float, even an
    /// integral-valued one).
    pub fn is_int(&self) -> bool {
        matches!(self, Scalar::Int(_))
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A multi-dimensional array cell, stored row-major. Each element is `None` until
/// determined ("undetermined" sentinel of spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayCell {
    /// Per-axis extents, fixed once the array is allocated.
    pub shape: Vec<usize>,
    /// Row-major element storage, `shape.iter().product()` long.
    pub data: Vec<Option<Scalar>>,
}

impl ArrayCell {
    /// Allocates an array of the given shape with every cell undetermined.
    pub fn undetermined(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![None; len],
        }
    }

    /// Builds an array cell from fully known data (used to seed data environments).
    pub fn from_values(shape: Vec<usize>, data: Vec<Option<Scalar>>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self { shape, data }
    }

    /// Converts 1-based BUGS indices into a flat row-major offset.
    pub fn flat_index(&self, indices: &[i64]) -> Option<usize> {
        if indices.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0usize;
        for (axis, &idx) in indices.iter().enumerate() {
            if idx < 1 || idx as usize > self.shape[axis] {
                return None;
            }
            offset = offset * self.shape[axis] + (idx as usize - 1);
        }
        Some(offset)
    }

    /// Reads the cell at `indices`, if in bounds.
    pub fn get(&self, indices: &[i64]) -> Option<Option<Scalar>> {
        self.flat_index(indices).map(|o| self.data[o])
    }

    /// Writes `value` at `indices`, if in bounds. Returns `false` if out of bounds.
    pub fn set(&mut self, indices: &[i64], value: Scalar) -> bool {
        match self.flat_index(indices) {
            Some(o) => {
                self.data[o] = Some(value);
                true
            }
            None => false,
        }
    }

    /// True iff every cell is determined.
    pub fn is_fully_resolved(&self) -> bool {
        self.data.iter().all(Option::is_some)
    }

    /// Enumerates every flat index as a 1-based multi-index, in row-major order.
    pub fn indices_iter(&self) -> impl Iterator<Item = Vec<i64>> + '_ {
        let shape = self.shape.clone();
        let total: usize = shape.iter().product();
        (0..total).map(move |mut flat| {
            let mut idx = vec![0i64; shape.len()];
            for axis in (0..shape.len()).rev() {
                let extent = shape[axis];
                idx[axis] = (flat % extent) as i64 + 1;
                flat /= extent;
            }
            idx
        })
    }
}

/// The result of [`partial evaluation`](https://docs.rs/bugsc-eval) of an expression:
/// either fully resolved, resolved to a range/colon marker, or still symbolic.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    /// A fully resolved scalar.
    Scalar(Scalar),
    /// A fully resolved homogeneous array (every cell determined).
    Array(Vec<usize>, Vec<Scalar>),
    /// A resolved integer range `lo:hi` (may be empty if `lo > hi`, spec.md §8.8).
    Range(i64, i64),
    /// The unresolved full-axis colon marker.
    Colon,
    /// Not yet resolvable; carries the (possibly partially folded) expression.
    Unresolved(Expr),
}

impl EvalResult {
    /// True iff this result is fully determined (spec.md §4.B `is_resolved`).
    pub fn is_resolved(&self) -> bool {
        matches!(self, EvalResult::Scalar(_) | EvalResult::Array(_, _))
    }

    /// Extracts a single resolved scalar, if this result is exactly one.
    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            EvalResult::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// Extracts a resolved integer, coercing an exactly-integral float.
    pub fn as_exact_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(|s| s.as_exact_i64())
    }
}
