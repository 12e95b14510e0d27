//! The evaluation environment (spec.md §3): a mapping from identifier to scalar or
//! array cell, seeded from data and grown by the variable collector.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{ArrayCell, Scalar};

/// One environment slot: either a bare scalar or a fixed-shape array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    /// A scalar cell, `None` while undetermined.
    Scalar(Option<Scalar>),
    /// A fixed-shape array cell.
    Array(ArrayCell),
}

impl Cell {
    /// True iff the cell (and, for arrays, every element) is determined.
    pub fn is_fully_resolved(&self) -> bool {
        match self {
            Cell::Scalar(v) => v.is_some(),
            Cell::Array(a) => a.is_fully_resolved(),
        }
    }
}

/// A tag recording whether a cell's value arrived from the caller (§3 "seeded from
/// user-supplied data") or was produced by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Provided by the caller's data environment.
    Data,
    /// Allocated by the variable collector for a non-data model variable.
    Model,
    /// Promoted from `Model` to pseudo-data by the data-transformation pass (§4.E).
    TransformedData,
}

/// The evaluation environment: identifier -> (cell, origin).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Env {
    cells: BTreeMap<String, Cell>,
    origins: BTreeMap<String, Origin>,
}

impl Env {
    /// An empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the environment from a data mapping; every entry is tagged [`Origin::Data`].
    pub fn from_data(data: BTreeMap<String, Cell>) -> Self {
        let mut env = Self::new();
        for (name, cell) in data {
            env.origins.insert(name.clone(), Origin::Data);
            env.cells.insert(name, cell);
        }
        env
    }

    /// True iff `name` was supplied by the caller's data environment.
    pub fn is_data(&self, name: &str) -> bool {
        matches!(self.origins.get(name), Some(Origin::Data))
    }

    /// True iff `name` is bound at all (data, model, or transformed-data).
    pub fn contains(&self, name: &str) -> bool {
        self.cells.contains_key(name)
    }

    /// Returns the origin tag for `name`, if bound.
    pub fn origin(&self, name: &str) -> Option<Origin> {
        self.origins.get(name).copied()
    }

    /// Marks an already-bound identifier as transformed data (§4.E promotion).
    pub fn mark_transformed(&mut self, name: &str) {
        self.origins.insert(name.to_string(), Origin::TransformedData);
    }

    /// Borrows the cell for `name`.
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.cells.get(name)
    }

    /// Mutably borrows the cell for `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Cell> {
        self.cells.get_mut(name)
    }

    /// Allocates a new non-data scalar cell, undetermined, tagged [`Origin::Model`].
    /// No-op if `name` is already bound.
    pub fn ensure_scalar(&mut self, name: &str) {
        self.cells
            .entry(name.to_string())
            .or_insert(Cell::Scalar(None));
        self.origins
            .entry(name.to_string())
            .or_insert(Origin::Model);
    }

    /// Allocates a new non-data array cell at `shape`, all cells undetermined, tagged
    /// [`Origin::Model`]. No-op if `name` is already bound.
    pub fn ensure_array(&mut self, name: &str, shape: Vec<usize>) {
        self.cells
            .entry(name.to_string())
            .or_insert_with(|| Cell::Array(ArrayCell::undetermined(shape)));
        self.origins
            .entry(name.to_string())
            .or_insert(Origin::Model);
    }

    /// Iterates over every bound identifier and its cell.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Cell)> {
        self.cells.iter()
    }

    /// Returns the shape of an array identifier, if bound as an array.
    pub fn shape_of(&self, name: &str) -> Option<&[usize]> {
        match self.cells.get(name) {
            Some(Cell::Array(a)) => Some(&a.shape),
            _ => None,
        }
    }

    /// Grows a non-data array's shape so that `indices` (1-based) is in bounds,
    /// allocating it first if this is the first time `name` is touched
    /// (spec.md §4.C.3: "each axis' size is `max(current, last-index-touched)`").
    /// Existing cell contents are preserved under the larger shape. No-op (and an
    /// error) if `name` is already bound as a scalar or as data.
    pub fn grow_array_shape(&mut self, name: &str, indices: &[i64]) -> Result<(), String> {
        if self.is_data(name) {
            return Err(format!("cannot grow shape of data array `{name}`"));
        }
        match self.cells.get(name) {
            Some(Cell::Scalar(_)) => return Err(format!("`{name}` is a scalar, not an array")),
            Some(Cell::Array(a)) if a.shape.len() != indices.len() => {
                return Err(format!("`{name}` has {} axes, indexed with {}", a.shape.len(), indices.len()))
            }
            _ => {}
        }
        let wanted: Vec<usize> = indices.iter().map(|&i| i.max(0) as usize).collect();
        match self.cells.get(name) {
            None => {
                self.cells.insert(name.to_string(), Cell::Array(ArrayCell::undetermined(wanted)));
                self.origins.insert(name.to_string(), Origin::Model);
            }
            Some(Cell::Array(existing)) => {
                let grown_shape: Vec<usize> = existing
                    .shape
                    .iter()
                    .zip(wanted.iter())
                    .map(|(&cur, &w)| cur.max(w))
                    .collect();
                if grown_shape != existing.shape {
                    let mut grown = ArrayCell::undetermined(grown_shape);
                    for idx in existing.indices_iter() {
                        if let Some(Some(v)) = existing.get(&idx) {
                            grown.set(&idx, v);
                        }
                    }
                    self.cells.insert(name.to_string(), Cell::Array(grown));
                }
            }
            _ => unreachable!(),
        }
        Ok(())
    }
}
