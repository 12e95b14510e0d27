//! The repeated-assignment checker (spec.md §4.D): per-element masks of logical and
//! stochastic writes, used to detect illegal overlap.

use std::collections::{BTreeMap, BTreeSet};

use bugsc_core::env::Env;
use bugsc_core::errors::{BugsError, BugsResult, ErrorInfo};
use bugsc_core::var::VarId;

/// A flattened write footprint: scalars use an empty index vector under their own
/// name key; array elements use their 1-based index tuple.
#[derive(Default, Debug, Clone)]
pub struct RepeatedAssignmentChecker {
    logical: BTreeMap<String, BTreeSet<Vec<i64>>>,
    stochastic: BTreeMap<String, BTreeSet<Vec<i64>>>,
}

impl RepeatedAssignmentChecker {
    /// A checker with empty masks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a logical write to `var`. Fatal if `var` was already written
    /// logically by a different statement.
    pub fn record_logical(&mut self, var: &VarId) -> BugsResult<()> {
        Self::record(&mut self.logical, var, "logical")
    }

    /// Records a stochastic write to `var`. Fatal if `var` was already written
    /// stochastically by a different statement.
    pub fn record_stochastic(&mut self, var: &VarId) -> BugsResult<()> {
        Self::record(&mut self.stochastic, var, "stochastic")
    }

    fn record(mask: &mut BTreeMap<String, BTreeSet<Vec<i64>>>, var: &VarId, kind: &str) -> BugsResult<()> {
        let set = mask.entry(var.name.clone()).or_default();
        if !set.insert(var.indices.clone()) {
            return Err(BugsError::RepeatedAssignment(
                ErrorInfo::new("repeated-assignment", format!("`{var}` is assigned {kind} more than once"))
                    .with_context("var", var.to_string())
                    .with_context("kind", kind.to_string()),
            ));
        }
        Ok(())
    }

    /// Every cell written both logically and stochastically.
    pub fn overlap(&self) -> Vec<VarId> {
        let mut out = Vec::new();
        for (name, logical_set) in &self.logical {
            if let Some(stochastic_set) = self.stochastic.get(name) {
                for indices in logical_set.intersection(stochastic_set) {
                    out.push(VarId {
                        name: name.clone(),
                        indices: indices.clone(),
                    });
                }
            }
        }
        out
    }

    /// Re-checks every logical/stochastic overlap against the (post data-transformation)
    /// environment: permitted only if the overlapping cell is now fully determined on
    /// the logical side (spec.md §4.D, final bullet).
    pub fn check_conflicts(&self, env: &Env) -> BugsResult<()> {
        for var in self.overlap() {
            let resolved = match env.get(&var.name) {
                Some(bugsc_core::env::Cell::Scalar(v)) => v.is_some(),
                Some(bugsc_core::env::Cell::Array(a)) => {
                    matches!(a.get(&var.indices), Some(Some(_)))
                }
                None => false,
            };
            if !resolved {
                return Err(BugsError::LogicalStochasticConflict(
                    ErrorInfo::new(
                        "logical-stochastic-conflict",
                        format!("`{var}` is written both logically and stochastically and never becomes data-resolved"),
                    )
                    .with_context("var", var.to_string()),
                ));
            }
        }
        Ok(())
    }
}
