//! The data-transformation pass (spec.md §4.E): a monotone fixpoint that resolves
//! logical variables whose RHS becomes fully data-resolved, writing their value into
//! the environment and (eventually) promoting them to pseudo-data.

use bugsc_core::ast::Expr;
use bugsc_core::env::{Cell, Env};
use bugsc_core::errors::{BugsError, BugsResult, ErrorInfo};
use bugsc_core::registry::PrimitiveRegistry;
use bugsc_core::value::{EvalResult, Scalar};
use bugsc_core::var::VarId;
use bugsc_eval::eval;

use crate::collector::{Assignment, VarKind};

pub(crate) fn is_determined(env: &Env, var: &VarId) -> bool {
    match env.get(&var.name) {
        Some(Cell::Scalar(v)) => v.is_some(),
        Some(Cell::Array(a)) => matches!(a.get(&var.indices), Some(Some(_))),
        None => false,
    }
}

fn write_value(env: &mut Env, var: &VarId, value: Scalar) -> BugsResult<()> {
    match env.get_mut(&var.name) {
        Some(Cell::Scalar(slot)) => {
            *slot = Some(value);
            Ok(())
        }
        Some(Cell::Array(a)) => {
            if a.set(&var.indices, value) {
                Ok(())
            } else {
                Err(BugsError::UnresolvableIndex(ErrorInfo::new(
                    "write-out-of-bounds",
                    format!("`{var}` is out of bounds for its array"),
                )))
            }
        }
        None => Err(BugsError::UnresolvableIndex(ErrorInfo::new(
            "write-to-unbound-name",
            format!("`{var}` has no allocated cell"),
        ))),
    }
}

/// Runs the logical assignments in `assignments` to a monotone fixpoint against
/// `env`, skipping stochastic statements. Returns the set of [`VarId`]s newly
/// determined by this call (for promotion bookkeeping by the caller).
pub fn run_to_fixpoint(
    assignments: &[Assignment],
    env: &mut Env,
    reg: &PrimitiveRegistry,
) -> BugsResult<Vec<VarId>> {
    let mut newly_determined = Vec::new();
    loop {
        let mut changed = false;
        for assignment in assignments.iter().filter(|a| a.kind == VarKind::Logical) {
            if assignment.lhs_vars.iter().all(|v| is_determined(env, v)) {
                continue;
            }
            let resolved = eval(&assignment.rhs, env, reg)?;
            match (&resolved, assignment.lhs_vars.as_slice()) {
                (EvalResult::Scalar(s), [single]) => {
                    if !is_determined(env, single) {
                        write_value(env, single, *s)?;
                        newly_determined.push(single.clone());
                        changed = true;
                    }
                }
                (EvalResult::Array(shape, values), vars) if !vars.is_empty() => {
                    let expected: usize = shape.iter().product();
                    if expected != vars.len() {
                        return Err(BugsError::ShapeMismatch(
                            ErrorInfo::new(
                                "shape-mismatch",
                                format!(
                                    "assignment to `{}` expects {} element(s), RHS produced {}",
                                    vars[0].name,
                                    vars.len(),
                                    expected
                                ),
                            )
                            .with_context("rhs", assignment.rhs.to_string()),
                        ));
                    }
                    for (var, value) in vars.iter().zip(values.iter()) {
                        if !is_determined(env, var) {
                            write_value(env, var, *value)?;
                            newly_determined.push(var.clone());
                            changed = true;
                        }
                    }
                }
                _ => {
                    // Not yet resolvable this round; try again next sweep.
                }
            }
        }
        if !changed {
            break;
        }
    }
    Ok(newly_determined)
}

/// True iff `rhs` is fully resolvable against `env` without actually evaluating it
/// (used by the node-function builder to decide whether a variable is a transformed
/// constant it can fold away entirely).
pub fn rhs_is_resolved(rhs: &Expr, env: &Env, reg: &PrimitiveRegistry) -> BugsResult<bool> {
    Ok(eval(rhs, env, reg)?.is_resolved())
}
