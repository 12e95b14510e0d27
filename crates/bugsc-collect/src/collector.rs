//! The variable collector (spec.md §4.C): loop unrolling to a fixpoint, LHS
//! simplification, shape inference, and enumeration of every model variable.

use bugsc_core::ast::{Expr, Lhs, Program, Stmt};
use bugsc_core::env::Env;
use bugsc_core::errors::{BugsError, BugsResult, ErrorInfo};
use bugsc_core::registry::PrimitiveRegistry;
use bugsc_core::value::EvalResult;
use bugsc_core::var::VarId;
use bugsc_eval::eval;

use crate::repeated::RepeatedAssignmentChecker;
use crate::transform::{self, is_determined};

/// Whether a collected statement defines its variable(s) deterministically or
/// distributionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// `lhs = rhs`.
    Logical,
    /// `lhs ~ dist`.
    Stochastic,
}

/// One post-unrolling assignment, scalarized to the concrete elements it writes.
#[derive(Debug, Clone)]
pub struct Assignment {
    /// The scalarized elements this statement writes, in row-major order. A single
    /// entry for a scalar or single array-element LHS; more than one for a slice.
    pub lhs_vars: Vec<VarId>,
    /// Logical or stochastic.
    pub kind: VarKind,
    /// The RHS (for `Stochastic`, the distribution call), with loop variables
    /// substituted to literals.
    pub rhs: Expr,
    /// Link-function tag preserved from §4.A, stochastic statements only.
    pub link: Option<String>,
    /// Discovery order, used to make the graph's topological sort deterministic
    /// (spec.md §4.G).
    pub source_index: usize,
}

/// Summary counters emitted alongside the collected model, for diagnostics only
/// (SPEC_FULL.md `bugsc-collect` module).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CollectReport {
    /// Number of scalar model variables.
    pub scalars: usize,
    /// Number of array-element model variables.
    pub array_elements: usize,
    /// Number of `for` loops unrolled.
    pub loops_unrolled: usize,
    /// Number of variables promoted to pseudo-data by the data-transformation pass.
    pub transformed_variables: usize,
}

/// The output of variable collection, repeated-assignment checking and data
/// transformation: a finalized environment and the list of surviving assignments.
#[derive(Debug, Clone)]
pub struct CollectedModel {
    /// The environment after data-transformation: data, transformed data, and
    /// undetermined model-variable cells.
    pub env: Env,
    /// Surviving assignments (transformed-data variables have been removed).
    pub assignments: Vec<Assignment>,
    /// Diagnostic counters.
    pub report: CollectReport,
}

/// Runs §4.C, §4.D and §4.E over `program` against the seeded `env`.
pub fn collect(program: &Program, mut env: Env, reg: &PrimitiveRegistry) -> BugsResult<CollectedModel> {
    let mut assignments: Vec<Assignment> = Vec::new();
    let mut checker = RepeatedAssignmentChecker::new();
    let mut loops_unrolled = 0usize;
    let mut source_index = 0usize;

    let mut pending: Vec<Stmt> = program.clone();
    loop {
        let mut next_pending = Vec::new();
        let mut any_unrolled = false;
        for stmt in pending {
            match stmt {
                Stmt::For { var, lo, hi, body } => {
                    let lo_r = eval(&lo, &env, reg)?;
                    let hi_r = eval(&hi, &env, reg)?;
                    match (lo_r.as_exact_i64(), hi_r.as_exact_i64()) {
                        (Some(lo_v), Some(hi_v)) => {
                            any_unrolled = true;
                            loops_unrolled += 1;
                            for i in lo_v..=hi_v {
                                for s in &body {
                                    next_pending.push(substitute_stmt(s, &var, i));
                                }
                            }
                            // lo_v > hi_v yields zero iterations (spec.md §8 property 8).
                        }
                        _ => next_pending.push(Stmt::For { var, lo, hi, body }),
                    }
                }
                Stmt::If { .. } => {
                    return Err(BugsError::UnsupportedExpression(ErrorInfo::new(
                        "unnormalized-if",
                        "an `if` statement reached the variable collector; run AST normalization first",
                    )))
                }
                other => {
                    process_statement(other, &mut env, reg, &mut checker, &mut assignments, &mut source_index)?;
                }
            }
        }
        pending = next_pending;
        transform::run_to_fixpoint(&assignments, &mut env, reg)?;
        if !any_unrolled {
            break;
        }
    }

    if !pending.is_empty() {
        return Err(BugsError::UnresolvableLoopBound(ErrorInfo::new(
            "unresolvable-loop-bound",
            "a `for` loop's bounds never resolved to integers after fixpoint",
        )));
    }

    // §4.E again, as an explicit, order-independent pass over the finalized
    // assignment list (spec.md §8 properties 1-5 require this to be independent of
    // how unrolling happened to interleave with constant propagation above).
    transform::run_to_fixpoint(&assignments, &mut env, reg)?;

    // §4.D finalization: a logical/stochastic overlap is legal only if resolved.
    checker.check_conflicts(&env)?;
    let transformed: Vec<VarId> = checker.overlap();
    for var in &transformed {
        env.mark_transformed(&var.name);
    }
    let transformed_set: std::collections::BTreeSet<VarId> = transformed.iter().cloned().collect();
    assignments.retain(|a| !a.lhs_vars.iter().any(|v| transformed_set.contains(v)));

    let mut scalars = 0usize;
    let mut array_elements = 0usize;
    for a in &assignments {
        for v in &a.lhs_vars {
            if v.is_scalar() {
                scalars += 1;
            } else {
                array_elements += 1;
            }
        }
    }

    Ok(CollectedModel {
        env,
        assignments,
        report: CollectReport {
            scalars,
            array_elements,
            loops_unrolled,
            transformed_variables: transformed_set.len(),
        },
    })
}

fn process_statement(
    stmt: Stmt,
    env: &mut Env,
    reg: &PrimitiveRegistry,
    checker: &mut RepeatedAssignmentChecker,
    assignments: &mut Vec<Assignment>,
    source_index: &mut usize,
) -> BugsResult<()> {
    match stmt {
        Stmt::Logical { lhs, rhs } => {
            let vars = simplify_lhs(&lhs, env, reg)?;
            for var in &vars {
                checker.record_logical(var)?;
                allocate_or_check_overwrite(env, var, false)?;
            }
            assignments.push(Assignment {
                lhs_vars: vars,
                kind: VarKind::Logical,
                rhs,
                link: None,
                source_index: *source_index,
            });
            *source_index += 1;
            Ok(())
        }
        Stmt::Stochastic {
            lhs,
            dist,
            link,
            truncate,
            censor,
        } => {
            debug_assert!(truncate.is_none() && censor.is_none(), "normalize() must run first");
            let vars = simplify_lhs(&lhs, env, reg)?;
            for var in &vars {
                checker.record_stochastic(var)?;
                allocate_or_check_overwrite(env, var, true)?;
            }
            if vars.len() > 1 {
                let determined: Vec<bool> = vars.iter().map(|v| is_determined(env, v)).collect();
                if determined.iter().any(|&b| b) && determined.iter().any(|&b| !b) {
                    return Err(BugsError::PartialObservation(ErrorInfo::new(
                        "partial-observation",
                        format!("`{}` is a multivariate stochastic node partially observed by data", vars[0].name),
                    )));
                }
            }
            assignments.push(Assignment {
                lhs_vars: vars,
                kind: VarKind::Stochastic,
                rhs: dist,
                link,
                source_index: *source_index,
            });
            *source_index += 1;
            Ok(())
        }
        Stmt::For { .. } | Stmt::If { .. } => unreachable!("handled by the caller"),
    }
}

/// Allocates a non-data cell for `var` (growing array shape as needed), or, for a
/// data-provided identifier, checks that a logical write does not clobber an
/// already-determined data cell (spec.md §4.C.2a).
fn allocate_or_check_overwrite(env: &mut Env, var: &VarId, is_stochastic: bool) -> BugsResult<()> {
    if env.is_data(&var.name) {
        if !is_stochastic && is_determined(env, var) {
            return Err(BugsError::OverwriteData(ErrorInfo::new(
                "overwrite-data",
                format!("logical assignment targets data-provided cell `{var}`"),
            )));
        }
        return Ok(());
    }
    if var.indices.is_empty() {
        env.ensure_scalar(&var.name);
    } else {
        env.grow_array_shape(&var.name, &var.indices).map_err(|msg| {
            BugsError::ShapeMismatch(ErrorInfo::new("shape-mismatch", msg).with_context("var", var.to_string()))
        })?;
    }
    Ok(())
}

/// Simplifies an LHS into its scalarized element identities (spec.md §4.C.1),
/// expanding any range indices into the cartesian product of element indices.
fn simplify_lhs(lhs: &Lhs, env: &Env, reg: &PrimitiveRegistry) -> BugsResult<Vec<VarId>> {
    match lhs {
        Lhs::Sym(name) => Ok(vec![VarId::scalar(name.clone())]),
        Lhs::Ref(name, idx_exprs) => {
            let mut axes: Vec<Vec<i64>> = Vec::with_capacity(idx_exprs.len());
            for idx in idx_exprs {
                let resolved = eval(idx, env, reg)?;
                match resolved {
                    EvalResult::Scalar(s) => match s.as_exact_i64() {
                        Some(i) => axes.push(vec![i]),
                        None => {
                            return Err(BugsError::NonIntegerIndex(ErrorInfo::new(
                                "non-integer-index",
                                format!("LHS index `{idx}` of `{name}` is not exactly integral"),
                            )))
                        }
                    },
                    EvalResult::Range(lo, hi) => axes.push((lo..=hi).collect()),
                    _ => {
                        return Err(BugsError::UnresolvableIndex(ErrorInfo::new(
                            "unresolvable-index",
                            format!("LHS index `{idx}` of `{name}` did not resolve"),
                        )))
                    }
                }
            }
            Ok(cartesian(&axes)
                .into_iter()
                .map(|indices| VarId::element(name.clone(), indices))
                .collect())
        }
        Lhs::Link(link, _) => Err(BugsError::UnsupportedExpression(ErrorInfo::new(
            "unnormalized-link",
            format!("link function `{link}` reached the collector; run AST normalization first"),
        ))),
    }
}

fn cartesian(axes: &[Vec<i64>]) -> Vec<Vec<i64>> {
    axes.iter().fold(vec![Vec::new()], |acc, axis| {
        let mut out = Vec::with_capacity(acc.len() * axis.len().max(1));
        for prefix in &acc {
            for &v in axis {
                let mut combo = prefix.clone();
                combo.push(v);
                out.push(combo);
            }
        }
        out
    })
}

fn substitute_stmt(stmt: &Stmt, var: &str, value: i64) -> Stmt {
    match stmt {
        Stmt::Logical { lhs, rhs } => Stmt::Logical {
            lhs: substitute_lhs(lhs, var, value),
            rhs: substitute_expr(rhs, var, value),
        },
        Stmt::Stochastic {
            lhs,
            dist,
            truncate,
            censor,
            link,
        } => Stmt::Stochastic {
            lhs: substitute_lhs(lhs, var, value),
            dist: substitute_expr(dist, var, value),
            truncate: truncate.as_ref().map(|(l, h)| {
                (
                    l.as_ref().map(|e| substitute_expr(e, var, value)),
                    h.as_ref().map(|e| substitute_expr(e, var, value)),
                )
            }),
            censor: censor.as_ref().map(|(l, h)| {
                (
                    l.as_ref().map(|e| substitute_expr(e, var, value)),
                    h.as_ref().map(|e| substitute_expr(e, var, value)),
                )
            }),
            link: link.clone(),
        },
        Stmt::For { var: inner, lo, hi, body } => Stmt::For {
            var: inner.clone(),
            lo: substitute_expr(lo, var, value),
            hi: substitute_expr(hi, var, value),
            body: if inner == var {
                body.clone()
            } else {
                body.iter().map(|s| substitute_stmt(s, var, value)).collect()
            },
        },
        Stmt::If { cond, body } => Stmt::If {
            cond: substitute_expr(cond, var, value),
            body: body.iter().map(|s| substitute_stmt(s, var, value)).collect(),
        },
    }
}

fn substitute_lhs(lhs: &Lhs, var: &str, value: i64) -> Lhs {
    match lhs {
        Lhs::Sym(name) => Lhs::Sym(name.clone()),
        Lhs::Ref(name, idx) => Lhs::Ref(name.clone(), idx.iter().map(|e| substitute_expr(e, var, value)).collect()),
        Lhs::Link(link, inner) => Lhs::Link(link.clone(), Box::new(substitute_lhs(inner, var, value))),
    }
}

fn substitute_expr(expr: &Expr, var: &str, value: i64) -> Expr {
    match expr {
        Expr::Sym(name) if name == var => Expr::Int(value),
        Expr::Sym(name) => Expr::Sym(name.clone()),
        Expr::Ref(name, idx) => Expr::Ref(name.clone(), idx.iter().map(|e| substitute_expr(e, var, value)).collect()),
        Expr::Call(name, args) => Expr::Call(name.clone(), args.iter().map(|e| substitute_expr(e, var, value)).collect()),
        other => other.clone(),
    }
}
