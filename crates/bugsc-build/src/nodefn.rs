//! The node-function builder (spec.md §4.F): for each surviving model variable,
//! derives its dependency set, its coarse argument set, and a callable
//! representation of its remaining computation.

use std::collections::BTreeSet;

use bugsc_core::ast::Expr;
use bugsc_core::env::{Cell, Env};
use bugsc_core::errors::{BugsError, BugsResult, ErrorInfo};
use bugsc_core::registry::PrimitiveRegistry;
use bugsc_core::value::{EvalResult, Scalar};
use bugsc_core::var::VarId;
use bugsc_eval::eval;
use bugsc_collect::{Assignment, VarKind};
use serde::{Deserialize, Serialize};

use crate::graph::VertexId;

/// Whether a node is deterministic or distributional (spec.md glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// `lhs = rhs`.
    Logical,
    /// `lhs ~ dist`.
    Stochastic,
}

impl From<VarKind> for NodeKind {
    fn from(k: VarKind) -> Self {
        match k {
            VarKind::Logical => NodeKind::Logical,
            VarKind::Stochastic => NodeKind::Stochastic,
        }
    }
}

/// The callable attached to a node, as a tagged variant (spec.md §9 "in languages
/// without first-class closures, use a tagged variant"; Rust has closures, but a
/// tagged tree keeps the representation inspectable and serializable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeFn {
    /// A nullary constant, for a literal RHS.
    Constant(Scalar),
    /// `fn(y) = y`, for a bare-identifier RHS. The single argument name is the
    /// node record's sole entry in `args`.
    Identity,
    /// `fn(y) = y[indices]`, for a fully constant-indexed reference RHS.
    SliceGet(Vec<i64>),
    /// The general case: the (partially folded) RHS expression tree, evaluated
    /// against `args` bound at call time.
    Compiled(Expr),
}

/// Per-vertex node record (spec.md §6 "per-vertex node records `(kind, link?, fn,
/// args)`"), plus the fine-grained dependency set used by the graph builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    /// The vertex this record describes.
    pub vertex: VertexId,
    /// Logical or stochastic.
    pub kind: NodeKind,
    /// Link-function tag, stochastic nodes only (spec.md §4.F "any surviving link
    /// function [on a logical node] is a fatal error").
    pub link: Option<String>,
    /// Fine-grained (scalar/element) dependencies.
    pub deps: BTreeSet<VarId>,
    /// Coarse (whole-array/whole-scalar) argument names, in the callable's
    /// parameter order.
    pub args: Vec<String>,
    /// The callable.
    pub func: NodeFn,
}

fn is_determined(env: &Env, var: &VarId) -> bool {
    match env.get(&var.name) {
        Some(Cell::Scalar(v)) => v.is_some(),
        Some(Cell::Array(a)) => matches!(a.get(&var.indices), Some(Some(_))),
        None => false,
    }
}

/// Walks `expr`, recording every still-undetermined dependency it reads and every
/// coarse argument name it needs (spec.md §4.F: "a dependency-tracking variant of
/// §4.B that, when it encounters an unresolved reference, records an entry for
/// each still-undetermined element in the referenced range").
fn analyze(
    expr: &Expr,
    env: &Env,
    reg: &PrimitiveRegistry,
    deps: &mut BTreeSet<VarId>,
    args: &mut BTreeSet<String>,
) -> BugsResult<()> {
    match expr {
        Expr::Int(_) | Expr::Float(_) | Expr::Colon => Ok(()),
        Expr::Sym(name) => {
            if !is_determined(env, &VarId::scalar(name.clone())) {
                deps.insert(VarId::scalar(name.clone()));
                args.insert(name.clone());
            }
            Ok(())
        }
        Expr::Ref(name, idx_exprs) => {
            for idx in idx_exprs {
                analyze(idx, env, reg, deps, args)?;
            }
            let mut axes: Vec<Vec<i64>> = Vec::with_capacity(idx_exprs.len());
            for (axis, idx) in idx_exprs.iter().enumerate() {
                match eval(idx, env, reg)? {
                    EvalResult::Scalar(s) => match s.as_exact_i64() {
                        Some(i) => axes.push(vec![i]),
                        None => {
                            return Err(BugsError::NonIntegerIndex(ErrorInfo::new(
                                "non-integer-index",
                                format!("index `{idx}` of `{name}` is not exactly integral"),
                            )))
                        }
                    },
                    EvalResult::Range(lo, hi) => axes.push((lo..=hi).collect()),
                    EvalResult::Colon => {
                        let extent = env
                            .shape_of(name)
                            .and_then(|shape| shape.get(axis))
                            .copied()
                            .ok_or_else(|| {
                                BugsError::UnresolvableIndex(ErrorInfo::new(
                                    "unresolvable-colon",
                                    format!("`{name}[,]` has no known shape to resolve against"),
                                ))
                            })?;
                        axes.push((1..=extent as i64).collect());
                    }
                    _ => {
                        return Err(BugsError::UnresolvableIndex(ErrorInfo::new(
                            "unresolvable-index",
                            format!("index `{idx}` of `{name}` did not resolve"),
                        )))
                    }
                }
            }
            let combos = cartesian(&axes);
            let mut any_undetermined = false;
            for c in &combos {
                let var = VarId::element(name.clone(), c.clone());
                if !is_determined(env, &var) {
                    any_undetermined = true;
                    deps.insert(var);
                }
            }
            if any_undetermined {
                args.insert(name.clone());
            }
            Ok(())
        }
        Expr::Call(_, cargs) => {
            for a in cargs {
                analyze(a, env, reg, deps, args)?;
            }
            Ok(())
        }
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

/// Builds the node record for a single-element assignment, applying the three
/// structural shortcuts from spec.md §4.F before falling back to a compiled tree.
fn build_single(
    var: VarId,
    kind: VarKind,
    rhs: &Expr,
    link: Option<String>,
    env: &Env,
    reg: &PrimitiveRegistry,
) -> BugsResult<NodeRecord> {
    if kind == VarKind::Logical && link.is_some() {
        return Err(BugsError::UnsupportedExpression(ErrorInfo::new(
            "link-on-logical-node",
            format!("`{var}` is a logical node but carries a surviving link-function tag"),
        )));
    }

    let ref_indices = match rhs {
        Expr::Ref(_, idx_exprs) => constant_indices(idx_exprs, env, reg)?,
        _ => None,
    };

    let (deps, args, func) = match (rhs, ref_indices) {
        (Expr::Int(v), _) => (BTreeSet::new(), Vec::new(), NodeFn::Constant(Scalar::Int(*v))),
        (Expr::Float(v), _) => (BTreeSet::new(), Vec::new(), NodeFn::Constant(Scalar::Float(*v))),
        (Expr::Sym(name), _) => {
            let mut deps = BTreeSet::new();
            deps.insert(VarId::scalar(name.clone()));
            (deps, vec![name.clone()], NodeFn::Identity)
        }
        (Expr::Ref(name, _), Some(indices)) => {
            let mut deps = BTreeSet::new();
            deps.insert(VarId::element(name.clone(), indices.clone()));
            (deps, vec![name.clone()], NodeFn::SliceGet(indices))
        }
        (other, _) => {
            let mut deps = BTreeSet::new();
            let mut args = BTreeSet::new();
            analyze(other, env, reg, &mut deps, &mut args)?;
            (deps, args.into_iter().collect(), NodeFn::Compiled(other.clone()))
        }
    };

    Ok(NodeRecord {
        vertex: VertexId::Var(var),
        kind: kind.into(),
        link,
        deps,
        args,
        func,
    })
}

/// `Some(indices)` iff every index expression resolves to an exact integer.
fn constant_indices(idx_exprs: &[Expr], env: &Env, reg: &PrimitiveRegistry) -> BugsResult<Option<Vec<i64>>> {
    let mut indices = Vec::with_capacity(idx_exprs.len());
    for idx in idx_exprs {
        match eval(idx, env, reg)?.as_exact_i64() {
            Some(i) => indices.push(i),
            None => return Ok(None),
        }
    }
    Ok(Some(indices))
}

/// Builds node records for every surviving model variable in `assignments`
/// (spec.md §4.F), scalarizing multivariate slice assignments into an auxiliary
/// producer vertex plus a trivial reader vertex per element (§9 "apparent cycles
/// through array slices are broken by scalarizing to elements").
pub fn build_nodes(
    assignments: &[Assignment],
    env: &Env,
    reg: &PrimitiveRegistry,
) -> BugsResult<Vec<NodeRecord>> {
    let mut nodes = Vec::new();
    for assignment in assignments {
        if assignment.lhs_vars.len() == 1 {
            nodes.push(build_single(
                assignment.lhs_vars[0].clone(),
                assignment.kind,
                &assignment.rhs,
                assignment.link.clone(),
                env,
                reg,
            )?);
            continue;
        }

        let array_name = assignment.lhs_vars[0].name.clone();
        let mut deps = BTreeSet::new();
        let mut args = BTreeSet::new();
        analyze(&assignment.rhs, env, reg, &mut deps, &mut args)?;
        nodes.push(NodeRecord {
            vertex: VertexId::ArrayAux(array_name.clone()),
            kind: assignment.kind.into(),
            link: assignment.link.clone(),
            deps,
            args: args.into_iter().collect(),
            func: NodeFn::Compiled(assignment.rhs.clone()),
        });
        for var in &assignment.lhs_vars {
            nodes.push(NodeRecord {
                vertex: VertexId::Var(var.clone()),
                kind: assignment.kind.into(),
                link: None,
                deps: BTreeSet::new(),
                args: vec![array_name.clone()],
                func: NodeFn::SliceGet(var.indices.clone()),
            });
        }
    }
    Ok(nodes)
}
