//! AST normalization (spec.md §4.A): link-function lowering, cumulative/density
//! rewriting, truncation/censoring canonicalization, and (SPEC_FULL.md supplement)
//! `if` elimination. Applied once, top-down; a second application is a no-op
//! (spec.md §8 property 6).

use bugsc_core::ast::{Expr, Lhs, Program, Stmt};
use bugsc_core::env::Env;
use bugsc_core::errors::{BugsError, BugsResult, ErrorInfo};
use bugsc_core::registry::{link_inverse, PrimitiveRegistry};

use crate::partial_eval::eval;

/// Normalizes a whole program. `env` supplies the data used to resolve `if`
/// conditions; it is read-only.
pub fn normalize(program: &Program, env: &Env, reg: &PrimitiveRegistry) -> BugsResult<Program> {
    let distributions = collect_stochastic_targets(program);
    normalize_block(program, env, reg, &distributions)
}

/// `(name, rhs distribution expr)` pairs for every stochastic statement in the
/// program, found by walking into `for` bodies (not unrolled — this runs before
/// loop unrolling). Used to resolve `cumulative`/`density` (spec.md §4.A).
fn collect_stochastic_targets(program: &Program) -> Vec<(String, Expr)> {
    let mut out = Vec::new();
    for stmt in program {
        match stmt {
            Stmt::Stochastic { lhs, dist, .. } => {
                out.push((lhs_name(lhs).to_string(), dist.clone()));
            }
            Stmt::For { body, .. } => out.extend(collect_stochastic_targets(body)),
            Stmt::If { body, .. } => out.extend(collect_stochastic_targets(body)),
            Stmt::Logical { .. } => {}
        }
    }
    out
}

fn lhs_name(lhs: &Lhs) -> &str {
    match lhs {
        Lhs::Sym(n) => n,
        Lhs::Ref(n, _) => n,
        Lhs::Link(_, inner) => lhs_name(inner),
    }
}

fn distribution_for(name: &str, targets: &[(String, Expr)]) -> BugsResult<Expr> {
    let matches: Vec<&Expr> = targets.iter().filter(|(n, _)| n == name).map(|(_, d)| d).collect();
    match matches.as_slice() {
        [single] => Ok((*single).clone()),
        [] => Err(BugsError::UndefinedDistribution(ErrorInfo::new(
            "no-stochastic-assignment",
            format!("`{name}` has no stochastic assignment to take its distribution from"),
        ))),
        _ => Err(BugsError::MultipleDistributionsFor(ErrorInfo::new(
            "multiple-distributions",
            format!("`{name}` has more than one stochastic assignment"),
        ))),
    }
}

fn normalize_block(
    stmts: &[Stmt],
    env: &Env,
    reg: &PrimitiveRegistry,
    targets: &[(String, Expr)],
) -> BugsResult<Program> {
    let mut out = Vec::new();
    for stmt in stmts {
        normalize_stmt(stmt, env, reg, targets, &mut out)?;
    }
    Ok(out)
}

fn normalize_stmt(
    stmt: &Stmt,
    env: &Env,
    reg: &PrimitiveRegistry,
    targets: &[(String, Expr)],
    out: &mut Program,
) -> BugsResult<()> {
    match stmt {
        Stmt::Logical { lhs, rhs } => {
            let rhs = rewrite_cumulative_density(rhs, targets)?;
            let (lhs, rhs) = lower_logical_link(lhs.clone(), rhs)?;
            out.push(Stmt::Logical { lhs, rhs });
            Ok(())
        }
        Stmt::Stochastic {
            lhs,
            dist,
            truncate,
            censor,
            link,
        } => {
            let (lhs, extra_link) = lower_stochastic_link(lhs.clone())?;
            let link = match (link.clone(), extra_link) {
                (Some(_), Some(_)) => {
                    return Err(BugsError::UnsupportedExpression(ErrorInfo::new(
                        "double-link",
                        "a stochastic statement has two link-function tags",
                    )))
                }
                (Some(l), None) | (None, Some(l)) => Some(l),
                (None, None) => None,
            };
            let dist = apply_truncation_censoring(dist.clone(), truncate, censor)?;
            out.push(Stmt::Stochastic {
                lhs,
                dist,
                truncate: None,
                censor: None,
                link,
            });
            Ok(())
        }
        Stmt::For { var, lo, hi, body } => {
            let body = normalize_block(body, env, reg, targets)?;
            out.push(Stmt::For {
                var: var.clone(),
                lo: lo.clone(),
                hi: hi.clone(),
                body,
            });
            Ok(())
        }
        Stmt::If { cond, body } => {
            let resolved = eval(cond, env, reg)?;
            let truthy = resolved.as_exact_i64().map(|v| v != 0).or_else(|| {
                resolved.as_scalar().map(|s| s.as_f64() != 0.0)
            });
            match truthy {
                Some(true) => {
                    let body = normalize_block(body, env, reg, targets)?;
                    out.extend(body);
                    Ok(())
                }
                Some(false) => Ok(()),
                None => Err(BugsError::UnsupportedExpression(ErrorInfo::new(
                    "unresolvable-if-condition",
                    format!("`if` condition `{cond}` cannot be resolved from data"),
                ))),
            }
        }
    }
}

fn lower_logical_link(lhs: Lhs, rhs: Expr) -> BugsResult<(Lhs, Expr)> {
    match lhs {
        Lhs::Link(link, inner) => {
            let finv = link_inverse(&link).ok_or_else(|| {
                BugsError::UndefinedLinkFunction(ErrorInfo::new(
                    "undefined-link-function",
                    format!("`{link}` is not a recognized link function"),
                ))
            })?;
            let (inner_lhs, rhs) = lower_logical_link(*inner, Expr::Call(finv.to_string(), vec![rhs]))?;
            Ok((inner_lhs, rhs))
        }
        plain => Ok((plain, rhs)),
    }
}

fn lower_stochastic_link(lhs: Lhs) -> BugsResult<(Lhs, Option<String>)> {
    match lhs {
        Lhs::Link(link, inner) => {
            if link_inverse(&link).is_none() {
                return Err(BugsError::UndefinedLinkFunction(ErrorInfo::new(
                    "undefined-link-function",
                    format!("`{link}` is not a recognized link function"),
                )));
            }
            let (plain, existing) = lower_stochastic_link(*inner)?;
            if existing.is_some() {
                return Err(BugsError::UnsupportedExpression(ErrorInfo::new(
                    "nested-link",
                    "a stochastic LHS has two nested link functions",
                )));
            }
            Ok((plain, Some(link)))
        }
        plain => Ok((plain, None)),
    }
}

fn rewrite_cumulative_density(expr: &Expr, targets: &[(String, Expr)]) -> BugsResult<Expr> {
    match expr {
        Expr::Call(name, args) if (name == "cumulative" || name == "density") && args.len() == 2 => {
            let target_name = match &args[0] {
                Expr::Sym(n) => n.clone(),
                Expr::Ref(n, _) => n.clone(),
                other => {
                    return Err(BugsError::UnsupportedExpression(ErrorInfo::new(
                        "cumulative-target",
                        format!("`{name}`'s first argument must be a variable, got `{other}`"),
                    )))
                }
            };
            let dist = distribution_for(&target_name, targets)?;
            let y = rewrite_cumulative_density(&args[1], targets)?;
            let wrapper = if name == "cumulative" { "cdf" } else { "pdf" };
            Ok(Expr::Call(wrapper.to_string(), vec![dist, y]))
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|a| rewrite_cumulative_density(a, targets))
                .collect::<BugsResult<_>>()?;
            Ok(Expr::Call(name.clone(), args))
        }
        Expr::Ref(name, idx) => {
            let idx = idx
                .iter()
                .map(|a| rewrite_cumulative_density(a, targets))
                .collect::<BugsResult<_>>()?;
            Ok(Expr::Ref(name.clone(), idx))
        }
        other => Ok(other.clone()),
    }
}

fn apply_truncation_censoring(
    dist: Expr,
    truncate: &Option<(Option<Expr>, Option<Expr>)>,
    censor: &Option<(Option<Expr>, Option<Expr>)>,
) -> BugsResult<Expr> {
    if truncate.is_some() && censor.is_some() {
        return Err(BugsError::UnsupportedExpression(ErrorInfo::new(
            "truncate-and-censor",
            "a stochastic statement has both T(...) and C(...)",
        )));
    }
    if let Some((lo, hi)) = truncate {
        return Ok(wrap_bounds("truncated", dist, lo, hi));
    }
    if let Some((lo, hi)) = censor {
        return Ok(wrap_bounds("censored", dist, lo, hi));
    }
    Ok(dist)
}

fn wrap_bounds(base: &str, dist: Expr, lo: &Option<Expr>, hi: &Option<Expr>) -> Expr {
    match (lo, hi) {
        (Some(lo), Some(hi)) => Expr::Call(base.to_string(), vec![dist, lo.clone(), hi.clone()]),
        (Some(lo), None) => Expr::Call(format!("{base}_lower"), vec![dist, lo.clone()]),
        (None, Some(hi)) => Expr::Call(format!("{base}_upper"), vec![dist, hi.clone()]),
        (None, None) => dist,
    }
}
