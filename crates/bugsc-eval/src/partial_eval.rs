//! The partial evaluator (spec.md §4.B): a total function `eval(expr, env)` that
//! folds constants, resolves indices and ranges, and otherwise returns the input
//! expression with as much of it resolved as possible.

use bugsc_core::ast::Expr;
use bugsc_core::env::{Cell, Env};
use bugsc_core::errors::{BugsError, BugsResult, ErrorInfo};
use bugsc_core::registry::PrimitiveRegistry;
use bugsc_core::value::{EvalResult, Scalar};

/// Evaluates `expr` against `env`, folding everything the whitelisted primitive set
/// and the environment make resolvable (spec.md §4.B).
pub fn eval(expr: &Expr, env: &Env, reg: &PrimitiveRegistry) -> BugsResult<EvalResult> {
    match expr {
        Expr::Int(v) => Ok(EvalResult::Scalar(Scalar::Int(*v))),
        Expr::Float(v) => Ok(EvalResult::Scalar(Scalar::Float(*v))),
        Expr::Colon => Ok(EvalResult::Colon),
        Expr::Sym(name) => eval_sym(name, env),
        Expr::Ref(name, indices) => eval_ref(name, indices, env, reg),
        Expr::Call(name, args) => eval_call(name, args, env, reg),
    }
}

/// True iff `result` is fully determined (spec.md §4.B `is_resolved`).
pub fn is_resolved(result: &EvalResult) -> bool {
    result.is_resolved()
}

fn eval_sym(name: &str, env: &Env) -> BugsResult<EvalResult> {
    match env.get(name) {
        Some(Cell::Scalar(Some(v))) => Ok(EvalResult::Scalar(*v)),
        Some(Cell::Array(a)) if a.is_fully_resolved() => Ok(EvalResult::Array(
            a.shape.clone(),
            a.data.iter().map(|c| c.unwrap()).collect(),
        )),
        _ => Ok(EvalResult::Unresolved(Expr::Sym(name.to_string()))),
    }
}

/// Resolves one index expression to either a concrete 1-based integer, a resolved
/// `lo..=hi` range, the colon marker, or "still unresolved".
enum IndexResolution {
    Int(i64),
    Range(i64, i64),
    Colon,
    Unresolved(Expr),
}

fn eval_index(expr: &Expr, env: &Env, reg: &PrimitiveRegistry) -> BugsResult<IndexResolution> {
    let evaluated = eval(expr, env, reg)?;
    match evaluated {
        EvalResult::Scalar(s) => match s.as_exact_i64() {
            Some(i) => Ok(IndexResolution::Int(i)),
            None => Err(BugsError::NonIntegerIndex(
                ErrorInfo::new("non-integer-index", format!("index `{expr}` is not exactly integral"))
                    .with_context("expr", expr.to_string()),
            )),
        },
        EvalResult::Range(lo, hi) => Ok(IndexResolution::Range(lo, hi)),
        EvalResult::Colon => Ok(IndexResolution::Colon),
        EvalResult::Array(_, _) => Err(BugsError::UnresolvableIndex(
            ErrorInfo::new("array-valued-index", format!("index `{expr}` resolved to an array"))
                .with_context("expr", expr.to_string()),
        )),
        EvalResult::Unresolved(e) => Ok(IndexResolution::Unresolved(e)),
    }
}

fn eval_ref(name: &str, indices: &[Expr], env: &Env, reg: &PrimitiveRegistry) -> BugsResult<EvalResult> {
    let shape = env.shape_of(name).map(|s| s.to_vec());
    let mut resolved_exprs = Vec::with_capacity(indices.len());
    let mut concrete: Vec<Option<(i64, i64)>> = Vec::with_capacity(indices.len());
    let mut all_concrete = true;

    for (axis, idx) in indices.iter().enumerate() {
        match eval_index(idx, env, reg)? {
            IndexResolution::Int(i) => {
                resolved_exprs.push(Expr::Int(i));
                concrete.push(Some((i, i)));
            }
            IndexResolution::Range(lo, hi) => {
                resolved_exprs.push(Expr::range(Expr::Int(lo), Expr::Int(hi)));
                concrete.push(Some((lo, hi)));
            }
            IndexResolution::Colon => {
                if let Some(shape) = &shape {
                    let extent = shape.get(axis).copied().unwrap_or(0) as i64;
                    resolved_exprs.push(Expr::range(Expr::Int(1), Expr::Int(extent)));
                    concrete.push(Some((1, extent)));
                } else {
                    resolved_exprs.push(Expr::Colon);
                    all_concrete = false;
                    concrete.push(None);
                }
            }
            IndexResolution::Unresolved(e) => {
                resolved_exprs.push(e);
                all_concrete = false;
                concrete.push(None);
            }
        }
    }

    if !all_concrete || env.get(name).is_none() {
        return Ok(EvalResult::Unresolved(Expr::Ref(name.to_string(), resolved_exprs)));
    }

    let cell = env.get(name).unwrap();
    let ranges: Vec<(i64, i64)> = concrete.into_iter().map(|c| c.unwrap()).collect();
    let is_slice = ranges.iter().any(|(lo, hi)| lo != hi);

    match cell {
        Cell::Scalar(v) => {
            if !indices.is_empty() {
                return Err(BugsError::UnsupportedExpression(
                    ErrorInfo::new("scalar-indexed", format!("`{name}` is a scalar but was indexed")),
                ));
            }
            match v {
                Some(v) => Ok(EvalResult::Scalar(*v)),
                None => Ok(EvalResult::Unresolved(Expr::Sym(name.to_string()))),
            }
        }
        Cell::Array(arr) => {
            if !is_slice {
                let idx: Vec<i64> = ranges.iter().map(|(lo, _)| *lo).collect();
                return match arr.get(&idx) {
                    Some(Some(v)) => Ok(EvalResult::Scalar(v)),
                    Some(None) => Ok(EvalResult::Unresolved(Expr::Ref(name.to_string(), resolved_exprs))),
                    None => Err(BugsError::UnresolvableIndex(
                        ErrorInfo::new("index-out-of-bounds", format!("`{name}[{idx:?}]` is out of bounds")),
                    )),
                };
            }
            let axis_indices: Vec<Vec<i64>> = ranges.iter().map(|(lo, hi)| (*lo..=*hi).collect()).collect();
            let mut values = Vec::new();
            let mut all_determined = true;
            for combo in cartesian(&axis_indices) {
                match arr.get(&combo) {
                    Some(Some(v)) => values.push(v),
                    Some(None) => {
                        all_determined = false;
                        break;
                    }
                    None => {
                        return Err(BugsError::UnresolvableIndex(ErrorInfo::new(
                            "slice-out-of-bounds",
                            format!("`{name}` slice `{resolved_exprs:?}` is out of bounds"),
                        )))
                    }
                }
            }
            if all_determined {
                let slice_shape: Vec<usize> = ranges.iter().map(|(lo, hi)| (hi - lo + 1).max(0) as usize).collect();
                Ok(EvalResult::Array(slice_shape, values))
            } else {
                Ok(EvalResult::Unresolved(Expr::Ref(name.to_string(), resolved_exprs)))
            }
        }
    }
}

fn cartesian(axes: &[Vec<i64>]) -> Vec<Vec<i64>> {
    axes.iter().fold(vec![Vec::new()], |acc, axis| {
        let mut out = Vec::with_capacity(acc.len() * axis.len());
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

fn eval_call(name: &str, args: &[Expr], env: &Env, reg: &PrimitiveRegistry) -> BugsResult<EvalResult> {
    if name == ":" && args.len() == 2 {
        let lo = eval(&args[0], env, reg)?;
        let hi = eval(&args[1], env, reg)?;
        return match (lo.as_exact_i64(), hi.as_exact_i64()) {
            (Some(lo), Some(hi)) => Ok(EvalResult::Range(lo, hi)),
            _ => Ok(EvalResult::Unresolved(Expr::Call(
                name.to_string(),
                vec![resolved_or_original(&args[0], &lo), resolved_or_original(&args[1], &hi)],
            ))),
        };
    }

    let evaluated: Vec<EvalResult> = args
        .iter()
        .map(|a| eval(a, env, reg))
        .collect::<BugsResult<_>>()?;

    // Distribution constructors (and their truncated/censored/cdf/pdf wrappers) are
    // never folded to a value: evaluating a stochastic RHS doesn't produce a
    // definite scalar. Their (recursively folded) arguments are still propagated.
    if reg.is_distribution(name) {
        let folded_args = evaluated
            .iter()
            .zip(args.iter())
            .map(|(res, orig)| resolved_or_original(orig, res))
            .collect();
        return Ok(EvalResult::Unresolved(Expr::Call(name.to_string(), folded_args)));
    }

    if !reg.is_known(name) {
        return Err(BugsError::UndefinedFunction(
            ErrorInfo::new("undefined-function", format!("`{name}` is not a registered function"))
                .with_context("name", name.to_string()),
        ));
    }

    if !evaluated.iter().all(is_resolved) {
        let folded_args = evaluated
            .iter()
            .zip(args.iter())
            .map(|(res, orig)| resolved_or_original(orig, res))
            .collect();
        return Ok(EvalResult::Unresolved(Expr::Call(name.to_string(), folded_args)));
    }

    if !is_hardcoded_primitive(name) {
        // `name` was added via `PrimitiveRegistry::register` (spec.md §6's extension
        // hook) rather than being one of the folder's fixed arithmetic/math arms.
        // Registering a name doesn't obligate the folder to implement it: an
        // arity-valid call is left `Unresolved` for `bugsc-build` to wrap as a
        // `Compiled` node function, same as any other call the folder can't finish.
        if !reg.accepts(name, args.len()) {
            return Err(BugsError::UnsupportedExpression(
                ErrorInfo::new(
                    "primitive-arity-mismatch",
                    format!("`{name}` does not accept {} argument(s)", args.len()),
                )
                .with_context("name", name.to_string())
                .with_context("argc", args.len().to_string()),
            ));
        }
        let folded_args = evaluated
            .iter()
            .zip(args.iter())
            .map(|(res, orig)| resolved_or_original(orig, res))
            .collect();
        return Ok(EvalResult::Unresolved(Expr::Call(name.to_string(), folded_args)));
    }

    apply_primitive(name, &evaluated)
}

/// Names `apply_primitive` actually implements. Anything else that reaches
/// [`eval_call`] with resolved arguments is a registered-but-not-hardcoded
/// primitive (see above) and is left unresolved rather than folded.
fn is_hardcoded_primitive(name: &str) -> bool {
    matches!(
        name,
        "+" | "-"
            | "*"
            | "/"
            | "^"
            | "pow"
            | "max"
            | "min"
            | "neg"
            | "log"
            | "exp"
            | "sqrt"
            | "logistic"
            | "cexpexp"
            | "phi"
            | "abs"
            | "step"
            | "mean"
            | "sum"
    )
}

fn resolved_or_original(original: &Expr, result: &EvalResult) -> Expr {
    match result {
        EvalResult::Scalar(Scalar::Int(v)) => Expr::Int(*v),
        EvalResult::Scalar(Scalar::Float(v)) => Expr::Float(*v),
        EvalResult::Range(lo, hi) => Expr::range(Expr::Int(*lo), Expr::Int(*hi)),
        EvalResult::Unresolved(e) => e.clone(),
        EvalResult::Colon => Expr::Colon,
        EvalResult::Array(_, _) => original.clone(),
    }
}

fn as_scalars(args: &[EvalResult]) -> BugsResult<Vec<Scalar>> {
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        match a {
            EvalResult::Scalar(s) => out.push(*s),
            EvalResult::Array(_, vals) => out.extend(vals.iter().copied()),
            _ => {
                return Err(BugsError::UnsupportedExpression(ErrorInfo::new(
                    "non-scalar-argument",
                    "expected scalar or array argument",
                )))
            }
        }
    }
    Ok(out)
}

fn apply_primitive(name: &str, args: &[EvalResult]) -> BugsResult<EvalResult> {
    let is_all_int = args.iter().all(|a| matches!(a, EvalResult::Scalar(Scalar::Int(_))));
    macro_rules! binop {
        ($a:expr, $b:expr, $op:tt) => {{
            if is_all_int {
                Scalar::Int((($a).as_f64() as i64) $op (($b).as_f64() as i64))
            } else {
                Scalar::Float(($a).as_f64() $op ($b).as_f64())
            }
        }};
    }

    match name {
        "+" | "-" | "*" | "/" | "^" | "max" | "min" | "pow" if args.len() == 2 => {
            let a = args[0].as_scalar().unwrap();
            let b = args[1].as_scalar().unwrap();
            let result = match name {
                "+" => binop!(a, b, +),
                "-" => binop!(a, b, -),
                "*" => binop!(a, b, *),
                "/" => Scalar::Float(a.as_f64() / b.as_f64()),
                "^" | "pow" => Scalar::Float(a.as_f64().powf(b.as_f64())),
                "max" => {
                    if a.as_f64() >= b.as_f64() {
                        a
                    } else {
                        b
                    }
                }
                "min" => {
                    if a.as_f64() <= b.as_f64() {
                        a
                    } else {
                        b
                    }
                }
                _ => unreachable!(),
            };
            Ok(EvalResult::Scalar(result))
        }
        "neg" if args.len() == 1 => {
            let a = args[0].as_scalar().unwrap();
            Ok(EvalResult::Scalar(if a.is_int() {
                Scalar::Int(-(a.as_f64() as i64))
            } else {
                Scalar::Float(-a.as_f64())
            }))
        }
        "log" | "exp" | "sqrt" | "logistic" | "cexpexp" | "phi" | "abs" | "step" if args.len() == 1 => {
            let a = args[0].as_scalar().unwrap().as_f64();
            let v = match name {
                "log" => a.ln(),
                "exp" => a.exp(),
                "sqrt" => a.sqrt(),
                "logistic" => 1.0 / (1.0 + (-a).exp()),
                "cexpexp" => 1.0 - (-a.exp()).exp(),
                "phi" => standard_normal_cdf(a),
                "abs" => a.abs(),
                "step" => {
                    if a >= 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                _ => unreachable!(),
            };
            Ok(EvalResult::Scalar(Scalar::Float(v)))
        }
        "mean" | "sum" => {
            let scalars = as_scalars(args)?;
            if scalars.is_empty() {
                return Err(BugsError::UnsupportedExpression(ErrorInfo::new(
                    "empty-reduction",
                    format!("`{name}` over an empty array"),
                )));
            }
            let total: f64 = scalars.iter().map(Scalar::as_f64).sum();
            let v = if name == "mean" { total / scalars.len() as f64 } else { total };
            Ok(EvalResult::Scalar(Scalar::Float(v)))
        }
        // Unreachable in practice: `eval_call` only routes here for names
        // `is_hardcoded_primitive` accepts, and every such name has an arm above.
        _ => Err(BugsError::UnsupportedExpression(ErrorInfo::new(
            "unsupported-primitive",
            format!("`{name}` has no folding implementation"),
        ))),
    }
}

/// Abramowitz & Stegun 7.1.26 approximation of the standard normal CDF, accurate to
/// about 1.5e-7 — adequate for constant folding, not for inference-grade precision
/// (the actual `phi`/`dnorm` math lives in the primitive library, out of scope here).
fn standard_normal_cdf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let y = 1.0
        - (((((1.061405429 * t - 1.453152027) * t) + 1.421413741) * t - 0.284496736) * t + 0.254829592)
            * t
            * (-x * x).exp();
    0.5 * (1.0 + sign * y)
}
