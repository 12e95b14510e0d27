use std::collections::BTreeMap;

use bugsc_core::ast::{Expr, Lhs, Stmt};
use bugsc_core::env::{Cell, Env};
use bugsc_core::errors::BugsError;
use bugsc_core::registry::PrimitiveRegistry;
use bugsc_core::value::{ArrayCell, Scalar};
use bugsc_core::var::VarId;
use bugsc_collect::{collect, VarKind};

fn data(entries: Vec<(&str, Cell)>) -> Env {
    let mut map = BTreeMap::new();
    for (k, v) in entries {
        map.insert(k.to_string(), v);
    }
    Env::from_data(map)
}

fn scalar(v: i64) -> Cell {
    Cell::Scalar(Some(Scalar::Int(v)))
}

fn array(shape: Vec<usize>, values: Vec<i64>) -> Cell {
    Cell::Array(ArrayCell::from_values(shape, values.into_iter().map(|v| Some(Scalar::Int(v))).collect()))
}

/// `n[i] <- g[i]; for (j in 1:n[i]) { m[i,j] <- i + j }` unrolled over `i in 1:N`,
/// N=2, g=[1,2] — the data-dependent inner bound only resolves after the outer
/// loop's logical assignment has propagated.
fn s1_program() -> Vec<Stmt> {
    vec![Stmt::For {
        var: "i".into(),
        lo: Expr::Int(1),
        hi: Expr::Sym("N".into()),
        body: vec![
            Stmt::Logical {
                lhs: Lhs::Ref("n".into(), vec![Expr::Sym("i".into())]),
                rhs: Expr::Ref("g".into(), vec![Expr::Sym("i".into())]),
            },
            Stmt::For {
                var: "j".into(),
                lo: Expr::Int(1),
                hi: Expr::Ref("n".into(), vec![Expr::Sym("i".into())]),
                body: vec![Stmt::Logical {
                    lhs: Lhs::Ref("m".into(), vec![Expr::Sym("i".into()), Expr::Sym("j".into())]),
                    rhs: Expr::Call("+".into(), vec![Expr::Sym("i".into()), Expr::Sym("j".into())]),
                }],
            },
        ],
    }]
}

#[test]
fn s1_data_dependent_bound_unrolls_and_resolves() {
    let env = data(vec![("N", scalar(2)), ("g", array(vec![2], vec![1, 2]))]);
    let reg = PrimitiveRegistry::default();
    let model = collect(&s1_program(), env, &reg).expect("collection succeeds");

    let mut vars: Vec<VarId> = model.assignments.iter().flat_map(|a| a.lhs_vars.clone()).collect();
    vars.sort();
    assert_eq!(
        vars,
        vec![
            VarId::element("m", vec![1, 1]),
            VarId::element("m", vec![2, 1]),
            VarId::element("m", vec![2, 2]),
            VarId::element("n", vec![1]),
            VarId::element("n", vec![2]),
        ]
    );
    assert!(model.assignments.iter().all(|a| a.kind == VarKind::Logical));

    let m = match model.env.get("m").unwrap() {
        Cell::Array(a) => a,
        _ => panic!("m is an array"),
    };
    assert_eq!(m.get(&[1, 1]).unwrap(), Some(Scalar::Int(2)));
    assert_eq!(m.get(&[2, 1]).unwrap(), Some(Scalar::Int(3)));
    assert_eq!(m.get(&[2, 2]).unwrap(), Some(Scalar::Int(4)));
    assert_eq!(model.report.loops_unrolled, 3);
}

#[test]
fn s4_logical_write_to_observed_cell_is_fatal() {
    let env = data(vec![("y", array(vec![1], vec![5])), ("x", scalar(10))]);
    let reg = PrimitiveRegistry::default();
    let program = vec![Stmt::Logical {
        lhs: Lhs::Ref("y".into(), vec![Expr::Int(1)]),
        rhs: Expr::Sym("x".into()),
    }];
    let err = collect(&program, env, &reg).unwrap_err();
    assert!(matches!(err, BugsError::OverwriteData(_)));
}

fn s5_program() -> Vec<Stmt> {
    vec![
        Stmt::Logical {
            lhs: Lhs::Sym("b".into()),
            rhs: Expr::Call("+".into(), vec![Expr::Sym("a".into()), Expr::Int(1)]),
        },
        Stmt::Logical {
            lhs: Lhs::Sym("c".into()),
            rhs: Expr::Call("+".into(), vec![Expr::Sym("b".into()), Expr::Int(1)]),
        },
    ]
}

#[test]
fn s5_fixpoint_is_order_independent() {
    let reg = PrimitiveRegistry::default();

    let forward = s5_program();
    let mut backward = s5_program();
    backward.reverse();

    let env_forward = data(vec![("a", scalar(1))]);
    let env_backward = data(vec![("a", scalar(1))]);

    let forward_model = collect(&forward, env_forward, &reg).expect("forward order succeeds");
    let backward_model = collect(&backward, env_backward, &reg).expect("backward order succeeds");

    for model in [&forward_model, &backward_model] {
        assert_eq!(model.env.get("b").unwrap(), &scalar(2));
        assert_eq!(model.env.get("c").unwrap(), &scalar(3));
    }
}

#[test]
fn property_3_shape_is_max_over_all_writes() {
    // x[1] <- 1; x[3] <- 2 — x must grow to shape [3], with x[2] left undetermined.
    let env = Env::new();
    let reg = PrimitiveRegistry::default();
    let program = vec![
        Stmt::Logical {
            lhs: Lhs::Ref("x".into(), vec![Expr::Int(1)]),
            rhs: Expr::Int(1),
        },
        Stmt::Logical {
            lhs: Lhs::Ref("x".into(), vec![Expr::Int(3)]),
            rhs: Expr::Int(2),
        },
    ];
    let model = collect(&program, env, &reg).expect("collection succeeds");
    let x = match model.env.get("x").unwrap() {
        Cell::Array(a) => a,
        _ => panic!("x is an array"),
    };
    assert_eq!(x.shape, vec![3]);
    assert_eq!(x.get(&[1]).unwrap(), Some(Scalar::Int(1)));
    assert_eq!(x.get(&[2]).unwrap(), None);
    assert_eq!(x.get(&[3]).unwrap(), Some(Scalar::Int(2)));
}

#[test]
fn property_8_zero_iteration_loop_contributes_nothing() {
    // for (i in 1:0) { z[i] <- i } never runs; z is never allocated.
    let env = Env::new();
    let reg = PrimitiveRegistry::default();
    let program = vec![Stmt::For {
        var: "i".into(),
        lo: Expr::Int(1),
        hi: Expr::Int(0),
        body: vec![Stmt::Logical {
            lhs: Lhs::Ref("z".into(), vec![Expr::Sym("i".into())]),
            rhs: Expr::Sym("i".into()),
        }],
    }];
    let model = collect(&program, env, &reg).expect("collection succeeds");
    assert!(model.assignments.is_empty());
    assert!(!model.env.contains("z"));
}

#[test]
fn repeated_logical_assignment_to_same_cell_is_fatal() {
    let env = Env::new();
    let reg = PrimitiveRegistry::default();
    let program = vec![
        Stmt::Logical {
            lhs: Lhs::Sym("a".into()),
            rhs: Expr::Int(1),
        },
        Stmt::Logical {
            lhs: Lhs::Sym("a".into()),
            rhs: Expr::Int(2),
        },
    ];
    let err = collect(&program, env, &reg).unwrap_err();
    assert!(matches!(err, BugsError::RepeatedAssignment(_)));
}

#[test]
fn unresolved_logical_stochastic_overlap_is_fatal() {
    // a <- b (b never resolves) and a ~ dnorm(0,1): the overlap never becomes
    // data-resolved, so it's a conflict rather than a legal promotion.
    let env = Env::new();
    let reg = PrimitiveRegistry::default();
    let program = vec![
        Stmt::Logical {
            lhs: Lhs::Sym("a".into()),
            rhs: Expr::Sym("b".into()),
        },
        Stmt::Stochastic {
            lhs: Lhs::Sym("a".into()),
            dist: Expr::Call("dnorm".into(), vec![Expr::Int(0), Expr::Int(1)]),
            truncate: None,
            censor: None,
            link: None,
        },
    ];
    let err = collect(&program, env, &reg).unwrap_err();
    assert!(matches!(err, BugsError::LogicalStochasticConflict(_)));
}

#[test]
fn resolved_logical_stochastic_overlap_is_promoted_and_removed() {
    // a <- 5 (fully data-resolved) and a ~ dnorm(0,1): the overlap resolves, so it
    // is promoted to transformed data and dropped from the model's variables.
    let env = Env::new();
    let reg = PrimitiveRegistry::default();
    let program = vec![
        Stmt::Logical {
            lhs: Lhs::Sym("a".into()),
            rhs: Expr::Int(5),
        },
        Stmt::Stochastic {
            lhs: Lhs::Sym("a".into()),
            dist: Expr::Call("dnorm".into(), vec![Expr::Int(0), Expr::Int(1)]),
            truncate: None,
            censor: None,
            link: None,
        },
    ];
    let model = collect(&program, env, &reg).expect("overlap resolves");
    assert!(model.assignments.is_empty());
    assert_eq!(model.report.transformed_variables, 1);
    assert_eq!(model.env.get("a").unwrap(), &scalar(5));
}
