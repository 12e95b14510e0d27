use std::collections::BTreeMap;

use bugsc_build::{assemble, NodeFn, NodeKind, VertexId};
use bugsc_collect::collect;
use bugsc_core::ast::{Expr, Lhs, Stmt};
use bugsc_core::env::{Cell, Env};
use bugsc_core::registry::PrimitiveRegistry;
use bugsc_core::value::{ArrayCell, Scalar};
use bugsc_core::var::VarId;

fn data(entries: Vec<(&str, Cell)>) -> Env {
    let mut map = BTreeMap::new();
    for (k, v) in entries {
        map.insert(k.to_string(), v);
    }
    Env::from_data(map)
}

fn scalar(v: f64) -> Cell {
    Cell::Scalar(Some(Scalar::Float(v)))
}

fn scalar_int(v: i64) -> Cell {
    Cell::Scalar(Some(Scalar::Int(v)))
}

fn array(shape: Vec<usize>, values: Vec<i64>) -> Cell {
    Cell::Array(ArrayCell::from_values(shape, values.into_iter().map(|v| Some(Scalar::Int(v))).collect()))
}

/// Spec scenario S6: a simple linear regression, `Y ~ dnorm(mu, tau)` with `mu` a
/// logical function of three stochastic parameters. The parameters are exactly
/// `{alpha, beta, tau}`; `mu` is a logical node, not a parameter; `Y` is data.
fn s6_program() -> Vec<Stmt> {
    vec![
        Stmt::Stochastic {
            lhs: Lhs::Sym("Y".into()),
            dist: Expr::Call("dnorm".into(), vec![Expr::Sym("mu".into()), Expr::Sym("tau".into())]),
            truncate: None,
            censor: None,
            link: None,
        },
        Stmt::Logical {
            lhs: Lhs::Sym("mu".into()),
            rhs: Expr::Call(
                "+".into(),
                vec![
                    Expr::Sym("alpha".into()),
                    Expr::Call(
                        "*".into(),
                        vec![
                            Expr::Sym("beta".into()),
                            Expr::Call("-".into(), vec![Expr::Sym("x".into()), Expr::Sym("xbar".into())]),
                        ],
                    ),
                ],
            ),
        },
        Stmt::Stochastic {
            lhs: Lhs::Sym("alpha".into()),
            dist: Expr::Call("dnorm".into(), vec![Expr::Int(0), Expr::Float(1e-6)]),
            truncate: None,
            censor: None,
            link: None,
        },
        Stmt::Stochastic {
            lhs: Lhs::Sym("beta".into()),
            dist: Expr::Call("dnorm".into(), vec![Expr::Int(0), Expr::Float(1e-6)]),
            truncate: None,
            censor: None,
            link: None,
        },
        Stmt::Stochastic {
            lhs: Lhs::Sym("tau".into()),
            dist: Expr::Call("dgamma".into(), vec![Expr::Float(0.001), Expr::Float(0.001)]),
            truncate: None,
            censor: None,
            link: None,
        },
    ]
}

#[test]
fn s6_parameters_are_the_three_undetermined_stochastic_scalars() {
    let env = data(vec![("Y", scalar(151.0)), ("x", scalar_int(8)), ("xbar", scalar_int(22))]);
    let reg = PrimitiveRegistry::default();
    let collected = collect(&s6_program(), env, &reg).expect("collection succeeds");
    let model = assemble(collected, &reg).expect("assembly succeeds");

    let mut params: Vec<String> = model.parameters.iter().map(|v| v.to_string()).collect();
    params.sort();
    assert_eq!(params, vec!["alpha", "beta", "tau"]);

    // mu and Y must come after alpha, beta, tau in topological order.
    let pos = |name: &str| {
        model
            .topological_order
            .iter()
            .position(|v| v.to_string() == name)
            .unwrap_or_else(|| panic!("`{name}` missing from topological order"))
    };
    assert!(pos("alpha") < pos("mu"));
    assert!(pos("beta") < pos("mu"));
    assert!(pos("mu") < pos("Y"));
}

/// Property 1 (spec.md §8): the graph is acyclic and the returned order is a valid
/// linear extension — every vertex appears before all of its dependents.
#[test]
fn property_1_topological_order_respects_every_edge() {
    let env = data(vec![("Y", scalar(151.0)), ("x", scalar_int(8)), ("xbar", scalar_int(22))]);
    let reg = PrimitiveRegistry::default();
    let collected = collect(&s6_program(), env, &reg).expect("collection succeeds");
    let model = assemble(collected, &reg).expect("assembly succeeds");

    let position: BTreeMap<&VertexId, usize> =
        model.topological_order.iter().enumerate().map(|(i, v)| (v, i)).collect();
    for record in &model.nodes {
        for dep in &record.deps {
            let dep_vertex = VertexId::Var(dep.clone());
            if let (Some(&from), Some(&to)) = (position.get(&dep_vertex), position.get(&record.vertex)) {
                assert!(from < to, "dependency `{dep}` must precede `{}`", record.vertex);
            }
        }
    }
}

/// Property 2 (spec.md §8): every dependency named by a node record is itself a
/// vertex of the graph.
#[test]
fn property_2_every_dependency_is_a_graph_vertex() {
    let env = data(vec![("Y", scalar(151.0)), ("x", scalar_int(8)), ("xbar", scalar_int(22))]);
    let reg = PrimitiveRegistry::default();
    let collected = collect(&s6_program(), env, &reg).expect("collection succeeds");
    let model = assemble(collected, &reg).expect("assembly succeeds");

    for record in &model.nodes {
        for dep in &record.deps {
            assert!(
                model.graph.contains(&VertexId::Var(dep.clone())),
                "dependency `{dep}` of `{}` is not a registered vertex",
                record.vertex
            );
        }
    }
}

/// Property 7 (spec.md §8): compiling the compiler's own output environment as a new
/// data environment yields an empty parameter list — every stochastic node has
/// already been determined, so nothing remains to sample.
#[test]
fn property_7_compiling_a_fully_determined_environment_has_no_parameters() {
    // Seed every stochastic parameter as if a previous compile/init step had filled
    // them in; `collect` treats data-origin cells as already resolved.
    let env = Env::from_data({
        let mut m = BTreeMap::new();
        m.insert("Y".into(), scalar(151.0));
        m.insert("x".into(), scalar_int(8));
        m.insert("xbar".into(), scalar_int(22));
        m.insert("alpha".into(), scalar(1.5));
        m.insert("beta".into(), scalar(2.5));
        m.insert("tau".into(), scalar(0.1));
        m
    });
    let reg = PrimitiveRegistry::default();
    let collected = collect(&s6_program(), env, &reg).expect("collection succeeds");
    let model = assemble(collected, &reg).expect("assembly succeeds");

    assert!(model.parameters.is_empty());
}

/// A genuinely multivariate stochastic assignment scalarizes through an `ArrayAux`
/// producer vertex, with `SliceGet` reader vertices for each element (spec.md §9
/// "apparent cycles through array slices are broken by scalarizing to elements").
#[test]
fn multivariate_stochastic_slice_scalarizes_through_an_aux_vertex() {
    let reg = PrimitiveRegistry::default();
    let program = vec![Stmt::Stochastic {
        lhs: Lhs::Ref("theta".into(), vec![Expr::range(Expr::Int(1), Expr::Int(2))]),
        dist: Expr::Call(
            "dmnorm".into(),
            vec![Expr::Ref("mu0".into(), vec![Expr::Colon]), Expr::Sym("prec0".into())],
        ),
        truncate: None,
        censor: None,
        link: None,
    }];
    let mut data_map = BTreeMap::new();
    data_map.insert("mu0".into(), array(vec![2], vec![0, 0]));
    data_map.insert("prec0".into(), scalar_int(1));
    let env = Env::from_data(data_map);

    let collected = collect(&program, env, &reg).expect("collection succeeds");
    let model = assemble(collected, &reg).expect("assembly succeeds");

    let aux = VertexId::ArrayAux("theta".to_string());
    assert!(model.graph.contains(&aux), "expected an ArrayAux(theta) vertex");

    let aux_record = model
        .nodes
        .iter()
        .find(|r| r.vertex == aux)
        .expect("aux producer record present");
    assert!(matches!(aux_record.kind, NodeKind::Stochastic));
    assert!(matches!(aux_record.func, NodeFn::Compiled(_)));

    for i in 1..=2 {
        let element = VertexId::Var(VarId::element("theta", vec![i]));
        assert!(model.graph.contains(&element));
        let reader = model.nodes.iter().find(|r| r.vertex == element).unwrap();
        assert!(matches!(&reader.func, NodeFn::SliceGet(idx) if idx == &vec![i]));
        assert_eq!(reader.args, vec!["theta".to_string()]);
    }

    let pos = |v: &VertexId| model.topological_order.iter().position(|x| x == v).unwrap();
    assert!(pos(&aux) < pos(&VertexId::Var(VarId::element("theta", vec![1]))));
    assert!(pos(&aux) < pos(&VertexId::Var(VarId::element("theta", vec![2]))));
}

/// A round-trip through JSON preserves the compiled model (spec.md §6 output shape).
#[test]
fn model_round_trips_through_json() {
    let env = data(vec![("Y", scalar(151.0)), ("x", scalar_int(8)), ("xbar", scalar_int(22))]);
    let reg = PrimitiveRegistry::default();
    let collected = collect(&s6_program(), env, &reg).expect("collection succeeds");
    let model = assemble(collected, &reg).expect("assembly succeeds");

    let json = bugsc_build::model_to_json(&model).expect("serializes");
    let round_tripped = bugsc_build::model_from_json(json).expect("deserializes");

    assert_eq!(model.topological_order, round_tripped.topological_order);
    assert_eq!(model.parameters, round_tripped.parameters);
    assert_eq!(model.nodes.len(), round_tripped.nodes.len());
}
