use std::collections::BTreeMap;

use bugsc_core::{ArrayCell, Cell, Env, Origin, Scalar};

#[test]
fn data_seeded_cells_are_tagged_data() {
    let mut data = BTreeMap::new();
    data.insert("N".to_string(), Cell::Scalar(Some(Scalar::Int(2))));
    let env = Env::from_data(data);
    assert!(env.is_data("N"));
    assert_eq!(env.origin("N"), Some(Origin::Data));
}

#[test]
fn ensure_array_allocates_undetermined_once() {
    let mut env = Env::new();
    env.ensure_array("m", vec![2, 2]);
    env.ensure_array("m", vec![9, 9]); // no-op: already bound
    match env.get("m").unwrap() {
        Cell::Array(a) => assert_eq!(a.shape, vec![2, 2]),
        _ => panic!("expected array cell"),
    }
    assert_eq!(env.origin("m"), Some(Origin::Model));
}

#[test]
fn array_cell_flat_index_is_row_major_one_based() {
    let mut a = ArrayCell::undetermined(vec![2, 3]);
    assert!(a.set(&[1, 1], Scalar::Int(10)));
    assert!(a.set(&[2, 3], Scalar::Int(60)));
    assert_eq!(a.get(&[1, 1]).unwrap(), Some(Scalar::Int(10)));
    assert_eq!(a.get(&[2, 3]).unwrap(), Some(Scalar::Int(60)));
    assert!(!a.is_fully_resolved());
    assert!(a.get(&[3, 1]).is_none());
}

#[test]
fn exact_integral_float_coerces_non_integral_does_not() {
    assert_eq!(Scalar::Float(3.0).as_exact_i64(), Some(3));
    assert_eq!(Scalar::Float(3.5).as_exact_i64(), None);
    assert_eq!(Scalar::Int(-4).as_exact_i64(), Some(-4));
}
