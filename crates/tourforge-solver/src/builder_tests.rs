//! Tests for DFJ model construction.

use super::*;
use tourforge_core::{DistanceMatrix, ErrorKind};
use tourforge_test::{ring_instance, ConstraintSense, RecordingGateway, RecordingLog};

fn build_recorded(instance: &TspInstance) -> (Result<TspModel>, RecordingLog) {
    let (gateway, log) = RecordingGateway::new();
    let mut session = SolverSession::open(gateway);
    let result = ModelBuilder::new().build(&mut session, instance);
    (result, log)
}

#[test]
fn test_model_sizes() {
    for n in 2..=7 {
        let (model, log) = build_recorded(&ring_instance(n, 0));
        let model = model.unwrap();
        let subsets = (1usize << n) - n - 2;

        assert_eq!(log.variable_count(), n * (n - 1), "n = {}", n);
        assert_eq!(log.equality_count(), 2 * n, "n = {}", n);
        assert_eq!(log.inequality_count(), subsets, "n = {}", n);
        assert_eq!(
            model.stats(),
            ModelStats {
                variables: n * (n - 1),
                equalities: 2 * n,
                inequalities: subsets,
                objective_terms: n * (n - 1),
            }
        );
    }
}

#[test]
fn test_registration_order_and_labels() {
    let (model, log) = build_recorded(&ring_instance(3, 0));
    model.unwrap();

    assert_eq!(
        log.variable_labels(),
        vec!["path_0_1", "path_0_2", "path_1_0", "path_1_2", "path_2_0", "path_2_1"]
    );
    let labels: Vec<String> = log.constraints().into_iter().map(|c| c.label).collect();
    assert_eq!(
        labels,
        vec![
            "out_0",
            "in_0",
            "out_1",
            "in_1",
            "out_2",
            "in_2",
            "subtour_0_1",
            "subtour_0_2",
            "subtour_1_2",
        ]
    );
}

#[test]
fn test_objective_uses_directed_distances() {
    let distances = DistanceMatrix::from_rows(vec![
        vec![0.0, 1.0, 7.0],
        vec![2.0, 0.0, 3.0],
        vec![5.0, 4.0, 0.0],
    ]);
    let (model, log) = build_recorded(&TspInstance::new(distances.clone(), 0));
    let model = model.unwrap();
    let objective = log.objective().unwrap();

    assert_eq!(objective.len(), 6);
    for (from, to, var) in model.edges() {
        assert_eq!(
            objective.coefficient(var),
            Some(distances.distance(from, to)),
            "edge {} -> {}",
            from,
            to
        );
    }
}

#[test]
fn test_degree_constraints() {
    let n = 5;
    let (model, log) = build_recorded(&ring_instance(n, 0));
    let model = model.unwrap();

    for city in 0..n {
        let out = log.constraint(&format!("out_{}", city)).unwrap();
        let inc = log.constraint(&format!("in_{}", city)).unwrap();
        assert_eq!(out.sense, ConstraintSense::Equal);
        assert_eq!(out.rhs, 1.0);
        assert_eq!(inc.rhs, 1.0);
        assert_eq!(out.expr.len(), n - 1);
        assert_eq!(inc.expr.len(), n - 1);
        for other in (0..n).filter(|&o| o != city) {
            assert_eq!(out.expr.coefficient(model.edge(city, other).unwrap()), Some(1.0));
            assert_eq!(inc.expr.coefficient(model.edge(other, city).unwrap()), Some(1.0));
        }
    }
}

#[test]
fn test_subtour_constraints_cover_internal_edges() {
    let (model, log) = build_recorded(&ring_instance(5, 0));
    let model = model.unwrap();

    let constraint = log.constraint("subtour_1_3_4").unwrap();
    assert_eq!(constraint.sense, ConstraintSense::LessOrEqual);
    assert_eq!(constraint.rhs, 2.0);
    assert_eq!(constraint.expr.len(), 6);
    for &from in &[1, 3, 4] {
        for &to in &[1, 3, 4] {
            if from != to {
                assert_eq!(constraint.expr.coefficient(model.edge(from, to).unwrap()), Some(1.0));
            }
        }
    }
    assert_eq!(constraint.expr.coefficient(model.edge(0, 1).unwrap()), None);

    assert!(log.constraint("subtour_0_1_2_3_4").is_none());
    assert!(log.constraint("subtour_0_1_2_3").is_some());
}

#[test]
fn test_diagonal_has_no_variable() {
    let (model, _log) = build_recorded(&ring_instance(4, 0));
    let model = model.unwrap();
    for city in 0..4 {
        assert!(model.edge(city, city).is_none());
    }
    assert!(model.edge(0, 4).is_none());
    assert_eq!(model.edges().count(), 12);
}

#[test]
fn test_feasible_set_is_exactly_the_hamiltonian_cycles() {
    let n = 4;
    let (model, log) = build_recorded(&ring_instance(n, 0));
    let model = model.unwrap();
    let vars = log.variable_count();

    let mut feasible = Vec::new();
    for mask in 0u32..(1 << vars) {
        let values: Vec<f64> = (0..vars).map(|i| f64::from((mask >> i) & 1)).collect();
        if log.is_feasible(&values) {
            feasible.push(values);
        }
    }
    assert_eq!(feasible.len(), 6);

    for values in &feasible {
        let mut city = 0;
        let mut visited = vec![false; n];
        for _ in 0..n {
            assert!(!visited[city]);
            visited[city] = true;
            city = (0..n)
                .find(|&to| model.edge(city, to).is_some_and(|v| values[v.index()] == 1.0))
                .unwrap();
        }
        assert_eq!(city, 0);
        assert!(visited.iter().all(|&v| v));
    }
}

#[test]
fn test_two_city_model() {
    let (model, log) = build_recorded(&ring_instance(2, 1));
    model.unwrap();
    assert_eq!(log.variable_count(), 2);
    assert_eq!(log.equality_count(), 4);
    assert_eq!(log.inequality_count(), 0);
}

#[test]
fn test_non_square_matrix_touches_no_gateway() {
    let distances = DistanceMatrix::from_rows(vec![vec![0.0, 1.0, 2.0, 3.0]; 3]);
    let (result, log) = build_recorded(&TspInstance::new(distances, 0));

    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInstance);
    assert_eq!(log.variable_count(), 0);
    assert!(log.constraints().is_empty());
    assert!(log.objective().is_none());
}

#[test]
fn test_invalid_instances() {
    let negative = DistanceMatrix::from_rows(vec![vec![0.0, -1.0], vec![1.0, 0.0]]);
    let single = DistanceMatrix::from_rows(vec![vec![0.0]]);
    let cases = [
        TspInstance::new(negative, 0),
        TspInstance::new(single, 0),
        ring_instance(4, 4),
    ];
    for instance in &cases {
        let (result, log) = build_recorded(instance);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInstance);
        assert_eq!(log.variable_count(), 0);
    }
}

#[test]
fn test_gateway_failure_releases_session() {
    let (gateway, log) = RecordingGateway::new();
    let mut session = SolverSession::open(gateway.fail_on_label("subtour_0_2"));

    let err = ModelBuilder::new()
        .build(&mut session, &ring_instance(4, 0))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BuildFailure);
    assert!(session.is_released());
    drop(session);
    assert_eq!(log.release_calls(), 1);
}

#[test]
fn test_build_on_released_session() {
    let (gateway, log) = RecordingGateway::new();
    let mut session = SolverSession::open(gateway);
    session.release();

    let err = ModelBuilder::new()
        .build(&mut session, &ring_instance(3, 0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionReleased);
    assert_eq!(log.variable_count(), 0);
}

#[test]
fn test_subset_limit_rejected_before_registration() {
    let (gateway, log) = RecordingGateway::new();
    let mut session = SolverSession::open(gateway);

    let err = ModelBuilder::new()
        .with_max_subsets(Some(100))
        .build(&mut session, &ring_instance(8, 0))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInstance);
    assert_eq!(log.variable_count(), 0);
}

#[test]
fn test_builders_share_cache() {
    let cache = Arc::new(SubsetCache::new());
    let a = ModelBuilder::new().with_cache(Arc::clone(&cache));
    let b = ModelBuilder::from_config(&EnumerationConfig::default()).with_cache(Arc::clone(&cache));

    let mut first = SolverSession::open(RecordingGateway::new().0);
    let mut second = SolverSession::open(RecordingGateway::new().0);
    a.build(&mut first, &ring_instance(5, 0)).unwrap();
    b.build(&mut second, &ring_instance(5, 2)).unwrap();

    assert_eq!(cache.len(), 1);
}
