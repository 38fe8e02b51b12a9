//! End-to-end solves with the bundled branch-and-bound backend.

use std::sync::Arc;
use std::thread;

use tourforge::prelude::*;
use tourforge::{ErrorKind, SubsetCache};
use tourforge_test::{
    brute_force_optimum, directed_ring_instance, random_symmetric_instance, ring_instance,
};

fn config() -> SolverConfig {
    SolverConfig::new().with_termination_seconds(60)
}

#[test]
fn test_four_city_ring() {
    let solution = solve_with_config(&ring_instance(4, 0), config()).unwrap();

    let expected = Tour::new(vec![0, 1, 2, 3, 0], 4).unwrap();
    assert_eq!(solution.total_distance, 4.0);
    assert_eq!(solution.status, SolutionStatus::Optimal);
    assert!(solution.tour.is_same_cycle(&expected), "got {}", solution.tour);
    assert_eq!(solution.stats.variables, 12);
    assert_eq!(solution.stats.equalities, 8);
    assert_eq!(solution.stats.inequalities, 10);
}

#[test]
fn test_tour_starts_at_requested_city() {
    let solution = solve_with_config(&ring_instance(5, 3), config()).unwrap();
    assert_eq!(solution.total_distance, 5.0);
    assert_eq!(solution.tour.start(), 3);
    assert_eq!(solution.tour.cities().len(), 6);
    assert_eq!(solution.tour.cities().last(), Some(&3));
}

#[test]
fn test_direction_matters() {
    let instance = directed_ring_instance(5, 2);
    let solution = solve_with_config(&instance, config()).unwrap();
    assert_eq!(solution.total_distance, 5.0);
    assert_eq!(solution.tour.cities(), &[2, 3, 4, 0, 1, 2]);
}

#[test]
fn test_random_instances_match_brute_force() {
    for seed in 1..=3 {
        let instance = random_symmetric_instance(6, 1, 30, seed);
        let (best, _) = brute_force_optimum(&instance.distances, instance.start);
        let solution = solve_with_config(&instance, config()).unwrap();

        assert!(
            (solution.total_distance - best).abs() < 1e-6,
            "seed {}: solver {} vs brute force {}",
            seed,
            solution.total_distance,
            best
        );
        assert_eq!(solution.tour.start(), instance.start);
        assert!((solution.tour.length(&instance.distances) - best).abs() < 1e-6);
    }
}

#[test]
fn test_legs_add_up_to_total() {
    let instance = random_symmetric_instance(5, 1, 20, 11);
    let solution = solve_with_config(&instance, config()).unwrap();
    let legs: Vec<_> = solution.tour.legs(&instance.distances).collect();

    assert_eq!(legs.len(), 5);
    let sum: f64 = legs.iter().map(|&(_, _, d)| d).sum();
    assert!((sum - solution.total_distance).abs() < 1e-6);
    assert!(solution.tour.to_string().starts_with(&format!("City_{}", instance.start)));
}

#[test]
fn test_two_cities() {
    let distances = DistanceMatrix::from_rows(vec![vec![0.0, 3.0], vec![4.0, 0.0]]);
    let solution = solve_with_config(&TspInstance::new(distances, 1), config()).unwrap();
    assert_eq!(solution.tour.cities(), &[1, 0, 1]);
    assert_eq!(solution.total_distance, 7.0);
}

#[test]
fn test_non_square_matrix() {
    let distances = DistanceMatrix::from_rows(vec![vec![0.0, 1.0, 2.0, 3.0]; 3]);
    let err = solve_with_config(&TspInstance::new(distances, 0), config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInstance);
}

#[test]
fn test_subset_guard_from_config() {
    let config = config().with_max_subsets(Some(10));
    let err = solve_with_config(&ring_instance(6, 0), config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInstance);
}

#[test]
fn test_config_from_toml() {
    let config = SolverConfig::from_toml_str(
        r#"
        integrality_tolerance = 0.000001

        [termination]
        minutes_spent_limit = 1

        [enumeration]
        parallel = true
    "#,
    )
    .unwrap();
    let solution = solve_with_config(&ring_instance(5, 0), config).unwrap();
    assert_eq!(solution.total_distance, 5.0);
}

#[test]
fn test_huge_time_limit_solves_without_deadline() {
    let config =
        SolverConfig::from_toml_str("[termination]\nseconds_spent_limit = 9223372036854775807")
            .unwrap();
    let solution = solve_with_config(&ring_instance(4, 0), config).unwrap();
    assert_eq!(solution.total_distance, 4.0);
    assert_eq!(solution.status, SolutionStatus::Optimal);
}

#[test]
fn test_concurrent_sessions() {
    let cache = Arc::new(SubsetCache::new());
    let handles: Vec<_> = (0..4)
        .map(|start| {
            let solver = TspSolver::new(config()).with_cache(Arc::clone(&cache));
            thread::spawn(move || {
                solver.solve(tourforge::MicroLpGateway::new(), &ring_instance(5, start))
            })
        })
        .collect();

    for (start, handle) in handles.into_iter().enumerate() {
        let solution = handle.join().unwrap().unwrap();
        assert_eq!(solution.total_distance, 5.0);
        assert_eq!(solution.tour.start(), start);
    }
    assert_eq!(cache.len(), 1);
}
