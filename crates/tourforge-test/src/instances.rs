//! Instance fixtures.
//!
//! # Example
//!
//! ```
//! use tourforge_test::instances::{brute_force_optimum, ring_instance};
//!
//! let instance = ring_instance(4, 0);
//! let (best, _) = brute_force_optimum(&instance.distances, instance.start);
//! assert_eq!(best, 4.0);
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tourforge_core::{CityIndex, DistanceMatrix, TspInstance};

/// Distance of ring edges in [`ring_instance`].
pub const RING_NEAR: f64 = 1.0;

/// Distance of every other edge in [`ring_instance`].
pub const RING_FAR: f64 = 10.0;

/// Cities on a ring: neighbours `i` and `i + 1 (mod n)` are 1 apart in both
/// directions, every other pair is 10 apart. The optimum is the ring, length `n`.
pub fn ring_instance(n: usize, start: CityIndex) -> TspInstance {
    let distances = DistanceMatrix::from_fn(n, |a, b| {
        if (a + 1) % n == b || (b + 1) % n == a {
            RING_NEAR
        } else {
            RING_FAR
        }
    });
    TspInstance::new(distances, start)
}

/// Like [`ring_instance`] but only the forward edges `i -> i + 1 (mod n)` are
/// short, so the optimum must be travelled in ascending order.
pub fn directed_ring_instance(n: usize, start: CityIndex) -> TspInstance {
    let distances = DistanceMatrix::from_fn(n, |a, b| {
        if (a + 1) % n == b {
            RING_NEAR
        } else {
            RING_FAR
        }
    });
    TspInstance::new(distances, start)
}

/// Random symmetric instance with integer distances in
/// `[min_distance, max_distance]` and a random start city.
///
/// Seeded, so the same arguments always give the same instance.
pub fn random_symmetric_instance(
    n: usize,
    min_distance: u32,
    max_distance: u32,
    seed: u64,
) -> TspInstance {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = vec![vec![0.0; n]; n];
    for a in 0..n {
        for b in a + 1..n {
            let d = f64::from(rng.random_range(min_distance..=max_distance));
            rows[a][b] = d;
            rows[b][a] = d;
        }
    }
    let start = if n == 0 { 0 } else { rng.random_range(0..n) };
    TspInstance::new(DistanceMatrix::from_rows(rows), start)
}

/// Exhaustive optimum over every tour from `start`. Returns the length and
/// the closed city sequence. Only meant for small `n`.
pub fn brute_force_optimum(distances: &DistanceMatrix, start: CityIndex) -> (f64, Vec<CityIndex>) {
    let n = distances.len();
    let mut best = (f64::INFINITY, Vec::new());
    let mut path = vec![start];
    let mut visited = vec![false; n];
    visited[start] = true;
    search(distances, start, &mut path, &mut visited, 0.0, &mut best);
    best
}

fn search(
    distances: &DistanceMatrix,
    start: CityIndex,
    path: &mut Vec<CityIndex>,
    visited: &mut [bool],
    length: f64,
    best: &mut (f64, Vec<CityIndex>),
) {
    let n = visited.len();
    let Some(&current) = path.last() else {
        return;
    };
    if path.len() == n {
        let total = length + distances.distance(current, start);
        if total < best.0 {
            let mut tour = path.clone();
            tour.push(start);
            *best = (total, tour);
        }
        return;
    }
    for next in 0..n {
        if visited[next] {
            continue;
        }
        visited[next] = true;
        path.push(next);
        search(
            distances,
            start,
            path,
            visited,
            length + distances.distance(current, next),
            best,
        );
        path.pop();
        visited[next] = false;
    }
}
