//! Tours and solve results.

use std::fmt;
use std::time::Duration;

use crate::error::{Result, TourForgeError};
use crate::instance::{CityIndex, DistanceMatrix};

/// A closed tour: `n + 1` cities, first and last equal to the start city,
/// every other city exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tour {
    cities: Vec<CityIndex>,
}

impl Tour {
    /// Wraps a closed city sequence, checking that it is a Hamiltonian cycle
    /// over `city_count` cities.
    pub fn new(cities: Vec<CityIndex>, city_count: usize) -> Result<Self> {
        if cities.len() != city_count + 1 {
            return Err(TourForgeError::DegenerateSolution(format!(
                "tour over {} cities must have {} entries, got {}",
                city_count,
                city_count + 1,
                cities.len()
            )));
        }
        if cities.first() != cities.last() {
            return Err(TourForgeError::DegenerateSolution(format!(
                "tour {:?} does not return to its start",
                cities
            )));
        }
        let mut seen = vec![false; city_count];
        for &city in &cities[..city_count] {
            match seen.get_mut(city) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(TourForgeError::DegenerateSolution(format!(
                        "city {} is visited twice in {:?}",
                        city, cities
                    )))
                }
                None => {
                    return Err(TourForgeError::DegenerateSolution(format!(
                        "city {} is out of range in {:?}",
                        city, cities
                    )))
                }
            }
        }
        Ok(Self { cities })
    }

    /// The start (and end) city.
    pub fn start(&self) -> CityIndex {
        self.cities[0]
    }

    /// Number of distinct cities visited.
    pub fn city_count(&self) -> usize {
        self.cities.len() - 1
    }

    pub fn cities(&self) -> &[CityIndex] {
        &self.cities
    }

    /// Directed legs `(from, to, distance)` in travel order.
    pub fn legs<'a>(
        &'a self,
        distances: &'a DistanceMatrix,
    ) -> impl Iterator<Item = (CityIndex, CityIndex, f64)> + 'a {
        self.cities
            .windows(2)
            .map(move |w| (w[0], w[1], distances.distance(w[0], w[1])))
    }

    /// Total distance of the tour under `distances`.
    pub fn length(&self, distances: &DistanceMatrix) -> f64 {
        self.legs(distances).map(|(_, _, d)| d).sum()
    }

    /// Returns true if `other` visits the same cycle, possibly rotated or reversed.
    pub fn is_same_cycle(&self, other: &Tour) -> bool {
        let n = self.city_count();
        if n != other.city_count() {
            return false;
        }
        let ours = &self.cities[..n];
        let theirs = &other.cities[..n];
        let Some(offset) = theirs.iter().position(|&c| c == ours[0]) else {
            return false;
        };
        let forward = (0..n).all(|i| ours[i] == theirs[(offset + i) % n]);
        let backward = (0..n).all(|i| ours[i] == theirs[(offset + n - i) % n]);
        forward || backward
    }
}

impl fmt::Display for Tour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, city) in self.cities.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "City_{}", city)?;
        }
        Ok(())
    }
}

/// Quality of a returned tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolutionStatus {
    /// Proven optimal.
    Optimal,
    /// Feasible, optimality not proven.
    Feasible,
    /// Best incumbent when the solve limits ran out; suboptimal.
    TimeLimited,
}

impl SolutionStatus {
    /// Returns true unless optimality was proven.
    pub fn is_suboptimal(&self) -> bool {
        !matches!(self, SolutionStatus::Optimal)
    }
}

/// Size of a built model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelStats {
    pub variables: usize,
    pub equalities: usize,
    pub inequalities: usize,
    pub objective_terms: usize,
}

/// A solved instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TourSolution {
    pub tour: Tour,
    /// Objective value as reported by the solver.
    pub total_distance: f64,
    pub status: SolutionStatus,
    pub stats: ModelStats,
    /// Wall-clock time from build start to extraction end.
    pub elapsed: Duration,
}
