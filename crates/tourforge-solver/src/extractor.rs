//! Tour extraction from solved edge values.

use tourforge_core::{CityIndex, Result, SolverGateway, Tour, TourForgeError};
use tracing::{debug, warn};

use crate::builder::TspModel;
use crate::session::SolverSession;

/// Values above this count as a selected edge.
pub const SELECTION_THRESHOLD: f64 = 0.5;

/// Solved values of every directed edge, row-major. Diagonal entries are 0.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeValues {
    city_count: usize,
    values: Vec<f64>,
}

impl EdgeValues {
    /// All-zero values for `city_count` cities.
    pub fn new(city_count: usize) -> Self {
        Self {
            city_count,
            values: vec![0.0; city_count * city_count],
        }
    }

    pub fn from_fn(city_count: usize, mut value: impl FnMut(CityIndex, CityIndex) -> f64) -> Self {
        let mut values = Self::new(city_count);
        for from in 0..city_count {
            for to in (0..city_count).filter(|&to| to != from) {
                values.set(from, to, value(from, to));
            }
        }
        values
    }

    /// Builds values with 1 on each listed edge.
    pub fn from_edges(city_count: usize, edges: &[(CityIndex, CityIndex)]) -> Self {
        let mut values = Self::new(city_count);
        for &(from, to) in edges {
            values.set(from, to, 1.0);
        }
        values
    }

    pub fn city_count(&self) -> usize {
        self.city_count
    }

    pub fn set(&mut self, from: CityIndex, to: CityIndex, value: f64) {
        self.values[from * self.city_count + to] = value;
    }

    pub fn get(&self, from: CityIndex, to: CityIndex) -> f64 {
        self.values[from * self.city_count + to]
    }

    /// Cities `to` whose edge `from -> to` is selected.
    pub fn selected_successors(&self, from: CityIndex) -> impl Iterator<Item = CityIndex> + '_ {
        (0..self.city_count)
            .filter(move |&to| to != from && self.get(from, to) > SELECTION_THRESHOLD)
    }
}

/// Walks the selected edges from `start` until the cycle closes.
///
/// Fails with `DegenerateSolution` if a city has zero or several selected
/// successors, a city is revisited, the cycle closes before every city was
/// visited, or `n` steps pass without returning to `start`.
pub fn extract_tour(values: &EdgeValues, start: CityIndex) -> Result<Tour> {
    let n = values.city_count();
    if start >= n {
        return Err(TourForgeError::InvalidInstance(format!(
            "start city {} out of range for {} cities",
            start, n
        )));
    }

    let mut visited = vec![false; n];
    visited[start] = true;
    let mut cities = Vec::with_capacity(n + 1);
    cities.push(start);
    let mut current = start;

    for _ in 0..n {
        let mut successors = values.selected_successors(current);
        let next = match (successors.next(), successors.next()) {
            (Some(next), None) => next,
            (None, _) => {
                return Err(TourForgeError::DegenerateSolution(format!(
                    "no selected edge leaves city {}",
                    current
                )))
            }
            (Some(_), Some(_)) => {
                let all: Vec<CityIndex> = values.selected_successors(current).collect();
                return Err(TourForgeError::DegenerateSolution(format!(
                    "city {} has {} selected successors {:?}",
                    current,
                    all.len(),
                    all
                )));
            }
        };

        if next == start {
            if cities.len() < n {
                return Err(TourForgeError::DegenerateSolution(format!(
                    "cycle {:?} closes after {} of {} cities",
                    cities,
                    cities.len(),
                    n
                )));
            }
            cities.push(start);
            return Tour::new(cities, n);
        }
        if visited[next] {
            return Err(TourForgeError::DegenerateSolution(format!(
                "city {} revisited after {:?}",
                next, cities
            )));
        }
        visited[next] = true;
        cities.push(next);
        current = next;
    }

    Err(TourForgeError::DegenerateSolution(format!(
        "walk {:?} did not return to city {} within {} steps",
        cities, start, n
    )))
}

/// Reads a solved model back out of its session.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolutionExtractor;

impl SolutionExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Snapshot of every edge value in the session's current solution.
    pub fn read_values<G: SolverGateway>(
        &self,
        session: &SolverSession<G>,
        model: &TspModel,
    ) -> Result<EdgeValues> {
        let mut values = EdgeValues::new(model.city_count());
        for (from, to, var) in model.edges() {
            let value = session.value(var)?;
            if !value.is_finite() {
                return Err(TourForgeError::DegenerateSolution(format!(
                    "edge {} -> {} has value {}",
                    from, to, value
                )));
            }
            if value > 1e-6 && value < 1.0 - 1e-6 {
                warn!(from, to, value, "Fractional edge value in solution");
            }
            values.set(from, to, value);
        }
        Ok(values)
    }

    /// Extracts the tour and the objective value reported by the solver.
    pub fn extract<G: SolverGateway>(
        &self,
        session: &SolverSession<G>,
        model: &TspModel,
        start: CityIndex,
    ) -> Result<(Tour, f64)> {
        let values = self.read_values(session, model)?;
        let tour = extract_tour(&values, start)?;
        let objective = session.objective_value()?;
        debug!(session = session.id(), objective, tour = %tour, "Tour extracted");
        Ok((tour, objective))
    }
}
