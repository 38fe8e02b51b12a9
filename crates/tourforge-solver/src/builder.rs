//! DFJ model construction.
//!
//! For `n` cities the model has one boolean per directed edge, a
//! minimize-distance objective, two degree constraints per city and one
//! subtour-elimination constraint per proper subset of size `2..=n-1`:
//!
//! ```text
//! min  sum d(i,j) x(i,j)
//! s.t. sum_j x(i,j) = 1                    for every city i   (out_i)
//!      sum_j x(j,i) = 1                    for every city i   (in_i)
//!      sum_{i,j in S} x(i,j) <= |S| - 1    for every subset S (subtour_S)
//! ```

use std::sync::Arc;
use std::time::Instant;

use tourforge_config::EnumerationConfig;
use tourforge_core::{
    CityIndex, GatewayError, LinearExpr, ModelStats, Result, SolverGateway, SubsetCache,
    SubsetCollection, SubsetEnumerator, TourForgeError, TspInstance, VariableHandle,
};
use tracing::{debug, info};

use crate::session::SolverSession;
use crate::solver::duration_ms;

/// Handles of a built model.
#[derive(Debug, Clone)]
pub struct TspModel {
    city_count: usize,
    paths: Vec<Option<VariableHandle>>,
    stats: ModelStats,
}

impl TspModel {
    pub fn city_count(&self) -> usize {
        self.city_count
    }

    /// Variable of the directed edge `from -> to`; `None` on the diagonal.
    pub fn edge(&self, from: CityIndex, to: CityIndex) -> Option<VariableHandle> {
        if from >= self.city_count || to >= self.city_count {
            return None;
        }
        self.paths[from * self.city_count + to]
    }

    /// Every `(from, to, variable)` triple, row-major.
    pub fn edges(&self) -> impl Iterator<Item = (CityIndex, CityIndex, VariableHandle)> + '_ {
        let n = self.city_count;
        self.paths
            .iter()
            .enumerate()
            .filter_map(move |(i, var)| var.map(|v| (i / n, i % n, v)))
    }

    pub fn stats(&self) -> ModelStats {
        self.stats
    }
}

/// Builds DFJ models into solver sessions.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    cache: Arc<SubsetCache>,
    parallel: bool,
    max_subsets: Option<u64>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    /// Creates a builder with its own subset cache and no subset limit.
    pub fn new() -> Self {
        Self {
            cache: Arc::new(SubsetCache::new()),
            parallel: false,
            max_subsets: None,
        }
    }

    /// Creates a builder following the enumeration settings.
    pub fn from_config(config: &EnumerationConfig) -> Self {
        Self::new()
            .with_parallel(config.parallel)
            .with_max_subsets(config.max_subsets)
    }

    /// Shares subset collections with other builders.
    pub fn with_cache(mut self, cache: Arc<SubsetCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_subsets(mut self, limit: Option<u64>) -> Self {
        self.max_subsets = limit;
        self
    }

    pub fn cache(&self) -> &Arc<SubsetCache> {
        &self.cache
    }

    /// Registers the complete model for `instance` with the session.
    ///
    /// The instance is validated and the subsets are enumerated before
    /// anything reaches the gateway. If the gateway rejects a registration
    /// the session is released, discarding everything created so far, and
    /// `BuildFailure` is returned.
    pub fn build<G: SolverGateway>(
        &self,
        session: &mut SolverSession<G>,
        instance: &TspInstance,
    ) -> Result<TspModel> {
        let started = Instant::now();
        let n = instance.validate()?;
        let subsets = self.subsets(n)?;
        let session_id = session.id();
        let gateway = session.gateway_mut()?;

        match register(gateway, instance, n, &subsets) {
            Ok(model) => {
                info!(
                    session = session_id,
                    city_count = n,
                    variables = model.stats.variables,
                    equalities = model.stats.equalities,
                    inequalities = model.stats.inequalities,
                    duration_ms = duration_ms(started.elapsed()),
                    "Model built"
                );
                Ok(model)
            }
            Err(err) => {
                debug!(session = session_id, error = %err, "Model build failed, discarding session");
                session.release();
                Err(TourForgeError::BuildFailure(err))
            }
        }
    }

    fn subsets(&self, n: usize) -> Result<Arc<SubsetCollection>> {
        let enumerator = SubsetEnumerator::new(n)
            .with_parallel(self.parallel)
            .with_max_subsets(self.max_subsets);
        self.cache.get_or_enumerate(&enumerator)
    }
}

fn register<G: SolverGateway>(
    gateway: &mut G,
    instance: &TspInstance,
    n: usize,
    subsets: &SubsetCollection,
) -> std::result::Result<TspModel, GatewayError> {
    let mut stats = ModelStats::default();
    let mut paths = vec![None; n * n];

    for from in 0..n {
        for to in (0..n).filter(|&to| to != from) {
            let var = gateway.create_boolean_variable(&format!("path_{}_{}", from, to))?;
            paths[from * n + to] = Some(var);
            stats.variables += 1;
        }
    }
    let edge = |from: CityIndex, to: CityIndex| paths[from * n + to];
    debug!(variables = stats.variables, "Edge variables created");

    let mut objective = LinearExpr::new();
    for from in 0..n {
        for to in 0..n {
            if let Some(var) = edge(from, to) {
                objective.add_term(var, instance.distances.distance(from, to));
            }
        }
    }
    stats.objective_terms = objective.len();
    gateway.set_objective_minimize(&objective)?;

    for city in 0..n {
        let outgoing: LinearExpr = (0..n)
            .filter_map(|to| edge(city, to))
            .map(|var| (var, 1.0))
            .collect();
        let incoming: LinearExpr = (0..n)
            .filter_map(|from| edge(from, city))
            .map(|var| (var, 1.0))
            .collect();
        gateway.add_linear_equality(&outgoing, 1.0, &format!("out_{}", city))?;
        gateway.add_linear_equality(&incoming, 1.0, &format!("in_{}", city))?;
        stats.equalities += 2;
    }
    debug!(equalities = stats.equalities, "Degree constraints added");

    for subset in subsets.iter() {
        let inside: LinearExpr = subset
            .iter()
            .flat_map(|&from| subset.iter().map(move |&to| (from, to)))
            .filter_map(|(from, to)| edge(from, to))
            .map(|var| (var, 1.0))
            .collect();
        gateway.add_linear_inequality(&inside, (subset.len() - 1) as f64, &subset_label(subset))?;
        stats.inequalities += 1;
    }
    debug!(inequalities = stats.inequalities, "Subtour constraints added");

    Ok(TspModel {
        city_count: n,
        paths,
        stats,
    })
}

fn subset_label(subset: &[CityIndex]) -> String {
    let mut label = String::from("subtour");
    for city in subset {
        label.push('_');
        label.push_str(&city.to_string());
    }
    label
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
