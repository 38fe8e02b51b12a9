//! TourForge - exact travelling-salesman tours in Rust
//!
//! Builds the Dantzig-Fulkerson-Johnson model of an instance (one boolean
//! per directed edge, degree constraints, one subtour-elimination
//! constraint per proper city subset), solves it and walks the selected
//! edges back into a closed tour.
//!
//! # Example
//!
//! ```rust
//! use tourforge::prelude::*;
//!
//! // Four cities on a ring: neighbours are 1 apart, everything else 10.
//! let distances = DistanceMatrix::from_fn(4, |a, b| {
//!     if (a + 1) % 4 == b || (b + 1) % 4 == a { 1.0 } else { 10.0 }
//! });
//! let solution = tourforge::solve(&TspInstance::new(distances, 0)).unwrap();
//!
//! assert_eq!(solution.total_distance, 4.0);
//! assert_eq!(solution.tour.start(), 0);
//! ```

use tracing::{debug, warn};

// Instance and result types
pub use tourforge_core::{
    CityIndex, DistanceMatrix, ModelStats, SolutionStatus, Tour, TourSolution, TspInstance,
};

// Errors
pub use tourforge_core::{ErrorKind, Result, TourForgeError};

// Gateway contract, for plugging in other MIP backends
pub use tourforge_core::{
    GatewayError, LinearExpr, SolveLimits, SolveStatus, SolverGateway, VariableHandle,
};

// Subset enumeration
pub use tourforge_core::{
    binomial, subset_count, SubsetBlock, SubsetCache, SubsetCollection, SubsetEnumerator,
};

pub use tourforge_config::{ConfigError, EnumerationConfig, SolverConfig, TerminationConfig};

pub use tourforge_solver::{
    extract_tour, EdgeValues, MicroLpGateway, ModelBuilder, SolutionExtractor, SolverSession,
    TspModel, TspSolver,
};

#[cfg(feature = "console")]
pub mod console;

/// Config file read by [`solve`].
pub const CONFIG_FILE: &str = "solver.toml";

/// Solves `instance` with the bundled backend.
///
/// Settings come from `solver.toml` in the working directory when present,
/// defaults otherwise.
pub fn solve(instance: &TspInstance) -> Result<TourSolution> {
    #[cfg(feature = "console")]
    console::init();

    let config = match SolverConfig::load(CONFIG_FILE) {
        Ok(config) => config,
        Err(ConfigError::Io(err)) => {
            debug!(file = CONFIG_FILE, error = %err, "No solver config, using defaults");
            SolverConfig::default()
        }
        Err(err) => {
            warn!(file = CONFIG_FILE, error = %err, "Ignoring invalid solver config");
            SolverConfig::default()
        }
    };
    solve_with_config(instance, config)
}

/// Solves `instance` with the bundled backend and explicit settings.
pub fn solve_with_config(instance: &TspInstance, config: SolverConfig) -> Result<TourSolution> {
    TspSolver::new(config).solve(MicroLpGateway::new(), instance)
}

pub mod prelude {
    pub use super::{
        solve, solve_with_config, DistanceMatrix, SolutionStatus, SolverConfig, Tour,
        TourForgeError, TourSolution, TspInstance, TspSolver,
    };
}
