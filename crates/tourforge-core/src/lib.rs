//! TourForge Core - Core types for DFJ travelling-salesman models
//!
//! This crate provides the fundamental abstractions for TourForge:
//! - Instance types (distance matrix, start city, tours)
//! - Subset enumeration for subtour-elimination constraints
//! - The `SolverGateway` contract implemented by MIP backends
//! - The error taxonomy shared by every crate

pub mod error;
pub mod gateway;
pub mod instance;
pub mod subset;
pub mod tour;

pub use error::{ErrorKind, Result, TourForgeError};
pub use gateway::{
    GatewayError, LinearExpr, SolveLimits, SolveStatus, SolverGateway, VariableHandle,
};
pub use instance::{CityIndex, DistanceMatrix, TspInstance};
pub use subset::{
    binomial, subset_count, SubsetBlock, SubsetCache, SubsetCollection, SubsetEnumerator,
};
pub use tour::{ModelStats, SolutionStatus, Tour, TourSolution};
