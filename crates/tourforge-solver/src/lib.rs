//! TourForge Solver
//!
//! This crate turns a travelling-salesman instance into a DFJ model and a
//! solved model back into a tour:
//! - `SolverSession` - exclusive, scoped ownership of one gateway
//! - `ModelBuilder` - variables, objective, degree and subtour constraints
//! - `SolutionExtractor` - walks the selected edges into a tour
//! - `TspSolver` - validate, build, solve, extract and release
//! - `MicroLpGateway` - in-process branch-and-bound backend

pub mod branch_and_bound;
pub mod builder;
pub mod extractor;
pub mod session;
pub mod solver;

pub use branch_and_bound::MicroLpGateway;
pub use builder::{ModelBuilder, TspModel};
pub use extractor::{extract_tour, EdgeValues, SolutionExtractor, SELECTION_THRESHOLD};
pub use session::SolverSession;
pub use solver::TspSolver;
