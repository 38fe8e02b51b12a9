//! Error types for TourForge

use thiserror::Error;

use crate::gateway::GatewayError;

/// Main error type for TourForge operations
#[derive(Debug, Error)]
pub enum TourForgeError {
    /// Malformed distance matrix, start city or city count
    #[error("Invalid instance: {0}")]
    InvalidInstance(String),

    /// Variable, constraint or objective registration was rejected by the gateway
    #[error("Model build failed: {0}")]
    BuildFailure(#[source] GatewayError),

    /// The solver proved the model infeasible
    #[error("Model is infeasible")]
    SolveInfeasible,

    /// The solve hit its limits before any incumbent was found
    #[error("Solve limit reached without an incumbent after {elapsed_secs:.3}s")]
    SolveTimeLimit { elapsed_secs: f64 },

    /// Solver-level failure
    #[error("Solver error: {0}")]
    SolveError(String),

    /// The solved assignment does not encode a single tour
    #[error("Degenerate solution: {0}")]
    DegenerateSolution(String),

    /// The session was already released when it was used
    #[error("Solver session {0} was already released")]
    SessionReleased(u64),
}

impl TourForgeError {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TourForgeError::InvalidInstance(_) => ErrorKind::InvalidInstance,
            TourForgeError::BuildFailure(_) => ErrorKind::BuildFailure,
            TourForgeError::SolveInfeasible => ErrorKind::SolveInfeasible,
            TourForgeError::SolveTimeLimit { .. } => ErrorKind::SolveTimeLimit,
            TourForgeError::SolveError(_) => ErrorKind::SolveError,
            TourForgeError::DegenerateSolution(_) => ErrorKind::DegenerateSolution,
            TourForgeError::SessionReleased(_) => ErrorKind::SessionReleased,
        }
    }
}

/// Error kinds, for matching without inspecting payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInstance,
    BuildFailure,
    SolveInfeasible,
    SolveTimeLimit,
    SolveError,
    DegenerateSolution,
    SessionReleased,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInstance => "INVALID_INSTANCE",
            ErrorKind::BuildFailure => "BUILD_FAILURE",
            ErrorKind::SolveInfeasible => "SOLVE_INFEASIBLE",
            ErrorKind::SolveTimeLimit => "SOLVE_TIME_LIMIT",
            ErrorKind::SolveError => "SOLVE_ERROR",
            ErrorKind::DegenerateSolution => "DEGENERATE_SOLUTION",
            ErrorKind::SessionReleased => "SESSION_RELEASED",
        };
        write!(f, "{}", name)
    }
}

/// Result type alias for TourForge operations
pub type Result<T> = std::result::Result<T, TourForgeError>;
