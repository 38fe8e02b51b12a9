//! Validate, build, solve, extract, release.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tourforge_config::SolverConfig;
use tourforge_core::{
    Result, SolutionStatus, SolveStatus, SolverGateway, SubsetCache, TourForgeError, TourSolution,
    TspInstance,
};
use tracing::{info, warn};

use crate::builder::ModelBuilder;
use crate::extractor::SolutionExtractor;
use crate::session::SolverSession;

/// Runs the complete pipeline for one instance per call.
///
/// # Example
///
/// ```
/// use tourforge_config::SolverConfig;
/// use tourforge_core::{DistanceMatrix, TspInstance};
/// use tourforge_solver::{MicroLpGateway, TspSolver};
///
/// let distances = DistanceMatrix::from_rows(vec![
///     vec![0.0, 1.0, 4.0],
///     vec![4.0, 0.0, 1.0],
///     vec![1.0, 4.0, 0.0],
/// ]);
/// let solver = TspSolver::new(SolverConfig::default());
/// let solution = solver
///     .solve(MicroLpGateway::new(), &TspInstance::new(distances, 0))
///     .unwrap();
/// assert_eq!(solution.tour.cities(), &[0, 1, 2, 0]);
/// assert_eq!(solution.total_distance, 3.0);
/// ```
#[derive(Debug, Clone)]
pub struct TspSolver {
    config: SolverConfig,
    builder: ModelBuilder,
    extractor: SolutionExtractor,
}

impl Default for TspSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl TspSolver {
    pub fn new(config: SolverConfig) -> Self {
        let builder = ModelBuilder::from_config(&config.enumeration);
        Self {
            config,
            builder,
            extractor: SolutionExtractor::new(),
        }
    }

    /// Shares subset collections with other solvers.
    pub fn with_cache(mut self, cache: Arc<SubsetCache>) -> Self {
        self.builder = self.builder.with_cache(cache);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn builder(&self) -> &ModelBuilder {
        &self.builder
    }

    /// Solves `instance` on a fresh session owning `gateway`.
    ///
    /// The session is released before returning, on success and on every
    /// error path.
    pub fn solve<G: SolverGateway>(&self, gateway: G, instance: &TspInstance) -> Result<TourSolution> {
        let mut session = SolverSession::open(gateway);
        let result = self.solve_in_session(&mut session, instance);
        session.release();
        result
    }

    /// Solves `instance` on an open session without releasing it.
    pub fn solve_in_session<G: SolverGateway>(
        &self,
        session: &mut SolverSession<G>,
        instance: &TspInstance,
    ) -> Result<TourSolution> {
        let started = Instant::now();
        let limits = self.config.solve_limits();

        info!(
            event = "solve_start",
            session = session.id(),
            backend = session.backend(),
            city_count = instance.city_count() as u64,
            start_city = instance.start as u64,
            time_limit_secs = limits.time_limit.as_secs_f64(),
        );

        let model = self.builder.build(session, instance)?;
        let status = session.solve(&limits)?;

        let status = match status {
            SolveStatus::Optimal => SolutionStatus::Optimal,
            SolveStatus::Feasible => SolutionStatus::Feasible,
            SolveStatus::TimeLimit if session.has_incumbent() => {
                warn!(
                    session = session.id(),
                    "Solve limits reached, returning best incumbent"
                );
                SolutionStatus::TimeLimited
            }
            SolveStatus::TimeLimit => {
                return Err(TourForgeError::SolveTimeLimit {
                    elapsed_secs: started.elapsed().as_secs_f64(),
                })
            }
            SolveStatus::Infeasible => return Err(TourForgeError::SolveInfeasible),
            SolveStatus::Error => {
                return Err(TourForgeError::SolveError(format!(
                    "{} reported an error status",
                    session.backend()
                )))
            }
        };

        let (tour, total_distance) = self.extractor.extract(session, &model, instance.start)?;
        let elapsed = started.elapsed();

        info!(
            event = "solve_end",
            session = session.id(),
            total_distance,
            status = ?status,
            duration_ms = duration_ms(elapsed),
        );

        Ok(TourSolution {
            tour,
            total_distance,
            status,
            stats: model.stats(),
            elapsed,
        })
    }
}

/// Milliseconds for log fields, saturating at `u64::MAX`.
pub(crate) fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourforge_core::{DistanceMatrix, ErrorKind};
    use tourforge_test::{ring_instance, RecordingGateway};

    const RING_TOUR: [&str; 4] = ["path_0_1", "path_1_2", "path_2_3", "path_3_0"];

    fn solver() -> TspSolver {
        TspSolver::new(SolverConfig::new().with_termination_seconds(7))
    }

    #[test]
    fn test_optimal_solution() {
        let (gateway, log) = RecordingGateway::new();
        let gateway = gateway.with_solution(SolveStatus::Optimal, 4.0, RING_TOUR);

        let solution = solver().solve(gateway, &ring_instance(4, 0)).unwrap();

        assert_eq!(solution.tour.cities(), &[0, 1, 2, 3, 0]);
        assert_eq!(solution.total_distance, 4.0);
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.stats.variables, 12);
        assert_eq!(log.solve_calls(), 1);
        assert_eq!(log.release_calls(), 1);
        assert_eq!(log.last_limits().unwrap().time_limit, Duration::from_secs(7));
    }

    #[test]
    fn test_feasible_solution() {
        let (gateway, _log) = RecordingGateway::new();
        let gateway = gateway.with_solution(SolveStatus::Feasible, 4.0, RING_TOUR);
        let solution = solver().solve(gateway, &ring_instance(4, 0)).unwrap();
        assert_eq!(solution.status, SolutionStatus::Feasible);
        assert!(solution.status.is_suboptimal());
    }

    #[test]
    fn test_time_limit_with_incumbent() {
        let (gateway, log) = RecordingGateway::new();
        let gateway = gateway.with_solution(SolveStatus::TimeLimit, 4.0, RING_TOUR);

        let solution = solver().solve(gateway, &ring_instance(4, 3)).unwrap();

        assert_eq!(solution.status, SolutionStatus::TimeLimited);
        assert_eq!(solution.tour.cities(), &[3, 0, 1, 2, 3]);
        assert_eq!(log.release_calls(), 1);
    }

    #[test]
    fn test_time_limit_without_incumbent() {
        let (gateway, log) = RecordingGateway::new();
        let err = solver()
            .solve(gateway.with_status(SolveStatus::TimeLimit), &ring_instance(4, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SolveTimeLimit);
        assert_eq!(log.release_calls(), 1);
    }

    #[test]
    fn test_infeasible() {
        let (gateway, log) = RecordingGateway::new();
        let err = solver()
            .solve(gateway.with_status(SolveStatus::Infeasible), &ring_instance(4, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SolveInfeasible);
        assert_eq!(log.release_calls(), 1);
    }

    #[test]
    fn test_error_status() {
        let (gateway, log) = RecordingGateway::new();
        let err = solver()
            .solve(gateway.with_status(SolveStatus::Error), &ring_instance(4, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SolveError);
        assert!(err.to_string().contains("recording"));
        assert_eq!(log.release_calls(), 1);
    }

    #[test]
    fn test_gateway_solve_failure() {
        let (gateway, log) = RecordingGateway::new();
        let err = solver()
            .solve(gateway.fail_solve("out of licenses"), &ring_instance(4, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SolveError);
        assert!(err.to_string().contains("out of licenses"));
        assert_eq!(log.release_calls(), 1);
    }

    #[test]
    fn test_degenerate_incumbent() {
        let (gateway, log) = RecordingGateway::new();
        let gateway = gateway.with_solution(
            SolveStatus::Optimal,
            4.0,
            ["path_0_1", "path_1_0", "path_2_3", "path_3_2"],
        );
        let err = solver().solve(gateway, &ring_instance(4, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateSolution);
        assert_eq!(log.release_calls(), 1);
    }

    #[test]
    fn test_build_failure_releases_once() {
        let (gateway, log) = RecordingGateway::new();
        let err = solver()
            .solve(gateway.fail_on_label("in_2"), &ring_instance(4, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BuildFailure);
        assert_eq!(log.solve_calls(), 0);
        assert_eq!(log.release_calls(), 1);
    }

    #[test]
    fn test_invalid_instance_never_solves() {
        let (gateway, log) = RecordingGateway::new();
        let distances = DistanceMatrix::from_rows(vec![vec![0.0, 1.0, 2.0, 3.0]; 3]);
        let err = solver()
            .solve(gateway, &TspInstance::new(distances, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInstance);
        assert_eq!(log.variable_count(), 0);
        assert_eq!(log.solve_calls(), 0);
        assert_eq!(log.release_calls(), 1);
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_backend_failure_message_reaches_caller() {
        let (gateway, _log) = RecordingGateway::new();
        let err = solver()
            .solve(gateway.fail_solve("singular basis"), &ring_instance(3, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SolveError);
        assert_eq!(
            err.to_string(),
            "Solver error: backend failure: singular basis"
        );
    }

    #[test]
    fn test_session_stays_open() {
        let (gateway, log) = RecordingGateway::new();
        let mut session =
            SolverSession::open(gateway.with_solution(SolveStatus::Optimal, 4.0, RING_TOUR));
        solver()
            .solve_in_session(&mut session, &ring_instance(4, 0))
            .unwrap();
        assert!(!session.is_released());
        assert_eq!(log.release_calls(), 0);
        drop(session);
        assert_eq!(log.release_calls(), 1);
    }
}
