//! A gateway double that records every call.
//!
//! `RecordingGateway::new()` returns the gateway together with a
//! [`RecordingLog`] handle sharing its state, so tests can inspect what a
//! session did after the gateway has been moved into it.
//!
//! # Example
//!
//! ```
//! use tourforge_core::{LinearExpr, SolverGateway};
//! use tourforge_test::RecordingGateway;
//!
//! let (mut gateway, log) = RecordingGateway::new();
//! let x = gateway.create_boolean_variable("x").unwrap();
//! gateway
//!     .add_linear_inequality(&LinearExpr::new().with_term(x, 1.0), 1.0, "cap")
//!     .unwrap();
//!
//! assert_eq!(log.variable_labels(), vec!["x".to_string()]);
//! assert_eq!(log.inequality_count(), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tourforge_core::{
    GatewayError, LinearExpr, SolveLimits, SolveStatus, SolverGateway, VariableHandle,
};

/// Relation of a recorded constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    Equal,
    LessOrEqual,
}

/// A constraint as registered with the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedConstraint {
    pub label: String,
    pub expr: LinearExpr,
    pub sense: ConstraintSense,
    pub rhs: f64,
}

impl RecordedConstraint {
    /// Returns true if `values` (indexed by handle) satisfy the constraint.
    pub fn is_satisfied_by(&self, values: &[f64]) -> bool {
        let lhs = self.expr.evaluate(|var| values[var.index()]);
        match self.sense {
            ConstraintSense::Equal => (lhs - self.rhs).abs() <= 1e-9,
            ConstraintSense::LessOrEqual => lhs <= self.rhs + 1e-9,
        }
    }
}

#[derive(Debug, Default)]
struct LogState {
    variables: Vec<String>,
    constraints: Vec<RecordedConstraint>,
    objective: Option<LinearExpr>,
    solve_calls: usize,
    release_calls: usize,
    last_limits: Option<SolveLimits>,
}

/// Shared view of everything a [`RecordingGateway`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct RecordingLog {
    state: Arc<Mutex<LogState>>,
}

impl RecordingLog {
    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn variable_labels(&self) -> Vec<String> {
        self.lock().variables.clone()
    }

    pub fn variable_count(&self) -> usize {
        self.lock().variables.len()
    }

    pub fn constraints(&self) -> Vec<RecordedConstraint> {
        self.lock().constraints.clone()
    }

    pub fn constraint(&self, label: &str) -> Option<RecordedConstraint> {
        self.lock()
            .constraints
            .iter()
            .find(|c| c.label == label)
            .cloned()
    }

    pub fn equality_count(&self) -> usize {
        self.count(ConstraintSense::Equal)
    }

    pub fn inequality_count(&self) -> usize {
        self.count(ConstraintSense::LessOrEqual)
    }

    fn count(&self, sense: ConstraintSense) -> usize {
        self.lock()
            .constraints
            .iter()
            .filter(|c| c.sense == sense)
            .count()
    }

    pub fn objective(&self) -> Option<LinearExpr> {
        self.lock().objective.clone()
    }

    /// Handle of the variable registered under `label`.
    pub fn handle(&self, label: &str) -> Option<VariableHandle> {
        self.lock()
            .variables
            .iter()
            .position(|l| l == label)
            .map(VariableHandle::new)
    }

    pub fn solve_calls(&self) -> usize {
        self.lock().solve_calls
    }

    pub fn release_calls(&self) -> usize {
        self.lock().release_calls
    }

    pub fn last_limits(&self) -> Option<SolveLimits> {
        self.lock().last_limits
    }

    /// Returns true if `values` (indexed by handle) satisfy every recorded constraint.
    pub fn is_feasible(&self, values: &[f64]) -> bool {
        self.lock()
            .constraints
            .iter()
            .all(|c| c.is_satisfied_by(values))
    }
}

/// Scriptable [`SolverGateway`] for tests.
///
/// By default every registration succeeds and `solve` returns
/// `Infeasible` with no incumbent. Builder methods script failures, the
/// solve status and the solution values.
#[derive(Debug)]
pub struct RecordingGateway {
    log: RecordingLog,
    labels: HashSet<String>,
    fail_on_label: Option<String>,
    solve_failure: Option<String>,
    status: SolveStatus,
    selected: HashSet<String>,
    overrides: HashMap<String, f64>,
    objective_value: Option<f64>,
    released: bool,
}

impl RecordingGateway {
    pub fn new() -> (Self, RecordingLog) {
        let log = RecordingLog::default();
        let gateway = Self {
            log: log.clone(),
            labels: HashSet::new(),
            fail_on_label: None,
            solve_failure: None,
            status: SolveStatus::Infeasible,
            selected: HashSet::new(),
            overrides: HashMap::new(),
            objective_value: None,
            released: false,
        };
        (gateway, log)
    }

    /// Rejects the registration of `label` with a backend error.
    pub fn fail_on_label(mut self, label: impl Into<String>) -> Self {
        self.fail_on_label = Some(label.into());
        self
    }

    /// Makes `solve` return a gateway error.
    pub fn fail_solve(mut self, message: impl Into<String>) -> Self {
        self.solve_failure = Some(message.into());
        self
    }

    /// Status returned by `solve`, without a solution.
    pub fn with_status(mut self, status: SolveStatus) -> Self {
        self.status = status;
        self
    }

    /// Status returned by `solve` plus a solution: variables whose label is
    /// in `selected` are 1, all others 0.
    pub fn with_solution<I, S>(mut self, status: SolveStatus, objective: f64, selected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.status = status;
        self.objective_value = Some(objective);
        self.selected = selected.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the solved value of one variable.
    pub fn with_value(mut self, label: impl Into<String>, value: f64) -> Self {
        self.overrides.insert(label.into(), value);
        self
    }

    fn register_label(&mut self, label: &str) -> Result<(), GatewayError> {
        if self.released {
            return Err(GatewayError::Released);
        }
        if self.fail_on_label.as_deref() == Some(label) {
            return Err(GatewayError::Backend(format!("scripted failure on {}", label)));
        }
        if !self.labels.insert(label.to_string()) {
            return Err(GatewayError::DuplicateLabel(label.to_string()));
        }
        Ok(())
    }

    fn check_expr(&self, expr: &LinearExpr) -> Result<(), GatewayError> {
        let count = self.log.lock().variables.len();
        match expr.terms().find(|(var, _)| var.index() >= count) {
            Some((var, _)) => Err(GatewayError::UnknownVariable(var)),
            None => Ok(()),
        }
    }

    fn record(
        &mut self,
        expr: &LinearExpr,
        sense: ConstraintSense,
        rhs: f64,
        label: &str,
    ) -> Result<(), GatewayError> {
        self.check_expr(expr)?;
        self.register_label(label)?;
        self.log.lock().constraints.push(RecordedConstraint {
            label: label.to_string(),
            expr: expr.clone(),
            sense,
            rhs,
        });
        Ok(())
    }
}

impl SolverGateway for RecordingGateway {
    fn create_boolean_variable(&mut self, label: &str) -> Result<VariableHandle, GatewayError> {
        self.register_label(label)?;
        let mut state = self.log.lock();
        state.variables.push(label.to_string());
        Ok(VariableHandle::new(state.variables.len() - 1))
    }

    fn add_linear_equality(
        &mut self,
        expr: &LinearExpr,
        rhs: f64,
        label: &str,
    ) -> Result<(), GatewayError> {
        self.record(expr, ConstraintSense::Equal, rhs, label)
    }

    fn add_linear_inequality(
        &mut self,
        expr: &LinearExpr,
        rhs: f64,
        label: &str,
    ) -> Result<(), GatewayError> {
        self.record(expr, ConstraintSense::LessOrEqual, rhs, label)
    }

    fn set_objective_minimize(&mut self, expr: &LinearExpr) -> Result<(), GatewayError> {
        if self.released {
            return Err(GatewayError::Released);
        }
        self.check_expr(expr)?;
        self.log.lock().objective = Some(expr.clone());
        Ok(())
    }

    fn solve(&mut self, limits: &SolveLimits) -> Result<SolveStatus, GatewayError> {
        if self.released {
            return Err(GatewayError::Released);
        }
        {
            let mut state = self.log.lock();
            state.solve_calls += 1;
            state.last_limits = Some(*limits);
        }
        match &self.solve_failure {
            Some(message) => Err(GatewayError::Backend(message.clone())),
            None => Ok(self.status),
        }
    }

    fn has_incumbent(&self) -> bool {
        !self.released && self.objective_value.is_some() && self.log.lock().solve_calls > 0
    }

    fn value(&self, var: VariableHandle) -> Result<f64, GatewayError> {
        if !self.has_incumbent() {
            return Err(GatewayError::NoSolution);
        }
        let state = self.log.lock();
        let label = state
            .variables
            .get(var.index())
            .ok_or(GatewayError::UnknownVariable(var))?;
        if let Some(&value) = self.overrides.get(label) {
            return Ok(value);
        }
        Ok(if self.selected.contains(label) { 1.0 } else { 0.0 })
    }

    fn objective_value(&self) -> Result<f64, GatewayError> {
        if !self.has_incumbent() {
            return Err(GatewayError::NoSolution);
        }
        self.objective_value.ok_or(GatewayError::NoSolution)
    }

    fn release(&mut self) {
        self.released = true;
        self.labels.clear();
        self.log.lock().release_calls += 1;
    }

    fn name(&self) -> &str {
        "recording"
    }
}
