//! Solver gateway contract.
//!
//! A `SolverGateway` is the narrow interface through which models are
//! registered with a mixed-integer solver and solved. Backends own every
//! variable and constraint they hand out until `release` is called.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

/// Errors raised at the gateway boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// A variable or constraint label was registered twice.
    #[error("duplicate label: {0}")]
    DuplicateLabel(String),

    /// The handle does not belong to this gateway.
    #[error("unknown variable handle: {0:?}")]
    UnknownVariable(VariableHandle),

    /// Values were requested but no solution is available.
    #[error("no solution available")]
    NoSolution,

    /// The gateway was used after `release`.
    #[error("gateway already released")]
    Released,

    /// Backend-specific failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Opaque reference to a variable owned by a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableHandle(usize);

impl VariableHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Sequence number of the variable inside its gateway.
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A linear expression: mapping from variable to coefficient.
///
/// Adding a term for a variable that is already present accumulates its
/// coefficient, so every variable appears at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: BTreeMap<VariableHandle, f64>,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coeff * var` to the expression.
    pub fn add_term(&mut self, var: VariableHandle, coeff: f64) {
        *self.terms.entry(var).or_insert(0.0) += coeff;
    }

    /// Builder-style variant of [`add_term`](Self::add_term).
    pub fn with_term(mut self, var: VariableHandle, coeff: f64) -> Self {
        self.add_term(var, coeff);
        self
    }

    pub fn coefficient(&self, var: VariableHandle) -> Option<f64> {
        self.terms.get(&var).copied()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Iterates terms in ascending handle order.
    pub fn terms(&self) -> impl Iterator<Item = (VariableHandle, f64)> + '_ {
        self.terms.iter().map(|(&var, &coeff)| (var, coeff))
    }

    /// Evaluates the expression against a value lookup.
    pub fn evaluate(&self, mut value: impl FnMut(VariableHandle) -> f64) -> f64 {
        self.terms().map(|(var, coeff)| coeff * value(var)).sum()
    }
}

impl FromIterator<(VariableHandle, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VariableHandle, f64)>>(iter: I) -> Self {
        let mut expr = LinearExpr::new();
        expr.extend(iter);
        expr
    }
}

impl Extend<(VariableHandle, f64)> for LinearExpr {
    fn extend<I: IntoIterator<Item = (VariableHandle, f64)>>(&mut self, iter: I) {
        for (var, coeff) in iter {
            self.add_term(var, coeff);
        }
    }
}

impl<'a> IntoIterator for &'a LinearExpr {
    type Item = (&'a VariableHandle, &'a f64);
    type IntoIter = btree_map::Iter<'a, VariableHandle, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

/// Limits handed to a single solve call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveLimits {
    /// Wall-clock budget for the solve.
    pub time_limit: Duration,
    /// Approximate memory budget for the search tree, in megabytes.
    pub memory_limit_mb: u64,
    /// Distance from an integer below which a value counts as integral.
    pub integrality_tolerance: f64,
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(180),
            memory_limit_mb: 5000,
            integrality_tolerance: 0.0,
        }
    }
}

/// Outcome of a solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal solution.
    Optimal,
    /// Feasible solution, optimality not proven.
    Feasible,
    /// No feasible solution exists.
    Infeasible,
    /// Limits exhausted; the best incumbent (if any) is available.
    TimeLimit,
    /// Solver-level failure.
    Error,
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::Feasible => write!(f, "Feasible"),
            SolveStatus::Infeasible => write!(f, "Infeasible"),
            SolveStatus::TimeLimit => write!(f, "TimeLimit"),
            SolveStatus::Error => write!(f, "Error"),
        }
    }
}

/// Abstract mixed-integer solver.
///
/// Implementations are single-session resources: one model is registered,
/// solved, queried and then released. Callers never share a gateway between
/// concurrent solves; exclusive access is enforced by `&mut self`.
pub trait SolverGateway: Send {
    /// Creates a 0/1 variable with a unique label.
    fn create_boolean_variable(&mut self, label: &str) -> Result<VariableHandle, GatewayError>;

    /// Registers `expr == rhs`.
    fn add_linear_equality(
        &mut self,
        expr: &LinearExpr,
        rhs: f64,
        label: &str,
    ) -> Result<(), GatewayError>;

    /// Registers `expr <= rhs`.
    fn add_linear_inequality(
        &mut self,
        expr: &LinearExpr,
        rhs: f64,
        label: &str,
    ) -> Result<(), GatewayError>;

    /// Sets the objective to minimize.
    fn set_objective_minimize(&mut self, expr: &LinearExpr) -> Result<(), GatewayError>;

    /// Solves the registered model within the given limits.
    fn solve(&mut self, limits: &SolveLimits) -> Result<SolveStatus, GatewayError>;

    /// Returns true if the last solve left a solution to query.
    fn has_incumbent(&self) -> bool;

    /// Value of a variable in the current solution.
    fn value(&self, var: VariableHandle) -> Result<f64, GatewayError>;

    /// Objective value of the current solution.
    fn objective_value(&self) -> Result<f64, GatewayError>;

    /// Frees every resource held by the gateway.
    fn release(&mut self);

    /// Backend name for logging.
    fn name(&self) -> &str {
        "gateway"
    }
}
