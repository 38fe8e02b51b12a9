//! In-process MIP backend: depth-first branch-and-bound over `microlp`
//! linear relaxations.
//!
//! Every boolean is registered as a continuous variable in `[0, 1]`. Each
//! search node is a list of fixings applied to a clone of the root
//! relaxation, so open nodes stay small. The search honours the wall-clock
//! limit, an optional node limit and caps the open-node stack by the memory
//! limit; when any of them runs out the best incumbent is kept and
//! `TimeLimit` is reported.

use std::collections::HashSet;
use std::mem;
use std::time::{Duration, Instant};

use microlp::{ComparisonOp, OptimizationDirection, Problem, Solution, Variable};
use tourforge_core::{
    GatewayError, LinearExpr, SolveLimits, SolveStatus, SolverGateway, VariableHandle,
};
use tracing::{debug, trace, warn};

use crate::solver::duration_ms;

/// Floor for the integrality tolerance, absorbing simplex round-off.
const MIN_INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Bound improvement required to keep exploring a node.
const PRUNE_EPSILON: f64 = 1e-9;

/// Fixed bookkeeping cost of one open node, in bytes.
const NODE_OVERHEAD_BYTES: usize = 64;

#[derive(Debug, Clone)]
struct Row {
    terms: Vec<(usize, f64)>,
    op: ComparisonOp,
    rhs: f64,
}

#[derive(Debug, Clone)]
struct Incumbent {
    values: Vec<f64>,
    objective: f64,
}

#[derive(Debug)]
struct Node {
    fixings: Vec<(usize, f64)>,
    parent_bound: f64,
}

impl Node {
    fn bytes(&self) -> usize {
        NODE_OVERHEAD_BYTES + self.fixings.len() * mem::size_of::<(usize, f64)>()
    }
}

enum SearchEnd {
    Exhausted,
    Deadline,
    NodeLimit,
    MemoryLimit,
}

/// Wall-clock cut-off; `None` when the limit is too large to represent.
fn deadline_after(started: Instant, time_limit: Duration) -> Option<Instant> {
    started.checked_add(time_limit)
}

fn is_past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// [`SolverGateway`] backed by `microlp`.
#[derive(Debug, Default)]
pub struct MicroLpGateway {
    labels: HashSet<String>,
    variable_count: usize,
    objective: Vec<f64>,
    rows: Vec<Row>,
    /// Set when a constant constraint (no terms) can never hold.
    trivially_infeasible: bool,
    incumbent: Option<Incumbent>,
    nodes_explored: u64,
    node_limit: Option<u64>,
    released: bool,
}

impl MicroLpGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the search after `limit` explored nodes, keeping the incumbent.
    pub fn with_node_limit(mut self, limit: Option<u64>) -> Self {
        self.node_limit = limit;
        self
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count
    }

    pub fn constraint_count(&self) -> usize {
        self.rows.len()
    }

    /// Nodes explored by the last solve.
    pub fn nodes_explored(&self) -> u64 {
        self.nodes_explored
    }

    fn ensure_live(&self) -> Result<(), GatewayError> {
        if self.released {
            Err(GatewayError::Released)
        } else {
            Ok(())
        }
    }

    fn claim_label(&mut self, label: &str) -> Result<(), GatewayError> {
        self.ensure_live()?;
        if self.labels.contains(label) {
            return Err(GatewayError::DuplicateLabel(label.to_string()));
        }
        self.labels.insert(label.to_string());
        Ok(())
    }

    fn terms(&self, expr: &LinearExpr) -> Result<Vec<(usize, f64)>, GatewayError> {
        expr.terms()
            .map(|(var, coeff)| {
                if var.index() < self.variable_count {
                    Ok((var.index(), coeff))
                } else {
                    Err(GatewayError::UnknownVariable(var))
                }
            })
            .collect()
    }

    fn add_row(
        &mut self,
        expr: &LinearExpr,
        op: ComparisonOp,
        rhs: f64,
        label: &str,
    ) -> Result<(), GatewayError> {
        self.ensure_live()?;
        let terms = self.terms(expr)?;
        self.claim_label(label)?;
        if terms.is_empty() {
            let holds = match op {
                ComparisonOp::Eq => rhs.abs() <= PRUNE_EPSILON,
                ComparisonOp::Le => rhs >= -PRUNE_EPSILON,
                ComparisonOp::Ge => rhs <= PRUNE_EPSILON,
            };
            if !holds {
                debug!(label, rhs, "Constant constraint can never hold");
                self.trivially_infeasible = true;
            }
            return Ok(());
        }
        self.rows.push(Row { terms, op, rhs });
        Ok(())
    }

    fn relaxation(&self) -> (Problem, Vec<Variable>) {
        let mut problem = Problem::new(OptimizationDirection::Minimize);
        let vars: Vec<Variable> = self
            .objective
            .iter()
            .map(|&coeff| problem.add_var(coeff, (0.0, 1.0)))
            .collect();
        for row in &self.rows {
            let expr: Vec<(Variable, f64)> = row
                .terms
                .iter()
                .map(|&(index, coeff)| (vars[index], coeff))
                .collect();
            problem.add_constraint(expr, row.op, row.rhs);
        }
        (problem, vars)
    }

    fn search(&mut self, limits: &SolveLimits) -> Result<SolveStatus, GatewayError> {
        let started = Instant::now();
        let deadline = deadline_after(started, limits.time_limit);
        let tolerance = limits.integrality_tolerance.max(MIN_INTEGRALITY_TOLERANCE);
        let memory_budget = usize::try_from(limits.memory_limit_mb)
            .unwrap_or(usize::MAX)
            .saturating_mul(1024 * 1024);

        if self.trivially_infeasible {
            return Ok(SolveStatus::Infeasible);
        }
        if is_past(deadline) {
            debug!("Time limit exhausted before the root relaxation");
            return Ok(SolveStatus::TimeLimit);
        }
        if self.variable_count == 0 {
            self.incumbent = Some(Incumbent {
                values: Vec::new(),
                objective: 0.0,
            });
            return Ok(SolveStatus::Optimal);
        }

        let (problem, vars) = self.relaxation();
        let root = match problem.solve() {
            Ok(root) => root,
            Err(microlp::Error::Infeasible) => return Ok(SolveStatus::Infeasible),
            Err(err) => return Err(backend_error(err)),
        };
        debug!(
            variables = self.variable_count,
            constraints = self.rows.len(),
            root_bound = root.objective(),
            "Root relaxation solved"
        );

        let mut stack = vec![Node {
            fixings: Vec::new(),
            parent_bound: root.objective(),
        }];
        let mut open_bytes = stack[0].bytes();

        let end = loop {
            let Some(node) = stack.pop() else {
                break SearchEnd::Exhausted;
            };
            open_bytes -= node.bytes();
            if is_past(deadline) {
                break SearchEnd::Deadline;
            }
            if self.is_dominated(node.parent_bound) {
                continue;
            }
            if self
                .node_limit
                .is_some_and(|limit| self.nodes_explored >= limit)
            {
                break SearchEnd::NodeLimit;
            }
            self.nodes_explored += 1;

            let solution = match apply_fixings(&root, &vars, &node.fixings) {
                Ok(solution) => solution,
                Err(microlp::Error::Infeasible) => {
                    trace!(depth = node.fixings.len(), "Node infeasible");
                    continue;
                }
                Err(err) => return Err(backend_error(err)),
            };
            let bound = solution.objective();
            if self.is_dominated(bound) {
                trace!(depth = node.fixings.len(), bound, "Node pruned by bound");
                continue;
            }

            match most_fractional(&solution, &vars, tolerance) {
                None => {
                    let values: Vec<f64> = vars.iter().map(|&v| solution[v].round()).collect();
                    let objective: f64 = self
                        .objective
                        .iter()
                        .zip(&values)
                        .map(|(c, v)| c * v)
                        .sum();
                    debug!(objective, nodes = self.nodes_explored, "New incumbent");
                    self.incumbent = Some(Incumbent { values, objective });
                }
                Some(index) => {
                    for value in [0.0, 1.0] {
                        let mut fixings = Vec::with_capacity(node.fixings.len() + 1);
                        fixings.extend_from_slice(&node.fixings);
                        fixings.push((index, value));
                        let child = Node {
                            fixings,
                            parent_bound: bound,
                        };
                        open_bytes += child.bytes();
                        stack.push(child);
                    }
                    if open_bytes > memory_budget {
                        break SearchEnd::MemoryLimit;
                    }
                }
            }
        };

        let status = match (end, &self.incumbent) {
            (SearchEnd::Exhausted, Some(_)) => SolveStatus::Optimal,
            (SearchEnd::Exhausted, None) => SolveStatus::Infeasible,
            (SearchEnd::Deadline, _) => SolveStatus::TimeLimit,
            (SearchEnd::NodeLimit, _) => {
                debug!(nodes = self.nodes_explored, "Node limit reached");
                SolveStatus::TimeLimit
            }
            (SearchEnd::MemoryLimit, _) => {
                warn!(
                    memory_limit_mb = limits.memory_limit_mb,
                    open_nodes = stack.len(),
                    "Search tree exceeded the memory limit"
                );
                SolveStatus::TimeLimit
            }
        };
        debug!(
            %status,
            nodes = self.nodes_explored,
            duration_ms = duration_ms(started.elapsed()),
            "Branch and bound finished"
        );
        Ok(status)
    }

    fn is_dominated(&self, bound: f64) -> bool {
        self.incumbent
            .as_ref()
            .is_some_and(|best| bound >= best.objective - PRUNE_EPSILON)
    }
}

fn backend_error(err: microlp::Error) -> GatewayError {
    GatewayError::Backend(err.to_string())
}

fn apply_fixings(
    root: &Solution,
    vars: &[Variable],
    fixings: &[(usize, f64)],
) -> Result<Solution, microlp::Error> {
    fixings
        .iter()
        .try_fold(root.clone(), |solution, &(index, value)| {
            solution.fix_var(vars[index], value)
        })
}

/// Index of the variable farthest from an integer, if any exceeds `tolerance`.
fn most_fractional(solution: &Solution, vars: &[Variable], tolerance: f64) -> Option<usize> {
    vars.iter()
        .enumerate()
        .map(|(index, &var)| {
            let value = solution[var];
            (index, (value - value.round()).abs())
        })
        .filter(|&(_, distance)| distance > tolerance)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

impl SolverGateway for MicroLpGateway {
    fn create_boolean_variable(&mut self, label: &str) -> Result<VariableHandle, GatewayError> {
        self.claim_label(label)?;
        let handle = VariableHandle::new(self.variable_count);
        self.variable_count += 1;
        self.objective.push(0.0);
        Ok(handle)
    }

    fn add_linear_equality(
        &mut self,
        expr: &LinearExpr,
        rhs: f64,
        label: &str,
    ) -> Result<(), GatewayError> {
        self.add_row(expr, ComparisonOp::Eq, rhs, label)
    }

    fn add_linear_inequality(
        &mut self,
        expr: &LinearExpr,
        rhs: f64,
        label: &str,
    ) -> Result<(), GatewayError> {
        self.add_row(expr, ComparisonOp::Le, rhs, label)
    }

    fn set_objective_minimize(&mut self, expr: &LinearExpr) -> Result<(), GatewayError> {
        self.ensure_live()?;
        let terms = self.terms(expr)?;
        self.objective.iter_mut().for_each(|c| *c = 0.0);
        for (index, coeff) in terms {
            self.objective[index] = coeff;
        }
        Ok(())
    }

    fn solve(&mut self, limits: &SolveLimits) -> Result<SolveStatus, GatewayError> {
        self.ensure_live()?;
        self.incumbent = None;
        self.nodes_explored = 0;
        self.search(limits).inspect_err(|err| {
            warn!(error = %err, "Branch and bound failed");
        })
    }

    fn has_incumbent(&self) -> bool {
        !self.released && self.incumbent.is_some()
    }

    fn value(&self, var: VariableHandle) -> Result<f64, GatewayError> {
        self.ensure_live()?;
        let incumbent = self.incumbent.as_ref().ok_or(GatewayError::NoSolution)?;
        incumbent
            .values
            .get(var.index())
            .copied()
            .ok_or(GatewayError::UnknownVariable(var))
    }

    fn objective_value(&self) -> Result<f64, GatewayError> {
        self.ensure_live()?;
        self.incumbent
            .as_ref()
            .map(|best| best.objective)
            .ok_or(GatewayError::NoSolution)
    }

    fn release(&mut self) {
        self.labels.clear();
        self.objective.clear();
        self.rows.clear();
        self.incumbent = None;
        self.variable_count = 0;
        self.released = true;
    }

    fn name(&self) -> &str {
        "microlp-bnb"
    }
}
