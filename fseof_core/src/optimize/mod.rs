//! Linear programs over named variables, and the solvers that optimize them

pub mod constraint;
pub mod objective;
pub mod problem;
pub mod solvers;
pub mod variable;

use indexmap::IndexMap;

/// Outcome of a single solve
#[derive(Clone, Debug)]
pub struct ProblemSolution {
    pub status: OptimizationStatus,
    /// Objective at the optimum, `None` unless [`OptimizationStatus::has_solution`]
    pub objective_value: Option<f64>,
    /// Variable id to value at the optimum, `None` unless a solution was found
    pub variable_values: Option<IndexMap<String, f64>>,
}

impl ProblemSolution {
    /// Solution carrying only a status, for problems without an optimum
    pub fn without_values(status: OptimizationStatus) -> Self {
        Self {
            status,
            objective_value: None,
            variable_values: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OptimizationStatus {
    Unoptimized,
    Optimal,
    /// Objective can grow without bound
    Unbounded,
    /// Constraints cannot all hold
    Infeasible,
    /// Solved to reduced accuracy
    AlmostOptimal,
    NumericalError,
    /// Stopped on an iteration or time limit, or for lack of progress
    SolverHalted,
}

impl OptimizationStatus {
    /// Whether the variable values can be used
    pub fn has_solution(&self) -> bool {
        matches!(
            self,
            OptimizationStatus::Optimal | OptimizationStatus::AlmostOptimal
        )
    }
}
