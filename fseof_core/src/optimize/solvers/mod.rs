//! Solver interfaces for [`Problem`](crate::optimize::problem::Problem)
pub mod clarabel;

use thiserror::Error;

use crate::optimize::problem::Problem;
use crate::optimize::ProblemSolution;

/// A backend able to solve linear problems
///
/// Solvers are shared across worker threads during parallel analyses, so they must be
/// `Send + Sync`.
pub trait Solver: Send + Sync {
    /// Solve the problem, returning its status and (if found) the optimum
    ///
    /// Infeasibility and unboundedness are reported through the status of the returned
    /// [`ProblemSolution`], errors are reserved for problems the solver could not set up.
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError>;
}

/// Errors raised by solver backends
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The solver settings were rejected
    #[error("Invalid solver settings: {0}")]
    InvalidSettings(String),
    /// The problem could not be converted into the solver's form
    #[error("Unable to set up problem for the solver: {0}")]
    InvalidProblem(String),
}
