//! Implements a solver interface for Clarabel
//!
//! Clarabel solves problems of the form
//! `minimize q'x subject to Ax + s = b, s in K`; equalities (and fixed variables) are
//! written as rows of the zero cone, every finite bound as a row of the nonnegative cone.
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use indexmap::IndexMap;
use nalgebra_sparse::{coo::CooMatrix, csc::CscMatrix as SparseCsc};
use tracing::trace;

use crate::optimize::constraint::Constraint;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Interior point solver backed by Clarabel
#[derive(Clone, Debug, Default)]
pub struct ClarabelSolver {
    /// Print Clarabel's iteration log
    pub verbose: bool,
    /// Wall clock limit on each solve, in seconds
    pub time_limit: Option<f64>,
}

impl ClarabelSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_limit(mut self, time_limit: Option<f64>) -> Self {
        self.time_limit = time_limit;
        self
    }
}

/// A sparse row `coefs . x` with right hand side `rhs`
type Row = (Vec<(usize, f64)>, f64);

/// Rows of the constraint matrix, split by cone
#[derive(Default)]
struct ConicRows {
    zero: Vec<Row>,
    nonnegative: Vec<Row>,
}

impl ConicRows {
    fn push_range(&mut self, coefs: Vec<(usize, f64)>, lower_bound: f64, upper_bound: f64) {
        if lower_bound == upper_bound {
            self.zero.push((coefs, upper_bound));
            return;
        }
        if upper_bound.is_finite() {
            self.nonnegative.push((coefs.clone(), upper_bound));
        }
        if lower_bound.is_finite() {
            let negated = coefs.into_iter().map(|(col, c)| (col, -c)).collect();
            self.nonnegative.push((negated, -lower_bound));
        }
    }
}

fn gather_rows(problem: &Problem) -> Result<ConicRows, SolverError> {
    let mut rows = ConicRows::default();
    for (id, constraint) in problem.constraints() {
        let mut coefs = Vec::with_capacity(constraint.terms().len());
        for term in constraint.terms() {
            let col = problem.variables().get_index_of(&term.variable).ok_or_else(|| {
                SolverError::InvalidProblem(format!(
                    "constraint {} references unknown variable {}",
                    id, term.variable
                ))
            })?;
            coefs.push((col, term.coefficient));
        }
        match constraint {
            Constraint::Equality { equals, .. } => rows.zero.push((coefs, *equals)),
            Constraint::Inequality {
                lower_bound,
                upper_bound,
                ..
            } => rows.push_range(coefs, *lower_bound, *upper_bound),
        }
    }
    for variable in problem.variables().values() {
        rows.push_range(
            vec![(variable.index(), 1.)],
            variable.lower_bound,
            variable.upper_bound,
        );
    }
    Ok(rows)
}

impl Solver for ClarabelSolver {
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let n = problem.num_variables();
        let rows = gather_rows(problem)?;
        let num_zero = rows.zero.len();
        let num_nonneg = rows.nonnegative.len();
        let m = num_zero + num_nonneg;

        // Constraint matrix, zero cone rows first
        let mut coo = CooMatrix::<f64>::new(m, n);
        let mut b = Vec::with_capacity(m);
        for (row, (coefs, rhs)) in rows.zero.iter().chain(rows.nonnegative.iter()).enumerate() {
            for (col, coef) in coefs {
                coo.push(row, *col, *coef);
            }
            b.push(*rhs);
        }
        let (col_offsets, row_indices, values) = SparseCsc::from(&coo).disassemble();
        let a = CscMatrix::new(m, n, col_offsets, row_indices, values);

        // Purely linear objective, so P is empty
        let p = CscMatrix::new(n, n, vec![0; n + 1], Vec::new(), Vec::new());
        let mut q = vec![0f64; n];
        let flip = match problem.objective().sense() {
            ObjectiveSense::Minimize => 1.,
            ObjectiveSense::Maximize => -1.,
        };
        for term in problem.objective().terms() {
            if let Some(col) = problem.variables().get_index_of(&term.variable) {
                q[col] += flip * term.coefficient;
            }
        }

        let mut cones = Vec::with_capacity(2);
        if num_zero > 0 {
            cones.push(SupportedConeT::ZeroConeT(num_zero));
        }
        if num_nonneg > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(num_nonneg));
        }

        let mut builder = DefaultSettingsBuilder::<f64>::default();
        builder.verbose(self.verbose);
        if let Some(limit) = self.time_limit {
            builder.time_limit(limit);
        }
        let settings = builder
            .build()
            .map_err(|err| SolverError::InvalidSettings(err.to_string()))?;

        trace!(variables = n, rows = m, "Solving with Clarabel");
        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings);
        solver.solve();

        let status = convert_status(solver.solution.status);
        if !status.has_solution() {
            return Ok(ProblemSolution::without_values(status));
        }
        let variable_values: IndexMap<String, f64> = problem
            .variables()
            .keys()
            .cloned()
            .zip(solver.solution.x.iter().copied())
            .collect();
        let objective_value = problem
            .objective()
            .evaluate(|id| variable_values.get(id).copied().unwrap_or_default());
        Ok(ProblemSolution {
            status,
            objective_value: Some(objective_value),
            variable_values: Some(variable_values),
        })
    }
}

fn convert_status(status: SolverStatus) -> OptimizationStatus {
    match status {
        SolverStatus::Solved => OptimizationStatus::Optimal,
        SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            OptimizationStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            OptimizationStatus::Unbounded
        }
        SolverStatus::NumericalError => OptimizationStatus::NumericalError,
        SolverStatus::Unsolved => OptimizationStatus::Unoptimized,
        _ => OptimizationStatus::SolverHalted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_lp() {
        // maximize x + y subject to x + 2y <= 4, 0 <= x <= 3, y >= 0
        let mut problem = Problem::new_maximization();
        problem.add_new_variable("x", None, 0., 3.).unwrap();
        problem.add_new_variable("y", None, 0., f64::INFINITY).unwrap();
        problem
            .add_new_inequality_constraint_by_id("c", &["x", "y"], &[1., 2.], f64::NEG_INFINITY, 4.)
            .unwrap();
        problem.add_new_linear_objective_term_by_id("x", 1.).unwrap();
        problem.add_new_linear_objective_term_by_id("y", 1.).unwrap();

        let solution = problem.solve(&ClarabelSolver::new()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 3.5).abs() < 1e-6);
        let values = solution.variable_values.unwrap();
        assert!((values["x"] - 3.).abs() < 1e-6);
        assert!((values["y"] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn equality_and_fixed_variables() {
        // minimize x subject to x + y = 5, y fixed at 2
        let mut problem = Problem::new_minimization();
        problem.add_new_variable("x", None, -10., 10.).unwrap();
        problem.add_new_variable("y", None, 2., 2.).unwrap();
        problem
            .add_new_equality_constraint_by_id("sum", &["x", "y"], &[1., 1.], 5.)
            .unwrap();
        problem.add_new_linear_objective_term_by_id("x", 1.).unwrap();

        let solution = problem.solve(&ClarabelSolver::new()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert!((solution.objective_value.unwrap() - 3.).abs() < 1e-6);
    }

    #[test]
    fn infeasible() {
        let mut problem = Problem::new_maximization();
        problem.add_new_variable("x", None, 0., 1.).unwrap();
        problem
            .add_new_inequality_constraint_by_id("c", &["x"], &[1.], 2., f64::INFINITY)
            .unwrap();
        problem.add_new_linear_objective_term_by_id("x", 1.).unwrap();

        let solution = problem.solve(&ClarabelSolver::new()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Infeasible);
        assert!(solution.variable_values.is_none());
        assert!(solution.objective_value.is_none());
    }

    #[test]
    fn unbounded() {
        let mut problem = Problem::new_maximization();
        problem
            .add_new_variable("x", None, 0., f64::INFINITY)
            .unwrap();
        problem.add_new_linear_objective_term_by_id("x", 1.).unwrap();

        let solution = problem.solve(&ClarabelSolver::new()).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Unbounded);
    }
}
