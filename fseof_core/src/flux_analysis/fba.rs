//! Flux balance analysis
use tracing::debug;

use crate::flux_analysis::formulation::{build_problem, net_flux, net_fluxes, reaction, set_net_objective};
use crate::flux_analysis::{FluxError, FluxSolution, SolveOutcome};
use crate::metabolic_model::model::Model;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::Solver;
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Optimize the net flux through `objective`
pub fn fba(
    model: &Model,
    objective: &str,
    sense: ObjectiveSense,
    solver: &dyn Solver,
) -> Result<SolveOutcome, FluxError> {
    let target = reaction(model, objective)?;
    let mut problem = build_problem(model, sense)?;
    set_net_objective(&mut problem, target, 1., sense)?;
    match solve_problem(&problem, solver)? {
        Some(solution) => Ok(SolveOutcome::Optimal(FluxSolution {
            objective_value: net_flux(&solution, target),
            fluxes: net_fluxes(model, &solution),
            substituted_ranges: 0,
        })),
        None => Ok(SolveOutcome::Infeasible),
    }
}

/// Solve, mapping infeasibility to `None` and any other failure to an error
pub(crate) fn solve_problem(
    problem: &Problem,
    solver: &dyn Solver,
) -> Result<Option<ProblemSolution>, FluxError> {
    let solution = problem.solve(solver)?;
    match solution.status {
        status if status.has_solution() => Ok(Some(solution)),
        OptimizationStatus::Infeasible => {
            debug!("Problem is infeasible");
            Ok(None)
        }
        status => Err(FluxError::Unsolved(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flux_analysis::test_support::toy_model;
    use crate::flux_analysis::FluxModel;
    use crate::optimize::solvers::clarabel::ClarabelSolver;

    #[test]
    fn maximize_biomass() {
        let model = toy_model();
        let solution = fba(&model, "BIOMASS", ObjectiveSense::Maximize, &ClarabelSolver::new())
            .unwrap()
            .optimal()
            .unwrap();
        assert!((solution.objective_value - 20.).abs() < 1e-5);
        assert!((solution.fluxes["EX_glc"].value() + 10.).abs() < 1e-5);
        assert!(solution.fluxes["PROD"].value().abs() < 1e-5);
        assert_eq!(solution.fluxes.len(), model.reactions.len());
    }

    #[test]
    fn minimize_biomass() {
        let model = toy_model();
        let solution = fba(&model, "BIOMASS", ObjectiveSense::Minimize, &ClarabelSolver::new())
            .unwrap()
            .optimal()
            .unwrap();
        assert!(solution.objective_value.abs() < 1e-5);
    }

    #[test]
    fn infeasible_bounds() {
        let mut model = toy_model();
        // Only 10 glucose enters, so 25 product can't be made
        model.set_bounds("EX_prod", 25., 25.).unwrap();
        let outcome = fba(&model, "BIOMASS", ObjectiveSense::Maximize, &ClarabelSolver::new())
            .unwrap();
        assert_eq!(outcome, SolveOutcome::Infeasible);
    }

    #[test]
    fn unknown_objective() {
        let model = toy_model();
        assert_eq!(
            fba(&model, "NOPE", ObjectiveSense::Maximize, &ClarabelSolver::new()),
            Err(FluxError::UnknownReaction("NOPE".to_string()))
        );
    }
}
