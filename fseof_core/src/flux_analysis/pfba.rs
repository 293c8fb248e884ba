//! Parsimonious flux balance analysis
//!
//! Finds the optimum with [`fba`](super::fba::fba), holds the objective there and then
//! minimizes the total flux `sum(forward + reverse)`.
use crate::configuration;
use crate::flux_analysis::fba::solve_problem;
use crate::flux_analysis::formulation::{
    build_problem, constrain_net_flux, net_flux, net_fluxes, optimum_slack, reaction,
    set_net_objective,
};
use crate::flux_analysis::{FluxError, FluxSolution, SolveOutcome};
use crate::metabolic_model::model::Model;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::solvers::Solver;

pub fn pfba(
    model: &Model,
    objective: &str,
    sense: ObjectiveSense,
    solver: &dyn Solver,
) -> Result<SolveOutcome, FluxError> {
    let target = reaction(model, objective)?;
    let mut problem = build_problem(model, sense)?;
    set_net_objective(&mut problem, target, 1., sense)?;
    let optimum = match solve_problem(&problem, solver)? {
        Some(solution) => net_flux(&solution, target),
        None => return Ok(SolveOutcome::Infeasible),
    };

    let slack = optimum_slack(optimum, configuration::current().tolerance);
    let bound = match sense {
        ObjectiveSense::Maximize => optimum - slack,
        ObjectiveSense::Minimize => optimum + slack,
    };
    constrain_net_flux(&mut problem, target, sense, bound)?;

    problem.remove_all_objective_terms();
    problem.update_objective_sense(ObjectiveSense::Minimize);
    for rxn in model.reactions.values() {
        problem.add_new_linear_objective_term_by_id(&rxn.get_forward_id(), 1.)?;
        problem.add_new_linear_objective_term_by_id(&rxn.get_reverse_id(), 1.)?;
    }
    match solve_problem(&problem, solver)? {
        Some(solution) => Ok(SolveOutcome::Optimal(FluxSolution {
            objective_value: optimum,
            fluxes: net_fluxes(model, &solution),
            substituted_ranges: 0,
        })),
        None => Ok(SolveOutcome::Infeasible),
    }
}
