//! Translation of a [`Model`] into a linear [`Problem`]
//!
//! Every reaction becomes a forward and a reverse variable, both nonnegative, with the net
//! flux given by their difference. Every metabolite contributes a steady state mass balance.
use indexmap::IndexMap;

use crate::flux_analysis::{Flux, FluxError, FluxVector};
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::Reaction;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::ProblemSolution;

/// Id of the constraint pinning the objective near its optimum
pub(crate) const OBJECTIVE_CONSTRAINT: &str = "objective_optimum";

pub(crate) fn build_problem(model: &Model, sense: ObjectiveSense) -> Result<Problem, FluxError> {
    let mut problem = Problem::new(sense);
    for reaction in model.reactions.values() {
        problem.add_new_variable(
            &reaction.get_forward_id(),
            None,
            reaction.get_forward_lower_bound(),
            reaction.get_forward_upper_bound(),
        )?;
        problem.add_new_variable(
            &reaction.get_reverse_id(),
            None,
            reaction.get_reverse_lower_bound(),
            reaction.get_reverse_upper_bound(),
        )?;
    }

    // Metabolite -> (variable ids, coefficients), in order of first appearance
    let mut balances: IndexMap<&str, (Vec<String>, Vec<f64>)> = IndexMap::new();
    for reaction in model.reactions.values() {
        for (met, coef) in &reaction.metabolites {
            let (vars, coefs) = balances.entry(met.as_str()).or_default();
            vars.push(reaction.get_forward_id());
            coefs.push(*coef);
            vars.push(reaction.get_reverse_id());
            coefs.push(-*coef);
        }
    }
    for (met, (vars, coefs)) in balances {
        let var_refs: Vec<&str> = vars.iter().map(String::as_str).collect();
        problem.add_new_equality_constraint_by_id(
            &format!("{}_balance", met),
            &var_refs,
            &coefs,
            0.,
        )?;
    }
    Ok(problem)
}

pub(crate) fn reaction<'m>(model: &'m Model, id: &str) -> Result<&'m Reaction, FluxError> {
    model
        .get_reaction(id)
        .ok_or_else(|| FluxError::UnknownReaction(id.to_string()))
}

/// Replace the objective with `coefficient` times the net flux of `reaction`
pub(crate) fn set_net_objective(
    problem: &mut Problem,
    reaction: &Reaction,
    coefficient: f64,
    sense: ObjectiveSense,
) -> Result<(), FluxError> {
    problem.remove_all_objective_terms();
    problem.update_objective_sense(sense);
    problem.add_new_linear_objective_term_by_id(&reaction.get_forward_id(), coefficient)?;
    problem.add_new_linear_objective_term_by_id(&reaction.get_reverse_id(), -coefficient)?;
    Ok(())
}

/// Keep the net flux of `reaction` at least (maximize) or at most (minimize) `bound`
pub(crate) fn constrain_net_flux(
    problem: &mut Problem,
    reaction: &Reaction,
    sense: ObjectiveSense,
    bound: f64,
) -> Result<(), FluxError> {
    let (lower, upper) = match sense {
        ObjectiveSense::Maximize => (bound, f64::INFINITY),
        ObjectiveSense::Minimize => (f64::NEG_INFINITY, bound),
    };
    problem.remove_constraint(OBJECTIVE_CONSTRAINT);
    problem.add_new_inequality_constraint_by_id(
        OBJECTIVE_CONSTRAINT,
        &[&reaction.get_forward_id(), &reaction.get_reverse_id()],
        &[1., -1.],
        lower,
        upper,
    )?;
    Ok(())
}

/// Tolerance applied when holding the objective near `optimum`
pub(crate) fn optimum_slack(optimum: f64, tolerance: f64) -> f64 {
    tolerance * optimum.abs().max(1.)
}

/// Net flux of a single reaction in a solved problem
pub(crate) fn net_flux(solution: &ProblemSolution, reaction: &Reaction) -> f64 {
    match &solution.variable_values {
        Some(values) => {
            values.get(&reaction.get_forward_id()).copied().unwrap_or_default()
                - values.get(&reaction.get_reverse_id()).copied().unwrap_or_default()
        }
        None => 0.,
    }
}

/// Net fluxes of every reaction in a solved problem
pub(crate) fn net_fluxes(model: &Model, solution: &ProblemSolution) -> FluxVector {
    model
        .reactions
        .values()
        .map(|r| (r.id.clone(), Flux::Point(net_flux(solution, r))))
        .collect()
}
