//! Flux variability analysis
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::configuration;
use crate::flux_analysis::fba::solve_problem;
use crate::flux_analysis::formulation::{
    build_problem, constrain_net_flux, net_flux, optimum_slack, reaction, set_net_objective,
};
use crate::flux_analysis::{Flux, FluxError, FluxSolution, FluxVector, SolveOutcome};
use crate::metabolic_model::model::Model;
use crate::metabolic_model::reaction::Reaction;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::Solver;
use crate::utils::parallel::build_pool;

/// Range of every reaction's net flux while the objective stays within
/// `fraction_of_optimum` of its optimum
///
/// Reactions are solved on a pool of `processes` threads when `processes > 1`. Called from
/// a worker of an existing rayon pool, the reactions share that pool instead. A reaction
/// whose minimum or maximum can't be found is reported as `[0, 0]` and counted in
/// [`FluxSolution::substituted_ranges`].
pub fn fva(
    model: &Model,
    objective: &str,
    sense: ObjectiveSense,
    fraction_of_optimum: f64,
    solver: &dyn Solver,
    processes: usize,
) -> Result<SolveOutcome, FluxError> {
    let target = reaction(model, objective)?;
    let mut problem = build_problem(model, sense)?;
    set_net_objective(&mut problem, target, 1., sense)?;
    let optimum = match solve_problem(&problem, solver)? {
        Some(solution) => net_flux(&solution, target),
        None => return Ok(SolveOutcome::Infeasible),
    };

    let slack = (1. - fraction_of_optimum) * optimum.abs()
        + optimum_slack(optimum, configuration::current().tolerance);
    let bound = match sense {
        ObjectiveSense::Maximize => optimum - slack,
        ObjectiveSense::Minimize => optimum + slack,
    };
    constrain_net_flux(&mut problem, target, sense, bound)?;

    let reactions: Vec<&Reaction> = model.reactions.values().collect();
    let ranges: Vec<Option<Flux>> = if processes > 1 && rayon::current_thread_index().is_some()
    {
        reactions
            .par_iter()
            .map(|rxn| reaction_range(&problem, rxn, solver))
            .collect()
    } else if processes > 1 {
        debug!(processes, "Running variability analysis in parallel");
        let pool = build_pool(processes).map_err(FluxError::ThreadPool)?;
        pool.install(|| {
            reactions
                .par_iter()
                .map(|rxn| reaction_range(&problem, rxn, solver))
                .collect()
        })
    } else {
        reactions
            .iter()
            .map(|rxn| reaction_range(&problem, rxn, solver))
            .collect()
    };

    let substituted_ranges = ranges.iter().filter(|range| range.is_none()).count();
    let fluxes: FluxVector = reactions
        .iter()
        .map(|rxn| rxn.id.clone())
        .zip(ranges.into_iter().map(|range| {
            range.unwrap_or(Flux::Range {
                minimum: 0.,
                maximum: 0.,
            })
        }))
        .collect();
    Ok(SolveOutcome::Optimal(FluxSolution {
        objective_value: optimum,
        fluxes,
        substituted_ranges,
    }))
}

/// `None` when either extreme can't be found
fn reaction_range(base: &Problem, rxn: &Reaction, solver: &dyn Solver) -> Option<Flux> {
    let mut problem = base.clone();
    let mut extreme = |sense: ObjectiveSense| -> Result<Option<f64>, FluxError> {
        set_net_objective(&mut problem, rxn, 1., sense)?;
        Ok(solve_problem(&problem, solver)?.map(|solution| net_flux(&solution, rxn)))
    };
    match (extreme(ObjectiveSense::Minimize), extreme(ObjectiveSense::Maximize)) {
        (Ok(Some(minimum)), Ok(Some(maximum))) => Some(Flux::Range { minimum, maximum }),
        (min, max) => {
            warn!(
                reaction = %rxn.id,
                minimum = ?min,
                maximum = ?max,
                "Unable to find flux range, using [0, 0]"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flux_analysis::test_support::toy_model;
    use crate::optimize::solvers::clarabel::ClarabelSolver;

    fn range(fluxes: &FluxVector, id: &str) -> (f64, f64) {
        (fluxes[id].lower(), fluxes[id].upper())
    }

    #[test]
    fn ranges_at_optimum() {
        let model = toy_model();
        let solution = fva(
            &model,
            "BIOMASS",
            ObjectiveSense::Maximize,
            1.0,
            &ClarabelSolver::new(),
            1,
        )
        .unwrap()
        .optimal()
        .unwrap();
        assert!((solution.objective_value - 20.).abs() < 1e-5);
        let (min, max) = range(&solution.fluxes, "PYK");
        // Glucose can go through PYK or the bypass
        assert!(min.abs() < 1e-4);
        assert!((max - 10.).abs() < 1e-4);
        let (min, max) = range(&solution.fluxes, "HEX");
        assert!((min - 10.).abs() < 1e-4);
        assert!((max - 10.).abs() < 1e-4);
        assert!(solution.fluxes.values().all(|f| f.is_range()));
        assert_eq!(solution.substituted_ranges, 0);
    }

    #[test]
    fn fraction_widens_ranges() {
        let model = toy_model();
        let solution = fva(
            &model,
            "BIOMASS",
            ObjectiveSense::Maximize,
            0.5,
            &ClarabelSolver::new(),
            1,
        )
        .unwrap()
        .optimal()
        .unwrap();
        let (min, max) = range(&solution.fluxes, "BIOMASS");
        assert!((min - 10.).abs() < 1e-4);
        assert!((max - 20.).abs() < 1e-4);
        let (min, max) = range(&solution.fluxes, "PROD");
        assert!(min.abs() < 1e-4);
        assert!((max - 10.).abs() < 1e-4);
    }

    #[test]
    fn parallel_matches_serial() {
        let model = toy_model();
        let solver = ClarabelSolver::new();
        let serial = fva(&model, "BIOMASS", ObjectiveSense::Maximize, 0.9, &solver, 1)
            .unwrap()
            .optimal()
            .unwrap();
        let parallel = fva(&model, "BIOMASS", ObjectiveSense::Maximize, 0.9, &solver, 3)
            .unwrap()
            .optimal()
            .unwrap();
        assert_eq!(
            serial.fluxes.keys().collect::<Vec<_>>(),
            parallel.fluxes.keys().collect::<Vec<_>>()
        );
        for (id, flux) in &serial.fluxes {
            assert!((flux.lower() - parallel.fluxes[id].lower()).abs() < 1e-5);
            assert!((flux.upper() - parallel.fluxes[id].upper()).abs() < 1e-5);
        }
    }

    #[test]
    fn nested_in_outer_pool() {
        let model = toy_model();
        let solver = ClarabelSolver::new();
        let serial = fva(&model, "BIOMASS", ObjectiveSense::Maximize, 0.9, &solver, 1)
            .unwrap()
            .optimal()
            .unwrap();
        let outer = build_pool(2).unwrap();
        let nested = outer.install(|| {
            assert!(rayon::current_thread_index().is_some());
            fva(&model, "BIOMASS", ObjectiveSense::Maximize, 0.9, &solver, 4)
        });
        let nested = nested.unwrap().optimal().unwrap();
        for (id, flux) in &serial.fluxes {
            assert!((flux.lower() - nested.fluxes[id].lower()).abs() < 1e-5);
            assert!((flux.upper() - nested.fluxes[id].upper()).abs() < 1e-5);
        }
    }
}
