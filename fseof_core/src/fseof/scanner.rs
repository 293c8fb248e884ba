//! Solving the network once per enforced target level
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::flux_analysis::{
    solve_with_overrides, BoundOverride, FluxError, FluxModel, FluxVector, SolveMode,
    SolveOutcome,
};
use crate::fseof::FseofError;
use crate::optimize::objective::ObjectiveSense;
use crate::utils::parallel::build_pool;

/// What happened at one enforced level
#[derive(Clone, Debug, PartialEq)]
pub enum LevelOutcome {
    Solved(FluxVector),
    Infeasible,
    /// The solver errored, holds the error message
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct LevelResult {
    pub level: f64,
    pub outcome: LevelOutcome,
    /// Variability ranges that failed to solve and were set to `[0, 0]`
    pub substituted_ranges: usize,
}

/// One result per level, in level order
pub type ScanResults = Vec<LevelResult>;

/// Upper bound for the growth reaction, `fraction` of its unconstrained optimum
pub fn growth_cap<M: FluxModel>(
    model: &M,
    biomass: &str,
    fraction: f64,
) -> Result<f64, FseofError> {
    let baseline_error = |reason: String| FseofError::InfeasibleBaseline {
        reaction: biomass.to_string(),
        reason,
    };
    match model.solve(biomass, ObjectiveSense::Maximize, SolveMode::Fba) {
        Ok(SolveOutcome::Optimal(solution)) => {
            let cap = fraction * solution.objective_value.max(0.);
            info!(reaction = biomass, cap, "Capping growth");
            Ok(cap)
        }
        Ok(SolveOutcome::Infeasible) => Err(baseline_error("network is infeasible".to_string())),
        Err(err) => Err(baseline_error(err.to_string())),
    }
}

/// Pin `target` to each level in turn and maximize `objective`
///
/// Infeasible and failed levels are recorded, not returned as errors. Bounds changes are
/// undone after every level. With `processes > 1` levels are solved in parallel, each on
/// its own clone of the model.
pub fn scan<M>(
    model: &mut M,
    levels: &[f64],
    target: &str,
    objective: &str,
    growth_cap: Option<f64>,
    mode: SolveMode,
    processes: usize,
) -> Result<ScanResults, FseofError>
where
    M: FluxModel + Clone + Send + Sync,
{
    for id in [target, objective] {
        if !model.contains_reaction(id) {
            return Err(FseofError::UnknownReaction(id.to_string()));
        }
    }
    info!(levels = levels.len(), processes, "Scanning enforced levels");
    if processes > 1 {
        let pool =
            build_pool(processes).map_err(|e| FseofError::Flux(FluxError::ThreadPool(e)))?;
        let template: &M = model;
        Ok(pool.install(|| {
            levels
                .par_iter()
                .enumerate()
                .map(|(index, level)| {
                    let mut local = template.clone();
                    solve_level(&mut local, index, *level, target, objective, growth_cap, mode)
                })
                .collect()
        }))
    } else {
        Ok(levels
            .iter()
            .enumerate()
            .map(|(index, level)| {
                solve_level(model, index, *level, target, objective, growth_cap, mode)
            })
            .collect())
    }
}

fn solve_level<M: FluxModel>(
    model: &mut M,
    index: usize,
    level: f64,
    target: &str,
    objective: &str,
    growth_cap: Option<f64>,
    mode: SolveMode,
) -> LevelResult {
    let mut overrides = vec![BoundOverride::pin(target, level)];
    if let Some(cap) = growth_cap {
        overrides.push(BoundOverride::new(objective, 0., cap));
    }
    let mut substituted_ranges = 0;
    let outcome = match solve_with_overrides(
        model,
        &overrides,
        objective,
        ObjectiveSense::Maximize,
        mode,
    ) {
        Ok(SolveOutcome::Optimal(solution)) => {
            debug!(
                level = index + 1,
                flux = level,
                objective = solution.objective_value,
                "Solved level"
            );
            if solution.substituted_ranges > 0 {
                warn!(
                    level = index + 1,
                    reactions = solution.substituted_ranges,
                    "Flux ranges replaced by [0, 0]"
                );
            }
            substituted_ranges = solution.substituted_ranges;
            LevelOutcome::Solved(solution.fluxes)
        }
        Ok(SolveOutcome::Infeasible) => {
            warn!(level = index + 1, flux = level, "Level is infeasible");
            LevelOutcome::Infeasible
        }
        Err(err) => {
            warn!(level = index + 1, flux = level, error = %err, "Level failed");
            LevelOutcome::Failed(err.to_string())
        }
    };
    LevelResult {
        level,
        outcome,
        substituted_ranges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flux_analysis::test_support::toy_model;
    use crate::fseof::testing::ScriptedModel;

    #[test]
    fn toy_scan_trades_growth_for_product() {
        let mut model = toy_model();
        let levels = vec![5., 10., 15.];
        let results = scan(
            &mut model,
            &levels,
            "EX_prod",
            "BIOMASS",
            None,
            SolveMode::Parsimonious,
            1,
        )
        .unwrap();
        assert_eq!(results.len(), 3);
        for result in &results {
            match &result.outcome {
                LevelOutcome::Solved(fluxes) => {
                    assert!((fluxes["EX_prod"].value() - result.level).abs() < 1e-4);
                    assert!((fluxes["BIOMASS"].value() - (20. - result.level)).abs() < 1e-4);
                }
                other => panic!("Unexpected outcome {:?}", other),
            }
        }
        assert_eq!(model.bounds("EX_prod").unwrap(), (0., 1000.));
    }

    #[test]
    fn growth_cap_limits_biomass() {
        let mut model = toy_model();
        let cap = growth_cap(&model, "BIOMASS", 0.5).unwrap();
        assert!((cap - 10.).abs() < 1e-4);
        let results = scan(
            &mut model,
            &[2.],
            "EX_prod",
            "BIOMASS",
            Some(cap),
            SolveMode::Fba,
            1,
        )
        .unwrap();
        match &results[0].outcome {
            LevelOutcome::Solved(fluxes) => assert!(fluxes["BIOMASS"].value() <= 10. + 1e-4),
            other => panic!("Unexpected outcome {:?}", other),
        }
        assert_eq!(model.bounds("BIOMASS").unwrap(), (0., 1000.));
    }

    #[test]
    fn unknown_ids_are_fatal() {
        let mut model = toy_model();
        assert!(matches!(
            scan(&mut model, &[1.], "NOPE", "BIOMASS", None, SolveMode::Fba, 1),
            Err(FseofError::UnknownReaction(id)) if id == "NOPE"
        ));
        assert!(matches!(
            scan(&mut model, &[1.], "EX_prod", "GROWTH", None, SolveMode::Fba, 1),
            Err(FseofError::UnknownReaction(id)) if id == "GROWTH"
        ));
    }

    #[test]
    fn infeasible_and_failed_levels_are_recorded() {
        let mut model = ScriptedModel::linear(10)
            .with_infeasible_level(6)
            .with_failing_level(8);
        let levels: Vec<f64> = (1..=10).map(f64::from).collect();
        let results = scan(
            &mut model,
            &levels,
            ScriptedModel::TARGET,
            ScriptedModel::BIOMASS,
            None,
            SolveMode::Fba,
            1,
        )
        .unwrap();
        assert_eq!(results.len(), 10);
        assert_eq!(results[5].outcome, LevelOutcome::Infeasible);
        assert!(matches!(results[7].outcome, LevelOutcome::Failed(_)));
        assert!(matches!(results[6].outcome, LevelOutcome::Solved(_)));
        assert!(model.bounds_are_original());
    }

    #[test]
    fn parallel_scan_keeps_level_order() {
        let mut model = ScriptedModel::linear(10).with_infeasible_level(3);
        let levels: Vec<f64> = (1..=10).map(f64::from).collect();
        let serial = scan(
            &mut model,
            &levels,
            ScriptedModel::TARGET,
            ScriptedModel::BIOMASS,
            None,
            SolveMode::Fba,
            1,
        )
        .unwrap();
        let parallel = scan(
            &mut model,
            &levels,
            ScriptedModel::TARGET,
            ScriptedModel::BIOMASS,
            None,
            SolveMode::Fba,
            4,
        )
        .unwrap();
        assert_eq!(serial, parallel);
        assert!(model.bounds_are_original());
    }
}
