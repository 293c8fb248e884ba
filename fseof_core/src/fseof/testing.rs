//! A [`FluxModel`] with scripted answers, for exercising the scan pipeline without a solver
use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;

use crate::flux_analysis::{
    Flux, FluxError, FluxModel, FluxSolution, FluxVector, ReactionMeta, SolveMode, SolveOutcome,
};
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::OptimizationStatus;

#[derive(Clone, Debug)]
struct ScriptedReaction {
    /// Value at each level
    values: Vec<f64>,
    lower_bounds: Option<Vec<f64>>,
    bounds: (f64, f64),
    original: (f64, f64),
    meta: ReactionMeta,
}

/// Levels are identified by the enforced target flux: pinning the target to `k` selects
/// level `k` (1-based), so scripted scans should use the levels `1..=steps`.
#[derive(Clone, Debug)]
pub(crate) struct ScriptedModel {
    reactions: IndexMap<String, ScriptedReaction>,
    steps: usize,
    infeasible_levels: HashSet<usize>,
    failing_levels: HashSet<usize>,
    /// Level to number of variability ranges that fail to solve
    failing_ranges: HashMap<usize, usize>,
    knockout_growth: HashMap<String, f64>,
    failing_knockouts: HashSet<String>,
    biomass_optimum: f64,
}

fn meta(id: &str, reactant: &str, product: &str, equation: &str) -> ReactionMeta {
    ReactionMeta {
        id: id.to_string(),
        equation: equation.to_string(),
        genes: vec![format!("{}_gene", id)],
        compartments: vec!["c".to_string()],
        reactant_compounds: BTreeSet::from([reactant.to_string()]),
        product_compounds: BTreeSet::from([product.to_string()]),
    }
}

impl ScriptedModel {
    pub(crate) const TARGET: &'static str = "EX_target";
    pub(crate) const BIOMASS: &'static str = "BIOMASS";

    /// Target rising `1..=steps`, growth falling `steps..=1`
    pub(crate) fn linear(steps: usize) -> Self {
        let model = Self {
            reactions: IndexMap::new(),
            steps,
            infeasible_levels: HashSet::new(),
            failing_levels: HashSet::new(),
            failing_ranges: HashMap::new(),
            knockout_growth: HashMap::new(),
            failing_knockouts: HashSet::new(),
            biomass_optimum: steps as f64 + 1.,
        };
        model
            .with_trajectory(Self::TARGET, (1..=steps).map(|k| k as f64).collect())
            .with_trajectory(
                Self::BIOMASS,
                (1..=steps).rev().map(|k| k as f64).collect(),
            )
    }

    pub(crate) fn with_trajectory(mut self, id: &str, values: Vec<f64>) -> Self {
        self.insert(id, values, meta(id, "a", "b", "a_c --> b_c"));
        self
    }

    /// A transport reaction, the same compound on both sides
    pub(crate) fn with_transport(mut self, id: &str, values: Vec<f64>) -> Self {
        self.insert(id, values, meta(id, "x", "x", "x_e --> x_c"));
        self
    }

    /// Lower ends of the ranges reported for `id` (the scripted values stay the midpoints)
    pub(crate) fn with_lower_bounds(mut self, id: &str, lower_bounds: Vec<f64>) -> Self {
        if let Some(reaction) = self.reactions.get_mut(id) {
            reaction.lower_bounds = Some(lower_bounds);
        }
        self
    }

    pub(crate) fn with_infeasible_level(mut self, level: usize) -> Self {
        self.infeasible_levels.insert(level);
        self
    }

    pub(crate) fn with_failing_level(mut self, level: usize) -> Self {
        self.failing_levels.insert(level);
        self
    }

    pub(crate) fn with_failing_ranges(mut self, level: usize, reactions: usize) -> Self {
        self.failing_ranges.insert(level, reactions);
        self
    }

    pub(crate) fn with_knockout_growth(mut self, id: &str, growth: f64) -> Self {
        self.knockout_growth.insert(id.to_string(), growth);
        self
    }

    pub(crate) fn with_failing_knockout(mut self, id: &str) -> Self {
        self.failing_knockouts.insert(id.to_string());
        self
    }

    /// Growth with no target enforced, also the growth of unscripted knockouts
    pub(crate) fn biomass_optimum(&self) -> f64 {
        self.biomass_optimum
    }

    pub(crate) fn bounds_are_original(&self) -> bool {
        self.reactions.values().all(|r| r.bounds == r.original)
    }

    /// Scripted values at a 0-based level index, in reaction order
    pub(crate) fn scripted_values(&self, index: usize) -> Vec<(String, f64)> {
        self.reactions
            .iter()
            .map(|(id, r)| (id.clone(), r.values.get(index).copied().unwrap_or(0.)))
            .collect()
    }

    fn insert(&mut self, id: &str, mut values: Vec<f64>, meta: ReactionMeta) {
        values.resize(self.steps, 0.);
        self.reactions.insert(
            id.to_string(),
            ScriptedReaction {
                values,
                lower_bounds: None,
                bounds: (0., 1000.),
                original: (0., 1000.),
                meta,
            },
        );
    }

    fn reaction(&self, id: &str) -> Result<&ScriptedReaction, FluxError> {
        self.reactions
            .get(id)
            .ok_or_else(|| FluxError::UnknownReaction(id.to_string()))
    }

    /// 1-based level selected by the current target bounds
    fn enforced_level(&self) -> Option<usize> {
        let (lb, ub) = self.reactions.get(Self::TARGET)?.bounds;
        (lb == ub && lb > 0.).then(|| lb.round() as usize)
    }

    fn knocked_out(&self) -> Option<&str> {
        self.reactions
            .iter()
            .find(|(_, r)| r.bounds == (0., 0.) && r.original != (0., 0.))
            .map(|(id, _)| id.as_str())
    }

    fn level_solution(
        &self,
        level: usize,
        objective: &str,
        mode: SolveMode,
    ) -> Result<SolveOutcome, FluxError> {
        let index = level.saturating_sub(1);
        let ranged = matches!(mode, SolveMode::Variability { .. });
        let fluxes: FluxVector = self
            .reactions
            .iter()
            .map(|(id, r)| {
                let value = r.values.get(index).copied().unwrap_or(0.);
                let flux = match (&r.lower_bounds, ranged) {
                    (Some(lower), _) => {
                        let minimum = lower.get(index).copied().unwrap_or(value);
                        Flux::Range {
                            minimum,
                            maximum: 2. * value - minimum,
                        }
                    }
                    (None, true) => Flux::Range {
                        minimum: value,
                        maximum: value,
                    },
                    (None, false) => Flux::Point(value),
                };
                (id.clone(), flux)
            })
            .collect();
        let objective_value = fluxes.get(objective).map(|f| f.value()).unwrap_or(0.);
        let substituted_ranges = if ranged {
            self.failing_ranges.get(&level).copied().unwrap_or(0)
        } else {
            0
        };
        Ok(SolveOutcome::Optimal(FluxSolution {
            objective_value,
            fluxes,
            substituted_ranges,
        }))
    }
}

fn optimum(objective_value: f64) -> SolveOutcome {
    SolveOutcome::Optimal(FluxSolution {
        objective_value,
        fluxes: FluxVector::new(),
        substituted_ranges: 0,
    })
}

impl FluxModel for ScriptedModel {
    fn reaction_ids(&self) -> Vec<String> {
        self.reactions.keys().cloned().collect()
    }

    fn reaction_meta(&self, id: &str) -> Result<ReactionMeta, FluxError> {
        Ok(self.reaction(id)?.meta.clone())
    }

    fn bounds(&self, id: &str) -> Result<(f64, f64), FluxError> {
        Ok(self.reaction(id)?.bounds)
    }

    fn set_bounds(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), FluxError> {
        if lower_bound > upper_bound {
            return Err(FluxError::InvalidBounds {
                id: id.to_string(),
                lb: lower_bound,
                ub: upper_bound,
            });
        }
        let reaction = self
            .reactions
            .get_mut(id)
            .ok_or_else(|| FluxError::UnknownReaction(id.to_string()))?;
        reaction.bounds = (lower_bound, upper_bound);
        Ok(())
    }

    fn solve(
        &self,
        objective: &str,
        sense: ObjectiveSense,
        mode: SolveMode,
    ) -> Result<SolveOutcome, FluxError> {
        self.reaction(objective)?;
        if sense == ObjectiveSense::Minimize {
            return Ok(optimum(0.));
        }
        if let Some(level) = self.enforced_level() {
            if self.infeasible_levels.contains(&level) {
                return Ok(SolveOutcome::Infeasible);
            }
            if self.failing_levels.contains(&level) {
                return Err(FluxError::Unsolved(OptimizationStatus::NumericalError));
            }
            return self.level_solution(level, objective, mode);
        }
        if let Some(id) = self.knocked_out() {
            if self.failing_knockouts.contains(id) {
                return Err(FluxError::Unsolved(OptimizationStatus::NumericalError));
            }
            let growth = self
                .knockout_growth
                .get(id)
                .copied()
                .unwrap_or(self.biomass_optimum);
            return Ok(optimum(growth));
        }
        if objective == Self::TARGET {
            Ok(optimum(self.steps as f64))
        } else {
            Ok(optimum(self.biomass_optimum))
        }
    }
}
