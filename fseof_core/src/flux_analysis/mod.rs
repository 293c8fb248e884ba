//! Flux balance analysis on top of the [`optimize`](crate::optimize) layer
//!
//! The [`FluxModel`] trait is the seam between analyses (such as FSEOF scanning) and the
//! network/solver pair doing the work. [`Model`] implements it with the Clarabel backend.
use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::configuration;
use crate::metabolic_model::model::Model;
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::ProblemError;
use crate::optimize::solvers::clarabel::ClarabelSolver;
use crate::optimize::solvers::SolverError;
use crate::optimize::OptimizationStatus;

pub mod bounds;
pub mod fba;
pub(crate) mod formulation;
pub mod fva;
pub mod pfba;

pub use bounds::{solve_with_overrides, BoundOverride, BoundsGuard};

/// How a flux distribution is computed
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SolveMode {
    /// Plain flux balance analysis
    Fba,
    /// Parsimonious FBA, minimizing total flux at the optimum
    Parsimonious,
    /// Flux variability analysis, every reaction's range at a fraction of the optimum
    Variability { fraction_of_optimum: f64 },
}

impl SolveMode {
    /// Variability analysis at the optimum itself
    pub fn variability() -> Self {
        SolveMode::Variability {
            fraction_of_optimum: 1.0,
        }
    }
}

/// Flux of a single reaction
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Flux {
    Point(f64),
    Range { minimum: f64, maximum: f64 },
}

impl Flux {
    /// Representative value, the midpoint for ranges
    pub fn value(&self) -> f64 {
        match self {
            Flux::Point(v) => *v,
            Flux::Range { minimum, maximum } => (minimum + maximum) / 2.,
        }
    }

    /// Lowest value, the point itself for point fluxes
    pub fn lower(&self) -> f64 {
        match self {
            Flux::Point(v) => *v,
            Flux::Range { minimum, .. } => *minimum,
        }
    }

    /// Highest value, the point itself for point fluxes
    pub fn upper(&self) -> f64 {
        match self {
            Flux::Point(v) => *v,
            Flux::Range { maximum, .. } => *maximum,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Flux::Range { .. })
    }
}

/// Reaction id to flux, in model order
pub type FluxVector = IndexMap<String, Flux>;

/// An optimal flux distribution
#[derive(Clone, Debug, PartialEq)]
pub struct FluxSolution {
    /// Net flux through the objective reaction at the optimum
    pub objective_value: f64,
    pub fluxes: FluxVector,
    /// Reactions whose range could not be solved and was reported as `[0, 0]`
    pub substituted_ranges: usize,
}

/// Result of a solve which did not error
#[derive(Clone, Debug, PartialEq)]
pub enum SolveOutcome {
    Optimal(FluxSolution),
    Infeasible,
}

impl SolveOutcome {
    pub fn optimal(self) -> Option<FluxSolution> {
        match self {
            SolveOutcome::Optimal(solution) => Some(solution),
            SolveOutcome::Infeasible => None,
        }
    }
}

/// Descriptive data about a reaction, used for reports and filters
#[derive(Clone, Debug, PartialEq)]
pub struct ReactionMeta {
    pub id: String,
    /// Equation text, e.g. `g6p_c --> 2 pyr_c`
    pub equation: String,
    pub genes: Vec<String>,
    pub compartments: Vec<String>,
    /// Compounds (metabolite ids without the compartment suffix) consumed
    pub reactant_compounds: BTreeSet<String>,
    /// Compounds produced
    pub product_compounds: BTreeSet<String>,
}

impl ReactionMeta {
    /// Whether both sides hold the same compounds, as for transport reactions
    pub fn is_self_balancing(&self) -> bool {
        !self.reactant_compounds.is_empty() && self.reactant_compounds == self.product_compounds
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FluxError {
    #[error("Reaction {0} is not in the model")]
    UnknownReaction(String),
    #[error("Invalid bounds for {id}: lower bound {lb} is greater than upper bound {ub}")]
    InvalidBounds { id: String, lb: f64, ub: f64 },
    #[error("Solver failed: {0}")]
    Solver(#[from] SolverError),
    #[error("Unable to formulate problem: {0}")]
    Problem(#[from] ProblemError),
    #[error("Solver stopped without an optimum ({0:?})")]
    Unsolved(OptimizationStatus),
    #[error("Unable to start worker threads: {0}")]
    ThreadPool(String),
}

/// A metabolic network which can be constrained and solved
pub trait FluxModel {
    /// Ids of every reaction, in model order
    fn reaction_ids(&self) -> Vec<String>;

    fn contains_reaction(&self, id: &str) -> bool {
        self.reaction_ids().iter().any(|r| r == id)
    }

    fn reaction_meta(&self, id: &str) -> Result<ReactionMeta, FluxError>;

    /// Current `(lower, upper)` bounds of a reaction
    fn bounds(&self, id: &str) -> Result<(f64, f64), FluxError>;

    fn set_bounds(&mut self, id: &str, lower_bound: f64, upper_bound: f64)
        -> Result<(), FluxError>;

    /// Optimize the net flux through `objective` under the current bounds
    fn solve(
        &self,
        objective: &str,
        sense: ObjectiveSense,
        mode: SolveMode,
    ) -> Result<SolveOutcome, FluxError>;

    /// Apply bound overrides which are undone when the returned guard drops
    fn override_bounds(
        &mut self,
        overrides: &[BoundOverride],
    ) -> Result<BoundsGuard<'_, Self>, FluxError>
    where
        Self: Sized,
    {
        BoundsGuard::new(self, overrides)
    }
}

impl FluxModel for Model {
    fn reaction_ids(&self) -> Vec<String> {
        self.reactions.keys().cloned().collect()
    }

    fn contains_reaction(&self, id: &str) -> bool {
        self.reactions.contains_key(id)
    }

    fn reaction_meta(&self, id: &str) -> Result<ReactionMeta, FluxError> {
        let reaction = self
            .get_reaction(id)
            .ok_or_else(|| FluxError::UnknownReaction(id.to_string()))?;
        let (reactant_compounds, product_compounds) = reaction.compound_sets();
        Ok(ReactionMeta {
            id: reaction.id.clone(),
            equation: reaction.build_reaction_string(),
            genes: self.reaction_genes(reaction),
            compartments: self.reaction_compartments(reaction),
            reactant_compounds,
            product_compounds,
        })
    }

    fn bounds(&self, id: &str) -> Result<(f64, f64), FluxError> {
        self.get_reaction(id)
            .map(|r| (r.lower_bound, r.upper_bound))
            .ok_or_else(|| FluxError::UnknownReaction(id.to_string()))
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
            .get_reaction_mut(id)
            .ok_or_else(|| FluxError::UnknownReaction(id.to_string()))?;
        reaction.lower_bound = lower_bound;
        reaction.upper_bound = upper_bound;
        Ok(())
    }

    fn solve(
        &self,
        objective: &str,
        sense: ObjectiveSense,
        mode: SolveMode,
    ) -> Result<SolveOutcome, FluxError> {
        let config = configuration::current();
        let solver = ClarabelSolver::new().with_time_limit(config.time_limit);
        match mode {
            SolveMode::Fba => fba::fba(self, objective, sense, &solver),
            SolveMode::Parsimonious => pfba::pfba(self, objective, sense, &solver),
            SolveMode::Variability {
                fraction_of_optimum,
            } => fva::fva(
                self,
                objective,
                sense,
                fraction_of_optimum,
                &solver,
                config.processes as usize,
            ),
        }
    }
}
