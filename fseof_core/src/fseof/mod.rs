//! Flux Scanning with Enforced Objective Flux
//!
//! The target reaction is pinned to a series of increasing flux levels, the network is
//! re-optimized for growth at each, and every reaction is classified by how its flux
//! responds. [`run_fseof`] ties the stages together:
//! [`levels`] → [`scanner`] → [`matrix`] → [`classify`] → [`report`].
use std::path::Path;

use derive_builder::Builder;
use indexmap::IndexSet;
use thiserror::Error;
use tracing::info;

use crate::flux_analysis::{FluxError, FluxModel, SolveMode};
use crate::io::json::JsonError;
use crate::metabolic_model::model::Model;

pub mod classify;
pub mod levels;
pub mod matrix;
pub mod report;
pub mod scanner;
pub mod summary;
#[cfg(test)]
pub(crate) mod testing;

use classify::{classify, filter_candidates, CandidateFilter, ClassificationStrategy};
use levels::{generate_levels, theoretical_maximum};
use matrix::{ScanMatrix, WeightPolicy};
use report::{Report, ReportInputs};
use scanner::growth_cap;
use summary::RunSummary;

/// Default number of levels for the threshold strategy
pub const THRESHOLD_STEPS: usize = 10;
/// Default number of levels for the slope strategy
pub const SLOPE_STEPS: usize = 30;

#[derive(Error, Debug)]
pub enum FseofError {
    #[error("Unable to load model: {0}")]
    ModelLoad(#[from] JsonError),
    #[error("Reaction {0} is not in the model")]
    UnknownReaction(String),
    #[error("No feasible baseline when optimizing {reaction}: {reason}")]
    InfeasibleBaseline { reaction: String, reason: String },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Flux(#[from] FluxError),
    #[error("Unable to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Unable to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Settings of one scan
#[derive(Builder, Clone, Debug, PartialEq)]
#[builder(setter(into))]
pub struct FseofConfig {
    /// Reaction whose flux is enforced
    pub target: String,
    /// Growth reaction, maximized at every level
    pub biomass: String,
    /// Number of levels, defaults to [`THRESHOLD_STEPS`] or [`SLOPE_STEPS`] by strategy
    #[builder(default)]
    pub steps: Option<usize>,
    /// Fraction of the theoretical maximum reached by the last level
    #[builder(default = "0.9")]
    pub enforced_fraction: f64,
    #[builder(default = "SolveMode::Parsimonious")]
    pub mode: SolveMode,
    #[builder(default)]
    pub strategy: ClassificationStrategy,
    /// Cap growth at this fraction of its unconstrained optimum during the scan
    #[builder(default)]
    pub growth_cap: Option<f64>,
    #[builder(default)]
    pub exclusions: IndexSet<String>,
    #[builder(default)]
    pub weights: WeightPolicy,
    /// Trajectories within epsilon of zero everywhere are dropped
    #[builder(default = "1e-5")]
    pub epsilon: f64,
    /// Decimal places kept in trajectories
    #[builder(default = "5")]
    pub precision: u32,
    #[builder(default = "vec![\"EX_\".to_string()]")]
    pub boundary_prefixes: Vec<String>,
    #[builder(default)]
    pub drop_non_monotonic: bool,
    #[builder(default = "1")]
    pub processes: usize,
}

impl FseofConfig {
    /// Number of levels to scan
    pub fn steps(&self) -> usize {
        self.steps.unwrap_or(match self.strategy {
            ClassificationStrategy::Threshold { .. } => THRESHOLD_STEPS,
            ClassificationStrategy::Slope => SLOPE_STEPS,
        })
    }

    fn validate<M: FluxModel>(&self, model: &M) -> Result<(), FseofError> {
        for id in [&self.target, &self.biomass] {
            if !model.contains_reaction(id) {
                return Err(FseofError::UnknownReaction(id.clone()));
            }
        }
        if self.target == self.biomass {
            return Err(FseofError::InvalidParameter(format!(
                "target and growth reaction must differ, both are {}",
                self.target
            )));
        }
        if let Some(fraction) = self.growth_cap {
            if !(fraction > 0. && fraction <= 1.) {
                return Err(FseofError::InvalidParameter(format!(
                    "growth cap fraction must be in (0, 1], got {}",
                    fraction
                )));
            }
        }
        if let SolveMode::Variability {
            fraction_of_optimum,
        } = self.mode
        {
            if !(0. ..=1.).contains(&fraction_of_optimum) {
                return Err(FseofError::InvalidParameter(format!(
                    "fraction of optimum must be in [0, 1], got {}",
                    fraction_of_optimum
                )));
            }
        }
        if !(self.epsilon >= 0.) {
            return Err(FseofError::InvalidParameter(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FseofResult {
    pub report: Report,
    pub summary: RunSummary,
    /// Enforced target fluxes
    pub levels: Vec<f64>,
    /// Theoretical maximum flux of the target
    pub maximum: f64,
    pub matrix: ScanMatrix,
}

/// Read a COBRA JSON network to scan
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model, FseofError> {
    let model = Model::read_json(path.as_ref())?;
    info!(
        model = %path.as_ref().display(),
        reactions = model.reactions.len(),
        metabolites = model.metabolites.len(),
        "Loaded model"
    );
    Ok(model)
}

/// Scan `config.target` and classify every reaction of `model`
///
/// The model's bounds are the same on return as on entry.
pub fn run_fseof<M>(model: &mut M, config: &FseofConfig) -> Result<FseofResult, FseofError>
where
    M: FluxModel + Clone + Send + Sync,
{
    config.validate(model)?;
    let target = config.target.as_str();
    let biomass = config.biomass.as_str();
    info!(reaction = target, biomass, strategy = %config.strategy, "Starting scan");

    let maximum = theoretical_maximum(model, target, config.mode, config.epsilon)?;
    let levels = generate_levels(maximum, config.enforced_fraction, config.steps())?;
    let cap = config
        .growth_cap
        .map(|fraction| growth_cap(model, biomass, fraction))
        .transpose()?;

    let scan = scanner::scan(
        model,
        &levels,
        target,
        biomass,
        cap,
        config.mode,
        config.processes,
    )?;
    let (matrix, matrix_stats) = matrix::build(
        &scan,
        model,
        &config.exclusions,
        &config.weights,
        config.epsilon,
        config.precision,
    )?;

    let candidates = classify(&matrix, config.strategy);
    let filter = CandidateFilter {
        boundary_prefixes: config.boundary_prefixes.clone(),
        drop_non_monotonic: config.drop_non_monotonic,
    };
    let (candidates, filter_stats) = filter_candidates(candidates, &matrix, &filter);
    info!(
        kept = candidates.len(),
        boundary = filter_stats.boundary,
        self_balancing = filter_stats.self_balancing,
        non_monotonic = filter_stats.non_monotonic,
        "Filtered candidates"
    );

    let inputs = ReportInputs {
        target,
        biomass,
        levels: &levels,
        strategy: config.strategy,
        processes: config.processes,
    };
    let (report, solver_errors) = report::assemble(&candidates, &matrix, model, &inputs)?;
    let summary = RunSummary::new(&scan, &matrix_stats, &filter_stats, &candidates, solver_errors);
    info!(
        up = summary.upregulated,
        down = summary.downregulated,
        knockout = summary.knockout,
        "Scan finished"
    );
    Ok(FseofResult {
        report,
        summary,
        levels,
        maximum,
        matrix,
    })
}
