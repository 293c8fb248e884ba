//! Ranked report of up, down and knockout targets
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::flux_analysis::{
    solve_with_overrides, BoundOverride, FluxError, FluxModel, SolveMode,
};
use crate::fseof::classify::{
    Candidate, ClassificationStrategy, ReactionClass, TargetCategory, TrendClass,
};
use crate::fseof::matrix::ScanMatrix;
use crate::fseof::FseofError;
use crate::optimize::objective::ObjectiveSense;
use crate::utils::parallel::build_pool;

pub const UP: &str = "up";
pub const DOWN: &str = "down";
pub const KNOCKOUT: &str = "knockout";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    pub reaction_id: String,
    pub score: f64,
    /// Weighted trajectory
    pub fluxes: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bounds: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q_slope_classifier: Option<TrendClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_sol: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_sol_classifier: Option<TrendClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_class: Option<ReactionClass>,
    /// Equation text
    pub reaction: String,
    pub compartments: Vec<String>,
    pub genes: Vec<String>,
    /// Best growth with the reaction knocked out (down targets only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biomass: Option<f64>,
}

pub type ReportSection = Vec<ReportRow>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub target: String,
    pub biomass: String,
    pub levels: Vec<f64>,
    pub strategy: String,
    pub sections: IndexMap<String, ReportSection>,
}

/// Run-level values the report is labelled with
#[derive(Clone, Copy, Debug)]
pub struct ReportInputs<'a> {
    pub target: &'a str,
    pub biomass: &'a str,
    pub levels: &'a [f64],
    pub strategy: ClassificationStrategy,
    pub processes: usize,
}

/// Build the report for `candidates`
///
/// Returns the report and the number of knockout growth solves that errored (their
/// growth is reported as 0).
pub fn assemble<M>(
    candidates: &[Candidate],
    matrix: &ScanMatrix,
    model: &mut M,
    inputs: &ReportInputs<'_>,
) -> Result<(Report, usize), FseofError>
where
    M: FluxModel + Clone + Send + Sync,
{
    let mut sections: IndexMap<String, ReportSection> = IndexMap::new();
    sections.insert(UP.to_string(), Vec::new());
    sections.insert(DOWN.to_string(), Vec::new());
    if let ClassificationStrategy::Threshold { .. } = inputs.strategy {
        sections.insert(KNOCKOUT.to_string(), Vec::new());
    }

    let down_ids: Vec<&str> = candidates
        .iter()
        .filter(|c| c.category == TargetCategory::Downregulated)
        .map(|c| c.reaction_id.as_str())
        .collect();
    info!(candidates = down_ids.len(), "Computing knockout growth of down targets");
    let growth = knockout_growth_all(model, &down_ids, inputs.biomass, inputs.processes)?;
    let mut solver_errors = 0;
    let mut growth_by_id: IndexMap<&str, f64> = IndexMap::new();
    for (id, outcome) in down_ids.iter().copied().zip(growth) {
        let value = match outcome {
            Ok(Some(value)) => value,
            Ok(None) => {
                warn!(reaction = %id, "Knockout is infeasible, reporting growth 0");
                0.
            }
            Err(err) => {
                warn!(reaction = %id, error = %err, "Knockout solve failed, reporting growth 0");
                solver_errors += 1;
                0.
            }
        };
        growth_by_id.insert(id, value);
    }

    for candidate in candidates {
        let section = match candidate.category {
            TargetCategory::Upregulated => UP,
            TargetCategory::Downregulated => DOWN,
            TargetCategory::Knockout => KNOCKOUT,
            TargetCategory::Unclassified => continue,
        };
        let Some(row) = matrix.get(&candidate.reaction_id) else {
            continue;
        };
        let slope = candidate.slope.as_ref();
        let report_row = ReportRow {
            reaction_id: candidate.reaction_id.clone(),
            score: candidate.score,
            fluxes: row.trajectory.values.clone(),
            lower_bounds: row.trajectory.lower_bounds.clone(),
            q_slope_classifier: slope.map(|s| s.q_slope_classifier),
            l_sol: slope.and_then(|s| s.l_sol),
            l_sol_classifier: slope.and_then(|s| s.l_sol_classifier),
            reaction_class: slope.map(|s| s.reaction_class),
            reaction: row.meta.equation.clone(),
            compartments: row.meta.compartments.clone(),
            genes: row.meta.genes.clone(),
            biomass: growth_by_id.get(candidate.reaction_id.as_str()).copied(),
        };
        sections
            .entry(section.to_string())
            .or_default()
            .push(report_row);
    }
    for rows in sections.values_mut() {
        rows.sort_by(|a, b| b.score.abs().total_cmp(&a.score.abs()));
    }

    let report = Report {
        target: inputs.target.to_string(),
        biomass: inputs.biomass.to_string(),
        levels: inputs.levels.to_vec(),
        strategy: inputs.strategy.to_string(),
        sections,
    };
    Ok((report, solver_errors))
}

fn knockout_growth_all<M>(
    model: &mut M,
    reactions: &[&str],
    biomass: &str,
    processes: usize,
) -> Result<Vec<Result<Option<f64>, FluxError>>, FseofError>
where
    M: FluxModel + Clone + Send + Sync,
{
    if processes > 1 && reactions.len() > 1 {
        let pool =
            build_pool(processes).map_err(|e| FseofError::Flux(FluxError::ThreadPool(e)))?;
        let template: &M = model;
        Ok(pool.install(|| {
            reactions
                .par_iter()
                .map(|id| knockout_growth(&mut template.clone(), id, biomass))
                .collect()
        }))
    } else {
        Ok(reactions
            .iter()
            .map(|id| knockout_growth(model, id, biomass))
            .collect())
    }
}

/// Best growth with `reaction` pinned to zero, `None` if infeasible
fn knockout_growth<M: FluxModel>(
    model: &mut M,
    reaction: &str,
    biomass: &str,
) -> Result<Option<f64>, FluxError> {
    let outcome = solve_with_overrides(
        model,
        &[BoundOverride::pin(reaction, 0.)],
        biomass,
        ObjectiveSense::Maximize,
        SolveMode::Fba,
    )?;
    Ok(outcome.optimal().map(|solution| solution.objective_value))
}

// region Writers
fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FseofError + '_ {
    move |source| FseofError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn optional<T: ToString>(item: Option<T>) -> String {
    item.map(|i| i.to_string()).unwrap_or_default()
}

impl Report {
    /// Write the whole report as pretty printed JSON
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), FseofError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(io_error(path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer).map_err(io_error(path))?;
        writer.flush().map_err(io_error(path))?;
        Ok(())
    }

    /// Write one `<stem>_<section>.tsv` file per section into `dir`
    pub fn write_tsv<P: AsRef<Path>>(&self, dir: P, stem: &str) -> Result<Vec<PathBuf>, FseofError> {
        let mut written = Vec::with_capacity(self.sections.len());
        for (name, rows) in &self.sections {
            let path = dir.as_ref().join(format!("{}_{}.tsv", stem, name));
            let file = File::create(&path).map_err(io_error(&path))?;
            let mut w = BufWriter::new(file);
            writeln!(
                w,
                "reaction_id\tscore\tfluxes\tlower_bounds\tq_slope_classifier\tl_sol\tl_sol_classifier\treaction_class\treaction\tcompartments\tgenes\tbiomass"
            )
            .map_err(io_error(&path))?;
            for row in rows {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                    row.reaction_id,
                    row.score,
                    join(&row.fluxes),
                    row.lower_bounds.as_deref().map(join).unwrap_or_default(),
                    optional(row.q_slope_classifier.map(|t| format!("{:?}", t))),
                    optional(row.l_sol),
                    optional(row.l_sol_classifier.map(|t| format!("{:?}", t))),
                    optional(row.reaction_class.map(|c| format!("{:?}", c))),
                    row.reaction,
                    join(&row.compartments),
                    join(&row.genes),
                    optional(row.biomass),
                )
                .map_err(io_error(&path))?;
            }
            w.flush().map_err(io_error(&path))?;
            written.push(path);
        }
        Ok(written)
    }
}
// endregion Writers
