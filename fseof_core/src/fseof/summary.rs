//! Counts describing how a scan went
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::fseof::classify::{Candidate, FilterStats, TargetCategory};
use crate::fseof::matrix::MatrixStats;
use crate::fseof::scanner::{LevelOutcome, ScanResults};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub levels: usize,
    pub levels_solved: usize,
    /// 1-based indices of infeasible levels
    pub infeasible_levels: Vec<usize>,
    /// 1-based indices of levels where the solver errored
    pub failed_levels: Vec<usize>,
    /// Solver errors absorbed by the knockout growth check
    pub solver_errors: usize,
    /// Variability ranges set to `[0, 0]` after a failed solve, over all levels
    pub substituted_ranges: usize,
    pub dropped_near_zero: usize,
    pub excluded: usize,
    pub reweighted: usize,
    pub filtered_boundary: usize,
    pub filtered_self_balancing: usize,
    pub filtered_non_monotonic: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub knockout: usize,
}

impl RunSummary {
    pub fn new(
        scan: &ScanResults,
        matrix: &MatrixStats,
        filter: &FilterStats,
        candidates: &[Candidate],
        solver_errors: usize,
    ) -> Self {
        let mut summary = RunSummary {
            levels: scan.len(),
            solver_errors,
            dropped_near_zero: matrix.dropped_near_zero,
            excluded: matrix.excluded,
            reweighted: matrix.reweighted,
            filtered_boundary: filter.boundary,
            filtered_self_balancing: filter.self_balancing,
            filtered_non_monotonic: filter.non_monotonic,
            ..Default::default()
        };
        for (index, result) in scan.iter().enumerate() {
            summary.substituted_ranges += result.substituted_ranges;
            match result.outcome {
                LevelOutcome::Solved(_) => summary.levels_solved += 1,
                LevelOutcome::Infeasible => summary.infeasible_levels.push(index + 1),
                LevelOutcome::Failed(_) => summary.failed_levels.push(index + 1),
            }
        }
        for candidate in candidates {
            match candidate.category {
                TargetCategory::Upregulated => summary.upregulated += 1,
                TargetCategory::Downregulated => summary.downregulated += 1,
                TargetCategory::Knockout => summary.knockout += 1,
                TargetCategory::Unclassified => {}
            }
        }
        summary
    }

    /// Every solver error, at levels, in variability ranges and in the knockout check
    pub fn total_solver_errors(&self) -> usize {
        self.failed_levels.len() + self.substituted_ranges + self.solver_errors
    }
}

fn indices(levels: &[usize]) -> String {
    if levels.is_empty() {
        return "none".to_string();
    }
    levels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "levels solved: {}/{}", self.levels_solved, self.levels)?;
        writeln!(f, "infeasible levels: {}", indices(&self.infeasible_levels))?;
        writeln!(f, "failed levels: {}", indices(&self.failed_levels))?;
        writeln!(f, "solver errors: {}", self.total_solver_errors())?;
        writeln!(f, "substituted flux ranges: {}", self.substituted_ranges)?;
        writeln!(
            f,
            "rows dropped near zero: {}, excluded: {}, reweighted: {}",
            self.dropped_near_zero, self.excluded, self.reweighted
        )?;
        writeln!(
            f,
            "candidates filtered as boundary: {}, self-balancing: {}, non-monotonic: {}",
            self.filtered_boundary, self.filtered_self_balancing, self.filtered_non_monotonic
        )?;
        write!(
            f,
            "up: {}, down: {}, knockout: {}",
            self.upregulated, self.downregulated, self.knockout
        )
    }
}
