//! Turning per-level flux snapshots into per-reaction trajectories
use indexmap::{IndexMap, IndexSet};
use tracing::info;

use crate::flux_analysis::{FluxModel, ReactionMeta};
use crate::fseof::scanner::{LevelOutcome, ScanResults};
use crate::fseof::FseofError;

/// Fluxes of one reaction across all levels
#[derive(Clone, Debug, PartialEq)]
pub struct FluxTrajectory {
    /// Point fluxes, or range midpoints under variability analysis
    pub values: Vec<f64>,
    /// Range lower bounds, only present under variability analysis
    pub lower_bounds: Option<Vec<f64>>,
}

impl FluxTrajectory {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatrixRow {
    pub trajectory: FluxTrajectory,
    pub meta: ReactionMeta,
}

/// Retained trajectories keyed by reaction id, in order of first appearance
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanMatrix {
    rows: IndexMap<String, MatrixRow>,
}

impl ScanMatrix {
    pub fn get(&self, id: &str) -> Option<&MatrixRow> {
        self.rows.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MatrixRow)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }
}

/// Counts of rows removed or changed while building a [`ScanMatrix`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatrixStats {
    /// Rows whose every value was within epsilon of zero
    pub dropped_near_zero: usize,
    /// Rows in the exclusion set
    pub excluded: usize,
    /// Rows scaled by at least one weight group
    pub reweighted: usize,
}

/// Groups of reactions whose trajectories are scaled before classification
///
/// A reaction listed in several groups gets the product of their factors.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightPolicy {
    groups: Vec<(IndexSet<String>, f64)>,
}

impl WeightPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group scaling every listed reaction by `factor`
    pub fn with_group<I, S>(mut self, reactions: I, factor: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_group(reactions, factor);
        self
    }

    pub fn add_group<I, S>(&mut self, reactions: I, factor: f64)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .push((reactions.into_iter().map(Into::into).collect(), factor));
    }

    pub fn groups(&self) -> &[(IndexSet<String>, f64)] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Combined factor for a reaction, `None` if no group lists it
    pub fn factor_for(&self, id: &str) -> Option<f64> {
        self.groups
            .iter()
            .filter(|(members, _)| members.contains(id))
            .map(|(_, factor)| *factor)
            .reduce(|a, b| a * b)
    }

    /// Weight tables tuned for the E. coli iML1515 style networks
    pub fn ecoli_reference() -> Self {
        WeightPolicy::new()
            .with_group(
                [
                    "ATPM",
                    "TPI",
                    "ENO",
                    "PGM",
                    "PGK",
                    "GLCtex_copy1",
                    "NH4tex",
                    "NH4tpp",
                    "EX_nh4_e",
                    "H2Otex",
                    "H2Otpp",
                    "EX_h2o_e",
                    "O2tpp",
                    "O2tex",
                    "EX_o2_e",
                    "CO2tpp",
                    "CO2tex",
                    "EX_co2_e",
                    "Htex",
                    "EX_h_e",
                    "ADD_H_c-tex",
                    "ADD_EX_h_c",
                ],
                1000.,
            )
            .with_group(["F6PA", "FBA3", "EDA", "XYLI2"], 1. / 50.)
    }
}

/// Exclusion list matching [`WeightPolicy::ecoli_reference`]
pub fn ecoli_reference_exclusions() -> IndexSet<String> {
    [
        "GLCtex_copy1",
        "NH4tex",
        "NH4tpp",
        "H2Otex",
        "H2Otpp",
        "EX_h2o_e",
        "O2tpp",
        "O2tex",
        "EX_o2_e",
        "CO2tpp",
        "CO2tex",
        "Htex",
        "EX_h_e",
        "ADD_H_c-tex",
        "ADD_EX_h_c",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Round to `precision` decimals, without negative zeros
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    let rounded = (value * scale).round() / scale;
    if rounded == 0. {
        0.
    } else {
        rounded
    }
}

struct RawRow {
    values: Vec<f64>,
    lower_bounds: Vec<f64>,
    nonzero: bool,
}

/// Build the matrix of retained trajectories
///
/// In order: transpose (missing values and unsolved levels become 0), drop rows within
/// `epsilon` of zero, drop excluded rows, weight, round to `precision` decimals.
pub fn build<M: FluxModel>(
    scan: &ScanResults,
    model: &M,
    exclusions: &IndexSet<String>,
    weights: &WeightPolicy,
    epsilon: f64,
    precision: u32,
) -> Result<(ScanMatrix, MatrixStats), FseofError> {
    let n = scan.len();
    let mut raw: IndexMap<String, RawRow> = IndexMap::new();
    let mut has_ranges = false;
    for (index, result) in scan.iter().enumerate() {
        let LevelOutcome::Solved(fluxes) = &result.outcome else {
            continue;
        };
        for (id, flux) in fluxes {
            has_ranges |= flux.is_range();
            let row = raw.entry(id.clone()).or_insert_with(|| RawRow {
                values: vec![0.; n],
                lower_bounds: vec![0.; n],
                nonzero: false,
            });
            row.values[index] = flux.value();
            row.lower_bounds[index] = flux.lower();
            row.nonzero |= flux.value().abs() > epsilon;
        }
    }

    let mut stats = MatrixStats::default();
    let mut rows = IndexMap::new();
    for (id, row) in raw {
        if !row.nonzero {
            stats.dropped_near_zero += 1;
            continue;
        }
        if exclusions.contains(&id) {
            stats.excluded += 1;
            continue;
        }
        let factor = match weights.factor_for(&id) {
            Some(factor) => {
                stats.reweighted += 1;
                factor
            }
            None => 1.,
        };
        let scale = |v: &f64| round_to(v * factor, precision);
        let trajectory = FluxTrajectory {
            values: row.values.iter().map(scale).collect(),
            lower_bounds: has_ranges.then(|| row.lower_bounds.iter().map(scale).collect()),
        };
        let meta = model.reaction_meta(&id)?;
        rows.insert(id, MatrixRow { trajectory, meta });
    }
    info!(
        retained = rows.len(),
        dropped = stats.dropped_near_zero,
        excluded = stats.excluded,
        reweighted = stats.reweighted,
        "Built scan matrix"
    );
    Ok((ScanMatrix { rows }, stats))
}
