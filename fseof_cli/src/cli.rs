use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use fseof_core::flux_analysis::SolveMode;
use fseof_core::fseof::classify::{ClassificationStrategy, KnockoutPrecedence};
use fseof_core::fseof::matrix::{ecoli_reference_exclusions, WeightPolicy};
use fseof_core::fseof::{FseofConfig, FseofConfigBuilder};
use indexmap::IndexSet;

#[derive(Debug, Parser)]
#[command(
    name = "fseof",
    version,
    about = "Flux Scanning with Enforced Objective Flux on a COBRA JSON model"
)]
pub struct Cli {
    #[arg(help = "Network file in COBRA JSON format")]
    pub model: PathBuf,

    #[arg(help = "Growth reaction, maximized at every level")]
    pub biomass: String,

    #[arg(help = "Target reaction whose flux is enforced")]
    pub target: String,

    #[arg(long, help = "Number of levels (default 10, or 30 for the slope strategy)")]
    pub steps: Option<usize>,

    #[arg(
        long,
        default_value_t = false,
        help = "Solve with flux variability analysis and classify by slope"
    )]
    pub use_variability: bool,

    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    #[arg(long, default_value_t = false, help = "Cap growth during the scan")]
    pub constrain_biomass: bool,

    #[arg(
        long,
        default_value_t = 0.95,
        help = "Fraction of the growth optimum used as cap"
    )]
    pub biomass_fraction: f64,

    #[arg(
        long,
        default_value_t = 0.9,
        help = "Fraction of the target maximum reached by the last level"
    )]
    pub enforced_fraction: f64,

    #[arg(
        long,
        default_value_t = false,
        help = "Check knockouts after up/down regulation"
    )]
    pub knockout_last: bool,

    #[arg(long, value_name = "ID", help = "Reaction left out of the results (repeatable)")]
    pub exclude: Vec<String>,

    #[arg(
        long,
        value_name = "ID=FACTOR",
        value_parser = parse_weight,
        help = "Scale a reaction's trajectory (repeatable)"
    )]
    pub weight: Vec<(String, f64)>,

    #[arg(
        long,
        default_value_t = false,
        help = "Apply the E. coli reference exclusion and weight tables"
    )]
    pub ecoli_reference_tables: bool,

    #[arg(long, default_value_t = 1e-5)]
    pub epsilon: f64,

    #[arg(long, default_value_t = 5)]
    pub precision: u32,

    #[arg(
        long,
        value_name = "PREFIX",
        help = "Reactions with this prefix are dropped (repeatable, default EX_)"
    )]
    pub boundary_prefix: Vec<String>,

    #[arg(long, default_value_t = false)]
    pub drop_non_monotonic: bool,

    #[arg(long, default_value_t = 1, help = "Number of threads")]
    pub threads: usize,

    #[arg(long, help = "Time limit per solve, in seconds")]
    pub time_limit: Option<f64>,

    #[arg(long, help = "Report path (default FSEOF_<target>_results.json)")]
    pub out: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "Also write one TSV file per section")]
    pub tsv: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Threshold,
    Slope,
}

fn parse_weight(raw: &str) -> Result<(String, f64), String> {
    let (id, factor) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected ID=FACTOR, got {raw}"))?;
    let factor: f64 = factor
        .parse()
        .map_err(|e| format!("invalid factor in {raw}: {e}"))?;
    if id.is_empty() {
        return Err(format!("missing reaction id in {raw}"));
    }
    Ok((id.to_string(), factor))
}

impl Cli {
    pub fn strategy(&self) -> ClassificationStrategy {
        let knockout_precedence = if self.knockout_last {
            KnockoutPrecedence::Last
        } else {
            KnockoutPrecedence::First
        };
        match self.strategy {
            Some(StrategyArg::Slope) => ClassificationStrategy::Slope,
            Some(StrategyArg::Threshold) => ClassificationStrategy::Threshold {
                knockout_precedence,
            },
            None if self.use_variability => ClassificationStrategy::Slope,
            None => ClassificationStrategy::Threshold {
                knockout_precedence,
            },
        }
    }

    pub fn mode(&self) -> SolveMode {
        if self.use_variability {
            SolveMode::variability()
        } else {
            SolveMode::Parsimonious
        }
    }

    /// One group per distinct factor, after the reference groups when requested
    pub fn weights(&self) -> WeightPolicy {
        let mut policy = if self.ecoli_reference_tables {
            WeightPolicy::ecoli_reference()
        } else {
            WeightPolicy::new()
        };
        let mut groups: Vec<(f64, Vec<&str>)> = Vec::new();
        for (id, factor) in &self.weight {
            match groups.iter_mut().find(|(f, _)| *f == *factor) {
                Some((_, ids)) => ids.push(id.as_str()),
                None => groups.push((*factor, vec![id.as_str()])),
            }
        }
        for (factor, ids) in groups {
            policy.add_group(ids, factor);
        }
        policy
    }

    pub fn exclusions(&self) -> IndexSet<String> {
        let mut exclusions = if self.ecoli_reference_tables {
            ecoli_reference_exclusions()
        } else {
            IndexSet::new()
        };
        exclusions.extend(self.exclude.iter().cloned());
        exclusions
    }

    pub fn out_path(&self) -> PathBuf {
        self.out
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("FSEOF_{}_results.json", self.target)))
    }

    pub fn config(&self) -> Result<FseofConfig> {
        if self.threads == 0 {
            bail!("--threads must be at least 1");
        }
        let boundary_prefixes = if self.boundary_prefix.is_empty() {
            vec!["EX_".to_string()]
        } else {
            self.boundary_prefix.clone()
        };
        let mut builder = FseofConfigBuilder::default();
        builder
            .target(self.target.clone())
            .biomass(self.biomass.clone())
            .steps(self.steps)
            .enforced_fraction(self.enforced_fraction)
            .mode(self.mode())
            .strategy(self.strategy())
            .growth_cap(self.constrain_biomass.then_some(self.biomass_fraction))
            .exclusions(self.exclusions())
            .weights(self.weights())
            .epsilon(self.epsilon)
            .precision(self.precision)
            .boundary_prefixes(boundary_prefixes)
            .drop_non_monotonic(self.drop_non_monotonic)
            .processes(self.threads);
        builder.build().context("invalid scan settings")
    }
}
