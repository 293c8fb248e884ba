use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fseof_cli::cli::Cli;
use fseof_core::configuration;
use fseof_core::fseof::{load_model, run_fseof};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    configuration::update(|c| {
        c.processes = cli.threads as u32;
        c.time_limit = cli.time_limit;
    });

    let mut model = load_model(&cli.model)
        .with_context(|| format!("failed to load model {}", cli.model.display()))?;

    let result = run_fseof(&mut model, &config).with_context(|| {
        format!(
            "scan of {} against {} failed",
            cli.target, cli.biomass
        )
    })?;

    let out = cli.out_path();
    result
        .report
        .write_json(&out)
        .with_context(|| format!("failed to write report {}", out.display()))?;
    if cli.tsv {
        let dir = out.parent().unwrap_or(Path::new("."));
        let stem = out
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("FSEOF");
        let written = result
            .report
            .write_tsv(dir, stem)
            .with_context(|| format!("failed to write TSV files in {}", dir.display()))?;
        tracing::info!(files = written.len(), "TSV sections written");
    }

    println!("{}", result.summary);
    println!("report written to {}", out.display());
    Ok(())
}
