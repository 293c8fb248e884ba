//! Enforced flux levels for the target reaction
use tracing::info;

use crate::flux_analysis::{FluxModel, SolveMode, SolveOutcome};
use crate::fseof::FseofError;
use crate::optimize::objective::ObjectiveSense;

/// `steps` evenly spaced levels from `max_flux / steps` up to `max_flux`, where
/// `max_flux = max_theoretical_flux * enforced_fraction`
///
/// # Examples
/// ```rust
/// use fseof_core::fseof::levels::generate_levels;
/// let levels = generate_levels(20., 0.5, 4).unwrap();
/// assert_eq!(levels, vec![2.5, 5., 7.5, 10.]);
/// ```
pub fn generate_levels(
    max_theoretical_flux: f64,
    enforced_fraction: f64,
    steps: usize,
) -> Result<Vec<f64>, FseofError> {
    if steps == 0 {
        return Err(FseofError::InvalidParameter(
            "steps must be at least 1".to_string(),
        ));
    }
    if !(enforced_fraction > 0. && enforced_fraction <= 1.) {
        return Err(FseofError::InvalidParameter(format!(
            "enforced fraction must be in (0, 1], got {}",
            enforced_fraction
        )));
    }
    if !max_theoretical_flux.is_finite() || max_theoretical_flux <= 0. {
        return Err(FseofError::InvalidParameter(format!(
            "maximum theoretical flux must be positive and finite, got {}",
            max_theoretical_flux
        )));
    }
    let max_flux = max_theoretical_flux * enforced_fraction;
    let mut levels: Vec<f64> = (1..=steps)
        .map(|i| i as f64 * max_flux / steps as f64)
        .collect();
    if let Some(last) = levels.last_mut() {
        *last = max_flux;
    }
    Ok(levels)
}

/// Highest flux the target reaction can carry
///
/// Variability modes are reduced to plain FBA here, only the optimum is needed.
pub fn theoretical_maximum<M: FluxModel>(
    model: &M,
    target: &str,
    mode: SolveMode,
    epsilon: f64,
) -> Result<f64, FseofError> {
    let point_mode = match mode {
        SolveMode::Variability { .. } => SolveMode::Fba,
        other => other,
    };
    let baseline_error = |reason: String| FseofError::InfeasibleBaseline {
        reaction: target.to_string(),
        reason,
    };
    match model.solve(target, ObjectiveSense::Maximize, point_mode) {
        Ok(SolveOutcome::Optimal(solution)) => {
            let maximum = solution.objective_value;
            if maximum <= epsilon {
                return Err(baseline_error(format!(
                    "maximum flux {} is not positive",
                    maximum
                )));
            }
            info!(reaction = target, maximum, "Found theoretical maximum");
            Ok(maximum)
        }
        Ok(SolveOutcome::Infeasible) => Err(baseline_error("network is infeasible".to_string())),
        Err(err) => Err(baseline_error(err.to_string())),
    }
}
