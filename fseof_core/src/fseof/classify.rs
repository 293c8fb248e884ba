//! Classification of trajectories into up, down and knockout targets
use std::fmt::{Display, Formatter};

use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use tracing::info;

use crate::fseof::matrix::ScanMatrix;

/// Relative curvature below which a trend counts as linear
pub const CURVATURE_TOLERANCE: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TargetCategory {
    Upregulated,
    Downregulated,
    Knockout,
    Unclassified,
}

/// Whether a knockout is checked before (`First`) or after (`Last`) up/down regulation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KnockoutPrecedence {
    #[default]
    First,
    Last,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassificationStrategy {
    /// Compare first and last values of the trajectory
    Threshold {
        knockout_precedence: KnockoutPrecedence,
    },
    /// Sign of the least squares slope, with trend shape annotations
    Slope,
}

impl Default for ClassificationStrategy {
    fn default() -> Self {
        ClassificationStrategy::Threshold {
            knockout_precedence: KnockoutPrecedence::First,
        }
    }
}

impl Display for ClassificationStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassificationStrategy::Threshold { .. } => write!(f, "threshold"),
            ClassificationStrategy::Slope => write!(f, "slope"),
        }
    }
}

/// Shape of a trajectory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TrendClass {
    Flat,
    Linear,
    Accelerating,
    Saturating,
    NonMonotonic,
}

impl TrendClass {
    pub fn is_monotone(&self) -> bool {
        matches!(
            self,
            TrendClass::Linear | TrendClass::Accelerating | TrendClass::Saturating
        )
    }
}

/// Agreement between the value trend and the lower bound trend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReactionClass {
    Coupled,
    Flexible,
    Inconsistent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlopeDetails {
    pub q_slope_classifier: TrendClass,
    /// Slope of the lower bound trajectory
    pub l_sol: Option<f64>,
    pub l_sol_classifier: Option<TrendClass>,
    pub reaction_class: ReactionClass,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub reaction_id: String,
    pub category: TargetCategory,
    pub score: f64,
    /// Present under the slope strategy
    pub slope: Option<SlopeDetails>,
}

// region Threshold strategy
/// Classify by comparing the first and last values
///
/// # Examples
/// ```rust
/// use fseof_core::fseof::classify::{classify_threshold, KnockoutPrecedence, TargetCategory};
/// let up: Vec<f64> = (1..=10).map(f64::from).collect();
/// assert_eq!(classify_threshold(&up, KnockoutPrecedence::First), TargetCategory::Upregulated);
/// ```
pub fn classify_threshold(values: &[f64], precedence: KnockoutPrecedence) -> TargetCategory {
    let (Some(&v1), Some(&vn)) = (values.first(), values.last()) else {
        return TargetCategory::Unclassified;
    };
    let magnitudes = values.iter().map(|v| v.abs());
    let vmax = magnitudes.clone().fold(f64::NEG_INFINITY, f64::max);
    let vmin = magnitudes.fold(f64::INFINITY, f64::min);

    let knockout = vn == 0. && v1 != 0.;
    let same_sign = v1 * vn >= 0.;
    let up = same_sign
        && vn.abs() > v1.abs()
        && (vmax == vn.abs() || (vmax - vn.abs()) / vmax < 0.1);
    let down = same_sign && vn.abs() < v1.abs() && vmin == vn.abs();

    match precedence {
        KnockoutPrecedence::First if knockout => TargetCategory::Knockout,
        _ if up => TargetCategory::Upregulated,
        _ if down => TargetCategory::Downregulated,
        KnockoutPrecedence::Last if knockout => TargetCategory::Knockout,
        _ => TargetCategory::Unclassified,
    }
}

/// Score used to rank threshold candidates, `|vN| - |v1|`
pub fn threshold_score(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(v1), Some(vn)) => vn.abs() - v1.abs(),
        _ => 0.,
    }
}
// endregion Threshold strategy

// region Slope strategy
/// Least squares slope of `values` against the 1-based level index
pub fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.;
    }
    let mean_x = (n as f64 + 1.) / 2.;
    let mean_y = values.iter().sum::<f64>() / n as f64;
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0., 0.), |(num, den), (i, y)| {
            let dx = (i + 1) as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    num / den
}

/// Coefficients `(a, b, c)` of the least squares fit `a x^2 + b x + c`, x being the
/// 1-based level index
fn quadratic_fit(values: &[f64]) -> Option<(f64, f64, f64)> {
    let n = values.len();
    let design = DMatrix::from_fn(n, 3, |row, col| {
        let x = (row + 1) as f64;
        match col {
            0 => x * x,
            1 => x,
            _ => 1.,
        }
    });
    let y = DVector::from_column_slice(values);
    let coefficients = design.svd(true, true).solve(&y, 1e-12).ok()?;
    Some((coefficients[0], coefficients[1], coefficients[2]))
}

/// Shape of a trajectory
pub fn trend_class(values: &[f64]) -> TrendClass {
    let max_magnitude = values.iter().fold(0f64, |m, v| m.max(v.abs()));
    let tolerance = 1e-9 + 1e-6 * max_magnitude;
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    if values.is_empty() || max - min <= tolerance {
        return TrendClass::Flat;
    }

    let mut direction = 0f64;
    for w in values.windows(2) {
        let diff = w[1] - w[0];
        if diff.abs() <= tolerance {
            continue;
        }
        if direction != 0. && diff.signum() != direction {
            return TrendClass::NonMonotonic;
        }
        direction = diff.signum();
    }

    let slope = least_squares_slope(values);
    let n = values.len();
    if n < 3 {
        return TrendClass::Linear;
    }
    let Some((a, _, _)) = quadratic_fit(values) else {
        return TrendClass::Linear;
    };
    if a.abs() * n as f64 <= CURVATURE_TOLERANCE * slope.abs() {
        TrendClass::Linear
    } else if a.signum() == slope.signum() {
        TrendClass::Accelerating
    } else {
        TrendClass::Saturating
    }
}

/// Combine the value trend with the lower bound trend (if any)
pub fn reaction_class(
    value_trend: TrendClass,
    value_slope: f64,
    lower: Option<(TrendClass, f64)>,
) -> ReactionClass {
    if !value_trend.is_monotone() {
        return ReactionClass::Inconsistent;
    }
    match lower {
        None => ReactionClass::Flexible,
        Some((TrendClass::Flat, _)) => ReactionClass::Flexible,
        Some((lower_trend, lower_slope))
            if lower_trend.is_monotone()
                && value_slope != 0.
                && lower_slope != 0.
                && value_slope.signum() == lower_slope.signum() =>
        {
            ReactionClass::Coupled
        }
        Some(_) => ReactionClass::Inconsistent,
    }
}

fn classify_slope(values: &[f64], lower_bounds: Option<&[f64]>) -> (TargetCategory, f64, SlopeDetails) {
    let q_slope = least_squares_slope(values);
    let q_slope_classifier = trend_class(values);
    let lower = lower_bounds.map(|lb| (trend_class(lb), least_squares_slope(lb)));
    let details = SlopeDetails {
        q_slope_classifier,
        l_sol: lower.map(|(_, s)| s),
        l_sol_classifier: lower.map(|(t, _)| t),
        reaction_class: reaction_class(q_slope_classifier, q_slope, lower),
    };
    let category = if q_slope >= 0. {
        TargetCategory::Upregulated
    } else {
        TargetCategory::Downregulated
    };
    (category, q_slope, details)
}
// endregion Slope strategy

/// Classify every row of the matrix, leaving out unclassified reactions
pub fn classify(matrix: &ScanMatrix, strategy: ClassificationStrategy) -> Vec<Candidate> {
    let candidates: Vec<Candidate> = matrix
        .iter()
        .filter_map(|(id, row)| {
            let values = &row.trajectory.values;
            let (category, score, slope) = match strategy {
                ClassificationStrategy::Threshold {
                    knockout_precedence,
                } => (
                    classify_threshold(values, knockout_precedence),
                    threshold_score(values),
                    None,
                ),
                ClassificationStrategy::Slope => {
                    let (category, score, details) =
                        classify_slope(values, row.trajectory.lower_bounds.as_deref());
                    (category, score, Some(details))
                }
            };
            (category != TargetCategory::Unclassified).then(|| Candidate {
                reaction_id: id.clone(),
                category,
                score,
                slope,
            })
        })
        .collect();
    info!(candidates = candidates.len(), %strategy, "Classified trajectories");
    candidates
}

// region Filtering
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateFilter {
    /// Reactions starting with any of these are dropped
    pub boundary_prefixes: Vec<String>,
    /// Drop non-monotonic and inconsistent slope candidates
    pub drop_non_monotonic: bool,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            boundary_prefixes: vec!["EX_".to_string()],
            drop_non_monotonic: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub boundary: usize,
    pub self_balancing: usize,
    pub non_monotonic: usize,
}

/// Drop boundary, self-balancing and (optionally) non-monotonic candidates
pub fn filter_candidates(
    candidates: Vec<Candidate>,
    matrix: &ScanMatrix,
    filter: &CandidateFilter,
) -> (Vec<Candidate>, FilterStats) {
    let mut stats = FilterStats::default();
    let kept = candidates
        .into_iter()
        .filter(|c| {
            if filter
                .boundary_prefixes
                .iter()
                .any(|p| c.reaction_id.starts_with(p.as_str()))
            {
                stats.boundary += 1;
                return false;
            }
            if matrix
                .get(&c.reaction_id)
                .is_some_and(|row| row.meta.is_self_balancing())
            {
                stats.self_balancing += 1;
                return false;
            }
            if filter.drop_non_monotonic {
                if let Some(details) = &c.slope {
                    if details.q_slope_classifier == TrendClass::NonMonotonic
                        || details.reaction_class == ReactionClass::Inconsistent
                    {
                        stats.non_monotonic += 1;
                        return false;
                    }
                }
            }
            true
        })
        .collect();
    (kept, stats)
}
// endregion Filtering

#[cfg(test)]
mod tests {
    use super::*;

    fn up() -> Vec<f64> {
        (1..=10).map(f64::from).collect()
    }

    fn down() -> Vec<f64> {
        (1..=10).rev().map(f64::from).collect()
    }

    const KNOCKOUT: [f64; 10] = [5., 4., 3., 2., 1., 0., 0., 0., 0., 0.];

    #[test]
    fn threshold_up_and_down() {
        let first = KnockoutPrecedence::First;
        assert_eq!(classify_threshold(&up(), first), TargetCategory::Upregulated);
        assert_eq!(classify_threshold(&down(), first), TargetCategory::Downregulated);
        assert!((threshold_score(&up()) - 9.).abs() < 1e-12);
        assert!((threshold_score(&down()) + 9.).abs() < 1e-12);
    }

    #[test]
    fn constant_is_unclassified() {
        assert_eq!(
            classify_threshold(&[5.; 10], KnockoutPrecedence::First),
            TargetCategory::Unclassified
        );
    }

    #[test]
    fn knockout_precedence() {
        assert_eq!(
            classify_threshold(&KNOCKOUT, KnockoutPrecedence::First),
            TargetCategory::Knockout
        );
        assert_eq!(
            classify_threshold(&KNOCKOUT, KnockoutPrecedence::Last),
            TargetCategory::Downregulated
        );
        // Any trajectory ending at zero also satisfies the down rule
        for t in [[1., 3., 0.], [-2., 1., 0.], [4., 4., 0.]] {
            assert_eq!(
                classify_threshold(&t, KnockoutPrecedence::Last),
                TargetCategory::Downregulated
            );
        }
    }

    #[test]
    fn up_requires_peak_near_end() {
        // Peak of 10 in the middle, final value more than 10% below it
        assert_eq!(
            classify_threshold(&[1., 10., 5.], KnockoutPrecedence::First),
            TargetCategory::Unclassified
        );
        // Final value within 10% of the peak
        assert_eq!(
            classify_threshold(&[1., 10., 9.5], KnockoutPrecedence::First),
            TargetCategory::Upregulated
        );
    }

    #[test]
    fn down_requires_minimum_at_end() {
        assert_eq!(
            classify_threshold(&[10., 1., 5.], KnockoutPrecedence::First),
            TargetCategory::Unclassified
        );
    }

    #[test]
    fn sign_change_is_not_regulation() {
        assert_eq!(
            classify_threshold(&[-1., 0.5, 4.], KnockoutPrecedence::First),
            TargetCategory::Unclassified
        );
    }

    #[test]
    fn precedence_only_moves_knockouts() {
        let trajectories: Vec<Vec<f64>> = vec![
            up(),
            down(),
            KNOCKOUT.to_vec(),
            vec![5.; 10],
            vec![1., 10., 5.],
            vec![-1., 0.5, 4.],
        ];
        for t in trajectories {
            let first = classify_threshold(&t, KnockoutPrecedence::First);
            let last = classify_threshold(&t, KnockoutPrecedence::Last);
            if first == TargetCategory::Knockout {
                assert_eq!(last, TargetCategory::Downregulated);
            } else {
                assert_eq!(first, last);
            }
        }
    }

    #[test]
    fn slopes() {
        assert!((least_squares_slope(&up()) - 1.).abs() < 1e-12);
        assert!((least_squares_slope(&down()) + 1.).abs() < 1e-12);
        assert_eq!(least_squares_slope(&[3.]), 0.);
        let doubled: Vec<f64> = up().iter().map(|v| 2. * v + 7.).collect();
        assert!((least_squares_slope(&doubled) - 2.).abs() < 1e-12);
    }

    #[test]
    fn trend_classes() {
        assert_eq!(trend_class(&[5.; 10]), TrendClass::Flat);
        assert_eq!(trend_class(&up()), TrendClass::Linear);
        assert_eq!(trend_class(&down()), TrendClass::Linear);
        let squares: Vec<f64> = (1..=10).map(|x| f64::from(x * x)).collect();
        assert_eq!(trend_class(&squares), TrendClass::Accelerating);
        let roots: Vec<f64> = (1..=10).map(|x| 10. * f64::from(x).sqrt()).collect();
        assert_eq!(trend_class(&roots), TrendClass::Saturating);
        assert_eq!(trend_class(&[1., 3., 2., 4.]), TrendClass::NonMonotonic);
        assert_eq!(trend_class(&[1., 2.]), TrendClass::Linear);
    }

    #[test]
    fn reaction_classes() {
        assert_eq!(
            reaction_class(TrendClass::Linear, 1., Some((TrendClass::Linear, 0.5))),
            ReactionClass::Coupled
        );
        assert_eq!(
            reaction_class(TrendClass::Linear, 1., Some((TrendClass::Flat, 0.))),
            ReactionClass::Flexible
        );
        assert_eq!(
            reaction_class(TrendClass::Linear, 1., None),
            ReactionClass::Flexible
        );
        assert_eq!(
            reaction_class(TrendClass::Linear, 1., Some((TrendClass::Linear, -0.5))),
            ReactionClass::Inconsistent
        );
        assert_eq!(
            reaction_class(TrendClass::NonMonotonic, 1., None),
            ReactionClass::Inconsistent
        );
    }

    #[test]
    fn slope_strategy_details() {
        let (category, score, details) = classify_slope(&down(), Some(&down()));
        assert_eq!(category, TargetCategory::Downregulated);
        assert!((score + 1.).abs() < 1e-12);
        assert_eq!(details.q_slope_classifier, TrendClass::Linear);
        assert_eq!(details.l_sol_classifier, Some(TrendClass::Linear));
        assert!((details.l_sol.unwrap() + 1.).abs() < 1e-12);
        assert_eq!(details.reaction_class, ReactionClass::Coupled);

        let (category, _, details) = classify_slope(&[2.; 4], None);
        assert_eq!(category, TargetCategory::Upregulated);
        assert_eq!(details.q_slope_classifier, TrendClass::Flat);
        assert!(details.l_sol.is_none());
    }
}
