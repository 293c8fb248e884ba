//! Scoped bound overrides
//!
//! A [`BoundsGuard`] applies a set of bound overrides to a [`FluxModel`] and puts the
//! original bounds back when it goes out of scope, including on early returns and panics.
use std::ops::Deref;

use tracing::warn;

use crate::flux_analysis::{FluxError, FluxModel, SolveMode, SolveOutcome};
use crate::optimize::objective::ObjectiveSense;

/// New bounds for one reaction
#[derive(Clone, Debug, PartialEq)]
pub struct BoundOverride {
    pub reaction: String,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl BoundOverride {
    pub fn new(reaction: &str, lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            reaction: reaction.to_string(),
            lower_bound,
            upper_bound,
        }
    }

    /// Fix the reaction's flux at `value`
    pub fn pin(reaction: &str, value: f64) -> Self {
        Self::new(reaction, value, value)
    }
}

/// Holds a model with overridden bounds, restoring the originals on drop
pub struct BoundsGuard<'a, M: FluxModel> {
    model: &'a mut M,
    /// Original bounds, in the order they were overridden
    saved: Vec<(String, f64, f64)>,
}

impl<'a, M: FluxModel> BoundsGuard<'a, M> {
    /// Apply `overrides` to `model`
    ///
    /// Every id and bound pair is checked before anything is changed, so an error leaves the
    /// model untouched.
    pub fn new(model: &'a mut M, overrides: &[BoundOverride]) -> Result<Self, FluxError> {
        for o in overrides {
            if !model.contains_reaction(&o.reaction) {
                return Err(FluxError::UnknownReaction(o.reaction.clone()));
            }
            if o.lower_bound > o.upper_bound {
                return Err(FluxError::InvalidBounds {
                    id: o.reaction.clone(),
                    lb: o.lower_bound,
                    ub: o.upper_bound,
                });
            }
        }
        let mut guard = BoundsGuard {
            model,
            saved: Vec::with_capacity(overrides.len()),
        };
        for o in overrides {
            let (lb, ub) = guard.model.bounds(&o.reaction)?;
            guard.saved.push((o.reaction.clone(), lb, ub));
            guard
                .model
                .set_bounds(&o.reaction, o.lower_bound, o.upper_bound)?;
        }
        Ok(guard)
    }
}

impl<M: FluxModel> Deref for BoundsGuard<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        &*self.model
    }
}

impl<M: FluxModel> Drop for BoundsGuard<'_, M> {
    fn drop(&mut self) {
        // Reverse order so repeated overrides of one reaction end at its first saved bounds
        while let Some((id, lb, ub)) = self.saved.pop() {
            if let Err(err) = self.model.set_bounds(&id, lb, ub) {
                warn!(reaction = %id, error = %err, "Unable to restore reaction bounds");
            }
        }
    }
}

/// Solve `model` with temporary bound overrides
pub fn solve_with_overrides<M: FluxModel>(
    model: &mut M,
    overrides: &[BoundOverride],
    objective: &str,
    sense: ObjectiveSense,
    mode: SolveMode,
) -> Result<SolveOutcome, FluxError> {
    let guard = model.override_bounds(overrides)?;
    guard.solve(objective, sense, mode)
}
