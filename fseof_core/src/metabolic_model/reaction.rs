//! This module provides a struct for representing reactions
use std::collections::BTreeSet;

use super::metabolite::compound_of;
use super::model::Gpr;
use crate::configuration;
use crate::utils::hashing::hash_as_hex_string;
use derive_builder::Builder;
use indexmap::IndexMap;

/// Represents a reaction in the metabolic model
#[derive(Builder, Debug, Clone)]
pub struct Reaction {
    /// Used to identify the reaction
    pub id: String,
    /// Metabolite stoichiometry of the reaction
    #[builder(default = "IndexMap::new()")]
    pub metabolites: IndexMap<String, f64>,
    /// Human-readable reaction name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Gene Protein Reaction rule
    #[builder(default = "None")]
    pub gpr: Option<Gpr>,
    /// Lower flux bound
    #[builder(default = "configuration::current().lower_bound")]
    pub lower_bound: f64,
    /// Upper flux bound
    #[builder(default = "configuration::current().upper_bound")]
    pub upper_bound: f64,
    /// Reaction subsystem
    #[builder(default = "None")]
    pub subsystem: Option<String>,
    /// Notes about the reaction
    #[builder(default = "None")]
    pub notes: Option<String>,
    /// Reaction Annotations
    #[builder(default = "None")]
    pub annotation: Option<String>,
}

impl Reaction {
    /// Determine the id to be associated with the forward reaction in the optimization problem
    ///
    /// # Note:
    /// The forward id is "{reaction_id}_forward"
    pub fn get_forward_id(&self) -> String {
        format!("{}_forward", &self.id)
    }

    /// Determine the id to be associated with the reverse reaction in the optimization problem
    ///
    /// # Note:
    /// The reverse id is "{reaction_id}_reverse_{hexidecimal hash of reaction_id}"
    pub fn get_reverse_id(&self) -> String {
        format!("{}_reverse_{}", &self.id, hash_as_hex_string(&self.id))
    }

    /// Determine the upper bound of the variable associated with the forward reaction
    pub(crate) fn get_forward_upper_bound(&self) -> f64 {
        self.upper_bound.max(0f64)
    }

    /// Determine the lower bound of the variable associated with the forward reaction
    pub(crate) fn get_forward_lower_bound(&self) -> f64 {
        self.lower_bound.max(0f64)
    }

    /// Determine the upper bound of the variable associated with the reverse reaction
    pub(crate) fn get_reverse_upper_bound(&self) -> f64 {
        (-self.lower_bound).max(0f64)
    }

    /// Determine the lower bound of the variable associated with the reverse reaction
    pub(crate) fn get_reverse_lower_bound(&self) -> f64 {
        (-self.upper_bound).max(0f64)
    }

    /// Metabolites consumed by the reaction (negative coefficient)
    pub fn reactants(&self) -> impl Iterator<Item = (&str, f64)> {
        self.metabolites
            .iter()
            .filter(|(_, coef)| **coef < 0.)
            .map(|(id, coef)| (id.as_str(), *coef))
    }

    /// Metabolites produced by the reaction (positive coefficient)
    pub fn products(&self) -> impl Iterator<Item = (&str, f64)> {
        self.metabolites
            .iter()
            .filter(|(_, coef)| **coef > 0.)
            .map(|(id, coef)| (id.as_str(), *coef))
    }

    /// Sets of compounds (see [`compound_of`]) on the reactant and product side
    pub fn compound_sets(&self) -> (BTreeSet<String>, BTreeSet<String>) {
        let left = self
            .reactants()
            .map(|(id, _)| compound_of(id).to_string())
            .collect();
        let right = self
            .products()
            .map(|(id, _)| compound_of(id).to_string())
            .collect();
        (left, right)
    }

    /// Equation text in the usual `a_c + 2 b_c --> p_c` form
    ///
    /// The arrow reflects the current bounds: `<=>` for reversible, `<--` for
    /// reactions that can only run backwards, `-->` otherwise.
    pub fn build_reaction_string(&self) -> String {
        let arrow = if self.lower_bound < 0. && self.upper_bound > 0. {
            "<=>"
        } else if self.lower_bound < 0. && self.upper_bound <= 0. {
            "<--"
        } else {
            "-->"
        };
        let left = Self::side_to_string(self.reactants().map(|(id, c)| (id, -c)));
        let right = Self::side_to_string(self.products());
        match (left.is_empty(), right.is_empty()) {
            (true, true) => arrow.to_string(),
            (true, false) => format!("{} {}", arrow, right),
            (false, true) => format!("{} {}", left, arrow),
            (false, false) => format!("{} {} {}", left, arrow, right),
        }
    }

    fn side_to_string<'a>(terms: impl Iterator<Item = (&'a str, f64)>) -> String {
        terms
            .map(|(id, coef)| {
                if (coef - 1.).abs() < f64::EPSILON {
                    id.to_string()
                } else {
                    format!("{} {}", coef, id)
                }
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }
}
