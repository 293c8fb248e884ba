//! Metabolites and the compound naming used to spot transport reactions

use derive_builder::Builder;

/// A metabolite in one compartment
#[derive(Builder, Debug, Clone, PartialEq)]
pub struct Metabolite {
    /// Unique id, conventionally `<compound>_<compartment>`
    pub id: String,
    /// Display name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Compartment short name, e.g. `c`
    #[builder(default = "None")]
    pub compartment: Option<String>,
    #[builder(default = "0")]
    pub charge: i32,
    #[builder(default = "None")]
    pub formula: Option<String>,
    /// Raw JSON notes
    #[builder(default = "None")]
    pub notes: Option<String>,
    /// Raw JSON annotation
    #[builder(default = "None")]
    pub annotation: Option<String>,
}

/// Compound part of a metabolite id, everything before the first `_`
///
/// `glc__D_e` and `glc__D_c` both belong to compound `glc`.
pub fn compound_of(metabolite_id: &str) -> &str {
    metabolite_id
        .split('_')
        .next()
        .unwrap_or(metabolite_id)
}
