//! The metabolic network: reactions, metabolites, genes and their GPR rules

pub mod gene;
pub mod metabolite;
pub mod model;
pub mod reaction;
