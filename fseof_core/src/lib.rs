//! Flux Scanning with Enforced Objective Flux (FSEOF) on constraint based metabolic models
//!
//! Networks are read from COBRA JSON ([`io`]), formulated as linear programs ([`optimize`],
//! [`flux_analysis`]) and scanned for engineering targets ([`fseof`]).

pub mod configuration;
pub mod flux_analysis;
pub mod fseof;
pub mod io;
pub mod metabolic_model;
pub mod optimize;
mod utils;
