//! Module for reading Models
pub mod gpr_parse;
pub mod json;
