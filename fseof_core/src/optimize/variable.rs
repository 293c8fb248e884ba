//! Module providing representation of optimization problem variables
use std::fmt::{Display, Formatter};

use derive_builder::Builder;

/// A continuous variable of an optimization problem
#[derive(Builder, Debug, Clone, PartialEq)]
#[builder(setter(into))]
pub struct Variable {
    /// Used to identify the variable (must be unique within a problem)
    pub id: String,
    /// Optional human-readable name
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Lowest value the variable can take, may be `f64::NEG_INFINITY`
    #[builder(default = "f64::NEG_INFINITY")]
    pub lower_bound: f64,
    /// Highest value the variable can take, may be `f64::INFINITY`
    #[builder(default = "f64::INFINITY")]
    pub upper_bound: f64,
    /// Column of the variable in the problem, assigned when added
    #[builder(setter(skip))]
    pub(crate) index: usize,
}

impl Variable {
    /// Whether the lower and upper bounds coincide
    pub fn is_fixed(&self) -> bool {
        self.lower_bound == self.upper_bound
    }

    /// Column of the variable in its problem
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(
                f,
                "{}: {} <= {} <= {}",
                name, self.lower_bound, self.id, self.upper_bound
            ),
            None => write!(f, "{} <= {} <= {}", self.lower_bound, self.id, self.upper_bound),
        }
    }
}
