//! Genes referenced by reaction GPR rules
use std::fmt::{Display, Formatter};

use derive_builder::Builder;

/// A gene, reported alongside the reactions it catalyzes
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
pub struct Gene {
    /// Gene locus, e.g. `b1241`
    pub id: String,
    /// Gene symbol such as `adhE`
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Raw JSON notes
    #[builder(default = "None")]
    pub notes: Option<String>,
    /// Raw JSON annotation
    #[builder(default = "None")]
    pub annotation: Option<String>,
}

impl Gene {
    /// Create a gene with only an id
    pub fn new(id: &str) -> Gene {
        Gene {
            id: id.to_string(),
            name: None,
            notes: None,
            annotation: None,
        }
    }
}

impl Display for Gene {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.id, name),
            None => write!(f, "{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let gene = GeneBuilder::default()
            .id("b1241".to_string())
            .name(Some("adhE".to_string()))
            .build()
            .unwrap();
        assert_eq!(format!("{}", gene), "b1241 (adhE)");
        assert_eq!(format!("{}", Gene::new("b0001")), "b0001");
    }
}
