//! Material definitions of the `MATERIALS` block

use serde::{Deserialize, Serialize};

/// A material as the solver reads it: a model name and its parameter rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Material model name (e.g. `STEELEC3EN`)
    pub name: String,
    /// Parameter rows, one per line following the name
    pub parameters: Vec<Vec<f64>>,
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Vec::new(),
        }
    }
}
