//! Section types referenced by elements

use serde::{Deserialize, Serialize};

/// A section type of an element family
///
/// Beams and shells reference a thermal result file (`.tem` / `.tsh`) and
/// translate its local materials to global material numbers. Trusses
/// reference a temperature table file together with their numeric data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SectionType {
    Profile {
        /// Thermal result file name
        file: String,
        /// Global material number of each local material, in `TRANSLATE` order
        materials: Vec<usize>,
    },
    Truss {
        /// Temperature-vs-time table file
        file: String,
        /// Cross-section area and initial stress
        parameters: Vec<f64>,
        /// Global material number
        material: usize,
    },
}

impl SectionType {
    /// Create a beam or shell section type
    pub fn profile(file: &str, materials: Vec<usize>) -> Self {
        Self::Profile {
            file: file.to_string(),
            materials,
        }
    }

    /// Create a truss section type
    pub fn truss(file: &str, parameters: Vec<f64>, material: usize) -> Self {
        Self::Truss {
            file: file.to_string(),
            parameters,
            material,
        }
    }

    pub fn file(&self) -> &str {
        match self {
            Self::Profile { file, .. } | Self::Truss { file, .. } => file,
        }
    }

    /// Render the section block, each line terminated with `newline`
    pub fn to_lines(&self, newline: &str) -> Vec<String> {
        match self {
            Self::Profile { file, materials } => {
                let mut lines = Vec::with_capacity(materials.len() + 2);
                lines.push(format!("{file}{newline}"));
                for (local, global) in materials.iter().enumerate() {
                    lines.push(format!("     TRANSLATE    {}    {}{newline}", local + 1, global));
                }
                lines.push(format!("     END_TRANS{newline}"));
                lines
            }
            Self::Truss {
                file,
                parameters,
                material,
            } => {
                let mut tokens = vec![file.clone()];
                tokens.extend(parameters.iter().map(|p| format_number(*p)));
                tokens.push(material.to_string());
                vec![format!("{}{newline}", tokens.join("\t"))]
            }
        }
    }
}

/// Render a float the short way the input files use (`1.5`, `0.0`, `2e-5`)
pub(crate) fn format_number(value: f64) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_lines() {
        let section = SectionType::profile("hea200.tem", vec![1, 3]);
        let lines = section.to_lines("\n");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "hea200.tem\n");
        assert!(lines[2].contains("TRANSLATE") && lines[2].trim_end().ends_with('3'));
        assert_eq!(lines[3].trim(), "END_TRANS");
    }

    #[test]
    fn test_truss_lines() {
        let section = SectionType::truss("t1.txt", vec![0.0025, 0.0], 2);
        assert_eq!(section.to_lines("\n"), vec!["t1.txt\t0.0025\t0.0\t2\n".to_string()]);
    }
}
