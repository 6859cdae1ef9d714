//! Error types for SAFIR tools

use thiserror::Error;

/// Main error type for input-file, thermal and scheduling operations
#[derive(Error, Debug)]
pub enum SafirError {
    #[error("'{keyword}' found at line {line} but no {family} elements follow it")]
    MissingSection {
        family: String,
        keyword: String,
        line: usize,
    },

    #[error("Malformed input at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("{what}: declared {declared}, found {found}")]
    CountMismatch {
        what: String,
        declared: usize,
        found: usize,
    },

    #[error("{family} element {element} references section type {index}, only {available} defined")]
    UnresolvedSection {
        family: String,
        element: usize,
        index: usize,
        available: usize,
    },

    #[error("{family} element {tag} not found in input file")]
    ElementNotFound { family: String, tag: usize },

    #[error("Fire model {model} is not allowed for {family} sections")]
    UnsupportedFireModel { model: String, family: String },

    #[error("Schedule needs {required} fire locations but only {available} are available")]
    NotEnoughFirePoints { required: usize, available: usize },

    #[error("Torsion results not found: {0}")]
    TorsionMissing(String),

    #[error("Flux constraint annotation (HOT, CFD, HASEMI or LOCAFI) not found in {0}")]
    FluxMarkerMissing(String),

    #[error("Coefficient optimization did not converge after {iterations} iterations (mean error {mean_error})")]
    ConvergenceFailed { iterations: usize, mean_error: f64 },

    #[error("No convergence after {iterations} iterations at {time} s")]
    NoConvergence { time: usize, iterations: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("Formatting error: {0}")]
    FormatError(#[from] std::fmt::Error),
}

impl SafirError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }

    /// Parse and format errors: the text does not follow the keyword grammar
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::MissingSection { .. } | Self::Malformed { .. } | Self::CountMismatch { .. }
        )
    }
}

/// Result type for SAFIR tools operations
pub type SafirResult<T> = Result<T, SafirError>;
