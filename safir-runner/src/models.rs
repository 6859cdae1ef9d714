use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one solver invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "code", rename_all = "snake_case")]
pub enum RunStatus {
    /// Exit code 0 and no error token in the log
    Success,
    /// Exit code 0 but the solver reported `ERROR` or `forrtl`
    SolverError,
    /// Non-zero exit code (`None` when killed by a signal)
    Failed(Option<i32>),
    TimedOut,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Report of a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub id: Uuid,
    /// Input file base name without extension
    pub chid: String,
    pub input: PathBuf,
    pub status: RunStatus,
    /// Number of sub-simulations seen in the log (at least 1 on success)
    pub simulations: usize,
    /// Last progress line reported by the solver
    pub last_time: Option<String>,
    /// Normalized XML result file, when written
    pub fixed_xml: Option<PathBuf>,
    /// Solver output collected from the first error on
    pub log: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Reports of a batch of scenarios
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub runs: Vec<RunReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|r| r.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.succeeded()
    }
}
