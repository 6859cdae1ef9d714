use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use chrono::Utc;
use regex::Regex;
use safir_tools::results::fix_result_file;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::models::{BatchReport, RunReport, RunStatus};

/// Tracks a solver log line by line
#[derive(Debug)]
pub struct LogMonitor {
    chid: String,
    progress: Regex,
    verbose: bool,
    pub failed: bool,
    pub simulations: usize,
    pub last_time: Option<String>,
    pub log: Vec<String>,
}

impl LogMonitor {
    pub fn new(chid: &str, verbose: bool) -> Result<Self, RunnerError> {
        Ok(Self {
            chid: chid.to_string(),
            progress: Regex::new(r"\btime\b\s*[:=]?\s*(.+)$")?,
            verbose,
            failed: false,
            simulations: 0,
            last_time: None,
            log: Vec::new(),
        })
    }

    pub fn feed(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if line.contains("ERROR") || line.contains("forrtl") {
            if !self.failed {
                tracing::error!("Solver error in {}", self.chid);
            }
            self.failed = true;
            self.verbose = true;
        }

        if self.verbose {
            tracing::info!("    {}", line);
            self.log.push(line.to_string());
        } else if line.contains("====") {
            self.simulations += 1;
        } else if let Some(caps) = self.progress.captures(line) {
            let time = caps[1].trim().to_string();
            tracing::debug!("{} (sim #{}): {}", self.chid, self.simulations, time);
            self.last_time = Some(time);
        }
    }
}

pub struct SolverRunner {
    config: RunnerConfig,
    verbose: bool,
}

impl SolverRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config, verbose: false }
    }

    /// Log every solver line, not only those after an error
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the solver on one input file. Solver failures are reported in the
    /// status; errors are returned only when the run cannot be set up.
    pub async fn run(&self, input: &Path) -> Result<RunReport, RunnerError> {
        if !input.is_file() {
            return Err(RunnerError::InputNotFound(input.to_path_buf()));
        }
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let work_dir = match input.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let chid = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| RunnerError::InputNotFound(input.to_path_buf()))?;

        if let Some(key) = &self.config.license_key {
            link_license(key, &work_dir)?;
        }
        self.maybe_export_debug_file(input, &id, "in");

        let mut command = if self.config.wine {
            let mut command = Command::new("wine");
            command.arg(&self.config.solver);
            command
        } else {
            Command::new(&self.config.solver)
        };
        command
            .arg(&chid)
            .current_dir(&work_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        tracing::info!("Running {} {} in {:?}", self.config.solver.display(), chid, work_dir);
        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            solver: self.config.solver.clone(),
            source,
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::IoError(io::Error::other("solver stdout not captured")))?;

        let mut monitor = LogMonitor::new(&chid, self.verbose)?;
        let watch = async {
            let mut reader = BufReader::new(stdout);
            let mut buffer = Vec::new();
            loop {
                buffer.clear();
                if reader.read_until(b'\n', &mut buffer).await? == 0 {
                    break;
                }
                monitor.feed(&String::from_utf8_lossy(&buffer));
            }
            child.wait().await
        };
        let outcome: Option<io::Result<ExitStatus>> = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, watch).await.ok(),
            None => Some(watch.await),
        };

        let status = match outcome {
            None => {
                tracing::warn!("{} timed out, killing the solver", chid);
                if let Err(err) = child.kill().await {
                    tracing::warn!("Failed to kill the solver: {}", err);
                }
                RunStatus::TimedOut
            }
            Some(exit) => {
                let exit = exit?;
                if !exit.success() {
                    RunStatus::Failed(exit.code())
                } else if monitor.failed {
                    RunStatus::SolverError
                } else {
                    RunStatus::Success
                }
            }
        };

        let mut fixed_xml = None;
        if status.is_success() {
            tracing::info!("Solver finished {} \"{}\" calculations", monitor.simulations.max(1), chid);
            let xml = work_dir.join(format!("{chid}.XML"));
            self.maybe_export_debug_file(&xml, &id, "XML");
            if self.config.fix_xml {
                match fix_result_file(&xml) {
                    Ok((path, _)) => fixed_xml = Some(path),
                    Err(err) => tracing::warn!("Result file {:?} not fixed: {}", xml, err),
                }
            }
        } else {
            tracing::warn!("Solver finished \"{}\" with status {:?}", chid, status);
        }

        let simulations = if status.is_success() {
            monitor.simulations.max(1)
        } else {
            monitor.simulations
        };
        let report = RunReport {
            id,
            chid,
            input: input.to_path_buf(),
            status,
            simulations,
            last_time: monitor.last_time,
            fixed_xml,
            log: monitor.log,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!("Computing time: {:.1} s", report.duration_secs());
        Ok(report)
    }

    /// Run the solver on every input in turn; a failed scenario does not stop
    /// the batch
    pub async fn run_batch(&self, inputs: &[PathBuf]) -> BatchReport {
        let mut batch = BatchReport::default();
        for input in inputs {
            let started_at = Utc::now();
            match self.run(input).await {
                Ok(report) => batch.runs.push(report),
                Err(err) => {
                    tracing::error!("Scenario {:?} not run: {}", input, err);
                    batch.runs.push(RunReport {
                        id: Uuid::new_v4(),
                        chid: input
                            .file_stem()
                            .map(|s| s.to_string_lossy().to_string())
                            .unwrap_or_default(),
                        input: input.clone(),
                        status: RunStatus::Failed(None),
                        simulations: 0,
                        last_time: None,
                        fixed_xml: None,
                        log: vec![err.to_string()],
                        started_at,
                        finished_at: Utc::now(),
                    });
                }
            }
        }
        tracing::info!("Batch finished: {} succeeded, {} failed", batch.succeeded(), batch.failed());
        batch
    }

    fn maybe_export_debug_file(&self, path: &Path, run_id: &Uuid, extension: &str) {
        if let Some(dest_path) = &self.config.debug_export {
            if !path.exists() {
                return;
            }
            if let Err(err) = fs::create_dir_all(dest_path) {
                tracing::warn!("Failed to create debug export directory {:?}: {}", dest_path, err);
                return;
            }

            let file_name = format!("run_{}.{}", run_id, extension);
            let dest_file = dest_path.join(file_name);
            if let Err(err) = fs::copy(path, &dest_file) {
                tracing::warn!("Failed to export debug file {:?}: {}", dest_file, err);
            } else {
                tracing::info!("Exported debug file to {:?}", dest_file);
            }
        }
    }
}

/// Link the licence key as `identity.key` in the working directory
fn link_license(key: &Path, work_dir: &Path) -> Result<(), RunnerError> {
    let target = work_dir.join("identity.key");
    if target.exists() {
        tracing::info!("License file already linked");
        return Ok(());
    }
    #[cfg(unix)]
    std::os::unix::fs::symlink(key, &target)?;
    #[cfg(not(unix))]
    fs::copy(key, &target).map(|_| ())?;
    tracing::info!("License file linked");
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Input file not found: {0:?}")]
    InputNotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to start solver {solver:?}: {source}")]
    Spawn { solver: PathBuf, source: io::Error },
    #[error("Invalid progress pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    /// `sh <chid>` runs the script named after the input in its directory
    fn scenario(dir: &Path, chid: &str, script: &str) -> PathBuf {
        fs::write(dir.join(chid), script).unwrap();
        let input = dir.join(format!("{chid}.in"));
        fs::write(&input, "Dummy input\n").unwrap();
        input
    }

    fn runner() -> SolverRunner {
        SolverRunner::new(RunnerConfig {
            solver: PathBuf::from("sh"),
            ..RunnerConfig::default()
        })
    }

    const PASSING: &str = "\
echo ' Reading the data'
echo '======================'
echo ' time =   60.0'
echo ' time =  120.0'
echo '<RLX> -0.100E+01 0.000E+00 </RLX>' > frame.XML
exit 0
";

    #[test]
    fn test_monitor_detects_errors() {
        let mut monitor = LogMonitor::new("frame", false).unwrap();
        monitor.feed(" time =  30.0\n");
        monitor.feed("==========\n");
        monitor.feed("forrtl: severe (24): end-of-file during read\n");
        monitor.feed(" time =  60.0\n");
        assert!(monitor.failed);
        assert_eq!(monitor.simulations, 1);
        assert_eq!(monitor.last_time.as_deref(), Some("30.0"));
        assert_eq!(monitor.log.len(), 2);
    }

    #[tokio::test]
    async fn test_successful_run_fixes_xml() {
        let dir = tempfile::tempdir().unwrap();
        let input = scenario(dir.path(), "frame", PASSING);

        let report = runner().run(&input).await.unwrap();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.chid, "frame");
        assert_eq!(report.simulations, 1);
        assert_eq!(report.last_time.as_deref(), Some("120.0"));

        let fixed = report.fixed_xml.unwrap();
        assert_eq!(fixed, dir.path().join("frame_fixed.XML"));
        assert_eq!(fs::read_to_string(fixed).unwrap(), "<RLX> -1 0 </RLX>\n");
    }

    #[tokio::test]
    async fn test_error_token_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = scenario(dir.path(), "frame", "echo 'ERROR in NODES'\necho 'stop'\nexit 0\n");

        let report = runner().run(&input).await.unwrap();
        assert_eq!(report.status, RunStatus::SolverError);
        assert_eq!(report.log, vec!["ERROR in NODES".to_string(), "stop".to_string()]);
        assert!(report.fixed_xml.is_none());
    }

    #[tokio::test]
    async fn test_exit_code_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = scenario(dir.path(), "frame", "exit 3\n");
        let report = runner().run(&input).await.unwrap();
        assert_eq!(report.status, RunStatus::Failed(Some(3)));
    }

    #[tokio::test]
    async fn test_timeout_kills_solver() {
        let dir = tempfile::tempdir().unwrap();
        let input = scenario(dir.path(), "frame", "echo ' time = 1.0'\nsleep 5\n");
        let runner = SolverRunner::new(RunnerConfig {
            solver: PathBuf::from("sh"),
            timeout: Some(Duration::from_millis(300)),
            ..RunnerConfig::default()
        });
        let report = runner.run(&input).await.unwrap();
        assert_eq!(report.status, RunStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_license_linked() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("licence.txt");
        fs::write(&key, "key").unwrap();
        let input = scenario(dir.path(), "frame", PASSING);
        let runner = SolverRunner::new(RunnerConfig {
            solver: PathBuf::from("sh"),
            license_key: Some(key),
            ..RunnerConfig::default()
        });
        runner.run(&input).await.unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("identity.key")).unwrap(), "key");
    }

    #[tokio::test]
    async fn test_batch_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = scenario(dir.path(), "frame", PASSING);
        let missing = dir.path().join("missing.in");

        let batch = runner().run_batch(&[missing, good]).await;
        assert_eq!(batch.runs.len(), 2);
        assert_eq!(batch.runs[0].status, RunStatus::Failed(None));
        assert_eq!(batch.runs[1].status, RunStatus::Success);
        assert_eq!(batch.succeeded(), 1);
    }
}
