use std::path::{Path, PathBuf};
use std::time::Duration;

/// Solver invocation settings, read once from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Solver executable (`SAFIR_PATH`)
    pub solver: PathBuf,
    /// Run the solver through wine (`SAFIR_WINE`)
    pub wine: bool,
    /// Kill the solver after this long (`SAFIR_TIMEOUT_SECS`)
    pub timeout: Option<Duration>,
    /// Licence key linked as `identity.key` next to the input (`SAFIR_LICENSE_KEY`)
    pub license_key: Option<PathBuf>,
    /// Write `<chid>_fixed.XML` after a successful run (`SAFIR_FIX_XML`)
    pub fix_xml: bool,
    /// Copy inputs and results here for debugging (`SAFIR_DEBUG_EXPORT`)
    pub debug_export: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            solver: PathBuf::from("safir"),
            wine: false,
            timeout: None,
            license_key: None,
            fix_xml: true,
            debug_export: None,
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; unset or unparsable values keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("SAFIR_PATH") {
            // The solver runs from the input directory, so relative paths would break
            let path = PathBuf::from(path);
            config.solver = std::fs::canonicalize(&path).unwrap_or(path);
        } else if Path::new("./bin/safir").exists() {
            config.solver = std::fs::canonicalize("./bin/safir").unwrap_or_else(|_| PathBuf::from("./bin/safir"));
        }
        if let Some(value) = lookup("SAFIR_WINE") {
            config.wine = flag(&value);
        }
        if let Some(value) = lookup("SAFIR_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(0) => config.timeout = None,
                Ok(secs) => config.timeout = Some(Duration::from_secs(secs)),
                Err(_) => tracing::warn!("Ignoring invalid SAFIR_TIMEOUT_SECS '{}'", value),
            }
        }
        config.license_key = lookup("SAFIR_LICENSE_KEY").map(PathBuf::from);
        if let Some(value) = lookup("SAFIR_FIX_XML") {
            config.fix_xml = flag(&value);
        }
        config.debug_export = lookup("SAFIR_DEBUG_EXPORT").map(PathBuf::from);

        config
    }
}
