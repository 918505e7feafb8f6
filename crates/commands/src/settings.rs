//! Where the TauDEM executables live and how they are launched

use crate::error::{CommandError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Launch configuration shared by every invocation.
///
/// Defaults assume the tools are on `PATH` and are started through
/// `mpiexec -n 4`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the TauDEM executables; empty means "search PATH"
    pub taudem_path: PathBuf,
    /// Prefix every command with the MPI launcher
    pub use_mpi: bool,
    pub mpi_processes: usize,
    /// Directory holding the launcher; empty means "search PATH"
    pub mpi_path: PathBuf,
    pub mpi_cmd: String,
    /// Parent for scratch directories; `None` uses the system temp dir
    pub scratch_root: Option<PathBuf>,
    /// Turn a non-zero tool exit status into [`CommandError::ToolFailed`]
    /// instead of only logging it
    pub check_exit_status: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            taudem_path: PathBuf::new(),
            use_mpi: true,
            mpi_processes: 4,
            mpi_path: PathBuf::new(),
            mpi_cmd: "mpiexec".to_string(),
            scratch_root: None,
            check_exit_status: false,
        }
    }
}

impl Settings {
    /// Run tools directly, without the MPI launcher
    pub fn serial() -> Self {
        Self {
            use_mpi: false,
            ..Self::default()
        }
    }

    /// Load settings from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| CommandError::Settings {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply `TAUDEM_*` environment overrides on top of `self`
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("TAUDEM_PATH") {
            self.taudem_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TAUDEM_USE_MPI") {
            self.use_mpi = parse_bool("TAUDEM_USE_MPI", &v)?;
        }
        if let Some(v) = lookup("TAUDEM_MPI_PROCESSORS") {
            self.mpi_processes = v.trim().parse().map_err(|e| env_error("TAUDEM_MPI_PROCESSORS", e))?;
        }
        if let Some(v) = lookup("TAUDEM_MPI_PATH") {
            self.mpi_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TAUDEM_MPI_CMD") {
            self.mpi_cmd = v;
        }
        if let Some(v) = lookup("TAUDEM_SCRATCH") {
            self.scratch_root = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("TAUDEM_CHECK_EXIT") {
            self.check_exit_status = parse_bool("TAUDEM_CHECK_EXIT", &v)?;
        }
        debug!(settings = ?self, "applied environment overrides");
        Ok(self)
    }

    /// Launcher tokens placed before the executable; empty when MPI is off
    pub fn launcher_prefix(&self) -> Vec<String> {
        if !self.use_mpi {
            return Vec::new();
        }
        vec![
            self.mpi_path.join(&self.mpi_cmd).display().to_string(),
            "-n".to_string(),
            self.mpi_processes.to_string(),
        ]
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(env_error(key, format!("{other:?} is not a boolean"))),
    }
}

fn env_error(key: &str, reason: impl ToString) -> CommandError {
    CommandError::Settings {
        path: PathBuf::from(format!("${key}")),
        reason: reason.to_string(),
    }
}
