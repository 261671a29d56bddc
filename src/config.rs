use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    analyzer::AnalyzerKind,
    error::{Error, Result},
};

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_MAX_RESULTS: usize = 20;
pub const DEFAULT_WRITER_MEMORY: usize = 50_000_000;

/// User settings, read from `config.json` in the data directory.
///
/// Every key is optional; a missing file yields the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitored_folders: Vec<PathBuf>,
    pub debounce_ms: u64,
    pub max_results: usize,
    pub analyzer: AnalyzerKind,
    pub writer_memory_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitored_folders: Vec::new(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_results: DEFAULT_MAX_RESULTS,
            analyzer: AnalyzerKind::default(),
            writer_memory_bytes: DEFAULT_WRITER_MEMORY,
        }
    }
}

impl Config {
    /// Load the config file at `path`, falling back to defaults when it
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw).map_err(|e| {
            Error::Config(format!("cannot parse {}: {e}", path.display()))
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Folders to watch, substituting the default folder when none are
    /// configured.
    pub fn resolved_folders(&self) -> Vec<PathBuf> {
        if self.monitored_folders.is_empty() {
            vec![default_folder()]
        } else {
            self.monitored_folders.clone()
        }
    }
}

/// `<Documents>/Monitor`, or `~/Monitor` when the platform has no
/// documents directory.
pub fn default_folder() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Monitor")
}

/// Create any monitored folder that does not exist yet.
///
/// Returns the folders that had to be created.
pub fn ensure_folders(folders: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for folder in folders {
        if !folder.exists() {
            std::fs::create_dir_all(folder)?;
            created.push(folder.clone());
        }
    }
    Ok(created)
}
