use crate::index::types::Profile;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "fts";
const CONFIG_FILE: &str = "config.json";

/// Application configuration stored in the app config directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage profile used when none is given on the command line
    #[serde(default)]
    pub default_profile: Profile,

    /// Socket the IPC driver probes and `fts serve` binds.
    /// If None, resolved by `server::get_socket_path`.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    /// Read/write deadline for IPC round-trips
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,

    /// Directory holding `*.fts` segments. If None, `<data_dir>/fts/segments`.
    #[serde(default)]
    pub segment_dir: Option<PathBuf>,

    /// Default result limit for CLI searches
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Iterations per query when sampling latency
    #[serde(default = "default_bench_iterations")]
    pub bench_iterations: usize,

    /// Concurrency levels swept by the throughput phase
    #[serde(default = "default_bench_concurrency")]
    pub bench_concurrency: Vec<usize>,

    /// Wall-clock duration of each throughput run
    #[serde(default = "default_bench_duration_secs")]
    pub bench_duration_secs: u64,
}

fn default_io_timeout_secs() -> u64 {
    30
}

fn default_search_limit() -> usize {
    10
}

fn default_bench_iterations() -> usize {
    100
}

fn default_bench_concurrency() -> Vec<usize> {
    vec![1, 4, 8]
}

fn default_bench_duration_secs() -> u64 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_profile: Profile::default(),
            socket_path: None,
            io_timeout_secs: default_io_timeout_secs(),
            segment_dir: None,
            search_limit: default_search_limit(),
            bench_iterations: default_bench_iterations(),
            bench_concurrency: default_bench_concurrency(),
            bench_duration_secs: default_bench_duration_secs(),
        }
    }
}

impl AppConfig {
    /// Load config from the app config directory, or return default if not found
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load config from an explicit path, or return default if the file does not exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
            let config: AppConfig = serde_json::from_str(&content)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs.max(1))
    }

    /// Resolve the segment directory (config value or app data default)
    pub fn effective_segment_dir(&self) -> Result<PathBuf> {
        match &self.segment_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(get_app_data_dir()?.join("segments")),
        }
    }

    /// Resolve the IPC socket path (config value or per-user runtime default)
    pub fn effective_socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(crate::server::get_socket_path)
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join(APP_NAME).join(CONFIG_FILE))
}

/// Get the application data directory for storing segments and reports
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir()
            .map(|h| h.join("Library").join("Application Support"))
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}
