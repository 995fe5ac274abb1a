//! Bootstrap configuration loading and data folder resolution
//!
//! The TOML file holds everything needed before a run can start: where the
//! data lives, logging, remote credentials (as a fallback to the
//! environment), pipeline tunables and the label schema override.
//!
//! # Sources Priority
//!
//! 1. Command-line arguments (`--config`, `--data-folder`)
//! 2. Environment variables (`VSYNC_CONFIG`, `VSYNC_DATA_FOLDER`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "VSYNC_CONFIG";

/// Environment variable naming the data folder
pub const DATA_FOLDER_ENV_VAR: &str = "VSYNC_DATA_FOLDER";

/// Bootstrap configuration loaded from TOML file
///
/// Read once at startup. Changing it requires a restart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder holding crawled datasets (optional)
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Remote service credentials and identifiers (optional, ENV wins)
    #[serde(default)]
    pub remote: RemoteSection,

    /// Pipeline tunables (optional)
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Daily schedule (optional)
    #[serde(default)]
    pub schedule: ScheduleSection,

    /// Label schema override; compiled default is used when absent
    #[serde(default)]
    pub labels: Option<Vec<LabelEntry>>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Credentials and identifiers for the remote vision service
///
/// Every field may also come from the environment, which takes priority.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSection {
    pub training_endpoint: Option<String>,
    pub training_key: Option<String>,
    pub prediction_endpoint: Option<String>,
    pub prediction_key: Option<String>,
    /// Project whose published iteration produces detections
    pub prediction_project_id: Option<String>,
    /// Project that receives uploads and training requests
    pub upload_project_id: Option<String>,
    /// Prediction resource that published iterations are bound to
    pub prediction_resource_id: Option<String>,
}

/// Pipeline tunables
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_iteration_prefix")]
    pub iteration_prefix: String,
    #[serde(default = "default_advanced_training")]
    pub advanced_training: bool,
    /// Prefix of dataset folders produced by the crawler
    #[serde(default = "default_dataset_prefix")]
    pub dataset_prefix: String,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            iteration_prefix: default_iteration_prefix(),
            advanced_training: default_advanced_training(),
            dataset_prefix: default_dataset_prefix(),
        }
    }
}

/// Daily schedule settings
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSection {
    /// Local wall-clock time, `HH:MM`
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            daily_at: default_daily_at(),
        }
    }
}

/// One label definition as written in TOML
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelEntry {
    pub name: String,
    pub id: u32,
    pub threshold: f64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_page_size() -> usize {
    256
}

fn default_batch_size() -> usize {
    64
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_poll_timeout_secs() -> u64 {
    3600
}

fn default_iteration_prefix() -> String {
    "Iteration".to_string()
}

fn default_advanced_training() -> bool {
    true
}

fn default_dataset_prefix() -> String {
    "youtube_trending_".to_string()
}

fn default_daily_at() -> String {
    "03:00".to_string()
}

/// Locate the TOML config file
///
/// Returns `None` when no candidate exists; a missing file is not an error.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("vsync").join("vsync.toml"))
        .filter(|p| p.exists())
}

/// Load TOML config, falling back to defaults when the file is missing
///
/// A file that exists but does not parse is an error: silently ignoring it
/// would run against the wrong project.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolve the data folder
///
/// Priority: CLI → `VSYNC_DATA_FOLDER` → TOML `data_folder` → platform default
pub fn resolve_data_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.data_folder {
        return path.clone();
    }

    default_data_folder()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vsync").join("data"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}
