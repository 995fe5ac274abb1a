//! Run configuration for vsync
//!
//! Resolves credentials and identifiers with ENV → TOML priority and bundles
//! them with pipeline tunables and the label schema into one immutable
//! [`SyncConfig`]. Every component receives what it needs from this object
//! at construction; nothing reads the environment later.

use std::time::Duration;
use tracing::{info, warn};
use vsync_common::config::TomlConfig;

use crate::error::{SyncError, SyncResult};
use crate::models::LabelSchema;

pub const ENV_TRAINING_ENDPOINT: &str = "AZURE_TRAINING_ENDPOINT";
pub const ENV_TRAINING_KEY: &str = "AZURE_TRAINING_KEY";
pub const ENV_PREDICTION_ENDPOINT: &str = "AZURE_PREDICTION_ENDPOINT";
pub const ENV_PREDICTION_KEY: &str = "AZURE_PREDICTION_KEY";
pub const ENV_PREDICTION_PROJECT_ID: &str = "AZURE_PREDICTION_PROJECT_ID";
pub const ENV_UPLOAD_PROJECT_ID: &str = "AZURE_UPLOADER_PROJECT_ID";
pub const ENV_PREDICTION_RESOURCE_ID: &str = "AZURE_PREDICTION_RESOURCE_ID";

/// Endpoint + key pair for one remote API surface
#[derive(Clone)]
pub struct Credentials {
    pub endpoint: String,
    pub key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Training-status polling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(3600),
        }
    }
}

/// Pipeline tunables
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Page size when listing remote images
    pub page_size: usize,
    /// Maximum images per upload request
    pub batch_size: usize,
    pub poll: PollPolicy,
    /// Iteration names are `{prefix}-{n}`
    pub iteration_prefix: String,
    pub advanced_training: bool,
    /// Dataset folders produced by the crawler start with this
    pub dataset_prefix: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_toml(toml_config: &TomlConfig) -> Self {
        let section = &toml_config.pipeline;
        Self {
            page_size: section.page_size.max(1),
            batch_size: section.batch_size.max(1),
            poll: PollPolicy {
                interval: Duration::from_secs(section.poll_interval_secs.max(1)),
                timeout: Duration::from_secs(section.poll_timeout_secs),
            },
            iteration_prefix: section.iteration_prefix.clone(),
            advanced_training: section.advanced_training,
            dataset_prefix: section.dataset_prefix.clone(),
        }
    }
}

/// Immutable configuration for one process
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub training: Credentials,
    pub prediction: Credentials,
    /// Project validated against the schema and used for detection
    pub prediction_project_id: String,
    /// Project receiving uploads and training requests
    pub upload_project_id: String,
    pub prediction_resource_id: String,
    pub pipeline: PipelineSettings,
    pub labels: LabelSchema,
}

impl SyncConfig {
    /// Resolve from the process environment and the TOML config
    pub fn resolve(toml_config: &TomlConfig) -> SyncResult<Self> {
        Self::resolve_with(toml_config, |key| std::env::var(key).ok())
    }

    /// Resolve using an explicit environment lookup
    ///
    /// Every missing key is collected so a single error names them all.
    pub fn resolve_with<F>(toml_config: &TomlConfig, env: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let remote = &toml_config.remote;
        let mut missing = Vec::new();

        let mut lookup = |env_key: &str, toml_value: &Option<String>| -> String {
            match resolve_value(env_key, env(env_key), toml_value.as_deref()) {
                Some(value) => value,
                None => {
                    missing.push(env_key.to_string());
                    String::new()
                }
            }
        };

        let training_endpoint = lookup(ENV_TRAINING_ENDPOINT, &remote.training_endpoint);
        let training_key = lookup(ENV_TRAINING_KEY, &remote.training_key);
        let prediction_endpoint = lookup(ENV_PREDICTION_ENDPOINT, &remote.prediction_endpoint);
        let prediction_key = lookup(ENV_PREDICTION_KEY, &remote.prediction_key);
        let prediction_project_id =
            lookup(ENV_PREDICTION_PROJECT_ID, &remote.prediction_project_id);
        let upload_project_id = lookup(ENV_UPLOAD_PROJECT_ID, &remote.upload_project_id);
        let prediction_resource_id =
            lookup(ENV_PREDICTION_RESOURCE_ID, &remote.prediction_resource_id);

        if !missing.is_empty() {
            return Err(SyncError::ConfigMissing { keys: missing });
        }

        let labels = match &toml_config.labels {
            Some(entries) => {
                info!("Label schema loaded from config ({} labels)", entries.len());
                LabelSchema::from_entries(entries)?
            }
            None => LabelSchema::default_schema(),
        };

        Ok(Self {
            training: Credentials {
                endpoint: training_endpoint,
                key: training_key,
            },
            prediction: Credentials {
                endpoint: prediction_endpoint,
                key: prediction_key,
            },
            prediction_project_id,
            upload_project_id,
            prediction_resource_id,
            pipeline: PipelineSettings::from_toml(toml_config),
            labels,
        })
    }
}

/// Validate a config value (non-empty, non-whitespace)
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

fn resolve_value(key: &str, env_value: Option<String>, toml_value: Option<&str>) -> Option<String> {
    let env_value = env_value.filter(|v| is_valid_value(v));
    let toml_value = toml_value.filter(|v| is_valid_value(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!("{} set in both environment and TOML; using environment", key);
    }

    env_value
        .map(|v| v.trim().to_string())
        .or_else(|| toml_value.map(|v| v.trim().to_string()))
}
