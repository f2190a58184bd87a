//! Gate configuration loaded from TOML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::gating::types::{ModelThresholds, ThresholdValues};
use crate::history::thresholds::{DEFAULT_PROFILE, DEFAULT_THRESHOLDS, ThresholdDocument, builtin_profiles};
use crate::history::{HISTORY_FILE, THRESHOLDS_FILE};
use crate::model::{DEFAULT_MODEL, DEFAULT_MODEL_ENV_VAR};
use crate::phases::PhaseTimeouts;
use crate::phases::structure::DEFAULT_MAX_FILES;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for a [`ComplexityGate`](crate::ComplexityGate).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Directory holding the history, threshold and model-tracking files.
    pub data_dir: PathBuf,
    /// History document file name.
    pub history_file: String,
    /// Threshold document file name.
    pub thresholds_file: String,
    /// Bound on each collaborator call, in milliseconds.
    pub collaborator_timeout_ms: u64,
    /// Bound on each analysis phase, in milliseconds.
    pub stage_timeout_ms: u64,
    /// Files summarized by the structure phase.
    pub max_structure_files: usize,
    /// Environment variable naming the current model.
    pub model_env_var: String,
    /// Model used when nothing else names one.
    pub default_model: String,
    /// Profiles written when the threshold document does not exist.
    pub thresholds: BTreeMap<String, ThresholdValues>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".planning"),
            history_file: HISTORY_FILE.to_string(),
            thresholds_file: THRESHOLDS_FILE.to_string(),
            collaborator_timeout_ms: 5000,
            stage_timeout_ms: 15_000,
            max_structure_files: DEFAULT_MAX_FILES,
            model_env_var: DEFAULT_MODEL_ENV_VAR.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            thresholds: builtin_profiles(),
        }
    }
}

impl GateConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Self::default() }
    }

    /// Path of the history document.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }

    /// Path of the threshold document.
    pub fn thresholds_path(&self) -> PathBuf {
        self.data_dir.join(&self.thresholds_file)
    }

    /// Phase timeouts.
    pub fn timeouts(&self) -> PhaseTimeouts {
        PhaseTimeouts {
            collaborator: Duration::from_millis(self.collaborator_timeout_ms),
            stage: Duration::from_millis(self.stage_timeout_ms),
        }
    }

    /// Seed profiles with the default key guaranteed.
    pub fn seed_profiles(&self) -> ThresholdDocument {
        let mut profiles = self.thresholds.clone();
        profiles.entry(DEFAULT_PROFILE.to_string()).or_insert(DEFAULT_THRESHOLDS);
        profiles
    }
}

/// Configuration loader for gate settings.
pub struct GateConfigLoader;

impl GateConfigLoader {
    /// Loads configuration from a TOML file and validates it.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<GateConfig> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn parse(content: &str) -> Result<GateConfig> {
        let config: GateConfig = toml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validates configuration.
    pub fn validate(config: &GateConfig) -> Result<()> {
        if config.collaborator_timeout_ms == 0 {
            return Err(ConfigError::Validation("collaborator_timeout_ms must be greater than 0".to_string()));
        }
        if config.stage_timeout_ms < config.collaborator_timeout_ms {
            return Err(ConfigError::Validation(format!(
                "stage_timeout_ms ({}) must be >= collaborator_timeout_ms ({})",
                config.stage_timeout_ms, config.collaborator_timeout_ms
            )));
        }
        if config.max_structure_files == 0 {
            return Err(ConfigError::Validation("max_structure_files must be at least 1".to_string()));
        }
        if config.history_file.trim().is_empty() || config.thresholds_file.trim().is_empty() {
            return Err(ConfigError::Validation("document file names must not be empty".to_string()));
        }
        if config.history_file == config.thresholds_file {
            return Err(ConfigError::Validation(format!(
                "history_file and thresholds_file must differ (both '{}')",
                config.history_file
            )));
        }
        if config.model_env_var.trim().is_empty() {
            return Err(ConfigError::Validation("model_env_var must not be empty".to_string()));
        }
        if config.default_model.trim().is_empty() {
            return Err(ConfigError::Validation("default_model must not be empty".to_string()));
        }

        for (model_id, values) in &config.thresholds {
            ModelThresholds::from_values(model_id.clone(), *values)
                .validate()
                .map_err(|e| ConfigError::Validation(e.to_string()))?;
        }

        Ok(())
    }
}
