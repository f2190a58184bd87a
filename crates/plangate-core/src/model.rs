//! Detection of the model a plan will run on.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::GateConfig;

/// Model used when neither the environment nor the planning config names one.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Environment variable consulted first.
pub const DEFAULT_MODEL_ENV_VAR: &str = "CLAUDE_MODEL";

/// Planning config file inside the data directory.
pub const PLANNING_CONFIG_FILE: &str = "config.json";

/// File remembering the model of the previous session.
pub const LAST_MODEL_FILE: &str = ".last-model";

/// Expands a short model name to its full id; other names pass through.
pub fn resolve_model_alias(name: &str) -> String {
    match name.to_lowercase().as_str() {
        "haiku" => "claude-haiku-4-5-20251001".to_string(),
        "sonnet" => "claude-sonnet-4-5-20250929".to_string(),
        "opus" => "claude-opus-4-6".to_string(),
        _ => name.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct PlanningConfig {
    #[serde(default)]
    executor_model: Option<String>,
}

/// Resolves the current model and tracks changes between sessions.
#[derive(Debug, Clone)]
pub struct ModelDetector {
    data_dir: PathBuf,
    env_var: String,
    default_model: String,
}

impl ModelDetector {
    /// Creates a detector.
    pub fn new(data_dir: impl Into<PathBuf>, env_var: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self { data_dir: data_dir.into(), env_var: env_var.into(), default_model: default_model.into() }
    }

    /// Creates a detector from gate configuration.
    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(&config.data_dir, &config.model_env_var, &config.default_model)
    }

    /// Data directory holding the planning config and tracking file.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Current model: environment variable, then `executor_model` in the
    /// planning config, then the default.
    pub fn detect_current_model(&self) -> String {
        self.resolve(std::env::var(&self.env_var).ok())
    }

    /// Resolution with the environment value supplied by the caller.
    pub fn resolve(&self, env_value: Option<String>) -> String {
        if let Some(model) = env_value.filter(|m| !m.trim().is_empty()) {
            debug!(env_var = %self.env_var, model = %model, "Model from environment");
            return model.trim().to_string();
        }

        if let Some(model) = self.model_from_planning_config() {
            debug!(model = %model, "Model from planning config");
            return model;
        }

        debug!(model = %self.default_model, "Using default model");
        self.default_model.clone()
    }

    fn model_from_planning_config(&self) -> Option<String> {
        let path = self.data_dir.join(PLANNING_CONFIG_FILE);
        let content = fs::read_to_string(&path).ok()?;
        let config: PlanningConfig = match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "Ignoring unreadable planning config");
                return None;
            }
        };
        config.executor_model.filter(|m| !m.trim().is_empty()).map(|m| resolve_model_alias(m.trim()))
    }

    /// Compares `current_model` with the previous session's model and
    /// records it. Returns true on a change or the first run, false when
    /// unchanged or when the tracking file cannot be read or written.
    pub fn detect_model_change(&self, current_model: &str) -> bool {
        let path = self.data_dir.join(LAST_MODEL_FILE);

        let last_model = match fs::read_to_string(&path) {
            Ok(content) => Some(content.trim().to_string()).filter(|m| !m.is_empty()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "Could not read last model");
                return false;
            }
        };

        if let Some(last) = &last_model
            && last != current_model
        {
            info!(from = %last, to = %current_model, "Model changed");
        }

        if let Err(err) = fs::create_dir_all(&self.data_dir).and_then(|()| fs::write(&path, current_model)) {
            debug!(path = %path.display(), error = %err, "Could not record current model");
            return false;
        }

        last_model.as_deref() != Some(current_model)
    }
}
