//! Error types for the complexity gate.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::history::AssessmentResult;

/// Errors surfaced to the host by gate operations.
///
/// Collaborator failures never appear here: they are recovered inside the
/// phase that made the call.
#[derive(Error, Debug)]
pub enum GateError {
    /// Reading or writing a durable document failed.
    #[error("Persistence failure on {}: {source}", path.display())]
    Persistence {
        /// Document that could not be read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A durable document could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No assessment with this id exists.
    #[error("Assessment not found: {0}")]
    NotFound(String),

    /// The assessment's outcome was already reported.
    #[error("Outcome for assessment {id} already reported as {result}")]
    OutcomeAlreadyReported {
        /// Assessment id.
        id: String,
        /// The outcome previously recorded.
        result: AssessmentResult,
    },

    /// A threshold profile violates its invariants.
    #[error("Invalid thresholds for '{model_id}': {reason}")]
    InvalidThresholds {
        /// Model profile that failed validation.
        model_id: String,
        /// What was wrong.
        reason: String,
    },

    /// A plan could not be split.
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// A store mutex was poisoned by a panicking writer.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Gate configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GateError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence { path: path.into(), source }
    }
}

/// Result type alias for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
