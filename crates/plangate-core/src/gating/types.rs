//! Types for the gating pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GateError, Result};

/// Minimum allowed warn threshold; adaptation never goes below it.
pub const WARN_THRESHOLD_FLOOR: f64 = 30.0;

/// Minimum allowed split threshold; adaptation never goes below it.
pub const SPLIT_THRESHOLD_FLOOR: f64 = 50.0;

/// Rounds to one decimal place, the precision every score is reported at.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Metrics extracted from a plan document by the host.
///
/// Missing fields deserialize as zero/empty; the struct is never mutated
/// after it is handed to the gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanMetrics {
    /// Number of file reads/writes the plan performs.
    #[serde(alias = "file_ops")]
    pub file_ops: u32,
    /// Number of symbol extraction queries.
    #[serde(alias = "symbol_queries")]
    pub symbol_queries: u32,
    /// Number of code-graph queries.
    #[serde(alias = "cg_queries")]
    pub cg_queries: u32,
    /// Number of tasks in the plan.
    #[serde(alias = "task_count")]
    pub task_count: u32,
    /// Number of cross-references between tasks/files.
    #[serde(alias = "cross_refs")]
    pub cross_refs: u32,
    /// Files the plan touches, in plan order.
    #[serde(alias = "file_list", alias = "files")]
    pub file_list: Vec<String>,
    /// Path of the plan document, for the audit trail.
    #[serde(alias = "plan_path", skip_serializing_if = "Option::is_none")]
    pub plan_path: Option<String>,
    /// Project root used as context for dependency queries.
    #[serde(alias = "project_path", skip_serializing_if = "Option::is_none")]
    pub project_path: Option<String>,
}

impl PlanMetrics {
    /// Creates metrics from the five counters, with no files.
    #[must_use]
    pub fn new(file_ops: u32, symbol_queries: u32, cg_queries: u32, task_count: u32, cross_refs: u32) -> Self {
        Self { file_ops, symbol_queries, cg_queries, task_count, cross_refs, ..Self::default() }
    }

    /// Sets the file list.
    #[must_use]
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_list = files.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the plan path.
    #[must_use]
    pub fn with_plan_path(mut self, path: impl Into<String>) -> Self {
        self.plan_path = Some(path.into());
        self
    }
}

/// Score breakdown for one gating request. All values are rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    /// Base score from plan metrics alone (0-100 scale, unclamped).
    pub base: f64,
    /// Structural sub-score (1-10).
    pub structural: f64,
    /// Process sub-score (5-10).
    pub process: f64,
    /// Blended score compared against thresholds.
    pub combined: f64,
}

impl ComplexityScore {
    /// Creates a score, deriving `combined` from the three inputs.
    #[must_use]
    pub fn new(base: f64, structural: f64, process: f64) -> Self {
        Self {
            base: round1(base),
            structural: round1(structural),
            process: round1(process),
            combined: super::combiner::ScoreCombiner::combine(base, structural, process),
        }
    }
}

/// The admission decision for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateAction {
    /// Run the plan as-is.
    Execute,
    /// Run, but ask the operator first.
    Warn,
    /// Split the plan into sub-phases before running.
    AutoSplit,
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateAction::Execute => write!(f, "execute"),
            GateAction::Warn => write!(f, "warn"),
            GateAction::AutoSplit => write!(f, "auto-split"),
        }
    }
}

/// Identifier of an operator choice offered with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionId {
    /// Run the plan unchanged.
    Proceed,
    /// Split the plan into sub-phases.
    Split,
    /// Hand the plan to a human for review.
    Manual,
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionId::Proceed => write!(f, "proceed"),
            OptionId::Split => write!(f, "split"),
            OptionId::Manual => write!(f, "manual"),
        }
    }
}

/// Risk level attached to an operator choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
}

/// One operator choice offered with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningOption {
    /// Choice identifier.
    pub id: OptionId,
    /// Label for display.
    pub label: String,
    /// Risk of taking this choice.
    pub risk: Risk,
    /// Whether this choice is the generally recommended one.
    #[serde(default)]
    pub recommended: bool,
}

impl WarningOption {
    /// The three standard choices: proceed, split (recommended), manual.
    pub fn standard_set() -> Vec<Self> {
        vec![
            Self { id: OptionId::Proceed, label: "Proceed anyway".to_string(), risk: Risk::High, recommended: false },
            Self { id: OptionId::Split, label: "Split into sub-phases".to_string(), risk: Risk::Low, recommended: true },
            Self { id: OptionId::Manual, label: "Manual review".to_string(), risk: Risk::Medium, recommended: false },
        ]
    }
}

/// Result of classifying a combined score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDecision {
    /// The chosen action.
    pub action: GateAction,
    /// Why, citing the score and the threshold compared.
    pub reason: String,
    /// Number of sub-phases (1..=5), only for auto-split.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_phase_count: Option<u32>,
    /// Operator choices, only for warn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<WarningOption>>,
    /// Default choice the operator is steered to, only for warn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended: Option<OptionId>,
}

impl ActionDecision {
    /// Returns true if the plan should be split.
    pub fn should_split(&self) -> bool {
        self.action == GateAction::AutoSplit
    }

    /// Returns true if the operator should be warned.
    pub fn should_warn(&self) -> bool {
        self.action == GateAction::Warn
    }

    /// Returns true if the plan can run unchanged.
    pub fn can_proceed(&self) -> bool {
        self.action == GateAction::Execute
    }
}

/// A warn/split pair as stored in the threshold document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdValues {
    /// Scores above this warn.
    pub warn_threshold: f64,
    /// Scores above this auto-split.
    pub split_threshold: f64,
}

/// Warn/split thresholds for one model profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelThresholds {
    /// Model id, or "default".
    pub model_id: String,
    /// Scores above this warn.
    pub warn_threshold: f64,
    /// Scores above this auto-split.
    pub split_threshold: f64,
}

impl ModelThresholds {
    /// Creates a threshold profile without validating it.
    pub fn new(model_id: impl Into<String>, warn_threshold: f64, split_threshold: f64) -> Self {
        Self { model_id: model_id.into(), warn_threshold, split_threshold }
    }

    /// Builds a profile from a stored pair.
    pub fn from_values(model_id: impl Into<String>, values: ThresholdValues) -> Self {
        Self::new(model_id, values.warn_threshold, values.split_threshold)
    }

    /// The stored pair for this profile.
    pub fn values(&self) -> ThresholdValues {
        ThresholdValues { warn_threshold: self.warn_threshold, split_threshold: self.split_threshold }
    }

    /// Checks `warn < split`, `warn >= 30` and `split >= 50`.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| GateError::InvalidThresholds { model_id: self.model_id.clone(), reason };

        if !self.warn_threshold.is_finite() || !self.split_threshold.is_finite() {
            return Err(invalid("thresholds must be finite".to_string()));
        }
        if self.warn_threshold < WARN_THRESHOLD_FLOOR {
            return Err(invalid(format!(
                "warn threshold {} is below the floor of {}",
                self.warn_threshold, WARN_THRESHOLD_FLOOR
            )));
        }
        if self.split_threshold < SPLIT_THRESHOLD_FLOOR {
            return Err(invalid(format!(
                "split threshold {} is below the floor of {}",
                self.split_threshold, SPLIT_THRESHOLD_FLOOR
            )));
        }
        if self.warn_threshold >= self.split_threshold {
            return Err(invalid(format!(
                "warn threshold {} must be below split threshold {}",
                self.warn_threshold, self.split_threshold
            )));
        }
        Ok(())
    }
}
