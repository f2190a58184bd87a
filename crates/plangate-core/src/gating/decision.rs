//! Three-way admission decisions and operator warnings.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::split::SplitPlanner;
use super::types::{ActionDecision, GateAction, ModelThresholds, OptionId, WarningOption};

/// Stateless classifier mapping a combined score to an action.
pub struct DecisionEngine;

impl DecisionEngine {
    /// Classifies `combined` against the model's thresholds.
    ///
    /// Bands are `(split, inf)` auto-split, `(warn, split]` warn and
    /// `[0, warn]` execute; a score equal to a threshold takes the lower band.
    pub fn decide(combined: f64, thresholds: &ModelThresholds) -> ActionDecision {
        let decision = if combined > thresholds.split_threshold {
            let sub_phase_count = SplitPlanner::sub_phase_count(combined, thresholds.split_threshold);
            ActionDecision {
                action: GateAction::AutoSplit,
                reason: format!(
                    "Score {} exceeds split threshold {}; splitting into {} sub-phases",
                    combined, thresholds.split_threshold, sub_phase_count
                ),
                sub_phase_count: Some(sub_phase_count),
                options: None,
                recommended: None,
            }
        } else if combined > thresholds.warn_threshold {
            ActionDecision {
                action: GateAction::Warn,
                reason: format!(
                    "Score {} exceeds warn threshold {} (split at {})",
                    combined, thresholds.warn_threshold, thresholds.split_threshold
                ),
                sub_phase_count: None,
                options: Some(WarningOption::standard_set()),
                recommended: Some(OptionId::Proceed),
            }
        } else {
            ActionDecision {
                action: GateAction::Execute,
                reason: format!(
                    "Score {} is within warn threshold {}",
                    combined, thresholds.warn_threshold
                ),
                sub_phase_count: None,
                options: None,
                recommended: None,
            }
        };

        debug!(
            score = combined,
            model_id = %thresholds.model_id,
            warn_threshold = thresholds.warn_threshold,
            split_threshold = thresholds.split_threshold,
            action = %decision.action,
            "Classified plan"
        );

        decision
    }
}

/// How urgent a warning notice is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Score is in the warn band.
    Warning,
    /// Score is above the split threshold.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Operator-facing notice for a plan above the warn threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningNotice {
    /// Warning or critical.
    pub severity: Severity,
    /// The combined score.
    pub score: f64,
    /// The threshold that was exceeded.
    pub threshold: f64,
    /// Human-readable summary.
    pub message: String,
    /// Choices offered to the operator.
    pub options: Vec<WarningOption>,
    /// Suggested choice for this severity.
    pub recommendation: OptionId,
}

/// Builds a warning notice, or `None` when `score <= warn`.
pub fn generate_warning(score: f64, thresholds: &ModelThresholds) -> Option<WarningNotice> {
    if score <= thresholds.warn_threshold {
        return None;
    }

    let critical = score > thresholds.split_threshold;
    let notice = if critical {
        WarningNotice {
            severity: Severity::Critical,
            score,
            threshold: thresholds.split_threshold,
            message: format!(
                "Complexity score {} exceeds {} threshold. Auto-split recommended.",
                score, thresholds.split_threshold
            ),
            options: WarningOption::standard_set(),
            recommendation: OptionId::Split,
        }
    } else {
        WarningNotice {
            severity: Severity::Warning,
            score,
            threshold: thresholds.warn_threshold,
            message: format!(
                "Complexity score {} is in warning range ({}-{}).",
                score, thresholds.warn_threshold, thresholds.split_threshold
            ),
            options: WarningOption::standard_set(),
            recommendation: OptionId::Proceed,
        }
    };

    Some(notice)
}
