//! Durable history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gating::types::{GateAction, ThresholdValues};
use crate::phases::PhaseResult;

/// Outcome state of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentResult {
    /// Decision made, outcome not yet reported.
    #[default]
    Pending,
    /// The plan ran successfully.
    Success,
    /// The plan failed.
    Failed,
}

impl fmt::Display for AssessmentResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssessmentResult::Pending => write!(f, "pending"),
            AssessmentResult::Success => write!(f, "success"),
            AssessmentResult::Failed => write!(f, "failed"),
        }
    }
}

/// A reported outcome. Only resolved states can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The plan ran successfully.
    Success,
    /// The plan failed.
    Failed,
}

impl From<Outcome> for AssessmentResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => AssessmentResult::Success,
            Outcome::Failed => AssessmentResult::Failed,
        }
    }
}

/// One gating decision, kept for audit and adaptation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    /// `assess-<uuid>`.
    pub id: String,
    /// When the decision was recorded.
    pub timestamp: DateTime<Utc>,
    /// Plan document the decision was about.
    #[serde(default)]
    pub plan_path: Option<String>,
    /// Combined score.
    pub score: f64,
    /// Decided action.
    pub action: GateAction,
    /// Model profile used.
    pub model_id: String,
    /// Reported outcome.
    #[serde(default)]
    pub result: AssessmentResult,
    /// Whether any phase degraded.
    #[serde(default)]
    pub degraded: bool,
    /// Sub-phases, for auto-split decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_phase_count: Option<u32>,
    /// Per-phase results.
    #[serde(default)]
    pub phases: Vec<PhaseResult>,
}

/// The fields of an assessment supplied by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentDraft {
    /// Plan document the decision was about.
    pub plan_path: Option<String>,
    /// Combined score.
    pub score: f64,
    /// Decided action.
    pub action: GateAction,
    /// Model profile used.
    pub model_id: String,
    /// Whether any phase degraded.
    pub degraded: bool,
    /// Sub-phases, for auto-split decisions.
    pub sub_phase_count: Option<u32>,
    /// Per-phase results.
    pub phases: Vec<PhaseResult>,
}

impl AssessmentDraft {
    /// A draft with no plan path, phases or degradation.
    pub fn new(score: f64, action: GateAction, model_id: impl Into<String>) -> Self {
        Self {
            plan_path: None,
            score,
            action,
            model_id: model_id.into(),
            degraded: false,
            sub_phase_count: None,
            phases: Vec::new(),
        }
    }
}

/// A threshold change made by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationRecord {
    /// When the change was made.
    pub timestamp: DateTime<Utc>,
    /// Model profile changed.
    pub model_id: String,
    /// Thresholds before.
    pub old_thresholds: ThresholdValues,
    /// Thresholds after.
    pub new_thresholds: ThresholdValues,
    /// Recommendation that motivated the change.
    pub reason: String,
}

/// Rolling statistics cached in the history document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Statistics {
    /// Number of recorded assessments.
    pub total_assessments: usize,
    /// Auto-split decisions.
    pub auto_splits: usize,
    /// Warn decisions.
    pub warnings: usize,
    /// Mean combined score.
    pub avg_score: f64,
    /// `success / (success + failed)`, refreshed by the adapter.
    pub success_rate: f64,
}

/// The full history document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryDocument {
    /// All assessments, oldest first.
    pub assessments: Vec<Assessment>,
    /// All threshold adaptations, oldest first.
    pub adaptations: Vec<AdaptationRecord>,
    /// Cached statistics.
    pub statistics: Statistics,
    /// Time of the last write.
    pub last_updated: Option<DateTime<Utc>>,
}

impl HistoryDocument {
    /// Recomputes the decision counters and mean score from `assessments`.
    /// `success_rate` is left as-is.
    pub fn refresh_statistics(&mut self) {
        let stats = &mut self.statistics;
        stats.total_assessments = self.assessments.len();
        stats.auto_splits = self.assessments.iter().filter(|a| a.action == GateAction::AutoSplit).count();
        stats.warnings = self.assessments.iter().filter(|a| a.action == GateAction::Warn).count();
        stats.avg_score = if self.assessments.is_empty() {
            0.0
        } else {
            self.assessments.iter().map(|a| a.score).sum::<f64>() / self.assessments.len() as f64
        };
    }

    /// `success / (success + failed)`, or 0 when nothing has resolved.
    pub fn success_rate(&self) -> f64 {
        let success = self.assessments.iter().filter(|a| a.result == AssessmentResult::Success).count();
        let failed = self.assessments.iter().filter(|a| a.result == AssessmentResult::Failed).count();
        if success + failed == 0 {
            0.0
        } else {
            success as f64 / (success + failed) as f64
        }
    }

    /// Finds an assessment by id.
    pub fn find(&self, id: &str) -> Option<&Assessment> {
        self.assessments.iter().find(|a| a.id == id)
    }

    /// The most recent adaptation for `model_id`.
    pub fn last_adaptation(&self, model_id: &str) -> Option<&AdaptationRecord> {
        self.adaptations.iter().rev().find(|r| r.model_id == model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(id: &str, score: f64, action: GateAction, result: AssessmentResult) -> Assessment {
        Assessment {
            id: id.to_string(),
            timestamp: Utc::now(),
            plan_path: None,
            score,
            action,
            model_id: "default".to_string(),
            result,
            degraded: false,
            sub_phase_count: None,
            phases: Vec::new(),
        }
    }

    #[test]
    fn test_refresh_statistics() {
        let mut doc = HistoryDocument::default();
        doc.assessments.push(assessment("a", 20.0, GateAction::Execute, AssessmentResult::Pending));
        doc.assessments.push(assessment("b", 55.0, GateAction::Warn, AssessmentResult::Success));
        doc.assessments.push(assessment("c", 80.0, GateAction::AutoSplit, AssessmentResult::Failed));
        doc.refresh_statistics();

        assert_eq!(doc.statistics.total_assessments, 3);
        assert_eq!(doc.statistics.warnings, 1);
        assert_eq!(doc.statistics.auto_splits, 1);
        assert_eq!(doc.statistics.avg_score, 155.0 / 3.0);
        assert_eq!(doc.statistics.success_rate, 0.0);
        assert_eq!(doc.success_rate(), 0.5);
    }

    #[test]
    fn test_success_rate_without_outcomes() {
        let mut doc = HistoryDocument::default();
        doc.assessments.push(assessment("a", 20.0, GateAction::Execute, AssessmentResult::Pending));
        assert_eq!(doc.success_rate(), 0.0);
    }

    #[test]
    fn test_document_tolerates_missing_fields() {
        let doc: HistoryDocument = serde_json::from_str(r#"{"assessments": []}"#).unwrap();
        assert!(doc.adaptations.is_empty());
        assert!(doc.last_updated.is_none());
    }

    #[test]
    fn test_result_serialization() {
        assert_eq!(serde_json::to_string(&AssessmentResult::Failed).unwrap(), "\"failed\"");
        assert_eq!(AssessmentResult::from(Outcome::Success), AssessmentResult::Success);
        assert_eq!(AssessmentResult::default(), AssessmentResult::Pending);
    }
}
