//! The complexity gate service.

use std::sync::Arc;

use plangate_abstraction::Collaborator;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::decision::{DecisionEngine, WarningNotice, generate_warning};
use super::scorer::ComplexityScorer;
use super::types::{ActionDecision, ComplexityScore, ModelThresholds, PlanMetrics};
use crate::config::{GateConfig, GateConfigLoader};
use crate::error::Result;
use crate::history::thresholds::{DEFAULT_PROFILE, DEFAULT_THRESHOLDS};
use crate::history::{
    AdaptationResult, Assessment, AssessmentDraft, AssessmentRecorder, Outcome, Statistics, ThresholdAdapter,
    ThresholdStore,
};
use crate::model::ModelDetector;
use crate::phases::{LearningContext, LearningPhase, ProcessPhase, StructurePhase};

/// Everything the host needs after gating a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateOutcome {
    /// The admission decision.
    pub decision: ActionDecision,
    /// Score breakdown.
    pub score: ComplexityScore,
    /// Thresholds the decision used.
    pub thresholds: ModelThresholds,
    /// Operator notice, for scores above the warn threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<WarningNotice>,
    /// The recorded assessment, for audit and outcome reporting.
    pub assessment: Assessment,
    /// True when any phase or the threshold lookup fell back.
    pub degraded: bool,
}

impl GateOutcome {
    /// One-line summary, e.g. `warn (degraded): Score 45 exceeds ...`.
    pub fn summary(&self) -> String {
        let status = if self.degraded { " (degraded)" } else { "" };
        format!("{}{}: {}", self.decision.action, status, self.decision.reason)
    }
}

/// Scores plans, decides how to run them, and learns from their outcomes.
///
/// Owns the collaborator and both durable stores; construct one per data
/// directory and share it behind an `Arc`.
pub struct ComplexityGate {
    config: GateConfig,
    collaborator: Arc<dyn Collaborator>,
    scorer: ComplexityScorer,
    recorder: AssessmentRecorder,
    thresholds: ThresholdStore,
    models: ModelDetector,
}

impl ComplexityGate {
    /// Creates a gate after validating `config`. Performs no I/O.
    pub fn new(config: GateConfig, collaborator: Arc<dyn Collaborator>) -> Result<Self> {
        GateConfigLoader::validate(&config)?;
        Ok(Self {
            recorder: AssessmentRecorder::new(config.history_path()),
            thresholds: ThresholdStore::new(config.thresholds_path()),
            models: ModelDetector::from_config(&config),
            scorer: ComplexityScorer::new(),
            collaborator,
            config,
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The assessment history store.
    pub fn recorder(&self) -> &AssessmentRecorder {
        &self.recorder
    }

    /// The threshold store.
    pub fn threshold_store(&self) -> &ThresholdStore {
        &self.thresholds
    }

    /// The model detector.
    pub fn models(&self) -> &ModelDetector {
        &self.models
    }

    /// Gates a plan for the currently detected model.
    pub async fn gate(&self, metrics: &PlanMetrics) -> Result<GateOutcome> {
        let model_id = self.models.detect_current_model();
        self.models.detect_model_change(&model_id);
        self.gate_for_model(metrics, &model_id).await
    }

    /// Gates a plan against `model_id`'s thresholds.
    ///
    /// Collaborator failures degrade the outcome but never fail it; only a
    /// failure to record the assessment is an error.
    pub async fn gate_for_model(&self, metrics: &PlanMetrics, model_id: &str) -> Result<GateOutcome> {
        let timeouts = self.config.timeouts();
        let collaborator = self.collaborator.as_ref();

        let base = self.scorer.score(metrics);
        let structure =
            StructurePhase::new(collaborator, timeouts, self.config.max_structure_files).run(metrics).await;
        let process = ProcessPhase::new(collaborator, timeouts).run(metrics, &structure).await;
        let score = ComplexityScore::new(base, structure.sub_score, process.sub_score);

        let (thresholds, thresholds_degraded) = self.resolve_thresholds(model_id);
        let decision = DecisionEngine::decide(score.combined, &thresholds);
        let warning = generate_warning(score.combined, &thresholds);

        let learning = LearningPhase::new(collaborator, timeouts)
            .run(LearningContext {
                score: score.combined,
                model_id,
                action: decision.action,
                file_count: metrics.file_list.len(),
            })
            .await;

        let degraded = thresholds_degraded || structure.degraded || process.degraded || learning.degraded;

        let assessment = self.recorder.record(AssessmentDraft {
            plan_path: metrics.plan_path.clone(),
            score: score.combined,
            action: decision.action,
            model_id: model_id.to_string(),
            degraded,
            sub_phase_count: decision.sub_phase_count,
            phases: vec![structure, process, learning],
        })?;

        info!(
            assessment_id = %assessment.id,
            model_id,
            base_score = score.base,
            structural = score.structural,
            process = score.process,
            combined = score.combined,
            action = %decision.action,
            degraded,
            "Gated plan"
        );

        Ok(GateOutcome { decision, score, thresholds, warning, assessment, degraded })
    }

    /// Thresholds for `model_id`, seeding the store on first use. Falls back
    /// to the configured default profile when the store cannot be used.
    fn resolve_thresholds(&self, model_id: &str) -> (ModelThresholds, bool) {
        let lookup = self.thresholds.seed(&self.config.seed_profiles()).and_then(|_| self.thresholds.get(model_id));
        match lookup {
            Ok(thresholds) => (thresholds, false),
            Err(err) => {
                warn!(model_id, error = %err, "Threshold store unavailable, using built-in defaults");
                let values =
                    self.config.seed_profiles().get(DEFAULT_PROFILE).copied().unwrap_or(DEFAULT_THRESHOLDS);
                (ModelThresholds::from_values(model_id, values), true)
            }
        }
    }

    /// Records whether a gated plan succeeded. Each assessment accepts one
    /// outcome.
    pub fn report_outcome(&self, assessment_id: &str, outcome: Outcome) -> Result<Assessment> {
        self.recorder.report_outcome(assessment_id, outcome)
    }

    /// Runs one adaptation step for `model_id`.
    pub fn adapt_thresholds(&self, model_id: &str) -> Result<AdaptationResult> {
        self.thresholds.seed(&self.config.seed_profiles())?;
        ThresholdAdapter::new(&self.recorder, &self.thresholds).adapt(model_id)
    }

    /// Current thresholds for `model_id`, falling back to the default profile.
    pub fn thresholds_for(&self, model_id: &str) -> Result<ModelThresholds> {
        self.thresholds.seed(&self.config.seed_profiles())?;
        self.thresholds.get(model_id)
    }

    /// Cached history statistics.
    pub fn statistics(&self) -> Result<Statistics> {
        self.recorder.statistics()
    }
}
