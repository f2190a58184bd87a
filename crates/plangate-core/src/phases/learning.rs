//! Learning phase: relate this assessment to similar past ones.
//!
//! The phase runs after the decision so the observation it records carries
//! the chosen action. Its sub-score is informational and never feeds back into
//! the combined score.

use plangate_abstraction::{Collaborator, NodeId, Observation, PatternMatch};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{PhaseKind, PhaseResult, PhaseTimeouts, call_with_timeout, run_stage};
use crate::gating::types::{GateAction, round1};

/// Maximum prior patterns retrieved.
pub const PATTERN_LIMIT: usize = 5;
/// Minimum similarity for a prior pattern to be retrieved.
pub const MIN_SIMILARITY: f64 = 0.3;
/// Maximum links from the new observation to prior patterns.
pub const MAX_CONNECTIONS: usize = 3;
/// Link type used for every connection.
pub const LINK_TYPE: &str = "supports";
/// Link strength when a pattern reports no similarity.
pub const DEFAULT_LINK_STRENGTH: f64 = 0.5;

const MAX_INSIGHTS: usize = 3;
const INSIGHT_CONTENT_CHARS: usize = 100;

/// What the learning phase knows about the decision it follows.
#[derive(Debug, Clone, Copy)]
pub struct LearningContext<'a> {
    /// Combined score.
    pub score: f64,
    /// Model profile the decision used.
    pub model_id: &'a str,
    /// The decided action.
    pub action: GateAction,
    /// Files in the plan.
    pub file_count: usize,
}

/// Queries, records and links patterns in the knowledge store.
pub struct LearningPhase<'a> {
    collaborator: &'a dyn Collaborator,
    timeouts: PhaseTimeouts,
}

impl<'a> LearningPhase<'a> {
    /// Creates the phase.
    pub fn new(collaborator: &'a dyn Collaborator, timeouts: PhaseTimeouts) -> Self {
        Self { collaborator, timeouts }
    }

    /// Runs the phase under the stage timeout. Each step tolerates failure
    /// independently; the phase never fails.
    pub async fn run(&self, context: LearningContext<'_>) -> PhaseResult {
        run_stage(PhaseKind::Learning, self.timeouts.stage, self.learn(context), Self::fallback).await
    }

    async fn learn(&self, context: LearningContext<'_>) -> PhaseResult {
        let rounded = context.score.round() as i64;

        let patterns = self.query_patterns(rounded).await;
        let observation_id = self.record_observation(rounded, &context).await;
        let connections_made = match &observation_id {
            Some(id) => self.connect(id, &patterns).await,
            None => 0,
        };

        let sub_score = similarity_score(&patterns);
        let degraded = observation_id.is_none();

        debug!(
            past_pattern_count = patterns.len(),
            connections_made,
            observation_recorded = !degraded,
            learning_score = sub_score,
            "Learning phase complete"
        );

        PhaseResult::new(PhaseKind::Learning, sub_score, degraded)
            .with_detail("pastPatternCount", patterns.len())
            .with_detail("observationId", observation_id.map_or(Value::Null, |id| Value::String(id.0)))
            .with_detail("connectionsMade", connections_made)
            .with_detail("learningApplied", !patterns.is_empty())
            .with_detail("insights", insights(&patterns))
    }

    async fn query_patterns(&self, rounded: i64) -> Vec<PatternMatch> {
        let pattern = format!("complexity score {}", rounded);
        let call = self.collaborator.query_similar(&pattern, PATTERN_LIMIT, MIN_SIMILARITY);
        match call_with_timeout(self.timeouts.collaborator, call).await {
            Ok(mut matches) => {
                matches.truncate(PATTERN_LIMIT);
                matches
            }
            Err(err) => {
                debug!(error = %err, "Pattern query failed");
                Vec::new()
            }
        }
    }

    async fn record_observation(&self, rounded: i64, context: &LearningContext<'_>) -> Option<NodeId> {
        let observation = Observation::new(format!(
            "Complexity assessment: score={}, model={}, action={}",
            rounded, context.model_id, context.action
        ))
        .with_metadata("score", rounded)
        .with_metadata("model", context.model_id)
        .with_metadata("action", context.action.to_string())
        .with_metadata("timestamp", chrono::Utc::now().to_rfc3339())
        .with_metadata("fileCount", context.file_count);

        match call_with_timeout(self.timeouts.collaborator, self.collaborator.create_observation(&observation))
            .await
        {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(collaborator = self.collaborator.name(), error = %err, "Could not record observation");
                None
            }
        }
    }

    async fn connect(&self, from: &NodeId, patterns: &[PatternMatch]) -> usize {
        let mut connections = 0;
        for pattern in patterns.iter().take(MAX_CONNECTIONS) {
            let strength = pattern.similarity.unwrap_or(DEFAULT_LINK_STRENGTH);
            let call = self.collaborator.link(from, &pattern.id, LINK_TYPE, strength);
            match call_with_timeout(self.timeouts.collaborator, call).await {
                Ok(()) => connections += 1,
                Err(err) => debug!(to = %pattern.id, error = %err, "Could not link to pattern"),
            }
        }
        connections
    }

    /// Result used when the phase cannot complete at all.
    pub fn fallback() -> PhaseResult {
        PhaseResult::new(PhaseKind::Learning, 0.0, true)
            .with_detail("pastPatternCount", 0)
            .with_detail("observationId", Value::Null)
            .with_detail("connectionsMade", 0)
            .with_detail("learningApplied", false)
            .with_detail("insights", Value::Array(Vec::new()))
    }
}

/// Mean similarity of the retrieved patterns scaled to 0-10. Missing
/// similarities count as zero.
fn similarity_score(patterns: &[PatternMatch]) -> f64 {
    if patterns.is_empty() {
        return 0.0;
    }
    let total: f64 = patterns.iter().map(|p| p.similarity.unwrap_or(0.0)).sum();
    round1((total / patterns.len() as f64 * 10.0).clamp(0.0, 10.0))
}

fn insights(patterns: &[PatternMatch]) -> Value {
    patterns
        .iter()
        .take(MAX_INSIGHTS)
        .map(|p| {
            let content = p
                .content
                .as_deref()
                .map_or_else(|| "No content".to_string(), |c| c.chars().take(INSIGHT_CONTENT_CHARS).collect());
            json!({ "id": p.id, "similarity": p.similarity.unwrap_or(0.0), "content": content })
        })
        .collect()
}
