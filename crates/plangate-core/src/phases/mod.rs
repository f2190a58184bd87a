//! Analysis phases run between base scoring and the decision.
//!
//! Each phase asks a [`Collaborator`](plangate_abstraction::Collaborator) for
//! data, falls back to a heuristic when the collaborator fails or times out,
//! and never returns an error to the pipeline.

pub mod learning;
pub mod process;
pub mod structure;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use plangate_abstraction::{CollaboratorError, CollaboratorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub use learning::{LearningContext, LearningPhase};
pub use process::ProcessPhase;
pub use structure::StructurePhase;

/// Which analysis phase produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    /// Per-file structural analysis.
    Structure,
    /// Dependency and cross-file impact analysis.
    Process,
    /// Pattern-store lookup and observation recording.
    Learning,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::Structure => write!(f, "structure"),
            PhaseKind::Process => write!(f, "process"),
            PhaseKind::Learning => write!(f, "learning"),
        }
    }
}

/// Output of one analysis phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    /// The phase.
    pub phase: PhaseKind,
    /// Bounded sub-score, rounded to one decimal.
    pub sub_score: f64,
    /// True when a heuristic replaced collaborator data.
    pub degraded: bool,
    /// Phase-specific detail for the audit trail.
    #[serde(default)]
    pub detail: BTreeMap<String, Value>,
}

impl PhaseResult {
    /// Creates a result with empty detail.
    pub fn new(phase: PhaseKind, sub_score: f64, degraded: bool) -> Self {
        Self { phase, sub_score, degraded, detail: BTreeMap::new() }
    }

    /// Adds a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.detail.insert(key.to_string(), value.into());
        self
    }

    /// Reads a detail entry as `f64`.
    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.detail.get(key).and_then(Value::as_f64)
    }
}

/// Timeouts applied while running phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeouts {
    /// Bound on each collaborator call.
    pub collaborator: Duration,
    /// Bound on a whole phase.
    pub stage: Duration,
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self { collaborator: Duration::from_millis(5000), stage: Duration::from_millis(15_000) }
    }
}

/// Runs a collaborator call under `limit`. Elapsed calls become
/// [`CollaboratorError::Timeout`].
pub(crate) async fn call_with_timeout<T, F>(limit: Duration, call: F) -> CollaboratorResult<T>
where
    F: Future<Output = CollaboratorResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout(limit.as_millis() as u64)),
    }
}

/// Runs a whole phase under `limit`, substituting `fallback` when it elapses.
pub(crate) async fn run_stage<F>(
    phase: PhaseKind,
    limit: Duration,
    stage: F,
    fallback: impl FnOnce() -> PhaseResult,
) -> PhaseResult
where
    F: Future<Output = PhaseResult>,
{
    if let Ok(result) = tokio::time::timeout(limit, stage).await {
        result
    } else {
        warn!(phase = %phase, timeout_ms = limit.as_millis() as u64, "Phase timed out, using fallback");
        let mut result = fallback();
        result.degraded = true;
        result.detail.insert("timedOut".to_string(), Value::Bool(true));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_with_timeout_passes_result_through() {
        let result = call_with_timeout(Duration::from_millis(100), async { Ok::<_, CollaboratorError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_call_with_timeout_elapses() {
        let result: CollaboratorResult<u32> = call_with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1)
        })
        .await;
        assert!(matches!(result, Err(CollaboratorError::Timeout(10))));
    }

    #[tokio::test]
    async fn test_run_stage_uses_degraded_fallback() {
        let result = run_stage(
            PhaseKind::Process,
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                PhaseResult::new(PhaseKind::Process, 9.0, false)
            },
            || PhaseResult::new(PhaseKind::Process, 5.0, false),
        )
        .await;
        assert_eq!(result.sub_score, 5.0);
        assert!(result.degraded);
        assert_eq!(result.detail.get("timedOut"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_phase_result_serializes_camel_case() {
        let result = PhaseResult::new(PhaseKind::Structure, 2.4, true).with_detail("fileCount", 3);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["phase"], "structure");
        assert_eq!(json["subScore"], 2.4);
        assert_eq!(json["detail"]["fileCount"], 3);
        assert_eq!(result.detail_f64("fileCount"), Some(3.0));
    }
}
