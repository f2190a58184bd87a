//! Assessment history: recording decisions and their outcomes.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use super::store::{Commit, JsonDocument};
use super::types::{Assessment, AssessmentDraft, AssessmentResult, HistoryDocument, Outcome, Statistics};
use crate::error::{GateError, Result};

/// Default history file name inside the data directory.
pub const HISTORY_FILE: &str = "complexity-history.json";

/// Appends assessments to the history document and records outcomes.
pub struct AssessmentRecorder {
    document: JsonDocument<HistoryDocument>,
}

impl AssessmentRecorder {
    /// Creates a recorder backed by the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { document: JsonDocument::new(path) }
    }

    /// Path of the history document.
    pub fn path(&self) -> &Path {
        self.document.path()
    }

    /// Loads the full history. A missing file is an empty history.
    pub fn load(&self) -> Result<HistoryDocument> {
        self.document.read()
    }

    /// Cached statistics.
    pub fn statistics(&self) -> Result<Statistics> {
        Ok(self.load()?.statistics)
    }

    /// Looks up one assessment.
    pub fn get(&self, id: &str) -> Result<Assessment> {
        self.load()?.find(id).cloned().ok_or_else(|| GateError::NotFound(id.to_string()))
    }

    /// Appends a pending assessment and refreshes the cached statistics.
    pub fn record(&self, draft: AssessmentDraft) -> Result<Assessment> {
        let assessment = Assessment {
            id: format!("assess-{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            plan_path: draft.plan_path,
            score: draft.score,
            action: draft.action,
            model_id: draft.model_id,
            result: AssessmentResult::Pending,
            degraded: draft.degraded,
            sub_phase_count: draft.sub_phase_count,
            phases: draft.phases,
        };

        self.document.mutate(|history| {
            history.assessments.push(assessment.clone());
            history.refresh_statistics();
            history.last_updated = Some(assessment.timestamp);
            Ok(((), Commit::Write))
        })?;

        debug!(
            assessment_id = %assessment.id,
            score = assessment.score,
            action = %assessment.action,
            model_id = %assessment.model_id,
            "Recorded assessment"
        );

        Ok(assessment)
    }

    /// Records the outcome of a pending assessment.
    ///
    /// Only `result` changes; statistics are left for the adapter to refresh.
    pub fn report_outcome(&self, id: &str, outcome: Outcome) -> Result<Assessment> {
        let updated = self.document.mutate(|history| {
            let assessment = history
                .assessments
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| GateError::NotFound(id.to_string()))?;

            if assessment.result != AssessmentResult::Pending {
                return Err(GateError::OutcomeAlreadyReported { id: id.to_string(), result: assessment.result });
            }

            assessment.result = outcome.into();
            Ok((assessment.clone(), Commit::Write))
        })?;

        info!(assessment_id = %id, result = %updated.result, "Recorded assessment outcome");
        Ok(updated)
    }

    /// Runs a read-modify-write on the history under the store lock.
    pub(crate) fn transact<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut HistoryDocument) -> Result<(R, Commit)>,
    {
        self.document.mutate(f)
    }

    /// Makes every later history write fail.
    #[cfg(test)]
    pub(crate) fn fail_writes(&self) {
        self.document.fail_writes();
    }
}
