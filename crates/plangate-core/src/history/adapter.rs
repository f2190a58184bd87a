//! Threshold adaptation from recorded outcomes.
//!
//! The adapter buckets past assessments by score, looks for buckets whose
//! failure rate exceeds [`PROBLEM_FAILURE_RATE`], and when such a bucket sits
//! just below the model's warn threshold lowers both thresholds by
//! [`ADJUSTMENT_STEP`]. Thresholds never drop below
//! [`WARN_THRESHOLD_FLOOR`] / [`SPLIT_THRESHOLD_FLOOR`].

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::recorder::AssessmentRecorder;
use super::store::Commit;
use super::thresholds::ThresholdStore;
use super::types::{AdaptationRecord, Assessment, AssessmentResult};
use crate::error::Result;
use crate::gating::types::{ModelThresholds, SPLIT_THRESHOLD_FLOOR, ThresholdValues, WARN_THRESHOLD_FLOOR};

/// Assessments required before adapting.
pub const MIN_HISTORY: usize = 10;
/// Width of a score bucket.
pub const BUCKET_WIDTH: f64 = 10.0;
/// Failure rate above which a bucket is a problem range.
pub const PROBLEM_FAILURE_RATE: f64 = 0.3;
/// Amount both thresholds are lowered by.
pub const ADJUSTMENT_STEP: f64 = 5.0;
/// How far below the warn threshold a problem range may start and still count.
pub const OVERLAP_WINDOW: f64 = 10.0;

/// Reason when fewer than [`MIN_HISTORY`] assessments exist.
pub const REASON_INSUFFICIENT_HISTORY: &str = "insufficient history";
/// Reason when nothing was recorded since the model's last adaptation.
pub const REASON_NO_NEW_ASSESSMENTS: &str = "no new assessments since last adaptation";
/// Reason when no bucket fails too often.
pub const REASON_PERFORMING_WELL: &str = "thresholds performing well";
/// Reason when problem buckets are away from the warn threshold.
pub const REASON_NO_OVERLAP: &str = "problem ranges don't overlap with current thresholds";
/// Reason when both thresholds are already at their floors.
pub const REASON_AT_MINIMUM: &str = "thresholds already at minimum";

/// Outcome counts for one score bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBucket {
    /// Lower bound of the bucket, a multiple of 10.
    pub range_start: i64,
    /// Successful outcomes.
    pub success: usize,
    /// Failed outcomes.
    pub failed: usize,
    /// All assessments, pending included.
    pub total: usize,
}

impl ScoreBucket {
    /// `failed / total`.
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.failed as f64 / self.total as f64 }
    }

    /// True when the failure rate exceeds [`PROBLEM_FAILURE_RATE`].
    pub fn is_problem(&self) -> bool {
        self.failure_rate() > PROBLEM_FAILURE_RATE
    }
}

/// Groups assessments into buckets of width 10 by score, ordered by range.
pub fn bucket_assessments(assessments: &[Assessment]) -> Vec<ScoreBucket> {
    let mut buckets: BTreeMap<i64, ScoreBucket> = BTreeMap::new();
    for assessment in assessments {
        let range_start = ((assessment.score / BUCKET_WIDTH).floor() * BUCKET_WIDTH) as i64;
        let bucket = buckets.entry(range_start).or_insert(ScoreBucket { range_start, ..ScoreBucket::default() });
        bucket.total += 1;
        match assessment.result {
            AssessmentResult::Success => bucket.success += 1,
            AssessmentResult::Failed => bucket.failed += 1,
            AssessmentResult::Pending => {}
        }
    }
    buckets.into_values().collect()
}

/// Result of an adaptation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptationResult {
    /// Whether thresholds changed.
    pub adapted: bool,
    /// Why.
    pub reason: String,
    /// Model profile considered.
    pub model_id: String,
    /// New thresholds, when adapted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_thresholds: Option<ThresholdValues>,
    /// Lower bounds of the problem ranges found.
    #[serde(default)]
    pub problem_ranges: Vec<i64>,
}

impl AdaptationResult {
    fn unchanged(model_id: &str, reason: &str, problem_ranges: Vec<i64>) -> Self {
        Self {
            adapted: false,
            reason: reason.to_string(),
            model_id: model_id.to_string(),
            new_thresholds: None,
            problem_ranges,
        }
    }
}

/// Lowers a model's thresholds when outcomes show failures near its warn point.
pub struct ThresholdAdapter<'a> {
    recorder: &'a AssessmentRecorder,
    thresholds: &'a ThresholdStore,
}

impl<'a> ThresholdAdapter<'a> {
    /// Creates an adapter over the given stores.
    pub fn new(recorder: &'a AssessmentRecorder, thresholds: &'a ThresholdStore) -> Self {
        Self { recorder, thresholds }
    }

    /// Runs one adaptation step for `model_id`.
    ///
    /// Returns a non-error result for every "no change" case; only
    /// persistence and validation failures are errors. If the history write
    /// fails after the thresholds were lowered, the previous profile is put
    /// back so no change exists without its adaptation record.
    pub fn adapt(&self, model_id: &str) -> Result<AdaptationResult> {
        let mut lowered_from: Option<Option<ThresholdValues>> = None;
        let transaction = self.recorder.transact(|history| {
            if history.assessments.len() < MIN_HISTORY {
                let result = AdaptationResult::unchanged(model_id, REASON_INSUFFICIENT_HISTORY, Vec::new());
                return Ok((result, Commit::Skip));
            }

            if let Some(last) = history.last_adaptation(model_id) {
                let since = last.timestamp;
                if !history.assessments.iter().any(|a| a.timestamp > since) {
                    let result = AdaptationResult::unchanged(model_id, REASON_NO_NEW_ASSESSMENTS, Vec::new());
                    return Ok((result, Commit::Skip));
                }
            }

            history.statistics.success_rate = history.success_rate();
            history.last_updated = Some(Utc::now());

            let problem_ranges: Vec<i64> = bucket_assessments(&history.assessments)
                .iter()
                .filter(|b| b.is_problem())
                .map(|b| b.range_start)
                .collect();

            if problem_ranges.is_empty() {
                let result = AdaptationResult::unchanged(model_id, REASON_PERFORMING_WELL, problem_ranges);
                return Ok((result, Commit::Write));
            }

            let current = self.thresholds.get(model_id)?;
            let warn = current.warn_threshold;
            let overlapping: Vec<i64> = problem_ranges
                .iter()
                .copied()
                .filter(|&r| (warn - OVERLAP_WINDOW..=warn).contains(&(r as f64)))
                .collect();

            if overlapping.is_empty() {
                debug!(model_id, ?problem_ranges, warn_threshold = warn, "Problem ranges away from warn threshold");
                let result = AdaptationResult::unchanged(model_id, REASON_NO_OVERLAP, problem_ranges);
                return Ok((result, Commit::Write));
            }

            let lowered = ModelThresholds::new(
                model_id,
                (current.warn_threshold - ADJUSTMENT_STEP).max(WARN_THRESHOLD_FLOOR),
                (current.split_threshold - ADJUSTMENT_STEP).max(SPLIT_THRESHOLD_FLOOR),
            );

            if lowered.values() == current.values() {
                let result = AdaptationResult::unchanged(model_id, REASON_AT_MINIMUM, problem_ranges);
                return Ok((result, Commit::Write));
            }

            let previous = self.thresholds.stored(model_id)?;
            self.thresholds.set(&lowered)?;
            lowered_from = Some(previous);

            let reason = recommendation(&overlapping, &current, &lowered);
            history.adaptations.push(AdaptationRecord {
                timestamp: Utc::now(),
                model_id: model_id.to_string(),
                old_thresholds: current.values(),
                new_thresholds: lowered.values(),
                reason: reason.clone(),
            });

            Ok((
                AdaptationResult {
                    adapted: true,
                    reason,
                    model_id: model_id.to_string(),
                    new_thresholds: Some(lowered.values()),
                    problem_ranges,
                },
                Commit::Write,
            ))
        });

        let result = match transaction {
            Ok(result) => result,
            Err(err) => {
                if let Some(previous) = lowered_from {
                    warn!(model_id, error = %err, "Adaptation record not written, restoring thresholds");
                    if let Err(restore_err) = self.thresholds.restore(model_id, previous) {
                        warn!(model_id, error = %restore_err, "Could not restore thresholds");
                    }
                }
                return Err(err);
            }
        };

        if result.adapted {
            info!(
                model_id,
                new_thresholds = ?result.new_thresholds,
                problem_ranges = ?result.problem_ranges,
                "Adapted thresholds"
            );
        } else {
            debug!(model_id, reason = %result.reason, "Thresholds not adapted");
        }

        Ok(result)
    }
}

fn recommendation(overlapping: &[i64], old: &ModelThresholds, new: &ModelThresholds) -> String {
    let ranges: Vec<String> = overlapping.iter().map(|r| format!("{}-{}", r, r + BUCKET_WIDTH as i64)).collect();
    format!(
        "High failure rate in score range {}; lowering warn {} -> {}, split {} -> {}",
        ranges.join(", "),
        old.warn_threshold,
        new.warn_threshold,
        old.split_threshold,
        new.split_threshold
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gating::types::GateAction;

    fn assessment(score: f64, result: AssessmentResult) -> Assessment {
        Assessment {
            id: format!("assess-{}", score),
            timestamp: Utc::now(),
            plan_path: None,
            score,
            action: GateAction::Execute,
            model_id: "default".to_string(),
            result,
            degraded: false,
            sub_phase_count: None,
            phases: Vec::new(),
        }
    }

    #[test]
    fn test_bucketing() {
        let assessments = vec![
            assessment(40.0, AssessmentResult::Failed),
            assessment(44.9, AssessmentResult::Success),
            assessment(49.99, AssessmentResult::Pending),
            assessment(50.0, AssessmentResult::Failed),
            assessment(3.2, AssessmentResult::Success),
        ];
        let buckets = bucket_assessments(&assessments);

        assert_eq!(buckets.iter().map(|b| b.range_start).collect::<Vec<_>>(), vec![0, 40, 50]);
        let forty = buckets[1];
        assert_eq!((forty.success, forty.failed, forty.total), (1, 1, 3));
    }

    #[test]
    fn test_problem_threshold_is_strict() {
        let at_limit = ScoreBucket { range_start: 40, success: 7, failed: 3, total: 10 };
        assert!(!at_limit.is_problem());
        let above = ScoreBucket { range_start: 40, success: 6, failed: 4, total: 10 };
        assert!(above.is_problem());
    }

    #[test]
    fn test_pending_dilutes_failure_rate() {
        let assessments = vec![
            assessment(41.0, AssessmentResult::Failed),
            assessment(42.0, AssessmentResult::Pending),
            assessment(43.0, AssessmentResult::Pending),
            assessment(44.0, AssessmentResult::Pending),
        ];
        let buckets = bucket_assessments(&assessments);
        assert_eq!(buckets[0].failure_rate(), 0.25);
        assert!(!buckets[0].is_problem());
    }

    #[test]
    fn test_recommendation_text() {
        let old = ModelThresholds::new("m", 45.0, 65.0);
        let new = ModelThresholds::new("m", 40.0, 60.0);
        let text = recommendation(&[40], &old, &new);
        assert_eq!(text, "High failure rate in score range 40-50; lowering warn 45 -> 40, split 65 -> 60");
    }

    mod rollback {
        use super::*;
        use crate::error::GateError;
        use crate::history::types::{AssessmentDraft, Outcome};
        use crate::history::{DEFAULT_PROFILE, DEFAULT_THRESHOLDS, HISTORY_FILE, THRESHOLDS_FILE};
        use tempfile::TempDir;

        fn stores(dir: &TempDir) -> (AssessmentRecorder, ThresholdStore) {
            (
                AssessmentRecorder::new(dir.path().join(HISTORY_FILE)),
                ThresholdStore::new(dir.path().join(THRESHOLDS_FILE)),
            )
        }

        fn record_failing_forties(recorder: &AssessmentRecorder) {
            for i in 0..10 {
                let score = if i < 4 { 42.0 } else { 12.0 };
                let id = recorder.record(AssessmentDraft::new(score, GateAction::Execute, "m")).unwrap().id;
                let outcome = if i < 4 { Outcome::Failed } else { Outcome::Success };
                recorder.report_outcome(&id, outcome).unwrap();
            }
        }

        #[test]
        fn test_failed_history_write_restores_thresholds() {
            let dir = TempDir::new().unwrap();
            let (recorder, thresholds) = stores(&dir);
            thresholds.set(&ModelThresholds::new("m", 45.0, 65.0)).unwrap();
            record_failing_forties(&recorder);

            recorder.fail_writes();
            let err = ThresholdAdapter::new(&recorder, &thresholds).adapt("m").unwrap_err();

            assert!(matches!(err, GateError::Persistence { .. }));
            assert_eq!(
                thresholds.stored("m").unwrap(),
                Some(ThresholdValues { warn_threshold: 45.0, split_threshold: 65.0 })
            );
            assert!(recorder.load().unwrap().adaptations.is_empty());
        }

        #[test]
        fn test_failed_history_write_removes_new_profile() {
            let dir = TempDir::new().unwrap();
            let (recorder, thresholds) = stores(&dir);
            record_failing_forties(&recorder);

            recorder.fail_writes();
            assert!(ThresholdAdapter::new(&recorder, &thresholds).adapt("m").is_err());

            assert_eq!(thresholds.stored("m").unwrap(), None);
            assert_eq!(thresholds.get("m").unwrap().values(), DEFAULT_THRESHOLDS);
        }

        #[test]
        fn test_adapting_default_lowers_inherited_profile() {
            let dir = TempDir::new().unwrap();
            let (recorder, thresholds) = stores(&dir);
            record_failing_forties(&recorder);

            let result = ThresholdAdapter::new(&recorder, &thresholds).adapt(DEFAULT_PROFILE).unwrap();

            assert!(result.adapted);
            assert_eq!(thresholds.get("unprofiled-model").unwrap().warn_threshold, 45.0);
        }
    }
}
