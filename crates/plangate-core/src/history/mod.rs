//! Durable assessment history and adaptive thresholds.

pub mod adapter;
pub mod recorder;
pub(crate) mod store;
pub mod thresholds;
pub mod types;

pub use adapter::{AdaptationResult, ScoreBucket, ThresholdAdapter, bucket_assessments};
pub use recorder::{AssessmentRecorder, HISTORY_FILE};
pub use thresholds::{
    DEFAULT_PROFILE, DEFAULT_THRESHOLDS, THRESHOLDS_FILE, ThresholdDocument, ThresholdStore, builtin_profiles,
};
pub use types::{
    AdaptationRecord, Assessment, AssessmentDraft, AssessmentResult, HistoryDocument, Outcome, Statistics,
};
