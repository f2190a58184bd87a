//! Plan scoring and admission decisions.
//!
//! This module turns plan metrics into a combined complexity score and
//! classifies it as execute, warn or auto-split against per-model thresholds.

pub mod combiner;
pub mod decision;
pub mod gate;
pub mod scorer;
pub mod split;
pub mod types;

pub use combiner::ScoreCombiner;
pub use decision::{DecisionEngine, Severity, WarningNotice, generate_warning};
pub use gate::{ComplexityGate, GateOutcome};
pub use scorer::{ComplexityScorer, ScoringWeights};
pub use split::{MAX_SUB_PHASES, PlanTask, SplitPlanner, SplitResult, SubPhase};
pub use types::{
    ActionDecision, ComplexityScore, GateAction, ModelThresholds, OptionId, PlanMetrics, Risk,
    SPLIT_THRESHOLD_FLOOR, ThresholdValues, WARN_THRESHOLD_FLOOR, WarningOption,
};
