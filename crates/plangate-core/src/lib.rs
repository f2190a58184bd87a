//! Plangate Core - admission control for AI-driven work plans.
//!
//! This crate scores a proposed plan, decides whether to execute it, warn the
//! operator, or split it into sub-phases, and tunes its own thresholds from
//! the recorded outcomes of past decisions:
//! - Base scoring from plan metrics and three collaborator-backed phases
//! - Per-model thresholds with safety floors
//! - A durable assessment history driving threshold adaptation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use plangate_abstraction::NullCollaborator;
//! use plangate_core::{ComplexityGate, GateConfig, Outcome, PlanMetrics};
//!
//! #[tokio::main]
//! async fn main() -> plangate_core::Result<()> {
//!     let gate = ComplexityGate::new(GateConfig::default(), Arc::new(NullCollaborator))?;
//!     let metrics = PlanMetrics::new(12, 4, 2, 3, 5).with_files(["src/lib.rs"]);
//!
//!     let outcome = gate.gate(&metrics).await?;
//!     println!("{}", outcome.summary());
//!
//!     gate.report_outcome(&outcome.assessment.id, Outcome::Success)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gating;
pub mod history;
pub mod model;
pub mod phases;

pub use config::{ConfigError, GateConfig, GateConfigLoader};
pub use error::{GateError, Result};
pub use gating::{
    ActionDecision, ComplexityGate, ComplexityScore, ComplexityScorer, DecisionEngine, GateAction, GateOutcome,
    MAX_SUB_PHASES, ModelThresholds, OptionId, PlanMetrics, PlanTask, Risk, ScoreCombiner, ScoringWeights,
    Severity, SplitPlanner, SplitResult, SubPhase, ThresholdValues, WarningNotice, WarningOption,
    generate_warning,
};
pub use history::{
    AdaptationRecord, AdaptationResult, Assessment, AssessmentDraft, AssessmentRecorder, AssessmentResult,
    HistoryDocument, Outcome, ScoreBucket, Statistics, ThresholdAdapter, ThresholdStore,
};
pub use model::{ModelDetector, resolve_model_alias};
pub use phases::{PhaseKind, PhaseResult, PhaseTimeouts};
