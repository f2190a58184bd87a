//! Shared test utilities for plangate-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use plangate_abstraction::{
    Collaborator, CollaboratorError, CollaboratorResult, Dependency, FileSummary, NodeId, Observation, PatternMatch,
};
use plangate_core::{
    AssessmentDraft, ComplexityGate, GateAction, GateConfig, ModelThresholds, Outcome,
};
use tempfile::TempDir;

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A collaborator answering every capability with canned data.
pub struct ScriptedCollaborator {
    /// Summary returned for every file.
    pub summary: FileSummary,
    /// Number of dependencies reported for any target.
    pub dependency_count: usize,
    /// Patterns returned by similarity queries.
    pub patterns: Vec<PatternMatch>,
    /// Delay applied to every summarize call.
    pub summarize_delay: Option<Duration>,
    /// When set, every call fails with this message.
    pub fail_all: bool,
    /// Observations written so far.
    pub observations: Mutex<Vec<Observation>>,
    /// Links made so far: (from, to, type, strength).
    pub links: Mutex<Vec<(String, String, String, f64)>>,
    /// Number of summarize calls.
    pub summarize_calls: AtomicUsize,
}

impl Default for ScriptedCollaborator {
    fn default() -> Self {
        Self {
            summary: FileSummary { line_count: 10, function_count: 1 },
            dependency_count: 0,
            patterns: Vec::new(),
            summarize_delay: None,
            fail_all: false,
            observations: Mutex::new(Vec::new()),
            links: Mutex::new(Vec::new()),
            summarize_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedCollaborator {
    pub fn with_dependencies(mut self, count: usize) -> Self {
        self.dependency_count = count;
        self
    }

    pub fn with_patterns(mut self, patterns: Vec<PatternMatch>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_summarize_delay(mut self, delay: Duration) -> Self {
        self.summarize_delay = Some(delay);
        self
    }

    pub fn failing() -> Self {
        Self { fail_all: true, ..Self::default() }
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> CollaboratorResult<()> {
        if self.fail_all {
            Err(CollaboratorError::Failed("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Collaborator for ScriptedCollaborator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn summarize(&self, _file_path: &str) -> CollaboratorResult<FileSummary> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.summarize_delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        Ok(self.summary)
    }

    async fn relationships(
        &self,
        _target: &str,
        _query_type: &str,
        _context: &str,
    ) -> CollaboratorResult<Vec<Dependency>> {
        self.check()?;
        Ok((0..self.dependency_count).map(|i| Dependency::new(format!("module_{}", i))).collect())
    }

    async fn query_similar(
        &self,
        _pattern: &str,
        limit: usize,
        _min_similarity: f64,
    ) -> CollaboratorResult<Vec<PatternMatch>> {
        self.check()?;
        Ok(self.patterns.iter().take(limit).cloned().collect())
    }

    async fn create_observation(&self, observation: &Observation) -> CollaboratorResult<NodeId> {
        self.check()?;
        let mut observations = self.observations.lock().unwrap();
        observations.push(observation.clone());
        Ok(NodeId(format!("obs-{}", observations.len())))
    }

    async fn link(&self, from: &NodeId, to: &str, link_type: &str, strength: f64) -> CollaboratorResult<()> {
        self.check()?;
        self.links.lock().unwrap().push((from.0.clone(), to.to_string(), link_type.to_string(), strength));
        Ok(())
    }
}

/// A gate over a fresh data directory.
pub fn gate_with(collaborator: Arc<dyn Collaborator>) -> (TempDir, ComplexityGate) {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let gate = ComplexityGate::new(GateConfig::with_data_dir(dir.path()), collaborator).expect("valid config");
    (dir, gate)
}

/// A gate over a fresh data directory with custom config.
pub fn gate_with_config(
    collaborator: Arc<dyn Collaborator>,
    configure: impl FnOnce(&mut GateConfig),
) -> (TempDir, ComplexityGate) {
    init_tracing();
    let dir = TempDir::new().expect("temp dir");
    let mut config = GateConfig::with_data_dir(dir.path());
    configure(&mut config);
    let gate = ComplexityGate::new(config, collaborator).expect("valid config");
    (dir, gate)
}

/// `n` file paths.
pub fn files(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("src/module_{}.rs", i)).collect()
}

/// Sets a model's thresholds.
pub fn set_thresholds(gate: &ComplexityGate, model_id: &str, warn: f64, split: f64) {
    gate.threshold_store().set(&ModelThresholds::new(model_id, warn, split)).expect("store thresholds");
}

/// Records an assessment with the given score and optional outcome.
pub fn record(gate: &ComplexityGate, model_id: &str, score: f64, outcome: Option<Outcome>) -> String {
    let assessment = gate
        .recorder()
        .record(AssessmentDraft::new(score, GateAction::Execute, model_id))
        .expect("record assessment");
    if let Some(outcome) = outcome {
        gate.report_outcome(&assessment.id, outcome).expect("report outcome");
    }
    assessment.id
}
