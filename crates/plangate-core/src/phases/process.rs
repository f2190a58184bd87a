//! Process phase: dependency fan-out and cross-file impact.

use plangate_abstraction::Collaborator;
use tracing::{debug, warn};

use super::{PhaseKind, PhaseResult, PhaseTimeouts, call_with_timeout, run_stage};
use crate::gating::types::{PlanMetrics, round1};

/// Relationship query sent to the dependency collaborator.
pub const MODULE_DEPS_QUERY: &str = "module_deps";

/// Baseline process complexity before dependency impact is added.
const BASE_PROCESS_COMPLEXITY: f64 = 5.0;

/// Dependency figures feeding the process sub-score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DependencyImpact {
    /// Number of dependencies, reported or estimated.
    pub dependency_count: u64,
    /// Cross-file impact on a 0-10 scale.
    pub cross_file_impact: f64,
}

impl DependencyImpact {
    /// No dependencies.
    pub const NONE: Self = Self { dependency_count: 0, cross_file_impact: 0.0 };

    /// Impact from a reported dependency list of length `count`.
    pub fn reported(count: usize) -> Self {
        Self { dependency_count: count as u64, cross_file_impact: (count as f64 / 2.0).min(10.0) }
    }

    /// Impact estimated from the plan's file count, assuming 1.5 deps per file.
    pub fn estimated(file_count: usize) -> Self {
        let estimate = (file_count as f64 * 1.5).round().min(10.0);
        Self { dependency_count: estimate as u64, cross_file_impact: (file_count as f64 / 3.0).min(10.0) }
    }

    /// `min(10, dependency_count * 0.3 + cross_file_impact)`.
    pub fn dependency_weight(&self) -> f64 {
        (self.dependency_count as f64 * 0.3 + self.cross_file_impact).min(10.0)
    }

    /// `min(10, 5 + dependency_weight / 2)`, on a 5-10 scale.
    pub fn process_complexity(&self) -> f64 {
        (BASE_PROCESS_COMPLEXITY + self.dependency_weight() / 2.0).min(10.0)
    }
}

/// Queries the first plan file's module dependencies.
pub struct ProcessPhase<'a> {
    collaborator: &'a dyn Collaborator,
    timeouts: PhaseTimeouts,
}

impl<'a> ProcessPhase<'a> {
    /// Creates the phase.
    pub fn new(collaborator: &'a dyn Collaborator, timeouts: PhaseTimeouts) -> Self {
        Self { collaborator, timeouts }
    }

    /// Runs the phase under the stage timeout, using the structure result's
    /// file count for estimates. Never fails.
    pub async fn run(&self, metrics: &PlanMetrics, structure: &PhaseResult) -> PhaseResult {
        run_stage(PhaseKind::Process, self.timeouts.stage, self.analyze(metrics, structure), Self::fallback)
            .await
    }

    async fn analyze(&self, metrics: &PlanMetrics, structure: &PhaseResult) -> PhaseResult {
        let file_count =
            structure.detail_f64("fileCount").map_or(metrics.file_list.len(), |count| count as usize);

        let Some(target) = metrics.file_list.first() else {
            debug!("No files in plan, skipping dependency analysis");
            return Self::finish(DependencyImpact::NONE, true);
        };

        let context = metrics.project_path.clone().unwrap_or_else(|| {
            std::env::current_dir().map_or_else(|_| ".".to_string(), |dir| dir.display().to_string())
        });

        let call = self.collaborator.relationships(target, MODULE_DEPS_QUERY, &context);
        match call_with_timeout(self.timeouts.collaborator, call).await {
            Ok(dependencies) => Self::finish(DependencyImpact::reported(dependencies.len()), false),
            Err(err) => {
                warn!(
                    collaborator = self.collaborator.name(),
                    target = %target,
                    error = %err,
                    "Dependency analysis failed, estimating from file count"
                );
                Self::finish(DependencyImpact::estimated(file_count), true)
            }
        }
    }

    fn finish(impact: DependencyImpact, degraded: bool) -> PhaseResult {
        let sub_score = round1(impact.process_complexity());

        debug!(
            dependency_count = impact.dependency_count,
            cross_file_impact = impact.cross_file_impact,
            process_complexity = sub_score,
            degraded,
            "Process phase complete"
        );

        PhaseResult::new(PhaseKind::Process, sub_score, degraded)
            .with_detail("dependencyCount", impact.dependency_count)
            .with_detail("crossFileImpact", round1(impact.cross_file_impact))
            .with_detail("dependencyWeight", round1(impact.dependency_weight()))
            .with_detail("recommendation", "proceed")
    }

    /// Result used when the phase cannot complete at all.
    pub fn fallback() -> PhaseResult {
        Self::finish(DependencyImpact::NONE, true)
    }
}
