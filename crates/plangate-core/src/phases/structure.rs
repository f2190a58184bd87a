//! Structure phase: per-file size and function counts.

use plangate_abstraction::Collaborator;
use tracing::{debug, warn};

use super::{PhaseKind, PhaseResult, PhaseTimeouts, call_with_timeout, run_stage};
use crate::gating::types::{PlanMetrics, round1};

/// Default number of files summarized per plan.
pub const DEFAULT_MAX_FILES: usize = 10;

/// Sub-score used when the whole phase times out.
const TIMEOUT_FALLBACK_SCORE: f64 = 5.0;

/// Structural complexity on a 1-10 scale from file, line and function counts.
pub fn structural_complexity(file_count: usize, total_lines: u64, total_functions: u64) -> f64 {
    let mut complexity = 1.0 + file_count as f64 / 5.0;

    if total_lines > 1000 {
        complexity += 1.0;
    }
    if total_lines > 5000 {
        complexity += 1.0;
    }
    if total_functions > 50 {
        complexity += 0.5;
    }
    if total_functions > 200 {
        complexity += 0.5;
    }

    round1(complexity.clamp(1.0, 10.0))
}

/// Summarizes the plan's leading files through the structural collaborator.
pub struct StructurePhase<'a> {
    collaborator: &'a dyn Collaborator,
    timeouts: PhaseTimeouts,
    max_files: usize,
}

impl<'a> StructurePhase<'a> {
    /// Creates the phase.
    pub fn new(collaborator: &'a dyn Collaborator, timeouts: PhaseTimeouts, max_files: usize) -> Self {
        Self { collaborator, timeouts, max_files }
    }

    /// Runs the phase under the stage timeout. Never fails.
    pub async fn run(&self, metrics: &PlanMetrics) -> PhaseResult {
        run_stage(PhaseKind::Structure, self.timeouts.stage, self.analyze(metrics), || {
            Self::fallback(metrics)
        })
        .await
    }

    async fn analyze(&self, metrics: &PlanMetrics) -> PhaseResult {
        let file_count = metrics.file_list.len();
        let mut files_analyzed = 0_usize;
        let mut total_lines = 0_u64;
        let mut total_functions = 0_u64;
        let mut unreachable = false;

        for file in metrics.file_list.iter().take(self.max_files) {
            match call_with_timeout(self.timeouts.collaborator, self.collaborator.summarize(file)).await {
                Ok(summary) => {
                    files_analyzed += 1;
                    total_lines += summary.line_count;
                    total_functions += summary.function_count;
                }
                Err(err) if err.is_unreachable() => {
                    warn!(
                        collaborator = self.collaborator.name(),
                        error = %err,
                        "Structural analysis unreachable, using file-count heuristic"
                    );
                    unreachable = true;
                    break;
                }
                Err(err) => {
                    debug!(file = %file, error = %err, "Skipping file in structure phase");
                }
            }
        }

        let sub_score = structural_complexity(file_count, total_lines, total_functions);
        let degraded = files_analyzed == 0 || unreachable;

        debug!(
            file_count,
            files_analyzed,
            total_lines,
            total_functions,
            structural_complexity = sub_score,
            degraded,
            "Structure phase complete"
        );

        PhaseResult::new(PhaseKind::Structure, sub_score, degraded)
            .with_detail("fileCount", file_count)
            .with_detail("filesAnalyzed", files_analyzed)
            .with_detail("totalLines", total_lines)
            .with_detail("totalFunctions", total_functions)
    }

    /// Result used when the phase cannot complete at all.
    pub fn fallback(metrics: &PlanMetrics) -> PhaseResult {
        PhaseResult::new(PhaseKind::Structure, TIMEOUT_FALLBACK_SCORE, true)
            .with_detail("fileCount", metrics.file_list.len())
            .with_detail("filesAnalyzed", 0)
            .with_detail("totalLines", 0)
            .with_detail("totalFunctions", 0)
    }
}
