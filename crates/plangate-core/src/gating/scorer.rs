//! Base complexity scoring from plan metrics.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{PlanMetrics, round1};

/// Weights for each plan metric. Each weight approximates the token cost, in
/// thousands, of one unit of that metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Per file operation (2-5K tokens).
    pub file_op: f64,
    /// Per symbol query (3-10K tokens).
    pub symbol_query: f64,
    /// Per code-graph query (5-15K tokens).
    pub cg_query: f64,
    /// Per task (10-20K tokens).
    pub task: f64,
    /// Per cross-reference (~5K tokens).
    pub cross_ref: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { file_op: 2.0, symbol_query: 5.0, cg_query: 8.0, task: 10.0, cross_ref: 3.0 }
    }
}

/// Computes the base score of a plan. Pure and deterministic.
#[derive(Debug, Clone, Default)]
pub struct ComplexityScorer {
    weights: ScoringWeights,
}

impl ComplexityScorer {
    /// Creates a scorer with the standard weights.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the weights in use.
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores plan metrics on a 0-100 scale, rounded to one decimal.
    ///
    /// The result is not clamped: very large plans score above 100.
    pub fn score(&self, metrics: &PlanMetrics) -> f64 {
        let w = &self.weights;
        let raw = f64::from(metrics.file_ops) * w.file_op
            + f64::from(metrics.symbol_queries) * w.symbol_query
            + f64::from(metrics.cg_queries) * w.cg_query
            + f64::from(metrics.task_count) * w.task
            + f64::from(metrics.cross_refs) * w.cross_ref;
        let base = round1(raw / 100.0);

        debug!(
            base_score = base,
            file_ops = metrics.file_ops,
            symbol_queries = metrics.symbol_queries,
            cg_queries = metrics.cg_queries,
            task_count = metrics.task_count,
            cross_refs = metrics.cross_refs,
            "Scored plan metrics"
        );

        base
    }
}
