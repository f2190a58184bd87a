//! Sub-phase planning for plans above the split threshold.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GateError, Result};

/// Hard ceiling on sub-phases, to avoid over-fragmenting a plan.
pub const MAX_SUB_PHASES: u32 = 5;

static TASK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<task(?:\s[^>]*)?>.*?</task>").expect("valid task block pattern"));

/// A task block extracted from a plan document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    /// Zero-based position in the original plan.
    pub index: usize,
    /// The full `<task>...</task>` block.
    pub content: String,
}

/// One sub-phase of a split plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPhase {
    /// One-based phase number.
    pub phase_number: u32,
    /// Tasks assigned to this phase, in plan order.
    pub tasks: Vec<PlanTask>,
    /// Number of tasks in this phase.
    pub task_count: usize,
}

/// A plan distributed across sub-phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResult {
    /// Tasks found in the original plan.
    pub original_task_count: usize,
    /// Number of sub-phases produced.
    pub sub_phase_count: u32,
    /// The sub-phases, in order.
    pub sub_phases: Vec<SubPhase>,
}

/// Computes sub-phase counts and splits plan documents.
pub struct SplitPlanner;

impl SplitPlanner {
    /// Returns 1 when `score <= split_threshold`, else
    /// `min(ceil(score / split_threshold), 5)`.
    pub fn sub_phase_count(score: f64, split_threshold: f64) -> u32 {
        if score <= split_threshold {
            return 1;
        }
        let needed = (score / split_threshold).ceil();
        if needed >= f64::from(MAX_SUB_PHASES) {
            MAX_SUB_PHASES
        } else {
            needed.max(1.0) as u32
        }
    }

    /// Extracts `<task>` blocks from a plan document.
    pub fn extract_tasks(plan_content: &str) -> Vec<PlanTask> {
        TASK_BLOCK
            .find_iter(plan_content)
            .enumerate()
            .map(|(index, m)| PlanTask { index, content: m.as_str().to_string() })
            .collect()
    }

    /// Distributes a plan's tasks across `sub_phase_count` phases in order,
    /// `ceil(tasks / phases)` per phase. Trailing phases may be empty when
    /// there are fewer tasks than phases.
    pub fn split_plan(plan_content: &str, sub_phase_count: u32) -> Result<SplitResult> {
        if sub_phase_count == 0 {
            return Err(GateError::InvalidPlan("sub-phase count must be at least 1".to_string()));
        }

        let tasks = Self::extract_tasks(plan_content);
        let total = tasks.len();
        let per_phase = total.div_ceil(sub_phase_count as usize);

        let mut remaining = tasks.into_iter();
        let sub_phases: Vec<SubPhase> = (1..=sub_phase_count)
            .map(|phase_number| {
                let phase_tasks: Vec<PlanTask> = remaining.by_ref().take(per_phase).collect();
                SubPhase { phase_number, task_count: phase_tasks.len(), tasks: phase_tasks }
            })
            .collect();

        debug!(original_task_count = total, sub_phase_count, per_phase, "Split plan into sub-phases");

        Ok(SplitResult { original_task_count: total, sub_phase_count, sub_phases })
    }
}
