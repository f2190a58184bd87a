//! Blending of base score and phase sub-scores.

use super::types::round1;

/// Blends the base score with the structural and process sub-scores.
///
/// The base score is on a 0-100 scale while both sub-scores are on 0-10, so
/// each sub-score contributes up to 25 points and the base up to 50. The
/// formula is kept as-is; see DESIGN.md for the open question on scales.
pub struct ScoreCombiner;

impl ScoreCombiner {
    /// Weight applied to the base score.
    pub const BASE_WEIGHT: f64 = 0.5;
    /// Weight applied to the structural sub-score.
    pub const STRUCTURAL_WEIGHT: f64 = 2.5;
    /// Weight applied to the process sub-score.
    pub const PROCESS_WEIGHT: f64 = 2.5;

    /// Returns `round(base*0.5 + structural*2.5 + process*2.5, 1)`. Not clamped.
    pub fn combine(base: f64, structural: f64, process: f64) -> f64 {
        round1(base * Self::BASE_WEIGHT + structural * Self::STRUCTURAL_WEIGHT + process * Self::PROCESS_WEIGHT)
    }
}
