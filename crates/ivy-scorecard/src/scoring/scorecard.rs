use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::EnrollmentId;
use super::modules::ScoreBasis;
use super::pointer::PointerId;

/// Persisted normalized score for one enrollment and pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub enrollment_id: EnrollmentId,
    pub pointer: PointerId,
    pub score_obtained: f64,
    pub max_score: f64,
    /// How the sub-scoring module reached the value; `None` for direct writer upserts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<ScoreBasis>,
    pub last_updated: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn same_score(
        &self,
        score_obtained: f64,
        max_score: f64,
        basis: Option<&ScoreBasis>,
    ) -> bool {
        self.score_obtained == score_obtained
            && self.max_score == max_score
            && self.basis.as_ref() == basis
    }
}

/// Per-pointer line of a scorecard, already normalized to the 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerScoreEntry {
    pub pointer_id: PointerId,
    pub weight: u8,
    pub score: f64,
    pub max_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<ScoreBasis>,
    /// Fallback mean or partially graded weighted result.
    #[serde(default)]
    pub degraded: bool,
}

/// Materialized aggregate of all six pointers for one enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub enrollment_id: EnrollmentId,
    pub pointer_scores: Vec<PointerScoreEntry>,
    pub overall_score: f64,
    /// Timestamp of the newest score record that fed this scorecard.
    pub generated_at: DateTime<Utc>,
}

impl Scorecard {
    pub fn pointer_score(&self, pointer: PointerId) -> Option<f64> {
        self.pointer_scores
            .iter()
            .find(|entry| entry.pointer_id == pointer)
            .map(|entry| entry.score)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
