use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::aggregator::ScorecardAggregator;
use super::domain::{EnrollmentId, ValidationError};
use super::modules::ScoreBasis;
use super::pointer::PointerId;
use super::repository::{EnrollmentRepository, ScoreStore};
use super::scorecard::{ScoreRecord, Scorecard};
use super::service::ScoringError;

/// Single entry point for changing a pointer score record.
///
/// Every upsert runs the scorecard aggregator for the same enrollment before returning, so a
/// committed record is always followed by an attempted scorecard regeneration.
pub struct PointerScoreWriter<E, S> {
    enrollments: Arc<E>,
    scores: Arc<S>,
    aggregator: ScorecardAggregator<E, S>,
}

impl<E, S> PointerScoreWriter<E, S>
where
    E: EnrollmentRepository + 'static,
    S: ScoreStore + 'static,
{
    pub(crate) fn new(enrollments: Arc<E>, scores: Arc<S>) -> Self {
        let aggregator = ScorecardAggregator::new(enrollments.clone(), scores.clone());
        Self {
            enrollments,
            scores,
            aggregator,
        }
    }

    pub fn aggregator(&self) -> &ScorecardAggregator<E, S> {
        &self.aggregator
    }

    pub fn upsert(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
        score_obtained: f64,
        max_score: f64,
    ) -> Result<Scorecard, ScoringError> {
        self.upsert_scored(enrollment_id, pointer, score_obtained, max_score, None)
    }

    /// Upsert that also records how the sub-scoring module reached the score.
    pub(crate) fn upsert_scored(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
        score_obtained: f64,
        max_score: f64,
        basis: Option<ScoreBasis>,
    ) -> Result<Scorecard, ScoringError> {
        if !max_score.is_finite() || max_score <= 0.0 {
            return Err(ValidationError::InvalidMaxScore(max_score).into());
        }
        if !score_obtained.is_finite() || !(0.0..=max_score).contains(&score_obtained) {
            return Err(ValidationError::ObtainedOutOfRange {
                obtained: score_obtained,
                max: max_score,
            }
            .into());
        }

        let enrollment = self
            .enrollments
            .fetch(enrollment_id)?
            .ok_or_else(|| ScoringError::EnrollmentNotFound(enrollment_id.0.clone()))?;
        if enrollment.owner().is_none() {
            return Err(ScoringError::UnresolvableOwner(enrollment_id.0.clone()));
        }

        let existing = self.scores.record(enrollment_id, pointer)?;
        match existing {
            // Unchanged scores keep their timestamp so the regenerated scorecard is identical.
            Some(record) if record.same_score(score_obtained, max_score, basis.as_ref()) => {}
            _ => {
                self.scores.upsert_record(ScoreRecord {
                    enrollment_id: enrollment_id.clone(),
                    pointer,
                    score_obtained,
                    max_score,
                    basis,
                    last_updated: Utc::now(),
                })?;
                info!(
                    enrollment = %enrollment_id.0,
                    pointer = pointer.number(),
                    score_obtained,
                    max_score,
                    "pointer score recorded"
                );
            }
        }

        self.aggregator.aggregate(enrollment_id)
    }
}
