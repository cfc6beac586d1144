use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::domain::{Enrollment, EnrollmentId, MAX_SCORE};
use super::locks::KeyedLocks;
use super::modules::{clamp_score, ScoreBasis};
use super::pointer::PointerId;
use super::repository::{EnrollmentRepository, ScoreStore};
use super::scorecard::{round2, PointerScoreEntry, ScoreRecord, Scorecard};
use super::service::ScoringError;
use super::sync::{self, ConsistencyReport, EnrollmentSync};

/// Recombines the six pointer score records into a scorecard and syncs the enrollment.
pub struct ScorecardAggregator<E, S> {
    enrollments: Arc<E>,
    scores: Arc<S>,
    sync: EnrollmentSync<E>,
    locks: KeyedLocks<EnrollmentId>,
}

impl<E, S> ScorecardAggregator<E, S>
where
    E: EnrollmentRepository + 'static,
    S: ScoreStore + 'static,
{
    pub(crate) fn new(enrollments: Arc<E>, scores: Arc<S>) -> Self {
        Self {
            sync: EnrollmentSync::new(enrollments.clone()),
            enrollments,
            scores,
            locks: KeyedLocks::new(),
        }
    }

    /// Regenerates and persists the whole scorecard from current score records.
    ///
    /// Safe to re-run on its own after a failed pipeline: the output depends only on the
    /// stored records.
    pub fn aggregate(&self, enrollment_id: &EnrollmentId) -> Result<Scorecard, ScoringError> {
        // Concurrent writers on different pointers must not persist an older recombination
        // over a newer one.
        self.locks.with_lock(enrollment_id, || {
            let enrollment = self.resolve(enrollment_id)?;
            let records = self.scores.records_for(enrollment_id)?;
            let scorecard = compose_scorecard(&enrollment, &records);

            self.scores.replace_scorecard(scorecard.clone())?;
            self.sync.sync(enrollment_id, scorecard.overall_score)?;

            debug!(
                enrollment = %enrollment_id.0,
                overall_score = scorecard.overall_score,
                records = records.len(),
                "scorecard regenerated"
            );
            Ok(scorecard)
        })
    }

    /// Recombines the current records without persisting anything.
    pub fn preview(&self, enrollment_id: &EnrollmentId) -> Result<Scorecard, ScoringError> {
        let enrollment = self.resolve(enrollment_id)?;
        let records = self.scores.records_for(enrollment_id)?;
        Ok(compose_scorecard(&enrollment, &records))
    }

    pub fn audit(&self, enrollment_id: &EnrollmentId) -> Result<ConsistencyReport, ScoringError> {
        let enrollment = self.resolve(enrollment_id)?;
        let records = self.scores.records_for(enrollment_id)?;
        let stored = self.scores.scorecard(enrollment_id)?;
        let recomputed = compose_scorecard(&enrollment, &records);
        Ok(sync::audit(&enrollment, stored.as_ref(), &recomputed))
    }

    /// Runs `work` while no aggregation for the enrollment can persist a scorecard.
    pub(crate) fn exclusive<T>(&self, enrollment_id: &EnrollmentId, work: impl FnOnce() -> T) -> T {
        self.locks.with_lock(enrollment_id, work)
    }

    pub(crate) fn forget(&self, enrollment_id: &EnrollmentId) {
        self.locks.forget(|key| key == enrollment_id);
    }

    fn resolve(&self, enrollment_id: &EnrollmentId) -> Result<Enrollment, ScoringError> {
        self.enrollments
            .fetch(enrollment_id)?
            .ok_or_else(|| ScoringError::EnrollmentNotFound(enrollment_id.0.clone()))
    }
}

/// Pure recombination of score records; pointers without a record count as `0/10`.
pub fn compose_scorecard(enrollment: &Enrollment, records: &[ScoreRecord]) -> Scorecard {
    let mut overall = 0.0;
    let mut pointer_scores = Vec::with_capacity(PointerId::ALL.len());

    for pointer in PointerId::ALL {
        let record = records
            .iter()
            .find(|record| record.pointer == pointer && record.enrollment_id == enrollment.id);
        let normalized = record.map(normalize).unwrap_or(0.0);
        let basis = record.and_then(|record| record.basis.clone());

        overall += f64::from(pointer.weight()) / 100.0 * normalized;
        pointer_scores.push(PointerScoreEntry {
            pointer_id: pointer,
            weight: pointer.weight(),
            score: round2(normalized),
            max_score: MAX_SCORE,
            degraded: basis.as_ref().is_some_and(ScoreBasis::is_degraded),
            basis,
        });
    }

    Scorecard {
        enrollment_id: enrollment.id.clone(),
        pointer_scores,
        overall_score: round2(clamp_score(overall)),
        generated_at: generated_at(enrollment, records),
    }
}

fn normalize(record: &ScoreRecord) -> f64 {
    if record.max_score > 0.0 && record.max_score.is_finite() {
        clamp_score(record.score_obtained / record.max_score * MAX_SCORE)
    } else {
        0.0
    }
}

/// Newest record timestamp, so regenerating over unchanged records is byte-identical.
fn generated_at(enrollment: &Enrollment, records: &[ScoreRecord]) -> DateTime<Utc> {
    records
        .iter()
        .filter(|record| record.enrollment_id == enrollment.id)
        .map(|record| record.last_updated)
        .max()
        .unwrap_or(enrollment.registered_at)
}
