use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::domain::{Enrollment, EnrollmentId};
use super::pointer::PointerId;
use super::repository::EnrollmentRepository;
use super::scorecard::Scorecard;
use super::service::ScoringError;

const DRIFT_TOLERANCE: f64 = 0.005;

/// Copies the freshly aggregated overall score onto the enrollment record.
pub(crate) struct EnrollmentSync<E> {
    enrollments: Arc<E>,
}

impl<E> EnrollmentSync<E>
where
    E: EnrollmentRepository + 'static,
{
    pub(crate) fn new(enrollments: Arc<E>) -> Self {
        Self { enrollments }
    }

    pub(crate) fn sync(
        &self,
        enrollment_id: &EnrollmentId,
        overall_score: f64,
    ) -> Result<(), ScoringError> {
        self.enrollments
            .set_overall_score(enrollment_id, overall_score)?;
        debug!(enrollment = %enrollment_id.0, overall_score, "enrollment overall score synced");
        Ok(())
    }
}

/// Outcome of comparing stored aggregates against a fresh recombination of score records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub enrollment_id: EnrollmentId,
    pub enrollment_overall: Option<f64>,
    pub scorecard_overall: Option<f64>,
    pub recomputed_overall: f64,
    pub drift: Vec<Drift>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Drift {
    MissingScorecard,
    PointerMismatch {
        pointer: PointerId,
        stored: Option<f64>,
        recomputed: f64,
    },
    OverallMismatch {
        stored: f64,
        recomputed: f64,
    },
    EnrollmentOutOfSync {
        enrollment: Option<f64>,
        recomputed: f64,
    },
}

pub(crate) fn audit(
    enrollment: &Enrollment,
    stored: Option<&Scorecard>,
    recomputed: &Scorecard,
) -> ConsistencyReport {
    let mut drift = Vec::new();

    match stored {
        None => {
            // A never-scored enrollment has nothing to be out of sync with.
            if enrollment.overall_score.is_some() || recomputed.overall_score > 0.0 {
                drift.push(Drift::MissingScorecard);
            }
        }
        Some(stored) => {
            for entry in &recomputed.pointer_scores {
                let current = stored.pointer_score(entry.pointer_id);
                if !matches!(current, Some(value) if close(value, entry.score)) {
                    drift.push(Drift::PointerMismatch {
                        pointer: entry.pointer_id,
                        stored: current,
                        recomputed: entry.score,
                    });
                }
            }
            if !close(stored.overall_score, recomputed.overall_score) {
                drift.push(Drift::OverallMismatch {
                    stored: stored.overall_score,
                    recomputed: recomputed.overall_score,
                });
            }
        }
    }

    let enrollment_in_sync = match enrollment.overall_score {
        Some(value) => close(value, recomputed.overall_score),
        None => stored.is_none(),
    };
    if !enrollment_in_sync {
        drift.push(Drift::EnrollmentOutOfSync {
            enrollment: enrollment.overall_score,
            recomputed: recomputed.overall_score,
        });
    }

    ConsistencyReport {
        enrollment_id: enrollment.id.clone(),
        enrollment_overall: enrollment.overall_score,
        scorecard_overall: stored.map(|scorecard| scorecard.overall_score),
        recomputed_overall: recomputed.overall_score,
        drift,
    }
}

fn close(left: f64, right: f64) -> bool {
    (left - right).abs() < DRIFT_TOLERANCE
}
