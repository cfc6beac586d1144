use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    require_text, validate_score, AssessmentSection, Enrollment, EnrollmentId,
    EnrollmentRegistration, EvaluationItem, EvaluatorAssignment, Grade, GradeSubmission, ItemId,
    ItemKind, NewItem, NewItemKind, ValidationError, MAX_SCORE,
};
use super::locks::KeyedLocks;
use super::modules::{PointerInputs, PointerScore, ScoreBasis, SubScoringModule};
use super::pointer::{PointerCategory, PointerId, UnknownPointer};
use super::repository::{EnrollmentRepository, EvaluationRepository, RepositoryError, ScoreStore};
use super::scorecard::Scorecard;
use super::sync::ConsistencyReport;
use super::weights::ActivitySelection;
use super::writer::PointerScoreWriter;

/// Service composing the evaluation store, sub-scoring modules and the score pipeline.
pub struct ScoringService<E, V, S> {
    enrollments: Arc<E>,
    evaluations: Arc<V>,
    scores: Arc<S>,
    writer: PointerScoreWriter<E, S>,
    pointer_locks: KeyedLocks<(EnrollmentId, PointerId)>,
}

static ENROLLMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ITEM_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_enrollment_id() -> EnrollmentId {
    let id = ENROLLMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EnrollmentId(format!("enr-{id:06}"))
}

fn next_item_id() -> ItemId {
    let id = ITEM_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ItemId(format!("item-{id:06}"))
}

/// Result of one recompute-and-write pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecomputeOutcome {
    pub pointer_score: PointerScore,
    pub scorecard: Scorecard,
}

impl<E, V, S> ScoringService<E, V, S>
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    pub fn new(enrollments: Arc<E>, evaluations: Arc<V>, scores: Arc<S>) -> Self {
        let writer = PointerScoreWriter::new(enrollments.clone(), scores.clone());
        Self {
            enrollments,
            evaluations,
            scores,
            writer,
            pointer_locks: KeyedLocks::new(),
        }
    }

    pub fn writer(&self) -> &PointerScoreWriter<E, S> {
        &self.writer
    }

    pub fn register_enrollment(
        &self,
        registration: EnrollmentRegistration,
    ) -> Result<Enrollment, ScoringError> {
        require_text(&registration.student_id.0, "student id")?;
        for assignment in &registration.evaluators {
            require_text(&assignment.evaluator.0, "evaluator id")?;
        }

        let enrollment = Enrollment {
            id: next_enrollment_id(),
            student_id: Some(registration.student_id),
            registered_at: Utc::now(),
            overall_score: None,
            evaluators: registration.evaluators,
        };

        let stored = self.enrollments.insert(enrollment)?;
        info!(enrollment = %stored.id.0, "enrollment registered");
        Ok(stored)
    }

    pub fn assign_evaluator(
        &self,
        enrollment_id: &EnrollmentId,
        assignment: EvaluatorAssignment,
    ) -> Result<Enrollment, ScoringError> {
        require_text(&assignment.evaluator.0, "evaluator id")?;
        self.enrollment(enrollment_id)?;
        Ok(self
            .enrollments
            .assign_evaluator(enrollment_id, assignment)?)
    }

    pub fn enrollment(&self, enrollment_id: &EnrollmentId) -> Result<Enrollment, ScoringError> {
        self.enrollments
            .fetch(enrollment_id)?
            .ok_or_else(|| ScoringError::EnrollmentNotFound(enrollment_id.0.clone()))
    }

    pub fn list_enrollments(&self, limit: usize) -> Result<Vec<Enrollment>, ScoringError> {
        Ok(self.enrollments.list(limit)?)
    }

    /// Attaches an ungraded item; scores do not move until it is graded.
    pub fn add_item(
        &self,
        enrollment_id: &EnrollmentId,
        new_item: NewItem,
    ) -> Result<EvaluationItem, ScoringError> {
        require_text(&new_item.title, "title")?;
        if let NewItemKind::Certificate { file_key } = &new_item.kind {
            require_text(file_key, "certificate file key")?;
        }
        let kind = new_item.kind.into_kind();
        if kind.category() != new_item.pointer.category() {
            return Err(ValidationError::KindMismatch {
                pointer: new_item.pointer.number(),
                kind: kind.label(),
            }
            .into());
        }
        self.resolve_owned(enrollment_id)?;

        let item = EvaluationItem {
            id: next_item_id(),
            enrollment_id: enrollment_id.clone(),
            pointer: new_item.pointer,
            title: new_item.title,
            kind,
            grade: None,
            created_at: Utc::now(),
        };
        Ok(self.evaluations.insert_item(item)?)
    }

    /// Records an evaluator's grade and runs the owning pointer's pipeline.
    pub fn grade_item(
        &self,
        submission: GradeSubmission,
    ) -> Result<RecomputeOutcome, ScoringError> {
        let score = validate_score(submission.score)?;
        let item = self.item(&submission.item_id)?;
        let enrollment = self.resolve_owned(&item.enrollment_id)?;
        if !enrollment.authorizes(&submission.evaluator, item.pointer) {
            return Err(ScoringError::Unauthorized {
                evaluator: submission.evaluator.0,
                enrollment: enrollment.id.0,
                pointer: item.pointer.number(),
            });
        }

        let pointer = item.pointer;
        self.with_pointer_lock(&enrollment.id, pointer, || {
            let mut item = self.item(&submission.item_id)?;
            item.grade = Some(Grade {
                score,
                feedback: submission.feedback.filter(|text| !text.trim().is_empty()),
                evaluator: submission.evaluator,
                graded_at: Utc::now(),
                revision: item.kind.revision(),
            });
            self.evaluations.update_item(item)?;
            self.recompute_locked(&enrollment.id, pointer)
        })
    }

    /// Replaces the weighted assessment sections blended into a document-average pointer.
    pub fn record_sections(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
        sections: Vec<AssessmentSection>,
    ) -> Result<RecomputeOutcome, ScoringError> {
        if pointer.category() != PointerCategory::DocumentAverage {
            return Err(ValidationError::SectionsUnsupported(pointer.number()).into());
        }
        validate_sections(&sections)?;
        self.resolve_owned(enrollment_id)?;

        self.with_pointer_lock(enrollment_id, pointer, || {
            self.evaluations.replace_sections(enrollment_id, pointer, sections)?;
            self.recompute_locked(enrollment_id, pointer)
        })
    }

    pub fn select_activity(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
        item_id: &ItemId,
    ) -> Result<RecomputeOutcome, ScoringError> {
        self.change_selection(enrollment_id, pointer, item_id, |selection| {
            selection.select(item_id.clone());
            Ok(())
        })
    }

    pub fn deselect_activity(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
        item_id: &ItemId,
    ) -> Result<RecomputeOutcome, ScoringError> {
        self.change_selection(enrollment_id, pointer, item_id, |selection| {
            selection.deselect(item_id);
            Ok(())
        })
    }

    /// Assigns percentage weights to every selected activity; they must total 100.
    pub fn assign_weights(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
        weights: BTreeMap<ItemId, f64>,
    ) -> Result<RecomputeOutcome, ScoringError> {
        if pointer.category() != PointerCategory::WeightedActivity {
            return Err(ValidationError::KindMismatch {
                pointer: pointer.number(),
                kind: ItemKind::Activity.label(),
            }
            .into());
        }
        self.resolve_owned(enrollment_id)?;

        self.with_pointer_lock(enrollment_id, pointer, || {
            let mut selection = self
                .evaluations
                .selection_for(enrollment_id, pointer)?
                .unwrap_or_else(|| ActivitySelection::new(enrollment_id.clone(), pointer));
            selection.assign(weights)?;
            self.evaluations.save_selection(selection)?;
            self.recompute_locked(enrollment_id, pointer)
        })
    }

    /// Swaps a certificate's file; the previous grade no longer applies.
    pub fn replace_certificate(
        &self,
        item_id: &ItemId,
        file_key: String,
    ) -> Result<RecomputeOutcome, ScoringError> {
        require_text(&file_key, "certificate file key")?;
        let item = self.item(item_id)?;
        if !matches!(item.kind, ItemKind::Certificate { .. }) {
            return Err(ValidationError::NotACertificate(item_id.0.clone()).into());
        }
        self.resolve_owned(&item.enrollment_id)?;

        let key = (item.enrollment_id.clone(), item.pointer);
        self.with_pointer_lock(&key.0, key.1, || {
            let mut item = self.item(item_id)?;
            let revision = item.kind.revision() + 1;
            item.kind = ItemKind::Certificate { file_key, revision };
            item.grade = None;
            self.evaluations.update_item(item)?;
            info!(item = %item_id.0, revision, "certificate replaced, grade cleared");
            self.recompute_locked(&key.0, key.1)
        })
    }

    /// Deletes an item; activities are also dropped from the pointer's selection.
    pub fn remove_item(&self, item_id: &ItemId) -> Result<RecomputeOutcome, ScoringError> {
        let item = self.item(item_id)?;
        self.resolve_owned(&item.enrollment_id)?;

        let key = (item.enrollment_id.clone(), item.pointer);
        self.with_pointer_lock(&key.0, key.1, || {
            let removed = self
                .evaluations
                .remove_item(item_id)?
                .ok_or_else(|| ScoringError::ItemNotFound(item_id.0.clone()))?;
            if matches!(removed.kind, ItemKind::Activity) {
                if let Some(mut selection) = self.evaluations.selection_for(&key.0, key.1)? {
                    if selection.deselect(item_id) {
                        self.evaluations.save_selection(selection)?;
                    }
                }
            }
            self.recompute_locked(&key.0, key.1)
        })
    }

    pub fn recompute(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<RecomputeOutcome, ScoringError> {
        self.resolve_owned(enrollment_id)?;
        self.with_pointer_lock(enrollment_id, pointer, || {
            self.recompute_locked(enrollment_id, pointer)
        })
    }

    /// Recomputes every pointer in turn; returns the final scorecard.
    pub fn recompute_all(&self, enrollment_id: &EnrollmentId) -> Result<Scorecard, ScoringError> {
        self.resolve_owned(enrollment_id)?;
        for pointer in PointerId::ALL {
            self.recompute(enrollment_id, pointer)?;
        }
        self.writer.aggregator().aggregate(enrollment_id)
    }

    /// Stored scorecard, or an unpersisted preview when the enrollment was never scored.
    pub fn scorecard(&self, enrollment_id: &EnrollmentId) -> Result<Scorecard, ScoringError> {
        match self.scores.scorecard(enrollment_id)? {
            Some(scorecard) => Ok(scorecard),
            None => self.writer.aggregator().preview(enrollment_id),
        }
    }

    pub fn audit(&self, enrollment_id: &EnrollmentId) -> Result<ConsistencyReport, ScoringError> {
        let report = self.writer.aggregator().audit(enrollment_id)?;
        if !report.is_consistent() {
            warn!(
                enrollment = %enrollment_id.0,
                drift = report.drift.len(),
                "scorecard drift detected"
            );
        }
        Ok(report)
    }

    pub fn items(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Vec<EvaluationItem>, ScoringError> {
        self.enrollment(enrollment_id)?;
        Ok(self.evaluations.items_for(enrollment_id, pointer)?)
    }

    /// Removes the enrollment together with its items, score records and scorecard.
    ///
    /// Holds every pointer lock, then the aggregation lock, around the purge.
    pub fn delete_enrollment(&self, enrollment_id: &EnrollmentId) -> Result<(), ScoringError> {
        let keys: Vec<(EnrollmentId, PointerId)> = PointerId::ALL
            .into_iter()
            .map(|pointer| (enrollment_id.clone(), pointer))
            .collect();
        self.pointer_locks.with_locks(&keys, || {
            self.writer.aggregator().exclusive(enrollment_id, || {
                if !self.enrollments.delete(enrollment_id)? {
                    return Err(ScoringError::EnrollmentNotFound(enrollment_id.0.clone()));
                }
                self.evaluations.purge_evaluations(enrollment_id)?;
                self.scores.purge_scores(enrollment_id)?;
                Ok(())
            })
        })?;
        self.pointer_locks.forget(|(owner, _)| owner == enrollment_id);
        self.writer.aggregator().forget(enrollment_id);
        info!(enrollment = %enrollment_id.0, "enrollment deleted");
        Ok(())
    }

    /// Runs `work` under the pointer lock once the enrollment is confirmed to still exist.
    fn with_pointer_lock<T>(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
        work: impl FnOnce() -> Result<T, ScoringError>,
    ) -> Result<T, ScoringError> {
        self.pointer_locks
            .with_lock(&(enrollment_id.clone(), pointer), || {
                self.resolve_owned(enrollment_id)?;
                work()
            })
    }

    fn change_selection<F>(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
        item_id: &ItemId,
        change: F,
    ) -> Result<RecomputeOutcome, ScoringError>
    where
        F: FnOnce(&mut ActivitySelection) -> Result<(), ScoringError>,
    {
        let item = self.item(item_id)?;
        if item.enrollment_id != *enrollment_id || item.pointer != pointer {
            return Err(ValidationError::ItemOutsidePointer {
                item: item_id.0.clone(),
                enrollment: enrollment_id.0.clone(),
                pointer: pointer.number(),
            }
            .into());
        }
        if !matches!(item.kind, ItemKind::Activity) {
            return Err(ValidationError::NotAnActivity(item_id.0.clone()).into());
        }
        self.resolve_owned(enrollment_id)?;

        self.with_pointer_lock(enrollment_id, pointer, || {
            let mut selection = self
                .evaluations
                .selection_for(enrollment_id, pointer)?
                .unwrap_or_else(|| ActivitySelection::new(enrollment_id.clone(), pointer));
            change(&mut selection)?;
            self.evaluations.save_selection(selection)?;
            self.recompute_locked(enrollment_id, pointer)
        })
    }

    /// Read current items, compute, upsert. Callers hold the pointer lock.
    fn recompute_locked(
        &self,
        enrollment_id: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<RecomputeOutcome, ScoringError> {
        let module = SubScoringModule::for_pointer(pointer);
        let mut inputs = PointerInputs::new(pointer);
        inputs.items = self.evaluations.items_for(enrollment_id, pointer)?;
        match pointer.category() {
            PointerCategory::DocumentAverage => {
                inputs.sections = self.evaluations.sections_for(enrollment_id, pointer)?;
            }
            PointerCategory::WeightedActivity => {
                inputs.selection = self.evaluations.selection_for(enrollment_id, pointer)?;
            }
            PointerCategory::NarrativeTask | PointerCategory::CertificateAverage => {}
        }

        let pointer_score = module.recompute(&inputs);
        if pointer_score.basis.is_degraded() {
            warn!(
                enrollment = %enrollment_id.0,
                pointer = pointer.number(),
                basis = ?pointer_score.basis,
                "pointer scored without a complete weighted evaluation"
            );
        }

        // A pointer with nothing to score and no record already reads as 0/10.
        let unscored = matches!(pointer_score.basis, ScoreBasis::Empty)
            && self.scores.record(enrollment_id, pointer)?.is_none();
        let scorecard = if unscored {
            self.writer.aggregator().aggregate(enrollment_id)?
        } else {
            self.writer.upsert_scored(
                enrollment_id,
                pointer,
                pointer_score.value,
                MAX_SCORE,
                Some(pointer_score.basis.clone()),
            )?
        };
        Ok(RecomputeOutcome {
            pointer_score,
            scorecard,
        })
    }

    fn item(&self, item_id: &ItemId) -> Result<EvaluationItem, ScoringError> {
        self.evaluations
            .fetch_item(item_id)?
            .ok_or_else(|| ScoringError::ItemNotFound(item_id.0.clone()))
    }

    /// Enrollment that exists and still resolves to its owning student.
    fn resolve_owned(&self, enrollment_id: &EnrollmentId) -> Result<Enrollment, ScoringError> {
        let enrollment = self.enrollment(enrollment_id)?;
        if enrollment.owner().is_none() {
            return Err(ScoringError::UnresolvableOwner(enrollment_id.0.clone()));
        }
        Ok(enrollment)
    }
}

fn validate_sections(sections: &[AssessmentSection]) -> Result<(), ValidationError> {
    if sections.is_empty() {
        return Ok(());
    }

    for section in sections {
        require_text(&section.name, "section name")?;
        validate_score(section.score)?;
        if !section.weightage.is_finite() || !(0.0..=100.0).contains(&section.weightage) {
            return Err(ValidationError::WeightOutOfRange {
                item: section.name.clone(),
                weight: section.weightage,
            });
        }
    }

    let total: f64 = sections.iter().map(|section| section.weightage).sum();
    if (total - 100.0).abs() > 1e-6 {
        return Err(ValidationError::WeightTotal { total });
    }
    Ok(())
}

/// Error raised by the scoring service and pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    UnknownPointer(#[from] UnknownPointer),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(String),
    #[error("enrollment {0} does not resolve to an owning student")]
    UnresolvableOwner(String),
    #[error("evaluation item {0} not found")]
    ItemNotFound(String),
    #[error("evaluator {evaluator} is not assigned to pointer {pointer} of enrollment {enrollment}")]
    Unauthorized {
        evaluator: String,
        enrollment: String,
        pointer: u8,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ScoringError {
    /// Storage failures are retryable; every other variant is a rejected request.
    pub fn is_storage(&self) -> bool {
        matches!(self, ScoringError::Repository(RepositoryError::Unavailable(_)))
    }
}
