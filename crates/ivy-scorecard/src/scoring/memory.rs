use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    AssessmentSection, Enrollment, EnrollmentId, EvaluationItem, EvaluatorAssignment, ItemId,
};
use super::pointer::PointerId;
use super::repository::{EnrollmentRepository, EvaluationRepository, RepositoryError, ScoreStore};
use super::scorecard::{ScoreRecord, Scorecard};
use super::weights::ActivitySelection;

type PointerKey = (EnrollmentId, PointerId);

/// Process-local store backing every storage trait, used by the API service and tests.
#[derive(Default, Clone)]
pub struct InMemoryScoringStore {
    enrollments: Arc<Mutex<BTreeMap<EnrollmentId, Enrollment>>>,
    items: Arc<Mutex<BTreeMap<ItemId, EvaluationItem>>>,
    sections: Arc<Mutex<HashMap<PointerKey, Vec<AssessmentSection>>>>,
    selections: Arc<Mutex<HashMap<PointerKey, ActivitySelection>>>,
    records: Arc<Mutex<HashMap<PointerKey, ScoreRecord>>>,
    scorecards: Arc<Mutex<HashMap<EnrollmentId, Scorecard>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

impl EnrollmentRepository for InMemoryScoringStore {
    fn insert(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError> {
        let mut guard = lock(&self.enrollments)?;
        if guard.contains_key(&enrollment.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(enrollment.id.clone(), enrollment.clone());
        Ok(enrollment)
    }

    fn fetch(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(lock(&self.enrollments)?.get(id).cloned())
    }

    fn list(&self, limit: usize) -> Result<Vec<Enrollment>, RepositoryError> {
        Ok(lock(&self.enrollments)?
            .values()
            .take(limit)
            .cloned()
            .collect())
    }

    fn assign_evaluator(
        &self,
        id: &EnrollmentId,
        assignment: EvaluatorAssignment,
    ) -> Result<Enrollment, RepositoryError> {
        let mut guard = lock(&self.enrollments)?;
        let enrollment = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        enrollment
            .evaluators
            .retain(|existing| existing.evaluator != assignment.evaluator);
        enrollment.evaluators.push(assignment);
        Ok(enrollment.clone())
    }

    fn set_overall_score(&self, id: &EnrollmentId, overall: f64) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.enrollments)?;
        let enrollment = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        enrollment.overall_score = Some(overall);
        Ok(())
    }

    fn delete(&self, id: &EnrollmentId) -> Result<bool, RepositoryError> {
        Ok(lock(&self.enrollments)?.remove(id).is_some())
    }
}

impl EvaluationRepository for InMemoryScoringStore {
    fn insert_item(&self, item: EvaluationItem) -> Result<EvaluationItem, RepositoryError> {
        let mut guard = lock(&self.items)?;
        if guard.contains_key(&item.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    fn update_item(&self, item: EvaluationItem) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.items)?;
        match guard.get_mut(&item.id) {
            Some(existing) => {
                *existing = item;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_item(&self, id: &ItemId) -> Result<Option<EvaluationItem>, RepositoryError> {
        Ok(lock(&self.items)?.get(id).cloned())
    }

    fn items_for(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Vec<EvaluationItem>, RepositoryError> {
        Ok(lock(&self.items)?
            .values()
            .filter(|item| item.enrollment_id == *enrollment && item.pointer == pointer)
            .cloned()
            .collect())
    }

    fn remove_item(&self, id: &ItemId) -> Result<Option<EvaluationItem>, RepositoryError> {
        Ok(lock(&self.items)?.remove(id))
    }

    fn sections_for(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Vec<AssessmentSection>, RepositoryError> {
        Ok(lock(&self.sections)?
            .get(&(enrollment.clone(), pointer))
            .cloned()
            .unwrap_or_default())
    }

    fn replace_sections(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
        sections: Vec<AssessmentSection>,
    ) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.sections)?;
        let key = (enrollment.clone(), pointer);
        if sections.is_empty() {
            guard.remove(&key);
        } else {
            guard.insert(key, sections);
        }
        Ok(())
    }

    fn selection_for(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Option<ActivitySelection>, RepositoryError> {
        Ok(lock(&self.selections)?
            .get(&(enrollment.clone(), pointer))
            .cloned())
    }

    fn save_selection(&self, selection: ActivitySelection) -> Result<(), RepositoryError> {
        let key = (selection.enrollment_id.clone(), selection.pointer);
        lock(&self.selections)?.insert(key, selection);
        Ok(())
    }

    fn purge_evaluations(&self, enrollment: &EnrollmentId) -> Result<(), RepositoryError> {
        lock(&self.items)?.retain(|_, item| item.enrollment_id != *enrollment);
        lock(&self.sections)?.retain(|(owner, _), _| owner != enrollment);
        lock(&self.selections)?.retain(|(owner, _), _| owner != enrollment);
        Ok(())
    }
}

impl ScoreStore for InMemoryScoringStore {
    fn record(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Option<ScoreRecord>, RepositoryError> {
        Ok(lock(&self.records)?
            .get(&(enrollment.clone(), pointer))
            .cloned())
    }

    fn records_for(&self, enrollment: &EnrollmentId) -> Result<Vec<ScoreRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut records: Vec<ScoreRecord> = guard
            .values()
            .filter(|record| record.enrollment_id == *enrollment)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.pointer);
        Ok(records)
    }

    fn upsert_record(&self, record: ScoreRecord) -> Result<(), RepositoryError> {
        let key = (record.enrollment_id.clone(), record.pointer);
        lock(&self.records)?.insert(key, record);
        Ok(())
    }

    fn scorecard(&self, enrollment: &EnrollmentId) -> Result<Option<Scorecard>, RepositoryError> {
        Ok(lock(&self.scorecards)?.get(enrollment).cloned())
    }

    fn replace_scorecard(&self, scorecard: Scorecard) -> Result<(), RepositoryError> {
        lock(&self.scorecards)?.insert(scorecard.enrollment_id.clone(), scorecard);
        Ok(())
    }

    fn purge_scores(&self, enrollment: &EnrollmentId) -> Result<(), RepositoryError> {
        lock(&self.records)?.retain(|(owner, _), _| owner != enrollment);
        lock(&self.scorecards)?.remove(enrollment);
        Ok(())
    }
}
