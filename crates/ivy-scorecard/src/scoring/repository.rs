use super::domain::{
    AssessmentSection, Enrollment, EnrollmentId, EvaluationItem, EvaluatorAssignment, ItemId,
};
use super::pointer::PointerId;
use super::scorecard::{ScoreRecord, Scorecard};
use super::weights::ActivitySelection;

/// Storage abstraction for enrollment records.
pub trait EnrollmentRepository: Send + Sync {
    fn insert(&self, enrollment: Enrollment) -> Result<Enrollment, RepositoryError>;
    fn fetch(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError>;
    fn list(&self, limit: usize) -> Result<Vec<Enrollment>, RepositoryError>;
    /// Adds or replaces the assignment for `assignment.evaluator`.
    fn assign_evaluator(
        &self,
        id: &EnrollmentId,
        assignment: EvaluatorAssignment,
    ) -> Result<Enrollment, RepositoryError>;
    /// Denormalized overall score; only enrollment sync calls this.
    fn set_overall_score(&self, id: &EnrollmentId, overall: f64) -> Result<(), RepositoryError>;
    fn delete(&self, id: &EnrollmentId) -> Result<bool, RepositoryError>;
}

/// Evaluation items plus the per-pointer inputs that sit beside them.
pub trait EvaluationRepository: Send + Sync {
    fn insert_item(&self, item: EvaluationItem) -> Result<EvaluationItem, RepositoryError>;
    fn update_item(&self, item: EvaluationItem) -> Result<(), RepositoryError>;
    fn fetch_item(&self, id: &ItemId) -> Result<Option<EvaluationItem>, RepositoryError>;
    fn items_for(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Vec<EvaluationItem>, RepositoryError>;
    fn remove_item(&self, id: &ItemId) -> Result<Option<EvaluationItem>, RepositoryError>;
    fn sections_for(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Vec<AssessmentSection>, RepositoryError>;
    fn replace_sections(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
        sections: Vec<AssessmentSection>,
    ) -> Result<(), RepositoryError>;
    fn selection_for(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Option<ActivitySelection>, RepositoryError>;
    fn save_selection(&self, selection: ActivitySelection) -> Result<(), RepositoryError>;
    fn purge_evaluations(&self, enrollment: &EnrollmentId) -> Result<(), RepositoryError>;
}

/// Score record and scorecard storage. Only the pointer score writer and the scorecard
/// aggregator write through this trait.
pub trait ScoreStore: Send + Sync {
    fn record(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Option<ScoreRecord>, RepositoryError>;
    fn records_for(&self, enrollment: &EnrollmentId) -> Result<Vec<ScoreRecord>, RepositoryError>;
    fn upsert_record(&self, record: ScoreRecord) -> Result<(), RepositoryError>;
    fn scorecard(&self, enrollment: &EnrollmentId) -> Result<Option<Scorecard>, RepositoryError>;
    fn replace_scorecard(&self, scorecard: Scorecard) -> Result<(), RepositoryError>;
    fn purge_scores(&self, enrollment: &EnrollmentId) -> Result<(), RepositoryError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
