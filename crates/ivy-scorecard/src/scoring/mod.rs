//! Multi-pointer weighted scoring: evaluation intake, per-pointer sub-scoring and the
//! writer → aggregator → enrollment sync pipeline that keeps each scorecard current.

mod aggregator;
pub mod domain;
mod locks;
pub mod memory;
pub mod modules;
pub mod pointer;
pub mod repository;
pub mod router;
pub mod scorecard;
pub mod service;
mod sync;
pub mod weights;
mod writer;

#[cfg(test)]
mod tests;

pub use aggregator::{compose_scorecard, ScorecardAggregator};
pub use domain::{
    AssessmentSection, Enrollment, EnrollmentId, EnrollmentRegistration, EvaluationItem,
    EvaluatorAssignment, EvaluatorId, Grade, GradeSubmission, ItemId, ItemKind, NewItem,
    NewItemKind, StudentId, ValidationError, MAX_SCORE,
};
pub use memory::InMemoryScoringStore;
pub use modules::{PointerInputs, PointerScore, ScoreBasis, SubScoringModule};
pub use pointer::{PointerCategory, PointerId, UnknownPointer};
pub use repository::{EnrollmentRepository, EvaluationRepository, RepositoryError, ScoreStore};
pub use router::scoring_router;
pub use scorecard::{PointerScoreEntry, ScoreRecord, Scorecard};
pub use service::{RecomputeOutcome, ScoringError, ScoringService};
pub use sync::{ConsistencyReport, Drift};
pub use weights::{ActivitySelection, WeightSet};
pub use writer::PointerScoreWriter;
