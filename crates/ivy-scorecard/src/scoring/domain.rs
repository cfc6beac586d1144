use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pointer::{PointerCategory, PointerId};

/// Native scale every evaluator grade and normalized pointer score is expressed on.
pub const MAX_SCORE: f64 = 10.0;

/// Identifier wrapper for enrollments in the scoring track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnrollmentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EvaluatorId(pub String);

/// Identifier wrapper for evaluation items (documents, activities, narratives, certificates).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

/// A student's registration in the scoring-bearing service track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    /// `None` once the owning student record has been detached upstream.
    pub student_id: Option<StudentId>,
    pub registered_at: DateTime<Utc>,
    /// Denormalized copy of the latest scorecard overall; written only by enrollment sync.
    pub overall_score: Option<f64>,
    pub evaluators: Vec<EvaluatorAssignment>,
}

impl Enrollment {
    pub fn owner(&self) -> Option<&StudentId> {
        self.student_id
            .as_ref()
            .filter(|student| !student.0.trim().is_empty())
    }

    pub fn authorizes(&self, evaluator: &EvaluatorId, pointer: PointerId) -> bool {
        self.evaluators
            .iter()
            .any(|assignment| assignment.evaluator == *evaluator && assignment.covers(pointer))
    }
}

/// Evaluator attached to an enrollment. An empty pointer scope covers every pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorAssignment {
    pub evaluator: EvaluatorId,
    #[serde(default)]
    pub pointers: BTreeSet<PointerId>,
}

impl EvaluatorAssignment {
    pub fn covers(&self, pointer: PointerId) -> bool {
        self.pointers.is_empty() || self.pointers.contains(&pointer)
    }
}

/// Intake payload for a new enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRegistration {
    pub student_id: StudentId,
    #[serde(default)]
    pub evaluators: Vec<EvaluatorAssignment>,
}

/// Leaf unit scored by a human evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationItem {
    pub id: ItemId,
    pub enrollment_id: EnrollmentId,
    pub pointer: PointerId,
    pub title: String,
    pub kind: ItemKind,
    pub grade: Option<Grade>,
    pub created_at: DateTime<Utc>,
}

impl EvaluationItem {
    /// Grade that still applies to the item's current revision.
    pub fn current_grade(&self) -> Option<&Grade> {
        self.grade
            .as_ref()
            .filter(|grade| grade.revision == self.kind.revision())
    }

    pub fn current_score(&self) -> Option<f64> {
        self.current_grade().map(|grade| grade.score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Document,
    Activity,
    Narrative,
    Certificate { file_key: String, revision: u32 },
}

impl ItemKind {
    pub const fn category(&self) -> PointerCategory {
        match self {
            ItemKind::Document => PointerCategory::DocumentAverage,
            ItemKind::Activity => PointerCategory::WeightedActivity,
            ItemKind::Narrative => PointerCategory::NarrativeTask,
            ItemKind::Certificate { .. } => PointerCategory::CertificateAverage,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            ItemKind::Document => "document",
            ItemKind::Activity => "activity",
            ItemKind::Narrative => "narrative",
            ItemKind::Certificate { .. } => "certificate",
        }
    }

    /// Only certificates are revised; every other kind stays at revision 0.
    pub fn revision(&self) -> u32 {
        match self {
            ItemKind::Certificate { revision, .. } => *revision,
            _ => 0,
        }
    }
}

/// Evaluator verdict for one item revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub score: f64,
    pub feedback: Option<String>,
    pub evaluator: EvaluatorId,
    pub graded_at: DateTime<Utc>,
    pub revision: u32,
}

/// Intake payload for a new evaluation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub pointer: PointerId,
    pub title: String,
    #[serde(flatten)]
    pub kind: NewItemKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewItemKind {
    Document,
    Activity,
    Narrative,
    Certificate { file_key: String },
}

impl NewItemKind {
    pub(crate) fn into_kind(self) -> ItemKind {
        match self {
            NewItemKind::Document => ItemKind::Document,
            NewItemKind::Activity => ItemKind::Activity,
            NewItemKind::Narrative => ItemKind::Narrative,
            NewItemKind::Certificate { file_key } => ItemKind::Certificate {
                file_key,
                revision: 1,
            },
        }
    }
}

/// Evaluator submission for a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSubmission {
    pub item_id: ItemId,
    pub evaluator: EvaluatorId,
    pub score: f64,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Weighted informal-assessment section feeding the document-average secondary half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSection {
    pub name: String,
    pub weightage: f64,
    pub score: f64,
}

/// Input rejected before any write took place.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("score {0} is outside the 0-10 range")]
    ScoreOutOfRange(f64),
    #[error("max score must be a positive number, got {0}")]
    InvalidMaxScore(f64),
    #[error("score obtained {obtained} is outside 0..={max}")]
    ObtainedOutOfRange { obtained: f64, max: f64 },
    #[error("weight {weight} for {item} is outside 0-100")]
    WeightOutOfRange { item: String, weight: f64 },
    #[error("weights total {total:.2}, expected 100")]
    WeightTotal { total: f64 },
    #[error("weights must name exactly the selected activities")]
    WeightCoverage,
    #[error("{kind} items cannot be attached to pointer {pointer}")]
    KindMismatch { pointer: u8, kind: &'static str },
    #[error("pointer {0} does not accept assessment sections")]
    SectionsUnsupported(u8),
    #[error("item {item} does not belong to pointer {pointer} of enrollment {enrollment}")]
    ItemOutsidePointer {
        item: String,
        enrollment: String,
        pointer: u8,
    },
    #[error("item {0} is not an activity")]
    NotAnActivity(String),
    #[error("item {0} is not a certificate")]
    NotACertificate(String),
    #[error("{0} must not be blank")]
    Blank(&'static str),
}

pub(crate) fn validate_score(score: f64) -> Result<f64, ValidationError> {
    if score.is_finite() && (0.0..=MAX_SCORE).contains(&score) {
        Ok(score)
    } else {
        Err(ValidationError::ScoreOutOfRange(score))
    }
}

pub(crate) fn require_text(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Blank(field))
    } else {
        Ok(())
    }
}
