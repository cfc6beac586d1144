use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::scoring::domain::{
    Enrollment, EnrollmentId, EnrollmentRegistration, EvaluationItem, EvaluatorAssignment,
    EvaluatorId, Grade, GradeSubmission, ItemId, ItemKind, NewItem, NewItemKind, StudentId,
};
use crate::scoring::memory::InMemoryScoringStore;
use crate::scoring::pointer::PointerId;
use crate::scoring::repository::{
    EnrollmentRepository, EvaluationRepository, RepositoryError, ScoreStore,
};
use crate::scoring::scorecard::{ScoreRecord, Scorecard};
use crate::scoring::service::{RecomputeOutcome, ScoringService};

pub(super) type MemoryService =
    ScoringService<InMemoryScoringStore, InMemoryScoringStore, InMemoryScoringStore>;

pub(super) const LEAD: &str = "eval-lead";

pub(super) fn build_service() -> (MemoryService, Arc<InMemoryScoringStore>) {
    let store = Arc::new(InMemoryScoringStore::default());
    let service = ScoringService::new(store.clone(), store.clone(), store.clone());
    (service, store)
}

pub(super) fn lead() -> EvaluatorId {
    EvaluatorId(LEAD.to_string())
}

pub(super) fn registration(student: &str) -> EnrollmentRegistration {
    EnrollmentRegistration {
        student_id: StudentId(student.to_string()),
        evaluators: vec![EvaluatorAssignment {
            evaluator: lead(),
            pointers: BTreeSet::new(),
        }],
    }
}

pub(super) fn register<E, V, S>(service: &ScoringService<E, V, S>) -> Enrollment
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    service
        .register_enrollment(registration("stu-100"))
        .expect("registration succeeds")
}

pub(super) fn new_item(pointer: PointerId, title: &str) -> NewItem {
    let kind = match pointer {
        PointerId::AcademicExcellence => NewItemKind::Document,
        PointerId::SpikeInOneArea
        | PointerId::LeadershipInitiative
        | PointerId::GlobalSocialImpact => NewItemKind::Activity,
        PointerId::AuthenticStorytelling => NewItemKind::Narrative,
        PointerId::IntellectualCuriosity => NewItemKind::Certificate {
            file_key: format!("certs/{title}.pdf"),
        },
    };
    NewItem {
        pointer,
        title: title.to_string(),
        kind,
    }
}

pub(super) fn add<E, V, S>(
    service: &ScoringService<E, V, S>,
    enrollment: &EnrollmentId,
    pointer: PointerId,
    title: &str,
) -> ItemId
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    service
        .add_item(enrollment, new_item(pointer, title))
        .expect("item accepted")
        .id
}

pub(super) fn grade<E, V, S>(
    service: &ScoringService<E, V, S>,
    item: &ItemId,
    score: f64,
) -> RecomputeOutcome
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    service
        .grade_item(GradeSubmission {
            item_id: item.clone(),
            evaluator: lead(),
            score,
            feedback: None,
        })
        .expect("grade accepted")
}

static FIXTURE_ITEMS: AtomicU64 = AtomicU64::new(1);

/// Detached item for exercising sub-scoring modules without a store.
pub(super) fn item(pointer: PointerId, kind: ItemKind, score: Option<f64>) -> EvaluationItem {
    let id = FIXTURE_ITEMS.fetch_add(1, Ordering::Relaxed);
    let revision = kind.revision();
    EvaluationItem {
        id: ItemId(format!("fixture-{id}")),
        enrollment_id: EnrollmentId("enr-fixture".to_string()),
        pointer,
        title: format!("fixture {id}"),
        kind,
        grade: score.map(|score| Grade {
            score,
            feedback: None,
            evaluator: lead(),
            graded_at: Utc::now(),
            revision,
        }),
        created_at: Utc::now(),
    }
}

pub(super) fn enrollment(id: &str) -> Enrollment {
    Enrollment {
        id: EnrollmentId(id.to_string()),
        student_id: Some(StudentId("stu-1".to_string())),
        registered_at: Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap(),
        overall_score: None,
        evaluators: Vec::new(),
    }
}

pub(super) fn record(
    enrollment: &str,
    pointer: PointerId,
    obtained: f64,
    max: f64,
) -> ScoreRecord {
    ScoreRecord {
        enrollment_id: EnrollmentId(enrollment.to_string()),
        pointer,
        score_obtained: obtained,
        max_score: max,
        basis: None,
        last_updated: Utc
            .with_ymd_and_hms(2025, 9, 2, 8, u32::from(pointer.number()), 0)
            .unwrap(),
    }
}

/// Score store that can be switched into an outage for scorecard writes.
#[derive(Default)]
pub(super) struct FlakyScores {
    pub(super) inner: InMemoryScoringStore,
    pub(super) records_offline: AtomicBool,
    pub(super) scorecards_offline: AtomicBool,
}

impl FlakyScores {
    fn check(flag: &AtomicBool) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable("score store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ScoreStore for FlakyScores {
    fn record(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Option<ScoreRecord>, RepositoryError> {
        self.inner.record(enrollment, pointer)
    }

    fn records_for(&self, enrollment: &EnrollmentId) -> Result<Vec<ScoreRecord>, RepositoryError> {
        self.inner.records_for(enrollment)
    }

    fn upsert_record(&self, record: ScoreRecord) -> Result<(), RepositoryError> {
        Self::check(&self.records_offline)?;
        self.inner.upsert_record(record)
    }

    fn scorecard(&self, enrollment: &EnrollmentId) -> Result<Option<Scorecard>, RepositoryError> {
        self.inner.scorecard(enrollment)
    }

    fn replace_scorecard(&self, scorecard: Scorecard) -> Result<(), RepositoryError> {
        Self::check(&self.scorecards_offline)?;
        self.inner.replace_scorecard(scorecard)
    }

    fn purge_scores(&self, enrollment: &EnrollmentId) -> Result<(), RepositoryError> {
        self.inner.purge_scores(enrollment)
    }
}

pub(super) fn flaky_service() -> (
    ScoringService<InMemoryScoringStore, InMemoryScoringStore, FlakyScores>,
    Arc<FlakyScores>,
) {
    let store = Arc::new(InMemoryScoringStore::default());
    let scores = Arc::new(FlakyScores::default());
    let service = ScoringService::new(store.clone(), store, scores.clone());
    (service, scores)
}

/// Score store that signals, then stalls, the first time the writer reads a record.
pub(super) struct GatedScores {
    pub(super) inner: InMemoryScoringStore,
    entered: Mutex<Option<mpsc::Sender<()>>>,
}

impl ScoreStore for GatedScores {
    fn record(
        &self,
        enrollment: &EnrollmentId,
        pointer: PointerId,
    ) -> Result<Option<ScoreRecord>, RepositoryError> {
        let signal = self
            .entered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = signal {
            let _ = sender.send(());
            thread::sleep(Duration::from_millis(50));
        }
        self.inner.record(enrollment, pointer)
    }

    fn records_for(&self, enrollment: &EnrollmentId) -> Result<Vec<ScoreRecord>, RepositoryError> {
        self.inner.records_for(enrollment)
    }

    fn upsert_record(&self, record: ScoreRecord) -> Result<(), RepositoryError> {
        self.inner.upsert_record(record)
    }

    fn scorecard(&self, enrollment: &EnrollmentId) -> Result<Option<Scorecard>, RepositoryError> {
        self.inner.scorecard(enrollment)
    }

    fn replace_scorecard(&self, scorecard: Scorecard) -> Result<(), RepositoryError> {
        self.inner.replace_scorecard(scorecard)
    }

    fn purge_scores(&self, enrollment: &EnrollmentId) -> Result<(), RepositoryError> {
        self.inner.purge_scores(enrollment)
    }
}

pub(super) fn gated_service() -> (
    ScoringService<InMemoryScoringStore, InMemoryScoringStore, GatedScores>,
    Arc<GatedScores>,
    mpsc::Receiver<()>,
) {
    let (sender, entered) = mpsc::channel();
    let store = Arc::new(InMemoryScoringStore::default());
    let scores = Arc::new(GatedScores {
        inner: InMemoryScoringStore::default(),
        entered: Mutex::new(Some(sender)),
    });
    let service = ScoringService::new(store.clone(), store, scores.clone());
    (service, scores, entered)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
