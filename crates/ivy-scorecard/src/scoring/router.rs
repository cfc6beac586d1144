use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    AssessmentSection, EnrollmentId, EnrollmentRegistration, EvaluatorAssignment, EvaluatorId,
    GradeSubmission, ItemId, NewItem,
};
use super::pointer::PointerId;
use super::repository::{EnrollmentRepository, EvaluationRepository, RepositoryError, ScoreStore};
use super::service::{ScoringError, ScoringService};

const LIST_LIMIT: usize = 200;

/// Router builder exposing the scoring service to the surrounding CRM.
pub fn scoring_router<E, V, S>(service: Arc<ScoringService<E, V, S>>) -> Router
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/enrollments",
            post(register_handler::<E, V, S>).get(list_handler::<E, V, S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id",
            get(enrollment_handler::<E, V, S>).delete(delete_enrollment_handler::<E, V, S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/evaluators",
            post(assign_evaluator_handler::<E, V, S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/scorecard",
            get(scorecard_handler::<E, V, S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/recalculate",
            post(recalculate_handler::<E, V, S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/audit",
            get(audit_handler::<E, V, S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/items",
            post(add_item_handler::<E, V, S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/pointers/:pointer/sections",
            put(sections_handler::<E, V, S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/pointers/:pointer/selections/:item_id",
            post(select_handler::<E, V, S>).delete(deselect_handler::<E, V, S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/pointers/:pointer/weights",
            put(weights_handler::<E, V, S>),
        )
        .route(
            "/api/v1/items/:item_id",
            axum::routing::delete(remove_item_handler::<E, V, S>),
        )
        .route("/api/v1/items/:item_id/grade", post(grade_handler::<E, V, S>))
        .route(
            "/api/v1/items/:item_id/file",
            put(replace_file_handler::<E, V, S>),
        )
        .with_state(service)
}

type SharedService<E, V, S> = State<Arc<ScoringService<E, V, S>>>;

#[derive(Debug, Clone, Deserialize)]
pub struct GradeRequest {
    pub evaluator: EvaluatorId,
    pub score: f64,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceFileRequest {
    pub file_key: String,
}

pub fn status_for(error: &ScoringError) -> StatusCode {
    match error {
        ScoringError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ScoringError::UnknownPointer(_)
        | ScoringError::EnrollmentNotFound(_)
        | ScoringError::UnresolvableOwner(_)
        | ScoringError::ItemNotFound(_)
        | ScoringError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ScoringError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        ScoringError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ScoringError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub(crate) fn error_response(error: ScoringError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (status_for(&error), Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, ScoringError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

fn pointer_from_path(raw: u8) -> Result<PointerId, ScoringError> {
    Ok(PointerId::try_from(raw)?)
}

pub(crate) async fn register_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Json(registration): Json<EnrollmentRegistration>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(
        StatusCode::CREATED,
        service.register_enrollment(registration),
    )
}

pub(crate) async fn list_handler<E, V, S>(State(service): SharedService<E, V, S>) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(StatusCode::OK, service.list_enrollments(LIST_LIMIT))
}

pub(crate) async fn enrollment_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(enrollment_id): Path<String>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(
        StatusCode::OK,
        service.enrollment(&EnrollmentId(enrollment_id)),
    )
}

pub(crate) async fn delete_enrollment_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(enrollment_id): Path<String>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    match service.delete_enrollment(&EnrollmentId(enrollment_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn assign_evaluator_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(enrollment_id): Path<String>,
    Json(assignment): Json<EvaluatorAssignment>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(
        StatusCode::OK,
        service.assign_evaluator(&EnrollmentId(enrollment_id), assignment),
    )
}

pub(crate) async fn scorecard_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(enrollment_id): Path<String>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(StatusCode::OK, service.scorecard(&EnrollmentId(enrollment_id)))
}

pub(crate) async fn recalculate_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(enrollment_id): Path<String>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(
        StatusCode::OK,
        service.recompute_all(&EnrollmentId(enrollment_id)),
    )
}

pub(crate) async fn audit_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(enrollment_id): Path<String>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(StatusCode::OK, service.audit(&EnrollmentId(enrollment_id)))
}

pub(crate) async fn add_item_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(enrollment_id): Path<String>,
    Json(new_item): Json<NewItem>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(
        StatusCode::CREATED,
        service.add_item(&EnrollmentId(enrollment_id), new_item),
    )
}

pub(crate) async fn grade_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(item_id): Path<String>,
    Json(request): Json<GradeRequest>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    let submission = GradeSubmission {
        item_id: ItemId(item_id),
        evaluator: request.evaluator,
        score: request.score,
        feedback: request.feedback,
    };
    respond(StatusCode::OK, service.grade_item(submission))
}

pub(crate) async fn replace_file_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(item_id): Path<String>,
    Json(request): Json<ReplaceFileRequest>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(
        StatusCode::OK,
        service.replace_certificate(&ItemId(item_id), request.file_key),
    )
}

pub(crate) async fn remove_item_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path(item_id): Path<String>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    respond(StatusCode::OK, service.remove_item(&ItemId(item_id)))
}

pub(crate) async fn sections_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path((enrollment_id, pointer)): Path<(String, u8)>,
    Json(sections): Json<Vec<AssessmentSection>>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    let result = pointer_from_path(pointer).and_then(|pointer| {
        service.record_sections(&EnrollmentId(enrollment_id), pointer, sections)
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn select_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path((enrollment_id, pointer, item_id)): Path<(String, u8, String)>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    let result = pointer_from_path(pointer).and_then(|pointer| {
        service.select_activity(&EnrollmentId(enrollment_id), pointer, &ItemId(item_id))
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn deselect_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path((enrollment_id, pointer, item_id)): Path<(String, u8, String)>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    let result = pointer_from_path(pointer).and_then(|pointer| {
        service.deselect_activity(&EnrollmentId(enrollment_id), pointer, &ItemId(item_id))
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn weights_handler<E, V, S>(
    State(service): SharedService<E, V, S>,
    Path((enrollment_id, pointer)): Path<(String, u8)>,
    Json(weights): Json<BTreeMap<String, f64>>,
) -> Response
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    let weights = weights
        .into_iter()
        .map(|(item_id, weight)| (ItemId(item_id), weight))
        .collect();
    let result = pointer_from_path(pointer).and_then(|pointer| {
        service.assign_weights(&EnrollmentId(enrollment_id), pointer, weights)
    });
    respond(StatusCode::OK, result)
}
