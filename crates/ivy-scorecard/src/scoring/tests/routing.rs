use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::scoring::memory::InMemoryScoringStore;
use crate::scoring::pointer::PointerId;
use crate::scoring::router::{self, scoring_router, status_for};
use crate::scoring::service::ScoringError;
use crate::scoring::RepositoryError;

fn json_request(method: Method, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap()
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn register_route_creates_enrollment() {
    let (service, _) = build_service();
    let router = scoring_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/enrollments",
            json!({
                "student_id": "stu-300",
                "evaluators": [{ "evaluator": "eval-lead" }]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["student_id"], "stu-300");
    assert!(payload["id"].as_str().unwrap().starts_with("enr-"));
}

#[tokio::test]
async fn grade_route_returns_recomputed_scorecard() {
    let (service, _) = build_service();
    let enrollment = register(&service);
    let essay = add(&service, &enrollment.id, PointerId::AuthenticStorytelling, "Essay");
    let router = scoring_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/items/{}/grade", essay.0),
            json!({ "evaluator": LEAD, "score": 8.0, "feedback": "Vivid" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["pointer_score"]["value"], 8.0);
    assert_eq!(payload["pointer_score"]["basis"]["basis"], "average");
    assert_eq!(payload["scorecard"]["overall_score"], 1.2);
}

#[tokio::test]
async fn grade_route_rejects_out_of_range_scores() {
    let (service, _) = build_service();
    let enrollment = register(&service);
    let essay = add(&service, &enrollment.id, PointerId::AuthenticStorytelling, "Essay");
    let router = scoring_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/items/{}/grade", essay.0),
            json!({ "evaluator": LEAD, "score": 11.0 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload["error"].as_str().unwrap().contains("0-10"));
}

#[tokio::test]
async fn grade_route_forbids_unassigned_evaluator() {
    let (service, _) = build_service();
    let enrollment = register(&service);
    let essay = add(&service, &enrollment.id, PointerId::AuthenticStorytelling, "Essay");
    let router = scoring_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/items/{}/grade", essay.0),
            json!({ "evaluator": "eval-stranger", "score": 5.0 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_pointer_segment_is_not_found() {
    let (service, _) = build_service();
    let enrollment = register(&service);
    let router = scoring_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/v1/enrollments/{}/pointers/9/weights", enrollment.id.0),
            json!({}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload["error"].as_str().unwrap().contains('9'));
}

#[tokio::test]
async fn selection_and_weight_routes_drive_activity_pointer() {
    let (service, _) = build_service();
    let enrollment = register(&service);
    let pointer = PointerId::LeadershipInitiative;
    let captain = add(&service, &enrollment.id, pointer, "Captain");
    let founder = add(&service, &enrollment.id, pointer, "Founder");
    grade(&service, &captain, 9.0);
    grade(&service, &founder, 4.0);
    let router = scoring_router(Arc::new(service));
    let base = format!("/api/v1/enrollments/{}/pointers/3", enrollment.id.0);

    for item in [&captain, &founder] {
        let response = router
            .clone()
            .oneshot(empty_request(
                Method::POST,
                &format!("{base}/selections/{}", item.0),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let mut weights = serde_json::Map::new();
    weights.insert(captain.0.clone(), json!(70.0));
    weights.insert(founder.0.clone(), json!(30.0));
    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("{base}/weights"),
            Value::Object(weights),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let value = payload["pointer_score"]["value"].as_f64().unwrap();
    assert!((value - 7.5).abs() < 1e-9);

    let response = router
        .oneshot(empty_request(
            Method::DELETE,
            &format!("{base}/selections/{}", founder.0),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["pointer_score"]["value"], 9.0);
}

#[tokio::test]
async fn scorecard_route_marks_fallback_results() {
    let (service, _) = build_service();
    let enrollment = register(&service);
    let pointer = PointerId::SpikeInOneArea;
    let olympiad = add(&service, &enrollment.id, pointer, "Olympiad");
    let paper = add(&service, &enrollment.id, pointer, "Paper");
    grade(&service, &olympiad, 9.0);
    grade(&service, &paper, 4.0);
    for item in [&olympiad, &paper] {
        service
            .select_activity(&enrollment.id, pointer, item)
            .expect("select");
    }
    let router = scoring_router(Arc::new(service));
    let base = format!("/api/v1/enrollments/{}", enrollment.id.0);

    let response = router
        .clone()
        .oneshot(empty_request(Method::GET, &format!("{base}/scorecard")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["pointer_scores"][1]["score"], 6.5);
    assert_eq!(payload["pointer_scores"][1]["degraded"], true);
    assert_eq!(
        payload["pointer_scores"][1]["basis"]["basis"],
        "fallback_mean"
    );
    assert_eq!(payload["pointer_scores"][0]["degraded"], false);

    let response = router
        .oneshot(empty_request(Method::POST, &format!("{base}/recalculate")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["pointer_scores"][1]["degraded"], true);
}

#[tokio::test]
async fn scorecard_route_for_missing_enrollment_is_not_found() {
    let (service, _) = build_service();
    let router = scoring_router(Arc::new(service));

    let response = router
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/enrollments/enr-missing/scorecard",
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_route_returns_no_content() {
    let (service, _) = build_service();
    let enrollment = register(&service);
    let router = scoring_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(empty_request(
            Method::DELETE,
            &format!("/api/v1/enrollments/{}", enrollment.id.0),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .oneshot(empty_request(
            Method::GET,
            &format!("/api/v1/enrollments/{}", enrollment.id.0),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn audit_handler_reports_consistency() {
    let (service, _) = build_service();
    let enrollment = register(&service);
    let essay = add(&service, &enrollment.id, PointerId::AuthenticStorytelling, "Essay");
    grade(&service, &essay, 7.0);

    let response = router::audit_handler::<
        InMemoryScoringStore,
        InMemoryScoringStore,
        InMemoryScoringStore,
    >(State(Arc::new(service)), Path(enrollment.id.0.clone()))
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["drift"], json!([]));
    assert_eq!(payload["recomputed_overall"], 1.05);
}

#[test]
fn storage_failures_map_to_service_unavailable() {
    let unavailable = ScoringError::Repository(RepositoryError::Unavailable("down".to_string()));
    let conflict = ScoringError::Repository(RepositoryError::Conflict);

    assert_eq!(status_for(&unavailable), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(status_for(&conflict), StatusCode::CONFLICT);
}
