use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use ivy_scorecard::scoring::{
    scoring_router, EnrollmentRepository, EvaluationRepository, ScoreStore, ScoringService,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_scoring_routes<E, V, S>(service: Arc<ScoringService<E, V, S>>) -> axum::Router
where
    E: EnrollmentRepository + 'static,
    V: EvaluationRepository + 'static,
    S: ScoreStore + 'static,
{
    scoring_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::in_memory_service;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn app_state(ready: bool) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        }
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let state = app_state(false);
        let readiness = state.readiness.clone();
        let app = with_scoring_routes(in_memory_service()).layer(Extension(state));

        let response = app
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        readiness.store(true, Ordering::Release);
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn health_and_scoring_routes_share_one_router() {
        let app = with_scoring_routes(in_memory_service()).layer(Extension(app_state(true)));

        let health = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .expect("route executes");
        assert_eq!(health.status(), StatusCode::OK);

        let enrollments = app
            .oneshot(
                Request::get("/api/v1/enrollments")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("route executes");
        assert_eq!(enrollments.status(), StatusCode::OK);
        assert_eq!(read_json(enrollments).await, json!([]));
    }

    #[tokio::test]
    async fn metrics_render_as_prometheus_text() {
        let app = with_scoring_routes(in_memory_service()).layer(Extension(app_state(true)));

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }
}
