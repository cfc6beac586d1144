use crate::cli::ServeArgs;
use crate::demo::{apply_builtin_grades, seed_demo};
use crate::infra::{in_memory_service, AppState};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use ivy_scorecard::config::AppConfig;
use ivy_scorecard::error::AppError;
use ivy_scorecard::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.seed_demo {
        config.seed_demo = true;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let scoring_service = in_memory_service();
    if config.seed_demo {
        let seed = seed_demo(&scoring_service)?;
        let scorecard = apply_builtin_grades(&scoring_service, &seed)?;
        info!(
            enrollment = %seed.enrollment_id.0,
            overall_score = scorecard.overall_score,
            "demo enrollment seeded"
        );
    }

    let app = with_scoring_routes(scoring_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "ivy scorecard service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
