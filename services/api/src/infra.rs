use ivy_scorecard::scoring::{InMemoryScoringStore, ScoringService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type MemoryScoringService =
    ScoringService<InMemoryScoringStore, InMemoryScoringStore, InMemoryScoringStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Scoring service backed by one shared in-memory store for every repository seam.
pub(crate) fn in_memory_service() -> Arc<MemoryScoringService> {
    let store = Arc::new(InMemoryScoringStore::default());
    Arc::new(ScoringService::new(store.clone(), store.clone(), store))
}
