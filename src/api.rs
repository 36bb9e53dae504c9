// src/api.rs
//! Small read-only HTTP surface of the daemon: liveness, last poll report and
//! Prometheus metrics.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::watch;

use crate::poll::PollReport;
use crate::scheduler::Registration;

#[derive(Clone)]
pub struct AppState {
    pub reports: watch::Receiver<Option<PollReport>>,
    pub registration: Option<Registration>,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Serialize)]
struct StatusBody {
    last_run: Option<PollReport>,
    schedule: Option<Registration>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    let last_run = state.reports.borrow().clone();
    Json(StatusBody {
        last_run,
        schedule: state.registration.clone(),
    })
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(h) => h.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
