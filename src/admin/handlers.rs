use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::admin::AdminState;
use crate::error::SupervisorError;
use crate::health::{HealthEntry, HealthSnapshot};
use crate::workers::WorkerTelemetry;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub http: Option<HealthEntry>,
    pub workers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TelemetryQuery {
    #[serde(default)]
    pub refresh: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        http: state.health.http_server(),
        workers: state.workers.get_registered_workers(),
    })
}

pub async fn get_health(State(state): State<AdminState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}

pub async fn get_workers(
    State(state): State<AdminState>,
    Query(query): Query<TelemetryQuery>,
) -> Json<Vec<WorkerTelemetry>> {
    Json(state.workers.collect_worker_telemetry(query.refresh).await)
}

pub async fn restart_worker(State(state): State<AdminState>, Path(name): Path<String>) -> Response {
    match state.workers.restart_worker(&name).await {
        Ok(result) => Json(result).into_response(),
        Err(SupervisorError::UnknownWorker(name)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown worker `{name}`") })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
