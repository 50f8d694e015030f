//! Health, status and Prometheus endpoints shared by every service.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use ledger::{Ledger, SlotCounts};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::error::ApiError;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct LedgerStatusResponse {
    pub status: &'static str,
    pub resource: &'static str,
    pub slots: SlotCounts,
}

/// GET /health and GET /status: liveness.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// GET /status on a resource service: liveness plus slot counts.
pub async fn ledger_status<L: Ledger + Clone + 'static>(
    State(ledger): State<L>,
) -> Result<Json<LedgerStatusResponse>, ApiError> {
    let slots = ledger.counts().await?;
    Ok(Json(LedgerStatusResponse {
        status: "ok",
        resource: ledger.kind().as_str(),
        slots,
    }))
}

/// GET /metrics: Prometheus text exposition.
pub async fn metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
