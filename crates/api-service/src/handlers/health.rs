//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Handler for GET /healthz
///
/// Reports that the process is serving. Does not check dependencies.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}
