//! `/health` endpoint.

use axum::response::Json;
use serde::Serialize;

use crate::protocol::constants::HEALTH_STATUS_OK;

/// Health check response body
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server is running
    pub status: String,
}

/// Build a health response
pub fn health_check() -> HealthResponse {
    HealthResponse {
        status: HEALTH_STATUS_OK.into(),
    }
}

/// GET on the configured health path
pub async fn health_handler() -> Json<HealthResponse> {
    Json(health_check())
}
