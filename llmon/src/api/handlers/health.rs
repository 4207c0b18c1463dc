use axum::Json;

use crate::api::models::health::{HealthResponse, RootResponse};

#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    summary = "Service banner",
    responses(
        (status = 200, description = "Service is running", body = RootResponse),
    )
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok".to_string(),
        message: "LLM monitoring API is running".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}
