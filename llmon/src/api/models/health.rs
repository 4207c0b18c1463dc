use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of the `/` probe
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RootResponse {
    pub status: String,
    pub message: String,
}

/// Body of the `/health` probe
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
