//! HTTP API layer.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Probes** (`/`, `/health`): liveness
//! - **Ingestion** (`POST /api/events`): record one LLM call
//! - **Metrics** (`/api/metrics/*`): overview and time series for the dashboard
//! - **Conversations** (`/api/conversations`): paginated raw events
//!
//! All endpoints are documented with `utoipa`; the document is served at `/api-docs/openapi.json`
//! and rendered at `/docs`.

pub mod handlers;
pub mod models;
