use axum::{Json, extract::State, http::StatusCode};

use crate::{AppState, api::models::events::EventResponse, engine::RawEvent, errors::Result};

#[utoipa::path(
    post,
    path = "/api/events",
    tag = "events",
    summary = "Record an LLM call",
    request_body = RawEvent,
    responses(
        (status = 201, description = "Event priced and stored", body = EventResponse),
        (status = 400, description = "Invalid event"),
        (status = 503, description = "Event store unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn record_event(State(state): State<AppState>, Json(raw): Json<RawEvent>) -> Result<(StatusCode, Json<EventResponse>)> {
    let event = state.engine.record_event(raw).await?;
    Ok((StatusCode::CREATED, Json(EventResponse::from(event))))
}
