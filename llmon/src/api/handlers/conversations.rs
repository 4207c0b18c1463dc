use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::conversations::{ConversationsResponse, ListConversationsQuery},
    errors::Result,
};

#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    summary = "List events",
    params(ListConversationsQuery),
    responses(
        (status = 200, description = "Newest-first page of events", body = ConversationsResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 503, description = "Event store unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListConversationsQuery>,
) -> Result<Json<ConversationsResponse>> {
    let filter = state.filters.listing(query.into())?;
    let page = state.engine.list_events(&filter).await?;
    Ok(Json(ConversationsResponse::from(page)))
}
