use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    AppState,
    api::models::metrics::{OverviewQuery, TimeSeriesQuery, TimeSeriesResponse},
    engine::OverviewMetrics,
    errors::Result,
};

#[utoipa::path(
    get,
    path = "/api/metrics/overview",
    tag = "metrics",
    summary = "Rolling overview",
    params(OverviewQuery),
    responses(
        (status = 200, description = "Totals over the last `hours` hours", body = OverviewMetrics),
        (status = 400, description = "Invalid window"),
        (status = 503, description = "Event store unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_overview(State(state): State<AppState>, Query(query): Query<OverviewQuery>) -> Result<Json<OverviewMetrics>> {
    let overview = state.engine.get_overview(query.hours()).await?;
    Ok(Json(overview))
}

#[utoipa::path(
    get,
    path = "/api/metrics/timeseries",
    tag = "metrics",
    summary = "Bucketed time series",
    params(TimeSeriesQuery),
    responses(
        (status = 200, description = "Gap-free series over [start_time, end_time)", body = TimeSeriesResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 503, description = "Event store unavailable"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_timeseries(
    State(state): State<AppState>,
    Query(query): Query<TimeSeriesQuery>,
) -> Result<Json<TimeSeriesResponse>> {
    let series = state.filters.series(query.into())?;
    let data = state.engine.get_timeseries(&series).await?;
    Ok(Json(TimeSeriesResponse { data }))
}
