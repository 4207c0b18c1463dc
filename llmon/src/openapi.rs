//! OpenAPI document for the HTTP API, served at `/api-docs/openapi.json` and rendered at `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::root,
        api::handlers::health::health,
        api::handlers::events::record_event,
        api::handlers::metrics::get_overview,
        api::handlers::metrics::get_timeseries,
        api::handlers::conversations::list_conversations,
    ),
    components(
        schemas(
            crate::engine::RawEvent,
            crate::engine::OverviewMetrics,
            crate::engine::TimeBucket,
            crate::db::EventStatus,
            crate::filters::ValidationError,
            api::models::events::EventResponse,
            api::models::metrics::TimeSeriesResponse,
            api::models::conversations::ConversationsResponse,
            api::models::health::RootResponse,
            api::models::health::HealthResponse,
        )
    ),
    tags(
        (name = "health", description = "Liveness probes"),
        (name = "events", description = "Ingestion of LLM call events. Costs are computed from the pricing table at ingestion time and never recomputed."),
        (name = "metrics", description = "Dashboard aggregates: rolling overview and gap-free time series"),
        (name = "conversations", description = "Paginated raw events, newest first"),
    ),
    info(
        title = "LLM Monitor API",
        version = "1.0.0",
        description = "Records LLM API calls, attributes their cost, and serves dashboard metrics.

## Errors

Invalid parameters return `400` with the offending field:

```json
{\"field\": \"page_size\", \"message\": \"page_size must be at most 1000, got 5000\"}
```

An unreachable or slow event store returns `503` with a `message`."
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/",
            "/health",
            "/api/events",
            "/api/metrics/overview",
            "/api/metrics/timeseries",
            "/api/conversations",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
