//! Router-level journeys against the in-memory store.

use axum::http::{HeaderValue, Method, StatusCode, header};
use axum_test::TestServer;
use chrono::{Duration, DurationRound, SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::{
    AppState, Application, build_router,
    api::models::conversations::ConversationsResponse,
    config::{CorsConfig, CorsOrigin},
    test_utils::{create_test_app, create_test_config, failing_engine},
};

fn rfc3339(ts: chrono::DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A dashboard session: a handful of calls are reported, then every read endpoint agrees on them
#[test_log::test(tokio::test)]
async fn test_ingest_then_read_back_everywhere() {
    let app = create_test_app().await;
    let hour = Utc::now().duration_trunc(Duration::hours(1)).unwrap() - Duration::hours(2);

    let calls = [
        (10, "gpt-4", 1000, 500, 900, "success"),
        (20, "gpt-4", 2000, 1000, 1100, "success"),
        (30, "claude-3-haiku", 4000, 4000, 300, "success"),
        (70, "claude-3-haiku", 100, 0, 500, "error"),
    ];
    for (minutes, model, prompt, completion, latency, status) in calls {
        let mut body = json!({
            "timestamp": rfc3339(hour + Duration::minutes(minutes)),
            "model": model,
            "prompt_tokens": prompt,
            "completion_tokens": completion,
            "latency_ms": latency,
            "status": status,
            "tags": {"feature": "chat"},
        });
        if status == "error" {
            body["error_message"] = json!("upstream timeout");
        }
        app.post("/api/events").json(&body).await.assert_status(StatusCode::CREATED);
    }

    // Overview over the last day sees all four
    let overview: Value = app.get("/api/metrics/overview").await.json();
    assert_eq!(overview["total_requests"], 4);
    assert_eq!(overview["error_rate"], 25.0);
    assert_eq!(overview["avg_latency_ms"], 700.0);
    assert_eq!(overview["requests_by_model"], json!({"claude-3-haiku": 2, "gpt-4": 2}));

    // gpt-4: 0.06 + 0.12; haiku: 4000 * 0.25/1M + 4000 * 1.25/1M = 0.006 and 100 * 0.25/1M = 0.000025
    let total_cost = overview["total_cost"].as_f64().unwrap();
    assert!((total_cost - 0.186025).abs() < 1e-9, "total_cost was {total_cost}");

    // Hourly cost series over the two hours: one series per model, gap-free
    let series: Value = app
        .get("/api/metrics/timeseries")
        .add_query_param("start_time", rfc3339(hour))
        .add_query_param("end_time", rfc3339(hour + Duration::hours(2)))
        .add_query_param("metric", "requests")
        .await
        .json();
    let points: Vec<(String, String, i64)> = series["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| {
            (
                p["timestamp"].as_str().unwrap().to_string(),
                p["model"].as_str().unwrap().to_string(),
                p["count"].as_i64().unwrap(),
            )
        })
        .collect();
    assert_eq!(points.len(), 4);
    assert_eq!(
        points.iter().map(|(_, m, c)| (m.as_str(), *c)).collect::<Vec<_>>(),
        vec![("claude-3-haiku", 1), ("gpt-4", 2), ("claude-3-haiku", 1), ("gpt-4", 0)]
    );
    assert!(points[0].0 < points[2].0);

    // Listing: newest first, error filter
    let listing: ConversationsResponse = app.get("/api/conversations").await.json();
    assert_eq!(listing.total_count, 4);
    assert_eq!(listing.events[0].model, "claude-3-haiku");
    assert_eq!(listing.events[0].error_message.as_deref(), Some("upstream timeout"));
    assert_eq!(listing.events[3].total_tokens, 1500);

    let errors: ConversationsResponse = app.get("/api/conversations").add_query_param("status", "error").await.json();
    assert_eq!(errors.total_count, 1);
}

#[test_log::test(tokio::test)]
async fn test_empty_store_reads() {
    let app = create_test_app().await;

    let overview: Value = app.get("/api/metrics/overview").add_query_param("hours", 1).await.json();
    assert_eq!(
        overview,
        json!({
            "total_requests": 0,
            "total_cost": 0.0,
            "avg_latency_ms": 0.0,
            "error_rate": 0.0,
            "requests_by_model": {},
        })
    );

    let series: Value = app
        .get("/api/metrics/timeseries")
        .add_query_param("start_time", "2024-01-01T00:00:00Z")
        .add_query_param("end_time", "2024-01-03T00:00:00Z")
        .add_query_param("interval", "1d")
        .await
        .json();
    let data = series["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|p| p["model"].is_null() && p["value"] == 0.0));

    let listing: ConversationsResponse = app.get("/api/conversations").await.json();
    assert!(listing.events.is_empty());
    assert_eq!(listing.total_count, 0);
}

#[test_log::test(tokio::test)]
async fn test_store_outage_maps_to_503() {
    let state = AppState::builder().engine(failing_engine()).config(create_test_config()).build();
    let app = TestServer::new(build_router(state).unwrap().into_make_service()).unwrap();

    let response = app.get("/api/metrics/overview").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["message"], "Event store is temporarily unavailable");
    assert!(!body.to_string().contains("connection refused"));

    app.post("/api/events")
        .json(&json!({"model": "gpt-4", "status": "success"}))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    app.get("/api/conversations").await.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[test_log::test(tokio::test)]
async fn test_openapi_document_and_viewer() {
    let app = create_test_app().await;

    let response = app.get("/api-docs/openapi.json").await;
    response.assert_status_ok();
    let doc: Value = response.json();
    assert_eq!(doc["info"]["title"], "LLM Monitor API");
    assert!(doc["paths"]["/api/metrics/timeseries"]["get"].is_object());
    assert!(doc["components"]["schemas"]["RawEvent"].is_object());

    app.get("/docs").await.assert_status_ok();
}

#[test_log::test(tokio::test)]
async fn test_cors_allows_the_dashboard_origin() {
    let app = create_test_app().await;

    let response = app
        .method(Method::OPTIONS, "/api/metrics/overview")
        .add_header(header::ORIGIN, HeaderValue::from_static("http://localhost:3000"))
        .add_header(header::ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("GET"))
        .await;

    assert_eq!(
        response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        HeaderValue::from_static("http://localhost:3000")
    );
}

#[test_log::test(tokio::test)]
async fn test_wildcard_cors_allows_any_origin() {
    let mut config = create_test_config();
    config.cors = CorsConfig {
        allowed_origins: vec![CorsOrigin::Wildcard],
        allow_credentials: false,
        max_age: None,
    };
    let app = Application::new(config).await.unwrap().into_test_server();

    let response = app
        .method(Method::OPTIONS, "/api/conversations")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://grafana.example.com"))
        .add_header(header::ACCESS_CONTROL_REQUEST_METHOD, HeaderValue::from_static("GET"))
        .await;

    assert_eq!(response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN), HeaderValue::from_static("*"));
}

/// The only test that installs the Prometheus recorder; a second install in one process panics
#[test_log::test(tokio::test)]
async fn test_prometheus_endpoint_when_enabled() {
    let mut config = create_test_config();
    config.enable_metrics = true;
    let app = Application::new(config).await.unwrap().into_test_server();

    app.post("/api/events")
        .json(&json!({"model": "gpt-4", "status": "success"}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = app.get("/internal/metrics").await;
    response.assert_status_ok();
    assert!(response.text().contains("llmon_events_recorded_total"));
}
