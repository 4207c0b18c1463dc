//! Shared fixtures for unit and router tests.

use std::{collections::HashMap, str::FromStr, sync::Arc};

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    Application,
    config::{Config, DatabaseConfig},
    db::{Event, EventStatus, EventStore, InMemoryEventStore, NewEvent, StoreError, errors::Result},
    engine::MetricsEngine,
    filters::EventFilter,
    pricing::PricingTable,
};

/// Parse a decimal literal
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// A stored event with a fresh id and no tokens or tags
pub fn event_at(ts: DateTime<Utc>, model: &str, cost: Option<Decimal>, latency_ms: Option<i64>, status: EventStatus) -> Event {
    Event {
        id: Uuid::new_v4(),
        timestamp: ts,
        model: model.to_string(),
        prompt_tokens: 0,
        completion_tokens: 0,
        total_tokens: 0,
        latency_ms,
        cost_usd: cost,
        status,
        error_message: None,
        tags: HashMap::new(),
        created_at: ts,
    }
}

/// An event ready to append
pub fn new_event(model: &str, ts: DateTime<Utc>) -> NewEvent {
    NewEvent {
        timestamp: ts,
        model: model.to_string(),
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
        latency_ms: Some(120),
        cost_usd: None,
        status: EventStatus::Success,
        error_message: None,
        tags: HashMap::new(),
    }
}

/// Engine over an empty in-memory store, plus a handle on that store
pub fn engine_with_store() -> (MetricsEngine, InMemoryEventStore) {
    let store = InMemoryEventStore::new();
    let engine = MetricsEngine::new(Arc::new(store.clone()), Arc::new(PricingTable::builtin()));
    (engine, store)
}

/// Engine over an in-memory store seeded with `events`
pub fn engine_over(events: Vec<Event>) -> MetricsEngine {
    MetricsEngine::new(
        Arc::new(InMemoryEventStore::with_events(events)),
        Arc::new(PricingTable::builtin()),
    )
}

/// Store whose every call fails as if the database were down
pub struct FailingStore;

#[async_trait]
impl EventStore for FailingStore {
    async fn append(&self, _event: NewEvent) -> Result<Event> {
        Err(StoreError::Unavailable(anyhow::anyhow!("connection refused")))
    }

    async fn query(&self, _filter: &EventFilter) -> Result<Vec<Event>> {
        Err(StoreError::Unavailable(anyhow::anyhow!("connection refused")))
    }
}

pub fn failing_engine() -> MetricsEngine {
    MetricsEngine::new(Arc::new(FailingStore), Arc::new(PricingTable::builtin()))
}

/// In-memory configuration with the Prometheus layer off; it can only be installed once per process
pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::InMemory,
        enable_metrics: false,
        ..Default::default()
    }
}

pub async fn create_test_app() -> TestServer {
    let app = Application::new(create_test_config())
        .await
        .expect("Failed to create application");
    app.into_test_server()
}
