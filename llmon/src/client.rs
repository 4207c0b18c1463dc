//! Client SDK for reporting LLM calls.
//!
//! Applications wrap their model calls with [`track`], which times the call and emits exactly one
//! event per invocation: a success event carrying the response's usage, or an error event
//! carrying the error text. Events go to an [`EventSink`]:
//!
//! - [`MonitorClient`] posts them to a running service at `{base_url}/api/events`
//! - [`MetricsEngine`] records them in-process
//!
//! Reporting never interferes with the application. Delivery failures are logged at warn level and
//! dropped; the wrapped call's result is returned unchanged.
//!
//! ```ignore
//! let monitor = MonitorClient::new("http://localhost:8000")?;
//! let options = TrackOptions::new().with_tag("feature", "chat");
//! let reply = track(&monitor, options, async { provider.chat(request).await }).await?;
//! ```

use std::{collections::HashMap, fmt::Display, future::Future, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::engine::{MetricsEngine, RawEvent};

/// Per-request timeout for event delivery
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Model name reported when neither the response nor the options name one
pub const UNKNOWN_MODEL: &str = "unknown";

/// Destination for reported events. Implementations swallow their own failures.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn log_event(&self, event: RawEvent);
}

/// Posts events to a monitoring service over HTTP
#[derive(Debug, Clone)]
pub struct MonitorClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl MonitorClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        // reqwest is built without a default provider; an earlier install is fine
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let endpoint = Url::parse(&format!("{}/api/events", base_url.trim_end_matches('/')))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Deliver one event, surfacing transport and HTTP status failures
    pub async fn send(&self, event: &RawEvent) -> anyhow::Result<()> {
        self.http
            .post(self.endpoint.clone())
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl EventSink for MonitorClient {
    async fn log_event(&self, event: RawEvent) {
        match self.send(&event).await {
            Ok(()) => debug!(model = %event.model, "Reported LLM event"),
            Err(e) => warn!(model = %event.model, "Failed to log event to LLM monitor: {e:#}"),
        }
    }
}

#[async_trait]
impl EventSink for MetricsEngine {
    async fn log_event(&self, event: RawEvent) {
        if let Err(e) = self.record_event(event).await {
            warn!("Failed to record LLM event: {e:#}");
        }
    }
}

/// Token counts reported by a model response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
    pub total_tokens: Option<i64>,
}

/// What a tracked call's successful result says about itself.
///
/// Both methods default to "nothing known", so any type can opt in with an empty impl.
pub trait UsageReport {
    fn model(&self) -> Option<&str> {
        None
    }

    fn usage(&self) -> Option<TokenUsage> {
        None
    }
}

/// Settings applied to every event [`track`] emits
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    /// Reported in place of whatever model the response names
    pub model: Option<String>,
    pub tags: HashMap<String, String>,
}

impl TrackOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

fn elapsed_ms(start: Instant) -> i64 {
    i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX)
}

/// Await `call`, report it to `sink`, and hand back its result untouched
pub async fn track<S, F, T, E>(sink: &S, options: TrackOptions, call: F) -> Result<T, E>
where
    S: EventSink + ?Sized,
    F: Future<Output = Result<T, E>>,
    T: UsageReport,
    E: Display,
{
    let start = Instant::now();
    let result = call.await;
    let latency_ms = elapsed_ms(start);

    let mut event = match &result {
        Ok(response) => {
            let usage = response.usage().unwrap_or_default();
            let model = options
                .model
                .or_else(|| response.model().map(str::to_string))
                .unwrap_or_else(|| UNKNOWN_MODEL.to_string());
            RawEvent {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                ..RawEvent::success(model)
            }
        }
        Err(e) => RawEvent::error(options.model.unwrap_or_else(|| UNKNOWN_MODEL.to_string()), e.to_string()),
    };
    event.timestamp = Some(Utc::now());
    event.latency_ms = Some(latency_ms);
    event.tags = options.tags;

    sink.log_event(event).await;
    result
}
