use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    cost::compute_cost,
    db::{Event, EventStatus, NewEvent},
    errors::Result,
    filters::ValidationError,
    types::abbrev_uuid,
};

use super::MetricsEngine;

/// Longest accepted model identifier, in characters
pub const MAX_MODEL_LEN: usize = 100;

/// Longest accepted call latency: one day
pub const MAX_LATENCY_MS: i64 = 86_400_000;

/// Largest accepted cost for a single call, in USD
pub const MAX_COST_USD: i64 = 1_000_000;

/// An event as reported by a caller, before validation and pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "timestamp": "2024-01-01T00:00:00Z",
    "model": "gpt-4",
    "prompt_tokens": 100,
    "completion_tokens": 50,
    "total_tokens": 150,
    "latency_ms": 850,
    "status": "success",
    "tags": {"user_id": "123", "feature": "chat"}
}))]
pub struct RawEvent {
    /// When the call happened; defaults to the ingestion instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<i64>,
    /// Defaults to prompt + completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i64>,
    /// Overrides the computed cost when present
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub cost_usd: Option<Decimal>,
    pub status: EventStatus,
    /// Only allowed when `status` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl RawEvent {
    /// A successful call with no usage reported yet
    pub fn success(model: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            model: model.into(),
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            latency_ms: None,
            cost_usd: None,
            status: EventStatus::Success,
            error_message: None,
            tags: HashMap::new(),
        }
    }

    /// A failed call carrying the error text
    pub fn error(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: EventStatus::Error,
            error_message: Some(message.into()),
            ..Self::success(model)
        }
    }

    /// Validate and price against `engine`'s table, stamping missing timestamps with `now`
    fn into_new_event(self, engine: &MetricsEngine, now: DateTime<Utc>) -> std::result::Result<NewEvent, ValidationError> {
        if self.model.is_empty() {
            return Err(ValidationError::new("model", "model must not be empty"));
        }
        if self.model.chars().count() > MAX_MODEL_LEN {
            return Err(ValidationError::new(
                "model",
                format!("model must be at most {MAX_MODEL_LEN} characters"),
            ));
        }

        let prompt_tokens = non_negative("prompt_tokens", self.prompt_tokens.unwrap_or(0))?;
        let completion_tokens = non_negative("completion_tokens", self.completion_tokens.unwrap_or(0))?;
        let total_tokens = match self.total_tokens {
            Some(total) => non_negative("total_tokens", total)?,
            None => prompt_tokens.saturating_add(completion_tokens),
        };
        let latency_ms = self.latency_ms.map(|l| non_negative("latency_ms", l)).transpose()?;
        if latency_ms.is_some_and(|l| l > MAX_LATENCY_MS) {
            return Err(ValidationError::new(
                "latency_ms",
                format!("latency_ms must be at most {MAX_LATENCY_MS}"),
            ));
        }

        if self.cost_usd.is_some_and(|c| c.is_sign_negative() && !c.is_zero()) {
            return Err(ValidationError::new("cost_usd", "cost_usd must not be negative"));
        }
        if self.status == EventStatus::Success && self.error_message.is_some() {
            return Err(ValidationError::new(
                "error_message",
                "error_message is only allowed when status is error",
            ));
        }

        let cost_usd = self
            .cost_usd
            .or_else(|| compute_cost(&engine.pricing, &self.model, prompt_tokens, completion_tokens));
        if cost_usd.is_some_and(|c| c > Decimal::from(MAX_COST_USD)) {
            return Err(ValidationError::new(
                "cost_usd",
                format!("cost_usd must be at most {MAX_COST_USD}"),
            ));
        }

        Ok(NewEvent {
            timestamp: self.timestamp.unwrap_or(now),
            model: self.model,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            latency_ms,
            cost_usd,
            status: self.status,
            error_message: self.error_message,
            tags: self.tags,
        })
    }
}

fn non_negative(field: &str, value: i64) -> std::result::Result<i64, ValidationError> {
    if value < 0 {
        return Err(ValidationError::new(field, format!("{field} must not be negative, got {value}")));
    }
    Ok(value)
}

impl MetricsEngine {
    /// Validate, price and persist one event
    #[instrument(skip(self, raw), fields(model = %raw.model, status = %raw.status), err)]
    pub async fn record_event(&self, raw: RawEvent) -> Result<Event> {
        let new_event = raw.into_new_event(self, Utc::now())?;
        let priced = new_event.cost_usd.is_some();

        let event = self.store.append(new_event).await?;

        metrics::counter!("llmon_events_recorded_total", "status" => event.status.as_str()).increment(1);
        if !priced {
            metrics::counter!("llmon_unpriced_events_total").increment(1);
        }
        info!(
            event_id = %abbrev_uuid(&event.id),
            model = %event.model,
            status = %event.status,
            "Recorded LLM event"
        );
        Ok(event)
    }
}
