//! Database models for recorded LLM call events.

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;

use crate::{
    db::errors::StoreError,
    types::{EventId, UnknownVariant},
};

/// Outcome of an LLM call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Error,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Success => "success",
            EventStatus::Error => "error",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(EventStatus::Success),
            "error" => Ok(EventStatus::Error),
            other => Err(UnknownVariant {
                kind: "status",
                value: other.to_string(),
                expected: "success, error",
            }),
        }
    }
}

/// A stored event. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    /// When the LLM call happened (event time)
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    /// As supplied by the caller; may disagree with prompt + completion
    pub total_tokens: i64,
    pub latency_ms: Option<i64>,
    /// Fixed at ingestion; `None` when the model had no pricing entry
    pub cost_usd: Option<Decimal>,
    pub status: EventStatus,
    pub error_message: Option<String>,
    pub tags: HashMap<String, String>,
    /// When the store accepted the event
    pub created_at: DateTime<Utc>,
}

/// A validated, priced event ready to be appended to a store
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub latency_ms: Option<i64>,
    pub cost_usd: Option<Decimal>,
    pub status: EventStatus,
    pub error_message: Option<String>,
    pub tags: HashMap<String, String>,
}

impl NewEvent {
    /// Materialize the stored form once the store has assigned identity and insertion time
    pub fn into_event(self, id: EventId, created_at: DateTime<Utc>) -> Event {
        Event {
            id,
            timestamp: self.timestamp,
            model: self.model,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            latency_ms: self.latency_ms,
            cost_usd: self.cost_usd,
            status: self.status,
            error_message: self.error_message,
            tags: self.tags,
            created_at,
        }
    }
}

/// Row shape of the `llm_events` table
#[derive(Debug, FromRow)]
pub(crate) struct EventRow {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub latency_ms: Option<i64>,
    pub cost_usd: Option<Decimal>,
    pub status: String,
    pub error_message: Option<String>,
    pub tags: Json<HashMap<String, String>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<EventStatus>()
            .map_err(|e| StoreError::Unavailable(anyhow::anyhow!("event {} has an unreadable status: {e}", row.id)))?;

        Ok(Event {
            id: row.id,
            timestamp: row.timestamp,
            model: row.model,
            prompt_tokens: row.prompt_tokens,
            completion_tokens: row.completion_tokens,
            total_tokens: row.total_tokens,
            latency_ms: row.latency_ms,
            cost_usd: row.cost_usd,
            status,
            error_message: row.error_message,
            tags: row.tags.0,
            created_at: row.created_at,
        })
    }
}
