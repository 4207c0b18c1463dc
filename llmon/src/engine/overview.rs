use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    db::{AggregateRow, GroupBy},
    errors::Result,
    filters::{EventFilter, TimeRange, ValidationError},
};

use super::MetricsEngine;

/// Rolling statistics over a closed window ending at the reference instant
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OverviewMetrics {
    pub total_requests: i64,
    /// Sum of event costs in USD, unpriced events counting as zero
    #[serde(with = "rust_decimal::serde::float")]
    pub total_cost: Decimal,
    /// Mean over events that reported a latency, 0 when none did
    #[serde(with = "rust_decimal::serde::float")]
    pub avg_latency_ms: Decimal,
    /// Percentage of events with status `error`, rounded to one decimal place
    #[serde(with = "rust_decimal::serde::float")]
    pub error_rate: Decimal,
    pub requests_by_model: BTreeMap<String, i64>,
}

impl OverviewMetrics {
    /// Fold per-model aggregate rows into the snapshot
    fn from_rows(rows: Vec<AggregateRow>) -> Self {
        let mut total = AggregateRow::empty(None, None);
        let mut requests_by_model = BTreeMap::new();

        for row in rows {
            total.merge(&row);
            if let Some(model) = row.model {
                let count = requests_by_model.entry(model).or_insert(0i64);
                *count = count.saturating_add(row.count);
            }
        }

        Self {
            total_requests: total.count,
            total_cost: total.cost_sum,
            avg_latency_ms: total.latency_mean(),
            error_rate: error_rate(total.error_count, total.count),
            requests_by_model,
        }
    }
}

/// `100 * errors / total` rounded half away from zero to one decimal place, 0 for no requests
pub fn error_rate(errors: i64, total: i64) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(errors) * Decimal::ONE_HUNDRED)
        .checked_div(Decimal::from(total))
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

impl MetricsEngine {
    /// Overview of the last `hours` hours, ending now
    pub async fn get_overview(&self, hours: i64) -> Result<OverviewMetrics> {
        self.get_overview_at(hours, Utc::now()).await
    }

    /// Overview of the closed window `[now - hours, now]`
    #[instrument(skip(self), err)]
    pub async fn get_overview_at(&self, hours: i64, now: DateTime<Utc>) -> Result<OverviewMetrics> {
        if !(0..=self.max_overview_hours).contains(&hours) {
            return Err(ValidationError::new(
                "hours",
                format!("hours must be between 0 and {}, got {hours}", self.max_overview_hours),
            )
            .into());
        }
        let start = Duration::try_hours(hours)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| ValidationError::new("hours", format!("a window of {hours} hours is out of range")))?;

        let filter = EventFilter::in_range(TimeRange::closed(start, now)?);
        let rows = self.store.aggregate(&filter, GroupBy::by_model()).await?;
        Ok(OverviewMetrics::from_rows(rows))
    }
}
