//! Grouped aggregation over events.
//!
//! A store answers [`EventStore::aggregate`](crate::db::EventStore::aggregate) with one
//! [`AggregateRow`] per group. The rows carry sums and counts rather than finished statistics so
//! that means can be combined and rounded in one place by the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::{
    db::models::events::{Event, EventStatus},
    filters::Interval,
};

/// Grouping keys for an aggregation. With neither key set, everything collapses into one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupBy {
    pub model: bool,
    pub bucket: Option<Interval>,
}

impl GroupBy {
    pub fn total() -> Self {
        Self::default()
    }

    pub fn by_model() -> Self {
        Self {
            model: true,
            bucket: None,
        }
    }

    pub fn by_bucket_and_model(interval: Interval) -> Self {
        Self {
            model: true,
            bucket: Some(interval),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AggregateRow {
    /// Bucket start, when grouped by interval
    pub bucket: Option<DateTime<Utc>>,
    /// Model, when grouped by model
    pub model: Option<String>,
    pub count: i64,
    /// Sum of costs, unpriced events counting as zero
    pub cost_sum: Decimal,
    /// Sum of latencies over events that reported one
    pub latency_sum: i64,
    pub latency_count: i64,
    pub error_count: i64,
}

impl AggregateRow {
    pub fn empty(bucket: Option<DateTime<Utc>>, model: Option<String>) -> Self {
        Self {
            bucket,
            model,
            count: 0,
            cost_sum: Decimal::ZERO,
            latency_sum: 0,
            latency_count: 0,
            error_count: 0,
        }
    }

    /// Mean latency over events that reported one, 0 when none did
    pub fn latency_mean(&self) -> Decimal {
        if self.latency_count == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.latency_sum)
            .checked_div(Decimal::from(self.latency_count))
            .unwrap_or(Decimal::ZERO)
    }

    /// Fold one event into the sums. Sums saturate rather than overflow.
    pub fn absorb(&mut self, event: &Event) {
        self.count = self.count.saturating_add(1);
        self.cost_sum = self.cost_sum.saturating_add(event.cost_usd.unwrap_or(Decimal::ZERO));
        if let Some(latency) = event.latency_ms {
            self.latency_sum = self.latency_sum.saturating_add(latency);
            self.latency_count = self.latency_count.saturating_add(1);
        }
        if event.status == EventStatus::Error {
            self.error_count = self.error_count.saturating_add(1);
        }
    }

    /// Add another row's sums into this one, saturating
    pub fn merge(&mut self, other: &AggregateRow) {
        self.count = self.count.saturating_add(other.count);
        self.cost_sum = self.cost_sum.saturating_add(other.cost_sum);
        self.latency_sum = self.latency_sum.saturating_add(other.latency_sum);
        self.latency_count = self.latency_count.saturating_add(other.latency_count);
        self.error_count = self.error_count.saturating_add(other.error_count);
    }
}

/// Aggregate events in process. Rows come back ordered by bucket, then model.
///
/// This is the portable path every store can fall back to: it needs nothing beyond the events
/// themselves.
pub fn aggregate_events<'a>(events: impl IntoIterator<Item = &'a Event>, group_by: GroupBy) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<(Option<DateTime<Utc>>, Option<String>), AggregateRow> = BTreeMap::new();

    for event in events {
        let bucket = group_by.bucket.map(|interval| interval.truncate(event.timestamp));
        let model = group_by.model.then(|| event.model.clone());
        groups
            .entry((bucket, model.clone()))
            .or_insert_with(|| AggregateRow::empty(bucket, model))
            .absorb(event);
    }

    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{dec, event_at};
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_total_collapses_to_one_row() {
        let events = vec![
            event_at(ts(1, 0), "gpt-4", Some(dec("0.5")), Some(100), EventStatus::Success),
            event_at(ts(2, 0), "claude-3-haiku", None, None, EventStatus::Error),
        ];
        let rows = aggregate_events(&events, GroupBy::total());

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.count, 2);
        assert_eq!(row.cost_sum, dec("0.5"));
        assert_eq!(row.latency_count, 1);
        assert_eq!(row.error_count, 1);
        assert_eq!(row.latency_mean(), dec("100"));
    }

    #[test]
    fn test_sums_saturate_instead_of_overflowing() {
        let events = vec![
            event_at(ts(1, 0), "gpt-4", Some(Decimal::MAX), Some(i64::MAX), EventStatus::Success),
            event_at(ts(1, 1), "gpt-4", Some(Decimal::MAX), Some(i64::MAX), EventStatus::Success),
        ];
        let mut rows = aggregate_events(&events, GroupBy::total());
        let row = &rows[0];
        assert_eq!(row.count, 2);
        assert_eq!(row.latency_sum, i64::MAX);
        assert_eq!(row.cost_sum, Decimal::MAX);

        let copy = rows[0].clone();
        rows[0].merge(&copy);
        assert_eq!(rows[0].count, 4);
        assert_eq!(rows[0].latency_sum, i64::MAX);
        assert_eq!(rows[0].cost_sum, Decimal::MAX);
    }

    #[test]
    fn test_rows_are_ordered_by_bucket_then_model() {
        let events = vec![
            event_at(ts(2, 10), "b", None, None, EventStatus::Success),
            event_at(ts(1, 50), "b", None, None, EventStatus::Success),
            event_at(ts(1, 5), "a", None, None, EventStatus::Success),
            event_at(ts(2, 59), "a", None, None, EventStatus::Success),
        ];
        let rows = aggregate_events(&events, GroupBy::by_bucket_and_model(Interval::Hour));

        let keys: Vec<_> = rows.iter().map(|r| (r.bucket.unwrap(), r.model.clone().unwrap())).collect();
        assert_eq!(
            keys,
            vec![
                (ts(1, 0), "a".to_string()),
                (ts(1, 0), "b".to_string()),
                (ts(2, 0), "a".to_string()),
                (ts(2, 0), "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_latency_mean_without_samples_is_zero() {
        assert_eq!(AggregateRow::empty(None, None).latency_mean(), Decimal::ZERO);
    }
}
