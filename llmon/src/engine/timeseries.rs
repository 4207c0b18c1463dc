use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::{
    db::{AggregateRow, GroupBy},
    errors::Result,
    filters::{EventFilter, Interval, Metric, SeriesQuery, ValidationError},
};

use super::MetricsEngine;

/// One point of a series: the interval `[timestamp, timestamp + interval)`
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TimeBucket {
    /// Bucket start
    pub timestamp: DateTime<Utc>,
    /// Series the bucket belongs to; absent for the untagged series of an empty range
    pub model: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    /// Events that fell into the bucket
    pub count: i64,
}

/// Bucket starts covering `[start, end)`: from the bucket containing `start` while before `end`
fn bucket_axis(start: DateTime<Utc>, end: DateTime<Utc>, interval: Interval) -> Vec<DateTime<Utc>> {
    let mut axis = Vec::new();
    let mut current = interval.truncate(start);
    while current < end {
        axis.push(current);
        current += interval.step();
    }
    axis
}

fn metric_value(metric: Metric, row: &AggregateRow) -> Decimal {
    match metric {
        Metric::Requests => Decimal::from(row.count),
        Metric::Cost => row.cost_sum,
        Metric::Latency => row.latency_mean(),
    }
}

impl MetricsEngine {
    /// Gap-free series over `[start, end)`.
    ///
    /// With a model filter there is one series tagged with that model; otherwise one per observed
    /// model. Output is ordered by bucket start, then model.
    #[instrument(skip(self), fields(interval = %query.spec.interval, metric = %query.spec.metric), err)]
    pub async fn get_timeseries(&self, query: &SeriesQuery) -> Result<Vec<TimeBucket>> {
        let interval = query.spec.interval;
        let (start, end) = (query.range.start(), query.range.end());

        let span = end.signed_duration_since(interval.truncate(start)).num_seconds();
        let step = interval.step().num_seconds();
        let buckets = (span + step - 1).div_euclid(step);
        if buckets > self.max_series_buckets {
            return Err(ValidationError::new(
                "end_time",
                format!(
                    "range spans {buckets} {interval} buckets, at most {} are allowed",
                    self.max_series_buckets
                ),
            )
            .into());
        }

        let filter = EventFilter::in_range(query.range).with_model(query.model.clone());
        let rows = self.store.aggregate(&filter, GroupBy::by_bucket_and_model(interval)).await?;
        debug!(groups = rows.len(), "Aggregated series rows");

        let series: Vec<Option<String>> = match &query.model {
            Some(model) => vec![Some(model.clone())],
            None => {
                let observed: BTreeSet<String> = rows.iter().filter_map(|r| r.model.clone()).collect();
                if observed.is_empty() {
                    vec![None]
                } else {
                    observed.into_iter().map(Some).collect()
                }
            }
        };

        let by_key: HashMap<(DateTime<Utc>, Option<&str>), &AggregateRow> = rows
            .iter()
            .filter_map(|row| row.bucket.map(|bucket| ((bucket, row.model.as_deref()), row)))
            .collect();

        let axis = bucket_axis(start, end, interval);
        let mut points = Vec::with_capacity(axis.len() * series.len());
        for bucket in axis {
            for model in &series {
                let point = match by_key.get(&(bucket, model.as_deref())) {
                    Some(row) => TimeBucket {
                        timestamp: bucket,
                        model: model.clone(),
                        value: metric_value(query.spec.metric, row),
                        count: row.count,
                    },
                    None => TimeBucket {
                        timestamp: bucket,
                        model: model.clone(),
                        value: Decimal::ZERO,
                        count: 0,
                    },
                };
                points.push(point);
            }
        }

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{Event, EventStatus},
        errors::Error,
        filters::{SeriesSpec, TimeRange},
        test_utils::{dec, engine_over, event_at, failing_engine},
    };
    use chrono::{Duration, TimeZone};

    fn t(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, d, h, m, 0).unwrap()
    }

    fn query(start: DateTime<Utc>, end: DateTime<Utc>, interval: Interval, metric: Metric, model: Option<&str>) -> SeriesQuery {
        SeriesQuery {
            range: TimeRange::half_open(start, end).unwrap(),
            spec: SeriesSpec { interval, metric },
            model: model.map(str::to_string),
        }
    }

    fn priced(ts: DateTime<Utc>, model: &str, cost: &str) -> Event {
        event_at(ts, model, Some(dec(cost)), None, EventStatus::Success)
    }

    #[test]
    fn test_axis() {
        assert_eq!(bucket_axis(t(1, 0, 0), t(1, 3, 0), Interval::Hour).len(), 3);
        assert_eq!(bucket_axis(t(1, 0, 30), t(1, 3, 0), Interval::Hour)[0], t(1, 0, 0));
        assert_eq!(bucket_axis(t(1, 0, 30), t(1, 3, 1), Interval::Hour).len(), 4);
        assert!(bucket_axis(t(1, 5, 0), t(1, 5, 0), Interval::Hour).is_empty());
        assert_eq!(bucket_axis(t(1, 12, 0), t(3, 0, 0), Interval::Day), vec![t(1, 0, 0), t(2, 0, 0)]);
    }

    #[tokio::test]
    async fn test_three_hours_three_buckets() {
        let engine = engine_over(vec![priced(t(1, 1, 30), "gpt-4", "0.5")]);
        let points = engine
            .get_timeseries(&query(t(1, 0, 0), t(1, 3, 0), Interval::Hour, Metric::Requests, None))
            .await
            .unwrap();

        let summary: Vec<_> = points.iter().map(|p| (p.timestamp, p.value)).collect();
        assert_eq!(
            summary,
            vec![(t(1, 0, 0), Decimal::ZERO), (t(1, 1, 0), Decimal::ONE), (t(1, 2, 0), Decimal::ZERO)]
        );
        assert!(points.iter().all(|p| p.model.as_deref() == Some("gpt-4")));
    }

    #[tokio::test]
    async fn test_end_is_exclusive() {
        let engine = engine_over(vec![priced(t(1, 3, 0), "gpt-4", "1"), priced(t(1, 0, 0), "gpt-4", "1")]);
        let points = engine
            .get_timeseries(&query(t(1, 0, 0), t(1, 3, 0), Interval::Hour, Metric::Requests, None))
            .await
            .unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points.iter().map(|p| p.count).sum::<i64>(), 1);
    }

    #[tokio::test]
    async fn test_empty_range_yields_no_buckets() {
        let engine = engine_over(vec![priced(t(1, 1, 0), "gpt-4", "1")]);
        let points = engine
            .get_timeseries(&query(t(1, 1, 0), t(1, 1, 0), Interval::Hour, Metric::Requests, None))
            .await
            .unwrap();
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_nothing_observed_gives_untagged_zero_series() {
        let points = engine_over(vec![])
            .get_timeseries(&query(t(1, 0, 0), t(3, 0, 0), Interval::Day, Metric::Cost, None))
            .await
            .unwrap();

        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.model.is_none() && p.value.is_zero()));
    }

    #[tokio::test]
    async fn test_one_series_per_model_ordered_by_time_then_model() {
        let engine = engine_over(vec![
            priced(t(1, 0, 10), "zeta", "1"),
            priced(t(1, 1, 10), "alpha", "2"),
            priced(t(1, 1, 20), "alpha", "3"),
        ]);
        let points = engine
            .get_timeseries(&query(t(1, 0, 0), t(1, 2, 0), Interval::Hour, Metric::Cost, None))
            .await
            .unwrap();

        let summary: Vec<_> = points
            .iter()
            .map(|p| (p.timestamp, p.model.clone().unwrap(), p.value))
            .collect();
        assert_eq!(
            summary,
            vec![
                (t(1, 0, 0), "alpha".to_string(), Decimal::ZERO),
                (t(1, 0, 0), "zeta".to_string(), dec("1")),
                (t(1, 1, 0), "alpha".to_string(), dec("5")),
                (t(1, 1, 0), "zeta".to_string(), Decimal::ZERO),
            ]
        );
    }

    #[tokio::test]
    async fn test_model_filter_tags_a_single_series() {
        let engine = engine_over(vec![priced(t(1, 0, 10), "a", "1"), priced(t(1, 0, 20), "b", "1")]);
        let points = engine
            .get_timeseries(&query(t(1, 0, 0), t(1, 2, 0), Interval::Hour, Metric::Requests, Some("c")))
            .await
            .unwrap();

        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.model.as_deref() == Some("c") && p.count == 0));
    }

    #[tokio::test]
    async fn test_oversized_stored_values_do_not_panic() {
        let engine = engine_over(vec![
            event_at(t(1, 0, 5), "a", Some(Decimal::MAX), Some(i64::MAX), EventStatus::Success),
            event_at(t(1, 0, 6), "a", Some(Decimal::MAX), Some(i64::MAX), EventStatus::Success),
        ]);
        let points = engine
            .get_timeseries(&query(t(1, 0, 0), t(1, 1, 0), Interval::Hour, Metric::Cost, None))
            .await
            .unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, Decimal::MAX);
        assert_eq!(points[0].count, 2);
    }

    #[tokio::test]
    async fn test_latency_mean_ignores_missing_latency() {
        let engine = engine_over(vec![
            event_at(t(1, 0, 5), "a", None, Some(100), EventStatus::Success),
            event_at(t(1, 0, 6), "a", None, Some(300), EventStatus::Error),
            event_at(t(1, 0, 7), "a", None, None, EventStatus::Success),
        ]);
        let points = engine
            .get_timeseries(&query(t(1, 0, 0), t(1, 1, 0), Interval::Hour, Metric::Latency, None))
            .await
            .unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, dec("200"));
        assert_eq!(points[0].count, 3);
    }

    #[tokio::test]
    async fn test_cost_buckets_sum_to_the_total() {
        let start = t(1, 0, 0);
        let events: Vec<Event> = (0..40)
            .map(|i| {
                let model = if i % 3 == 0 { "gpt-4" } else { "claude-3-haiku" };
                let cost = if i % 5 == 0 { None } else { Some(Decimal::new(i * 37, 4)) };
                event_at(start + Duration::minutes(i * 47), model, cost, None, EventStatus::Success)
            })
            .collect();
        let end = start + Duration::hours(30);
        let expected: Decimal = events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp < end)
            .filter_map(|e| e.cost_usd)
            .sum();

        let engine = engine_over(events);
        for interval in [Interval::Hour, Interval::Day] {
            let points = engine
                .get_timeseries(&query(start, end, interval, Metric::Cost, None))
                .await
                .unwrap();
            assert_eq!(points.iter().map(|p| p.value).sum::<Decimal>(), expected, "{interval}");
        }
    }

    #[tokio::test]
    async fn test_too_many_buckets_is_rejected() {
        let engine = engine_over(vec![]).with_max_series_buckets(24);
        let err = engine
            .get_timeseries(&query(t(1, 0, 0), t(2, 1, 0), Interval::Hour, Metric::Requests, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref v) if v.field == "end_time"));

        let exactly_a_day = engine
            .get_timeseries(&query(t(1, 0, 0), t(2, 0, 0), Interval::Hour, Metric::Requests, None))
            .await
            .unwrap();
        assert_eq!(exactly_a_day.len(), 24);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let err = failing_engine()
            .get_timeseries(&query(t(1, 0, 0), t(1, 1, 0), Interval::Hour, Metric::Requests, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }
}
