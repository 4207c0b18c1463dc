//! Normalization of user-supplied query parameters.
//!
//! Everything the engine and the stores consume is built here: [`EventFilter`] for selecting
//! events, [`SeriesSpec`] / [`SeriesQuery`] for time series. Raw parameters arrive as
//! [`ListingParams`] and [`SeriesParams`] and are validated by [`QueryFilterBuilder`]; a failure
//! names the offending field in a [`ValidationError`].

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{db::models::events::{Event, EventStatus}, types::UnknownVariant};

/// Default number of events per listing page
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: i64 = 1000;

/// A user-supplied parameter that could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, ToSchema)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Whether the end of a [`TimeRange`] belongs to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBound {
    /// `start <= t <= end`
    Inclusive,
    /// `start <= t < end`
    Exclusive,
}

/// A validated time window with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    end_bound: EndBound,
}

impl TimeRange {
    /// `[start, end]`, used for rolling overview windows
    pub fn closed(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        Self::new(start, end, EndBound::Inclusive)
    }

    /// `[start, end)`, used for bucketed series so adjacent buckets never share an event
    pub fn half_open(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        Self::new(start, end, EndBound::Exclusive)
    }

    fn new(start: DateTime<Utc>, end: DateTime<Utc>, end_bound: EndBound) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::new(
                "start_time",
                format!("start_time ({}) must not be after end_time ({})", start.to_rfc3339(), end.to_rfc3339()),
            ));
        }
        Ok(Self { start, end, end_bound })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn end_bound(&self) -> EndBound {
        self.end_bound
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start
            && match self.end_bound {
                EndBound::Inclusive => ts <= self.end,
                EndBound::Exclusive => ts < self.end,
            }
    }
}

/// One-based page selection over the newest-first ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Result<Self, ValidationError> {
        if page < 1 {
            return Err(ValidationError::new("page", format!("page must be at least 1, got {page}")));
        }
        if page_size < 1 {
            return Err(ValidationError::new(
                "page_size",
                format!("page_size must be at least 1, got {page_size}"),
            ));
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Number of events skipped before this page
    #[inline]
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Width of a time-series bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, ToSchema)]
pub enum Interval {
    #[default]
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "1d")]
    Day,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Hour => "1h",
            Interval::Day => "1d",
        }
    }

    /// Unit name understood by PostgreSQL's `date_trunc`
    pub fn pg_unit(&self) -> &'static str {
        match self {
            Interval::Hour => "hour",
            Interval::Day => "day",
        }
    }

    pub fn step(&self) -> Duration {
        match self {
            Interval::Hour => Duration::hours(1),
            Interval::Day => Duration::days(1),
        }
    }

    /// Start of the bucket containing `ts`: top of the hour or UTC midnight
    pub fn truncate(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let hour = match self {
            Interval::Hour => ts.hour(),
            Interval::Day => 0,
        };
        ts.date_naive()
            .and_hms_opt(hour, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or(ts)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(Interval::Hour),
            "1d" => Ok(Interval::Day),
            other => Err(UnknownVariant {
                kind: "interval",
                value: other.to_string(),
                expected: "1h, 1d",
            }),
        }
    }
}

/// Quantity plotted by a time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Requests,
    Cost,
    Latency,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Requests => "requests",
            Metric::Cost => "cost",
            Metric::Latency => "latency",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "requests" => Ok(Metric::Requests),
            "cost" => Ok(Metric::Cost),
            "latency" => Ok(Metric::Latency),
            other => Err(UnknownVariant {
                kind: "metric",
                value: other.to_string(),
                expected: "requests, cost, latency",
            }),
        }
    }
}

/// Normalized event selection handed to an [`EventStore`](crate::db::EventStore).
///
/// All present conditions are combined with AND. Without a page, every matching event is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub time_range: Option<TimeRange>,
    pub model: Option<String>,
    pub status: Option<EventStatus>,
    pub page: Option<PageRequest>,
}

impl EventFilter {
    pub fn in_range(range: TimeRange) -> Self {
        Self {
            time_range: Some(range),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_status(mut self, status: Option<EventStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = Some(page);
        self
    }

    /// Same selection with pagination removed, for counting and aggregation
    pub fn without_page(&self) -> Self {
        Self {
            page: None,
            ..self.clone()
        }
    }

    /// Whether `event` satisfies every condition (pagination aside)
    pub fn matches(&self, event: &Event) -> bool {
        self.time_range.is_none_or(|r| r.contains(event.timestamp))
            && self.model.as_deref().is_none_or(|m| event.model == m)
            && self.status.is_none_or(|s| event.status == s)
    }
}

/// How a time series is bucketed and what it measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeriesSpec {
    pub interval: Interval,
    pub metric: Metric,
}

/// A fully validated time-series request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesQuery {
    pub range: TimeRange,
    pub spec: SeriesSpec,
    pub model: Option<String>,
}

/// Raw listing parameters as supplied by a caller
#[derive(Debug, Clone, Default)]
pub struct ListingParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub model: Option<String>,
    pub status: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Raw time-series parameters as supplied by a caller
#[derive(Debug, Clone)]
pub struct SeriesParams {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub interval: Option<String>,
    pub metric: Option<String>,
    pub model: Option<String>,
}

/// Validates raw parameters into the normalized filter types
#[derive(Debug, Clone, Copy)]
pub struct QueryFilterBuilder {
    default_page_size: i64,
    max_page_size: i64,
}

impl Default for QueryFilterBuilder {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl QueryFilterBuilder {
    pub fn new(default_page_size: i64, max_page_size: i64) -> Self {
        Self {
            default_page_size,
            max_page_size,
        }
    }

    /// Build the filter for a paginated event listing
    pub fn listing(&self, params: ListingParams) -> Result<EventFilter, ValidationError> {
        let page_size = params.page_size.unwrap_or(self.default_page_size);
        if page_size > self.max_page_size {
            return Err(ValidationError::new(
                "page_size",
                format!("page_size must be at most {}, got {page_size}", self.max_page_size),
            ));
        }
        let page = PageRequest::new(params.page.unwrap_or(1), page_size)?;

        let time_range = match (params.start_time, params.end_time) {
            (None, None) => None,
            (start, end) => Some(TimeRange::closed(
                start.unwrap_or(DateTime::UNIX_EPOCH),
                end.unwrap_or_else(open_end),
            )?),
        };

        Ok(EventFilter {
            time_range,
            model: normalize_model(params.model),
            status: parse_status(params.status.as_deref())?,
            page: Some(page),
        })
    }

    /// Build a time-series request over `[start_time, end_time)`
    pub fn series(&self, params: SeriesParams) -> Result<SeriesQuery, ValidationError> {
        let range = TimeRange::half_open(params.start_time, params.end_time)?;
        let interval = match params.interval.as_deref() {
            None => Interval::default(),
            Some(s) => s.parse().map_err(|e: UnknownVariant| ValidationError::new("interval", e.to_string()))?,
        };
        let metric = match params.metric.as_deref() {
            None => Metric::default(),
            Some(s) => s.parse().map_err(|e: UnknownVariant| ValidationError::new("metric", e.to_string()))?,
        };

        Ok(SeriesQuery {
            range,
            spec: SeriesSpec { interval, metric },
            model: normalize_model(params.model),
        })
    }
}

/// Upper bound used when a listing only names a start: the last second PostgreSQL and chrono both
/// represent comfortably (9999-12-31T23:59:59Z)
fn open_end() -> DateTime<Utc> {
    DateTime::from_timestamp(253_402_300_799, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// An empty model string means "no model filter"
fn normalize_model(model: Option<String>) -> Option<String> {
    model.filter(|m| !m.is_empty())
}

fn parse_status(status: Option<&str>) -> Result<Option<EventStatus>, ValidationError> {
    status
        .map(|s| s.parse::<EventStatus>().map_err(|e| ValidationError::new("status", e.to_string())))
        .transpose()
}
