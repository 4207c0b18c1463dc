use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{engine::TimeBucket, filters::SeriesParams};

/// Overview window used when the caller does not name one
pub const DEFAULT_OVERVIEW_HOURS: i64 = 24;

/// Query parameters for the overview endpoint
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct OverviewQuery {
    /// Window length in hours, ending now (default: 24)
    #[param(default = 24, minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub hours: Option<i64>,
}

impl OverviewQuery {
    #[inline]
    pub fn hours(&self) -> i64 {
        self.hours.unwrap_or(DEFAULT_OVERVIEW_HOURS)
    }
}

/// Query parameters for the time-series endpoint
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct TimeSeriesQuery {
    /// Inclusive start of the range (RFC 3339)
    pub start_time: DateTime<Utc>,
    /// Exclusive end of the range (RFC 3339)
    pub end_time: DateTime<Utc>,
    /// Bucket width: `1h` (default) or `1d`
    pub interval: Option<String>,
    /// `requests` (default), `cost` or `latency`
    pub metric: Option<String>,
    /// Restrict to one model; an empty value means all models
    pub model: Option<String>,
}

impl From<TimeSeriesQuery> for SeriesParams {
    fn from(query: TimeSeriesQuery) -> Self {
        Self {
            start_time: query.start_time,
            end_time: query.end_time,
            interval: query.interval,
            metric: query.metric,
            model: query.model,
        }
    }
}

/// Gap-free series, ordered by bucket start then model
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimeSeriesResponse {
    pub data: Vec<TimeBucket>,
}
