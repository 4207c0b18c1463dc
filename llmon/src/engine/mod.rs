//! Metrics and cost aggregation engine.
//!
//! [`MetricsEngine`] is the single entry point the HTTP layer (and the in-process client sink)
//! talks to. It prices events on the way in and answers the three read queries on the way out:
//!
//! - [`MetricsEngine::record_event`]: validate, price and persist one event
//! - [`MetricsEngine::get_overview`]: rolling statistics over the last N hours
//! - [`MetricsEngine::get_timeseries`]: gap-free bucketed series
//! - [`MetricsEngine::list_events`]: newest-first pages of raw events
//!
//! The engine holds no mutable state of its own. Every answer is a function of the store's
//! contents, the query and the reference instant, and store failures propagate unchanged.

use std::sync::Arc;

use crate::{db::EventStore, pricing::PricingTable};

mod ingest;
mod listing;
mod overview;
mod timeseries;

pub use ingest::RawEvent;
pub use listing::EventPage;
pub use overview::OverviewMetrics;
pub use timeseries::TimeBucket;

/// Longest overview window accepted by default (one week)
pub const DEFAULT_MAX_OVERVIEW_HOURS: i64 = 168;

/// Most buckets a single series may span by default
pub const DEFAULT_MAX_SERIES_BUCKETS: i64 = 10_000;

#[derive(Clone)]
pub struct MetricsEngine {
    store: Arc<dyn EventStore>,
    pricing: Arc<PricingTable>,
    max_overview_hours: i64,
    max_series_buckets: i64,
}

impl MetricsEngine {
    pub fn new(store: Arc<dyn EventStore>, pricing: Arc<PricingTable>) -> Self {
        Self {
            store,
            pricing,
            max_overview_hours: DEFAULT_MAX_OVERVIEW_HOURS,
            max_series_buckets: DEFAULT_MAX_SERIES_BUCKETS,
        }
    }

    pub fn with_max_overview_hours(mut self, hours: i64) -> Self {
        self.max_overview_hours = hours;
        self
    }

    pub fn with_max_series_buckets(mut self, buckets: i64) -> Self {
        self.max_series_buckets = buckets;
        self
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }
}

impl std::fmt::Debug for MetricsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEngine")
            .field("priced_models", &self.pricing.len())
            .field("max_overview_hours", &self.max_overview_hours)
            .field("max_series_buckets", &self.max_series_buckets)
            .finish_non_exhaustive()
    }
}
