//! Event storage.
//!
//! ```text
//! ┌──────────────────┐
//! │  MetricsEngine   │  (engine - pricing, overview, series, listings)
//! └────────┬─────────┘
//!          │ Arc<dyn EventStore>
//!          ↓
//! ┌──────────────────┐      ┌────────────────────┐
//! │   PgEventStore   │  or  │ InMemoryEventStore │
//! └────────┬─────────┘      └────────────────────┘
//!          ↓
//! ┌──────────────────┐
//! │    PostgreSQL    │  (llm_events)
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: the PostgreSQL store
//! - [`in_memory`]: a process-local store for development and tests
//! - [`models`]: events and aggregate rows
//! - [`errors`]: the store error type
//!
//! # Ordering
//!
//! Every store returns events newest first, ties on `timestamp` broken by `id` descending. Pages
//! are offset/limit windows over that ordering, so consecutive pages never overlap.

use async_trait::async_trait;

use crate::filters::EventFilter;

pub mod errors;
pub mod handlers;
pub mod in_memory;
pub mod models;

pub use errors::{Result, StoreError};
pub use handlers::PgEventStore;
pub use in_memory::InMemoryEventStore;
pub use models::aggregates::{AggregateRow, GroupBy, aggregate_events};
pub use models::events::{Event, EventStatus, NewEvent};

/// Append-only event log with filtered reads.
///
/// Implementors only need `append` and `query`. `count` and `aggregate` default to a full scan
/// through `query`; stores with a query engine of their own should override both.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist a priced event, assigning its identifier and insertion time
    async fn append(&self, event: NewEvent) -> Result<Event>;

    /// Matching events, newest first, windowed by `filter.page` when present
    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    /// Number of matching events, ignoring any page
    async fn count(&self, filter: &EventFilter) -> Result<i64> {
        let events = self.query(&filter.without_page()).await?;
        Ok(events.len() as i64)
    }

    /// Sums and counts over matching events, grouped per `group_by`, ordered by bucket then model
    async fn aggregate(&self, filter: &EventFilter, group_by: GroupBy) -> Result<Vec<AggregateRow>> {
        let events = self.query(&filter.without_page()).await?;
        Ok(aggregate_events(&events, group_by))
    }
}
