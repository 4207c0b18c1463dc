//! API request and response data models.
//!
//! API models are kept apart from the store's [`Event`](crate::db::Event) so the wire format can
//! evolve independently of storage. Engine outputs that already have the wire shape
//! ([`OverviewMetrics`](crate::engine::OverviewMetrics), [`TimeBucket`](crate::engine::TimeBucket))
//! are returned as they are.

pub mod conversations;
pub mod events;
pub mod health;
pub mod metrics;
