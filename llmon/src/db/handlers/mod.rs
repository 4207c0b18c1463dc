//! Store implementations backed by PostgreSQL.
//!
//! - [`events`]: [`PgEventStore`], the `llm_events` table

pub mod events;

pub use events::PgEventStore;
