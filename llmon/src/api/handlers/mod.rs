//! HTTP request handlers.
//!
//! Each handler turns raw query/body input into the normalized filter types, calls one
//! [`MetricsEngine`](crate::engine::MetricsEngine) operation and serializes the answer. Handlers
//! return [`crate::errors::Error`], which maps validation failures to 400 and store failures to 503.
//!
//! - [`health`]: liveness probes
//! - [`events`]: event ingestion
//! - [`metrics`]: overview and time series
//! - [`conversations`]: paginated event listing

pub mod conversations;
pub mod events;
pub mod health;
pub mod metrics;
