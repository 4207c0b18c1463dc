//! Storage-level record models.
//!
//! - [`events`]: the immutable LLM call event and its row mapping
//! - [`aggregates`]: grouped sums and counts returned by store aggregation
//!
//! These are distinct from the API models in [`crate::api::models`] so the wire representation
//! can evolve independently of the table layout.

pub mod aggregates;
pub mod events;
