//! In-memory event store.
//!
//! Holds every event in a vector behind a lock. Suitable for development and tests; events are
//! lost on restart. Counting and aggregation use the trait's full-scan defaults.

use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{instrument, trace};
use uuid::Uuid;

use crate::{
    db::{
        EventStore,
        errors::Result,
        models::events::{Event, NewEvent},
    },
    filters::EventFilter,
    types::abbrev_uuid,
};

/// Newest first, ties broken by id descending
fn newest_first(a: &Event, b: &Event) -> Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id))
}

#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<Event>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with already materialized events
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events: Arc::new(RwLock::new(events)),
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[instrument(skip(self, event), fields(model = %event.model), err)]
    async fn append(&self, event: NewEvent) -> Result<Event> {
        let event = event.into_event(Uuid::new_v4(), Utc::now());
        trace!(event_id = %abbrev_uuid(&event.id), "Appending event");
        self.events.write().push(event.clone());
        Ok(event)
    }

    #[instrument(skip(self), err)]
    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut matching: Vec<Event> = self.events.read().iter().filter(|e| filter.matches(e)).cloned().collect();
        matching.sort_by(newest_first);

        let Some(page) = filter.page else {
            return Ok(matching);
        };

        // Offsets past the end of the log simply yield an empty page
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}
