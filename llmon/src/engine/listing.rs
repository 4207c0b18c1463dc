use tracing::instrument;

use crate::{db::Event, errors::Result, filters::EventFilter};

use super::MetricsEngine;

/// One page of the newest-first event listing
#[derive(Debug, Clone, PartialEq)]
pub struct EventPage {
    pub events: Vec<Event>,
    /// Matching events across all pages
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

impl MetricsEngine {
    /// Newest-first page of matching events plus the total match count.
    ///
    /// A filter without a page gets the first page of the default size.
    #[instrument(skip(self), err)]
    pub async fn list_events(&self, filter: &EventFilter) -> Result<EventPage> {
        let page = filter.page.unwrap_or_default();
        let paged = filter.clone().with_page(page);
        let unpaged = filter.without_page();

        let (events, total_count) = tokio::try_join!(self.store.query(&paged), self.store.count(&unpaged))?;

        Ok(EventPage {
            events,
            total_count,
            page: page.page(),
            page_size: page.page_size(),
        })
    }
}
