use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::{api::models::events::EventResponse, engine::EventPage, filters::ListingParams};

/// Query parameters for listing events
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListConversationsQuery {
    /// 1-based page number (default: 1)
    #[param(default = 1, minimum = 1)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page: Option<i64>,

    /// Events per page (default: 100, max: 1000)
    #[param(default = 100, minimum = 1, maximum = 1000)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub page_size: Option<i64>,

    /// Filter by exact model name
    pub model: Option<String>,

    /// Filter by status: `success` or `error`
    pub status: Option<String>,

    /// Only events at or after this instant
    pub start_time: Option<DateTime<Utc>>,

    /// Only events at or before this instant
    pub end_time: Option<DateTime<Utc>>,
}

impl From<ListConversationsQuery> for ListingParams {
    fn from(query: ListConversationsQuery) -> Self {
        Self {
            page: query.page,
            page_size: query.page_size,
            model: query.model,
            status: query.status,
            start_time: query.start_time,
            end_time: query.end_time,
        }
    }
}

/// One page of events, newest first
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConversationsResponse {
    pub events: Vec<EventResponse>,
    /// Matching events across all pages
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

impl From<EventPage> for ConversationsResponse {
    fn from(page: EventPage) -> Self {
        Self {
            events: page.events.into_iter().map(EventResponse::from).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
        }
    }
}
