//! PostgreSQL event store.
//!
//! Queries are assembled at runtime with [`QueryBuilder`] so every combination of filters maps to
//! a single statement. Each statement runs under the configured query timeout.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    db::{
        EventStore,
        errors::{Result, StoreError},
        models::{
            aggregates::{AggregateRow, GroupBy},
            events::{Event, EventRow, NewEvent},
        },
    },
    filters::{EndBound, EventFilter},
    types::abbrev_uuid,
};

const EVENT_COLUMNS: &str = "id, timestamp, model, prompt_tokens, completion_tokens, total_tokens, latency_ms, \
                             cost_usd, status, error_message, tags, created_at";

#[derive(Clone, Debug)]
pub struct PgEventStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgEventStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }

    /// Run a statement, converting an elapsed timeout into [`StoreError::Timeout`]
    async fn bounded<T>(&self, statement: impl Future<Output = std::result::Result<T, sqlx::Error>>) -> Result<T> {
        match tokio::time::timeout(self.query_timeout, statement).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.query_timeout)),
        }
    }
}

/// Append the filter's conditions to a query that already ends in a `WHERE` clause
fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    if let Some(range) = filter.time_range {
        query.push(" AND timestamp >= ");
        query.push_bind(range.start());
        query.push(match range.end_bound() {
            EndBound::Inclusive => " AND timestamp <= ",
            EndBound::Exclusive => " AND timestamp < ",
        });
        query.push_bind(range.end());
    }

    if let Some(ref model) = filter.model {
        query.push(" AND model = ");
        query.push_bind(model.clone());
    }

    if let Some(status) = filter.status {
        query.push(" AND status = ");
        query.push_bind(status.as_str());
    }
}

fn select_query(filter: &EventFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM llm_events WHERE 1=1"));
    push_filter(&mut query, filter);

    query.push(" ORDER BY timestamp DESC, id DESC");
    if let Some(page) = filter.page {
        query.push(" LIMIT ");
        query.push_bind(page.limit());
        query.push(" OFFSET ");
        query.push_bind(page.offset());
    }
    query
}

fn count_query(filter: &EventFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("SELECT COUNT(*) FROM llm_events WHERE 1=1");
    push_filter(&mut query, filter);
    query
}

fn aggregate_query(filter: &EventFilter, group_by: GroupBy) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("SELECT ");

    // Units come from a closed enum, never from user input
    match group_by.bucket {
        Some(interval) => query.push(format!("date_trunc('{}', timestamp, 'UTC')", interval.pg_unit())),
        None => query.push("NULL::timestamptz"),
    };
    query.push(" AS bucket, ");
    query.push(if group_by.model { "model" } else { "NULL::text" });
    query.push(
        " AS model, \
         COUNT(*) AS count, \
         COALESCE(SUM(cost_usd), 0) AS cost_sum, \
         COALESCE(SUM(latency_ms), 0)::BIGINT AS latency_sum, \
         COUNT(latency_ms) AS latency_count, \
         COUNT(*) FILTER (WHERE status = 'error') AS error_count \
         FROM llm_events WHERE 1=1",
    );
    push_filter(&mut query, filter);
    query.push(" GROUP BY 1, 2 ORDER BY 1, 2");
    query
}

#[async_trait]
impl EventStore for PgEventStore {
    #[instrument(skip(self, event), fields(model = %event.model), err)]
    async fn append(&self, event: NewEvent) -> Result<Event> {
        let id = Uuid::new_v4();
        let sql = format!(
            "INSERT INTO llm_events \
             (id, timestamp, model, prompt_tokens, completion_tokens, total_tokens, latency_ms, cost_usd, status, error_message, tags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {EVENT_COLUMNS}"
        );

        let row = self
            .bounded(
                sqlx::query_as::<_, EventRow>(&sql)
                    .bind(id)
                    .bind(event.timestamp)
                    .bind(&event.model)
                    .bind(event.prompt_tokens)
                    .bind(event.completion_tokens)
                    .bind(event.total_tokens)
                    .bind(event.latency_ms)
                    .bind(event.cost_usd)
                    .bind(event.status.as_str())
                    .bind(&event.error_message)
                    .bind(Json(&event.tags))
                    .fetch_one(&self.pool),
            )
            .await?;

        debug!(event_id = %abbrev_uuid(&id), "Stored event");
        Event::try_from(row)
    }

    #[instrument(skip(self), err)]
    async fn query(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut query = select_query(filter);
        let rows = self.bounded(query.build_query_as::<EventRow>().fetch_all(&self.pool)).await?;
        rows.into_iter().map(Event::try_from).collect()
    }

    #[instrument(skip(self), err)]
    async fn count(&self, filter: &EventFilter) -> Result<i64> {
        let mut query = count_query(filter);
        self.bounded(query.build_query_scalar::<i64>().fetch_one(&self.pool)).await
    }

    #[instrument(skip(self), err)]
    async fn aggregate(&self, filter: &EventFilter, group_by: GroupBy) -> Result<Vec<AggregateRow>> {
        let mut query = aggregate_query(filter, group_by);
        self.bounded(query.build_query_as::<AggregateRow>().fetch_all(&self.pool)).await
    }
}
