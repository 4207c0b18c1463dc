use std::time::Duration;
use thiserror::Error;

/// Unified error type for event store operations.
///
/// Every variant means the same thing to callers: the store could not serve the call. The engine
/// propagates these unchanged and never retries.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backing store unreachable, rejected the statement, or returned data we cannot decode
    #[error("Event store unavailable: {0:#}")]
    Unavailable(anyhow::Error),

    /// A single store call exceeded the configured query timeout
    #[error("Event store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Convert from sqlx::Error. Nothing the event log does can trip a constraint the caller could
/// fix, so every sqlx failure is an availability failure.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(anyhow::Error::from(err))
    }
}

/// Type alias for store operation results
pub type Result<T> = std::result::Result<T, StoreError>;
