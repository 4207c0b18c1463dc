use crate::{db::errors::StoreError, filters::ValidationError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// A caller-supplied parameter failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The event store could not serve the call
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(err) => err.message.clone(),
            Error::StoreUnavailable(StoreError::Timeout(_)) => "Event store timed out, please retry".to_string(),
            Error::StoreUnavailable(_) => "Event store is temporarily unavailable".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::StoreUnavailable(_) | Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Validation(_) => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = match &self {
            Error::Validation(err) => json!({ "field": err.field, "message": err.message }),
            _ => json!({ "message": self.user_message() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Type alias for engine and handler results
pub type Result<T> = std::result::Result<T, Error>;
