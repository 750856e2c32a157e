//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the JSON error
//! body every handler returns.

use crate::config::ConfigError;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use trip_mate_core::ports::PortError;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// Handler Error Responses
//=========================================================================================

/// The body of every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// The error half of every handler's return type.
pub type HandlerError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn bad_request(message: impl Into<String>) -> HandlerError {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// Maps a port failure to a response. Validation and lookup failures carry their
/// message; everything else is logged and replaced by `fallback`.
pub fn port_failure(e: PortError, fallback: &str) -> HandlerError {
    match e {
        PortError::Validation(msg) => bad_request(msg),
        PortError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, msg),
        other => {
            tracing::error!("{}: {:?}", fallback, other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, fallback)
        }
    }
}
