//! Error types for the incident responder.
//!
//! Each external boundary has its own error enum. Only [`ResponderError`] is
//! ever visible to HTTP callers; the others are absorbed by the stage that
//! raised them and turned into a degraded outcome.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors from the telemetry backend (logs, spans, metrics).
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Credentials are missing
    #[error("telemetry source not configured: {0}")]
    NotConfigured(&'static str),

    /// Transport failure
    #[error("telemetry request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("telemetry API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape
    #[error("failed to decode telemetry response: {0}")]
    Decode(String),

    /// The fetch did not complete within its time budget
    #[error("telemetry fetch timed out after {0}s")]
    Timeout(u64),

    /// The requested time window cannot be represented
    #[error("invalid time window of {0} minutes")]
    InvalidWindow(u32),
}

/// Errors from the language model client.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("language model not configured: {0}")]
    NotConfigured(&'static str),

    #[error("language model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("language model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model returned no text")]
    EmptyResponse,

    #[error("language model call timed out after {0}s")]
    Timeout(u64),
}

/// Errors from the incident store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("incident has no identifier")]
    MissingIncidentId,
}

/// Caller-visible failures of the responder.
#[derive(Debug, Error)]
pub enum ResponderError {
    /// Something escaped every degradation path
    #[error("unexpected error: {0}")]
    Unexpected(String),

    /// Invalid configuration at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// Request body or query the responder cannot interpret
    #[error("invalid request: {0}")]
    InvalidPayload(String),
}

impl IntoResponse for ResponderError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Unexpected(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
