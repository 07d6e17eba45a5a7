//! Webhook error types.
//!
//! Only signature and parse failures ever reach the processor as non-200
//! responses; everything past verification is acknowledged.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// No signing secret configured; unsigned traffic is never processed.
    #[error("Webhook secret not configured")]
    SecretNotConfigured,

    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    /// Signature timestamp older than the replay window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signature timestamp too far in the future.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl WebhookError {
    /// Signature problems answer 401, malformed bodies 400.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SecretNotConfigured
            | WebhookError::MissingSignature
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp => StatusCode::UNAUTHORIZED,
            WebhookError::ParseError(_) => StatusCode::BAD_REQUEST,
        }
    }
}
