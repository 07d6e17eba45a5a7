//! ProcessorClient port - read-only access to the payment processor.
//!
//! Two lookups back the verifier: the checkout session (which names the
//! payment it produced) and the payment itself. Only the payment-level
//! status is authoritative.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Checkout session as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSnapshot {
    pub id: String,

    /// Checkout-level status ("completed", "open", "expired", ...).
    pub status: String,

    /// Payment produced by this checkout, once one exists.
    pub payment_id: Option<String>,
}

/// Processor payment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorPayment {
    pub id: String,

    /// Payment-level status ("successful", "declined", ...).
    pub status: String,

    pub amount: Option<i64>,
}

#[async_trait]
pub trait ProcessorClient: Send + Sync {
    async fn get_checkout(&self, checkout_id: &str) -> Result<CheckoutSnapshot, ProcessorError>;

    async fn get_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError>;
}

/// Errors from processor API calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProcessorError {
    pub code: ProcessorErrorCode,

    pub message: String,

    /// HTTP status returned by the processor, if any.
    pub http_status: Option<u16>,
}

impl ProcessorError {
    pub fn new(code: ProcessorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorCode::Timeout, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(ProcessorErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn unexpected_response(message: impl Into<String>) -> Self {
        Self::new(ProcessorErrorCode::UnexpectedResponse, message)
    }

    /// Transient failures: the answer may differ on the next attempt.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorErrorCode {
    NetworkError,
    Timeout,
    RateLimited,
    ServerError,
    AuthenticationError,
    NotFound,
    /// Response body did not have the expected shape.
    UnexpectedResponse,
}

impl ProcessorErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProcessorErrorCode::NetworkError
                | ProcessorErrorCode::Timeout
                | ProcessorErrorCode::RateLimited
                | ProcessorErrorCode::ServerError
        )
    }
}

impl std::fmt::Display for ProcessorErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProcessorErrorCode::NetworkError => "network_error",
            ProcessorErrorCode::Timeout => "timeout",
            ProcessorErrorCode::RateLimited => "rate_limited",
            ProcessorErrorCode::ServerError => "server_error",
            ProcessorErrorCode::AuthenticationError => "authentication_error",
            ProcessorErrorCode::NotFound => "not_found",
            ProcessorErrorCode::UnexpectedResponse => "unexpected_response",
        };
        write!(f, "{}", s)
    }
}
