//! Log of processor webhook deliveries, keyed by the processor's event id.
//!
//! The processor retries on timeouts and replays on request, so the same
//! event id can arrive several times. The first delivery is recorded with
//! its outcome; later ones find the row and stop, unless that outcome was
//! `Failed`, in which case the redelivery is processed again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;

/// What the receiver did with one verified event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event changed a payment.
    Processed,
    /// Nothing to do, with the reason.
    Ignored(String),
    /// Processing errored. The delivery was still acknowledged.
    Failed(String),
}

impl WebhookOutcome {
    /// Column value for `webhook_events.result`.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "success",
            WebhookOutcome::Ignored(_) => "ignored",
            WebhookOutcome::Failed(_) => "failed",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            WebhookOutcome::Processed => None,
            WebhookOutcome::Ignored(d) | WebhookOutcome::Failed(d) => Some(d),
        }
    }

    /// Rebuilds from the stored column pair. Unknown labels read as failed
    /// so a corrupted row is never mistaken for a success.
    pub fn from_columns(result: &str, detail: Option<String>) -> Self {
        let detail = detail.unwrap_or_default();
        match result {
            "success" => WebhookOutcome::Processed,
            "ignored" => WebhookOutcome::Ignored(detail),
            _ => WebhookOutcome::Failed(detail),
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, WebhookOutcome::Processed)
    }

    /// Whether a redelivery of this event should be processed again.
    pub fn allows_retry(&self) -> bool {
        matches!(self, WebhookOutcome::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
    pub outcome: WebhookOutcome,
    /// Raw body, kept for replay and audit.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    pub fn new(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        outcome: WebhookOutcome,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            outcome,
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Inserted,
    /// Overwrote a row whose earlier outcome was `Failed`.
    Replaced,
    /// A concurrent delivery of the same event got there first.
    AlreadyExists,
}

#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Inserts, or overwrites an existing row only when its outcome is
    /// `Failed`. Any other existing row is left alone.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Retention cleanup. Returns rows removed.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}
