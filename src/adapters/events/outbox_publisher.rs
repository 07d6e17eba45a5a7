//! OutboxPublisher - Background service for side-effect delivery.
//!
//! Second half of the transactional outbox:
//! 1. Activation writes side-effect events to the outbox in the same
//!    transaction as the status change
//! 2. **OutboxPublisher polls the outbox and hands each entry to an
//!    `EventPublisher`** ← This module
//!
//! A failed delivery is retried with exponential backoff. After
//! `max_retries` attempts the entry is marked dead and left for a human.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 1s | How often to check for due entries |
//! | `batch_size` | 100 | Max entries per poll cycle |
//! | `max_retries` | 8 | Attempts before an entry is dead |
//! | `base_retry_delay` | 5s | First backoff; doubles per attempt |
//! | `max_retry_delay` | 1h | Backoff ceiling |
//! | `retention_hours` | 168 | Published entries older than this are deleted |
//!
//! ## Graceful Shutdown
//!
//! The service listens for a shutdown signal and runs one final batch
//! before stopping.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time;

use crate::domain::foundation::DomainError;
use crate::ports::{EventPublisher, OutboxEntry, OutboxWriter};

#[derive(Debug, Clone)]
pub struct OutboxPublisherConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    pub max_retries: u32,
    pub base_retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub cleanup_interval: Duration,
    pub retention_hours: u32,
}

impl Default for OutboxPublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
            max_retries: 8,
            base_retry_delay: Duration::from_secs(5),
            max_retry_delay: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(3600),
            retention_hours: 168,
        }
    }
}

impl OutboxPublisherConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_retry_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub published: usize,
    pub retried: usize,
    pub dead: usize,
}

/// Background service that delivers entries from the outbox.
pub struct OutboxPublisher {
    outbox: Arc<dyn OutboxWriter>,
    event_publisher: Arc<dyn EventPublisher>,
    config: OutboxPublisherConfig,
}

impl OutboxPublisher {
    pub fn new(outbox: Arc<dyn OutboxWriter>, event_publisher: Arc<dyn EventPublisher>) -> Self {
        Self::with_config(outbox, event_publisher, OutboxPublisherConfig::default())
    }

    pub fn with_config(
        outbox: Arc<dyn OutboxWriter>,
        event_publisher: Arc<dyn EventPublisher>,
        config: OutboxPublisherConfig,
    ) -> Self {
        Self {
            outbox,
            event_publisher,
            config,
        }
    }

    /// Run the publisher loop until the shutdown signal is received.
    ///
    /// Storage errors are logged and the loop keeps going; the next tick
    /// retries.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut poll = time::interval(self.config.poll_interval);
        let mut cleanup = time::interval(self.config.cleanup_interval);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        if let Err(e) = self.process_batch().await {
                            tracing::error!(error = %e, "final outbox batch failed");
                        }
                        tracing::info!("outbox publisher stopped");
                        return;
                    }
                }

                _ = poll.tick() => {
                    if let Err(e) = self.process_batch().await {
                        tracing::error!(error = %e, "outbox batch failed");
                    }
                }

                _ = cleanup.tick() => {
                    match self.outbox.cleanup_old(self.config.retention_hours).await {
                        Ok(0) => {}
                        Ok(deleted) => tracing::debug!(deleted, "outbox cleanup"),
                        Err(e) => tracing::warn!(error = %e, "outbox cleanup failed"),
                    }
                }
            }
        }
    }

    /// Process a single batch of due entries.
    pub async fn process_batch(&self) -> Result<BatchReport, DomainError> {
        let entries = self.outbox.get_pending(self.config.batch_size).await?;
        let mut report = BatchReport::default();

        for entry in entries {
            match self.event_publisher.publish(entry.event.clone()).await {
                Ok(()) => {
                    self.outbox.mark_published(entry.id).await?;
                    report.published += 1;
                }
                Err(e) => {
                    if self.record_failure(&entry, &e).await? {
                        report.retried += 1;
                    } else {
                        report.dead += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Returns true when the entry will be retried.
    async fn record_failure(
        &self,
        entry: &OutboxEntry,
        error: &DomainError,
    ) -> Result<bool, DomainError> {
        let attempt = entry.attempts + 1;
        let message = error.to_string();

        if attempt >= self.config.max_retries {
            tracing::error!(
                outbox_id = %entry.id,
                event_type = %entry.event.event_type,
                attempts = attempt,
                error = %message,
                "side effect permanently failed"
            );
            self.outbox.mark_failed(entry.id, &message, None).await?;
            return Ok(false);
        }

        let delay = self.config.retry_delay(attempt);
        let retry_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::hours(1));
        tracing::warn!(
            outbox_id = %entry.id,
            event_type = %entry.event.event_type,
            attempt,
            retry_in_secs = delay.as_secs(),
            error = %message,
            "side effect delivery failed"
        );
        self.outbox
            .mark_failed(entry.id, &message, Some(retry_at))
            .await?;
        Ok(true)
    }
}
