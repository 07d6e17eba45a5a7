//! Outbox publisher configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::events::OutboxPublisherConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Attempts before an entry is parked as failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Published entries older than this are deleted
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

impl OutboxConfig {
    pub fn publisher_config(&self) -> OutboxPublisherConfig {
        OutboxPublisherConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            retention_hours: self.retention_hours,
            ..OutboxPublisherConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::MustBePositive("outbox.poll_interval_ms"));
        }
        if self.batch_size == 0 {
            return Err(ValidationError::MustBePositive("outbox.batch_size"));
        }
        if self.max_retries == 0 {
            return Err(ValidationError::MustBePositive("outbox.max_retries"));
        }
        Ok(())
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retention_hours: default_retention_hours(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    8
}

fn default_retention_hours() -> u32 {
    168
}
