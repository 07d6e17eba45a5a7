//! Checkout-success poller configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::application::PollerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct PollerSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Suggested client poll interval, echoed for the frontend
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_recent_window")]
    pub recent_completion_window_secs: i64,

    #[serde(default = "default_fail_open")]
    pub checkout_fail_open: bool,
}

impl PollerSettings {
    pub fn handler_config(&self) -> PollerConfig {
        PollerConfig {
            max_attempts: self.max_attempts,
            recent_completion_window_secs: self.recent_completion_window_secs,
            checkout_fail_open: self.checkout_fail_open,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::MustBePositive("poller.max_attempts"));
        }
        if self.interval_ms == 0 {
            return Err(ValidationError::MustBePositive("poller.interval_ms"));
        }
        if self.recent_completion_window_secs <= 0 {
            return Err(ValidationError::MustBePositive(
                "poller.recent_completion_window_secs",
            ));
        }
        Ok(())
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
            recent_completion_window_secs: default_recent_window(),
            checkout_fail_open: default_fail_open(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_recent_window() -> i64 {
    300
}

fn default_fail_open() -> bool {
    true
}
