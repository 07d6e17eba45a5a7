//! Reconciliation sweep configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;
use crate::application::SweepConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct SweepSettings {
    /// Run the in-process scheduler. The cron route works either way.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Pending payments younger than this are left to the webhook and poller
    #[serde(default = "default_min_age")]
    pub min_age_secs: i64,

    #[serde(default = "default_expire_after")]
    pub expire_after_secs: i64,

    /// Pause between processor calls
    #[serde(default = "default_call_delay")]
    pub call_delay_ms: u64,

    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,

    /// Bearer secret for the cron and admin routes
    pub cron_secret: Option<SecretString>,
}

impl SweepSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn job_config(&self) -> SweepConfig {
        SweepConfig {
            min_age_secs: self.min_age_secs,
            expire_after_secs: self.expire_after_secs,
            call_delay: Duration::from_millis(self.call_delay_ms),
            batch_limit: self.batch_limit,
        }
    }

    pub fn cron_secret(&self) -> Option<SecretString> {
        self.cron_secret
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty())
            .cloned()
    }

    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::MustBePositive("sweep.interval_secs"));
        }
        if self.batch_limit == 0 {
            return Err(ValidationError::MustBePositive("sweep.batch_limit"));
        }
        if self.min_age_secs < 0 || self.expire_after_secs <= self.min_age_secs {
            return Err(ValidationError::InvalidSweepWindow);
        }
        if *environment == Environment::Production && self.cron_secret().is_none() {
            return Err(ValidationError::RequiredInProduction("SWEEP__CRON_SECRET"));
        }
        Ok(())
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            min_age_secs: default_min_age(),
            expire_after_secs: default_expire_after(),
            call_delay_ms: default_call_delay(),
            batch_limit: default_batch_limit(),
            cron_secret: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    300
}

fn default_min_age() -> i64 {
    120
}

fn default_expire_after() -> i64 {
    3600
}

fn default_call_delay() -> u64 {
    500
}

fn default_batch_limit() -> u32 {
    500
}
