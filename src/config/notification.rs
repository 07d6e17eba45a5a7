//! Outbound notification configuration
//!
//! Without a URL, notifications are only logged.

use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    pub url: Option<String>,

    /// Sent as a bearer token
    pub auth_token: Option<SecretString>,

    pub timeout_secs: Option<u64>,
}

impl NotificationConfig {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(5))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.url() {
            Some(url) if !(url.starts_with("https://") || url.starts_with("http://")) => {
                Err(ValidationError::InvalidNotificationUrl)
            }
            _ => Ok(()),
        }
    }
}
