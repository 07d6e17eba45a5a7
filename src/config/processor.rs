//! Payment processor configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Processor API credentials and the webhook signing secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    pub api_key: SecretString,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Shared secret for `x-signature`. Unset rejects every webhook.
    pub webhook_secret: Option<SecretString>,

    /// Bound on each checkout or payment lookup
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Comma-separated payment statuses that count as paid
    #[serde(default = "default_paid_statuses")]
    pub paid_statuses: String,
}

impl ProcessorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn paid_statuses_list(&self) -> Vec<String> {
        self.paid_statuses
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn has_webhook_secret(&self) -> bool {
        self.webhook_secret
            .as_ref()
            .is_some_and(|s| !s.expose_secret().is_empty())
    }

    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PROCESSOR__API_KEY"));
        }
        let url = self.api_base_url.as_str();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ValidationError::InvalidProcessorUrl);
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::MustBePositive("processor.request_timeout_secs"));
        }
        if self.paid_statuses_list().is_empty() {
            return Err(ValidationError::EmptyPaidStatuses);
        }

        if *environment == Environment::Production {
            if !url.starts_with("https://") {
                return Err(ValidationError::ProcessorUrlMustBeHttps);
            }
            if !self.has_webhook_secret() {
                return Err(ValidationError::RequiredInProduction("PROCESSOR__WEBHOOK_SECRET"));
            }
        }
        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::new(String::new()),
            api_base_url: default_api_base_url(),
            webhook_secret: None,
            request_timeout_secs: default_request_timeout(),
            paid_statuses: default_paid_statuses(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.processor.example".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_paid_statuses() -> String {
    "successful,settled,captured".to_string()
}
