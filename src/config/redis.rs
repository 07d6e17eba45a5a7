//! Redis configuration
//!
//! Redis backs the shared rate limiter. Without a URL each instance limits
//! in memory.

use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
}

impl RedisConfig {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.url() {
            Some(url) if !(url.starts_with("redis://") || url.starts_with("rediss://")) => {
                Err(ValidationError::InvalidRedisUrl)
            }
            _ => Ok(()),
        }
    }
}
