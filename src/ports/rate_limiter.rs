//! Request counters for the public payment endpoints.
//!
//! Counters must be shared by every instance behind the load balancer;
//! the in-memory adapter only suits tests and a single node.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Timestamp, UserId};

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one request against `key`.
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitDecision, RateLimitError>;
}

/// Who is counted (`scope` + `identifier`) and for which route family.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    pub scope: RateLimitScope,
    pub identifier: String,
    pub resource: &'static str,
}

impl RateLimitKey {
    pub fn ip(ip: &str, resource: &'static str) -> Self {
        Self {
            scope: RateLimitScope::Ip,
            identifier: ip.to_string(),
            resource,
        }
    }

    pub fn user(user_id: &UserId, resource: &'static str) -> Self {
        Self {
            scope: RateLimitScope::User,
            identifier: user_id.to_string(),
            resource,
        }
    }

    pub fn storage_key(&self) -> String {
        format!("rl:{}:{}:{}", self.resource, self.scope, self.identifier)
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    Ip,
    User,
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RateLimitScope::Ip => "ip",
            RateLimitScope::User => "user",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed(RateLimitQuota),
    Denied { limit: u32, retry_after_secs: u32 },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed(_))
    }
}

/// What is left of the current window after an allowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitQuota {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_groups_by_resource_first() {
        let key = RateLimitKey::ip("10.0.0.1", "webhook");
        assert_eq!(key.storage_key(), "rl:webhook:ip:10.0.0.1");
    }

    #[test]
    fn user_keys_use_the_user_id() {
        let key = RateLimitKey::user(&UserId::new("user-1").unwrap(), "payments");
        assert_eq!(key.scope, RateLimitScope::User);
        assert_eq!(key.storage_key(), "rl:payments:user:user-1");
    }
}
