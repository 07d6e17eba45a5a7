//! Rate limit settings.

use serde::{Deserialize, Serialize};

use crate::ports::{RateLimitKey, RateLimitScope};

/// Fixed-window limits, one per scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per window from one client IP.
    #[serde(default = "default_per_ip")]
    pub per_ip: u32,

    /// Requests per window from one signed-in user.
    #[serde(default = "default_per_user")]
    pub per_user: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u32,
}

impl RateLimitConfig {
    /// (limit, window_secs) for a key.
    pub fn limits_for(&self, key: &RateLimitKey) -> (u32, u32) {
        match key.scope {
            RateLimitScope::Ip => (self.per_ip, self.window_secs),
            RateLimitScope::User => (self.per_user, self.window_secs),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_ip: default_per_ip(),
            per_user: default_per_user(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_per_ip() -> u32 {
    120
}

fn default_per_user() -> u32 {
    30
}

fn default_window_secs() -> u32 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    #[test]
    fn limits_follow_scope() {
        let config = RateLimitConfig::default();
        assert_eq!(config.limits_for(&RateLimitKey::ip("1.2.3.4", "webhook")), (120, 60));
        assert_eq!(
            config.limits_for(&RateLimitKey::user(&UserId::new("u").unwrap(), "poll")),
            (30, 60)
        );
    }
}
