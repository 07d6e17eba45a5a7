//! In-memory fixed-window rate limiter.
//!
//! Counters live in this process only. Never use behind a load balancer.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::Timestamp;
use crate::ports::{RateLimitDecision, RateLimitError, RateLimitKey, RateLimitQuota, RateLimiter};

use super::config::RateLimitConfig;

#[derive(Debug)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    windows: Arc<RwLock<HashMap<String, WindowState>>>,
}

#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: i64,
    window_secs: u32,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitDecision, RateLimitError> {
        let (limit, window_secs) = self.config.limits_for(&key);
        let now = Timestamp::now().as_unix_secs();

        let mut windows = self.windows.write().await;
        let state = windows.entry(key.storage_key()).or_insert_with(|| WindowState {
            count: 0,
            window_start: now,
            window_secs,
        });

        if now >= state.window_start + i64::from(state.window_secs) {
            state.count = 0;
            state.window_start = now;
        }

        let window_end = state.window_start + i64::from(state.window_secs);
        if state.count >= limit {
            let retry_after = (window_end - now).max(1) as u32;
            return Ok(RateLimitDecision::Denied {
                limit,
                retry_after_secs: retry_after,
            });
        }

        state.count += 1;
        Ok(RateLimitDecision::Allowed(RateLimitQuota {
            limit,
            remaining: limit.saturating_sub(state.count),
            reset_at: Timestamp::now().plus_secs(window_end - now),
        }))
    }
}
