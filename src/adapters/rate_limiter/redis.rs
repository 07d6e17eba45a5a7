//! Redis-backed fixed-window rate limiter.
//!
//! `INCR` the window key, `EXPIRE` it on the first hit, deny once the count
//! passes the limit. Shared by every process pointing at the same Redis.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::Timestamp;
use crate::ports::{RateLimitDecision, RateLimitError, RateLimitKey, RateLimitQuota, RateLimiter};

use super::config::RateLimitConfig;

#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    config: RateLimitConfig,
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection, config: RateLimitConfig) -> Self {
        Self { conn, config }
    }
}

fn unavailable(e: redis::RedisError) -> RateLimitError {
    RateLimitError::Unavailable(e.to_string())
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitDecision, RateLimitError> {
        let redis_key = key.storage_key();
        let (limit, window_secs) = self.config.limits_for(&key);
        let mut conn = self.conn.clone();

        let count: i64 = conn.incr(&redis_key, 1_i64).await.map_err(unavailable)?;
        if count == 1 {
            conn.expire::<_, ()>(&redis_key, i64::from(window_secs))
                .await
                .map_err(unavailable)?;
        }

        let ttl: i64 = conn.ttl(&redis_key).await.map_err(unavailable)?;
        let reset_secs = if ttl > 0 { ttl } else { i64::from(window_secs) };

        if count > i64::from(limit) {
            let retry_after = reset_secs.max(1) as u32;
            return Ok(RateLimitDecision::Denied {
                limit,
                retry_after_secs: retry_after,
            });
        }

        Ok(RateLimitDecision::Allowed(RateLimitQuota {
            limit,
            remaining: limit.saturating_sub(count as u32),
            reset_at: Timestamp::now().plus_secs(reset_secs),
        }))
    }
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
