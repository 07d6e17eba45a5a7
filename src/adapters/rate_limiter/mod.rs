//! Rate limiter adapters.
//!
//! - `InMemoryRateLimiter` - tests and single-node development
//! - `RedisRateLimiter` - shared counters for multi-process deployments

mod config;
mod in_memory;
mod redis;

pub use config::RateLimitConfig;
pub use in_memory::InMemoryRateLimiter;
pub use redis::RedisRateLimiter;
