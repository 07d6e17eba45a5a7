//! HTTP middleware for axum.
//!
//! - `auth` - Session authentication middleware and extractor
//! - `rate_limit` - Per-IP and per-user request limits
//! - `cron` - Static bearer secret for scheduler and admin routes

pub mod auth;
pub mod cron;
pub mod rate_limit;

pub use auth::{auth_middleware, AuthRejection, AuthState, RequireAuth};
pub use cron::{cron_auth_middleware, CronSecretState};
pub use rate_limit::{ip_rate_limit_middleware, user_rate_limit_middleware, RateLimiterState};
