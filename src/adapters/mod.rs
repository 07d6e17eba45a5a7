//! Adapters - Implementations of port interfaces.
//!
//! - `auth` - Session token validation
//! - `events` - Outbox publisher and side-effect dispatch
//! - `http` - Axum routes, middleware and error mapping
//! - `memory` - In-memory store for tests and local runs
//! - `notifier` - Outbound payment notifications
//! - `postgres` - sqlx repositories and the activation transaction
//! - `processor` - Payment processor API client
//! - `rate_limiter` - Redis and in-memory request limits

pub mod auth;
pub mod events;
pub mod http;
pub mod memory;
pub mod notifier;
pub mod postgres;
pub mod processor;
pub mod rate_limiter;
