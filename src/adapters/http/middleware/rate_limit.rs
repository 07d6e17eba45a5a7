//! Rate limiting middleware for the public payment routes.
//!
//! Two layers, one per key scope:
//! - `ip_rate_limit_middleware` - cron and admin routes, keyed by client IP
//! - `user_rate_limit_middleware` - session routes; must run after `auth_middleware`
//!
//! Status is reported in `X-RateLimit-Limit` / `X-RateLimit-Remaining` /
//! `X-RateLimit-Reset`, plus `Retry-After` on a 429. A limiter outage
//! lets the request through.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::foundation::AuthenticatedUser;
use crate::ports::{RateLimitDecision, RateLimitKey, RateLimitQuota, RateLimiter};

pub type RateLimiterState = Arc<dyn RateLimiter>;

pub mod headers {
    use super::HeaderName;

    pub static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
    pub static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
    pub static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
}

/// Bucket names, so the cron and payer routes never share a counter.
pub const CRON_RESOURCE: &str = "cron";
pub const PAYMENTS_RESOURCE: &str = "payments";

#[derive(Serialize)]
struct RateLimitBody {
    error: &'static str,
    code: &'static str,
    retry_after_secs: u32,
}

/// Per-IP limit for the cron-secret routes. Never layered on the processor
/// webhook, where a 429 turns into redelivery.
pub async fn ip_rate_limit_middleware(
    State(limiter): State<RateLimiterState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ip) = extract_client_ip(&request, connect_info.as_ref()) else {
        return next.run(request).await;
    };
    enforce(limiter, RateLimitKey::ip(&ip, CRON_RESOURCE), request, next).await
}

/// Per-user limit for session routes. Requests without a user pass
/// through; `RequireAuth` rejects them downstream.
pub async fn user_rate_limit_middleware(
    State(limiter): State<RateLimiterState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user) = request.extensions().get::<AuthenticatedUser>().cloned() else {
        return next.run(request).await;
    };
    enforce(limiter, RateLimitKey::user(&user.id, PAYMENTS_RESOURCE), request, next).await
}

async fn enforce(
    limiter: RateLimiterState,
    key: RateLimitKey,
    request: Request,
    next: Next,
) -> Response {
    let quota = match limiter.check(key.clone()).await {
        Ok(RateLimitDecision::Allowed(quota)) => Some(quota),
        Ok(RateLimitDecision::Denied {
            limit,
            retry_after_secs,
        }) => {
            tracing::warn!(
                scope = %key.scope,
                identifier = %key.identifier,
                "rate limit exceeded"
            );
            return rate_limit_response(limit, retry_after_secs);
        }
        Err(e) => {
            tracing::warn!(error = %e, "rate limiter unavailable; allowing request");
            None
        }
    };

    let mut response = next.run(request).await;
    if let Some(quota) = quota {
        add_rate_limit_headers(&mut response, &quota);
    }
    response
}

/// Client IP, preferring proxy headers.
///
/// 1. X-Forwarded-For (first entry)
/// 2. X-Real-IP
/// 3. socket address
fn extract_client_ip<B>(
    request: &axum::http::Request<B>,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    if let Some(first) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return Some(first.to_string());
    }

    if let Some(real_ip) = request
        .headers()
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
    {
        return Some(real_ip.trim().to_string());
    }

    connect_info.map(|ci| ci.0.ip().to_string())
}

fn numeric_header(value: impl ToString) -> Option<HeaderValue> {
    HeaderValue::from_str(&value.to_string()).ok()
}

fn rate_limit_response(limit: u32, retry_after_secs: u32) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitBody {
            error: "Rate limit exceeded",
            code: "RATE_LIMIT_EXCEEDED",
            retry_after_secs,
        }),
    )
        .into_response();

    let headers = response.headers_mut();
    if let Some(v) = numeric_header(limit) {
        headers.insert(headers::X_RATELIMIT_LIMIT.clone(), v);
    }
    headers.insert(headers::X_RATELIMIT_REMAINING.clone(), HeaderValue::from_static("0"));
    if let Some(v) = numeric_header(retry_after_secs) {
        headers.insert(axum::http::header::RETRY_AFTER, v);
    }
    response
}

fn add_rate_limit_headers(response: &mut Response, quota: &RateLimitQuota) {
    let headers = response.headers_mut();
    if let Some(v) = numeric_header(quota.limit) {
        headers.insert(headers::X_RATELIMIT_LIMIT.clone(), v);
    }
    if let Some(v) = numeric_header(quota.remaining) {
        headers.insert(headers::X_RATELIMIT_REMAINING.clone(), v);
    }
    if let Some(v) = numeric_header(quota.reset_at.as_unix_secs()) {
        headers.insert(headers::X_RATELIMIT_RESET.clone(), v);
    }
}
