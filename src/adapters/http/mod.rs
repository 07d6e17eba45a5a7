//! HTTP adapters - REST API for the activation pipeline.
//!
//! `app` wraps the payment router in the cross-cutting tower layers:
//! request ids, tracing, timeout, CORS.

pub mod error;
pub mod middleware;
pub mod payment;

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ErrorResponse};
pub use payment::{payment_router, PaymentAppState, RouteGuards};

/// Transport-level settings for `app`.
#[derive(Debug, Clone, Default)]
pub struct HttpSettings {
    pub request_timeout: Option<Duration>,
    /// Empty means no cross-origin access.
    pub cors_origins: Vec<String>,
}

/// The full service: routes plus middleware stack.
pub fn app(state: PaymentAppState, guards: RouteGuards, settings: &HttpSettings) -> Router {
    let request_id = HeaderName::from_static("x-request-id");

    let origins: Vec<HeaderValue> = settings
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let mut router = payment_router(state, guards);
    if let Some(timeout) = settings.request_timeout {
        router = router.layer(TimeoutLayer::new(timeout));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(request_id))
            .layer(cors),
    )
}
