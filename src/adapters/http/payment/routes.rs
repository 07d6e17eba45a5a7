//! Axum router for the payment API.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::adapters::http::middleware::{
    auth_middleware, cron_auth_middleware, ip_rate_limit_middleware, user_rate_limit_middleware,
    AuthState, CronSecretState, RateLimiterState,
};

use super::handlers::{
    create_payment, handle_processor_webhook, health, link_guest_payment, poll_activation, ready,
    revert_payment, run_sweep, PaymentAppState,
};

/// Layer states for the route groups.
#[derive(Clone)]
pub struct RouteGuards {
    pub sessions: AuthState,
    pub limiter: RateLimiterState,
    pub cron_secret: CronSecretState,
}

/// Webhook route: no session, signature checked in the handler. Not rate
/// limited; past the signature check it only ever answers 200.
pub fn webhook_routes() -> Router<PaymentAppState> {
    Router::new().route("/processor", post(handle_processor_webhook))
}

/// Payer routes. `auth_middleware` is the outer layer so the user limiter
/// sees the authenticated user.
pub fn payer_routes(sessions: AuthState, limiter: RateLimiterState) -> Router<PaymentAppState> {
    Router::new()
        .route("/", post(create_payment))
        .route("/activate", post(poll_activation))
        .route("/link", post(link_guest_payment))
        .layer(from_fn_with_state(limiter, user_rate_limit_middleware))
        .layer(from_fn_with_state(sessions, auth_middleware))
}

/// Scheduler and operator routes behind the cron secret. The IP limit is
/// the outer layer so guessing the secret is throttled too.
pub fn cron_routes(
    cron_secret: CronSecretState,
    limiter: RateLimiterState,
) -> Router<PaymentAppState> {
    Router::new()
        .route("/cron/sweep", get(run_sweep))
        .route("/admin/payments/:id/revert", post(revert_payment))
        .layer(from_fn_with_state(cron_secret, cron_auth_middleware))
        .layer(from_fn_with_state(limiter, ip_rate_limit_middleware))
}

/// The whole API.
///
/// - `POST /api/webhooks/processor`
/// - `POST /api/payments`
/// - `POST /api/payments/activate?attempt=N`
/// - `POST /api/payments/link`
/// - `GET  /api/cron/sweep`
/// - `POST /api/admin/payments/:id/revert`
/// - `GET  /health`, `GET /ready`
pub fn payment_router(state: PaymentAppState, guards: RouteGuards) -> Router {
    let api = Router::new()
        .nest("/webhooks", webhook_routes())
        .nest("/payments", payer_routes(guards.sessions, guards.limiter.clone()))
        .merge(cron_routes(guards.cron_secret, guards.limiter));

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .nest("/api", api)
        .with_state(state)
}
