//! HTTP handlers for the payment routes.
//!
//! Thin: parse, call one application handler, shape the response.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::adapters::http::error::{ApiError, ErrorResponse};
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::payment::{
    CreatePaymentCommand, HandleWebhookCommand, LinkGuestPaymentCommand, PollActivationCommand,
    RevertPaymentCommand,
};
use crate::application::PaymentServices;
use crate::domain::foundation::{AffiliateId, DomainError, PaymentId, Timestamp};
use crate::domain::webhook::SIGNATURE_HEADER;
use crate::ports::ReadinessProbe;

use super::dto::{
    CreatePaymentRequest, LinkGuestPaymentRequest, LinkGuestPaymentResponse, PaymentResponse,
    PollActivationResponse, PollQuery, RevertPaymentRequest, RevertPaymentResponse,
    WebhookResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct PaymentAppState {
    pub services: PaymentServices,
    pub readiness: Arc<dyn ReadinessProbe>,
}

impl PaymentAppState {
    pub fn new(services: PaymentServices, readiness: Arc<dyn ReadinessProbe>) -> Self {
        Self {
            services,
            readiness,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/processor
///
/// 401 for a bad signature, 200 for everything else.
pub async fn handle_processor_webhook(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandleWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    match state.services.webhook.handle(cmd).await {
        Ok(ack) => (StatusCode::OK, Json(WebhookResponse::from(ack))).into_response(),
        Err(e) => (
            e.status_code(),
            Json(ErrorResponse::new("WEBHOOK_REJECTED", e.to_string())),
        )
            .into_response(),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Payer routes (session authenticated)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments - record a pending payment at checkout start
pub async fn create_payment(
    State(state): State<PaymentAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let affiliate_id = request
        .affiliate_id
        .filter(|a| !a.trim().is_empty())
        .map(AffiliateId::new)
        .transpose()
        .map_err(DomainError::from)?;

    let cmd = CreatePaymentCommand {
        owner: Some(user.id),
        kind: request.kind,
        amount_minor: request.amount_minor,
        currency: request.currency,
        checkout_reference: request.checkout_reference,
        affiliate_id,
    };

    let payment = state.services.create_payment.handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

/// POST /api/payments/activate?attempt=N - checkout-success poll
pub async fn poll_activation(
    State(state): State<PaymentAppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<PollQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = PollActivationCommand {
        user_id: user.id,
        attempt: query.attempt.unwrap_or(1).max(1),
    };

    let result = state.services.poller.handle(cmd).await?;
    Ok(Json(PollActivationResponse::from(result)))
}

/// POST /api/payments/link - claim a guest checkout for the signed-in user
pub async fn link_guest_payment(
    State(state): State<PaymentAppState>,
    RequireAuth(user): RequireAuth,
    Json(request): Json<LinkGuestPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.checkout_reference.trim().is_empty() {
        return Err(DomainError::validation("checkout_reference", "checkout_reference is required").into());
    }

    let cmd = LinkGuestPaymentCommand {
        user_id: user.id,
        checkout_reference: request.checkout_reference,
    };

    let result = state.services.link_guest_payment.handle(cmd).await?;
    Ok(Json(LinkGuestPaymentResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Cron and admin routes (bearer cron secret)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/cron/sweep - one sweep pass
pub async fn run_sweep(State(state): State<PaymentAppState>) -> Result<impl IntoResponse, ApiError> {
    let report = state.services.sweep.run_once(Timestamp::now()).await?;
    Ok(Json(report))
}

/// POST /api/admin/payments/:id/revert
pub async fn revert_payment(
    State(state): State<PaymentAppState>,
    Path(payment_id): Path<String>,
    Json(request): Json<RevertPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = payment_id
        .parse()
        .map_err(|_| DomainError::validation("payment_id", "payment_id must be a UUID"))?;

    let cmd = RevertPaymentCommand {
        payment_id,
        reason: request
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "admin_revert".to_string()),
    };

    let result = state.services.reverter.handle(cmd).await?;
    Ok(Json(RevertPaymentResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Operational
// ════════════════════════════════════════════════════════════════════════════════

/// GET /health - liveness
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /ready - database reachable
pub async fn ready(State(state): State<PaymentAppState>) -> Response {
    match state.readiness.check().await {
        Ok(()) => Json(serde_json::json!({ "status": "ready" })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}
