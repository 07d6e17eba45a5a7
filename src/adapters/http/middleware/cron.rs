//! Static bearer secret for the cron and admin routes.
//!
//! The secret is compared in constant time. With no secret configured the
//! routes answer 401 to everyone.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::adapters::http::error::ErrorResponse;

pub type CronSecretState = Arc<Option<SecretString>>;

pub async fn cron_auth_middleware(
    State(secret): State<CronSecretState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = secret.as_ref() else {
        tracing::warn!(path = %request.uri().path(), "cron secret not configured; rejecting");
        return unauthorized();
    };

    let presented = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match presented {
        Some(token) if secrets_match(token, expected.expose_secret()) => next.run(request).await,
        _ => {
            tracing::warn!(path = %request.uri().path(), "cron request with bad secret");
            unauthorized()
        }
    }
}

fn secrets_match(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("UNAUTHORIZED", "Invalid cron secret")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(secret: Option<&str>) -> Router {
        let state: CronSecretState = Arc::new(secret.map(|s| SecretString::new(s.to_string())));
        Router::new()
            .route("/cron", get(|| async { "swept" }))
            .layer(axum::middleware::from_fn_with_state(state, cron_auth_middleware))
    }

    fn request(auth: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/cron");
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn matching_secret_passes() {
        let response = app(Some("s3cret"))
            .oneshot(request(Some("Bearer s3cret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_or_missing_secret_is_401() {
        for auth in [Some("Bearer nope"), Some("s3cret"), None] {
            let response = app(Some("s3cret")).oneshot(request(auth)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{:?}", auth);
        }
    }

    #[tokio::test]
    async fn unconfigured_secret_rejects_everyone() {
        let response = app(None)
            .oneshot(request(Some("Bearer anything")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
