//! Processor webhook over the full HTTP stack.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use tower::ServiceExt;

use payment_activation::adapters::auth::MockSessionValidator;
use payment_activation::adapters::http::{app, HttpSettings, PaymentAppState, RouteGuards};
use payment_activation::adapters::memory::InMemoryStore;
use payment_activation::adapters::processor::MockProcessorClient;
use payment_activation::adapters::rate_limiter::InMemoryRateLimiter;
use payment_activation::application::{PaymentPorts, PaymentServices, ServiceSettings};
use payment_activation::domain::foundation::{Timestamp, UserId};
use payment_activation::domain::payment::{NewPayment, Payment, PaymentKind, PaymentStatus};
use payment_activation::ports::{AccountRepository, PaymentRepository};

const SECRET: &str = "whsec_http";

fn build() -> (InMemoryStore, Router) {
    let store = InMemoryStore::new();
    let ports = PaymentPorts {
        payments: Arc::new(store.clone()),
        store: Arc::new(store.clone()),
        accounts: Arc::new(store.clone()),
        webhook_events: Arc::new(store.clone()),
        processor: Arc::new(MockProcessorClient::new()),
    };
    let settings = ServiceSettings {
        webhook_secret: Some(SecretString::new(SECRET.to_string())),
        ..ServiceSettings::default()
    };
    let state = PaymentAppState::new(
        PaymentServices::build(ports, settings),
        Arc::new(store.clone()),
    );
    let guards = RouteGuards {
        sessions: Arc::new(MockSessionValidator::new()),
        limiter: Arc::new(InMemoryRateLimiter::with_defaults()),
        cron_secret: Arc::new(None),
    };
    let settings = HttpSettings {
        request_timeout: Some(Duration::from_secs(5)),
        cors_origins: vec!["https://app.example.com".to_string()],
    };
    (store, app(state, guards, &settings))
}

fn sign(t: i64, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(format!("{}.{}", t, body).as_bytes());
    format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes()))
}

fn webhook(body: &str, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/webhooks/processor")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_signature_is_rejected() {
    let (_, app) = build();
    let response = app.oneshot(webhook("{}", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stale_timestamp_is_rejected() {
    let (_, app) = build();
    let body = r#"{"id":"evt_old","type":"payment.succeeded","created":0,"data":{}}"#;
    let t = chrono::Utc::now().timestamp() - 3600;
    let response = app.oneshot(webhook(body, Some(sign(t, body)))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signed_garbage_is_acknowledged_unprocessed() {
    let (_, app) = build();
    let body = "not json";
    let t = chrono::Utc::now().timestamp();
    let response = app.oneshot(webhook(body, Some(sign(t, body)))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["processed"], false);
}

#[tokio::test]
async fn credits_payment_activates_over_http() {
    let (store, app) = build();
    let payment = Payment::create(
        NewPayment {
            owner: Some(UserId::new("buyer").unwrap()),
            kind: PaymentKind::Credits {
                credits_amount: 500,
            },
            amount_minor: 4999,
            currency: "eur".to_string(),
            checkout_reference: Some("chk_http".to_string()),
            affiliate_id: None,
        },
        Timestamp::now(),
    )
    .unwrap();
    store.create(&payment).await.unwrap();

    let body = serde_json::json!({
        "id": "evt_http",
        "type": "payment.succeeded",
        "created": chrono::Utc::now().timestamp(),
        "data": {"checkout_id": "chk_http", "payment_id": "pay_http"}
    })
    .to_string();
    let t = chrono::Utc::now().timestamp();

    let response = app.oneshot(webhook(&body, Some(sign(t, &body)))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(json(response).await["processed"], true);

    let stored = store.find_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
    assert_eq!(stored.processor_payment_ref.as_deref(), Some("pay_http"));
    let account = store
        .find(&UserId::new("buyer").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.credit_balance, 500);
}
