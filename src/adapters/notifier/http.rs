//! Notifier that posts JSON to the notification service, which owns
//! templates and recipient lookup.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::payment::{PaymentActivated, PaymentReverted};
use crate::ports::Notifier;

pub struct HttpNotifier {
    url: String,
    auth_token: Option<SecretString>,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct NotificationRequest<'a, T: Serialize> {
    template: &'a str,
    user_id: Option<&'a str>,
    data: &'a T,
}

impl HttpNotifier {
    pub fn new(
        url: impl Into<String>,
        auth_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::InternalError,
                    format!("Failed to build notification client: {}", e),
                )
            })?;
        Ok(Self {
            url: url.into(),
            auth_token,
            http_client,
        })
    }

    async fn send<T: Serialize + Sync>(
        &self,
        template: &str,
        user_id: Option<&str>,
        data: &T,
    ) -> Result<(), DomainError> {
        let mut request = self.http_client.post(&self.url).json(&NotificationRequest {
            template,
            user_id,
            data,
        });
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Notification request failed: {}", e),
            )
        })?;

        if !response.status().is_success() {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Notification service returned {}", response.status()),
            )
            .with_detail("template", template));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn payment_activated(&self, event: &PaymentActivated) -> Result<(), DomainError> {
        self.send("payment_activated", Some(event.user_id.as_str()), event)
            .await
    }

    async fn payment_reverted(&self, event: &PaymentReverted) -> Result<(), DomainError> {
        self.send(
            "payment_reverted",
            event.user_id.as_ref().map(|u| u.as_str()),
            event,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(NotificationRequest {
            template: "payment_activated",
            user_id: Some("u1"),
            data: &serde_json::json!({"amount_minor": 34900}),
        })
        .unwrap();

        assert_eq!(body["template"], "payment_activated");
        assert_eq!(body["user_id"], "u1");
        assert_eq!(body["data"]["amount_minor"], 34900);
    }
}
