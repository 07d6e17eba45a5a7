//! HTTP client for the processor's read API.
//!
//! Two lookups, both `GET` with the API key as basic-auth username:
//!
//! - `/v1/checkouts/{id}` - checkout session, naming the payment it produced
//! - `/v1/payments/{id}` - the payment record and its own status
//!
//! Every request carries a timeout; a timeout surfaces as
//! `ProcessorErrorCode::Timeout` so callers can tell "try later" apart
//! from "answered no".

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::ports::{
    CheckoutSnapshot, ProcessorClient, ProcessorError, ProcessorErrorCode, ProcessorPayment,
};

#[derive(Clone)]
pub struct ProcessorClientConfig {
    api_key: SecretString,
    api_base_url: String,
    request_timeout: Duration,
}

impl ProcessorClientConfig {
    pub fn new(api_key: SecretString, api_base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub struct HttpProcessorClient {
    config: ProcessorClientConfig,
    http_client: reqwest::Client,
}

impl HttpProcessorClient {
    pub fn new(config: ProcessorClientConfig) -> Result<Self, ProcessorError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProcessorError::network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: &str,
    ) -> Result<T, ProcessorError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, resource, &body));
        }

        response.json().await.map_err(|e| {
            ProcessorError::unexpected_response(format!(
                "Failed to parse {} response: {}",
                resource, e
            ))
        })
    }
}

fn map_transport_error(e: reqwest::Error) -> ProcessorError {
    if e.is_timeout() {
        ProcessorError::timeout(e.to_string())
    } else {
        ProcessorError::network(e.to_string())
    }
}

fn map_status(status: reqwest::StatusCode, resource: &str, body: &str) -> ProcessorError {
    let error = match status.as_u16() {
        404 => ProcessorError::not_found(resource),
        401 | 403 => ProcessorError::new(
            ProcessorErrorCode::AuthenticationError,
            "processor rejected API credentials",
        ),
        429 => ProcessorError::new(ProcessorErrorCode::RateLimited, "processor rate limit hit"),
        500..=599 => ProcessorError::new(
            ProcessorErrorCode::ServerError,
            format!("processor error: {}", body),
        ),
        _ => ProcessorError::unexpected_response(format!("HTTP {}: {}", status, body)),
    };
    error.with_http_status(status.as_u16())
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    id: String,
    status: String,
    #[serde(default)]
    payment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: String,
    status: String,
    #[serde(default)]
    amount: Option<i64>,
}

#[async_trait]
impl ProcessorClient for HttpProcessorClient {
    async fn get_checkout(&self, checkout_id: &str) -> Result<CheckoutSnapshot, ProcessorError> {
        let checkout: CheckoutResponse = self
            .get_json(&format!("/v1/checkouts/{}", checkout_id), "checkout")
            .await?;

        Ok(CheckoutSnapshot {
            id: checkout.id,
            status: checkout.status,
            payment_id: checkout.payment_id.filter(|p| !p.is_empty()),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError> {
        let payment: PaymentResponse = self
            .get_json(&format!("/v1/payments/{}", payment_id), "payment")
            .await?;

        Ok(ProcessorPayment {
            id: payment.id,
            status: payment.status,
            amount: payment.amount,
        })
    }
}
