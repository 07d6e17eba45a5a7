//! Audit key/value bag stored alongside each payment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ActivationMethod;
use crate::domain::foundation::Timestamp;

pub const ACTIVATION_METHOD: &str = "activation_method";
pub const ACTIVATED_AT: &str = "activated_at";
pub const EXPIRED_AT: &str = "expired_at";
pub const REVERTED_AT: &str = "reverted_at";
pub const REVERT_REASON: &str = "revert_reason";
pub const LINKED_AT: &str = "linked_at";
pub const GRANT_APPLIED_AT: &str = "grant_applied_at";

/// Free-form metadata recording how and when a payment changed state.
///
/// Ordered so that serialized rows diff cleanly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMetadata(BTreeMap<String, String>);

impl PaymentMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn record_activation(&mut self, method: ActivationMethod, at: Timestamp) {
        self.insert(ACTIVATION_METHOD, method.as_str());
        self.insert(ACTIVATED_AT, at.to_rfc3339());
    }

    pub fn record_expiry(&mut self, at: Timestamp) {
        self.insert(EXPIRED_AT, at.to_rfc3339());
    }

    pub fn record_reversal(&mut self, reason: &str, at: Timestamp) {
        self.insert(REVERTED_AT, at.to_rfc3339());
        self.insert(REVERT_REASON, reason);
    }

    pub fn record_link(&mut self, at: Timestamp) {
        self.insert(LINKED_AT, at.to_rfc3339());
    }

    pub fn record_grant(&mut self, at: Timestamp) {
        self.insert(GRANT_APPLIED_AT, at.to_rfc3339());
    }

    /// The method tag recorded at activation, if any.
    pub fn activation_method(&self) -> Option<ActivationMethod> {
        self.get(ACTIVATION_METHOD).and_then(|m| m.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_activation_stores_method_and_time() {
        let mut meta = PaymentMetadata::new();
        meta.record_activation(ActivationMethod::Sweep, Timestamp::now());

        assert_eq!(meta.get(ACTIVATION_METHOD), Some("sweep"));
        assert!(meta.get(ACTIVATED_AT).is_some());
        assert_eq!(meta.activation_method(), Some(ActivationMethod::Sweep));
    }

    #[test]
    fn record_reversal_keeps_reason() {
        let mut meta = PaymentMetadata::new();
        meta.record_reversal("chargeback", Timestamp::now());
        assert_eq!(meta.get(REVERT_REASON), Some("chargeback"));
    }

    #[test]
    fn serializes_as_plain_json_object() {
        let mut meta = PaymentMetadata::new();
        meta.insert("b", "2");
        meta.insert("a", "1");
        assert_eq!(serde_json::to_string(&meta).unwrap(), r#"{"a":"1","b":"2"}"#);
    }
}
