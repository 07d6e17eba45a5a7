//! HMAC-signed session token validation.
//!
//! The session provider shares a signing secret with this service. Tokens are
//! HS256 JWTs carrying the user id in `sub`; issuer, audience and expiry are
//! all checked before a user is produced.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};
use crate::ports::SessionValidator;

/// Settings for `JwtSessionValidator`.
#[derive(Clone)]
pub struct JwtValidatorConfig {
    pub secret: SecretString,
    pub issuer: String,
    pub audience: String,
}

impl JwtValidatorConfig {
    pub fn new(
        secret: SecretString,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            secret,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iss: String,
    exp: i64,
    #[serde(default)]
    email: Option<String>,
}

/// Validates HS256 session tokens against a shared secret.
pub struct JwtSessionValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl JwtSessionValidator {
    pub fn new(config: JwtValidatorConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iss", "sub", "aud"]);

        Self {
            decoding_key: DecodingKey::from_secret(config.secret.expose_secret().as_bytes()),
            validation,
            issuer: config.issuer,
        }
    }
}

#[async_trait]
impl SessionValidator for JwtSessionValidator {
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::debug!("Session token expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                    tracing::warn!(error = %e, "Session token issued for another service");
                    AuthError::InvalidToken
                }
                _ => {
                    tracing::debug!(error = %e, "Session token rejected");
                    AuthError::InvalidToken
                }
            })?;

        let claims = data.claims;
        let user_id = UserId::new(&claims.sub).map_err(|_| {
            tracing::warn!("Session token has blank subject");
            AuthError::InvalidToken
        })?;

        Ok(AuthenticatedUser::new(user_id, claims.email))
    }
}

impl std::fmt::Debug for JwtSessionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSessionValidator")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "session-signing-secret";

    fn validator() -> JwtSessionValidator {
        JwtSessionValidator::new(JwtValidatorConfig::new(
            SecretString::new(SECRET.to_string()),
            "https://auth.example.test",
            "payment-activation",
        ))
    }

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[tokio::test]
    async fn accepts_well_formed_token() {
        let jwt = token(
            json!({
                "sub": "user-1",
                "iss": "https://auth.example.test",
                "aud": "payment-activation",
                "exp": future_exp(),
                "email": "user@example.test",
            }),
            SECRET,
        );

        let user = validator().validate(&jwt).await.unwrap();
        assert_eq!(user.id.as_str(), "user-1");
        assert_eq!(user.email.as_deref(), Some("user@example.test"));
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let jwt = token(
            json!({
                "sub": "user-1",
                "iss": "https://auth.example.test",
                "aud": "payment-activation",
                "exp": future_exp(),
            }),
            "other-secret",
        );

        assert_eq!(validator().validate(&jwt).await, Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn rejects_foreign_audience() {
        let jwt = token(
            json!({
                "sub": "user-1",
                "iss": "https://auth.example.test",
                "aud": "some-other-api",
                "exp": future_exp(),
            }),
            SECRET,
        );

        assert_eq!(validator().validate(&jwt).await, Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn expired_token_maps_to_token_expired() {
        let jwt = token(
            json!({
                "sub": "user-1",
                "iss": "https://auth.example.test",
                "aud": "payment-activation",
                "exp": chrono::Utc::now().timestamp() - 3600,
            }),
            SECRET,
        );

        assert_eq!(validator().validate(&jwt).await, Err(AuthError::TokenExpired));
    }

    #[tokio::test]
    async fn garbage_is_invalid() {
        assert_eq!(
            validator().validate("not-a-jwt").await,
            Err(AuthError::InvalidToken)
        );
    }
}
