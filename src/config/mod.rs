//! Application configuration
//!
//! Loaded from environment variables with the `PAYMENT_ACTIVATION` prefix;
//! nested values are separated by `__`. A `.env` file is read first when
//! present.
//!
//! ```no_run
//! use payment_activation::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod billing;
mod database;
mod error;
mod notification;
mod outbox;
mod poller;
mod processor;
mod redis;
mod server;
mod sweep;

pub use auth::AuthConfig;
pub use billing::BillingConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use notification::NotificationConfig;
pub use outbox::OutboxConfig;
pub use poller::PollerSettings;
pub use processor::ProcessorConfig;
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};
pub use sweep::SweepSettings;

use serde::Deserialize;

use crate::adapters::rate_limiter::RateLimitConfig;

/// Root configuration. Load with [`AppConfig::load()`].
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    /// Optional; shared rate limiting when set
    #[serde(default)]
    pub redis: RedisConfig,

    pub auth: AuthConfig,

    pub processor: ProcessorConfig,

    #[serde(default)]
    pub billing: BillingConfig,

    #[serde(default)]
    pub poller: PollerSettings,

    #[serde(default)]
    pub sweep: SweepSettings,

    #[serde(default)]
    pub outbox: OutboxConfig,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Read `.env` if present, then the process environment.
    ///
    /// - `PAYMENT_ACTIVATION__SERVER__PORT=8080` -> `server.port`
    /// - `PAYMENT_ACTIVATION__PROCESSOR__API_KEY=...` -> `processor.api_key`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PAYMENT_ACTIVATION")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Semantic checks, stricter in production.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let environment = self.server.environment;

        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.auth.validate(&environment)?;
        self.processor.validate(&environment)?;
        self.billing.validate()?;
        self.poller.validate()?;
        self.sweep.validate(&environment)?;
        self.outbox.validate()?;
        self.notification.validate()?;

        if environment == Environment::Production && self.redis.url().is_none() {
            return Err(ValidationError::RequiredInProduction("REDIS__URL"));
        }
        Ok(())
    }

    /// [`AppConfig::load`] followed by [`AppConfig::validate`].
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const MINIMAL: [(&str, &str); 3] = [
        (
            "PAYMENT_ACTIVATION__DATABASE__URL",
            "postgresql://test@localhost/payments",
        ),
        ("PAYMENT_ACTIVATION__AUTH__JWT_SECRET", "dev-session-secret"),
        ("PAYMENT_ACTIVATION__PROCESSOR__API_KEY", "sk_test_xxx"),
    ];

    const PRODUCTION: [(&str, &str); 5] = [
        ("PAYMENT_ACTIVATION__SERVER__ENVIRONMENT", "production"),
        (
            "PAYMENT_ACTIVATION__AUTH__JWT_SECRET",
            "0123456789abcdef0123456789abcdef",
        ),
        ("PAYMENT_ACTIVATION__PROCESSOR__WEBHOOK_SECRET", "whsec_xxx"),
        ("PAYMENT_ACTIVATION__SWEEP__CRON_SECRET", "cron_xxx"),
        ("PAYMENT_ACTIVATION__REDIS__URL", "redis://localhost:6379"),
    ];

    const EXTRA: [&str; 3] = [
        "PAYMENT_ACTIVATION__SERVER__PORT",
        "PAYMENT_ACTIVATION__SWEEP__MIN_AGE_SECS",
        "PAYMENT_ACTIVATION__PROCESSOR__PAID_STATUSES",
    ];

    fn set_vars(vars: &[(&str, &str)]) {
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in MINIMAL.iter().chain(PRODUCTION.iter()) {
            env::remove_var(key);
        }
        for key in EXTRA {
            env::remove_var(key);
        }
    }

    fn load_with(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        set_vars(&MINIMAL);
        set_vars(vars);
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn loads_minimal_environment_with_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert_eq!(config.database.url, "postgresql://test@localhost/payments");
        assert_eq!(config.processor.api_key.expose_secret(), "sk_test_xxx");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.sweep.min_age_secs, 120);
        assert_eq!(config.sweep.expire_after_secs, 3600);
        assert_eq!(config.poller.max_attempts, 10);
        assert!(config.redis.url().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn nested_overrides_are_read() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("PAYMENT_ACTIVATION__SERVER__PORT", "3000"),
            ("PAYMENT_ACTIVATION__SWEEP__MIN_AGE_SECS", "60"),
            ("PAYMENT_ACTIVATION__PROCESSOR__PAID_STATUSES", "paid"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.sweep.min_age_secs, 60);
        assert_eq!(config.processor.paid_statuses_list(), vec!["paid"]);
    }

    #[test]
    fn missing_database_url_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_vars(&MINIMAL[1..]);
        let result = AppConfig::load();
        clear_env();

        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn production_needs_every_secret_and_redis() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&PRODUCTION).unwrap();
        assert!(config.is_production());
        assert!(config.validate().is_ok());

        let without_redis = load_with(&PRODUCTION[..4]).unwrap();
        assert_eq!(
            without_redis.validate(),
            Err(ValidationError::RequiredInProduction("REDIS__URL"))
        );
    }
}
