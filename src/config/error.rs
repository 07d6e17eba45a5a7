//! Configuration error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// A loaded value that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address {0}")]
    InvalidBindAddress(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid processor API URL")]
    InvalidProcessorUrl,

    #[error("Processor API must use HTTPS in production")]
    ProcessorUrlMustBeHttps,

    #[error("Paid status allow-list is empty")]
    EmptyPaidStatuses,

    #[error("Sweep expiry must be longer than the minimum age")]
    InvalidSweepWindow,

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("Session secret must be at least 32 bytes in production")]
    WeakSessionSecret,

    #[error("Commission rate must be between 0 and 10000 basis points")]
    InvalidCommissionRate,

    #[error("Invalid notification URL")]
    InvalidNotificationUrl,

    #[error("{0} is required in production")]
    RequiredInProduction(&'static str),
}
