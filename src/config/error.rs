//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Cannot bind {0}: host must be an IP address")]
    InvalidSocketAddr(String),

    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("Lark host must use HTTPS in production")]
    LarkHostMustBeHttps,

    #[error("Spark temperature must be in (0, 1]")]
    InvalidTemperature,

    #[error("Spark max_tokens must be between 1 and 8192")]
    InvalidMaxTokens,

    #[error("Request body limit must be at least one byte")]
    InvalidBodyLimit,

    #[error("Invalid duration for {0}")]
    InvalidDuration(&'static str),
}
