//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `LARK_SPARK` prefix and
//! nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use lark_spark_bridge::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod bridge;
mod error;
mod lark;
mod server;
mod spark;

pub use bridge::BridgeConfig;
pub use error::{ConfigError, ValidationError};
pub use lark::LarkSettings;
pub use server::{Environment, ServerConfig};
pub use spark::SparkSettings;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, log filter)
    #[serde(default)]
    pub server: ServerConfig,

    /// Lark app credentials and callback secrets
    #[serde(default)]
    pub lark: LarkSettings,

    /// Spark chat API credentials and parameters
    #[serde(default)]
    pub spark: SparkSettings,

    /// Answer timeout and reconnect backoff
    #[serde(default)]
    pub bridge: BridgeConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `LARK_SPARK` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `LARK_SPARK__SERVER__PORT=3000` -> `server.port = 3000`
    /// - `LARK_SPARK__LARK__APP_ID=...` -> `lark.app_id = ...`
    /// - `LARK_SPARK__SPARK__API_SECRET=...` -> `spark.api_secret = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    /// Missing credentials are reported by [`AppConfig::validate`].
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LARK_SPARK")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load and validate in one step
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first missing or invalid field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.lark.validate(self.is_production())?;
        self.spark.validate()?;
        self.bridge.validate()?;
        Ok(())
    }

    /// Check if running in production environment
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
    use std::time::Duration;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const REQUIRED: [(&str, &str); 6] = [
        ("LARK_SPARK__LARK__APP_ID", "cli_test"),
        ("LARK_SPARK__LARK__APP_SECRET", "lark-secret"),
        ("LARK_SPARK__LARK__VERIFICATION_TOKEN", "verify-token"),
        ("LARK_SPARK__SPARK__APP_ID", "spark-app"),
        ("LARK_SPARK__SPARK__API_KEY", "spark-key"),
        ("LARK_SPARK__SPARK__API_SECRET", "spark-secret"),
    ];

    const OPTIONAL: [&str; 5] = [
        "LARK_SPARK__SERVER__PORT",
        "LARK_SPARK__SERVER__ENVIRONMENT",
        "LARK_SPARK__LARK__ENCRYPT_KEY",
        "LARK_SPARK__SPARK__TEMPERATURE",
        "LARK_SPARK__BRIDGE__ANSWER_TIMEOUT_SECS",
    ];

    fn set_minimal_env() {
        for (key, value) in REQUIRED {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in REQUIRED {
            env::remove_var(key);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.lark.app_id, "cli_test");
        assert_eq!(config.lark.verification_token.expose_secret(), "verify-token");
        assert_eq!(config.spark.api_secret.expose_secret(), "spark-secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.lark.host, "https://open.feishu.cn");
        assert_eq!(config.lark.encrypt_key(), None);
        assert_eq!(config.spark.ws_url, "wss://spark-api.xf-yun.com/v1.1/chat");
        assert_eq!(config.bridge.answer_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("LARK_SPARK__SERVER__PORT", "8088");
        env::set_var("LARK_SPARK__SERVER__ENVIRONMENT", "production");
        env::set_var("LARK_SPARK__LARK__ENCRYPT_KEY", "enc-key");
        env::set_var("LARK_SPARK__SPARK__TEMPERATURE", "0.8");
        env::set_var("LARK_SPARK__BRIDGE__ANSWER_TIMEOUT_SECS", "45");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8088);
        assert!(config.is_production());
        assert_eq!(config.lark.encrypt_key(), Some("enc-key"));
        assert!((config.spark.temperature - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.bridge.answer_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_missing_credentials_fail_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        let config = result.unwrap();
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("LARK__APP_ID"))
        );
    }

    #[test]
    fn test_missing_spark_key_is_named() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::remove_var("LARK_SPARK__SPARK__API_KEY");
        let result = AppConfig::load_validated();
        clear_env();

        match result {
            Err(ConfigError::ValidationFailed(err)) => {
                assert_eq!(err, ValidationError::MissingRequired("SPARK__API_KEY"))
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
