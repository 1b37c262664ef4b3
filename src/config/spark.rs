//! Spark chat API configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;
use super::lark::empty_secret;

/// Spark credentials and generation parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SparkSettings {
    #[serde(default)]
    pub app_id: String,

    #[serde(default = "empty_secret")]
    pub api_key: Secret<String>,

    #[serde(default = "empty_secret")]
    pub api_secret: Secret<String>,

    /// Chat websocket endpoint
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Model domain, e.g. `general`
    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for SparkSettings {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            api_key: empty_secret(),
            api_secret: empty_secret(),
            ws_url: default_ws_url(),
            domain: default_domain(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl SparkSettings {
    /// Validate Spark configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.app_id.is_empty() {
            return Err(ValidationError::MissingRequired("SPARK__APP_ID"));
        }
        if self.api_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("SPARK__API_KEY"));
        }
        if self.api_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("SPARK__API_SECRET"));
        }

        let url = url::Url::parse(&self.ws_url).map_err(|e| ValidationError::InvalidUrl {
            field: "SPARK__WS_URL",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ValidationError::InvalidUrl {
                field: "SPARK__WS_URL",
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }

        if !(self.temperature > 0.0 && self.temperature <= 1.0) {
            return Err(ValidationError::InvalidTemperature);
        }
        if self.max_tokens == 0 || self.max_tokens > 8192 {
            return Err(ValidationError::InvalidMaxTokens);
        }
        Ok(())
    }
}

fn default_ws_url() -> String {
    "wss://spark-api.xf-yun.com/v1.1/chat".to_string()
}

fn default_domain() -> String {
    "general".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tokens() -> u32 {
    2048
}
