//! Lark open platform configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;

/// Lark app credentials and callback secrets
#[derive(Debug, Clone, Deserialize)]
pub struct LarkSettings {
    /// App ID (cli_...)
    #[serde(default)]
    pub app_id: String,

    /// App secret, exchanged for the tenant access token
    #[serde(default = "empty_secret")]
    pub app_secret: Secret<String>,

    /// Verification token carried in every callback
    #[serde(default = "empty_secret")]
    pub verification_token: Secret<String>,

    /// Encrypt key; when set, callbacks must be signed
    #[serde(default)]
    pub encrypt_key: Option<Secret<String>>,

    /// Open platform base URL
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for LarkSettings {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: empty_secret(),
            verification_token: empty_secret(),
            encrypt_key: None,
            host: default_host(),
        }
    }
}

impl LarkSettings {
    /// Encrypt key, if one is configured and non-empty
    pub fn encrypt_key(&self) -> Option<&str> {
        self.encrypt_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .filter(|k| !k.is_empty())
    }

    /// Validate Lark configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.app_id.is_empty() {
            return Err(ValidationError::MissingRequired("LARK__APP_ID"));
        }
        if self.app_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("LARK__APP_SECRET"));
        }
        if self.verification_token.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("LARK__VERIFICATION_TOKEN"));
        }

        let host = url::Url::parse(&self.host).map_err(|e| ValidationError::InvalidUrl {
            field: "LARK__HOST",
            reason: e.to_string(),
        })?;
        if production && host.scheme() != "https" {
            return Err(ValidationError::LarkHostMustBeHttps);
        }
        Ok(())
    }
}

pub(super) fn empty_secret() -> Secret<String> {
    Secret::new(String::new())
}

fn default_host() -> String {
    "https://open.feishu.cn".to_string()
}
