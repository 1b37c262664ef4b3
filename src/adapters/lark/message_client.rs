//! Lark message API client.
//!
//! Sends text replies through the Lark open platform IM API. Requests are
//! authorized with a tenant access token which is fetched on demand and
//! cached until one minute before it expires.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::ports::{ChatPlatform, ChatPlatformError};

const TENANT_TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
const MESSAGES_PATH: &str = "/open-apis/im/v1/messages";

/// Tokens are refreshed this long before the platform expires them.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Configuration for the Lark message client.
#[derive(Debug, Clone)]
pub struct LarkConfig {
    pub app_id: String,
    app_secret: Secret<String>,
    /// Open platform base URL (default: https://open.feishu.cn).
    pub host: String,
    pub timeout: Duration,
}

impl LarkConfig {
    pub fn new(app_id: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: Secret::new(app_secret.into()),
            host: "https://open.feishu.cn".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// `ChatPlatform` implementation for Lark.
pub struct LarkMessageClient {
    config: LarkConfig,
    http_client: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl LarkMessageClient {
    pub fn new(config: LarkConfig) -> Result<Self, ChatPlatformError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatPlatformError::Network(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
            token: RwLock::new(None),
        })
    }

    async fn tenant_access_token(&self) -> Result<String, ChatPlatformError> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.token.clone());
            }
        }

        let fetched = self.fetch_tenant_access_token().await?;
        let lifetime = Duration::from_secs(fetched.expire.max(0) as u64);
        let token = fetched.tenant_access_token;
        *slot = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });
        tracing::debug!(expire_secs = lifetime.as_secs(), "Lark tenant access token refreshed");
        Ok(token)
    }

    async fn fetch_tenant_access_token(&self) -> Result<TenantTokenResponse, ChatPlatformError> {
        let url = format!("{}{}", self.config.host, TENANT_TOKEN_PATH);
        let body = TenantTokenRequest {
            app_id: &self.config.app_id,
            app_secret: self.config.app_secret.expose_secret(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatPlatformError::Network(e.to_string()))?;

        let token: TenantTokenResponse = check_response(response, "tenant_access_token").await?;
        Ok(token)
    }

    async fn post_message(&self, request: &SendMessageRequest<'_>) -> Result<(), ChatPlatformError> {
        let url = format!("{}{}", self.config.host, MESSAGES_PATH);
        let token = self.tenant_access_token().await?;

        let response = self
            .http_client
            .post(&url)
            .query(&[("receive_id_type", "open_id")])
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatPlatformError::Network(e.to_string()))?;

        let _: ApiResponse = check_response(response, "send_message").await?;
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for LarkMessageClient {
    /// Refetches the tenant token and retries once when Lark reports it invalid.
    async fn send_text(&self, open_id: &str, content: &str) -> Result<(), ChatPlatformError> {
        let request = SendMessageRequest {
            receive_id: open_id,
            content,
            msg_type: "text",
        };

        match self.post_message(&request).await {
            Err(ChatPlatformError::Api { code, .. }) if is_token_invalid(code) => {
                tracing::info!(code, "Lark rejected tenant token, refreshing");
                *self.token.write().await = None;
                self.post_message(&request).await
            }
            other => other,
        }
    }
}

/// Business codes meaning the tenant token is invalid or expired.
fn is_token_invalid(code: i64) -> bool {
    matches!(code, 99991663 | 99991664 | 99991668)
}

async fn check_response<T>(response: reqwest::Response, operation: &str) -> Result<T, ChatPlatformError>
where
    T: serde::de::DeserializeOwned + HasApiCode,
{
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        tracing::error!(operation, status = status.as_u16(), error = %message, "Lark API request failed");
        return Err(ChatPlatformError::Http {
            status: status.as_u16(),
            message,
        });
    }

    let body: T = response
        .json()
        .await
        .map_err(|e| ChatPlatformError::Network(format!("cannot decode {operation} response: {e}")))?;

    let (code, msg) = body.api_code();
    if code != 0 {
        tracing::error!(operation, code, msg = %msg, "Lark API returned an error code");
        return Err(ChatPlatformError::Api {
            code,
            msg: msg.to_string(),
        });
    }
    Ok(body)
}

trait HasApiCode {
    fn api_code(&self) -> (i64, &str);
}

// ════════════════════════════════════════════════════════════════════════════════
// Wire types
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct TenantTokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TenantTokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    #[serde(default)]
    expire: i64,
}

impl HasApiCode for TenantTokenResponse {
    fn api_code(&self) -> (i64, &str) {
        (self.code, &self.msg)
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    receive_id: &'a str,
    content: &'a str,
    msg_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: String,
}

impl HasApiCode for ApiResponse {
    fn api_code(&self) -> (i64, &str) {
        (self.code, &self.msg)
    }
}
