//! Spark websocket URL signing.
//!
//! Spark authenticates the websocket handshake through query parameters:
//!
//! ```text
//! signature_origin = "host: {host}\ndate: {date}\nGET {path} HTTP/1.1"
//! signature        = base64(hmac_sha256(api_secret, signature_origin))
//! authorization    = base64("api_key=\"..\", algorithm=\"hmac-sha256\",
//!                            headers=\"host date request-line\", signature=\"..\"")
//! url              = ws_url?authorization=..&date=..&host=..
//! ```
//!
//! The date is RFC 1123 in GMT and must be close to the server clock, so a
//! fresh URL is built for every connect.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use url::Url;

use crate::ports::VendorError;

type HmacSha256 = Hmac<Sha256>;

/// Credentials and endpoint for signing Spark connection URLs.
#[derive(Debug, Clone)]
pub struct SparkUrlSigner {
    api_key: Secret<String>,
    api_secret: Secret<String>,
    ws_url: Url,
}

impl SparkUrlSigner {
    pub fn new(
        ws_url: &str,
        api_key: Secret<String>,
        api_secret: Secret<String>,
    ) -> Result<Self, VendorError> {
        let ws_url = Url::parse(ws_url)
            .map_err(|e| VendorError::Connect(format!("invalid websocket url {ws_url}: {e}")))?;
        if ws_url.host_str().is_none() {
            return Err(VendorError::Connect(format!("websocket url {ws_url} has no host")));
        }
        Ok(Self {
            api_key,
            api_secret,
            ws_url,
        })
    }

    /// Signed URL for a handshake at the current time.
    pub fn signed_url(&self) -> Result<Url, VendorError> {
        self.signed_url_at(Utc::now())
    }

    pub fn signed_url_at(&self, now: DateTime<Utc>) -> Result<Url, VendorError> {
        let host = self.ws_url.host_str().unwrap_or_default();
        let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let signature_origin = format!(
            "host: {}\ndate: {}\nGET {} HTTP/1.1",
            host,
            date,
            self.ws_url.path()
        );
        let mut mac = HmacSha256::new_from_slice(self.api_secret.expose_secret().as_bytes())
            .map_err(|e| VendorError::Connect(format!("invalid api secret: {e}")))?;
        mac.update(signature_origin.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        let authorization_origin = format!(
            "api_key=\"{}\", algorithm=\"hmac-sha256\", headers=\"host date request-line\", signature=\"{}\"",
            self.api_key.expose_secret(),
            signature
        );
        let authorization = BASE64.encode(authorization_origin.as_bytes());

        let mut url = self.ws_url.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("authorization", &authorization)
            .append_pair("date", &date)
            .append_pair("host", host);
        Ok(url)
    }
}
