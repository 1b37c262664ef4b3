//! Lark request signature verification.
//!
//! When an encrypt key is configured, Lark signs each callback with
//! `hex(sha256(timestamp + nonce + encrypt_key + body))` and sends it in
//! `X-Lark-Signature` alongside `X-Lark-Request-Timestamp` and `X-Lark-Request-Nonce`.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Header carrying the request timestamp.
pub const TIMESTAMP_HEADER: &str = "x-lark-request-timestamp";
/// Header carrying the request nonce.
pub const NONCE_HEADER: &str = "x-lark-request-nonce";
/// Header carrying the hex signature.
pub const SIGNATURE_HEADER: &str = "x-lark-signature";

/// Signature headers extracted from a callback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub timestamp: String,
    pub nonce: String,
    pub signature: String,
}

/// Errors from signature verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature headers")]
    MissingHeaders,

    #[error("signature verification failed")]
    Mismatch,
}

/// Verifier for signed Lark callbacks.
pub struct LarkSignatureVerifier {
    encrypt_key: String,
}

impl LarkSignatureVerifier {
    pub fn new(encrypt_key: impl Into<String>) -> Self {
        Self {
            encrypt_key: encrypt_key.into(),
        }
    }

    pub fn verify(
        &self,
        headers: Option<&SignatureHeaders>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        let headers = headers.ok_or(SignatureError::MissingHeaders)?;
        let expected = self.compute_signature(&headers.timestamp, &headers.nonce, body);

        if !constant_time_compare(expected.as_bytes(), headers.signature.as_bytes()) {
            tracing::warn!(timestamp = %headers.timestamp, "Invalid Lark request signature");
            return Err(SignatureError::Mismatch);
        }
        Ok(())
    }

    fn compute_signature(&self, timestamp: &str, nonce: &str, body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(timestamp.as_bytes());
        hasher.update(nonce.as_bytes());
        hasher.update(self.encrypt_key.as_bytes());
        hasher.update(body);
        hex_encode(&hasher.finalize())
    }
}

/// Compares two byte slices without short-circuiting on the first difference.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
pub fn compute_test_signature(encrypt_key: &str, timestamp: &str, nonce: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}{}{}{}", timestamp, nonce, encrypt_key, body).as_bytes());
    hex_encode(&hasher.finalize())
}
