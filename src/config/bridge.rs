//! Correlation bridge and answer session timing

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Timeouts and reconnect backoff
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Longest a webhook request waits for its answer
    #[serde(default = "default_answer_timeout")]
    pub answer_timeout_secs: u64,

    /// Time allowed for the vendor handshake
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// First reconnect delay; doubles per failure
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_ms: u64,

    /// Reconnect delay cap
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            answer_timeout_secs: default_answer_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            reconnect_initial_ms: default_reconnect_initial(),
            reconnect_max_secs: default_reconnect_max(),
        }
    }
}

impl BridgeConfig {
    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_secs)
    }

    /// Validate bridge configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.answer_timeout_secs == 0 || self.answer_timeout_secs > 600 {
            return Err(ValidationError::InvalidDuration("BRIDGE__ANSWER_TIMEOUT_SECS"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ValidationError::InvalidDuration("BRIDGE__CONNECT_TIMEOUT_SECS"));
        }
        if self.reconnect_initial_ms == 0 {
            return Err(ValidationError::InvalidDuration("BRIDGE__RECONNECT_INITIAL_MS"));
        }
        if self.reconnect_max() < self.reconnect_initial() {
            return Err(ValidationError::InvalidDuration("BRIDGE__RECONNECT_MAX_SECS"));
        }
        Ok(())
    }
}

fn default_answer_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_reconnect_initial() -> u64 {
    500
}

fn default_reconnect_max() -> u64 {
    30
}
