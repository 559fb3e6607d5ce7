//! # Configuration Management
//!
//! Centralized configuration for the netron protocol core.
//!
//! This module provides structured configuration for peer sessions and the
//! session manager, including request timeouts, payload limits, and liveness
//! settings.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Security Considerations
//! - The payload size limit (default 16 MB) bounds per-packet allocation
//!   against malicious or corrupt peers
//! - Request timeouts guarantee a remote call never hangs indefinitely

use crate::error::{NetronError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Current supported protocol version.
///
/// The action enumeration and wire layout in [`crate::protocol`] are part of
/// this version; both ends of a connection must agree on it out of band.
pub const PROTOCOL_VERSION: u8 = 1;

/// Max allowed payload size (16 MB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default deadline for a request awaiting its reply.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default capacity of the broadcast channel carrying inbound remote events.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default capacity of the outbound packet queue per session.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 1024;

/// Main configuration structure for a [`crate::Netron`] instance and the
/// peer sessions it spawns.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetronConfig {
    /// Deadline for each outbound request before it rejects with
    /// `RequestTimeout`.
    #[serde(default = "defaults::response_timeout")]
    pub response_timeout: Duration,

    /// Upper bound on a single packet's payload length.
    #[serde(default = "defaults::max_payload_size")]
    pub max_payload_size: usize,

    /// Interval between liveness pings. `None` disables the ping loop.
    #[serde(default)]
    pub ping_interval: Option<Duration>,

    /// Capacity of the per-session broadcast channel for inbound events.
    #[serde(default = "defaults::event_buffer")]
    pub event_buffer: usize,

    /// Capacity of the per-session outbound packet queue.
    #[serde(default = "defaults::outbound_queue")]
    pub outbound_queue: usize,
}

mod defaults {
    use std::time::Duration;

    pub fn response_timeout() -> Duration {
        super::DEFAULT_RESPONSE_TIMEOUT
    }

    pub fn max_payload_size() -> usize {
        super::MAX_PAYLOAD_SIZE
    }

    pub fn event_buffer() -> usize {
        super::DEFAULT_EVENT_BUFFER
    }

    pub fn outbound_queue() -> usize {
        super::DEFAULT_OUTBOUND_QUEUE
    }
}

impl Default for NetronConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_payload_size: MAX_PAYLOAD_SIZE,
            ping_interval: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }
}

impl NetronConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NetronError::ConfigError(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| NetronError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables, starting from defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(timeout) = std::env::var("NETRON_RESPONSE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.response_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(size) = std::env::var("NETRON_MAX_PAYLOAD_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.max_payload_size = val;
            }
        }

        if let Ok(interval) = std::env::var("NETRON_PING_INTERVAL_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                config.ping_interval = Some(Duration::from_millis(val));
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration.
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means the
    /// configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.response_timeout.is_zero() {
            errors.push("response_timeout must be non-zero".to_string());
        }

        if self.max_payload_size == 0 {
            errors.push("max_payload_size must be non-zero".to_string());
        }

        if self.max_payload_size > MAX_PAYLOAD_SIZE {
            errors.push(format!(
                "max_payload_size {} exceeds the protocol ceiling {}",
                self.max_payload_size, MAX_PAYLOAD_SIZE
            ));
        }

        if let Some(interval) = self.ping_interval {
            if interval >= self.response_timeout {
                errors.push(
                    "ping_interval should be shorter than response_timeout".to_string(),
                );
            }
        }

        if self.outbound_queue == 0 {
            errors.push("outbound_queue must be non-zero".to_string());
        }

        errors
    }
}
