//! Server configuration.

use std::time::Duration;

use pointrelay_core::rate_limit::RatePolicy;
use pointrelay_settings::RelaySettings;
use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Disconnect a connection after this many milliseconds without a command.
    pub idle_timeout_ms: u64,
    /// Minimum spacing between commands in milliseconds.
    pub request_delay_ms: u64,
    /// Violations before a forced disconnect.
    pub max_delay_violations: u32,
    /// Violations before commands are suppressed.
    pub ignore_delay_violations: u32,
    /// Delay multiplier increment per suppressed command.
    pub penalty_step: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let rate = RatePolicy::default();
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            max_message_size: 64 * 1024,
            idle_timeout_ms: 45_000,
            request_delay_ms: u64::try_from(rate.base_delay.as_millis()).unwrap_or(500),
            max_delay_violations: rate.max_violations,
            ignore_delay_violations: rate.throttle_after,
            penalty_step: rate.penalty_step,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &RelaySettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_connections: settings.server.max_connections,
            max_message_size: settings.server.max_message_size,
            idle_timeout_ms: settings.limits.idle_timeout_ms,
            request_delay_ms: settings.limits.request_delay_ms,
            max_delay_violations: settings.limits.max_delay_violations,
            ignore_delay_violations: settings.limits.ignore_delay_violations,
            penalty_step: settings.limits.penalty_step,
        }
    }

    /// Per-connection limits derived from this config.
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            rate: RatePolicy {
                base_delay: Duration::from_millis(self.request_delay_ms),
                max_violations: self.max_delay_violations,
                throttle_after: self.ignore_delay_violations,
                penalty_step: self.penalty_step,
            },
        }
    }
}

/// Limits applied to every session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Idle watchdog timeout.
    pub idle_timeout: Duration,
    /// Request throttling.
    pub rate: RatePolicy,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(45),
            rate: RatePolicy::default(),
        }
    }
}
