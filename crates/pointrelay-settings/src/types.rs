//! Settings types.
//!
//! All structs use `#[serde(default)]` so a settings file only needs the keys
//! it overrides. Keys are camelCase on disk.

use pointrelay_core::logging::{DEFAULT_LEVEL, LogFormat};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Per-connection idle and rate limits.
    pub limits: LimitSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl RelaySettings {
    /// Reject combinations the session loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        if limits.idle_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "limits.idleTimeoutMs",
                "must be greater than zero",
            ));
        }
        if limits.max_delay_violations == 0 {
            return Err(SettingsError::invalid(
                "limits.maxDelayViolations",
                "must be greater than zero",
            ));
        }
        if limits.ignore_delay_violations > limits.max_delay_violations {
            return Err(SettingsError::invalid(
                "limits.ignoreDelayViolations",
                format!(
                    "{} exceeds limits.maxDelayViolations ({})",
                    limits.ignore_delay_violations, limits.max_delay_violations
                ),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(SettingsError::invalid(
                "server.maxConnections",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            max_connections: 1024,
            max_message_size: 64 * 1024,
        }
    }
}

/// Idle-timeout and request-rate limits applied to every connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitSettings {
    /// Disconnect after this long without a command.
    pub idle_timeout_ms: u64,
    /// Minimum spacing between commands.
    pub request_delay_ms: u64,
    /// Violations before a forced disconnect.
    pub max_delay_violations: u32,
    /// Violations before commands start being suppressed.
    pub ignore_delay_violations: u32,
    /// Delay multiplier increment per suppressed command.
    pub penalty_step: u32,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 45_000,
            request_delay_ms: 500,
            max_delay_violations: 10,
            ignore_delay_violations: 5,
            penalty_step: 5,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// `compact` or `json`.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            format: LogFormat::Compact,
        }
    }
}
