//! Settings errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why relay settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The settings file is not valid JSON or does not fit the settings shape.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is out of range or conflicts with another key.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Dotted camelCase key as written in the settings file.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }

    /// The offending settings key, for validation failures.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            Self::InvalidValue { key, .. } => Some(key),
            Self::Read { .. } | Self::Json(_) => None,
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
