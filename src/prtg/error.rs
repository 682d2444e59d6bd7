//! Error type shared by the API client and the datasource.

use std::time::Duration;
use thiserror::Error;

/// Kind of PRTG object a name lookup was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Group,
    Device,
    Sensor,
    Channel,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Group => "group",
            ObjectKind::Device => "device",
            ObjectKind::Sensor => "sensor",
            ObjectKind::Channel => "channel",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PrtgError {
    #[error("Invalid user name or password")]
    Authentication,

    #[error("Could not connect to {url}: {message}")]
    Connection { url: String, message: String },

    #[error("Request timed out: {url}")]
    Timeout { url: String },

    #[error("Response contained no data ({url})")]
    EmptyResponse { url: String },

    #[error("Not enough monitoring data. Request: \"{request}\"")]
    InsufficientData { request: String },

    #[error("{message}")]
    Upstream { message: String, status: u16 },

    #[error("No {kind} named \"{name}\"")]
    Resolution { kind: ObjectKind, name: String },

    #[error("Invalid query: {message}")]
    InvalidQuery {
        message: String,
        errors: Vec<String>,
    },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Query cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PrtgError {
    /// Returns true if the failure happened in transport and the request can be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::Upstream { status, .. } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }

    /// Returns true if the message is meant to be shown to the dashboard user as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. }
                | Self::Upstream { .. }
                | Self::Authentication
                | Self::Resolution { .. }
                | Self::InvalidQuery { .. }
        )
    }

    /// Backoff before the given retry attempt (1-based), doubling each time
    pub fn backoff(base: Duration, attempt: u32) -> Duration {
        base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }

    pub fn connection<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Connection {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn resolution<T: Into<String>>(kind: ObjectKind, name: T) -> Self {
        Self::Resolution {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid_query<T: Into<String>>(message: T, errors: Vec<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
            errors,
        }
    }

    pub fn decode<T: Into<String>>(message: T) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

/// Result type alias for PrtgError
pub type Result<T> = std::result::Result<T, PrtgError>;
