//! Error types for the load generator.

use thiserror::Error;

/// Invalid startup parameters. Fatal: the test never starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("vocabulary must contain at least one term")]
    EmptyVocabulary,

    #[error("invalid target endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("concurrency must be > 0")]
    ZeroConcurrency,

    #[error("duration_secs must be > 0")]
    ZeroDuration,

    #[error("failed to read scenario file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse scenario file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// A single failed request. Counted, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

impl RequestFailure {
    /// Short label used to group failures in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestFailure::Timeout => "timeout",
            RequestFailure::Connect(_) => "connect",
            RequestFailure::Status(_) => "status",
            RequestFailure::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for RequestFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestFailure::Timeout
        } else if err.is_connect() {
            RequestFailure::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            RequestFailure::Status(status.as_u16())
        } else {
            RequestFailure::Transport(err.to_string())
        }
    }
}

/// Marker for an iteration unwound by the test deadline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("iteration cancelled by test deadline")]
pub struct Cancelled;
