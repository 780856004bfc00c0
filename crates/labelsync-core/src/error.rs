//! Error types for the label synchronization system
//!
//! Every fallible operation in the workspace returns [`Result`]. The variants
//! follow the failure taxonomy the engine acts on: per-host failures
//! (`NotFound`, `ConcurrencyConflict`, `Transport`) are collected into the
//! pass report, pass-level failures (`SourceUnavailable`, and
//! `Authentication` on any host, reported as `PassAborted`) fail the pass.

use crate::engine::SyncReport;
use thiserror::Error;

/// Result type alias for labelsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the label synchronization system
#[derive(Error, Debug)]
pub enum Error {
    /// The inventory behind a source plugin could not be reached or refused
    /// our credentials. No partial data from that source is usable.
    #[error("Source '{source_name}' unavailable: {message}")]
    SourceUnavailable {
        /// Registered name of the source plugin
        source_name: String,
        /// Error message
        message: String,
    },

    /// Host (or other object) missing from the monitoring configuration
    #[error("Not found: {0}")]
    NotFound(String),

    /// The concurrency token presented on a write was stale
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// No usable credential, or the API rejected the one we sent
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Network failure or non-2xx response
    #[error("Transport error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        /// HTTP status, when a response was received at all
        status: Option<u16>,
        /// Error message, including the response body when present
        message: String,
    },

    /// A response body that should have been JSON but was not
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Parser error
        message: String,
        /// Raw response body
        body: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors (config files, secret files, data files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A host failure that fails the whole pass; the report of every host
    /// attempted so far is kept
    #[error("Pass aborted at host {hostname}: {message}")]
    PassAborted {
        /// Host whose failure aborted the pass
        hostname: String,
        /// That host's error
        message: String,
        /// Per-host outcomes of the aborted pass
        report: Box<SyncReport>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a source-unavailable error
    pub fn source_unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a concurrency conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrencyConflict(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a transport error without an HTTP status (connect, timeout, ...)
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: msg.into(),
        }
    }

    /// Create a transport error for a non-2xx response
    pub fn http_status(status: u16, msg: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: msg.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            body: body.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Transport-class failure. Malformed responses count as transport
    /// failures for retry and reporting purposes.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::MalformedResponse { .. })
    }

    /// Whether one host failing with this error fails the whole pass
    pub fn is_pass_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Report of an aborted pass
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::PassAborted { report, .. } => Some(&**report),
            _ => None,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
