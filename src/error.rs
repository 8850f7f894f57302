//! Error types for perimeter.
//!
//! Uses `thiserror` for ergonomic error definitions. Probe-level errors never
//! leave a probe: they are folded into that probe's result. Only
//! [`ScanError`] reaches the caller of a scan.

use std::path::PathBuf;
use thiserror::Error;

/// Failure observed inside a single probe or collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("network operation timed out")]
    NetworkTimeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("TLS negotiation failed: {0}")]
    TlsNegotiation(String),

    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
}

impl ProbeError {
    /// Classify an I/O error raised while establishing a connection.
    pub fn from_connect(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            std::io::ErrorKind::TimedOut => Self::NetworkTimeout,
            _ => Self::ConnectionFailed(err.to_string()),
        }
    }
}

/// Error type for domain parsing and validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("empty domain")]
    Empty,
    #[error("invalid domain: {0}")]
    InvalidFormat(String),
    #[error("domain too long: {0} characters (max 253)")]
    TooLong(usize),
}

/// Request-level failure of a scan.
///
/// Only input validation ends up here; network conditions never do.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid scan target: {0}")]
    InvalidTarget(#[from] DomainError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Command-line front end errors.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for a single probe attempt.
pub type AttemptResult<T> = Result<T, ProbeError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
