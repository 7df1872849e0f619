use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message")]
pub enum MonitorError {
    #[error("missing argument: {0}")]
    MissingArgument(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("host unreachable: {0}")]
    HostUnreachable(String),
    #[error("unknown error: {0}")]
    Unknown(String),
    /// Probe exceeded its budget. Counted as a failed check, never returned to callers.
    #[error("timeout")]
    Timeout,
}

/// Transport-level failure reported by a [`crate::Prober`].
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("request failed: {0}")]
    Other(String),
}

impl From<ProbeError> for MonitorError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::InvalidUrl(msg) | ProbeError::InvalidHeader(msg) => {
                MonitorError::InvalidArgument(msg)
            }
            ProbeError::Unreachable(msg) => MonitorError::HostUnreachable(msg),
            ProbeError::Other(msg) => MonitorError::Unknown(msg),
        }
    }
}
