use linkplay_discovery::Vendor;
use thiserror::Error;

/// Failures of the HTTP exchange itself.
///
/// Both variants are transient: callers keep their last-known state and
/// try again on the next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not complete within its time bound
    #[error("Request timed out")]
    Timeout,

    /// Connection failure or a non-2xx response
    #[error("Device unreachable: {0}")]
    Unreachable(String),
}

/// Failures interpreting a device response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The payload is not a parseable key/value structure
    #[error("Failed to decode status payload: {0}")]
    Decode(String),
}

/// High-level API errors for LinkPlay operations
///
/// Every variant is local to a single request. Nothing here is meant to
/// bring a process down.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The device family has no control protocol implementation
    #[error("Unsupported vendor: {0}")]
    UnsupportedVendor(Vendor),

    /// Client configuration rejected by `validate()`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// Whether retrying the same request later can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;
