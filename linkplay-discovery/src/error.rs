//! Error types for the discovery system.

use std::fmt;

/// Error type for discovery operations.
///
/// Represents the ways watching the network can fail. Only
/// `WatcherFailed` is fatal to a running stream; the other variants describe
/// setup problems for a single service type or bad input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The underlying mDNS watcher stopped or could not be created
    WatcherFailed(String),
    /// Browsing for one service type could not be started
    Browse {
        service_type: String,
        reason: String,
    },
    /// Configuration lists no service type to browse for
    NoServiceTypes,
    /// A vendor name that does not match any known device family
    UnknownVendor(String),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::WatcherFailed(msg) => write!(f, "Discovery watcher failed: {}", msg),
            DiscoveryError::Browse {
                service_type,
                reason,
            } => write!(f, "Failed to browse {}: {}", service_type, reason),
            DiscoveryError::NoServiceTypes => write!(f, "No service types configured"),
            DiscoveryError::UnknownVendor(name) => write!(f, "Unknown vendor: {}", name),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Convenience Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
