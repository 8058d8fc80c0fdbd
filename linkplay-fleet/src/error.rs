use linkplay_api::ApiError;
use linkplay_discovery::DiscoveryError;
use thiserror::Error;

/// Errors surfaced by the fleet coordinator
#[derive(Debug, Clone, Error)]
pub enum FleetError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Preset slots are 1-based
    #[error("Invalid preset index: {0}")]
    InvalidPreset(u32),

    #[error("Device error: {0}")]
    Api(#[from] ApiError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FleetError>;
