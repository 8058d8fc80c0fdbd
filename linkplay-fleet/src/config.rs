//! Coordinator configuration

use std::time::Duration;

use linkplay_api::ClientConfig;
use linkplay_discovery::DiscoveryConfig;

use crate::error::{FleetError, Result};

/// Configuration for the fleet coordinator
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Time between the starts of two consecutive status polls of a device
    /// Default: 4 seconds
    pub poll_interval: Duration,

    /// Timeouts for device requests
    pub client: ClientConfig,

    /// Which device families to discover
    pub discovery: DiscoveryConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(4),
            client: ClientConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl FleetConfig {
    /// Faster polling and shorter timeouts, for small, quiet networks
    pub fn responsive() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            client: ClientConfig::with_timeouts(Duration::from_secs(2), Duration::from_secs(3)),
            ..Default::default()
        }
    }

    /// Slow polling, for large fleets or constrained networks
    pub fn relaxed() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            client: ClientConfig::with_timeouts(Duration::from_secs(8), Duration::from_secs(10)),
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(FleetError::Config(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        self.client
            .validate()
            .map_err(|e| FleetError::Config(e.to_string()))?;
        self.discovery.validate()?;

        Ok(())
    }
}
