//! Async HTTP client for a single LinkPlay device

use std::time::Duration;

use async_trait::async_trait;
use linkplay_discovery::DeviceAddress;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::codec::{decode_status, encode_command, Command, DeviceStatus};
use crate::error::{ApiError, Result, TransportError};

/// Timeouts applied to every device exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bound on connecting and receiving response headers
    pub request_timeout: Duration,
    /// Bound on the whole exchange including the body read
    pub resource_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            resource_timeout: Duration::from_secs(6),
        }
    }
}

impl ClientConfig {
    pub fn with_timeouts(request_timeout: Duration, resource_timeout: Duration) -> Self {
        Self {
            request_timeout,
            resource_timeout,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(ApiError::InvalidConfig(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.resource_timeout < self.request_timeout {
            return Err(ApiError::InvalidConfig(
                "resource_timeout must not be shorter than request_timeout".to_string(),
            ));
        }

        Ok(())
    }
}

/// Transport seam between the fleet coordinator and the network.
///
/// `DeviceClient` is the production implementation; anything else that can
/// read a status and deliver a command can stand in for it.
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    async fn fetch_status(&self, address: &DeviceAddress) -> Result<DeviceStatus>;

    async fn send_command(&self, address: &DeviceAddress, command: &Command) -> Result<()>;
}

/// Stateless HTTP client. Each call is an independent request with no
/// retries; the connection pool is shared across devices.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl DeviceClient {
    /// Create a client with default timeouts
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET the command and return the response body
    async fn exchange(&self, address: &DeviceAddress, command: &Command) -> Result<String> {
        let url = encode_command(command).url(address);
        trace!(%url, command = command.name(), "Sending request");

        let request = async {
            let response = self.http.get(&url).send().await.map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Unreachable(format!("HTTP {}", status)));
            }

            response.text().await.map_err(transport_error)
        };

        match tokio::time::timeout(self.config.resource_timeout, request).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(e)) => {
                debug!(%address, command = command.name(), error = %e, "Request failed");
                Err(e.into())
            }
            Err(_) => {
                debug!(%address, command = command.name(), "Request exceeded resource timeout");
                Err(TransportError::Timeout.into())
            }
        }
    }
}

#[async_trait]
impl DeviceTransport for DeviceClient {
    async fn fetch_status(&self, address: &DeviceAddress) -> Result<DeviceStatus> {
        let body = self.exchange(address, &Command::GetStatus).await?;
        Ok(decode_status(&body)?)
    }

    async fn send_command(&self, address: &DeviceAddress, command: &Command) -> Result<()> {
        // Firmware answers "OK" or a status echo; neither carries information
        self.exchange(address, command).await.map(|_| ())
    }
}

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Unreachable(e.to_string())
    }
}
