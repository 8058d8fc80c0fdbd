//! LinkPlay device discovery library
//!
//! This crate watches the local network for streaming amplifiers announcing
//! themselves over mDNS / DNS-SD and turns those announcements into a live
//! stream of [`DiscoveryEvent`]s.
//!
//! # Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use linkplay_discovery::{Discoverer, DiscoveryEvent, DiscoveryService};
//!
//! # async fn run() {
//! let service = DiscoveryService::new();
//! let mut events = service.start();
//!
//! while let Some(event) = events.next().await {
//!     match event {
//!         DiscoveryEvent::DeviceFound { name, address, .. } => {
//!             println!("Found {} at {}", name, address);
//!         }
//!         DiscoveryEvent::DeviceLost { name } => println!("Lost {}", name),
//!         DiscoveryEvent::Error { cause } => eprintln!("Discovery failed: {}", cause),
//!     }
//! }
//!
//! service.stop();
//! # }
//! ```
//!
//! Discovery is best-effort: announcements may be missing or repeated, and
//! consumers are expected to reconcile duplicates themselves.

mod config;
mod discovery;
mod error;
mod mdns;
mod stream;

pub use config::{DiscoveryConfig, ServiceType};
pub use discovery::{Discoverer, DiscoveryService};
pub use error::{DiscoveryError, Result};
pub use mdns::{instance_name, preferred_address};
pub use stream::DiscoveryStream;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Device family, selecting both the control-protocol dialect and the
/// service type that is browsed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// LinkPlay-based streamers (WiiM Mini/Pro/Amp and friends)
    Wiim,
    /// BluOS players. Announced and tracked, but no control protocol yet.
    Bluesound,
}

impl Vendor {
    /// All known vendor families.
    pub const ALL: [Vendor; 2] = [Vendor::Wiim, Vendor::Bluesound];

    /// Short lowercase name, used in logs and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Vendor::Wiim => "wiim",
            Vendor::Bluesound => "bluesound",
        }
    }

    /// The DNS-SD service type this family advertises.
    pub fn service_type(&self) -> &'static str {
        match self {
            Vendor::Wiim => "_linkplay._tcp.local.",
            Vendor::Bluesound => "_musc._tcp.local.",
        }
    }

    /// Whether a control protocol is implemented for this family.
    pub fn is_supported(&self) -> bool {
        matches!(self, Vendor::Wiim)
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Vendor {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wiim" | "linkplay" => Ok(Vendor::Wiim),
            "bluesound" | "bluos" => Ok(Vendor::Bluesound),
            other => Err(DiscoveryError::UnknownVendor(other.to_string())),
        }
    }
}

/// Concrete, reachable network endpoint of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    /// IP address the device resolved to
    pub ip: IpAddr,
    /// HTTP port of the control API (80 on stock firmware)
    pub port: u16,
}

impl DeviceAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Base URL of the device's HTTP API, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}", SocketAddr::new(self.ip, self.port))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddr::new(self.ip, self.port))
    }
}

impl From<SocketAddr> for DeviceAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

/// Events emitted while watching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A device announced itself and its endpoint was resolved
    DeviceFound {
        /// Announced instance name; the stable identity of the device
        name: String,
        /// Resolved endpoint
        address: DeviceAddress,
        /// Device family the announcement belongs to
        vendor: Vendor,
    },
    /// A previously announced device withdrew its announcement
    DeviceLost {
        /// Same instance name that was used for the matching `DeviceFound`
        name: String,
    },
    /// The watcher failed fatally; the stream ends after this event
    Error {
        cause: DiscoveryError,
    },
}

impl DiscoveryEvent {
    /// Identity of the device this event refers to, if any.
    pub fn device_name(&self) -> Option<&str> {
        match self {
            DiscoveryEvent::DeviceFound { name, .. } | DiscoveryEvent::DeviceLost { name } => {
                Some(name)
            }
            DiscoveryEvent::Error { .. } => None,
        }
    }
}
