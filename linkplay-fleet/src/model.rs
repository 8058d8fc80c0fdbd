//! Read model: devices and fleet snapshots

use std::fmt;

use chrono::{DateTime, Utc};
use linkplay_api::DeviceStatus;
use linkplay_discovery::{DeviceAddress, Vendor};
use serde::{Deserialize, Serialize};

/// Stable identity of a device: its announced name.
///
/// IP reassignment never changes identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId::new(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A device as last known to the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub address: DeviceAddress,
    pub vendor: Vendor,
    pub status: DeviceStatus,
    /// Announced and not withdrawn. Poll failures do not clear it.
    pub online: bool,
    /// Time of the last successful status poll
    pub last_seen: Option<DateTime<Utc>>,
}

impl Device {
    /// A freshly discovered device with default status
    pub fn discovered(id: DeviceId, address: DeviceAddress, vendor: Vendor) -> Self {
        Self {
            id,
            address,
            vendor,
            status: DeviceStatus::default(),
            online: true,
            last_seen: None,
        }
    }

    pub fn name(&self) -> &str {
        self.id.as_str()
    }
}

/// Immutable view of the whole fleet, published on every change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    /// Sorted by name, case-insensitively
    pub devices: Vec<Device>,
    /// Discovery is running
    pub scanning: bool,
    /// Most recent error, if not cleared
    pub last_error: Option<String>,
}

impl FleetSnapshot {
    pub(crate) fn new(
        mut devices: Vec<Device>,
        scanning: bool,
        last_error: Option<String>,
    ) -> Self {
        devices.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.name().cmp(b.name()))
        });

        Self {
            devices,
            scanning,
            last_error,
        }
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name() == name)
    }

    pub fn online(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.online)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
