//! Discovery configuration
//!
//! Which service types are browsed for is configuration, not behavior: a
//! vendor family is enabled by listing its service type here.

use crate::error::{DiscoveryError, Result};
use crate::Vendor;

/// One DNS-SD service type to browse, tagged with the vendor it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceType {
    pub vendor: Vendor,
    /// Fully qualified service type, e.g. `_linkplay._tcp.local.`
    pub service_type: String,
}

impl ServiceType {
    pub fn new(vendor: Vendor, service_type: impl Into<String>) -> Self {
        Self {
            vendor,
            service_type: service_type.into(),
        }
    }

    /// The default service type advertised by a vendor family.
    pub fn for_vendor(vendor: Vendor) -> Self {
        Self::new(vendor, vendor.service_type())
    }
}

/// Configuration for the discovery service
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Service types to browse for
    /// Default: LinkPlay only
    pub service_types: Vec<ServiceType>,

    /// Prefer IPv4 addresses when a device resolves to several
    /// Default: true
    pub prefer_ipv4: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_types: vec![ServiceType::for_vendor(Vendor::Wiim)],
            prefer_ipv4: true,
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Browse for every known vendor family.
    pub fn all_vendors() -> Self {
        Self {
            service_types: Vendor::ALL
                .iter()
                .copied()
                .map(ServiceType::for_vendor)
                .collect(),
            ..Default::default()
        }
    }

    /// Add a service type to browse for.
    pub fn with_service_type(mut self, service_type: ServiceType) -> Self {
        if !self.service_types.contains(&service_type) {
            self.service_types.push(service_type);
        }
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.service_types.is_empty() {
            return Err(DiscoveryError::NoServiceTypes);
        }

        for entry in &self.service_types {
            if !entry.service_type.ends_with(".local.") {
                return Err(DiscoveryError::Browse {
                    service_type: entry.service_type.clone(),
                    reason: "service type must end with \".local.\"".to_string(),
                });
            }
        }

        Ok(())
    }
}
