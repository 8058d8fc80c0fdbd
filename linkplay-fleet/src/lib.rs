//! # LinkPlay Fleet
//!
//! Keeps an always-current model of every LinkPlay amplifier on the local
//! network and routes commands to them.
//!
//! The [`FleetCoordinator`] consumes discovery events, polls each online
//! device on a fixed interval, and applies commands optimistically so a
//! renderer sees the result before the next poll confirms it. Consumers
//! never touch the registry directly: they read [`FleetSnapshot`]s, either
//! on demand or through a watch channel.
//!
//! ```rust,no_run
//! use linkplay_fleet::{FleetConfig, FleetCoordinator};
//!
//! # async fn example() -> linkplay_fleet::Result<()> {
//! linkplay_fleet::logging::init_logging_from_env().ok();
//!
//! let fleet = FleetCoordinator::new(FleetConfig::default())?;
//! fleet.start_discovery().await;
//!
//! tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//! if let Some(device) = fleet.devices().first() {
//!     fleet.set_volume(30, device.name()).await?;
//! }
//!
//! fleet.stop_discovery().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod error;
mod model;
mod polling;
mod registry;

pub mod logging;

pub use config::FleetConfig;
pub use coordinator::FleetCoordinator;
pub use error::{FleetError, Result};
pub use model::{Device, DeviceId, FleetSnapshot};
pub use polling::PollingStats;

// Types that appear in the public API
pub use linkplay_api::{
    ClientConfig, DeviceStatus, DeviceTransport, PlaybackState, Source, Volume,
};
pub use linkplay_discovery::{DeviceAddress, Discoverer, DiscoveryConfig, DiscoveryEvent, Vendor};
