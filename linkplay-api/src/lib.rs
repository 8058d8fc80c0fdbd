//! # LinkPlay API
//!
//! Typed access to the LinkPlay HTTP control API used by WiiM amplifiers
//! and streamers.
//!
//! The crate has two layers:
//!
//! - [`codec`]: pure encoding of [`Command`]s into request paths and decoding
//!   of `getPlayerStatus` payloads into [`DeviceStatus`]
//! - [`client`]: the async [`DeviceClient`] that performs the HTTP exchange,
//!   behind the [`DeviceTransport`] trait
//!
//! ## Example
//!
//! ```rust,no_run
//! use linkplay_api::{Command, DeviceClient, DeviceTransport};
//! use linkplay_discovery::DeviceAddress;
//!
//! # async fn example() -> linkplay_api::Result<()> {
//! let client = DeviceClient::new()?;
//! let address = DeviceAddress::new("192.168.1.50".parse().unwrap(), 80);
//!
//! let status = client.fetch_status(&address).await?;
//! println!("{} at volume {}", status.source, status.volume);
//!
//! client.send_command(&address, &Command::SetVolume(30)).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod error;

pub use client::{ClientConfig, DeviceClient, DeviceTransport};
pub use codec::{
    decode_metadata, decode_status, encode_command, Command, DeviceStatus, PlaybackState,
    Request, Source, Volume,
};
pub use error::{ApiError, ProtocolError, Result, TransportError};
