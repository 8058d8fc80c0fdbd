//! Protocol codec
//!
//! Pure translation between typed commands/status and the LinkPlay HTTP
//! API wire form. No I/O happens here.

mod command;
mod metadata;
mod source;
mod status;

pub use command::{encode_command, Command, Request, API_PATH};
pub use metadata::decode_metadata;
pub use source::Source;
pub use status::{decode_status, DeviceStatus, PlaybackState, Volume};
