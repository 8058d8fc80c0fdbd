//! Command encoding for the `httpapi.asp` control endpoint

use std::num::NonZeroU32;

use linkplay_discovery::DeviceAddress;

use super::status::Volume;

/// Endpoint every command is sent to
pub const API_PATH: &str = "/httpapi.asp";

/// Commands understood by LinkPlay firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Read the player status
    GetStatus,
    /// Set absolute volume; out-of-range levels are clamped when encoded
    SetVolume(i32),
    SetMute(bool),
    /// Toggle between playing and paused on the device side
    TogglePlayPause,
    /// Recall a preset by its 1-based slot
    TriggerPreset(NonZeroU32),
    Next,
    Previous,
}

impl Command {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetStatus => "get_status",
            Command::SetVolume(_) => "set_volume",
            Command::SetMute(_) => "set_mute",
            Command::TogglePlayPause => "toggle_play_pause",
            Command::TriggerPreset(_) => "trigger_preset",
            Command::Next => "next",
            Command::Previous => "previous",
        }
    }

    /// Protocol command token, the value of the `command` query parameter
    pub fn token(&self) -> String {
        match self {
            Command::GetStatus => "getPlayerStatus".to_string(),
            Command::SetVolume(level) => format!("setPlayerCmd:vol:{}", Volume::new(*level)),
            Command::SetMute(muted) => format!("setPlayerCmd:mute:{}", u8::from(*muted)),
            Command::TogglePlayPause => "setPlayerCmd:onepause".to_string(),
            Command::TriggerPreset(index) => format!("MCUKeyShortClick:{}", index),
            Command::Next => "setPlayerCmd:next".to_string(),
            Command::Previous => "setPlayerCmd:prev".to_string(),
        }
    }
}

/// Encoded request, independent of which device it is sent to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub token: String,
    /// Path and query, e.g. `/httpapi.asp?command=setPlayerCmd:vol:65`
    pub path: String,
}

impl Request {
    /// Full URL against a device
    pub fn url(&self, address: &DeviceAddress) -> String {
        format!("{}{}", address.base_url(), self.path)
    }
}

/// Encode a command into its request descriptor.
pub fn encode_command(command: &Command) -> Request {
    let token = command.token();
    let path = format!("{}?command={}", API_PATH, token);
    Request { token, path }
}
