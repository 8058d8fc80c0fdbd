//! Player status model and `getPlayerStatus` decoding

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::metadata::decode_metadata;
use super::source::Source;
use crate::error::ProtocolError;

/// Volume level, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Volume(u8);

impl Volume {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 100;
    /// Assumed when a device omits the field
    pub const DEFAULT: Volume = Volume(50);

    /// Clamp any integer into range.
    pub fn new(level: impl Into<i64>) -> Self {
        let level = level.into().clamp(i64::from(Self::MIN), i64::from(Self::MAX));
        // In range after clamping
        Volume(level as u8)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<i64> for Volume {
    fn from(level: i64) -> Self {
        Volume::new(level)
    }
}

impl From<Volume> for u8 {
    fn from(volume: Volume) -> Self {
        volume.0
    }
}

impl std::fmt::Display for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport state of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
    /// Anything the firmware reports that is not play/pause/stop
    #[default]
    Idle,
}

impl PlaybackState {
    /// Parse the firmware `status` token. Unrecognized tokens are `Idle`.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "play" | "playing" => PlaybackState::Playing,
            "pause" | "paused" => PlaybackState::Paused,
            "stop" | "stopped" => PlaybackState::Stopped,
            _ => PlaybackState::Idle,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    /// State a play/pause toggle is expected to leave the player in
    pub fn toggled(&self) -> Self {
        match self {
            PlaybackState::Playing => PlaybackState::Paused,
            _ => PlaybackState::Playing,
        }
    }
}

/// Snapshot of what a device is doing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub source: Source,
    pub playback: PlaybackState,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub volume: Volume,
    pub muted: bool,
}

impl DeviceStatus {
    /// `"Artist - Title"`, or whichever half is known
    pub fn now_playing(&self) -> Option<String> {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => Some(format!("{} - {}", artist, title)),
            (None, Some(title)) => Some(title.clone()),
            (Some(artist), None) => Some(artist.clone()),
            (None, None) => None,
        }
    }
}

/// Field value as text; firmware sends strings but numbers are tolerated
fn field_text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a `getPlayerStatus` payload.
///
/// Tolerant of missing and unexpected fields; only a payload that is not a
/// JSON object at all is an error.
pub fn decode_status(raw: &str) -> Result<DeviceStatus, ProtocolError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ProtocolError::Decode(e.to_string()))?;
    let fields = value
        .as_object()
        .ok_or_else(|| ProtocolError::Decode("status payload is not an object".to_string()))?;

    let volume = field_text(fields, "vol")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(Volume::new)
        .unwrap_or_default();

    let muted = field_text(fields, "mute")
        .map(|m| m.trim() == "1")
        .unwrap_or(false);

    let playback = field_text(fields, "status")
        .map(|s| PlaybackState::from_token(&s))
        .unwrap_or_default();

    let source = field_text(fields, "mode")
        .map(|m| Source::from_identifier(&m))
        .unwrap_or_default();

    let metadata = |key: &str| field_text(fields, key).and_then(|raw| decode_metadata(&raw));

    Ok(DeviceStatus {
        source,
        playback,
        title: metadata("Title"),
        artist: metadata("Artist"),
        album: metadata("Album"),
        volume,
        muted,
    })
}
