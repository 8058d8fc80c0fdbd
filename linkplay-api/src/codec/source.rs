//! Active input source and its display mapping

use serde::{Deserialize, Serialize};

/// Input source a device is currently playing from.
///
/// Well-known identifiers map onto fixed variants; anything else is kept
/// as `Custom` with a display name synthesized from the raw identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Spotify,
    AirPlay,
    Bluetooth,
    LineIn,
    Optical,
    Coaxial,
    Network,
    Dlna,
    Usb,
    Tidal,
    Hdmi,
    /// Unrecognized source, carrying its display name
    Custom(String),
}

/// Display name used when a device reports no source at all
const UNKNOWN_SOURCE: &str = "Unknown";

/// Known identifiers, including the numeric `mode` codes LinkPlay
/// firmware reports.
const KNOWN_SOURCES: &[(&str, Source)] = &[
    ("spotify", Source::Spotify),
    ("31", Source::Spotify),
    ("airplay", Source::AirPlay),
    ("1", Source::AirPlay),
    ("bluetooth", Source::Bluetooth),
    ("bt", Source::Bluetooth),
    ("41", Source::Bluetooth),
    ("line-in", Source::LineIn),
    ("linein", Source::LineIn),
    ("line_in", Source::LineIn),
    ("aux", Source::LineIn),
    ("40", Source::LineIn),
    ("optical", Source::Optical),
    ("43", Source::Optical),
    ("coaxial", Source::Coaxial),
    ("wifi", Source::Network),
    ("network", Source::Network),
    ("10", Source::Network),
    ("dlna", Source::Dlna),
    ("2", Source::Dlna),
    ("usb", Source::Usb),
    ("udisk", Source::Usb),
    ("tidal", Source::Tidal),
    ("hdmi", Source::Hdmi),
];

impl Source {
    /// Map a raw source identifier. Never fails.
    pub fn from_identifier(raw: &str) -> Self {
        let key = raw.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Source::default();
        }

        if let Some((_, source)) = KNOWN_SOURCES.iter().find(|(id, _)| *id == key) {
            return source.clone();
        }

        // Separator-only identifiers have nothing to show
        let name = title_case(raw.trim());
        if name.is_empty() {
            Source::default()
        } else {
            Source::Custom(name)
        }
    }

    /// Human-readable name
    pub fn display_name(&self) -> &str {
        match self {
            Source::Spotify => "Spotify",
            Source::AirPlay => "AirPlay",
            Source::Bluetooth => "Bluetooth",
            Source::LineIn => "Line In",
            Source::Optical => "Optical",
            Source::Coaxial => "Coaxial",
            Source::Network => "Network",
            Source::Dlna => "DLNA",
            Source::Usb => "USB",
            Source::Tidal => "TIDAL",
            Source::Hdmi => "HDMI",
            Source::Custom(name) => name,
        }
    }

    /// Icon token for renderers
    pub fn icon(&self) -> &'static str {
        match self {
            Source::Spotify => "spotify",
            Source::AirPlay => "airplay",
            Source::Bluetooth => "bluetooth",
            Source::LineIn => "line-in",
            Source::Optical => "optical",
            Source::Coaxial => "coaxial",
            Source::Network => "wifi",
            Source::Dlna => "dlna",
            Source::Usb => "usb",
            Source::Tidal => "tidal",
            Source::Hdmi => "hdmi",
            Source::Custom(_) => "custom",
        }
    }

    /// `(display name, icon token)` pair
    pub fn display(&self) -> (&str, &'static str) {
        (self.display_name(), self.icon())
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::Custom(UNKNOWN_SOURCE.to_string())
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// `"my_radio"` -> `"My Radio"`
fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
