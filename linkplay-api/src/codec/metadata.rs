//! Track metadata text decoding
//!
//! Firmware reports `Title`, `Artist` and `Album` either as plain text or as
//! the hex digits of the UTF-8 bytes (`"48656c6c6f"` for `"Hello"`). The two
//! forms are not tagged, so a string made only of hex digits is always
//! decoded. A literal name that happens to be valid hex of valid UTF-8
//! (`"4142"`) is therefore shown decoded; strings that are not entirely hex,
//! have an odd length, or do not decode to UTF-8 pass through unchanged.

/// Decode one metadata field. Empty fields are absent.
pub fn decode_metadata(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    if raw.chars().all(|c| c.is_ascii_hexdigit()) {
        if let Some(text) = hex::decode(raw)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        {
            return (!text.is_empty()).then_some(text);
        }
    }

    Some(raw.to_string())
}
