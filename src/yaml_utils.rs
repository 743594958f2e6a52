//! Session text cleanup.
//!
//! The simulator's session text is YAML-like but not always valid YAML: it can
//! carry stray control characters and trailing NUL padding. These helpers turn raw
//! bytes into text a YAML parser accepts, without parsing it.

use crate::{Result, TelemetryError};

/// Text up to the first NUL, or the whole block when the writer did not terminate it.
pub fn text_until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Remove control characters other than `\n`, `\r` and `\t`.
///
/// Fails with `Parse` when nothing but whitespace remains.
pub fn preprocess_yaml(yaml: &str) -> Result<String> {
    let cleaned: String = yaml
        .chars()
        .filter(|ch| !matches!(ch, '\x00'..='\x08' | '\x0B'..='\x0C' | '\x0E'..='\x1F'))
        .collect();

    if cleaned.trim().is_empty() {
        return Err(TelemetryError::parse("session text", "empty after preprocessing"));
    }
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_control_characters() {
        let result = preprocess_yaml("WeekendInfo:\n\x00\x01\x02 TrackName: test\x03").unwrap();
        assert_eq!(result, "WeekendInfo:\n TrackName: test");
    }

    #[test]
    fn keeps_valid_whitespace() {
        let result = preprocess_yaml("Key:\n\r\t  Value").unwrap();
        assert_eq!(result, "Key:\n\r\t  Value");
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(matches!(preprocess_yaml(" \x01\n"), Err(TelemetryError::Parse { .. })));
    }

    #[test]
    fn text_stops_at_nul() {
        assert_eq!(text_until_nul(b"SessionInfo:\n x: 1\0padding"), "SessionInfo:\n x: 1");
        assert_eq!(text_until_nul(b"SessionInfo:"), "SessionInfo:");
        assert_eq!(text_until_nul(b""), "");
    }
}
