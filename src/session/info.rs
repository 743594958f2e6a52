//! Typed view of the session text.
//!
//! Only the fields the telemetry consumers rely on are mapped. Unknown fields are
//! ignored and missing sections default to empty, so a partial or newer session
//! document still parses.

use serde::{Deserialize, Serialize};

use crate::yaml_utils::preprocess_yaml;
use crate::{Result, TelemetryError};

/// Parsed subset of the session text.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct SessionDocument {
    pub weekend_info: WeekendInfo,
    pub session_info: SessionList,
    pub driver_info: DriverInfo,
}

/// Track and event details.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct WeekendInfo {
    /// Internal track name, e.g. `roadatlanta full`
    pub track_name: String,
    pub track_display_name: String,
    #[serde(rename = "TrackID")]
    pub track_id: Option<i32>,
    /// Length with unit, e.g. `4.08 km`
    pub track_length: String,
}

/// Sessions of the event.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct SessionList {
    pub sessions: Vec<SessionEntry>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct SessionEntry {
    pub session_num: i32,
    /// `Practice`, `Qualify`, `Race`, ...
    pub session_type: String,
    pub session_name: String,
}

/// The player's car index and the entry list.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct DriverInfo {
    pub driver_car_idx: Option<i32>,
    pub drivers: Vec<DriverEntry>,
}

#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct DriverEntry {
    pub car_idx: i32,
    pub user_name: String,
    pub car_number: String,
    pub car_screen_name: String,
}

impl SessionDocument {
    /// Clean and deserialize raw session text.
    pub fn parse(text: &str) -> Result<Self> {
        let cleaned = preprocess_yaml(text)?;
        serde_yaml_ng::from_str(&cleaned).map_err(|e| TelemetryError::parse("session document", e.to_string()))
    }

    pub fn driver(&self, car_idx: i32) -> Option<&DriverEntry> {
        self.driver_info.drivers.iter().find(|d| d.car_idx == car_idx)
    }

    /// Entry of the car the recording or live session belongs to.
    pub fn player(&self) -> Option<&DriverEntry> {
        self.driver_info.driver_car_idx.and_then(|idx| self.driver(idx))
    }

    pub fn session(&self, session_num: i32) -> Option<&SessionEntry> {
        self.session_info.sessions.iter().find(|s| s.session_num == session_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SESSION_YAML;
    use anyhow::Result;

    #[test]
    fn parses_fixture_document() -> Result<()> {
        let doc = SessionDocument::parse(SESSION_YAML)?;

        assert_eq!(doc.weekend_info.track_name, "roadatlanta full");
        assert_eq!(doc.weekend_info.track_display_name, "Michelin Raceway Road Atlanta");
        assert_eq!(doc.weekend_info.track_id, Some(127));
        assert_eq!(doc.weekend_info.track_length, "4.08 km");

        assert_eq!(doc.session_info.sessions.len(), 2);
        assert_eq!(doc.session(1).map(|s| s.session_type.as_str()), Some("Race"));
        assert!(doc.session(4).is_none());

        let player = doc.player().expect("player entry");
        assert_eq!(player.user_name, "Jordan O'Neil");
        assert_eq!(player.car_number, "7");
        assert_eq!(player.car_screen_name, "Ford Mustang GT4");
        Ok(())
    }

    #[test]
    fn missing_sections_default_to_empty() -> Result<()> {
        let doc = SessionDocument::parse("WeekendInfo:\n TrackName: lime rock\n UnknownField: 3\n")?;
        assert_eq!(doc.weekend_info.track_name, "lime rock");
        assert_eq!(doc.weekend_info.track_id, None);
        assert!(doc.session_info.sessions.is_empty());
        assert!(doc.player().is_none());
        Ok(())
    }

    #[test]
    fn control_characters_are_cleaned_first() -> Result<()> {
        let doc = SessionDocument::parse("WeekendInfo:\n TrackName: spa\x01\n")?;
        assert_eq!(doc.weekend_info.track_name, "spa");
        Ok(())
    }

    #[test]
    fn invalid_text_is_a_parse_error() {
        assert!(matches!(SessionDocument::parse(""), Err(TelemetryError::Parse { .. })));
        assert!(matches!(
            SessionDocument::parse("WeekendInfo: [unterminated"),
            Err(TelemetryError::Parse { .. })
        ));
    }
}
