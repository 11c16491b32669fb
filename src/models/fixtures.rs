use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One row of the static fixture capability table.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "fixtures.ts")]
pub struct FixtureConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub fixture_type: String,
    /// Channel name (`red`, `dim`, `pan`, ...) to 1-based DMX address.
    #[serde(default)]
    pub channels: BTreeMap<String, u16>,
    #[serde(default)]
    pub presets: Vec<PresetDefinition>,
    /// Action names this fixture accepts. Empty means every action its type implements.
    #[serde(default)]
    pub effects: Vec<String>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "fixtures.ts")]
pub struct PresetDefinition {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<PresetChannel>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "fixtures.ts")]
pub struct PresetChannel {
    /// 1-based DMX address.
    pub address: u16,
    pub value: u8,
}

/// Driver family selected from `FixtureConfig::fixture_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureType {
    Rgb,
    MovingHead,
    Generic,
}

impl FixtureType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "rgb" | "rgbw" | "par" | "parcan" | "wash" => FixtureType::Rgb,
            "moving_head" | "movinghead" | "spot" | "mover" => FixtureType::MovingHead,
            _ => FixtureType::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FixtureType::Rgb => "rgb",
            FixtureType::MovingHead => "moving_head",
            FixtureType::Generic => "generic",
        }
    }
}

impl FixtureConfig {
    pub fn kind(&self) -> FixtureType {
        FixtureType::parse(&self.fixture_type)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn channel(&self, name: &str) -> Option<u16> {
        self.channels.get(name).copied().or_else(|| {
            // "dimmer"/"intensity" are common aliases for the master dim channel
            match name {
                "dim" => self
                    .channels
                    .get("dimmer")
                    .or_else(|| self.channels.get("intensity"))
                    .copied(),
                "dimmer" | "intensity" => self.channels.get("dim").copied(),
                _ => None,
            }
        })
    }

    pub fn preset(&self, name: &str) -> Option<&PresetDefinition> {
        self.presets
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn has_rgb(&self) -> bool {
        self.channel("red").is_some() && self.channel("green").is_some() && self.channel("blue").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_type_parses_aliases() {
        assert_eq!(FixtureType::parse("RGB"), FixtureType::Rgb);
        assert_eq!(FixtureType::parse("moving head"), FixtureType::MovingHead);
        assert_eq!(FixtureType::parse("fogger"), FixtureType::Generic);
    }

    #[test]
    fn dim_channel_aliases_resolve() {
        let config: FixtureConfig = serde_json::from_str(
            r#"{"id":"p1","type":"rgb","channels":{"red":1,"green":2,"blue":3,"dimmer":4}}"#,
        )
        .expect("config");
        assert_eq!(config.channel("dim"), Some(4));
        assert!(config.has_rgb());
        assert_eq!(config.display_name(), "p1");
    }
}
