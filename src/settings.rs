use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    pub data_dir: PathBuf,
    pub fps: u32,
    pub post_roll_seconds: f32,
    pub modify_tolerance: f32,
    pub default_repeat_beats: u32,
    pub section_repeat_beats: u32,
    pub default_effect_duration: f32,
    pub min_confidence: f32,
    pub drift_tolerance: f32,
    pub agent_timeout_secs: u64,
    pub auto_render: bool,
    pub dump_timeline: bool,
    pub persist: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            fps: 30,
            post_roll_seconds: 2.0,
            modify_tolerance: 0.5,
            default_repeat_beats: 8,
            section_repeat_beats: 16,
            default_effect_duration: 1.0,
            min_confidence: 0.5,
            drift_tolerance: 0.25,
            agent_timeout_secs: 30,
            auto_render: true,
            dump_timeline: true,
            persist: true,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("cuelight"))
        .unwrap_or_else(|| PathBuf::from("cuelight-data"))
}

impl EngineSettings {
    /// Build settings from a flat key/value map. Missing or unparsable keys
    /// fall back to their defaults.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: map
                .get("data_dir")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            fps: map
                .get("fps")
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.fps),
            post_roll_seconds: map
                .get("post_roll_seconds")
                .and_then(|v| v.parse::<f32>().ok())
                .map(|v| v.max(0.0))
                .unwrap_or(defaults.post_roll_seconds),
            modify_tolerance: map
                .get("modify_tolerance")
                .and_then(|v| v.parse::<f32>().ok())
                .map(|v| v.abs())
                .unwrap_or(defaults.modify_tolerance),
            default_repeat_beats: map
                .get("default_repeat_beats")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_repeat_beats),
            section_repeat_beats: map
                .get("section_repeat_beats")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.section_repeat_beats),
            default_effect_duration: map
                .get("default_effect_duration")
                .and_then(|v| v.parse::<f32>().ok())
                .map(|v| v.max(0.0))
                .unwrap_or(defaults.default_effect_duration),
            min_confidence: map
                .get("min_confidence")
                .and_then(|v| v.parse::<f32>().ok())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(defaults.min_confidence),
            drift_tolerance: map
                .get("drift_tolerance")
                .and_then(|v| v.parse::<f32>().ok())
                .map(|v| v.abs())
                .unwrap_or(defaults.drift_tolerance),
            agent_timeout_secs: map
                .get("agent_timeout_secs")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.agent_timeout_secs),
            auto_render: map
                .get("auto_render")
                .map(|v| v == "true")
                .unwrap_or(defaults.auto_render),
            dump_timeline: map
                .get("dump_timeline")
                .map(|v| v == "true")
                .unwrap_or(defaults.dump_timeline),
            persist: map
                .get("persist")
                .map(|v| v == "true")
                .unwrap_or(defaults.persist),
        }
    }

    /// Load settings from a JSON object of string (or scalar) values.
    pub fn load(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings {}: {}", path.display(), e))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| format!("Failed to parse settings {}: {}", path.display(), e))?;
        let object = value
            .as_object()
            .ok_or_else(|| format!("Settings file {} is not a JSON object", path.display()))?;

        let map = object
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect::<HashMap<_, _>>();

        Ok(Self::from_map(&map))
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        std::fs::write(path, json)
            .map_err(|e| format!("Failed to write settings {}: {}", path.display(), e))
    }

    /// Directory holding one song's effects, metadata and timeline dump.
    pub fn song_dir(&self, song_id: &str) -> PathBuf {
        let safe: String = song_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.data_dir.join(safe)
    }
}
