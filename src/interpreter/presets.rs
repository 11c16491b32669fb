//! Preset selection chain.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "interpreter.ts")]
pub enum PresetMatch {
    /// Effect keyword is one of the preset name's tokens.
    Exact,
    Substring,
    Color,
    /// Nothing in the command pointed at a preset.
    FlashDefault,
    First,
}

impl PresetMatch {
    /// Whether the command text actually selected the preset.
    pub fn is_resolved(&self) -> bool {
        matches!(self, PresetMatch::Exact | PresetMatch::Substring | PresetMatch::Color)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresetChoice {
    pub name: String,
    pub matched_by: PresetMatch,
}

fn tokens(name: &str) -> impl Iterator<Item = String> + '_ {
    name.split(|c: char| c == '_' || c == '-' || c == ' ')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Walk the chain: exact keyword token, substring, color preset, any flash
/// preset, first available. `keywords` are tried in order at each step.
pub fn select_preset(keywords: &[&str], color: Option<&str>, candidates: &[String]) -> Option<PresetChoice> {
    let choose = |name: &String, matched_by: PresetMatch| {
        Some(PresetChoice {
            name: name.clone(),
            matched_by,
        })
    };
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    for keyword in &keywords {
        if let Some(name) = candidates.iter().find(|c| c.eq_ignore_ascii_case(keyword)) {
            return choose(name, PresetMatch::Exact);
        }
        if let Some(name) = candidates.iter().find(|c| tokens(c).any(|t| t == *keyword)) {
            return choose(name, PresetMatch::Exact);
        }
    }
    for keyword in &keywords {
        if let Some(name) = candidates.iter().find(|c| c.to_lowercase().contains(keyword.as_str())) {
            return choose(name, PresetMatch::Substring);
        }
    }
    if let Some(color) = color {
        let color = color.to_lowercase().replace(' ', "_");
        if let Some(name) = candidates.iter().find(|c| c.to_lowercase().contains(&color)) {
            return choose(name, PresetMatch::Color);
        }
    }
    if let Some(name) = candidates.iter().find(|c| c.to_lowercase().contains("flash")) {
        return choose(name, PresetMatch::FlashDefault);
    }
    candidates.first().and_then(|name| choose(name, PresetMatch::First))
}
