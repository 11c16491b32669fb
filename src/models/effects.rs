use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

/// Free-form effect parameters (color, dim, repeat annotations, ...).
pub type EffectParams = BTreeMap<String, Value>;

/// What a scheduled effect paints: a named preset/action of the fixture, or
/// explicit channel values keyed by the fixture's channel names.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "effects.ts")]
pub enum EffectKind {
    Preset { name: String },
    RawChannels { channels: BTreeMap<String, u8> },
}

impl EffectKind {
    pub fn preset(name: impl Into<String>) -> Self {
        EffectKind::Preset { name: name.into() }
    }

    /// Preset or action name, `None` for raw channel effects.
    pub fn preset_name(&self) -> Option<&str> {
        match self {
            EffectKind::Preset { name } => Some(name),
            EffectKind::RawChannels { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            EffectKind::Preset { name } => name.clone(),
            EffectKind::RawChannels { channels } => {
                let parts: Vec<String> = channels
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                format!("raw[{}]", parts.join(","))
            }
        }
    }
}

/// An instruction to apply an effect to one fixture at a given time.
///
/// `duration == 0.0` marks an instantaneous effect painted on a single frame.
/// An empty `id` asks the store to assign one on insert.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "effects.ts")]
pub struct ScheduledEffect {
    #[serde(default)]
    pub id: String,
    pub fixture_id: String,
    pub kind: EffectKind,
    #[serde(default)]
    pub parameters: EffectParams,
    pub start_time: f32,
    #[serde(default)]
    pub duration: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl ScheduledEffect {
    pub fn new(fixture_id: impl Into<String>, kind: EffectKind, start_time: f32, duration: f32) -> Self {
        Self {
            id: String::new(),
            fixture_id: fixture_id.into(),
            kind,
            parameters: EffectParams::new(),
            start_time,
            duration,
            group_id: None,
        }
    }

    pub fn with_params(mut self, parameters: EffectParams) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_group(mut self, group_id: Option<String>) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn end_time(&self) -> f32 {
        self.start_time + self.duration.max(0.0)
    }

    /// Inclusive on both ends so instantaneous effects are active at their start.
    pub fn is_active_at(&self, time: f32) -> bool {
        self.start_time <= time && time <= self.end_time()
    }

    pub fn describe(&self) -> String {
        format!(
            "{} on {} at {:.2}s for {:.2}s",
            self.kind.label(),
            self.fixture_id,
            self.start_time,
            self.duration
        )
    }
}

/// Added/removed ids produced by one mutation of the effect collection.
#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "effects.ts")]
pub struct EffectDelta {
    pub added: Vec<ScheduledEffect>,
    pub removed: Vec<String>,
    pub total: usize,
}

impl EffectDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
