//! Execution strategies for interpreted commands: add, remove, and modify as
//! delete-then-add.

use std::collections::BTreeMap;

use serde_json::json;

use crate::error::{ShowError, ShowResult};
use crate::fixtures::color::CHASE_PALETTE;
use crate::fixtures::FixtureLibrary;
use crate::interpreter::params::CHANNEL_PREFIX;
use crate::interpreter::presets::select_preset;
use crate::interpreter::repeat::{self, RepeatDefaults, RepeatMode};
use crate::interpreter::{InterpretedCommand, Operation};
use crate::models::effects::{EffectDelta, EffectKind, EffectParams, ScheduledEffect};
use crate::models::song::SongContext;
use crate::settings::EngineSettings;
use crate::storage::effects::{new_group_id, EffectStore};

#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Seconds either side of the resolved time that count as "the same" effect.
    pub tolerance: f32,
    pub defaults: RepeatDefaults,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.5,
            defaults: RepeatDefaults::default(),
        }
    }
}

impl From<&EngineSettings> for ExecuteOptions {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            tolerance: settings.modify_tolerance,
            defaults: RepeatDefaults {
                beat_sync_beats: settings.default_repeat_beats as f32,
                section_beats: settings.section_repeat_beats as f32,
                effect_duration: settings.default_effect_duration,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub delta: EffectDelta,
    pub message: String,
    /// A modify that found nothing to replace and ran as an add.
    pub degraded_to_add: bool,
    /// Fixtures left out, with the reason.
    pub skipped: Vec<String>,
}

fn number(params: &EffectParams, key: &str) -> Option<f32> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .map(|v| v as f32)
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Length of a single (non-expanded) effect.
fn base_duration(params: &EffectParams, beat: f32, defaults: &RepeatDefaults) -> f32 {
    number(params, "duration_seconds")
        .or_else(|| number(params, "duration_beats").map(|b| b * beat))
        .unwrap_or(defaults.effect_duration)
}

fn split_channels(params: &EffectParams) -> (BTreeMap<String, u8>, EffectParams) {
    let mut channels = BTreeMap::new();
    let mut rest = EffectParams::new();
    for (key, value) in params {
        match key.strip_prefix(CHANNEL_PREFIX) {
            Some(channel) => {
                if let Some(v) = value.as_f64() {
                    channels.insert(channel.to_string(), v.clamp(0.0, 255.0) as u8);
                }
            }
            None => {
                rest.insert(key.clone(), value.clone());
            }
        }
    }
    (channels, rest)
}

/// Build the effects an `add` would insert, without touching any store.
pub fn build_effects(
    cmd: &InterpretedCommand,
    library: &FixtureLibrary,
    song: &SongContext,
    options: &ExecuteOptions,
) -> ShowResult<(Vec<ScheduledEffect>, Vec<String>)> {
    if cmd.fixtures.is_empty() {
        return Err(ShowError::Resolution(format!(
            "No fixtures matched '{}'",
            cmd.text
        )));
    }

    let beat = song.beat_duration();
    let mut skipped = Vec::new();
    let mut effects = Vec::new();
    let (channels, rest) = split_channels(&cmd.params);

    if !channels.is_empty() {
        let duration = base_duration(&rest, beat, &options.defaults);
        for fixture_id in &cmd.fixtures {
            let Some(fixture) = library.get(fixture_id) else {
                skipped.push(format!("{}: unknown fixture", fixture_id));
                continue;
            };
            let own: BTreeMap<String, u8> = channels
                .iter()
                .filter(|(name, _)| fixture.config().channel(name).is_some())
                .map(|(name, value)| (name.clone(), *value))
                .collect();
            if own.is_empty() {
                skipped.push(format!("{}: none of the requested channels", fixture_id));
                continue;
            }
            effects.push(
                ScheduledEffect::new(fixture_id.clone(), EffectKind::RawChannels { channels: own }, cmd.time, duration)
                    .with_params(rest.clone()),
            );
        }
    } else {
        let choice = cmd.preset.as_ref().ok_or_else(|| {
            ShowError::Resolution(format!("No preset or channel values resolved for '{}'", cmd.text))
        })?;

        let mut keywords: Vec<&str> = Vec::new();
        if let Some(keyword) = cmd.effect_keyword.as_deref() {
            keywords.push(keyword);
        }
        if let Some(effect) = rest.get("effect").and_then(|v| v.as_str()) {
            keywords.push(effect);
        }
        keywords.push(&choice.name);
        let color = rest.get("color").and_then(|v| v.as_str());

        let mode = rest
            .get("repeat_mode")
            .and_then(|v| v.as_str())
            .and_then(RepeatMode::parse);
        let multi_color = rest.get("multi_color").and_then(|v| v.as_bool()).unwrap_or(false);
        let song_duration = song.has_duration().then_some(song.duration);
        let group_id = mode.map(|_| new_group_id());

        for (index, fixture_id) in cmd.fixtures.iter().enumerate() {
            let Some(fixture) = library.get(fixture_id) else {
                skipped.push(format!("{}: unknown fixture", fixture_id));
                continue;
            };
            // Fall back to the fixture's own capabilities when the roster-wide
            // choice does not fit this fixture
            let preset = if fixture.supports(&choice.name) {
                choice.name.clone()
            } else {
                match select_preset(&keywords, color, &fixture.capabilities()) {
                    Some(p) => p.name,
                    None => {
                        skipped.push(format!("{}: no usable preset", fixture_id));
                        continue;
                    }
                }
            };

            let Some(mode) = mode else {
                let duration = base_duration(&rest, beat, &options.defaults);
                effects.push(
                    ScheduledEffect::new(fixture_id.clone(), EffectKind::preset(&preset), cmd.time, duration)
                        .with_params(rest.clone()),
                );
                continue;
            };

            let expansion = repeat::expand(mode, cmd.time, &rest, beat, song_duration, options.defaults);
            if expansion.hits.is_empty() {
                skipped.push(format!("{}: every repeat falls after the song end", fixture_id));
                continue;
            }
            for (i, hit) in expansion.hits.iter().enumerate() {
                let mut params = rest.clone();
                params.extend(expansion.annotations.clone());
                if multi_color && preset != "chase" {
                    params.insert("color".into(), json!(CHASE_PALETTE[i % CHASE_PALETTE.len()]));
                }
                if preset == "chase" {
                    params.insert("chase_offset".into(), json!(index));
                }
                effects.push(
                    ScheduledEffect::new(fixture_id.clone(), EffectKind::preset(&preset), hit.time, hit.duration)
                        .with_params(params)
                        .with_group(group_id.clone()),
                );
            }
        }
    }

    if effects.is_empty() {
        return Err(ShowError::Resolution(format!(
            "Nothing to schedule for '{}': {}",
            cmd.text,
            skipped.join("; ")
        )));
    }
    Ok((effects, skipped))
}

fn ids_near(cmd: &InterpretedCommand, store: &EffectStore, library: &FixtureLibrary, tolerance: f32) -> Vec<String> {
    let fixtures = if cmd.fixtures.is_empty() {
        library.ids()
    } else {
        cmd.fixtures.clone()
    };
    fixtures
        .iter()
        .flat_map(|f| store.find_near(f, cmd.time, tolerance))
        .map(|e| e.id.clone())
        .collect()
}

pub fn execute(
    cmd: &InterpretedCommand,
    store: &mut EffectStore,
    library: &FixtureLibrary,
    song: &SongContext,
    options: &ExecuteOptions,
) -> ShowResult<ExecutionOutcome> {
    match cmd.operation {
        Operation::Add => {
            let (effects, skipped) = build_effects(cmd, library, song, options)?;
            let delta = store.add_many(effects)?;
            Ok(ExecutionOutcome {
                message: format!("Added {} effect(s) at {:.2}s", delta.added.len(), cmd.time),
                delta,
                degraded_to_add: false,
                skipped,
            })
        }
        Operation::Remove => {
            let ids = ids_near(cmd, store, library, options.tolerance);
            if ids.is_empty() {
                return Ok(ExecutionOutcome {
                    message: format!(
                        "No effects found within ±{:.1}s of {:.2}s",
                        options.tolerance, cmd.time
                    ),
                    delta: EffectDelta {
                        total: store.len(),
                        ..Default::default()
                    },
                    ..Default::default()
                });
            }
            let delta = store.remove_by_ids(&ids)?;
            Ok(ExecutionOutcome {
                message: format!("Removed {} effect(s) near {:.2}s", delta.removed.len(), cmd.time),
                delta,
                ..Default::default()
            })
        }
        Operation::Modify => {
            let ids = ids_near(cmd, store, library, options.tolerance);
            // Build first so a failed resolution never deletes anything
            let (effects, skipped) = build_effects(cmd, library, song, options)?;
            let degraded = ids.is_empty();
            // A failed write still changes memory, so the add runs regardless and
            // the first persistence error is reported afterwards
            let mut write_error = None;
            let removed = if degraded {
                Vec::new()
            } else {
                match store.remove_by_ids(&ids) {
                    Ok(delta) => delta.removed,
                    Err(ShowError::Persistence(reason)) => {
                        write_error = Some(ShowError::Persistence(reason));
                        Vec::new()
                    }
                    Err(err) => return Err(err),
                }
            };
            let added = match store.add_many(effects) {
                Ok(delta) => delta,
                Err(err) => return Err(write_error.unwrap_or(err)),
            };
            if let Some(err) = write_error {
                return Err(err);
            }
            let message = if degraded {
                format!(
                    "Nothing to modify near {:.2}s; added {} effect(s) instead",
                    cmd.time,
                    added.added.len()
                )
            } else {
                format!("Replaced {} effect(s) with {}", removed.len(), added.added.len())
            };
            Ok(ExecutionOutcome {
                delta: EffectDelta {
                    added: added.added,
                    removed,
                    total: added.total,
                },
                message,
                degraded_to_add: degraded,
                skipped,
            })
        }
    }
}
