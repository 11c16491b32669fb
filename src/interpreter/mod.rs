//! Rule-based command interpreter.
//!
//! `interpret` is a pure pipeline over normalized text: classify the
//! operation, resolve time, fixtures and parameters, pick a preset, apply
//! fallbacks and score confidence. `execute` turns the result into store
//! mutations.

pub mod execute;
pub mod fixtures;
pub mod literal;
pub mod params;
pub mod presets;
pub mod repeat;
pub mod time;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::fixtures::FixtureLibrary;
use crate::models::effects::EffectParams;
use crate::models::fixtures::FixtureType;
use crate::models::song::SongContext;

pub use execute::{build_effects, execute, ExecuteOptions, ExecutionOutcome};
pub use presets::{PresetChoice, PresetMatch};
pub use time::TimeSource;

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "interpreter.ts")]
pub enum Operation {
    Add,
    Remove,
    Modify,
}

/// Everything the interpreter reads besides the text itself.
#[derive(Clone, Copy)]
pub struct InterpretContext<'a> {
    pub song: &'a SongContext,
    pub fixtures: &'a FixtureLibrary,
    /// Candidate preset and action names, usually `FixtureLibrary::all_presets`.
    pub presets: &'a [String],
    /// Extrapolated playback position, when a clock is running.
    pub current_time: Option<f32>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct InterpretedCommand {
    pub text: String,
    pub operation: Operation,
    pub time: f32,
    pub time_source: TimeSource,
    pub fixtures: Vec<String>,
    /// False when the fixture list came from a fallback.
    pub fixtures_resolved: bool,
    pub params: EffectParams,
    pub effect_keyword: Option<String>,
    #[serde(serialize_with = "serialize_preset")]
    pub preset: Option<PresetChoice>,
    pub confidence: f32,
    pub keywords: Vec<&'static str>,
}

fn serialize_preset<S: serde::Serializer>(preset: &Option<PresetChoice>, s: S) -> Result<S::Ok, S::Error> {
    match preset {
        Some(p) => s.serialize_some(&p.name),
        None => s.serialize_none(),
    }
}

impl InterpretedCommand {
    pub fn time_resolved(&self) -> bool {
        self.time_source != TimeSource::Fallback
    }

    pub fn preset_resolved(&self) -> bool {
        self.preset.as_ref().is_some_and(|p| p.matched_by.is_resolved())
    }

    pub fn preset_name(&self) -> Option<&str> {
        self.preset.as_ref().map(|p| p.name.as_str())
    }

    pub fn summary(&self) -> String {
        format!(
            "{:?} {} on [{}] at {:.2}s (confidence {:.2})",
            self.operation,
            self.preset_name().unwrap_or("raw channels"),
            self.fixtures.join(", "),
            self.time,
            self.confidence
        )
    }
}

static LEADING_MARKERS: &[char] = &['/', '!'];

/// Lowercase, drop a leading command marker and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let trimmed = text.trim().trim_start_matches(LEADING_MARKERS);
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

static MODIFY_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:modify|change|update|replace|adjust|edit|switch|instead)\b").expect("valid regex")
});
static REMOVE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:remove|delete|erase|cancel|clear|undo|get rid of)\b").expect("valid regex")
});

/// Operation plus whether a keyword (rather than the default) decided it.
pub fn classify_operation(text: &str) -> (Operation, bool) {
    if MODIFY_WORDS.is_match(text) {
        (Operation::Modify, true)
    } else if REMOVE_WORDS.is_match(text) {
        (Operation::Remove, true)
    } else {
        (Operation::Add, false)
    }
}

pub const TIME_WEIGHT: f32 = 0.3;
pub const FIXTURE_WEIGHT: f32 = 0.3;
pub const PRESET_WEIGHT: f32 = 0.2;
pub const KEYWORD_WEIGHT: f32 = 0.05;
pub const KEYWORD_CAP: f32 = 0.2;

/// Sum of independent signals, clamped to `[0, 1]`.
pub fn confidence(time: bool, fixtures: bool, preset: bool, keywords: usize) -> f32 {
    let mut score = 0.0;
    if time {
        score += TIME_WEIGHT;
    }
    if fixtures {
        score += FIXTURE_WEIGHT;
    }
    if preset {
        score += PRESET_WEIGHT;
    }
    score += (keywords as f32 * KEYWORD_WEIGHT).min(KEYWORD_CAP);
    score.clamp(0.0, 1.0)
}

pub fn interpret(text: &str, ctx: &InterpretContext) -> InterpretedCommand {
    let text = normalize(text);
    let (operation, explicit_operation) = classify_operation(&text);

    let resolved_time = time::resolve_time(&text, ctx.song, ctx.current_time);
    let (time, time_source) = match resolved_time {
        Some(r) => (r.time.max(0.0), r.source),
        None => (ctx.current_time.unwrap_or(0.0).max(0.0), TimeSource::Fallback),
    };

    let state = params::resolve_params(&text);
    let mut keywords = state.keywords.clone();
    if explicit_operation {
        keywords.push("operation");
    }

    let resolved = fixtures::resolve_fixtures(&text, ctx.fixtures);
    let fixtures_resolved = !resolved.is_empty();
    let fixture_ids = if fixtures_resolved {
        resolved.ids
    } else if state.color().is_some() && !ctx.fixtures.by_type(FixtureType::Rgb).is_empty() {
        ctx.fixtures.by_type(FixtureType::Rgb)
    } else if state.effect().is_some() || operation == Operation::Remove {
        ctx.fixtures.ids()
    } else {
        Vec::new()
    };

    let mut preset_keywords: Vec<&str> = Vec::new();
    if let Some(keyword) = state.effect_keyword.as_deref() {
        preset_keywords.push(keyword);
    }
    if let Some(effect) = state.effect() {
        if !preset_keywords.contains(&effect) {
            preset_keywords.push(effect);
        }
    }
    let preset = presets::select_preset(&preset_keywords, state.color(), ctx.presets);

    let mut command = InterpretedCommand {
        text,
        operation,
        time,
        time_source,
        fixtures: fixture_ids,
        fixtures_resolved,
        params: state.params,
        effect_keyword: state.effect_keyword,
        preset,
        confidence: 0.0,
        keywords,
    };
    command.confidence = confidence(
        command.time_resolved(),
        command.fixtures_resolved,
        command.preset_resolved(),
        command.keywords.len(),
    );
    log::debug!("[interpreter] {}", command.summary());
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::FixtureConfig;
    use crate::models::song::Section;
    use serde_json::json;

    pub(crate) fn two_fixture_roster() -> FixtureLibrary {
        let configs: Vec<FixtureConfig> = serde_json::from_value(json!([
            {"id": "parcan_l", "name": "Par Left", "type": "rgb",
             "channels": {"red": 1, "green": 2, "blue": 3, "dim": 4}},
            {"id": "head_1", "name": "Mover", "type": "moving_head",
             "channels": {"pan": 10, "tilt": 11, "dim": 12, "strobe": 13}}
        ]))
        .expect("configs");
        FixtureLibrary::from_configs(configs)
    }

    fn song() -> SongContext {
        SongContext {
            bpm: 120.0,
            duration: 180.0,
            arrangement: vec![Section { name: "Drop".into(), start: 60.0, end: 90.0 }],
            ..Default::default()
        }
    }

    #[test]
    fn end_to_end_flash_command() {
        let library = two_fixture_roster();
        let presets = library.all_presets();
        let song = song();
        let ctx = InterpretContext { song: &song, fixtures: &library, presets: &presets, current_time: None };

        let cmd = interpret("Flash red on parcan_l at 10s for 2s", &ctx);
        assert_eq!(cmd.operation, Operation::Add);
        assert_eq!(cmd.time, 10.0);
        assert_eq!(cmd.time_source, TimeSource::Literal);
        assert_eq!(cmd.fixtures, vec!["parcan_l".to_string()]);
        assert_eq!(cmd.preset_name(), Some("flash"));
        assert!(cmd.confidence >= 0.8, "confidence {}", cmd.confidence);
    }

    #[test]
    fn operations_and_markers() {
        assert_eq!(normalize("  /Flash   RED "), "flash red");
        assert_eq!(normalize("!remove it"), "remove it");
        assert_eq!(classify_operation("remove the flash at 10s").0, Operation::Remove);
        assert_eq!(classify_operation("change the flash at 10s to blue").0, Operation::Modify);
        assert_eq!(classify_operation("flash at 10s"), (Operation::Add, false));
    }

    #[test]
    fn confidence_is_monotonic_and_capped() {
        let mut last = 0.0;
        for (time, fixtures, preset) in [
            (false, false, false),
            (true, false, false),
            (true, true, false),
            (true, true, true),
        ] {
            for keywords in 0..10 {
                let score = confidence(time, fixtures, preset, keywords);
                assert!(score >= confidence(time, fixtures, preset, keywords.saturating_sub(1)));
                assert!(score <= 1.0);
            }
            let base = confidence(time, fixtures, preset, 0);
            assert!(base >= last);
            last = base;
        }
        assert_eq!(confidence(true, true, true, 100), 1.0);
    }

    #[test]
    fn fallbacks_apply_when_unresolved() {
        let library = two_fixture_roster();
        let presets = library.all_presets();
        let song = song();
        let ctx = InterpretContext { song: &song, fixtures: &library, presets: &presets, current_time: Some(42.0) };

        let colored = interpret("make it blue", &ctx);
        assert_eq!(colored.time, 42.0);
        assert_eq!(colored.time_source, TimeSource::Fallback);
        assert_eq!(colored.fixtures, vec!["parcan_l".to_string()]);
        assert!(!colored.fixtures_resolved);
        assert!(!colored.time_resolved());

        let strobe = interpret("strobe at the drop", &ctx);
        assert_eq!(strobe.time, 60.0);
        assert_eq!(strobe.fixtures.len(), 2);
        assert_eq!(strobe.preset_name(), Some("strobe"));
        assert!(strobe.time_resolved() && strobe.preset_resolved());

        let nothing = interpret("hello there", &ctx);
        assert!(nothing.fixtures.is_empty());
        assert!(nothing.confidence < 0.5);
    }
}
