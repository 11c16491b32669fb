//! Literal effect grammars, tried before natural language:
//!
//! ```text
//! <effect> <fixture-ref> [color] at <time> [for <duration>] [with intensity <v>]
//! add <action> to <fixture-ref> at <time> [<duration>|for <duration>]
//! ```
//!
//! A fixture ref is an id, `all`, or a type word. Anything that does not
//! resolve returns `None` so the caller can fall through.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::json;

use crate::fixtures::{color, FixtureLibrary};
use crate::interpreter::time::parse_time_literal;
use crate::models::effects::{EffectKind, EffectParams, ScheduledEffect};
use crate::models::fixtures::FixtureType;
use crate::storage::effects::new_group_id;

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralEffect {
    pub action: String,
    pub fixtures: Vec<String>,
    pub color: Option<String>,
    pub start: f32,
    pub duration: Option<f32>,
    /// 0-255
    pub intensity: Option<f32>,
}

static EFFECT_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<action>[a-z][a-z_]*)\s+(?:on\s+)?(?P<fixture>[a-z0-9_\-]+)(?:\s+(?P<color>warm white|cool white|#[0-9a-f]{6}|[a-z]+))?\s+at\s+(?P<time>\d[0-9:.]*[a-z]*)(?:\s+for\s+(?P<duration>\d[0-9:.]*[a-z]*))?(?:\s+with\s+intensity\s+(?P<intensity>\d+(?:\.\d+)?)(?P<pct>%)?)?$",
    )
    .expect("valid regex")
});

static ADD_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^add\s+(?P<action>[a-z][a-z_]*)\s+to\s+(?P<fixture>[a-z0-9_\-]+)\s+at\s+(?P<time>\d[0-9:.]*[a-z]*)(?:\s+(?:for\s+)?(?P<duration>\d[0-9:.]*[a-z]*))?$",
    )
    .expect("valid regex")
});

pub fn resolve_fixture_ref(reference: &str, library: &FixtureLibrary) -> Vec<String> {
    if library.get(reference).is_some() {
        return vec![reference.to_string()];
    }
    match reference {
        "all" | "everything" => library.ids(),
        "rgb" | "par" | "pars" | "parcan" | "parcans" => library.by_type(FixtureType::Rgb),
        "head" | "heads" | "moving_head" | "moving_heads" | "spot" | "spots" => {
            library.by_type(FixtureType::MovingHead)
        }
        _ => Vec::new(),
    }
}

fn parse_captures(caps: &Captures, library: &FixtureLibrary, bpm: f32) -> Option<LiteralEffect> {
    let action = caps.name("action")?.as_str().to_string();
    let fixtures = resolve_fixture_ref(caps.name("fixture")?.as_str(), library);
    if fixtures.is_empty() {
        return None;
    }
    if !fixtures
        .iter()
        .filter_map(|id| library.get(id))
        .any(|f| f.supports(&action))
    {
        return None;
    }

    let color = match caps.name("color").map(|m| m.as_str()) {
        Some(name) if color::lookup(name).is_some() || color::parse_hex(name).is_some() => Some(name.to_string()),
        Some(_) => return None,
        None => None,
    };
    let start = parse_time_literal(caps.name("time")?.as_str(), bpm)?;
    let duration = match caps.name("duration") {
        Some(m) => Some(parse_time_literal(m.as_str(), bpm)?),
        None => None,
    };
    let intensity = match caps.name("intensity") {
        Some(m) => {
            let value: f32 = m.as_str().parse().ok()?;
            Some(if caps.name("pct").is_some() {
                value.clamp(0.0, 100.0) * 2.55
            } else {
                value.clamp(0.0, 255.0)
            })
        }
        None => None,
    };

    Some(LiteralEffect {
        action,
        fixtures,
        color,
        start,
        duration,
        intensity,
    })
}

/// `<effect> <fixture-ref> [color] at <time> ...` on normalized text.
pub fn parse_literal_effect(text: &str, library: &FixtureLibrary, bpm: f32) -> Option<LiteralEffect> {
    let caps = EFFECT_EXPR.captures(text)?;
    parse_captures(&caps, library, bpm)
}

/// `add <action> to <fixture-ref> at <time> [duration]` on normalized text.
pub fn parse_add_command(text: &str, library: &FixtureLibrary, bpm: f32) -> Option<LiteralEffect> {
    let caps = ADD_EXPR.captures(text)?;
    parse_captures(&caps, library, bpm)
}

pub fn is_add_command(text: &str) -> bool {
    text.starts_with("add ")
}

impl LiteralEffect {
    /// One effect per fixture that supports the action. Several fixtures
    /// share a group id.
    pub fn to_effects(&self, library: &FixtureLibrary, default_duration: f32) -> Vec<ScheduledEffect> {
        let mut params = EffectParams::new();
        if let Some(color) = &self.color {
            params.insert("color".into(), json!(color));
        }
        if let Some(intensity) = self.intensity {
            params.insert("dim".into(), json!(intensity.round()));
        }
        let targets: Vec<&String> = self
            .fixtures
            .iter()
            .filter(|id| library.get(id).is_some_and(|f| f.supports(&self.action)))
            .collect();
        let group = (targets.len() > 1).then(new_group_id);
        let duration = self.duration.unwrap_or(default_duration);

        targets
            .into_iter()
            .map(|id| {
                ScheduledEffect::new(id.clone(), EffectKind::preset(&self.action), self.start, duration)
                    .with_params(params.clone())
                    .with_group(group.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::tests::two_fixture_roster;

    #[test]
    fn effect_expression() {
        let library = two_fixture_roster();
        let parsed = parse_literal_effect("pulse parcan_l blue at 1:30 for 4b with intensity 50%", &library, 120.0)
            .expect("literal");
        assert_eq!(parsed.action, "pulse");
        assert_eq!(parsed.fixtures, vec!["parcan_l".to_string()]);
        assert_eq!(parsed.color.as_deref(), Some("blue"));
        assert_eq!(parsed.start, 90.0);
        assert_eq!(parsed.duration, Some(2.0));
        assert_eq!(parsed.intensity.map(f32::round), Some(128.0));

        let effects = parsed.to_effects(&library, 1.0);
        assert_eq!(effects.len(), 1);
        assert!(effects[0].group_id.is_none());
    }

    #[test]
    fn unknown_refs_fall_through() {
        let library = two_fixture_roster();
        assert!(parse_literal_effect("flash red on parcan_l at 10s for 2s", &library, 120.0).is_none());
        assert!(parse_literal_effect("flash ghost at 10s", &library, 120.0).is_none());
        assert!(parse_literal_effect("sweep parcan_l at 10s", &library, 120.0).is_none());
        assert!(parse_literal_effect("flash parcan_l plaid at 10s", &library, 120.0).is_none());
    }

    #[test]
    fn add_grammar_and_groups() {
        let library = two_fixture_roster();
        let parsed = parse_add_command("add flash to all at 12s 2s", &library, 120.0).expect("add");
        assert_eq!(parsed.duration, Some(2.0));
        let effects = parsed.to_effects(&library, 1.0);
        assert_eq!(effects.len(), 2);
        assert!(effects[0].group_id.is_some());
        assert_eq!(effects[0].group_id, effects[1].group_id);

        let sweep = parse_add_command("add sweep to all at 0:05 for 8b", &library, 120.0).expect("add");
        let effects = sweep.to_effects(&library, 1.0);
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].fixture_id, "head_1");
        assert_eq!(effects[0].duration, 4.0);
    }
}
