//! Effect-parameter resolution as an ordered rule table.
//!
//! Each rule inspects the normalized command text and may write into the
//! shared [`ParamState`]. Order matters: later rules see what earlier rules
//! set (colors only become raw channels when a channel token was found,
//! intensity tiers never override an explicit dim).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::fixtures::color;
use crate::fixtures::engine::degrees_to_dmx;
use crate::models::effects::EffectParams;

pub const CHANNEL_PREFIX: &str = "channel_";

/// Parameters extracted from one command, plus the effect keyword that drives
/// preset selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamState {
    pub params: EffectParams,
    /// Literal effect word used in the command ("strobe", "pulse", ...).
    pub effect_keyword: Option<String>,
    /// Rules that fired, in order.
    pub keywords: Vec<&'static str>,
}

impl ParamState {
    fn set(&mut self, key: &str, value: Value) {
        self.params.insert(key.to_string(), value);
    }

    fn set_if_unset(&mut self, key: &str, value: Value) {
        self.params.entry(key.to_string()).or_insert(value);
    }

    fn hit(&mut self, rule: &'static str) {
        if !self.keywords.contains(&rule) {
            self.keywords.push(rule);
        }
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    pub fn num_param(&self, key: &str) -> Option<f32> {
        self.params.get(key).and_then(|v| v.as_f64()).map(|v| v as f32)
    }

    pub fn repeat_mode(&self) -> Option<&str> {
        self.str_param("repeat_mode")
    }

    pub fn effect(&self) -> Option<&str> {
        self.str_param("effect")
    }

    pub fn color(&self) -> Option<&str> {
        self.str_param("color")
    }

    pub fn has_channels(&self) -> bool {
        self.params.keys().any(|k| k.starts_with(CHANNEL_PREFIX))
    }
}

struct ParamRule {
    name: &'static str,
    apply: fn(&str, &mut ParamState),
}

/// Evaluated top to bottom.
static PARAM_RULES: &[ParamRule] = &[
    ParamRule { name: "channel", apply: channel_tokens },
    ParamRule { name: "color", apply: color_rule },
    ParamRule { name: "position", apply: position_rule },
    ParamRule { name: "duration", apply: duration_rule },
    ParamRule { name: "continuous", apply: continuous_rule },
    ParamRule { name: "intensity_tier", apply: intensity_tier_rule },
    ParamRule { name: "strobe_speed", apply: strobe_speed_rule },
    ParamRule { name: "effect", apply: effect_type_rule },
    ParamRule { name: "intensity", apply: explicit_intensity_rule },
];

pub fn resolve_params(text: &str) -> ParamState {
    let mut state = ParamState::default();
    for rule in PARAM_RULES {
        let before = state.params.len();
        (rule.apply)(text, &mut state);
        if state.params.len() != before {
            log::trace!("[interpreter] rule {} -> {} params", rule.name, state.params.len());
        }
    }
    log::debug!(
        "[interpreter] params {:?} keywords {:?} ({} rules)",
        state.params,
        state.keywords,
        PARAM_RULES.len()
    );
    state
}

fn number(raw: &str) -> Option<f32> {
    raw.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn percent_to_dmx(value: f32) -> f32 {
    (value.clamp(0.0, 100.0) * 2.55).round()
}

// -----------------------------------------------------------------------------
// Rules
// -----------------------------------------------------------------------------

static CHANNEL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(red|green|blue|white|dim|dimmer|strobe|pan|tilt)\s*([=:])?\s*(\d+(?:\.\d+)?)\s*(%|°|deg\b|degrees\b)?",
    )
    .expect("valid regex")
});

/// `red=200`, `dim: 50%`, `blue 40%`. Degree values are left to the position rule.
fn channel_tokens(text: &str, state: &mut ParamState) {
    for caps in CHANNEL_TOKEN.captures_iter(text) {
        let separator = caps.get(2).is_some();
        let suffix = caps.get(4).map(|m| m.as_str());
        let percent = suffix == Some("%");
        if suffix.is_some() && !percent {
            continue;
        }
        if !separator && !percent {
            continue;
        }
        let Some(value) = number(&caps[3]) else { continue };
        let value = if percent { percent_to_dmx(value) } else { value.clamp(0.0, 255.0).round() };
        let channel = match &caps[1] {
            "dimmer" => "dim",
            other => other,
        };
        state.set(&format!("{}{}", CHANNEL_PREFIX, channel), json!(value as u8));
        state.hit("channel");
    }
}

fn color_rule(text: &str, state: &mut ParamState) {
    let Some(name) = color::find_in_text(text) else { return };
    state.set("color", json!(name));
    state.hit("color");
    if !state.has_channels() {
        return;
    }
    if let Some(rgb) = color::lookup(name) {
        for (channel, value) in ["red", "green", "blue"].iter().zip(rgb) {
            state.set_if_unset(&format!("{}{}", CHANNEL_PREFIX, channel), json!(value));
        }
    }
}

static POSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(pan|tilt)\s*(?:=|:|to)?\s*(-?\d+(?:\.\d+)?)\s*(?:°|deg\b|degrees\b)").expect("valid regex")
});

fn position_rule(text: &str, state: &mut ParamState) {
    for caps in POSITION.captures_iter(text) {
        let Some(degrees) = number(&caps[2]) else { continue };
        let axis = &caps[1];
        let value = degrees_to_dmx(degrees);
        state.set(axis, json!(value));
        state.set(&format!("{}_deg", axis), json!(degrees));
        if state.has_channels() {
            state.set(&format!("{}{}", CHANNEL_PREFIX, axis), json!(value as u8));
        }
        state.hit("position");
    }
}

static FOR_BEATS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:for|lasting)\s+(\d+(?:\.\d+)?)\s*(?:beats?|b)\b").expect("valid regex"));
static FOR_SECONDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:for|lasting)\s+(\d+(?:\.\d+)?)\s*(?:seconds?|secs?|s)\b").expect("valid regex")
});
static EVERY_N_BEATS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bevery\s+(\d+(?:\.\d+)?)\s*beats?\b").expect("valid regex"));
static EVERY_OTHER_BEAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bevery\s+other\s+beat\b").expect("valid regex"));
static EVERY_BEAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bevery\s+(?:single\s+)?beat\b|\bon every beat\b").expect("valid regex"));
static DURING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:during|throughout)\b").expect("valid regex"));

fn duration_rule(text: &str, state: &mut ParamState) {
    if let Some(caps) = FOR_BEATS.captures(text) {
        if let Some(beats) = number(&caps[1]) {
            state.set("duration_beats", json!(beats));
            state.set("repeat_mode", json!("duration"));
            state.hit("duration");
        }
    } else if let Some(caps) = FOR_SECONDS.captures(text) {
        if let Some(seconds) = number(&caps[1]) {
            state.set("duration_seconds", json!(seconds));
            state.set("repeat_mode", json!("duration"));
            state.hit("duration");
        }
    }

    let interval = if let Some(caps) = EVERY_N_BEATS.captures(text) {
        number(&caps[1]).filter(|v| *v > 0.0)
    } else if EVERY_OTHER_BEAT.is_match(text) {
        Some(2.0)
    } else if EVERY_BEAT.is_match(text) {
        Some(1.0)
    } else {
        None
    };
    if let Some(interval) = interval {
        state.set("beat_interval", json!(interval));
        state.set_if_unset("repeat_mode", json!("interval"));
        state.hit("interval");
    }

    if DURING.is_match(text) {
        state.set_if_unset("repeat_mode", json!("section"));
        state.hit("section");
    }
}

static CONTINUOUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:repeatedly|continuously|constantly|nonstop|non-stop|on loop|looping)\b").expect("valid regex")
});

fn continuous_rule(text: &str, state: &mut ParamState) {
    if CONTINUOUS.is_match(text) {
        state.set_if_unset("repeat_mode", json!("continuous"));
        state.hit("continuous");
    }
}

static TIERS: Lazy<Vec<(Regex, u8)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"\b(?:bright|brightly|intense|full|max|maximum)\b").expect("valid regex"), 255),
        (Regex::new(r"\b(?:dim|dimly|low|soft|softly|gentle|gently|subtle)\b").expect("valid regex"), 77),
        (Regex::new(r"\b(?:medium|normal|half)\b").expect("valid regex"), 153),
    ]
});

fn intensity_tier_rule(text: &str, state: &mut ParamState) {
    if state.params.contains_key("dim") || state.params.contains_key("channel_dim") {
        return;
    }
    if let Some((_, value)) = TIERS.iter().find(|(re, _)| re.is_match(text)) {
        state.set("dim", json!(*value));
        state.hit("intensity_tier");
    }
}

static STROBE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bstrob(?:e|es|ing)\b").expect("valid regex"));
static STROBE_SPEEDS: Lazy<Vec<(Regex, &'static str, u8)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"\b(?:fast|rapid|rapidly|quick|quickly|frantic)\b").expect("valid regex"), "fast", 230),
        (Regex::new(r"\b(?:slow|slowly|lazy)\b").expect("valid regex"), "slow", 60),
        (Regex::new(r"\b(?:medium|moderate|steady)\b").expect("valid regex"), "medium", 140),
    ]
});

fn strobe_speed_rule(text: &str, state: &mut ParamState) {
    if !STROBE_WORD.is_match(text) || state.params.contains_key("channel_strobe") {
        return;
    }
    if let Some((_, speed, value)) = STROBE_SPEEDS.iter().find(|(re, _, _)| re.is_match(text)) {
        state.set("strobe", json!(*value));
        state.set("strobe_speed", json!(*speed));
        state.hit("strobe_speed");
    }
}

/// One entry of the effect classification table. `effect` is the canonical
/// type, `default_mode` applies only when no repeat mode was set.
struct EffectRule {
    pattern: &'static str,
    effect: &'static str,
    keyword: Option<&'static str>,
    variant: Option<&'static str>,
    multi_color: bool,
    default_mode: Option<&'static str>,
    force_mode: bool,
}

static EFFECT_RULES: &[EffectRule] = &[
    EffectRule {
        pattern: r"\bmulti[- ]?colou?r(?:ed)?\s+(?:strob(?:e|es|ing)|flash(?:es)?)\b",
        effect: "flash",
        keyword: Some("flash"),
        variant: None,
        multi_color: true,
        default_mode: Some("beat_sync"),
        force_mode: true,
    },
    EffectRule {
        pattern: r"\bpuls(?:e|es|ing|ate|ating)\b",
        effect: "flash",
        keyword: Some("pulse"),
        variant: Some("pulse"),
        multi_color: false,
        default_mode: None,
        force_mode: false,
    },
    EffectRule {
        pattern: r"\b(flash|strobe|blink)(?:es|s|ing|ed)?\b",
        effect: "flash",
        keyword: None,
        variant: None,
        multi_color: false,
        default_mode: Some("beat_sync"),
        force_mode: false,
    },
    EffectRule {
        pattern: r"\b(?:fade|fades|fading|transition|transitions|crossfade)\b",
        effect: "fade",
        keyword: Some("fade"),
        variant: None,
        multi_color: false,
        default_mode: None,
        force_mode: false,
    },
    EffectRule {
        pattern: r"\b(?:chase|chases|chasing|sequence|sequences)\b",
        effect: "chase",
        keyword: Some("chase"),
        variant: None,
        multi_color: false,
        default_mode: Some("continuous"),
        force_mode: false,
    },
    EffectRule {
        pattern: r"\bmulti[- ]?colou?r(?:ed)?\b|\brainbow\b",
        effect: "chase",
        keyword: Some("chase"),
        variant: None,
        multi_color: true,
        default_mode: Some("continuous"),
        force_mode: false,
    },
    EffectRule {
        pattern: r"\b(?:sweep|sweeps|sweeping)\b",
        effect: "sweep",
        keyword: Some("sweep"),
        variant: None,
        multi_color: false,
        default_mode: None,
        force_mode: false,
    },
    EffectRule {
        pattern: r"\b(?:blackout|black out|lights off)\b",
        effect: "blackout",
        keyword: Some("blackout"),
        variant: None,
        multi_color: false,
        default_mode: None,
        force_mode: false,
    },
];

static COMPILED_EFFECT_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    EFFECT_RULES
        .iter()
        .map(|r| Regex::new(r.pattern).expect("valid effect pattern"))
        .collect()
});

fn effect_type_rule(text: &str, state: &mut ParamState) {
    for (rule, re) in EFFECT_RULES.iter().zip(COMPILED_EFFECT_RULES.iter()) {
        let Some(caps) = re.captures(text) else { continue };
        let keyword = rule
            .keyword
            .map(str::to_string)
            .or_else(|| caps.get(1).map(|m| m.as_str().to_string()))
            .unwrap_or_else(|| rule.effect.to_string());

        state.set("effect", json!(rule.effect));
        if let Some(variant) = rule.variant {
            state.set("variant", json!(variant));
        }
        if rule.multi_color {
            state.set("multi_color", json!(true));
        }
        if let Some(mode) = rule.default_mode {
            if rule.force_mode {
                state.set("repeat_mode", json!(mode));
            } else {
                state.set_if_unset("repeat_mode", json!(mode));
            }
        }
        state.effect_keyword = Some(keyword);
        state.hit("effect");
        return;
    }

    // Position without an effect word is a move
    if state.params.contains_key("pan") || state.params.contains_key("tilt") {
        state.set("effect", json!("move"));
        state.effect_keyword = Some("move".into());
    }
}

static EXPLICIT_INTENSITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:intensity|brightness)\s*(?:of|at|to|=|:)?\s*(\d+(?:\.\d+)?)\s*(%)?").expect("valid regex")
});

fn explicit_intensity_rule(text: &str, state: &mut ParamState) {
    let Some(caps) = EXPLICIT_INTENSITY.captures(text) else { return };
    let Some(value) = number(&caps[1]) else { return };
    let value = if caps.get(2).is_some() {
        percent_to_dmx(value)
    } else {
        value.clamp(0.0, 255.0).round()
    };
    state.set("dim", json!(value as u8));
    state.hit("intensity");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_with_seconds_is_duration_mode() {
        let state = resolve_params("flash red on parcan_l at 10s for 2s");
        assert_eq!(state.effect(), Some("flash"));
        assert_eq!(state.color(), Some("red"));
        assert_eq!(state.repeat_mode(), Some("duration"));
        assert_eq!(state.num_param("duration_seconds"), Some(2.0));
        assert!(!state.has_channels());
        assert_eq!(state.effect_keyword.as_deref(), Some("flash"));
    }

    #[test]
    fn color_becomes_channels_only_with_channel_token() {
        let state = resolve_params("set parcan_l blue with dim=50%");
        assert_eq!(state.params.get("channel_dim"), Some(&json!(128)));
        assert_eq!(state.params.get("channel_blue"), Some(&json!(255)));
        assert_eq!(state.params.get("channel_red"), Some(&json!(0)));

        let casual = resolve_params("blue wash on the left");
        assert!(!casual.has_channels());
        assert_eq!(casual.color(), Some("blue"));
    }

    #[test]
    fn degrees_are_positions_not_channels() {
        let state = resolve_params("move head_1 pan 180 degrees tilt=90deg");
        assert_eq!(state.num_param("pan"), Some(128.0));
        assert_eq!(state.num_param("tilt"), Some(64.0));
        assert!(!state.has_channels());
        assert_eq!(state.effect(), Some("move"));
    }

    #[test]
    fn cadence_rules() {
        assert_eq!(resolve_params("strobe every 2 beats").num_param("beat_interval"), Some(2.0));
        assert_eq!(resolve_params("strobe every 2 beats").repeat_mode(), Some("interval"));
        assert_eq!(resolve_params("flash every beat").num_param("beat_interval"), Some(1.0));
        assert_eq!(resolve_params("pulse during the chorus").repeat_mode(), Some("section"));
        assert_eq!(resolve_params("chase the pars").repeat_mode(), Some("continuous"));
        assert_eq!(resolve_params("strobe").repeat_mode(), Some("beat_sync"));
        assert_eq!(resolve_params("fade to red repeatedly").repeat_mode(), Some("continuous"));
    }

    #[test]
    fn intensity_tiers_never_override_explicit_dim() {
        assert_eq!(resolve_params("soft blue fade").num_param("dim"), Some(77.0));
        assert_eq!(resolve_params("bright flash").num_param("dim"), Some(255.0));
        assert_eq!(
            resolve_params("soft blue fade with intensity 200").num_param("dim"),
            Some(200.0)
        );
        assert!(resolve_params("dim=10 soft").params.get("dim").is_none());
    }

    #[test]
    fn compound_multicolor_strobes_force_beat_sync() {
        let state = resolve_params("multi-colored strobes for 8 beats");
        assert_eq!(state.effect(), Some("flash"));
        assert_eq!(state.params.get("multi_color"), Some(&json!(true)));
        assert_eq!(state.repeat_mode(), Some("beat_sync"));
        assert_eq!(state.num_param("duration_beats"), Some(8.0));

        let chase = resolve_params("multicolor wash");
        assert_eq!(chase.effect(), Some("chase"));
    }

    #[test]
    fn fast_strobe_sets_speed() {
        let state = resolve_params("fast strobe on the heads");
        assert_eq!(state.num_param("strobe"), Some(230.0));
        assert_eq!(state.str_param("strobe_speed"), Some("fast"));
        assert_eq!(state.effect_keyword.as_deref(), Some("strobe"));
    }
}
