//! Fixture capability dispatch.
//!
//! Each fixture type implements [`Fixture`]: it reports the actions it can
//! render and paints them onto a [`TimelineCanvas`] through its channel map.
//! Presets and raw channel effects are shared by every type.

use std::collections::BTreeMap;
use std::f32::consts::PI;

use serde_json::Value;

use crate::canvas::TimelineCanvas;
use crate::fixtures::color::{self, Rgb, CHASE_PALETTE};
use crate::models::effects::{EffectKind, EffectParams};
use crate::models::fixtures::{FixtureConfig, FixtureType, PresetDefinition};
use crate::models::song::FALLBACK_BPM;

/// Timing and parameters of one effect as seen by a render procedure.
#[derive(Debug, Clone, Copy)]
pub struct EffectWindow<'a> {
    pub start: f32,
    pub duration: f32,
    pub params: &'a EffectParams,
    pub bpm: f32,
}

impl<'a> EffectWindow<'a> {
    pub fn end(&self) -> f32 {
        self.start + self.duration.max(0.0)
    }

    pub fn number(&self, key: &str) -> Option<f32> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_f64().map(|v| v as f32),
            Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.params.get(key), Some(Value::Bool(true)))
    }

    /// `rgb` array, then `color` name or hex.
    pub fn color(&self) -> Option<Rgb> {
        if let Some(Value::Array(parts)) = self.params.get("rgb") {
            if parts.len() == 3 {
                let mut rgb = [0u8; 3];
                for (slot, part) in rgb.iter_mut().zip(parts) {
                    *slot = part.as_f64().map(|v| v.clamp(0.0, 255.0) as u8)?;
                }
                return Some(rgb);
            }
        }
        match self.params.get("color") {
            Some(Value::String(name)) => color::lookup(name).or_else(|| color::parse_hex(name)),
            _ => None,
        }
    }

    /// Colors for chases: explicit `colors` list, else the palette when
    /// `multi_color` is set, else the single color.
    pub fn colors(&self) -> Vec<Rgb> {
        if let Some(Value::Array(items)) = self.params.get("colors") {
            let parsed: Vec<Rgb> = items
                .iter()
                .filter_map(|v| v.as_str())
                .filter_map(|name| color::lookup(name).or_else(|| color::parse_hex(name)))
                .collect();
            if !parsed.is_empty() {
                return parsed;
            }
        }
        if self.flag("multi_color") {
            return CHASE_PALETTE.iter().filter_map(|n| color::lookup(n)).collect();
        }
        vec![self.color().unwrap_or([255, 255, 255])]
    }

    /// Master intensity 0-255 from `dim` or `intensity`, full when unset.
    pub fn intensity(&self) -> f32 {
        self.number("dim")
            .or_else(|| self.number("intensity"))
            .unwrap_or(255.0)
            .clamp(0.0, 255.0)
    }

    pub fn beat_duration(&self) -> f32 {
        let bpm = self.number("bpm").unwrap_or(self.bpm);
        if bpm.is_finite() && bpm > 0.0 {
            60.0 / bpm
        } else {
            60.0 / FALLBACK_BPM
        }
    }
}

pub trait Fixture: Send + Sync {
    fn config(&self) -> &FixtureConfig;

    /// Actions this driver knows how to paint.
    fn builtin_actions(&self) -> &'static [&'static str];

    fn render_action(
        &self,
        action: &str,
        window: &EffectWindow,
        canvas: &mut TimelineCanvas,
    ) -> Result<(), String>;

    fn id(&self) -> &str {
        &self.config().id
    }

    fn kind(&self) -> FixtureType {
        self.config().kind()
    }

    fn supports_action(&self, action: &str) -> bool {
        let action = action.to_lowercase();
        let builtin = self.builtin_actions().iter().any(|a| *a == action);
        let allowed = self.config().effects.is_empty()
            || self
                .config()
                .effects
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&action));
        builtin && allowed
    }

    /// Supported action names followed by preset names.
    fn capabilities(&self) -> Vec<String> {
        let mut caps: Vec<String> = self
            .builtin_actions()
            .iter()
            .filter(|a| self.supports_action(a))
            .map(|a| a.to_string())
            .collect();
        for preset in &self.config().presets {
            if !caps.iter().any(|c| c.eq_ignore_ascii_case(&preset.name)) {
                caps.push(preset.name.clone());
            }
        }
        caps
    }

    fn supports(&self, name: &str) -> bool {
        self.config().preset(name).is_some() || self.supports_action(name)
    }

    fn render(
        &self,
        kind: &EffectKind,
        window: &EffectWindow,
        canvas: &mut TimelineCanvas,
    ) -> Result<(), String> {
        match kind {
            EffectKind::Preset { name } => {
                if let Some(preset) = self.config().preset(name) {
                    paint_preset(preset, window, canvas);
                    Ok(())
                } else if self.supports_action(name) {
                    self.render_action(&name.to_lowercase(), window, canvas)
                } else {
                    Err(format!(
                        "Fixture '{}' does not support action '{}'",
                        self.id(),
                        name
                    ))
                }
            }
            EffectKind::RawChannels { channels } => paint_raw(self.config(), channels, window, canvas),
        }
    }
}

/// Build the driver matching the config's fixture type.
pub fn build_fixture(config: FixtureConfig) -> Box<dyn Fixture> {
    match config.kind() {
        FixtureType::Rgb => Box::new(RgbFixture { config }),
        FixtureType::MovingHead => Box::new(MovingHeadFixture { config }),
        FixtureType::Generic => Box::new(GenericFixture { config }),
    }
}

// -----------------------------------------------------------------------------
// Shared painting
// -----------------------------------------------------------------------------

/// Hold constant values across the window, or a single frame when instantaneous.
fn paint_span(canvas: &mut TimelineCanvas, window: &EffectWindow, values: Vec<(u16, f32)>) {
    if window.duration <= 0.0 {
        canvas.paint_frame(window.start, &values);
    } else {
        canvas.paint_range(window.start, window.end(), |_| values.clone());
    }
}

/// Like `paint_span` but evaluates `paint` per frame (envelopes, chases).
fn paint_dynamic<F>(canvas: &mut TimelineCanvas, window: &EffectWindow, mut paint: F)
where
    F: FnMut(f32) -> Vec<(u16, f32)>,
{
    if window.duration <= 0.0 {
        let values = paint(0.0);
        canvas.paint_frame(window.start, &values);
    } else {
        let start = window.start;
        canvas.paint_range(window.start, window.end(), |t| paint(t - start));
    }
}

fn paint_preset(preset: &PresetDefinition, window: &EffectWindow, canvas: &mut TimelineCanvas) {
    let values = preset
        .channels
        .iter()
        .map(|c| (c.address, c.value as f32))
        .collect();
    paint_span(canvas, window, values);
}

fn paint_raw(
    config: &FixtureConfig,
    channels: &BTreeMap<String, u8>,
    window: &EffectWindow,
    canvas: &mut TimelineCanvas,
) -> Result<(), String> {
    let mut values = Vec::with_capacity(channels.len());
    let mut missing = Vec::new();
    for (name, value) in channels {
        match config.channel(name) {
            Some(address) => values.push((address, *value as f32)),
            None => missing.push(name.as_str()),
        }
    }
    if values.is_empty() {
        return Err(format!(
            "Fixture '{}' has none of the channels [{}]",
            config.id,
            missing.join(", ")
        ));
    }
    if !missing.is_empty() {
        log::debug!(
            "[render] fixture {} skipping unknown channels {:?}",
            config.id,
            missing
        );
    }
    paint_span(canvas, window, values);
    Ok(())
}

/// Color + dim values for a fixture, scaled so fixtures without a dim channel
/// still show the intensity through their color channels.
fn color_values(config: &FixtureConfig, rgb: Rgb, intensity: f32) -> Result<Vec<(u16, f32)>, String> {
    let mut values = Vec::with_capacity(4);
    let dim = config.channel("dim");
    let scale = if dim.is_some() { 1.0 } else { intensity / 255.0 };
    if config.has_rgb() {
        for (name, component) in ["red", "green", "blue"].iter().zip(rgb) {
            if let Some(address) = config.channel(name) {
                values.push((address, component as f32 * scale));
            }
        }
    }
    if let Some(address) = dim {
        values.push((address, intensity));
    }
    if values.is_empty() {
        return Err(format!("Fixture '{}' has no dim or color channels", config.id));
    }
    Ok(values)
}

fn blackout_values(config: &FixtureConfig) -> Vec<(u16, f32)> {
    ["red", "green", "blue", "white", "dim", "strobe"]
        .iter()
        .filter_map(|name| config.channel(name))
        .map(|address| (address, 0.0))
        .collect()
}

fn scaled(values: &[(u16, f32)], factor: f32) -> Vec<(u16, f32)> {
    values.iter().map(|(a, v)| (*a, v * factor)).collect()
}

/// Decaying envelope: 1.0 on each beat falling to 0 before the next.
fn pulse_envelope(elapsed: f32, beat: f32) -> f32 {
    if beat <= 0.0 {
        return 1.0;
    }
    let phase = (elapsed / beat).fract();
    (1.0 - phase).powi(2)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

fn render_fade(config: &FixtureConfig, window: &EffectWindow, canvas: &mut TimelineCanvas) -> Result<(), String> {
    let to_rgb = window.color().unwrap_or([255, 255, 255]);
    let from_rgb = match window.params.get("from_color") {
        Some(Value::String(name)) => color::lookup(name).unwrap_or(to_rgb),
        _ => to_rgb,
    };
    let from_dim = window.number("from_dim").unwrap_or(0.0);
    let to_dim = window.intensity();
    // Validate channel availability once up front
    color_values(config, to_rgb, to_dim)?;

    let duration = window.duration;
    paint_dynamic(canvas, window, |elapsed| {
        let t = if duration > 0.0 { elapsed / duration } else { 1.0 };
        let rgb = [
            lerp(from_rgb[0] as f32, to_rgb[0] as f32, t) as u8,
            lerp(from_rgb[1] as f32, to_rgb[1] as f32, t) as u8,
            lerp(from_rgb[2] as f32, to_rgb[2] as f32, t) as u8,
        ];
        color_values(config, rgb, lerp(from_dim, to_dim, t)).unwrap_or_default()
    });
    Ok(())
}

fn render_strobe(config: &FixtureConfig, window: &EffectWindow, canvas: &mut TimelineCanvas) -> Result<(), String> {
    let rgb = window.color().unwrap_or([255, 255, 255]);
    let mut values = color_values(config, rgb, window.intensity())?;
    if let Some(address) = config.channel("strobe") {
        values.push((address, window.number("strobe").unwrap_or(200.0)));
        paint_span(canvas, window, values);
        return Ok(());
    }

    // No shutter channel: toggle the light itself
    let rate = window.number("rate").unwrap_or(10.0).max(0.1);
    paint_dynamic(canvas, window, |elapsed| {
        if (elapsed * rate).fract() < 0.5 {
            values.clone()
        } else {
            scaled(&values, 0.0)
        }
    });
    Ok(())
}

// -----------------------------------------------------------------------------
// RGB fixtures (par cans, washes)
// -----------------------------------------------------------------------------

pub struct RgbFixture {
    config: FixtureConfig,
}

const RGB_ACTIONS: &[&str] = &["flash", "pulse", "fade", "strobe", "chase", "color", "blackout"];

impl Fixture for RgbFixture {
    fn config(&self) -> &FixtureConfig {
        &self.config
    }

    fn builtin_actions(&self) -> &'static [&'static str] {
        RGB_ACTIONS
    }

    fn render_action(
        &self,
        action: &str,
        window: &EffectWindow,
        canvas: &mut TimelineCanvas,
    ) -> Result<(), String> {
        let config = &self.config;
        match action {
            "flash" | "color" => {
                let rgb = window.color().unwrap_or([255, 255, 255]);
                let values = color_values(config, rgb, window.intensity())?;
                paint_span(canvas, window, values);
                Ok(())
            }
            "pulse" => {
                let rgb = window.color().unwrap_or([255, 255, 255]);
                let values = color_values(config, rgb, window.intensity())?;
                let beat = window.beat_duration();
                paint_dynamic(canvas, window, |elapsed| {
                    scaled(&values, pulse_envelope(elapsed, beat))
                });
                Ok(())
            }
            "fade" => render_fade(config, window, canvas),
            "strobe" => render_strobe(config, window, canvas),
            "chase" => {
                let colors = window.colors();
                let intensity = window.intensity();
                color_values(config, colors[0], intensity)?;
                let step = window.beat_duration() * window.number("step_beats").unwrap_or(1.0).max(0.01);
                let offset = window.number("chase_offset").unwrap_or(0.0).max(0.0) as usize;
                paint_dynamic(canvas, window, |elapsed| {
                    let idx = ((elapsed / step).floor() as usize + offset) % colors.len();
                    color_values(config, colors[idx], intensity).unwrap_or_default()
                });
                Ok(())
            }
            "blackout" => {
                paint_span(canvas, window, blackout_values(config));
                Ok(())
            }
            other => Err(format!("RGB fixture '{}' cannot render '{}'", config.id, other)),
        }
    }
}

// -----------------------------------------------------------------------------
// Moving heads
// -----------------------------------------------------------------------------

pub struct MovingHeadFixture {
    config: FixtureConfig,
}

const MOVING_HEAD_ACTIONS: &[&str] = &["flash", "strobe", "fade", "move", "sweep", "color", "blackout"];

impl MovingHeadFixture {
    /// Pan/tilt target in channel units from `pan`/`tilt` or `*_deg` params.
    fn position(&self, window: &EffectWindow) -> (Option<f32>, Option<f32>) {
        let pan = window
            .number("pan")
            .or_else(|| window.number("pan_deg").map(degrees_to_dmx));
        let tilt = window
            .number("tilt")
            .or_else(|| window.number("tilt_deg").map(degrees_to_dmx));
        (pan, tilt)
    }

    fn color_channel_values(&self, window: &EffectWindow) -> Result<Vec<(u16, f32)>, String> {
        let config = &self.config;
        if config.has_rgb() || window.color().is_none() {
            return color_values(config, window.color().unwrap_or([255, 255, 255]), window.intensity());
        }
        // Color wheel heads: slot value supplied by the preset table or params
        let mut values = Vec::new();
        if let (Some(address), Some(slot)) = (config.channel("color"), window.number("color_wheel")) {
            values.push((address, slot));
        }
        if let Some(address) = config.channel("dim") {
            values.push((address, window.intensity()));
        }
        if values.is_empty() {
            return Err(format!("Moving head '{}' has no dim or color channels", config.id));
        }
        Ok(values)
    }
}

/// 0..=360 degrees onto the full channel range. Out-of-range input is clamped.
pub fn degrees_to_dmx(degrees: f32) -> f32 {
    if !degrees.is_finite() {
        return 0.0;
    }
    (degrees.clamp(0.0, 360.0) / 360.0 * 255.0).round()
}

impl Fixture for MovingHeadFixture {
    fn config(&self) -> &FixtureConfig {
        &self.config
    }

    fn builtin_actions(&self) -> &'static [&'static str] {
        MOVING_HEAD_ACTIONS
    }

    fn render_action(
        &self,
        action: &str,
        window: &EffectWindow,
        canvas: &mut TimelineCanvas,
    ) -> Result<(), String> {
        let config = &self.config;
        match action {
            "flash" | "color" => {
                let mut values = self.color_channel_values(window)?;
                let (pan, tilt) = self.position(window);
                if let (Some(address), Some(pan)) = (config.channel("pan"), pan) {
                    values.push((address, pan));
                }
                if let (Some(address), Some(tilt)) = (config.channel("tilt"), tilt) {
                    values.push((address, tilt));
                }
                paint_span(canvas, window, values);
                Ok(())
            }
            "strobe" => render_strobe(config, window, canvas),
            "fade" => render_fade(config, window, canvas),
            "move" => {
                let (pan, tilt) = self.position(window);
                let mut values = Vec::new();
                if let (Some(address), Some(pan)) = (config.channel("pan"), pan) {
                    values.push((address, pan));
                }
                if let (Some(address), Some(tilt)) = (config.channel("tilt"), tilt) {
                    values.push((address, tilt));
                }
                if values.is_empty() {
                    return Err(format!(
                        "Moving head '{}' needs pan/tilt channels and a target position",
                        config.id
                    ));
                }
                paint_span(canvas, window, values);
                Ok(())
            }
            "sweep" => {
                let pan_address = config
                    .channel("pan")
                    .ok_or_else(|| format!("Moving head '{}' has no pan channel", config.id))?;
                let (center, tilt) = self.position(window);
                let center = center.unwrap_or(128.0);
                let width = window.number("sweep_width").unwrap_or(64.0);
                let period = window.beat_duration() * window.number("sweep_beats").unwrap_or(4.0).max(0.25);
                let tilt_values: Vec<(u16, f32)> = match (config.channel("tilt"), tilt) {
                    (Some(address), Some(tilt)) => vec![(address, tilt)],
                    _ => Vec::new(),
                };
                let dim = config.channel("dim").map(|a| (a, window.intensity()));
                paint_dynamic(canvas, window, |elapsed| {
                    let mut values = tilt_values.clone();
                    values.push((pan_address, center + width * (2.0 * PI * elapsed / period).sin()));
                    values.extend(dim);
                    values
                });
                Ok(())
            }
            "blackout" => {
                paint_span(canvas, window, blackout_values(config));
                Ok(())
            }
            other => Err(format!("Moving head '{}' cannot render '{}'", config.id, other)),
        }
    }
}

// -----------------------------------------------------------------------------
// Generic dimmers / anything else
// -----------------------------------------------------------------------------

pub struct GenericFixture {
    config: FixtureConfig,
}

const GENERIC_ACTIONS: &[&str] = &["dim", "blackout"];

impl Fixture for GenericFixture {
    fn config(&self) -> &FixtureConfig {
        &self.config
    }

    fn builtin_actions(&self) -> &'static [&'static str] {
        GENERIC_ACTIONS
    }

    fn render_action(
        &self,
        action: &str,
        window: &EffectWindow,
        canvas: &mut TimelineCanvas,
    ) -> Result<(), String> {
        let config = &self.config;
        match action {
            "dim" => {
                let address = config
                    .channel("dim")
                    .ok_or_else(|| format!("Fixture '{}' has no dim channel", config.id))?;
                paint_span(canvas, window, vec![(address, window.intensity())]);
                Ok(())
            }
            "blackout" => {
                paint_span(canvas, window, blackout_values(config));
                Ok(())
            }
            other => Err(format!("Fixture '{}' cannot render '{}'", config.id, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn par() -> FixtureConfig {
        serde_json::from_value(json!({
            "id": "parcan_l",
            "type": "rgb",
            "channels": {"red": 1, "green": 2, "blue": 3, "dim": 4, "strobe": 5},
            "presets": [{"name": "amber_wash", "channels": [{"address": 1, "value": 255}, {"address": 2, "value": 126}]}]
        }))
        .expect("par config")
    }

    fn head() -> FixtureConfig {
        serde_json::from_value(json!({
            "id": "spot_1",
            "type": "moving_head",
            "channels": {"pan": 20, "tilt": 21, "dim": 22, "strobe": 23},
            "effects": ["flash", "move", "sweep"]
        }))
        .expect("head config")
    }

    fn params(value: serde_json::Value) -> EffectParams {
        serde_json::from_value(value).expect("params")
    }

    #[test]
    fn flash_paints_color_and_dim_over_window() {
        let fixture = build_fixture(par());
        let mut canvas = TimelineCanvas::new(30, 20.0);
        let p = params(json!({"color": "red"}));
        let window = EffectWindow { start: 10.0, duration: 2.0, params: &p, bpm: 120.0 };

        fixture
            .render(&EffectKind::preset("flash"), &window, &mut canvas)
            .expect("render");

        assert_eq!(canvas.channel_value(11.0, 1), 255);
        assert_eq!(canvas.channel_value(11.0, 2), 0);
        assert_eq!(canvas.channel_value(11.0, 4), 255);
        assert_eq!(canvas.channel_value(9.9, 4), 0);
        assert_eq!(canvas.channel_value(12.0, 4), 0);
    }

    #[test]
    fn preset_table_wins_over_actions() {
        let fixture = build_fixture(par());
        let mut canvas = TimelineCanvas::new(10, 5.0);
        let p = EffectParams::new();
        let window = EffectWindow { start: 1.0, duration: 0.0, params: &p, bpm: 120.0 };
        fixture
            .render(&EffectKind::preset("AMBER_WASH"), &window, &mut canvas)
            .expect("render");
        assert_eq!(canvas.channel_value(1.0, 2), 126);
        assert_eq!(canvas.channel_value(1.1, 2), 0, "instantaneous effect paints one frame");
    }

    #[test]
    fn effects_list_restricts_actions() {
        let fixture = build_fixture(head());
        assert!(fixture.supports("sweep"));
        assert!(!fixture.supports("strobe"));
        let mut canvas = TimelineCanvas::new(10, 5.0);
        let p = EffectParams::new();
        let window = EffectWindow { start: 0.0, duration: 1.0, params: &p, bpm: 120.0 };
        let err = fixture
            .render(&EffectKind::preset("strobe"), &window, &mut canvas)
            .unwrap_err();
        assert!(err.contains("does not support"));
    }

    #[test]
    fn raw_channels_map_through_channel_names() {
        let fixture = build_fixture(head());
        let mut canvas = TimelineCanvas::new(10, 5.0);
        let p = EffectParams::new();
        let window = EffectWindow { start: 2.0, duration: 1.0, params: &p, bpm: 120.0 };
        let mut channels = BTreeMap::new();
        channels.insert("pan".to_string(), 64u8);
        channels.insert("zoom".to_string(), 10u8);
        fixture
            .render(&EffectKind::RawChannels { channels }, &window, &mut canvas)
            .expect("render");
        assert_eq!(canvas.channel_value(2.5, 20), 64);

        let mut only_unknown = BTreeMap::new();
        only_unknown.insert("zoom".to_string(), 10u8);
        assert!(fixture
            .render(&EffectKind::RawChannels { channels: only_unknown }, &window, &mut canvas)
            .is_err());
    }

    #[test]
    fn pulse_decays_within_each_beat() {
        let fixture = build_fixture(par());
        let mut canvas = TimelineCanvas::new(100, 4.0);
        let p = params(json!({"color": "blue"}));
        let window = EffectWindow { start: 0.0, duration: 2.0, params: &p, bpm: 120.0 };
        fixture
            .render(&EffectKind::preset("pulse"), &window, &mut canvas)
            .expect("render");
        let on_beat = canvas.channel_value(0.5, 4);
        let mid_beat = canvas.channel_value(0.75, 4);
        assert_eq!(on_beat, 255);
        assert!(mid_beat < on_beat);
    }

    #[test]
    fn chase_cycles_palette_per_beat() {
        let fixture = build_fixture(par());
        let mut canvas = TimelineCanvas::new(10, 4.0);
        let p = params(json!({"colors": ["red", "blue"]}));
        let window = EffectWindow { start: 0.0, duration: 2.0, params: &p, bpm: 120.0 };
        fixture
            .render(&EffectKind::preset("chase"), &window, &mut canvas)
            .expect("render");
        assert_eq!(canvas.channel_value(0.1, 1), 255);
        assert_eq!(canvas.channel_value(0.6, 3), 255);
        assert_eq!(canvas.channel_value(0.6, 1), 0);
    }

    #[test]
    fn degrees_map_to_channel_range() {
        assert_eq!(degrees_to_dmx(0.0), 0.0);
        assert_eq!(degrees_to_dmx(180.0), 128.0);
        assert_eq!(degrees_to_dmx(360.0), 255.0);
        assert_eq!(degrees_to_dmx(720.0), 255.0);
        assert_eq!(degrees_to_dmx(-45.0), 0.0);
    }
}
