//! Render Engine
//!
//! Replays a scheduled-effect list onto a [`TimelineCanvas`] through the
//! fixture drivers. Failures are per effect: one broken cue never aborts the
//! pass. `validate` runs the same resolution without touching a canvas.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::canvas::TimelineCanvas;
use crate::fixtures::{EffectWindow, FixtureLibrary};
use crate::models::effects::{EffectKind, ScheduledEffect};
use crate::models::song::FALLBACK_BPM;

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "render.ts")]
pub struct RenderFailure {
    pub effect_id: String,
    pub fixture_id: String,
    pub reason: String,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "render.ts")]
pub struct RenderReport {
    pub success: bool,
    pub rendered: u32,
    pub total: u32,
    pub failures: Vec<RenderFailure>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "issue", rename_all = "snake_case")]
#[ts(export, export_to = "render.ts")]
pub enum EffectIssue {
    MissingFixture { fixture_id: String },
    UnsupportedAction { action: String },
    NegativeStart { start_time: f32 },
    InvalidDuration { duration: f32 },
}

impl EffectIssue {
    pub fn describe(&self) -> String {
        match self {
            EffectIssue::MissingFixture { fixture_id } => format!("fixture '{}' not found", fixture_id),
            EffectIssue::UnsupportedAction { action } => format!("action '{}' not supported", action),
            EffectIssue::NegativeStart { start_time } => format!("negative start time {:.2}", start_time),
            EffectIssue::InvalidDuration { duration } => format!("invalid duration {}", duration),
        }
    }
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "render.ts")]
pub struct EffectValidation {
    pub effect_id: String,
    pub issues: Vec<EffectIssue>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "render.ts")]
pub struct ValidationReport {
    pub valid: u32,
    pub invalid: u32,
    /// Only effects with at least one issue are listed.
    pub effects: Vec<EffectValidation>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }
}

/// Stateless apart from the fixture roster, so a new canvas never leaves a
/// renderer holding a stale buffer.
#[derive(Clone)]
pub struct Renderer {
    fixtures: Arc<FixtureLibrary>,
    bpm: f32,
}

impl Renderer {
    pub fn new(fixtures: Arc<FixtureLibrary>, bpm: f32) -> Self {
        let bpm = if bpm.is_finite() && bpm > 0.0 { bpm } else { FALLBACK_BPM };
        Self { fixtures, bpm }
    }

    pub fn fixtures(&self) -> &Arc<FixtureLibrary> {
        &self.fixtures
    }

    pub fn issues_for(&self, effect: &ScheduledEffect) -> Vec<EffectIssue> {
        let mut issues = Vec::new();
        match self.fixtures.get(&effect.fixture_id) {
            None => issues.push(EffectIssue::MissingFixture {
                fixture_id: effect.fixture_id.clone(),
            }),
            Some(fixture) => {
                if let EffectKind::Preset { name } = &effect.kind {
                    if !fixture.supports(name) {
                        issues.push(EffectIssue::UnsupportedAction { action: name.clone() });
                    }
                }
            }
        }
        if effect.start_time < 0.0 || !effect.start_time.is_finite() {
            issues.push(EffectIssue::NegativeStart {
                start_time: effect.start_time,
            });
        }
        // Zero is a valid instantaneous effect
        if effect.duration < 0.0 || !effect.duration.is_finite() {
            issues.push(EffectIssue::InvalidDuration {
                duration: effect.duration,
            });
        }
        issues
    }

    pub fn validate(&self, effects: &[ScheduledEffect]) -> ValidationReport {
        let mut report = ValidationReport::default();
        for effect in effects {
            let issues = self.issues_for(effect);
            if issues.is_empty() {
                report.valid += 1;
            } else {
                report.invalid += 1;
                report.effects.push(EffectValidation {
                    effect_id: effect.id.clone(),
                    issues,
                });
            }
        }
        report
    }

    /// Paint `effects` in start-time order. Succeeds when at least one effect
    /// rendered.
    pub fn render(
        &self,
        effects: &[ScheduledEffect],
        canvas: &mut TimelineCanvas,
        clear_first: bool,
    ) -> RenderReport {
        if clear_first {
            canvas.clear();
        }

        let mut ordered: Vec<&ScheduledEffect> = effects.iter().collect();
        ordered.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let mut report = RenderReport {
            total: ordered.len() as u32,
            ..Default::default()
        };

        for effect in ordered {
            match self.render_one(effect, canvas) {
                Ok(()) => report.rendered += 1,
                Err(reason) => {
                    log::warn!("[render] skipped {} ({}): {}", effect.id, effect.describe(), reason);
                    report.failures.push(RenderFailure {
                        effect_id: effect.id.clone(),
                        fixture_id: effect.fixture_id.clone(),
                        reason,
                    });
                }
            }
        }

        report.success = report.rendered > 0;
        log::debug!(
            "[render] painted {}/{} effects onto canvas gen {}",
            report.rendered,
            report.total,
            canvas.generation()
        );
        report
    }

    fn render_one(&self, effect: &ScheduledEffect, canvas: &mut TimelineCanvas) -> Result<(), String> {
        let issues = self.issues_for(effect);
        if !issues.is_empty() {
            let reasons: Vec<String> = issues.iter().map(|i| i.describe()).collect();
            return Err(reasons.join("; "));
        }
        let fixture = self
            .fixtures
            .get(&effect.fixture_id)
            .ok_or_else(|| format!("fixture '{}' not found", effect.fixture_id))?;
        let window = EffectWindow {
            start: effect.start_time,
            duration: effect.duration,
            params: &effect.parameters,
            bpm: self.bpm,
        };
        fixture.render(&effect.kind, &window, canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::FixtureConfig;
    use serde_json::json;

    fn library() -> Arc<FixtureLibrary> {
        let configs: Vec<FixtureConfig> = serde_json::from_value(json!([
            {"id": "parcan_l", "type": "rgb", "channels": {"red": 1, "green": 2, "blue": 3, "dim": 4}},
            {"id": "head_1", "type": "moving_head", "channels": {"pan": 10, "tilt": 11, "dim": 12}}
        ]))
        .expect("configs");
        Arc::new(FixtureLibrary::from_configs(configs))
    }

    fn flash(fixture: &str, start: f32, duration: f32) -> ScheduledEffect {
        ScheduledEffect::new(fixture, EffectKind::preset("flash"), start, duration).with_id(format!("{}-{}", fixture, start))
    }

    #[test]
    fn failures_are_excluded_from_tally() {
        let renderer = Renderer::new(library(), 120.0);
        let mut canvas = TimelineCanvas::new(30, 20.0);
        let effects = vec![
            flash("parcan_l", 1.0, 1.0),
            flash("ghost", 2.0, 1.0),
            ScheduledEffect::new("head_1", EffectKind::preset("chase"), 3.0, 1.0),
            flash("head_1", 4.0, 1.0),
        ];

        let report = renderer.render(&effects, &mut canvas, true);
        assert!(report.success);
        assert_eq!(report.total, 4);
        assert_eq!(report.rendered, 2);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(canvas.channel_value(1.5, 4), 255);
        assert_eq!(canvas.channel_value(4.5, 12), 255);
    }

    #[test]
    fn all_failures_report_unsuccessful() {
        let renderer = Renderer::new(library(), 120.0);
        let mut canvas = TimelineCanvas::new(30, 5.0);
        let report = renderer.render(&[flash("ghost", 0.0, 1.0)], &mut canvas, true);
        assert!(!report.success);
        assert!(canvas.is_blank());

        let empty = renderer.render(&[], &mut canvas, true);
        assert!(!empty.success);
        assert_eq!(empty.total, 0);
    }

    #[test]
    fn clear_first_wipes_previous_paint() {
        let renderer = Renderer::new(library(), 120.0);
        let mut canvas = TimelineCanvas::new(30, 5.0);
        renderer.render(&[flash("parcan_l", 0.0, 1.0)], &mut canvas, false);
        renderer.render(&[flash("parcan_l", 3.0, 1.0)], &mut canvas, true);
        assert_eq!(canvas.channel_value(0.5, 4), 0);
        assert_eq!(canvas.channel_value(3.5, 4), 255);
    }

    #[test]
    fn validate_collects_issues_without_painting() {
        let renderer = Renderer::new(library(), 120.0);
        let effects = vec![
            flash("parcan_l", 1.0, 0.0),
            flash("ghost", -1.0, -2.0),
            ScheduledEffect::new("head_1", EffectKind::preset("pulse"), 0.0, 1.0).with_id("bad-action"),
        ];

        let report = renderer.validate(&effects);
        assert_eq!(report.valid, 1);
        assert_eq!(report.invalid, 2);
        let ghost = &report.effects[0];
        assert_eq!(ghost.issues.len(), 3);
        assert!(matches!(ghost.issues[0], EffectIssue::MissingFixture { .. }));
        assert_eq!(
            report.effects[1].issues,
            vec![EffectIssue::UnsupportedAction { action: "pulse".into() }]
        );
    }
}
