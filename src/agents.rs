//! Text-generating planning collaborators.
//!
//! An agent receives a prompt describing the song and roster and answers with
//! either `ACTION: <command>` lines or a JSON array of
//! `{type, color, start, duration}` objects. Replies that are neither fall back
//! to a deterministic plan built from the arrangement.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use ts_rs::TS;

use crate::error::{ShowError, ShowResult};
use crate::fixtures::color::CHASE_PALETTE;
use crate::fixtures::FixtureLibrary;
use crate::models::effects::{EffectKind, EffectParams, ScheduledEffect};
use crate::models::fixtures::FixtureType;
use crate::models::song::SongContext;
use crate::storage::effects::new_group_id;

#[async_trait]
pub trait TextAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, String>;
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<BTreeMap<String, Arc<dyn TextAgent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent: Arc<dyn TextAgent>) {
        let name = agent.name().to_lowercase();
        log::info!("[agent] registered '{}'", name);
        self.agents
            .write()
            .expect("agent registry poisoned")
            .insert(name, agent);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TextAgent>> {
        self.agents
            .read()
            .expect("agent registry poisoned")
            .get(&name.to_lowercase())
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.agents
            .read()
            .expect("agent registry poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

/// Ask `agent` for a completion, giving up after `timeout`.
pub async fn call_agent(agent: &dyn TextAgent, prompt: &str, timeout: Duration) -> ShowResult<String> {
    match tokio::time::timeout(timeout, agent.complete(prompt)).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(e)) => Err(ShowError::Agent(format!("{} failed: {}", agent.name(), e))),
        Err(_) => Err(ShowError::Agent(format!(
            "{} timed out after {}s",
            agent.name(),
            timeout.as_secs()
        ))),
    }
}

// -----------------------------------------------------------------------------
// Reply parsing
// -----------------------------------------------------------------------------

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "agents.ts")]
pub struct PlannedEffect {
    #[serde(rename = "type")]
    pub effect_type: String,
    #[serde(default)]
    pub color: Option<String>,
    pub start: f32,
    #[serde(default = "default_planned_duration")]
    pub duration: f32,
}

fn default_planned_duration() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentPlan {
    /// Commands to run through the text command path.
    Actions(Vec<String>),
    Effects(Vec<PlannedEffect>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub plan: AgentPlan,
    pub used_fallback: bool,
}

static ACTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*(?:[-*]\s*)?ACTION:\s*(.+?)\s*$").expect("valid regex"));

pub fn parse_reply(reply: &str, song: &SongContext) -> ParsedReply {
    let actions: Vec<String> = ACTION_LINE
        .captures_iter(reply)
        .map(|c| c[1].trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if !actions.is_empty() {
        return ParsedReply {
            plan: AgentPlan::Actions(actions),
            used_fallback: false,
        };
    }

    if let (Some(open), Some(close)) = (reply.find('['), reply.rfind(']')) {
        if open < close {
            match serde_json::from_str::<Vec<PlannedEffect>>(&reply[open..=close]) {
                Ok(effects) if !effects.is_empty() => {
                    return ParsedReply {
                        plan: AgentPlan::Effects(effects),
                        used_fallback: false,
                    };
                }
                Ok(_) => log::warn!("[agent] empty effect array, using fallback plan"),
                Err(e) => log::warn!("[agent] malformed effect array ({}), using fallback plan", e),
            }
        }
    } else {
        log::warn!("[agent] reply had no actions or JSON, using fallback plan");
    }

    ParsedReply {
        plan: AgentPlan::Effects(fallback_plan(song)),
        used_fallback: true,
    }
}

/// One effect per arrangement section, typed by the section name and colored
/// from the chase palette.
pub fn fallback_plan(song: &SongContext) -> Vec<PlannedEffect> {
    let beat = song.beat_duration();
    if song.arrangement.is_empty() {
        let duration = if song.has_duration() { song.duration.min(8.0) } else { 8.0 };
        return vec![PlannedEffect {
            effect_type: "fade".into(),
            color: Some(CHASE_PALETTE[0].into()),
            start: 0.0,
            duration,
        }];
    }

    let mut sections: Vec<_> = song.arrangement.iter().collect();
    sections.sort_by(|a, b| a.start.total_cmp(&b.start));
    sections
        .iter()
        .enumerate()
        .map(|(i, section)| {
            let name = section.name.to_lowercase();
            let effect_type = if name.contains("drop") || name.contains("chorus") {
                "flash"
            } else if name.contains("build") {
                "strobe"
            } else if name.contains("break") || name.contains("bridge") {
                "pulse"
            } else {
                "fade"
            };
            PlannedEffect {
                effect_type: effect_type.into(),
                color: Some(CHASE_PALETTE[i % CHASE_PALETTE.len()].into()),
                start: section.start.max(0.0),
                duration: (section.end - section.start).clamp(beat, 8.0 * beat),
            }
        })
        .collect()
}

/// Turn planned effects into scheduled effects on the RGB fixtures (every
/// fixture when there are none), sharing one group id.
pub fn planned_to_effects(planned: &[PlannedEffect], library: &FixtureLibrary) -> Vec<ScheduledEffect> {
    let mut targets = library.by_type(FixtureType::Rgb);
    if targets.is_empty() {
        targets = library.ids();
    }
    let group = new_group_id();

    let mut effects = Vec::new();
    for plan in planned {
        if !plan.start.is_finite() || plan.start < 0.0 {
            continue;
        }
        for id in &targets {
            let Some(fixture) = library.get(id) else { continue };
            let action = if fixture.supports(&plan.effect_type) {
                plan.effect_type.to_lowercase()
            } else if fixture.supports("flash") {
                "flash".to_string()
            } else {
                continue;
            };
            let mut params = EffectParams::new();
            if let Some(color) = &plan.color {
                params.insert("color".into(), json!(color));
            }
            effects.push(
                ScheduledEffect::new(id.clone(), EffectKind::preset(action), plan.start, plan.duration.max(0.0))
                    .with_params(params)
                    .with_group(Some(group.clone())),
            );
        }
    }
    effects
}

pub fn build_prompt(song: &SongContext, library: &FixtureLibrary, request: &str) -> String {
    let sections: Vec<String> = song
        .arrangement
        .iter()
        .map(|s| format!("{} {:.1}-{:.1}s", s.name, s.start, s.end))
        .collect();
    let fixtures: Vec<String> = library
        .iter()
        .map(|f| format!("{} ({})", f.id(), f.kind().as_str()))
        .collect();
    format!(
        "Song: {:.0} bpm, {:.1}s. Sections: {}.\nFixtures: {}.\nRequest: {}\n\
         Answer with one `ACTION: <command>` line per effect, or a JSON array of \
         {{\"type\", \"color\", \"start\", \"duration\"}} objects.",
        song.effective_bpm(),
        song.duration,
        if sections.is_empty() { "none".to_string() } else { sections.join(", ") },
        fixtures.join(", "),
        if request.trim().is_empty() { "light the song" } else { request.trim() }
    )
}

// -----------------------------------------------------------------------------
// Built-in agent
// -----------------------------------------------------------------------------

/// Offline planner that answers with ACTION lines derived from the
/// arrangement. Registered by default so `call planner` works without a
/// remote model.
pub struct ArrangementPlanner {
    song: SongContext,
}

impl ArrangementPlanner {
    pub fn new(song: SongContext) -> Self {
        Self { song }
    }
}

#[async_trait]
impl TextAgent for ArrangementPlanner {
    fn name(&self) -> &str {
        "planner"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, String> {
        let lines: Vec<String> = fallback_plan(&self.song)
            .iter()
            .map(|p| {
                format!(
                    "ACTION: {} all {} at {:.2}s for {:.2}s",
                    p.effect_type,
                    p.color.as_deref().unwrap_or("white"),
                    p.start,
                    p.duration
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::song::Section;

    fn song() -> SongContext {
        SongContext {
            bpm: 120.0,
            duration: 120.0,
            arrangement: vec![
                Section { name: "Intro".into(), start: 0.0, end: 16.0 },
                Section { name: "Drop".into(), start: 16.0, end: 17.0 },
            ],
            ..Default::default()
        }
    }

    struct SlowAgent;

    #[async_trait]
    impl TextAgent for SlowAgent {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    #[test]
    fn action_lines_win() {
        let reply = "Sure!\nACTION: flash all red at 10s\n - ACTION: fade parcan_l at 1:00\nthanks";
        let parsed = parse_reply(reply, &song());
        assert_eq!(
            parsed.plan,
            AgentPlan::Actions(vec!["flash all red at 10s".into(), "fade parcan_l at 1:00".into()])
        );
    }

    #[test]
    fn json_array_and_fallback() {
        let reply = r#"Here: [{"type": "strobe", "color": "blue", "start": 4.0, "duration": 2.0}]"#;
        let parsed = parse_reply(reply, &song());
        assert!(!parsed.used_fallback);
        assert!(matches!(parsed.plan, AgentPlan::Effects(ref e) if e[0].effect_type == "strobe"));

        let broken = parse_reply(r#"[{"type": "strobe", "start": }]"#, &song());
        assert!(broken.used_fallback);
        let AgentPlan::Effects(plan) = broken.plan else {
            panic!("expected fallback effects");
        };
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].effect_type, "flash");
        assert_eq!(plan[1].duration, 1.0);
        assert_eq!(plan[0].duration, 4.0);
    }

    #[tokio::test]
    async fn calls_are_bounded_by_timeout() {
        let err = call_agent(&SlowAgent, "hi", Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, ShowError::Agent(_)));

        let planner = ArrangementPlanner::new(song());
        let reply = call_agent(&planner, "", Duration::from_secs(1)).await.expect("reply");
        assert!(reply.starts_with("ACTION: fade all red at 0.00s"));
    }

    #[test]
    fn registry_is_case_insensitive() {
        let registry = AgentRegistry::new();
        registry.register(Arc::new(ArrangementPlanner::new(song())));
        assert!(registry.get("Planner").is_some());
        assert_eq!(registry.names(), vec!["planner".to_string()]);
    }
}
