//! Per-song show state and the controller that owns it.
//!
//! A [`ShowSession`] is built when a song loads and holds everything bound to
//! that song: the effect store, the rendered canvas, plan markers and the
//! playback clock. Render passes paint a fresh canvas off to the side while
//! holding the store lock and swap it in whole, so readers only ever see a
//! complete frame set.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde_json::{json, Value};

use crate::agents::{self, AgentRegistry, ArrangementPlanner, PlannedEffect};
use crate::broadcast::Broadcaster;
use crate::canvas::TimelineCanvas;
use crate::commands::CommandDispatcher;
use crate::error::{ShowError, ShowResult};
use crate::fixtures::FixtureLibrary;
use crate::interpreter::literal::{parse_add_command, parse_literal_effect};
use crate::interpreter::{self, ExecuteOptions, InterpretContext, InterpretedCommand};
use crate::models::commands::CommandResponse;
use crate::models::effects::{EffectDelta, ScheduledEffect};
use crate::models::events::ShowEvent;
use crate::models::plans::PlanMarker;
use crate::models::playback::PlaybackSnapshot;
use crate::models::song::SongContext;
use crate::playback::PlaybackClock;
use crate::render_engine::{RenderReport, Renderer, ValidationReport};
use crate::settings::EngineSettings;
use crate::storage::{self, EffectStore, SongMetadata};
use crate::tasks::TaskRegistry;

pub struct ShowSession {
    song_id: String,
    song: SongContext,
    fixtures: Arc<FixtureLibrary>,
    presets: Vec<String>,
    settings: Arc<EngineSettings>,
    song_dir: Option<PathBuf>,
    store: Mutex<EffectStore>,
    canvas: RwLock<Arc<TimelineCanvas>>,
    renderer: Renderer,
    metadata: Mutex<SongMetadata>,
    clock: PlaybackClock,
    broadcaster: Broadcaster,
}

/// What a text command did to the effect list.
#[derive(Debug, Clone, Default)]
pub struct TextOutcome {
    pub message: String,
    pub delta: EffectDelta,
}

impl ShowSession {
    /// Build the session for `song_id`, loading any persisted effects and
    /// metadata, and paint the initial canvas.
    pub fn open(
        song_id: &str,
        song: SongContext,
        fixtures: Arc<FixtureLibrary>,
        settings: Arc<EngineSettings>,
        broadcaster: Broadcaster,
    ) -> ShowResult<Self> {
        let song_dir = settings.persist.then(|| settings.song_dir(song_id));
        let (store, mut metadata) = match &song_dir {
            Some(dir) => (EffectStore::open(song_id, dir)?, SongMetadata::load_or_new(song_id, dir)?),
            None => (EffectStore::in_memory(song_id), SongMetadata::new(song_id)),
        };
        metadata.bpm = song.effective_bpm();
        metadata.duration = song.duration;
        metadata.effect_count = store.len() as u32;

        let canvas = TimelineCanvas::new(settings.fps, song.duration.max(0.0) + settings.post_roll_seconds);
        log::info!(
            "[session] opened '{}' ({:.1}s @ {:.0} bpm, {} frames, {} stored effects)",
            song_id,
            song.duration,
            song.effective_bpm(),
            canvas.frame_count(),
            store.len()
        );

        let session = Self {
            song_id: song_id.to_string(),
            presets: fixtures.all_presets(),
            renderer: Renderer::new(fixtures.clone(), song.effective_bpm()),
            clock: PlaybackClock::new(settings.drift_tolerance),
            canvas: RwLock::new(Arc::new(canvas)),
            store: Mutex::new(store),
            metadata: Mutex::new(metadata),
            song,
            fixtures,
            settings,
            song_dir,
            broadcaster,
        };
        if session.effect_count() > 0 {
            session.render_all();
        }
        Ok(session)
    }

    pub fn song_id(&self) -> &str {
        &self.song_id
    }

    pub fn song(&self) -> &SongContext {
        &self.song
    }

    pub fn fixtures(&self) -> &Arc<FixtureLibrary> {
        &self.fixtures
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    /// Snapshot of the current canvas. A later render swaps in a new one;
    /// this handle keeps pointing at the old frames.
    pub fn canvas(&self) -> Arc<TimelineCanvas> {
        self.canvas.read().expect("canvas lock poisoned").clone()
    }

    pub fn effects(&self) -> Vec<ScheduledEffect> {
        self.store.lock().expect("effect store poisoned").all().to_vec()
    }

    pub fn effect_count(&self) -> usize {
        self.store.lock().expect("effect store poisoned").len()
    }

    // -------------------------------------------------------------------------
    // Effect mutations
    // -------------------------------------------------------------------------

    pub fn interpret(&self, text: &str) -> InterpretedCommand {
        let ctx = InterpretContext {
            song: &self.song,
            fixtures: &self.fixtures,
            presets: &self.presets,
            current_time: self.clock.position(),
        };
        interpreter::interpret(text, &ctx)
    }

    /// Run `mutate` against the store and publish the result. A persistence
    /// failure keeps the in-memory change, so observers and the canvas are
    /// still refreshed before the error is returned.
    pub fn mutate_effects<F>(&self, mutate: F) -> ShowResult<EffectDelta>
    where
        F: FnOnce(&mut EffectStore) -> ShowResult<EffectDelta>,
    {
        let (result, fallback) = {
            let mut store = self.store.lock().expect("effect store poisoned");
            let before: HashSet<String> = store.all().iter().map(|e| e.id.clone()).collect();
            let result = mutate(&mut store);
            // On a failed write the delta is rebuilt from what changed in memory
            let fallback = match &result {
                Err(ShowError::Persistence(_)) => Some(diff_since(&before, &store)),
                _ => None,
            };
            (result, fallback)
        };
        match (result, fallback) {
            (Ok(delta), _) => {
                self.after_mutation(&delta);
                Ok(delta)
            }
            (Err(err), Some(delta)) => {
                self.after_mutation(&delta);
                Err(err)
            }
            (Err(err), None) => Err(err),
        }
    }

    fn after_mutation(&self, delta: &EffectDelta) {
        if !delta.is_empty() {
            self.broadcaster.broadcast(ShowEvent::EffectsChanged {
                song_id: self.song_id.clone(),
                delta: delta.clone(),
            });
        }
        {
            let mut metadata = self.metadata.lock().expect("metadata poisoned");
            metadata.effect_count = delta.total as u32;
            if let Some(dir) = &self.song_dir {
                // Logged inside save; the effect change itself already landed
                let _ = metadata.save(dir);
            }
        }
        if self.settings.auto_render {
            self.render_all();
        }
    }

    /// Interpret `text` and execute it. Commands scoring below the configured
    /// confidence floor are rejected before touching the store.
    pub fn execute_command(&self, text: &str) -> ShowResult<TextOutcome> {
        let cmd = self.interpret(text);
        if cmd.confidence < self.settings.min_confidence {
            return Err(ShowError::Parse(format!(
                "'{}' (confidence {:.2} below {:.2})",
                cmd.text, cmd.confidence, self.settings.min_confidence
            )));
        }

        let options = ExecuteOptions::from(self.settings.as_ref());
        let mut outcome = None;
        let delta = self.mutate_effects(|store| {
            let result = interpreter::execute(&cmd, store, &self.fixtures, &self.song, &options)?;
            let delta = result.delta.clone();
            outcome = Some(result);
            Ok(delta)
        })?;

        let message = outcome
            .map(|o| {
                if o.skipped.is_empty() {
                    o.message
                } else {
                    format!("{} (skipped {})", o.message, o.skipped.join("; "))
                }
            })
            .unwrap_or_default();
        Ok(TextOutcome { message, delta })
    }

    /// Literal effect grammar first, then the natural-language interpreter.
    pub fn apply_text(&self, text: &str) -> ShowResult<TextOutcome> {
        let normalized = interpreter::normalize(text);
        if let Some(literal) = parse_literal_effect(&normalized, &self.fixtures, self.song.effective_bpm()) {
            let effects = literal.to_effects(&self.fixtures, self.settings.default_effect_duration);
            let delta = self.mutate_effects(|store| store.add_many(effects))?;
            return Ok(TextOutcome {
                message: format!(
                    "Scheduled {} on {} fixture(s) at {:.2}s",
                    literal.action,
                    delta.added.len(),
                    literal.start
                ),
                delta,
            });
        }
        self.execute_command(&normalized)
    }

    /// `add <action> to <fixture> at <time> [duration]`
    pub fn add_literal(&self, text: &str) -> ShowResult<TextOutcome> {
        let normalized = interpreter::normalize(text);
        let literal = parse_add_command(&normalized, &self.fixtures, self.song.effective_bpm()).ok_or_else(|| {
            ShowError::Parse(format!(
                "'{}' (usage: add <action> to <fixture> at <time> [duration])",
                normalized
            ))
        })?;
        let effects = literal.to_effects(&self.fixtures, self.settings.default_effect_duration);
        let delta = self.mutate_effects(|store| store.add_many(effects))?;
        Ok(TextOutcome {
            message: format!("Added {} effect(s) at {:.2}s", delta.added.len(), literal.start),
            delta,
        })
    }

    /// Schedule an agent's planned effects as one group.
    pub fn apply_planned(&self, planned: &[PlannedEffect]) -> ShowResult<EffectDelta> {
        let effects = agents::planned_to_effects(planned, &self.fixtures);
        if effects.is_empty() {
            return Err(ShowError::Resolution("agent plan produced no schedulable effects".into()));
        }
        self.mutate_effects(|store| store.add_many(effects))
    }

    /// Remove every effect. Confirmation is the caller's job.
    pub fn clear_all(&self) -> ShowResult<EffectDelta> {
        self.mutate_effects(|store| store.remove_all())
    }

    pub fn clear_id(&self, id: &str) -> ShowResult<EffectDelta> {
        self.mutate_effects(|store| {
            if !store.contains(id) {
                return Err(ShowError::Resolution(format!("No effect with id '{}'", id)));
            }
            store.remove_by_id(id)
        })
    }

    pub fn clear_group(&self, group_id: &str) -> ShowResult<EffectDelta> {
        self.mutate_effects(|store| {
            if store.by_group(group_id).is_empty() {
                return Err(ShowError::Resolution(format!("No effects in group '{}'", group_id)));
            }
            store.remove_by_group(group_id)
        })
    }

    // -------------------------------------------------------------------------
    // Rendering
    // -------------------------------------------------------------------------

    /// Repaint the full effect list onto a new canvas and swap it in.
    pub fn render_all(&self) -> RenderReport {
        let (report, canvas) = {
            let store = self.store.lock().expect("effect store poisoned");
            let mut next = self.canvas().blank_like();
            let report = self.renderer.render(store.all(), &mut next, false);
            let next = Arc::new(next);
            *self.canvas.write().expect("canvas lock poisoned") = next.clone();
            (report, next)
        };

        if self.settings.dump_timeline {
            if let Some(dir) = &self.song_dir {
                if let Err(err) = storage::write_timeline(dir, &canvas) {
                    log::error!("[render] {}", err);
                }
            }
        }

        log::info!(
            "[render] '{}' rendered {}/{} effects",
            self.song_id,
            report.rendered,
            report.total
        );
        self.broadcaster.broadcast(ShowEvent::CanvasUpdated {
            song_id: self.song_id.clone(),
            generation: canvas.generation(),
            frame_count: canvas.frame_count() as u32,
            fps: canvas.fps(),
            rendered: report.rendered,
            total: report.total,
        });
        report
    }

    pub fn validate(&self) -> ValidationReport {
        let store = self.store.lock().expect("effect store poisoned");
        self.renderer.validate(store.all())
    }

    // -------------------------------------------------------------------------
    // Plans
    // -------------------------------------------------------------------------

    pub fn plans(&self) -> Vec<PlanMarker> {
        self.metadata.lock().expect("metadata poisoned").plans.clone()
    }

    fn update_metadata<T, F>(&self, apply: F) -> ShowResult<T>
    where
        F: FnOnce(&mut SongMetadata) -> ShowResult<T>,
    {
        let (value, plans) = {
            let mut metadata = self.metadata.lock().expect("metadata poisoned");
            let value = apply(&mut metadata)?;
            if let Some(dir) = &self.song_dir {
                metadata.save(dir)?;
            }
            (value, metadata.plans.clone())
        };
        self.broadcaster.broadcast(ShowEvent::PlansChanged {
            song_id: self.song_id.clone(),
            plans,
        });
        Ok(value)
    }

    pub fn create_plan(&self, name: &str, start: f32, end: Option<f32>, description: &str) -> ShowResult<PlanMarker> {
        self.update_metadata(|m| m.create_plan(name, start, end, description))
    }

    pub fn delete_plan(&self, key: &str) -> ShowResult<PlanMarker> {
        self.update_metadata(|m| {
            m.delete_plan(key)
                .ok_or_else(|| ShowError::Resolution(format!("No plan named '{}'", key.trim())))
        })
    }

    pub fn reset_plans(&self) -> ShowResult<usize> {
        self.update_metadata(|m| Ok(m.reset_plans()))
    }

    // -------------------------------------------------------------------------
    // Analysis
    // -------------------------------------------------------------------------

    /// Cached context summary, computed on first use. Returns whether the
    /// cache was hit.
    pub fn context_summary(&self) -> ShowResult<(Value, bool)> {
        {
            let metadata = self.metadata.lock().expect("metadata poisoned");
            if let Some(summary) = &metadata.context_summary {
                return Ok((summary.clone(), true));
            }
        }
        let summary = summarize_context(&self.song);
        let mut metadata = self.metadata.lock().expect("metadata poisoned");
        metadata.context_summary = Some(summary.clone());
        if let Some(dir) = &self.song_dir {
            metadata.save(dir)?;
        }
        Ok((summary, false))
    }

    pub fn reset_context_summary(&self) -> ShowResult<bool> {
        let mut metadata = self.metadata.lock().expect("metadata poisoned");
        let had = metadata.context_summary.take().is_some();
        if let Some(dir) = &self.song_dir {
            metadata.save(dir)?;
        }
        Ok(had)
    }

    pub fn beats_report(&self, start: f32, end: f32) -> ShowResult<Value> {
        if !start.is_finite() || !end.is_finite() || end <= start {
            return Err(ShowError::Validation(format!(
                "beat window {:.2}s..{:.2}s is empty",
                start, end
            )));
        }
        let beats = self.song.beats_between(start, end);
        Ok(json!({
            "start": start,
            "end": end,
            "count": beats.len(),
            "meanVolume": mean(beats.iter().map(|b| b.volume)),
            "meanEnergy": mean(beats.iter().map(|b| b.energy)),
            "peakEnergy": beats.iter().map(|b| b.energy).fold(0.0f32, f32::max),
            "section": self.song.section_at(start).map(|s| s.name.as_str()),
            "beats": beats,
        }))
    }

    // -------------------------------------------------------------------------
    // Playback
    // -------------------------------------------------------------------------

    pub fn sync_playback(&self, is_playing: bool, current_time: f32) -> PlaybackSnapshot {
        let snapshot = self.clock.sync(is_playing, current_time);
        self.broadcaster.broadcast(ShowEvent::Playback(snapshot.clone()));
        snapshot
    }
}

/// Delta between an earlier id snapshot and the store as it is now.
fn diff_since(before: &HashSet<String>, store: &EffectStore) -> EffectDelta {
    let now: HashSet<&str> = store.all().iter().map(|e| e.id.as_str()).collect();
    EffectDelta {
        added: store
            .all()
            .iter()
            .filter(|e| !before.contains(&e.id))
            .cloned()
            .collect(),
        removed: before
            .iter()
            .filter(|id| !now.contains(id.as_str()))
            .cloned()
            .collect(),
        total: store.len(),
    }
}

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

pub fn summarize_context(song: &SongContext) -> Value {
    let mut sections: Vec<_> = song.arrangement.iter().collect();
    sections.sort_by(|a, b| a.start.total_cmp(&b.start));
    let intervals: Vec<f32> = song
        .beats
        .windows(2)
        .map(|pair| pair[1].time - pair[0].time)
        .filter(|d| *d > 0.0)
        .collect();
    let measured_bpm = {
        let avg = mean(intervals.iter().copied());
        if avg > 0.0 {
            60.0 / avg
        } else {
            0.0
        }
    };
    json!({
        "bpm": song.effective_bpm(),
        "measuredBpm": measured_bpm,
        "duration": song.duration,
        "sections": sections,
        "keyMoments": song.key_moments,
        "beatCount": song.beats.len(),
        "meanEnergy": mean(song.beats.iter().map(|b| b.energy)),
        "meanVolume": mean(song.beats.iter().map(|b| b.volume)),
    })
}

// -----------------------------------------------------------------------------
// Controller
// -----------------------------------------------------------------------------

/// Process-wide entry point: owns the active session and the services shared
/// across song switches.
pub struct ShowController {
    settings: Arc<EngineSettings>,
    fixtures: Arc<FixtureLibrary>,
    session: RwLock<Option<Arc<ShowSession>>>,
    broadcaster: Broadcaster,
    tasks: TaskRegistry,
    agents: AgentRegistry,
    dispatcher: CommandDispatcher,
}

impl ShowController {
    pub fn new(settings: EngineSettings, fixtures: FixtureLibrary) -> Self {
        let broadcaster = Broadcaster::new();
        Self {
            settings: Arc::new(settings),
            fixtures: Arc::new(fixtures),
            session: RwLock::new(None),
            tasks: TaskRegistry::new(broadcaster.clone()),
            agents: AgentRegistry::new(),
            dispatcher: CommandDispatcher::with_default_handlers(),
            broadcaster,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn fixtures(&self) -> &Arc<FixtureLibrary> {
        &self.fixtures
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.agent_timeout_secs.max(1))
    }

    /// Switch to a new song. The previous session, its canvas and its renderer
    /// are dropped once the last in-flight command releases them.
    pub fn load_song(&self, song_id: &str, song: SongContext) -> ShowResult<Arc<ShowSession>> {
        let session = Arc::new(ShowSession::open(
            song_id,
            song.clone(),
            self.fixtures.clone(),
            self.settings.clone(),
            self.broadcaster.clone(),
        )?);
        self.agents.register(Arc::new(ArrangementPlanner::new(song.clone())));
        *self.session.write().expect("session lock poisoned") = Some(session.clone());

        self.broadcaster.broadcast(ShowEvent::SongLoaded {
            song_id: song_id.to_string(),
            duration: song.duration,
            bpm: song.effective_bpm(),
        });
        Ok(session)
    }

    pub fn session(&self) -> ShowResult<Arc<ShowSession>> {
        self.session
            .read()
            .expect("session lock poisoned")
            .clone()
            .ok_or(ShowError::NoSession)
    }

    pub fn subscribe(&self) -> (u64, tokio::sync::mpsc::UnboundedReceiver<ShowEvent>) {
        self.broadcaster.subscribe()
    }

    pub fn sync_playback(&self, is_playing: bool, current_time: f32) -> ShowResult<PlaybackSnapshot> {
        Ok(self.session()?.sync_playback(is_playing, current_time))
    }

    /// Run one text command through the handler chain.
    pub async fn dispatch(&self, text: &str) -> CommandResponse {
        self.dispatcher.dispatch(self, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::FixtureConfig;
    use crate::models::song::{Beat, Section};

    fn library() -> FixtureLibrary {
        let configs: Vec<FixtureConfig> = serde_json::from_value(json!([
            {"id": "parcan_l", "type": "rgb", "channels": {"red": 1, "green": 2, "blue": 3, "dim": 4}},
            {"id": "parcan_r", "type": "rgb", "channels": {"red": 5, "green": 6, "blue": 7, "dim": 8}}
        ]))
        .expect("configs");
        FixtureLibrary::from_configs(configs)
    }

    fn song() -> SongContext {
        SongContext {
            bpm: 120.0,
            duration: 60.0,
            arrangement: vec![Section { name: "Drop".into(), start: 30.0, end: 45.0 }],
            beats: (0..8)
                .map(|i| Beat { time: i as f32 * 0.5, volume: 0.5, energy: i as f32 / 8.0 })
                .collect(),
            ..Default::default()
        }
    }

    fn settings(dir: &std::path::Path) -> EngineSettings {
        EngineSettings {
            data_dir: dir.to_path_buf(),
            ..EngineSettings::default()
        }
    }

    #[test]
    fn render_swaps_in_a_new_canvas() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = ShowController::new(settings(dir.path()), library());
        let session = controller.load_song("song", song()).expect("load");

        let before = session.canvas();
        session.apply_text("flash parcan_l red at 10s for 1s").expect("apply");
        let after = session.canvas();

        assert_ne!(before.generation(), after.generation());
        assert!(before.is_blank());
        assert_eq!(after.channel_value(10.5, 1), 255);
        assert!(dir.path().join("song").join(storage::TIMELINE_FILE).exists());
    }

    #[test]
    fn effects_survive_a_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = ShowController::new(settings(dir.path()), library());
        let session = controller.load_song("song", song()).expect("load");
        session.add_literal("add flash to all at 5s 1s").expect("add");
        session.create_plan("Drop", 30.0, None, "").expect("plan");

        let reloaded = controller.load_song("song", song()).expect("reload");
        assert_eq!(reloaded.effect_count(), 2);
        assert_eq!(reloaded.plans().len(), 1);
        assert_eq!(reloaded.canvas().channel_value(5.2, 5), 255);
    }

    #[test]
    fn failed_write_still_announces_the_change() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = ShowController::new(settings(dir.path()), library());
        let session = controller.load_song("song", song()).expect("load");
        session.add_literal("add flash to parcan_l at 5s 1s").expect("add");

        let file = dir.path().join("song").join(storage::effects::EFFECTS_FILE);
        std::fs::remove_file(&file).expect("remove effects file");
        std::fs::create_dir(&file).expect("block effects file");
        let (_, mut events) = controller.subscribe();

        let err = session.add_literal("add flash to parcan_r at 8s 1s").unwrap_err();
        assert!(matches!(err, ShowError::Persistence(_)));
        assert_eq!(session.effect_count(), 2);

        let mut announced = None;
        while let Ok(event) = events.try_recv() {
            if let ShowEvent::EffectsChanged { delta, .. } = event {
                announced = Some(delta);
            }
        }
        let delta = announced.expect("effects changed event");
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].fixture_id, "parcan_r");
        assert_eq!(delta.total, 2);
    }

    #[test]
    fn clear_by_unknown_id_is_a_resolution_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = ShowController::new(settings(dir.path()), library());
        let session = controller.load_song("song", song()).expect("load");
        assert!(matches!(session.clear_id("fx-nope"), Err(ShowError::Resolution(_))));
    }

    #[test]
    fn context_summary_is_cached_until_reset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = ShowController::new(settings(dir.path()), library());
        let session = controller.load_song("song", song()).expect("load");

        let (summary, cached) = session.context_summary().expect("summary");
        assert!(!cached);
        assert_eq!(summary["beatCount"], 8);
        assert!((summary["measuredBpm"].as_f64().unwrap_or_default() - 120.0).abs() < 0.01);
        assert!(session.context_summary().expect("summary").1);
        assert!(session.reset_context_summary().expect("reset"));
        assert!(!session.context_summary().expect("summary").1);

        let report = session.beats_report(1.0, 2.0).expect("beats");
        assert_eq!(report["count"], 2);
        assert!(report["section"].is_null());
        let drop = session.beats_report(31.0, 33.0).expect("beats");
        assert_eq!(drop["section"], "Drop");
        assert!(session.beats_report(2.0, 1.0).is_err());
    }

    #[test]
    fn no_session_before_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = ShowController::new(settings(dir.path()), library());
        assert!(matches!(controller.session(), Err(ShowError::NoSession)));
    }
}
