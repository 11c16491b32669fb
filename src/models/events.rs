use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::effects::EffectDelta;
use super::playback::PlaybackSnapshot;
use super::plans::PlanMarker;
use super::tasks::TaskInfo;

/// Everything pushed to connected observers.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export, export_to = "events.ts")]
pub enum ShowEvent {
    SongLoaded {
        song_id: String,
        duration: f32,
        bpm: f32,
    },
    CanvasUpdated {
        song_id: String,
        generation: u32,
        frame_count: u32,
        fps: u32,
        rendered: u32,
        total: u32,
    },
    EffectsChanged {
        song_id: String,
        delta: EffectDelta,
    },
    Playback(PlaybackSnapshot),
    TaskUpdated(TaskInfo),
    PlansChanged {
        song_id: String,
        plans: Vec<PlanMarker>,
    },
}
