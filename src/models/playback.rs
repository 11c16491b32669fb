use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Snapshot of the reconciled playback clock sent to observers.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "playback.ts")]
pub struct PlaybackSnapshot {
    /// Whether an external position report has been received yet
    pub is_synced: bool,
    pub is_playing: bool,
    /// Extrapolated playhead position in seconds
    pub current_time: f32,
    /// Drift measured at the most recent sync (reported - extrapolated)
    pub last_drift: f32,
}
