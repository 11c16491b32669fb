//! Per-song files under `<data_dir>/<song_id>/`:
//!
//! - `effects.json`  the scheduled-effect collection
//! - `metadata.json` plan markers and cached analysis
//! - `timeline.txt`  debug dump of the rendered canvas

pub mod effects;
pub mod metadata;

use std::path::{Path, PathBuf};

use crate::canvas::TimelineCanvas;
use crate::error::{ShowError, ShowResult};

pub use effects::{new_effect_id, new_group_id, EffectStore};
pub use metadata::SongMetadata;

pub const TIMELINE_FILE: &str = "timeline.txt";

pub fn write_timeline(song_dir: &Path, canvas: &TimelineCanvas) -> ShowResult<PathBuf> {
    std::fs::create_dir_all(song_dir).map_err(|e| {
        ShowError::Persistence(format!("Failed to create {}: {}", song_dir.display(), e))
    })?;
    let path = song_dir.join(TIMELINE_FILE);
    std::fs::write(&path, canvas.export_text())
        .map_err(|e| ShowError::Persistence(format!("Failed to write {}: {}", path.display(), e)))?;
    Ok(path)
}
