//! Per-song metadata: plan markers, a cached context summary and a few
//! counters refreshed after each mutation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{ShowError, ShowResult};
use crate::models::plans::PlanMarker;
use crate::storage::effects::write_json;

pub const METADATA_FILE: &str = "metadata.json";

#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "metadata.ts")]
pub struct SongMetadata {
    pub song_id: String,
    #[serde(default)]
    pub bpm: f32,
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub effect_count: u32,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub plans: Vec<PlanMarker>,
    /// Result of the last `analyze context`, dropped by `analyze context reset`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_summary: Option<serde_json::Value>,
}

impl SongMetadata {
    pub fn new(song_id: impl Into<String>) -> Self {
        Self {
            song_id: song_id.into(),
            ..Default::default()
        }
    }

    pub fn path(song_dir: &Path) -> PathBuf {
        song_dir.join(METADATA_FILE)
    }

    /// Load `metadata.json`, or a fresh record when the file does not exist.
    pub fn load_or_new(song_id: &str, song_dir: &Path) -> ShowResult<Self> {
        let path = Self::path(song_dir);
        if !path.exists() {
            return Ok(Self::new(song_id));
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ShowError::Persistence(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut meta: SongMetadata = serde_json::from_str(&raw)
            .map_err(|e| ShowError::Persistence(format!("Failed to parse {}: {}", path.display(), e)))?;
        if meta.song_id.is_empty() {
            meta.song_id = song_id.to_string();
        }
        Ok(meta)
    }

    pub fn save(&mut self, song_dir: &Path) -> ShowResult<()> {
        self.updated_at = chrono::Utc::now().to_rfc3339();
        let result = write_json(&Self::path(song_dir), self);
        if let Err(err) = &result {
            log::error!("[store] {}", err);
        }
        result
    }

    // -------------------------------------------------------------------------
    // Plan markers
    // -------------------------------------------------------------------------

    pub fn create_plan(
        &mut self,
        name: &str,
        start: f32,
        end: Option<f32>,
        description: &str,
    ) -> ShowResult<PlanMarker> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShowError::Validation("plan name is empty".into()));
        }
        if !start.is_finite() || start < 0.0 {
            return Err(ShowError::Validation(format!("invalid plan start {}", start)));
        }
        if let Some(end) = end {
            if !end.is_finite() || end < start {
                return Err(ShowError::Validation(format!(
                    "plan end {:.2}s is before start {:.2}s",
                    end, start
                )));
            }
        }
        if self.find_plan(name).is_some() {
            return Err(ShowError::Validation(format!("plan '{}' already exists", name)));
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        let plan = PlanMarker {
            id: format!("plan-{}", &id[..8]),
            name: name.to_string(),
            start,
            end,
            description: description.trim().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.plans.push(plan.clone());
        self.plans.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(plan)
    }

    /// Match by id first, then case-insensitive name.
    pub fn find_plan(&self, key: &str) -> Option<&PlanMarker> {
        let key = key.trim();
        self.plans
            .iter()
            .find(|p| p.id == key)
            .or_else(|| self.plans.iter().find(|p| p.name.eq_ignore_ascii_case(key)))
    }

    pub fn delete_plan(&mut self, key: &str) -> Option<PlanMarker> {
        let id = self.find_plan(key)?.id.clone();
        let index = self.plans.iter().position(|p| p.id == id)?;
        Some(self.plans.remove(index))
    }

    pub fn reset_plans(&mut self) -> usize {
        let count = self.plans.len();
        self.plans.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_are_ordered_and_addressable_by_name_or_id() {
        let mut meta = SongMetadata::new("song");
        let late = meta.create_plan("Outro lights", 180.0, None, "").expect("create");
        meta.create_plan("Drop hit", 60.0, Some(75.0), "big").expect("create");

        assert_eq!(meta.plans[0].name, "Drop hit");
        assert!(meta.create_plan("drop HIT", 10.0, None, "").is_err());
        assert!(meta.create_plan("bad", 10.0, Some(5.0), "").is_err());

        assert_eq!(meta.delete_plan(&late.id).map(|p| p.name), Some("Outro lights".into()));
        assert!(meta.delete_plan("drop hit").is_some());
        assert!(meta.delete_plan("drop hit").is_none());
    }

    #[test]
    fn round_trips_through_song_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut meta = SongMetadata::load_or_new("song", dir.path()).expect("fresh");
        assert!(meta.plans.is_empty());
        meta.create_plan("Intro", 0.0, None, "").expect("create");
        meta.save(dir.path()).expect("save");

        let mut loaded = SongMetadata::load_or_new("song", dir.path()).expect("load");
        assert_eq!(loaded.plans.len(), 1);
        assert!(!loaded.updated_at.is_empty());
        assert_eq!(loaded.reset_plans(), 1);
    }
}
