//! Ordered, persisted collection of scheduled effects for one song.
//!
//! The collection is always sorted by `(fixture_id, start_time)` and written
//! to `effects.json` after every mutation. A failed write is logged and
//! returned to the caller, but the in-memory change is kept.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ShowError, ShowResult};
use crate::models::effects::{EffectDelta, ScheduledEffect};

pub const EFFECTS_FILE: &str = "effects.json";

#[derive(Serialize, Deserialize)]
struct EffectsFile {
    song_id: String,
    effects: Vec<ScheduledEffect>,
}

pub struct EffectStore {
    song_id: String,
    path: Option<PathBuf>,
    effects: Vec<ScheduledEffect>,
}

pub fn new_effect_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("fx-{}", &id[..12])
}

pub fn new_group_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("grp-{}", &id[..8])
}

fn effect_order(a: &ScheduledEffect, b: &ScheduledEffect) -> Ordering {
    a.fixture_id
        .cmp(&b.fixture_id)
        .then(a.start_time.total_cmp(&b.start_time))
}

impl EffectStore {
    /// Store that never touches disk.
    pub fn in_memory(song_id: impl Into<String>) -> Self {
        Self {
            song_id: song_id.into(),
            path: None,
            effects: Vec::new(),
        }
    }

    /// Open the store backed by `<song_dir>/effects.json`, loading it when present.
    pub fn open(song_id: impl Into<String>, song_dir: &Path) -> ShowResult<Self> {
        let song_id = song_id.into();
        let path = song_dir.join(EFFECTS_FILE);
        let mut store = Self {
            song_id,
            path: Some(path.clone()),
            effects: Vec::new(),
        };

        if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                ShowError::Persistence(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let file: EffectsFile = serde_json::from_str(&raw).map_err(|e| {
                ShowError::Persistence(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            let mut effects = Vec::with_capacity(file.effects.len());
            for mut effect in file.effects {
                if effect.id.is_empty() || effects.iter().any(|e: &ScheduledEffect| e.id == effect.id) {
                    log::warn!("[store] reassigning missing/duplicate effect id in {}", path.display());
                    effect.id = new_effect_id();
                }
                effects.push(effect);
            }
            store.effects = effects;
            store.effects.sort_by(effect_order);
            log::info!(
                "[store] loaded {} effects for song {}",
                store.effects.len(),
                store.song_id
            );
        }
        Ok(store)
    }

    pub fn song_id(&self) -> &str {
        &self.song_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn all(&self) -> &[ScheduledEffect] {
        &self.effects
    }

    pub fn get(&self, id: &str) -> Option<&ScheduledEffect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Effects with `start_time <= time <= start_time + duration`.
    pub fn active_at(&self, time: f32) -> Vec<&ScheduledEffect> {
        self.effects.iter().filter(|e| e.is_active_at(time)).collect()
    }

    /// Effects on `fixture_id` starting within `tolerance` seconds of `time`.
    pub fn find_near(&self, fixture_id: &str, time: f32, tolerance: f32) -> Vec<&ScheduledEffect> {
        self.effects
            .iter()
            .filter(|e| e.fixture_id == fixture_id && (e.start_time - time).abs() <= tolerance)
            .collect()
    }

    pub fn by_group(&self, group_id: &str) -> Vec<&ScheduledEffect> {
        self.effects
            .iter()
            .filter(|e| e.group_id.as_deref() == Some(group_id))
            .collect()
    }

    /// Insert one effect, assigning an id when absent. A duplicate explicit id
    /// is rejected without touching the collection.
    pub fn add(&mut self, effect: ScheduledEffect) -> ShowResult<String> {
        let mut delta = self.add_many(vec![effect])?;
        Ok(delta.added.remove(0).id)
    }

    /// Insert a batch atomically: either every effect is accepted or none is.
    pub fn add_many(&mut self, effects: Vec<ScheduledEffect>) -> ShowResult<EffectDelta> {
        let mut prepared: Vec<ScheduledEffect> = Vec::with_capacity(effects.len());
        for mut effect in effects {
            if !effect.start_time.is_finite() || !effect.duration.is_finite() {
                return Err(ShowError::Validation(format!(
                    "non-finite timing for effect on {}",
                    effect.fixture_id
                )));
            }
            if effect.start_time < 0.0 || effect.duration < 0.0 {
                return Err(ShowError::Validation(format!(
                    "negative timing for effect on {} (start {}, duration {})",
                    effect.fixture_id, effect.start_time, effect.duration
                )));
            }
            if effect.id.is_empty() {
                effect.id = new_effect_id();
            } else if self.contains(&effect.id) || prepared.iter().any(|p| p.id == effect.id) {
                return Err(ShowError::Validation(format!(
                    "effect id '{}' already exists",
                    effect.id
                )));
            }
            prepared.push(effect);
        }

        self.effects.extend(prepared.iter().cloned());
        self.effects.sort_by(effect_order);
        let delta = EffectDelta {
            added: prepared,
            removed: Vec::new(),
            total: self.effects.len(),
        };
        self.persist()?;
        Ok(delta)
    }

    /// Remove effects on `fixture_id` starting within `tolerance` of `time`.
    pub fn remove(&mut self, fixture_id: &str, time: f32, tolerance: f32) -> ShowResult<EffectDelta> {
        self.remove_where(|e| e.fixture_id == fixture_id && (e.start_time - time).abs() <= tolerance)
    }

    pub fn remove_by_id(&mut self, id: &str) -> ShowResult<EffectDelta> {
        self.remove_where(|e| e.id == id)
    }

    pub fn remove_by_ids(&mut self, ids: &[String]) -> ShowResult<EffectDelta> {
        self.remove_where(|e| ids.contains(&e.id))
    }

    pub fn remove_by_group(&mut self, group_id: &str) -> ShowResult<EffectDelta> {
        self.remove_where(|e| e.group_id.as_deref() == Some(group_id))
    }

    /// Empty the collection. Confirmation is the dispatcher's job.
    pub fn remove_all(&mut self) -> ShowResult<EffectDelta> {
        self.remove_where(|_| true)
    }

    fn remove_where<F>(&mut self, predicate: F) -> ShowResult<EffectDelta>
    where
        F: Fn(&ScheduledEffect) -> bool,
    {
        let mut removed = Vec::new();
        self.effects.retain(|e| {
            if predicate(e) {
                removed.push(e.id.clone());
                false
            } else {
                true
            }
        });
        let delta = EffectDelta {
            added: Vec::new(),
            removed,
            total: self.effects.len(),
        };
        if !delta.removed.is_empty() {
            self.persist()?;
        }
        Ok(delta)
    }

    /// Write the collection to disk. No-op for in-memory stores.
    pub fn persist(&self) -> ShowResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = EffectsFile {
            song_id: self.song_id.clone(),
            effects: self.effects.clone(),
        };
        let result = write_json(path, &file);
        if let Err(err) = &result {
            log::error!("[store] {}", err);
        }
        result
    }
}

/// Serialize `value` to `path` via a temp file + rename so readers never see a
/// truncated file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ShowResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ShowError::Persistence(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ShowError::Persistence(format!("Failed to serialize {}: {}", path.display(), e)))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .map_err(|e| ShowError::Persistence(format!("Failed to write {}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| ShowError::Persistence(format!("Failed to replace {}: {}", path.display(), e)))
}
