use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Tempo used when the analysis could not provide one.
pub const FALLBACK_BPM: f32 = 120.0;

/// Read-only musical context produced by the external analysis pipeline.
#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[ts(export, export_to = "song.ts")]
pub struct SongContext {
    #[serde(default)]
    pub bpm: f32,
    /// Seconds. Zero when unknown.
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub arrangement: Vec<Section>,
    #[serde(default)]
    pub beats: Vec<Beat>,
    #[serde(default)]
    pub key_moments: Vec<KeyMoment>,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "song.ts")]
pub struct Section {
    pub name: String,
    pub start: f32,
    pub end: f32,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "song.ts")]
pub struct Beat {
    pub time: f32,
    #[serde(default)]
    pub volume: f32,
    #[serde(default)]
    pub energy: f32,
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "song.ts")]
pub struct KeyMoment {
    pub time: f32,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl SongContext {
    pub fn load(path: &std::path::Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read song context {}: {}", path.display(), e))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("Failed to parse song context {}: {}", path.display(), e))
    }

    pub fn effective_bpm(&self) -> f32 {
        if self.bpm.is_finite() && self.bpm > 0.0 {
            self.bpm
        } else {
            FALLBACK_BPM
        }
    }

    /// Seconds per beat.
    pub fn beat_duration(&self) -> f32 {
        60.0 / self.effective_bpm()
    }

    pub fn has_duration(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }

    /// Arrangement sections whose name contains `keyword` (case-insensitive),
    /// in timeline order.
    pub fn sections_matching(&self, keyword: &str) -> Vec<&Section> {
        let keyword = keyword.to_lowercase();
        let mut sections: Vec<&Section> = self
            .arrangement
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&keyword))
            .collect();
        sections.sort_by(|a, b| a.start.total_cmp(&b.start));
        sections
    }

    /// Key moments whose name or description contains `keyword`.
    pub fn moments_matching(&self, keyword: &str) -> Vec<&KeyMoment> {
        let keyword = keyword.to_lowercase();
        let mut moments: Vec<&KeyMoment> = self
            .key_moments
            .iter()
            .filter(|m| {
                m.name.to_lowercase().contains(&keyword)
                    || m.description.to_lowercase().contains(&keyword)
            })
            .collect();
        moments.sort_by(|a, b| a.time.total_cmp(&b.time));
        moments
    }

    pub fn section_at(&self, time: f32) -> Option<&Section> {
        self.arrangement
            .iter()
            .find(|s| s.start <= time && time < s.end)
    }

    pub fn first_beat(&self) -> Option<f32> {
        self.beats
            .iter()
            .map(|b| b.time)
            .min_by(|a, b| a.total_cmp(b))
    }

    pub fn beats_between(&self, start: f32, end: f32) -> Vec<&Beat> {
        self.beats
            .iter()
            .filter(|b| b.time >= start && b.time < end)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beat_duration_falls_back_when_bpm_missing() {
        let song = SongContext::default();
        assert!((song.beat_duration() - 0.5).abs() < 1e-6);

        let song = SongContext {
            bpm: 128.0,
            ..SongContext::default()
        };
        assert!((song.beat_duration() - 60.0 / 128.0).abs() < 1e-6);
    }

    #[test]
    fn sections_matching_is_ordered_and_case_insensitive() {
        let song = SongContext {
            arrangement: vec![
                Section { name: "Chorus 2".into(), start: 90.0, end: 120.0 },
                Section { name: "Verse".into(), start: 0.0, end: 30.0 },
                Section { name: "chorus".into(), start: 30.0, end: 60.0 },
            ],
            ..SongContext::default()
        };
        let starts: Vec<f32> = song.sections_matching("CHORUS").iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![30.0, 90.0]);
    }
}
