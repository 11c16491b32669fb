//! Beat-synchronized repeat expansion.

use serde_json::json;

use crate::models::effects::EffectParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    BeatSync,
    Interval,
    Duration,
    Continuous,
    Section,
}

impl RepeatMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "beat_sync" | "beatsync" | "beat" => Some(RepeatMode::BeatSync),
            "interval" => Some(RepeatMode::Interval),
            "duration" => Some(RepeatMode::Duration),
            "continuous" | "loop" => Some(RepeatMode::Continuous),
            "section" => Some(RepeatMode::Section),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::BeatSync => "beat_sync",
            RepeatMode::Interval => "interval",
            RepeatMode::Duration => "duration",
            RepeatMode::Continuous => "continuous",
            RepeatMode::Section => "section",
        }
    }
}

/// Beat counts and durations used when a command does not give them.
#[derive(Debug, Clone, Copy)]
pub struct RepeatDefaults {
    pub beat_sync_beats: f32,
    pub section_beats: f32,
    pub effect_duration: f32,
}

impl Default for RepeatDefaults {
    fn default() -> Self {
        Self {
            beat_sync_beats: 8.0,
            section_beats: 16.0,
            effect_duration: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub time: f32,
    pub duration: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub hits: Vec<Hit>,
    /// Extra parameters stamped on every emitted effect.
    pub annotations: EffectParams,
}

fn param(params: &EffectParams, key: &str) -> Option<f32> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .map(|v| v as f32)
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Upper bound on hits from one command when the song length is unknown.
pub const MAX_HITS: usize = 4096;

/// Emit `start + k * step_beats * beat` for every `k * step_beats < beats`,
/// stopping past `limit` seconds. Each hit lasts half a step.
fn stepped(start: f32, beats: f32, step_beats: f32, beat: f32, limit: Option<f32>) -> Vec<Hit> {
    let step_beats = step_beats.max(0.01);
    let mut hits = Vec::new();
    let mut k = 0u32;
    loop {
        let offset = k as f32 * step_beats;
        if offset >= beats - 1e-4 {
            break;
        }
        let time = start + offset * beat;
        if limit.is_some_and(|end| time > end) {
            break;
        }
        if hits.len() >= MAX_HITS {
            log::warn!("[interpreter] repeat capped at {} hits", MAX_HITS);
            break;
        }
        hits.push(Hit {
            time,
            duration: step_beats * beat * 0.5,
        });
        k += 1;
    }
    hits
}

/// Total length of a duration-mode effect in seconds.
fn total_duration(params: &EffectParams, beat: f32) -> Option<f32> {
    param(params, "duration_beats")
        .map(|b| b * beat)
        .or_else(|| param(params, "duration_seconds"))
}

/// Expand one command into emitted times. `song_duration` drops hits past
/// the end of the song when known.
pub fn expand(
    mode: RepeatMode,
    start: f32,
    params: &EffectParams,
    beat: f32,
    song_duration: Option<f32>,
    defaults: RepeatDefaults,
) -> Expansion {
    let beat = if beat.is_finite() && beat > 0.0 { beat } else { 0.5 };
    let limit = song_duration.filter(|d| *d > 0.0);
    let mut annotations = EffectParams::new();
    annotations.insert("repeat_mode".into(), json!(mode.as_str()));

    let mut hits = match mode {
        RepeatMode::BeatSync => {
            let beats = param(params, "duration_beats").unwrap_or(defaults.beat_sync_beats);
            stepped(start, beats, 1.0, beat, limit)
        }
        RepeatMode::Section => {
            let beats = param(params, "duration_beats").unwrap_or(defaults.section_beats);
            stepped(start, beats, 1.0, beat, limit)
        }
        RepeatMode::Interval => {
            let beats = param(params, "duration_beats").unwrap_or(defaults.beat_sync_beats);
            let interval = param(params, "beat_interval").unwrap_or(1.0);
            stepped(start, beats, interval, beat, limit)
        }
        RepeatMode::Duration => {
            let total = total_duration(params, beat).unwrap_or(defaults.effect_duration);
            match param(params, "beat_interval") {
                Some(interval) => stepped(start, total / beat, interval, beat, limit),
                // No cadence given: one sustained effect
                None => vec![Hit { time: start, duration: total }],
            }
        }
        RepeatMode::Continuous => {
            let total = total_duration(params, beat)
                .or_else(|| song_duration.map(|d| (d - start).max(0.0)))
                .unwrap_or(defaults.beat_sync_beats * beat);
            let loop_beats = param(params, "beat_interval").unwrap_or(1.0);
            annotations.insert("loop_duration".into(), json!(loop_beats * beat));
            annotations.insert("fade_beats".into(), json!(param(params, "fade_beats").unwrap_or(1.0)));
            vec![Hit { time: start, duration: total }]
        }
    };

    if let Some(limit) = limit {
        hits.retain(|h| h.time <= limit);
    }
    Expansion { hits, annotations }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: serde_json::Value) -> EffectParams {
        serde_json::from_value(value).expect("params")
    }

    fn times(expansion: &Expansion) -> Vec<f32> {
        expansion.hits.iter().map(|h| h.time).collect()
    }

    #[test]
    fn beat_sync_four_beats_at_120() {
        let e = expand(
            RepeatMode::BeatSync,
            10.0,
            &params(serde_json::json!({"duration_beats": 4})),
            0.5,
            None,
            RepeatDefaults::default(),
        );
        assert_eq!(times(&e), vec![10.0, 10.5, 11.0, 11.5]);
        assert!(e.hits.iter().all(|h| h.duration == 0.25));
    }

    #[test]
    fn interval_two_over_eight_beats() {
        let e = expand(
            RepeatMode::Interval,
            0.0,
            &params(serde_json::json!({"beat_interval": 2, "duration_beats": 8})),
            0.5,
            None,
            RepeatDefaults::default(),
        );
        // beats 0, 2, 4, 6
        assert_eq!(times(&e), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn defaults_and_section_length() {
        let empty = EffectParams::new();
        let sync = expand(RepeatMode::BeatSync, 0.0, &empty, 0.5, None, RepeatDefaults::default());
        assert_eq!(sync.hits.len(), 8);
        let section = expand(RepeatMode::Section, 0.0, &empty, 0.5, None, RepeatDefaults::default());
        assert_eq!(section.hits.len(), 16);
    }

    #[test]
    fn duration_mode() {
        let sustained = expand(
            RepeatMode::Duration,
            10.0,
            &params(serde_json::json!({"duration_seconds": 2.0})),
            0.5,
            None,
            RepeatDefaults::default(),
        );
        assert_eq!(sustained.hits, vec![Hit { time: 10.0, duration: 2.0 }]);

        let cadence = expand(
            RepeatMode::Duration,
            0.0,
            &params(serde_json::json!({"duration_beats": 4, "beat_interval": 1})),
            0.5,
            None,
            RepeatDefaults::default(),
        );
        assert_eq!(times(&cadence), vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn continuous_is_one_annotated_effect() {
        let e = expand(RepeatMode::Continuous, 20.0, &EffectParams::new(), 0.5, Some(30.0), RepeatDefaults::default());
        assert_eq!(e.hits, vec![Hit { time: 20.0, duration: 10.0 }]);
        assert_eq!(e.annotations.get("loop_duration"), Some(&serde_json::json!(0.5)));
        assert!(e.annotations.contains_key("fade_beats"));
    }

    #[test]
    fn hits_past_song_end_are_dropped() {
        let e = expand(RepeatMode::BeatSync, 9.0, &EffectParams::new(), 0.5, Some(10.0), RepeatDefaults::default());
        assert_eq!(times(&e), vec![9.0, 9.5, 10.0]);
    }

    #[test]
    fn dense_long_repeats_stop_at_song_end() {
        let dense = params(serde_json::json!({"beat_interval": 0.01, "duration_beats": 1000000}));
        let bounded = expand(RepeatMode::Interval, 0.0, &dense, 0.5, Some(10.0), RepeatDefaults::default());
        // 0.005s steps up to the 10s song end
        assert!(bounded.hits.len() < MAX_HITS);
        assert!(bounded.hits.iter().all(|h| h.time <= 10.0));
        assert!(bounded.hits.last().is_some_and(|h| h.time > 9.99));

        let unbounded = expand(RepeatMode::Interval, 0.0, &dense, 0.5, None, RepeatDefaults::default());
        assert_eq!(unbounded.hits.len(), MAX_HITS);
    }
}
