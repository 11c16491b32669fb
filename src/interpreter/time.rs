//! Time resolution.
//!
//! Attempts run in a fixed order and the first hit wins:
//! literal time, section keyword against the song, percentage heuristic for a
//! section keyword the song does not contain, then beat-relative phrases.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::models::song::SongContext;

#[derive(TS, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "interpreter.ts")]
pub enum TimeSource {
    Literal,
    Section,
    KeyMoment,
    Heuristic,
    BeatRelative,
    /// Nothing matched; the caller's fallback was used.
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedTime {
    pub time: f32,
    pub source: TimeSource,
}

// -----------------------------------------------------------------------------
// Literal grammar: MM:SS, <n>s, <m>m<s>s, <n>b
// -----------------------------------------------------------------------------

static TOKEN_MMSS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+):([0-5]\d(?:\.\d+)?)$").expect("valid regex"));
static TOKEN_MIN_SEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)m(?:(\d+(?:\.\d+)?)s?)?$").expect("valid regex"));
static TOKEN_SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(?:s|sec|secs|seconds?)?$").expect("valid regex"));
static TOKEN_BEATS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(?:b|beats?)$").expect("valid regex"));

/// Parse one time token. Bare numbers are seconds; beats use `bpm`.
pub fn parse_time_literal(token: &str, bpm: f32) -> Option<f32> {
    let token = token.trim().to_lowercase();
    let beat = 60.0 / if bpm.is_finite() && bpm > 0.0 { bpm } else { crate::models::song::FALLBACK_BPM };

    if let Some(caps) = TOKEN_MMSS.captures(&token) {
        let minutes: f32 = caps[1].parse().ok()?;
        let seconds: f32 = caps[2].parse().ok()?;
        return Some(minutes * 60.0 + seconds);
    }
    if let Some(caps) = TOKEN_MIN_SEC.captures(&token) {
        let minutes: f32 = caps[1].parse().ok()?;
        let seconds: f32 = caps.get(2).map_or(Some(0.0), |m| m.as_str().parse().ok())?;
        return Some(minutes * 60.0 + seconds);
    }
    if let Some(caps) = TOKEN_BEATS.captures(&token) {
        let beats: f32 = caps[1].parse().ok()?;
        return Some(beats * beat);
    }
    if let Some(caps) = TOKEN_SECONDS.captures(&token) {
        return caps[1].parse().ok();
    }
    None
}

static FIND_MMSS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+):([0-5]\d(?:\.\d+)?)\b").expect("valid regex"));
static FIND_MIN_SEC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)m\s*(\d+(?:\.\d+)?)s\b").expect("valid regex"));
static FIND_SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)\s*(?:s|sec|secs|seconds?)\b").expect("valid regex"));
static FIND_BEATS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)b\b|\bbeat\s+(\d+)\b").expect("valid regex"));
static FIND_AT_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bat\s+(\d+(?:\.\d+)?)(?:\s|$)").expect("valid regex"));

/// Words that turn a following time literal into a duration or cadence.
const DURATION_PREFIXES: &[&str] = &["for", "lasting", "every", "over", "within", "after"];

fn preceding_word(text: &str, start: usize) -> Option<&str> {
    text[..start].split_whitespace().last()
}

fn is_duration_context(text: &str, start: usize) -> bool {
    preceding_word(text, start).is_some_and(|w| DURATION_PREFIXES.contains(&w))
}

/// First absolute time literal in `text` that is not a duration ("for 2s").
pub fn find_time_literal(text: &str, bpm: f32) -> Option<f32> {
    let beat = 60.0 / if bpm.is_finite() && bpm > 0.0 { bpm } else { crate::models::song::FALLBACK_BPM };

    let scans: [(&Lazy<Regex>, fn(&regex::Captures, f32) -> Option<f32>); 5] = [
        (&FIND_MMSS, |c, _| {
            let m: f32 = c[1].parse().ok()?;
            let s: f32 = c[2].parse().ok()?;
            Some(m * 60.0 + s)
        }),
        (&FIND_MIN_SEC, |c, _| {
            let m: f32 = c[1].parse().ok()?;
            let s: f32 = c[2].parse().ok()?;
            Some(m * 60.0 + s)
        }),
        (&FIND_SECONDS, |c, _| c[1].parse().ok()),
        (&FIND_BEATS, |c, beat| {
            let n: f32 = c.get(1).or_else(|| c.get(2))?.as_str().parse().ok()?;
            Some(n * beat)
        }),
        (&FIND_AT_NUMBER, |c, _| c[1].parse().ok()),
    ];

    for (re, convert) in scans.iter() {
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if is_duration_context(text, whole.start()) {
                continue;
            }
            if let Some(time) = convert(&caps, beat) {
                return Some(time);
            }
        }
    }
    None
}

// -----------------------------------------------------------------------------
// Section keywords
// -----------------------------------------------------------------------------

pub struct SectionKeyword {
    /// Canonical name reported in logs and heuristics.
    pub name: &'static str,
    /// Phrases that mention this section in a command.
    pub phrases: &'static [&'static str],
    /// Substrings searched in arrangement names and key moments.
    pub search: &'static [&'static str],
    /// Position as a fraction of song duration when the song has no match.
    pub fraction: f32,
    /// Position in seconds when the song duration is unknown as well.
    pub default_seconds: f32,
}

/// Compound phrases come first so "energy boost" is not read as something else.
pub static SECTION_KEYWORDS: &[SectionKeyword] = &[
    SectionKeyword {
        name: "energy boost",
        phrases: &["energy boost", "energy increase", "energy rise"],
        search: &["energy boost", "boost", "energy"],
        fraction: 0.40,
        default_seconds: 75.0,
    },
    SectionKeyword {
        name: "toms and hihats",
        phrases: &["toms and hihats", "toms and hi-hats", "toms and hi hats", "tom pattern"],
        search: &["toms and hihats", "toms", "hihat", "hi-hat"],
        fraction: 0.35,
        default_seconds: 65.0,
    },
    SectionKeyword {
        name: "breakdown",
        phrases: &["breakdown", "break down"],
        search: &["breakdown", "break"],
        fraction: 0.50,
        default_seconds: 90.0,
    },
    SectionKeyword {
        name: "build",
        phrases: &["buildup", "build up", "build-up", "build"],
        search: &["build"],
        fraction: 0.25,
        default_seconds: 50.0,
    },
    SectionKeyword {
        name: "drop",
        phrases: &["drop"],
        search: &["drop"],
        fraction: 0.30,
        default_seconds: 60.0,
    },
    SectionKeyword {
        name: "chorus",
        phrases: &["chorus", "hook"],
        search: &["chorus", "hook"],
        fraction: 0.20,
        default_seconds: 45.0,
    },
    SectionKeyword {
        name: "verse",
        phrases: &["verse"],
        search: &["verse"],
        fraction: 0.10,
        default_seconds: 15.0,
    },
    SectionKeyword {
        name: "bridge",
        phrases: &["bridge"],
        search: &["bridge"],
        fraction: 0.60,
        default_seconds: 120.0,
    },
    SectionKeyword {
        name: "intro",
        phrases: &["intro", "beginning", "start of the song"],
        search: &["intro"],
        fraction: 0.0,
        default_seconds: 0.0,
    },
    SectionKeyword {
        name: "outro",
        phrases: &["outro", "ending", "end of the song"],
        search: &["outro", "end"],
        fraction: 0.90,
        default_seconds: 180.0,
    },
];

static ORDINALS: &[(&str, i32)] = &[
    ("first", 1),
    ("1st", 1),
    ("second", 2),
    ("2nd", 2),
    ("third", 3),
    ("3rd", 3),
    ("fourth", 4),
    ("4th", 4),
    ("fifth", 5),
    ("5th", 5),
    ("last", -1),
    ("final", -1),
];

fn phrase_regex(phrase: &str) -> Regex {
    Regex::new(&format!(r"\b{}s?\b", regex::escape(phrase))).expect("valid section phrase")
}

static COMPILED_PHRASES: Lazy<Vec<Vec<Regex>>> = Lazy::new(|| {
    SECTION_KEYWORDS
        .iter()
        .map(|k| k.phrases.iter().map(|p| phrase_regex(p)).collect())
        .collect()
});

/// Section keyword mentioned in `text` plus an optional ordinal
/// ("second chorus" -> 2, "last drop" -> -1).
pub fn find_section_keyword(text: &str) -> Option<(&'static SectionKeyword, Option<i32>)> {
    for (keyword, phrases) in SECTION_KEYWORDS.iter().zip(COMPILED_PHRASES.iter()) {
        for re in phrases {
            if let Some(m) = re.find(text) {
                let ordinal = preceding_word(text, m.start()).and_then(|word| {
                    ORDINALS
                        .iter()
                        .find(|(name, _)| *name == word)
                        .map(|(_, n)| *n)
                });
                return Some((keyword, ordinal));
            }
        }
    }
    None
}

fn pick<T>(items: &[T], ordinal: Option<i32>) -> Option<&T> {
    match ordinal {
        None | Some(1) => items.first(),
        Some(n) if n < 0 => items.last(),
        Some(n) => items.get((n - 1) as usize),
    }
}

/// Match a section keyword against the song's arrangement, then its key moments.
fn resolve_section(keyword: &SectionKeyword, ordinal: Option<i32>, song: &SongContext) -> Option<ResolvedTime> {
    for term in keyword.search {
        let sections = song.sections_matching(term);
        if let Some(section) = pick(&sections, ordinal) {
            return Some(ResolvedTime {
                time: section.start,
                source: TimeSource::Section,
            });
        }
    }
    for term in keyword.search {
        let moments = song.moments_matching(term);
        if let Some(moment) = pick(&moments, ordinal) {
            return Some(ResolvedTime {
                time: moment.time,
                source: TimeSource::KeyMoment,
            });
        }
    }
    None
}

fn heuristic_time(keyword: &SectionKeyword, song: &SongContext) -> ResolvedTime {
    let time = if song.has_duration() {
        song.duration * keyword.fraction
    } else {
        keyword.default_seconds
    };
    ResolvedTime {
        time,
        source: TimeSource::Heuristic,
    }
}

// -----------------------------------------------------------------------------
// Beat-relative phrases
// -----------------------------------------------------------------------------

static BEAT_HITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:beat hits|beat drops|beat kicks in|beat starts|first beat|on the beat|when the beat)\b").expect("valid regex")
});
static BEAT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:for|every)\s+(?:\d+(?:\.\d+)?\s+)?beats?\b").expect("valid regex"));

fn resolve_beat_relative(text: &str, song: &SongContext, current_time: Option<f32>) -> Option<ResolvedTime> {
    if BEAT_HITS.is_match(text) {
        if let Some(first) = song.first_beat() {
            return Some(ResolvedTime {
                time: first,
                source: TimeSource::BeatRelative,
            });
        }
    }
    if BEAT_SPAN.is_match(text) {
        let time = current_time
            .or_else(|| song.arrangement.first().map(|s| s.start))
            .unwrap_or(0.0);
        return Some(ResolvedTime {
            time,
            source: TimeSource::BeatRelative,
        });
    }
    None
}

/// Resolve the time a command refers to. `None` leaves the fallback to the caller.
pub fn resolve_time(text: &str, song: &SongContext, current_time: Option<f32>) -> Option<ResolvedTime> {
    if let Some(time) = find_time_literal(text, song.effective_bpm()) {
        return Some(ResolvedTime {
            time,
            source: TimeSource::Literal,
        });
    }
    if let Some((keyword, ordinal)) = find_section_keyword(text) {
        let resolved = resolve_section(keyword, ordinal, song).unwrap_or_else(|| heuristic_time(keyword, song));
        log::debug!(
            "[interpreter] section '{}' (ordinal {:?}) -> {:.2}s via {:?}",
            keyword.name,
            ordinal,
            resolved.time,
            resolved.source
        );
        return Some(resolved);
    }
    resolve_beat_relative(text, song, current_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::song::{Beat, KeyMoment, Section};

    fn song() -> SongContext {
        SongContext {
            bpm: 120.0,
            duration: 200.0,
            arrangement: vec![
                Section { name: "Intro".into(), start: 0.0, end: 16.0 },
                Section { name: "Chorus 1".into(), start: 32.0, end: 48.0 },
                Section { name: "Drop".into(), start: 64.0, end: 96.0 },
                Section { name: "Chorus 2".into(), start: 112.0, end: 128.0 },
            ],
            beats: vec![Beat { time: 0.48, volume: 0.5, energy: 0.2 }],
            key_moments: vec![KeyMoment {
                time: 140.0,
                name: "Lift".into(),
                description: "big energy boost".into(),
            }],
        }
    }

    #[test]
    fn literal_tokens() {
        assert_eq!(parse_time_literal("10s", 120.0), Some(10.0));
        assert_eq!(parse_time_literal("1:30", 120.0), Some(90.0));
        assert_eq!(parse_time_literal("2m5s", 120.0), Some(125.0));
        assert_eq!(parse_time_literal("16b", 120.0), Some(8.0));
        assert_eq!(parse_time_literal("12.5", 120.0), Some(12.5));
        assert_eq!(parse_time_literal("soon", 120.0), None);
    }

    #[test]
    fn durations_are_not_start_times() {
        assert_eq!(find_time_literal("flash red on parcan_l at 10s for 2s", 120.0), Some(10.0));
        assert_eq!(find_time_literal("strobe for 2s", 120.0), None);
        assert_eq!(find_time_literal("fade at 1:05 lasting 4 seconds", 120.0), Some(65.0));
        assert_eq!(find_time_literal("pulse at 20", 120.0), Some(20.0));
    }

    #[test]
    fn sections_ordinals_and_moments() {
        let song = song();
        let at = |text: &str| resolve_time(text, &song, None).map(|r| (r.time, r.source));
        assert_eq!(at("flash at the drop"), Some((64.0, TimeSource::Section)));
        assert_eq!(at("strobe in the second chorus"), Some((112.0, TimeSource::Section)));
        assert_eq!(at("strobe in the last chorus"), Some((112.0, TimeSource::Section)));
        assert_eq!(at("pulse on the energy boost"), Some((140.0, TimeSource::KeyMoment)));
        let bridge = resolve_time("fade during the bridge", &song, None).expect("bridge");
        assert_eq!(bridge.source, TimeSource::Heuristic);
        assert!((bridge.time - 120.0).abs() < 1e-3);
    }

    #[test]
    fn heuristic_without_duration_uses_fixed_seconds() {
        let song = SongContext::default();
        let resolved = resolve_time("blast the drop", &song, None).expect("resolved");
        assert_eq!(resolved.time, 60.0);
        assert_eq!(resolved.source, TimeSource::Heuristic);
    }

    #[test]
    fn beat_relative_is_last_resort() {
        let song = song();
        let hits = resolve_time("flash when the beat hits", &song, None).expect("beat");
        assert_eq!(hits.time, 0.48);
        let span = resolve_time("strobe every 2 beats", &song, Some(33.0)).expect("span");
        assert_eq!((span.time, span.source), (33.0, TimeSource::BeatRelative));
        assert!(resolve_time("make it pop", &song, None).is_none());
    }
}
