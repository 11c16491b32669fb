//! Playback clock.
//!
//! The transport reports its position now and then; between reports the
//! clock extrapolates from the last sync point. Small drift is slewed out by
//! halving it on each report, large drift (seeks, stalls) snaps immediately.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::models::playback::PlaybackSnapshot;

#[derive(Clone)]
pub struct PlaybackClock {
    inner: Arc<Mutex<ClockInner>>,
}

struct ClockInner {
    drift_tolerance: f32,
    synced: bool,
    playing: bool,
    anchor_time: f32,
    anchor_instant: Instant,
    last_drift: f32,
}

impl ClockInner {
    fn time_at(&self, now: Instant) -> f32 {
        if self.playing {
            let elapsed = now.saturating_duration_since(self.anchor_instant).as_secs_f32();
            self.anchor_time + elapsed
        } else {
            self.anchor_time
        }
    }

    fn snapshot_at(&self, now: Instant) -> PlaybackSnapshot {
        PlaybackSnapshot {
            is_synced: self.synced,
            is_playing: self.playing,
            current_time: self.time_at(now),
            last_drift: self.last_drift,
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(0.25)
    }
}

impl PlaybackClock {
    pub fn new(drift_tolerance: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockInner {
                drift_tolerance: drift_tolerance.max(0.0),
                synced: false,
                playing: false,
                anchor_time: 0.0,
                anchor_instant: Instant::now(),
                last_drift: 0.0,
            })),
        }
    }

    pub fn sync(&self, is_playing: bool, current_time: f32) -> PlaybackSnapshot {
        self.sync_at(is_playing, current_time, Instant::now())
    }

    /// Reconcile a reported position taken at `now`.
    pub fn sync_at(&self, is_playing: bool, reported: f32, now: Instant) -> PlaybackSnapshot {
        let mut guard = self.inner.lock().expect("playback clock poisoned");
        let reported = if reported.is_finite() { reported.max(0.0) } else { 0.0 };
        let extrapolated = guard.time_at(now);
        let drift = if guard.synced { reported - extrapolated } else { 0.0 };

        let snap = !guard.synced
            || !is_playing
            || !guard.playing
            || drift.abs() > guard.drift_tolerance;
        guard.anchor_time = if snap {
            reported
        } else {
            extrapolated + drift * 0.5
        };
        if snap && guard.synced && drift.abs() > guard.drift_tolerance {
            log::debug!("[playback] drift {:.3}s exceeds tolerance, snapping to {:.3}s", drift, reported);
        }

        guard.anchor_instant = now;
        guard.playing = is_playing;
        guard.synced = true;
        guard.last_drift = drift;
        guard.snapshot_at(now)
    }

    pub fn current_time(&self) -> f32 {
        self.current_time_at(Instant::now())
    }

    pub fn current_time_at(&self, now: Instant) -> f32 {
        let guard = self.inner.lock().expect("playback clock poisoned");
        guard.time_at(now)
    }

    /// Position only when a transport has reported at least once.
    pub fn position(&self) -> Option<f32> {
        let guard = self.inner.lock().expect("playback clock poisoned");
        guard.synced.then(|| guard.time_at(Instant::now()))
    }

    pub fn is_playing(&self) -> bool {
        let guard = self.inner.lock().expect("playback clock poisoned");
        guard.playing
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let guard = self.inner.lock().expect("playback clock poisoned");
        guard.snapshot_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn extrapolates_while_playing() {
        let clock = PlaybackClock::new(0.25);
        let t0 = Instant::now();
        clock.sync_at(true, 10.0, t0);
        assert!(close(clock.current_time_at(t0 + Duration::from_millis(1500)), 11.5));
    }

    #[test]
    fn paused_clock_holds_position() {
        let clock = PlaybackClock::new(0.25);
        let t0 = Instant::now();
        clock.sync_at(false, 42.0, t0);
        assert!(close(clock.current_time_at(t0 + Duration::from_secs(5)), 42.0));
        assert!(!clock.is_playing());
    }

    #[test]
    fn small_drift_is_slewed_large_drift_snaps() {
        let clock = PlaybackClock::new(0.25);
        let t0 = Instant::now();
        clock.sync_at(true, 10.0, t0);

        let t1 = t0 + Duration::from_secs(1);
        let snap = clock.sync_at(true, 11.1, t1);
        assert!(close(snap.last_drift, 0.1));
        assert!(close(snap.current_time, 11.05));

        let t2 = t1 + Duration::from_secs(1);
        let snap = clock.sync_at(true, 30.0, t2);
        assert!(close(snap.current_time, 30.0));
    }

    #[test]
    fn unsynced_clock_has_no_position() {
        let clock = PlaybackClock::default();
        assert!(clock.position().is_none());
        clock.sync(false, 3.0);
        assert_eq!(clock.position(), Some(3.0));
    }
}
