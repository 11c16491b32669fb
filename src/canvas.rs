//! Timeline Canvas
//!
//! A time-indexed DMX frame buffer: one 512-channel universe snapshot per
//! frame, `ceil(duration * fps)` frames. Channels are addressed by their
//! 1-based DMX address. Painting is last-write-wins with no blending; values
//! are rounded and clamped to `0..=255`.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};

pub const UNIVERSE_SIZE: usize = 512;

pub type Frame = [u8; UNIVERSE_SIZE];

/// Tolerance (in frames) for float error when mapping range bounds to indices.
const FRAME_EPSILON: f32 = 1e-3;

static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

#[derive(Clone, Debug)]
pub struct TimelineCanvas {
    fps: u32,
    duration: f32,
    frames: Vec<Frame>,
    generation: u32,
}

impl TimelineCanvas {
    /// Allocate a zero-filled buffer. Each allocation gets a fresh generation
    /// so holders of an older buffer can tell it went stale.
    pub fn new(fps: u32, duration: f32) -> Self {
        let fps = fps.max(1);
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        let count = ((duration * fps as f32).ceil() as usize).max(1);
        Self {
            fps,
            duration,
            frames: vec![[0u8; UNIVERSE_SIZE]; count],
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Empty canvas with the same geometry and a new generation.
    pub fn blank_like(&self) -> Self {
        Self::new(self.fps, self.duration)
    }

    /// Replace the buffer with a new zero-filled allocation.
    pub fn reset(&mut self, fps: u32, duration: f32) {
        *self = Self::new(fps, duration);
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Nearest frame index for `time`, clamped to the buffer.
    pub fn frame_index(&self, time: f32) -> usize {
        if !time.is_finite() || time <= 0.0 {
            return 0;
        }
        let idx = (time * self.fps as f32).round() as usize;
        idx.min(self.frames.len() - 1)
    }

    pub fn frame_time(&self, index: usize) -> f32 {
        index as f32 / self.fps as f32
    }

    /// Snap `time` onto the frame grid.
    pub fn quantize(&self, time: f32) -> f32 {
        self.frame_time(self.frame_index(time))
    }

    /// Overwrite the given channels of the frame nearest `time`.
    pub fn paint_frame(&mut self, time: f32, values: &[(u16, f32)]) {
        let idx = self.frame_index(time);
        write_values(&mut self.frames[idx], values);
    }

    /// Paint every frame whose time lies in `[start, end)` with the values
    /// `paint` computes for that frame's time.
    pub fn paint_range<F>(&mut self, start: f32, end: f32, mut paint: F)
    where
        F: FnMut(f32) -> Vec<(u16, f32)>,
    {
        let Some((first, last)) = self.range_indices(start, end) else {
            return;
        };
        for idx in first..=last {
            let t = self.frame_time(idx);
            let values = paint(t);
            write_values(&mut self.frames[idx], &values);
        }
    }

    /// Single-channel form of `paint_range`.
    pub fn paint_channel<F>(&mut self, channel: u16, start: f32, end: f32, mut value: F)
    where
        F: FnMut(f32) -> f32,
    {
        self.paint_range(start, end, |t| vec![(channel, value(t))]);
    }

    /// Read-only copy of the frame nearest `time`.
    pub fn get_frame(&self, time: f32) -> Frame {
        self.frames[self.frame_index(time)]
    }

    /// Value of one channel at `time`, `0` for addresses outside the universe.
    pub fn channel_value(&self, time: f32, channel: u16) -> u8 {
        match slot(channel) {
            Some(slot) => self.frames[self.frame_index(time)][slot],
            None => 0,
        }
    }

    pub fn clear(&mut self) {
        for frame in &mut self.frames {
            frame.fill(0);
        }
    }

    pub fn is_blank(&self) -> bool {
        self.frames.iter().all(|f| f.iter().all(|v| *v == 0))
    }

    /// Deterministic dump: a header line, then one line per frame that has any
    /// non-zero channel, listing `address:value` pairs.
    pub fn export_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# timeline fps={} duration={:.3} frames={}",
            self.fps,
            self.duration,
            self.frames.len()
        );
        for (idx, frame) in self.frames.iter().enumerate() {
            let lit: Vec<String> = frame
                .iter()
                .enumerate()
                .filter(|(_, v)| **v != 0)
                .map(|(slot, v)| format!("{}:{}", slot + 1, v))
                .collect();
            if lit.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{:>6} {:>9.3}s {}", idx, self.frame_time(idx), lit.join(" "));
        }
        out
    }

    /// Inclusive frame index range covering `[start, end)`.
    fn range_indices(&self, start: f32, end: f32) -> Option<(usize, usize)> {
        if !start.is_finite() || !end.is_finite() || end <= start {
            return None;
        }
        let fps = self.fps as f32;
        let first = (start.max(0.0) * fps - FRAME_EPSILON).ceil().max(0.0) as usize;
        // Largest index whose time is strictly below `end`
        let mut last_exclusive = (end * fps - FRAME_EPSILON).ceil();
        if last_exclusive <= 0.0 {
            return None;
        }
        last_exclusive -= 1.0;
        let last = (last_exclusive as usize).min(self.frames.len() - 1);
        if first > last || first >= self.frames.len() {
            return None;
        }
        Some((first, last))
    }
}

fn slot(channel: u16) -> Option<usize> {
    let channel = channel as usize;
    if (1..=UNIVERSE_SIZE).contains(&channel) {
        Some(channel - 1)
    } else {
        None
    }
}

pub fn clamp_dmx(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

fn write_values(frame: &mut Frame, values: &[(u16, f32)]) {
    for (channel, value) in values {
        match slot(*channel) {
            Some(slot) => frame[slot] = clamp_dmx(*value),
            None => log::trace!("[canvas] ignoring out-of-universe channel {}", channel),
        }
    }
}
