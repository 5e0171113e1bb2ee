use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

pub const LOOP_BARS: u32 = 8;
pub const BEATS_PER_BAR: u32 = 4;
pub const LOOP_BEATS: u32 = LOOP_BARS * BEATS_PER_BAR;
pub const DEFAULT_BPM: f32 = 120.0;
pub const MIN_BPM: f32 = 40.0;
pub const MAX_BPM: f32 = 300.0;

/// Tempo-synced note divisions, in beats.
pub const DIVISIONS: [(&str, f32); 12] = [
  ("1/64", 0.0625),
  ("1/32T", 1.0 / 12.0),
  ("1/32", 0.125),
  ("1/16T", 1.0 / 6.0),
  ("1/16", 0.25),
  ("1/8T", 1.0 / 3.0),
  ("1/8", 0.5),
  ("1/4T", 2.0 / 3.0),
  ("1/4", 1.0),
  ("1/2", 2.0),
  ("1 bar", 4.0),
  ("2 bars", 8.0),
];

/// Non-finite or non-positive tempo falls back to the default; the rest is
/// clamped into the supported range.
#[inline]
pub fn safe_bpm(bpm: f32) -> f32 {
  if bpm.is_finite() && bpm > 0.0 { bpm.clamp(MIN_BPM, MAX_BPM) } else { DEFAULT_BPM }
}

/// Index into [`DIVISIONS`] for a normalized control value in [0, 1].
#[inline]
pub fn division_index(normalized: f32) -> usize {
  let p = if normalized.is_finite() { normalized.clamp(0.0, 1.0) } else { 0.0 };
  ((p * (DIVISIONS.len() - 1) as f32).floor() as usize).min(DIVISIONS.len() - 1)
}

#[inline]
pub fn division_beats(index: usize) -> f32 {
  DIVISIONS.get(index).map(|d| d.1).unwrap_or(DIVISIONS[0].1)
}

/// LFO frequency whose period is `beats` long at `bpm`.
#[inline]
pub fn beats_to_hz(bpm: f32, beats: f32) -> f32 {
  safe_bpm(bpm) / 60.0 / beats.max(1e-3)
}

/// Capture window in samples for a tempo-synced loop, clamped into
/// `[min_len, capacity]`.
pub fn capture_len(sr: f32, bpm: f32, division_beats: f32, multiplier: f32, min_len: usize, capacity: usize) -> usize {
  let samples_per_beat = sr * 60.0 / safe_bpm(bpm);
  let raw = samples_per_beat * division_beats * multiplier;
  let hi = capacity.max(min_len);
  if !raw.is_finite() || raw <= 0.0 { return min_len.min(hi); }
  (raw.floor() as usize).clamp(min_len, hi)
}

#[inline]
pub fn loop_duration(bpm: f32) -> f64 {
  LOOP_BEATS as f64 * 60.0 / safe_bpm(bpm) as f64
}

/// Monotonic engine clock: frames rendered so far, published by the render thread.
#[derive(Clone, Debug)]
pub struct EngineClock {
  frames: Arc<AtomicU64>,
  sr: f32,
}

impl EngineClock {
  pub fn new(sr: f32) -> Self { Self { frames: Arc::new(AtomicU64::new(0)), sr } }

  #[inline]
  pub fn sample_rate(&self) -> f32 { self.sr }

  #[inline]
  pub fn frames(&self) -> u64 { self.frames.load(Ordering::Acquire) }

  #[inline]
  pub fn now(&self) -> f64 { self.frames() as f64 / self.sr as f64 }

  #[inline]
  pub fn advance(&self, frames: u64) { self.frames.fetch_add(frames, Ordering::AcqRel); }

  #[inline]
  pub fn seconds_to_frame(&self, t: f64) -> u64 {
    if t.is_finite() && t > 0.0 { (t * self.sr as f64).round() as u64 } else { 0 }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Clock {
  pub position: f64,
  pub bar: u32,
}

/// The 8-bar automation loop, derived from the engine clock on every read.
#[derive(Clone, Debug)]
pub struct LoopClock {
  loop_start: f64,
}

impl Default for LoopClock {
  fn default() -> Self { Self::new(0.0) }
}

impl LoopClock {
  pub fn new(start: f64) -> Self { Self { loop_start: start } }

  pub fn loop_start(&self) -> f64 { self.loop_start }

  pub fn restart(&mut self, now: f64) { self.loop_start = now; }

  /// Rebase so that `now` lands on the start of `bar`.
  pub fn jump_to_bar(&mut self, now: f64, bar: u32, bpm: f32) {
    let bar = bar.min(LOOP_BARS - 1);
    self.loop_start = now - (bar as f64 / LOOP_BARS as f64) * loop_duration(bpm);
  }

  /// Advance `loop_start` by whole loops if needed and return the position.
  pub fn read(&mut self, now: f64, bpm: f32) -> Clock {
    let dur = loop_duration(bpm);
    let mut elapsed = now - self.loop_start;
    if !elapsed.is_finite() {
      self.loop_start = now;
      elapsed = 0.0;
    }
    if elapsed >= dur {
      let loops = (elapsed / dur).floor();
      self.loop_start += loops * dur;
      elapsed = now - self.loop_start;
    }
    // a jump can put loop_start slightly in the future
    let elapsed = elapsed.clamp(0.0, dur);
    let position = (elapsed / dur).min(1.0 - f64::EPSILON);
    // rounding after a jump must not land in the previous bar
    let bar = ((position * LOOP_BARS as f64 + 1e-9).floor() as u32).min(LOOP_BARS - 1);
    Clock { position, bar }
  }
}
