use super::capture::{seam_gain, CaptureBuffer};
use super::params::StutterParams;
use crate::engine::clock::{capture_len, division_beats, division_index};

pub const FREEZE_THRESHOLD: f32 = 0.05;
pub const MIN_LEN: usize = 128;
const SEAM_FADE: f32 = 200.0;

/// Beat-synced freeze: while `feedback` is up, replays the last division of
/// input at a bipolar speed.
pub struct Stutter {
  sr: f32,
  buf: CaptureBuffer,
  params: StutterParams,
  bpm: f32,
  active: bool,
  frozen: bool,
  division: usize,
  pos: f32,
}

impl Stutter {
  pub fn new(sr: f32, capture_seconds: f32) -> Self {
    Self {
      sr,
      buf: CaptureBuffer::new(capture_seconds, sr),
      params: StutterParams::default(),
      bpm: 120.0,
      active: false,
      frozen: false,
      division: usize::MAX,
      pos: 0.0,
    }
  }

  pub fn is_frozen(&self) -> bool { self.frozen }

  pub fn loop_len(&self) -> usize { self.buf.loop_len() }

  /// Playback increment per frame: 0.5 is normal speed, 0 is normal speed
  /// backwards, 1 is triple speed.
  #[inline]
  pub fn rate(speed: f32) -> f32 { (speed - 0.5) * 4.0 + 1.0 }

  pub fn set_params(&mut self, p: &StutterParams, bpm: f32, on: bool) {
    self.params = *p;
    self.bpm = bpm;
    self.active = on;
    if !on {
      self.frozen = false;
      return;
    }
    let freeze = p.feedback > FREEZE_THRESHOLD;
    let division = division_index(p.division);
    // recapture only on engagement or when the quantized division moves
    if freeze && (!self.frozen || division != self.division) {
      self.frozen = true;
      self.division = division;
      self.pos = 0.0;
      let len = capture_len(self.sr, self.bpm, division_beats(division), 1.0, MIN_LEN, self.buf.capacity());
      self.buf.capture(len);
    } else if !freeze {
      self.frozen = false;
    }
  }

  pub fn process(&mut self, l: &mut [f32], r: &mut [f32]) {
    if !self.active { return; }
    let len = self.buf.loop_len();
    let step = Self::rate(self.params.speed);
    for n in 0..l.len().min(r.len()) {
      self.buf.write(l[n], r[n]);
      if self.frozen && len > 0 {
        let (sl, sr) = self.buf.frame(self.pos as usize);
        let g = seam_gain(self.pos, len, SEAM_FADE);
        l[n] = sl * g;
        r[n] = sr * g;
        self.pos = (self.pos + step).rem_euclid(len as f32);
        if self.pos >= len as f32 { self.pos = 0.0; }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SR: f32 = 48_000.0;

  fn feed(s: &mut Stutter, frames: usize, value: impl Fn(usize) -> f32) -> Vec<f32> {
    let mut out = Vec::with_capacity(frames);
    for chunk in 0..frames / 128 {
      let mut l: Vec<f32> = (0..128).map(|i| value(chunk * 128 + i)).collect();
      let mut r = l.clone();
      s.process(&mut l, &mut r);
      out.extend_from_slice(&l);
    }
    out
  }

  #[test]
  fn freezes_one_division_of_history() {
    let mut s = Stutter::new(SR, 8.0);
    let mut p = StutterParams { division: 0.75, speed: 0.5, feedback: 0.0, mix: 1.0 };
    s.set_params(&p, 120.0, true);
    feed(&mut s, 48_000, |i| i as f32);
    p.feedback = 1.0;
    s.set_params(&p, 120.0, true);
    // quarter note at 120 bpm
    assert_eq!(s.loop_len(), 24_000);
    let out = feed(&mut s, 24_064, |_| -1.0);
    assert!(out.iter().all(|v| *v >= 0.0), "frozen output must not contain live input");
  }

  #[test]
  fn recaptures_only_when_division_changes() {
    let mut s = Stutter::new(SR, 8.0);
    let mut p = StutterParams { division: 0.5, speed: 0.5, feedback: 1.0, mix: 1.0 };
    s.set_params(&p, 120.0, true);
    let len = s.loop_len();
    feed(&mut s, 1280, |_| 0.5);
    s.pos = 17.0;
    p.speed = 0.6;
    s.set_params(&p, 120.0, true);
    assert_eq!(s.pos, 17.0);
    p.division = 1.0;
    s.set_params(&p, 120.0, true);
    assert_eq!(s.pos, 0.0);
    assert!(s.loop_len() > len);
  }

  #[test]
  fn reverse_playback_and_bad_tempo_are_safe() {
    let mut s = Stutter::new(SR, 8.0);
    let p = StutterParams { division: 0.0, speed: 0.0, feedback: 1.0, mix: 1.0 };
    s.set_params(&p, 0.0, true);
    assert!(s.loop_len() >= MIN_LEN);
    let out = feed(&mut s, 4096, |i| (i as f32 * 0.01).sin());
    assert!(out.iter().all(|v| v.is_finite()));
    assert!(s.pos >= 0.0 && s.pos < s.loop_len() as f32);
  }

  #[test]
  fn pad_centre_replays_at_normal_speed() {
    assert_eq!(Stutter::rate(0.5), 1.0);
    assert_eq!(Stutter::rate(0.0), -1.0);
    let mut s = Stutter::new(SR, 8.0);
    let mut p = StutterParams { division: 0.75, speed: 0.5, feedback: 0.0, mix: 1.0 };
    s.set_params(&p, 120.0, true);
    feed(&mut s, 48_000, |_| 0.5);
    p.feedback = 1.0;
    s.set_params(&p, 120.0, true);
    let out = feed(&mut s, 4096, |_| 0.0);
    assert!(out[1024..].iter().all(|v| (*v - 0.5).abs() < 1e-6));
  }

  #[test]
  fn releasing_feedback_returns_live_signal() {
    let mut s = Stutter::new(SR, 8.0);
    let mut p = StutterParams { feedback: 1.0, ..StutterParams::default() };
    s.set_params(&p, 120.0, true);
    p.feedback = 0.0;
    s.set_params(&p, 120.0, true);
    assert!(!s.is_frozen());
    let out = feed(&mut s, 256, |_| 0.25);
    assert!(out.iter().all(|v| *v == 0.25));
  }
}
