use super::capture::{seam_gain, CaptureBuffer};
use super::params::DjLooperParams;
use crate::engine::clock::{capture_len, division_beats, division_index};

pub const ENGAGE_THRESHOLD: f32 = 0.1;
pub const MIN_LEN: usize = 256;
const SEAM_FADE: f32 = 250.0;
const MIX_SLEW: f32 = 0.005;

#[inline]
pub fn length_multiplier(normalized: f32) -> f32 { 1.0 + (normalized.clamp(0.0, 1.0) * 7.0).floor() }

/// Beat-synced freeze/loop with a slewed live/loop crossfade.
pub struct DjLooper {
  sr: f32,
  buf: CaptureBuffer,
  params: DjLooperParams,
  active: bool,
  looping: bool,
  division: usize,
  multiplier: f32,
  pos: usize,
  mix: f32,
  slew: f32,
  fade_in: f32,
  fade_step: f32,
}

impl DjLooper {
  pub fn new(sr: f32, capture_seconds: f32) -> Self {
    Self {
      sr,
      buf: CaptureBuffer::new(capture_seconds, sr),
      params: DjLooperParams::default(),
      active: false,
      looping: false,
      division: usize::MAX,
      multiplier: 0.0,
      pos: 0,
      mix: 0.0,
      slew: 1.0 - (-1.0 / (MIX_SLEW * sr)).exp(),
      fade_in: 1.0,
      fade_step: 1.0,
    }
  }

  pub fn is_looping(&self) -> bool { self.looping }

  pub fn loop_len(&self) -> usize { self.buf.loop_len() }

  pub fn set_params(&mut self, p: &DjLooperParams, bpm: f32, on: bool) {
    self.params = *p;
    self.active = on;
    if !on {
      self.looping = false;
      self.mix = 0.0;
      return;
    }
    let should = p.mix > ENGAGE_THRESHOLD;
    let division = division_index(p.loop_division);
    let multiplier = length_multiplier(p.length_multiplier);
    if should && (!self.looping || division != self.division || multiplier != self.multiplier) {
      self.looping = true;
      self.division = division;
      self.multiplier = multiplier;
      self.pos = 0;
      let len = capture_len(self.sr, bpm, division_beats(division), multiplier, MIN_LEN, self.buf.capacity());
      self.buf.capture(len);
      let fade = (p.fade_time.clamp(0.0, 1.0) * self.sr).max(1.0);
      self.fade_in = 0.0;
      self.fade_step = 1.0 / fade;
    } else if !should {
      self.looping = false;
    }
  }

  pub fn process(&mut self, l: &mut [f32], r: &mut [f32]) {
    if !self.active { return; }
    let len = self.buf.loop_len();
    let target = if self.looping && len > 0 { 1.0 } else { 0.0 };
    for n in 0..l.len().min(r.len()) {
      self.buf.write(l[n], r[n]);
      self.mix += self.slew * (target - self.mix);
      if self.mix < 1e-5 && target == 0.0 {
        self.mix = 0.0;
        continue;
      }
      let (mut sl, mut sr) = (0.0, 0.0);
      if len > 0 {
        let (a, b) = self.buf.frame(self.pos);
        let g = seam_gain(self.pos as f32, len, SEAM_FADE) * self.fade_in;
        sl = a * g;
        sr = b * g;
        self.fade_in = (self.fade_in + self.fade_step).min(1.0);
        self.pos = (self.pos + 1) % len;
      }
      l[n] += (sl - l[n]) * self.mix;
      r[n] += (sr - r[n]) * self.mix;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SR: f32 = 48_000.0;

  fn run(lp: &mut DjLooper, frames: usize, value: f32) -> Vec<f32> {
    let mut out = Vec::new();
    for _ in 0..frames / 128 {
      let mut l = vec![value; 128];
      let mut r = l.clone();
      lp.process(&mut l, &mut r);
      out.extend_from_slice(&l);
    }
    out
  }

  #[test]
  fn multiplier_scales_loop_length() {
    assert_eq!(length_multiplier(0.0), 1.0);
    assert_eq!(length_multiplier(1.0), 8.0);
    let mut lp = DjLooper::new(SR, 8.0);
    let p = DjLooperParams { loop_division: 0.75, length_multiplier: 2.0 / 7.0 + 1e-3, fade_time: 0.01, mix: 1.0 };
    lp.set_params(&p, 120.0, true);
    assert_eq!(lp.loop_len(), 3 * 24_000);
  }

  #[test]
  fn long_loops_clamp_to_capacity() {
    let mut lp = DjLooper::new(SR, 8.0);
    let p = DjLooperParams { loop_division: 1.0, length_multiplier: 1.0, fade_time: 0.0, mix: 1.0 };
    lp.set_params(&p, 40.0, true);
    assert_eq!(lp.loop_len(), (8.0 * SR) as usize);
  }

  #[test]
  fn crossfade_is_slewed_not_switched() {
    let mut lp = DjLooper::new(SR, 8.0);
    let mut p = DjLooperParams { loop_division: 0.0, length_multiplier: 0.0, fade_time: 0.0, mix: 0.0 };
    lp.set_params(&p, 120.0, true);
    run(&mut lp, 4096, 0.0);
    p.mix = 1.0;
    lp.set_params(&p, 120.0, true);
    let out = run(&mut lp, 128, 1.0);
    // first sample is still almost entirely live input
    assert!(out[0] > 0.9);
    let out = run(&mut lp, 4096, 1.0);
    assert!(out[4000].abs() < 0.05);
  }

  #[test]
  fn dropping_mix_below_threshold_releases() {
    let mut lp = DjLooper::new(SR, 8.0);
    let mut p = DjLooperParams { mix: 1.0, ..DjLooperParams::default() };
    lp.set_params(&p, 120.0, true);
    assert!(lp.is_looping());
    p.mix = 0.05;
    lp.set_params(&p, 120.0, true);
    assert!(!lp.is_looping());
    let out = run(&mut lp, 48_000, 0.3);
    assert!((out[47_999] - 0.3).abs() < 1e-6);
  }
}
