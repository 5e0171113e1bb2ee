use super::params::FilterFxParams;
use crate::engine::clock::{beats_to_hz, division_beats, division_index};
use crate::engine::dsp::filter::{BiquadKind, TrackedBiquad};
use crate::engine::dsp::oscillator::{Lfo, OscShape};
use crate::engine::params::{db_to_gain, SmoothedParam};

const UPDATE_INTERVAL: u32 = 16;

#[inline]
pub fn cutoff_hz(normalized: f32) -> f32 { 20.0 * 1000f32.powf(normalized) }

/// Resonance in [0, 1] maps to 0..30 dB of peak, as a linear Q.
#[inline]
pub fn resonance_q(normalized: f32) -> f32 { db_to_gain(normalized * 30.0) }

#[inline]
pub fn lfo_depth_hz(amount: f32) -> f32 { amount * 2000.0 }

/// Biquad whose cutoff is swept by a tempo-synced sine LFO.
pub struct FilterFx {
  sr: f32,
  kind: BiquadKind,
  left: TrackedBiquad,
  right: TrackedBiquad,
  lfo: Lfo,
  cutoff: SmoothedParam,
  q: SmoothedParam,
  lfo_hz: SmoothedParam,
  depth: SmoothedParam,
  counter: u32,
}

impl FilterFx {
  pub fn new(sr: f32) -> Self {
    let d = FilterFxParams::default();
    Self {
      sr,
      kind: d.kind,
      left: TrackedBiquad::default(),
      right: TrackedBiquad::default(),
      lfo: Lfo::new(sr, 5),
      cutoff: SmoothedParam::new(cutoff_hz(d.cutoff), 0.02, sr),
      q: SmoothedParam::new(resonance_q(d.resonance), 0.02, sr),
      lfo_hz: SmoothedParam::new(1.0, 0.02, sr),
      depth: SmoothedParam::new(0.0, 0.02, sr),
      counter: 0,
    }
  }

  pub fn set_params(&mut self, p: &FilterFxParams, bpm: f32) {
    self.kind = p.kind;
    self.cutoff.set_target(cutoff_hz(p.cutoff));
    self.q.set_target(resonance_q(p.resonance));
    self.lfo_hz.set_target(beats_to_hz(bpm, division_beats(division_index(p.lfo_rate))));
    self.depth.set_target(lfo_depth_hz(p.lfo_amount));
  }

  pub fn process(&mut self, l: &mut [f32], r: &mut [f32]) {
    for n in 0..l.len().min(r.len()) {
      let lfo = self.lfo.next(self.lfo_hz.next(), OscShape::Sine);
      let cutoff = self.cutoff.next();
      let q = self.q.next();
      let depth = self.depth.next();
      if self.counter == 0 {
        let f = (cutoff + lfo * depth).clamp(20.0, self.sr * 0.45);
        self.left.update(self.kind, self.sr, f, q, 0.0);
        self.right.update(self.kind, self.sr, f, q, 0.0);
      }
      self.counter = (self.counter + 1) % UPDATE_INTERVAL;
      l[n] = self.left.process(l[n]);
      r[n] = self.right.process(r[n]);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::f32::consts::PI;

  #[test]
  fn mappings() {
    assert_eq!(cutoff_hz(0.0), 20.0);
    assert!((cutoff_hz(1.0) - 20_000.0).abs() < 1.0);
    assert!((resonance_q(0.0) - 1.0).abs() < 1e-6);
    assert_eq!(lfo_depth_hz(0.5), 1000.0);
  }

  #[test]
  fn closed_lowpass_darkens_high_tone() {
    let sr = 48_000.0;
    let mut fx = FilterFx::new(sr);
    let p = FilterFxParams { cutoff: 0.2, ..FilterFxParams::default() };
    fx.set_params(&p, 120.0);
    let mut acc = 0.0;
    for b in 0..100 {
      let mut l: Vec<f32> = (0..128).map(|i| (2.0 * PI * 8000.0 * (b * 128 + i) as f32 / sr).sin()).collect();
      let mut r = l.clone();
      fx.process(&mut l, &mut r);
      if b > 50 {
        acc += l.iter().map(|v| v.abs()).sum::<f32>();
      }
    }
    assert!(acc / (49.0 * 128.0) < 0.05);
  }
}
