use std::f32::consts::PI;

use dasp::Signal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OscShape {
  Sine,
  Square,
  #[default]
  #[serde(rename = "Saw Down")]
  SawDown,
  #[serde(rename = "Saw Up")]
  SawUp,
  Triangle,
  Noise,
  Glitch,
}

impl OscShape {
  pub fn is_noise(self) -> bool { matches!(self, OscShape::Noise | OscShape::Glitch) }
}

// Band-limited step correction for the naive saw/square edges.
#[inline]
fn poly_blep(phase: f32, dt: f32) -> f32 {
  if dt <= 0.0 { return 0.0; }
  if phase < dt {
    let t = phase / dt;
    2.0 * t - t * t - 1.0
  } else if phase > 1.0 - dt {
    let t = (phase - 1.0) / dt;
    t * t + 2.0 * t + 1.0
  } else {
    0.0
  }
}

/// Phase-accumulator oscillator. Phase is in cycles, `[0,1)`.
#[derive(Clone)]
pub struct Osc {
  phase: f32,
  sr: f32,
  wrapped: bool,
  noise: NoiseSource,
}

impl Osc {
  pub fn new(sr: f32, seed: u64) -> Self { Self { phase: 0.0, sr, wrapped: false, noise: NoiseSource::new(seed) } }

  pub fn reset(&mut self) { self.phase = 0.0; }

  /// Hard sync: restart the cycle.
  #[inline]
  pub fn sync(&mut self) { self.phase = 0.0; }

  /// True when the last `next` call crossed a cycle boundary.
  #[inline]
  pub fn wrapped(&self) -> bool { self.wrapped }

  #[inline]
  pub fn phase(&self) -> f32 { self.phase }

  pub fn next(&mut self, freq: f32, shape: OscShape) -> f32 {
    let freq = if freq.is_finite() { freq.clamp(-self.sr * 0.49, self.sr * 0.49) } else { 0.0 };
    let dt = (freq / self.sr).abs();
    let p = self.phase;
    let out = match shape {
      OscShape::Sine => (2.0 * PI * p).sin(),
      OscShape::SawDown => (1.0 - 2.0 * p) + poly_blep(p, dt),
      OscShape::SawUp => (2.0 * p - 1.0) - poly_blep(p, dt),
      OscShape::Square => {
        let naive = if p < 0.5 { 1.0 } else { -1.0 };
        naive + poly_blep(p, dt) - poly_blep((p + 0.5) % 1.0, dt)
      }
      OscShape::Triangle => 2.0 * (2.0 * ((p + 0.25) % 1.0) - 1.0).abs() - 1.0,
      OscShape::Noise => self.noise.white(),
      OscShape::Glitch => self.noise.stepped(),
    };
    let next = p + freq / self.sr;
    self.wrapped = !(0.0..1.0).contains(&next);
    self.phase = next.rem_euclid(1.0);
    out
  }
}

/// White noise and a stepped "glitch" variant that holds a random level and
/// jumps with low probability per sample.
#[derive(Clone)]
pub struct NoiseSource {
  white: dasp::signal::Noise,
  held: f32,
}

const GLITCH_JUMP_PROBABILITY: f32 = 0.005;

impl NoiseSource {
  pub fn new(seed: u64) -> Self { Self { white: dasp::signal::noise(seed), held: 0.0 } }

  #[inline]
  pub fn white(&mut self) -> f32 { self.white.next() as f32 }

  #[inline]
  pub fn stepped(&mut self) -> f32 {
    let chance = 0.5 * (self.white() + 1.0);
    if chance < GLITCH_JUMP_PROBABILITY { self.held = self.white(); }
    self.held
  }
}

/// Low-frequency oscillator, bipolar output.
#[derive(Clone)]
pub struct Lfo {
  osc: Osc,
  held: f32,
}

impl Lfo {
  pub fn new(sr: f32, seed: u64) -> Self { Self { osc: Osc::new(sr, seed), held: 0.0 } }

  pub fn retrigger(&mut self) { self.osc.reset(); }

  pub fn next(&mut self, hz: f32, shape: OscShape) -> f32 {
    match shape {
      // noise shapes turn into sample & hold clocked at the LFO rate
      OscShape::Noise | OscShape::Glitch => {
        let v = self.osc.noise.white();
        self.osc.next(hz, OscShape::Sine);
        if self.osc.wrapped() { self.held = v; }
        self.held
      }
      _ => self.osc.next(hz, shape),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sine_stays_in_range_and_wraps() {
    let mut osc = Osc::new(48_000.0, 1);
    let mut wraps = 0;
    for _ in 0..48_000 {
      let s = osc.next(100.0, OscShape::Sine);
      assert!(s.abs() <= 1.0001);
      if osc.wrapped() { wraps += 1; }
    }
    assert!((99..=101).contains(&wraps), "got {wraps} cycles");
  }

  #[test]
  fn non_finite_frequency_holds_phase() {
    let mut osc = Osc::new(48_000.0, 1);
    osc.next(f32::NAN, OscShape::SawDown);
    assert_eq!(osc.phase(), 0.0);
  }

  #[test]
  fn noise_is_bounded_and_not_constant() {
    let mut n = NoiseSource::new(7);
    let samples: Vec<f32> = (0..256).map(|_| n.white()).collect();
    assert!(samples.iter().all(|s| s.abs() <= 1.0));
    assert!(samples.windows(2).any(|w| w[0] != w[1]));
  }
}
