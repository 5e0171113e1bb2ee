use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Responses the RBJ cookbook biquad can be set to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiquadKind {
  #[default]
  Lowpass,
  Highpass,
  Bandpass,
  Lowshelf,
  Highshelf,
  Peaking,
  Notch,
  Allpass,
}

// Transposed direct form II, coefficients normalized by a0.
#[derive(Clone, Copy, Debug)]
pub struct Biquad {
  b0: f32,
  b1: f32,
  b2: f32,
  a1: f32,
  a2: f32,
  z1: f32,
  z2: f32,
}

impl Default for Biquad {
  fn default() -> Self { Self::new() }
}

impl Biquad {
  pub fn new() -> Self { Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0, z1: 0.0, z2: 0.0 } }

  pub fn reset(&mut self) { self.z1 = 0.0; self.z2 = 0.0; }

  /// Recompute coefficients. `gain_db` only matters for shelf/peaking.
  pub fn set(&mut self, kind: BiquadKind, sr: f32, freq: f32, q: f32, gain_db: f32) {
    let freq = if freq.is_finite() { freq.clamp(10.0, sr * 0.49) } else { 1000.0 };
    let q = if q.is_finite() { q.max(0.05) } else { 0.707 };
    let a = 10.0_f32.powf(gain_db / 40.0);
    let w0 = 2.0 * PI * (freq / sr);
    let cosw0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);
    let (b0, b1, b2, a0, a1, a2) = match kind {
      BiquadKind::Lowpass => {
        let b1 = 1.0 - cosw0;
        (b1 / 2.0, b1, b1 / 2.0, 1.0 + alpha, -2.0 * cosw0, 1.0 - alpha)
      }
      BiquadKind::Highpass => {
        let b1 = -(1.0 + cosw0);
        (-b1 / 2.0, b1, -b1 / 2.0, 1.0 + alpha, -2.0 * cosw0, 1.0 - alpha)
      }
      BiquadKind::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cosw0, 1.0 - alpha),
      BiquadKind::Notch => (1.0, -2.0 * cosw0, 1.0, 1.0 + alpha, -2.0 * cosw0, 1.0 - alpha),
      BiquadKind::Allpass => (1.0 - alpha, -2.0 * cosw0, 1.0 + alpha, 1.0 + alpha, -2.0 * cosw0, 1.0 - alpha),
      BiquadKind::Peaking => (1.0 + alpha * a, -2.0 * cosw0, 1.0 - alpha * a, 1.0 + alpha / a, -2.0 * cosw0, 1.0 - alpha / a),
      BiquadKind::Lowshelf => {
        let sq = 2.0 * a.sqrt() * alpha;
        (
          a * ((a + 1.0) - (a - 1.0) * cosw0 + sq),
          2.0 * a * ((a - 1.0) - (a + 1.0) * cosw0),
          a * ((a + 1.0) - (a - 1.0) * cosw0 - sq),
          (a + 1.0) + (a - 1.0) * cosw0 + sq,
          -2.0 * ((a - 1.0) + (a + 1.0) * cosw0),
          (a + 1.0) + (a - 1.0) * cosw0 - sq,
        )
      }
      BiquadKind::Highshelf => {
        let sq = 2.0 * a.sqrt() * alpha;
        (
          a * ((a + 1.0) + (a - 1.0) * cosw0 + sq),
          -2.0 * a * ((a - 1.0) + (a + 1.0) * cosw0),
          a * ((a + 1.0) + (a - 1.0) * cosw0 - sq),
          (a + 1.0) - (a - 1.0) * cosw0 + sq,
          2.0 * ((a - 1.0) - (a + 1.0) * cosw0),
          (a + 1.0) - (a - 1.0) * cosw0 - sq,
        )
      }
    };
    self.b0 = b0 / a0;
    self.b1 = b1 / a0;
    self.b2 = b2 / a0;
    self.a1 = a1 / a0;
    self.a2 = a2 / a0;
  }

  #[inline]
  pub fn process(&mut self, x: f32) -> f32 {
    let y = self.b0 * x + self.z1;
    self.z1 = self.b1 * x - self.a1 * y + self.z2;
    self.z2 = self.b2 * x - self.a2 * y;
    // an unstable coefficient set must not poison the state forever
    if !y.is_finite() { self.reset(); return 0.0; }
    y
  }
}

/// Coefficient cache: only recompute when cutoff/Q moved noticeably.
#[derive(Clone, Copy, Debug)]
pub struct TrackedBiquad {
  pub filter: Biquad,
  last: (BiquadKind, f32, f32, f32),
}

impl Default for TrackedBiquad {
  fn default() -> Self { Self { filter: Biquad::new(), last: (BiquadKind::Allpass, -1.0, -1.0, 0.0) } }
}

impl TrackedBiquad {
  #[inline]
  pub fn update(&mut self, kind: BiquadKind, sr: f32, freq: f32, q: f32, gain_db: f32) {
    let (k, f, r, g) = self.last;
    if k != kind || (f - freq).abs() > f * 1e-3 || (r - q).abs() > 1e-3 || (g - gain_db).abs() > 1e-3 {
      self.filter.set(kind, sr, freq, q, gain_db);
      self.last = (kind, freq, q, gain_db);
    }
  }

  #[inline]
  pub fn process(&mut self, x: f32) -> f32 { self.filter.process(x) }
}

pub struct OnePoleLP { a: f32, y: f32 }

impl Default for OnePoleLP {
  fn default() -> Self { Self::new() }
}

impl OnePoleLP {
  pub fn new() -> Self { Self { a: 0.5, y: 0.0 } }
  #[inline] pub fn set_cutoff(&mut self, hz: f32, sr: f32) { self.a = 1.0 - (-2.0 * PI * hz.clamp(1.0, sr * 0.49) / sr).exp(); }
  #[inline] pub fn tick(&mut self, x: f32) -> f32 { self.y += self.a * (x - self.y); self.y }
  pub fn reset(&mut self) { self.y = 0.0; }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rms_through(kind: BiquadKind, cutoff: f32, tone: f32) -> f32 {
    let sr = 48_000.0;
    let mut bq = Biquad::new();
    bq.set(kind, sr, cutoff, 0.707, 0.0);
    let mut acc = 0.0;
    let n = 9600;
    for i in 0..n {
      let x = (2.0 * PI * tone * i as f32 / sr).sin();
      let y = bq.process(x);
      if i > n / 2 { acc += y * y; }
    }
    (acc / (n / 2) as f32).sqrt()
  }

  #[test]
  fn lowpass_attenuates_above_cutoff() {
    let pass = rms_through(BiquadKind::Lowpass, 1000.0, 100.0);
    let stop = rms_through(BiquadKind::Lowpass, 1000.0, 10_000.0);
    assert!(pass > 0.6);
    assert!(stop < 0.05);
  }

  #[test]
  fn highpass_attenuates_below_cutoff() {
    assert!(rms_through(BiquadKind::Highpass, 2000.0, 50.0) < 0.05);
  }

  #[test]
  fn nan_cutoff_falls_back() {
    let mut bq = Biquad::new();
    bq.set(BiquadKind::Lowpass, 48_000.0, f32::NAN, f32::INFINITY, 0.0);
    for _ in 0..64 { assert!(bq.process(0.5).is_finite()); }
  }
}
