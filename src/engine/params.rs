// Control parameters shared between the control context (writes targets) and the
// render context (reads one smoothed value per sample).

/// Below this magnitude a target counts as "zero" and the smoother snaps to it.
pub const SNAP_FLOOR: f32 = 1e-5;

/// Replace NaN/Infinity with `fallback`.
#[inline]
pub fn safe(v: f32, fallback: f32) -> f32 {
  if v.is_finite() { v } else { fallback }
}

#[inline]
pub fn safe_clamp(v: f32, fallback: f32, lo: f32, hi: f32) -> f32 {
  safe(v, fallback).clamp(lo, hi)
}

#[inline]
pub fn clamp01(v: f32) -> f32 { safe(v, 0.0).clamp(0.0, 1.0) }

#[inline]
pub fn cents_to_ratio(c: f32) -> f32 { 2f32.powf(c / 1200.0) }

#[inline]
pub fn db_to_gain(db: f32) -> f32 { 10f32.powf(db / 20.0) }

#[inline]
pub fn gain_to_db(g: f32) -> f32 { 20.0 * g.abs().max(1e-9).log10() }

/// One-pole exponential approach to a target, the render-side half of a control
/// parameter. `time_constant` is in seconds; after ~5 time constants the value is
/// within 1% of the target.
#[derive(Clone, Debug)]
pub struct SmoothedParam {
  value: f32,
  target: f32,
  coeff: f32,
  sr: f32,
  time_constant: f32,
}

impl SmoothedParam {
  pub fn new(initial: f32, time_constant: f32, sr: f32) -> Self {
    let initial = safe(initial, 0.0);
    let mut p = Self { value: initial, target: initial, coeff: 0.0, sr: safe(sr, 48_000.0).max(1.0), time_constant: 0.0 };
    p.set_time_constant(time_constant);
    p
  }

  pub fn set_time_constant(&mut self, seconds: f32) {
    let tc = safe(seconds, 0.01).max(0.000_1);
    self.time_constant = tc;
    self.coeff = (-1.0 / (tc * self.sr)).exp();
  }

  #[inline]
  pub fn time_constant(&self) -> f32 { self.time_constant }

  /// Never blocks; a non-finite target keeps the previous one.
  #[inline]
  pub fn set_target(&mut self, target: f32) {
    if target.is_finite() { self.target = target; }
  }

  /// Jump straight to `v` (used on re-arm, never for continuous controls).
  #[inline]
  pub fn snap(&mut self, v: f32) {
    let v = safe(v, self.target);
    self.value = v;
    self.target = v;
  }

  #[inline]
  pub fn target(&self) -> f32 { self.target }

  #[inline]
  pub fn value(&self) -> f32 { self.value }

  #[inline]
  pub fn is_settled(&self) -> bool { self.value == self.target }

  #[inline]
  pub fn next(&mut self) -> f32 {
    if self.value != self.target {
      self.value = self.coeff * self.value + (1.0 - self.coeff) * self.target;
      let d = (self.value - self.target).abs();
      if d < SNAP_FLOOR && (self.target.abs() < SNAP_FLOOR || d < self.target.abs() * 1e-6) {
        self.value = self.target;
      }
    }
    self.value
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn converges_within_five_time_constants() {
    let sr = 48_000.0;
    let mut p = SmoothedParam::new(0.0, 0.01, sr);
    p.set_target(1.0);
    let n = (5.0 * 0.01 * sr) as usize;
    let mut v = 0.0;
    for _ in 0..n { v = p.next(); }
    assert!((1.0 - v) < 0.01, "value {v} not within 1% after 5 tau");
  }

  #[test]
  fn reaches_exact_zero_instead_of_denormals() {
    let mut p = SmoothedParam::new(1.0, 0.001, 48_000.0);
    p.set_target(0.0);
    for _ in 0..48_000 { p.next(); }
    assert_eq!(p.value(), 0.0);
    assert!(p.is_settled());
  }

  #[test]
  fn non_finite_targets_are_ignored() {
    let mut p = SmoothedParam::new(0.5, 0.01, 48_000.0);
    p.set_target(f32::NAN);
    p.set_target(f32::INFINITY);
    assert_eq!(p.target(), 0.5);
    assert_eq!(safe(f32::NEG_INFINITY, 3.0), 3.0);
    assert_eq!(clamp01(f32::NAN), 0.0);
  }
}
