use super::params::GlitchParams;

/// Sample-and-hold bit reduction with random hold re-triggering ("shuffle").
pub struct Glitch {
  params: GlitchParams,
  active: bool,
  hold_l: f32,
  hold_r: f32,
  cnt: i64,
  rng: fastrand::Rng,
}

impl Glitch {
  pub fn new(seed: u64) -> Self {
    Self { params: GlitchParams::default(), active: false, hold_l: 0.0, hold_r: 0.0, cnt: 0, rng: fastrand::Rng::with_seed(seed) }
  }

  pub fn set_params(&mut self, p: &GlitchParams, on: bool) {
    self.params = *p;
    self.active = on;
  }

  #[inline]
  pub fn hold_steps(rate: f32) -> i64 { 1 + (rate * rate * 200.0).floor() as i64 }

  #[inline]
  pub fn levels(crush: f32) -> f32 { (16.0 - crush * 15.0).exp2() }

  #[inline]
  fn quantize(x: f32, levels: f32) -> f32 { (x * levels).floor() / levels }

  pub fn process(&mut self, l: &mut [f32], r: &mut [f32]) {
    // inactive: untouched pass-through
    if !self.active { return; }
    let hold = Self::hold_steps(self.params.rate);
    let levels = Self::levels(self.params.crush);
    let shuffle = self.params.shuffle;
    let mut cnt = self.cnt;
    for n in 0..l.len().min(r.len()) {
      if cnt.rem_euclid(hold) == 0 {
        self.hold_l = l[n];
        self.hold_r = r[n];
        if shuffle > 0.0 && self.rng.f32() < shuffle * 0.1 {
          cnt -= (self.rng.f32() * hold as f32).floor() as i64;
        }
      }
      cnt += 1;
      l[n] = Self::quantize(self.hold_l, levels);
      r[n] = Self::quantize(self.hold_r, levels);
    }
    // keep the counter small; only its phase within `hold` matters
    self.cnt = cnt.rem_euclid(hold);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ramp(n: usize) -> (Vec<f32>, Vec<f32>) {
    let l: Vec<f32> = (0..n).map(|i| i as f32 / n as f32).collect();
    (l.clone(), l)
  }

  #[test]
  fn bypass_is_exact_pass_through() {
    let mut g = Glitch::new(1);
    g.set_params(&GlitchParams { crush: 1.0, rate: 1.0, shuffle: 1.0, mix: 1.0 }, false);
    let (mut l, mut r) = ramp(256);
    let (el, er) = ramp(256);
    g.process(&mut l, &mut r);
    assert_eq!(l, el);
    assert_eq!(r, er);
  }

  #[test]
  fn holds_for_rate_squared_steps() {
    assert_eq!(Glitch::hold_steps(0.0), 1);
    assert_eq!(Glitch::hold_steps(0.5), 51);
    assert_eq!(Glitch::hold_steps(1.0), 201);
    let mut g = Glitch::new(1);
    g.set_params(&GlitchParams { crush: 0.0, rate: 0.5, shuffle: 0.0, mix: 1.0 }, true);
    let (mut l, mut r) = ramp(200);
    g.process(&mut l, &mut r);
    assert!(l[..51].iter().all(|&v| v == l[0]));
    assert_ne!(l[51], l[50]);
  }

  #[test]
  fn crush_reduces_levels() {
    assert_eq!(Glitch::levels(1.0), 2.0);
    assert_eq!(Glitch::levels(0.0), 65_536.0);
    let mut g = Glitch::new(1);
    g.set_params(&GlitchParams { crush: 1.0, rate: 0.0, shuffle: 0.0, mix: 1.0 }, true);
    let (mut l, mut r) = ramp(64);
    g.process(&mut l, &mut r);
    assert!(l.iter().all(|v| *v == 0.0 || *v == 0.5));
  }

  #[test]
  fn shuffle_stays_bounded() {
    let mut g = Glitch::new(9);
    g.set_params(&GlitchParams { crush: 0.3, rate: 0.8, shuffle: 1.0, mix: 1.0 }, true);
    for _ in 0..100 {
      let (mut l, mut r) = ramp(128);
      g.process(&mut l, &mut r);
      assert!(l.iter().chain(r.iter()).all(|v| v.is_finite() && v.abs() <= 1.0));
    }
  }
}
