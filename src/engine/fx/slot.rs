use super::{EffectParams, EffectType, Processor};
use crate::engine::params::{safe_clamp, SmoothedParam};

const GAIN_RAMP: f32 = 0.02;

/// One position in the chain. Signal flow:
/// input -> dry gain -> output, input -> wet gain -> processor -> effect-out gain -> output.
pub struct EffectSlot {
  processor: Box<Processor>,
  params: EffectParams,
  on: bool,
  dry: SmoothedParam,
  wet: SmoothedParam,
  out: SmoothedParam,
  scratch_l: Vec<f32>,
  scratch_r: Vec<f32>,
}

impl EffectSlot {
  pub fn new(processor: Box<Processor>, sr: f32, max_block: usize) -> Self {
    let params = EffectParams::default_for(processor.effect_type());
    Self {
      processor,
      params,
      on: false,
      dry: SmoothedParam::new(1.0, GAIN_RAMP, sr),
      wet: SmoothedParam::new(0.0, GAIN_RAMP, sr),
      out: SmoothedParam::new(0.0, GAIN_RAMP, sr),
      scratch_l: vec![0.0; max_block.max(1)],
      scratch_r: vec![0.0; max_block.max(1)],
    }
  }

  pub fn effect_type(&self) -> EffectType { self.processor.effect_type() }

  pub fn is_on(&self) -> bool { self.on }

  /// Swap in a processor built elsewhere; the previous one is handed back so
  /// the caller decides where it gets dropped.
  pub fn install(&mut self, mut processor: Box<Processor>, params: EffectParams, bpm: f32) -> Box<Processor> {
    std::mem::swap(&mut self.processor, &mut processor);
    self.params = params;
    self.processor.set_params(&self.params, bpm, self.on);
    self.update_gains();
    processor
  }

  pub fn set_params(&mut self, params: EffectParams, bpm: f32) {
    // a stale update for the previous type is dropped
    if params.effect_type() != self.processor.effect_type() { return; }
    self.params = params;
    self.processor.set_params(&self.params, bpm, self.on);
    self.update_gains();
  }

  pub fn set_on(&mut self, on: bool, bpm: f32) {
    self.on = on;
    self.processor.set_params(&self.params, bpm, on);
    self.update_gains();
  }

  pub fn set_bpm(&mut self, bpm: f32) { self.processor.set_params(&self.params, bpm, self.on); }

  fn update_gains(&mut self) {
    if self.on {
      let mix = safe_clamp(self.params.mix(), 1.0, 0.0, 1.0);
      self.dry.set_target(1.0 - mix);
      self.wet.set_target(1.0);
      self.out.set_target(mix);
    } else {
      self.dry.set_target(1.0);
      self.wet.set_target(0.0);
      self.out.set_target(0.0);
    }
  }

  /// Current (dry, wet, effect-out) gain targets.
  pub fn gain_targets(&self) -> (f32, f32, f32) { (self.dry.target(), self.wet.target(), self.out.target()) }

  pub fn process(&mut self, l: &mut [f32], r: &mut [f32]) {
    let cap = self.scratch_l.len();
    let frames = l.len().min(r.len());
    let mut start = 0;
    while start < frames {
      let end = (start + cap).min(frames);
      let n = end - start;
      for i in 0..n {
        let g = self.wet.next();
        self.scratch_l[i] = l[start + i] * g;
        self.scratch_r[i] = r[start + i] * g;
      }
      self.processor.process(&mut self.scratch_l[..n], &mut self.scratch_r[..n]);
      for i in 0..n {
        let d = self.dry.next();
        let o = self.out.next();
        l[start + i] = l[start + i] * d + self.scratch_l[i] * o;
        r[start + i] = r[start + i] * d + self.scratch_r[i] * o;
      }
      start = end;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn slot(kind: EffectType) -> EffectSlot {
    EffectSlot::new(Box::new(Processor::new(kind, 48_000.0, 1.0)), 48_000.0, 128)
  }

  #[test]
  fn on_keeps_dry_at_one_minus_mix() {
    let mut s = slot(EffectType::Reverb);
    let mut p = EffectParams::default_for(EffectType::Reverb);
    p.set("mix", &crate::engine::messages::ParamValue::F32(0.3));
    s.set_params(p, 120.0);
    assert_eq!(s.gain_targets(), (1.0, 0.0, 0.0));
    s.set_on(true, 120.0);
    let (dry, wet, out) = s.gain_targets();
    assert!((dry - 0.7).abs() < 1e-6);
    assert_eq!(wet, 1.0);
    assert!((out - 0.3).abs() < 1e-6);
  }

  #[test]
  fn off_slot_passes_signal_unchanged() {
    let mut s = slot(EffectType::Glitch);
    let mut l: Vec<f32> = (0..300).map(|i| (i as f32 * 0.1).sin()).collect();
    let mut r = l.clone();
    let expected = l.clone();
    s.process(&mut l, &mut r);
    assert_eq!(l, expected);
  }

  #[test]
  fn mismatched_params_are_ignored() {
    let mut s = slot(EffectType::Glitch);
    s.set_params(EffectParams::default_for(EffectType::Stutter), 120.0);
    assert_eq!(s.params.effect_type(), EffectType::Glitch);
  }

  #[test]
  fn install_returns_previous_processor() {
    let mut s = slot(EffectType::Filter);
    let old = s.install(Box::new(Processor::new(EffectType::Stutter, 48_000.0, 1.0)), EffectParams::default_for(EffectType::Stutter), 120.0);
    assert_eq!(old.effect_type(), EffectType::Filter);
    assert_eq!(s.effect_type(), EffectType::Stutter);
  }
}
