pub mod capture;
pub mod filter_fx;
pub mod glitch;
pub mod looper;
pub mod params;
pub mod reverb;
pub mod slot;
pub mod stutter;

pub use params::{EffectParams, EffectType};
pub use slot::EffectSlot;

use filter_fx::FilterFx;
use glitch::Glitch;
use looper::DjLooper;
use reverb::Reverb;
use stutter::Stutter;

pub const SLOT_COUNT: usize = 4;

/// The processor living inside one slot. Built in the control context and
/// moved to the render thread in a message.
pub enum Processor {
  Filter(FilterFx),
  Glitch(Glitch),
  Stutter(Stutter),
  Reverb(Reverb),
  DjLooper(DjLooper),
}

impl Processor {
  pub fn new(kind: EffectType, sr: f32, capture_seconds: f32) -> Self {
    match kind {
      EffectType::Filter => Processor::Filter(FilterFx::new(sr)),
      EffectType::Glitch => Processor::Glitch(Glitch::new(fastrand::u64(..))),
      EffectType::Stutter => Processor::Stutter(Stutter::new(sr, capture_seconds)),
      EffectType::Reverb => Processor::Reverb(Reverb::new(sr)),
      EffectType::DjLooper => Processor::DjLooper(DjLooper::new(sr, capture_seconds)),
    }
  }

  pub fn effect_type(&self) -> EffectType {
    match self {
      Processor::Filter(_) => EffectType::Filter,
      Processor::Glitch(_) => EffectType::Glitch,
      Processor::Stutter(_) => EffectType::Stutter,
      Processor::Reverb(_) => EffectType::Reverb,
      Processor::DjLooper(_) => EffectType::DjLooper,
    }
  }

  /// Parameters of another type are ignored.
  pub fn set_params(&mut self, params: &EffectParams, bpm: f32, on: bool) {
    match (self, params) {
      (Processor::Filter(fx), EffectParams::Filter(p)) => fx.set_params(p, bpm),
      (Processor::Glitch(fx), EffectParams::Glitch(p)) => fx.set_params(p, on),
      (Processor::Stutter(fx), EffectParams::Stutter(p)) => fx.set_params(p, bpm, on),
      (Processor::Reverb(fx), EffectParams::Reverb(p)) => fx.set_params(p),
      (Processor::DjLooper(fx), EffectParams::DjLooper(p)) => fx.set_params(p, bpm, on),
      _ => {}
    }
  }

  pub fn process(&mut self, l: &mut [f32], r: &mut [f32]) {
    match self {
      Processor::Filter(fx) => fx.process(l, r),
      Processor::Glitch(fx) => fx.process(l, r),
      Processor::Stutter(fx) => fx.process(l, r),
      Processor::Reverb(fx) => fx.process(l, r),
      Processor::DjLooper(fx) => fx.process(l, r),
    }
  }
}

/// Validated processing order. Fixed storage so it can travel in a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Routing {
  order: [u8; SLOT_COUNT],
  len: u8,
}

impl Default for Routing {
  fn default() -> Self { Self { order: [0, 1, 2, 3], len: SLOT_COUNT as u8 } }
}

impl Routing {
  /// Drops out-of-range and repeated indices, keeping first occurrence order.
  pub fn new(indices: &[usize]) -> Self {
    let mut order = [0u8; SLOT_COUNT];
    let mut len = 0usize;
    for &i in indices {
      if i >= SLOT_COUNT || order[..len].contains(&(i as u8)) { continue; }
      order[len] = i as u8;
      len += 1;
    }
    Self { order, len: len as u8 }
  }

  pub fn slots(&self) -> impl Iterator<Item = usize> + '_ { self.order[..self.len as usize].iter().map(|&i| i as usize) }

  pub fn to_vec(&self) -> Vec<usize> { self.slots().collect() }

  pub fn contains(&self, slot: usize) -> bool { self.slots().any(|s| s == slot) }
}

/// Four slots processed in routing order on the master bus.
pub struct FxChain {
  slots: [EffectSlot; SLOT_COUNT],
  routing: Routing,
  bpm: f32,
}

impl FxChain {
  pub fn new(sr: f32, max_block: usize, capture_seconds: f32) -> Self {
    let slots = [0, 1, 2, 3].map(|i| {
      let kind = EffectType::ALL[i % EffectType::ALL.len()];
      EffectSlot::new(Box::new(Processor::new(kind, sr, capture_seconds)), sr, max_block)
    });
    Self { slots, routing: Routing::default(), bpm: crate::engine::clock::DEFAULT_BPM }
  }

  pub fn slot(&self, i: usize) -> Option<&EffectSlot> { self.slots.get(i) }

  pub fn routing(&self) -> Routing { self.routing }

  pub fn set_routing(&mut self, routing: Routing) { self.routing = routing; }

  pub fn set_bpm(&mut self, bpm: f32) {
    self.bpm = bpm;
    for s in &mut self.slots {
      s.set_bpm(bpm);
    }
  }

  /// Returns the displaced processor, or hands back the offered one when the
  /// slot index is bad.
  pub fn install(&mut self, slot: usize, processor: Box<Processor>, params: EffectParams) -> Box<Processor> {
    let bpm = self.bpm;
    match self.slots.get_mut(slot) {
      Some(s) => s.install(processor, params, bpm),
      None => processor,
    }
  }

  pub fn set_params(&mut self, slot: usize, params: EffectParams) {
    let bpm = self.bpm;
    if let Some(s) = self.slots.get_mut(slot) { s.set_params(params, bpm); }
  }

  pub fn set_on(&mut self, slot: usize, on: bool) {
    let bpm = self.bpm;
    if let Some(s) = self.slots.get_mut(slot) { s.set_on(on, bpm); }
  }

  pub fn process(&mut self, l: &mut [f32], r: &mut [f32]) {
    let routing = self.routing;
    for i in routing.slots() {
      self.slots[i].process(l, r);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::messages::ParamValue;

  #[test]
  fn routing_drops_bad_and_duplicate_indices() {
    let r = Routing::new(&[2, 7, 0, 2, 3]);
    assert_eq!(r.to_vec(), vec![2, 0, 3]);
    assert!(!r.contains(1));
    assert_eq!(Routing::new(&[]).to_vec(), Vec::<usize>::new());
  }

  #[test]
  fn processor_ignores_foreign_params() {
    let mut p = Processor::new(EffectType::Reverb, 48_000.0, 1.0);
    p.set_params(&EffectParams::default_for(EffectType::Glitch), 120.0, true);
    assert_eq!(p.effect_type(), EffectType::Reverb);
  }

  #[test]
  fn unlisted_slots_are_silent_and_empty_routing_passes_through() {
    let mut chain = FxChain::new(48_000.0, 128, 1.0);
    let mut params = EffectParams::default_for(EffectType::Filter);
    params.set("cutoff", &ParamValue::F32(0.0));
    chain.set_params(0, params);
    chain.set_on(0, true);
    chain.set_routing(Routing::new(&[1]));
    let mut l = vec![0.5; 128];
    let mut r = vec![0.5; 128];
    chain.process(&mut l, &mut r);
    assert!(l.iter().all(|v| *v == 0.5));
    chain.set_routing(Routing::new(&[]));
    chain.process(&mut l, &mut r);
    assert!(r.iter().all(|v| *v == 0.5));
  }

  #[test]
  fn bad_slot_index_returns_offered_processor() {
    let mut chain = FxChain::new(48_000.0, 128, 1.0);
    let back = chain.install(9, Box::new(Processor::new(EffectType::Stutter, 48_000.0, 1.0)), EffectParams::default_for(EffectType::Stutter));
    assert_eq!(back.effect_type(), EffectType::Stutter);
    assert_eq!(chain.slot(0).map(|s| s.effect_type()), Some(EffectType::Filter));
  }
}
