use std::f32::consts::FRAC_PI_2;

use dasp::envelope::Detector;
use serde::{Deserialize, Serialize};

use super::dsp::shaper::master_clip;
use super::modules::sampler::BANKS;
use super::params::{db_to_gain, gain_to_db, safe, safe_clamp, SmoothedParam};

const RAMP: f32 = 0.02;
const METER_RELEASE_SECONDS: f32 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BankSettings {
  pub volume: f32,
  pub pan: f32,
  pub muted: bool,
  pub soloed: bool,
}

impl Default for BankSettings {
  fn default() -> Self { Self { volume: 1.0, pan: 0.0, muted: false, soloed: false } }
}

/// Effective bank gain: any solo silences every non-soloed bank; otherwise
/// muted banks are silent.
pub fn bank_gain(banks: &[BankSettings; BANKS], i: usize) -> f32 {
  let any_solo = banks.iter().any(|b| b.soloed);
  let b = &banks[i];
  let silent = if any_solo { !b.soloed } else { b.muted };
  if silent { 0.0 } else { safe(b.volume, 1.0).max(0.0) }
}

/// Stereo panner: the far channel folds into the near one on an equal-power curve.
#[inline]
pub fn pan_stereo(l: f32, r: f32, pan: f32) -> (f32, f32) {
  let pan = pan.clamp(-1.0, 1.0);
  if pan <= 0.0 {
    let x = (pan + 1.0) * FRAC_PI_2;
    (l + r * x.cos(), r * x.sin())
  } else {
    let x = pan * FRAC_PI_2;
    (l * x.cos(), r + l * x.sin())
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressorParams {
  pub on: bool,
  /// dB
  pub threshold: f32,
  /// dB
  pub knee: f32,
  pub ratio: f32,
  /// Seconds.
  pub attack: f32,
  /// Seconds.
  pub release: f32,
}

impl Default for CompressorParams {
  fn default() -> Self { Self { on: true, threshold: -24.0, knee: 30.0, ratio: 12.0, attack: 0.003, release: 0.25 } }
}

impl CompressorParams {
  /// Values the compressor settles to; off means unity.
  pub fn effective(&self) -> (f32, f32, f32) {
    if self.on {
      (
        safe_clamp(self.threshold, -24.0, -100.0, 0.0),
        safe_clamp(self.knee, 30.0, 0.0, 40.0),
        safe_clamp(self.ratio, 12.0, 1.0, 20.0),
      )
    } else {
      (0.0, 0.0, 1.0)
    }
  }
}

/// Static curve: dB of gain change for a detector level, soft knee centered on the threshold.
pub fn gain_change_db(level_db: f32, threshold: f32, knee: f32, ratio: f32) -> f32 {
  let over = level_db - threshold;
  let slope = 1.0 / ratio.max(1.0) - 1.0;
  if knee > 0.0 && 2.0 * over.abs() <= knee {
    let x = over + knee * 0.5;
    slope * x * x / (2.0 * knee)
  } else if over > 0.0 {
    slope * over
  } else {
    0.0
  }
}

pub struct Compressor {
  sr: f32,
  threshold: SmoothedParam,
  knee: SmoothedParam,
  ratio: SmoothedParam,
  attack: f32,
  release: f32,
  env_db: f32,
}

impl Compressor {
  pub fn new(sr: f32) -> Self {
    let d = CompressorParams::default();
    let (t, k, r) = d.effective();
    Self {
      sr,
      threshold: SmoothedParam::new(t, RAMP, sr),
      knee: SmoothedParam::new(k, RAMP, sr),
      ratio: SmoothedParam::new(r, RAMP, sr),
      attack: Self::coeff(d.attack, sr),
      release: Self::coeff(d.release, sr),
      env_db: 0.0,
    }
  }

  fn coeff(seconds: f32, sr: f32) -> f32 { (-1.0 / (seconds.max(0.000_1) * sr)).exp() }

  pub fn set_params(&mut self, p: &CompressorParams) {
    let (t, k, r) = p.effective();
    self.threshold.set_target(t);
    self.knee.set_target(k);
    self.ratio.set_target(r);
    if p.on {
      self.attack = Self::coeff(safe_clamp(p.attack, 0.003, 0.0, 1.0), self.sr);
      self.release = Self::coeff(safe_clamp(p.release, 0.25, 0.0, 1.0), self.sr);
    }
  }

  /// Gain reduction in dB currently applied (<= 0).
  pub fn reduction_db(&self) -> f32 { self.env_db }

  #[inline]
  pub fn process(&mut self, l: f32, r: f32) -> (f32, f32) {
    let t = self.threshold.next();
    let k = self.knee.next();
    let ratio = self.ratio.next();
    let level = gain_to_db(l.abs().max(r.abs()));
    let target = gain_change_db(level, t, k, ratio);
    // attack when reduction deepens, release when it recovers
    let c = if target < self.env_db { self.attack } else { self.release };
    self.env_db = target + c * (self.env_db - target);
    let g = db_to_gain(self.env_db);
    (l * g, r * g)
  }
}

/// Instant-attack peak follower for the meters.
pub type PeakDetector = Detector<f32, dasp::envelope::detect::Peak<dasp::peak::FullWave>>;

pub fn peak_detector(sr: f32) -> PeakDetector { Detector::peak(0.0, METER_RELEASE_SECONDS * sr) }

/// Four bank strips into the master bus.
pub struct Mixer {
  settings: [BankSettings; BANKS],
  gains: [SmoothedParam; BANKS],
  pans: [SmoothedParam; BANKS],
  master: SmoothedParam,
  compressor: Compressor,
  bank_meters: [PeakDetector; BANKS],
  master_meter: PeakDetector,
  levels: [f32; BANKS + 1],
}

impl Mixer {
  pub fn new(sr: f32) -> Self {
    Self {
      settings: [BankSettings::default(); BANKS],
      gains: std::array::from_fn(|_| SmoothedParam::new(1.0, RAMP, sr)),
      pans: std::array::from_fn(|_| SmoothedParam::new(0.0, RAMP, sr)),
      master: SmoothedParam::new(1.0, RAMP, sr),
      compressor: Compressor::new(sr),
      bank_meters: std::array::from_fn(|_| peak_detector(sr)),
      master_meter: peak_detector(sr),
      levels: [0.0; BANKS + 1],
    }
  }

  pub fn settings(&self) -> &[BankSettings; BANKS] { &self.settings }

  fn refresh_gains(&mut self) {
    for i in 0..BANKS {
      self.gains[i].set_target(bank_gain(&self.settings, i));
      self.pans[i].set_target(safe_clamp(self.settings[i].pan, 0.0, -1.0, 1.0));
    }
  }

  pub fn update_bank(&mut self, bank: usize, f: impl FnOnce(&mut BankSettings)) {
    if let Some(s) = self.settings.get_mut(bank) {
      f(s);
      self.refresh_gains();
    }
  }

  pub fn set_master_volume(&mut self, v: f32) { self.master.set_target(safe_clamp(v, 1.0, 0.0, 2.0)); }

  pub fn set_compressor(&mut self, p: &CompressorParams) { self.compressor.set_params(p); }

  pub fn compressor(&self) -> &Compressor { &self.compressor }

  /// Peak levels: banks 0..4 then master.
  pub fn levels(&self) -> [f32; BANKS + 1] { self.levels }

  /// Mix the bank frames into one stereo frame (pre master chain).
  #[inline]
  pub fn mix_banks(&mut self, banks: &[(f32, f32); BANKS]) -> (f32, f32) {
    let (mut l, mut r) = (0.0, 0.0);
    for (i, &(bl, br)) in banks.iter().enumerate() {
      let g = self.gains[i].next();
      let (pl, pr) = pan_stereo(bl * g, br * g, self.pans[i].next());
      self.levels[i] = self.bank_meters[i].next(pl.abs().max(pr.abs()));
      l += pl;
      r += pr;
    }
    (l, r)
  }

  /// Compressor, clipper, master volume.
  #[inline]
  pub fn master(&mut self, l: f32, r: f32) -> (f32, f32) {
    let (l, r) = self.compressor.process(l, r);
    let g = self.master.next();
    let (l, r) = (master_clip(l) * g, master_clip(r) * g);
    self.levels[BANKS] = self.master_meter.next(l.abs().max(r.abs()));
    (l, r)
  }
}
