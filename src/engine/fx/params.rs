use serde::{Deserialize, Serialize};

use crate::engine::dsp::filter::BiquadKind;
use crate::engine::messages::ParamValue;
use crate::engine::params::clamp01;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectType {
  #[default]
  Filter,
  Glitch,
  Stutter,
  Reverb,
  DjLooper,
}

impl EffectType {
  pub const ALL: [EffectType; 5] = [EffectType::Filter, EffectType::Glitch, EffectType::Stutter, EffectType::Reverb, EffectType::DjLooper];

  /// Parameter names driven by X/Y pad 0 and pad 1 when the type is selected.
  pub fn default_pads(self) -> [(&'static str, &'static str); 2] {
    match self {
      EffectType::Filter => [("cutoff", "resonance"), ("lfoAmount", "lfoRate")],
      EffectType::Glitch => [("crush", "rate"), ("shuffle", "mix")],
      EffectType::Stutter => [("division", "speed"), ("feedback", "mix")],
      EffectType::Reverb => [("size", "damping"), ("mod", "mix")],
      EffectType::DjLooper => [("loopDivision", "lengthMultiplier"), ("fadeTime", "mix")],
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterFxParams {
  #[serde(rename = "type")]
  pub kind: BiquadKind,
  pub cutoff: f32,
  pub resonance: f32,
  pub lfo_amount: f32,
  pub lfo_rate: f32,
  pub mix: f32,
}

impl Default for FilterFxParams {
  fn default() -> Self { Self { kind: BiquadKind::Lowpass, cutoff: 1.0, resonance: 0.0, lfo_amount: 0.0, lfo_rate: 0.5, mix: 1.0 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlitchParams {
  pub crush: f32,
  pub rate: f32,
  pub shuffle: f32,
  pub mix: f32,
}

impl Default for GlitchParams {
  fn default() -> Self { Self { crush: 0.0, rate: 0.0, shuffle: 0.0, mix: 1.0 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StutterParams {
  pub division: f32,
  pub speed: f32,
  pub feedback: f32,
  pub mix: f32,
}

impl Default for StutterParams {
  // pad centre plays the captured slice at normal speed
  fn default() -> Self { Self { division: 0.5, speed: 0.5, feedback: 0.0, mix: 1.0 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbParams {
  pub size: f32,
  pub damping: f32,
  #[serde(rename = "mod")]
  pub modulation: f32,
  pub mix: f32,
}

impl Default for ReverbParams {
  fn default() -> Self { Self { size: 0.5, damping: 0.5, modulation: 0.0, mix: 0.5 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DjLooperParams {
  pub loop_division: f32,
  pub length_multiplier: f32,
  /// Seconds of fade-in after each (re)capture.
  pub fade_time: f32,
  pub mix: f32,
}

impl Default for DjLooperParams {
  fn default() -> Self { Self { loop_division: 0.5, length_multiplier: 0.0, fade_time: 0.01, mix: 0.0 } }
}

/// Closed parameter record, one variant per effect type. Values are validated
/// when written so processors can trust them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum EffectParams {
  Filter(FilterFxParams),
  Glitch(GlitchParams),
  Stutter(StutterParams),
  Reverb(ReverbParams),
  DjLooper(DjLooperParams),
}

impl Default for EffectParams {
  fn default() -> Self { EffectParams::Filter(FilterFxParams::default()) }
}

impl EffectParams {
  pub fn default_for(kind: EffectType) -> Self {
    match kind {
      EffectType::Filter => EffectParams::Filter(FilterFxParams::default()),
      EffectType::Glitch => EffectParams::Glitch(GlitchParams::default()),
      EffectType::Stutter => EffectParams::Stutter(StutterParams::default()),
      EffectType::Reverb => EffectParams::Reverb(ReverbParams::default()),
      EffectType::DjLooper => EffectParams::DjLooper(DjLooperParams::default()),
    }
  }

  pub fn effect_type(&self) -> EffectType {
    match self {
      EffectParams::Filter(_) => EffectType::Filter,
      EffectParams::Glitch(_) => EffectType::Glitch,
      EffectParams::Stutter(_) => EffectType::Stutter,
      EffectParams::Reverb(_) => EffectType::Reverb,
      EffectParams::DjLooper(_) => EffectType::DjLooper,
    }
  }

  pub fn mix(&self) -> f32 {
    match self {
      EffectParams::Filter(p) => p.mix,
      EffectParams::Glitch(p) => p.mix,
      EffectParams::Stutter(p) => p.mix,
      EffectParams::Reverb(p) => p.mix,
      EffectParams::DjLooper(p) => p.mix,
    }
  }

  fn field_mut(&mut self, name: &str) -> Option<&mut f32> {
    Some(match (self, name) {
      (EffectParams::Filter(p), "cutoff") => &mut p.cutoff,
      (EffectParams::Filter(p), "resonance") => &mut p.resonance,
      (EffectParams::Filter(p), "lfoAmount") => &mut p.lfo_amount,
      (EffectParams::Filter(p), "lfoRate") => &mut p.lfo_rate,
      (EffectParams::Filter(p), "mix") => &mut p.mix,
      (EffectParams::Glitch(p), "crush") => &mut p.crush,
      (EffectParams::Glitch(p), "rate") => &mut p.rate,
      (EffectParams::Glitch(p), "shuffle") => &mut p.shuffle,
      (EffectParams::Glitch(p), "mix") => &mut p.mix,
      (EffectParams::Stutter(p), "division") => &mut p.division,
      (EffectParams::Stutter(p), "speed") => &mut p.speed,
      (EffectParams::Stutter(p), "feedback") => &mut p.feedback,
      (EffectParams::Stutter(p), "mix") => &mut p.mix,
      (EffectParams::Reverb(p), "size") => &mut p.size,
      (EffectParams::Reverb(p), "damping") => &mut p.damping,
      (EffectParams::Reverb(p), "mod") => &mut p.modulation,
      (EffectParams::Reverb(p), "mix") => &mut p.mix,
      (EffectParams::DjLooper(p), "loopDivision") => &mut p.loop_division,
      (EffectParams::DjLooper(p), "lengthMultiplier") => &mut p.length_multiplier,
      (EffectParams::DjLooper(p), "fadeTime") => &mut p.fade_time,
      (EffectParams::DjLooper(p), "mix") => &mut p.mix,
      _ => return None,
    })
  }

  pub fn get(&self, name: &str) -> Option<f32> {
    let mut copy = *self;
    copy.field_mut(name).map(|v| *v)
  }

  /// Write one named parameter. Numbers are clamped to [0, 1] (non-finite
  /// becomes 0); the filter's `type` takes a string. Returns false for names
  /// this effect does not have.
  pub fn set(&mut self, name: &str, value: &ParamValue) -> bool {
    if let (EffectParams::Filter(p), "type", ParamValue::Str(s)) = (&mut *self, name, value) {
      return match serde_json::from_value::<BiquadKind>(serde_json::Value::String(s.to_lowercase())) {
        Ok(kind) => {
          p.kind = kind;
          true
        }
        Err(_) => false,
      };
    }
    let Some(v) = value.as_f32() else { return false };
    match self.field_mut(name) {
      Some(slot) => {
        *slot = clamp01(v);
        true
      }
      None => false,
    }
  }

  /// Clamp every numeric field into [0, 1].
  pub fn sanitized(mut self) -> Self {
    let names: &[&str] = match self.effect_type() {
      EffectType::Filter => &["cutoff", "resonance", "lfoAmount", "lfoRate", "mix"],
      EffectType::Glitch => &["crush", "rate", "shuffle", "mix"],
      EffectType::Stutter => &["division", "speed", "feedback", "mix"],
      EffectType::Reverb => &["size", "damping", "mod", "mix"],
      EffectType::DjLooper => &["loopDivision", "lengthMultiplier", "fadeTime", "mix"],
    };
    for name in names {
      if let Some(v) = self.field_mut(name) {
        *v = clamp01(*v);
      }
    }
    self
  }
}
