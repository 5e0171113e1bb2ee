use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::clock::DIVISIONS;
use crate::engine::dsp::filter::BiquadKind;
use crate::engine::dsp::oscillator::OscShape;
use crate::engine::dsp::shaper::ShaperKind;
use crate::engine::messages::ParamValue;
use crate::engine::params::safe;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterKind {
    #[serde(rename = "Lowpass 12dB")]
    Lowpass12,
    #[default]
    #[serde(rename = "Lowpass 24dB")]
    Lowpass24,
    #[serde(rename = "Highpass 12dB")]
    Highpass12,
    #[serde(rename = "Highpass 24dB")]
    Highpass24,
    Bandpass,
    Notch,
    Peaking,
    Allpass,
    Comb,
    Formant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Biquad response, one or two cascaded stages.
    Standard { kind: BiquadKind, stages: usize },
    Comb,
    Formant,
}

impl FilterKind {
    pub fn topology(self) -> Topology {
        use BiquadKind as B;
        match self {
            FilterKind::Lowpass12 => Topology::Standard { kind: B::Lowpass, stages: 1 },
            FilterKind::Lowpass24 => Topology::Standard { kind: B::Lowpass, stages: 2 },
            FilterKind::Highpass12 => Topology::Standard { kind: B::Highpass, stages: 1 },
            FilterKind::Highpass24 => Topology::Standard { kind: B::Highpass, stages: 2 },
            FilterKind::Bandpass => Topology::Standard { kind: B::Bandpass, stages: 1 },
            FilterKind::Notch => Topology::Standard { kind: B::Notch, stages: 1 },
            FilterKind::Peaking => Topology::Standard { kind: B::Peaking, stages: 1 },
            FilterKind::Allpass => Topology::Standard { kind: B::Allpass, stages: 1 },
            FilterKind::Comb => Topology::Comb,
            FilterKind::Formant => Topology::Formant,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateMode {
    #[default]
    Hz,
    Sync,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LfoTrigger {
    #[default]
    Free,
    #[serde(alias = "Gate")]
    Note,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OscDef {
    #[serde(rename = "type")]
    pub shape: OscShape,
    pub octave: i32,
    /// Cents.
    pub detune: f32,
    pub waveshape_type: ShaperKind,
    pub waveshape_amount: f32,
    pub ws_lfo_amount: f32,
    /// Hard-sync this oscillator to the other one (osc1 only).
    pub sync: bool,
    /// Hz of cross-FM from the other oscillator.
    pub fm_depth: f32,
    /// Cents of filter-envelope pitch sweep (osc2 only).
    pub pitch_env_amount: f32,
}

impl Default for OscDef {
    fn default() -> Self {
        Self {
            shape: OscShape::SawDown,
            octave: 0,
            detune: 0.0,
            waveshape_type: ShaperKind::SoftClip,
            waveshape_amount: 0.0,
            ws_lfo_amount: 0.0,
            sync: false,
            fm_depth: 0.0,
            pitch_env_amount: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterDef {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub cutoff: f32,
    pub resonance: f32,
    /// Cents added to the cutoff at full filter-envelope level.
    pub env_amount: f32,
}

impl Default for FilterDef {
    fn default() -> Self { Self { kind: FilterKind::Lowpass24, cutoff: 20_000.0, resonance: 1.0, env_amount: 0.0 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterEnvDef {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
}

impl Default for FilterEnvDef {
    fn default() -> Self { Self { attack: 0.01, decay: 0.2, sustain: 0.5 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmpEnvDef {
    pub decay: f32,
}

impl Default for AmpEnvDef {
    fn default() -> Self { Self { decay: 0.5 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LfoDef {
    #[serde(rename = "type")]
    pub shape: OscShape,
    /// Hz in `Hz` mode, an index into the division table in `Sync` mode.
    pub rate: f32,
    pub rate_mode: RateMode,
    pub sync_trigger: LfoTrigger,
}

impl Default for LfoDef {
    fn default() -> Self { Self { shape: OscShape::Sine, rate: 5.0, rate_mode: RateMode::Hz, sync_trigger: LfoTrigger::Free } }
}

impl LfoDef {
    /// Effective frequency in Hz for the given tempo.
    pub fn hz(&self, bpm: f32) -> f32 {
        match self.rate_mode {
            RateMode::Hz => safe(self.rate, 1.0).clamp(0.0, 100.0),
            RateMode::Sync => {
                let idx = safe(self.rate, 0.0).max(0.0) as usize;
                let beats = DIVISIONS[idx.min(DIVISIONS.len() - 1)].1;
                crate::engine::clock::beats_to_hz(bpm, beats)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthDefinition {
    pub osc1: OscDef,
    pub osc2: OscDef,
    pub osc_mix: f32,
    pub filter: FilterDef,
    pub filter_env: FilterEnvDef,
    pub amp_env: AmpEnvDef,
    pub lfo1: LfoDef,
    pub lfo2: LfoDef,
    pub master_gain: f32,
    pub master_octave: i32,
    pub mod_wheel: f32,
    pub mod_wheel_offset: f32,
}

impl Default for SynthDefinition {
    fn default() -> Self {
        Self {
            osc1: OscDef::default(),
            osc2: OscDef { shape: OscShape::Square, octave: -1, detune: 7.0, ..OscDef::default() },
            osc_mix: 0.5,
            filter: FilterDef::default(),
            filter_env: FilterEnvDef::default(),
            amp_env: AmpEnvDef::default(),
            lfo1: LfoDef::default(),
            lfo2: LfoDef { rate: 0.5, ..LfoDef::default() },
            master_gain: 0.8,
            master_octave: 0,
            mod_wheel: 0.0,
            mod_wheel_offset: 1.0,
        }
    }
}

const OSC_SHAPES: [OscShape; 7] = [
    OscShape::Sine,
    OscShape::Square,
    OscShape::SawDown,
    OscShape::SawUp,
    OscShape::Triangle,
    OscShape::Noise,
    OscShape::Glitch,
];

impl SynthDefinition {
    /// Set one field addressed by a dotted camelCase path, e.g. `"osc1.detune"`.
    /// Returns false (and leaves `self` untouched) for unknown paths or values
    /// of the wrong type.
    pub fn patch(&mut self, path: &str, value: &ParamValue) -> bool {
        let Ok(mut tree) = serde_json::to_value(&*self) else { return false };
        let mut node = &mut tree;
        for key in path.split('.') {
            match node.get_mut(key) {
                Some(next) => node = next,
                None => return false,
            }
        }
        *node = value.to_json();
        match serde_json::from_value::<SynthDefinition>(tree) {
            Ok(def) => {
                *self = def;
                true
            }
            Err(_) => false,
        }
    }

    /// Randomize oscillators, mix, filter and envelopes, keeping LFOs and master.
    pub fn randomize(&mut self, rng: &mut fastrand::Rng) {
        self.osc1.shape = OSC_SHAPES[rng.usize(..OSC_SHAPES.len())];
        self.osc1.detune = rng.f32() * 20.0 - 10.0;
        self.osc1.waveshape_amount = rng.f32();
        self.osc2.shape = OSC_SHAPES[rng.usize(..OSC_SHAPES.len())];
        self.osc2.detune = rng.f32() * 100.0 - 50.0;
        self.osc2.waveshape_amount = rng.f32();
        self.osc_mix = rng.f32();
        self.filter.cutoff = 20.0 + rng.f32() * 19_980.0;
        self.filter.resonance = rng.f32() * 20.0;
        self.filter.env_amount = (rng.f32() * 2.0 - 1.0) * 7000.0;
        self.filter_env.attack = rng.f32() * 2.0;
        self.filter_env.decay = rng.f32() * 2.0;
        self.filter_env.sustain = rng.f32();
        self.amp_env.decay = rng.f32() * 4.0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModSource {
    Lfo1,
    Lfo2,
    FilterEnv,
}

impl ModSource {
    pub const ALL: [ModSource; 3] = [ModSource::Lfo1, ModSource::Lfo2, ModSource::FilterEnv];
    pub fn index(self) -> usize { self as usize }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModDest {
    #[serde(rename = "osc1Pitch")]
    Osc1Pitch,
    #[serde(rename = "osc2Pitch")]
    Osc2Pitch,
    #[serde(rename = "osc1FM")]
    Osc1Fm,
    #[serde(rename = "osc2FM")]
    Osc2Fm,
    #[serde(rename = "osc1Wave")]
    Osc1Wave,
    #[serde(rename = "osc2Wave")]
    Osc2Wave,
    #[serde(rename = "filterCutoff")]
    FilterCutoff,
    #[serde(rename = "filterQ")]
    FilterQ,
}

impl ModDest {
    pub const ALL: [ModDest; 8] = [
        ModDest::Osc1Pitch,
        ModDest::Osc2Pitch,
        ModDest::Osc1Fm,
        ModDest::Osc2Fm,
        ModDest::Osc1Wave,
        ModDest::Osc2Wave,
        ModDest::FilterCutoff,
        ModDest::FilterQ,
    ];

    pub fn index(self) -> usize { self as usize }

    /// Depth 1.0 in destination units: cents for pitch and cutoff, Hz for FM,
    /// Q for resonance, shaper amount for wave.
    pub fn scale(self) -> f32 {
        match self {
            ModDest::Osc1Pitch | ModDest::Osc2Pitch => 1200.0,
            ModDest::FilterCutoff => 2400.0,
            ModDest::Osc1Fm | ModDest::Osc2Fm => 1000.0,
            ModDest::FilterQ => 10.0,
            ModDest::Osc1Wave | ModDest::Osc2Wave => 1.0,
        }
    }
}

pub const MOD_SOURCES: usize = ModSource::ALL.len();
pub const MOD_DESTS: usize = ModDest::ALL.len();

/// Dense depth table handed to the render thread.
pub type ModDepths = [[f32; MOD_DESTS]; MOD_SOURCES];

/// Sparse source → destination → depth table. Missing entries are zero depth.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModMatrix {
    routes: BTreeMap<ModSource, BTreeMap<ModDest, f32>>,
}

impl ModMatrix {
    pub fn new() -> Self { Self::default() }

    pub fn set(&mut self, source: ModSource, dest: ModDest, depth: f32) {
        let depth = safe(depth, 0.0).clamp(-1.0, 1.0);
        if depth == 0.0 {
            if let Some(row) = self.routes.get_mut(&source) {
                row.remove(&dest);
                if row.is_empty() {
                    self.routes.remove(&source);
                }
            }
            return;
        }
        self.routes.entry(source).or_default().insert(dest, depth);
    }

    pub fn depth(&self, source: ModSource, dest: ModDest) -> f32 {
        self.routes.get(&source).and_then(|row| row.get(&dest)).copied().unwrap_or(0.0)
    }

    pub fn clear(&mut self) { self.routes.clear(); }

    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    pub fn dense(&self) -> ModDepths {
        let mut out = [[0.0; MOD_DESTS]; MOD_SOURCES];
        for (src, row) in &self.routes {
            for (dst, depth) in row {
                out[src.index()][dst.index()] = safe(*depth, 0.0).clamp(-1.0, 1.0);
            }
        }
        out
    }

    pub fn randomize(&mut self, rng: &mut fastrand::Rng) {
        self.routes.clear();
        for src in ModSource::ALL {
            if rng.f32() <= 0.4 {
                continue;
            }
            for dst in ModDest::ALL {
                if rng.f32() > 0.6 {
                    self.set(src, dst, rng.f32() * 2.0 - 1.0);
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthPreset {
    pub name: String,
    pub synth: SynthDefinition,
    pub mod_matrix: ModMatrix,
}

impl ParamValue {
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::F32(v) => serde_json::Number::from_f64(*v as f64).map(Value::Number).unwrap_or(Value::Null),
            ParamValue::I32(v) => Value::from(*v),
            ParamValue::Bool(v) => Value::Bool(*v),
            ParamValue::Str(s) => Value::String(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_init_patch() {
        let def = SynthDefinition::default();
        assert_eq!(def.osc1.shape, OscShape::SawDown);
        assert_eq!(def.osc2.shape, OscShape::Square);
        assert_eq!(def.osc2.octave, -1);
        assert_eq!(def.filter.kind, FilterKind::Lowpass24);
        assert_eq!(def.mod_wheel_offset, 1.0);
    }

    #[test]
    fn deserializes_partial_camel_case_json() {
        let json = r#"{
            "osc1": { "type": "Square", "octave": 1, "detune": 3, "waveshapeType": "Fold", "waveshapeAmount": 0.2, "fmDepth": 0 },
            "filter": { "type": "Comb", "cutoff": 800, "resonance": 5, "envAmount": 1200 },
            "lfo1": { "type": "Square", "rate": 12, "rateMode": "sync", "syncTrigger": "Gate" },
            "modWheel": 1, "modWheelOffset": 0
        }"#;
        let def: SynthDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.osc1.shape, OscShape::Square);
        assert_eq!(def.osc1.waveshape_type, ShaperKind::Fold);
        assert_eq!(def.filter.kind.topology(), Topology::Comb);
        assert_eq!(def.lfo1.sync_trigger, LfoTrigger::Note);
        assert_eq!(def.osc2, SynthDefinition::default().osc2);
        // sync index past the table clamps to the longest division
        assert!((def.lfo1.hz(120.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn patch_by_path() {
        let mut def = SynthDefinition::default();
        assert!(def.patch("osc1.detune", &ParamValue::F32(-12.0)));
        assert_eq!(def.osc1.detune, -12.0);
        assert!(def.patch("filter.type", &ParamValue::Str("Formant".into())));
        assert_eq!(def.filter.kind, FilterKind::Formant);
        assert!(!def.patch("osc3.detune", &ParamValue::F32(1.0)));
        assert!(!def.patch("filter.type", &ParamValue::Str("Moog".into())));
        assert_eq!(def.filter.kind, FilterKind::Formant);
    }

    #[test]
    fn matrix_is_sparse_and_clamped() {
        let mut m = ModMatrix::new();
        m.set(ModSource::Lfo1, ModDest::FilterCutoff, 0.5);
        m.set(ModSource::Lfo2, ModDest::Osc1Pitch, 3.0);
        m.set(ModSource::Lfo2, ModDest::Osc1Pitch, f32::NAN);
        assert_eq!(m.depth(ModSource::Lfo2, ModDest::Osc1Pitch), 0.0);
        assert_eq!(serde_json::to_string(&m).unwrap(), r#"{"lfo1":{"filterCutoff":0.5}}"#);
        let dense = m.dense();
        assert_eq!(dense[ModSource::Lfo1.index()][ModDest::FilterCutoff.index()], 0.5);
    }

    #[test]
    fn randomized_matrix_stays_in_range() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut m = ModMatrix::new();
        for _ in 0..20 {
            m.randomize(&mut rng);
            for row in m.dense() {
                assert!(row.iter().all(|d| (-1.0..=1.0).contains(d)));
            }
        }
    }
}
