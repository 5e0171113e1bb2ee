use serde::{Deserialize, Serialize};

use super::automation::{Automation, RecordMode};
use super::clock::{safe_bpm, DEFAULT_BPM, LOOP_BARS};
use super::fx::{EffectParams, EffectType, Routing, SLOT_COUNT};
use super::messages::ParamValue;
use super::mixer::{BankSettings, CompressorParams};
use super::modules::sampler::{SampleSettings, BANKS, TOTAL_PADS};
use super::modules::synth_def::{ModDest, ModMatrix, ModSource, SynthDefinition, SynthPreset};
use super::params::{clamp01, safe, safe_clamp};

pub const PADS_PER_SLOT: usize = 2;
pub const SNAPSHOTS_PER_SLOT: usize = 4;

/// One X/Y performance pad: its position, the two parameters it drives and
/// its gesture lane.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XyPad {
  pub x: f32,
  pub y: f32,
  pub x_param: String,
  pub y_param: String,
  #[serde(default)]
  pub automation: Automation,
}

impl XyPad {
  fn for_params(params: &EffectParams, x_param: &str, y_param: &str) -> Self {
    Self {
      x: params.get(x_param).unwrap_or(0.5),
      y: params.get(y_param).unwrap_or(0.5),
      x_param: x_param.to_string(),
      y_param: y_param.to_string(),
      automation: Automation::default(),
    }
  }
}

fn default_pads(params: &EffectParams) -> [XyPad; PADS_PER_SLOT] {
  let [(x0, y0), (x1, y1)] = params.effect_type().default_pads();
  [XyPad::for_params(params, x0, y0), XyPad::for_params(params, x1, y1)]
}

/// Saved pad position (automation lanes are not part of a snapshot).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PadPosition {
  pub x: f32,
  pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSnapshot {
  pub params: EffectParams,
  pub pads: [PadPosition; PADS_PER_SLOT],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotState {
  pub on: bool,
  pub params: EffectParams,
  pub pads: [XyPad; PADS_PER_SLOT],
  #[serde(default)]
  pub snapshots: [Option<SlotSnapshot>; SNAPSHOTS_PER_SLOT],
}

impl SlotState {
  pub fn new(kind: EffectType) -> Self {
    let params = EffectParams::default_for(kind);
    Self { on: false, pads: default_pads(&params), params, snapshots: [None; SNAPSHOTS_PER_SLOT] }
  }

  pub fn effect_type(&self) -> EffectType { self.params.effect_type() }
}

/// What the render side has to hear about after a command was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
  Synth,
  ModMatrix,
  ModMatrixMuted,
  EffectType(usize),
  EffectParams(usize),
  EffectOn(usize),
  Routing,
  Tempo,
  Transport,
  Bank(usize),
  MasterVolume,
  Compressor,
}

/// Control-side project state changes. Indices are checked; a bad one makes
/// the command a no-op.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
  UpdateSynthDefinition { definition: SynthDefinition },
  PatchSynth { path: String, value: ParamValue },
  LoadSynthPreset { preset: SynthPreset },
  RandomizeSynth { seed: u64 },
  RandomizeModMatrix { seed: u64 },
  UpdateModMatrix { source: ModSource, dest: ModDest, depth: f32 },
  SetModMatrixMuted { muted: bool },
  ClearModMatrix,
  SetEffectType { slot: usize, effect_type: EffectType },
  SetEffectParam { slot: usize, name: String, value: ParamValue },
  SetEffectBypass { slot: usize, bypassed: bool },
  SetEffectXy { slot: usize, pad: usize, x: f32, y: f32 },
  SetRouting { order: Vec<usize> },
  SetAutomationRecording { slot: usize, pad: usize, recording: bool, current_bar: u32 },
  SetAutomationRecordMode { slot: usize, pad: usize, mode: RecordMode },
  ClearAutomation { slot: usize },
  SetAutomationLoopBar { slot: usize, bar: Option<u32> },
  SaveFxSnapshot { slot: usize, index: usize },
  LoadFxSnapshot { slot: usize, index: usize },
  SetBpm { bpm: f32 },
  Play,
  Stop,
  SetBankVolume { bank: usize, volume: f32 },
  SetBankPan { bank: usize, pan: f32 },
  SetBankMute { bank: usize, muted: bool },
  SetBankSolo { bank: usize, soloed: bool },
  SetMasterVolume { volume: f32 },
  SetMasterCompressor { params: CompressorParams },
  SetSampleSettings { bank: usize, pad: usize, settings: SampleSettings },
}

/// Everything the control side knows about the project. `apply` is the only
/// writer besides automation bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineState {
  pub bpm: f32,
  #[serde(skip)]
  pub playing: bool,
  pub synth: SynthDefinition,
  pub mod_matrix: ModMatrix,
  pub matrix_muted: bool,
  pub slots: [SlotState; SLOT_COUNT],
  pub routing: Vec<usize>,
  pub banks: [BankSettings; BANKS],
  pub samples: Vec<SampleSettings>,
  pub master_volume: f32,
  pub compressor: CompressorParams,
}

impl Default for EngineState {
  fn default() -> Self {
    Self {
      bpm: DEFAULT_BPM,
      playing: false,
      synth: SynthDefinition::default(),
      mod_matrix: ModMatrix::default(),
      matrix_muted: false,
      slots: [0, 1, 2, 3].map(|i| SlotState::new(EffectType::ALL[i])),
      routing: Routing::default().to_vec(),
      banks: [BankSettings::default(); BANKS],
      samples: vec![SampleSettings::default(); TOTAL_PADS],
      master_volume: 1.0,
      compressor: CompressorParams::default(),
    }
  }
}

macro_rules! slot_or_warn {
  ($self:ident, $slot:expr) => {
    match $self.slots.get_mut($slot) {
      Some(s) => s,
      None => {
        log::warn!("ignoring command for effect slot {}", $slot);
        return Vec::new();
      }
    }
  };
}

impl EngineState {
  pub fn routing(&self) -> Routing { Routing::new(&self.routing) }

  /// Stored settings for a pad, if the index is valid.
  pub fn sample_settings(&self, bank: usize, pad: usize) -> Option<&SampleSettings> {
    super::modules::sampler::Sampler::pad_index(bank, pad).and_then(|i| self.samples.get(i))
  }

  fn bank_mut(&mut self, bank: usize) -> Option<&mut BankSettings> {
    let b = self.banks.get_mut(bank);
    if b.is_none() {
      log::warn!("ignoring command for bank {bank}");
    }
    b
  }

  pub fn apply(&mut self, cmd: Command) -> Vec<Refresh> {
    match cmd {
      Command::UpdateSynthDefinition { definition } => {
        self.synth = definition;
        vec![Refresh::Synth]
      }
      Command::PatchSynth { path, value } => {
        if self.synth.patch(&path, &value) {
          vec![Refresh::Synth]
        } else {
          log::warn!("unknown synth parameter {path}");
          Vec::new()
        }
      }
      Command::LoadSynthPreset { preset } => {
        self.synth = preset.synth;
        self.mod_matrix = preset.mod_matrix;
        vec![Refresh::Synth, Refresh::ModMatrix]
      }
      Command::RandomizeSynth { seed } => {
        self.synth.randomize(&mut fastrand::Rng::with_seed(seed));
        vec![Refresh::Synth]
      }
      Command::RandomizeModMatrix { seed } => {
        self.mod_matrix.randomize(&mut fastrand::Rng::with_seed(seed));
        vec![Refresh::ModMatrix]
      }
      Command::UpdateModMatrix { source, dest, depth } => {
        self.mod_matrix.set(source, dest, safe(depth, 0.0));
        vec![Refresh::ModMatrix]
      }
      Command::SetModMatrixMuted { muted } => {
        self.matrix_muted = muted;
        vec![Refresh::ModMatrixMuted]
      }
      Command::ClearModMatrix => {
        self.mod_matrix.clear();
        vec![Refresh::ModMatrix]
      }
      Command::SetEffectType { slot, effect_type } => {
        let s = slot_or_warn!(self, slot);
        // selecting a type always switches the slot on
        s.on = true;
        if s.effect_type() == effect_type {
          return vec![Refresh::EffectOn(slot)];
        }
        s.params = EffectParams::default_for(effect_type);
        let fresh = default_pads(&s.params);
        for (pad, new) in s.pads.iter_mut().zip(fresh) {
          pad.x = new.x;
          pad.y = new.y;
          pad.x_param = new.x_param;
          pad.y_param = new.y_param;
        }
        vec![Refresh::EffectType(slot)]
      }
      Command::SetEffectParam { slot, name, value } => {
        let s = slot_or_warn!(self, slot);
        if !s.params.set(&name, &value) {
          log::warn!("{:?} has no parameter {name}", s.effect_type());
          return Vec::new();
        }
        if let Some(v) = s.params.get(&name) {
          for pad in &mut s.pads {
            if pad.x_param == name { pad.x = v; }
            if pad.y_param == name { pad.y = v; }
          }
        }
        vec![Refresh::EffectParams(slot)]
      }
      Command::SetEffectBypass { slot, bypassed } => {
        let s = slot_or_warn!(self, slot);
        s.on = !bypassed;
        vec![Refresh::EffectOn(slot)]
      }
      Command::SetEffectXy { slot, pad, x, y } => {
        let s = slot_or_warn!(self, slot);
        let Some(p) = s.pads.get_mut(pad) else {
          log::warn!("ignoring X/Y for pad {pad} of slot {slot}");
          return Vec::new();
        };
        p.x = clamp01(x);
        p.y = clamp01(y);
        s.params.set(&p.x_param, &ParamValue::F32(p.x));
        s.params.set(&p.y_param, &ParamValue::F32(p.y));
        vec![Refresh::EffectParams(slot)]
      }
      Command::SetRouting { order } => {
        self.routing = Routing::new(&order).to_vec();
        vec![Refresh::Routing]
      }
      Command::SetAutomationRecording { slot, pad, recording, current_bar } => {
        let s = slot_or_warn!(self, slot);
        match s.pads.get_mut(pad) {
          Some(p) => p.automation.set_recording(recording, current_bar),
          None => log::warn!("ignoring automation for pad {pad} of slot {slot}"),
        }
        Vec::new()
      }
      Command::SetAutomationRecordMode { slot, pad, mode } => {
        let s = slot_or_warn!(self, slot);
        match s.pads.get_mut(pad) {
          Some(p) => p.automation.record_mode = mode,
          None => log::warn!("ignoring automation for pad {pad} of slot {slot}"),
        }
        Vec::new()
      }
      Command::ClearAutomation { slot } => {
        let s = slot_or_warn!(self, slot);
        for p in &mut s.pads {
          p.automation.clear();
        }
        Vec::new()
      }
      Command::SetAutomationLoopBar { slot, bar } => {
        let s = slot_or_warn!(self, slot);
        if bar.is_some_and(|b| b >= LOOP_BARS) {
          log::warn!("loop bar {bar:?} out of range, clearing");
        }
        for p in &mut s.pads {
          p.automation.set_loop_bar(bar);
        }
        Vec::new()
      }
      Command::SaveFxSnapshot { slot, index } => {
        let s = slot_or_warn!(self, slot);
        let snap = SlotSnapshot { params: s.params, pads: [0, 1].map(|i| PadPosition { x: s.pads[i].x, y: s.pads[i].y }) };
        match s.snapshots.get_mut(index) {
          Some(entry) => *entry = Some(snap),
          None => log::warn!("no snapshot {index} on slot {slot}"),
        }
        Vec::new()
      }
      Command::LoadFxSnapshot { slot, index } => {
        let s = slot_or_warn!(self, slot);
        let Some(snap) = s.snapshots.get(index).copied().flatten() else { return Vec::new() };
        let retyped = snap.params.effect_type() != s.effect_type();
        s.params = snap.params;
        if retyped {
          let fresh = default_pads(&s.params);
          for (pad, new) in s.pads.iter_mut().zip(fresh) {
            pad.x_param = new.x_param;
            pad.y_param = new.y_param;
          }
        }
        for (pad, pos) in s.pads.iter_mut().zip(snap.pads) {
          pad.x = pos.x;
          pad.y = pos.y;
        }
        vec![if retyped { Refresh::EffectType(slot) } else { Refresh::EffectParams(slot) }]
      }
      Command::SetBpm { bpm } => {
        self.bpm = safe_bpm(bpm);
        vec![Refresh::Tempo]
      }
      Command::Play => {
        self.playing = true;
        vec![Refresh::Transport]
      }
      Command::Stop => {
        self.playing = false;
        // lanes stay disarmed after a stop
        for pad in self.slots.iter_mut().flat_map(|s| s.pads.iter_mut()) {
          if pad.automation.is_armed() {
            pad.automation.set_recording(false, 0);
          }
        }
        vec![Refresh::Transport]
      }
      Command::SetBankVolume { bank, volume } => match self.bank_mut(bank) {
        Some(b) => {
          b.volume = safe_clamp(volume, 1.0, 0.0, 2.0);
          vec![Refresh::Bank(bank)]
        }
        None => Vec::new(),
      },
      Command::SetBankPan { bank, pan } => match self.bank_mut(bank) {
        Some(b) => {
          b.pan = safe_clamp(pan, 0.0, -1.0, 1.0);
          vec![Refresh::Bank(bank)]
        }
        None => Vec::new(),
      },
      Command::SetBankMute { bank, muted } => match self.bank_mut(bank) {
        Some(b) => {
          b.muted = muted;
          vec![Refresh::Bank(bank)]
        }
        None => Vec::new(),
      },
      Command::SetBankSolo { bank, soloed } => match self.bank_mut(bank) {
        Some(b) => {
          b.soloed = soloed;
          vec![Refresh::Bank(bank)]
        }
        None => Vec::new(),
      },
      Command::SetMasterVolume { volume } => {
        self.master_volume = safe_clamp(volume, 1.0, 0.0, 2.0);
        vec![Refresh::MasterVolume]
      }
      Command::SetMasterCompressor { params } => {
        self.compressor = params;
        vec![Refresh::Compressor]
      }
      Command::SetSampleSettings { bank, pad, settings } => {
        match super::modules::sampler::Sampler::pad_index(bank, pad).and_then(|i| self.samples.get_mut(i)) {
          Some(s) => *s = settings,
          None => log::warn!("ignoring settings for bank {bank} pad {pad}"),
        }
        Vec::new()
      }
    }
  }

  /// Every sync needed to bring a fresh render graph in line with this state.
  pub fn full_sync(&self) -> Vec<Refresh> {
    let mut out = vec![Refresh::Synth, Refresh::ModMatrix, Refresh::ModMatrixMuted, Refresh::Routing, Refresh::Tempo];
    for i in 0..SLOT_COUNT {
      out.push(Refresh::EffectType(i));
    }
    for b in 0..BANKS {
      out.push(Refresh::Bank(b));
    }
    out.push(Refresh::MasterVolume);
    out.push(Refresh::Compressor);
    out
  }

  /// Repair values that may have come from an untrusted blob.
  pub fn sanitized(mut self) -> Self {
    self.bpm = safe_bpm(self.bpm);
    self.routing = Routing::new(&self.routing).to_vec();
    self.samples.resize(TOTAL_PADS, SampleSettings::default());
    self.master_volume = safe_clamp(self.master_volume, 1.0, 0.0, 2.0);
    for s in &mut self.slots {
      s.params = s.params.sanitized();
      for p in &mut s.pads {
        p.x = clamp01(p.x);
        p.y = clamp01(p.y);
        let points = p.automation.points().to_vec();
        p.automation.set_points(points);
        let bar = p.automation.loop_bar;
        p.automation.set_loop_bar(bar);
      }
    }
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_slots_and_pads() {
    let s = EngineState::default();
    let kinds: Vec<EffectType> = s.slots.iter().map(|s| s.effect_type()).collect();
    assert_eq!(kinds, [EffectType::Filter, EffectType::Glitch, EffectType::Stutter, EffectType::Reverb]);
    assert_eq!(s.slots[3].pads[1].x_param, "mod");
    assert_eq!(s.slots[3].pads[1].y_param, "mix");
    assert_eq!(s.routing, vec![0, 1, 2, 3]);
  }

  #[test]
  fn changing_type_switches_on_and_resets_params() {
    let mut s = EngineState::default();
    s.apply(Command::SetEffectParam { slot: 0, name: "cutoff".into(), value: ParamValue::F32(0.2) });
    let sync = s.apply(Command::SetEffectType { slot: 0, effect_type: EffectType::DjLooper });
    assert_eq!(sync, vec![Refresh::EffectType(0)]);
    assert!(s.slots[0].on);
    assert_eq!(s.slots[0].params, EffectParams::default_for(EffectType::DjLooper));
    assert_eq!(s.slots[0].pads[0].x_param, "loopDivision");

    let sync = s.apply(Command::SetEffectType { slot: 0, effect_type: EffectType::DjLooper });
    assert_eq!(sync, vec![Refresh::EffectOn(0)]);
  }

  #[test]
  fn xy_writes_both_mapped_params() {
    let mut s = EngineState::default();
    s.apply(Command::SetEffectXy { slot: 1, pad: 0, x: 0.25, y: 7.0 });
    let slot = &s.slots[1];
    assert_eq!(slot.params.get("crush"), Some(0.25));
    assert_eq!(slot.params.get("rate"), Some(1.0));
    assert_eq!((slot.pads[0].x, slot.pads[0].y), (0.25, 1.0));
  }

  #[test]
  fn bad_indices_are_no_ops() {
    let mut s = EngineState::default();
    let before = s.clone();
    assert!(s.apply(Command::SetEffectBypass { slot: 9, bypassed: false }).is_empty());
    assert!(s.apply(Command::SetEffectXy { slot: 0, pad: 5, x: 0.1, y: 0.1 }).is_empty());
    assert!(s.apply(Command::SetBankMute { bank: 4, muted: true }).is_empty());
    assert!(s.apply(Command::SetEffectParam { slot: 0, name: "crush".into(), value: ParamValue::F32(0.1) }).is_empty());
    assert_eq!(s, before);
  }

  #[test]
  fn loop_bar_and_clear_touch_both_pads() {
    let mut s = EngineState::default();
    s.slots[2].pads[0].automation.record(0.5, 0.1, 0.1, 0.0);
    s.apply(Command::SetAutomationLoopBar { slot: 2, bar: Some(5) });
    assert!(s.slots[2].pads.iter().all(|p| p.automation.loop_bar == Some(5)));
    s.apply(Command::ClearAutomation { slot: 2 });
    assert!(s.slots[2].pads.iter().all(|p| p.automation.is_empty() && p.automation.loop_bar.is_none()));
  }

  #[test]
  fn stop_disarms_every_recording_lane() {
    let mut s = EngineState::default();
    s.apply(Command::Play);
    s.apply(Command::SetAutomationRecording { slot: 1, pad: 1, recording: true, current_bar: 0 });
    s.apply(Command::SetAutomationRecording { slot: 3, pad: 0, recording: true, current_bar: 0 });
    assert_eq!(s.apply(Command::Stop), vec![Refresh::Transport]);
    assert!(!s.playing);
    assert!(s.slots.iter().flat_map(|sl| sl.pads.iter()).all(|p| !p.automation.is_armed()));
  }

  #[test]
  fn snapshots_restore_params_and_pads() {
    let mut s = EngineState::default();
    s.apply(Command::SetEffectXy { slot: 3, pad: 0, x: 0.9, y: 0.1 });
    s.apply(Command::SaveFxSnapshot { slot: 3, index: 2 });
    s.apply(Command::SetEffectXy { slot: 3, pad: 0, x: 0.0, y: 0.0 });
    let sync = s.apply(Command::LoadFxSnapshot { slot: 3, index: 2 });
    assert_eq!(sync, vec![Refresh::EffectParams(3)]);
    assert_eq!(s.slots[3].params.get("size"), Some(0.9));
    assert_eq!(s.slots[3].pads[0].x, 0.9);
    assert!(s.apply(Command::LoadFxSnapshot { slot: 3, index: 0 }).is_empty());
  }

  #[test]
  fn routing_is_validated_and_bpm_is_safe() {
    let mut s = EngineState::default();
    s.apply(Command::SetRouting { order: vec![3, 3, 12, 1] });
    assert_eq!(s.routing, vec![3, 1]);
    s.apply(Command::SetBpm { bpm: f32::NAN });
    assert_eq!(s.bpm, DEFAULT_BPM);
  }

  #[test]
  fn commands_deserialize_from_tagged_json() {
    let cmd: Command = serde_json::from_str(r#"{"type":"setEffectType","slot":1,"effectType":"djLooper"}"#).unwrap();
    assert_eq!(cmd, Command::SetEffectType { slot: 1, effect_type: EffectType::DjLooper });
    let cmd: Command = serde_json::from_str(r#"{"type":"setEffectParam","slot":0,"name":"type","value":"highpass"}"#).unwrap();
    assert_eq!(cmd, Command::SetEffectParam { slot: 0, name: "type".into(), value: ParamValue::Str("highpass".into()) });
  }
}
