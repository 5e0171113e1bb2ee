use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::fx::{EffectParams, Processor, Routing};
use super::mixer::CompressorParams;
use super::modules::sampler::{PlaybackParams, SampleBuffer};
use super::modules::synth::NoteParams;
use super::modules::synth_def::{ModDepths, SynthDefinition};
use super::recorder::RecorderTap;

/// Loosely typed value crossing the command boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
  F32(f32),
  I32(i32),
  Bool(bool),
  Str(String),
}

impl ParamValue {
  /// Numeric view; booleans and strings are not numbers here.
  pub fn as_f32(&self) -> Option<f32> {
    match self {
      ParamValue::F32(v) => Some(*v),
      ParamValue::I32(v) => Some(*v as f32),
      ParamValue::Bool(_) | ParamValue::Str(_) => None,
    }
  }
}

impl From<f32> for ParamValue {
  fn from(v: f32) -> Self { ParamValue::F32(v) }
}

/// Render-bound messages. Everything the render thread needs is already built;
/// applying a message never allocates.
pub enum EngineMsg {
  NoteOn { at_frame: u64, cents: f32, params: NoteParams },
  SynthDefinition(SynthDefinition),
  ModMatrix(ModDepths),
  ModMatrixMuted(bool),
  InstallEffect { slot: usize, processor: Box<Processor>, params: EffectParams },
  EffectParams { slot: usize, params: EffectParams },
  EffectOn { slot: usize, on: bool },
  Routing(Routing),
  Tempo { bpm: f32 },
  Transport { playing: bool },
  TriggerSample { at_frame: u64, bank: usize, pad: usize, params: PlaybackParams },
  LoadSample { bank: usize, pad: usize, sample: Arc<SampleBuffer> },
  ClearSample { bank: usize, pad: usize },
  BankVolume { bank: usize, volume: f32 },
  BankPan { bank: usize, pan: f32 },
  BankMute { bank: usize, muted: bool },
  BankSolo { bank: usize, soloed: bool },
  MasterVolume(f32),
  Compressor(CompressorParams),
  StartRecording(RecorderTap),
  StopRecording,
}

/// Objects leaving the render thread to be dropped elsewhere.
pub enum Retired {
  Processor(Box<Processor>),
  Sample(Arc<SampleBuffer>),
  Recorder(RecorderTap),
}
