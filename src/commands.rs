use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use crate::engine::analysis::{spawn_spectrum, MeterSnapshot, Meters};
use crate::engine::audio::{AudioEngine, OfflineRenderer, OutputDevice};
use crate::engine::automation::RecordMode;
use crate::engine::clock::{loop_duration, Clock, EngineClock, LoopClock};
use crate::engine::config::EngineConfig;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::fx::{EffectType, Processor};
use crate::engine::graph::EngineGraph;
use crate::engine::messages::{EngineMsg, ParamValue, Retired};
use crate::engine::mixer::CompressorParams;
use crate::engine::modules::sampler::{SampleBuffer, SampleSettings, Sampler, TriggerOverrides, PADS_PER_BANK, TOTAL_PADS};
use crate::engine::modules::synth::NoteParams;
use crate::engine::modules::synth_def::{ModDest, ModSource, SynthDefinition, SynthPreset};
use crate::engine::recorder::{self, next_recording_path, Recording, RecordingSummary};
use crate::engine::state::{Command, EngineState, Refresh};
use crate::project::{ProjectBlob, SampleRef};

const RETIRE_CAPACITY: usize = 64;
const RECORDING_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Control-context entry point: owns the project state, turns commands into
/// render messages and runs automation on every `tick`.
pub struct Controller {
  cfg: EngineConfig,
  sr: f32,
  state: EngineState,
  clock: EngineClock,
  loop_clock: LoopClock,
  last_clock: Clock,
  tx: Sender<EngineMsg>,
  retire_rx: Receiver<Retired>,
  meters: Arc<Meters>,
  spectrum_rx: Option<Receiver<Vec<f32>>>,
  recording: Option<Recording>,
  sample_paths: Vec<Option<PathBuf>>,
  rng: fastrand::Rng,
  engine: Option<AudioEngine>,
}

impl Controller {
  fn build(sr: f32, cfg: EngineConfig, with_spectrum: bool) -> EngineResult<(Self, EngineGraph, Receiver<EngineMsg>)> {
    let cfg = cfg.sanitized();
    let clock = EngineClock::new(sr);
    let meters = Meters::new();
    let (tx, rx) = unbounded();
    let (retire_tx, retire_rx) = bounded(RETIRE_CAPACITY);
    let (tap, spectrum_rx) = if with_spectrum {
      let (tap, rx, _handle) = spawn_spectrum(sr, cfg.spectrum_window, cfg.spectrum_bins)?;
      (Some(tap), Some(rx))
    } else {
      (None, None)
    };
    let graph = EngineGraph::new(clock.clone(), &cfg, meters.clone(), tap, retire_tx);
    let ctl = Self {
      cfg,
      sr,
      state: EngineState::default(),
      loop_clock: LoopClock::new(clock.now()),
      clock,
      last_clock: Clock::default(),
      tx,
      retire_rx,
      meters,
      spectrum_rx,
      recording: None,
      sample_paths: vec![None; TOTAL_PADS],
      rng: fastrand::Rng::new(),
      engine: None,
    };
    Ok((ctl, graph, rx))
  }

  /// Open the default output device and start rendering.
  pub fn start(cfg: EngineConfig) -> EngineResult<Self> {
    let output = OutputDevice::open(&cfg)?;
    let (mut ctl, graph, rx) = Self::build(output.sample_rate(), cfg, true)?;
    let max = ctl.cfg.max_messages_per_block;
    ctl.engine = Some(AudioEngine::start(output, graph, rx, max)?);
    ctl.sync_all();
    log::info!("engine started at {} Hz", ctl.sr);
    Ok(ctl)
  }

  /// Controller plus a renderer the caller drives; no device involved.
  pub fn offline(sr: f32, cfg: EngineConfig) -> EngineResult<(Self, OfflineRenderer)> {
    let (ctl, graph, rx) = Self::build(sr, cfg, false)?;
    let renderer = OfflineRenderer::new(graph, rx, ctl.cfg.max_messages_per_block);
    ctl.sync_all();
    Ok((ctl, renderer))
  }

  pub fn state(&self) -> &EngineState { &self.state }

  pub fn sample_rate(&self) -> f32 { self.sr }

  pub fn is_running(&self) -> bool { self.engine.is_some() }

  pub fn meters(&self) -> MeterSnapshot { self.meters.snapshot() }

  /// Log-spaced magnitude frames from the analysis thread (device mode only).
  pub fn spectrum(&self) -> Option<&Receiver<Vec<f32>>> { self.spectrum_rx.as_ref() }

  fn send(&self, msg: EngineMsg) {
    if self.tx.send(msg).is_err() {
      log::debug!("render side gone, message dropped");
    }
  }

  fn apply(&mut self, cmd: Command) {
    for sync in self.state.apply(cmd) {
      self.sync(sync);
    }
  }

  fn sync_all(&self) {
    for sync in self.state.full_sync() {
      self.sync(sync);
    }
  }

  fn sync(&self, sync: Refresh) {
    let s = &self.state;
    let msg = match sync {
      Refresh::Synth => EngineMsg::SynthDefinition(s.synth),
      Refresh::ModMatrix => EngineMsg::ModMatrix(s.mod_matrix.dense()),
      Refresh::ModMatrixMuted => EngineMsg::ModMatrixMuted(s.matrix_muted),
      Refresh::EffectType(slot) => {
        let slot_state = &s.slots[slot];
        let processor = Box::new(Processor::new(slot_state.effect_type(), self.sr, self.cfg.capture_seconds));
        self.send(EngineMsg::InstallEffect { slot, processor, params: slot_state.params });
        EngineMsg::EffectOn { slot, on: slot_state.on }
      }
      Refresh::EffectParams(slot) => EngineMsg::EffectParams { slot, params: s.slots[slot].params },
      Refresh::EffectOn(slot) => EngineMsg::EffectOn { slot, on: s.slots[slot].on },
      Refresh::Routing => EngineMsg::Routing(s.routing()),
      Refresh::Tempo => EngineMsg::Tempo { bpm: s.bpm },
      Refresh::Transport => EngineMsg::Transport { playing: s.playing },
      Refresh::Bank(bank) => {
        let b = s.banks[bank];
        self.send(EngineMsg::BankVolume { bank, volume: b.volume });
        self.send(EngineMsg::BankPan { bank, pan: b.pan });
        self.send(EngineMsg::BankMute { bank, muted: b.muted });
        EngineMsg::BankSolo { bank, soloed: b.soloed }
      }
      Refresh::MasterVolume => EngineMsg::MasterVolume(s.master_volume),
      Refresh::Compressor => EngineMsg::Compressor(s.compressor),
    };
    self.send(msg);
  }

  fn at_frame(&self, at: Option<f64>) -> u64 {
    match at {
      Some(t) => self.clock.seconds_to_frame(t),
      None => self.clock.frames(),
    }
  }

  /// Engine time in seconds.
  pub fn now(&self) -> f64 { self.clock.now() }

  // ---- triggers

  /// Play a pad at engine time `at` (seconds, `None` = as soon as possible).
  pub fn trigger_sample(&mut self, bank: usize, pad: usize, at: Option<f64>, overrides: &TriggerOverrides) {
    let Some(settings) = self.state.sample_settings(bank, pad) else {
      log::warn!("ignoring trigger for bank {bank} pad {pad}");
      return;
    };
    let params = settings.resolve(overrides);
    let at_frame = self.at_frame(at);
    self.send(EngineMsg::TriggerSample { at_frame, bank, pad, params });
  }

  pub fn trigger_synth_note(&mut self, pitch_offset_cents: f32, at: Option<f64>, params: NoteParams) {
    let at_frame = self.at_frame(at);
    self.send(EngineMsg::NoteOn { at_frame, cents: pitch_offset_cents, params });
  }

  // ---- synth

  pub fn update_synth_definition(&mut self, definition: SynthDefinition) { self.apply(Command::UpdateSynthDefinition { definition }); }

  pub fn patch_synth(&mut self, path: &str, value: ParamValue) { self.apply(Command::PatchSynth { path: path.to_string(), value }); }

  pub fn load_synth_preset(&mut self, preset: SynthPreset) { self.apply(Command::LoadSynthPreset { preset }); }

  pub fn randomize_synth(&mut self) {
    let seed = self.rng.u64(..);
    self.apply(Command::RandomizeSynth { seed });
  }

  pub fn randomize_mod_matrix(&mut self) {
    let seed = self.rng.u64(..);
    self.apply(Command::RandomizeModMatrix { seed });
  }

  pub fn update_mod_matrix(&mut self, source: ModSource, dest: ModDest, depth: f32) { self.apply(Command::UpdateModMatrix { source, dest, depth }); }

  pub fn set_mod_matrix_muted(&mut self, muted: bool) { self.apply(Command::SetModMatrixMuted { muted }); }

  pub fn clear_mod_matrix(&mut self) { self.apply(Command::ClearModMatrix); }

  // ---- effects

  pub fn set_effect_type(&mut self, slot: usize, effect_type: EffectType) { self.apply(Command::SetEffectType { slot, effect_type }); }

  pub fn set_effect_param(&mut self, slot: usize, name: &str, value: ParamValue) {
    self.apply(Command::SetEffectParam { slot, name: name.to_string(), value });
  }

  pub fn set_effect_bypass(&mut self, slot: usize, bypassed: bool) { self.apply(Command::SetEffectBypass { slot, bypassed }); }

  pub fn set_effect_xy(&mut self, slot: usize, pad: usize, x: f32, y: f32) { self.apply(Command::SetEffectXy { slot, pad, x, y }); }

  pub fn set_routing(&mut self, order: &[usize]) { self.apply(Command::SetRouting { order: order.to_vec() }); }

  pub fn save_fx_snapshot(&mut self, slot: usize, index: usize) { self.apply(Command::SaveFxSnapshot { slot, index }); }

  pub fn load_fx_snapshot(&mut self, slot: usize, index: usize) { self.apply(Command::LoadFxSnapshot { slot, index }); }

  // ---- automation

  fn read_clock(&mut self) -> Clock { self.loop_clock.read(self.clock.now(), self.state.bpm) }

  pub fn set_automation_recording(&mut self, slot: usize, pad: usize, recording: bool) {
    let current_bar = self.read_clock().bar;
    self.apply(Command::SetAutomationRecording { slot, pad, recording, current_bar });
  }

  pub fn set_automation_record_mode(&mut self, slot: usize, pad: usize, mode: RecordMode) {
    self.apply(Command::SetAutomationRecordMode { slot, pad, mode });
  }

  pub fn clear_automation(&mut self, slot: usize) { self.apply(Command::ClearAutomation { slot }); }

  pub fn set_automation_loop_bar(&mut self, slot: usize, bar: Option<u32>) { self.apply(Command::SetAutomationLoopBar { slot, bar }); }

  /// Rebase the loop so the current instant is the start of `bar`.
  pub fn jump_to_bar(&mut self, bar: u32) {
    if !self.state.playing {
      log::debug!("jump to bar {bar} ignored while stopped");
      return;
    }
    self.loop_clock.jump_to_bar(self.clock.now(), bar, self.state.bpm);
  }

  /// Control-rate step: derive the loop clock, record or replay every pad lane
  /// and hand retired render objects to their drop.
  pub fn tick(&mut self) -> Clock {
    self.collect_retired();
    if !self.state.playing {
      return self.last_clock;
    }
    let now = self.clock.now();
    let clock = self.loop_clock.read(now, self.state.bpm);
    let mut moves = Vec::new();
    for (slot, s) in self.state.slots.iter_mut().enumerate() {
      for (pad, p) in s.pads.iter_mut().enumerate() {
        if let Some((x, y)) = p.automation.tick(clock, now, (p.x, p.y)) {
          moves.push((slot, pad, x, y));
        }
      }
    }
    for (slot, pad, x, y) in moves {
      self.set_effect_xy(slot, pad, x, y);
    }
    self.last_clock = clock;
    clock
  }

  // ---- transport

  /// Tempo change keeps the loop position where it is.
  pub fn set_bpm(&mut self, bpm: f32) {
    let now = self.clock.now();
    let position = self.loop_clock.read(now, self.state.bpm).position;
    self.apply(Command::SetBpm { bpm });
    self.loop_clock.restart(now - position * loop_duration(self.state.bpm));
  }

  pub fn play(&mut self) {
    self.loop_clock.restart(self.clock.now());
    self.last_clock = Clock::default();
    self.apply(Command::Play);
  }

  pub fn stop(&mut self) { self.apply(Command::Stop); }

  // ---- mixer

  pub fn set_bank_volume(&mut self, bank: usize, volume: f32) { self.apply(Command::SetBankVolume { bank, volume }); }

  pub fn set_bank_pan(&mut self, bank: usize, pan: f32) { self.apply(Command::SetBankPan { bank, pan }); }

  pub fn set_bank_mute(&mut self, bank: usize, muted: bool) { self.apply(Command::SetBankMute { bank, muted }); }

  pub fn set_bank_solo(&mut self, bank: usize, soloed: bool) { self.apply(Command::SetBankSolo { bank, soloed }); }

  pub fn set_master_volume(&mut self, volume: f32) { self.apply(Command::SetMasterVolume { volume }); }

  pub fn set_master_compressor(&mut self, params: CompressorParams) { self.apply(Command::SetMasterCompressor { params }); }

  // ---- samples

  pub fn set_sample_settings(&mut self, bank: usize, pad: usize, settings: SampleSettings) {
    self.apply(Command::SetSampleSettings { bank, pad, settings });
  }

  /// Decode `path` and put it on a pad. Decoding happens here, never on the
  /// render thread.
  pub fn load_sample(&mut self, bank: usize, pad: usize, path: &Path) -> EngineResult<()> {
    let Some(index) = Sampler::pad_index(bank, pad) else {
      log::warn!("ignoring sample for bank {bank} pad {pad}");
      return Ok(());
    };
    let buffer = SampleBuffer::decode_file(path).map_err(|reason| EngineError::Decode { path: path.to_path_buf(), reason })?;
    log::info!("loaded {} ({:.2}s) into bank {bank} pad {pad}", buffer.name, buffer.duration());
    self.sample_paths[index] = Some(path.to_path_buf());
    self.send(EngineMsg::LoadSample { bank, pad, sample: Arc::new(buffer) });
    Ok(())
  }

  /// Put an already decoded buffer on a pad.
  pub fn install_sample(&mut self, bank: usize, pad: usize, buffer: SampleBuffer) {
    match Sampler::pad_index(bank, pad) {
      Some(index) => {
        self.sample_paths[index] = None;
        self.send(EngineMsg::LoadSample { bank, pad, sample: Arc::new(buffer) });
      }
      None => log::warn!("ignoring sample for bank {bank} pad {pad}"),
    }
  }

  pub fn clear_sample(&mut self, bank: usize, pad: usize) {
    if let Some(index) = Sampler::pad_index(bank, pad) {
      self.sample_paths[index] = None;
      self.send(EngineMsg::ClearSample { bank, pad });
    }
  }

  // ---- project

  /// Replace the whole state from a definition blob. Samples that fail to
  /// decode are reported and skipped; everything else is applied.
  pub fn restore_project(&mut self, blob: ProjectBlob) -> Vec<EngineError> {
    let ProjectBlob { state, sample_files } = blob;
    let playing = self.state.playing;
    self.state = EngineState { playing, ..state.sanitized() };
    self.sync_all();
    for index in 0..TOTAL_PADS {
      if self.sample_paths[index].is_some() {
        self.clear_sample(index / PADS_PER_BANK, index % PADS_PER_BANK);
      }
    }
    let mut notices = Vec::new();
    for SampleRef { bank, pad, path } in sample_files {
      if let Err(e) = self.load_sample(bank, pad, &path) {
        log::warn!("{e}");
        notices.push(e);
      }
    }
    notices
  }

  /// Current state as a definition blob.
  pub fn project(&self) -> ProjectBlob {
    let sample_files = self
      .sample_paths
      .iter()
      .enumerate()
      .filter_map(|(i, p)| p.as_ref().map(|path| SampleRef { bank: i / PADS_PER_BANK, pad: i % PADS_PER_BANK, path: path.clone() }))
      .collect();
    ProjectBlob { state: self.state.clone(), sample_files }
  }

  // ---- recording

  /// Start writing the master output to the next free `take{n}.wav`.
  pub fn start_master_recording(&mut self) -> EngineResult<PathBuf> {
    if self.recording.is_some() {
      return Err(EngineError::AlreadyRecording);
    }
    let path = next_recording_path(&self.cfg.recordings_dir())?;
    let (tap, rec) = recorder::start(path.clone(), self.sr.round() as u32)?;
    self.send(EngineMsg::StartRecording(tap));
    self.recording = Some(rec);
    log::info!("recording to {}", path.display());
    Ok(path)
  }

  /// Detach the tap from the render graph, wait for it to come back and
  /// finalize the file.
  pub fn stop_master_recording(&mut self) -> EngineResult<RecordingSummary> {
    let rec = self.recording.take().ok_or(EngineError::NotRunning)?;
    self.send(EngineMsg::StopRecording);
    let deadline = Instant::now() + RECORDING_STOP_TIMEOUT;
    loop {
      match self.retire_rx.recv_deadline(deadline) {
        Ok(Retired::Recorder(tap)) => {
          if tap.dropped_frames() > 0 {
            log::warn!("recording dropped {} frames", tap.dropped_frames());
          }
          drop(tap);
          break;
        }
        Ok(other) => drop(other),
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
          return Err(EngineError::Recording("render side did not release the recorder".into()));
        }
      }
    }
    rec.finish(RECORDING_STOP_TIMEOUT)
  }

  /// Drop whatever the render thread handed back. Returns how many objects.
  pub fn collect_retired(&mut self) -> usize {
    self.retire_rx.try_iter().count()
  }
}
