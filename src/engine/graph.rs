use std::sync::Arc;

use crossbeam_channel::Sender;

use super::analysis::{Meters, SpectrumTap};
use super::clock::EngineClock;
use super::config::EngineConfig;
use super::fx::FxChain;
use super::messages::{EngineMsg, Retired};
use super::mixer::Mixer;
use super::modules::sampler::{Sampler, BANKS};
use super::modules::synth::{NoteParams, SynthVoice};
use super::recorder::RecorderTap;

/// Bank that also carries the synth voice.
pub const SYNTH_BANK: usize = 3;
const NOTE_QUEUE: usize = 16;
// retired objects parked here while the retire channel is full
const GRAVEYARD: usize = 8;

#[derive(Clone, Copy)]
struct PendingNote {
  at_frame: u64,
  cents: f32,
  params: NoteParams,
}

/// Everything the render thread owns. Built in the control context, then moved
/// into the audio callback.
pub struct EngineGraph {
  sr: f32,
  block: usize,
  clock: EngineClock,
  synth: SynthVoice,
  notes: [Option<PendingNote>; NOTE_QUEUE],
  next_note: u64,
  sampler: Sampler,
  mixer: Mixer,
  fx: FxChain,
  buf_l: Vec<f32>,
  buf_r: Vec<f32>,
  meters: Arc<Meters>,
  spectrum: Option<SpectrumTap>,
  recorder: Option<RecorderTap>,
  retire: Sender<Retired>,
  graveyard: Vec<Retired>,
}

impl EngineGraph {
  pub fn new(
    clock: EngineClock,
    cfg: &EngineConfig,
    meters: Arc<Meters>,
    spectrum: Option<SpectrumTap>,
    retire: Sender<Retired>,
  ) -> Self {
    let sr = clock.sample_rate();
    let block = cfg.render_block_frames.max(1);
    Self {
      sr,
      block,
      clock,
      synth: SynthVoice::new(sr),
      notes: [None; NOTE_QUEUE],
      next_note: u64::MAX,
      sampler: Sampler::new(sr, cfg.voice_pool, cfg.scheduled_event_capacity),
      mixer: Mixer::new(sr),
      fx: FxChain::new(sr, block, cfg.capture_seconds),
      buf_l: vec![0.0; block],
      buf_r: vec![0.0; block],
      meters,
      spectrum,
      recorder: None,
      retire,
      graveyard: Vec::with_capacity(GRAVEYARD),
    }
  }

  pub fn sample_rate(&self) -> f32 { self.sr }

  pub fn sampler(&self) -> &Sampler { &self.sampler }

  pub fn fx(&self) -> &FxChain { &self.fx }

  pub fn synth(&self) -> &SynthVoice { &self.synth }

  pub fn is_recording(&self) -> bool { self.recorder.is_some() }

  fn retire(&mut self, item: Retired) {
    if let Err(e) = self.retire.try_send(item) {
      let item = e.into_inner();
      if self.graveyard.len() < GRAVEYARD {
        self.graveyard.push(item);
      }
      // otherwise the control side stopped draining; dropping here is the only option left
    }
  }

  fn flush_graveyard(&mut self) {
    while let Some(item) = self.graveyard.pop() {
      if let Err(e) = self.retire.try_send(item) {
        self.graveyard.push(e.into_inner());
        break;
      }
    }
  }

  fn queue_note(&mut self, at_frame: u64, cents: f32, params: NoteParams) {
    let note = PendingNote { at_frame, cents, params };
    match self.notes.iter_mut().find(|n| n.is_none()) {
      Some(free) => *free = Some(note),
      None => {
        // full: the latest note gives way
        if let Some(last) = self.notes.iter_mut().max_by_key(|n| n.map_or(0, |n| n.at_frame)) {
          *last = Some(note);
        }
      }
    }
    self.next_note = self.next_note.min(at_frame);
  }

  fn fire_notes(&mut self, frame: u64) {
    let mut next = u64::MAX;
    let mut due: Option<PendingNote> = None;
    for slot in &mut self.notes {
      let Some(n) = *slot else { continue };
      if n.at_frame <= frame {
        // monophonic: the latest due note wins
        if due.map_or(true, |d| n.at_frame >= d.at_frame) {
          due = Some(n);
        }
        *slot = None;
      } else {
        next = next.min(n.at_frame);
      }
    }
    self.next_note = next;
    if let Some(n) = due {
      self.synth.note_on(n.cents, n.params);
    }
  }

  pub fn apply_msg(&mut self, msg: EngineMsg) {
    match msg {
      EngineMsg::NoteOn { at_frame, cents, params } => self.queue_note(at_frame, cents, params),
      EngineMsg::SynthDefinition(def) => self.synth.update_from_definition(&def),
      EngineMsg::ModMatrix(depths) => self.synth.set_mod_matrix(depths),
      EngineMsg::ModMatrixMuted(muted) => self.synth.set_matrix_muted(muted),
      EngineMsg::InstallEffect { slot, processor, params } => {
        let old = self.fx.install(slot, processor, params);
        self.retire(Retired::Processor(old));
      }
      EngineMsg::EffectParams { slot, params } => self.fx.set_params(slot, params),
      EngineMsg::EffectOn { slot, on } => self.fx.set_on(slot, on),
      EngineMsg::Routing(routing) => self.fx.set_routing(routing),
      EngineMsg::Tempo { bpm } => {
        self.fx.set_bpm(bpm);
        self.synth.set_bpm(bpm);
      }
      EngineMsg::Transport { playing } => {
        if !playing {
          self.sampler.flush();
          self.notes = [None; NOTE_QUEUE];
          self.next_note = u64::MAX;
          self.synth.kill();
        }
      }
      EngineMsg::TriggerSample { at_frame, bank, pad, params } => {
        if let Some(i) = Sampler::pad_index(bank, pad) {
          self.sampler.schedule(at_frame, i, params);
        }
      }
      EngineMsg::LoadSample { bank, pad, sample } => match Sampler::pad_index(bank, pad) {
        Some(i) => {
          if let Some(old) = self.sampler.set_sample(i, Some(sample)) {
            self.retire(Retired::Sample(old));
          }
        }
        None => self.retire(Retired::Sample(sample)),
      },
      EngineMsg::ClearSample { bank, pad } => {
        if let Some(old) = Sampler::pad_index(bank, pad).and_then(|i| self.sampler.set_sample(i, None)) {
          self.retire(Retired::Sample(old));
        }
      }
      EngineMsg::BankVolume { bank, volume } => self.mixer.update_bank(bank, |b| b.volume = volume),
      EngineMsg::BankPan { bank, pan } => self.mixer.update_bank(bank, |b| b.pan = pan),
      EngineMsg::BankMute { bank, muted } => self.mixer.update_bank(bank, |b| b.muted = muted),
      EngineMsg::BankSolo { bank, soloed } => self.mixer.update_bank(bank, |b| b.soloed = soloed),
      EngineMsg::MasterVolume(v) => self.mixer.set_master_volume(v),
      EngineMsg::Compressor(p) => self.mixer.set_compressor(&p),
      EngineMsg::StartRecording(tap) => {
        if let Some(old) = self.recorder.replace(tap) {
          self.retire(Retired::Recorder(old));
        }
      }
      EngineMsg::StopRecording => {
        if let Some(mut tap) = self.recorder.take() {
          tap.flush();
          self.retire(Retired::Recorder(tap));
        }
      }
    }
  }

  /// Fill an interleaved device buffer. Channels past the first two get silence.
  pub fn render(&mut self, out: &mut [f32], channels: usize) {
    let channels = channels.max(1);
    let total = out.len() / channels;
    let mut done = 0;
    while done < total {
      let n = (total - done).min(self.block);
      self.render_block(n);
      for (i, frame) in out[done * channels..(done + n) * channels].chunks_mut(channels).enumerate() {
        frame[0] = self.buf_l[i];
        if channels > 1 {
          frame[1] = self.buf_r[i];
        }
        for extra in frame.iter_mut().skip(2) {
          *extra = 0.0;
        }
      }
      done += n;
    }
  }

  /// Render `n <= block` frames into the internal stereo buffers.
  fn render_block(&mut self, n: usize) {
    let start = self.clock.frames();
    self.flush_graveyard();
    self.sampler.dispatch(start, n);

    for i in 0..n {
      let frame = start + i as u64;
      if self.next_note <= frame {
        self.fire_notes(frame);
      }
      let mut banks = [(0.0, 0.0); BANKS];
      self.sampler.render_frame(&mut banks);
      let s = self.synth.render();
      banks[SYNTH_BANK].0 += s;
      banks[SYNTH_BANK].1 += s;
      let (l, r) = self.mixer.mix_banks(&banks);
      self.buf_l[i] = l;
      self.buf_r[i] = r;
    }

    self.fx.process(&mut self.buf_l[..n], &mut self.buf_r[..n]);

    for i in 0..n {
      let (l, r) = self.mixer.master(self.buf_l[i], self.buf_r[i]);
      let l = if l.is_finite() { l } else { 0.0 };
      let r = if r.is_finite() { r } else { 0.0 };
      self.buf_l[i] = l;
      self.buf_r[i] = r;
      if let Some(tap) = self.spectrum.as_mut() {
        tap.push(0.5 * (l + r));
      }
      if let Some(rec) = self.recorder.as_mut() {
        rec.push(l, r);
      }
    }

    self.meters.publish(&self.mixer.levels(), self.synth.lfo_values(), self.mixer.compressor().reduction_db());
    self.clock.advance(n as u64);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::fx::{EffectParams, EffectType, Processor, Routing};
  use crate::engine::modules::sampler::{PlaybackParams, SampleBuffer};
  use crossbeam_channel::{bounded, Receiver};

  const SR: f32 = 48_000.0;

  fn graph() -> (EngineGraph, EngineClock, Arc<Meters>, Receiver<Retired>) {
    let clock = EngineClock::new(SR);
    let meters = Meters::new();
    let (tx, rx) = bounded(16);
    let g = EngineGraph::new(clock.clone(), &EngineConfig::default(), meters.clone(), None, tx);
    (g, clock, meters, rx)
  }

  fn click() -> Arc<SampleBuffer> { Arc::new(SampleBuffer::from_interleaved("click", vec![0.8; 4_800], 1, SR)) }

  fn render_frames(g: &mut EngineGraph, frames: usize) -> Vec<f32> {
    let mut out = vec![0.0; frames * 2];
    g.render(&mut out, 2);
    out
  }

  #[test]
  fn silent_graph_renders_silence_and_advances_the_clock() {
    let (mut g, clock, _, _) = graph();
    let out = render_frames(&mut g, 1000);
    assert!(out.iter().all(|s| s.abs() < 1e-6));
    assert_eq!(clock.frames(), 1000);
  }

  #[test]
  fn scheduled_sample_starts_on_its_frame() {
    let (mut g, _, _, _) = graph();
    g.apply_msg(EngineMsg::Routing(Routing::new(&[])));
    g.apply_msg(EngineMsg::LoadSample { bank: 0, pad: 0, sample: click() });
    g.apply_msg(EngineMsg::TriggerSample { at_frame: 300, bank: 0, pad: 0, params: PlaybackParams::default() });
    let out = render_frames(&mut g, 512);
    let first = out.chunks(2).position(|f| f[0].abs() > 1e-4).unwrap();
    assert_eq!(first, 300);
  }

  #[test]
  fn synth_note_plays_on_its_bank_and_mute_removes_it() {
    let (mut g, _, meters, _) = graph();
    g.apply_msg(EngineMsg::NoteOn { at_frame: 0, cents: 0.0, params: NoteParams::default() });
    let out = render_frames(&mut g, 4_800);
    assert!(out.iter().any(|s| s.abs() > 1e-3));
    assert!(meters.snapshot().banks[SYNTH_BANK] > 0.0);

    g.apply_msg(EngineMsg::BankMute { bank: SYNTH_BANK, muted: true });
    render_frames(&mut g, 48_000);
    let out = render_frames(&mut g, 256);
    assert!(out.iter().all(|s| s.abs() < 1e-4));
  }

  #[test]
  fn replaced_objects_are_retired_not_dropped() {
    let (mut g, _, _, rx) = graph();
    let p = Box::new(Processor::new(EffectType::Reverb, SR, 1.0));
    g.apply_msg(EngineMsg::InstallEffect { slot: 0, processor: p, params: EffectParams::default_for(EffectType::Reverb) });
    assert!(matches!(rx.try_recv(), Ok(Retired::Processor(old)) if old.effect_type() == EffectType::Filter));
    assert_eq!(g.fx().slot(0).map(|s| s.effect_type()), Some(EffectType::Reverb));

    g.apply_msg(EngineMsg::LoadSample { bank: 1, pad: 2, sample: click() });
    g.apply_msg(EngineMsg::LoadSample { bank: 1, pad: 2, sample: click() });
    assert!(matches!(rx.try_recv(), Ok(Retired::Sample(_))));
    g.apply_msg(EngineMsg::LoadSample { bank: 9, pad: 0, sample: click() });
    assert!(matches!(rx.try_recv(), Ok(Retired::Sample(_))));
  }

  #[test]
  fn stop_flushes_voices_and_pending_triggers() {
    let (mut g, _, _, _) = graph();
    g.apply_msg(EngineMsg::LoadSample { bank: 0, pad: 0, sample: click() });
    g.apply_msg(EngineMsg::TriggerSample { at_frame: 0, bank: 0, pad: 0, params: PlaybackParams::default() });
    g.apply_msg(EngineMsg::TriggerSample { at_frame: 10_000, bank: 0, pad: 0, params: PlaybackParams::default() });
    render_frames(&mut g, 128);
    assert_eq!(g.sampler().active_voices(), 1);
    g.apply_msg(EngineMsg::Transport { playing: false });
    assert_eq!(g.sampler().active_voices(), 0);
    assert_eq!(g.sampler().pending_len(), 0);
  }

  #[test]
  fn extra_device_channels_are_zeroed() {
    let (mut g, _, _, _) = graph();
    g.apply_msg(EngineMsg::NoteOn { at_frame: 0, cents: 0.0, params: NoteParams::default() });
    let mut out = vec![1.0; 4 * 300];
    g.render(&mut out, 4);
    assert!(out.chunks(4).all(|f| f[2] == 0.0 && f[3] == 0.0));
  }
}
