use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, TryRecvError};

use super::config::EngineConfig;
use super::error::{EngineError, EngineResult};
use super::graph::EngineGraph;
use super::messages::EngineMsg;

/// Apply at most `max` queued messages without blocking. Returns how many ran.
pub fn drain_messages(graph: &mut EngineGraph, rx: &Receiver<EngineMsg>, max: usize) -> usize {
  let mut drained = 0usize;
  while drained < max {
    match rx.try_recv() {
      Ok(msg) => graph.apply_msg(msg),
      Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
    }
    drained += 1;
  }
  drained
}

/// Output device plus the stream configuration picked for it.
pub struct OutputDevice {
  device: cpal::Device,
  config: cpal::StreamConfig,
}

impl OutputDevice {
  /// Default output device at the first preferred rate it supports (stereo f32),
  /// else its highest stereo f32 rate, else its default config.
  pub fn open(cfg: &EngineConfig) -> EngineResult<Self> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(EngineError::NoOutputDevice)?;
    let ranges: Vec<cpal::SupportedStreamConfigRange> = device
      .supported_output_configs()
      .map(|it| it.filter(|r| r.channels() == 2 && r.sample_format() == cpal::SampleFormat::F32).collect())
      .unwrap_or_default();
    let mut chosen = cfg.preferred_sample_rates.iter().find_map(|&sr| {
      ranges
        .iter()
        .find(|r| r.min_sample_rate().0 <= sr && r.max_sample_rate().0 >= sr)
        .map(|r| r.clone().with_sample_rate(cpal::SampleRate(sr)))
    });
    if chosen.is_none() {
      chosen = ranges.into_iter().next().map(|r| r.with_max_sample_rate());
    }
    let supported = match chosen {
      Some(c) => c,
      None => device.default_output_config()?,
    };
    let mut config: cpal::StreamConfig = supported.into();
    // larger fixed buffer keeps underruns away
    config.buffer_size = cpal::BufferSize::Fixed(cfg.device_buffer_frames);
    if let Ok(name) = device.name() {
      log::info!("output device {name}: {} Hz, {} channels", config.sample_rate.0, config.channels);
    }
    Ok(Self { device, config })
  }

  pub fn sample_rate(&self) -> f32 { self.config.sample_rate.0 as f32 }

  pub fn channels(&self) -> usize { self.config.channels as usize }
}

/// A running output stream. The graph lives inside the callback; dropping this
/// stops audio.
pub struct AudioEngine {
  stream: cpal::Stream,
  sample_rate: f32,
}

impl AudioEngine {
  pub fn start(output: OutputDevice, mut graph: EngineGraph, rx: Receiver<EngineMsg>, max_messages: usize) -> EngineResult<Self> {
    let channels = output.channels();
    let sample_rate = output.sample_rate();
    let err_fn = |e: cpal::StreamError| log::error!("stream error: {e}");
    let stream = output.device.build_output_stream(
      &output.config,
      move |data: &mut [f32], _| {
        drain_messages(&mut graph, &rx, max_messages);
        graph.render(data, channels);
      },
      err_fn,
      None,
    )?;
    stream.play()?;
    Ok(Self { stream, sample_rate })
  }

  pub fn sample_rate(&self) -> f32 { self.sample_rate }

  pub fn pause(&self) -> EngineResult<()> {
    self.stream.pause().map_err(|e| EngineError::Device(e.to_string()))
  }
}

/// Device-free host: same message drain and render path, driven by the caller.
pub struct OfflineRenderer {
  graph: EngineGraph,
  rx: Receiver<EngineMsg>,
  max_messages: usize,
}

impl OfflineRenderer {
  pub fn new(graph: EngineGraph, rx: Receiver<EngineMsg>, max_messages: usize) -> Self {
    Self { graph, rx, max_messages: max_messages.max(1) }
  }

  pub fn graph(&self) -> &EngineGraph { &self.graph }

  /// Render `frames` stereo frames, draining messages every device-sized chunk.
  pub fn render(&mut self, frames: usize, chunk: usize) -> Vec<f32> {
    let mut out = vec![0.0; frames * 2];
    for buf in out.chunks_mut(chunk.max(1) * 2) {
      drain_messages(&mut self.graph, &self.rx, self.max_messages);
      self.graph.render(buf, 2);
    }
    out
  }
}
