use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;
use serde::Serialize;

use super::modules::sampler::BANKS;

const SPECTRUM_FMIN: f32 = 20.0;
const SPECTRUM_FMAX: f32 = 20_000.0;
// buffers cycling between the render tap and the analysis thread
const SPECTRUM_POOL: usize = 3;

#[derive(Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
  fn store(&self, v: f32) { self.0.store(v.to_bits(), Ordering::Relaxed); }
  fn load(&self) -> f32 { f32::from_bits(self.0.load(Ordering::Relaxed)) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSnapshot {
  pub banks: [f32; BANKS],
  pub master: f32,
  pub lfo: [f32; 2],
  pub gain_reduction_db: f32,
}

/// Written by the render thread once per block, read by the UI.
#[derive(Default)]
pub struct Meters {
  banks: [AtomicF32; BANKS],
  master: AtomicF32,
  lfo: [AtomicF32; 2],
  gain_reduction: AtomicF32,
}

impl Meters {
  pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

  pub fn publish(&self, levels: &[f32; BANKS + 1], lfo: [f32; 2], gain_reduction_db: f32) {
    for (m, v) in self.banks.iter().zip(levels) {
      m.store(*v);
    }
    self.master.store(levels[BANKS]);
    self.lfo[0].store(lfo[0]);
    self.lfo[1].store(lfo[1]);
    self.gain_reduction.store(gain_reduction_db);
  }

  pub fn snapshot(&self) -> MeterSnapshot {
    MeterSnapshot {
      banks: std::array::from_fn(|i| self.banks[i].load()),
      master: self.master.load(),
      lfo: [self.lfo[0].load(), self.lfo[1].load()],
      gain_reduction_db: self.gain_reduction.load(),
    }
  }
}

/// Render-side half: fills recycled buffers and hands them off when full.
/// Drops frames rather than waiting when no buffer is free.
pub struct SpectrumTap {
  window: usize,
  current: Option<Vec<f32>>,
  free_rx: Receiver<Vec<f32>>,
  full_tx: Sender<Vec<f32>>,
}

impl SpectrumTap {
  #[inline]
  pub fn push(&mut self, mono: f32) {
    if self.current.is_none() {
      self.current = self.free_rx.try_recv().ok();
    }
    let Some(buf) = self.current.as_mut() else { return };
    buf.push(mono);
    if buf.len() >= self.window {
      if let Some(full) = self.current.take() {
        if let Err(e) = self.full_tx.try_send(full) {
          // analysis is behind: reuse the buffer
          let mut back = e.into_inner();
          back.clear();
          self.current = Some(back);
        }
      }
    }
  }
}

/// Map an FFT of `samples` onto `bins` log-spaced magnitudes between 20 Hz and 20 kHz.
pub fn spectrum_bins(samples: &[f32], sr: f32, bins: usize, planner: &mut FftPlanner<f32>, scratch: &mut Vec<Complex32>) -> Vec<f32> {
  let n = samples.len().max(2);
  let size = n.next_power_of_two();
  scratch.clear();
  scratch.extend(samples.iter().enumerate().map(|(i, &x)| {
    let w = 0.5 * (1.0 - (std::f32::consts::TAU * i as f32 / (n - 1) as f32).cos());
    Complex32::new(x * w, 0.0)
  }));
  scratch.resize(size, Complex32::new(0.0, 0.0));
  planner.plan_fft_forward(size).process(scratch);
  let bins = bins.max(2);
  let half = (size / 2).max(2);
  (0..bins)
    .map(|i| {
      let t = i as f32 / (bins - 1) as f32;
      let f = SPECTRUM_FMIN * (SPECTRUM_FMAX / SPECTRUM_FMIN).powf(t);
      let k = ((f / sr) * size as f32).round() as usize;
      let c = scratch[k.clamp(1, half - 1)];
      (c.norm() / size as f32).max(1e-9)
    })
    .collect()
}

/// Start the analysis thread. Returns the render tap, the UI receiver of bin
/// vectors and the thread handle (the thread ends when the tap is dropped).
pub fn spawn_spectrum(sr: f32, window: usize, bins: usize) -> std::io::Result<(SpectrumTap, Receiver<Vec<f32>>, JoinHandle<()>)> {
  let (free_tx, free_rx) = bounded::<Vec<f32>>(SPECTRUM_POOL);
  let (full_tx, full_rx) = bounded::<Vec<f32>>(SPECTRUM_POOL);
  let (out_tx, out_rx) = bounded::<Vec<f32>>(4);
  for _ in 0..SPECTRUM_POOL {
    let _ = free_tx.try_send(Vec::with_capacity(window));
  }
  let handle = std::thread::Builder::new()
    .name("groovepad-spectrum".into())
    .spawn(move || {
      let mut planner = FftPlanner::<f32>::new();
      let mut scratch = Vec::with_capacity(window.next_power_of_two());
      while let Ok(mut buf) = full_rx.recv() {
        let mags = spectrum_bins(&buf, sr, bins, &mut planner, &mut scratch);
        // a slow UI just misses frames
        let _ = out_tx.try_send(mags);
        buf.clear();
        if free_tx.send(buf).is_err() { break; }
      }
      log::debug!("spectrum thread finished");
    })?;
  let tap = SpectrumTap { window, current: None, free_rx, full_tx };
  Ok((tap, out_rx, handle))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn sine_peaks_in_the_matching_bin() {
    let sr = 48_000.0;
    let samples: Vec<f32> = (0..2048).map(|i| (std::f32::consts::TAU * 1000.0 * i as f32 / sr).sin()).collect();
    let mut planner = FftPlanner::new();
    let mut scratch = Vec::new();
    let mags = spectrum_bins(&samples, sr, 128, &mut planner, &mut scratch);
    assert_eq!(mags.len(), 128);
    let loudest = mags.iter().enumerate().max_by(|a, b| a.1.total_cmp(b.1)).map(|(i, _)| i).unwrap();
    let f = SPECTRUM_FMIN * (SPECTRUM_FMAX / SPECTRUM_FMIN).powf(loudest as f32 / 127.0);
    assert!((f / 1000.0 - 1.0).abs() < 0.1, "peak at {f} Hz");
  }

  #[test]
  fn tap_delivers_bins_from_the_worker() {
    let (mut tap, rx, _h) = spawn_spectrum(48_000.0, 256, 16).unwrap();
    for i in 0..256 {
      tap.push((i as f32 * 0.3).sin());
    }
    let bins = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(bins.len(), 16);
  }

  #[test]
  fn meters_round_trip_through_atomics() {
    let m = Meters::new();
    m.publish(&[0.1, 0.2, 0.3, 0.4, 0.5], [-1.0, 1.0], -3.0);
    let s = m.snapshot();
    assert_eq!(s.banks, [0.1, 0.2, 0.3, 0.4]);
    assert_eq!(s.master, 0.5);
    assert_eq!(s.lfo, [-1.0, 1.0]);
    assert_eq!(s.gain_reduction_db, -3.0);
  }
}
