use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use hound::{SampleFormat, WavSpec, WavWriter};

use super::error::{EngineError, EngineResult};

const CHUNK_SAMPLES: usize = 8192;
const CHUNK_POOL: usize = 16;

/// Render-side writer: interleaved stereo into pooled chunks. Never blocks;
/// when the writer falls behind, frames are counted and dropped.
pub struct RecorderTap {
  chunk: Option<Vec<f32>>,
  free_rx: Receiver<Vec<f32>>,
  full_tx: Sender<Vec<f32>>,
  dropped_frames: u64,
}

impl RecorderTap {
  #[inline]
  pub fn push(&mut self, l: f32, r: f32) {
    if self.chunk.is_none() {
      self.chunk = self.free_rx.try_recv().ok();
    }
    let Some(chunk) = self.chunk.as_mut() else {
      self.dropped_frames += 1;
      return;
    };
    chunk.push(l);
    chunk.push(r);
    if chunk.len() + 2 > CHUNK_SAMPLES {
      self.flush();
    }
  }

  /// Hand the partial chunk to the writer.
  pub fn flush(&mut self) {
    if let Some(chunk) = self.chunk.take() {
      if chunk.is_empty() {
        self.chunk = Some(chunk);
        return;
      }
      if let Err(e) = self.full_tx.try_send(chunk) {
        let mut back = e.into_inner();
        self.dropped_frames += (back.len() / 2) as u64;
        back.clear();
        self.chunk = Some(back);
      }
    }
  }

  pub fn dropped_frames(&self) -> u64 { self.dropped_frames }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordingSummary {
  pub path: PathBuf,
  pub frames: u64,
}

/// Control-side handle to a running recording.
pub struct Recording {
  path: PathBuf,
  done_rx: Receiver<EngineResult<RecordingSummary>>,
  handle: JoinHandle<()>,
}

impl Recording {
  pub fn path(&self) -> &Path { &self.path }

  /// Wait for the writer to drain and finalize. The tap must already be
  /// dropped, otherwise this times out.
  pub fn finish(self, timeout: Duration) -> EngineResult<RecordingSummary> {
    let result = self
      .done_rx
      .recv_timeout(timeout)
      .map_err(|_| EngineError::Recording(format!("writer for {} did not finish", self.path.display())))?;
    if self.handle.join().is_err() {
      log::warn!("recording thread panicked");
    }
    result
  }
}

/// First `take{n}.wav` that does not exist yet in `dir` (created if needed).
pub fn next_recording_path(dir: &Path) -> std::io::Result<PathBuf> {
  fs::create_dir_all(dir)?;
  let mut n = 1u32;
  loop {
    let candidate = dir.join(format!("take{n}.wav"));
    if !candidate.exists() {
      return Ok(candidate);
    }
    n += 1;
  }
}

/// Open a 16-bit stereo WAV at `path` and start the writer thread.
pub fn start(path: PathBuf, sample_rate: u32) -> EngineResult<(RecorderTap, Recording)> {
  let spec = WavSpec { channels: 2, sample_rate, bits_per_sample: 16, sample_format: SampleFormat::Int };
  let mut writer = WavWriter::create(&path, spec)?;
  let (free_tx, free_rx) = bounded::<Vec<f32>>(CHUNK_POOL);
  let (full_tx, full_rx) = bounded::<Vec<f32>>(CHUNK_POOL);
  let (done_tx, done_rx) = bounded::<EngineResult<RecordingSummary>>(1);
  for _ in 0..CHUNK_POOL {
    let _ = free_tx.try_send(Vec::with_capacity(CHUNK_SAMPLES));
  }
  let out_path = path.clone();
  let handle = std::thread::Builder::new()
    .name("groovepad-recorder".into())
    .spawn(move || {
      let mut samples = 0u64;
      let mut failure: Option<EngineError> = None;
      while let Ok(mut chunk) = full_rx.recv() {
        if failure.is_none() {
          for s in &chunk {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            if let Err(e) = writer.write_sample(v) {
              failure = Some(e.into());
              break;
            }
          }
          samples += chunk.len() as u64;
        }
        chunk.clear();
        let _ = free_tx.try_send(chunk);
      }
      let result = match failure {
        Some(e) => Err(e),
        None => writer
          .finalize()
          .map(|_| RecordingSummary { path: out_path.clone(), frames: samples / 2 })
          .map_err(EngineError::from),
      };
      match &result {
        Ok(s) => log::info!("saved recording to {} ({} frames)", s.path.display(), s.frames),
        Err(e) => log::error!("recording to {} failed: {e}", out_path.display()),
      }
      let _ = done_tx.send(result);
    })?;
  let tap = RecorderTap { chunk: None, free_rx, full_tx, dropped_frames: 0 };
  Ok((tap, Recording { path, done_rx, handle }))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("groovepad-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
  }

  #[test]
  fn numbered_paths_skip_existing_takes() {
    let dir = temp_dir("paths");
    let first = next_recording_path(&dir).unwrap();
    assert!(first.ends_with("take1.wav"));
    fs::write(&first, b"x").unwrap();
    assert!(next_recording_path(&dir).unwrap().ends_with("take2.wav"));
    let _ = fs::remove_dir_all(&dir);
  }

  #[test]
  fn writes_a_readable_stereo_wav() {
    let dir = temp_dir("wav");
    let path = next_recording_path(&dir).unwrap();
    let (mut tap, rec) = start(path.clone(), 48_000).unwrap();
    for i in 0..10_000 {
      let v = (i as f32 * 0.01).sin() * 0.5;
      tap.push(v, -v);
    }
    tap.flush();
    drop(tap);
    let summary = rec.finish(Duration::from_secs(5)).unwrap();
    assert_eq!(summary.frames, 10_000);
    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.duration(), 10_000);
    let _ = fs::remove_dir_all(&dir);
  }
}
