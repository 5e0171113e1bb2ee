use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::EngineResult;

/// Engine tuning. Every field has a default, so a partial JSON file is fine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
  /// Tried in order before falling back to the device maximum.
  pub preferred_sample_rates: Vec<u32>,
  pub device_buffer_frames: u32,
  pub render_block_frames: usize,
  pub max_messages_per_block: usize,
  pub spectrum_window: usize,
  pub spectrum_bins: usize,
  pub voice_pool: usize,
  pub scheduled_event_capacity: usize,
  pub capture_seconds: f32,
  pub recordings_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      preferred_sample_rates: vec![44_100, 48_000],
      device_buffer_frames: 1024,
      render_block_frames: 128,
      max_messages_per_block: 24,
      spectrum_window: 2048,
      spectrum_bins: 128,
      voice_pool: 32,
      scheduled_event_capacity: 256,
      capture_seconds: 8.0,
      recordings_dir: None,
    }
  }
}

impl EngineConfig {
  pub fn load(path: &Path) -> EngineResult<Self> {
    let text = std::fs::read_to_string(path)?;
    let cfg: Self = serde_json::from_str(&text)?;
    Ok(cfg.sanitized())
  }

  /// Clamp sizes into ranges the render path can live with.
  pub fn sanitized(mut self) -> Self {
    let d = Self::default();
    self.render_block_frames = self.render_block_frames.clamp(16, 4096);
    self.max_messages_per_block = self.max_messages_per_block.max(1);
    self.spectrum_window = self.spectrum_window.clamp(256, 16_384).next_power_of_two();
    self.spectrum_bins = self.spectrum_bins.clamp(8, 1024);
    self.voice_pool = self.voice_pool.clamp(1, 256);
    self.scheduled_event_capacity = self.scheduled_event_capacity.max(1);
    if !self.capture_seconds.is_finite() || self.capture_seconds <= 0.0 {
      self.capture_seconds = d.capture_seconds;
    }
    self.capture_seconds = self.capture_seconds.min(60.0);
    if self.preferred_sample_rates.is_empty() {
      self.preferred_sample_rates = d.preferred_sample_rates;
    }
    self
  }

  /// `recordings_dir`, else `<documents>/groovepad/recordings`, else the temp dir.
  pub fn recordings_dir(&self) -> PathBuf {
    if let Some(dir) = &self.recordings_dir {
      return dir.clone();
    }
    dirs::document_dir()
      .or_else(dirs::home_dir)
      .unwrap_or_else(std::env::temp_dir)
      .join("groovepad")
      .join("recordings")
  }
}
