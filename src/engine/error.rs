use std::path::PathBuf;

use thiserror::Error;

/// Non-fatal notices handed back to the caller. Invalid numbers and bad
/// indices never reach this type; they are sanitized or ignored at the boundary.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("no output device available")]
  NoOutputDevice,
  #[error("audio device error: {0}")]
  Device(String),
  #[error("could not decode {}: {reason:#}", .path.display())]
  Decode { path: PathBuf, reason: anyhow::Error },
  #[error("recording failed: {0}")]
  Recording(String),
  #[error("recording already in progress")]
  AlreadyRecording,
  #[error("engine is not running")]
  NotRunning,
  #[error("invalid project data: {0}")]
  Project(#[from] serde_json::Error),
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

macro_rules! device_error {
  ($($t:ty),+) => {
    $(impl From<$t> for EngineError {
      fn from(e: $t) -> Self { EngineError::Device(e.to_string()) }
    })+
  };
}

device_error!(
  cpal::DevicesError,
  cpal::DefaultStreamConfigError,
  cpal::BuildStreamError,
  cpal::PlayStreamError
);

impl From<hound::Error> for EngineError {
  fn from(e: hound::Error) -> Self { EngineError::Recording(e.to_string()) }
}
