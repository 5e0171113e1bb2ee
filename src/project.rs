use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::error::EngineResult;
use crate::engine::state::EngineState;

/// Audio file backing one pad. Paths are resolved against the blob's directory
/// when relative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRef {
    pub bank: usize,
    pub pad: usize,
    pub path: PathBuf,
}

/// Complete definition blob: the engine state plus the sample files to decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBlob {
    #[serde(flatten)]
    pub state: EngineState,
    #[serde(default)]
    pub sample_files: Vec<SampleRef>,
}

impl ProjectBlob {
    pub fn from_json(text: &str) -> EngineResult<Self> {
        let mut blob: Self = serde_json::from_str(text)?;
        blob.state = blob.state.sanitized();
        Ok(blob)
    }

    pub fn to_json(&self) -> EngineResult<String> { Ok(serde_json::to_string_pretty(self)?) }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let mut blob: Self = read_json(path)?;
        blob.state = blob.state.sanitized();
        if let Some(dir) = path.parent() {
            blob.resolve_paths(dir);
        }
        Ok(blob)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> { write_json_atomic(path, self) }

    fn resolve_paths(&mut self, dir: &Path) {
        for s in &mut self.sample_files {
            if s.path.is_relative() {
                s.path = dir.join(&s.path);
            }
        }
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> EngineResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = PathBuf::from(path);
    tmp.set_extension("tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(data)?;
    f.flush()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> EngineResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write(path, &bytes)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> EngineResult<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}
