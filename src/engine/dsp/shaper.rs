use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaperKind {
  #[default]
  #[serde(rename = "Soft Clip")]
  SoftClip,
  #[serde(rename = "Hard Clip")]
  HardClip,
  Fold,
  Bitcrush,
}

/// Static transfer curve applied after an input gain stage. With `drive == 1`
/// soft/hard clip are close to transparent for signals inside [-1, 1].
#[inline]
pub fn shape(kind: ShaperKind, x: f32, drive: f32) -> f32 {
  let drive = if drive.is_finite() { drive.clamp(0.0, 64.0) } else { 1.0 };
  let xin = x * drive;
  match kind {
    ShaperKind::SoftClip => xin.tanh(),
    ShaperKind::HardClip => xin.clamp(-1.0, 1.0),
    ShaperKind::Fold => {
      // triangle fold, period 4
      let m = (xin + 1.0).rem_euclid(4.0);
      ((m - 2.0).abs() - 1.0).clamp(-1.0, 1.0)
    }
    ShaperKind::Bitcrush => {
      let levels = (16.0 - (drive - 1.0).clamp(0.0, 14.0)).exp2();
      ((x * levels).floor() / levels).clamp(-1.0, 1.0)
    }
  }
}

const CLIP_TABLE_LEN: usize = 4096;

// tanh((i - 2048) / 2048), the master bus safety clipper
static CLIP_TABLE: Lazy<Vec<f32>> = Lazy::new(|| {
  let half = (CLIP_TABLE_LEN / 2) as f32;
  (0..CLIP_TABLE_LEN).map(|i| ((i as f32 - half) / half).tanh()).collect()
});

/// Table-driven clipper over [-1, 1]; inputs outside are pinned to the curve ends.
#[inline]
pub fn master_clip(x: f32) -> f32 {
  if !x.is_finite() { return 0.0; }
  let table = &*CLIP_TABLE;
  let last = (CLIP_TABLE_LEN - 1) as f32;
  let pos = ((x.clamp(-1.0, 1.0) + 1.0) * 0.5 * last).clamp(0.0, last);
  let i0 = pos.floor() as usize;
  let i1 = (i0 + 1).min(CLIP_TABLE_LEN - 1);
  let frac = pos - i0 as f32;
  table[i0] + (table[i1] - table[i0]) * frac
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clipper_is_monotonic_and_bounded() {
    let mut prev = -2.0;
    for i in -100..=100 {
      let y = master_clip(i as f32 * 0.05);
      assert!(y >= prev);
      assert!(y.abs() <= 1.0);
      prev = y;
    }
    assert_eq!(master_clip(f32::NAN), 0.0);
  }

  #[test]
  fn fold_stays_in_range() {
    for i in -50..50 {
      let y = shape(ShaperKind::Fold, i as f32 * 0.1, 3.0);
      assert!((-1.0..=1.0).contains(&y));
    }
  }
}
