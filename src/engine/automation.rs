use serde::{Deserialize, Serialize};

use super::clock::{Clock, LOOP_BARS};

/// Points closer than this to a new one are replaced while recording.
pub const RECORD_THRESHOLD: f64 = 0.003;
/// Points younger than this survive overdubbing, in seconds.
pub const PROTECTION_WINDOW: f64 = 1.0;
/// Playback only pushes a pad value when it moved more than this.
pub const PUSH_EPSILON: f32 = 0.001;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationPoint {
  pub position: f64,
  pub x: f32,
  pub y: f32,
  /// Engine time the point was written, seconds. Loaded points may not have one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordMode {
  /// Recording writes from the first tick.
  #[default]
  PunchIn,
  /// Armed recording begins at the next bar line.
  FromBarStart,
}

/// Gesture lane for one X/Y pad.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Automation {
  data: Vec<AutomationPoint>,
  pub record_mode: RecordMode,
  recording: bool,
  #[serde(skip)]
  armed_bar: Option<u32>,
  pub loop_bar: Option<u32>,
}

impl Automation {
  pub fn points(&self) -> &[AutomationPoint] { &self.data }

  pub fn is_empty(&self) -> bool { self.data.is_empty() }

  /// True once the lane is actually writing points (not just armed).
  pub fn is_recording(&self) -> bool { self.recording && self.armed_bar.is_none() }

  pub fn is_armed(&self) -> bool { self.recording }

  /// Replace the lane, keeping the order invariant.
  pub fn set_points(&mut self, mut points: Vec<AutomationPoint>) {
    points.retain(|p| p.position.is_finite() && p.x.is_finite() && p.y.is_finite());
    for p in &mut points {
      p.position = p.position.rem_euclid(1.0);
    }
    points.sort_by(|a, b| a.position.total_cmp(&b.position));
    self.data = points;
  }

  /// Start or stop recording. `FromBarStart` waits for the bar after `current_bar`.
  pub fn set_recording(&mut self, on: bool, current_bar: u32) {
    self.recording = on;
    self.armed_bar = match (on, self.record_mode) {
      (true, RecordMode::FromBarStart) => Some(current_bar),
      _ => None,
    };
  }

  pub fn set_loop_bar(&mut self, bar: Option<u32>) { self.loop_bar = bar.filter(|b| *b < LOOP_BARS); }

  pub fn clear(&mut self) {
    self.data.clear();
    self.loop_bar = None;
  }

  /// Insert a point, dropping unprotected neighbours within the record threshold.
  pub fn record(&mut self, position: f64, x: f32, y: f32, now: f64) {
    self.data.retain(|p| {
      if (p.position - position).abs() > RECORD_THRESHOLD { return true; }
      p.created_at.is_some_and(|t| now - t < PROTECTION_WINDOW)
    });
    let at = self.data.partition_point(|p| p.position <= position);
    self.data.insert(at, AutomationPoint { position, x, y, created_at: Some(now) });
  }

  /// Playback position after the loop-bar override.
  pub fn playback_position(&self, position: f64) -> f64 {
    match self.loop_bar {
      Some(bar) => {
        let bar_len = 1.0 / LOOP_BARS as f64;
        bar as f64 * bar_len + position.rem_euclid(bar_len)
      }
      None => position,
    }
  }

  /// Sample-and-hold: the last point at or before `position`, wrapping to the
  /// final point when `position` precedes them all.
  pub fn value_at(&self, position: f64) -> Option<(f32, f32)> {
    let last = self.data.last()?;
    let i = self.data.partition_point(|p| p.position <= position);
    let p = if i == 0 { last } else { &self.data[i - 1] };
    Some((p.x, p.y))
  }

  /// Advance one control tick. While recording the pad's current value is
  /// written; otherwise the lane's value is returned if it differs from the pad.
  pub fn tick(&mut self, clock: Clock, now: f64, pad: (f32, f32)) -> Option<(f32, f32)> {
    if self.recording {
      if let Some(bar) = self.armed_bar {
        if clock.bar == bar { return None; }
        self.armed_bar = None;
      }
      self.record(clock.position, pad.0, pad.1, now);
      return None;
    }
    let (x, y) = self.value_at(self.playback_position(clock.position))?;
    if (x - pad.0).abs() > PUSH_EPSILON || (y - pad.1).abs() > PUSH_EPSILON {
      Some((x, y))
    } else {
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pt(position: f64, x: f32) -> AutomationPoint { AutomationPoint { position, x, y: x, created_at: None } }

  #[test]
  fn sample_and_hold_wraps_to_last_point() {
    let mut a = Automation::default();
    a.set_points(vec![pt(0.5, 0.5), pt(0.25, 0.25)]);
    assert_eq!(a.value_at(0.1), Some((0.5, 0.5)));
    assert_eq!(a.value_at(0.25), Some((0.25, 0.25)));
    assert_eq!(a.value_at(0.4), Some((0.25, 0.25)));
    assert_eq!(a.value_at(0.9), Some((0.5, 0.5)));
    assert_eq!(Automation::default().value_at(0.3), None);
  }

  #[test]
  fn recent_points_are_protected_from_overdub() {
    let mut a = Automation::default();
    a.record(0.100, 0.1, 0.1, 10.0);
    a.record(0.101, 0.2, 0.2, 10.5);
    assert_eq!(a.points().len(), 2);
    a.record(0.102, 0.3, 0.3, 12.0);
    assert_eq!(a.points().len(), 1);
    assert_eq!(a.points()[0].x, 0.3);
  }

  #[test]
  fn loaded_points_without_timestamp_are_replaced() {
    let mut a = Automation::default();
    a.set_points(vec![pt(0.2, 0.9)]);
    a.record(0.201, 0.1, 0.1, 0.0);
    assert_eq!(a.points().len(), 1);
    a.record(0.5, 0.4, 0.4, 0.1);
    assert!(a.points().windows(2).all(|w| w[0].position <= w[1].position));
  }

  #[test]
  fn loop_bar_remaps_position() {
    let mut a = Automation::default();
    a.set_loop_bar(Some(3));
    let p = a.playback_position(0.0625 + 0.5);
    assert!((p - (0.375 + 0.0625)).abs() < 1e-12);
    a.set_loop_bar(Some(8));
    assert_eq!(a.loop_bar, None);
  }

  #[test]
  fn playback_pushes_only_meaningful_changes() {
    let mut a = Automation::default();
    a.set_points(vec![pt(0.0, 0.5)]);
    let clock = Clock { position: 0.3, bar: 2 };
    assert_eq!(a.tick(clock, 0.0, (0.5005, 0.5)), None);
    assert_eq!(a.tick(clock, 0.0, (0.2, 0.5)), Some((0.5, 0.5)));
  }

  #[test]
  fn from_bar_start_waits_for_the_bar_line() {
    let mut a = Automation { record_mode: RecordMode::FromBarStart, ..Automation::default() };
    a.set_recording(true, 2);
    a.tick(Clock { position: 0.3, bar: 2 }, 0.0, (0.1, 0.1));
    assert!(a.is_empty());
    a.tick(Clock { position: 0.376, bar: 3 }, 0.1, (0.1, 0.1));
    assert_eq!(a.points().len(), 1);
    assert!(a.is_recording());

    let mut b = Automation::default();
    assert_eq!(b.record_mode, RecordMode::PunchIn);
    b.set_recording(true, 2);
    b.tick(Clock { position: 0.3, bar: 2 }, 0.0, (0.1, 0.1));
    assert_eq!(b.points().len(), 1);
  }

  #[test]
  fn serializes_like_the_project_format() {
    let mut a = Automation::default();
    a.set_points(vec![pt(0.5, 0.1)]);
    let json = serde_json::to_value(&a).unwrap();
    assert_eq!(json["recordMode"], "punch-in");
    assert_eq!(json["data"][0]["position"], 0.5);
    assert!(json["data"][0].get("createdAt").is_none());
  }
}
