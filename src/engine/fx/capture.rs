/// Rolling stereo history plus a frozen loop buffer of the same capacity.
/// Both are allocated once; capturing copies out of the ring without resizing.
pub struct CaptureBuffer {
  ring_l: Vec<f32>,
  ring_r: Vec<f32>,
  wr: usize,
  loop_l: Vec<f32>,
  loop_r: Vec<f32>,
  loop_len: usize,
}

impl CaptureBuffer {
  pub fn new(seconds: f32, sr: f32) -> Self {
    let cap = ((seconds.max(0.1) * sr).ceil() as usize).max(1024);
    Self { ring_l: vec![0.0; cap], ring_r: vec![0.0; cap], wr: 0, loop_l: vec![0.0; cap], loop_r: vec![0.0; cap], loop_len: 0 }
  }

  #[inline]
  pub fn capacity(&self) -> usize { self.ring_l.len() }

  #[inline]
  pub fn loop_len(&self) -> usize { self.loop_len }

  #[inline]
  pub fn write(&mut self, l: f32, r: f32) {
    self.ring_l[self.wr] = if l.is_finite() { l } else { 0.0 };
    self.ring_r[self.wr] = if r.is_finite() { r } else { 0.0 };
    self.wr += 1;
    if self.wr == self.ring_l.len() { self.wr = 0; }
  }

  /// Freeze the most recent `len` frames (clamped to capacity) into the loop buffer.
  pub fn capture(&mut self, len: usize) {
    let cap = self.capacity();
    let len = len.clamp(1, cap);
    let start = (self.wr + cap - len) % cap;
    let first = (cap - start).min(len);
    self.loop_l[..first].copy_from_slice(&self.ring_l[start..start + first]);
    self.loop_r[..first].copy_from_slice(&self.ring_r[start..start + first]);
    let rest = len - first;
    if rest > 0 {
      self.loop_l[first..len].copy_from_slice(&self.ring_l[..rest]);
      self.loop_r[first..len].copy_from_slice(&self.ring_r[..rest]);
    }
    self.loop_len = len;
  }

  #[inline]
  pub fn frame(&self, idx: usize) -> (f32, f32) {
    if self.loop_len == 0 { return (0.0, 0.0); }
    let i = idx % self.loop_len;
    (self.loop_l[i], self.loop_r[i])
  }

  pub fn clear(&mut self) {
    self.ring_l.fill(0.0);
    self.ring_r.fill(0.0);
    self.loop_len = 0;
  }
}

/// Linear fade-in over the first `fade` frames and fade-out over the last
/// `fade` frames of a loop of `len` frames.
#[inline]
pub fn seam_gain(pos: f32, len: usize, fade: f32) -> f32 {
  let len = len as f32;
  let fade = fade.min(len * 0.5).max(1.0);
  if pos < fade {
    pos / fade
  } else if pos > len - fade {
    ((len - pos) / fade).max(0.0)
  } else {
    1.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn capture_takes_most_recent_frames_across_wrap() {
    let mut c = CaptureBuffer::new(0.1, 10_240.0);
    let cap = c.capacity();
    for i in 0..cap + 10 {
      c.write(i as f32, -(i as f32));
    }
    c.capture(20);
    assert_eq!(c.loop_len(), 20);
    assert_eq!(c.frame(0).0, (cap - 10) as f32);
    assert_eq!(c.frame(19), ((cap + 9) as f32, -((cap + 9) as f32)));
  }

  #[test]
  fn oversize_capture_is_clamped() {
    let mut c = CaptureBuffer::new(0.1, 10_240.0);
    c.capture(usize::MAX);
    assert_eq!(c.loop_len(), c.capacity());
    c.capture(0);
    assert_eq!(c.loop_len(), 1);
  }

  #[test]
  fn seams_fade_to_zero() {
    assert_eq!(seam_gain(0.0, 1000, 200.0), 0.0);
    assert_eq!(seam_gain(500.0, 1000, 200.0), 1.0);
    assert!(seam_gain(999.0, 1000, 200.0) < 0.01);
  }
}
