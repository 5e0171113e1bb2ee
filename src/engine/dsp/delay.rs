/// Fixed-capacity fractional delay line. The buffer is allocated once in `new`;
/// changing the delay time never reallocates.
#[derive(Clone, Debug)]
pub struct DelayLine {
  buf: Vec<f32>,
  wr: usize,
}

impl DelayLine {
  pub fn new(max_seconds: f32, sr: f32) -> Self {
    let len = ((max_seconds * sr).ceil().max(64.0)) as usize + 2;
    Self { buf: vec![0.0; len], wr: 0 }
  }

  pub fn with_len(len: usize) -> Self { Self { buf: vec![0.0; len.max(4)], wr: 0 } }

  #[inline]
  pub fn capacity(&self) -> usize { self.buf.len() }

  /// Longest delay (in samples) that can be read back.
  #[inline]
  pub fn max_delay(&self) -> f32 { (self.buf.len() - 2) as f32 }

  pub fn clear(&mut self) { self.buf.fill(0.0); }

  #[inline]
  fn wrap(len: usize, i: i64) -> usize { i.rem_euclid(len as i64) as usize }

  /// Read `delay` samples behind the write head (linear interpolation).
  #[inline]
  pub fn read(&self, delay: f32) -> f32 {
    let d = if delay.is_finite() { delay.clamp(1.0, self.max_delay()) } else { 1.0 };
    let idx = self.wr as f32 - d;
    let i0 = idx.floor() as i64;
    let frac = idx - i0 as f32;
    let len = self.buf.len();
    let s0 = self.buf[Self::wrap(len, i0)];
    let s1 = self.buf[Self::wrap(len, i0 + 1)];
    s0 + (s1 - s0) * frac
  }

  #[inline]
  pub fn write(&mut self, x: f32) {
    self.buf[self.wr] = if x.is_finite() { x } else { 0.0 };
    self.wr += 1;
    if self.wr >= self.buf.len() { self.wr = 0; }
  }
}

/// Feedback comb: y = x + fb * y[n - d]. `feedback` may be negative.
#[derive(Clone, Debug)]
pub struct FeedbackComb {
  line: DelayLine,
}

impl FeedbackComb {
  pub fn new(max_seconds: f32, sr: f32) -> Self { Self { line: DelayLine::new(max_seconds, sr) } }

  pub fn clear(&mut self) { self.line.clear(); }

  #[inline]
  pub fn max_delay(&self) -> f32 { self.line.max_delay() }

  #[inline]
  pub fn process(&mut self, x: f32, delay_samples: f32, feedback: f32) -> f32 {
    let fb = feedback.clamp(-0.98, 0.98);
    let delayed = self.line.read(delay_samples);
    let y = x + fb * delayed;
    self.line.write(y);
    y
  }
}
