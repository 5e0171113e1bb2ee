use super::params::ReverbParams;
use crate::engine::dsp::delay::DelayLine;
use crate::engine::dsp::filter::{Biquad, BiquadKind, OnePoleLP};
use crate::engine::params::SmoothedParam;

const COMB_TIMES: [f32; 6] = [0.0297, 0.0371, 0.0411, 0.0437, 0.0487, 0.0571];
const COMB_OUT: f32 = 0.2;
const ALLPASS_FREQS: [f32; 2] = [1050.0, 340.0];
const STEREO_SPREAD: f32 = 23.0;
const UPDATE_INTERVAL: u32 = 32;

#[inline]
pub fn comb_feedback(size: f32) -> f32 { 0.5 + size * 0.4 }

#[inline]
pub fn damping_cutoff(damping: f32) -> f32 { 100.0 + damping * damping * 8000.0 }

#[inline]
pub fn pre_delay_seconds(modulation: f32) -> f32 { 0.01 + modulation * 0.005 }

// Lowpass inside the feedback loop; the tap is taken after the delay.
struct DampedComb {
  line: DelayLine,
  delay: f32,
  lp: OnePoleLP,
}

impl DampedComb {
  fn new(seconds: f32, sr: f32) -> Self {
    Self { line: DelayLine::new(0.1, sr), delay: seconds * sr, lp: OnePoleLP::new() }
  }

  #[inline]
  fn process(&mut self, x: f32, feedback: f32) -> f32 {
    let d = self.line.read(self.delay);
    let v = self.lp.tick(x + feedback * d);
    self.line.write(v);
    d
  }
}

struct Channel {
  pre: DelayLine,
  combs: Vec<DampedComb>,
  allpasses: [Biquad; 2],
}

impl Channel {
  fn new(sr: f32, spread: f32) -> Self {
    let combs = COMB_TIMES.iter().map(|t| DampedComb::new(t + spread / sr, sr)).collect();
    let mut allpasses = [Biquad::new(), Biquad::new()];
    for (ap, f) in allpasses.iter_mut().zip(ALLPASS_FREQS) {
      ap.set(BiquadKind::Allpass, sr, f, 1.0, 0.0);
    }
    Self { pre: DelayLine::new(0.1, sr), combs, allpasses }
  }

  #[inline]
  fn process(&mut self, x: f32, pre_delay: f32, feedback: f32) -> f32 {
    self.pre.write(x);
    let input = self.pre.read(pre_delay);
    let mut acc = 0.0;
    for c in &mut self.combs {
      acc += c.process(input, feedback);
    }
    let y = acc * COMB_OUT;
    let y = self.allpasses[0].process(y);
    self.allpasses[1].process(y)
  }
}

/// Six parallel damped combs into two allpass stages, per channel.
pub struct Reverb {
  sr: f32,
  left: Channel,
  right: Channel,
  feedback: SmoothedParam,
  cutoff: SmoothedParam,
  pre_delay: SmoothedParam,
  counter: u32,
}

impl Reverb {
  pub fn new(sr: f32) -> Self {
    let d = ReverbParams::default();
    Self {
      sr,
      left: Channel::new(sr, 0.0),
      right: Channel::new(sr, STEREO_SPREAD),
      feedback: SmoothedParam::new(comb_feedback(d.size), 0.05, sr),
      cutoff: SmoothedParam::new(damping_cutoff(d.damping), 0.05, sr),
      pre_delay: SmoothedParam::new(pre_delay_seconds(d.modulation) * sr, 0.1, sr),
      counter: 0,
    }
  }

  pub fn set_params(&mut self, p: &ReverbParams) {
    self.feedback.set_target(comb_feedback(p.size));
    self.cutoff.set_target(damping_cutoff(p.damping));
    self.pre_delay.set_target(pre_delay_seconds(p.modulation) * self.sr);
  }

  pub fn process(&mut self, l: &mut [f32], r: &mut [f32]) {
    for n in 0..l.len().min(r.len()) {
      let fb = self.feedback.next();
      let cutoff = self.cutoff.next();
      let pre = self.pre_delay.next();
      if self.counter == 0 {
        for c in self.left.combs.iter_mut().chain(self.right.combs.iter_mut()) {
          c.lp.set_cutoff(cutoff, self.sr);
        }
      }
      self.counter = (self.counter + 1) % UPDATE_INTERVAL;
      l[n] = self.left.process(l[n], pre, fb);
      r[n] = self.right.process(r[n], pre, fb);
    }
  }
}
