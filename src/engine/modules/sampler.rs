use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::engine::dsp::filter::{BiquadKind, TrackedBiquad};
use crate::engine::params::{cents_to_ratio, safe, safe_clamp, SmoothedParam};

pub const BANKS: usize = 4;
pub const PADS_PER_BANK: usize = 8;
pub const TOTAL_PADS: usize = BANKS * PADS_PER_BANK;

const DECAY_FLOOR: f32 = 0.001;
const STRIP_RAMP: f32 = 0.01;
// pad filters keep running this long after the last voice on the pad stops
const STRIP_TAIL_SECONDS: f32 = 0.05;

// 4-point cubic interpolation
fn cubic_interpolate(y0: f32, y1: f32, y2: f32, y3: f32, frac: f32) -> f32 {
    let a = y3 - y2 - y0 + y1;
    let b = y0 - y1 - a;
    let c = y2 - y0;
    let d = y1;
    a * frac * frac * frac + b * frac * frac + c * frac + d
}

/// Decoded audio, interleaved, at most two channels. Immutable once shared.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub name: String,
    data: Vec<f32>,
    channels: usize,
    sample_rate: f32,
    frames: usize,
}

impl SampleBuffer {
    pub fn from_interleaved(name: impl Into<String>, data: Vec<f32>, channels: usize, sample_rate: f32) -> Self {
        let channels = channels.clamp(1, 2);
        let frames = data.len() / channels;
        Self { name: name.into(), data, channels, sample_rate: safe(sample_rate, 44_100.0).max(1.0), frames }
    }

    pub fn channels(&self) -> usize { self.channels }
    pub fn sample_rate(&self) -> f32 { self.sample_rate }
    pub fn frames(&self) -> usize { self.frames }
    pub fn is_empty(&self) -> bool { self.frames == 0 }
    pub fn duration(&self) -> f32 { self.frames as f32 / self.sample_rate }

    #[inline]
    fn at(&self, frame: usize, channel: usize) -> f32 {
        let frame = frame.min(self.frames.saturating_sub(1));
        let ch = if self.channels == 1 { 0 } else { channel };
        self.data.get(frame * self.channels + ch).copied().unwrap_or(0.0)
    }

    /// Interpolated stereo frame at a fractional position; outside the buffer is silence.
    pub fn frame_at(&self, position: f64) -> (f32, f32) {
        if self.is_empty() || position < 0.0 || position >= self.frames as f64 {
            return (0.0, 0.0);
        }
        let i = position.floor() as usize;
        let frac = (position - i as f64) as f32;
        let read = |ch: usize| {
            let y0 = self.at(i.saturating_sub(1), ch);
            let y1 = self.at(i, ch);
            let y2 = self.at(i + 1, ch);
            let y3 = self.at(i + 2, ch);
            cubic_interpolate(y0, y1, y2, y3, frac)
        };
        (read(0), read(1))
    }

    /// Scale so the loudest sample sits at 0.9, leaving very quiet material alone.
    pub fn normalize_peak(&mut self) {
        let peak = self.data.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        if peak > 0.0001 {
            let norm = 0.9 / peak;
            if norm < 1.5 {
                for s in &mut self.data {
                    *s *= norm;
                }
            }
        }
    }

    /// Decode any format symphonia can probe (wav, flac, mp3, aiff).
    pub fn decode_file(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .with_context(|| format!("probing {}", path.display()))?;
        let mut format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| anyhow!("no supported audio tracks in {}", path.display()))?;
        let track_id = track.id;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("creating decoder")?;

        let mut interleaved: Vec<f32> = Vec::new();
        let mut channels = 1usize;
        let mut sample_rate = 44_100.0f32;
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::ResetRequired) | Err(Error::IoError(_)) => break,
                Err(err) => return Err(err).context("reading packet"),
            };
            while !format.metadata().is_latest() {
                format.metadata().pop();
            }
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // a corrupt packet is skipped, the stream continues
                Err(Error::DecodeError(e)) => {
                    log::warn!("skipping undecodable packet in {}: {e}", path.display());
                    continue;
                }
                Err(err) => return Err(err).context("decoding packet"),
            };
            let spec = *decoded.spec();
            sample_rate = spec.rate as f32;
            let src_channels = spec.channels.count().max(1);
            let mut buf = DecodeBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buf.copy_interleaved_ref(decoded);
            // keep at most two channels, dropping the rest
            channels = src_channels.min(2);
            for frame in buf.samples().chunks(src_channels) {
                interleaved.extend_from_slice(&frame[..channels]);
            }
        }
        if interleaved.is_empty() {
            return Err(anyhow!("{} decoded to no audio", path.display()));
        }
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("sample").to_string();
        let mut buffer = Self::from_interleaved(name, interleaved, channels, sample_rate);
        buffer.normalize_peak();
        Ok(buffer)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    #[default]
    Forward,
    Reverse,
    PingPong,
}

/// Stored per-pad settings, edited from the UI.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SampleSettings {
    pub volume: f32,
    /// Semitones.
    pub pitch: f32,
    pub start: f32,
    pub end: f32,
    pub decay: f32,
    #[serde(rename = "loop")]
    pub looped: bool,
    pub playback_mode: PlaybackMode,
    pub lp_freq: f32,
    pub hp_freq: f32,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self { volume: 1.0, pitch: 0.0, start: 0.0, end: 1.0, decay: 1.0, looped: false, playback_mode: PlaybackMode::Forward, lp_freq: 20_000.0, hp_freq: 20.0 }
    }
}

/// Per-trigger overrides (step locks); unset fields fall back to the pad settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerOverrides {
    /// Cents, added on top of `pitch`.
    pub detune: Option<f32>,
    pub velocity: Option<f32>,
    pub volume: Option<f32>,
    pub pitch: Option<f32>,
    pub start: Option<f32>,
    pub end: Option<f32>,
    pub decay: Option<f32>,
    pub lp_freq: Option<f32>,
    pub hp_freq: Option<f32>,
    #[serde(rename = "loop")]
    pub looped: Option<bool>,
    pub playback_mode: Option<PlaybackMode>,
}

/// Fully resolved, validated parameters for one trigger.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackParams {
    pub cents: f32,
    pub velocity: f32,
    pub volume: f32,
    pub start: f32,
    pub end: f32,
    pub decay: f32,
    pub looped: bool,
    pub mode: PlaybackMode,
    pub lp_freq: f32,
    pub hp_freq: f32,
}

impl Default for PlaybackParams {
    fn default() -> Self { SampleSettings::default().resolve(&TriggerOverrides::default()) }
}

impl SampleSettings {
    pub fn resolve(&self, o: &TriggerOverrides) -> PlaybackParams {
        let pitch = safe(o.pitch.unwrap_or(self.pitch), 0.0);
        let detune = safe(o.detune.unwrap_or(0.0), 0.0);
        PlaybackParams {
            cents: pitch * 100.0 + detune,
            velocity: safe_clamp(o.velocity.unwrap_or(1.0), 1.0, 0.0, 4.0),
            volume: safe_clamp(o.volume.unwrap_or(self.volume), 1.0, 0.0, 4.0),
            start: safe_clamp(o.start.unwrap_or(self.start), 0.0, 0.0, 1.0),
            end: safe_clamp(o.end.unwrap_or(self.end), 1.0, 0.0, 1.0),
            decay: safe_clamp(o.decay.unwrap_or(self.decay), 1.0, 0.0, 1.0),
            looped: o.looped.unwrap_or(self.looped),
            mode: o.playback_mode.unwrap_or(self.playback_mode),
            lp_freq: safe_clamp(o.lp_freq.unwrap_or(self.lp_freq), 20_000.0, 20.0, 20_000.0),
            hp_freq: safe_clamp(o.hp_freq.unwrap_or(self.hp_freq), 20.0, 20.0, 20_000.0),
        }
    }
}

/// Start/end frame range for a buffer; `start >= end` plays to the end.
pub fn play_range(params: &PlaybackParams, frames: usize) -> (f64, f64) {
    let len = frames as f64;
    let s = params.start as f64 * len;
    let mut e = params.end as f64 * len;
    if s >= e {
        e = len;
    }
    (s, e)
}

#[derive(Clone, Copy)]
struct SampleVoice {
    pad: usize,
    active: bool,
    wait: u32,
    pos: f64,
    dir: f64,
    step: f64,
    start: f64,
    end: f64,
    looped: bool,
    mode: PlaybackMode,
    bounced: bool,
    gain: f32,
    decay_mul: f32,
    decay_left: u32,
    decaying: bool,
    serial: u64,
}

impl SampleVoice {
    fn idle() -> Self {
        Self {
            pad: 0,
            active: false,
            wait: 0,
            pos: 0.0,
            dir: 1.0,
            step: 1.0,
            start: 0.0,
            end: 0.0,
            looped: false,
            mode: PlaybackMode::Forward,
            bounced: false,
            gain: 0.0,
            decay_mul: 1.0,
            decay_left: 0,
            decaying: false,
            serial: 0,
        }
    }

    // Advance the read head; false once a one-shot runs off its range.
    fn advance(&mut self) -> bool {
        self.pos += self.step * self.dir;
        let (s, e) = (self.start, self.end);
        match self.mode {
            PlaybackMode::Forward if self.pos >= e => {
                if !self.looped { return false; }
                self.pos = s + (self.pos - e) % (e - s).max(1.0);
            }
            PlaybackMode::Reverse if self.pos < s => {
                if !self.looped { return false; }
                self.pos = e - 1.0 - (s - self.pos) % (e - s).max(1.0);
            }
            PlaybackMode::PingPong if self.pos >= e => {
                self.dir = -1.0;
                self.pos = (2.0 * (e - 1.0) - self.pos).max(s);
                self.bounced = true;
            }
            PlaybackMode::PingPong if self.pos < s => {
                if !self.looped && self.bounced { return false; }
                self.dir = 1.0;
                self.pos = (2.0 * s - self.pos).min(e - 1.0).max(s);
            }
            _ => {}
        }
        true
    }
}

// Per-pad channel strip: volume and filters shared by every voice on the pad.
struct PadStrip {
    volume: SmoothedParam,
    lp_hz: SmoothedParam,
    hp_hz: SmoothedParam,
    lp: [TrackedBiquad; 2],
    hp: [TrackedBiquad; 2],
    acc: (f32, f32),
    tail: u32,
    counter: u32,
}

impl PadStrip {
    fn new(sr: f32) -> Self {
        Self {
            volume: SmoothedParam::new(1.0, STRIP_RAMP, sr),
            lp_hz: SmoothedParam::new(20_000.0, STRIP_RAMP, sr),
            hp_hz: SmoothedParam::new(20.0, STRIP_RAMP, sr),
            lp: [TrackedBiquad::default(); 2],
            hp: [TrackedBiquad::default(); 2],
            acc: (0.0, 0.0),
            tail: 0,
            counter: 0,
        }
    }

    fn process(&mut self, sr: f32) -> (f32, f32) {
        let (l, r) = std::mem::take(&mut self.acc);
        let vol = self.volume.next();
        let lp = self.lp_hz.next();
        let hp = self.hp_hz.next();
        if self.counter == 0 {
            let lp = lp.min(sr * 0.45);
            let hp = hp.min(sr * 0.45);
            for f in &mut self.lp {
                f.update(BiquadKind::Lowpass, sr, lp, std::f32::consts::FRAC_1_SQRT_2, 0.0);
            }
            for f in &mut self.hp {
                f.update(BiquadKind::Highpass, sr, hp, std::f32::consts::FRAC_1_SQRT_2, 0.0);
            }
        }
        self.counter = (self.counter + 1) % 16;
        let l = self.hp[0].process(self.lp[0].process(l)) * vol;
        let r = self.hp[1].process(self.lp[1].process(r)) * vol;
        (l, r)
    }
}

#[derive(Clone, Copy)]
struct ScheduledTrigger {
    at_frame: u64,
    pad: usize,
    params: PlaybackParams,
}

/// 32 pads in 4 banks, a fixed voice pool and a fixed-capacity queue of
/// future triggers.
pub struct Sampler {
    sr: f32,
    pads: Vec<Option<Arc<SampleBuffer>>>,
    strips: Vec<PadStrip>,
    voices: Vec<SampleVoice>,
    pending: Vec<ScheduledTrigger>,
    pending_cap: usize,
    serial: u64,
    dropped: u64,
}

impl Sampler {
    pub fn new(sr: f32, voices: usize, pending_cap: usize) -> Self {
        Self {
            sr,
            pads: vec![None; TOTAL_PADS],
            strips: (0..TOTAL_PADS).map(|_| PadStrip::new(sr)).collect(),
            voices: vec![SampleVoice::idle(); voices.max(1)],
            pending: Vec::with_capacity(pending_cap.max(1)),
            pending_cap: pending_cap.max(1),
            serial: 1,
            dropped: 0,
        }
    }

    pub fn pad_index(bank: usize, pad: usize) -> Option<usize> {
        (bank < BANKS && pad < PADS_PER_BANK).then_some(bank * PADS_PER_BANK + pad)
    }

    pub fn has_sample(&self, pad: usize) -> bool { self.pads.get(pad).is_some_and(|p| p.is_some()) }

    pub fn active_voices(&self) -> usize { self.voices.iter().filter(|v| v.active).count() }

    pub fn pending_len(&self) -> usize { self.pending.len() }

    /// Triggers refused because the queue was full.
    pub fn dropped_triggers(&self) -> u64 { self.dropped }

    /// Install a buffer; voices on the pad stop and the previous buffer is returned.
    pub fn set_sample(&mut self, pad: usize, sample: Option<Arc<SampleBuffer>>) -> Option<Arc<SampleBuffer>> {
        let slot = self.pads.get_mut(pad)?;
        for v in self.voices.iter_mut().filter(|v| v.pad == pad) {
            v.active = false;
        }
        self.pending.retain(|t| t.pad != pad);
        std::mem::replace(slot, sample)
    }

    /// Queue a trigger at an absolute engine frame; a full queue drops it.
    pub fn schedule(&mut self, at_frame: u64, pad: usize, params: PlaybackParams) {
        if pad >= TOTAL_PADS { return; }
        if self.pending.len() >= self.pending_cap {
            self.dropped += 1;
            return;
        }
        self.pending.push(ScheduledTrigger { at_frame, pad, params });
    }

    /// Silence every voice and forget queued triggers.
    pub fn flush(&mut self) {
        self.pending.clear();
        for v in &mut self.voices {
            v.active = false;
        }
    }

    fn allocate(&mut self) -> usize {
        if let Some(i) = self.voices.iter().position(|v| !v.active) {
            return i;
        }
        // steal the oldest
        self.voices.iter().enumerate().min_by_key(|(_, v)| v.serial).map(|(i, _)| i).unwrap_or(0)
    }

    fn start_voice(&mut self, pad: usize, params: PlaybackParams, wait: u32) {
        let Some(buf) = self.pads[pad].as_deref() else { return };
        if buf.is_empty() { return; }
        let (start, end) = play_range(&params, buf.frames());
        let step = cents_to_ratio(params.cents) as f64 * (buf.sample_rate() / self.sr) as f64;
        let decay_len = ((params.decay * 5.0) * self.sr).max(1.0);
        let velocity = params.velocity;
        let strip = &mut self.strips[pad];
        strip.volume.set_target(params.volume);
        strip.lp_hz.set_target(params.lp_freq);
        strip.hp_hz.set_target(params.hp_freq);
        let idx = self.allocate();
        let serial = self.serial;
        self.serial += 1;
        self.voices[idx] = SampleVoice {
            pad,
            active: true,
            wait,
            pos: if params.mode == PlaybackMode::Reverse { end - 1.0 } else { start },
            dir: if params.mode == PlaybackMode::Reverse { -1.0 } else { 1.0 },
            step: if step.is_finite() && step > 0.0 { step } else { 1.0 },
            start,
            end: end.max(start + 1.0),
            looped: params.looped,
            mode: params.mode,
            bounced: false,
            gain: velocity,
            decay_mul: if velocity > DECAY_FLOOR { (DECAY_FLOOR / velocity).powf(1.0 / decay_len) } else { 1.0 },
            decay_left: decay_len as u32,
            decaying: params.decay < 1.0,
            serial,
        };
    }

    /// Start queued triggers that fall inside `[block_start, block_start + frames)`;
    /// late ones start at offset 0.
    pub fn dispatch(&mut self, block_start: u64, frames: usize) {
        let block_end = block_start + frames as u64;
        let mut i = 0;
        while i < self.pending.len() {
            let t = self.pending[i];
            if t.at_frame < block_end {
                self.pending.swap_remove(i);
                let wait = t.at_frame.saturating_sub(block_start) as u32;
                self.start_voice(t.pad, t.params, wait);
            } else {
                i += 1;
            }
        }
    }

    /// Render one frame per bank into `banks` (stereo pairs).
    pub fn render_frame(&mut self, banks: &mut [(f32, f32); BANKS]) {
        for v in self.voices.iter_mut().filter(|v| v.active) {
            if v.wait > 0 {
                v.wait -= 1;
                continue;
            }
            let Some(buf) = self.pads[v.pad].as_deref() else {
                v.active = false;
                continue;
            };
            let (l, r) = buf.frame_at(v.pos);
            let strip = &mut self.strips[v.pad];
            strip.acc.0 += l * v.gain;
            strip.acc.1 += r * v.gain;
            strip.tail = (STRIP_TAIL_SECONDS * self.sr) as u32;
            if v.decaying {
                if v.decay_left == 0 {
                    v.active = false;
                    continue;
                }
                v.gain *= v.decay_mul;
                v.decay_left -= 1;
            }
            if !v.advance() {
                v.active = false;
            }
        }
        *banks = [(0.0, 0.0); BANKS];
        for (pad, strip) in self.strips.iter_mut().enumerate() {
            if strip.tail == 0 { continue; }
            strip.tail -= 1;
            let (l, r) = strip.process(self.sr);
            let bank = &mut banks[pad / PADS_PER_BANK];
            bank.0 += l;
            bank.1 += r;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn ramp_buffer(frames: usize) -> Arc<SampleBuffer> {
        let data: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        Arc::new(SampleBuffer::from_interleaved("ramp", data, 1, SR))
    }

    fn render(s: &mut Sampler, frames: usize) -> Vec<(f32, f32)> {
        let mut out = Vec::with_capacity(frames);
        let mut banks = [(0.0, 0.0); BANKS];
        for _ in 0..frames {
            s.render_frame(&mut banks);
            out.push(banks[0]);
        }
        out
    }

    #[test]
    fn start_past_end_plays_to_the_end() {
        let p = PlaybackParams { start: 0.8, end: 0.2, ..PlaybackParams::default() };
        assert_eq!(play_range(&p, 1000), (800.0, 1000.0));
    }

    #[test]
    fn overrides_take_precedence_and_pitch_is_in_semitones() {
        let settings = SampleSettings { pitch: 2.0, ..SampleSettings::default() };
        let o = TriggerOverrides { detune: Some(-50.0), volume: Some(f32::NAN), ..TriggerOverrides::default() };
        let p = settings.resolve(&o);
        assert_eq!(p.cents, 150.0);
        assert_eq!(p.volume, 1.0);
    }

    #[test]
    fn trigger_starts_at_its_frame_offset() {
        let mut s = Sampler::new(SR, 8, 16);
        s.set_sample(0, Some(ramp_buffer(4800)));
        let p = PlaybackParams { start: 0.5, ..PlaybackParams::default() };
        s.schedule(1_000 + 40, 0, p);
        s.dispatch(1_000, 128);
        assert_eq!(s.pending_len(), 0);
        let out = render(&mut s, 128);
        assert!(out[..40].iter().all(|f| f.0 == 0.0));
        assert!(out[41].0 > 0.0);
    }

    #[test]
    fn one_shot_stops_and_reverse_runs_backwards() {
        let mut s = Sampler::new(SR, 8, 16);
        s.set_sample(0, Some(ramp_buffer(256)));
        s.schedule(0, 0, PlaybackParams { mode: PlaybackMode::Reverse, ..PlaybackParams::default() });
        s.dispatch(0, 128);
        render(&mut s, 300);
        assert_eq!(s.active_voices(), 0);
    }

    #[test]
    fn looped_voice_keeps_playing() {
        let mut s = Sampler::new(SR, 8, 16);
        s.set_sample(0, Some(ramp_buffer(256)));
        s.schedule(0, 0, PlaybackParams { looped: true, mode: PlaybackMode::PingPong, ..PlaybackParams::default() });
        s.dispatch(0, 1);
        render(&mut s, 5_000);
        assert_eq!(s.active_voices(), 1);
    }

    #[test]
    fn short_decay_ends_voice() {
        let mut s = Sampler::new(SR, 8, 16);
        s.set_sample(0, Some(ramp_buffer(48_000)));
        s.schedule(0, 0, PlaybackParams { decay: 0.01, looped: true, ..PlaybackParams::default() });
        s.dispatch(0, 1);
        render(&mut s, (0.05 * SR) as usize + 10);
        assert_eq!(s.active_voices(), 0);
    }

    #[test]
    fn pool_steals_oldest_and_queue_is_bounded() {
        let mut s = Sampler::new(SR, 2, 2);
        s.set_sample(0, Some(ramp_buffer(48_000)));
        for _ in 0..3 {
            s.schedule(0, 0, PlaybackParams::default());
        }
        assert_eq!(s.dropped_triggers(), 1);
        s.dispatch(0, 1);
        s.schedule(0, 0, PlaybackParams::default());
        s.dispatch(0, 1);
        assert_eq!(s.active_voices(), 2);
    }

    #[test]
    fn flush_silences_everything() {
        let mut s = Sampler::new(SR, 4, 8);
        s.set_sample(3, Some(ramp_buffer(48_000)));
        s.schedule(0, 3, PlaybackParams::default());
        s.schedule(10_000, 3, PlaybackParams::default());
        s.dispatch(0, 1);
        s.flush();
        assert_eq!(s.active_voices(), 0);
        assert_eq!(s.pending_len(), 0);
    }

    #[test]
    fn replacing_a_sample_returns_the_old_one() {
        let mut s = Sampler::new(SR, 4, 8);
        let first = ramp_buffer(10);
        assert!(s.set_sample(5, Some(first.clone())).is_none());
        let old = s.set_sample(5, None);
        assert!(old.is_some_and(|b| Arc::ptr_eq(&b, &first)));
        assert!(!s.has_sample(5));
        assert!(s.set_sample(99, None).is_none());
    }

    #[test]
    fn decoding_a_missing_file_is_an_error() {
        assert!(SampleBuffer::decode_file(Path::new("/definitely/not/here.wav")).is_err());
    }
}
