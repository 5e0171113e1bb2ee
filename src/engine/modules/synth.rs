use crate::engine::dsp::delay::FeedbackComb;
use crate::engine::dsp::filter::{BiquadKind, TrackedBiquad};
use crate::engine::dsp::oscillator::{Lfo, Osc};
use crate::engine::dsp::shaper::shape;
use crate::engine::modules::synth_def::{
    LfoTrigger, ModDepths, ModDest, ModSource, OscDef, SynthDefinition, Topology, MOD_DESTS, MOD_SOURCES,
};
use crate::engine::params::{cents_to_ratio, clamp01, safe, safe_clamp, SmoothedParam};

const REFERENCE_HZ: f32 = 440.0;
const PITCH_GLIDE: f32 = 0.005;
const PARAM_RAMP: f32 = 0.02;
const AMP_ATTACK: f32 = 0.001;
const FILTER_ENV_FLOOR: f32 = 0.001;
const FILTER_ENV_RELEASE: f32 = 0.01;
// filter coefficients are refreshed at control rate
const CONTROL_INTERVAL: u32 = 16;
const FORMANT_RATIOS: [f32; 3] = [1.0, 1.44, 3.63];

#[derive(Clone, Copy, Debug)]
pub struct NoteParams {
    pub velocity: f32,
    /// Mod wheel input in [0, 1]; `None` means fully up.
    pub mod_wheel: Option<f32>,
}

impl Default for NoteParams {
    fn default() -> Self { Self { velocity: 1.0, mod_wheel: None } }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum AmpStage {
    Idle,
    Attack,
    Decay,
}

/// Linear 1 ms rise to the peak, then exponential fall with a time constant of
/// `decay / 5`. Always restarts from zero.
#[derive(Clone, Debug)]
struct AmpEnvelope {
    sr: f32,
    stage: AmpStage,
    level: f32,
    peak: f32,
    attack_step: f32,
    decay_coeff: f32,
}

impl AmpEnvelope {
    fn new(sr: f32) -> Self {
        Self { sr, stage: AmpStage::Idle, level: 0.0, peak: 0.0, attack_step: 0.0, decay_coeff: 0.0 }
    }

    fn trigger(&mut self, peak: f32, decay: f32) {
        self.level = 0.0;
        self.peak = peak.max(0.0);
        self.attack_step = self.peak / (AMP_ATTACK * self.sr).max(1.0);
        let tc = (safe(decay, 0.5) / 5.0).max(0.001);
        self.decay_coeff = (-1.0 / (tc * self.sr)).exp();
        self.stage = if self.peak > 0.0 { AmpStage::Attack } else { AmpStage::Idle };
    }

    #[inline]
    fn next(&mut self) -> f32 {
        match self.stage {
            AmpStage::Idle => {}
            AmpStage::Attack => {
                self.level += self.attack_step;
                if self.level >= self.peak {
                    self.level = self.peak;
                    self.stage = AmpStage::Decay;
                }
            }
            AmpStage::Decay => {
                self.level *= self.decay_coeff;
                if self.level < 1e-5 {
                    self.level = 0.0;
                    self.stage = AmpStage::Idle;
                }
            }
        }
        self.level
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum EnvStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Linear attack to 1, exponential ramp to the sustain level over `decay`, then
/// hold. A sustain of (near) zero ends with a short linear ramp to exactly 0.
#[derive(Clone, Debug)]
struct FilterEnvelope {
    sr: f32,
    stage: EnvStage,
    level: f32,
    step: f32,
    ratio: f32,
    remaining: u32,
    decay_len: u32,
    sustain: f32,
}

impl FilterEnvelope {
    fn new(sr: f32) -> Self {
        Self { sr, stage: EnvStage::Idle, level: 0.0, step: 0.0, ratio: 1.0, remaining: 0, decay_len: 1, sustain: 0.0 }
    }

    fn trigger(&mut self, attack: f32, decay: f32, sustain: f32) {
        self.level = 0.0;
        self.sustain = clamp01(sustain);
        let attack_n = (safe(attack, 0.01).max(0.0) * self.sr).round() as u32;
        let decay_n = ((safe(decay, 0.2).max(0.0) * self.sr).round() as u32).max(1);
        let target = self.sustain.max(FILTER_ENV_FLOOR);
        self.ratio = target.powf(1.0 / decay_n as f32);
        self.decay_len = decay_n;
        if attack_n == 0 {
            self.level = 1.0;
            self.enter_decay();
        } else {
            self.stage = EnvStage::Attack;
            self.step = 1.0 / attack_n as f32;
            self.remaining = attack_n;
        }
    }

    fn enter_decay(&mut self) {
        self.stage = EnvStage::Decay;
        self.remaining = self.decay_len;
    }

    #[inline]
    fn next(&mut self) -> f32 {
        match self.stage {
            EnvStage::Idle | EnvStage::Sustain => {}
            EnvStage::Attack => {
                self.level += self.step;
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.level = 1.0;
                    self.enter_decay();
                }
            }
            EnvStage::Decay => {
                self.level *= self.ratio;
                self.remaining -= 1;
                if self.remaining == 0 {
                    if self.sustain < FILTER_ENV_FLOOR {
                        let n = ((FILTER_ENV_RELEASE * self.sr) as u32).max(1);
                        self.step = self.level / n as f32;
                        self.remaining = n;
                        self.stage = EnvStage::Release;
                    } else {
                        self.level = self.sustain;
                        self.stage = EnvStage::Sustain;
                    }
                }
            }
            EnvStage::Release => {
                self.level -= self.step;
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.level = 0.0;
                    self.stage = EnvStage::Idle;
                }
            }
        }
        self.level
    }
}

/// Monophonic synth voice: two oscillators with waveshapers and cross-FM, a
/// switchable filter stage, amp and filter envelopes, two LFOs and the mod matrix.
pub struct SynthVoice {
    sr: f32,
    def: SynthDefinition,
    bpm: f32,
    osc1: Osc,
    osc2: Osc,
    last1: f32,
    lfo1: Lfo,
    lfo2: Lfo,
    lfo_values: [f32; 2],
    pitch1: SmoothedParam,
    pitch2: SmoothedParam,
    mix: SmoothedParam,
    fm1: SmoothedParam,
    fm2: SmoothedParam,
    cutoff: SmoothedParam,
    resonance: SmoothedParam,
    master: SmoothedParam,
    wheel: SmoothedParam,
    matrix: Vec<SmoothedParam>,
    depths: ModDepths,
    muted: bool,
    note_cents: f32,
    amp_env: AmpEnvelope,
    filter_env: FilterEnvelope,
    topology: Topology,
    stages: [TrackedBiquad; 2],
    comb: FeedbackComb,
    formants: [TrackedBiquad; 3],
    control_count: u32,
    cutoff_hz: f32,
    q: f32,
}

impl SynthVoice {
    pub fn new(sr: f32) -> Self {
        let def = SynthDefinition::default();
        let matrix = (0..MOD_SOURCES * MOD_DESTS).map(|_| SmoothedParam::new(0.0, PARAM_RAMP, sr)).collect();
        let mut v = Self {
            sr,
            bpm: 120.0,
            osc1: Osc::new(sr, 11),
            osc2: Osc::new(sr, 23),
            last1: 0.0,
            lfo1: Lfo::new(sr, 37),
            lfo2: Lfo::new(sr, 41),
            lfo_values: [0.0; 2],
            pitch1: SmoothedParam::new(0.0, PITCH_GLIDE, sr),
            pitch2: SmoothedParam::new(0.0, PITCH_GLIDE, sr),
            mix: SmoothedParam::new(0.5, PARAM_RAMP, sr),
            fm1: SmoothedParam::new(0.0, PARAM_RAMP, sr),
            fm2: SmoothedParam::new(0.0, PARAM_RAMP, sr),
            cutoff: SmoothedParam::new(20_000.0, PARAM_RAMP, sr),
            resonance: SmoothedParam::new(1.0, PARAM_RAMP, sr),
            master: SmoothedParam::new(1.0, PARAM_RAMP, sr),
            wheel: SmoothedParam::new(0.0, PITCH_GLIDE, sr),
            matrix,
            depths: [[0.0; MOD_DESTS]; MOD_SOURCES],
            muted: false,
            note_cents: 0.0,
            amp_env: AmpEnvelope::new(sr),
            filter_env: FilterEnvelope::new(sr),
            topology: def.filter.kind.topology(),
            stages: [TrackedBiquad::default(); 2],
            comb: FeedbackComb::new(0.06, sr),
            formants: [TrackedBiquad::default(); 3],
            control_count: 0,
            cutoff_hz: 20_000.0,
            q: 1.0,
            def,
        };
        let def = v.def;
        v.update_from_definition(&def);
        v.snap_all();
        v
    }

    fn snap_all(&mut self) {
        for p in [&mut self.mix, &mut self.fm1, &mut self.fm2, &mut self.cutoff, &mut self.resonance, &mut self.master] {
            let t = p.target();
            p.snap(t);
        }
        let t1 = self.pitch1.target();
        self.pitch1.snap(t1);
        let t2 = self.pitch2.target();
        self.pitch2.snap(t2);
    }

    pub fn definition(&self) -> &SynthDefinition { &self.def }

    pub fn set_bpm(&mut self, bpm: f32) { self.bpm = crate::engine::clock::safe_bpm(bpm); }

    fn pitch_targets(&self) -> (f32, f32) {
        let master = safe(self.def.master_octave as f32, 0.0) * 1200.0;
        let p1 = self.def.osc1.octave as f32 * 1200.0 + safe(self.def.osc1.detune, 0.0) + master + self.note_cents;
        let p2 = self.def.osc2.octave as f32 * 1200.0 + safe(self.def.osc2.detune, 0.0) + master + self.note_cents;
        (p1, p2)
    }

    /// Apply continuous parameter changes without retriggering.
    pub fn update_from_definition(&mut self, def: &SynthDefinition) {
        self.def = *def;
        let (p1, p2) = self.pitch_targets();
        self.pitch1.set_target(p1);
        self.pitch2.set_target(p2);
        self.mix.set_target(safe_clamp(def.osc_mix, 0.5, 0.0, 1.0));
        self.fm1.set_target(safe(def.osc1.fm_depth, 0.0));
        self.fm2.set_target(safe(def.osc2.fm_depth, 0.0));
        self.cutoff.set_target(safe_clamp(def.filter.cutoff, 20_000.0, 20.0, 20_000.0));
        self.resonance.set_target(safe_clamp(def.filter.resonance, 1.0, 0.0, 40.0));
        self.master.set_target(safe_clamp(def.master_gain, 1.0, 0.0, 2.0));
        let topology = def.filter.kind.topology();
        if topology != self.topology {
            self.switch_topology(topology);
        }
    }

    // Hard cut: the paths that are not selected lose their state at once.
    fn switch_topology(&mut self, topology: Topology) {
        self.topology = topology;
        for s in &mut self.stages {
            s.filter.reset();
        }
        for f in &mut self.formants {
            f.filter.reset();
        }
        self.comb.clear();
        self.control_count = 0;
    }

    pub fn set_mod_matrix(&mut self, depths: ModDepths) {
        self.depths = depths;
        self.push_matrix_gains();
    }

    pub fn set_matrix_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.push_matrix_gains();
    }

    fn push_matrix_gains(&mut self) {
        for src in 0..MOD_SOURCES {
            for dst in 0..MOD_DESTS {
                let target = if self.muted { 0.0 } else { self.depths[src][dst] * ModDest::ALL[dst].scale() };
                self.matrix[src * MOD_DESTS + dst].set_target(target);
            }
        }
    }

    /// Target gain of one matrix stage in destination units (ignores the wheel).
    pub fn matrix_gain(&self, source: ModSource, dest: ModDest) -> f32 {
        self.matrix[source.index() * MOD_DESTS + dest.index()].target()
    }

    /// Shared mod-wheel multiplier applied to every matrix source.
    pub fn wheel_scale(&self) -> f32 { self.wheel.target() }

    /// Peak modulation amplitude currently routed from `source` into `dest`.
    pub fn mod_amplitude(&self, source: ModSource, dest: ModDest) -> f32 {
        self.wheel_scale() * self.matrix_gain(source, dest)
    }

    pub fn lfo_values(&self) -> [f32; 2] { self.lfo_values }

    pub fn is_active(&self) -> bool { self.amp_env.stage != AmpStage::Idle }

    pub fn note_on(&mut self, pitch_offset_cents: f32, params: NoteParams) {
        let def = &self.def;
        let wheel_in = safe(params.mod_wheel.unwrap_or(1.0), 1.0);
        let wheel = clamp01(wheel_in * safe(def.mod_wheel, 0.0) + safe(def.mod_wheel_offset, 0.0));
        self.wheel.set_target(wheel);
        self.note_cents = safe(pitch_offset_cents, 0.0);
        let (p1, p2) = self.pitch_targets();
        self.pitch1.set_target(p1);
        self.pitch2.set_target(p2);
        let velocity = safe_clamp(params.velocity, 1.0, 0.0, 1.0);
        self.amp_env.trigger(velocity, self.def.amp_env.decay);
        let fe = &self.def.filter_env;
        self.filter_env.trigger(fe.attack, fe.decay, fe.sustain);
        if self.def.lfo1.sync_trigger == LfoTrigger::Note {
            self.lfo1.retrigger();
        }
        if self.def.lfo2.sync_trigger == LfoTrigger::Note {
            self.lfo2.retrigger();
        }
    }

    /// Silence immediately (transport stop).
    pub fn kill(&mut self) {
        self.amp_env.stage = AmpStage::Idle;
        self.amp_env.level = 0.0;
    }

    #[inline]
    fn mod_sum(&mut self, sources: &[f32; MOD_SOURCES], dest: ModDest) -> f32 {
        let d = dest.index();
        let mut acc = 0.0;
        for (s, value) in sources.iter().enumerate() {
            acc += value * self.matrix[s * MOD_DESTS + d].next();
        }
        acc
    }

    pub fn render(&mut self) -> f32 {
        let lfo1 = self.lfo1.next(self.def.lfo1.hz(self.bpm), self.def.lfo1.shape);
        let lfo2 = self.lfo2.next(self.def.lfo2.hz(self.bpm), self.def.lfo2.shape);
        self.lfo_values = [lfo1, lfo2];
        let env = self.filter_env.next();
        let wheel = self.wheel.next();
        let sources = [lfo1 * wheel, lfo2 * wheel, env * wheel];

        let m_p1 = self.mod_sum(&sources, ModDest::Osc1Pitch);
        let m_p2 = self.mod_sum(&sources, ModDest::Osc2Pitch);
        let m_fm1 = self.mod_sum(&sources, ModDest::Osc1Fm);
        let m_fm2 = self.mod_sum(&sources, ModDest::Osc2Fm);
        let m_w1 = self.mod_sum(&sources, ModDest::Osc1Wave);
        let m_w2 = self.mod_sum(&sources, ModDest::Osc2Wave);
        let m_cut = self.mod_sum(&sources, ModDest::FilterCutoff);
        let m_q = self.mod_sum(&sources, ModDest::FilterQ);

        let pitch_env = env * safe(self.def.osc2.pitch_env_amount, 0.0);
        let f1 = REFERENCE_HZ * cents_to_ratio(self.pitch1.next() + m_p1);
        let f2 = REFERENCE_HZ * cents_to_ratio(self.pitch2.next() + m_p2 + pitch_env);
        let fm1 = self.fm1.next() + m_fm1;
        let fm2 = self.fm2.next() + m_fm2;

        let raw2 = self.osc2.next(f2 + self.last1 * fm2, self.def.osc2.shape);
        if self.def.osc1.sync && self.osc2.wrapped() {
            self.osc1.sync();
        }
        let raw1 = self.osc1.next(f1 + raw2 * fm1, self.def.osc1.shape);
        self.last1 = raw1;

        let ws_lfo1 = lfo1 * safe(self.def.osc1.ws_lfo_amount, 0.0);
        let ws_lfo2 = lfo1 * safe(self.def.osc2.ws_lfo_amount, 0.0);
        let s1 = waveshape(&self.def.osc1, raw1, 1.0 + m_w1 + ws_lfo1);
        let s2 = waveshape(&self.def.osc2, raw2, 1.0 + m_w2 + ws_lfo2);
        let mix = self.mix.next();
        let x = s1 * (1.0 - mix) + s2 * mix;

        let cutoff = self.cutoff.next();
        let res = self.resonance.next();
        if self.control_count == 0 {
            let cents = env * safe(self.def.filter.env_amount, 0.0) + m_cut;
            self.cutoff_hz = (cutoff * cents_to_ratio(cents)).clamp(20.0, self.sr * 0.45);
            self.q = (res + m_q).clamp(0.05, 40.0);
            self.update_filters();
        }
        self.control_count = (self.control_count + 1) % CONTROL_INTERVAL;

        let filtered = self.filter(x);
        let amp = self.amp_env.next() * self.master.next();
        let y = filtered * amp;
        if y.is_finite() { y } else { 0.0 }
    }

    fn update_filters(&mut self) {
        let sr = self.sr;
        match self.topology {
            Topology::Standard { kind, stages } => {
                // resonance is applied once; a cascaded second stage stays at butterworth
                self.stages[0].update(kind, sr, self.cutoff_hz, self.q.max(0.1), 0.0);
                if stages > 1 {
                    self.stages[1].update(kind, sr, self.cutoff_hz, 0.707, 0.0);
                }
            }
            Topology::Comb => {}
            Topology::Formant => {
                let q = self.q.max(1.0);
                for (f, ratio) in self.formants.iter_mut().zip(FORMANT_RATIOS) {
                    f.update(BiquadKind::Bandpass, sr, self.cutoff_hz * ratio, q, 0.0);
                }
            }
        }
    }

    #[inline]
    fn filter(&mut self, x: f32) -> f32 {
        match self.topology {
            Topology::Standard { stages, .. } => {
                let y = self.stages[0].process(x);
                if stages > 1 { self.stages[1].process(y) } else { y }
            }
            Topology::Comb => {
                let delay = self.sr / self.cutoff_hz.max(20.0);
                let r = (self.q / 20.0).clamp(0.0, 1.0);
                let fb = 0.98 * (2.0 * r - 1.0);
                self.comb.process(x, delay, fb) * (1.0 - fb.abs() * 0.5)
            }
            Topology::Formant => {
                let sum: f32 = self.formants.iter_mut().map(|f| f.process(x)).sum();
                sum * 0.75
            }
        }
    }
}

#[inline]
fn waveshape(osc: &OscDef, x: f32, input_gain: f32) -> f32 {
    let pre = x * safe(input_gain, 1.0);
    let amount = safe_clamp(osc.waveshape_amount, 0.0, 0.0, 1.0);
    if amount <= 0.0 {
        return pre;
    }
    let wet = shape(osc.waveshape_type, pre, 1.0 + amount * 15.0);
    pre + (wet - pre) * (amount * 4.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::modules::synth_def::{FilterKind, ModMatrix};

    const SR: f32 = 48_000.0;

    fn peak(voice: &mut SynthVoice, frames: usize) -> f32 {
        (0..frames).map(|_| voice.render().abs()).fold(0.0, f32::max)
    }

    #[test]
    fn mod_wheel_gates_sources_not_matrix() {
        let mut voice = SynthVoice::new(SR);
        let mut def = SynthDefinition::default();
        def.mod_wheel = 1.0;
        def.mod_wheel_offset = 0.0;
        voice.update_from_definition(&def);
        let mut matrix = ModMatrix::new();
        matrix.set(ModSource::Lfo1, ModDest::FilterCutoff, 0.5);
        voice.set_mod_matrix(matrix.dense());

        voice.note_on(0.0, NoteParams { velocity: 1.0, mod_wheel: Some(1.0) });
        assert!((voice.mod_amplitude(ModSource::Lfo1, ModDest::FilterCutoff) - 1200.0).abs() < 1e-3);

        voice.note_on(0.0, NoteParams { velocity: 1.0, mod_wheel: Some(0.0) });
        assert_eq!(voice.mod_amplitude(ModSource::Lfo1, ModDest::FilterCutoff), 0.0);
        assert!((voice.matrix_gain(ModSource::Lfo1, ModDest::FilterCutoff) - 1200.0).abs() < 1e-3);
    }

    #[test]
    fn muting_zeroes_matrix_gains_independent_of_wheel() {
        let mut voice = SynthVoice::new(SR);
        let mut matrix = ModMatrix::new();
        matrix.set(ModSource::Lfo2, ModDest::Osc1Pitch, -1.0);
        voice.set_mod_matrix(matrix.dense());
        voice.note_on(0.0, NoteParams::default());
        assert_eq!(voice.matrix_gain(ModSource::Lfo2, ModDest::Osc1Pitch), -1200.0);
        voice.set_matrix_muted(true);
        assert_eq!(voice.matrix_gain(ModSource::Lfo2, ModDest::Osc1Pitch), 0.0);
        assert_eq!(voice.wheel_scale(), 1.0);
        voice.set_matrix_muted(false);
        assert_eq!(voice.matrix_gain(ModSource::Lfo2, ModDest::Osc1Pitch), -1200.0);
    }

    #[test]
    fn note_decays_to_silence() {
        let mut voice = SynthVoice::new(SR);
        let mut def = SynthDefinition::default();
        def.amp_env.decay = 0.1;
        voice.update_from_definition(&def);
        voice.note_on(0.0, NoteParams::default());
        assert!(peak(&mut voice, 2400) > 0.05);
        for _ in 0..SR as usize {
            voice.render();
        }
        assert!(!voice.is_active());
        assert_eq!(voice.render(), 0.0);
    }

    #[test]
    fn retrigger_restarts_from_zero() {
        let mut voice = SynthVoice::new(SR);
        voice.note_on(0.0, NoteParams::default());
        for _ in 0..1000 {
            voice.render();
        }
        voice.note_on(700.0, NoteParams { velocity: 0.5, mod_wheel: None });
        assert_eq!(voice.amp_env.level, 0.0);
        voice.render();
        assert!(voice.amp_env.level > 0.0 && voice.amp_env.level < 0.5);
    }

    #[test]
    fn filter_env_with_zero_sustain_reaches_exact_zero() {
        let mut env = FilterEnvelope::new(SR);
        env.trigger(0.005, 0.05, 0.0);
        let mut last = 1.0;
        for _ in 0..(SR as usize / 5) {
            last = env.next();
        }
        assert_eq!(last, 0.0);
        assert_eq!(env.stage, EnvStage::Idle);
    }

    #[test]
    fn filter_env_holds_sustain() {
        let mut env = FilterEnvelope::new(SR);
        env.trigger(0.0, 0.01, 0.4);
        for _ in 0..2000 {
            env.next();
        }
        assert_eq!(env.next(), 0.4);
    }

    #[test]
    fn every_topology_stays_finite() {
        for kind in [FilterKind::Lowpass24, FilterKind::Highpass12, FilterKind::Comb, FilterKind::Formant, FilterKind::Notch] {
            let mut voice = SynthVoice::new(SR);
            let mut def = SynthDefinition::default();
            def.filter.kind = kind;
            def.filter.cutoff = 800.0;
            def.filter.resonance = 18.0;
            def.osc1.fm_depth = 300.0;
            def.osc1.sync = true;
            voice.update_from_definition(&def);
            voice.note_on(0.0, NoteParams::default());
            for _ in 0..4800 {
                assert!(voice.render().is_finite());
            }
        }
    }

    #[test]
    fn switching_topology_clears_the_other_paths() {
        let mut voice = SynthVoice::new(SR);
        let mut def = SynthDefinition::default();
        def.filter.kind = FilterKind::Comb;
        def.filter.resonance = 19.0;
        voice.update_from_definition(&def);
        voice.note_on(0.0, NoteParams::default());
        for _ in 0..2000 {
            voice.render();
        }
        def.filter.kind = FilterKind::Lowpass12;
        voice.update_from_definition(&def);
        assert_eq!(voice.comb.process(0.0, 100.0, 0.5), 0.0);
    }

    #[test]
    fn nan_definition_values_fall_back() {
        let mut voice = SynthVoice::new(SR);
        let mut def = SynthDefinition::default();
        def.filter.cutoff = f32::NAN;
        def.osc1.detune = f32::INFINITY;
        def.osc_mix = f32::NAN;
        voice.update_from_definition(&def);
        voice.note_on(f32::NAN, NoteParams { velocity: f32::NAN, mod_wheel: Some(f32::NAN) });
        for _ in 0..2000 {
            assert!(voice.render().is_finite());
        }
    }
}
