pub mod sampler;
pub mod synth;
pub mod synth_def;
