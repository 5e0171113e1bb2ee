pub mod delay;
pub mod filter;
pub mod oscillator;
pub mod shaper;
