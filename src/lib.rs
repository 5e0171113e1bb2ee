pub mod engine {
  pub mod analysis;
  pub mod audio;
  pub mod automation;
  pub mod clock;
  pub mod config;
  pub mod dsp;
  pub mod error;
  pub mod fx;
  pub mod graph;
  pub mod messages;
  pub mod mixer;
  pub mod modules;
  pub mod params;
  pub mod recorder;
  pub mod state;
}
pub mod commands;
pub mod project;

pub use commands::Controller;
pub use engine::clock::Clock;
pub use engine::config::EngineConfig;
pub use engine::error::{EngineError, EngineResult};
pub use project::ProjectBlob;

/// Install the logger: our own targets at Info, chatty decoder internals at
/// Warn. `RUST_LOG` overrides both. Safe to call more than once.
pub fn init_logging() {
  let _ = env_logger::Builder::new()
    .filter_level(log::LevelFilter::Info)
    // Reduce noisy library INFO logs while keeping ours visible.
    .filter_module("symphonia_core::probe", log::LevelFilter::Warn)
    .filter_module("symphonia_core", log::LevelFilter::Warn)
    .parse_default_env()
    .try_init();
}
