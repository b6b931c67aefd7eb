//! Configuration module.
//!
//! Provides [`PipelineConfig`] (the value object injected into every stage),
//! one sub-config per stage, [`AppPaths`] for the platform config directory,
//! and TOML persistence via `PipelineConfig::load_from` / `save_to`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AudioConfig, BatchConfig, DenoiseConfig, FeatureConfig, GateConfig, PipelineConfig,
    TrimConfig,
};
