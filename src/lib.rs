pub mod capture;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod server;
pub mod utils;

use std::path::Path;

use arc_swap::ArcSwap;
use color_eyre::Result;
use serde::{Deserialize, Serialize};

pub use error::{EngineError, PipelineError, SampleError};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// Prefix for environment overrides, e.g. `CAMDETECT__CAMERA__WIDTH=640`.
pub const ENV_PREFIX: &str = "CAMDETECT";

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    pub model: ModelConfig,
    pub memory: MemoryConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraSource {
    V4l2,
    Synthetic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub source: CameraSource,
    /// V4L2 device path; empty means auto-detect
    pub device: String,
    pub width: u32,
    pub height: u32,
    /// Encoder quality for the synthetic source, 1-100
    pub jpeg_quality: u8,
    /// Frame buffers the peripheral may have checked out at once
    pub fb_count: u32,
}

/// Input geometry and labels for the bundled engine. A compiled-in model
/// declares its own resolution instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub width: u32,
    pub height: u32,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Budget for the small internal heap (inference buffer)
    pub internal_heap_bytes: usize,
    /// Budget for the large external pool (decoded raster)
    pub external_pool_bytes: usize,
    pub integrity_checks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub retry_delay_ms: u64,
    pub restart_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Payloads buffered per subscriber before it starts skipping
    pub broadcast_capacity: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSource::V4l2,
            device: String::new(),
            width: 320, // QVGA
            height: 240,
            jpeg_quality: 80,
            fb_count: 1,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            width: 96,
            height: 96,
            labels: Vec::new(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            internal_heap_bytes: 160 * 1024,
            external_pool_bytes: 4 * 1024 * 1024,
            integrity_checks: false,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 100,
            restart_delay_ms: 1000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".into(),
            broadcast_capacity: 4,
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then `CAMDETECT__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        Ok(builder.build()?.try_deserialize()?)
    }
}
