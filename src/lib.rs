pub mod capture;
pub mod codec;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod utils;
pub mod video;

use std::path::Path;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

pub use capture::{CaptureMode, CompressedFrame, CompressionMode, DecodeSettings, DecodedFrame, FrameInfo};
pub use codec::CodecRegistry;
pub use error::{CodecError, ConfigError, DecodeError, FrameError, GridError, VideoError};
pub use geometry::{ColorCloud, ColorVoxelGrid};
pub use pipeline::FrameProcessor;
pub use video::{DeviceFrameBuffer, VolumetricVideo};

/// Global configuration that can be atomically swapped at runtime
pub static CONFIG: once_cell::sync::Lazy<ArcSwap<Config>> =
    once_cell::sync::Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub video: VideoConfig,
    pub codec: CodecConfig,
    pub fusion: FusionConfig,
    pub processor: ProcessorConfig,
    pub decode: DecodeSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Container file extension, without the dot
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub jpeg_quality: u8,
    /// Compression requested for fused clouds. Falls back to none when the
    /// codec is not registered.
    pub cloud_compression: CompressionMode,
}

/// Voxel grid bounds used when fusing devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub voxel_size: f32,
    /// Minimum corner of the fused region
    pub origin: [f32; 3],
    /// Size of the fused region
    pub extent: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Sleep between decode loop iterations
    pub idle_sleep_ms: u64,
    /// CPU core to pin the decode thread to
    pub core_id: Option<usize>,
    /// Decode times kept for the rolling average
    pub timing_window: usize,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            extension: "kvid".into(),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            cloud_compression: CompressionMode::FastPFor,
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            voxel_size: 0.0025,
            origin: [-2.0, -2.0, -2.0],
            extent: [4.0, 4.0, 4.0],
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            idle_sleep_ms: 1,
            core_id: None,
            timing_window: 60,
        }
    }
}

impl Config {
    /// Layers `path` (TOML or JSON, optional) and `KVID__SECTION__KEY`
    /// environment variables over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("KVID")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn codecs(&self) -> CodecRegistry {
        CodecRegistry::with_builtin(self.codec.jpeg_quality)
    }
}
