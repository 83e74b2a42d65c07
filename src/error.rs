//! Error types for the volumetric video container

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::capture::keys::{CompressionMode, DataKey, ImageKey, VolumeKey};
use crate::capture::mode::CaptureMode;

/// Errors raised while reading a single frame from a byte stream
#[derive(Error, Debug)]
pub enum FrameError {
    /// Fewer bytes were available than a declared field or length
    #[error("truncated frame: {field} needs {expected} bytes, got {actual}")]
    Truncated {
        field: &'static str,
        expected: u64,
        actual: u64,
    },

    /// A legacy layout declared a negative size
    #[error("invalid length {value} for {field}")]
    InvalidLength { field: &'static str, value: i64 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errors surfaced by the codec boundary
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("no codec registered for compression mode {0:?}")]
    Unsupported(CompressionMode),

    #[error("payload does not match expected shape: expected {expected} bytes, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("unsupported channel count {0} for this codec")]
    Channels(usize),

    #[error("jpeg encode failed: {0}")]
    JpegEncode(#[from] image::ImageError),

    #[error("jpeg decode failed: {0}")]
    JpegDecode(String),
}

/// Errors raised while turning a compressed frame into a display frame
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image channel {key:?} failed to decode: {source}")]
    Image {
        key: ImageKey,
        #[source]
        source: CodecError,
    },

    #[error("volume channel {key:?} failed to decode: {source}")]
    Volume {
        key: VolumeKey,
        #[source]
        source: CodecError,
    },

    #[error("data channel {key:?} failed to decode: {source}")]
    Data {
        key: DataKey,
        #[source]
        source: CodecError,
    },

    #[error("{key:?} decoded to {actual} vertices, frame declares {expected}")]
    VertexCountMismatch {
        key: VolumeKey,
        expected: usize,
        actual: usize,
    },

    #[error("data channel {key:?} has {actual} bytes, expected {expected}")]
    DataSize {
        key: DataKey,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised by voxel grid construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("voxel size must be strictly positive, got {0}")]
    InvalidVoxelSize(f32),
}

/// Errors raised by the multi-device video container
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("empty path")]
    EmptyPath,

    #[error("no frames available to save")]
    NoFrames,

    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported video format tag {0}")]
    InvalidFormat(i8),

    #[error("corrupt video header: {0}")]
    CorruptHeader(#[source] FrameError),

    #[error("{0} devices do not fit the container header")]
    TooManyDevices(usize),

    #[error("{0} frames do not fit the container header")]
    TooManyFrames(usize),

    #[error("corrupt frame {frame} of device {device}: {source}")]
    CorruptFrame {
        device: usize,
        frame: usize,
        #[source]
        source: FrameError,
    },

    #[error("device {device} out of range ({count} devices)")]
    DeviceOutOfRange { device: usize, count: usize },

    #[error("frame {index} not found ({len} frames)")]
    FrameNotFound { index: usize, len: usize },

    #[error("capture modes differ across frames: {expected:?} and {found:?}")]
    ModeMismatch {
        expected: CaptureMode,
        found: CaptureMode,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Grid(#[from] GridError),
}

impl VideoError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VideoError::Io {
            path: path.into(),
            source,
        }
    }

    /// Attaches `path` to an I/O error raised by a path-less stream operation.
    pub(crate) fn with_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            VideoError::Io { source, .. } => VideoError::io(path, source),
            other => other,
        }
    }
}

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
