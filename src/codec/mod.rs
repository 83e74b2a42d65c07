//! Pluggable payload codecs keyed by [`CompressionMode`].
//!
//! Frames only persist the compression tag. Readers dispatch the payload to
//! whichever codec is registered for that tag.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::capture::keys::CompressionMode;
use crate::error::CodecError;

#[cfg(feature = "fast-jpeg")]
pub mod jpeg;
pub mod raw;

#[cfg(feature = "fast-jpeg")]
pub use jpeg::JpegCodec;
pub use raw::RawCodec;

/// Shape of a raw (uncompressed) buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    /// Bytes per channel sample
    pub sample_size: usize,
}

impl Shape {
    pub fn image(width: usize, height: usize, channels: usize, sample_size: usize) -> Self {
        Self {
            width,
            height,
            channels,
            sample_size,
        }
    }

    /// Flat buffer of `len` bytes
    pub fn linear(len: usize) -> Self {
        Self::image(len, 1, 1, 1)
    }

    /// Size in bytes, `None` when it does not fit in `usize`.
    pub fn byte_len(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.channels)?
            .checked_mul(self.sample_size)
    }

    /// Pixel count, `None` on overflow.
    pub fn pixels(&self) -> Option<usize> {
        self.width.checked_mul(self.height)
    }

    pub(crate) fn check(&self, actual: usize) -> Result<(), CodecError> {
        match self.byte_len() {
            Some(expected) if expected == actual => Ok(()),
            expected => Err(CodecError::ShapeMismatch {
                expected: expected.unwrap_or(usize::MAX),
                actual,
            }),
        }
    }
}

/// Encoder/decoder for one compression mode
pub trait Codec: Send + Sync {
    fn mode(&self) -> CompressionMode;

    fn encode(&self, raw: &[u8], shape: &Shape) -> Result<Bytes, CodecError>;

    fn decode(&self, payload: &[u8], shape: &Shape) -> Result<Vec<u8>, CodecError>;
}

/// Set of codecs available to a process
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<CompressionMode, Arc<dyn Codec>>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut modes: Vec<_> = self.codecs.keys().collect();
        modes.sort();
        f.debug_struct("CodecRegistry").field("modes", &modes).finish()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the codecs compiled into this build.
    #[allow(unused_variables)]
    pub fn with_builtin(jpeg_quality: u8) -> Self {
        let mut registry = Self::new();
        registry.register(RawCodec);
        #[cfg(feature = "fast-jpeg")]
        registry.register(JpegCodec::new(jpeg_quality));
        registry
    }

    /// Registers `codec`, replacing any codec for the same mode.
    pub fn register<C: Codec + 'static>(&mut self, codec: C) {
        debug!(mode = ?codec.mode(), "Registered codec");
        self.codecs.insert(codec.mode(), Arc::new(codec));
    }

    pub fn supports(&self, mode: CompressionMode) -> bool {
        self.codecs.contains_key(&mode)
    }

    /// Encodes with `hint`, falling back to no compression when no codec is
    /// registered for it. Returns the mode actually used.
    pub fn encode(
        &self,
        raw: &[u8],
        hint: CompressionMode,
        shape: &Shape,
    ) -> Result<(CompressionMode, Bytes), CodecError> {
        match self.codecs.get(&hint) {
            Some(codec) => Ok((hint, codec.encode(raw, shape)?)),
            None => {
                debug!(?hint, "No codec for hint, storing raw");
                shape.check(raw.len())?;
                Ok((CompressionMode::None, Bytes::copy_from_slice(raw)))
            }
        }
    }

    pub fn decode(
        &self,
        mode: CompressionMode,
        payload: &[u8],
        shape: &Shape,
    ) -> Result<Vec<u8>, CodecError> {
        let codec = self
            .codecs
            .get(&mode)
            .ok_or(CodecError::Unsupported(mode))?;
        codec.decode(payload, shape)
    }
}
