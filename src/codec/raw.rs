use bytes::Bytes;

use super::{Codec, Shape};
use crate::capture::keys::CompressionMode;
use crate::error::CodecError;

/// Identity codec for [`CompressionMode::None`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    fn mode(&self) -> CompressionMode {
        CompressionMode::None
    }

    fn encode(&self, raw: &[u8], shape: &Shape) -> Result<Bytes, CodecError> {
        shape.check(raw.len())?;
        Ok(Bytes::copy_from_slice(raw))
    }

    fn decode(&self, payload: &[u8], shape: &Shape) -> Result<Vec<u8>, CodecError> {
        shape.check(payload.len())?;
        Ok(payload.to_vec())
    }
}
