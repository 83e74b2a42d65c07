use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::trace;

use super::{Codec, Shape};
use crate::capture::keys::CompressionMode;
use crate::error::CodecError;

/// JPEG codec for 8-bit color and body-id images.
///
/// Alpha is dropped on encode and restored opaque on decode.
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Codec for JpegCodec {
    fn mode(&self) -> CompressionMode {
        CompressionMode::Jpeg
    }

    fn encode(&self, raw: &[u8], shape: &Shape) -> Result<Bytes, CodecError> {
        shape.check(raw.len())?;
        if shape.sample_size != 1 {
            return Err(CodecError::Channels(shape.channels));
        }

        let (pixels, color_type) = match shape.channels {
            4 => {
                let mut rgb = Vec::with_capacity(raw.len() / 4 * 3);
                for px in raw.chunks_exact(4) {
                    rgb.extend_from_slice(&px[..3]);
                }
                (rgb, ExtendedColorType::Rgb8)
            }
            3 => (raw.to_vec(), ExtendedColorType::Rgb8),
            1 => (raw.to_vec(), ExtendedColorType::L8),
            n => return Err(CodecError::Channels(n)),
        };

        let mut out = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
            let (Ok(width), Ok(height)) = (u32::try_from(shape.width), u32::try_from(shape.height)) else {
                return Err(CodecError::ShapeMismatch {
                    expected: u32::MAX as usize,
                    actual: shape.width.max(shape.height),
                });
            };
            encoder.encode(&pixels, width, height, color_type)?;
        }
        trace!(raw = raw.len(), encoded = out.len(), "JPEG encoded");
        Ok(Bytes::from(out))
    }

    fn decode(&self, payload: &[u8], shape: &Shape) -> Result<Vec<u8>, CodecError> {
        let mut decoder = zune_jpeg::JpegDecoder::new(payload);
        let pixels = decoder
            .decode()
            .map_err(|e| CodecError::JpegDecode(format!("{e:?}")))?;

        let count = shape.pixels().unwrap_or(0);
        if count == 0 || pixels.len() % count != 0 {
            return Err(CodecError::ShapeMismatch {
                expected: shape.byte_len().unwrap_or(usize::MAX),
                actual: pixels.len(),
            });
        }
        let src = pixels.len() / count;
        let out = convert_channels(&pixels, src, shape.channels)?;
        shape.check(out.len())?;
        Ok(out)
    }
}

fn convert_channels(pixels: &[u8], src: usize, dst: usize) -> Result<Vec<u8>, CodecError> {
    if src == dst {
        return Ok(pixels.to_vec());
    }
    if !matches!(src, 1 | 3 | 4) {
        return Err(CodecError::Channels(src));
    }

    let mut out = Vec::with_capacity(pixels.len() / src * dst);
    for px in pixels.chunks_exact(src) {
        match (src, dst) {
            (1, 3) => out.extend_from_slice(&[px[0], px[0], px[0]]),
            (1, 4) => out.extend_from_slice(&[px[0], px[0], px[0], 255]),
            (3, 4) => out.extend_from_slice(&[px[0], px[1], px[2], 255]),
            (4, 3) => out.extend_from_slice(&px[..3]),
            (_, 1) => out.push(px[0]),
            (_, n) => return Err(CodecError::Channels(n)),
        }
    }
    Ok(out)
}
