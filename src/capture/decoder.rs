use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::decoded::{AudioSample, DecodedFrame, Image, ImuSample};
use super::frame::CompressedFrame;
use super::keys::{CompressionMode, DataKey, ImageKey, InfoKey, VolumeKey};
use super::legacy::{AUDIO_CHANNELS, IMU_SAMPLE_SIZE};
use crate::codec::{CodecRegistry, Shape};
use crate::error::{CodecError, DecodeError};
use crate::geometry::ColorCloud;

const AUDIO_SAMPLE_SIZE: usize = AUDIO_CHANNELS * 4;

/// Cloud keys by preference when a frame carries several
const CLOUD_KEYS: [VolumeKey; 3] = [
    VolumeKey::ColoredCloud,
    VolumeKey::CloudXyz16Rgb8,
    VolumeKey::CloudXyz,
];

/// Channels to produce when decoding a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeSettings {
    pub color: bool,
    pub depth_sized_color: bool,
    pub bodies_id_map: bool,
    pub depth: bool,
    pub infra: bool,
    pub cloud: bool,
    pub imu: bool,
    pub audio: bool,
    pub calibration: bool,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            color: true,
            depth_sized_color: true,
            bodies_id_map: true,
            depth: true,
            infra: true,
            cloud: true,
            imu: true,
            audio: true,
            calibration: true,
        }
    }
}

impl DecodeSettings {
    /// Only the point cloud
    pub fn cloud_only() -> Self {
        Self {
            color: false,
            depth_sized_color: false,
            bodies_id_map: false,
            depth: false,
            infra: false,
            cloud: true,
            imu: false,
            audio: false,
            calibration: false,
        }
    }
}

/// Turns a compressed frame into a display frame
pub trait FrameDecoder: Send {
    fn decode(
        &mut self,
        settings: &DecodeSettings,
        frame: &CompressedFrame,
    ) -> Result<DecodedFrame, DecodeError>;
}

/// Decoder dispatching every channel through a [`CodecRegistry`]
#[derive(Debug, Clone)]
pub struct CodecFrameDecoder {
    codecs: Arc<CodecRegistry>,
}

impl CodecFrameDecoder {
    pub fn new(codecs: Arc<CodecRegistry>) -> Self {
        Self { codecs }
    }

    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    fn image_raw(
        &self,
        frame: &CompressedFrame,
        key: ImageKey,
    ) -> Result<Option<(usize, usize, usize, Vec<u8>)>, DecodeError> {
        let (Some(value), Some((channels, sample_size))) = (frame.image(key), key.raw_layout())
        else {
            return Ok(None);
        };
        if value.payload.is_empty() {
            return Ok(None);
        }
        let (Ok(width), Ok(height)) = (usize::try_from(value.width), usize::try_from(value.height)) else {
            return Err(DecodeError::Image {
                key,
                source: CodecError::ShapeMismatch {
                    expected: usize::MAX,
                    actual: value.payload.len(),
                },
            });
        };
        let shape = Shape::image(width, height, channels, sample_size);
        let raw = self
            .codecs
            .decode(value.compression, &value.payload, &shape)
            .map_err(|source| DecodeError::Image { key, source })?;
        Ok(Some((width, height, channels, raw)))
    }

    fn image_u8(&self, frame: &CompressedFrame, key: ImageKey) -> Result<Option<Image<u8>>, DecodeError> {
        Ok(self
            .image_raw(frame, key)?
            .map(|(width, height, channels, pixels)| Image {
                width,
                height,
                channels,
                pixels,
            }))
    }

    fn image_u16(&self, frame: &CompressedFrame, key: ImageKey) -> Result<Option<Image<u16>>, DecodeError> {
        Ok(self
            .image_raw(frame, key)?
            .map(|(width, height, channels, raw)| Image {
                width,
                height,
                channels,
                pixels: raw
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]))
                    .collect(),
            }))
    }

    fn cloud(&self, frame: &CompressedFrame) -> Result<ColorCloud, DecodeError> {
        let Some((key, value)) = CLOUD_KEYS
            .iter()
            .find_map(|k| frame.volume(*k).map(|v| (*k, v)))
            .filter(|(_, v)| !v.payload.is_empty())
        else {
            return Ok(ColorCloud::default());
        };

        let Some(stride) = key.point_stride() else {
            return Ok(ColorCloud::default());
        };
        let expected = frame.valid_vertex_count;
        let mismatch = |actual: usize| DecodeError::VertexCountMismatch {
            key,
            expected,
            actual,
        };

        let shape = Shape::image(expected, 1, 1, stride);
        let raw = match self.codecs.decode(value.compression, &value.payload, &shape) {
            Ok(raw) => raw,
            Err(CodecError::ShapeMismatch { actual, .. }) => return Err(mismatch(actual / stride)),
            Err(source) => return Err(DecodeError::Volume { key, source }),
        };

        let cloud = ColorCloud::from_raw(key, &raw).ok_or_else(|| mismatch(raw.len() / stride))?;
        if cloud.len() != expected {
            return Err(mismatch(cloud.len()));
        }
        Ok(cloud)
    }

    fn data(&self, frame: &CompressedFrame, key: DataKey, expected: Option<usize>) -> Result<Option<Bytes>, DecodeError> {
        let Some(value) = frame.data(key) else {
            return Ok(None);
        };
        if value.payload.is_empty() {
            return Ok(None);
        }
        if value.compression == CompressionMode::None {
            return Ok(Some(value.payload.clone()));
        }
        let len = expected.unwrap_or(value.payload.len());
        let raw = self
            .codecs
            .decode(value.compression, &value.payload, &Shape::linear(len))
            .map_err(|source| DecodeError::Data { key, source })?;
        Ok(Some(Bytes::from(raw)))
    }
}

impl FrameDecoder for CodecFrameDecoder {
    #[instrument(
        level = "trace",
        skip_all,
        fields(device = frame.info.device_id, capture = frame.info.capture_id)
    )]
    fn decode(
        &mut self,
        settings: &DecodeSettings,
        frame: &CompressedFrame,
    ) -> Result<DecodedFrame, DecodeError> {
        let mut out = DecodedFrame::new(frame.info, frame.mode);

        if settings.color {
            out.color = self.image_u8(frame, ImageKey::OriginalColorRgba8)?;
        }
        if settings.depth_sized_color {
            out.depth_sized_color = self.image_u8(frame, ImageKey::DepthSizedColorRgba8)?;
        }
        if settings.bodies_id_map {
            out.bodies_id_map = self.image_u8(frame, ImageKey::BodiesIdMap8)?;
        }
        if settings.depth {
            out.depth = self.image_u16(frame, ImageKey::Depth16)?;
        }
        if settings.infra {
            out.infra = self.image_u16(frame, ImageKey::Infrared16)?;
        }
        if settings.cloud {
            out.cloud = self.cloud(frame)?;
        }

        if settings.imu {
            if let Some(raw) = self.data(frame, DataKey::Imu, Some(IMU_SAMPLE_SIZE))? {
                out.imu = Some(ImuSample::parse(&raw).ok_or(DecodeError::DataSize {
                    key: DataKey::Imu,
                    expected: IMU_SAMPLE_SIZE,
                    actual: raw.len(),
                })?);
            }
        }

        if settings.audio {
            let expected = frame
                .info_value(InfoKey::AudioSamplesCount)
                .and_then(|n| usize::try_from(n).ok())
                .map(|n| n * AUDIO_SAMPLE_SIZE);
            if let Some(raw) = self.data(frame, DataKey::Audio, expected)? {
                out.audio = parse_audio(&raw)?;
            }
        }

        if settings.calibration {
            out.calibration = self.data(frame, DataKey::Calibration, None)?;
        }

        Ok(out)
    }
}

fn parse_audio(raw: &[u8]) -> Result<Vec<AudioSample>, DecodeError> {
    if raw.len() % AUDIO_SAMPLE_SIZE != 0 {
        return Err(DecodeError::DataSize {
            key: DataKey::Audio,
            expected: raw.len() / AUDIO_SAMPLE_SIZE * AUDIO_SAMPLE_SIZE,
            actual: raw.len(),
        });
    }
    Ok(raw
        .chunks_exact(AUDIO_SAMPLE_SIZE)
        .map(|sample| {
            let mut channels = [0f32; AUDIO_CHANNELS];
            for (c, b) in channels.iter_mut().zip(sample.chunks_exact(4)) {
                *c = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            }
            channels
        })
        .collect())
}
