//! Readers for the two fixed-field frame layouts that predate tagged buffers.
//!
//! Legacy frames are resolved into [`CompressedFrame`] at load time and are
//! never written back out.

use std::io::Read;

use bytes::{BufMut, Bytes, BytesMut};

use super::frame::{CompressedFrame, FrameInfo};
use super::keys::{CompressionMode, DataKey, ImageKey, InfoKey, VolumeKey};
use super::mode::CaptureMode;
use super::wire::WireReader;
use crate::error::FrameError;

/// Size of a serialized `k4a_calibration_t`
pub const K4A_CALIBRATION_SIZE: usize = 1032;
/// Size of a serialized IMU sample
pub const IMU_SAMPLE_SIZE: usize = 48;
/// Channels per audio sample
pub const AUDIO_CHANNELS: usize = 7;

/// Frame layout selected by the container version tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameLayout {
    /// Version 0, color + depth + infrared images
    LegacyFull,
    /// Version 1, compressed cloud + depth-sized colors
    LegacyCloud,
    /// Version 2
    Current,
}

impl FrameLayout {
    pub(crate) fn from_version(version: i8) -> Option<Self> {
        match version {
            0 => Some(FrameLayout::LegacyFull),
            1 => Some(FrameLayout::LegacyCloud),
            2 => Some(FrameLayout::Current),
            _ => None,
        }
    }

    pub(crate) fn is_legacy(self) -> bool {
        self != FrameLayout::Current
    }

    pub(crate) fn read<R: Read>(self, r: &mut WireReader<R>) -> Result<RecordedFrame, FrameError> {
        match self {
            FrameLayout::LegacyFull => LegacyFullFrame::read(r).map(RecordedFrame::LegacyFull),
            FrameLayout::LegacyCloud => LegacyCloudFrame::read(r).map(RecordedFrame::LegacyCloud),
            FrameLayout::Current => CompressedFrame::read_wire(r).map(RecordedFrame::Current),
        }
    }
}

/// A frame as found on disk, before resolution
#[derive(Debug, Clone)]
pub(crate) enum RecordedFrame {
    Current(CompressedFrame),
    LegacyFull(LegacyFullFrame),
    LegacyCloud(LegacyCloudFrame),
}

impl RecordedFrame {
    /// Resolves into the canonical in-memory frame for `device_id`.
    pub(crate) fn resolve(self, device_id: u32) -> CompressedFrame {
        match self {
            RecordedFrame::Current(frame) => frame,
            RecordedFrame::LegacyFull(frame) => frame.into_compressed(device_id),
            RecordedFrame::LegacyCloud(frame) => frame.into_compressed(device_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LegacyImage {
    pub width: i16,
    pub height: i16,
    pub bytes: Bytes,
}

impl LegacyImage {
    fn read<R: Read>(r: &mut WireReader<R>, field: &'static str) -> Result<Self, FrameError> {
        let width = r.read_i16(field)?;
        let height = r.read_i16(field)?;
        let bytes = r.read_sized_i32(field)?;
        Ok(Self {
            width,
            height,
            bytes,
        })
    }

    fn insert_into(
        self,
        frame: &mut CompressedFrame,
        key: ImageKey,
        compression: CompressionMode,
    ) {
        frame.insert_image(
            key,
            compression,
            u64::try_from(self.width).unwrap_or(0),
            u64::try_from(self.height).unwrap_or(0),
            self.bytes,
        );
    }
}

/// Version 0 frame
#[derive(Debug, Clone)]
pub(crate) struct LegacyFullFrame {
    pub frame_id: i32,
    pub after_capture_ts: i64,
    pub mode: i8,
    pub calibration: Bytes,
    pub valid_vertex_count: i32,
    pub color: LegacyImage,
    pub depth: LegacyImage,
    pub infra: LegacyImage,
    pub audio_count: usize,
    pub audio: Bytes,
    pub imu: Bytes,
}

impl LegacyFullFrame {
    fn read<R: Read>(r: &mut WireReader<R>) -> Result<Self, FrameError> {
        let frame_id = r.read_i32("frame_id")?;
        // device clock, superseded by after_capture_ts
        r.skip(8, "timestamp")?;
        let after_capture_ts = r.read_i64("after_capture_ts")?;
        let mode = r.read_i8("mode")?;
        let calibration = r.read_payload(K4A_CALIBRATION_SIZE as u64, "calibration")?;
        let valid_vertex_count = r.read_i32("valid_vertex_count")?;
        let color = LegacyImage::read(r, "color image")?;
        let depth = LegacyImage::read(r, "depth image")?;
        let infra = LegacyImage::read(r, "infrared image")?;
        let (audio_count, audio) = read_audio(r)?;
        let imu = r.read_payload(IMU_SAMPLE_SIZE as u64, "imu")?;

        Ok(Self {
            frame_id,
            after_capture_ts,
            mode,
            calibration,
            valid_vertex_count,
            color,
            depth,
            infra,
            audio_count,
            audio,
            imu,
        })
    }

    fn into_compressed(self, device_id: u32) -> CompressedFrame {
        let info = FrameInfo {
            device_id,
            capture_id: self.frame_id,
            after_capture_ts: self.after_capture_ts,
            received_ts: self.after_capture_ts,
        };
        let mut frame = CompressedFrame::new(info, CaptureMode::from(self.mode));
        frame.valid_vertex_count = usize::try_from(self.valid_vertex_count).unwrap_or(0);

        self.color
            .insert_into(&mut frame, ImageKey::OriginalColorRgba8, CompressionMode::Jpeg);
        self.depth
            .insert_into(&mut frame, ImageKey::Depth16, CompressionMode::FastPFor);
        self.infra
            .insert_into(&mut frame, ImageKey::Infrared16, CompressionMode::FastPFor);

        frame.insert_data(DataKey::Calibration, CompressionMode::None, self.calibration);
        insert_sensors(&mut frame, self.audio_count, self.audio, self.imu);
        frame
    }
}

/// Version 1 frame
#[derive(Debug, Clone)]
pub(crate) struct LegacyCloudFrame {
    pub capture_id: i32,
    pub after_capture_ts: i64,
    pub valid_vertex_count: i32,
    pub cloud: Bytes,
    pub colors: LegacyImage,
    pub audio_count: usize,
    pub audio: Bytes,
    pub imu: Bytes,
}

impl LegacyCloudFrame {
    fn read<R: Read>(r: &mut WireReader<R>) -> Result<Self, FrameError> {
        let capture_id = r.read_i32("capture_id")?;
        let after_capture_ts = r.read_i64("after_capture_ts")?;
        let valid_vertex_count = r.read_i32("valid_vertex_count")?;
        let cloud = r.read_sized_i32("cloud")?;
        let colors = LegacyImage::read(r, "colors image")?;
        let (audio_count, audio) = read_audio(r)?;
        let imu = r.read_payload(IMU_SAMPLE_SIZE as u64, "imu")?;

        Ok(Self {
            capture_id,
            after_capture_ts,
            valid_vertex_count,
            cloud,
            colors,
            audio_count,
            audio,
            imu,
        })
    }

    fn into_compressed(self, device_id: u32) -> CompressedFrame {
        let info = FrameInfo {
            device_id,
            capture_id: self.capture_id,
            after_capture_ts: self.after_capture_ts,
            received_ts: self.after_capture_ts,
        };
        let mut frame = CompressedFrame::new(info, CaptureMode::Invalid);
        frame.valid_vertex_count = usize::try_from(self.valid_vertex_count).unwrap_or(0);

        frame.insert_volume(VolumeKey::CloudXyz16Rgb8, CompressionMode::FastPFor, self.cloud);
        self.colors
            .insert_into(&mut frame, ImageKey::DepthSizedColorRgba8, CompressionMode::Jpeg);
        insert_sensors(&mut frame, self.audio_count, self.audio, self.imu);
        frame
    }
}

fn read_audio<R: Read>(r: &mut WireReader<R>) -> Result<(usize, Bytes), FrameError> {
    let count = r.read_i32("audio count")?;
    let count = usize::try_from(count).map_err(|_| FrameError::InvalidLength {
        field: "audio count",
        value: i64::from(count),
    })?;

    let mut audio = BytesMut::new();
    for _ in 0..count {
        for _ in 0..AUDIO_CHANNELS {
            audio.put_f32_le(r.read_f32("audio sample")?);
        }
    }
    Ok((count, audio.freeze()))
}

fn insert_sensors(frame: &mut CompressedFrame, audio_count: usize, audio: Bytes, imu: Bytes) {
    if frame.insert_data(DataKey::Audio, CompressionMode::None, audio) {
        frame.set_info(InfoKey::AudioSamplesCount, audio_count as i64);
    }
    frame.insert_data(DataKey::Imu, CompressionMode::None, imu);
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn legacy_cloud_bytes() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&5i32.to_le_bytes());
        b.extend_from_slice(&1_000_000i64.to_le_bytes());
        b.extend_from_slice(&1i32.to_le_bytes());
        b.extend_from_slice(&4i32.to_le_bytes());
        b.extend_from_slice(&[1, 2, 3, 4]);
        b.extend_from_slice(&2i16.to_le_bytes());
        b.extend_from_slice(&1i16.to_le_bytes());
        b.extend_from_slice(&3i32.to_le_bytes());
        b.extend_from_slice(&[9, 9, 9]);
        b.extend_from_slice(&1i32.to_le_bytes());
        for i in 0..AUDIO_CHANNELS {
            b.extend_from_slice(&(i as f32).to_le_bytes());
        }
        b.extend_from_slice(&[0u8; IMU_SAMPLE_SIZE]);
        b
    }

    #[test]
    fn test_cloud_frame_resolves() {
        let bytes = legacy_cloud_bytes();
        let mut r = WireReader::new(Cursor::new(&bytes));
        let frame = FrameLayout::LegacyCloud.read(&mut r).unwrap().resolve(3);

        assert_eq!(frame.info.device_id, 3);
        assert_eq!(frame.info.capture_id, 5);
        assert_eq!(frame.info.received_ts, frame.info.after_capture_ts);
        assert_eq!(frame.mode, CaptureMode::Invalid);
        assert_eq!(frame.valid_vertex_count, 1);

        let cloud = frame.volume(VolumeKey::CloudXyz16Rgb8).unwrap();
        assert_eq!(cloud.compression, CompressionMode::FastPFor);
        assert_eq!(&cloud.payload[..], &[1, 2, 3, 4]);

        let colors = frame.image(ImageKey::DepthSizedColorRgba8).unwrap();
        assert_eq!((colors.width, colors.height), (2, 1));
        assert_eq!(frame.data(DataKey::Audio).unwrap().payload.len(), 28);
        assert_eq!(frame.info_value(InfoKey::AudioSamplesCount), Some(1));
        assert_eq!(frame.data(DataKey::Imu).unwrap().payload.len(), IMU_SAMPLE_SIZE);
    }

    #[test]
    fn test_negative_size_is_rejected() {
        let mut bytes = legacy_cloud_bytes();
        bytes[16..20].copy_from_slice(&(-1i32).to_le_bytes());
        let mut r = WireReader::new(Cursor::new(&bytes));
        let err = FrameLayout::LegacyCloud.read(&mut r).unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength { field: "cloud", .. }));
    }

    #[test]
    fn test_version_dispatch() {
        assert_eq!(FrameLayout::from_version(0), Some(FrameLayout::LegacyFull));
        assert!(FrameLayout::from_version(1).is_some_and(FrameLayout::is_legacy));
        assert_eq!(FrameLayout::from_version(3), None);
    }
}
