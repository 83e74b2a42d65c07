use bytes::Bytes;

use super::frame::FrameInfo;
use super::legacy::{AUDIO_CHANNELS, IMU_SAMPLE_SIZE};
use super::mode::CaptureMode;
use crate::geometry::ColorCloud;

/// Uncompressed image with interleaved channels
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub pixels: Vec<T>,
}

impl<T> Image<T> {
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}

/// One inertial sample as laid out by the sensor SDK
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuSample {
    pub temperature: f32,
    pub acc: [f32; 3],
    pub acc_timestamp_us: u64,
    pub gyr: [f32; 3],
    pub gyr_timestamp_us: u64,
}

impl ImuSample {
    /// Parses a 48 byte sample. Returns `None` for any other length.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != IMU_SAMPLE_SIZE {
            return None;
        }
        let f = |o: usize| f32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);
        let u = |o: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[o..o + 8]);
            u64::from_le_bytes(b)
        };
        Some(Self {
            temperature: f(0),
            acc: [f(4), f(8), f(12)],
            acc_timestamp_us: u(16),
            gyr: [f(24), f(28), f(32)],
            // 4 bytes of padding at 36
            gyr_timestamp_us: u(40),
        })
    }
}

pub type AudioSample = [f32; AUDIO_CHANNELS];

/// Display frame produced from a [`CompressedFrame`](super::CompressedFrame)
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub info: FrameInfo,
    pub mode: CaptureMode,
    pub color: Option<Image<u8>>,
    pub depth_sized_color: Option<Image<u8>>,
    pub bodies_id_map: Option<Image<u8>>,
    pub depth: Option<Image<u16>>,
    pub infra: Option<Image<u16>>,
    pub cloud: ColorCloud,
    pub imu: Option<ImuSample>,
    pub audio: Vec<AudioSample>,
    pub calibration: Option<Bytes>,
}

impl DecodedFrame {
    pub fn new(info: FrameInfo, mode: CaptureMode) -> Self {
        Self {
            info,
            mode,
            color: None,
            depth_sized_color: None,
            bodies_id_map: None,
            depth: None,
            infra: None,
            cloud: ColorCloud::default(),
            imu: None,
            audio: Vec::new(),
            calibration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imu_offsets() {
        let mut raw = [0u8; IMU_SAMPLE_SIZE];
        raw[0..4].copy_from_slice(&36.5f32.to_le_bytes());
        raw[8..12].copy_from_slice(&9.81f32.to_le_bytes());
        raw[16..24].copy_from_slice(&1_000u64.to_le_bytes());
        raw[32..36].copy_from_slice(&(-0.5f32).to_le_bytes());
        raw[40..48].copy_from_slice(&2_000u64.to_le_bytes());

        let imu = ImuSample::parse(&raw).unwrap();
        assert_eq!(imu.temperature, 36.5);
        assert_eq!(imu.acc[1], 9.81);
        assert_eq!(imu.acc_timestamp_us, 1_000);
        assert_eq!(imu.gyr[2], -0.5);
        assert_eq!(imu.gyr_timestamp_us, 2_000);

        assert!(ImuSample::parse(&raw[..47]).is_none());
    }
}
