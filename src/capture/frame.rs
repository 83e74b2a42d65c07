use std::collections::BTreeMap;

use bytes::Bytes;

use super::keys::{CompressionMode, DataKey, ImageKey, InfoKey, VolumeKey};
use super::mode::CaptureMode;

/// Identity and timing shared by every frame kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub device_id: u32,
    /// Sensor sequence number, monotonic per device
    pub capture_id: i32,
    /// Sensor clock, nanoseconds
    pub after_capture_ts: i64,
    /// Host clock, nanoseconds
    pub received_ts: i64,
}

/// Flat binary payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataValue {
    pub compression: CompressionMode,
    pub payload: Bytes,
}

/// Two dimensional payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageValue {
    pub compression: CompressionMode,
    pub width: u64,
    pub height: u64,
    pub payload: Bytes,
}

/// Point cloud payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeValue {
    pub compression: CompressionMode,
    pub payload: Bytes,
}

/// Persisted capture unit: frame identity plus independently compressed channels.
///
/// Channels are stored in ordered maps so serialization is deterministic.
/// Payloads are `Bytes`, cloning a frame never copies channel data.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedFrame {
    pub info: FrameInfo,
    pub mode: CaptureMode,
    pub valid_vertex_count: usize,
    pub(crate) infos: BTreeMap<InfoKey, i64>,
    pub(crate) data: BTreeMap<DataKey, DataValue>,
    pub(crate) images: BTreeMap<ImageKey, ImageValue>,
    pub(crate) volumes: BTreeMap<VolumeKey, VolumeValue>,
}

impl CompressedFrame {
    pub fn new(info: FrameInfo, mode: CaptureMode) -> Self {
        Self {
            info,
            mode,
            valid_vertex_count: 0,
            infos: BTreeMap::new(),
            data: BTreeMap::new(),
            images: BTreeMap::new(),
            volumes: BTreeMap::new(),
        }
    }

    pub fn set_info(&mut self, key: InfoKey, value: i64) {
        self.infos.insert(key, value);
    }

    pub fn info_value(&self, key: InfoKey) -> Option<i64> {
        self.infos.get(&key).copied()
    }

    /// Stores a data channel. Empty payloads are ignored and `false` is returned.
    pub fn insert_data(
        &mut self,
        key: DataKey,
        compression: CompressionMode,
        payload: impl Into<Bytes>,
    ) -> bool {
        let payload = payload.into();
        if payload.is_empty() {
            return false;
        }
        self.data.insert(
            key,
            DataValue {
                compression,
                payload,
            },
        );
        true
    }

    /// Stores an image channel. Empty payloads are ignored and `false` is returned.
    pub fn insert_image(
        &mut self,
        key: ImageKey,
        compression: CompressionMode,
        width: u64,
        height: u64,
        payload: impl Into<Bytes>,
    ) -> bool {
        let payload = payload.into();
        if payload.is_empty() {
            return false;
        }
        self.images.insert(
            key,
            ImageValue {
                compression,
                width,
                height,
                payload,
            },
        );
        true
    }

    /// Stores a volume channel. Empty payloads are ignored and `false` is returned.
    pub fn insert_volume(
        &mut self,
        key: VolumeKey,
        compression: CompressionMode,
        payload: impl Into<Bytes>,
    ) -> bool {
        let payload = payload.into();
        if payload.is_empty() {
            return false;
        }
        self.volumes.insert(
            key,
            VolumeValue {
                compression,
                payload,
            },
        );
        true
    }

    pub fn data(&self, key: DataKey) -> Option<&DataValue> {
        self.data.get(&key)
    }

    pub fn image(&self, key: ImageKey) -> Option<&ImageValue> {
        self.images.get(&key)
    }

    pub fn volume(&self, key: VolumeKey) -> Option<&VolumeValue> {
        self.volumes.get(&key)
    }

    pub fn remove_data(&mut self, key: DataKey) -> Option<DataValue> {
        self.data.remove(&key)
    }

    pub fn remove_image(&mut self, key: ImageKey) -> Option<ImageValue> {
        self.images.remove(&key)
    }

    pub fn remove_volume(&mut self, key: VolumeKey) -> Option<VolumeValue> {
        self.volumes.remove(&key)
    }

    pub fn infos(&self) -> impl Iterator<Item = (InfoKey, i64)> + '_ {
        self.infos.iter().map(|(k, v)| (*k, *v))
    }

    pub fn data_buffers(&self) -> impl Iterator<Item = (DataKey, &DataValue)> {
        self.data.iter().map(|(k, v)| (*k, v))
    }

    pub fn image_buffers(&self) -> impl Iterator<Item = (ImageKey, &ImageValue)> {
        self.images.iter().map(|(k, v)| (*k, v))
    }

    pub fn volume_buffers(&self) -> impl Iterator<Item = (VolumeKey, &VolumeValue)> {
        self.volumes.iter().map(|(k, v)| (*k, v))
    }

    /// Sum of all channel payload sizes
    pub fn payload_bytes(&self) -> usize {
        self.data.values().map(|v| v.payload.len()).sum::<usize>()
            + self.images.values().map(|v| v.payload.len()).sum::<usize>()
            + self.volumes.values().map(|v| v.payload.len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> CompressedFrame {
        CompressedFrame::new(
            FrameInfo {
                device_id: 0,
                capture_id: 7,
                after_capture_ts: 1_000,
                received_ts: 2_000,
            },
            CaptureMode::AkC1280x720Di640x576MjpgF30,
        )
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let mut f = frame();
        assert!(!f.insert_data(DataKey::Imu, CompressionMode::None, Vec::new()));
        assert!(f.data(DataKey::Imu).is_none());

        assert!(f.insert_image(ImageKey::Depth16, CompressionMode::FastPFor, 2, 2, vec![1u8; 8]));
        assert_eq!(f.image(ImageKey::Depth16).map(|i| i.width), Some(2));
        assert_eq!(f.payload_bytes(), 8);
    }

    #[test]
    fn test_clone_shares_payloads() {
        let mut f = frame();
        f.insert_volume(VolumeKey::ColoredCloud, CompressionMode::None, vec![0u8; 15]);
        let copy = f.clone();
        let a = &f.volume(VolumeKey::ColoredCloud).map(|v| v.payload.as_ptr());
        let b = &copy.volume(VolumeKey::ColoredCloud).map(|v| v.payload.as_ptr());
        assert_eq!(a, b);
    }
}
