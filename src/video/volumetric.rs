use std::sync::Arc;

use nalgebra::Matrix4;
use tracing::{debug, warn};

use super::buffer::DeviceFrameBuffer;
use crate::capture::decoded::DecodedFrame;
use crate::capture::decoder::{CodecFrameDecoder, DecodeSettings, FrameDecoder};
use crate::capture::frame::CompressedFrame;
use crate::codec::CodecRegistry;
use crate::error::VideoError;
use crate::utils::{elapsed_ms, timestamp_diff_ms};

/// Multi-device recording. Device ids are indices into `devices`.
///
/// Not internally synchronized; share it across threads behind a lock.
#[derive(Debug)]
pub struct VolumetricVideo {
    pub(super) devices: Vec<DeviceFrameBuffer>,
    pub(super) decoders: Vec<CodecFrameDecoder>,
    pub(super) codecs: Arc<CodecRegistry>,
}

impl Default for VolumetricVideo {
    fn default() -> Self {
        Self::new(Arc::new(CodecRegistry::with_builtin(90)))
    }
}

impl VolumetricVideo {
    pub fn new(codecs: Arc<CodecRegistry>) -> Self {
        Self {
            devices: Vec::new(),
            decoders: Vec::new(),
            codecs,
        }
    }

    pub fn with_devices(count: usize, codecs: Arc<CodecRegistry>) -> Self {
        let mut video = Self::new(codecs);
        video.initialize(count);
        video
    }

    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    /// Replaces all devices with `count` empty ones.
    pub fn initialize(&mut self, count: usize) {
        self.clean();
        for _ in 0..count {
            self.add_device(Matrix4::identity());
        }
    }

    /// Removes every device.
    pub fn clean(&mut self) {
        self.devices.clear();
        self.decoders.clear();
    }

    /// Empties every device buffer, keeping devices and transforms.
    pub fn remove_all_frames(&mut self) {
        for device in &mut self.devices {
            device.clear();
        }
    }

    pub fn nb_devices(&self) -> usize {
        self.devices.len()
    }

    pub fn devices(&self) -> &[DeviceFrameBuffer] {
        &self.devices
    }

    pub fn device(&self, id: usize) -> Result<&DeviceFrameBuffer, VideoError> {
        let count = self.devices.len();
        self.devices
            .get(id)
            .ok_or(VideoError::DeviceOutOfRange { device: id, count })
    }

    pub fn device_mut(&mut self, id: usize) -> Result<&mut DeviceFrameBuffer, VideoError> {
        let count = self.devices.len();
        self.devices
            .get_mut(id)
            .ok_or(VideoError::DeviceOutOfRange { device: id, count })
    }

    /// Registers a device and returns its id.
    pub fn add_device(&mut self, transform: Matrix4<f64>) -> usize {
        self.push_device(DeviceFrameBuffer::with_transform(transform))
    }

    pub(super) fn push_device(&mut self, buffer: DeviceFrameBuffer) -> usize {
        self.devices.push(buffer);
        self.decoders.push(CodecFrameDecoder::new(Arc::clone(&self.codecs)));
        self.devices.len() - 1
    }

    pub fn remove_last_device(&mut self) -> Option<DeviceFrameBuffer> {
        self.decoders.pop();
        self.devices.pop()
    }

    /// Drops every device but `id`, which becomes device 0.
    pub fn keep_only_device(&mut self, id: usize) -> Result<(), VideoError> {
        self.keep_only_devices(&[id])
    }

    /// Keeps the listed devices in ascending id order and renumbers them from 0.
    pub fn keep_only_devices(&mut self, ids: &[usize]) -> Result<(), VideoError> {
        let count = self.devices.len();
        if let Some(&device) = ids.iter().find(|&&id| id >= count) {
            return Err(VideoError::DeviceOutOfRange { device, count });
        }

        let devices = std::mem::take(&mut self.devices);
        let decoders = std::mem::take(&mut self.decoders);
        for (id, (device, decoder)) in devices.into_iter().zip(decoders).enumerate() {
            if ids.contains(&id) {
                self.devices.push(device);
                self.decoders.push(decoder);
            }
        }
        debug!(kept = self.devices.len(), removed = count - self.devices.len(), "Kept devices");
        Ok(())
    }

    pub fn device_transform(&self, id: usize) -> Result<&Matrix4<f64>, VideoError> {
        Ok(self.device(id)?.transform())
    }

    pub fn set_device_transform(&mut self, id: usize, transform: Matrix4<f64>) -> Result<(), VideoError> {
        self.device_mut(id)?.set_transform(transform);
        Ok(())
    }

    pub fn nb_frames(&self, device: usize) -> Result<usize, VideoError> {
        Ok(self.device(device)?.len())
    }

    pub fn count_frames_from_all_devices(&self) -> usize {
        self.devices.iter().map(DeviceFrameBuffer::len).sum()
    }

    /// Frame count of the shortest device, 0 without devices
    pub fn min_nb_frames(&self) -> usize {
        self.devices.iter().map(DeviceFrameBuffer::len).min().unwrap_or(0)
    }

    /// Appends `frame` to `device`. Returns `false` for duplicate capture ids.
    pub fn add_frame(&mut self, device: usize, frame: CompressedFrame) -> Result<bool, VideoError> {
        Ok(self.device_mut(device)?.append(frame))
    }

    pub fn get_frame(&self, device: usize, index: usize) -> Result<&CompressedFrame, VideoError> {
        self.device(device)?.get(index)
    }

    pub fn replace_frame(
        &mut self,
        device: usize,
        index: usize,
        frame: CompressedFrame,
    ) -> Result<CompressedFrame, VideoError> {
        self.device_mut(device)?.replace(index, frame)
    }

    pub fn remove_frames_until(&mut self, device: usize, index: usize) -> Result<(), VideoError> {
        self.device_mut(device)?.remove_until(index);
        Ok(())
    }

    pub fn remove_frames_after(&mut self, device: usize, index: usize) -> Result<(), VideoError> {
        self.device_mut(device)?.remove_after(index);
        Ok(())
    }

    /// Earliest received timestamp over all devices with frames
    pub fn first_frame_received_timestamp(&self) -> Option<i64> {
        self.devices.iter().filter_map(DeviceFrameBuffer::first_received_ts).min()
    }

    /// Latest received timestamp over all devices with frames
    pub fn last_frame_received_timestamp(&self) -> Option<i64> {
        self.devices.iter().filter_map(DeviceFrameBuffer::last_received_ts).max()
    }

    pub fn device_first_frame_received_timestamp(&self, device: usize) -> Result<Option<i64>, VideoError> {
        Ok(self.device(device)?.first_received_ts())
    }

    pub fn device_last_frame_received_timestamp(&self, device: usize) -> Result<Option<i64>, VideoError> {
        Ok(self.device(device)?.last_received_ts())
    }

    pub fn device_duration_ms(&self, device: usize) -> Result<i64, VideoError> {
        Ok(self.device(device)?.duration_ms())
    }

    /// Span between the earliest and latest frame of any device
    pub fn duration_ms(&self) -> i64 {
        match (
            self.first_frame_received_timestamp(),
            self.last_frame_received_timestamp(),
        ) {
            (Some(first), Some(last)) => timestamp_diff_ms(first, last),
            _ => 0,
        }
    }

    /// Index of the frame of `device` received closest to `target_ms`.
    ///
    /// Times are relative to the earliest frame of any device. The scan stops
    /// at the first frame whose distance grows, so it assumes frames are time
    /// ordered.
    pub fn closest_frame_id_from_time(&self, device: usize, target_ms: f64) -> Option<usize> {
        let Some(buffer) = self.devices.get(device) else {
            warn!(device, count = self.devices.len(), "Sync on unknown device");
            return None;
        };
        let frames = buffer.frames();
        match frames.len() {
            0 => return None,
            1 => return Some(0),
            _ => {}
        }

        let origin = self.first_frame_received_timestamp()?;
        let diff = |frame: &CompressedFrame| (elapsed_ms(frame.info.received_ts, origin) - target_ms).abs();

        let mut prev = diff(&frames[0]);
        for (index, frame) in frames.iter().enumerate().skip(1) {
            let current = diff(frame);
            if current > prev {
                return Some(index - 1);
            }
            prev = current;
        }
        Some(frames.len() - 1)
    }

    /// Decodes one stored frame with the device's own decoder.
    pub fn generate_frame(
        &mut self,
        device: usize,
        index: usize,
        settings: &DecodeSettings,
    ) -> Result<DecodedFrame, VideoError> {
        let count = self.devices.len();
        let (Some(buffer), Some(decoder)) = (self.devices.get(device), self.decoders.get_mut(device))
        else {
            return Err(VideoError::DeviceOutOfRange { device, count });
        };
        let frame = buffer.get(index)?;
        decoder.decode(settings, frame).map_err(|e| {
            warn!(device, frame = index, capture = frame.info.capture_id, "Decode failed: {e}");
            VideoError::from(e)
        })
    }
}
