use std::time::Instant;

use nalgebra::{Point3, Vector3};
use tracing::{debug, info, instrument, warn};

use super::buffer::DeviceFrameBuffer;
use super::volumetric::VolumetricVideo;
use crate::capture::decoded::DecodedFrame;
use crate::capture::decoder::DecodeSettings;
use crate::capture::frame::CompressedFrame;
use crate::capture::keys::{CompressionMode, VolumeKey};
use crate::capture::mode::CaptureMode;
use crate::codec::Shape;
use crate::error::VideoError;
use crate::geometry::ColorVoxelGrid;
use crate::utils::ns_to_ms;
use crate::FusionConfig;

impl FusionConfig {
    pub fn grid(&self) -> Result<ColorVoxelGrid, VideoError> {
        let grid = ColorVoxelGrid::new(
            self.voxel_size,
            Point3::from(self.origin),
            Vector3::from(self.extent),
        )?;
        Ok(grid)
    }
}

impl VolumetricVideo {
    /// Fuses frame `index` of device 0 with the time-aligned frame of every
    /// other device.
    ///
    /// Devices with no aligned frame, or whose aligned frame fails to decode,
    /// are skipped. A reference frame that fails to decode is an error. The
    /// result keeps device 0's timing and channels, with the fused cloud and
    /// the `Merged` mode.
    #[instrument(skip(self, settings, fusion))]
    pub fn merge_devices_frame(
        &mut self,
        index: usize,
        settings: &DecodeSettings,
        fusion: &FusionConfig,
    ) -> Result<DecodedFrame, VideoError> {
        let reference = self.device(0)?;
        let received = reference.get(index)?.info.received_ts;
        let first = reference.first_received_ts().unwrap_or(received);
        let target_ms = ns_to_ms(received - first) as f64;

        let mut grid = fusion.grid()?;
        let mut merged = None;
        for device in 0..self.nb_devices() {
            let frame_index = if device == 0 {
                index
            } else {
                match self.closest_frame_id_from_time(device, target_ms) {
                    Some(i) => i,
                    None => {
                        debug!(device, target_ms, "No aligned frame, skipping device");
                        continue;
                    }
                }
            };

            let decoded = if device == 0 {
                self.generate_frame(device, frame_index, &DecodeSettings { cloud: true, ..*settings })?
            } else {
                match self.generate_frame(device, frame_index, &DecodeSettings::cloud_only()) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        warn!(device, frame = frame_index, "Skipping undecodable frame: {e}");
                        continue;
                    }
                }
            };
            let transform = self.devices[device].transform().cast::<f32>();
            grid.add_cloud(&decoded.cloud, &transform);

            if device == 0 {
                merged = Some(decoded);
            }
        }
        grid.compute();

        let mut merged = merged.ok_or(VideoError::FrameNotFound { index, len: 0 })?;
        merged.mode = CaptureMode::Merged;
        merged.cloud = grid.to_cloud();
        metrics::counter!("kvid_merged_frames").increment(1);
        Ok(merged)
    }

    /// Replaces every device by one `Merged` device holding the fused frames of
    /// device 0's timeline, under the identity transform.
    #[instrument(skip_all, fields(devices = self.nb_devices()))]
    pub fn merge_all_devices(
        &mut self,
        fusion: &FusionConfig,
        cloud_compression: CompressionMode,
    ) -> Result<(), VideoError> {
        let reference_len = self.device(0)?.len();
        if reference_len == 0 {
            return Err(VideoError::NoFrames);
        }
        self.check_common_mode()?;

        let start = Instant::now();
        let mut fused = DeviceFrameBuffer::new();
        let mut skipped = 0;
        for index in 0..reference_len {
            let decoded = match self.merge_devices_frame(index, &DecodeSettings::cloud_only(), fusion) {
                Ok(decoded) => decoded,
                Err(VideoError::Decode(e)) => {
                    warn!(device = 0, frame = index, "Skipping undecodable reference frame: {e}");
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            let reference = self.get_frame(0, index)?;

            let mut frame = CompressedFrame::new(decoded.info, CaptureMode::Merged);
            for (key, value) in reference.infos() {
                frame.set_info(key, value);
            }
            for (key, value) in reference.data_buffers() {
                frame.insert_data(key, value.compression, value.payload.clone());
            }

            let raw = decoded.cloud.to_colored_bytes();
            let (compression, payload) =
                self.codecs
                    .encode(&raw, cloud_compression, &Shape::image(decoded.cloud.len(), 1, 1, 15))?;
            frame.valid_vertex_count = decoded.cloud.len();
            frame.insert_volume(VolumeKey::ColoredCloud, compression, payload);
            // one merged frame per reference frame, even for repeated capture ids
            fused.frames_mut().push(frame);
        }
        if fused.is_empty() {
            return Err(VideoError::NoFrames);
        }

        self.clean();
        self.push_device(fused);
        info!(
            frames = reference_len - skipped,
            skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Merged all devices"
        );
        Ok(())
    }

    /// Capture mode shared by every frame of every device
    fn check_common_mode(&self) -> Result<Option<CaptureMode>, VideoError> {
        let mut common = None;
        for device in &self.devices {
            match (common, device.common_mode()?) {
                (None, mode) => common = mode,
                (Some(expected), Some(found)) if expected != found => {
                    return Err(VideoError::ModeMismatch { expected, found })
                }
                _ => {}
            }
        }
        Ok(common)
    }
}
