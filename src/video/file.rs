//! Container persistence.
//!
//! ```text
//! version i8 | device_count i8
//! { frame_count i32 | transform 16 x f64, row major }*
//! per device, per frame: [unused time f64, version 2 only] frame
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use memmap2::Mmap;
use nalgebra::Matrix4;
use tracing::{debug, error, info, instrument};

use super::buffer::DeviceFrameBuffer;
use super::volumetric::VolumetricVideo;
use crate::capture::legacy::{FrameLayout, RecordedFrame};
use crate::capture::wire::WireReader;
use crate::error::{FrameError, VideoError};

/// Version tag written by [`VolumetricVideo::save`]
pub const CURRENT_VERSION: i8 = 2;

/// Upper bound on frames preallocated from an untrusted header
const MAX_PREALLOCATED_FRAMES: usize = 4096;

impl VolumetricVideo {
    /// Writes every device and frame to `path` in the current format.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), VideoError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            error!("Cannot save to an empty path");
            return Err(VideoError::EmptyPath);
        }
        if self.count_frames_from_all_devices() == 0 {
            error!("Nothing to save");
            return Err(VideoError::NoFrames);
        }

        let file = File::create(path).map_err(|e| {
            error!("Failed to create file: {e}");
            VideoError::io(path, e)
        })?;
        let mut w = BufWriter::new(file);
        let written = self
            .write_to(&mut w)
            .and_then(|()| w.flush().map_err(|e| VideoError::io(path, e)));
        if let Err(e) = written {
            let e = e.with_path(path);
            error!("Failed to write video: {e}");
            return Err(e);
        }

        info!(
            devices = self.nb_devices(),
            frames = self.count_frames_from_all_devices(),
            "Saved video"
        );
        Ok(())
    }

    /// Writes the current format to any sink.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), VideoError> {
        let count = i8::try_from(self.devices.len())
            .map_err(|_| VideoError::TooManyDevices(self.devices.len()))?;
        let io = |e: std::io::Error| VideoError::io("", e);

        w.write_all(&[CURRENT_VERSION as u8, count as u8]).map_err(io)?;
        for device in &self.devices {
            let frames = i32::try_from(device.len()).map_err(|_| VideoError::TooManyFrames(device.len()))?;
            w.write_all(&frames.to_le_bytes()).map_err(io)?;
            let m = device.transform();
            for r in 0..4 {
                for c in 0..4 {
                    w.write_all(&m[(r, c)].to_le_bytes()).map_err(io)?;
                }
            }
        }

        for device in &self.devices {
            for frame in device.iter() {
                w.write_all(&0f64.to_le_bytes()).map_err(io)?;
                frame.write_to(w).map_err(io)?;
            }
        }
        Ok(())
    }

    /// Replaces the content of this video with the file at `path`.
    ///
    /// Existing devices are removed first, so a failed load leaves the video empty.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), VideoError> {
        let path = path.as_ref();
        self.clean();
        if path.as_os_str().is_empty() {
            error!("Cannot load from an empty path");
            return Err(VideoError::EmptyPath);
        }

        let file = File::open(path).map_err(|e| {
            error!("Failed to open file: {e}");
            VideoError::io(path, e)
        })?;
        self.read_logged(path, BufReader::new(file))
    }

    /// Same as [`VolumetricVideo::load`], reading through a memory map.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load_mapped(&mut self, path: impl AsRef<Path>) -> Result<(), VideoError> {
        let path = path.as_ref();
        self.clean();
        if path.as_os_str().is_empty() {
            error!("Cannot load from an empty path");
            return Err(VideoError::EmptyPath);
        }

        let file = File::open(path).map_err(|e| {
            error!("Failed to open file: {e}");
            VideoError::io(path, e)
        })?;
        // SAFETY: read-only mapping dropped before return. The file must not be
        // truncated by another process while loading.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| {
            error!("Failed to map file: {e}");
            VideoError::io(path, e)
        })?;
        self.read_logged(path, Cursor::new(&map[..]))
    }

    fn read_logged<R: Read>(&mut self, path: &Path, r: R) -> Result<(), VideoError> {
        match self.read_from(r) {
            Ok(()) => {
                info!(
                    devices = self.nb_devices(),
                    frames = self.count_frames_from_all_devices(),
                    "Loaded video"
                );
                Ok(())
            }
            Err(e) => {
                let e = e.with_path(path);
                error!("Failed to load video: {e}");
                Err(e)
            }
        }
    }

    /// Replaces the content of this video with a stream in any supported version.
    pub fn read_from<R: Read>(&mut self, r: R) -> Result<(), VideoError> {
        self.clean();
        for device in read_devices(r)? {
            self.push_device(device);
        }
        Ok(())
    }
}

fn header<T>(result: Result<T, FrameError>) -> Result<T, VideoError> {
    result.map_err(|e| match e {
        FrameError::Io(source) => VideoError::io("", source),
        other => VideoError::CorruptHeader(other),
    })
}

fn read_count<R: Read>(r: &mut WireReader<R>) -> Result<usize, VideoError> {
    let count = header(r.read_i32("frame count"))?;
    usize::try_from(count).map_err(|_| {
        VideoError::CorruptHeader(FrameError::InvalidLength {
            field: "frame count",
            value: i64::from(count),
        })
    })
}

fn read_frame<R: Read>(layout: FrameLayout, r: &mut WireReader<R>) -> Result<RecordedFrame, FrameError> {
    if !layout.is_legacy() {
        // unused time field
        r.skip(8, "frame time")?;
    }
    layout.read(r)
}

fn read_devices<R: Read>(r: R) -> Result<Vec<DeviceFrameBuffer>, VideoError> {
    let mut r = WireReader::new(r);

    let version = header(r.read_i8("version"))?;
    let layout = FrameLayout::from_version(version).ok_or_else(|| {
        error!(version, "Unsupported video version");
        VideoError::InvalidFormat(version)
    })?;

    let device_count = header(r.read_i8("device count"))?;
    let device_count = usize::try_from(device_count).map_err(|_| {
        VideoError::CorruptHeader(FrameError::InvalidLength {
            field: "device count",
            value: i64::from(device_count),
        })
    })?;

    let mut layouts = Vec::with_capacity(device_count);
    for _ in 0..device_count {
        let frames = read_count(&mut r)?;
        let mut values = [0f64; 16];
        for v in &mut values {
            *v = header(r.read_f64("transform"))?;
        }
        layouts.push((frames, Matrix4::from_row_slice(&values)));
    }

    // Current files only keep devices that recorded something.
    let mut devices = Vec::with_capacity(device_count);
    for (saved_id, (frames, transform)) in layouts.into_iter().enumerate() {
        if frames == 0 && !layout.is_legacy() {
            debug!(device = saved_id, "Skipping device without frames");
            continue;
        }
        let mut buffer = DeviceFrameBuffer::with_transform(transform);
        buffer.frames_mut().reserve(frames.min(MAX_PREALLOCATED_FRAMES));
        devices.push((saved_id, frames, buffer));
    }

    for (id, (saved_id, frames, buffer)) in devices.iter_mut().enumerate() {
        let storage = buffer.frames_mut();
        for index in 0..*frames {
            let frame = read_frame(layout, &mut r).map_err(|source| {
                error!(device = *saved_id, frame = index, "Corrupt frame: {source}");
                VideoError::CorruptFrame {
                    device: *saved_id,
                    frame: index,
                    source,
                }
            })?;
            storage.push(frame.resolve(id as u32));
        }
    }

    Ok(devices.into_iter().map(|(_, _, buffer)| buffer).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_version() {
        let mut video = VolumetricVideo::default();
        let err = video.read_from(Cursor::new([7u8, 1])).unwrap_err();
        assert!(matches!(err, VideoError::InvalidFormat(7)));
        assert_eq!(video.nb_devices(), 0);
    }

    #[test]
    fn test_truncated_header() {
        let mut video = VolumetricVideo::default();
        let mut bytes = vec![2u8, 1];
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 20]);
        let err = video.read_from(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            VideoError::CorruptHeader(FrameError::Truncated {
                field: "transform",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_path() {
        let mut video = VolumetricVideo::default();
        assert!(matches!(video.save(""), Err(VideoError::EmptyPath)));
        assert!(matches!(video.load(""), Err(VideoError::EmptyPath)));
    }

    #[test]
    fn test_save_without_frames() {
        let mut video = VolumetricVideo::default();
        video.initialize(2);
        assert!(matches!(video.save("unused.kvid"), Err(VideoError::NoFrames)));
    }
}
