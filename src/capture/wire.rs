//! Current on-disk layout of a single compressed frame.
//!
//! All integers are little-endian. Per frame:
//!
//! ```text
//! device_id i32 | capture_id i32 | after_capture_ts i64 | received_ts i64
//! mode i8 | valid_vertex_count u64
//! infos:   count u64, { key i8, value i64 }*
//! data:    count u64, { key i8, compression i8, len u64, bytes }*
//! images:  count u64, { key i8, compression i8, width u64, height u64, len u64, bytes }*
//! volumes: count u64, { key i8, compression i8, len u64, bytes }*
//! ```

use std::io::{self, Cursor, Read, Write};

use bytes::Bytes;

use super::frame::{CompressedFrame, DataValue, FrameInfo, ImageValue, VolumeValue};
use super::keys::{CompressionMode, DataKey, ImageKey, InfoKey, VolumeKey};
use super::mode::CaptureMode;
use crate::error::FrameError;

/// Little-endian field reader that reports how far a truncated read got
pub(crate) struct WireReader<R> {
    inner: R,
}

macro_rules! read_num {
    ($name:ident, $ty:ty) => {
        pub(crate) fn $name(&mut self, field: &'static str) -> Result<$ty, FrameError> {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            self.fill(&mut buf, field)?;
            Ok(<$ty>::from_le_bytes(buf))
        }
    };
}

impl<R: Read> WireReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner }
    }

    pub(crate) fn fill(&mut self, buf: &mut [u8], field: &'static str) -> Result<(), FrameError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(FrameError::Truncated {
                        field,
                        expected: buf.len() as u64,
                        actual: filled as u64,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FrameError::Io(e)),
            }
        }
        Ok(())
    }

    read_num!(read_i8, i8);
    read_num!(read_i16, i16);
    read_num!(read_i32, i32);
    read_num!(read_i64, i64);
    read_num!(read_u64, u64);
    read_num!(read_f32, f32);
    read_num!(read_f64, f64);

    /// Reads `len` bytes without trusting `len` for the allocation size.
    pub(crate) fn read_payload(&mut self, len: u64, field: &'static str) -> Result<Bytes, FrameError> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        let mut buf = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut buf)?;
        if (buf.len() as u64) < len {
            return Err(FrameError::Truncated {
                field,
                expected: len,
                actual: buf.len() as u64,
            });
        }
        Ok(Bytes::from(buf))
    }

    /// Reads a legacy signed length then that many bytes.
    pub(crate) fn read_sized_i32(&mut self, field: &'static str) -> Result<Bytes, FrameError> {
        let size = self.read_i32(field)?;
        let len = u64::try_from(size).map_err(|_| FrameError::InvalidLength {
            field,
            value: i64::from(size),
        })?;
        self.read_payload(len, field)
    }

    /// Skips `len` bytes.
    pub(crate) fn skip(&mut self, len: u64, field: &'static str) -> Result<(), FrameError> {
        let skipped = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        if skipped < len {
            return Err(FrameError::Truncated {
                field,
                expected: len,
                actual: skipped,
            });
        }
        Ok(())
    }
}

impl CompressedFrame {
    /// Writes the current layout to `w`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&(self.info.device_id as i32).to_le_bytes())?;
        w.write_all(&self.info.capture_id.to_le_bytes())?;
        w.write_all(&self.info.after_capture_ts.to_le_bytes())?;
        w.write_all(&self.info.received_ts.to_le_bytes())?;

        w.write_all(&[i8::from(self.mode) as u8])?;
        w.write_all(&(self.valid_vertex_count as u64).to_le_bytes())?;

        w.write_all(&(self.infos.len() as u64).to_le_bytes())?;
        for (key, value) in &self.infos {
            w.write_all(&[i8::from(*key) as u8])?;
            w.write_all(&value.to_le_bytes())?;
        }

        w.write_all(&(self.data.len() as u64).to_le_bytes())?;
        for (key, value) in &self.data {
            w.write_all(&[i8::from(*key) as u8, i8::from(value.compression) as u8])?;
            write_payload(w, &value.payload)?;
        }

        w.write_all(&(self.images.len() as u64).to_le_bytes())?;
        for (key, value) in &self.images {
            w.write_all(&[i8::from(*key) as u8, i8::from(value.compression) as u8])?;
            w.write_all(&value.width.to_le_bytes())?;
            w.write_all(&value.height.to_le_bytes())?;
            write_payload(w, &value.payload)?;
        }

        w.write_all(&(self.volumes.len() as u64).to_le_bytes())?;
        for (key, value) in &self.volumes {
            w.write_all(&[i8::from(*key) as u8, i8::from(value.compression) as u8])?;
            write_payload(w, &value.payload)?;
        }

        Ok(())
    }

    /// Reads one frame in the current layout from `r`.
    pub fn read_from<R: Read>(r: R) -> Result<Self, FrameError> {
        let mut r = WireReader::new(r);
        Self::read_wire(&mut r)
    }

    pub(crate) fn read_wire<R: Read>(r: &mut WireReader<R>) -> Result<Self, FrameError> {
        let info = FrameInfo {
            device_id: r.read_i32("device_id")? as u32,
            capture_id: r.read_i32("capture_id")?,
            after_capture_ts: r.read_i64("after_capture_ts")?,
            received_ts: r.read_i64("received_ts")?,
        };
        let mode = CaptureMode::from(r.read_i8("mode")?);
        let mut frame = CompressedFrame::new(info, mode);
        frame.valid_vertex_count = r.read_u64("valid_vertex_count")? as usize;

        let count = r.read_u64("info count")?;
        for _ in 0..count {
            let key = InfoKey::from(r.read_i8("info key")?);
            let value = r.read_i64("info value")?;
            frame.infos.insert(key, value);
        }

        // Zero-length entries are kept so a re-save is byte identical.
        let count = r.read_u64("data count")?;
        for _ in 0..count {
            let key = DataKey::from(r.read_i8("data key")?);
            let compression = CompressionMode::from(r.read_i8("data compression")?);
            let len = r.read_u64("data length")?;
            let payload = r.read_payload(len, "data payload")?;
            frame.data.insert(
                key,
                DataValue {
                    compression,
                    payload,
                },
            );
        }

        let count = r.read_u64("image count")?;
        for _ in 0..count {
            let key = ImageKey::from(r.read_i8("image key")?);
            let compression = CompressionMode::from(r.read_i8("image compression")?);
            let width = r.read_u64("image width")?;
            let height = r.read_u64("image height")?;
            let len = r.read_u64("image length")?;
            let payload = r.read_payload(len, "image payload")?;
            frame.images.insert(
                key,
                ImageValue {
                    compression,
                    width,
                    height,
                    payload,
                },
            );
        }

        let count = r.read_u64("volume count")?;
        for _ in 0..count {
            let key = VolumeKey::from(r.read_i8("volume key")?);
            let compression = CompressionMode::from(r.read_i8("volume compression")?);
            let len = r.read_u64("volume length")?;
            let payload = r.read_payload(len, "volume payload")?;
            frame.volumes.insert(
                key,
                VolumeValue {
                    compression,
                    payload,
                },
            );
        }

        Ok(frame)
    }

    /// Exact number of bytes [`CompressedFrame::write_to`] produces.
    pub fn serialized_size(&self) -> usize {
        let header = 4 + 4 + 8 + 8 + 1 + 8;
        let infos = 8 + self.infos.len() * 9;
        let data: usize = self.data.values().map(|v| 2 + 8 + v.payload.len()).sum();
        let images: usize = self
            .images
            .values()
            .map(|v| 2 + 8 + 8 + 8 + v.payload.len())
            .sum();
        let volumes: usize = self.volumes.values().map(|v| 2 + 8 + v.payload.len()).sum();
        header + infos + 8 + data + 8 + images + 8 + volumes
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, FrameError> {
        Self::read_from(Cursor::new(bytes))
    }
}

fn write_payload<W: Write>(w: &mut W, payload: &[u8]) -> io::Result<()> {
    w.write_all(&(payload.len() as u64).to_le_bytes())?;
    if !payload.is_empty() {
        w.write_all(payload)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CompressedFrame {
        let mut frame = CompressedFrame::new(
            FrameInfo {
                device_id: 1,
                capture_id: 42,
                after_capture_ts: 1_000_000,
                received_ts: 1_200_000,
            },
            CaptureMode::FbC1280x720Di640x576Nv12F30,
        );
        frame.valid_vertex_count = 2;
        frame.set_info(InfoKey::CaptureDurationUs, 1_234);
        frame.set_info(InfoKey::Unknown(9), -5);
        frame.insert_data(DataKey::Imu, CompressionMode::None, vec![3u8; 48]);
        frame.insert_image(ImageKey::Depth16, CompressionMode::FastPFor, 4, 2, vec![7u8; 11]);
        frame.insert_volume(VolumeKey::ColoredCloud, CompressionMode::None, vec![1u8; 30]);
        frame
    }

    #[test]
    fn test_serialize_roundtrip() {
        let frame = sample();
        let bytes = frame.serialize();
        assert_eq!(bytes.len(), frame.serialized_size());

        let back = CompressedFrame::deserialize(&bytes).unwrap();
        assert_eq!(back, frame);
        assert_eq!(back.info_value(InfoKey::Unknown(9)), Some(-5));
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample().serialize();
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &42i32.to_le_bytes());
        assert_eq!(bytes[24] as i8, i8::from(CaptureMode::FbC1280x720Di640x576Nv12F30));
        assert_eq!(&bytes[25..33], &2u64.to_le_bytes());
    }

    #[test]
    fn test_zero_length_payload_keeps_entry() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&0i64.to_le_bytes());
        bytes.extend_from_slice(&0i64.to_le_bytes());
        bytes.push(33);
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes()); // infos
        bytes.extend_from_slice(&1u64.to_le_bytes()); // data
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes()); // images
        bytes.extend_from_slice(&0u64.to_le_bytes()); // volumes

        let frame = CompressedFrame::deserialize(&bytes).unwrap();
        assert_eq!(frame.data(DataKey::Imu).map(|d| d.payload.len()), Some(0));
        assert_eq!(frame.serialize(), bytes);
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = sample().serialize();
        let cut = &bytes[..bytes.len() - 5];
        match CompressedFrame::deserialize(cut) {
            Err(FrameError::Truncated {
                field,
                expected,
                actual,
            }) => {
                assert_eq!(field, "volume payload");
                assert_eq!(expected, 30);
                assert_eq!(actual, 25);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_truncated_header() {
        let err = CompressedFrame::deserialize(&[0, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                field: "device_id",
                expected: 4,
                actual: 3
            }
        ));
    }
}
