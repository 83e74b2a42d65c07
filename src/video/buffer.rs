use nalgebra::Matrix4;

use crate::capture::frame::CompressedFrame;
use crate::capture::mode::CaptureMode;
use crate::error::VideoError;
use crate::utils::timestamp_diff_ms;

/// Stable reference to a frame that detects trims and replacements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    pub index: usize,
    pub generation: u64,
}

/// Ordered frames of one device plus its device-to-world transform
#[derive(Debug, Clone)]
pub struct DeviceFrameBuffer {
    frames: Vec<CompressedFrame>,
    transform: Matrix4<f64>,
    generation: u64,
}

impl Default for DeviceFrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceFrameBuffer {
    pub fn new() -> Self {
        Self::with_transform(Matrix4::identity())
    }

    pub fn with_transform(transform: Matrix4<f64>) -> Self {
        Self {
            frames: Vec::new(),
            transform,
            generation: 0,
        }
    }

    pub fn transform(&self) -> &Matrix4<f64> {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Matrix4<f64>) {
        self.transform = transform;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Incremented whenever existing indices may point at different frames
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Appends `frame` unless it repeats the last stored capture id.
    pub fn append(&mut self, frame: CompressedFrame) -> bool {
        if self
            .frames
            .last()
            .is_some_and(|last| last.info.capture_id == frame.info.capture_id)
        {
            return false;
        }
        self.frames.push(frame);
        true
    }

    pub fn first(&self) -> Result<&CompressedFrame, VideoError> {
        self.get(0)
    }

    pub fn last(&self) -> Result<&CompressedFrame, VideoError> {
        self.get(self.frames.len().saturating_sub(1))
    }

    pub fn get(&self, index: usize) -> Result<&CompressedFrame, VideoError> {
        self.frames.get(index).ok_or(VideoError::FrameNotFound {
            index,
            len: self.frames.len(),
        })
    }

    pub fn frames(&self) -> &[CompressedFrame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompressedFrame> {
        self.frames.iter()
    }

    /// Swaps the frame at `index`, returning the previous one.
    pub fn replace(&mut self, index: usize, frame: CompressedFrame) -> Result<CompressedFrame, VideoError> {
        let len = self.frames.len();
        let slot = self
            .frames
            .get_mut(index)
            .ok_or(VideoError::FrameNotFound { index, len })?;
        self.generation += 1;
        Ok(std::mem::replace(slot, frame))
    }

    /// Drops frames `[0, index)`. No-op when `index >= len`.
    pub fn remove_until(&mut self, index: usize) {
        if index == 0 || index >= self.frames.len() {
            return;
        }
        self.frames.drain(..index);
        self.generation += 1;
    }

    /// Drops frames `[index, len)`. No-op when `index >= len`.
    pub fn remove_after(&mut self, index: usize) {
        if index >= self.frames.len() {
            return;
        }
        self.frames.truncate(index);
        self.generation += 1;
    }

    pub fn clear(&mut self) {
        if !self.frames.is_empty() {
            self.frames.clear();
            self.generation += 1;
        }
    }

    pub(crate) fn frames_mut(&mut self) -> &mut Vec<CompressedFrame> {
        self.generation += 1;
        &mut self.frames
    }

    pub fn first_received_ts(&self) -> Option<i64> {
        self.frames.first().map(|f| f.info.received_ts)
    }

    pub fn last_received_ts(&self) -> Option<i64> {
        self.frames.last().map(|f| f.info.received_ts)
    }

    /// Received time span in milliseconds, `0` below two frames.
    pub fn duration_ms(&self) -> i64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) if self.frames.len() >= 2 => {
                timestamp_diff_ms(first.info.received_ts, last.info.received_ts)
            }
            _ => 0,
        }
    }

    /// Whether all frames share one capture mode. Empty buffers qualify.
    pub fn same_mode_for_every_frame(&self) -> bool {
        self.common_mode().is_ok()
    }

    /// The single capture mode of this buffer
    pub fn common_mode(&self) -> Result<Option<CaptureMode>, VideoError> {
        let Some(first) = self.frames.first() else {
            return Ok(None);
        };
        match self.frames.iter().find(|f| f.mode != first.mode) {
            Some(other) => Err(VideoError::ModeMismatch {
                expected: first.mode,
                found: other.mode,
            }),
            None => Ok(Some(first.mode)),
        }
    }

    pub fn handle(&self, index: usize) -> Option<FrameHandle> {
        (index < self.frames.len()).then_some(FrameHandle {
            index,
            generation: self.generation,
        })
    }

    /// Frame behind `handle`, or `None` once the buffer was trimmed or edited.
    pub fn resolve(&self, handle: &FrameHandle) -> Option<&CompressedFrame> {
        if handle.generation != self.generation {
            return None;
        }
        self.frames.get(handle.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::FrameInfo;

    fn frame(capture_id: i32, received_ms: i64) -> CompressedFrame {
        CompressedFrame::new(
            FrameInfo {
                device_id: 0,
                capture_id,
                after_capture_ts: received_ms * 1_000_000,
                received_ts: received_ms * 1_000_000,
            },
            CaptureMode::AkC1280x720Di640x576MjpgF30,
        )
    }

    fn buffer(n: i32) -> DeviceFrameBuffer {
        let mut b = DeviceFrameBuffer::new();
        for i in 0..n {
            b.append(frame(i, i64::from(i) * 33));
        }
        b
    }

    #[test]
    fn test_duplicate_capture_id_is_ignored() {
        let mut b = buffer(3);
        assert!(!b.append(frame(2, 500)));
        assert_eq!(b.len(), 3);
        assert!(b.append(frame(1, 500)));
        assert_eq!(b.len(), 4);
    }

    #[test]
    fn test_accessors_are_bounds_checked() {
        let b = DeviceFrameBuffer::new();
        assert!(matches!(b.first(), Err(VideoError::FrameNotFound { index: 0, len: 0 })));
        assert!(b.last().is_err());

        let b = buffer(2);
        assert_eq!(b.last().unwrap().info.capture_id, 1);
        assert!(matches!(b.get(5), Err(VideoError::FrameNotFound { index: 5, len: 2 })));
    }

    #[test]
    fn test_trim_idempotence() {
        let mut b = buffer(5);
        b.remove_until(0);
        assert_eq!(b.len(), 5);
        b.remove_after(5);
        assert_eq!(b.len(), 5);

        b.remove_until(2);
        assert_eq!(b.len(), 3);
        assert_eq!(b.first().unwrap().info.capture_id, 2);

        b.remove_after(0);
        assert!(b.is_empty());

        for k in 0..=4 {
            let mut b = buffer(4);
            b.remove_until(k);
            b.remove_after(0);
            assert!(b.is_empty(), "k = {k}");
        }
    }

    #[test]
    fn test_duration() {
        assert_eq!(buffer(0).duration_ms(), 0);
        assert_eq!(buffer(1).duration_ms(), 0);
        assert_eq!(buffer(4).duration_ms(), 99);
    }

    #[test]
    fn test_handles_expire_on_trim() {
        let mut b = buffer(4);
        let h = b.handle(3).unwrap();
        assert_eq!(b.resolve(&h).map(|f| f.info.capture_id), Some(3));

        b.append(frame(10, 1_000));
        assert!(b.resolve(&h).is_some());

        b.remove_until(1);
        assert!(b.resolve(&h).is_none());
        assert!(b.handle(10).is_none());
    }

    #[test]
    fn test_mode_consistency() {
        let mut b = buffer(2);
        assert!(b.same_mode_for_every_frame());
        let mut odd = frame(7, 700);
        odd.mode = CaptureMode::Merged;
        b.replace(1, odd).unwrap();
        assert!(matches!(
            b.common_mode(),
            Err(VideoError::ModeMismatch {
                found: CaptureMode::Merged,
                ..
            })
        ));
    }
}
