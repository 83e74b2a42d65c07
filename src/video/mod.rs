//! Multi-device volumetric recordings

pub mod buffer;
pub mod file;
pub mod fusion;
pub mod volumetric;

pub use buffer::{DeviceFrameBuffer, FrameHandle};
pub use file::CURRENT_VERSION;
pub use volumetric::VolumetricVideo;
