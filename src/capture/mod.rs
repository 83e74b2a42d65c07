pub mod decoded;
pub mod decoder;
pub mod frame;
pub mod keys;
pub(crate) mod legacy;
pub mod mode;
pub mod wire;

pub use decoded::{AudioSample, DecodedFrame, Image, ImuSample};
pub use decoder::{CodecFrameDecoder, DecodeSettings, FrameDecoder};
pub use frame::{CompressedFrame, DataValue, FrameInfo, ImageValue, VolumeValue};
pub use keys::{CompressionMode, DataKey, ImageKey, InfoKey, VolumeKey};
pub use legacy::{AUDIO_CHANNELS, IMU_SAMPLE_SIZE, K4A_CALIBRATION_SIZE};
pub use mode::{CaptureMode, DeviceKind, ModeInfo};
