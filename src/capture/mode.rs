//! Capture modes and their resolution / framerate class

use std::fmt;

use super::keys::byte_tag;

byte_tag! {
    /// Resolution and format class of a captured frame.
    ///
    /// `Merged` is synthetic and only produced by multi-device fusion.
    pub enum CaptureMode {
        // azure kinect, narrow
        AkC2048x1536Di640x576MjpgF30 = 0,
        AkC4096x3072Di640x576MjpgF15 = 1,
        AkC1280x720Di320x288Nv12F30 = 2,
        AkC1280x720Di640x576Nv12F30 = 3,
        AkC1280x720Di640x576Yuy2F30 = 4,
        AkC1280x720Di640x576MjpgF30 = 5,
        // azure kinect, wide
        AkC2048x1536Di512x512MjpgF30 = 6,
        AkC2048x1536Di1024x1024MjpgF30 = 7,
        AkC1280x720Di512x512Nv12F30 = 8,
        AkC1280x720Di512x512Yuy2F30 = 9,
        AkC1280x720Di512x512MjpgF30 = 10,
        AkC1280x720Di1024x1024Nv12F15 = 11,
        AkC1280x720Di1024x1024Yuy2F15 = 12,
        AkC1280x720Di1024x1024MjpgF15 = 13,
        // azure kinect, no depth
        AkC2048x1536MjpgF30 = 14,
        AkC4096x3072MjpgF15 = 15,
        AkC1280x720Nv12F30 = 16,
        AkC1920x1080MjpgF30 = 17,
        AkC2560x1440MjpgF30 = 18,
        AkC3840x2160MjpgF15 = 19,
        // femto bolt
        FbC2048x1536Di640x576MjpgF30 = 20,
        FbC4096x3072Di640x576MjpgF15 = 21,
        FbC1280x720Di320x288Nv12F30 = 22,
        FbC1280x720Di640x576Nv12F30 = 23,
        FbC2048x1536Di512x512MjpgF30 = 24,
        FbC1280x720Di512x512Nv12F30 = 25,
        FbDi512x512F30 = 26,
        FbC1280x720MjpgF30 = 27,
        // femto mega, ethernet
        FmeC1280x720Di640x576MjpgF30 = 28,
        FmeC1280x720Di512x512MjpgF30 = 29,
        FmeDi512x512F30 = 30,
        FmeC1280x720MjpgF30 = 31,
        // femto mega, usb
        FmuC1280x720Di640x576MjpgF30 = 32,
        Invalid = 33,
        Merged = 34,
    }
}

/// Sensor family that produced a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    AzureKinect,
    FemtoBolt,
    FemtoMega,
    Undefined,
}

/// Static properties of a capture mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInfo {
    pub device: DeviceKind,
    /// Color resolution, `(0, 0)` when off
    pub color: (u32, u32),
    /// Depth resolution, `(0, 0)` when off
    pub depth: (u32, u32),
    pub fps: u32,
}

const OFF: (u32, u32) = (0, 0);
const C720: (u32, u32) = (1280, 720);
const C1080: (u32, u32) = (1920, 1080);
const C1440: (u32, u32) = (2560, 1440);
const C1536: (u32, u32) = (2048, 1536);
const C2160: (u32, u32) = (3840, 2160);
const C3072: (u32, u32) = (4096, 3072);
const D288: (u32, u32) = (320, 288);
const D512: (u32, u32) = (512, 512);
const D576: (u32, u32) = (640, 576);
const D1024: (u32, u32) = (1024, 1024);

impl CaptureMode {
    pub fn info(self) -> ModeInfo {
        use CaptureMode::*;
        use DeviceKind::*;

        let (device, color, depth, fps) = match self {
            AkC2048x1536Di640x576MjpgF30 => (AzureKinect, C1536, D576, 30),
            AkC4096x3072Di640x576MjpgF15 => (AzureKinect, C3072, D576, 15),
            AkC1280x720Di320x288Nv12F30 => (AzureKinect, C720, D288, 30),
            AkC1280x720Di640x576Nv12F30
            | AkC1280x720Di640x576Yuy2F30
            | AkC1280x720Di640x576MjpgF30 => (AzureKinect, C720, D576, 30),
            AkC2048x1536Di512x512MjpgF30 => (AzureKinect, C1536, D512, 30),
            AkC2048x1536Di1024x1024MjpgF30 => (AzureKinect, C1536, D1024, 15),
            AkC1280x720Di512x512Nv12F30
            | AkC1280x720Di512x512Yuy2F30
            | AkC1280x720Di512x512MjpgF30 => (AzureKinect, C720, D512, 30),
            AkC1280x720Di1024x1024Nv12F15
            | AkC1280x720Di1024x1024Yuy2F15
            | AkC1280x720Di1024x1024MjpgF15 => (AzureKinect, C720, D1024, 15),
            AkC2048x1536MjpgF30 => (AzureKinect, C1536, OFF, 30),
            AkC4096x3072MjpgF15 => (AzureKinect, C3072, OFF, 15),
            AkC1280x720Nv12F30 => (AzureKinect, C720, OFF, 30),
            AkC1920x1080MjpgF30 => (AzureKinect, C1080, OFF, 30),
            AkC2560x1440MjpgF30 => (AzureKinect, C1440, OFF, 30),
            AkC3840x2160MjpgF15 => (AzureKinect, C2160, OFF, 15),
            FbC2048x1536Di640x576MjpgF30 => (FemtoBolt, C1536, D576, 30),
            FbC4096x3072Di640x576MjpgF15 => (FemtoBolt, C3072, D576, 15),
            FbC1280x720Di320x288Nv12F30 => (FemtoBolt, C720, D288, 30),
            FbC1280x720Di640x576Nv12F30 => (FemtoBolt, C720, D576, 30),
            FbC2048x1536Di512x512MjpgF30 => (FemtoBolt, C1536, D512, 30),
            FbC1280x720Di512x512Nv12F30 => (FemtoBolt, C720, D512, 30),
            FbDi512x512F30 => (FemtoBolt, OFF, D512, 30),
            FbC1280x720MjpgF30 => (FemtoBolt, C720, OFF, 30),
            FmeC1280x720Di640x576MjpgF30 | FmuC1280x720Di640x576MjpgF30 => {
                (FemtoMega, C720, D576, 30)
            }
            FmeC1280x720Di512x512MjpgF30 => (FemtoMega, C720, D512, 30),
            FmeDi512x512F30 => (FemtoMega, OFF, D512, 30),
            FmeC1280x720MjpgF30 => (FemtoMega, C720, OFF, 30),
            Invalid | Merged | Unknown(_) => (Undefined, OFF, OFF, 30),
        };

        ModeInfo {
            device,
            color,
            depth,
            fps,
        }
    }

    pub fn has_color(self) -> bool {
        self.info().color != OFF
    }

    pub fn has_depth(self) -> bool {
        self.info().depth != OFF
    }

    pub fn device(self) -> DeviceKind {
        self.info().device
    }
}

/// Short label such as `C-720p D-576p F-30`
impl fmt::Display for ModeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let res = |(_, h): (u32, u32)| if h == 0 { "OFF".to_string() } else { format!("{h}p") };
        write!(f, "C-{} D-{} F-{}", res(self.color), res(self.depth), self.fps)
    }
}
