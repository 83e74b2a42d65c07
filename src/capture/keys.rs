//! Byte tags persisted alongside every frame buffer.
//!
//! Each tag round-trips through a single `i8`. Values this reader does not know
//! are kept as `Unknown(byte)` so frames written by a newer producer load and
//! save back unchanged.

macro_rules! byte_tag {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// Tag written by a producer newer than this reader
            Unknown(i8),
        }

        impl From<i8> for $name {
            fn from(value: i8) -> Self {
                match value {
                    $($value => $name::$variant,)+
                    other => $name::Unknown(other),
                }
            }
        }

        impl From<$name> for i8 {
            fn from(tag: $name) -> i8 {
                match tag {
                    $($name::$variant => $value,)+
                    $name::Unknown(value) => value,
                }
            }
        }
    };
}

pub(crate) use byte_tag;

byte_tag! {
    /// Compression applied to a buffer payload
    pub enum CompressionMode {
        None = 0,
        Jpeg = 1,
        FastPFor = 2,
    }
}

byte_tag! {
    /// Scalar metadata carried by a frame
    pub enum InfoKey {
        CaptureDurationUs = 0,
        CompressionDurationUs = 1,
        BodiesCount = 2,
        AudioSamplesCount = 3,
    }
}

byte_tag! {
    /// Flat binary payloads
    pub enum DataKey {
        Calibration = 0,
        Imu = 1,
        BodiesSkeleton = 2,
        Audio = 3,
        Origin = 4,
        SizeVoxels = 5,
    }
}

byte_tag! {
    /// Two dimensional payloads
    pub enum ImageKey {
        OriginalColorRgba8 = 0,
        DepthSizedColorRgba8 = 1,
        Depth16 = 2,
        Infrared16 = 3,
        BodiesIdMap8 = 4,
    }
}

byte_tag! {
    /// Point cloud payloads
    pub enum VolumeKey {
        ColoredCloud = 0,
        CloudXyz16Rgb8 = 1,
        CloudXyz = 2,
    }
}

impl ImageKey {
    /// Channels and bytes per channel of the raw (decoded) image.
    pub fn raw_layout(self) -> Option<(usize, usize)> {
        match self {
            ImageKey::OriginalColorRgba8 | ImageKey::DepthSizedColorRgba8 => Some((4, 1)),
            ImageKey::Depth16 | ImageKey::Infrared16 => Some((1, 2)),
            ImageKey::BodiesIdMap8 => Some((1, 1)),
            ImageKey::Unknown(_) => None,
        }
    }
}

impl VolumeKey {
    /// Bytes per point of the raw (decoded) cloud.
    pub fn point_stride(self) -> Option<usize> {
        match self {
            VolumeKey::ColoredCloud => Some(15),
            VolumeKey::CloudXyz16Rgb8 => Some(9),
            VolumeKey::CloudXyz => Some(12),
            VolumeKey::Unknown(_) => None,
        }
    }

    pub fn has_colors(self) -> bool {
        matches!(self, VolumeKey::ColoredCloud | VolumeKey::CloudXyz16Rgb8)
    }
}
