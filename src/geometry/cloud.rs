use nalgebra::{Matrix4, Point3, RowVector4, Vector3};

use crate::capture::keys::VolumeKey;

/// Point cloud with optional per-vertex colors in `[0, 1]`.
///
/// `colors` is either empty or the same length as `vertices`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorCloud {
    pub vertices: Vec<Point3<f32>>,
    pub colors: Vec<Vector3<f32>>,
}

/// Applies a device transform using the row-vector convention, `[x y z 1] * m`.
pub fn transform_point(p: &Point3<f32>, m: &Matrix4<f32>) -> Point3<f32> {
    let r = RowVector4::new(p.x, p.y, p.z, 1.0) * m;
    Point3::new(r[0], r[1], r[2])
}

impl ColorCloud {
    pub fn with_capacity(capacity: usize, colored: bool) -> Self {
        Self {
            vertices: Vec::with_capacity(capacity),
            colors: if colored {
                Vec::with_capacity(capacity)
            } else {
                Vec::new()
            },
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.vertices.is_empty() && self.colors.len() == self.vertices.len()
    }

    /// Decodes a raw volume payload. Returns `None` for unknown keys or a
    /// payload that is not a whole number of points.
    ///
    /// `CloudXyz16Rgb8` positions are millimetres and come out in metres.
    pub fn from_raw(key: VolumeKey, raw: &[u8]) -> Option<Self> {
        let stride = key.point_stride()?;
        if raw.len() % stride != 0 {
            return None;
        }
        let count = raw.len() / stride;
        let mut cloud = Self::with_capacity(count, key.has_colors());

        for p in raw.chunks_exact(stride) {
            let (vertex, rgb) = match key {
                VolumeKey::ColoredCloud => (
                    Point3::new(f32_at(p, 0), f32_at(p, 4), f32_at(p, 8)),
                    Some(&p[12..15]),
                ),
                VolumeKey::CloudXyz16Rgb8 => (
                    Point3::new(mm_at(p, 0), mm_at(p, 2), mm_at(p, 4)),
                    Some(&p[6..9]),
                ),
                VolumeKey::CloudXyz => (
                    Point3::new(f32_at(p, 0), f32_at(p, 4), f32_at(p, 8)),
                    None,
                ),
                VolumeKey::Unknown(_) => return None,
            };
            cloud.vertices.push(vertex);
            if let Some(rgb) = rgb {
                cloud.colors.push(Vector3::new(
                    f32::from(rgb[0]) / 255.0,
                    f32::from(rgb[1]) / 255.0,
                    f32::from(rgb[2]) / 255.0,
                ));
            }
        }
        Some(cloud)
    }

    /// Encodes as a raw `ColoredCloud` payload. Uncolored points are white.
    pub fn to_colored_bytes(&self) -> Vec<u8> {
        let colored = self.has_colors();
        let mut out = Vec::with_capacity(self.len() * 15);
        for (i, v) in self.vertices.iter().enumerate() {
            out.extend_from_slice(&v.x.to_le_bytes());
            out.extend_from_slice(&v.y.to_le_bytes());
            out.extend_from_slice(&v.z.to_le_bytes());
            let c = if colored {
                self.colors[i]
            } else {
                Vector3::new(1.0, 1.0, 1.0)
            };
            out.extend_from_slice(&[to_u8(c.x), to_u8(c.y), to_u8(c.z)]);
        }
        out
    }

    pub fn transformed(&self, m: &Matrix4<f32>) -> Self {
        Self {
            vertices: self.vertices.iter().map(|p| transform_point(p, m)).collect(),
            colors: self.colors.clone(),
        }
    }
}

fn f32_at(p: &[u8], o: usize) -> f32 {
    f32::from_le_bytes([p[o], p[o + 1], p[o + 2], p[o + 3]])
}

fn mm_at(p: &[u8], o: usize) -> f32 {
    f32::from(i16::from_le_bytes([p[o], p[o + 1]])) / 1000.0
}

fn to_u8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}
