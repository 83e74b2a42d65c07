use std::collections::BTreeMap;

use nalgebra::{Matrix4, Point3, Vector3};

use super::cloud::{transform_point, ColorCloud};
use crate::error::GridError;

/// Integer voxel coordinate
pub type VoxelIndex = [i32; 3];

/// One occupied voxel after [`ColorVoxelGrid::compute`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voxel {
    pub index: VoxelIndex,
    pub color: Vector3<f32>,
}

#[derive(Debug, Clone, Default)]
struct Accumulator {
    count: u32,
    colored: u32,
    color_sum: Vector3<f64>,
}

/// Color of a voxel fed only by uncolored clouds
pub const DEFAULT_VOXEL_COLOR: Vector3<f32> = Vector3::new(1.0, 1.0, 1.0);

/// Averages colored points into an axis-aligned grid.
///
/// Points count toward a voxel only when `origin <= p < origin + extent`
/// componentwise. `extent` is the size of the box, not its max corner.
#[derive(Debug, Clone)]
pub struct ColorVoxelGrid {
    voxel_size: f32,
    origin: Point3<f32>,
    extent: Vector3<f32>,
    accumulator: BTreeMap<VoxelIndex, Accumulator>,
    grid: BTreeMap<VoxelIndex, Voxel>,
}

impl ColorVoxelGrid {
    pub fn new(voxel_size: f32, origin: Point3<f32>, extent: Vector3<f32>) -> Result<Self, GridError> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(GridError::InvalidVoxelSize(voxel_size));
        }
        Ok(Self {
            voxel_size,
            origin,
            extent,
            accumulator: BTreeMap::new(),
            grid: BTreeMap::new(),
        })
    }

    /// Voxelizes a single cloud under the identity transform.
    pub fn from_cloud_within_bounds(
        cloud: &ColorCloud,
        voxel_size: f32,
        origin: Point3<f32>,
        extent: Vector3<f32>,
    ) -> Result<Self, GridError> {
        let mut grid = Self::new(voxel_size, origin, extent)?;
        grid.add_cloud(cloud, &Matrix4::identity());
        grid.compute();
        Ok(grid)
    }

    pub fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    pub fn origin(&self) -> Point3<f32> {
        self.origin
    }

    pub fn extent(&self) -> Vector3<f32> {
        self.extent
    }

    pub fn contains(&self, p: &Point3<f32>) -> bool {
        (0..3).all(|i| p[i] >= self.origin[i] && p[i] < self.origin[i] + self.extent[i])
    }

    pub fn index_of(&self, p: &Point3<f32>) -> VoxelIndex {
        let d = (p - self.origin) / self.voxel_size;
        [d.x.floor() as i32, d.y.floor() as i32, d.z.floor() as i32]
    }

    /// Accumulates `cloud` transformed by `transform` (row-vector convention).
    pub fn add_cloud(&mut self, cloud: &ColorCloud, transform: &Matrix4<f32>) {
        let colored = cloud.has_colors();
        for (i, vertex) in cloud.vertices.iter().enumerate() {
            let p = transform_point(vertex, transform);
            if !self.contains(&p) {
                continue;
            }
            let acc = self.accumulator.entry(self.index_of(&p)).or_default();
            acc.count += 1;
            if colored {
                acc.colored += 1;
                acc.color_sum += cloud.colors[i].cast::<f64>();
            }
        }
    }

    /// Pending points not yet folded into the grid
    pub fn pending(&self) -> usize {
        self.accumulator.values().map(|a| a.count as usize).sum()
    }

    /// Folds accumulated samples into the grid and clears the accumulator.
    ///
    /// Without pending samples the previous grid is kept.
    pub fn compute(&mut self) {
        if self.accumulator.is_empty() {
            return;
        }
        self.grid.clear();
        for (index, acc) in std::mem::take(&mut self.accumulator) {
            let color = if acc.colored > 0 {
                (acc.color_sum / f64::from(acc.colored)).cast::<f32>()
            } else {
                DEFAULT_VOXEL_COLOR
            };
            self.grid.insert(index, Voxel { index, color });
        }
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn voxels(&self) -> impl Iterator<Item = &Voxel> {
        self.grid.values()
    }

    pub fn to_voxels(&self) -> Vec<Voxel> {
        self.grid.values().copied().collect()
    }

    /// One point per voxel, placed at the voxel's minimum corner.
    pub fn to_cloud(&self) -> ColorCloud {
        let mut cloud = ColorCloud::with_capacity(self.grid.len(), true);
        for voxel in self.grid.values() {
            let [x, y, z] = voxel.index;
            cloud.vertices.push(Point3::new(
                self.origin.x + x as f32 * self.voxel_size,
                self.origin.y + y as f32 * self.voxel_size,
                self.origin.z + z as f32 * self.voxel_size,
            ));
            cloud.colors.push(voxel.color);
        }
        cloud
    }
}
