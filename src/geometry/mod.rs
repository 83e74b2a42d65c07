//! Point clouds and voxel fusion

pub mod cloud;
pub mod voxel_grid;

pub use cloud::{transform_point, ColorCloud};
pub use voxel_grid::{ColorVoxelGrid, Voxel, VoxelIndex, DEFAULT_VOXEL_COLOR};
