//! Cluster Configuration Module
//!
//! This module defines the configuration and index math for the cluster grid
//! used for CPU light culling.
//!
//! Clusters divide the view frustum into a 3D grid:
//! - X/Y: Screen-space tiles (HORIZONTAL_SLICE_COUNT × VERTICAL_SLICE_COUNT)
//! - Z: Exponentially distributed depth slices (DEPTH_SLICE_COUNT)
//!
//! The exponential depth distribution places thin slices near the camera and
//! thick slices in the distance.
//!
//! The grid is stored as a flat array: `index = x + y * width + z * width * height`.
//! A contiguous run of `width * height` indices is exactly one depth slice.

use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, Result};

/// Number of cluster tiles in the X (horizontal) direction.
pub const HORIZONTAL_SLICE_COUNT: u32 = 10;

/// Number of cluster tiles in the Y (vertical) direction.
pub const VERTICAL_SLICE_COUNT: u32 = 10;

/// Number of depth slices. One worker runs per depth slice.
pub const DEPTH_SLICE_COUNT: u32 = 10;

/// Maximum number of lights recorded for a single cluster.
pub const MAX_LIGHTS_IN_CLUSTER: u32 = 50;

/// Total number of clusters in the reference grid.
pub const TOTAL_CLUSTER_COUNT: u32 = HORIZONTAL_SLICE_COUNT * VERTICAL_SLICE_COUNT * DEPTH_SLICE_COUNT;

/// Reference render target width in pixels.
pub const SCREEN_WIDTH: u32 = 1280;

/// Reference render target height in pixels.
pub const SCREEN_HEIGHT: u32 = 800;

/// Dimensions of the cluster grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterDimensions {
    /// Horizontal tile count
    pub x: u32,
    /// Vertical tile count
    pub y: u32,
    /// Depth slice count
    pub z: u32,
}

impl Default for ClusterDimensions {
    fn default() -> Self {
        Self {
            x: HORIZONTAL_SLICE_COUNT,
            y: VERTICAL_SLICE_COUNT,
            z: DEPTH_SLICE_COUNT,
        }
    }
}

impl ClusterDimensions {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total number of clusters (x * y * z).
    #[inline]
    pub const fn total(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    /// Number of clusters in one depth slice (x * y).
    #[inline]
    pub const fn clusters_per_slice(&self) -> usize {
        self.x as usize * self.y as usize
    }

    /// Convert a flat cluster index into its (x, y, z) tile coordinate.
    #[inline]
    pub const fn index_to_xyz(&self, index: usize) -> [u32; 3] {
        let width = self.x as usize;
        let height = self.y as usize;
        [
            (index % width) as u32,
            ((index / width) % height) as u32,
            (index / (width * height)) as u32,
        ]
    }

    /// Convert an (x, y, z) tile coordinate into a flat cluster index.
    #[inline]
    pub const fn xyz_to_index(&self, xyz: [u32; 3]) -> usize {
        let width = self.x as usize;
        let height = self.y as usize;
        xyz[0] as usize + xyz[1] as usize * width + xyz[2] as usize * width * height
    }

    /// Whether a tile coordinate lies inside the grid.
    #[inline]
    pub const fn contains(&self, xyz: [u32; 3]) -> bool {
        xyz[0] < self.x && xyz[1] < self.y && xyz[2] < self.z
    }
}

/// Configuration for a [`ClusterSpace`](super::cluster_space::ClusterSpace).
///
/// `Default` is the reference configuration: a 10×10×10 grid, 50 lights per
/// cluster and a 1280×800 render target. Missing JSON fields fall back to the
/// default values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Grid dimensions (tiles × tiles × depth slices)
    pub dimensions: ClusterDimensions,
    /// Per-cluster light cap; lights beyond it are dropped and reported
    pub max_lights_per_cluster: u32,
    /// Render target width in pixels
    pub screen_width: u32,
    /// Render target height in pixels
    pub screen_height: u32,
    /// Pin each slice worker to a CPU core
    pub pin_workers: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            dimensions: ClusterDimensions::default(),
            max_lights_per_cluster: MAX_LIGHTS_IN_CLUSTER,
            screen_width: SCREEN_WIDTH,
            screen_height: SCREEN_HEIGHT,
            pin_workers: false,
        }
    }
}

impl ClusterConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ClusterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the grid is non-empty and every tile covers at least one pixel.
    pub fn validate(&self) -> Result<()> {
        let dims = self.dimensions;
        if dims.x == 0 || dims.y == 0 || dims.z == 0 {
            return Err(ClusterError::InvalidConfig(format!(
                "grid dimensions must be non-zero, got {}x{}x{}",
                dims.x, dims.y, dims.z
            )));
        }
        if self.max_lights_per_cluster == 0 {
            return Err(ClusterError::InvalidConfig(
                "max_lights_per_cluster must be non-zero".to_string(),
            ));
        }
        let capacity = dims.x as u128 * dims.y as u128 * dims.z as u128 * self.max_lights_per_cluster as u128;
        if capacity > u32::MAX as u128 {
            return Err(ClusterError::InvalidConfig(format!(
                "light index capacity {} exceeds the u32 span offset range",
                capacity
            )));
        }
        if self.screen_width < dims.x || self.screen_height < dims.y {
            return Err(ClusterError::InvalidConfig(format!(
                "screen {}x{} is smaller than the {}x{} tile grid",
                self.screen_width, self.screen_height, dims.x, dims.y
            )));
        }
        Ok(())
    }

    /// Total number of clusters.
    #[inline]
    pub fn total_clusters(&self) -> usize {
        self.dimensions.total()
    }

    /// Hard capacity of the global light-index list.
    #[inline]
    pub fn light_index_capacity(&self) -> usize {
        self.total_clusters() * self.max_lights_per_cluster as usize
    }

    /// Tile size in pixels as `(width, height)`.
    #[inline]
    pub fn tile_size(&self) -> (f32, f32) {
        (
            self.screen_width as f32 / self.dimensions.x as f32,
            self.screen_height as f32 / self.dimensions.y as f32,
        )
    }
}

/// View-space depth (negative Z) of a depth slice boundary.
///
/// Uses exponential distribution: `depth = -near * (far/near)^(slice/slices)`.
/// `slice == 0` is the near plane and `slice == slices` is the far plane.
///
/// # Example
///
/// ```
/// use choks_engine::render::cluster_config::slice_boundary_depth;
///
/// let d = slice_boundary_depth(0, 10, 0.1, 1000.0);
/// assert!((d + 0.1).abs() < 1e-6);
/// ```
pub fn slice_boundary_depth(slice: u32, slices: u32, near: f32, far: f32) -> f32 {
    -near * (far / near).powf(slice as f32 / slices as f32)
}

/// View-space near and far depths (both negative) of a depth slice.
pub fn depth_slice_bounds(slice: u32, slices: u32, near: f32, far: f32) -> (f32, f32) {
    (
        slice_boundary_depth(slice, slices, near, far),
        slice_boundary_depth(slice + 1, slices, near, far),
    )
}

/// Continuous depth slice coordinate for a positive view distance.
///
/// Inverse of [`slice_boundary_depth`]:
/// `slice = ln(d) * S / ln(far/near) - S * ln(near) / ln(far/near)`.
pub fn slice_from_depth(distance: f32, slices: u32, near: f32, far: f32) -> f32 {
    let slices = slices as f32;
    let log_ratio = (far / near).ln();
    let scale = distance.ln() * (slices / log_ratio);
    let bias = (slices * near.ln()) / log_ratio;
    scale - bias
}
