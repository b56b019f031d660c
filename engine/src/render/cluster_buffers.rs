//! Cluster Buffer Structures
//!
//! Plain data types for the cluster grid and the per-cluster light lists.
//! Both are `Pod` so a shading stage can upload the arrays verbatim.
//!
//! ## Memory Layout
//!
//! ClusterBounds: 32 bytes each × 1,000 clusters = 32,000 bytes (~31 KB)
//! ClusterLightRef: 8 bytes each × 1,000 clusters = 8,000 bytes (~8 KB)
//! Light index list: 4 bytes × 1,000 clusters × 50 lights = 200,000 bytes (~195 KB)

use glam::Vec3;
use static_assertions::const_assert_eq;

// ============================================================================
// ClusterBounds - View-space AABB for each cluster
// ============================================================================

/// View-space axis-aligned bounding box (AABB) for a single cluster.
///
/// Layout (32 bytes, 2 rows of 16 bytes):
///   Row 0 (offset 0-15):  min_x, min_y, min_z, _pad0
///   Row 1 (offset 16-31): max_x, max_y, max_z, _pad1
///
/// The padding words keep each corner vec4-aligned and are always zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClusterBounds {
    /// Minimum X coordinate in view space
    pub min_x: f32,
    /// Minimum Y coordinate in view space
    pub min_y: f32,
    /// Minimum Z coordinate in view space
    pub min_z: f32,
    /// Padding for 16-byte row alignment
    pub _pad0: u32,
    /// Maximum X coordinate in view space
    pub max_x: f32,
    /// Maximum Y coordinate in view space
    pub max_y: f32,
    /// Maximum Z coordinate in view space
    pub max_z: f32,
    /// Padding for 16-byte row alignment
    pub _pad1: u32,
}

impl Default for ClusterBounds {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

impl ClusterBounds {
    /// Create new cluster bounds from min/max positions.
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self {
            min_x: min[0],
            min_y: min[1],
            min_z: min[2],
            _pad0: 0,
            max_x: max[0],
            max_y: max[1],
            max_z: max[2],
            _pad1: 0,
        }
    }

    /// Smallest box containing every point.
    ///
    /// Returns a zero-sized box at the origin when `points` is empty.
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some((first, rest)) = points.split_first() else {
            return Self::default();
        };
        let (min, max) = rest
            .iter()
            .fold((*first, *first), |(min, max), p| (min.min(*p), max.max(*p)));
        Self::new(min.to_array(), max.to_array())
    }

    /// Get the minimum corner as an array.
    #[inline]
    pub fn min(&self) -> [f32; 3] {
        [self.min_x, self.min_y, self.min_z]
    }

    /// Get the maximum corner as an array.
    #[inline]
    pub fn max(&self) -> [f32; 3] {
        [self.max_x, self.max_y, self.max_z]
    }

    /// Get the center of the bounds.
    #[inline]
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
            (self.min_z + self.max_z) * 0.5,
        ]
    }

    /// Get the size (extents) of the bounds.
    #[inline]
    pub fn size(&self) -> [f32; 3] {
        [
            self.max_x - self.min_x,
            self.max_y - self.min_y,
            self.max_z - self.min_z,
        ]
    }

    /// Check if a point is inside the bounds (boundary inclusive).
    #[inline]
    pub fn contains_point(&self, point: [f32; 3]) -> bool {
        point[0] >= self.min_x
            && point[0] <= self.max_x
            && point[1] >= self.min_y
            && point[1] <= self.max_y
            && point[2] >= self.min_z
            && point[2] <= self.max_z
    }

    /// Squared distance from a point to the box; zero when the point is inside.
    #[inline]
    pub fn squared_distance_to(&self, point: [f32; 3]) -> f32 {
        let min = self.min();
        let max = self.max();
        let mut distance = 0.0;
        for axis in 0..3 {
            let v = point[axis];
            if v < min[axis] {
                distance += (min[axis] - v) * (min[axis] - v);
            } else if v > max[axis] {
                distance += (v - max[axis]) * (v - max[axis]);
            }
        }
        distance
    }
}

// ============================================================================
// ClusterLightRef - Span of a cluster inside the light index list
// ============================================================================

/// Contiguous span `[offset, offset + length)` of the global light-index list
/// owned by one cluster.
///
/// Layout (8 bytes):
///   offset 0: offset (u32)
///   offset 4: length (u32)
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClusterLightRef {
    /// First slot of the span in the light-index list
    pub offset: u32,
    /// Number of light indices in the span
    pub length: u32,
}

impl ClusterLightRef {
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    /// Check if the cluster has no lights.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The span as a range into the light-index list.
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.length) as usize
    }
}

// ============================================================================
// Compile-time Size Assertions
// ============================================================================

const_assert_eq!(std::mem::size_of::<ClusterBounds>(), 32);
const_assert_eq!(std::mem::size_of::<ClusterLightRef>(), 8);

// ============================================================================
// Tests
// ============================================================================
