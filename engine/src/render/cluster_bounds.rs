//! Cluster Bounds Calculation Module
//!
//! Builds the view-space AABB of every cluster in the grid. For each cluster:
//!
//! 1. The flat index is mapped to its (x, y, z) tile coordinate
//! 2. The tile's min/max pixel corners are unprojected onto the near plane
//!    through the inverse projection
//! 3. The rays from the eye through both corners are cut by the slice's
//!    near and far depth planes (exponential slicing)
//! 4. The AABB of the four intersection points is the cluster bounds
//!
//! The pass fans out one worker per depth slice; each worker writes only its
//! own `width * height` run of the output array.
//!
//! ## Regeneration
//!
//! The grid depends on the projection and on where the view places the eye.
//! [`ClusterGridTracker`] decides when to rebuild according to an explicit
//! [`RegenerationPolicy`]. The default, `ProjectionChange`, rebuilds only when
//! FOV, aspect, near or far change and accepts that a grid built for one view
//! is reused after the camera moves.

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::cluster_buffers::ClusterBounds;
use super::cluster_config::{depth_slice_bounds, ClusterConfig};
use super::slice_workers::{run_per_slice, SliceWorkerOptions};
use crate::camera::{Camera, ProjectionParams};
use crate::error::{ClusterError, Result};

/// Clip-space depth of the near plane (OpenGL convention).
const NEAR_PLANE_CLIP_Z: f32 = -1.0;

/// Camera values the grid pass reads, copied once so workers share no camera state.
#[derive(Clone, Copy, Debug)]
pub struct GridInputs {
    /// Clip → view transform
    pub inverse_projection: Mat4,
    /// Ray origin in view space
    pub eye: Vec3,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
}

impl GridInputs {
    /// Snapshot the camera, rejecting degenerate projections.
    ///
    /// The projection is rebuilt from the lens parameters rather than read
    /// from the camera's cached matrix, so the grid always matches the
    /// values the regeneration tracker records.
    pub fn from_camera(camera: &Camera) -> Result<Self> {
        let params = camera.projection_params();
        params.validate()?;
        let inverse_projection = params.projection_matrix().inverse();
        if !inverse_projection.is_finite() {
            return Err(ClusterError::InvalidProjection(
                "projection matrix is not invertible".to_string(),
            ));
        }
        Ok(Self {
            inverse_projection,
            eye: camera.view_space_origin(),
            near: params.near,
            far: params.far,
        })
    }
}

/// Unproject a screen-space point (pixels, top-left origin) to view space.
///
/// `screen.xy` is in pixels; `screen.z` and `screen.w` are used as the clip
/// depth and w before the inverse projection.
pub fn screen_to_view(inverse_projection: Mat4, screen: Vec4, screen_size: Vec2) -> Vec3 {
    let st = Vec2::new(screen.x, screen.y) / screen_size;
    let ndc = Vec2::new(st.x, 1.0 - st.y) * 2.0 - Vec2::ONE;
    let clip = Vec4::new(ndc.x, ndc.y, screen.z, screen.w);

    let view = inverse_projection * clip;
    (view / view.w).truncate()
}

/// Point where the line through `a` and `b` crosses the plane `z = z_distance`.
///
/// The line must not be parallel to the plane (`a.z != b.z`).
#[inline]
pub fn line_intersection_to_zplane(a: Vec3, b: Vec3, z_distance: f32) -> Vec3 {
    let ab = b - a;
    let t = (z_distance - Vec3::Z.dot(a)) / Vec3::Z.dot(ab);
    a + ab * t
}

/// View-space bounds of a single cluster.
pub fn compute_cluster_bounds(index: usize, inputs: &GridInputs, config: &ClusterConfig) -> ClusterBounds {
    let dims = config.dimensions;
    let tile = dims.index_to_xyz(index);
    let (tile_w, tile_h) = config.tile_size();
    let screen_size = Vec2::new(config.screen_width as f32, config.screen_height as f32);

    // Screen space
    let min_point = Vec4::new(
        tile[0] as f32 * tile_w,
        tile[1] as f32 * tile_h,
        NEAR_PLANE_CLIP_Z,
        1.0,
    );
    let max_point = Vec4::new(
        (tile[0] + 1) as f32 * tile_w,
        (tile[1] + 1) as f32 * tile_h,
        NEAR_PLANE_CLIP_Z,
        1.0,
    );

    // View space, on the near plane
    let vs_min = screen_to_view(inputs.inverse_projection, min_point, screen_size);
    let vs_max = screen_to_view(inputs.inverse_projection, max_point, screen_size);

    let (cluster_near, cluster_far) = depth_slice_bounds(tile[2], dims.z, inputs.near, inputs.far);

    let corners = [
        line_intersection_to_zplane(inputs.eye, vs_min, cluster_near),
        line_intersection_to_zplane(inputs.eye, vs_min, cluster_far),
        line_intersection_to_zplane(inputs.eye, vs_max, cluster_near),
        line_intersection_to_zplane(inputs.eye, vs_max, cluster_far),
    ];

    ClusterBounds::from_points(&corners)
}

/// Fill `out` with the bounds of every cluster, one worker per depth slice.
///
/// `out` must hold exactly `config.total_clusters()` entries. On error the
/// contents of `out` are unspecified and must not be published.
pub fn build_cluster_grid(camera: &Camera, config: &ClusterConfig, out: &mut [ClusterBounds]) -> Result<()> {
    config.validate()?;
    if out.len() != config.total_clusters() {
        return Err(ClusterError::InvalidConfig(format!(
            "grid buffer holds {} clusters, configuration needs {}",
            out.len(),
            config.total_clusters()
        )));
    }

    let inputs = GridInputs::from_camera(camera)?;
    let per_slice = config.dimensions.clusters_per_slice();
    let options = SliceWorkerOptions {
        pin_to_cores: config.pin_workers,
    };

    let slices = config.dimensions.z as usize;
    run_per_slice("clustergen", out.chunks_mut(per_slice), slices, options, |slice, chunk: &mut [ClusterBounds]| {
        let first = slice * per_slice;
        for (i, bounds) in chunk.iter_mut().enumerate() {
            *bounds = compute_cluster_bounds(first + i, &inputs, config);
        }
    })?;
    Ok(())
}

// ============================================================================
// Regeneration tracking
// ============================================================================

/// When the cluster grid is rebuilt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegenerationPolicy {
    /// Rebuild only when FOV, aspect, near or far change. Camera motion alone
    /// reuses the existing grid.
    #[default]
    ProjectionChange,
    /// Rebuild whenever the projection or the view matrix changes.
    AnyCameraChange,
}

/// Tracks the camera state the current grid was built for.
#[derive(Clone, Debug, Default)]
pub struct ClusterGridTracker {
    policy: RegenerationPolicy,
    built_projection: Option<ProjectionParams>,
    built_view: Option<Mat4>,
}

impl ClusterGridTracker {
    pub fn new(policy: RegenerationPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    #[inline]
    pub fn policy(&self) -> RegenerationPolicy {
        self.policy
    }

    /// Change the policy. Takes effect on the next `needs_regeneration` check.
    pub fn set_policy(&mut self, policy: RegenerationPolicy) {
        self.policy = policy;
    }

    /// Whether the grid must be rebuilt for `camera`.
    pub fn needs_regeneration(&self, camera: &Camera) -> bool {
        let Some(projection) = self.built_projection else {
            return true;
        };
        if projection != camera.projection_params() {
            return true;
        }
        match self.policy {
            RegenerationPolicy::ProjectionChange => false,
            RegenerationPolicy::AnyCameraChange => self.built_view != Some(camera.view()),
        }
    }

    /// Record that a grid was successfully built for `camera`.
    pub fn mark_built(&mut self, camera: &Camera) {
        self.built_projection = Some(camera.projection_params());
        self.built_view = Some(camera.view());
    }

    /// Force a rebuild on the next check.
    pub fn invalidate(&mut self) {
        self.built_projection = None;
        self.built_view = None;
    }

    /// Whether a grid has been built since creation or the last invalidation.
    #[inline]
    pub fn has_grid(&self) -> bool {
        self.built_projection.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
