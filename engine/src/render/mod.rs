//! Render Module
//!
//! CPU side of clustered forward lighting: the view frustum is split into a
//! grid of clusters (screen tiles × exponential depth slices), each cluster
//! gets a view-space AABB, and every frame the point lights are binned into
//! per-cluster lists a shading stage can look up.

pub mod cluster_bounds;
pub mod cluster_buffers;
pub mod cluster_config;
pub mod cluster_space;
pub mod light_assignment;
pub mod slice_workers;

// Re-export cluster configuration types
pub use cluster_config::{
    ClusterConfig, ClusterDimensions, depth_slice_bounds, slice_boundary_depth, slice_from_depth,
    DEPTH_SLICE_COUNT, HORIZONTAL_SLICE_COUNT, MAX_LIGHTS_IN_CLUSTER, SCREEN_HEIGHT, SCREEN_WIDTH,
    TOTAL_CLUSTER_COUNT, VERTICAL_SLICE_COUNT,
};

// Re-export cluster buffer types
pub use cluster_buffers::{ClusterBounds, ClusterLightRef};

// Re-export grid generation
pub use cluster_bounds::{
    build_cluster_grid, compute_cluster_bounds, line_intersection_to_zplane, screen_to_view,
    ClusterGridTracker, GridInputs, RegenerationPolicy,
};

// Re-export light assignment
pub use light_assignment::{
    assign_lights, light_affects_cluster, AssignmentStats, Light, LightIndexSpans, LightKind,
};

pub use cluster_space::ClusterSpace;
pub use slice_workers::{run_per_slice, SliceWorkerOptions};
