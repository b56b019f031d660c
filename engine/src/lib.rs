//! Clustered Light Culling Library
//!
//! Splits the view frustum into a 3D grid of clusters and assigns point
//! lights to the clusters they can reach, so a forward shading pass only
//! evaluates the lights near each fragment.
//!
//! # Modules
//!
//! - [`camera`] - Perspective camera (view and projection matrices)
//! - [`render`] - Cluster grid generation and light assignment
//! - [`error`] - Error type shared by both passes
//!
//! # Example
//!
//! ```
//! use choks_engine::camera::Camera;
//! use choks_engine::render::{ClusterConfig, ClusterSpace, Light};
//! use glam::Vec3;
//!
//! let camera = Camera::new(
//!     Vec3::new(0.0, 0.0, -10.0),
//!     Vec3::new(0.0, 90.0, 0.0),
//!     120.0,
//!     4.0 / 3.0,
//!     0.1,
//!     1000.0,
//! );
//!
//! let mut clusters = ClusterSpace::new(ClusterConfig::default())?;
//! clusters.update_grid(&camera)?;
//!
//! let lights = [Light::point(Vec3::ZERO, 5.0)];
//! let stats = clusters.assign_lights(&camera, &lights)?;
//! assert!(stats.total_assignments > 0);
//! # Ok::<(), choks_engine::ClusterError>(())
//! ```

pub mod camera;
pub mod error;
pub mod render;

pub use error::{ClusterError, Result};
// Re-export the render module contents at crate level for convenience
pub use render::*;
