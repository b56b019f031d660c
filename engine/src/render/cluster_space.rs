//! Cluster Space
//!
//! Owns the cluster grid, the per-cluster light references and the global
//! light-index list for one view, and runs the two passes over them:
//!
//! - [`ClusterSpace::update_grid`] / [`ClusterSpace::generate_grid`]: rebuild
//!   the view-space AABBs (on a regeneration trigger)
//! - [`ClusterSpace::assign_lights`]: rebuild the light lists (every frame)
//!
//! Both passes write into preallocated staging buffers and swap them in only
//! after every depth slice completed, so a failed pass leaves the previously
//! published data untouched.
//!
//! ## Shading lookup
//!
//! A shading stage finds the lights for a fragment by computing its cluster
//! from pixel position and view depth ([`ClusterSpace::cluster_index_for_fragment`])
//! and reading that cluster's span ([`ClusterSpace::lights_in_cluster`]).

use std::time::Instant;

use glam::Vec2;

use super::cluster_bounds::{build_cluster_grid, ClusterGridTracker, RegenerationPolicy};
use super::cluster_buffers::{ClusterBounds, ClusterLightRef};
use super::cluster_config::{slice_from_depth, ClusterConfig};
use super::light_assignment::{assign_lights, AssignmentStats, Light};
use crate::camera::Camera;
use crate::error::{ClusterError, Result};

/// Cluster grid and light assignment for one view.
pub struct ClusterSpace {
    config: ClusterConfig,
    tracker: ClusterGridTracker,

    grid: Vec<ClusterBounds>,
    staging_grid: Vec<ClusterBounds>,

    light_refs: Vec<ClusterLightRef>,
    staging_refs: Vec<ClusterLightRef>,

    light_indices: Vec<u32>,
    staging_indices: Vec<u32>,
    light_index_count: usize,

    /// Near/far of the published grid, used by fragment lookup
    grid_depth_range: Option<(f32, f32)>,
}

impl ClusterSpace {
    /// Allocate all buffers for `config` with the default regeneration policy.
    pub fn new(config: ClusterConfig) -> Result<Self> {
        Self::with_policy(config, RegenerationPolicy::default())
    }

    /// Allocate all buffers for `config`.
    pub fn with_policy(config: ClusterConfig, policy: RegenerationPolicy) -> Result<Self> {
        config.validate()?;
        let total = config.total_clusters();
        let capacity = config.light_index_capacity();

        log::debug!(
            "cluster space: {}x{}x{} clusters, {} light slots",
            config.dimensions.x,
            config.dimensions.y,
            config.dimensions.z,
            capacity
        );

        Ok(Self {
            config,
            tracker: ClusterGridTracker::new(policy),
            grid: vec![ClusterBounds::default(); total],
            staging_grid: vec![ClusterBounds::default(); total],
            light_refs: vec![ClusterLightRef::default(); total],
            staging_refs: vec![ClusterLightRef::default(); total],
            light_indices: vec![0; capacity],
            staging_indices: vec![0; capacity],
            light_index_count: 0,
            grid_depth_range: None,
        })
    }

    #[inline]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    #[inline]
    pub fn tracker(&self) -> &ClusterGridTracker {
        &self.tracker
    }

    /// Change when `update_grid` rebuilds.
    pub fn set_regeneration_policy(&mut self, policy: RegenerationPolicy) {
        self.tracker.set_policy(policy);
    }

    /// Whether a grid has been published.
    #[inline]
    pub fn has_grid(&self) -> bool {
        self.grid_depth_range.is_some()
    }

    /// Rebuild the grid if the regeneration policy asks for it.
    ///
    /// Returns whether a rebuild happened.
    pub fn update_grid(&mut self, camera: &Camera) -> Result<bool> {
        if !self.tracker.needs_regeneration(camera) {
            return Ok(false);
        }
        self.generate_grid(camera)?;
        Ok(true)
    }

    /// Rebuild the grid unconditionally.
    pub fn generate_grid(&mut self, camera: &Camera) -> Result<()> {
        let started = Instant::now();

        if let Err(err) = build_cluster_grid(camera, &self.config, &mut self.staging_grid) {
            log::error!("cluster grid generation failed: {err}");
            return Err(err);
        }

        std::mem::swap(&mut self.grid, &mut self.staging_grid);
        self.grid_depth_range = Some((camera.near, camera.far));
        self.tracker.mark_built(camera);

        // Light spans refer to the old grid.
        self.light_refs.fill(ClusterLightRef::default());
        self.light_index_count = 0;

        log::debug!(
            "cluster grid rebuilt: {} clusters in {:.3} ms",
            self.grid.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// Rebuild the per-cluster light lists for this frame.
    pub fn assign_lights(&mut self, camera: &Camera, lights: &[Light]) -> Result<AssignmentStats> {
        if !self.has_grid() {
            return Err(ClusterError::GridNotBuilt);
        }
        let started = Instant::now();

        let stats = match assign_lights(
            camera,
            lights,
            &self.grid,
            &self.config,
            &mut self.staging_refs,
            &mut self.staging_indices,
        ) {
            Ok(stats) => stats,
            Err(err) => {
                log::error!("light assignment failed: {err}");
                return Err(err);
            }
        };

        std::mem::swap(&mut self.light_refs, &mut self.staging_refs);
        std::mem::swap(&mut self.light_indices, &mut self.staging_indices);
        self.light_index_count = stats.total_assignments;

        log::debug!(
            "assigned {} light(s): {} entries over {} cluster(s) in {:.3} ms",
            stats.light_count,
            stats.total_assignments,
            stats.lit_clusters,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(stats)
    }

    /// View-space bounds of every cluster, indexed by flat cluster index.
    #[inline]
    pub fn clusters(&self) -> &[ClusterBounds] {
        &self.grid
    }

    /// Per-cluster spans into [`Self::light_indices`].
    #[inline]
    pub fn light_refs(&self) -> &[ClusterLightRef] {
        &self.light_refs
    }

    /// The used part of the global light-index list.
    #[inline]
    pub fn light_indices(&self) -> &[u32] {
        &self.light_indices[..self.light_index_count]
    }

    /// Number of entries in the global light-index list.
    #[inline]
    pub fn light_index_count(&self) -> usize {
        self.light_index_count
    }

    /// Hard capacity of the global light-index list.
    #[inline]
    pub fn light_index_capacity(&self) -> usize {
        self.light_indices.len()
    }

    /// Light indices affecting a cluster; empty for out-of-range indices.
    pub fn lights_in_cluster(&self, cluster: usize) -> &[u32] {
        match self.light_refs.get(cluster) {
            Some(r) => &self.light_indices[r.range()],
            None => &[],
        }
    }

    /// Cluster containing a fragment, from its pixel position (top-left
    /// origin) and view-space depth (negative in front of the camera).
    ///
    /// Returns `None` before a grid is built or when the fragment is off
    /// screen or outside the near/far range.
    pub fn cluster_index_for_fragment(&self, pixel: Vec2, view_z: f32) -> Option<usize> {
        let (near, far) = self.grid_depth_range?;
        let dims = self.config.dimensions;

        let distance = -view_z;
        if !distance.is_finite() || distance < near || distance > far {
            return None;
        }
        let width = self.config.screen_width as f32;
        let height = self.config.screen_height as f32;
        if !(pixel.x >= 0.0 && pixel.x < width && pixel.y >= 0.0 && pixel.y < height) {
            return None;
        }

        let (tile_w, tile_h) = self.config.tile_size();
        let x = ((pixel.x / tile_w) as u32).min(dims.x - 1);
        let y = ((pixel.y / tile_h) as u32).min(dims.y - 1);
        let slice = slice_from_depth(distance, dims.z, near, far).max(0.0);
        let z = (slice as u32).min(dims.z - 1);

        Some(dims.xyz_to_index([x, y, z]))
    }
}
