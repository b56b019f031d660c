//! CPU Light-to-Cluster Assignment
//!
//! For every cluster, tests every point light against the cluster AABB with a
//! sphere-AABB test (the light strength is the sphere radius) and records the
//! passing light indices in one shared light-index list.
//!
//! Each cluster gets a contiguous span of that list. Spans are reserved under
//! a lock that is created fresh for every pass; the reservation hands out a
//! disjoint `&mut` sub-slice, so the indices are copied in without holding
//! the lock.
//!
//! Per-cluster lists are capped at `max_lights_per_cluster`. Lights beyond the
//! cap are dropped in index order and reported in [`AssignmentStats`].

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::cluster_buffers::{ClusterBounds, ClusterLightRef};
use super::cluster_config::ClusterConfig;
use super::slice_workers::{run_per_slice, SliceWorkerOptions};
use crate::camera::Camera;
use crate::error::{ClusterError, Result};

// ============================================================================
// Lights
// ============================================================================

/// Light type tag. Only point lights take part in clustering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    #[default]
    Point,
}

/// A light supplied by the caller each frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    /// World-space position
    pub position: Vec3,
    #[serde(default)]
    pub kind: LightKind,
    /// Influence radius used for culling
    pub strength: f32,
}

impl Light {
    pub fn new(position: Vec3, kind: LightKind, strength: f32) -> Self {
        Self { position, kind, strength }
    }

    /// Point light at `position` with the given radius.
    pub fn point(position: Vec3, strength: f32) -> Self {
        Self::new(position, LightKind::Point, strength)
    }

    /// Set strength and return self for chaining.
    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }

    /// Whether the light can affect anything at all.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.strength.is_finite() && self.strength > 0.0
    }
}

/// Sphere-AABB test for a light already transformed into view space.
///
/// A light with zero, negative or non-finite strength affects nothing.
#[inline]
pub fn light_affects_cluster(view_position: Vec3, strength: f32, bounds: &ClusterBounds) -> bool {
    if !(strength.is_finite() && strength > 0.0) {
        return false;
    }
    bounds.squared_distance_to(view_position.to_array()) <= strength * strength
}

// ============================================================================
// Span reservation
// ============================================================================

struct SpanState<'a> {
    remaining: &'a mut [u32],
    next_offset: usize,
    clamped: usize,
}

/// Bump allocator over the global light-index list.
///
/// `reserve` is the only critical section: it reads the counter, advances it
/// by the granted length and returns the old value together with the span.
/// Requests past the end of the list are clamped to what is left.
pub struct LightIndexSpans<'a> {
    state: Mutex<SpanState<'a>>,
}

/// A span handed out by [`LightIndexSpans::reserve`].
pub struct Reservation<'a> {
    /// Offset of the span in the light-index list
    pub offset: u32,
    /// The reserved slots; shorter than requested only when the list is full
    pub span: &'a mut [u32],
}

impl<'a> LightIndexSpans<'a> {
    /// Span allocator over `list`. Slots past `u32::MAX` are never handed
    /// out, so every offset fits a [`ClusterLightRef`].
    pub fn new(list: &'a mut [u32]) -> Self {
        let usable = list.len().min(u32::MAX as usize);
        let list = &mut list[..usable];
        Self {
            state: Mutex::new(SpanState {
                remaining: list,
                next_offset: 0,
                clamped: 0,
            }),
        }
    }

    /// Reserve `length` contiguous slots.
    pub fn reserve(&self, length: usize) -> Reservation<'a> {
        let mut state = self.state.lock();
        let granted = length.min(state.remaining.len());
        state.clamped += length - granted;

        let remaining = std::mem::take(&mut state.remaining);
        let (span, rest) = remaining.split_at_mut(granted);
        state.remaining = rest;

        let offset = state.next_offset;
        state.next_offset += granted;

        Reservation {
            offset: offset as u32,
            span,
        }
    }

    /// Slots handed out so far.
    pub fn count(&self) -> usize {
        self.state.lock().next_offset
    }

    /// Consume the allocator, returning `(count, clamped)`.
    pub fn finish(self) -> (usize, usize) {
        let state = self.state.into_inner();
        (state.next_offset, state.clamped)
    }
}

// ============================================================================
// Assignment pass
// ============================================================================

/// Counters from one assignment pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssignmentStats {
    /// Lights supplied to the pass
    pub light_count: usize,
    /// Entries written to the light-index list
    pub total_assignments: usize,
    /// Clusters with at least one light
    pub lit_clusters: usize,
    /// Clusters whose list hit the per-cluster cap
    pub truncated_clusters: usize,
    /// Light hits dropped by the per-cluster cap
    pub dropped_lights: usize,
    /// Slots refused because the global list was full
    pub clamped_by_capacity: usize,
}

/// Assign lights to clusters, one worker per depth slice.
///
/// `grid` and `refs_out` hold one entry per cluster; `list_out` has the full
/// light-index capacity. On error the outputs must not be published.
pub fn assign_lights(
    camera: &Camera,
    lights: &[Light],
    grid: &[ClusterBounds],
    config: &ClusterConfig,
    refs_out: &mut [ClusterLightRef],
    list_out: &mut [u32],
) -> Result<AssignmentStats> {
    config.validate()?;
    let total = config.total_clusters();
    if grid.len() != total || refs_out.len() != total {
        return Err(ClusterError::InvalidConfig(format!(
            "expected {} clusters, grid has {} and reference buffer has {}",
            total,
            grid.len(),
            refs_out.len()
        )));
    }
    if list_out.len() != config.light_index_capacity() {
        return Err(ClusterError::InvalidConfig(format!(
            "light index list holds {} slots, configuration needs {}",
            list_out.len(),
            config.light_index_capacity()
        )));
    }

    if u32::try_from(lights.len()).is_err() {
        return Err(ClusterError::InvalidConfig(format!(
            "{} lights exceed the u32 light index range",
            lights.len()
        )));
    }

    // View-space positions are shared by every worker.
    let view_lights: Vec<(Vec3, f32)> = lights
        .iter()
        .map(|light| (camera.world_to_view(light.position), light.strength))
        .collect();

    let max_per_cluster = config.max_lights_per_cluster as usize;
    let per_slice = config.dimensions.clusters_per_slice();
    let spans = LightIndexSpans::new(list_out);
    let truncated_clusters = AtomicUsize::new(0);
    let dropped_lights = AtomicUsize::new(0);
    let lit_clusters = AtomicUsize::new(0);

    let work = grid.chunks(per_slice).zip(refs_out.chunks_mut(per_slice));
    let options = SliceWorkerOptions {
        pin_to_cores: config.pin_workers,
    };

    let slices = config.dimensions.z as usize;
    run_per_slice("clusterpop", work, slices, options, |_slice, (bounds, refs): (&[ClusterBounds], &mut [ClusterLightRef])| {
        let mut visible: Vec<u32> = Vec::with_capacity(max_per_cluster);

        for (cluster, light_ref) in bounds.iter().zip(refs.iter_mut()) {
            visible.clear();
            let mut dropped = 0;

            for (index, (view_position, strength)) in view_lights.iter().enumerate() {
                if !light_affects_cluster(*view_position, *strength, cluster) {
                    continue;
                }
                if visible.len() < max_per_cluster {
                    visible.push(index as u32);
                } else {
                    dropped += 1;
                }
            }

            if dropped > 0 {
                truncated_clusters.fetch_add(1, Ordering::Relaxed);
                dropped_lights.fetch_add(dropped, Ordering::Relaxed);
            }

            let reservation = spans.reserve(visible.len());
            let granted = reservation.span.len();
            reservation.span.copy_from_slice(&visible[..granted]);

            if granted > 0 {
                lit_clusters.fetch_add(1, Ordering::Relaxed);
            }
            *light_ref = ClusterLightRef::new(reservation.offset, granted as u32);
        }
    })?;

    let (total_assignments, clamped_by_capacity) = spans.finish();
    let stats = AssignmentStats {
        light_count: lights.len(),
        total_assignments,
        lit_clusters: lit_clusters.into_inner(),
        truncated_clusters: truncated_clusters.into_inner(),
        dropped_lights: dropped_lights.into_inner(),
        clamped_by_capacity,
    };

    if stats.dropped_lights > 0 {
        log::warn!(
            "{} cluster(s) exceeded {} lights; {} light hit(s) dropped",
            stats.truncated_clusters,
            max_per_cluster,
            stats.dropped_lights
        );
    }
    if stats.clamped_by_capacity > 0 {
        log::warn!(
            "light index list full: {} slot(s) refused",
            stats.clamped_by_capacity
        );
    }

    Ok(stats)
}

// ============================================================================
// Tests
// ============================================================================
