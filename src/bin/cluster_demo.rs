//! Cluster Demo
//!
//! Headless driver for the clustering passes. Sets up the reference camera,
//! animates a ring of point lights around the origin and runs a fixed number
//! of frames, zooming between 120° and 60° FOV every few frames so the grid
//! gets regenerated.
//!
//! Usage:
//!   cluster_demo [config.json] [lights.json]
//!
//! `config.json` holds a `ClusterConfig` (missing fields use the defaults);
//! `lights.json` holds an array of lights and replaces the animated ring.
//! Set `RUST_LOG=debug` to see per-pass timings.

use std::error::Error;
use std::f32::consts::TAU;
use std::fs;
use std::time::Instant;

use choks_engine::camera::Camera;
use choks_engine::render::{ClusterConfig, ClusterSpace, Light};
use glam::{Vec2, Vec3};

const FRAME_COUNT: u32 = 120;
const FRAMES_PER_ZOOM: u32 = 30;
const FRAME_TIME: f32 = 1.0 / 60.0;

const WIDE_FOV: f32 = 120.0;
const NARROW_FOV: f32 = 60.0;

const RING_LIGHTS: usize = 64;
const RING_RADIUS: f32 = 8.0;
const RING_LIGHT_STRENGTH: f32 = 2.5;

fn ring_lights(time: f32) -> Vec<Light> {
    (0..RING_LIGHTS)
        .map(|i| {
            let angle = i as f32 / RING_LIGHTS as f32 * TAU + time * 0.5;
            let bob = (time * 2.0 + i as f32).sin() * 1.5;
            Light::point(
                Vec3::new(angle.cos() * RING_RADIUS, bob, angle.sin() * RING_RADIUS),
                RING_LIGHT_STRENGTH,
            )
        })
        .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => ClusterConfig::from_json_str(&fs::read_to_string(&path)?)?,
        None => ClusterConfig::default(),
    };
    let fixed_lights: Option<Vec<Light>> = match args.next() {
        Some(path) => Some(serde_json::from_str(&fs::read_to_string(&path)?)?),
        None => None,
    };

    log::info!(
        "cluster grid {}x{}x{}, {} lights per cluster, {}x{} screen",
        config.dimensions.x,
        config.dimensions.y,
        config.dimensions.z,
        config.max_lights_per_cluster,
        config.screen_width,
        config.screen_height
    );

    let mut camera = Camera::new(
        Vec3::new(0.0, 0.0, -10.0),
        Vec3::new(0.0, 90.0, 0.0),
        WIDE_FOV,
        4.0 / 3.0,
        0.1,
        1000.0,
    );
    let mut clusters = ClusterSpace::new(config)?;

    let mut rebuilds = 0;
    let mut assign_time = 0.0;
    for frame in 0..FRAME_COUNT {
        if frame > 0 && frame % FRAMES_PER_ZOOM == 0 {
            camera.fov = if camera.fov == WIDE_FOV { NARROW_FOV } else { WIDE_FOV };
            camera.update_projection();
            log::info!("frame {frame}: zoom to {}° fov", camera.fov);
        }
        camera.update_view();

        let started = Instant::now();
        if clusters.update_grid(&camera)? {
            rebuilds += 1;
            log::info!(
                "frame {frame}: grid regenerated in {:.3} ms",
                started.elapsed().as_secs_f64() * 1000.0
            );
        }

        let lights = match &fixed_lights {
            Some(lights) => lights.clone(),
            None => ring_lights(frame as f32 * FRAME_TIME),
        };

        let started = Instant::now();
        let stats = clusters.assign_lights(&camera, &lights)?;
        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        assign_time += elapsed;

        if frame % FRAMES_PER_ZOOM == 0 {
            log::info!(
                "frame {frame}: {} lights -> {} entries in {} clusters ({:.3} ms)",
                stats.light_count,
                stats.total_assignments,
                stats.lit_clusters,
                elapsed
            );
        }
    }

    // Lights seen by a fragment at the screen center, 10 units ahead.
    let center = Vec2::new(
        clusters.config().screen_width as f32 * 0.5,
        clusters.config().screen_height as f32 * 0.5,
    );
    if let Some(cluster) = clusters.cluster_index_for_fragment(center, -10.0) {
        log::info!(
            "center cluster {cluster}: lights {:?}",
            clusters.lights_in_cluster(cluster)
        );
    }

    log::info!(
        "{FRAME_COUNT} frames, {rebuilds} grid rebuild(s), average assignment {:.3} ms",
        assign_time / FRAME_COUNT as f64
    );
    Ok(())
}
