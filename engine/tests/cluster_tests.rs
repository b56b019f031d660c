//! Cluster Tests - Grid Generation and Light Assignment
//!
//! End-to-end tests for `ClusterSpace`: grid layout, depth slicing, the
//! light-index list, fragment lookup and configuration loading.

use choks_engine::camera::Camera;
use choks_engine::render::{
    ClusterBounds, ClusterConfig, ClusterDimensions, ClusterSpace, Light, RegenerationPolicy,
};
use choks_engine::ClusterError;
use glam::{Vec2, Vec3, Vec4};

// ============================================================================
// Helpers
// ============================================================================

/// The camera used by the demo: 10 units behind the origin, looking at it.
fn demo_camera() -> Camera {
    Camera::new(
        Vec3::new(0.0, 0.0, -10.0),
        Vec3::new(0.0, 90.0, 0.0),
        120.0,
        4.0 / 3.0,
        0.1,
        1000.0,
    )
}

fn built_space(camera: &Camera) -> ClusterSpace {
    let mut space = ClusterSpace::new(ClusterConfig::default()).unwrap();
    space.generate_grid(camera).unwrap();
    space
}

/// Small deterministic generator so light sets are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32) / (1u64 << 24) as f32
    }

    fn range(&mut self, min: f32, max: f32) -> f32 {
        min + (max - min) * self.next_f32()
    }
}

fn scattered_lights(count: usize, seed: u64) -> Vec<Light> {
    let mut rng = Lcg(seed);
    (0..count)
        .map(|_| {
            Light::point(
                Vec3::new(rng.range(-20.0, 20.0), rng.range(-10.0, 10.0), rng.range(-5.0, 40.0)),
                rng.range(0.5, 6.0),
            )
        })
        .collect()
}

fn bounds_contain(bounds: &ClusterBounds, point: Vec3, tolerance: f32) -> bool {
    bounds.squared_distance_to(point.to_array()) <= tolerance * tolerance
}

// ============================================================================
// Grid Layout Tests
// ============================================================================

#[test]
fn test_index_round_trip_covers_grid() {
    let dims = ClusterDimensions::default();
    for index in 0..dims.total() {
        let xyz = dims.index_to_xyz(index);
        assert!(dims.contains(xyz));
        assert_eq!(dims.xyz_to_index(xyz), index);
    }
}

#[test]
fn test_grid_bounds_are_ordered() {
    let space = built_space(&demo_camera());
    assert_eq!(space.clusters().len(), 1000);

    for (i, b) in space.clusters().iter().enumerate() {
        let (min, max) = (b.min(), b.max());
        for axis in 0..3 {
            assert!(min[axis] <= max[axis], "cluster {} axis {}", i, axis);
        }
    }
}

#[test]
fn test_depth_slices_are_contiguous() {
    let space = built_space(&demo_camera());
    let dims = space.config().dimensions;

    for y in 0..dims.y {
        for x in 0..dims.x {
            for z in 0..dims.z - 1 {
                let nearer = space.clusters()[dims.xyz_to_index([x, y, z])];
                let farther = space.clusters()[dims.xyz_to_index([x, y, z + 1])];
                let tolerance = nearer.min_z.abs() * 1e-4;
                assert!(
                    (nearer.min_z - farther.max_z).abs() <= tolerance,
                    "gap between slices {} and {} in column ({}, {})",
                    z,
                    z + 1,
                    x,
                    y
                );
            }
        }
    }
}

#[test]
fn test_grid_spans_near_to_far() {
    let camera = demo_camera();
    let space = built_space(&camera);
    let dims = space.config().dimensions;

    let first = space.clusters()[dims.xyz_to_index([5, 5, 0])];
    let last = space.clusters()[dims.xyz_to_index([5, 5, dims.z - 1])];
    assert!((first.max_z + camera.near).abs() < 1e-4);
    assert!((last.min_z + camera.far).abs() < camera.far * 1e-4);
}

#[test]
fn test_grid_is_deterministic() {
    let camera = demo_camera();
    let a = built_space(&camera);
    let b = built_space(&camera);

    let bytes_a: &[u8] = bytemuck::cast_slice(a.clusters());
    let bytes_b: &[u8] = bytemuck::cast_slice(b.clusters());
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn test_custom_grid_dimensions() {
    let config = ClusterConfig {
        dimensions: ClusterDimensions::new(16, 9, 24),
        max_lights_per_cluster: 32,
        screen_width: 1920,
        screen_height: 1080,
        pin_workers: true,
    };
    let camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, -90.0, 0.0), 70.0, 16.0 / 9.0, 0.5, 300.0);
    let mut space = ClusterSpace::new(config).unwrap();
    space.generate_grid(&camera).unwrap();

    assert_eq!(space.clusters().len(), 16 * 9 * 24);
    assert_eq!(space.light_index_capacity(), 16 * 9 * 24 * 32);

    let stats = space.assign_lights(&camera, &scattered_lights(100, 7)).unwrap();
    assert_eq!(stats.total_assignments, space.light_index_count());
}

// ============================================================================
// Light Assignment Tests
// ============================================================================

#[test]
fn test_light_spans_partition_the_list() {
    let camera = demo_camera();
    let mut space = built_space(&camera);
    let lights = scattered_lights(300, 42);

    let stats = space.assign_lights(&camera, &lights).unwrap();
    let count = space.light_index_count();
    assert_eq!(stats.total_assignments, count);
    assert_eq!(space.light_indices().len(), count);

    let total_length: usize = space.light_refs().iter().map(|r| r.length as usize).sum();
    assert_eq!(total_length, count);

    let mut spans: Vec<_> = space
        .light_refs()
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| r.range())
        .collect();
    spans.sort_by_key(|r| r.start);
    for pair in spans.windows(2) {
        assert!(pair[0].end <= pair[1].start, "spans {:?} and {:?} overlap", pair[0], pair[1]);
    }
    if let Some(last) = spans.last() {
        assert!(last.end <= count);
    }

    let cap = space.config().max_lights_per_cluster as usize;
    for r in space.light_refs() {
        assert!(r.length as usize <= cap);
    }
    for &index in space.light_indices() {
        assert!((index as usize) < lights.len());
    }
}

#[test]
fn test_contained_light_is_listed() {
    let camera = demo_camera();
    let mut space = built_space(&camera);

    // The world origin sits 10 units in front of the camera.
    let lights = [Light::point(Vec3::ZERO, 0.5)];
    space.assign_lights(&camera, &lights).unwrap();

    let view = camera.world_to_view(Vec3::ZERO);
    let mut containing = 0;
    for (i, bounds) in space.clusters().iter().enumerate() {
        if bounds.contains_point(view.to_array()) {
            containing += 1;
            assert!(space.lights_in_cluster(i).contains(&0), "cluster {} misses the light", i);
        }
    }
    assert!(containing > 0);
}

#[test]
fn test_distant_light_is_culled() {
    let mut camera = Camera::default();
    camera.far = 50.0;
    camera.update_projection();
    let mut space = built_space(&camera);

    let lights = [Light::point(Vec3::new(0.0, 0.0, -1000.0), 1.0)];
    let stats = space.assign_lights(&camera, &lights).unwrap();
    assert_eq!(stats.total_assignments, 0);
    assert_eq!(stats.lit_clusters, 0);
    assert!(space.light_indices().is_empty());
}

#[test]
fn test_inactive_lights_are_ignored() {
    let camera = demo_camera();
    let mut space = built_space(&camera);

    let lights = [
        Light::point(Vec3::ZERO, 0.0),
        Light::point(Vec3::ZERO, -2.0),
        Light::point(Vec3::ZERO, f32::NAN),
    ];
    let stats = space.assign_lights(&camera, &lights).unwrap();
    assert_eq!(stats.light_count, 3);
    assert_eq!(stats.total_assignments, 0);
}

#[test]
fn test_assignment_sets_are_deterministic() {
    let camera = demo_camera();
    let lights = scattered_lights(200, 9);

    let mut a = built_space(&camera);
    let mut b = built_space(&camera);
    a.assign_lights(&camera, &lights).unwrap();
    b.assign_lights(&camera, &lights).unwrap();

    // Span offsets depend on worker scheduling; the per-cluster sets do not.
    for cluster in 0..a.clusters().len() {
        assert_eq!(a.lights_in_cluster(cluster), b.lights_in_cluster(cluster));
    }
}

#[test]
fn test_overfull_cluster_is_truncated() {
    let camera = demo_camera();
    let mut space = built_space(&camera);
    let cap = space.config().max_lights_per_cluster as usize;

    let lights: Vec<Light> = (0..cap + 20).map(|_| Light::point(Vec3::ZERO, 0.25)).collect();
    let stats = space.assign_lights(&camera, &lights).unwrap();
    assert!(stats.truncated_clusters > 0);
    assert!(stats.dropped_lights >= 20);
    assert_eq!(stats.clamped_by_capacity, 0);

    for cluster in 0..space.clusters().len() {
        let listed = space.lights_in_cluster(cluster);
        assert!(listed.len() <= cap);
        if listed.len() == cap {
            let expected: Vec<u32> = (0..cap as u32).collect();
            assert_eq!(listed, expected.as_slice(), "lowest indices are kept");
        }
    }
}

#[test]
fn test_assign_before_grid_is_rejected() {
    let mut space = ClusterSpace::new(ClusterConfig::default()).unwrap();
    let result = space.assign_lights(&demo_camera(), &scattered_lights(4, 1));
    assert!(matches!(result, Err(ClusterError::GridNotBuilt)));
}

#[test]
fn test_failed_grid_pass_keeps_published_data() {
    let mut camera = demo_camera();
    let mut space = built_space(&camera);
    space.assign_lights(&camera, &scattered_lights(50, 3)).unwrap();

    let grid = space.clusters().to_vec();
    let refs = space.light_refs().to_vec();
    let indices = space.light_indices().to_vec();

    camera.near = 0.0;
    camera.update_projection();
    assert!(space.generate_grid(&camera).is_err());

    assert_eq!(space.clusters(), grid.as_slice());
    assert_eq!(space.light_refs(), refs.as_slice());
    assert_eq!(space.light_indices(), indices.as_slice());
}

// ============================================================================
// Regeneration Tests
// ============================================================================

#[test]
fn test_zoom_sequence_regenerates_on_projection_change() {
    let mut camera = demo_camera();
    let mut space = ClusterSpace::new(ClusterConfig::default()).unwrap();

    let mut rebuilds = 0;
    for frame in 0..90 {
        if frame > 0 && frame % 30 == 0 {
            camera.fov = if camera.fov == 120.0 { 60.0 } else { 120.0 };
            camera.update_projection();
        }
        camera.transform.position.x = frame as f32 * 0.1;
        camera.update_view();
        if space.update_grid(&camera).unwrap() {
            rebuilds += 1;
        }
    }
    assert_eq!(rebuilds, 3);
}

#[test]
fn test_lens_change_before_matrix_refresh_builds_new_grid() {
    let mut camera = demo_camera();
    let mut space = built_space(&camera);

    // Lens edited, cached projection matrix not refreshed yet.
    camera.fov = 100.0;
    assert!(space.update_grid(&camera).unwrap());
    camera.update_projection();
    assert!(!space.update_grid(&camera).unwrap());

    let fresh = built_space(&camera);
    let published: &[u8] = bytemuck::cast_slice(space.clusters());
    let expected: &[u8] = bytemuck::cast_slice(fresh.clusters());
    assert_eq!(published, expected, "grid must match the 100 degree lens");
}

#[test]
fn test_any_change_policy_follows_motion() {
    let mut camera = demo_camera();
    let mut space =
        ClusterSpace::with_policy(ClusterConfig::default(), RegenerationPolicy::AnyCameraChange).unwrap();

    assert!(space.update_grid(&camera).unwrap());
    assert!(!space.update_grid(&camera).unwrap());

    camera.transform.rotate.x = 10.0;
    camera.update_view();
    assert!(space.update_grid(&camera).unwrap());
    assert_eq!(space.tracker().policy(), RegenerationPolicy::AnyCameraChange);
}

// ============================================================================
// Fragment Lookup Tests
// ============================================================================

#[test]
fn test_fragment_lookup_finds_containing_cluster() {
    let camera = demo_camera();
    let space = built_space(&camera);
    let width = space.config().screen_width as f32;
    let height = space.config().screen_height as f32;

    let points = [
        Vec3::new(1.0, -0.5, -10.0),
        Vec3::new(-3.0, 2.0, -37.0),
        Vec3::new(0.02, 0.01, -0.5),
        Vec3::new(150.0, -90.0, -400.0),
    ];

    for view in points {
        let clip = camera.projection() * Vec4::new(view.x, view.y, view.z, 1.0);
        let ndc = clip.truncate() / clip.w;
        let pixel = Vec2::new((ndc.x + 1.0) * 0.5 * width, (1.0 - ndc.y) * 0.5 * height);

        let cluster = space
            .cluster_index_for_fragment(pixel, view.z)
            .unwrap_or_else(|| panic!("no cluster for {:?} at pixel {:?}", view, pixel));
        let bounds = space.clusters()[cluster];
        assert!(
            bounds_contain(&bounds, view, view.z.abs() * 1e-3),
            "cluster {} {:?} does not contain {:?}",
            cluster,
            bounds,
            view
        );
    }
}

#[test]
fn test_fragment_lookup_outside_frustum() {
    let camera = demo_camera();
    let space = built_space(&camera);
    assert_eq!(space.cluster_index_for_fragment(Vec2::new(10.0, 10.0), -0.05), None);
    assert_eq!(space.cluster_index_for_fragment(Vec2::new(10.0, 10.0), -2000.0), None);
    assert_eq!(space.cluster_index_for_fragment(Vec2::new(1280.0, 10.0), -5.0), None);
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_config_from_json_partial() {
    let config = ClusterConfig::from_json_str(
        r#"{ "dimensions": { "x": 8, "y": 4, "z": 16 }, "max_lights_per_cluster": 12 }"#,
    )
    .unwrap();
    assert_eq!(config.dimensions, ClusterDimensions::new(8, 4, 16));
    assert_eq!(config.max_lights_per_cluster, 12);
    assert_eq!(config.screen_width, 1280);
    assert_eq!(config.screen_height, 800);
    assert!(!config.pin_workers);
}

#[test]
fn test_config_from_json_errors() {
    assert!(matches!(
        ClusterConfig::from_json_str("{ not json"),
        Err(ClusterError::ConfigParse(_))
    ));
    assert!(matches!(
        ClusterConfig::from_json_str(r#"{ "dimensions": { "x": 0, "y": 4, "z": 4 } }"#),
        Err(ClusterError::InvalidConfig(_))
    ));
}

#[test]
fn test_lights_load_from_json() {
    let lights: Vec<Light> = serde_json::from_str(
        r#"[
            { "position": [0.0, 1.0, 2.0], "strength": 3.0 },
            { "position": [4.0, 5.0, 6.0], "kind": "point", "strength": 7.0 }
        ]"#,
    )
    .unwrap();
    assert_eq!(lights.len(), 2);
    assert_eq!(lights[1], Light::point(Vec3::new(4.0, 5.0, 6.0), 7.0));
}
