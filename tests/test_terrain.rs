//! Terrain build pipeline: tiling, seams, height queries, culling.

mod common;

use std::collections::HashMap;

use glam::{Mat4, Vec3};

use glade3d::config::SceneConfig;
use glade3d::frustum::{plane_distance_aabb, Frustum};
use glade3d::terrain::Terrain;

use common::MockDevice;

fn config(extent: f32) -> SceneConfig {
    SceneConfig {
        terrain_width: extent,
        terrain_depth: extent,
        resolution: 0.5,
        seed: Some(1),
        ..SceneConfig::default()
    }
}

fn build(extent: f32, seed: u64) -> (Terrain, MockDevice) {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = MockDevice::default();
    let terrain = Terrain::new(&config(extent), seed, &device).unwrap();
    (terrain, device)
}

#[test]
fn partition_counts_follow_the_sample_grid() {
    // 256 units at 0.5 resolution gives 513 samples per axis, which spans
    // five 128-cell divisions; the trailing division is degenerate and stays
    // an empty tile.
    let (terrain, _) = build(256.0, 7);
    assert_eq!(terrain.tile_count(), 25);
    assert_eq!(
        terrain.tiles().iter().filter(|t| !t.is_empty()).count(),
        16
    );
}

#[test]
fn full_size_domain_partitions_into_81_tiles() {
    // 512 units at 0.5 resolution: 1025 samples per axis, nine divisions
    // each way. Boundary tiles are smaller and the trailing division is
    // empty.
    let (terrain, _) = build(512.0, 1);
    assert_eq!(terrain.tile_count(), 81);

    // Global extrema are the fold of the per-tile extrema; empty tiles are
    // identity elements.
    let min = terrain
        .tiles()
        .iter()
        .fold(f32::INFINITY, |m, t| m.min(t.min_height));
    let max = terrain
        .tiles()
        .iter()
        .fold(f32::NEG_INFINITY, |m, t| m.max(t.max_height));
    assert_eq!(min, terrain.global_min_height());
    assert_eq!(max, terrain.global_max_height());
}

#[test]
fn builds_are_deterministic_for_a_fixed_seed() {
    let (a, _) = build(128.0, 42);
    let (b, _) = build(128.0, 42);
    assert_eq!(a.global_min_height(), b.global_min_height());
    assert_eq!(a.global_max_height(), b.global_max_height());
    assert_eq!(a.tree_count(), b.tree_count());
    for x in [-60.0f32, -13.5, 0.0, 27.25, 63.0] {
        assert_eq!(a.height_at(x, -x), b.height_at(x, -x));
    }
}

#[test]
fn tile_meshes_agree_at_shared_boundaries() {
    // 128 units at 0.5 resolution makes a 2x2 grid of real tiles with
    // interior seams.
    let (_, device) = build(128.0, 3);
    let meshes = device.meshes.borrow();
    let tiles: Vec<_> = meshes
        .iter()
        .filter(|m| m.colors.is_empty() && !m.normals.is_empty())
        .collect();
    assert_eq!(tiles.len(), 4);

    let mut seen: HashMap<(i32, i32), (Vec3, Vec3)> = HashMap::new();
    let mut shared = 0;
    for mesh in &tiles {
        for (pos, nrm) in mesh.positions.iter().zip(&mesh.normals) {
            let key = ((pos.x * 2.0).round() as i32, (pos.z * 2.0).round() as i32);
            if let Some((other_pos, other_nrm)) = seen.get(&key) {
                shared += 1;
                assert!(pos.abs_diff_eq(*other_pos, 1e-6), "position seam at {key:?}");
                assert!(nrm.abs_diff_eq(*other_nrm, 1e-6), "normal seam at {key:?}");
            } else {
                seen.insert(key, (*pos, *nrm));
            }
        }
    }
    // Two 257-sample seams crossing in the middle.
    assert!(shared > 500, "expected hundreds of shared samples, got {shared}");
}

#[test]
fn height_queries_match_mesh_vertices_at_grid_points() {
    let (terrain, device) = build(128.0, 3);
    let meshes = device.meshes.borrow();
    let tile = meshes
        .iter()
        .find(|m| m.colors.is_empty() && !m.normals.is_empty())
        .unwrap();

    for pos in tile.positions.iter().step_by(97) {
        let queried = terrain.height_at(pos.x, pos.z);
        assert!(
            (queried - pos.y).abs() < 1e-5,
            "height_at({}, {}) = {queried}, mesh has {}",
            pos.x,
            pos.z,
            pos.y
        );
    }
}

#[test]
fn height_queries_match_mesh_vertices_along_the_far_edges() {
    // 128 units at 0.5 resolution spans three 128-cell divisions per axis
    // with a degenerate trailing division, so the far boundary samples are
    // owned by interior divisions rather than the last one.
    let (terrain, device) = build(128.0, 3);
    let meshes = device.meshes.borrow();

    let mut edge_samples = 0;
    for mesh in meshes
        .iter()
        .filter(|m| m.colors.is_empty() && !m.normals.is_empty())
    {
        for pos in &mesh.positions {
            if pos.x < 64.0 && pos.z > -64.0 {
                continue;
            }
            edge_samples += 1;
            let queried = terrain.height_at(pos.x, pos.z);
            assert!(
                (queried - pos.y).abs() < 1e-5,
                "height_at({}, {}) = {queried}, mesh vertex height = {}",
                pos.x,
                pos.z,
                pos.y
            );
        }
    }
    // Both far edges of a 257-sample grid.
    assert!(edge_samples >= 513, "expected the full boundary strip, got {edge_samples}");
}

#[test]
fn height_query_outside_the_domain_is_negative_infinity() {
    let (terrain, _) = build(128.0, 3);
    assert_eq!(terrain.height_at(64.3, 0.0), f32::NEG_INFINITY);
    assert_eq!(terrain.height_at(0.0, -64.3), f32::NEG_INFINITY);
    assert_eq!(terrain.height_at(-1000.0, 1000.0), f32::NEG_INFINITY);
    assert!(terrain.height_at(0.0, 0.0).is_finite());
}

#[test]
fn interior_heights_are_interpolated_between_samples() {
    let (terrain, _) = build(128.0, 3);
    // A point strictly inside a cell lies between the cell's corner extremes.
    let corners = [
        terrain.height_at(10.0, -10.0),
        terrain.height_at(10.5, -10.0),
        terrain.height_at(10.0, -10.5),
        terrain.height_at(10.5, -10.5),
    ];
    let lo = corners.iter().fold(f32::INFINITY, |m, h| m.min(*h));
    let hi = corners.iter().fold(f32::NEG_INFINITY, |m, h| m.max(*h));
    let mid = terrain.height_at(10.25, -10.25);
    assert!(mid >= lo - 1e-5 && mid <= hi + 1e-5);
}

#[test]
fn global_extrema_bound_every_sample() {
    let (terrain, _) = build(128.0, 11);
    for i in -32..=32 {
        for j in -32..=32 {
            let h = terrain.height_at(i as f32 * 2.0, j as f32 * 2.0);
            assert!(h >= terrain.global_min_height() - 1e-5);
            assert!(h <= terrain.global_max_height() + 1e-5);
        }
    }
}

#[test]
fn visible_tiles_are_sorted_front_to_back() {
    let (terrain, _) = build(256.0, 7);

    let height = terrain.global_max_height() + 30.0;
    let view = Mat4::look_at_rh(
        Vec3::new(0.0, height, 120.0),
        Vec3::new(0.0, 0.0, -100.0),
        Vec3::Y,
    );
    let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 1.5, 0.5, 800.0);
    let view_proj = projection * view;

    let visible = terrain.visible_tiles(view_proj);
    assert!(!visible.is_empty());

    let frustum = Frustum::from_view_projection(view_proj);
    let mut last = f32::NEG_INFINITY;
    for tile in &visible {
        assert!(!tile.is_empty());
        assert!(frustum.intersects_aabb(tile.aabb_min, tile.aabb_max));
        let d = plane_distance_aabb(frustum.near, tile.aabb_min, tile.aabb_max);
        assert!(d >= last, "tiles out of order: {d} after {last}");
        last = d;
    }
}

#[test]
fn tree_placement_respects_the_density_target() {
    let (terrain, _) = build(256.0, 7);
    let cells = 513usize * 513;
    assert!(terrain.tree_count() <= cells / 2000);
}
