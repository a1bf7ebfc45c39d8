//! Tree placement: shuffled rejection sampling over the terrain grid with
//! water-level, slope and exclusion-radius constraints.

use glam::{Mat4, Vec2, Vec3};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::grid::Grid2;

const PI: f32 = std::f32::consts::PI;

const MIN_TRUNK_HEIGHT: f32 = 6.0;
const MAX_TRUNK_HEIGHT: f32 = 15.0;
const MIN_CANOPY_SIZE: f32 = 2.0;
const MAX_CANOPY_SIZE: f32 = 7.0;
/// Height of the canopy cone above the trunk top.
const CANOPY_HEIGHT: f32 = 8.0;
const MAX_SWAY_RADIUS: f32 = 0.25;
/// One tree per this many grid cells, at most.
const CELLS_PER_TREE: usize = 2000;

#[derive(Debug, Clone, Copy)]
pub struct PlacementParams {
    pub resolution: f32,
    pub water_level: f32,
    /// Minimum normal-Y (flatness) a cell neighborhood must have.
    pub slope_limit: f32,
    /// World-space exclusion radius between trees.
    pub exclusion_radius: f32,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            resolution: 0.5,
            water_level: 0.0,
            slope_limit: 0.75,
            exclusion_radius: 3.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlacedTree {
    /// Grid cell of the trunk base.
    pub cell: (usize, usize),
    /// Trunk base in world space.
    pub position: Vec3,
    /// Ground height at the cell.
    pub ground: f32,
    /// Top of the canopy above ground.
    pub top: f32,
    /// Trunk scale, applied after the sway shear.
    pub trunk_transform: Mat4,
    /// Canopy lift + scale, applied after the sway shear.
    pub canopy_transform: Mat4,
}

pub struct Vegetation {
    pub trees: Vec<PlacedTree>,
    /// Trunk+canopy height at accepted cells; zero everywhere else.
    /// Write-once during placement.
    pub occupancy: Grid2<f32>,
    pub sway_ellipse: Vec2,
    pub sway_rotation: f32,
}

/// Places trees over the sampled grid. `offsets` are the signed grid offsets
/// `(xofs, yofs)` mapping grid indices back to world coordinates.
pub fn place(
    heights: &Grid2<f32>,
    normal_ys: &Grid2<f32>,
    params: PlacementParams,
    offsets: (i32, i32),
    rng: &mut ChaCha8Rng,
) -> Vegetation {
    let width = heights.width();
    let height = heights.height();
    let radius = (params.exclusion_radius / params.resolution).ceil() as isize;
    let target = width * height / CELLS_PER_TREE;

    let mut occupancy = Grid2::new(width, height, 0.0f32);
    let mut trees = Vec::with_capacity(target);

    // Every cell inset by the exclusion radius is a candidate; a full shuffle
    // fixes the visit order up front.
    let r = radius as usize;
    let mut candidates = Vec::with_capacity(width.saturating_sub(2 * r) * height.saturating_sub(2 * r));
    for j in r..height.saturating_sub(r) {
        for i in r..width.saturating_sub(r) {
            candidates.push((i, j));
        }
    }
    candidates.shuffle(rng);

    'candidates: for (i, j) in candidates {
        if trees.len() == target {
            break;
        }

        // Ground checks use the cell and its 4-neighborhood: the tree must
        // not stand in water and the immediate area must be flat enough.
        let h = neighborhood_min(heights, i, j);
        if h < params.water_level {
            continue;
        }
        if neighborhood_min(normal_ys, i, j) < params.slope_limit {
            continue;
        }

        // L1 exclusion disk against already-placed trees.
        for ci in -radius..=radius {
            let mj = radius - ci.abs();
            for cj in -mj..=mj {
                let ni = (i as isize + ci) as usize;
                let nj = (j as isize + cj) as usize;
                if occupancy.get(ni, nj) > 0.0 {
                    continue 'candidates;
                }
            }
        }

        let trunk_height = rng.random_range(MIN_TRUNK_HEIGHT..MAX_TRUNK_HEIGHT);
        let canopy_size = rng.random_range(MIN_CANOPY_SIZE..MAX_CANOPY_SIZE);
        occupancy.set(i, j, trunk_height + CANOPY_HEIGHT);

        let position = Vec3::new(
            (i as i32 - offsets.0) as f32 * params.resolution,
            h,
            -((j as i32 - offsets.1) as f32) * params.resolution,
        );

        trees.push(PlacedTree {
            cell: (i, j),
            position,
            ground: h,
            top: h + trunk_height + CANOPY_HEIGHT,
            trunk_transform: Mat4::from_scale(Vec3::new(1.0, trunk_height, 1.0)),
            canopy_transform: Mat4::from_translation(Vec3::new(0.0, trunk_height, 0.0))
                * Mat4::from_scale(Vec3::new(canopy_size, 1.0, canopy_size)),
        });
    }

    let sway_ellipse = Vec2::new(
        rng.random_range(0.0..MAX_SWAY_RADIUS),
        rng.random_range(0.0..MAX_SWAY_RADIUS),
    );
    let sway_rotation = rng.random_range(0.0..2.0 * PI);

    Vegetation {
        trees,
        occupancy,
        sway_ellipse,
        sway_rotation,
    }
}

fn neighborhood_min(grid: &Grid2<f32>, i: usize, j: usize) -> f32 {
    grid.get(i, j)
        .min(grid.get(i + 1, j))
        .min(grid.get(i - 1, j))
        .min(grid.get(i, j - 1))
        .min(grid.get(i, j + 1))
}
