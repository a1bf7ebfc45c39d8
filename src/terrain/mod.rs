//! Tiled heightfield terrain.
//!
//! The sampled domain is partitioned into tiles of at most
//! [`MAX_TILE_CELLS`] cells per axis and meshed concurrently, one worker
//! thread per tile beyond the first. Each tile owns an exclusive write region
//! of the shared height/normal sample grids, so the grid-write phase needs no
//! synchronization; the only contended structure is the finished-tile list
//! behind a single mutex. GPU uploads happen on the calling thread after all
//! workers are joined.

pub mod heightfield;
pub mod vegetation;

use std::cell::UnsafeCell;
use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec2, Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::SceneConfig;
use crate::error::SceneResult;
use crate::frustum::{plane_distance_aabb, Frustum};
use crate::gfx::{GpuTexture, RenderDevice, RenderMesh, ShaderProgram, TextureData, UniformValue};
use crate::grid::Grid2;
use crate::mesh::{self, MeshData};
use crate::scene::lighting::Lighting;

use heightfield::HeightField;
use vegetation::{PlacementParams, Vegetation};

/// Maximum tile extent, in grid cells per axis.
pub const MAX_TILE_CELLS: i32 = 128;

const PI: f32 = std::f32::consts::PI;
const DIRT_TEXTURE_SIZE: u32 = 64;

/// One rectangular partition of the sample grid, meshed independently.
pub struct TerrainTile {
    pub mesh: Option<Arc<dyn RenderMesh>>,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
    pub min_height: f32,
    pub max_height: f32,
}

impl TerrainTile {
    fn empty() -> Self {
        Self {
            mesh: None,
            aabb_min: Vec3::ZERO,
            aabb_max: Vec3::ZERO,
            min_height: f32::INFINITY,
            max_height: f32::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mesh.is_none()
    }
}

/// Output of one tile worker, before upload.
struct TileBuild {
    ci: usize,
    cj: usize,
    mesh: MeshData,
    min_height: f32,
    max_height: f32,
    aabb_min: Vec3,
    aabb_max: Vec3,
}

/// Shared sample grid written concurrently by tile workers.
///
/// Each worker writes only the cells its tile owns (the one-cell boundary
/// overlap is resolved by the outer-edge ownership convention), so regions
/// are disjoint by construction and no synchronization is required.
struct SharedGrid {
    width: usize,
    cells: Vec<UnsafeCell<f32>>,
}

// SAFETY: workers write disjoint index sets (enforced by the tile ownership
// convention in `build_tile`), and no reads happen until after join.
unsafe impl Sync for SharedGrid {}

impl SharedGrid {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            cells: (0..width * height).map(|_| UnsafeCell::new(0.0)).collect(),
        }
    }

    /// Caller must own cell `(i, j)` per the tile write convention.
    unsafe fn write(&self, i: usize, j: usize, value: f32) {
        *self.cells[j * self.width + i].get() = value;
    }

    fn into_grid(self, height: usize) -> Grid2<f32> {
        let width = self.width;
        let data = self.cells.into_iter().map(UnsafeCell::into_inner).collect();
        Grid2::from_vec(width, height, data)
    }
}

pub struct Terrain {
    field: HeightField,
    resolution: f32,

    heights: Grid2<f32>,
    normal_ys: Grid2<f32>,
    xofs: i32,
    yofs: i32,

    tiles: Vec<TerrainTile>,
    divs_x: usize,
    divs_y: usize,
    global_min_height: f32,
    global_max_height: f32,

    vegetation: Vegetation,
    trunk_mesh: Option<Arc<dyn RenderMesh>>,
    canopy_mesh: Option<Arc<dyn RenderMesh>>,
    trunk_instances: Vec<Mat4>,
    canopy_instances: Vec<Mat4>,

    terrain_program: Arc<dyn ShaderProgram>,
    trees_program: Arc<dyn ShaderProgram>,
    dirt_texture: Arc<dyn GpuTexture>,

    time: f32,
}

impl Terrain {
    pub fn new(config: &SceneConfig, seed: u64, device: &dyn RenderDevice) -> SceneResult<Self> {
        let resolution = config.resolution;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let field = HeightField::new(rng.random::<i32>());

        let hw = (0.5 * config.terrain_width / resolution) as i32;
        let hh = (0.5 * config.terrain_depth / resolution) as i32;
        let samples_x = (2 * hw + 1) as usize;
        let samples_y = (2 * hh + 1) as usize;

        let divs_x = samples_x.div_ceil(MAX_TILE_CELLS as usize);
        let divs_y = samples_y.div_ceil(MAX_TILE_CELLS as usize);

        log::info!(
            "building terrain: {}x{} samples, {}x{} tiles",
            samples_x,
            samples_y,
            divs_x,
            divs_y
        );

        let heights = SharedGrid::new(samples_x, samples_y);
        let normal_ys = SharedGrid::new(samples_x, samples_y);
        let builds: Mutex<Vec<TileBuild>> = Mutex::new(Vec::with_capacity(divs_x * divs_y));

        std::thread::scope(|scope| {
            let mut first = None;
            for cj in 0..divs_y {
                for ci in 0..divs_x {
                    let rect = TileRect::for_division(ci, cj, hw, hh);
                    if ci == 0 && cj == 0 {
                        first = Some(rect);
                        continue;
                    }
                    let (field, heights, normal_ys, builds) = (&field, &heights, &normal_ys, &builds);
                    scope.spawn(move || {
                        build_tile(field, rect, resolution, heights, normal_ys, builds)
                    });
                }
            }
            // The first tile runs on the calling thread.
            if let Some(rect) = first {
                build_tile(&field, rect, resolution, &heights, &normal_ys, &builds);
            }
        });

        let heights = heights.into_grid(samples_y);
        let normal_ys = normal_ys.into_grid(samples_y);

        // Upload on the calling thread: GPU command issuance is
        // single-threaded per the collaborator contract.
        let mut tiles: Vec<TerrainTile> = (0..divs_x * divs_y).map(|_| TerrainTile::empty()).collect();
        for build in builds.into_inner().unwrap_or_default() {
            let slot = &mut tiles[build.cj * divs_x + build.ci];
            slot.mesh = Some(device.create_mesh(&build.mesh)?);
            slot.aabb_min = build.aabb_min;
            slot.aabb_max = build.aabb_max;
            slot.min_height = build.min_height;
            slot.max_height = build.max_height;
        }

        let terrain_program = device.load_program(&[
            "shaders/position.vert",
            "shaders/lighting.frag",
            "shaders/terrain.vert",
            "shaders/terrain.frag",
        ])?;
        let trees_program = device.load_program(&[
            "shaders/position.vert",
            "shaders/lighting.frag",
            "shaders/objects.vert",
            "shaders/objects.frag",
        ])?;

        // Vegetation placement and the tree meshes.
        let vegetation = vegetation::place(
            &heights,
            &normal_ys,
            PlacementParams {
                resolution,
                water_level: config.water_level,
                ..PlacementParams::default()
            },
            (hw, hh),
            &mut ChaCha8Rng::seed_from_u64(rng.random::<u64>()),
        );
        log::info!("placed {} trees", vegetation.trees.len());

        // Canopies can top the bare-terrain maximum; widen tile extrema so
        // culling AABBs stay correct.
        for tree in &vegetation.trees {
            let ci = tree.cell.0 / MAX_TILE_CELLS as usize;
            let cj = tree.cell.1 / MAX_TILE_CELLS as usize;
            let tile = &mut tiles[cj * divs_x + ci];
            tile.min_height = tile.min_height.min(tree.ground);
            tile.max_height = tile.max_height.max(tree.top);
            tile.aabb_min.y = tile.min_height;
            tile.aabb_max.y = tile.max_height;
        }

        let global_min_height = tiles.iter().fold(f32::INFINITY, |m, t| m.min(t.min_height));
        let global_max_height = tiles
            .iter()
            .fold(f32::NEG_INFINITY, |m, t| m.max(t.max_height));

        let trunk_data = mesh::open_cylinder(
            Vec3::ZERO,
            Vec3::Y,
            1.0,
            config.palette.trunk,
            Some(32),
        );
        let canopy_data = mesh::closed_cone(
            Vec3::ZERO,
            Vec3::new(0.0, 8.0, 0.0),
            1.0,
            config.palette.canopy,
            Some(32),
        );
        let trunk_mesh = (!trunk_data.is_empty())
            .then(|| device.create_mesh(&trunk_data))
            .transpose()?;
        let canopy_mesh = (!canopy_data.is_empty())
            .then(|| device.create_mesh(&canopy_data))
            .transpose()?;

        let dirt_texture =
            device.create_texture(&dirt_texture(&mut ChaCha8Rng::seed_from_u64(rng.random())))?;

        let mut terrain = Self {
            field,
            resolution,
            heights,
            normal_ys,
            xofs: hw,
            yofs: hh,
            tiles,
            divs_x,
            divs_y,
            global_min_height,
            global_max_height,
            vegetation,
            trunk_mesh,
            canopy_mesh,
            trunk_instances: Vec::new(),
            canopy_instances: Vec::new(),
            terrain_program,
            trees_program,
            dirt_texture,
            time: 0.0,
        };
        terrain.set_colors(
            config.palette.grass,
            config.palette.sand,
            config.palette.mountain,
        );
        terrain.update(0.0);
        Ok(terrain)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tiles(&self) -> &[TerrainTile] {
        &self.tiles
    }

    pub fn global_min_height(&self) -> f32 {
        self.global_min_height
    }

    pub fn global_max_height(&self) -> f32 {
        self.global_max_height
    }

    pub fn tree_count(&self) -> usize {
        self.vegetation.trees.len()
    }

    /// Ground height at world `(x, z)`, interpolated with the same diagonal
    /// split the tile meshes use (so queries agree with rendered geometry
    /// exactly). Returns `f32::NEG_INFINITY` outside the sampled domain.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let i = x / self.resolution;
        let j = -z / self.resolution;

        let w = self.heights.width();
        let h = self.heights.height();
        if i < -self.xofs as f32
            || j < -self.yofs as f32
            || i > (-self.xofs + w as i32 - 1) as f32
            || j > (-self.yofs + h as i32 - 1) as f32
        {
            return f32::NEG_INFINITY;
        }

        let ti = i.floor();
        let tj = j.floor();
        let fi = i - ti;
        let fj = j - tj;
        let ti = (ti as i32 + self.xofs) as usize;
        let tj = (tj as i32 + self.yofs) as usize;

        // The far edges fall back to 1D interpolation; the far corner is the
        // sample itself.
        if ti == w - 1 && tj == h - 1 {
            self.heights.get(ti, tj)
        } else if ti == w - 1 {
            (1.0 - fj) * self.heights.get(ti, tj) + fj * self.heights.get(ti, tj + 1)
        } else if tj == h - 1 {
            (1.0 - fi) * self.heights.get(ti, tj) + fi * self.heights.get(ti + 1, tj)
        } else if fi + fj <= 1.0 {
            (1.0 - fi) * self.heights.get(ti, tj)
                + (fi - fj) * self.heights.get(ti + 1, tj)
                + fj * self.heights.get(ti + 1, tj + 1)
        } else {
            (1.0 - fj) * self.heights.get(ti, tj)
                + (fj - fi) * self.heights.get(ti, tj + 1)
                + fi * self.heights.get(ti + 1, tj + 1)
        }
    }

    /// Advances the tree-sway clock and recomputes instance transforms.
    /// One tree per unit of work; no shared mutable state between units.
    pub fn update(&mut self, dt: f32) {
        self.time += dt;

        let angle = PI * self.time / 2.0;
        let shear_amount = Vec2::new(angle.cos(), angle.sin()) * self.vegetation.sway_ellipse;
        let (sr, cr) = self.vegetation.sway_rotation.sin_cos();
        let mut shear = Mat4::IDENTITY;
        shear.y_axis.x = cr * shear_amount.x + sr * shear_amount.y;
        shear.y_axis.z = -sr * shear_amount.x + cr * shear_amount.y;

        self.trunk_instances = self
            .vegetation
            .trees
            .par_iter()
            .map(|t| Mat4::from_translation(t.position) * shear * t.trunk_transform)
            .collect();
        self.canopy_instances = self
            .vegetation
            .trees
            .par_iter()
            .map(|t| Mat4::from_translation(t.position) * shear * t.canopy_transform)
            .collect();
    }

    /// Frustum-culled tiles ordered by ascending near-plane distance.
    pub fn visible_tiles(&self, view_proj: Mat4) -> Vec<&TerrainTile> {
        let frustum = Frustum::from_view_projection(view_proj);
        let mut passing: Vec<(f32, &TerrainTile)> = self
            .tiles
            .iter()
            .filter(|t| !t.is_empty())
            .filter(|t| frustum.intersects_aabb(t.aabb_min, t.aabb_max))
            .map(|t| {
                (
                    plane_distance_aabb(frustum.near, t.aabb_min, t.aabb_max),
                    t,
                )
            })
            .collect();
        passing.sort_by(|a, b| a.0.total_cmp(&b.0));
        passing.into_iter().map(|(_, t)| t).collect()
    }

    pub fn set_colors(&self, grass: [u8; 4], sand: [u8; 4], mountain: [u8; 4]) {
        let to_vec = |c: [u8; 4]| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32) / 255.0;
        self.terrain_program
            .set_uniform("GrassColor", UniformValue::Vec3(to_vec(grass)));
        self.terrain_program
            .set_uniform("SandColor", UniformValue::Vec3(to_vec(sand)));
        self.terrain_program
            .set_uniform("MountainColor", UniformValue::Vec3(to_vec(mountain)));
    }

    pub fn set_clip_plane(&self, plane: Vec4) {
        self.terrain_program
            .set_uniform("ClipPlane", UniformValue::Vec4(plane));
        self.trees_program
            .set_uniform("ClipPlane", UniformValue::Vec4(plane));
    }

    pub fn draw(&self, projection: Mat4, view: Mat4, lighting: &Lighting) {
        for program in [&self.terrain_program, &self.trees_program] {
            lighting.apply(program.as_ref(), view);
            program.set_uniform("Projection", UniformValue::Mat4(projection));
            program.set_uniform("View", UniformValue::Mat4(view));
        }

        self.terrain_program.bind();
        self.terrain_program
            .set_texture("NoiseTexture", self.dirt_texture.as_ref());
        self.terrain_program
            .set_uniform("UnitsPerPeriod", UniformValue::Float(32.0));

        for tile in self.visible_tiles(projection * view) {
            if let Some(mesh) = &tile.mesh {
                mesh.draw(Mat4::IDENTITY);
            }
        }

        self.trees_program.bind();
        if let Some(trunk) = &self.trunk_mesh {
            trunk.draw_instanced(&self.trunk_instances);
        }
        if let Some(canopy) = &self.canopy_mesh {
            canopy.draw_instanced(&self.canopy_instances);
        }
    }

    pub(crate) fn field(&self) -> &HeightField {
        &self.field
    }
}

/// Tile bounds in signed grid coordinates, plus the boundary-ownership flags
/// (`wi`/`wj`: this tile touches the far domain edge and owns its boundary
/// samples).
#[derive(Debug, Clone, Copy)]
struct TileRect {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    wi: bool,
    wj: bool,
}

impl TileRect {
    fn for_division(ci: usize, cj: usize, hw: i32, hh: i32) -> Self {
        let x2 = hw.min(-hw + MAX_TILE_CELLS * (ci as i32 + 1));
        let y2 = hh.min(-hh + MAX_TILE_CELLS * (cj as i32 + 1));
        Self {
            x1: -hw + MAX_TILE_CELLS * ci as i32,
            y1: -hh + MAX_TILE_CELLS * cj as i32,
            x2,
            y2,
            // Ownership follows the geometry: trailing divisions can be
            // degenerate, so the edge samples belong to whichever tile
            // actually reaches the domain boundary.
            wi: x2 == hw,
            wj: y2 == hh,
        }
    }
}

fn sample_position(field: &HeightField, i: i32, j: i32, resolution: f32) -> Vec3 {
    let x = i as f32 * resolution;
    let y = j as f32 * resolution;
    Vec3::new(x, field.height(x, y), -y)
}

/// Builds one tile: samples the heightfield, estimates seamless normals with
/// off-grid samples at tile edges, emits a fixed-diagonal triangulation, and
/// appends the result to the shared build list.
fn build_tile(
    field: &HeightField,
    rect: TileRect,
    resolution: f32,
    heights: &SharedGrid,
    normal_ys: &SharedGrid,
    builds: &Mutex<Vec<TileBuild>>,
) {
    let TileRect {
        mut x1,
        mut y1,
        mut x2,
        mut y2,
        wi,
        wj,
    } = rect;
    if x1 > x2 {
        std::mem::swap(&mut x1, &mut x2);
    }
    if y1 > y2 {
        std::mem::swap(&mut y1, &mut y2);
    }
    // Degenerate bounds contribute nothing.
    if x1 == x2 || y1 == y2 {
        return;
    }

    let width = (x2 - x1 + 1) as usize;
    let height = (y2 - y1 + 1) as usize;
    let xofs = heights.width as i32 / 2;
    let yofs = (heights.cells.len() / heights.width) as i32 / 2;

    let mut local_min = f32::INFINITY;
    let mut local_max = f32::NEG_INFINITY;

    let mut mesh = MeshData::default();
    mesh.positions.resize(width * height, Vec3::ZERO);
    for j in y1..=y2 {
        for i in x1..=x2 {
            let idx = (j - y1) as usize * width + (i - x1) as usize;
            let pos = sample_position(field, i, j, resolution);
            mesh.positions[idx] = pos;

            local_min = local_min.min(pos.y);
            local_max = local_max.max(pos.y);

            if (wi || i < x2) && (wj || j < y2) {
                // SAFETY: this tile owns cell (i, j) by the boundary
                // convention checked just above; regions are disjoint.
                unsafe { heights.write((xofs + i) as usize, (yofs + j) as usize, pos.y) };
            }
        }
    }

    mesh.normals.resize(width * height, Vec3::ZERO);
    for j in y1..=y2 {
        for i in x1..=x2 {
            let idx = (j - y1) as usize * width + (i - x1) as usize;

            // Central differences; off-grid heightfield samples at tile edges
            // keep normals seamless across tile boundaries.
            let gx = if i == x1 {
                mesh.positions[idx + 1] - sample_position(field, i - 1, j, resolution)
            } else if i == x2 {
                sample_position(field, i + 1, j, resolution) - mesh.positions[idx - 1]
            } else {
                mesh.positions[idx + 1] - mesh.positions[idx - 1]
            };

            let gy = if j == y1 {
                mesh.positions[idx + width] - sample_position(field, i, j - 1, resolution)
            } else if j == y2 {
                sample_position(field, i, j + 1, resolution) - mesh.positions[idx - width]
            } else {
                mesh.positions[idx + width] - mesh.positions[idx - width]
            };

            let normal = gx.cross(gy).normalize();
            mesh.normals[idx] = normal;

            if (wi || i < x2) && (wj || j < y2) {
                // SAFETY: same exclusive-region argument as the height write.
                unsafe { normal_ys.write((xofs + i) as usize, (yofs + j) as usize, normal.y) };
            }
        }
    }

    // Two triangles per cell with a fixed lower-left/upper-right diagonal;
    // `height_at` interpolation follows the same split.
    mesh.indices.reserve(6 * (width - 1) * (height - 1));
    for j in 1..height as u32 {
        for i in 1..width as u32 {
            let w = width as u32;
            mesh.indices.extend_from_slice(&[
                (j - 1) * w + (i - 1),
                (j - 1) * w + i,
                j * w + i,
                (j - 1) * w + (i - 1),
                j * w + i,
                j * w + (i - 1),
            ]);
        }
    }

    let build = TileBuild {
        ci: ((xofs + x1) / MAX_TILE_CELLS) as usize,
        cj: ((yofs + y1) / MAX_TILE_CELLS) as usize,
        mesh,
        min_height: local_min,
        max_height: local_max,
        aabb_min: Vec3::new(x1 as f32 * resolution, local_min, -y2 as f32 * resolution),
        aabb_max: Vec3::new(x2 as f32 * resolution, local_max, -y1 as f32 * resolution),
    };

    // Mesh construction happened above, outside the critical section; the
    // lock guards only the list push.
    builds
        .lock()
        .expect("terrain build list poisoned")
        .push(build);
}

/// 64x64x64 single-channel value-noise detail texture in [0.4, 1.0).
fn dirt_texture(rng: &mut ChaCha8Rng) -> TextureData {
    let n = DIRT_TEXTURE_SIZE;
    TextureData {
        width: n,
        height: n,
        depth: n,
        channels: 1,
        texels: (0..n * n * n).map(|_| rng.random_range(0.4..1.0)).collect(),
    }
}
