//! Planar water: reflection/refraction render targets, scrolling ripple
//! normal maps, and occlusion-gated drawing.

use std::collections::VecDeque;
use std::sync::Arc;

use fastnoise_lite::{FastNoiseLite, NoiseType};
use glam::{Mat4, Vec2, Vec3, Vec4};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::SceneResult;
use crate::gfx::{
    GpuTexture, OcclusionQuery, OffscreenTarget, RenderDevice, RenderMesh, RenderState,
    ShaderProgram, SurfaceSize, TextureData, UniformValue, Winding,
};
use crate::grid::Grid2;
use crate::mesh;

const PI: f32 = std::f32::consts::PI;
const RIPPLE_SIZE: usize = 256;
/// Clip planes sit 3 units past the surface so the off-screen textures bleed
/// slightly, masking artifacts from ripple normal bumping.
const CLIP_BLEED: f32 = 3.0;

pub struct WaterStage {
    y: f32,

    reflection: Box<dyn OffscreenTarget>,
    refraction: Box<dyn OffscreenTarget>,

    mesh: Option<Arc<dyn RenderMesh>>,
    program: Arc<dyn ShaderProgram>,
    query_program: Arc<dyn ShaderProgram>,

    ripple_textures: [Arc<dyn GpuTexture>; 2],
    velocities: [Vec2; 2],

    queries: VecDeque<Box<dyn OcclusionQuery>>,
    last_occlusion_value: bool,

    time: f32,
}

impl WaterStage {
    pub fn new(
        y: f32,
        domain: (f32, f32, f32, f32),
        color: [u8; 4],
        size: SurfaceSize,
        device: &dyn RenderDevice,
        rng: &mut ChaCha8Rng,
    ) -> SceneResult<Self> {
        let (xmin, zmin, xmax, zmax) = domain;

        // Two scroll layers at different speeds and random headings.
        let mut velocities = [Vec2::ZERO; 2];
        for (k, velocity) in velocities.iter_mut().enumerate() {
            let angle = rng.random_range(0.0..PI);
            *velocity = (0.25 - 0.125 * k as f32) * Vec2::new(angle.cos(), angle.sin());
        }

        let reflection = device.create_offscreen_target(size, true)?;
        let refraction = device.create_offscreen_target(size, true)?;

        let mut plane = mesh::plane_y(y, xmin, zmin, xmax, zmax, color);
        plane.colors.clear();
        plane.normals.clear();
        let mesh = (!plane.is_empty())
            .then(|| device.create_mesh(&plane))
            .transpose()?;

        let program = device.load_program(&[
            "shaders/lighting.frag",
            "shaders/water.vert",
            "shaders/water.frag",
        ])?;
        let query_program = device.load_program(&[
            "shaders/position.vert",
            "shaders/position_only.vert",
            "shaders/noop.frag",
        ])?;

        let ripple_seed = rng.random::<i32>();
        let ripple_textures = [
            device.create_texture(&ripple_texture(ripple_seed, 0))?,
            device.create_texture(&ripple_texture(ripple_seed, 1))?,
        ];

        Ok(Self {
            y,
            reflection,
            refraction,
            mesh,
            program,
            query_program,
            ripple_textures,
            velocities,
            queries: VecDeque::new(),
            last_occlusion_value: false,
            time: 0.0,
        })
    }

    pub fn surface_height(&self) -> f32 {
        self.y
    }

    /// Recreates the off-screen attachments when the viewport changes.
    pub fn resize(&mut self, size: SurfaceSize) {
        if self.reflection.size() != size {
            self.reflection.resize(size);
            self.refraction.resize(size);
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.time += dt;
    }

    /// Mirrors world space across the surface plane.
    pub fn reflection_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, self.y, 0.0))
            * Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
            * Mat4::from_translation(Vec3::new(0.0, -self.y, 0.0))
    }

    pub fn reflection_clip_plane(&self) -> Vec4 {
        Vec4::new(0.0, 1.0, 0.0, -self.y + CLIP_BLEED)
    }

    pub fn refraction_clip_plane(&self) -> Vec4 {
        Vec4::new(0.0, -1.0, 0.0, self.y + CLIP_BLEED)
    }

    /// Mirrored geometry inverts triangle winding, so the front face flips
    /// for the reflection pass.
    pub fn begin_reflection(&self, state: &mut dyn RenderState) {
        state.set_clip_plane(Some(self.reflection_clip_plane()));
        state.set_front_face(Winding::Clockwise);
        state.bind_target(Some(self.reflection.as_ref()));
        state.clear(true, true);
    }

    pub fn end_reflection(&self, state: &mut dyn RenderState) {
        state.bind_target(None);
        state.set_front_face(Winding::CounterClockwise);
        state.set_clip_plane(None);
    }

    pub fn begin_refraction(&self, state: &mut dyn RenderState) {
        state.set_clip_plane(Some(self.refraction_clip_plane()));
        state.bind_target(Some(self.refraction.as_ref()));
        state.clear(true, true);
    }

    pub fn end_refraction(&self, state: &mut dyn RenderState) {
        state.bind_target(None);
        state.set_clip_plane(None);
    }

    /// Composites the water surface from the off-screen textures.
    pub fn draw(&self, projection: Mat4, view: Mat4) {
        let Some(mesh) = &self.mesh else {
            return;
        };

        self.program.bind();
        self.program
            .set_uniform("Projection", UniformValue::Mat4(projection));
        self.program.set_uniform("View", UniformValue::Mat4(view));
        self.program
            .set_uniform("RepeatPeriod", UniformValue::Float(8.0));
        self.program
            .set_uniform("WaveHeight", UniformValue::Float(0.1));
        self.program.set_uniform(
            "ViewNormal",
            UniformValue::Vec3(view.y_axis.truncate().normalize()),
        );
        self.program.set_uniform(
            "Offsets[0]",
            UniformValue::Vec2(self.time * self.velocities[0]),
        );
        self.program.set_uniform(
            "Offsets[1]",
            UniformValue::Vec2(self.time * self.velocities[1]),
        );

        if let Some(texture) = self.reflection.color_texture() {
            self.program.set_texture("ReflectionTexture", texture.as_ref());
        }
        if let Some(texture) = self.refraction.color_texture() {
            self.program.set_texture("RefractionTexture", texture.as_ref());
        }
        self.program
            .set_texture("RippleTextures[0]", self.ripple_textures[0].as_ref());
        self.program
            .set_texture("RippleTextures[1]", self.ripple_textures[1].as_ref());

        mesh.draw(Mat4::IDENTITY);
    }

    /// Draws the surface invisibly inside a fresh occlusion query and queues
    /// the query for later collection.
    pub fn check_occlusion(
        &mut self,
        projection: Mat4,
        view: Mat4,
        state: &mut dyn RenderState,
        device: &dyn RenderDevice,
    ) {
        let Some(mesh) = &self.mesh else {
            return;
        };

        let mut query = device.create_occlusion_query();

        self.query_program.bind();
        self.query_program
            .set_uniform("Projection", UniformValue::Mat4(projection));
        self.query_program
            .set_uniform("View", UniformValue::Mat4(view));

        state.set_write_masks(false, false);
        query.begin();
        mesh.draw(Mat4::IDENTITY);
        query.end();
        state.set_write_masks(true, true);

        self.queries.push_back(query);
    }

    /// Drains completed queries front-to-back and reports the most recent
    /// result. Never blocks: with no completed query yet, the cached value
    /// stands (initially `false`).
    pub fn should_draw(&mut self) -> bool {
        while self.queries.front().is_some_and(|q| q.available()) {
            if let Some(query) = self.queries.pop_front() {
                self.last_occlusion_value = query.any_samples_passed();
            }
        }
        self.last_occlusion_value
    }

    #[cfg(test)]
    pub(crate) fn pending_queries(&self) -> usize {
        self.queries.len()
    }
}

/// 256x256 two-channel ripple normal map for scroll layer `layer`, from a
/// two-octave Perlin heightmap with toroidal central differences.
pub(crate) fn ripple_texture(seed: i32, layer: u32) -> TextureData {
    let mut noise = FastNoiseLite::with_seed(seed);
    noise.set_noise_type(Some(NoiseType::Perlin));

    let n = RIPPLE_SIZE;
    let k = layer as f32;
    let mut heights = Grid2::new(n, n, 0.0f32);
    for j in 0..n {
        for i in 0..n {
            let (x, y) = (i as f32, j as f32);
            let h = 0.8 * noise.get_noise_3d(8.0 * x, 8.0 * y, 14.0 * k)
                + 0.4 * noise.get_noise_3d(16.0 * x, 16.0 * y, 28.0 * k);
            heights.set(i, j, h);
        }
    }

    let mut texels = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            // Wrap the differences so the texture tiles without seams.
            let dx = heights.get((i + 1) % n, j) - heights.get((i + n - 1) % n, j);
            let dy = heights.get(i, (j + 1) % n) - heights.get(i, (j + n - 1) % n);

            let normal = Vec3::new(1.0, 0.0, dx)
                .cross(Vec3::new(0.0, 1.0, dy))
                .normalize();
            texels.push(normal.x);
            texels.push(normal.y);
        }
    }

    TextureData {
        width: n as u32,
        height: n as u32,
        depth: 1,
        channels: 2,
        texels,
    }
}
