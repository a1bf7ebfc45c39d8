//! Scrolling cloud cover: layered noise textures on a plane high above the
//! terrain, blended over the sky dome.

use std::sync::Arc;

use glam::{Mat4, Vec2};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::SceneResult;
use crate::gfx::{
    GpuTexture, RenderDevice, RenderMesh, RenderState, ShaderProgram, TextureData, UniformValue,
};
use crate::mesh;

const PI: f32 = std::f32::consts::PI;
const LAYERS: usize = 3;
const NOISE_SIZE: usize = 128;
const SCROLL_SPEED: f32 = 0.0025;
/// World-space tiling period of the cloud noise.
const TEXTURE_SCALE: f32 = 16384.0;
/// Distance at which cloud cover has fully faded; the plane spans this far,
/// so anything it could cover beyond it contributes nothing anyway.
const DISTANCE_FALLOFF: f32 = 131_072.0;

pub struct CloudLayers {
    mesh: Option<Arc<dyn RenderMesh>>,
    program: Arc<dyn ShaderProgram>,
    textures: [Arc<dyn GpuTexture>; LAYERS],
    velocities: [Vec2; LAYERS],
    time: f32,
}

impl CloudLayers {
    pub fn new(y: f32, device: &dyn RenderDevice, rng: &mut ChaCha8Rng) -> SceneResult<Self> {
        let mut plane = mesh::plane_y(
            y,
            -DISTANCE_FALLOFF,
            -DISTANCE_FALLOFF,
            DISTANCE_FALLOFF,
            DISTANCE_FALLOFF,
            [255, 255, 255, 255],
        );
        plane.colors.clear();
        plane.normals.clear();
        let mesh = (!plane.is_empty())
            .then(|| device.create_mesh(&plane))
            .transpose()?;

        let program = device.load_program(&[
            "shaders/clouds.vert",
            "shaders/clouds.frag",
        ])?;

        // Each layer gets its own noise and a random heading, so the layers
        // drift apart instead of repeating in lockstep.
        let textures = [
            device.create_texture(&noise_texture(rng))?,
            device.create_texture(&noise_texture(rng))?,
            device.create_texture(&noise_texture(rng))?,
        ];
        let mut velocities = [Vec2::ZERO; LAYERS];
        for velocity in &mut velocities {
            let angle = rng.random_range(0.0..PI);
            *velocity = SCROLL_SPEED * Vec2::new(angle.cos(), angle.sin());
        }

        Ok(Self {
            mesh,
            program,
            textures,
            velocities,
            time: 0.0,
        })
    }

    pub fn update(&mut self, dt: f32) {
        self.time += dt;
    }

    /// Draws the layers alpha-blended with the depth test off, so they sit
    /// on top of the dome without fighting it. Expects an infinite-far
    /// projection, as the plane reaches well past any finite far plane.
    pub fn draw(&self, projection: Mat4, view: Mat4, state: &mut dyn RenderState) {
        let Some(mesh) = &self.mesh else {
            return;
        };

        state.set_depth_test(false);
        state.set_blend(true);

        self.program.bind();
        self.program
            .set_uniform("Projection", UniformValue::Mat4(projection));
        self.program.set_uniform("View", UniformValue::Mat4(view));
        self.program
            .set_uniform("TextureScale", UniformValue::Float(TEXTURE_SCALE));
        self.program
            .set_uniform("DistanceFalloff", UniformValue::Float(DISTANCE_FALLOFF));

        for (texture, velocity) in self.textures.iter().zip(&self.velocities) {
            self.program.set_texture("CloudTexture", texture.as_ref());
            self.program.set_uniform(
                "Displacement",
                UniformValue::Vec2(self.time * *velocity),
            );
            mesh.draw(Mat4::IDENTITY);
        }

        state.set_blend(false);
        state.set_depth_test(true);
    }
}

/// Single-channel white noise in [-1, 1); the fragment shader filters it
/// through mipmapping into soft cloud shapes.
fn noise_texture(rng: &mut ChaCha8Rng) -> TextureData {
    let mut texels = vec![0.0f32; NOISE_SIZE * NOISE_SIZE];
    for texel in &mut texels {
        *texel = rng.random_range(-1.0..1.0);
    }
    TextureData {
        width: NOISE_SIZE as u32,
        height: NOISE_SIZE as u32,
        depth: 1,
        channels: 1,
        texels,
    }
}
