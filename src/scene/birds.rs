//! A flock of birds circling the terrain on closed Bezier loops.

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::animation::flight::{FlightDomain, FlightPath};
use crate::config::BirdConfig;
use crate::error::SceneResult;
use crate::gfx::{RenderDevice, RenderMesh, ShaderProgram, UniformValue};
use crate::mesh;
use crate::scene::lighting::Lighting;

const BODY_COLOR: [u8; 4] = [40, 40, 48, 255];

struct Bird {
    path: FlightPath,
    parameter: f32,
    position: Vec3,
    velocity: Vec3,
}

pub struct Birds {
    birds: Vec<Bird>,
    speed: f32,
    mesh: Option<Arc<dyn RenderMesh>>,
    program: Arc<dyn ShaderProgram>,
}

impl Birds {
    /// Spawns a random flock. Paths are generated above the terrain ceiling
    /// so they never intersect the ground.
    pub fn new(
        config: &BirdConfig,
        domain: (f32, f32, f32, f32),
        terrain_max_height: f32,
        device: &dyn RenderDevice,
        rng: &mut ChaCha8Rng,
    ) -> SceneResult<Self> {
        let (xmin, zmin, xmax, zmax) = domain;
        let count = rng.random_range(config.min_count..=config.max_count);
        log::info!("spawning {count} birds");

        // Tall terrain can squeeze the altitude band shut; keep it open.
        let floor = (terrain_max_height + 16.0).min(config.max_height - 1.0);
        let flight_domain = FlightDomain {
            xmin,
            zmin,
            xmax,
            zmax,
            min_height: floor,
            max_height: config.max_height,
        };

        let birds = (0..count)
            .map(|_| {
                let path = FlightPath::generate(flight_domain, rng);
                let position = path.position_at(0.0);
                let velocity = path.velocity_at(0.0);
                Bird {
                    path,
                    parameter: 0.0,
                    position,
                    velocity,
                }
            })
            .collect();

        let body = bird_mesh();
        let mesh = (!body.is_empty())
            .then(|| device.create_mesh(&body))
            .transpose()?;
        let program = device.load_program(&[
            "shaders/position.vert",
            "shaders/lighting.frag",
            "shaders/objects.vert",
            "shaders/objects.frag",
        ])?;

        Ok(Self {
            birds,
            speed: config.speed,
            mesh,
            program,
        })
    }

    pub fn count(&self) -> usize {
        self.birds.len()
    }

    /// Advances every bird by `speed * dt` along its path. Birds are
    /// independent, so the fan-out is data-parallel.
    pub fn update(&mut self, dt: f32) {
        let step = self.speed * dt;
        self.birds.par_iter_mut().for_each(|bird| {
            bird.parameter = bird.path.next_parameter(bird.parameter, step);
            bird.position = bird.path.position_at(bird.parameter);
            bird.velocity = bird.path.velocity_at(bird.parameter);
        });
    }

    pub fn set_clip_plane(&self, plane: Vec4) {
        self.program
            .set_uniform("ClipPlane", UniformValue::Vec4(plane));
    }

    pub fn draw(&self, projection: Mat4, view: Mat4, lighting: &Lighting) {
        let Some(mesh) = &self.mesh else {
            return;
        };

        self.program.bind();
        lighting.apply(self.program.as_ref(), view);
        self.program
            .set_uniform("Projection", UniformValue::Mat4(projection));
        self.program.set_uniform("View", UniformValue::Mat4(view));

        let transforms: Vec<Mat4> = self
            .birds
            .iter()
            .map(|bird| {
                // Orient along the velocity: a look-at from the bird toward
                // where it came from, inverted into a model transform.
                Mat4::look_at_rh(bird.position, bird.position - bird.velocity, Vec3::Y)
                    .inverse()
            })
            .collect();
        mesh.draw_instanced(&transforms);
    }
}

/// Simple swept body: a cone for the tail half, a cone for the head, facing
/// -Z to match the look-at orientation.
fn bird_mesh() -> mesh::MeshData {
    let mut body = mesh::closed_cone(
        Vec3::new(0.0, 0.0, 1.5),
        Vec3::new(0.0, 0.0, 0.0),
        0.5,
        BODY_COLOR,
        Some(12),
    );
    body.merge(&mesh::closed_cone(
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(0.0, 0.0, 0.0),
        0.5,
        BODY_COLOR,
        Some(12),
    ));
    body
}
