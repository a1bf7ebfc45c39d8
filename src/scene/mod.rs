//! Frame orchestration: owns the sub-stages and runs the fixed pass
//! sequence every frame (shadow, main, water occlusion probe, then the
//! gated reflection/refraction/composite passes).

pub mod birds;
pub mod camera;
pub mod clouds;
pub mod lighting;
pub mod sky;
pub mod water;

use glam::{Mat4, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::SceneConfig;
use crate::error::SceneResult;
use crate::gfx::{FrameInput, RenderDevice, RenderState, SurfaceSize};
use crate::terrain::Terrain;

use birds::Birds;
use camera::Camera;
use clouds::CloudLayers;
use lighting::Lighting;
use sky::SkyDome;
use water::WaterStage;

const SKY_DIVISIONS: usize = 32;
/// Height of the cloud plane.
const CLOUD_HEIGHT: f32 = 500.0;
/// Top of the shadow-fitted scene box; comfortably above the flight ceiling.
const LIGHT_BOX_TOP: f32 = 200.0;
/// Camera spawn height above the ground.
const SPAWN_CLEARANCE: f32 = 16.0;

pub struct Scene {
    pub camera: Camera,
    pub sky: SkyDome,
    pub clouds: CloudLayers,
    pub terrain: Terrain,
    pub water: WaterStage,
    pub birds: Birds,
    pub lighting: Lighting,
}

impl Scene {
    pub fn new(
        config: &SceneConfig,
        size: SurfaceSize,
        device: &dyn RenderDevice,
    ) -> SceneResult<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        log::info!("scene seed: {seed}");
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let hw = config.terrain_width / 2.0;
        let hd = config.terrain_depth / 2.0;
        let domain = (-hw, -hd, hw, hd);

        let sky = SkyDome::new(SKY_DIVISIONS, device)?;
        sky.set_colors(config.palette.sky_horizon, config.palette.sky_top);
        let clouds = CloudLayers::new(CLOUD_HEIGHT, device, &mut rng)?;

        let terrain = Terrain::new(config, rng.random(), device)?;
        let water = WaterStage::new(
            config.water_level,
            domain,
            config.palette.water,
            size,
            device,
            &mut rng,
        )?;
        let birds = Birds::new(
            &config.birds,
            domain,
            terrain.global_max_height(),
            device,
            &mut rng,
        )?;

        let lighting = Lighting::new(
            Vec3::new(-hw, terrain.global_min_height(), -hd),
            Vec3::new(hw, LIGHT_BOX_TOP, hd),
            config.shadow_resolution,
            Vec3::new(1.0, -1.0, -1.0).normalize(),
            device,
        )?;

        let mut camera = Camera::new(size, config.terrain_width.hypot(config.terrain_depth));
        camera.position.y = terrain.height_at(camera.position.x, camera.position.z)
            + SPAWN_CLEARANCE;

        Ok(Self {
            camera,
            sky,
            clouds,
            terrain,
            water,
            birds,
            lighting,
        })
    }

    /// Per-frame simulation step: camera, tree sway, bird flight, water
    /// clock, plus viewport tracking.
    pub fn update(&mut self, input: &dyn FrameInput, dt: f32) {
        self.camera.update(input, dt);
        self.water.resize(input.framebuffer_size());
        self.terrain.update(dt);
        self.clouds.update(dt);
        self.birds.update(dt);
        self.water.update(dt);
    }

    /// Runs the frame's pass sequence. The reflection, refraction, and
    /// composite passes run only when a previously collected occlusion probe
    /// saw the water surface.
    pub fn draw(
        &mut self,
        state: &mut dyn RenderState,
        device: &dyn RenderDevice,
        viewport: SurfaceSize,
    ) {
        self.lighting.begin_shadow(state);
        self.draw_scene(self.lighting.shadow_projection(), Mat4::IDENTITY, false, state);
        self.lighting.end_shadow(state);
        state.set_viewport(viewport);

        let view = self.camera.view_matrix();

        state.bind_target(None);
        state.clear(true, true);
        self.draw_scene(self.camera.projection, view, true, state);

        self.water
            .check_occlusion(self.camera.projection, view, state, device);

        if self.water.should_draw() {
            self.water.begin_reflection(state);
            self.terrain.set_clip_plane(self.water.reflection_clip_plane());
            self.birds.set_clip_plane(self.water.reflection_clip_plane());
            self.draw_scene(
                self.camera.projection,
                view * self.water.reflection_matrix(),
                true,
                state,
            );
            self.water.end_reflection(state);

            self.water.begin_refraction(state);
            self.terrain.set_clip_plane(self.water.refraction_clip_plane());
            self.birds.set_clip_plane(self.water.refraction_clip_plane());
            self.draw_scene(self.camera.projection, view, false, state);
            self.water.end_refraction(state);

            state.bind_target(None);
            self.water.draw(self.camera.projection, view);
        }
    }

    fn draw_scene(
        &self,
        projection: Mat4,
        view: Mat4,
        draw_dome: bool,
        state: &mut dyn RenderState,
    ) {
        if draw_dome {
            self.sky.draw(self.camera.infinite_projection, view, state);
            self.clouds.draw(self.camera.infinite_projection, view, state);
        }
        self.terrain.draw(projection, view, &self.lighting);
        self.birds.draw(projection, view, &self.lighting);
    }
}
