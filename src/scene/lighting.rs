//! Directional light with an orthographic shadow map fit to the scene box.

use glam::{Mat3, Mat4, Vec3};

use crate::error::SceneResult;
use crate::gfx::{
    OffscreenTarget, RenderDevice, RenderState, ShaderProgram, SurfaceSize, UniformValue,
};

/// World-unit margin added around the light-space scene box.
const EDGE: f32 = 8.0;

pub struct Lighting {
    light_direction: Vec3,
    shadow_view_projection: Mat4,
    shadow_target: Box<dyn OffscreenTarget>,
    shadow_size: SurfaceSize,
}

impl Lighting {
    /// Fits the shadow projection to the world-space box `[min, max]` as seen
    /// from the light, and allocates a depth-only target sized by
    /// `resolution` (world units per texel).
    pub fn new(
        min: Vec3,
        max: Vec3,
        resolution: f32,
        light_direction: Vec3,
        device: &dyn RenderDevice,
    ) -> SceneResult<Self> {
        let view = Mat4::look_at_rh(Vec3::ZERO, light_direction, Vec3::Y);

        let corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ];

        let mut ls_min = view.transform_point3(corners[0]);
        let mut ls_max = ls_min;
        for corner in &corners[1..] {
            let p = view.transform_point3(*corner);
            ls_min = ls_min.min(p);
            ls_max = ls_max.max(p);
        }

        // Light-space z is negative ahead of the light, so the depth range
        // inverts relative to the box extents.
        let projection = Mat4::orthographic_rh(
            ls_min.x - EDGE,
            ls_max.x + EDGE,
            ls_min.y - EDGE,
            ls_max.y + EDGE,
            -ls_max.z - EDGE,
            -ls_min.z + EDGE,
        );

        let shadow_size = SurfaceSize {
            width: ((ls_max.x - ls_min.x) / resolution).ceil() as u32,
            height: ((ls_max.y - ls_min.y) / resolution).ceil() as u32,
        };
        log::info!(
            "shadow map: {}x{} texels",
            shadow_size.width,
            shadow_size.height
        );
        let shadow_target = device.create_offscreen_target(shadow_size, false)?;

        Ok(Self {
            light_direction,
            shadow_view_projection: projection * view,
            shadow_target,
            shadow_size,
        })
    }

    pub fn shadow_projection(&self) -> Mat4 {
        self.shadow_view_projection
    }

    pub fn shadow_size(&self) -> SurfaceSize {
        self.shadow_size
    }

    /// Sets the material/light uniform block on `program`. The light
    /// direction is delivered in view space.
    pub fn apply(&self, program: &dyn ShaderProgram, view: Mat4) {
        program.set_uniform(
            "Material.specularColor",
            UniformValue::Vec3(Vec3::splat(0.25)),
        );
        program.set_uniform("Material.shininess", UniformValue::Float(4.5));
        program.set_uniform("Light.ambient", UniformValue::Vec3(Vec3::splat(0.25)));
        program.set_uniform("Light.diffuse", UniformValue::Vec3(Vec3::splat(0.625)));
        program.set_uniform("Light.specular", UniformValue::Vec3(Vec3::ONE));
        program.set_uniform(
            "Light.directionView",
            UniformValue::Vec3((Mat3::from_mat4(view) * self.light_direction).normalize()),
        );
        program.set_uniform(
            "ShadowViewProjection",
            UniformValue::Mat4(self.shadow_view_projection),
        );
        if let Some(depth) = self.shadow_target.depth_texture() {
            program.set_texture("ShadowMapTexture", depth.as_ref());
        }
    }

    /// Binds the depth-only target for the shadow pass.
    pub fn begin_shadow(&self, state: &mut dyn RenderState) {
        state.bind_target(Some(self.shadow_target.as_ref()));
        state.set_viewport(self.shadow_size);
        state.clear(false, true);
    }

    pub fn end_shadow(&self, state: &mut dyn RenderState) {
        state.bind_target(None);
    }
}
