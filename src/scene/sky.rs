//! Gradient sky dome: an inward-wound sphere glued to the viewer.

use std::sync::Arc;

use glam::{Mat4, Vec4};

use crate::error::SceneResult;
use crate::gfx::{RenderDevice, RenderMesh, RenderState, ShaderProgram, UniformValue};
use crate::mesh;

const SPHERE_RADIUS: f32 = 64.0;

pub struct SkyDome {
    mesh: Option<Arc<dyn RenderMesh>>,
    program: Arc<dyn ShaderProgram>,
}

impl SkyDome {
    pub fn new(divisions: usize, device: &dyn RenderDevice) -> SceneResult<Self> {
        // (divisions / 2) | 1 keeps the subdivision count odd, so a vertex
        // ring lands exactly on the equator.
        let mut sphere = mesh::sphere(
            SPHERE_RADIUS,
            [255, 255, 255, 255],
            divisions,
            (divisions / 2) | 1,
        );
        sphere.colors.clear();
        sphere.swap_winding();

        let mesh = (!sphere.is_empty())
            .then(|| device.create_mesh(&sphere))
            .transpose()?;
        let program = device.load_program(&[
            "shaders/position.vert",
            "shaders/position_only.vert",
            "shaders/dome.frag",
        ])?;

        Ok(Self { mesh, program })
    }

    pub fn set_colors(&self, horizon: [u8; 4], pinnacle: [u8; 4]) {
        let to_vec = |c: [u8; 4]| {
            Vec4::new(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32) / 255.0
        };
        self.program
            .set_uniform("HorizonColor", UniformValue::Vec4(to_vec(horizon)));
        self.program
            .set_uniform("PinnacleColor", UniformValue::Vec4(to_vec(pinnacle)));
    }

    /// Draws the dome centered on the viewer with depth writes off. Expects
    /// an infinite-far projection so the sphere never clips.
    pub fn draw(&self, projection: Mat4, view: Mat4, state: &mut dyn RenderState) {
        let Some(mesh) = &self.mesh else {
            return;
        };

        state.set_write_masks(true, false);

        self.program.bind();
        self.program
            .set_uniform("Projection", UniformValue::Mat4(projection));
        self.program
            .set_uniform("SphereRadius", UniformValue::Float(SPHERE_RADIUS));

        // Cancel the view translation so the dome follows the camera.
        let translation = view.w_axis.truncate();
        self.program.set_uniform(
            "View",
            UniformValue::Mat4(Mat4::from_translation(-translation) * view),
        );

        mesh.draw(Mat4::IDENTITY);

        state.set_write_masks(true, true);
    }
}
