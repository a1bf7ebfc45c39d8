//! Mouse-look fly camera.

use glam::{Mat3, Mat4, Vec2, Vec3};

use crate::gfx::{FrameInput, MoveKey, SurfaceSize};

const PI: f32 = std::f32::consts::PI;

/// Cursor travel for one full rotation, in pixels.
const PIXELS_PER_FULL_ROTATION: f32 = 450.0;
const MOVE_SPEED: f32 = 10.0;
const FOV_Y: f32 = PI / 4.0;
const Z_NEAR: f32 = 0.5;

pub struct Camera {
    pub position: Vec3,
    /// Yaw and pitch, radians. Pitch is clamped to the vertical.
    pub angles: Vec2,
    pub projection: Mat4,
    /// Far-plane-free projection for geometry anchored to the viewer (the
    /// sky dome).
    pub infinite_projection: Mat4,
    z_far: f32,
    size: SurfaceSize,
}

impl Camera {
    pub fn new(size: SurfaceSize, z_far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            angles: Vec2::ZERO,
            projection: Mat4::IDENTITY,
            infinite_projection: Mat4::IDENTITY,
            z_far,
            size,
        };
        camera.rebuild_projections();
        camera
    }

    fn rebuild_projections(&mut self) {
        let aspect = self.size.width as f32 / self.size.height.max(1) as f32;
        self.projection = Mat4::perspective_rh(FOV_Y, aspect, Z_NEAR, self.z_far);
        self.infinite_projection = Mat4::perspective_infinite_rh(FOV_Y, aspect, Z_NEAR);
    }

    /// Applies one frame of cursor rotation and key movement.
    pub fn update(&mut self, input: &dyn FrameInput, dt: f32) {
        let size = input.framebuffer_size();
        if size != self.size {
            self.size = size;
            self.rebuild_projections();
        }

        let delta = input.cursor_delta();
        self.angles.x -= delta.x / PIXELS_PER_FULL_ROTATION;
        self.angles.y -= delta.y / PIXELS_PER_FULL_ROTATION;
        self.angles.y = self.angles.y.clamp(-PI / 2.0, PI / 2.0);

        let rotation = Mat3::from_mat4(
            Mat4::from_rotation_y(self.angles.x) * Mat4::from_rotation_x(self.angles.y),
        );
        let forward = rotation * Vec3::NEG_Z;
        let right = rotation * Vec3::X;

        if input.key_down(MoveKey::Forward) {
            self.position += dt * MOVE_SPEED * forward;
        }
        if input.key_down(MoveKey::Backward) {
            self.position -= dt * MOVE_SPEED * forward;
        }
        if input.key_down(MoveKey::Left) {
            self.position -= dt * MOVE_SPEED * right;
        }
        if input.key_down(MoveKey::Right) {
            self.position += dt * MOVE_SPEED * right;
        }
    }

    /// The camera transform is `translate(pos) * rot_y(yaw) * rot_x(pitch)`;
    /// the view matrix is its inverse, composed directly.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_x(-self.angles.y)
            * Mat4::from_rotation_y(-self.angles.x)
            * Mat4::from_translation(-self.position)
    }
}
