//! Collaborator seam for the graphics-API wrapper layer.
//!
//! The scene core never talks to a graphics API directly; it draws through
//! these traits. Resource creation is fallible (construction-time errors are
//! fatal per the error policy); per-frame calls are infallible. All GPU
//! traffic is single-threaded: trait objects are deliberately not `Send`.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::error::SceneResult;
use crate::mesh::MeshData;

/// Framebuffer dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

/// Triangle front-face winding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    CounterClockwise,
    Clockwise,
}

/// CPU-generated texture payload handed to the device for upload.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Depth 1 for 2D textures, >1 for 3D.
    pub depth: u32,
    /// Channels interleaved per texel, row-major, layer-major.
    pub channels: u32,
    pub texels: Vec<f32>,
}

/// Uniform values set by name, mirroring the thin program wrapper the
/// renderer is driven through.
#[derive(Debug, Clone, Copy)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Int(i32),
}

pub trait ShaderProgram {
    fn bind(&self);
    fn set_uniform(&self, name: &str, value: UniformValue);
    fn set_texture(&self, name: &str, texture: &dyn GpuTexture);
}

pub trait GpuTexture {}

pub trait RenderMesh {
    fn draw(&self, model: Mat4);
    fn draw_instanced(&self, transforms: &[Mat4]);
}

/// Off-screen color+depth target. Resizing recreates the attachment storage;
/// attachments are fixed-size at allocation.
pub trait OffscreenTarget {
    fn resize(&mut self, size: SurfaceSize);
    fn size(&self) -> SurfaceSize;
    fn color_texture(&self) -> Option<Arc<dyn GpuTexture>>;
    fn depth_texture(&self) -> Option<Arc<dyn GpuTexture>> {
        None
    }
}

/// Asynchronous GPU query. `available`/`result` never block; an unavailable
/// result is an explicit "not ready yet" state, not an error.
pub trait OcclusionQuery {
    fn begin(&mut self);
    fn end(&mut self);
    fn available(&self) -> bool;
    fn any_samples_passed(&self) -> bool;
}

/// Pipeline state the scene core toggles between passes.
pub trait RenderState {
    /// Binds an off-screen target, or the default framebuffer for `None`.
    fn bind_target(&mut self, target: Option<&dyn OffscreenTarget>);
    fn set_clip_plane(&mut self, plane: Option<Vec4>);
    fn set_front_face(&mut self, winding: Winding);
    fn set_write_masks(&mut self, color: bool, depth: bool);
    fn set_depth_test(&mut self, enabled: bool);
    fn set_blend(&mut self, enabled: bool);
    fn clear(&mut self, color: bool, depth: bool);
    fn set_viewport(&mut self, size: SurfaceSize);
}

/// Factory side of the collaborator layer.
pub trait RenderDevice {
    fn create_mesh(&self, data: &MeshData) -> SceneResult<Arc<dyn RenderMesh>>;
    fn create_texture(&self, data: &TextureData) -> SceneResult<Arc<dyn GpuTexture>>;
    fn create_offscreen_target(
        &self,
        size: SurfaceSize,
        with_color: bool,
    ) -> SceneResult<Box<dyn OffscreenTarget>>;
    fn create_occlusion_query(&self) -> Box<dyn OcclusionQuery>;
    fn load_program(&self, sources: &[&str]) -> SceneResult<Arc<dyn ShaderProgram>>;
}

/// Per-frame windowing/input snapshot supplied by the embedding application.
pub trait FrameInput {
    fn cursor_delta(&self) -> Vec2;
    fn key_down(&self, key: MoveKey) -> bool;
    fn framebuffer_size(&self) -> SurfaceSize;
}

/// Abstract movement keys; the windowing collaborator maps real key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKey {
    Forward,
    Backward,
    Left,
    Right,
}

/// State-diffing wrapper: forwards only actual changes to the wrapped
/// [`RenderState`], replacing the hidden "last bound" caches of classic GL
/// wrappers with an explicit layer. Target binds and clears always pass
/// through.
pub struct TrackedState<S: RenderState> {
    inner: S,
    clip_plane: Option<Vec4>,
    front_face: Winding,
    write_masks: (bool, bool),
    depth_test: bool,
    blend: bool,
}

impl<S: RenderState> TrackedState<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            clip_plane: None,
            front_face: Winding::CounterClockwise,
            write_masks: (true, true),
            depth_test: true,
            blend: false,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: RenderState> RenderState for TrackedState<S> {
    fn bind_target(&mut self, target: Option<&dyn OffscreenTarget>) {
        self.inner.bind_target(target);
    }

    fn set_clip_plane(&mut self, plane: Option<Vec4>) {
        if self.clip_plane != plane {
            self.clip_plane = plane;
            self.inner.set_clip_plane(plane);
        }
    }

    fn set_front_face(&mut self, winding: Winding) {
        if self.front_face != winding {
            self.front_face = winding;
            self.inner.set_front_face(winding);
        }
    }

    fn set_write_masks(&mut self, color: bool, depth: bool) {
        if self.write_masks != (color, depth) {
            self.write_masks = (color, depth);
            self.inner.set_write_masks(color, depth);
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        if self.depth_test != enabled {
            self.depth_test = enabled;
            self.inner.set_depth_test(enabled);
        }
    }

    fn set_blend(&mut self, enabled: bool) {
        if self.blend != enabled {
            self.blend = enabled;
            self.inner.set_blend(enabled);
        }
    }

    fn clear(&mut self, color: bool, depth: bool) {
        self.inner.clear(color, depth);
    }

    fn set_viewport(&mut self, size: SurfaceSize) {
        self.inner.set_viewport(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counting {
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl RenderState for Counting {
        fn bind_target(&mut self, _: Option<&dyn OffscreenTarget>) {
            self.calls.borrow_mut().push("bind");
        }
        fn set_clip_plane(&mut self, _: Option<Vec4>) {
            self.calls.borrow_mut().push("clip");
        }
        fn set_front_face(&mut self, _: Winding) {
            self.calls.borrow_mut().push("face");
        }
        fn set_write_masks(&mut self, _: bool, _: bool) {
            self.calls.borrow_mut().push("mask");
        }
        fn set_depth_test(&mut self, _: bool) {
            self.calls.borrow_mut().push("depth");
        }
        fn set_blend(&mut self, _: bool) {
            self.calls.borrow_mut().push("blend");
        }
        fn clear(&mut self, _: bool, _: bool) {
            self.calls.borrow_mut().push("clear");
        }
        fn set_viewport(&mut self, _: SurfaceSize) {
            self.calls.borrow_mut().push("viewport");
        }
    }

    #[test]
    fn tracked_state_skips_redundant_changes() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let inner = Counting {
            calls: calls.clone(),
        };
        let mut state = TrackedState::new(inner);

        state.set_front_face(Winding::CounterClockwise); // already set
        state.set_front_face(Winding::Clockwise);
        state.set_front_face(Winding::Clockwise); // redundant
        state.set_clip_plane(None); // already set
        state.set_clip_plane(Some(Vec4::Y));
        state.set_write_masks(true, true); // already set
        state.set_write_masks(false, false);
        state.set_depth_test(true); // already set
        state.set_depth_test(false);
        state.set_blend(false); // already set
        state.set_blend(true);
        state.clear(true, true); // always forwarded
        state.clear(true, true);

        assert_eq!(
            *calls.borrow(),
            vec!["face", "clip", "mask", "depth", "blend", "clear", "clear"]
        );
    }
}
