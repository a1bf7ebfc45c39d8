//! Recording fakes for the graphics collaborator traits, shared by the
//! integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::Mat4;

use glade3d::error::SceneResult;
use glade3d::gfx::{
    GpuTexture, OcclusionQuery, OffscreenTarget, RenderDevice, RenderMesh, RenderState,
    ShaderProgram, SurfaceSize, TextureData, UniformValue, Winding,
};
use glade3d::mesh::MeshData;

pub struct MockMesh {
    pub data: MeshData,
}

impl RenderMesh for MockMesh {
    fn draw(&self, _: Mat4) {}
    fn draw_instanced(&self, _: &[Mat4]) {}
}

pub struct MockTexture;

impl GpuTexture for MockTexture {}

pub struct MockProgram;

impl ShaderProgram for MockProgram {
    fn bind(&self) {}
    fn set_uniform(&self, _: &str, _: UniformValue) {}
    fn set_texture(&self, _: &str, _: &dyn GpuTexture) {}
}

pub struct MockTarget {
    size: Cell<SurfaceSize>,
    with_color: bool,
    resizes: Rc<RefCell<Vec<SurfaceSize>>>,
}

impl OffscreenTarget for MockTarget {
    fn resize(&mut self, size: SurfaceSize) {
        self.size.set(size);
        self.resizes.borrow_mut().push(size);
    }

    fn size(&self) -> SurfaceSize {
        self.size.get()
    }

    fn color_texture(&self) -> Option<Arc<dyn GpuTexture>> {
        self.with_color.then(|| Arc::new(MockTexture) as Arc<dyn GpuTexture>)
    }

    fn depth_texture(&self) -> Option<Arc<dyn GpuTexture>> {
        Some(Arc::new(MockTexture))
    }
}

/// External control over a mock query's lifecycle.
#[derive(Clone)]
pub struct QueryControl {
    pub available: Arc<AtomicBool>,
    pub passed: Arc<AtomicBool>,
}

impl QueryControl {
    pub fn complete(&self, passed: bool) {
        self.passed.store(passed, Ordering::SeqCst);
        self.available.store(true, Ordering::SeqCst);
    }
}

pub struct MockQuery {
    control: QueryControl,
}

impl OcclusionQuery for MockQuery {
    fn begin(&mut self) {}
    fn end(&mut self) {}

    fn available(&self) -> bool {
        self.control.available.load(Ordering::SeqCst)
    }

    fn any_samples_passed(&self) -> bool {
        self.control.passed.load(Ordering::SeqCst)
    }
}

/// Recording device: remembers every mesh, texture, and program request and
/// hands out externally controllable queries.
#[derive(Default)]
pub struct MockDevice {
    pub meshes: RefCell<Vec<MeshData>>,
    pub textures: RefCell<Vec<(u32, u32, u32, u32)>>,
    pub programs: RefCell<Vec<Vec<String>>>,
    pub queries: RefCell<Vec<QueryControl>>,
    pub target_resizes: Rc<RefCell<Vec<SurfaceSize>>>,
}

impl RenderDevice for MockDevice {
    fn create_mesh(&self, data: &MeshData) -> SceneResult<Arc<dyn RenderMesh>> {
        self.meshes.borrow_mut().push(data.clone());
        Ok(Arc::new(MockMesh { data: data.clone() }))
    }

    fn create_texture(&self, data: &TextureData) -> SceneResult<Arc<dyn GpuTexture>> {
        self.textures
            .borrow_mut()
            .push((data.width, data.height, data.depth, data.channels));
        Ok(Arc::new(MockTexture))
    }

    fn create_offscreen_target(
        &self,
        size: SurfaceSize,
        with_color: bool,
    ) -> SceneResult<Box<dyn OffscreenTarget>> {
        Ok(Box::new(MockTarget {
            size: Cell::new(size),
            with_color,
            resizes: self.target_resizes.clone(),
        }))
    }

    fn create_occlusion_query(&self) -> Box<dyn OcclusionQuery> {
        let control = QueryControl {
            available: Arc::new(AtomicBool::new(false)),
            passed: Arc::new(AtomicBool::new(false)),
        };
        self.queries.borrow_mut().push(control.clone());
        Box::new(MockQuery { control })
    }

    fn load_program(&self, sources: &[&str]) -> SceneResult<Arc<dyn ShaderProgram>> {
        self.programs
            .borrow_mut()
            .push(sources.iter().map(|s| s.to_string()).collect());
        Ok(Arc::new(MockProgram))
    }
}

/// Canned per-frame input.
pub struct MockInput {
    pub cursor: glam::Vec2,
    pub keys: Vec<glade3d::gfx::MoveKey>,
    pub size: SurfaceSize,
}

impl glade3d::gfx::FrameInput for MockInput {
    fn cursor_delta(&self) -> glam::Vec2 {
        self.cursor
    }

    fn key_down(&self, key: glade3d::gfx::MoveKey) -> bool {
        self.keys.contains(&key)
    }

    fn framebuffer_size(&self) -> SurfaceSize {
        self.size
    }
}

/// Recording pipeline state.
#[derive(Default)]
pub struct MockState {
    pub log: Vec<String>,
}

impl RenderState for MockState {
    fn bind_target(&mut self, target: Option<&dyn OffscreenTarget>) {
        self.log.push(match target {
            Some(_) => "bind:offscreen".into(),
            None => "bind:default".into(),
        });
    }

    fn set_clip_plane(&mut self, plane: Option<glam::Vec4>) {
        self.log.push(match plane {
            Some(_) => "clip:on".into(),
            None => "clip:off".into(),
        });
    }

    fn set_front_face(&mut self, winding: Winding) {
        self.log.push(match winding {
            Winding::Clockwise => "face:cw".into(),
            Winding::CounterClockwise => "face:ccw".into(),
        });
    }

    fn set_write_masks(&mut self, color: bool, depth: bool) {
        self.log.push(format!("mask:{color}:{depth}"));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.log
            .push(if enabled { "depth_test:on" } else { "depth_test:off" }.into());
    }

    fn set_blend(&mut self, enabled: bool) {
        self.log
            .push(if enabled { "blend:on" } else { "blend:off" }.into());
    }

    fn clear(&mut self, _: bool, _: bool) {
        self.log.push("clear".into());
    }

    fn set_viewport(&mut self, _: SurfaceSize) {
        self.log.push("viewport".into());
    }
}

impl MockState {
    pub fn count(&self, entry: &str) -> usize {
        self.log.iter().filter(|e| e.as_str() == entry).count()
    }
}
