//! Procedural outdoor scene: terraced heightfield terrain with trees, planar
//! water with reflection/refraction, a flock of birds on Bezier loops, and a
//! sky dome. The GPU is reached through the trait seam in [`gfx`]; everything
//! here is deterministic for a fixed seed.

pub mod animation;
pub mod assets;
pub mod config;
pub mod error;
pub mod frustum;
pub mod gfx;
pub mod grid;
pub mod mesh;
pub mod scene;
pub mod terrain;

pub use config::SceneConfig;
pub use error::{SceneError, SceneResult};
pub use scene::Scene;
