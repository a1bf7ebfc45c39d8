//! Scene configuration. Defaults reproduce the reference outdoor scene:
//! a 512x512 world at half-unit resolution with water at height zero.

use serde::{Deserialize, Serialize};

use crate::animation::flight;
use crate::error::{SceneError, SceneResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// World extent along X, in world units.
    pub terrain_width: f32,
    /// World extent along Z, in world units.
    pub terrain_depth: f32,
    /// World units between adjacent grid samples.
    pub resolution: f32,
    /// Master seed; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Water surface height.
    pub water_level: f32,
    /// Shadow-map resolution, in world units per texel (inverse density).
    pub shadow_resolution: f32,
    pub birds: BirdConfig,
    pub palette: Palette,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BirdConfig {
    pub min_count: usize,
    pub max_count: usize,
    /// Linear flight speed, world units per second.
    pub speed: f32,
    /// Flight ceiling.
    pub max_height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub grass: [u8; 4],
    pub sand: [u8; 4],
    pub mountain: [u8; 4],
    pub trunk: [u8; 4],
    pub canopy: [u8; 4],
    pub water: [u8; 4],
    pub sky_top: [u8; 4],
    pub sky_horizon: [u8; 4],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            terrain_width: 512.0,
            terrain_depth: 512.0,
            resolution: 0.5,
            seed: None,
            water_level: 0.0,
            shadow_resolution: 0.125,
            birds: BirdConfig::default(),
            palette: Palette::default(),
        }
    }
}

impl Default for BirdConfig {
    fn default() -> Self {
        Self {
            min_count: 8,
            max_count: 24,
            speed: 18.0,
            max_height: 180.0,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            grass: [119, 221, 119, 255],
            sand: [150, 113, 23, 255],
            mountain: [92, 64, 51, 255],
            trunk: [210, 105, 30, 255],
            canopy: [1, 50, 32, 255],
            water: [173, 216, 230, 255],
            sky_top: [0, 0, 255, 255],
            sky_horizon: [173, 216, 230, 255],
        }
    }
}

impl SceneConfig {
    pub fn from_json(json: &str) -> SceneResult<Self> {
        let config: SceneConfig =
            serde_json::from_str(json).map_err(|e| SceneError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SceneResult<()> {
        if !(self.resolution > 0.0) {
            return Err(SceneError::Config("resolution must be positive".into()));
        }
        if !(self.terrain_width > 0.0 && self.terrain_depth > 0.0) {
            return Err(SceneError::Config("terrain extent must be positive".into()));
        }
        // Flight paths orbit an ellipse inset twice its minimum radius from
        // every edge of the domain.
        let min_extent = 4.0 * flight::MIN_RADIUS;
        if self.terrain_width <= min_extent || self.terrain_depth <= min_extent {
            return Err(SceneError::Config(format!(
                "terrain extent must exceed {min_extent} world units to fit flight paths"
            )));
        }
        if self.birds.min_count > self.birds.max_count {
            return Err(SceneError::Config("bird count range is inverted".into()));
        }
        Ok(())
    }
}
