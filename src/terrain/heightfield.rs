//! Procedural height function: a low-frequency fractal base passed through a
//! terrace-flattening transform, plus an unconditional high-frequency
//! perturbation. Pure and deterministic for a fixed seed.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};

const PI: f32 = std::f32::consts::PI;

/// Width of the cosine plateau ramp within each terrace band.
const KERNEL_SIZE: f32 = 0.25;
/// Height of one terrace band.
const LEVEL_HEIGHT: f32 = 20.0;
/// Flattening is disabled above this elevation.
const FLATTEN_MAX_HEIGHT: f32 = 140.0;
/// The base term never dips below this.
const FLOOR_HEIGHT: f32 = -20.0;

pub struct HeightField {
    base: FastNoiseLite,
    detail: FastNoiseLite,
}

/// Plateau kernel: flat through most of the band, a half-cosine ramp over the
/// last `KERNEL_SIZE` fraction. `x` is the fractional position in the band.
fn flatten_kernel(x: f32) -> f32 {
    if x < 1.0 - KERNEL_SIZE {
        0.0
    } else {
        0.5 + 0.5 * (PI * (x - (1.0 - KERNEL_SIZE / 2.0)) / KERNEL_SIZE).sin()
    }
}

/// Snaps `h` toward multiples of `level`, leaving heights above `max` alone.
fn flatten(h: f32, level: f32, max: f32) -> f32 {
    if h > max {
        return h;
    }
    let v = h / level;
    (v.floor() + flatten_kernel(v - v.floor())) * level
}

impl HeightField {
    pub fn new(seed: i32) -> Self {
        let mut base = FastNoiseLite::with_seed(seed);
        base.set_noise_type(Some(NoiseType::Perlin));
        base.set_fractal_type(Some(FractalType::FBm));
        base.set_fractal_octaves(Some(3));

        let mut detail = FastNoiseLite::with_seed(seed);
        detail.set_noise_type(Some(NoiseType::OpenSimplex2));

        Self { base, detail }
    }

    /// Height of the terrain surface at world coordinates `(x, z)`.
    pub fn height(&self, x: f32, z: f32) -> f32 {
        let mut base = 160.0 * self.base.get_noise_3d(x * 0.7, z * 0.7, 0.0) + 20.0;
        base = base.max(FLOOR_HEIGHT);
        base = flatten(base, LEVEL_HEIGHT, FLATTEN_MAX_HEIGHT);

        let perturbation = self.detail.get_noise_3d(x * 8.0, z * 8.0, 2.5);

        base + perturbation + 4.0
    }
}
