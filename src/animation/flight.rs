//! Closed piecewise-cubic Bezier flight paths with constant-linear-speed
//! reparameterization.
//!
//! The path parameter lives in Bezier-segment units, not time: advancing it
//! at a constant rate would speed birds up on tight curves and slow them on
//! straightaways. `next_parameter` instead searches for the parameter step
//! whose chord length matches the displacement requested for the frame.

use glam::{Vec2, Vec3};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

const PI: f32 = std::f32::consts::PI;

/// Number of cubic segments in a generated loop.
const SEGMENTS: usize = 8;
/// Minimum ellipse radius; path centers are inset by twice this.
pub const MIN_RADIUS: f32 = 64.0;
/// Per-axis jitter applied to each handle point.
const POINT_PERTURBATION: f32 = 16.0;
/// Bisection iteration count. Fixed by design: flight speed was calibrated
/// against this exact approximation.
const BISECTION_STEPS: usize = 10;

/// A closed loop of cubic Bezier segments. `points.len() == 3*n + 1` with the
/// last point equal to the first.
#[derive(Debug, Clone)]
pub struct FlightPath {
    points: Vec<Vec3>,
}

/// Rectangular XZ region paths are generated within.
#[derive(Debug, Clone, Copy)]
pub struct FlightDomain {
    pub xmin: f32,
    pub zmin: f32,
    pub xmax: f32,
    pub zmax: f32,
    /// Altitude band for path centers.
    pub min_height: f32,
    pub max_height: f32,
}

impl FlightPath {
    /// Builds a smooth closed loop around a random ellipse inside the domain.
    ///
    /// Sixteen jittered handle points are placed on the ellipse; the eight
    /// on-curve anchors are arithmetic means of their neighboring handles,
    /// which keeps the loop C1-smooth and non-self-intersecting.
    pub fn generate(domain: FlightDomain, rng: &mut ChaCha8Rng) -> Self {
        let center = Vec3::new(
            rng.random_range(domain.xmin + 2.0 * MIN_RADIUS..domain.xmax - 2.0 * MIN_RADIUS),
            rng.random_range(domain.min_height..domain.max_height),
            rng.random_range(domain.zmin + 2.0 * MIN_RADIUS..domain.zmax - 2.0 * MIN_RADIUS),
        );

        let max_radius = (center.x - domain.xmin)
            .min(domain.xmax - center.x)
            .min(center.z - domain.zmin)
            .min(domain.zmax - center.z);

        let r1 = rng.random_range(MIN_RADIUS..max_radius);
        let r2 = rng.random_range(MIN_RADIUS..max_radius);
        let angle = rng.random_range(0.0..2.0 * PI);
        let (sa, ca) = angle.sin_cos();

        let mut points = vec![Vec3::ZERO; 3 * SEGMENTS + 1];

        // Handle points: two per segment, jittered on the rotated ellipse.
        for i in 0..2 * SEGMENTS {
            let j = 3 * (i / 2) + i % 2 + 1;
            let t = 2.0 * PI * j as f32 / (3 * SEGMENTS) as f32;

            let bp = Vec2::new(r1 * t.cos(), r2 * t.sin());
            points[j] = center + Vec3::new(bp.x * ca + bp.y * sa, 0.0, -bp.x * sa + bp.y * ca);
            points[j] += Vec3::new(
                rng.random_range(-POINT_PERTURBATION..POINT_PERTURBATION),
                rng.random_range(-POINT_PERTURBATION..POINT_PERTURBATION),
                rng.random_range(-POINT_PERTURBATION..POINT_PERTURBATION),
            );
        }

        // Anchors: the mean of the neighboring handles.
        for i in 0..SEGMENTS {
            points[3 * i] = (points[(3 * i + 3 * SEGMENTS - 1) % (3 * SEGMENTS)]
                + points[3 * i + 1])
                / 2.0;
        }
        points[3 * SEGMENTS] = points[0];

        Self { points }
    }

    /// Builds a path directly from control points (for tests and imports).
    /// Panics unless `points.len() == 3*n + 1` and the loop closes.
    pub fn from_points(points: Vec<Vec3>) -> Self {
        assert!(points.len() > 3 && points.len() % 3 == 1, "not a closed cubic loop");
        assert_eq!(points[0], points[points.len() - 1], "loop must close");
        Self { points }
    }

    pub fn num_segments(&self) -> usize {
        (self.points.len() - 1) / 3
    }

    /// Wraps `t` into `[0, num_segments)` and splits it into a segment index
    /// and a local parameter.
    fn split(&self, t: f32) -> (usize, f32) {
        let n = self.num_segments() as f32;
        let t = t - n * (t / n).floor();
        let segment = t.floor();
        ((segment as usize).min(self.num_segments() - 1), t - segment)
    }

    /// Position on the loop at parameter `t` (segment units, any real value).
    pub fn position_at(&self, t: f32) -> Vec3 {
        let (segment, t) = self.split(t);
        let a = self.points[3 * segment];
        let b = self.points[3 * segment + 1];
        let c = self.points[3 * segment + 2];
        let d = self.points[3 * segment + 3];

        let ct = 1.0 - t;
        a * ct * ct * ct + 3.0 * b * ct * ct * t + 3.0 * c * ct * t * t + d * t * t * t
    }

    /// Analytic derivative of [`Self::position_at`] with respect to `t`.
    pub fn velocity_at(&self, t: f32) -> Vec3 {
        let (segment, t) = self.split(t);
        let a = self.points[3 * segment];
        let b = self.points[3 * segment + 1];
        let c = self.points[3 * segment + 2];
        let d = self.points[3 * segment + 3];

        let ct = 1.0 - t;
        3.0 * ((b - a) * ct * ct + 2.0 * (c - b) * ct * t + (d - c) * t * t)
    }

    /// Advances the path parameter so the chord from `position_at(t)` to the
    /// new position approximately equals `desired` (constant linear speed
    /// regardless of local curvature).
    ///
    /// Exponential search doubles the trial step until the chord meets or
    /// exceeds `desired`, then a fixed number of bisection iterations narrow
    /// the bracket.
    pub fn next_parameter(&self, t: f32, desired: f32) -> f32 {
        let d2 = desired * desired;
        let cur = self.position_at(t);

        let mut lo = 0.0f32;
        let mut dt = 1.0f32;
        // A displacement no chord can reach would loop forever; two full
        // loops is already past every chord, stop there.
        let cap = 2.0 * self.num_segments() as f32;
        while cur.distance_squared(self.position_at(t + dt)) < d2 && dt < cap {
            lo = dt;
            dt *= 2.0;
        }

        let mut t0 = t + lo;
        let mut t1 = t + dt;
        for _ in 0..BISECTION_STEPS {
            let tk = (t0 + t1) / 2.0;
            if cur.distance_squared(self.position_at(tk)) < d2 {
                t0 = tk;
            } else {
                t1 = tk;
            }
        }

        let next = (t0 + t1) / 2.0;
        // Keep the stored parameter wrapped.
        let n = self.num_segments() as f32;
        next - n * (next / n).floor()
    }
}
