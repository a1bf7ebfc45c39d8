//! View-frustum plane extraction and AABB classification.
//!
//! Planes are stored in homogeneous form `(a, b, c, d)`; a point is inside a
//! half-space when `dot(plane, (x, y, z, 1)) > 0`.

use glam::{Mat4, Vec3, Vec4};

/// The six half-spaces of a view frustum.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    pub left: Vec4,
    pub right: Vec4,
    pub bottom: Vec4,
    pub top: Vec4,
    pub near: Vec4,
    pub far: Vec4,
}

impl Frustum {
    /// Gribb–Hartmann extraction: planes are row sums/differences of the
    /// transposed view-projection matrix.
    pub fn from_view_projection(view_proj: Mat4) -> Self {
        let t = view_proj.transpose();
        Frustum {
            left: t.w_axis + t.x_axis,
            right: t.w_axis - t.x_axis,
            bottom: t.w_axis + t.y_axis,
            top: t.w_axis - t.y_axis,
            near: t.w_axis + t.z_axis,
            far: t.w_axis - t.z_axis,
        }
    }

    pub fn planes(&self) -> [Vec4; 6] {
        [
            self.left, self.right, self.bottom, self.top, self.near, self.far,
        ]
    }

    /// Conservative intersection test: the box survives only if every plane
    /// sees at least one corner on its positive side. Over-inclusive for
    /// boxes clipping a plane corner, never falsely culls.
    pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        self.planes()
            .iter()
            .all(|&plane| plane_distance_aabb(plane, min, max) > 0.0)
    }
}

/// Maximum signed plane distance over the 8 corners of an AABB.
///
/// The signed-distance function is affine, so its extremum over a convex box
/// is attained at a vertex; testing all 8 corners is exact.
pub fn plane_distance_aabb(plane: Vec4, min: Vec3, max: Vec3) -> f32 {
    let mut dist = f32::NEG_INFINITY;
    for &x in &[min.x, max.x] {
        for &y in &[min.y, max.y] {
            for &z in &[min.z, max.z] {
                dist = dist.max(plane.dot(Vec4::new(x, y, z, 1.0)));
            }
        }
    }
    dist
}
