//! CPU-side mesh data and procedural primitives (cylinders, cones, spheres,
//! planes) used for trees, the water surface and the sky dome.
//!
//! Degenerate inputs (zero radius, coincident endpoints, zero-length normal)
//! yield an empty mesh rather than an error; these are arithmetic boundary
//! guards, not user-facing failures.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

const PI: f32 = std::f32::consts::PI;

/// Interleaved vertex layout ready for GPU upload.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SceneVertex {
    pub pos: [f32; 3],
    pub nrm: [f32; 3],
    pub color: [u8; 4],
}

/// Mesh description consumed by the `RenderDevice` collaborator.
/// `normals` and `colors` may be empty when a pass does not need them.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<[u8; 4]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Appends another mesh, offsetting its indices.
    pub fn merge(&mut self, other: &MeshData) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.colors.extend_from_slice(&other.colors);
        self.indices.extend(other.indices.iter().map(|&i| i + base));
    }

    /// Reverses triangle winding in place.
    pub fn swap_winding(&mut self) {
        for tri in self.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
    }

    /// Interleaves position/normal/color streams into a Pod vertex buffer.
    /// Missing normals default to +Y, missing colors to opaque white.
    pub fn interleave(&self) -> Vec<SceneVertex> {
        let up = Vec3::Y;
        self.positions
            .iter()
            .enumerate()
            .map(|(i, p)| SceneVertex {
                pos: p.to_array(),
                nrm: self.normals.get(i).copied().unwrap_or(up).to_array(),
                color: self.colors.get(i).copied().unwrap_or([255; 4]),
            })
            .collect()
    }
}

/// Two unit vectors perpendicular to `dir` and to each other, such that
/// `a x b` points along `dir`. Used to sweep circles around an axis.
fn perpendicular_basis(dir: Vec3) -> (Vec3, Vec3) {
    let mut perp = Vec3::X.cross(dir);
    if perp == Vec3::ZERO {
        perp = Vec3::Y.cross(dir);
    }
    (perp.normalize(), perp.cross(dir).normalize())
}

fn default_segments(segments: Option<usize>, radius: f32) -> usize {
    segments.unwrap_or((7.2 * radius) as usize)
}

/// Filled circle centered at `p0`, facing `normal`.
pub fn circle(
    p0: Vec3,
    normal: Vec3,
    radius: f32,
    color: [u8; 4],
    segments: Option<usize>,
) -> MeshData {
    if normal == Vec3::ZERO || radius == 0.0 {
        return MeshData::default();
    }
    let segments = default_segments(segments, radius);
    let (px, py) = perpendicular_basis(normal);
    let normal = normal.normalize();

    let mut mesh = MeshData {
        colors: vec![color; segments],
        normals: vec![normal; segments],
        ..Default::default()
    };
    mesh.positions.reserve(segments);
    mesh.indices.reserve(3 * segments.saturating_sub(2));

    for i in 0..segments {
        let theta = 2.0 * PI * i as f32 / segments as f32;
        let direction = px * theta.cos() + py * theta.sin();
        mesh.positions.push(p0 + direction * radius);
    }
    for i in 2..segments as u32 {
        mesh.indices.extend_from_slice(&[i - 1, 0, i]);
    }
    mesh
}

/// Open tube from `p0` to `p1` (no caps).
pub fn open_cylinder(
    p0: Vec3,
    p1: Vec3,
    radius: f32,
    color: [u8; 4],
    segments: Option<usize>,
) -> MeshData {
    if p0 == p1 || radius == 0.0 {
        return MeshData::default();
    }
    let segments = default_segments(segments, radius);
    let (px, py) = perpendicular_basis(p1 - p0);

    let mut mesh = MeshData {
        colors: vec![color; 2 * segments],
        ..Default::default()
    };
    mesh.positions.reserve(2 * segments);
    mesh.normals.reserve(2 * segments);
    mesh.indices.reserve(6 * segments);

    for i in 0..segments {
        let theta = 2.0 * PI * i as f32 / segments as f32;
        let normal = px * theta.cos() + py * theta.sin();

        mesh.positions.push(p0 + normal * radius);
        mesh.positions.push(p1 + normal * radius);
        mesh.normals.push(normal);
        mesh.normals.push(normal);

        let i = i as u32;
        let n = ((i + 1) % segments as u32) as u32;
        mesh.indices
            .extend_from_slice(&[2 * i, 2 * i + 1, 2 * n, 2 * i + 1, 2 * n + 1, 2 * n]);
    }
    mesh
}

/// Open cone with base circle at `p0` and apex at `p1` (no cap).
pub fn open_cone(
    p0: Vec3,
    p1: Vec3,
    radius: f32,
    color: [u8; 4],
    segments: Option<usize>,
) -> MeshData {
    if p0 == p1 || radius == 0.0 {
        return MeshData::default();
    }
    let segments = default_segments(segments, radius);
    let (px, py) = perpendicular_basis(p1 - p0);

    let mut mesh = MeshData {
        colors: vec![color; 2 * segments],
        ..Default::default()
    };
    mesh.positions.reserve(2 * segments);
    mesh.normals.reserve(2 * segments);
    mesh.indices.reserve(3 * segments);

    for i in 0..segments {
        let theta = 2.0 * PI * i as f32 / segments as f32;
        let dir = px * theta.cos() + py * theta.sin();
        let dp = -px * theta.sin() + py * theta.cos();
        let pos = p0 + dir * radius;
        let normal = (p1 - pos).cross(dp).normalize();

        mesh.positions.push(pos);
        mesh.positions.push(p1);
        mesh.normals.push(normal);
        mesh.normals.push(normal);

        let i = i as u32;
        let n = ((i + 1) % segments as u32) as u32;
        mesh.indices.extend_from_slice(&[2 * i, 2 * i + 1, 2 * n]);
    }
    mesh
}

/// Cone with a capped base.
pub fn closed_cone(
    p0: Vec3,
    p1: Vec3,
    radius: f32,
    color: [u8; 4],
    segments: Option<usize>,
) -> MeshData {
    let mut mesh = open_cone(p0, p1, radius, color, segments);
    mesh.merge(&circle(p0, p0 - p1, radius, color, segments));
    mesh
}

/// UV sphere. `subdivisions` counts latitude rings including the poles.
pub fn sphere(radius: f32, color: [u8; 4], segments: usize, subdivisions: usize) -> MeshData {
    if radius == 0.0 || segments < 3 || subdivisions < 3 {
        return MeshData::default();
    }

    let num_vertices = segments * (subdivisions - 2) + 2;
    let mut mesh = MeshData {
        colors: vec![color; num_vertices],
        ..Default::default()
    };
    mesh.positions.reserve(num_vertices);
    mesh.normals.reserve(num_vertices);

    // Polar points first.
    mesh.positions.push(Vec3::new(0.0, radius, 0.0));
    mesh.positions.push(Vec3::new(0.0, -radius, 0.0));
    mesh.normals.push(Vec3::Y);
    mesh.normals.push(-Vec3::Y);

    for j in 1..subdivisions - 1 {
        for i in 0..segments {
            let theta = 2.0 * PI * i as f32 / segments as f32;
            let phi = PI * j as f32 / subdivisions as f32;
            let (st, ct) = theta.sin_cos();
            let (sp, cp) = phi.sin_cos();
            let vec = Vec3::new(sp * ct, cp, sp * st);
            mesh.positions.push(radius * vec);
            mesh.normals.push(vec);
        }
    }

    let segs = segments as u32;
    let last_ring = 2 + segs * (subdivisions as u32 - 3);
    for i in 0..segs {
        let n = (i + 1) % segs;
        mesh.indices.extend_from_slice(&[0, 2 + n, 2 + i]);
        mesh.indices
            .extend_from_slice(&[1, last_ring + i, last_ring + n]);
    }
    for j in 0..subdivisions as u32 - 3 {
        for i in 0..segs {
            let n = (i + 1) % segs;
            let a = 2 + segs * j + i;
            let b = 2 + segs * j + n;
            let c = 2 + segs * (j + 1) + n;
            let d = 2 + segs * (j + 1) + i;
            mesh.indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }
    mesh
}

/// Horizontal quad at height `y` spanning the given XZ rectangle.
pub fn plane_y(y: f32, xmin: f32, zmin: f32, xmax: f32, zmax: f32, color: [u8; 4]) -> MeshData {
    MeshData {
        positions: vec![
            Vec3::new(xmin, y, zmin),
            Vec3::new(xmax, y, zmin),
            Vec3::new(xmax, y, zmax),
            Vec3::new(xmin, y, zmax),
        ],
        normals: vec![Vec3::Y; 4],
        colors: vec![color; 4],
        indices: vec![0, 2, 1, 0, 3, 2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255; 4];

    #[test]
    fn degenerate_primitives_are_empty() {
        assert!(circle(Vec3::ZERO, Vec3::ZERO, 1.0, WHITE, Some(8)).is_empty());
        assert!(circle(Vec3::ZERO, Vec3::Y, 0.0, WHITE, Some(8)).is_empty());
        assert!(open_cylinder(Vec3::ONE, Vec3::ONE, 1.0, WHITE, Some(8)).is_empty());
        assert!(open_cone(Vec3::ZERO, Vec3::ZERO, 1.0, WHITE, Some(8)).is_empty());
        assert!(sphere(0.0, WHITE, 16, 9).is_empty());
    }

    #[test]
    fn cylinder_counts() {
        let mesh = open_cylinder(Vec3::ZERO, Vec3::Y, 1.0, WHITE, Some(32));
        assert_eq!(mesh.positions.len(), 64);
        assert_eq!(mesh.normals.len(), 64);
        assert_eq!(mesh.indices.len(), 6 * 32);
        // Side normals are horizontal for a vertical cylinder.
        for n in &mesh.normals {
            assert!(n.y.abs() < 1e-6);
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sphere_points_lie_on_radius() {
        let mesh = sphere(64.0, WHITE, 32, 17);
        for p in &mesh.positions {
            assert!((p.length() - 64.0).abs() < 1e-3);
        }
        // Closed topology: every index in range.
        let n = mesh.positions.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < n));
    }

    #[test]
    fn winding_swap_reverses_triangles() {
        let mut mesh = plane_y(0.0, -1.0, -1.0, 1.0, 1.0, WHITE);
        let before = mesh.indices.clone();
        mesh.swap_winding();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        mesh.swap_winding();
        assert_eq!(mesh.indices, before);
    }

    #[test]
    fn interleave_pads_missing_streams() {
        let mesh = MeshData {
            positions: vec![Vec3::ZERO, Vec3::X],
            ..Default::default()
        };
        let verts = mesh.interleave();
        assert_eq!(verts.len(), 2);
        assert_eq!(verts[0].nrm, [0.0, 1.0, 0.0]);
        assert_eq!(verts[1].color, [255; 4]);
        // Pod: byte view is well-defined.
        let bytes: &[u8] = bytemuck::cast_slice(&verts);
        assert_eq!(bytes.len(), verts.len() * std::mem::size_of::<SceneVertex>());
    }
}
