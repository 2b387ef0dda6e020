//! Triangle meshes for the two solids, as flat non-indexed arrays

use std::f32::consts::TAU;

use glam::Vec3;

/// Non-indexed triangle list: every three vertices form one triangle.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.vertex_count() / 3
    }

    fn push(&mut self, position: Vec3, normal: Vec3) {
        self.positions.extend_from_slice(&position.to_array());
        self.normals.extend_from_slice(&normal.to_array());
    }
}

/// Regular octahedron with flat face normals.
pub fn octahedron(radius: f32) -> Mesh {
    let mut mesh = Mesh::default();
    for sx in [1.0f32, -1.0] {
        for sy in [1.0f32, -1.0] {
            for sz in [1.0f32, -1.0] {
                let a = Vec3::new(sx * radius, 0.0, 0.0);
                let mut b = Vec3::new(0.0, sy * radius, 0.0);
                let mut c = Vec3::new(0.0, 0.0, sz * radius);
                // keep counter-clockwise winding seen from outside
                if sx * sy * sz < 0.0 {
                    std::mem::swap(&mut b, &mut c);
                }
                let normal = Vec3::new(sx, sy, sz).normalize();
                for v in [a, b, c] {
                    mesh.push(v, normal);
                }
            }
        }
    }
    mesh
}

/// Torus around the z axis with smooth normals.
pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Mesh {
    let ring = (tubular_segments + 1) as usize;
    let mut grid = Vec::with_capacity(ring * (radial_segments as usize + 1));
    for j in 0..=radial_segments {
        let v = j as f32 / radial_segments as f32 * TAU;
        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * TAU;
            let position = Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            let center = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            grid.push((position, (position - center).normalize()));
        }
    }

    let mut mesh = Mesh::default();
    for j in 1..=radial_segments as usize {
        for i in 1..=tubular_segments as usize {
            let a = ring * j + i - 1;
            let b = ring * (j - 1) + i - 1;
            let c = ring * (j - 1) + i;
            let d = ring * j + i;
            for idx in [a, b, d, b, c, d] {
                let (p, n) = grid[idx];
                mesh.push(p, n);
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octahedron_faces_point_outward() {
        let mesh = octahedron(1.0);
        assert_eq!(mesh.triangle_count(), 8);
        for tri in mesh.positions.chunks_exact(9) {
            let a = Vec3::from_slice(&tri[0..3]);
            let b = Vec3::from_slice(&tri[3..6]);
            let c = Vec3::from_slice(&tri[6..9]);
            let face = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(face.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn torus_counts_and_bounds() {
        let mesh = torus(4.0, 1.0, 30, 200);
        assert_eq!(mesh.triangle_count(), 2 * 30 * 200);
        for p in mesh.positions.chunks_exact(3) {
            let axial = (p[0] * p[0] + p[1] * p[1]).sqrt();
            assert!((3.0 - 1e-4..=5.0 + 1e-4).contains(&axial));
        }
        for n in mesh.normals.chunks_exact(3) {
            assert!((Vec3::from_slice(n).length() - 1.0).abs() < 1e-4);
        }
    }
}
