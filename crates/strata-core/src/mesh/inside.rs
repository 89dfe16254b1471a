//! Batched inside/outside testing against a closed triangle mesh.
//!
//! This is the dominant hot path of GWB tagging: many grid points against a
//! handful of meshes. Points are tested in parallel per mesh with a vertical
//! ray-parity count; a 2D bounding-box prefilter rejects most points before
//! any triangle work.

use glam::{DVec2, DVec3};
use rayon::prelude::*;

use super::TriangleMesh;

/// Barycentric tolerance below which a hit counts as grazing an edge and the
/// query is retried from a nudged position.
const GRAZE_TOL: f64 = 1e-9;

struct Tri {
    a: DVec2,
    az: f64,
    /// Edge vectors of the xy projection.
    ab: DVec2,
    ac: DVec2,
    /// z offsets along the edges.
    abz: f64,
    acz: f64,
    inv_det: f64,
}

/// Precomputed acceleration state for one mesh.
pub struct InsideTester {
    tris: Vec<Tri>,
    min: DVec3,
    max: DVec3,
}

enum Hit {
    Count(usize),
    Grazed,
}

impl InsideTester {
    pub fn new(mesh: &TriangleMesh) -> Self {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for &v in &mesh.vertices {
            min = min.min(v);
            max = max.max(v);
        }
        let tris = mesh
            .faces
            .iter()
            .filter_map(|f| {
                let a = mesh.vertices[f[0] as usize];
                let b = mesh.vertices[f[1] as usize];
                let c = mesh.vertices[f[2] as usize];
                let ab = DVec2::new(b.x - a.x, b.y - a.y);
                let ac = DVec2::new(c.x - a.x, c.y - a.y);
                let det = ab.perp_dot(ac);
                // Vertical triangles have no xy footprint and cannot be
                // crossed by a vertical ray.
                if det.abs() < f64::EPSILON {
                    return None;
                }
                Some(Tri {
                    a: DVec2::new(a.x, a.y),
                    az: a.z,
                    ab,
                    ac,
                    abz: b.z - a.z,
                    acz: c.z - a.z,
                    inv_det: 1.0 / det,
                })
            })
            .collect();
        Self { tris, min, max }
    }

    /// Crossings of the upward ray from `p`, or `Grazed` when a hit lands on
    /// a triangle edge and the parity would be unreliable.
    fn crossings(&self, p: DVec3) -> Hit {
        let mut count = 0;
        for tri in &self.tris {
            let d = DVec2::new(p.x, p.y) - tri.a;
            let u = d.perp_dot(tri.ac) * tri.inv_det;
            let v = tri.ab.perp_dot(d) * tri.inv_det;
            if u < -GRAZE_TOL || v < -GRAZE_TOL || u + v > 1.0 + GRAZE_TOL {
                continue;
            }
            if u < GRAZE_TOL || v < GRAZE_TOL || u + v > 1.0 - GRAZE_TOL {
                return Hit::Grazed;
            }
            let z = tri.az + u * tri.abz + v * tri.acz;
            if z > p.z {
                count += 1;
            }
        }
        Hit::Count(count)
    }

    /// Test a single point. Grazing queries are retried from deterministic
    /// nudged positions; the final attempt counts whatever it sees.
    pub fn contains(&self, p: DVec3) -> bool {
        if p.x < self.min.x
            || p.x > self.max.x
            || p.y < self.min.y
            || p.y > self.max.y
            || p.z < self.min.z
            || p.z > self.max.z
        {
            return false;
        }
        let scale = (self.max - self.min).length().max(1.0);
        let mut q = p;
        for attempt in 0..3 {
            match self.crossings(q) {
                Hit::Count(c) => return c % 2 == 1,
                Hit::Grazed => {
                    let eps = scale * 1e-7 * (attempt + 1) as f64;
                    q = DVec3::new(p.x + eps, p.y + 2.0 * eps, p.z);
                }
            }
        }
        match self.crossings(q) {
            Hit::Count(c) => c % 2 == 1,
            Hit::Grazed => false,
        }
    }

    /// Batched test, parallel over points, output order matching input.
    pub fn contains_batch(&self, points: &[DVec3]) -> Vec<bool> {
        points.par_iter().map(|&p| self.contains(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::unit_cube;

    #[test]
    fn cube_interior_and_exterior() {
        let tester = InsideTester::new(&unit_cube());
        assert!(tester.contains(DVec3::new(0.4, 0.6, 0.3)));
        assert!(!tester.contains(DVec3::new(1.5, 0.5, 0.5)));
        assert!(!tester.contains(DVec3::new(0.5, 0.5, 1.5)));
        assert!(!tester.contains(DVec3::new(-0.1, 0.5, 0.5)));
    }

    #[test]
    fn points_aligned_with_mesh_vertices_resolve() {
        // (0.5, 0.5) sits exactly on the cube's face diagonals; the nudge
        // logic must still classify it.
        let tester = InsideTester::new(&unit_cube());
        assert!(tester.contains(DVec3::new(0.5, 0.5, 0.5)));
        assert!(!tester.contains(DVec3::new(0.5, 0.5, 2.0)));
    }

    #[test]
    fn batch_matches_single_queries() {
        let tester = InsideTester::new(&unit_cube());
        let points: Vec<DVec3> = (0..100)
            .map(|i| DVec3::new(0.02 * i as f64, 0.31, 0.77))
            .collect();
        let batch = tester.contains_batch(&points);
        for (i, &p) in points.iter().enumerate() {
            assert_eq!(batch[i], tester.contains(p), "mismatch at point {p:?}");
        }
    }
}
