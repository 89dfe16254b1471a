//! Regular sampling of bounded domains: vertical slabs, terrain-following
//! maps and volumetric lattices. Point ordering is part of the contract of
//! every function here — callers index into the flat buffers directly and
//! nothing downstream ever re-orders.

use glam::DVec3;

use crate::bbox::BBox3;
use crate::error::{Result, StrataError};
use crate::model::Topography;

/// Planar sampling resolution: `width` cells along the section's horizontal
/// extent (or x for maps), `height` along z (or y for maps). Both >= 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: usize,
    pub height: usize,
}

impl Resolution {
    pub fn product(&self) -> usize {
        self.width * self.height
    }
}

/// Volumetric sampling shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape3 {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Shape3 {
    pub fn product(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn validate(&self) -> Result<()> {
        if self.nx < 2 || self.ny < 2 || self.nz < 2 {
            return Err(StrataError::input(format!(
                "volumetric shape must be at least 2 per axis, got ({}, {}, {})",
                self.nx, self.ny, self.nz
            )));
        }
        Ok(())
    }
}

/// Aspect-preserving resolution: the larger physical dimension gets `target`
/// cells, the smaller is rounded proportionally. Ties go to the width. Both
/// results are clamped to >= 2.
///
/// `calculate_resolution(1000.0, 250.0, 100)` is `(100, 25)`.
pub fn calculate_resolution(width: f64, height: f64, target: usize) -> Resolution {
    let target = target.max(2);
    let scale = |small: f64, large: f64| -> usize {
        ((small * target as f64 / large).round() as usize).max(2)
    };
    if width >= height {
        Resolution { width: target, height: scale(height, width) }
    } else {
        Resolution { width: scale(width, height), height: target }
    }
}

/// `n` evenly spaced values covering `[a, b]` inclusive.
fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    debug_assert!(n >= 2);
    let step = (b - a) / (n - 1) as f64;
    (0..n).map(|i| a + step * i as f64).collect()
}

/// Sample a vertical slab spanning `(x0, y0) .. (x1, y1)` horizontally and
/// `z0 .. z1` vertically.
///
/// Output is column-major in (u, v): the point at index `i * height + j` is
/// the i-th horizontal station and the j-th elevation. When `x0 == x1` the
/// section is y-aligned; otherwise y is interpolated on the line
/// `y = slope * (x - x0) + y0`.
pub fn compute_vertical_slice_points(
    x: [f64; 2],
    y: [f64; 2],
    z: [f64; 2],
    resolution: Resolution,
) -> Vec<DVec3> {
    let zs = linspace(z[0], z[1], resolution.height);
    let mut points = Vec::with_capacity(resolution.product());
    if x[0] == x[1] {
        for yi in linspace(y[0], y[1], resolution.width) {
            for &zj in &zs {
                points.push(DVec3::new(x[0], yi, zj));
            }
        }
    } else {
        let slope = (y[1] - y[0]) / (x[1] - x[0]);
        for xi in linspace(x[0], x[1], resolution.width) {
            let yi = slope * (xi - x[0]) + y[0];
            for &zj in &zs {
                points.push(DVec3::new(xi, yi, zj));
            }
        }
    }
    points
}

/// Sample a regular xy grid over `bbox` at the terrain elevation.
/// Same (u, v) ordering as [`compute_vertical_slice_points`]: x is the outer
/// index, y the inner.
pub fn compute_map_points(bbox: &BBox3, resolution: Resolution, topography: &Topography) -> Vec<DVec3> {
    let ys = linspace(bbox.ymin, bbox.ymax, resolution.height);
    let mut points = Vec::with_capacity(resolution.product());
    for xi in linspace(bbox.xmin, bbox.xmax, resolution.width) {
        for &yj in &ys {
            points.push(DVec3::new(xi, yj, topography.evaluate_z(xi, yj)));
        }
    }
    points
}

/// Endpoint-inclusive lattice over `bbox`, x-major: the point for lattice
/// index `(ix, iy, iz)` sits at flat index `(ix * ny + iy) * nz + iz`.
/// This is the sampling used by the volume extractor.
pub fn grid_points(bbox: &BBox3, shape: Shape3) -> Vec<DVec3> {
    let xs = linspace(bbox.xmin, bbox.xmax, shape.nx);
    let ys = linspace(bbox.ymin, bbox.ymax, shape.ny);
    let zs = linspace(bbox.zmin, bbox.zmax, shape.nz);
    let mut points = Vec::with_capacity(shape.product());
    for &x in &xs {
        for &y in &ys {
            for &z in &zs {
                points.push(DVec3::new(x, y, z));
            }
        }
    }
    points
}

/// Cell-centre sampling over `bbox`, z-major: the centre of voxel
/// `(ix, iy, iz)` sits at flat index `(iz * ny + iy) * nx + ix`, i.e. the
/// buffer is already in the z, y, x-innermost order the voxel serialiser
/// emits.
pub fn grid_cell_centres(bbox: &BBox3, shape: Shape3) -> Vec<DVec3> {
    let dx = bbox.width() / shape.nx as f64;
    let dy = bbox.height() / shape.ny as f64;
    let dz = bbox.depth() / shape.nz as f64;
    let mut points = Vec::with_capacity(shape.product());
    for iz in 0..shape.nz {
        let z = bbox.zmin + (iz as f64 + 0.5) * dz;
        for iy in 0..shape.ny {
            let y = bbox.ymin + (iy as f64 + 0.5) * dy;
            for ix in 0..shape.nx {
                points.push(DVec3::new(bbox.xmin + (ix as f64 + 0.5) * dx, y, z));
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn resolution_scales_the_smaller_dimension() {
        assert_eq!(calculate_resolution(1000.0, 250.0, 100), Resolution { width: 100, height: 25 });
        assert_eq!(calculate_resolution(250.0, 1000.0, 100), Resolution { width: 25, height: 100 });
        assert_eq!(calculate_resolution(500.0, 500.0, 80), Resolution { width: 80, height: 80 });
    }

    #[test]
    fn resolution_never_drops_below_two() {
        let r = calculate_resolution(10_000.0, 1.0, 50);
        assert_eq!(r.width, 50);
        assert_eq!(r.height, 2);
    }

    #[test]
    fn y_aligned_slice_samples_regularly() {
        let res = Resolution { width: 20, height: 20 };
        let points = compute_vertical_slice_points([0.0, 0.0], [10.0, 29.0], [0.0, 19.0], res);
        assert_eq!(points.len(), 400);
        for i in 0..20 {
            for j in 0..20 {
                let p = points[i * 20 + j];
                assert_relative_eq!(p.x, 0.0);
                assert_relative_eq!(p.y, 10.0 + i as f64);
                assert_relative_eq!(p.z, j as f64);
            }
        }
    }

    #[test]
    fn sloped_slice_follows_the_section_line() {
        let res = Resolution { width: 20, height: 20 };
        let points = compute_vertical_slice_points([0.0, 19.0], [10.0, 29.0], [0.0, 19.0], res);
        // Slope 1: each horizontal station advances x and y together.
        for i in 0..20 {
            let p = points[i * 20];
            assert_relative_eq!(p.x, i as f64);
            assert_relative_eq!(p.y, 10.0 + i as f64);
        }
    }

    #[test]
    fn map_points_follow_terrain() {
        let bbox = BBox3::new(0.0, 10.0, 0.0, 19.0, 29.0, 100.0).unwrap();
        let topo = Topography::horizontal_plane(42.0);
        let res = Resolution { width: 20, height: 20 };
        let points = compute_map_points(&bbox, res, &topo);
        assert_eq!(points.len(), 400);
        for i in 0..20 {
            for j in 0..20 {
                let p = points[i * 20 + j];
                assert_relative_eq!(p.x, i as f64);
                assert_relative_eq!(p.y, 10.0 + j as f64);
                assert_relative_eq!(p.z, 42.0);
            }
        }
    }

    #[test]
    fn cell_centres_are_z_major_and_offset_by_half_a_cell() {
        let bbox = BBox3::new(0.0, 0.0, 0.0, 10.0, 10.0, 10.0).unwrap();
        let shape = Shape3 { nx: 2, ny: 2, nz: 2 };
        let centres = grid_cell_centres(&bbox, shape);
        assert_eq!(centres.len(), 8);
        assert_eq!(centres[0], DVec3::new(2.5, 2.5, 2.5));
        // x varies fastest...
        assert_eq!(centres[1], DVec3::new(7.5, 2.5, 2.5));
        // ...then y...
        assert_eq!(centres[2], DVec3::new(2.5, 7.5, 2.5));
        // ...and z slowest.
        assert_eq!(centres[4], DVec3::new(2.5, 2.5, 7.5));
    }

    #[test]
    fn lattice_includes_both_endpoints() {
        let bbox = BBox3::new(0.0, 0.0, 0.0, 1.0, 2.0, 3.0).unwrap();
        let shape = Shape3 { nx: 3, ny: 3, nz: 3 };
        let points = grid_points(&bbox, shape);
        assert_eq!(points.len(), 27);
        assert_eq!(points[0], DVec3::new(0.0, 0.0, 0.0));
        assert_eq!(points[26], DVec3::new(1.0, 2.0, 3.0));
        // x-major: advancing the first index steps x.
        assert_eq!(points[9], DVec3::new(0.5, 0.0, 0.0));
    }
}
