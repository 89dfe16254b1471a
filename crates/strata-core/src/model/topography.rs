//! Topographic surface: either a horizontal plane or a DTM-backed implicit
//! surface. Both expose `z(x, y)` and the signed evaluator `P.z − z(P.xy)`
//! (positive above ground).

use glam::DVec3;

/// A digital terrain model on a regular grid, sampled bilinearly.
/// `z` is stored x-major: `z[ix * ny + iy]`, with index 0 at the grid's
/// lower-left (minimum x, minimum y) node.
#[derive(Debug, Clone)]
pub struct ImplicitDtm {
    pub origin: (f64, f64),
    pub cellsize: (f64, f64),
    pub nx: usize,
    pub ny: usize,
    pub z: Vec<f64>,
}

impl ImplicitDtm {
    #[inline]
    fn node(&self, ix: usize, iy: usize) -> f64 {
        self.z[ix * self.ny + iy]
    }

    /// Bilinear elevation at (x, y), clamped to the grid borders.
    pub fn evaluate_z(&self, x: f64, y: f64) -> f64 {
        let fx = ((x - self.origin.0) / self.cellsize.0).clamp(0.0, (self.nx - 1) as f64);
        let fy = ((y - self.origin.1) / self.cellsize.1).clamp(0.0, (self.ny - 1) as f64);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.nx - 1);
        let y1 = (y0 + 1).min(self.ny - 1);
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;
        self.node(x0, y0) * (1.0 - tx) * (1.0 - ty)
            + self.node(x1, y0) * tx * (1.0 - ty)
            + self.node(x0, y1) * (1.0 - tx) * ty
            + self.node(x1, y1) * tx * ty
    }
}

#[derive(Debug, Clone)]
pub enum Topography {
    /// Flat terrain at a single elevation.
    HorizontalPlane { z: f64 },
    /// Terrain backed by a DTM grid.
    Dtm(ImplicitDtm),
}

impl Topography {
    pub fn horizontal_plane(z: f64) -> Self {
        Topography::HorizontalPlane { z }
    }

    pub fn evaluate_z(&self, x: f64, y: f64) -> f64 {
        match self {
            Topography::HorizontalPlane { z } => *z,
            Topography::Dtm(dtm) => dtm.evaluate_z(x, y),
        }
    }

    /// Signed elevation of `p` relative to the terrain: positive above
    /// ground.
    pub fn signed(&self, p: DVec3) -> f64 {
        p.z - self.evaluate_z(p.x, p.y)
    }

    pub fn signed_batch(&self, points: &[DVec3]) -> Vec<f64> {
        points.iter().map(|&p| self.signed(p)).collect()
    }
}
