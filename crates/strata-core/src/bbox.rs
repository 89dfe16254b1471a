//! Axis-aligned bounding box of the modelled domain.
//! All coordinate math uses f64.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// An axis-aligned 3D box with strictly positive extent on every axis.
/// Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox3 {
    pub xmin: f64,
    pub ymin: f64,
    pub zmin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub zmax: f64,
}

impl BBox3 {
    pub fn new(xmin: f64, ymin: f64, zmin: f64, xmax: f64, ymax: f64, zmax: f64) -> Result<Self> {
        if !(xmin < xmax && ymin < ymax && zmin < zmax) {
            return Err(StrataError::input(format!(
                "degenerate box: [{xmin}, {xmax}] x [{ymin}, {ymax}] x [{zmin}, {zmax}]"
            )));
        }
        Ok(Self { xmin, ymin, zmin, xmax, ymax, zmax })
    }

    pub fn min(&self) -> DVec3 {
        DVec3::new(self.xmin, self.ymin, self.zmin)
    }

    pub fn max(&self) -> DVec3 {
        DVec3::new(self.xmax, self.ymax, self.zmax)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn depth(&self) -> f64 {
        self.zmax - self.zmin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extents_match_corners() {
        let b = BBox3::new(0.0, -5.0, 10.0, 4.0, 5.0, 30.0).unwrap();
        assert_eq!(b.width(), 4.0);
        assert_eq!(b.height(), 10.0);
        assert_eq!(b.depth(), 20.0);
        assert_eq!(b.min(), DVec3::new(0.0, -5.0, 10.0));
        assert_eq!(b.max(), DVec3::new(4.0, 5.0, 30.0));
    }

    #[test]
    fn degenerate_box_is_rejected() {
        assert!(BBox3::new(0.0, 0.0, 0.0, 0.0, 1.0, 1.0).is_err());
        assert!(BBox3::new(2.0, 0.0, 0.0, 1.0, 1.0, 1.0).is_err());
    }
}
