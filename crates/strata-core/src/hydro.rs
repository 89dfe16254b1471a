//! Projection of hydrogeological features onto section planes and batched
//! groundwater-body tagging of grid points.

use std::collections::BTreeMap;

use glam::{DVec2, DVec3};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::mesh::{InsideTester, TriangleMesh};

/// A spring: location plus the stratigraphic unit it emerges from.
#[derive(Debug, Clone, Copy)]
pub struct Spring {
    pub location: DVec3,
    pub unit_id: i32,
}

/// A drillhole segment.
#[derive(Debug, Clone, Copy)]
pub struct Drillhole {
    pub start: DVec3,
    pub end: DVec3,
}

/// Projected hydro features of one section.
#[derive(Debug, Default, PartialEq)]
pub struct HydroProjection {
    /// Drillhole id -> projected 2D endpoints (section coordinates).
    pub drillholes: BTreeMap<String, [[f64; 2]; 2]>,
    /// Spring id -> projected 2D position.
    pub springs: BTreeMap<String, [f64; 2]>,
    /// Combined GWB tag per grid point.
    pub gwb_tags: Vec<i32>,
}

/// The section plane: vertical, through the section's two corners.
struct SectionPlane {
    p0: DVec3,
    normal: DVec3,
}

impl SectionPlane {
    /// Sections are z-parallel, so the plane is fixed by `lower_left`,
    /// `upper_right` and the lifted corner above `lower_left`. Coincident
    /// xy corners (a drillhole rendered as a section) degenerate; each
    /// corner is inflated by one unit in x and y first.
    fn new(mut lower_left: DVec3, mut upper_right: DVec3) -> Self {
        if lower_left.x == upper_right.x && lower_left.y == upper_right.y {
            lower_left.x -= 1.0;
            lower_left.y -= 1.0;
            upper_right.x += 1.0;
            upper_right.y += 1.0;
        }
        let p2 = DVec3::new(lower_left.x, lower_left.y, upper_right.z);
        let normal = (upper_right - lower_left).cross(p2 - lower_left).normalize();
        Self { p0: lower_left, normal }
    }

    /// Out-of-plane distance and in-section 2D coordinate of `q`.
    fn project(&self, q: DVec3) -> (f64, [f64; 2]) {
        let offset = (q - self.p0).dot(self.normal);
        let on_plane = q - self.normal * offset;
        let u = DVec2::new(on_plane.x - self.p0.x, on_plane.y - self.p0.y).length();
        (offset.abs(), [u, on_plane.z])
    }
}

/// Tag every grid point with the first positive GWB id whose mesh contains
/// it, in ascending GWB id order (sub-meshes in list order).
pub fn gwb_tags(
    points: &[DVec3],
    gwb_meshes: &BTreeMap<i32, Vec<TriangleMesh>>,
    cancel: &CancelToken,
) -> Result<Vec<i32>> {
    let mut tags = vec![0i32; points.len()];
    for (&gwb_id, meshes) in gwb_meshes {
        for mesh in meshes {
            let tester = InsideTester::new(mesh);
            let inside = tester.contains_batch(points);
            for (tag, inside) in tags.iter_mut().zip(inside) {
                if *tag == 0 && inside {
                    *tag = gwb_id;
                }
            }
            cancel.check()?;
        }
    }
    Ok(tags)
}

/// Project springs and drillholes onto the section through `lower_left` /
/// `upper_right` and tag the section's grid points against the GWB meshes.
///
/// A spring is kept iff its out-of-plane distance is strictly below
/// `max_dist`; a drillhole is kept iff either endpoint passes the same test.
#[allow(clippy::too_many_arguments)]
pub fn project_hydro(
    lower_left: DVec3,
    upper_right: DVec3,
    points: &[DVec3],
    springs: Option<&BTreeMap<String, Spring>>,
    drillholes: Option<&BTreeMap<String, Drillhole>>,
    gwb_meshes: &BTreeMap<i32, Vec<TriangleMesh>>,
    max_dist: f64,
    cancel: &CancelToken,
) -> Result<HydroProjection> {
    let plane = SectionPlane::new(lower_left, upper_right);
    let mut result = HydroProjection::default();

    if let Some(springs) = springs {
        for (id, spring) in springs {
            let (dist, coord) = plane.project(spring.location);
            if dist < max_dist {
                result.springs.insert(id.clone(), coord);
            }
        }
    }

    if let Some(drillholes) = drillholes {
        for (id, hole) in drillholes {
            let (d0, c0) = plane.project(hole.start);
            let (d1, c1) = plane.project(hole.end);
            if d0 < max_dist || d1 < max_dist {
                result.drillholes.insert(id.clone(), [c0, c1]);
            }
        }
    }
    cancel.check()?;

    result.gwb_tags = gwb_tags(points, gwb_meshes, cancel)?;
    Ok(result)
}
