//! Unit contact lines on sections and maps.
//!
//! Between two neighbouring grid samples of different rank there is a
//! stratigraphic contact; its position is refined by bisection on the rank
//! evaluator down to a thousandth of the sampled extent. Points are grouped
//! by the smaller of the two ranks so a renderer can draw one polyline set
//! per contact.

use std::collections::BTreeMap;

use glam::DVec3;
use serde::Serialize;

use crate::bbox::BBox3;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::evaluate::{apply_reference, evaluate_ranks};
use crate::grid::{compute_map_points, compute_vertical_slice_points, Resolution};
use crate::model::GeologicalModel;

/// Fraction of the sampled extent at which bisection stops.
const REFINE_RATIO: f64 = 1e-3;

/// Contact points that share a minimal rank.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Boundary {
    #[serde(rename = "minimalRank")]
    pub minimal_rank: i32,
    /// 2D positions: (distance along section, z) for sections, (x, y) for
    /// maps.
    pub points: Vec<[f64; 2]>,
}

/// Rank of a single probe point, reference policy applied.
fn probe(model: &GeologicalModel, p: DVec3) -> Result<i32> {
    let raw = model.rank_batch(&[p], true)?[0];
    Ok(apply_reference(raw, model.n_units(), model.pile.reference))
}

/// Bisect between two probe positions of different rank. `value` maps the
/// scalar parameter to a 3D probe point.
fn bisect(
    model: &GeologicalModel,
    mut lo: f64,
    mut hi: f64,
    tolerance: f64,
    value: &dyn Fn(f64) -> DVec3,
) -> Result<f64> {
    let mut rank_lo = probe(model, value(lo))?;
    while (hi - lo).abs() > tolerance {
        let mid = (lo + hi) / 2.0;
        let rank_mid = probe(model, value(mid))?;
        if rank_mid == rank_lo {
            lo = mid;
            rank_lo = rank_mid;
        } else {
            hi = mid;
        }
    }
    Ok((lo + hi) / 2.0)
}

struct Accumulator {
    groups: BTreeMap<i32, Vec<[f64; 2]>>,
}

impl Accumulator {
    fn new() -> Self {
        Self { groups: BTreeMap::new() }
    }

    fn push(&mut self, rank_a: i32, rank_b: i32, point: [f64; 2]) {
        self.groups.entry(rank_a.min(rank_b)).or_default().push(point);
    }

    fn finish(self) -> Vec<Boundary> {
        self.groups
            .into_iter()
            .map(|(minimal_rank, points)| Boundary { minimal_rank, points })
            .collect()
    }
}

/// Contact lines on a vertical section. Sample ranks on the section grid,
/// then refine every rank change along columns (z direction) and rows
/// (horizontal direction).
pub fn compute_section_boundaries(
    model: &GeologicalModel,
    x: [f64; 2],
    y: [f64; 2],
    z: [f64; 2],
    resolution: Resolution,
    cancel: &CancelToken,
) -> Result<Vec<Boundary>> {
    let (w, h) = (resolution.width, resolution.height);
    let points = compute_vertical_slice_points(x, y, z, resolution);
    let ranks = evaluate_ranks(model, &points, true)?;
    cancel.check()?;

    let u_of = |i: usize| {
        let t = i as f64 / (w - 1) as f64;
        (x[0] + (x[1] - x[0]) * t, y[0] + (y[1] - y[0]) * t)
    };
    let z_of = |j: usize| z[0] + (z[1] - z[0]) * j as f64 / (h - 1) as f64;
    let span_u = (x[1] - x[0]).hypot(y[1] - y[0]);
    let tol_z = (z[1] - z[0]).abs() * REFINE_RATIO;
    let tol_u = REFINE_RATIO; // on the normalised section parameter

    let mut acc = Accumulator::new();
    // Vertical refinement: along each column.
    for i in 0..w {
        let (px, py) = u_of(i);
        for j in 0..h - 1 {
            let (a, b) = (ranks[i * h + j], ranks[i * h + j + 1]);
            if a != b {
                let zc = bisect(model, z_of(j), z_of(j + 1), tol_z, &|zz| {
                    DVec3::new(px, py, zz)
                })?;
                acc.push(a, b, [span_u * i as f64 / (w - 1) as f64, zc]);
            }
        }
        cancel.check()?;
    }
    // Horizontal refinement: along each row, on the normalised parameter.
    for j in 0..h {
        let pz = z_of(j);
        for i in 0..w - 1 {
            let (a, b) = (ranks[i * h + j], ranks[(i + 1) * h + j]);
            if a != b {
                let t0 = i as f64 / (w - 1) as f64;
                let t1 = (i + 1) as f64 / (w - 1) as f64;
                let tc = bisect(model, t0, t1, tol_u * (t1 - t0), &|t| {
                    DVec3::new(x[0] + (x[1] - x[0]) * t, y[0] + (y[1] - y[0]) * t, pz)
                })?;
                acc.push(a, b, [span_u * tc, pz]);
            }
        }
        cancel.check()?;
    }
    Ok(acc.finish())
}

/// Contact lines on the terrain map: rank changes between neighbouring map
/// samples, refined in x and y at the terrain elevation.
pub fn compute_map_boundaries(
    model: &GeologicalModel,
    bbox: &BBox3,
    resolution: Resolution,
    cancel: &CancelToken,
) -> Result<Vec<Boundary>> {
    let (w, h) = (resolution.width, resolution.height);
    let points = compute_map_points(bbox, resolution, &model.topography);
    let ranks = evaluate_ranks(model, &points, true)?;
    cancel.check()?;

    let x_of = |i: usize| bbox.xmin + bbox.width() * i as f64 / (w - 1) as f64;
    let y_of = |j: usize| bbox.ymin + bbox.height() * j as f64 / (h - 1) as f64;
    let at_surface = |xx: f64, yy: f64| {
        DVec3::new(xx, yy, model.topography.evaluate_z(xx, yy))
    };
    let tol_x = bbox.width() * REFINE_RATIO;
    let tol_y = bbox.height() * REFINE_RATIO;

    let mut acc = Accumulator::new();
    for i in 0..w {
        let px = x_of(i);
        for j in 0..h - 1 {
            let (a, b) = (ranks[i * h + j], ranks[i * h + j + 1]);
            if a != b {
                let yc = bisect(model, y_of(j), y_of(j + 1), tol_y, &|yy| at_surface(px, yy))?;
                acc.push(a, b, [px, yc]);
            }
        }
        cancel.check()?;
    }
    for j in 0..h {
        let py = y_of(j);
        for i in 0..w - 1 {
            let (a, b) = (ranks[i * h + j], ranks[(i + 1) * h + j]);
            if a != b {
                let xc = bisect(model, x_of(i), x_of(i + 1), tol_x, &|xx| at_surface(xx, py))?;
                acc.push(a, b, [xc, py]);
            }
        }
        cancel.check()?;
    }
    Ok(acc.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::testutil::layered_model;
    use crate::model::Topography;

    fn two_layer_model() -> GeologicalModel {
        // Interface at z = 15 inside a 30-deep box.
        layered_model(BBox3::new(0.0, 0.0, 0.0, 10.0, 10.0, 30.0).unwrap(), 2, 100.0)
    }

    #[test]
    fn section_contact_is_refined_to_the_interface() {
        let model = two_layer_model();
        let res = Resolution { width: 5, height: 8 };
        let boundaries = compute_section_boundaries(
            &model,
            [0.0, 0.0],
            [0.0, 10.0],
            [0.0, 30.0],
            res,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(boundaries.len(), 1);
        let contact = &boundaries[0];
        assert_eq!(contact.minimal_rank, 1);
        // One refined point per column.
        assert_eq!(contact.points.len(), 5);
        for p in &contact.points {
            assert!((p[1] - 15.0).abs() < 0.05, "contact at z = {}", p[1]);
        }
    }

    #[test]
    fn sky_contact_groups_under_rank_zero() {
        let mut model = two_layer_model();
        model.topography = Topography::horizontal_plane(20.0);
        let res = Resolution { width: 3, height: 16 };
        let boundaries = compute_section_boundaries(
            &model,
            [0.0, 0.0],
            [0.0, 10.0],
            [0.0, 30.0],
            res,
            &CancelToken::new(),
        )
        .unwrap();
        let minimal: Vec<i32> = boundaries.iter().map(|b| b.minimal_rank).collect();
        // Unit contact (1) and the ground surface (0).
        assert_eq!(minimal, vec![0, 1]);
        let surface = &boundaries[0];
        for p in &surface.points {
            assert!((p[1] - 20.0).abs() < 0.05, "surface at z = {}", p[1]);
        }
    }

    #[test]
    fn uniform_section_has_no_boundaries() {
        let model = layered_model(BBox3::new(0.0, 0.0, 0.0, 10.0, 10.0, 30.0).unwrap(), 1, 100.0);
        let res = Resolution { width: 4, height: 4 };
        let boundaries = compute_section_boundaries(
            &model,
            [0.0, 0.0],
            [0.0, 10.0],
            [0.0, 30.0],
            res,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(boundaries.is_empty());
    }

    #[test]
    fn map_boundaries_follow_a_terrain_step() {
        // Terrain drops from z = 25 to z = 5 halfway across x; the interface
        // at z = 15 outcrops there.
        let bbox = BBox3::new(0.0, 0.0, 0.0, 10.0, 10.0, 30.0).unwrap();
        let mut model = layered_model(bbox, 2, 100.0);
        model.topography = Topography::Dtm(crate::model::ImplicitDtm {
            origin: (0.0, 0.0),
            cellsize: (10.0, 10.0),
            nx: 2,
            ny: 2,
            z: vec![25.0, 25.0, 5.0, 5.0],
        });
        let res = Resolution { width: 9, height: 4 };
        let boundaries =
            compute_map_boundaries(&model, &bbox, res, &CancelToken::new()).unwrap();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].minimal_rank, 1);
        // The outcrop line sits where the interpolated terrain crosses 15:
        // z(x) = 25 - 2x, so x = 5.
        for p in &boundaries[0].points {
            assert!((p[0] - 5.0).abs() < 0.05, "outcrop at x = {}", p[0]);
        }
    }
}
