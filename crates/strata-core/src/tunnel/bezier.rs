//! Cubic Bézier interpolation through tunnel waypoints.
//!
//! Clients usually describe a tunnel as a polyline of waypoints; the smooth
//! trajectory fed to the sweep is the C2 cubic Bézier spline through them.
//! Control points come from the standard tridiagonal system; each span is
//! then expanded into the polynomial segment expressions the sweep parser
//! consumes.

use glam::DVec3;

use crate::error::{Result, StrataError};
use super::TrajectorySegment;

/// Solve the tridiagonal control-point system for `n + 1` waypoints.
/// Returns the `(A, B)` inner control points of the `n` spans: span `i` is
/// the Bézier `(points[i], A[i], B[i], points[i + 1])`.
pub fn bezier_control_points(points: &[DVec3]) -> Result<(Vec<DVec3>, Vec<DVec3>)> {
    let n = points.len().saturating_sub(1);
    if n < 1 {
        return Err(StrataError::input("Bezier interpolation needs at least 2 waypoints"));
    }
    if n == 1 {
        // A single span degenerates to thirds of the chord.
        let a = points[0] + (points[1] - points[0]) / 3.0;
        let b = points[0] + (points[1] - points[0]) * 2.0 / 3.0;
        return Ok((vec![a], vec![b]));
    }

    // Tridiagonal coefficients: diag 4 (2 at the start, 7 at the end),
    // off-diagonals 1 (2 on the last sub-diagonal).
    let mut sub = vec![1.0; n];
    let mut diag = vec![4.0; n];
    let sup = vec![1.0; n];
    diag[0] = 2.0;
    diag[n - 1] = 7.0;
    sub[n - 1] = 2.0;

    let mut rhs: Vec<DVec3> = (0..n).map(|i| (points[i] * 2.0 + points[i + 1]) * 2.0).collect();
    rhs[0] = points[0] + points[1] * 2.0;
    rhs[n - 1] = points[n - 1] * 8.0 + points[n];

    // Thomas algorithm.
    for i in 1..n {
        let m = sub[i] / diag[i - 1];
        diag[i] -= m * sup[i - 1];
        let prev = rhs[i - 1];
        rhs[i] -= prev * m;
    }
    let mut a = vec![DVec3::ZERO; n];
    a[n - 1] = rhs[n - 1] / diag[n - 1];
    for i in (0..n - 1).rev() {
        a[i] = (rhs[i] - a[i + 1] * sup[i]) / diag[i];
    }

    let mut b = vec![DVec3::ZERO; n];
    for i in 0..n - 1 {
        b[i] = points[i + 1] * 2.0 - a[i + 1];
    }
    b[n - 1] = (a[n - 1] + points[n]) / 2.0;
    Ok((a, b))
}

/// Expand one Bézier span into a polynomial in `t`:
/// `p0 + 3(p1-p0) t + 3(p0-2p1+p2) t^2 + (-p0+3p1-3p2+p3) t^3`.
fn span_expression(p0: f64, p1: f64, p2: f64, p3: f64) -> String {
    let c1 = 3.0 * (p1 - p0);
    let c2 = 3.0 * (p0 - 2.0 * p1 + p2);
    let c3 = -p0 + 3.0 * p1 - 3.0 * p2 + p3;
    format!("{p0} + {c1}*t + {c2}*t^2 + {c3}*t^3")
}

/// Build the sweepable trajectory segments through `waypoints`.
pub fn segments_from_waypoints(waypoints: &[DVec3]) -> Result<Vec<TrajectorySegment>> {
    let (a, b) = bezier_control_points(waypoints)?;
    Ok((0..a.len())
        .map(|i| {
            let (p0, p3) = (waypoints[i], waypoints[i + 1]);
            TrajectorySegment {
                x: span_expression(p0.x, a[i].x, b[i].x, p3.x),
                y: span_expression(p0.y, a[i].y, b[i].y, p3.y),
                z: span_expression(p0.z, a[i].z, b[i].z, p3.z),
            }
        })
        .collect())
}
