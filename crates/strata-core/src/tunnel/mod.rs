//! Tunnel tube assembly along parametric trajectories.
//!
//! Each trajectory segment is a triple of expressions over `t` in [0, 1].
//! Cross-section rings are generated in the xy plane, carried along the
//! curve by a transport frame that aligns the ring axis with the tangent,
//! and stitched into a triangle strip tube.

pub mod bezier;
pub mod expr;

use glam::{DMat3, DVec3};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{Result, StrataError};
use crate::mesh::TriangleMesh;
use expr::Expr;

/// Angular tolerance (radians) below which rotations are skipped.
const EPS_ANGLE: f64 = 0.01;

/// Cross-section profile of a tunnel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TunnelShape {
    Circle { radius: f64 },
    Rectangle { width: f64, height: f64 },
    Elliptic { width: f64, height: f64 },
}

impl TunnelShape {
    /// Sample the ring in the xy plane. `scale` is the radial factor applied
    /// to sub-tubes so they wrap the main tube.
    pub fn ring(&self, nb_vertices: usize, scale: f64) -> Vec<DVec3> {
        match *self {
            TunnelShape::Circle { radius } => circle_segment(radius * scale, nb_vertices),
            TunnelShape::Rectangle { width, height } => {
                rectangle_segment(width * scale, height * scale, nb_vertices)
            }
            TunnelShape::Elliptic { width, height } => {
                elliptic_segment(width * scale, height * scale, nb_vertices)
            }
        }
    }
}

/// Evenly spaced points on a circle of `radius`.
pub fn circle_segment(radius: f64, nb_vertices: usize) -> Vec<DVec3> {
    (0..nb_vertices)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / nb_vertices as f64;
            DVec3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
        })
        .collect()
}

/// Rectangle perimeter sampled at equal arc lengths, walking up the left
/// side, across the top, down the right side and back along the bottom.
pub fn rectangle_segment(width: f64, height: f64, nb_vertices: usize) -> Vec<DVec3> {
    let length = 2.0 * width + 2.0 * height;
    (0..nb_vertices)
        .map(|i| {
            let distance = length * i as f64 / nb_vertices as f64;
            if distance < height {
                DVec3::new(-width / 2.0, distance - height / 2.0, 0.0)
            } else if distance < height + width {
                DVec3::new(distance - height - width / 2.0, height / 2.0, 0.0)
            } else if distance < 2.0 * height + width {
                DVec3::new(width / 2.0, 3.0 * height / 2.0 + width - distance, 0.0)
            } else {
                DVec3::new(2.0 * height + 3.0 * width / 2.0 - distance, -height / 2.0, 0.0)
            }
        })
        .collect()
}

/// Half-ellipse roof over a flat floor. The vertex budget is split between
/// the elliptic arc and the floor proportionally to their arc lengths; the
/// elliptic length comes from adaptive quadrature.
pub fn elliptic_segment(width: f64, height: f64, nb_vertices: usize) -> Vec<DVec3> {
    let a = width / 2.0;
    let b = height;
    let ellipse_length = 2.0
        * adaptive_simpson(
            &|t: f64| (a * a * t.cos().powi(2) + b * b * t.sin().powi(2)).sqrt(),
            0.0,
            std::f64::consts::FRAC_PI_2,
            1e-9,
        );
    let nb_ellipse = ((ellipse_length * nb_vertices as f64) / (width + ellipse_length)) as usize;
    let nb_floor = nb_vertices - nb_ellipse;
    let mut points = Vec::with_capacity(nb_vertices);
    for i in 0..nb_floor {
        let distance = width * i as f64 / nb_floor as f64;
        points.push(DVec3::new(width / 2.0 - distance, -height / 2.0, 0.0));
    }
    for i in 0..nb_ellipse {
        let t = if nb_ellipse > 1 {
            -std::f64::consts::FRAC_PI_2
                + std::f64::consts::PI * i as f64 / (nb_ellipse - 1) as f64
        } else {
            -std::f64::consts::FRAC_PI_2
        };
        points.push(DVec3::new(a * t.sin(), b * t.cos() - height / 2.0, 0.0));
    }
    points
}

/// Adaptive Simpson quadrature of `f` over `[a, b]`.
fn adaptive_simpson(f: &dyn Fn(f64) -> f64, a: f64, b: f64, eps: f64) -> f64 {
    fn simpson(f: &dyn Fn(f64) -> f64, a: f64, fa: f64, b: f64, fb: f64) -> (f64, f64) {
        let m = (a + b) / 2.0;
        let fm = f(m);
        ((b - a) / 6.0 * (fa + 4.0 * fm + fb), fm)
    }
    fn recurse(
        f: &dyn Fn(f64) -> f64,
        a: f64,
        fa: f64,
        b: f64,
        fb: f64,
        whole: f64,
        fm: f64,
        eps: f64,
        depth: u32,
    ) -> f64 {
        let m = (a + b) / 2.0;
        let (left, flm) = simpson(f, a, fa, m, fm);
        let (right, frm) = simpson(f, m, fm, b, fb);
        let delta = left + right - whole;
        if depth == 0 || delta.abs() <= 15.0 * eps {
            left + right + delta / 15.0
        } else {
            recurse(f, a, fa, m, fm, left, flm, eps / 2.0, depth - 1)
                + recurse(f, m, fm, b, fb, right, frm, eps / 2.0, depth - 1)
        }
    }
    let (fa, fb) = (f(a), f(b));
    let (whole, fm) = simpson(f, a, fa, b, fb);
    recurse(f, a, fa, b, fb, whole, fm, eps, 40)
}

/// One trajectory segment: textual `(fx, fy, fz)` over `t` in [0, 1].
#[derive(Debug, Clone)]
pub struct TrajectorySegment {
    pub x: String,
    pub y: String,
    pub z: String,
}

struct ParsedSegment {
    f: [Expr; 3],
    df: [Expr; 3],
}

impl ParsedSegment {
    fn parse(segment: &TrajectorySegment) -> Result<Self> {
        let f = [
            Expr::parse(&segment.x)?,
            Expr::parse(&segment.y)?,
            Expr::parse(&segment.z)?,
        ];
        let df = [f[0].diff(), f[1].diff(), f[2].diff()];
        Ok(Self { f, df })
    }

    fn centre(&self, t: f64) -> DVec3 {
        DVec3::new(self.f[0].eval(t), self.f[1].eval(t), self.f[2].eval(t))
    }

    fn tangent(&self, t: f64) -> DVec3 {
        DVec3::new(self.df[0].eval(t), self.df[1].eval(t), self.df[2].eval(t))
    }
}

/// Arc length of one segment between `t_start` and `t_end`, by adaptive
/// quadrature of the speed.
pub fn arc_length(segment: &TrajectorySegment, t_start: f64, t_end: f64) -> Result<f64> {
    let parsed = ParsedSegment::parse(segment)?;
    Ok(adaptive_simpson(&|t| parsed.tangent(t).length(), t_start, t_end, 1e-9))
}

/// Transport frame aligning the ring's local z axis with `tangent`.
///
/// Construction: no rotation when the tangent is within `EPS_ANGLE` of +z;
/// otherwise rotate about `tangent x z` by `acos(-tangent . z)`, then, when
/// the in-plane heading deviates from +x by more than `EPS_ANGLE`, compose
/// with an in-plane rotation about the tangent whose sign follows
/// `tangent.y`.
fn transport_frame(tangent: DVec3) -> DMat3 {
    let length = tangent.length();
    if length < 1e-12 {
        return DMat3::IDENTITY;
    }
    let that = tangent / length;
    let z = DVec3::Z;
    if that.dot(z).clamp(-1.0, 1.0).acos() < EPS_ANGLE {
        return DMat3::IDENTITY;
    }
    let cross = that.cross(z);
    let axis = if cross.length() < 1e-12 { DVec3::X } else { cross.normalize() };
    let theta = (-that.dot(z)).clamp(-1.0, 1.0).acos();
    let mut frame = DMat3::from_axis_angle(axis, theta);
    let planar = DVec3::new(that.x, that.y, 0.0);
    if planar.length() > 1e-12 {
        let heading = (planar.normalize().x).clamp(-1.0, 1.0).acos();
        if heading > EPS_ANGLE {
            let sign = if that.y < 0.0 { -1.0 } else { 1.0 };
            frame = DMat3::from_axis_angle(that, sign * heading) * frame;
        }
    }
    frame
}

/// Stitch `nb_series` consecutive rings of `nb_vertices` into a closed-ring
/// triangle strip: two triangles per quadrilateral, the last quadrilateral
/// wrapping around.
fn connect_rings(nb_vertices: usize, nb_series: usize) -> Vec<[u32; 3]> {
    let n = nb_vertices as u32;
    let mut faces = Vec::with_capacity(2 * nb_vertices * nb_series.saturating_sub(1));
    for series in 0..nb_series.saturating_sub(1) as u32 {
        let base = series * n;
        for i in 0..n {
            if i != n - 1 {
                faces.push([base + i, base + n + i, base + n + i + 1]);
            }
            if i != 0 {
                faces.push([base + i, base + i - 1, base + n + i]);
            }
        }
        faces.push([base, base + n - 1, base + n]);
        faces.push([base + n - 1, base + 2 * n - 1, base + n]);
    }
    faces
}

/// Number of samples `start + k * step < end`, robust to rounding on the
/// upper bound.
fn sample_count(start: f64, end: f64, step: f64) -> usize {
    if end <= start {
        return 0;
    }
    ((end - start) / step - 1e-9).ceil().max(0.0) as usize
}

/// Sweep the ring along the trajectory and stitch the tube.
///
/// With `idx_start`/`idx_end` both `-1` the whole trajectory is swept with
/// `t` in [0, 1) per segment; otherwise segments `idx_start ..= idx_end` are
/// swept, starting at `t_start` and ending before `t_end`.
#[allow(clippy::too_many_arguments)]
pub fn sweep_tunnel(
    segments: &[TrajectorySegment],
    step: f64,
    ring: &[DVec3],
    idx_start: i64,
    t_start: f64,
    idx_end: i64,
    t_end: f64,
    cancel: &CancelToken,
) -> Result<TriangleMesh> {
    if segments.is_empty() {
        return Err(StrataError::input("tunnel has no trajectory segments"));
    }
    if !(step > 0.0) {
        return Err(StrataError::input(format!("tunnel step must be positive, got {step}")));
    }
    if ring.len() < 3 {
        return Err(StrataError::input("tunnel cross-section needs at least 3 vertices"));
    }
    let sub_range = idx_start >= 0 && idx_end >= 0;
    let (first, last) = if sub_range {
        let first = idx_start as usize;
        let last = idx_end as usize;
        if first > last || last >= segments.len() {
            return Err(StrataError::input(format!(
                "tunnel segment range {idx_start}..{idx_end} out of bounds for {} segments",
                segments.len()
            )));
        }
        (first, last)
    } else {
        (0, segments.len() - 1)
    };

    let mut vertices = Vec::new();
    let mut nb_series = 0usize;
    for (j, segment) in segments.iter().enumerate().take(last + 1).skip(first) {
        let parsed = ParsedSegment::parse(segment)?;
        let lo = if sub_range && j == first { t_start } else { 0.0 };
        let hi = if sub_range && j == last { t_end } else { 1.0 };
        for k in 0..sample_count(lo, hi, step) {
            let t = lo + k as f64 * step;
            let centre = parsed.centre(t);
            let frame = transport_frame(parsed.tangent(t));
            for p in ring {
                vertices.push(frame * *p + centre);
            }
            nb_series += 1;
        }
        cancel.check()?;
    }
    if nb_series < 2 {
        return Err(StrataError::input("tunnel trajectory yields fewer than two rings"));
    }
    let faces = connect_rings(ring.len(), nb_series);
    debug!(rings = nb_series, vertices = vertices.len(), faces = faces.len(), "tunnel swept");
    Ok(TriangleMesh::new(vertices, faces))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight_up() -> Vec<TrajectorySegment> {
        vec![TrajectorySegment {
            x: "0".to_string(),
            y: "0".to_string(),
            z: "100*t".to_string(),
        }]
    }

    #[test]
    fn circle_ring_lies_on_the_radius() {
        let ring = circle_segment(2.0, 16);
        assert_eq!(ring.len(), 16);
        for p in &ring {
            assert_relative_eq!(p.truncate().length(), 2.0, epsilon = 1e-12);
            assert_relative_eq!(p.z, 0.0);
        }
    }

    #[test]
    fn rectangle_ring_stays_on_the_perimeter() {
        let (w, h) = (4.0, 2.0);
        let ring = rectangle_segment(w, h, 24);
        assert_eq!(ring.len(), 24);
        for p in &ring {
            let on_vertical = (p.x.abs() - w / 2.0).abs() < 1e-9 && p.y.abs() <= h / 2.0 + 1e-9;
            let on_horizontal = (p.y.abs() - h / 2.0).abs() < 1e-9 && p.x.abs() <= w / 2.0 + 1e-9;
            assert!(on_vertical || on_horizontal, "off perimeter: {p:?}");
        }
    }

    #[test]
    fn elliptic_ring_splits_the_vertex_budget() {
        let ring = elliptic_segment(4.0, 2.0, 20);
        assert_eq!(ring.len(), 20);
        // Floor points sit at y = -h/2; the arc reaches the apex b - h/2.
        let floor = ring.iter().filter(|p| (p.y + 1.0).abs() < 1e-9).count();
        assert!(floor >= 2, "floor must receive part of the budget");
        // The sampled arc approaches the apex at b - h/2 = 1.
        let apex = ring.iter().map(|p| p.y).fold(f64::MIN, f64::max);
        assert!(apex > 0.9 && apex <= 1.0 + 1e-9, "apex {apex} out of range");
    }

    #[test]
    fn simpson_matches_known_arc_length() {
        // Circle of radius 3: quarter arc length 3 pi / 2.
        let quarter = adaptive_simpson(
            &|t: f64| (9.0 * t.cos().powi(2) + 9.0 * t.sin().powi(2)).sqrt(),
            0.0,
            std::f64::consts::FRAC_PI_2,
            1e-10,
        );
        assert_relative_eq!(quarter, 3.0 * std::f64::consts::FRAC_PI_2, epsilon = 1e-8);
    }

    #[test]
    fn arc_length_of_a_straight_segment() {
        let len = arc_length(&straight_up()[0], 0.0, 1.0).unwrap();
        assert_relative_eq!(len, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn stitching_yields_two_triangles_per_quad() {
        let mesh = sweep_tunnel(
            &straight_up(),
            0.25,
            &circle_segment(1.5, 8),
            -1,
            0.0,
            -1,
            1.0,
            &CancelToken::new(),
        )
        .unwrap();
        // 4 rings of 8 vertices: 2 * 8 * 3 triangles.
        assert_eq!(mesh.vertex_count(), 32);
        assert_eq!(mesh.triangle_count(), 48);
    }

    #[test]
    fn vertical_tunnel_keeps_rings_horizontal() {
        let mesh = sweep_tunnel(
            &straight_up(),
            0.5,
            &circle_segment(1.0, 8),
            -1,
            0.0,
            -1,
            1.0,
            &CancelToken::new(),
        )
        .unwrap();
        // Tangent is +z: no rotation, rings stay in horizontal planes.
        for ring in mesh.vertices.chunks(8) {
            let z0 = ring[0].z;
            for v in ring {
                assert_relative_eq!(v.z, z0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn rings_stay_perpendicular_to_the_tangent() {
        let segments = vec![TrajectorySegment {
            x: "50*t".to_string(),
            y: "20*t^2".to_string(),
            z: "10*t".to_string(),
        }];
        let ring = circle_segment(2.0, 12);
        let parsed = ParsedSegment::parse(&segments[0]).unwrap();
        let mesh = sweep_tunnel(
            &segments, 0.2, &ring, -1, 0.0, -1, 1.0, &CancelToken::new(),
        )
        .unwrap();
        for (s, chunk) in mesh.vertices.chunks(12).enumerate() {
            let t = s as f64 * 0.2;
            let centre = parsed.centre(t);
            let tangent = parsed.tangent(t).normalize();
            for v in chunk {
                assert_relative_eq!((*v - centre).dot(tangent), 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn sub_range_limits_the_swept_segments() {
        let segments = vec![
            TrajectorySegment { x: "t".into(), y: "0".into(), z: "0".into() },
            TrajectorySegment { x: "1+t".into(), y: "0".into(), z: "0".into() },
            TrajectorySegment { x: "2+t".into(), y: "0".into(), z: "0".into() },
        ];
        let ring = circle_segment(0.5, 6);
        let mesh = sweep_tunnel(
            &segments, 0.5, &ring, 1, 0.5, 2, 0.5, &CancelToken::new(),
        )
        .unwrap();
        // Segment 1 from t = 0.5 (one ring at 0.5), segment 2 up to t = 0.5
        // (one ring at 0.0): two rings.
        assert_eq!(mesh.vertex_count(), 12);
        let xs: Vec<f64> = mesh.vertices.iter().map(|v| v.x).collect();
        assert!(xs.iter().any(|&x| (x - 1.5).abs() < 0.51));
        assert!(xs.iter().all(|&x| (0.9..=2.6).contains(&x)));
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let ring = circle_segment(1.0, 6);
        assert!(sweep_tunnel(&[], 0.1, &ring, -1, 0.0, -1, 1.0, &CancelToken::new()).is_err());
        assert!(
            sweep_tunnel(&straight_up(), 0.0, &ring, -1, 0.0, -1, 1.0, &CancelToken::new())
                .is_err()
        );
        assert!(
            sweep_tunnel(&straight_up(), 0.1, &ring[..2], -1, 0.0, -1, 1.0, &CancelToken::new())
                .is_err()
        );
        assert!(
            sweep_tunnel(&straight_up(), 0.1, &ring, 2, 0.0, 1, 1.0, &CancelToken::new()).is_err()
        );
    }
}
