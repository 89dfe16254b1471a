//! OFF (Object File Format) reader and writer.
//!
//! The writer emits the strict form: `OFF`, a `<NV> <NF> 0` counts line,
//! vertex lines with coordinates rounded to 3 decimals, then `3 a b c` face
//! lines. The rounding is part of the wire contract. The reader is the
//! tolerant variant: blank lines and `#` comments are allowed between any
//! blocks; non-triangular faces are fatal.

use glam::DVec3;

use crate::error::{Result, StrataError};
use crate::mesh::TriangleMesh;

/// Round to 3 decimals and render with at least one fractional digit, the
/// way every OFF consumer of this service expects (`0.0`, not `0`).
fn fmt3(v: f64) -> String {
    let r = (v * 1000.0).round() / 1000.0;
    if r.fract() == 0.0 {
        format!("{r:.1}")
    } else {
        format!("{r}")
    }
}

pub fn write_off(mesh: &TriangleMesh) -> Vec<u8> {
    let mut out = String::with_capacity(mesh.vertex_count() * 24 + mesh.triangle_count() * 16);
    out.push_str("OFF\n");
    out.push_str(&format!("{} {} 0\n", mesh.vertex_count(), mesh.triangle_count()));
    for v in &mesh.vertices {
        out.push_str(&format!("{} {} {}\n", fmt3(v.x), fmt3(v.y), fmt3(v.z)));
    }
    for f in &mesh.faces {
        out.push_str(&format!("3 {} {} {}\n", f[0], f[1], f[2]));
    }
    out.into_bytes()
}

pub fn read_off(bytes: &[u8]) -> Result<TriangleMesh> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| StrataError::input("OFF data is not valid UTF-8"))?;
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let header = lines.next().ok_or_else(|| StrataError::input("empty OFF data"))?;
    if header != "OFF" {
        return Err(StrataError::input("expected the first line to be OFF"));
    }

    let counts = lines.next().ok_or_else(|| StrataError::input("OFF counts line missing"))?;
    let mut parts = counts.split_whitespace();
    let num_verts: usize = parts
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| StrataError::input("unparsable OFF vertex count"))?;
    let num_faces: usize = parts
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| StrataError::input("unparsable OFF face count"))?;

    let mut vertices = Vec::with_capacity(num_verts);
    for _ in 0..num_verts {
        let line = lines.next().ok_or_else(|| StrataError::input("OFF vertex block truncated"))?;
        let coords: Vec<f64> = line
            .split_whitespace()
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| StrataError::input(format!("unparsable OFF coordinate {v:?}")))
            })
            .collect::<Result<_>>()?;
        if coords.len() != 3 {
            return Err(StrataError::input(format!(
                "OFF vertex line has {} coordinates, expected 3",
                coords.len()
            )));
        }
        vertices.push(DVec3::new(coords[0], coords[1], coords[2]));
    }

    let mut faces = Vec::with_capacity(num_faces);
    for _ in 0..num_faces {
        let line = lines.next().ok_or_else(|| StrataError::input("OFF face block truncated"))?;
        let indices: Vec<usize> = line
            .split_whitespace()
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|_| StrataError::input(format!("unparsable OFF face index {v:?}")))
            })
            .collect::<Result<_>>()?;
        if indices.first() != Some(&3) || indices.len() != 4 {
            return Err(StrataError::input("only triangular OFF faces are supported"));
        }
        for &i in &indices[1..] {
            if i >= num_verts {
                return Err(StrataError::input(format!(
                    "OFF face references vertex {i}, only {num_verts} exist"
                )));
            }
        }
        faces.push([indices[1] as u32, indices[2] as u32, indices[3] as u32]);
    }

    Ok(TriangleMesh::new(vertices, faces))
}
