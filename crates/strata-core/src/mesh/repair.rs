//! Border-stitch repair for open extractions.
//!
//! Marching cubes occasionally leaves pinhole borders on an indicator
//! surface. Boundary edges are walked into loops and each loop is filled
//! with a centroid fan, oriented so the new triangles supply the missing
//! opposite edges. Unit meshes must end up closed; fault surfaces may stay
//! open.

use std::collections::HashMap;

use tracing::warn;

use super::TriangleMesh;

/// Walk the boundary edges into closed loops. Returns `None` when a vertex
/// has more than one outgoing boundary edge (non-manifold border) or a walk
/// fails to return to its start.
fn boundary_loops(mesh: &TriangleMesh) -> Option<Vec<Vec<u32>>> {
    let edges = mesh.boundary_edges();
    if edges.is_empty() {
        return Some(Vec::new());
    }
    let mut next: HashMap<u32, u32> = HashMap::with_capacity(edges.len());
    for (a, b) in &edges {
        if next.insert(*a, *b).is_some() {
            return None;
        }
    }
    let mut loops = Vec::new();
    let mut visited: HashMap<u32, bool> = HashMap::new();
    for &(start, _) in &edges {
        if visited.get(&start).copied().unwrap_or(false) {
            continue;
        }
        let mut cycle = vec![start];
        visited.insert(start, true);
        let mut current = start;
        loop {
            let &n = next.get(&current)?;
            if n == start {
                break;
            }
            if visited.get(&n).copied().unwrap_or(false) {
                // Joined a previously consumed loop mid-way: broken border.
                return None;
            }
            visited.insert(n, true);
            cycle.push(n);
            current = n;
        }
        if cycle.len() < 3 {
            return None;
        }
        loops.push(cycle);
    }
    Some(loops)
}

/// Attempt to close every border loop with a centroid fan. Returns whether
/// the mesh is closed afterwards; failures are logged and leave the mesh
/// with whatever loops could be stitched.
pub fn repair_borders(mesh: &mut TriangleMesh) -> bool {
    if mesh.is_closed() {
        return true;
    }
    let Some(loops) = boundary_loops(mesh) else {
        warn!(
            boundary_edges = mesh.boundary_edges().len(),
            "mesh border is non-manifold, cannot stitch"
        );
        return false;
    };
    for cycle in loops {
        let centroid = cycle
            .iter()
            .map(|&v| mesh.vertices[v as usize])
            .sum::<glam::DVec3>()
            / cycle.len() as f64;
        let c = mesh.vertices.len() as u32;
        mesh.vertices.push(centroid);
        // Each boundary edge (a, b) gets the fan triangle (c, b, a), which
        // contributes the missing directed edge (b, a).
        for i in 0..cycle.len() {
            let a = cycle[i];
            let b = cycle[(i + 1) % cycle.len()];
            mesh.faces.push([c, b, a]);
        }
    }
    let closed = mesh.is_closed();
    if !closed {
        warn!("border stitch left the mesh open");
    }
    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::unit_cube;

    #[test]
    fn closed_mesh_is_untouched() {
        let mut cube = unit_cube();
        let faces_before = cube.triangle_count();
        assert!(repair_borders(&mut cube));
        assert_eq!(cube.triangle_count(), faces_before);
    }

    #[test]
    fn single_missing_face_is_stitched() {
        let mut cube = unit_cube();
        cube.faces.pop();
        assert!(!cube.is_closed());
        assert!(repair_borders(&mut cube));
        assert!(cube.is_closed());
        // A triangular hole gains one centroid vertex and three fan faces.
        assert_eq!(cube.vertex_count(), 9);
        assert_eq!(cube.triangle_count(), 14);
    }

    #[test]
    fn missing_quad_is_stitched() {
        let mut cube = unit_cube();
        // Remove both top faces, leaving a four-edge border.
        cube.faces.retain(|f| *f != [4, 5, 6] && *f != [4, 6, 7]);
        assert!(repair_borders(&mut cube));
        assert!(cube.is_closed());
    }

    #[test]
    fn stitched_cube_keeps_outward_volume() {
        let mut cube = unit_cube();
        cube.faces.pop();
        repair_borders(&mut cube);
        assert!(cube.signed_volume() > 0.9);
    }
}
