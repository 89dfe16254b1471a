//! Closed unit volumes and fault surfaces from the implicit model.
//!
//! Units: the rank field is evaluated on an endpoint-inclusive lattice, each
//! rank becomes an indicator volume padded by one cell of zeros (so the iso
//! surface closes against the padding), and marching cubes at level 0.5
//! extracts an outward-oriented surface per unit. Faults: the iso-0 surface
//! of each fault potential on the unpadded lattice; fault surfaces may stay
//! open where they leave the domain.

pub mod marching_cubes;

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec3;
use tracing::{debug, warn};

use crate::bbox::BBox3;
use crate::cancel::CancelToken;
use crate::codec::{MeshCodec, MeshFormat};
use crate::error::Result;
use crate::evaluate::apply_reference;
use crate::grid::{grid_points, Shape3};
use crate::mesh::repair::repair_borders;
use crate::mesh::TriangleMesh;
use crate::model::GeologicalModel;
use marching_cubes::marching_cubes;

/// Rank reserved for "above topography"; never meshed.
const RANK_SKY: i32 = 0;

/// Unit and fault mesh blobs produced by one volume job.
#[derive(Debug, Default)]
pub struct VolumesResult {
    pub unit: BTreeMap<i32, Vec<u8>>,
    pub fault: BTreeMap<String, Vec<u8>>,
}

/// Move marching-cubes output from extended-lattice index space into world
/// coordinates: `v * step - step + min`, where the `- step` accounts for the
/// one-cell padding margin.
fn rescale_padded(mesh: &mut TriangleMesh, bbox: &BBox3, shape: Shape3) {
    let step = lattice_step(bbox, shape);
    let min = bbox.min();
    for v in &mut mesh.vertices {
        *v = *v * step - step + min;
    }
}

fn rescale_unpadded(mesh: &mut TriangleMesh, bbox: &BBox3, shape: Shape3) {
    let step = lattice_step(bbox, shape);
    let min = bbox.min();
    for v in &mut mesh.vertices {
        *v = *v * step + min;
    }
}

fn lattice_step(bbox: &BBox3, shape: Shape3) -> DVec3 {
    DVec3::new(
        bbox.width() / (shape.nx - 1) as f64,
        bbox.height() / (shape.ny - 1) as f64,
        bbox.depth() / (shape.nz - 1) as f64,
    )
}

/// Generate topologically valid meshes for every unit present in the model,
/// plus fault surfaces when the model carries faults.
pub fn generate_volumes(
    model: &GeologicalModel,
    shape: Shape3,
    bbox: &BBox3,
    codec: &MeshCodec,
    format: MeshFormat,
    cancel: &CancelToken,
) -> Result<VolumesResult> {
    shape.validate()?;
    let points = grid_points(bbox, shape);
    let ranks = model.rank_batch(&points, true)?;
    cancel.check()?;

    let present: BTreeSet<i32> = ranks.iter().copied().collect();
    let n_units = model.n_units();
    let reference = model.pile.reference;

    let mut result = VolumesResult::default();
    let extended = Shape3 { nx: shape.nx + 2, ny: shape.ny + 2, nz: shape.nz + 2 };
    for rank in present {
        if rank == RANK_SKY {
            continue;
        }
        // Indicator in a one-cell-larger grid so bodies close at the border.
        let mut indicator = vec![0.0f64; extended.product()];
        for ix in 0..shape.nx {
            for iy in 0..shape.ny {
                for iz in 0..shape.nz {
                    if ranks[(ix * shape.ny + iy) * shape.nz + iz] == rank {
                        let e = ((ix + 1) * extended.ny + (iy + 1)) * extended.nz + (iz + 1);
                        indicator[e] = 1.0;
                    }
                }
            }
        }
        let mut mesh = marching_cubes(&indicator, extended, 0.5);
        rescale_padded(&mut mesh, bbox, shape);
        if !mesh.is_closed() && !repair_borders(&mut mesh) {
            // Downstream consumers need closed unit meshes; emit anyway so
            // the job still yields something inspectable.
            warn!(rank, "unit mesh is open after border repair");
        }
        let id = apply_reference(rank, n_units, reference);
        debug!(rank, id, vertices = mesh.vertex_count(), faces = mesh.triangle_count(), "unit mesh");
        result.unit.insert(id, codec.encode(&mesh, format)?);
        cancel.check()?;
    }

    if model.has_faults() {
        result.fault = generate_fault_meshes(model, shape, bbox, codec, format, cancel)?;
    }
    Ok(result)
}

/// Tesselate the iso-0 surface of every fault potential over the domain
/// lattice. Faults whose potential is identically zero are omitted, as are
/// faults whose surface misses the box entirely.
pub fn generate_fault_meshes(
    model: &GeologicalModel,
    shape: Shape3,
    bbox: &BBox3,
    codec: &MeshCodec,
    format: MeshFormat,
    cancel: &CancelToken,
) -> Result<BTreeMap<String, Vec<u8>>> {
    shape.validate()?;
    let points = grid_points(bbox, shape);
    let mut meshes = BTreeMap::new();
    for (name, fault) in &model.faults {
        let potential = fault.field.evaluate_batch(&points);
        cancel.check()?;
        if potential.iter().all(|&v| v == 0.0) {
            continue;
        }
        let mut mesh = marching_cubes(&potential, shape, 0.0);
        if mesh.is_empty() {
            continue;
        }
        rescale_unpadded(&mut mesh, bbox, shape);
        debug!(fault = %name, faces = mesh.triangle_count(), "fault surface");
        meshes.insert(name.clone(), codec.encode(&mesh, format)?);
    }
    Ok(meshes)
}
