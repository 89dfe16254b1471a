//! Voxelisation: cell-centre ranks with groundwater-body tags, serialised
//! as VOX text.
//!
//! The line order is part of the contract: z-major, y next, x innermost, so
//! consumers reconstruct voxel `(x, y, z)` from line index
//! `z * ny * nx + y * nx + x` without any index column.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::bbox::BBox3;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::evaluate::evaluate_ranks;
use crate::grid::{grid_cell_centres, Shape3};
use crate::hydro::gwb_tags;
use crate::mesh::TriangleMesh;
use crate::model::GeologicalModel;

/// Evaluate ranks at voxel centres, tag against the GWB meshes, and emit the
/// VOX text block.
pub fn voxelise(
    model: &GeologicalModel,
    shape: Shape3,
    bbox: &BBox3,
    gwb_meshes: &BTreeMap<i32, Vec<TriangleMesh>>,
    cancel: &CancelToken,
) -> Result<String> {
    shape.validate()?;
    let centres = grid_cell_centres(bbox, shape);
    let ranks = evaluate_ranks(model, &centres, true)?;
    cancel.check()?;
    let tags = gwb_tags(&centres, gwb_meshes, cancel)?;

    let mut out = String::with_capacity(64 + centres.len() * 4);
    let _ = writeln!(
        out,
        "XMIN={} XMAX={} YMIN={} YMAX={} ZMIN={} ZMAX={} NUMBERX={} NUMBERY={} NUMBERZ={} NOVALUE=0",
        bbox.xmin, bbox.xmax, bbox.ymin, bbox.ymax, bbox.zmin, bbox.zmax,
        shape.nx, shape.ny, shape.nz,
    );
    out.push_str("rank gwb_id\n");
    for (rank, tag) in ranks.iter().zip(&tags) {
        let _ = writeln!(out, "{rank} {tag}");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::unit_cube;
    use crate::model::testutil::{all_sky_model, layered_model};

    fn ten_box() -> BBox3 {
        BBox3::new(0.0, 0.0, 0.0, 10.0, 10.0, 10.0).unwrap()
    }

    #[test]
    fn all_sky_model_emits_the_reference_block() {
        let model = all_sky_model(ten_box());
        let out = voxelise(
            &model,
            Shape3 { nx: 2, ny: 2, nz: 2 },
            &ten_box(),
            &BTreeMap::new(),
            &CancelToken::new(),
        )
        .unwrap();
        let expected = "XMIN=0 XMAX=10 YMIN=0 YMAX=10 ZMIN=0 ZMAX=10 \
                        NUMBERX=2 NUMBERY=2 NUMBERZ=2 NOVALUE=0\n\
                        rank gwb_id\n\
                        0 0\n0 0\n0 0\n0 0\n0 0\n0 0\n0 0\n0 0\n";
        assert_eq!(out, expected);
    }

    #[test]
    fn lines_follow_z_major_voxel_order() {
        // Two layers split at z = 5: lower voxels rank 1, upper rank 2.
        let model = layered_model(ten_box(), 2, 100.0);
        let out = voxelise(
            &model,
            Shape3 { nx: 2, ny: 2, nz: 2 },
            &ten_box(),
            &BTreeMap::new(),
            &CancelToken::new(),
        )
        .unwrap();
        let lines: Vec<&str> = out.lines().skip(2).collect();
        assert_eq!(lines.len(), 8);
        // First four lines are the z = 2.5 layer, last four z = 7.5.
        assert_eq!(&lines[..4], &["1 0"; 4]);
        assert_eq!(&lines[4..], &["2 0"; 4]);
    }

    #[test]
    fn gwb_tags_land_on_the_right_voxels() {
        let model = layered_model(ten_box(), 1, 100.0);
        // A cube over [0, 5]^3 contains exactly the (0, 0, 0) voxel centre
        // at (2.5, 2.5, 2.5).
        let mut mesh = unit_cube();
        for v in &mut mesh.vertices {
            *v *= 5.0;
        }
        let mut gwb = BTreeMap::new();
        gwb.insert(7, vec![mesh]);
        let out = voxelise(
            &model,
            Shape3 { nx: 2, ny: 2, nz: 2 },
            &ten_box(),
            &gwb,
            &CancelToken::new(),
        )
        .unwrap();
        let lines: Vec<&str> = out.lines().skip(2).collect();
        assert_eq!(lines[0], "1 7");
        for line in &lines[1..] {
            assert_eq!(*line, "1 0");
        }
    }

    #[test]
    fn fractional_box_bounds_render_with_decimals() {
        let bbox = BBox3::new(0.5, 0.0, 0.0, 10.5, 10.0, 10.0).unwrap();
        let model = all_sky_model(bbox);
        let out = voxelise(
            &model,
            Shape3 { nx: 2, ny: 2, nz: 2 },
            &bbox,
            &BTreeMap::new(),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(out.starts_with("XMIN=0.5 XMAX=10.5 "));
    }
}
