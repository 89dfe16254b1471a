//! Job entry points and their wire-facing payload/result types.
//!
//! These functions mirror the five endpoint families of the HTTP
//! collaborator. They accept pre-materialised inputs (a parsed model, blob
//! bytes, payload structs) and return in-memory results; nothing here
//! touches disk or network. Field casing on the payload structs is part of
//! the front-end contract.

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bbox::BBox3;
use crate::cancel::CancelToken;
use crate::codec::{MeshCodec, MeshFormat};
use crate::error::{Result, StrataError};
use crate::evaluate::evaluate_ranks;
use crate::fault::compute_fault_intersections;
use crate::grid::{calculate_resolution, compute_map_points, compute_vertical_slice_points, Resolution, Shape3};
use crate::hydro::{project_hydro, Drillhole, HydroProjection, Spring};
use crate::mesh::TriangleMesh;
use crate::model::GeologicalModel;
use crate::profile::JobProfile;
use crate::tunnel::{sweep_tunnel, TrajectorySegment, TunnelShape};
use crate::volume::{generate_fault_meshes, generate_volumes, VolumesResult};
use crate::voxels::voxelise;

/// Projection validity threshold as a fraction of the model's larger
/// horizontal extent.
pub const RATIO_MAX_DIST_PROJ: f64 = 0.2;

// ── Payload primitives ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vec3Float {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Vec3Float> for DVec3 {
    fn from(v: Vec3Float) -> Self {
        DVec3::new(v.x, v.y, v.z)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vec3Int {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl From<Vec3Int> for Shape3 {
    fn from(v: Vec3Int) -> Self {
        Shape3 { nx: v.x, ny: v.y, nz: v.z }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxDict {
    pub x_min: f64,
    pub y_min: f64,
    pub z_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub z_max: f64,
}

impl TryFrom<BoxDict> for BBox3 {
    type Error = StrataError;

    fn try_from(b: BoxDict) -> Result<BBox3> {
        BBox3::new(b.x_min, b.y_min, b.z_min, b.x_max, b.y_max, b.z_max)
    }
}

/// Configuration of the meshes, faults and voxels computations.
#[derive(Debug, Clone, Deserialize)]
pub struct MeshesData {
    pub resolution: Vec3Int,
    #[serde(rename = "box", default)]
    pub bbox: Option<BoxDict>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rectangle3D {
    pub lower_left: Vec3Float,
    pub upper_right: Vec3Float,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Line3D {
    pub start: Vec3Float,
    pub end: Vec3Float,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpringData {
    pub location: Vec3Float,
    #[serde(default)]
    pub unit_id: i32,
}

/// Configuration of the intersections computation.
#[derive(Debug, Clone, Deserialize)]
pub struct IntersectionsData {
    #[serde(default)]
    pub springs: Option<BTreeMap<String, SpringData>>,
    #[serde(default)]
    pub drillholes: Option<BTreeMap<String, Line3D>>,
    pub resolution: usize,
    #[serde(rename = "toCompute")]
    pub to_compute: BTreeMap<String, Rectangle3D>,
    #[serde(rename = "computeMap")]
    pub compute_map: bool,
}

// ── Result types ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize)]
pub struct MeshIntersectionsResult {
    #[serde(rename = "forCrossSections")]
    pub for_cross_sections: BTreeMap<String, Vec<Vec<i32>>>,
    pub drillholes: BTreeMap<String, BTreeMap<String, [[f64; 2]; 2]>>,
    pub springs: BTreeMap<String, BTreeMap<String, [f64; 2]>>,
    #[serde(rename = "matrixGwb")]
    pub matrix_gwb: BTreeMap<String, Vec<i32>>,
    #[serde(rename = "forMaps", skip_serializing_if = "Option::is_none")]
    pub for_maps: Option<Vec<Vec<i32>>>,
}

#[derive(Debug, Default, Serialize)]
pub struct FaultIntersectionsResult {
    #[serde(rename = "forCrossSections")]
    pub for_cross_sections: BTreeMap<String, BTreeMap<String, Vec<Vec<Option<f64>>>>>,
    #[serde(rename = "forMaps")]
    pub for_maps: BTreeMap<String, Vec<Vec<Option<f64>>>>,
}

#[derive(Debug, Default, Serialize)]
pub struct IntersectionsResult {
    pub mesh: MeshIntersectionsResult,
    pub fault: FaultIntersectionsResult,
}

// ── Tunnel payloads ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TunnelFunction {
    pub x: String,
    pub y: String,
    pub z: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum TunnelShapeKind {
    Circle,
    Rectangle,
    Elliptic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TunnelData {
    pub name: String,
    pub shape: TunnelShapeKind,
    pub functions: Vec<TunnelFunction>,
    #[serde(default)]
    pub radius: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

impl TunnelData {
    fn profile(&self) -> Result<TunnelShape> {
        let missing = |what: &str| {
            StrataError::input(format!("tunnel {:?} is missing {what}", self.name))
        };
        match self.shape {
            TunnelShapeKind::Circle => {
                Ok(TunnelShape::Circle { radius: self.radius.ok_or_else(|| missing("radius"))? })
            }
            TunnelShapeKind::Rectangle => Ok(TunnelShape::Rectangle {
                width: self.width.ok_or_else(|| missing("width"))?,
                height: self.height.ok_or_else(|| missing("height"))?,
            }),
            TunnelShapeKind::Elliptic => Ok(TunnelShape::Elliptic {
                width: self.width.ok_or_else(|| missing("width"))?,
                height: self.height.ok_or_else(|| missing("height"))?,
            }),
        }
    }
}

/// Configuration of the tunnel meshes computation.
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelMeshesData {
    pub tunnels: Vec<TunnelData>,
    pub nb_vertices: usize,
    pub step: f64,
    #[serde(rename = "idxStart")]
    pub idx_start: i64,
    #[serde(rename = "idxEnd")]
    pub idx_end: i64,
    #[serde(rename = "tStart")]
    pub t_start: f64,
    #[serde(rename = "tEnd")]
    pub t_end: f64,
}

// ── Entry points ──────────────────────────────────────────────────────────────

fn job_box(model: &GeologicalModel, bbox: Option<BoxDict>) -> Result<BBox3> {
    match bbox {
        Some(b) => b.try_into(),
        None => Ok(model.bbox),
    }
}

/// Unit and fault meshes.
pub fn compute_meshes(
    model: &GeologicalModel,
    data: &MeshesData,
    codec: &MeshCodec,
    format: MeshFormat,
    profile: &mut JobProfile,
    cancel: &CancelToken,
) -> Result<VolumesResult> {
    let shape: Shape3 = data.resolution.into();
    profile
        .set_metadata("num_units", model.n_units() as u64)
        .set_metadata("num_faults", model.faults.len() as u64)
        .set_metadata("resolution", shape.product() as u64);
    let bbox = job_box(model, data.bbox)?;
    let result = generate_volumes(model, shape, &bbox, codec, format, cancel)?;
    profile.step("generate_volumes");
    Ok(result)
}

/// Fault meshes only; the unit map stays empty.
pub fn compute_faults(
    model: &GeologicalModel,
    data: &MeshesData,
    codec: &MeshCodec,
    format: MeshFormat,
    profile: &mut JobProfile,
    cancel: &CancelToken,
) -> Result<VolumesResult> {
    let shape: Shape3 = data.resolution.into();
    profile
        .set_metadata("num_faults", model.faults.len() as u64)
        .set_metadata("resolution", shape.product() as u64);
    let bbox = job_box(model, data.bbox)?;
    let fault = generate_fault_meshes(model, shape, &bbox, codec, format, cancel)?;
    profile.step("generate_fault_meshes");
    Ok(VolumesResult { unit: BTreeMap::new(), fault })
}

/// Decode GWB mesh blobs and key them by numeric id.
fn decode_gwb_meshes(
    raw: &BTreeMap<String, Vec<Vec<u8>>>,
    codec: &MeshCodec,
) -> Result<BTreeMap<i32, Vec<TriangleMesh>>> {
    let mut decoded = BTreeMap::new();
    for (key, blobs) in raw {
        let id: i32 = key
            .parse()
            .map_err(|_| StrataError::input(format!("GWB id {key:?} is not an integer")))?;
        let meshes: Vec<TriangleMesh> =
            blobs.iter().map(|bytes| codec.decode(bytes)).collect::<Result<_>>()?;
        for mesh in &meshes {
            if !mesh.is_closed() {
                warn!(gwb = id, "GWB component mesh is not closed");
            }
        }
        decoded.insert(id, meshes);
    }
    Ok(decoded)
}

/// Rank matrix on a section or map grid: `width` rows of `height` samples,
/// in grid storage order.
fn compute_cross_section_ranks(
    points: &[DVec3],
    resolution: Resolution,
    model: &GeologicalModel,
    with_topography: bool,
) -> Result<Vec<Vec<i32>>> {
    let ranks = evaluate_ranks(model, points, with_topography)?;
    Ok(ranks.chunks(resolution.height).map(<[i32]>::to_vec).collect())
}

/// Cross-section rank matrices, hydro projections, GWB tags and fault
/// intersections for every requested section, plus the optional map.
pub fn compute_intersections(
    model: &GeologicalModel,
    data: &IntersectionsData,
    gwb_blobs: &BTreeMap<String, Vec<Vec<u8>>>,
    codec: &MeshCodec,
    profile: &mut JobProfile,
    cancel: &CancelToken,
) -> Result<IntersectionsResult> {
    let bbox = model.bbox;
    let gwb_meshes = decode_gwb_meshes(gwb_blobs, codec)?;
    profile
        .set_metadata("num_units", model.n_units() as u64)
        .set_metadata("num_sections", data.to_compute.len() as u64)
        .set_metadata("compute_map", data.compute_map)
        .set_metadata("num_gwb_parts", gwb_meshes.len() as u64)
        .set_metadata("resolution", data.resolution as u64);
    profile.step("load_inputs");
    let max_dist_proj = bbox.width().max(bbox.height()) * RATIO_MAX_DIST_PROJ;

    let springs: Option<BTreeMap<String, Spring>> = data.springs.as_ref().map(|m| {
        m.iter()
            .map(|(id, s)| {
                (id.clone(), Spring { location: s.location.into(), unit_id: s.unit_id })
            })
            .collect()
    });
    let drillholes: Option<BTreeMap<String, Drillhole>> = data.drillholes.as_ref().map(|m| {
        m.iter()
            .map(|(id, l)| (id.clone(), Drillhole { start: l.start.into(), end: l.end.into() }))
            .collect()
    });
    let want_hydro =
        springs.is_some() || drillholes.is_some() || !gwb_meshes.is_empty();

    let mut result = IntersectionsResult::default();
    for (key, rect) in &data.to_compute {
        let x_coord = [rect.lower_left.x.round(), rect.upper_right.x.round()];
        let y_coord = [rect.lower_left.y.round(), rect.upper_right.y.round()];
        let z_coord = [rect.lower_left.z.round(), rect.upper_right.z.round()];
        let width = (x_coord[1] - x_coord[0]).hypot(y_coord[1] - y_coord[0]);
        let height = (z_coord[1] - z_coord[0]).abs();
        let resolution = calculate_resolution(width, height, data.resolution);
        let xyz = compute_vertical_slice_points(x_coord, y_coord, z_coord, resolution);
        debug!(section = %key, w = resolution.width, h = resolution.height, "section grid");
        profile.step("cross_section_grid");

        result
            .mesh
            .for_cross_sections
            .insert(key.clone(), compute_cross_section_ranks(&xyz, resolution, model, true)?);

        if want_hydro {
            let lower_left = DVec3::new(x_coord[0], y_coord[0], z_coord[0]);
            let upper_right = DVec3::new(x_coord[1], y_coord[1], z_coord[1]);
            let HydroProjection { drillholes: holes, springs: spring_points, gwb_tags } =
                project_hydro(
                    lower_left,
                    upper_right,
                    &xyz,
                    springs.as_ref(),
                    drillholes.as_ref(),
                    &gwb_meshes,
                    max_dist_proj,
                    cancel,
                )?;
            result.mesh.drillholes.insert(key.clone(), holes);
            result.mesh.springs.insert(key.clone(), spring_points);
            result.mesh.matrix_gwb.insert(key.clone(), gwb_tags);
        }

        result
            .fault
            .for_cross_sections
            .insert(key.clone(), compute_fault_intersections(&xyz, resolution, model, cancel)?);
        profile.step("cross_section_outputs");
        cancel.check()?;
    }

    if data.compute_map {
        let resolution = calculate_resolution(bbox.width(), bbox.height(), data.resolution);
        let xyz = compute_map_points(&bbox, resolution, &model.topography);
        debug!(w = resolution.width, h = resolution.height, "map grid");
        profile.step("map_grid");
        result.mesh.for_maps =
            Some(compute_cross_section_ranks(&xyz, resolution, model, false)?);
        result.fault.for_maps = compute_fault_intersections(&xyz, resolution, model, cancel)?;
        profile.step("map_outputs");
    }
    Ok(result)
}

/// Voxelised ranks with GWB tags as VOX text.
pub fn compute_voxels(
    model: &GeologicalModel,
    data: &MeshesData,
    gwb_blobs: &BTreeMap<String, Vec<Vec<u8>>>,
    codec: &MeshCodec,
    profile: &mut JobProfile,
    cancel: &CancelToken,
) -> Result<String> {
    let shape: Shape3 = data.resolution.into();
    profile
        .set_metadata("num_units", model.n_units() as u64)
        .set_metadata("num_gwb_parts", gwb_blobs.len() as u64)
        .set_metadata("resolution", shape.product() as u64);
    let bbox = job_box(model, data.bbox)?;
    let gwb_meshes = decode_gwb_meshes(gwb_blobs, codec)?;
    profile.step("load_inputs");
    let text = voxelise(model, shape, &bbox, &gwb_meshes, cancel)?;
    profile.step("voxelise");
    Ok(text)
}

/// One tube mesh per tunnel. Sub-tubes (an explicit segment range) get a
/// 10 % larger cross-section so they wrap the main tube.
pub fn compute_tunnel_meshes(
    data: &TunnelMeshesData,
    codec: &MeshCodec,
    format: MeshFormat,
    profile: &mut JobProfile,
    cancel: &CancelToken,
) -> Result<BTreeMap<String, Vec<u8>>> {
    let sub_t = if data.idx_start >= 0 && data.idx_end >= 0 { 1.10 } else { 1.0 };
    profile
        .set_metadata("num_tunnels", data.tunnels.len() as u64)
        .set_metadata("nb_vertices", data.nb_vertices as u64);
    let mut output = BTreeMap::new();
    for tunnel in &data.tunnels {
        let ring = tunnel.profile()?.ring(data.nb_vertices, sub_t);
        let segments: Vec<TrajectorySegment> = tunnel
            .functions
            .iter()
            .map(|f| TrajectorySegment { x: f.x.clone(), y: f.y.clone(), z: f.z.clone() })
            .collect();
        let mesh = sweep_tunnel(
            &segments,
            data.step,
            &ring,
            data.idx_start,
            data.t_start,
            data.idx_end,
            data.t_end,
            cancel,
        )?;
        output.insert(tunnel.name.clone(), codec.encode(&mesh, format)?);
        profile.step(&tunnel.name);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::read_off;
    use crate::model::testutil::layered_model;

    fn model() -> GeologicalModel {
        layered_model(BBox3::new(0.0, 0.0, 0.0, 100.0, 50.0, 40.0).unwrap(), 2, 1000.0)
    }

    #[test]
    fn meshes_payload_accepts_an_optional_box() {
        let with_box: MeshesData = serde_json::from_str(
            r#"{"resolution": {"x": 4, "y": 4, "z": 4},
                "box": {"xMin": 0, "yMin": 0, "zMin": 0, "xMax": 1, "yMax": 1, "zMax": 1}}"#,
        )
        .unwrap();
        assert!(with_box.bbox.is_some());
        let without: MeshesData =
            serde_json::from_str(r#"{"resolution": {"x": 4, "y": 4, "z": 4}}"#).unwrap();
        assert!(without.bbox.is_none());
    }

    #[test]
    fn meshes_job_produces_unit_blobs() {
        let data: MeshesData =
            serde_json::from_str(r#"{"resolution": {"x": 6, "y": 6, "z": 6}}"#).unwrap();
        let out = compute_meshes(
            &model(),
            &data,
            &MeshCodec::default(),
            MeshFormat::Off,
            &mut JobProfile::new("test"),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out.unit.len(), 2);
        assert!(out.fault.is_empty());
        for bytes in out.unit.values() {
            assert!(read_off(bytes).unwrap().is_closed());
        }
    }

    fn intersections_payload() -> IntersectionsData {
        serde_json::from_str(
            r#"{
                "resolution": 10,
                "computeMap": true,
                "toCompute": {
                    "s1": {"lowerLeft": {"x": 0, "y": 0, "z": 0},
                            "upperRight": {"x": 0, "y": 50, "z": 40}}
                },
                "springs": {"sp1": {"location": {"x": 1.0, "y": 25.0, "z": 10.0}, "unit_id": 1}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn intersections_job_fills_every_section_output() {
        let out = compute_intersections(
            &model(),
            &intersections_payload(),
            &BTreeMap::new(),
            &MeshCodec::default(),
            &mut JobProfile::new("test"),
            &CancelToken::new(),
        )
        .unwrap();
        // Section height 40 < width 50: width carries the resolution.
        let ranks = &out.mesh.for_cross_sections["s1"];
        assert_eq!(ranks.len(), 10);
        assert_eq!(ranks[0].len(), 8);
        // The spring sits 1 unit off-plane, well under 0.2 * 100.
        assert!(out.mesh.springs["s1"].contains_key("sp1"));
        assert!(out.mesh.for_maps.is_some());
        let map = out.mesh.for_maps.as_ref().unwrap();
        // Map keeps the box aspect: 100 x 50.
        assert_eq!(map.len(), 10);
        assert_eq!(map[0].len(), 5);
    }

    #[test]
    fn intersections_serialise_with_contract_keys() {
        let out = compute_intersections(
            &model(),
            &intersections_payload(),
            &BTreeMap::new(),
            &MeshCodec::default(),
            &mut JobProfile::new("test"),
            &CancelToken::new(),
        )
        .unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert!(json["mesh"]["forCrossSections"]["s1"].is_array());
        assert!(json["mesh"]["matrixGwb"].is_object());
        assert!(json["fault"]["forCrossSections"]["s1"].is_object());
        assert!(json["mesh"]["forMaps"].is_array());
    }

    #[test]
    fn bad_gwb_ids_are_fatal() {
        let mut gwb = BTreeMap::new();
        gwb.insert("not-a-number".to_string(), vec![]);
        let err = compute_voxels(
            &model(),
            &serde_json::from_str(r#"{"resolution": {"x": 2, "y": 2, "z": 2}}"#).unwrap(),
            &gwb,
            &MeshCodec::default(),
            &mut JobProfile::new("test"),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, StrataError::InputShape(_)));
    }

    #[test]
    fn tunnel_job_encodes_one_mesh_per_tunnel() {
        let data: TunnelMeshesData = serde_json::from_str(
            r#"{
                "tunnels": [{"name": "north", "shape": "Circle", "radius": 2.0,
                             "functions": [{"x": "100*t", "y": "0", "z": "5"}]}],
                "nb_vertices": 8,
                "step": 0.25,
                "idxStart": -1, "idxEnd": -1, "tStart": 0.0, "tEnd": 1.0
            }"#,
        )
        .unwrap();
        let out = compute_tunnel_meshes(
            &data,
            &MeshCodec::default(),
            MeshFormat::Off,
            &mut JobProfile::new("test"),
            &CancelToken::new(),
        )
        .unwrap();
        let mesh = read_off(&out["north"]).unwrap();
        assert_eq!(mesh.vertex_count(), 32);
        assert_eq!(mesh.triangle_count(), 48);
    }

    #[test]
    fn sub_tube_scales_the_ring() {
        let payload = |idx: i64| -> TunnelMeshesData {
            serde_json::from_str(&format!(
                r#"{{
                    "tunnels": [{{"name": "m", "shape": "Circle", "radius": 10.0,
                                 "functions": [{{"x": "0", "y": "0", "z": "100*t"}},
                                               {{"x": "0", "y": "0", "z": "100+100*t"}}]}}],
                    "nb_vertices": 6,
                    "step": 0.5,
                    "idxStart": {idx}, "idxEnd": {idx}, "tStart": 0.0, "tEnd": 1.0
                }}"#
            ))
            .unwrap()
        };
        let full = compute_tunnel_meshes(
            &payload(-1),
            &MeshCodec::default(),
            MeshFormat::Off,
            &mut JobProfile::new("test"),
            &CancelToken::new(),
        )
        .unwrap();
        let sub = compute_tunnel_meshes(
            &payload(0),
            &MeshCodec::default(),
            MeshFormat::Off,
            &mut JobProfile::new("test"),
            &CancelToken::new(),
        )
        .unwrap();
        let radius = |bytes: &[u8]| -> f64 {
            let mesh = read_off(bytes).unwrap();
            let v = mesh.vertices[0];
            v.x.hypot(v.y)
        };
        assert!((radius(&full["m"]) - 10.0).abs() < 1e-6);
        assert!((radius(&sub["m"]) - 11.0).abs() < 1e-6);
    }

    #[test]
    fn missing_shape_parameters_are_fatal() {
        let data: TunnelMeshesData = serde_json::from_str(
            r#"{
                "tunnels": [{"name": "bad", "shape": "Rectangle", "width": 4.0,
                             "functions": [{"x": "t", "y": "0", "z": "0"}]}],
                "nb_vertices": 8, "step": 0.25,
                "idxStart": -1, "idxEnd": -1, "tStart": 0.0, "tEnd": 1.0
            }"#,
        )
        .unwrap();
        let err = compute_tunnel_meshes(
            &data,
            &MeshCodec::default(),
            MeshFormat::Off,
            &mut JobProfile::new("test"),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("height"));
    }
}
