//! Geological-model compute engine.
//!
//! Batch evaluation of an implicit geological model on regular grids and
//! derivation of its downstream artefacts: closed unit meshes, fault
//! surfaces and planar fault intersections, hydro-feature projections on
//! cross-sections, voxelised rank grids and parametric tunnel tubes. All
//! inputs arrive pre-materialised and all outputs are in-memory maps; the
//! surrounding service owns transport, storage and scheduling.

pub mod bbox;
pub mod boundaries;
pub mod cancel;
pub mod codec;
pub mod error;
pub mod evaluate;
pub mod fault;
pub mod grid;
pub mod hydro;
pub mod mesh;
pub mod model;
pub mod ops;
pub mod profile;
pub mod tunnel;
pub mod volume;
pub mod voxels;

pub use bbox::BBox3;
pub use cancel::CancelToken;
pub use codec::{detect_mesh_format, MeshCodec, MeshFormat};
pub use error::{Result, StrataError};
pub use grid::{Resolution, Shape3};
pub use mesh::TriangleMesh;
pub use model::GeologicalModel;
