//! Mesh blob encoding glue: magic-byte detection and dispatch between the
//! in-crate OFF codec and the external Draco codec.

mod off;

pub use off::{read_off, write_off};

use std::sync::Arc;

use crate::error::{Result, StrataError};
use crate::mesh::TriangleMesh;

/// Settings handed to the external Draco codec.
pub const DRACO_COMPRESSION_LEVEL: u32 = 5;
pub const DRACO_QUANTIZATION_BITS: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Off,
    Draco,
}

/// Blob format by magic: `OFF` in the first three bytes means OFF, anything
/// else is assumed Draco.
pub fn detect_mesh_format(bytes: &[u8]) -> MeshFormat {
    if bytes.len() >= 3 && &bytes[..3] == b"OFF" {
        MeshFormat::Off
    } else {
        MeshFormat::Draco
    }
}

/// External Draco reader/writer. The deployment links one in; the engine
/// only dispatches to it.
pub trait DracoCodec: Send + Sync {
    fn encode(&self, mesh: &TriangleMesh) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<TriangleMesh>;
}

/// Dispatching codec. OFF is always available and is the default encoding;
/// Draco requires a registered external codec.
#[derive(Clone, Default)]
pub struct MeshCodec {
    draco: Option<Arc<dyn DracoCodec>>,
}

impl MeshCodec {
    pub fn with_draco(draco: Arc<dyn DracoCodec>) -> Self {
        Self { draco: Some(draco) }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<TriangleMesh> {
        match detect_mesh_format(bytes) {
            MeshFormat::Off => read_off(bytes),
            MeshFormat::Draco => match &self.draco {
                Some(codec) => codec.decode(bytes),
                None => Err(StrataError::UnsupportedFormat),
            },
        }
    }

    pub fn encode(&self, mesh: &TriangleMesh, format: MeshFormat) -> Result<Vec<u8>> {
        match format {
            MeshFormat::Off => Ok(write_off(mesh)),
            MeshFormat::Draco => match &self.draco {
                Some(codec) => codec.encode(mesh),
                None => Err(StrataError::UnsupportedFormat),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_magic_is_detected() {
        assert_eq!(detect_mesh_format(b"OFF\n3 1 0\n"), MeshFormat::Off);
        assert_eq!(detect_mesh_format(&[0x44, 0x52, 0x41, 0x43, 0x4F]), MeshFormat::Draco);
        assert_eq!(detect_mesh_format(b"OF"), MeshFormat::Draco);
    }

    #[test]
    fn default_codec_reads_off_and_rejects_draco() {
        let codec = MeshCodec::default();
        let mesh = codec.decode(b"OFF\n3 1 0\n0 0 0\n1 0 0\n0 1 0\n3 0 1 2\n").unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert!(matches!(
            codec.decode(&[0x00, 0x01, 0x02, 0x03]),
            Err(StrataError::UnsupportedFormat)
        ));
    }
}
