//! Batched rank evaluation over point arrays.
//!
//! The heavy lifting happens in the model's own evaluator; this module adds
//! chunked parallel dispatch and the pile-reference rotation every emission
//! site shares.

use glam::DVec3;
use rayon::prelude::*;

use crate::error::Result;
use crate::model::{GeologicalModel, PileReference};

/// Points per parallel evaluation chunk. Outputs are concatenated in chunk
/// order, so parallelism never changes results.
const CHUNK: usize = 4096;

/// Rotate a raw rank id by the pile-reference policy: under `Base`, sky (0)
/// wraps to `n_units − 1` and every other rank shifts down by one; under
/// `Top` ids pass through unchanged.
pub fn apply_reference(rank: i32, n_units: usize, reference: PileReference) -> i32 {
    match reference {
        PileReference::Top => rank,
        PileReference::Base => {
            if rank == 0 {
                n_units as i32 - 1
            } else {
                rank - 1
            }
        }
    }
}

/// Evaluate the rank of every point, apply the reference rotation, and
/// return a 1D array matching the input order. Model errors surface
/// verbatim.
pub fn evaluate_ranks(
    model: &GeologicalModel,
    points: &[DVec3],
    with_topography: bool,
) -> Result<Vec<i32>> {
    let chunks: Vec<Vec<i32>> = points
        .par_chunks(CHUNK)
        .map(|chunk| model.rank_batch(chunk, with_topography))
        .collect::<Result<_>>()?;
    let n = model.n_units();
    let reference = model.pile.reference;
    Ok(chunks
        .into_iter()
        .flatten()
        .map(|r| apply_reference(r, n, reference))
        .collect())
}
