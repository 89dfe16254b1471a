//! In-memory geological model facade.
//!
//! The engine consumes a model already assembled by its collaborators (XML
//! import, kriging). What the core needs from it is narrow: a bounding box,
//! a batched rank evaluator, per-fault potential evaluators with their
//! truncation relations, and a topographic surface. Externally computed
//! evaluators plug in through the `Batch` variants.

pub mod dem;
mod field;
mod topography;

pub use field::{BatchFieldFn, FieldEval};
pub use topography::{ImplicitDtm, Topography};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use glam::DVec3;

use crate::bbox::BBox3;
use crate::error::{Result, StrataError};

/// Whether unit ranks are referenced from the top of the pile or its base.
/// `Base` rotates every emitted rank id down by one (see
/// [`crate::evaluate::apply_reference`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PileReference {
    Top,
    Base,
}

/// The stratigraphic pile: ordered unit names, deepest first.
#[derive(Debug, Clone)]
pub struct Pile {
    pub reference: PileReference,
    pub units: Vec<String>,
}

impl Pile {
    pub fn n_units(&self) -> usize {
        self.units.len()
    }
}

/// Externally supplied batched rank evaluator. Errors are carried verbatim
/// to the job boundary.
pub type RankBatchFn =
    Arc<dyn Fn(&[DVec3]) -> std::result::Result<Vec<i32>, String> + Send + Sync>;

/// Source of raw stratigraphic ranks (1-based; 0 is reserved for sky and is
/// only produced by the topography overlay).
#[derive(Clone)]
pub enum RankSource {
    /// Horizontally layered synthetic stratigraphy: rank of a point is one
    /// plus the number of interface elevations strictly below it.
    /// `interfaces` must be sorted ascending.
    Layered { interfaces: Vec<f64> },
    /// Opaque external evaluator (the kriged pile).
    Batch(RankBatchFn),
}

impl fmt::Debug for RankSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankSource::Layered { interfaces } => {
                f.debug_struct("Layered").field("interfaces", interfaces).finish()
            }
            RankSource::Batch(_) => f.write_str("Batch(..)"),
        }
    }
}

/// One fault: its potential field, the faults truncating it, finiteness,
/// the interface points its potential was fitted on, and the ellipsoid
/// constraint for finite faults.
#[derive(Debug, Clone)]
pub struct Fault {
    pub field: FieldEval,
    pub stops_on: BTreeSet<String>,
    pub infinite: bool,
    pub interface_points: Vec<DVec3>,
    pub ellipsoid: Option<FieldEval>,
}

#[derive(Debug, Clone)]
pub struct GeologicalModel {
    pub bbox: BBox3,
    pub pile: Pile,
    pub ranks: RankSource,
    pub topography: Topography,
    pub faults: BTreeMap<String, Fault>,
}

impl GeologicalModel {
    pub fn n_units(&self) -> usize {
        self.pile.n_units()
    }

    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }

    /// Raw rank of every point, in input order. With `with_topography`,
    /// points above ground get rank 0 regardless of the pile.
    pub fn rank_batch(&self, points: &[DVec3], with_topography: bool) -> Result<Vec<i32>> {
        let mut ranks = match &self.ranks {
            RankSource::Layered { interfaces } => points
                .iter()
                .map(|p| 1 + interfaces.iter().take_while(|&&z| z < p.z).count() as i32)
                .collect(),
            RankSource::Batch(f) => {
                let ranks = f(points).map_err(StrataError::ModelEvaluation)?;
                if ranks.len() != points.len() {
                    return Err(StrataError::ModelEvaluation(format!(
                        "rank evaluator returned {} values for {} points",
                        ranks.len(),
                        points.len()
                    )));
                }
                ranks
            }
        };
        if with_topography {
            for (rank, &p) in ranks.iter_mut().zip(points) {
                if self.topography.signed(p) > 0.0 {
                    *rank = 0;
                }
            }
        }
        Ok(ranks)
    }
}
