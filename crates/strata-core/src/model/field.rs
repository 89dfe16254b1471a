//! Scalar field evaluators over batches of 3D points.
//!
//! The implicit-field collaborator hands the engine a handful of evaluator
//! shapes; they are modelled as one tagged enum with a single batch-evaluate
//! capability so dispatch stays monomorphic at call sites. The `Batch`
//! variant is the seam for externally kriged potentials.

use std::fmt;
use std::sync::Arc;

use glam::DVec3;

/// Externally supplied batch evaluator (kriged potential fields, drifts).
pub type BatchFieldFn = Arc<dyn Fn(&[DVec3]) -> Vec<f64> + Send + Sync>;

#[derive(Clone)]
pub enum FieldEval {
    /// Signed offset from a plane through `origin` with unit `normal`.
    Plane { origin: DVec3, normal: DVec3 },
    /// Ellipsoid constraint centred at `centre` with semi-axes `radii`;
    /// negative inside, zero on the surface, positive outside.
    Ellipsoid { centre: DVec3, radii: DVec3 },
    /// Opaque external evaluator.
    Batch(BatchFieldFn),
}

impl FieldEval {
    pub fn batch(f: impl Fn(&[DVec3]) -> Vec<f64> + Send + Sync + 'static) -> Self {
        FieldEval::Batch(Arc::new(f))
    }

    /// Evaluate the field on every point, preserving order.
    pub fn evaluate_batch(&self, points: &[DVec3]) -> Vec<f64> {
        match self {
            FieldEval::Plane { origin, normal } => {
                points.iter().map(|p| (*p - *origin).dot(*normal)).collect()
            }
            FieldEval::Ellipsoid { centre, radii } => points
                .iter()
                .map(|p| {
                    let d = (*p - *centre) / *radii;
                    d.length_squared() - 1.0
                })
                .collect(),
            FieldEval::Batch(f) => f(points),
        }
    }
}

impl fmt::Debug for FieldEval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldEval::Plane { origin, normal } => {
                f.debug_struct("Plane").field("origin", origin).field("normal", normal).finish()
            }
            FieldEval::Ellipsoid { centre, radii } => {
                f.debug_struct("Ellipsoid").field("centre", centre).field("radii", radii).finish()
            }
            FieldEval::Batch(_) => f.write_str("Batch(..)"),
        }
    }
}
