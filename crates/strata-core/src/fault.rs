//! Planar fault intersections with clipping.
//!
//! Every fault potential is evaluated on the section (or map) grid, then
//! clipped: above-ground samples, samples on the wrong side of each limiting
//! fault, and samples outside a finite fault's ellipsoid all become the
//! invalid sentinel. Faults are processed in dependency order so a clipped
//! limiting fault also truncates its subordinates through the propagated
//! sentinel. Output grids are transposed relative to the rank matrix — the
//! downstream renderer expects them that way.

use std::collections::{BTreeMap, BTreeSet};

use glam::DVec3;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::grid::Resolution;
use crate::model::GeologicalModel;

/// Invalid-sample sentinel; serialised as null.
const CLIP_VALUE: f64 = f64::NAN;

/// Order faults so that every fault appears after all faults it stops on.
/// Kahn's algorithm over the partial `stops_on` relation, names breaking
/// ties. Unknown `stops_on` references are ignored; a dependency cycle falls
/// back to name order for the remainder.
pub fn sort_faults(model: &GeologicalModel) -> Vec<String> {
    let known: BTreeSet<&str> = model.faults.keys().map(String::as_str).collect();
    let mut emitted: BTreeSet<&str> = BTreeSet::new();
    let mut order = Vec::with_capacity(model.faults.len());
    let mut remaining: BTreeSet<&str> = known.clone();
    while !remaining.is_empty() {
        let ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|name| {
                model.faults[*name]
                    .stops_on
                    .iter()
                    .all(|limit| !known.contains(limit.as_str()) || emitted.contains(limit.as_str()))
            })
            .collect();
        if ready.is_empty() {
            warn!("fault stops_on relation is cyclic, emitting the rest in name order");
            order.extend(remaining.iter().map(|s| s.to_string()));
            break;
        }
        for name in ready {
            remaining.remove(name);
            emitted.insert(name);
            order.push(name.to_string());
        }
    }
    order
}

/// Mean of the limiting fault's potential on the clipped fault's interface
/// points: the sign of the side the fault lives on. Defaults to +1 when no
/// interface points exist.
fn valid_side_sign(model: &GeologicalModel, limit: &str, interface_points: &[DVec3]) -> f64 {
    if interface_points.is_empty() {
        return 1.0;
    }
    let values = model.faults[limit].field.evaluate_batch(interface_points);
    values.iter().sum::<f64>() / values.len() as f64
}

/// Per-fault clipped potential grids on a cross-section or map plane.
/// Grids come back transposed: `height` rows of `width` samples.
pub fn compute_fault_intersections(
    points: &[DVec3],
    resolution: Resolution,
    model: &GeologicalModel,
    cancel: &CancelToken,
) -> Result<BTreeMap<String, Vec<Vec<Option<f64>>>>> {
    let (w, h) = (resolution.width, resolution.height);
    debug_assert_eq!(points.len(), w * h);

    // Evaluate all faults upfront: limiting potentials are needed whole.
    let mut potentials: BTreeMap<String, Vec<f64>> = model
        .faults
        .iter()
        .map(|(name, fault)| (name.clone(), fault.field.evaluate_batch(points)))
        .collect();
    let topography = model.topography.signed_batch(points);
    cancel.check()?;

    for name in sort_faults(model) {
        let fault = &model.faults[&name];
        let Some(mut potential) = potentials.remove(&name) else {
            continue;
        };

        // A fault whose potential vanishes everywhere is left as-is.
        if potential.iter().any(|&v| v != 0.0) {
            for (p, &t) in potential.iter_mut().zip(&topography) {
                if t > 0.0 {
                    *p = CLIP_VALUE;
                }
            }

            for limit in &fault.stops_on {
                // Limits processed earlier sit in the map already clipped,
                // so their sentinels truncate this fault too.
                let Some(limiting) = potentials.get(limit) else {
                    continue;
                };
                if limiting.iter().all(|&v| v == 0.0) {
                    continue;
                }
                let side = valid_side_sign(model, limit, &fault.interface_points);
                for (p, &l) in potential.iter_mut().zip(limiting) {
                    // NaN in the limiting grid fails the test and clips.
                    if !(side * l > 0.0) {
                        *p = CLIP_VALUE;
                    }
                }
            }

            if !fault.infinite {
                if let Some(ellipsoid) = &fault.ellipsoid {
                    let e = ellipsoid.evaluate_batch(points);
                    if e.iter().any(|&v| v != 0.0) {
                        for (p, &ev) in potential.iter_mut().zip(&e) {
                            if ev > 0.0 {
                                *p = CLIP_VALUE;
                            }
                        }
                    }
                }
            }
        }

        potentials.insert(name, potential);
        cancel.check()?;
    }

    // Transpose to the renderer's column-major expectation; NaN -> null.
    let output = potentials
        .into_iter()
        .map(|(name, potential)| {
            let grid: Vec<Vec<Option<f64>>> = (0..h)
                .map(|v| {
                    (0..w)
                        .map(|u| {
                            let value = potential[u * h + v];
                            if value.is_nan() {
                                None
                            } else {
                                Some(value)
                            }
                        })
                        .collect()
                })
                .collect();
            (name, grid)
        })
        .collect();
    Ok(output)
}
