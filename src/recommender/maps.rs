//! Grid-wide maps used to attribute knowledge changes to content.

use rayon::prelude::*;

use crate::grid::CellMap;
use crate::kernel::matern32;
use crate::sanitize::clamp_signed_unit;
use crate::types::{ContentWindow, Position};

/// Cell-wise `after − before`. Decreases are kept as negative values.
pub fn compute_difference_map(before: &CellMap, after: &CellMap) -> CellMap {
    let values = before
        .values()
        .iter()
        .zip(after.values())
        .map(|(b, a)| a - b)
        .collect();
    CellMap::from_values(before.resolution(), values)
}

/// For each cell, the strongest Matérn-3/2 weight from its center to any
/// window. Weights below `floor` are zeroed so distant cells get no credit.
pub fn compute_relevance_map(resolution: usize, windows: &[ContentWindow], length_scale: f64, floor: f64) -> CellMap {
    if windows.is_empty() {
        return CellMap::zeros(resolution);
    }
    let width = 1.0 / resolution as f64;
    let values = (0..resolution * resolution)
        .into_par_iter()
        .map(|idx| {
            let center = Position::new(
                ((idx % resolution) as f64 + 0.5) * width,
                ((idx / resolution) as f64 + 0.5) * width,
            );
            let relevance = windows
                .iter()
                .map(|w| matern32(center.distance(&w.position), length_scale))
                .fold(0.0, f64::max);
            if relevance < floor {
                0.0
            } else {
                relevance
            }
        })
        .collect();
    CellMap::from_values(resolution, values)
}

/// `running' = alpha·new + (1 − alpha)·running`, seeded with `new` when there
/// is no running map yet. Values stay in [−1, 1].
pub fn update_running_average(running: Option<&CellMap>, new: &CellMap, alpha: f64) -> CellMap {
    let mut out = match running {
        Some(prev) => {
            let values = prev
                .values()
                .iter()
                .zip(new.values())
                .map(|(r, n)| alpha * n + (1.0 - alpha) * r)
                .collect();
            CellMap::from_values(new.resolution(), values)
        }
        None => new.clone(),
    };
    for v in out.values_mut() {
        *v = clamp_signed_unit(*v);
    }
    out
}
