use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DomainBounds, Position};

/// Cell-indexed scalar field over a grid of the same resolution.
/// Row-major: index = gy · resolution + gx.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMap {
    resolution: usize,
    values: Vec<f64>,
}

impl CellMap {
    pub fn filled(resolution: usize, value: f64) -> Self {
        Self {
            resolution,
            values: vec![value; resolution * resolution],
        }
    }

    pub fn zeros(resolution: usize) -> Self {
        Self::filled(resolution, 0.0)
    }

    pub(crate) fn from_values(resolution: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), resolution * resolution);
        Self { resolution, values }
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn get(&self, gx: usize, gy: usize) -> Option<f64> {
        if gx < self.resolution && gy < self.resolution {
            Some(self.values[gy * self.resolution + gx])
        } else {
            None
        }
    }

    /// Value of the cell containing `position`.
    pub fn value_at(&self, position: &Position) -> Option<f64> {
        if !position.in_unit_square() {
            return None;
        }
        let n = self.resolution;
        let gx = ((position.x * n as f64) as usize).min(n - 1);
        let gy = ((position.y * n as f64) as usize).min(n - 1);
        self.get(gx, gy)
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }

    /// Indices of the cells whose center lies inside `bounds`.
    pub fn cells_in(&self, bounds: &DomainBounds) -> Vec<usize> {
        super::cells_in_bounds(self.resolution, bounds)
    }

    /// Cell-wise product, used to attribute a difference map to content.
    pub fn weighted_by(&self, weights: &CellMap) -> CellMap {
        let values = self
            .values
            .iter()
            .zip(&weights.values)
            .map(|(v, w)| v * w)
            .collect();
        Self::from_values(self.resolution, values)
    }
}

/// Frozen copy of a grid's knowledge values. Read-only after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    label: String,
    taken_at: DateTime<Utc>,
    knowledge: CellMap,
}

impl Snapshot {
    pub(crate) fn new(label: impl Into<String>, knowledge: CellMap) -> Self {
        Self {
            label: label.into(),
            taken_at: Utc::now(),
            knowledge,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn knowledge(&self) -> &CellMap {
        &self.knowledge
    }
}
