//! Knowledge Grid
//!
//! Fixed-resolution partition of the unit square. Cell (gx, gy) covers
//! `[gx/n, (gx+1)/n) × [gy/n, (gy+1)/n)`; the last row and column are closed
//! so the partition is exhaustive over [0,1]². Cells are created once and
//! mutated in place.

mod map;

pub use map::{CellMap, Snapshot};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sanitize::clamp_unit;
use crate::types::{DomainBounds, Position};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub gx: usize,
    pub gy: usize,
    pub bounds: DomainBounds,
    /// Knowledge estimate K ∈ [0, 1]
    pub knowledge: f64,
    /// Observations whose kernel support reached this cell
    pub observations: u32,
    /// Accumulated kernel weight of those observations
    pub evidence: f64,
    pub last_update: Option<DateTime<Utc>>,
}

impl Cell {
    pub fn center(&self) -> Position {
        self.bounds.center()
    }

    pub fn is_observed(&self) -> bool {
        self.observations > 0
    }

    /// Blend K toward `target` with the given rate, rate ∈ [0, 1].
    pub(crate) fn blend(&mut self, target: f64, rate: f64, weight: f64, at: DateTime<Utc>) {
        let rate = clamp_unit(rate);
        self.knowledge = clamp_unit(self.knowledge + rate * (target - self.knowledge));
        self.observations += 1;
        self.evidence += weight;
        self.last_update = Some(at);
    }
}

/// Aggregate view of a grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSummary {
    pub mean_knowledge: f64,
    pub coverage: f64,
    pub observed_cells: usize,
    pub total_cells: usize,
}

/// Row-major indices of the cells of an `n × n` grid whose center lies inside
/// `bounds`. A region narrower than one cell maps to the cell holding its
/// center.
pub fn cells_in_bounds(resolution: usize, bounds: &DomainBounds) -> Vec<usize> {
    let n = resolution.max(1);
    let w = 1.0 / n as f64;
    let inside: Vec<usize> = (0..n * n)
        .filter(|idx| {
            let center = Position::new(((idx % n) as f64 + 0.5) * w, ((idx / n) as f64 + 0.5) * w);
            bounds.contains(&center)
        })
        .collect();
    if !inside.is_empty() {
        return inside;
    }
    let mid = bounds.center();
    if !mid.in_unit_square() {
        return Vec::new();
    }
    let gx = ((mid.x * n as f64) as usize).min(n - 1);
    let gy = ((mid.y * n as f64) as usize).min(n - 1);
    vec![gy * n + gx]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGrid {
    resolution: usize,
    prior: f64,
    cells: Vec<Cell>,
}

impl KnowledgeGrid {
    pub fn new(resolution: usize, prior: f64) -> Self {
        let resolution = resolution.max(1);
        let prior = clamp_unit(prior);
        let width = 1.0 / resolution as f64;

        let cells = (0..resolution * resolution)
            .map(|idx| {
                let gx = idx % resolution;
                let gy = idx / resolution;
                Cell {
                    gx,
                    gy,
                    bounds: DomainBounds::new(
                        Position::new(gx as f64 * width, gy as f64 * width),
                        Position::new((gx + 1) as f64 * width, (gy + 1) as f64 * width),
                    ),
                    knowledge: prior,
                    observations: 0,
                    evidence: 0.0,
                    last_update: None,
                }
            })
            .collect();

        Self {
            resolution,
            prior,
            cells,
        }
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn prior(&self) -> f64 {
        self.prior
    }

    pub fn cell_width(&self) -> f64 {
        1.0 / self.resolution as f64
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn index(&self, gx: usize, gy: usize) -> Option<usize> {
        if gx < self.resolution && gy < self.resolution {
            Some(gy * self.resolution + gx)
        } else {
            None
        }
    }

    pub fn cell(&self, gx: usize, gy: usize) -> Option<&Cell> {
        self.index(gx, gy).map(|idx| &self.cells[idx])
    }

    pub(crate) fn cell_mut_at(&mut self, idx: usize) -> &mut Cell {
        &mut self.cells[idx]
    }

    /// Grid indices of the cell containing `position`, `None` outside [0,1]².
    pub fn locate(&self, position: &Position) -> Option<(usize, usize)> {
        if !position.in_unit_square() {
            return None;
        }
        let n = self.resolution;
        let gx = ((position.x * n as f64) as usize).min(n - 1);
        let gy = ((position.y * n as f64) as usize).min(n - 1);
        Some((gx, gy))
    }

    pub fn center(&self, gx: usize, gy: usize) -> Position {
        let w = self.cell_width();
        Position::new((gx as f64 + 0.5) * w, (gy as f64 + 0.5) * w)
    }

    /// Flat indices and center distances of cells whose center lies within
    /// `radius` of `position`.
    pub fn cells_within(&self, position: &Position, radius: f64) -> Vec<(usize, f64)> {
        let n = self.resolution;
        let w = self.cell_width();
        let span = |c: f64| {
            let lo = ((c - radius) / w - 0.5).floor().max(0.0) as usize;
            let hi = (((c + radius) / w - 0.5).ceil().max(0.0) as usize).min(n - 1);
            (lo.min(n - 1), hi)
        };
        let (x_lo, x_hi) = span(position.x);
        let (y_lo, y_hi) = span(position.y);

        let mut hits = Vec::with_capacity((x_hi - x_lo + 1) * (y_hi - y_lo + 1));
        for gy in y_lo..=y_hi {
            for gx in x_lo..=x_hi {
                let d = self.center(gx, gy).distance(position);
                if d <= radius {
                    hits.push((gy * n + gx, d));
                }
            }
        }
        hits
    }

    pub fn knowledge_map(&self) -> CellMap {
        CellMap::from_values(self.resolution, self.cells.iter().map(|c| c.knowledge).collect())
    }

    pub fn snapshot(&self, label: impl Into<String>) -> Snapshot {
        Snapshot::new(label, self.knowledge_map())
    }

    pub fn observed_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_observed()).count()
    }

    /// Fraction of cells touched by at least one observation
    pub fn coverage_fraction(&self) -> f64 {
        self.observed_cells() as f64 / self.cells.len() as f64
    }

    /// Cells whose center lies inside `bounds`; see [`cells_in_bounds`].
    pub fn cells_in(&self, bounds: &DomainBounds) -> Vec<usize> {
        cells_in_bounds(self.resolution, bounds)
    }

    /// Fraction of the cells inside `bounds` touched by at least one observation
    pub fn coverage_within(&self, bounds: &DomainBounds) -> f64 {
        let cells = self.cells_in(bounds);
        if cells.is_empty() {
            return 0.0;
        }
        let observed = cells.iter().filter(|&&idx| self.cells[idx].is_observed()).count();
        observed as f64 / cells.len() as f64
    }

    pub fn mean_knowledge(&self) -> f64 {
        self.cells.iter().map(|c| c.knowledge).sum::<f64>() / self.cells.len() as f64
    }

    pub fn summary(&self) -> KnowledgeSummary {
        let observed_cells = self.observed_cells();
        KnowledgeSummary {
            mean_knowledge: self.mean_knowledge(),
            coverage: observed_cells as f64 / self.cells.len() as f64,
            observed_cells,
            total_cells: self.cells.len(),
        }
    }

    /// Restore every cell to the prior.
    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.knowledge = self.prior;
            cell.observations = 0;
            cell.evidence = 0.0;
            cell.last_update = None;
        }
    }
}
