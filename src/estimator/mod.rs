//! Spatial Knowledge Estimator
//!
//! Maintains the knowledge grid from a stream of graded observations and
//! answers point, cell and probability-of-correct queries.
//!
//! Update rule for every cell within the kernel support of an observation:
//! - w = k(d)                         (Matérn-3/2 on center distance)
//! - r = w / (s + E + w)              (s: prior pseudo-count, E: cell evidence)
//! - K ← K + r · (y − K)              (y = 1 correct, 0 incorrect)
//! - E ← E + w
//!
//! This is the posterior mean of a Beta-style estimate with fractional
//! counts: early observations move K more than later ones, repeated
//! identical outcomes move K monotonically toward y, and K never leaves [0,1].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{KmapError, Result};
use crate::grid::KnowledgeGrid;
use crate::irt::IrtModel;
use crate::kernel::Matern32;
use crate::sanitize::clamp_unit;
use crate::types::{DifficultyLevel, DomainBounds, Observation, Position};

/// Result of recording one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordOutcome {
    /// Observation blended into `cells` cells
    Applied { cells: usize },
    /// Position outside the grid; nothing changed
    Dropped,
}

#[derive(Debug, Clone)]
pub struct Estimator {
    grid: Option<KnowledgeGrid>,
    update_kernel: Matern32,
    predict_kernel: Matern32,
    prior_strength: f64,
    models: HashMap<String, IrtModel>,
    bounds: HashMap<String, DomainBounds>,
    active_domain: String,
    log: Vec<Observation>,
}

impl Default for Estimator {
    /// Unconfigured estimator; every query reports `NotInitialized`.
    fn default() -> Self {
        Self {
            grid: None,
            update_kernel: Matern32::new(0.02, 3.0),
            predict_kernel: Matern32::new(0.02, 1.5),
            prior_strength: 1.0,
            models: HashMap::new(),
            bounds: HashMap::new(),
            active_domain: String::new(),
            log: Vec::new(),
        }
    }
}

impl Estimator {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let mut estimator = Self::default();
        estimator.configure(config)?;
        Ok(estimator)
    }

    /// Load configuration and build a fresh grid at the prior.
    pub fn configure(&mut self, config: &EngineConfig) -> Result<()> {
        config.validate()?;
        let grid_config = &config.grid;
        let length_scale = grid_config.effective_length_scale();

        self.update_kernel = Matern32::new(length_scale, grid_config.influence_radius);
        self.predict_kernel = Matern32::new(length_scale, grid_config.interpolation_radius);
        self.prior_strength = grid_config.prior_strength;
        self.models = config
            .domains
            .iter()
            .map(|d| (d.name.clone(), IrtModel::from_domain(d, config.latent_range)))
            .collect();
        self.bounds = config.domains.iter().map(|d| (d.name.clone(), d.bounds)).collect();
        self.active_domain = config.domains[0].name.clone();
        self.grid = Some(KnowledgeGrid::new(grid_config.resolution, grid_config.prior));
        self.log.clear();

        tracing::debug!(
            resolution = grid_config.resolution,
            length_scale,
            domains = self.models.len(),
            "estimator configured"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.grid.is_some()
    }

    pub fn grid(&self) -> Result<&KnowledgeGrid> {
        self.grid.as_ref().ok_or(KmapError::NotInitialized)
    }

    pub fn active_domain(&self) -> &str {
        &self.active_domain
    }

    /// Spatial extent of the active domain, the whole map if unconfigured.
    pub fn active_bounds(&self) -> DomainBounds {
        self.bounds
            .get(&self.active_domain)
            .copied()
            .unwrap_or_else(DomainBounds::unit)
    }

    /// Fraction of the active domain's cells touched by an observation.
    pub fn domain_coverage(&self) -> Result<f64> {
        Ok(self.grid()?.coverage_within(&self.active_bounds()))
    }

    pub fn set_active_domain(&mut self, domain: &str) -> Result<()> {
        if !self.models.contains_key(domain) {
            return Err(KmapError::UnknownDomain(domain.to_string()));
        }
        self.active_domain = domain.to_string();
        Ok(())
    }

    pub fn observations(&self) -> &[Observation] {
        &self.log
    }

    pub fn observation_count(&self) -> usize {
        self.log.len()
    }

    /// Read-only view for scoring; safe to share across threads.
    pub fn view(&self) -> Result<GridView<'_>> {
        let grid = self.grid()?;
        let active = self
            .models
            .get(&self.active_domain)
            .ok_or(KmapError::NotInitialized)?;
        Ok(GridView {
            grid,
            kernel: self.predict_kernel,
            models: &self.models,
            active,
        })
    }

    /// Convenience form of [`Estimator::record_observation`].
    pub fn record(
        &mut self,
        position: Position,
        correct: bool,
        difficulty: u8,
        domain: &str,
    ) -> Result<RecordOutcome> {
        let observation = Observation::new(position, correct, difficulty, domain)?;
        self.record_observation(observation)
    }

    pub fn record_observation(&mut self, observation: Observation) -> Result<RecordOutcome> {
        let grid = self.grid.as_mut().ok_or(KmapError::NotInitialized)?;
        if !self.models.contains_key(&observation.domain) {
            return Err(KmapError::UnknownDomain(observation.domain));
        }
        if !observation.position.in_unit_square() {
            tracing::debug!(
                x = observation.position.x,
                y = observation.position.y,
                "observation outside grid dropped"
            );
            return Ok(RecordOutcome::Dropped);
        }

        let target = observation.outcome();
        let hits = grid.cells_within(&observation.position, self.update_kernel.radius);
        for &(idx, d) in &hits {
            let w = self.update_kernel.weight(d);
            let cell = grid.cell_mut_at(idx);
            let rate = w / (self.prior_strength + cell.evidence + w);
            cell.blend(target, rate, w, observation.timestamp);
        }

        tracing::debug!(
            x = observation.position.x,
            y = observation.position.y,
            correct = observation.correct,
            difficulty = observation.difficulty.level(),
            domain = %observation.domain,
            cells = hits.len(),
            "observation recorded"
        );

        self.log.push(observation);
        Ok(RecordOutcome::Applied { cells: hits.len() })
    }

    /// Interpolated K at `position`; `None` outside the grid.
    pub fn predict(&self, position: Position) -> Result<Option<f64>> {
        Ok(self.view()?.knowledge_at(&position))
    }

    /// Interpolated K at the center of cell (gx, gy); `None` for invalid indices.
    pub fn predict_cell(&self, gx: usize, gy: usize) -> Result<Option<f64>> {
        let view = self.view()?;
        if view.grid.cell(gx, gy).is_none() {
            return Ok(None);
        }
        Ok(view.knowledge_at(&view.grid.center(gx, gy)))
    }

    /// P(correct) at `position` for a difficulty level 1..=4 in the active domain.
    pub fn probability_correct(&self, position: Position, difficulty: u8) -> Result<f64> {
        let difficulty = DifficultyLevel::new(difficulty)?;
        Ok(self.view()?.probability(&position, difficulty, None))
    }

    /// Clear the grid back to the prior and drop the observation log.
    pub fn reset(&mut self) {
        if let Some(grid) = self.grid.as_mut() {
            grid.reset();
        }
        self.log.clear();
    }
}

/// Immutable borrow of the grid plus the kernels and IRT models needed to query it.
#[derive(Debug, Clone, Copy)]
pub struct GridView<'a> {
    grid: &'a KnowledgeGrid,
    kernel: Matern32,
    models: &'a HashMap<String, IrtModel>,
    active: &'a IrtModel,
}

impl<'a> GridView<'a> {
    pub fn grid(&self) -> &'a KnowledgeGrid {
        self.grid
    }

    pub fn length_scale(&self) -> f64 {
        self.kernel.length_scale
    }

    /// Kernel-weighted mean of a per-cell quantity around `position`.
    fn interpolate(&self, position: &Position, value: impl Fn(usize) -> f64) -> Option<f64> {
        let (gx, gy) = self.grid.locate(position)?;
        let mut weight_sum = 0.0;
        let mut acc = 0.0;
        for (idx, d) in self.grid.cells_within(position, self.kernel.radius) {
            let w = self.kernel.weight(d);
            weight_sum += w;
            acc += w * value(idx);
        }
        if weight_sum > 0.0 {
            Some(acc / weight_sum)
        } else {
            self.grid.index(gx, gy).map(value)
        }
    }

    /// Interpolated K at `position`, `None` outside [0,1]².
    pub fn knowledge_at(&self, position: &Position) -> Option<f64> {
        let cells = self.grid.cells();
        self.interpolate(position, |idx| cells[idx].knowledge)
            .map(clamp_unit)
    }

    /// K at `position`, falling back to the prior outside the grid.
    pub fn knowledge_or_prior(&self, position: &Position) -> f64 {
        self.knowledge_at(position).unwrap_or_else(|| self.grid.prior())
    }

    /// Interpolated accumulated kernel weight, 0 outside the grid.
    pub fn evidence_at(&self, position: &Position) -> f64 {
        let cells = self.grid.cells();
        self.interpolate(position, |idx| cells[idx].evidence)
            .unwrap_or(0.0)
    }

    /// IRT model of `domain`, the active domain's when `None` or unknown.
    pub fn model(&self, domain: Option<&str>) -> &'a IrtModel {
        domain
            .and_then(|d| self.models.get(d))
            .unwrap_or(self.active)
    }

    pub fn probability(&self, position: &Position, difficulty: DifficultyLevel, domain: Option<&str>) -> f64 {
        let knowledge = self.knowledge_or_prior(position);
        self.model(domain).probability(knowledge, difficulty)
    }
}
