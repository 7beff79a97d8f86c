//! Content Recommender
//!
//! Ranks supplementary content by targeted learning potential and measures
//! the realized effect of consumed content by diffing knowledge snapshots.
//!
//! Scores:
//! - TLP(item) = max over windows of (1 − K(w)) · U(w)
//!   - U(w) = ½·(1 − |2K − 1|) + ½ · 1/(1 + E(w))   (E: local evidence)
//! - Gain(item) = max over windows of (1 − K(w)) · Transfer(w)
//!   - Transfer = max(0, running difference) where the running map has
//!     enough coverage, else the mean over trusted cells of the domain
//!
//! Exposure cycle:
//! Idle → Snapshotted → Accumulating → Observing → Matured → Idle
//!
//! Only one snapshot is live. It is taken on the first exposure and reused
//! while further items are shown before any post-content question. Matured
//! is reported by the question that folds the cycle; the snapshot is then
//! released.

mod exposure;
mod maps;

pub use exposure::{ExposureState, RunningDifference};
pub use maps::{compute_difference_map, compute_relevance_map, update_running_average};

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::RecommenderConfig;
use crate::estimator::GridView;
use crate::grid::{CellMap, KnowledgeGrid, Snapshot};
use crate::sanitize::clamp_unit;
use crate::types::{ContentItem, DomainBounds, Observation, Position};

use exposure::ExposureCycle;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedContent<'a> {
    pub item: &'a ContentItem,
    pub tlp: f64,
    /// TLP after the watched penalty
    pub score: f64,
    pub watched: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferSource {
    /// The cell's own running value
    Running,
    /// Domain-wide mean over trusted cells, or the configured prior
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferEstimate {
    pub value: f64,
    pub source: TransferSource,
}

#[derive(Debug, Clone)]
pub struct Recommender {
    config: RecommenderConfig,
    length_scale: f64,
    watched: HashSet<String>,
    cycle: Option<ExposureCycle>,
    running: Option<RunningDifference>,
}

impl Recommender {
    pub fn new(config: RecommenderConfig, length_scale: f64) -> Self {
        Self {
            config,
            length_scale,
            watched: HashSet::new(),
            cycle: None,
            running: None,
        }
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    // ==================== Scoring ====================

    /// Uncertainty proxy in [0, 1]: closeness of K to 0.5 blended with sparsity.
    pub fn uncertainty(view: &GridView<'_>, position: &Position) -> f64 {
        let knowledge = view.knowledge_or_prior(position);
        let ambiguity = 1.0 - (2.0 * knowledge - 1.0).abs();
        let sparsity = 1.0 / (1.0 + view.evidence_at(position));
        clamp_unit(0.5 * ambiguity + 0.5 * sparsity)
    }

    /// Targeted learning potential of the item's best window.
    pub fn compute_tlp(&self, view: &GridView<'_>, item: &ContentItem) -> f64 {
        item.windows
            .iter()
            .map(|w| (1.0 - view.knowledge_or_prior(&w.position)) * Self::uncertainty(view, &w.position))
            .fold(0.0, f64::max)
    }

    /// Fraction of the item's windows inside `bounds`; 0 for an item without windows.
    pub fn domain_overlap(item: &ContentItem, bounds: &DomainBounds) -> f64 {
        if item.windows.is_empty() {
            return 0.0;
        }
        let inside = item.windows.iter().filter(|w| bounds.contains(&w.position)).count();
        inside as f64 / item.windows.len() as f64
    }

    /// Items overlapping the domain region enough, in input order.
    pub fn filter_by_domain<'a>(&self, candidates: &'a [ContentItem], bounds: &DomainBounds) -> Vec<&'a ContentItem> {
        candidates
            .iter()
            .filter(|item| Self::domain_overlap(item, bounds) >= self.config.min_domain_overlap)
            .collect()
    }

    pub fn is_watched(&self, item_id: &str) -> bool {
        self.watched.contains(item_id)
    }

    /// Record content consumed in earlier sessions.
    pub fn seed_watched<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watched.extend(ids.into_iter().map(Into::into));
    }

    pub fn apply_watched_penalty(&self, score: f64, item: &ContentItem) -> f64 {
        if self.is_watched(&item.id) {
            score * self.config.watched_penalty
        } else {
            score
        }
    }

    /// filter → TLP → watched penalty → stable sort → top-N
    pub fn compute_ranking<'a>(
        &self,
        view: &GridView<'_>,
        candidates: &'a [ContentItem],
        bounds: &DomainBounds,
    ) -> Vec<RankedContent<'a>> {
        let eligible = self.filter_by_domain(candidates, bounds);

        let mut ranked: Vec<RankedContent<'a>> = eligible
            .par_iter()
            .map(|&item| {
                let tlp = self.compute_tlp(view, item);
                RankedContent {
                    item,
                    tlp,
                    score: self.apply_watched_penalty(tlp, item),
                    watched: self.is_watched(&item.id),
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(self.config.top_n);

        tracing::debug!(
            candidates = candidates.len(),
            eligible = eligible.len(),
            returned = ranked.len(),
            "content ranked"
        );
        ranked
    }

    // ==================== Transfer ====================

    pub fn running_difference(&self) -> Option<&RunningDifference> {
        self.running.as_ref()
    }

    /// Mean of `max(0, running)` over the trusted cells among `grid_cells`.
    fn fallback_transfer(&self, grid_cells: &[usize], running: &RunningDifference) -> Option<f64> {
        let trusted: Vec<f64> = grid_cells
            .iter()
            .filter(|&&idx| running.coverage.values()[idx] >= self.config.min_transfer_coverage)
            .map(|&idx| running.values.values()[idx].max(0.0))
            .collect();
        if trusted.is_empty() {
            None
        } else {
            Some(trusted.iter().sum::<f64>() / trusted.len() as f64)
        }
    }

    /// Transfer at `position`: the cell's running value when its coverage is
    /// trusted, else the domain-wide fallback over `bounds`.
    pub fn transfer_at(&self, position: &Position, bounds: &DomainBounds) -> TransferEstimate {
        let fallback = |value: Option<f64>| TransferEstimate {
            value: value.unwrap_or(self.config.prior_transfer),
            source: TransferSource::Fallback,
        };
        let Some(running) = self.running.as_ref() else {
            return fallback(None);
        };

        let coverage = running.coverage.value_at(position).unwrap_or(0.0);
        if coverage >= self.config.min_transfer_coverage {
            if let Some(value) = running.values.value_at(position) {
                return TransferEstimate {
                    value: value.max(0.0),
                    source: TransferSource::Running,
                };
            }
        }
        let cells = running.values.cells_in(bounds);
        fallback(self.fallback_transfer(&cells, running))
    }

    pub fn expected_gain_at(&self, view: &GridView<'_>, position: &Position, bounds: &DomainBounds) -> f64 {
        (1.0 - view.knowledge_or_prior(position)) * self.transfer_at(position, bounds).value
    }

    /// Expected gain of the item's best window within the domain `bounds`.
    pub fn compute_expected_gain(&self, view: &GridView<'_>, item: &ContentItem, bounds: &DomainBounds) -> f64 {
        item.windows
            .iter()
            .map(|w| self.expected_gain_at(view, &w.position, bounds))
            .fold(0.0, f64::max)
    }

    // ==================== Exposure cycle ====================

    pub fn exposure_state(&self) -> ExposureState {
        self.cycle
            .as_ref()
            .map(ExposureCycle::state)
            .unwrap_or(ExposureState::Idle)
    }

    pub fn live_snapshot(&self) -> Option<&Snapshot> {
        self.cycle.as_ref().map(|c| &c.snapshot)
    }

    /// Latest difference map of the live cycle.
    pub fn latest_difference(&self) -> Option<&CellMap> {
        self.cycle.as_ref().and_then(|c| c.latest_difference.as_ref())
    }

    pub fn post_questions(&self) -> u32 {
        self.cycle.as_ref().map(|c| c.post_questions).unwrap_or(0)
    }

    pub fn take_snapshot(&self, grid: &KnowledgeGrid, item: &ContentItem) -> Snapshot {
        grid.snapshot(format!("before {}", item.id))
    }

    /// Note that `item` is being shown. Takes a snapshot on first exposure and
    /// reuses it while no post-content question has been answered.
    pub fn present_content(&mut self, grid: &KnowledgeGrid, item: &ContentItem) -> ExposureState {
        match self.exposure_state() {
            ExposureState::Snapshotted | ExposureState::Accumulating => {
                if let Some(cycle) = self.cycle.as_mut() {
                    cycle.extend(item);
                }
            }
            state => {
                if state == ExposureState::Observing {
                    tracing::warn!(item = %item.id, "abandoning exposure cycle before maturity");
                }
                let snapshot = self.take_snapshot(grid, item);
                tracing::debug!(label = snapshot.label(), "knowledge snapshot taken");
                self.cycle = Some(ExposureCycle::open(snapshot, item));
            }
        }
        self.exposure_state()
    }

    /// Mark an item as consumed; post-content questions count from here on.
    pub fn mark_consumed(&mut self, item_id: &str) {
        self.watched.insert(item_id.to_string());
        if let Some(cycle) = self.cycle.as_mut() {
            if cycle.contains(item_id) {
                cycle.consumed = true;
            }
        }
    }

    /// Account for a question answered after consumed content. `grid` must
    /// already include `observation`.
    pub fn handle_post_video_question(&mut self, observation: &Observation, grid: &KnowledgeGrid) -> ExposureState {
        let maturity = self.config.maturity_questions;
        let alpha = self.config.ema_alpha;
        let length_scale = self.length_scale;
        let floor = self.config.relevance_floor;

        let Some(cycle) = self.cycle.as_mut() else {
            return ExposureState::Idle;
        };
        if !cycle.consumed {
            return cycle.state();
        }

        cycle.post_questions += 1;
        let diff = compute_difference_map(cycle.snapshot.knowledge(), &grid.knowledge_map());
        tracing::debug!(
            post_questions = cycle.post_questions,
            domain = %observation.domain,
            max_change = diff.max_abs(),
            "difference map updated"
        );

        if cycle.post_questions >= maturity {
            let relevance = compute_relevance_map(grid.resolution(), &cycle.windows, length_scale, floor);
            let attributed = diff.weighted_by(&relevance);

            let running = match self.running.take() {
                Some(mut prev) => {
                    prev.values = update_running_average(Some(&prev.values), &attributed, alpha);
                    for (c, r) in prev.coverage.values_mut().iter_mut().zip(relevance.values()) {
                        *c += r;
                    }
                    prev.folds += 1;
                    prev
                }
                None => RunningDifference {
                    values: update_running_average(None, &attributed, alpha),
                    coverage: relevance,
                    folds: 1,
                },
            };

            tracing::info!(
                items = ?cycle.items,
                folds = running.folds,
                "exposure cycle matured"
            );
            self.running = Some(running);
            self.cycle = None;
            return ExposureState::Matured;
        }
        cycle.latest_difference = Some(diff);
        cycle.state()
    }

    /// Drop the live snapshot and the running average (domain switch).
    pub fn clear_exposures(&mut self) {
        self.cycle = None;
        self.running = None;
    }

    /// Back to the initial state, forgetting watched content as well.
    pub fn reset(&mut self) {
        self.clear_exposures();
        self.watched.clear();
    }
}
