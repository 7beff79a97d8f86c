//! Active-Learning Question Sampler
//!
//! Phase-aware selection of the next question:
//! - Calibrate: few observations, prefer middle difficulties (levels 2–3)
//! - Map: rank by predictive entropy of P(correct) (BALD-style information gain)
//! - Learn: target the zone of proximal development, P(correct) closest to 0.6,
//!   ties broken toward weaker areas (larger 1 − K)
//!
//! The phase is re-derived on every call from the estimator's observation
//! count and the coverage of the active domain's cells. Both only grow while
//! the domain stays the same; the session keeps a high-water phase across
//! domain switches.
//!
//! Deterministic practice modes (easiest, hardest-answerable, dont-know)
//! bypass the phase logic and rank purely by P(correct).

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SamplerConfig;
use crate::error::Result;
use crate::estimator::{Estimator, GridView};
use crate::sanitize::binary_entropy;
use crate::types::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Calibrate,
    Map,
    Learn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Phase-driven adaptive loop
    #[default]
    Adaptive,
    /// Highest P(correct)
    Easiest,
    /// Highest P(correct) strictly below the configured threshold
    HardestAnswerable,
    /// Lowest P(correct)
    DontKnow,
}

/// Resolved scoring strategy for one call
#[derive(Debug, Clone, Copy, PartialEq)]
enum Strategy {
    Phase(Phase),
    Easiest,
    HardestAnswerable { threshold: f64 },
    DontKnow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredQuestion<'a> {
    pub question: &'a Question,
    pub score: f64,
    /// Secondary key, larger wins on equal `score`
    pub tie_break: f64,
    pub probability: f64,
    pub knowledge: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection<'a> {
    Selected {
        question: &'a Question,
        /// `None` for the deterministic practice modes
        phase: Option<Phase>,
        score: f64,
        probability: f64,
    },
    /// No candidates left
    Exhausted,
}

impl<'a> Selection<'a> {
    pub fn question(&self) -> Option<&'a Question> {
        match self {
            Selection::Selected { question, .. } => Some(*question),
            Selection::Exhausted => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Selection::Exhausted)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sampler {
    config: SamplerConfig,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn phase_for(&self, observation_count: usize, coverage: f64) -> Phase {
        if observation_count < self.config.calibrate_observations {
            Phase::Calibrate
        } else if observation_count >= self.config.learn_observations
            && coverage >= self.config.learn_coverage
        {
            Phase::Learn
        } else {
            Phase::Map
        }
    }

    /// Phase from the observation count and the active domain's coverage.
    pub fn phase(&self, estimator: &Estimator) -> Result<Phase> {
        let coverage = estimator.domain_coverage()?;
        Ok(self.phase_for(estimator.observation_count(), coverage))
    }

    /// Score and rank every candidate under the current phase, best first.
    pub fn score_all<'a>(&self, estimator: &Estimator, candidates: &'a [Question]) -> Result<Vec<ScoredQuestion<'a>>> {
        let phase = self.phase(estimator)?;
        self.score_at_phase(estimator, candidates, phase)
    }

    pub fn score_at_phase<'a>(
        &self,
        estimator: &Estimator,
        candidates: &'a [Question],
        phase: Phase,
    ) -> Result<Vec<ScoredQuestion<'a>>> {
        Ok(rank(
            &estimator.view()?,
            Strategy::Phase(phase),
            candidates,
            &HashSet::new(),
            self.config.zpd_target,
        ))
    }

    /// Pick one question, or `Exhausted` when `candidates` is empty.
    pub fn select_next<'a>(
        &self,
        estimator: &Estimator,
        candidates: &'a [Question],
        mode: SelectionMode,
    ) -> Result<Selection<'a>> {
        self.select_excluding(estimator, candidates, mode, &HashSet::new())
    }

    /// Like [`Sampler::select_next`], skipping candidates whose id is in `exclude`.
    pub fn select_excluding<'a>(
        &self,
        estimator: &Estimator,
        candidates: &'a [Question],
        mode: SelectionMode,
        exclude: &HashSet<String>,
    ) -> Result<Selection<'a>> {
        let phase = self.phase(estimator)?;
        self.select_at_phase(estimator, candidates, mode, phase, exclude)
    }

    /// Selection with an already resolved phase; `phase` only drives
    /// [`SelectionMode::Adaptive`].
    pub fn select_at_phase<'a>(
        &self,
        estimator: &Estimator,
        candidates: &'a [Question],
        mode: SelectionMode,
        phase: Phase,
        exclude: &HashSet<String>,
    ) -> Result<Selection<'a>> {
        let view = estimator.view()?;
        if candidates.is_empty() {
            return Ok(Selection::Exhausted);
        }

        let (strategy, phase) = match mode {
            SelectionMode::Adaptive => (Strategy::Phase(phase), Some(phase)),
            SelectionMode::Easiest => (Strategy::Easiest, None),
            SelectionMode::HardestAnswerable => (
                Strategy::HardestAnswerable {
                    threshold: self.config.hardest_answerable_threshold,
                },
                None,
            ),
            SelectionMode::DontKnow => (Strategy::DontKnow, None),
        };

        let ranked = rank(&view, strategy, candidates, exclude, self.config.zpd_target);
        let selection = match ranked.into_iter().next() {
            Some(best) => {
                tracing::debug!(
                    question = %best.question.id,
                    ?mode,
                    ?phase,
                    score = best.score,
                    probability = best.probability,
                    "question selected"
                );
                Selection::Selected {
                    question: best.question,
                    phase,
                    score: best.score,
                    probability: best.probability,
                }
            }
            None => Selection::Exhausted,
        };
        Ok(selection)
    }
}

fn score_one<'a>(view: &GridView<'_>, strategy: Strategy, question: &'a Question, zpd_target: f64) -> ScoredQuestion<'a> {
    let knowledge = view.knowledge_or_prior(&question.position);
    let probability = view
        .model(Some(question.domain.as_str()))
        .probability(knowledge, question.difficulty);

    let (score, tie_break) = match strategy {
        Strategy::Phase(Phase::Calibrate) => {
            let band = if question.difficulty.is_middle_band() { 1.0 } else { 0.0 };
            (band, 0.0)
        }
        Strategy::Phase(Phase::Map) => (binary_entropy(probability), 0.0),
        Strategy::Phase(Phase::Learn) => (-(probability - zpd_target).abs(), 1.0 - knowledge),
        Strategy::Easiest => (probability, 0.0),
        // below-threshold candidates outrank the rest; among the rest, lower P wins
        Strategy::HardestAnswerable { threshold } => {
            if probability < threshold {
                (1.0 + probability, 0.0)
            } else {
                (1.0 - probability, 0.0)
            }
        }
        Strategy::DontKnow => (1.0 - probability, 0.0),
    };

    ScoredQuestion {
        question,
        score,
        tie_break,
        probability,
        knowledge,
    }
}

fn rank<'a>(
    view: &GridView<'_>,
    strategy: Strategy,
    candidates: &'a [Question],
    exclude: &HashSet<String>,
    zpd_target: f64,
) -> Vec<ScoredQuestion<'a>> {
    let mut scored: Vec<ScoredQuestion<'a>> = candidates
        .par_iter()
        .filter(|q| !exclude.contains(&q.id))
        .map(|q| score_one(view, strategy, q, zpd_target))
        .collect();

    // stable: equal keys keep input order
    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.tie_break.total_cmp(&a.tie_break))
    });
    scored
}
