//! Learning session context.
//!
//! Owns all mutable state of one learner's session (grid, observation log,
//! answered questions, watched content, exposure cycle, running difference
//! map) and exposes the selection and recommendation API on top of it.

use std::collections::HashSet;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::estimator::{Estimator, RecordOutcome};
use crate::grid::KnowledgeSummary;
use crate::oracle::{ContentLibrary, ContentUnit, ProjectionOracle};
use crate::recommender::{ExposureState, RankedContent, Recommender, TransferEstimate};
use crate::sampler::{Phase, Sampler, ScoredQuestion, Selection, SelectionMode};
use crate::types::{ContentItem, Observation, Position, Question};

pub struct LearningSession {
    config: EngineConfig,
    estimator: Estimator,
    sampler: Sampler,
    recommender: Recommender,
    answered: HashSet<String>,
    last_phase: Option<Phase>,
}

impl LearningSession {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let estimator = Estimator::new(&config)?;
        let sampler = Sampler::new(config.sampler.clone());
        let recommender = Recommender::new(config.recommender.clone(), config.grid.effective_length_scale());

        tracing::info!(
            resolution = config.grid.resolution,
            domain = estimator.active_domain(),
            "learning session created"
        );

        Ok(Self {
            config,
            estimator,
            sampler,
            recommender,
            answered: HashSet::new(),
            last_phase: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn recommender(&self) -> &Recommender {
        &self.recommender
    }

    pub fn active_domain(&self) -> &str {
        self.estimator.active_domain()
    }

    pub fn summary(&self) -> Result<KnowledgeSummary> {
        Ok(self.estimator.grid()?.summary())
    }

    // ==================== Estimation ====================

    pub fn predict(&self, position: Position) -> Result<Option<f64>> {
        self.estimator.predict(position)
    }

    pub fn probability_correct(&self, position: Position, difficulty: u8) -> Result<f64> {
        self.estimator.probability_correct(position, difficulty)
    }

    /// Record one graded answer. Also counts it as a post-content question
    /// when consumed content is awaiting evaluation.
    pub fn record_answer(&mut self, question_id: Option<&str>, observation: Observation) -> Result<RecordOutcome> {
        let outcome = self.estimator.record_observation(observation.clone())?;
        if let Some(id) = question_id {
            self.answered.insert(id.to_string());
        }
        if matches!(outcome, RecordOutcome::Applied { .. }) {
            let grid = self.estimator.grid()?;
            self.recommender.handle_post_video_question(&observation, grid);
        }
        Ok(outcome)
    }

    /// Answer to a candidate question previously offered by the sampler.
    pub fn answer_question(&mut self, question: &Question, correct: bool) -> Result<RecordOutcome> {
        let observation = Observation::new(
            question.position,
            correct,
            question.difficulty.level(),
            question.domain.clone(),
        )?;
        self.record_answer(Some(&question.id), observation)
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answered.contains(question_id)
    }

    // ==================== Selection ====================

    /// Highest phase reached so far in this session. Coverage is measured
    /// within the active domain, so a domain switch can lower the derived
    /// phase; the session keeps the high-water mark instead.
    pub fn phase(&mut self) -> Result<Phase> {
        let phase = self.current_phase()?;
        if self.last_phase != Some(phase) {
            tracing::info!(from = ?self.last_phase, to = ?phase, "sampler phase changed");
            self.last_phase = Some(phase);
        }
        Ok(phase)
    }

    fn current_phase(&self) -> Result<Phase> {
        let derived = self.sampler.phase(&self.estimator)?;
        Ok(self.last_phase.map_or(derived, |prev| prev.max(derived)))
    }

    pub fn score_all<'a>(&self, candidates: &'a [Question]) -> Result<Vec<ScoredQuestion<'a>>> {
        self.sampler
            .score_at_phase(&self.estimator, candidates, self.current_phase()?)
    }

    /// Adaptive selection over candidates not yet answered in this session.
    pub fn select_next<'a>(&mut self, candidates: &'a [Question]) -> Result<Selection<'a>> {
        self.select_with_mode(candidates, SelectionMode::Adaptive)
    }

    pub fn select_with_mode<'a>(&mut self, candidates: &'a [Question], mode: SelectionMode) -> Result<Selection<'a>> {
        let phase = if mode == SelectionMode::Adaptive {
            self.phase()?
        } else {
            self.current_phase()?
        };
        self.sampler
            .select_at_phase(&self.estimator, candidates, mode, phase, &self.answered)
    }

    /// Project raw question text into a candidate.
    pub fn project_question<O: ProjectionOracle>(
        &self,
        oracle: &O,
        id: impl Into<String>,
        text: &str,
        difficulty: u8,
        domain: impl Into<String>,
    ) -> Result<Question> {
        let position = oracle.project(&ContentUnit::question(text));
        Question::new(id, position, difficulty, domain)
    }

    // ==================== Recommendation ====================

    /// Top-N content for `domain` using its configured bounds.
    pub fn compute_ranking<'a>(&self, candidates: &'a [ContentItem], domain: &str) -> Result<Vec<RankedContent<'a>>> {
        let bounds = self.config.domain(domain)?.bounds;
        let view = self.estimator.view()?;
        Ok(self.recommender.compute_ranking(&view, candidates, &bounds))
    }

    /// Top-N content from a library, preferring the library's own domain bounds.
    pub fn rank_library<'a, L: ContentLibrary>(&self, library: &'a L, domain: &str) -> Result<Vec<RankedContent<'a>>> {
        let bounds = match library.domain_bounds(domain) {
            Some(bounds) => bounds,
            None => self.config.domain(domain)?.bounds,
        };
        let view = self.estimator.view()?;
        Ok(self.recommender.compute_ranking(&view, library.items(), &bounds))
    }

    pub fn compute_tlp(&self, item: &ContentItem) -> Result<f64> {
        Ok(self.recommender.compute_tlp(&self.estimator.view()?, item))
    }

    /// Expected gain of `item`; the transfer fallback averages over the
    /// active domain only.
    pub fn compute_expected_gain(&self, item: &ContentItem) -> Result<f64> {
        let bounds = self.estimator.active_bounds();
        Ok(self
            .recommender
            .compute_expected_gain(&self.estimator.view()?, item, &bounds))
    }

    pub fn transfer_at(&self, position: &Position) -> TransferEstimate {
        self.recommender
            .transfer_at(position, &self.estimator.active_bounds())
    }

    pub fn present_content(&mut self, item: &ContentItem) -> Result<ExposureState> {
        let grid = self.estimator.grid()?;
        Ok(self.recommender.present_content(grid, item))
    }

    pub fn mark_consumed(&mut self, item_id: &str) {
        self.recommender.mark_consumed(item_id);
    }

    pub fn seed_watched<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommender.seed_watched(ids);
    }

    pub fn exposure_state(&self) -> ExposureState {
        self.recommender.exposure_state()
    }

    // ==================== Lifecycle ====================

    /// Change the active domain. Snapshots and the running average are
    /// cleared; the grid is kept.
    pub fn switch_domain(&mut self, domain: &str) -> Result<()> {
        self.estimator.set_active_domain(domain)?;
        self.recommender.clear_exposures();
        tracing::info!(domain, "active domain switched");
        Ok(())
    }

    /// Clear grid, observation log, answered questions, snapshots, running
    /// averages and watched content.
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.recommender.reset();
        self.answered.clear();
        self.last_phase = None;
        tracing::info!("learning session reset");
    }
}
