mod common;

use std::time::Instant;

use common::{question, random_library, small_config, video};
use danci_kmap::{
    ContentLibrary, ContentUnit, DomainBounds, DomainConfig, EngineConfig, ExposureState,
    KmapError, LearningSession, Observation, Phase, Position, ProjectionOracle, RecordOutcome,
    Selection, SelectionMode, TransferSource,
};

#[test]
fn integration_prior_then_local_update() {
    let mut session = LearningSession::new(small_config()).unwrap();
    for (x, y) in [(0.1, 0.1), (0.5, 0.5), (0.9, 0.9), (0.0, 1.0)] {
        let k = session.predict(Position::new(x, y)).unwrap().unwrap();
        assert!((k - 0.5).abs() < 1e-12);
    }

    let obs = Observation::new(Position::new(0.5, 0.5), true, 2, "all").unwrap();
    session.record_answer(None, obs).unwrap();

    assert!(session.predict(Position::new(0.5, 0.5)).unwrap().unwrap() > 0.5);
    let far = session.predict(Position::new(0.9, 0.9)).unwrap().unwrap();
    assert!((far - 0.5).abs() < 1e-12);
}

#[test]
fn integration_out_of_bounds_is_not_an_error() {
    let mut session = LearningSession::new(small_config()).unwrap();
    let obs = Observation::new(Position::new(1.2, -0.3), false, 3, "all").unwrap();
    assert_eq!(session.record_answer(None, obs).unwrap(), RecordOutcome::Dropped);
    assert_eq!(session.predict(Position::new(1.2, -0.3)).unwrap(), None);
    assert_eq!(session.summary().unwrap().observed_cells, 0);
}

#[test]
fn integration_invalid_difficulty_is_local() {
    let session = LearningSession::new(small_config()).unwrap();
    assert!(matches!(
        session.probability_correct(Position::new(0.5, 0.5), 9),
        Err(KmapError::InvalidDifficulty(9))
    ));
    assert!(session.probability_correct(Position::new(0.5, 0.5), 2).is_ok());
}

#[test]
fn integration_adaptive_loop_never_regresses() {
    let mut config = small_config();
    config.sampler.calibrate_observations = 3;
    config.sampler.learn_observations = 10;
    config.sampler.learn_coverage = 0.3;
    let mut session = LearningSession::new(config).unwrap();

    let candidates: Vec<_> = (0..60)
        .map(|i| {
            let x = (i % 10) as f64 / 10.0 + 0.05;
            let y = (i / 10) as f64 / 6.0 + 0.05;
            question(&format!("q{}", i), x, y, (i % 4 + 1) as u8)
        })
        .collect();

    let mut phases = Vec::new();
    loop {
        let picked = match session.select_next(&candidates).unwrap() {
            Selection::Selected { question, phase, .. } => {
                phases.push(phase.unwrap());
                question.clone()
            }
            Selection::Exhausted => break,
        };
        assert!(!session.is_answered(&picked.id));
        // learner knows the left half of the map
        session.answer_question(&picked, picked.position.x < 0.5).unwrap();
    }

    assert_eq!(phases.len(), candidates.len());
    assert_eq!(phases[0], Phase::Calibrate);
    assert_eq!(*phases.last().unwrap(), Phase::Learn);
    for w in phases.windows(2) {
        assert!(w[1] >= w[0], "phase regressed");
    }
    let left = session.predict(Position::new(0.2, 0.5)).unwrap().unwrap();
    let right = session.predict(Position::new(0.8, 0.5)).unwrap().unwrap();
    assert!(left > right);
}

#[test]
fn integration_practice_modes_bypass_phase() {
    let mut session = LearningSession::new(small_config()).unwrap();
    let candidates = vec![question("a", 0.5, 0.5, 1), question("b", 0.5, 0.5, 4)];
    match session.select_with_mode(&candidates, SelectionMode::DontKnow).unwrap() {
        Selection::Selected { question, phase, .. } => {
            assert_eq!(question.id, "b");
            assert_eq!(phase, None);
        }
        Selection::Exhausted => panic!("expected a selection"),
    }
    assert!(session.select_next(&[]).unwrap().is_exhausted());
}

#[test]
fn integration_ranking_scenario_500_by_20() {
    let mut session = LearningSession::new(EngineConfig::default()).unwrap();
    for i in 0..40 {
        let p = Position::new((i % 8) as f64 / 8.0 + 0.06, (i / 8) as f64 / 5.0 + 0.1);
        let obs = Observation::new(p, i % 3 != 0, (i % 4 + 1) as u8, "all").unwrap();
        session.record_answer(None, obs).unwrap();
    }
    let library = random_library(7, 500, 20);

    let started = Instant::now();
    let ranked = session.compute_ranking(&library, "all").unwrap();
    let elapsed = started.elapsed();

    assert_eq!(ranked.len(), 10);
    for w in ranked.windows(2) {
        assert!(w[0].score >= w[1].score);
    }
    // generous bound for unoptimized test builds
    assert!(elapsed.as_millis() < 2000, "ranking took {:?}", elapsed);
}

#[test]
fn integration_ranking_respects_domain_bounds() {
    let mut config = small_config();
    config.domains = vec![
        DomainConfig::new("left").with_bounds(DomainBounds::new(Position::new(0.0, 0.0), Position::new(0.5, 1.0))),
        DomainConfig::new("right").with_bounds(DomainBounds::new(Position::new(0.5, 0.0), Position::new(1.0, 1.0))),
    ];
    let session = LearningSession::new(config).unwrap();
    let library = vec![video("l", &[(0.2, 0.5)]), video("r", &[(0.8, 0.5)])];

    let left: Vec<_> = session.compute_ranking(&library, "left").unwrap().iter().map(|r| r.item.id.clone()).collect();
    assert_eq!(left, vec!["l"]);
    assert!(matches!(session.compute_ranking(&library, "middle"), Err(KmapError::UnknownDomain(_))));
}

struct FixedLibrary {
    items: Vec<danci_kmap::ContentItem>,
}

impl ContentLibrary for FixedLibrary {
    fn items(&self) -> &[danci_kmap::ContentItem] {
        &self.items
    }

    fn domain_bounds(&self, _domain: &str) -> Option<DomainBounds> {
        Some(DomainBounds::new(Position::new(0.6, 0.6), Position::new(1.0, 1.0)))
    }
}

#[test]
fn integration_library_bounds_override_config() {
    let session = LearningSession::new(small_config()).unwrap();
    let library = FixedLibrary {
        items: vec![video("near", &[(0.2, 0.2)]), video("corner", &[(0.8, 0.8)])],
    };
    let ranked = session.rank_library(&library, "all").unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].item.id, "corner");
}

struct GridOracle;

impl ProjectionOracle for GridOracle {
    fn project(&self, unit: &ContentUnit<'_>) -> Position {
        let len = unit.text.len() as f64;
        Position::new((len % 10.0) / 10.0, (len % 7.0) / 7.0)
    }
}

#[test]
fn integration_projection_is_stable() {
    let session = LearningSession::new(small_config()).unwrap();
    let a = session.project_question(&GridOracle, "q1", "What is a derivative?", 2, "all").unwrap();
    let b = session.project_question(&GridOracle, "q1", "What is a derivative?", 2, "all").unwrap();
    assert_eq!(a, b);
    assert!(session.project_question(&GridOracle, "q2", "?", 0, "all").is_err());
}

#[test]
fn integration_expected_gain_warm_up() {
    let mut session = LearningSession::new(small_config()).unwrap();
    let target = Position::new(0.5, 0.5);
    let item = video("lecture", &[(0.5, 0.5), (0.55, 0.45)]);

    assert_eq!(session.present_content(&item).unwrap(), ExposureState::Snapshotted);
    session.mark_consumed("lecture");

    for n in 1..=4 {
        let obs = Observation::new(target, true, 2, "all").unwrap();
        session.record_answer(None, obs).unwrap();
        assert_eq!(session.exposure_state(), ExposureState::Observing, "after {} questions", n);
        let transfer = session.transfer_at(&target);
        assert_eq!(transfer.source, TransferSource::Fallback);
        assert!((transfer.value - session.config().recommender.prior_transfer).abs() < 1e-12);
    }
    let gain_before = session.compute_expected_gain(&item).unwrap();

    let obs = Observation::new(target, true, 2, "all").unwrap();
    session.record_answer(None, obs).unwrap();
    // folded into the running map and released
    assert_eq!(session.exposure_state(), ExposureState::Idle);
    assert_eq!(session.recommender().running_difference().unwrap().folds(), 1);

    let transfer = session.transfer_at(&target);
    assert_eq!(transfer.source, TransferSource::Running);
    assert!(transfer.value > 0.0);
    let gain_after = session.compute_expected_gain(&item).unwrap();
    assert!(gain_after != gain_before);

    // untouched region falls back to the mean of trusted cells
    let far = session.transfer_at(&Position::new(0.05, 0.95));
    assert_eq!(far.source, TransferSource::Fallback);
    assert!(far.value > 0.0);
}

#[test]
fn integration_accumulating_window_shares_snapshot() {
    let mut session = LearningSession::new(small_config()).unwrap();
    let a = video("a", &[(0.3, 0.3)]);
    let b = video("b", &[(0.7, 0.7)]);
    session.present_content(&a).unwrap();
    let taken = session.recommender().live_snapshot().unwrap().taken_at();
    assert_eq!(session.present_content(&b).unwrap(), ExposureState::Accumulating);
    assert_eq!(session.recommender().live_snapshot().unwrap().taken_at(), taken);
}

#[test]
fn integration_domain_switch_and_reset_clear_state() {
    let mut config = small_config();
    config.domains.push(DomainConfig::new("physics"));
    let mut session = LearningSession::new(config).unwrap();

    let item = video("a", &[(0.5, 0.5)]);
    session.present_content(&item).unwrap();
    session.mark_consumed("a");
    let q = question("q1", 0.5, 0.5, 2);
    session.answer_question(&q, true).unwrap();
    assert_eq!(session.exposure_state(), ExposureState::Observing);

    session.switch_domain("physics").unwrap();
    assert_eq!(session.active_domain(), "physics");
    assert_eq!(session.exposure_state(), ExposureState::Idle);
    assert!(session.recommender().running_difference().is_none());
    assert!(session.predict(Position::new(0.5, 0.5)).unwrap().unwrap() > 0.5);
    assert!(session.switch_domain("chemistry").is_err());

    session.reset();
    assert_eq!(session.estimator().observation_count(), 0);
    assert!(!session.is_answered("q1"));
    assert!(!session.recommender().is_watched("a"));
    assert!((session.predict(Position::new(0.5, 0.5)).unwrap().unwrap() - 0.5).abs() < 1e-12);
}

fn quarter(min: (f64, f64), max: (f64, f64)) -> DomainBounds {
    DomainBounds::new(Position::new(min.0, min.1), Position::new(max.0, max.1))
}

/// 10×10 cell-center tiling of the lower-left quarter of a 20×20 grid.
fn tile_lower_left(session: &mut LearningSession, domain: &str) {
    for i in 0..10 {
        for j in 0..10 {
            let p = Position::new(0.025 + 0.05 * i as f64, 0.025 + 0.05 * j as f64);
            let obs = Observation::new(p, true, 2, domain).unwrap();
            session.record_answer(None, obs).unwrap();
        }
    }
}

#[test]
fn integration_learn_phase_uses_domain_coverage() {
    let mut config = EngineConfig::default();
    config.grid.resolution = 20;
    config.sampler.learn_observations = 10;
    config.sampler.learn_coverage = 0.5;
    config.domains = vec![DomainConfig::new("quarter").with_bounds(quarter((0.0, 0.0), (0.5, 0.5)))];
    let mut session = LearningSession::new(config).unwrap();

    tile_lower_left(&mut session, "quarter");

    assert!(session.summary().unwrap().coverage < 0.5);
    assert_eq!(session.estimator().domain_coverage().unwrap(), 1.0);
    assert_eq!(session.phase().unwrap(), Phase::Learn);
}

#[test]
fn integration_phase_holds_across_domain_switch() {
    let mut config = EngineConfig::default();
    config.grid.resolution = 20;
    config.sampler.learn_observations = 10;
    config.sampler.learn_coverage = 0.5;
    config.domains = vec![
        DomainConfig::new("left").with_bounds(quarter((0.0, 0.0), (0.5, 0.5))),
        DomainConfig::new("right").with_bounds(quarter((0.5, 0.5), (1.0, 1.0))),
    ];
    let mut session = LearningSession::new(config).unwrap();

    tile_lower_left(&mut session, "left");
    assert_eq!(session.phase().unwrap(), Phase::Learn);

    session.switch_domain("right").unwrap();
    let derived = session.sampler().phase(session.estimator()).unwrap();
    assert_eq!(derived, Phase::Map);
    assert_eq!(session.phase().unwrap(), Phase::Learn);

    let candidates = vec![question("r1", 0.8, 0.8, 2)];
    match session.select_next(&candidates).unwrap() {
        Selection::Selected { phase, .. } => assert_eq!(phase, Some(Phase::Learn)),
        Selection::Exhausted => panic!("expected a selection"),
    }

    session.reset();
    assert_eq!(session.phase().unwrap(), Phase::Calibrate);
}

#[test]
fn integration_transfer_fallback_is_domain_wide() {
    let mut config = small_config();
    config.domains = vec![
        DomainConfig::new("right").with_bounds(quarter((0.5, 0.0), (1.0, 1.0))),
        DomainConfig::new("left").with_bounds(quarter((0.0, 0.0), (0.5, 1.0))),
    ];
    let mut session = LearningSession::new(config).unwrap();
    assert_eq!(session.active_domain(), "right");

    // a matured cycle measured entirely in the left domain
    let lecture = video("left-lecture", &[(0.25, 0.5)]);
    session.present_content(&lecture).unwrap();
    session.mark_consumed("left-lecture");
    for _ in 0..5 {
        let obs = Observation::new(Position::new(0.25, 0.5), true, 2, "left").unwrap();
        session.record_answer(None, obs).unwrap();
    }
    assert_eq!(session.recommender().running_difference().unwrap().folds(), 1);

    let prior = session.config().recommender.prior_transfer;
    let far_right = session.transfer_at(&Position::new(0.9, 0.9));
    assert_eq!(far_right.source, TransferSource::Fallback);
    assert_eq!(far_right.value, prior);

    // K is still at the prior there, so the gain is (1 − 0.5) · prior
    let right_item = video("right-lecture", &[(0.8, 0.5)]);
    let gain = session.compute_expected_gain(&right_item).unwrap();
    assert!((gain - 0.5 * prior).abs() < 1e-12);
}
