use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use danci_kmap::{
    ContentItem, ContentWindow, EngineConfig, LearningSession, Position, Question, SelectionMode,
};

// 500 个内容 × 20 个窗口，与交互式推荐的目标规模一致
fn build_library(rng: &mut ChaCha8Rng, count: usize, windows: usize) -> Vec<ContentItem> {
    (0..count)
        .map(|i| {
            let cx: f64 = rng.gen_range(0.1..0.9);
            let cy: f64 = rng.gen_range(0.1..0.9);
            let windows = (0..windows)
                .map(|w| {
                    let p = Position::new(
                        (cx + rng.gen_range(-0.1..0.1)).clamp(0.0, 1.0),
                        (cy + rng.gen_range(-0.1..0.1)).clamp(0.0, 1.0),
                    );
                    ContentWindow::new(p, w as f64 * 30.0, (w + 1) as f64 * 30.0)
                })
                .collect();
            ContentItem::new(format!("v{}", i), format!("Video {}", i), windows)
        })
        .collect()
}

fn warm_session(rng: &mut ChaCha8Rng, answers: usize) -> LearningSession {
    let mut session = LearningSession::new(EngineConfig::default()).expect("default config");
    for _ in 0..answers {
        let q = Question::new(
            "warm",
            Position::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)),
            rng.gen_range(1..=4),
            "all",
        )
        .expect("valid level");
        session.answer_question(&q, rng.gen_bool(0.6)).expect("recorded");
    }
    session
}

fn bench_compute_ranking(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let library = build_library(&mut rng, 500, 20);
    let session = warm_session(&mut rng, 40);

    c.bench_function("compute_ranking_500x20", |b| {
        b.iter(|| {
            let ranked = session.compute_ranking(black_box(&library), "all").expect("ranked");
            black_box(ranked.len())
        })
    });
}

fn bench_select_next(c: &mut Criterion) {
    let sizes = [50, 200, 1000];
    let mut group = c.benchmark_group("select_next");

    for size in sizes {
        let mut rng = ChaCha8Rng::seed_from_u64(size as u64);
        let candidates: Vec<Question> = (0..size)
            .map(|i| {
                Question::new(
                    format!("q{}", i),
                    Position::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)),
                    (i % 4 + 1) as u8,
                    "all",
                )
                .expect("valid level")
            })
            .collect();
        let mut session = warm_session(&mut rng, 30);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let selection = session
                    .select_with_mode(black_box(&candidates), SelectionMode::Adaptive)
                    .expect("selected");
                black_box(selection.is_exhausted())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compute_ranking, bench_select_next);
criterion_main!(benches);
