#![allow(dead_code)]

use danci_kmap::{ContentItem, ContentWindow, EngineConfig, Position, Question};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub fn small_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.grid.resolution = 10;
    config
}

pub fn question(id: &str, x: f64, y: f64, level: u8) -> Question {
    Question::new(id, Position::new(x, y), level, "all").unwrap()
}

pub fn video(id: &str, points: &[(f64, f64)]) -> ContentItem {
    let windows = points
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| ContentWindow::new(Position::new(x, y), i as f64 * 30.0, (i + 1) as f64 * 30.0))
        .collect();
    ContentItem::new(id, format!("Video {}", id), windows)
}

/// Seeded library of `count` items with `windows` windows each.
pub fn random_library(seed: u64, count: usize, windows: usize) -> Vec<ContentItem> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let cx: f64 = rng.gen_range(0.1..0.9);
            let cy: f64 = rng.gen_range(0.1..0.9);
            let points: Vec<(f64, f64)> = (0..windows)
                .map(|_| {
                    (
                        (cx + rng.gen_range(-0.1..0.1)).clamp(0.0, 1.0),
                        (cy + rng.gen_range(-0.1..0.1)).clamp(0.0, 1.0),
                    )
                })
                .collect();
            video(&format!("v{}", i), &points)
        })
        .collect()
}
