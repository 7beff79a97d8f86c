//! Ordinal Item-Response Model
//!
//! Maps a knowledge estimate K ∈ [0,1] and a difficulty level to a
//! probability of answering correctly:
//!
//! - P = Φ(a · (θ − b_level))
//!   - θ: K mapped linearly onto the latent interval `[lo, hi]`
//!   - a: domain discrimination (> 0)
//!   - b_level: domain threshold for the level (strictly increasing)
//!   - Φ: standard normal CDF
//!
//! Fully deterministic; higher levels never yield higher probabilities.

use serde::{Deserialize, Serialize};

use crate::config::DomainConfig;
use crate::sanitize::clamp_unit;
use crate::types::{DifficultyLevel, DIFFICULTY_LEVELS};

// Abramowitz & Stegun 26.2.17, |error| < 7.5e-8
const P: f64 = 0.231_641_9;
const B1: f64 = 0.319_381_530;
const B2: f64 = -0.356_563_782;
const B3: f64 = 1.781_477_937;
const B4: f64 = -1.821_255_978;
const B5: f64 = 1.330_274_429;
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal density
#[inline]
pub fn normal_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF via the Abramowitz & Stegun polynomial.
pub fn normal_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return 0.5;
    }
    if x > 8.0 {
        return 1.0;
    }
    if x < -8.0 {
        return 0.0;
    }

    let z = x.abs();
    let t = 1.0 / (1.0 + P * z);
    let poly = t * (B1 + t * (B2 + t * (B3 + t * (B4 + t * B5))));
    let upper = normal_pdf(z) * poly;

    if x >= 0.0 {
        1.0 - upper
    } else {
        upper
    }
}

/// Item-response parameters of one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrtModel {
    pub thresholds: [f64; DIFFICULTY_LEVELS],
    pub discrimination: f64,
    pub latent_range: (f64, f64),
}

impl IrtModel {
    pub fn from_domain(domain: &DomainConfig, latent_range: (f64, f64)) -> Self {
        Self {
            thresholds: domain.thresholds,
            discrimination: domain.discrimination,
            latent_range,
        }
    }

    /// Map K ∈ [0,1] onto the latent ability scale.
    #[inline]
    pub fn scale_knowledge(&self, knowledge: f64) -> f64 {
        let (lo, hi) = self.latent_range;
        lo + clamp_unit(knowledge) * (hi - lo)
    }

    pub fn probability(&self, knowledge: f64, difficulty: DifficultyLevel) -> f64 {
        let theta = self.scale_knowledge(knowledge);
        let b = self.thresholds[difficulty.to_index()];
        normal_cdf(self.discrimination * (theta - b))
    }
}
