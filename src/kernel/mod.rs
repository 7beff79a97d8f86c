//! Matérn-3/2 Kernel
//!
//! Shared distance weighting for the estimator (spreading observations over
//! nearby cells, interpolating predictions) and the recommender (relevance of
//! content windows to cells).
//!
//! Formula:
//! - k(d) = (1 + √3·d/ℓ) · exp(−√3·d/ℓ)
//!   - d: euclidean distance in map units
//!   - ℓ: length-scale (about one grid cell)
//!
//! k(0) = 1, k is strictly decreasing in d and never negative.

use serde::{Deserialize, Serialize};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// Matérn-3/2 correlation at distance `d` for length-scale `length_scale`.
#[inline]
pub fn matern32(d: f64, length_scale: f64) -> f64 {
    if !d.is_finite() || length_scale <= 0.0 {
        return 0.0;
    }
    let r = SQRT_3 * d.abs() / length_scale;
    (1.0 + r) * (-r).exp()
}

/// Kernel with a truncated support, measured in length-scales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matern32 {
    pub length_scale: f64,
    /// Support radius in map units
    pub radius: f64,
}

impl Matern32 {
    pub fn new(length_scale: f64, radius_in_scales: f64) -> Self {
        Self {
            length_scale,
            radius: length_scale * radius_in_scales,
        }
    }

    /// Weight at distance `d`, zero outside the support.
    #[inline]
    pub fn weight(&self, d: f64) -> f64 {
        if d > self.radius {
            0.0
        } else {
            matern32(d, self.length_scale)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_unit_at_zero() {
        assert!((matern32(0.0, 0.1) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_monotone_decay() {
        let mut prev = matern32(0.0, 0.02);
        for i in 1..100 {
            let k = matern32(i as f64 * 0.005, 0.02);
            assert!(k < prev, "kernel must strictly decrease");
            assert!(k >= 0.0);
            prev = k;
        }
    }

    #[test]
    fn test_known_value() {
        // d = ℓ: (1 + √3)·e^(−√3)
        let expected = (1.0 + SQRT_3) * (-SQRT_3).exp();
        assert!((matern32(0.1, 0.1) - expected).abs() < EPS);
    }

    #[test]
    fn test_truncated_support() {
        let kernel = Matern32::new(0.1, 3.0);
        assert!((kernel.radius - 0.3).abs() < EPS);
        assert!(kernel.weight(0.29) > 0.0);
        assert_eq!(kernel.weight(0.31), 0.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(matern32(f64::NAN, 0.1), 0.0);
        assert_eq!(matern32(0.1, 0.0), 0.0);
    }
}
