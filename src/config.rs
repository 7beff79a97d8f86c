use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KmapError, Result};
use crate::sanitize::has_invalid_values;
use crate::types::{DomainBounds, DIFFICULTY_LEVELS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Cells per axis
    pub resolution: usize,
    /// Knowledge value of a cell with no observations
    pub prior: f64,
    /// Kernel length-scale in map units; `None` means one cell width
    pub length_scale: Option<f64>,
    /// Update support, in length-scales
    pub influence_radius: f64,
    /// Prediction support, in length-scales
    pub interpolation_radius: f64,
    /// Pseudo-count of the prior when blending observations into a cell
    pub prior_strength: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            resolution: 50,
            prior: 0.5,
            length_scale: None,
            influence_radius: 3.0,
            interpolation_radius: 1.5,
            prior_strength: 1.0,
        }
    }
}

impl GridConfig {
    pub fn effective_length_scale(&self) -> f64 {
        self.length_scale
            .unwrap_or_else(|| 1.0 / self.resolution.max(1) as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Observations needed to leave the calibrate phase
    pub calibrate_observations: usize,
    /// Observations needed (together with coverage) to enter the learn phase
    pub learn_observations: usize,
    /// Fraction of observed cells needed to enter the learn phase
    pub learn_coverage: f64,
    /// Target success probability in the learn phase
    pub zpd_target: f64,
    /// `hardest-answerable` picks the most likely question strictly below this
    pub hardest_answerable_threshold: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            calibrate_observations: 5,
            learn_observations: 30,
            learn_coverage: 0.25,
            zpd_target: 0.6,
            hardest_answerable_threshold: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub top_n: usize,
    /// Score multiplier for already watched content
    pub watched_penalty: f64,
    /// Fraction of an item's windows that must fall inside the domain bounds
    pub min_domain_overlap: f64,
    /// EMA weight of a new difference map
    pub ema_alpha: f64,
    /// Post-content questions before a difference map is folded in
    pub maturity_questions: u32,
    /// Accumulated relevance a cell needs before its running value is trusted
    pub min_transfer_coverage: f64,
    /// Transfer assumed when no cell has enough coverage
    pub prior_transfer: f64,
    /// Relevance below this is treated as zero when attributing a difference map
    pub relevance_floor: f64,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            watched_penalty: 0.1,
            min_domain_overlap: 0.5,
            ema_alpha: 0.3,
            maturity_questions: 5,
            min_transfer_coverage: 0.5,
            prior_transfer: 0.1,
            relevance_floor: 0.01,
        }
    }
}

/// Per-domain item-response parameters and spatial extent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    /// Latent-scale cut-points for difficulty levels 1..=4, strictly increasing
    pub thresholds: [f64; DIFFICULTY_LEVELS],
    pub discrimination: f64,
    #[serde(default)]
    pub bounds: DomainBounds,
}

impl DomainConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            thresholds: [-1.5, -0.5, 0.5, 1.5],
            discrimination: 1.0,
            bounds: DomainBounds::unit(),
        }
    }

    pub fn with_bounds(mut self, bounds: DomainBounds) -> Self {
        self.bounds = bounds;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid: GridConfig,
    pub sampler: SamplerConfig,
    pub recommender: RecommenderConfig,
    pub domains: Vec<DomainConfig>,
    /// Latent ability interval that K ∈ [0,1] is mapped onto
    pub latent_range: (f64, f64),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            sampler: SamplerConfig::default(),
            recommender: RecommenderConfig::default(),
            domains: vec![DomainConfig::new("all")],
            latent_range: (-3.0, 3.0),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Defaults overridden by `KMAP_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_parse::<usize>("KMAP_GRID_RESOLUTION") {
            config.grid.resolution = val;
        }
        if let Some(val) = env_parse::<f64>("KMAP_GRID_PRIOR") {
            config.grid.prior = val;
        }
        if let Some(val) = env_parse::<f64>("KMAP_LENGTH_SCALE") {
            config.grid.length_scale = Some(val);
        }
        if let Some(val) = env_parse::<f64>("KMAP_EMA_ALPHA") {
            config.recommender.ema_alpha = val;
        }
        if let Some(val) = env_parse::<f64>("KMAP_WATCHED_PENALTY") {
            config.recommender.watched_penalty = val;
        }
        if let Some(val) = env_parse::<usize>("KMAP_TOP_N") {
            config.recommender.top_n = val;
        }
        if let Some(val) = env_parse::<u32>("KMAP_MATURITY_QUESTIONS") {
            config.recommender.maturity_questions = val;
        }
        if let Some(val) = env_parse::<usize>("KMAP_CALIBRATE_OBSERVATIONS") {
            config.sampler.calibrate_observations = val;
        }
        if let Some(val) = env_parse::<usize>("KMAP_LEARN_OBSERVATIONS") {
            config.sampler.learn_observations = val;
        }
        if let Some(val) = env_parse::<f64>("KMAP_LEARN_COVERAGE") {
            config.sampler.learn_coverage = val;
        }

        config
    }

    pub fn domain(&self, name: &str) -> Result<&DomainConfig> {
        self.domains
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| KmapError::UnknownDomain(name.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let grid = &self.grid;
        if grid.resolution == 0 {
            return Err(invalid("grid.resolution must be positive"));
        }
        if !(0.0..=1.0).contains(&grid.prior) {
            return Err(invalid("grid.prior must be in [0, 1]"));
        }
        if grid.effective_length_scale() <= 0.0 {
            return Err(invalid("grid.length_scale must be positive"));
        }
        if grid.influence_radius <= 0.0 || grid.interpolation_radius <= 0.0 {
            return Err(invalid("kernel radii must be positive"));
        }
        if grid.prior_strength <= 0.0 {
            return Err(invalid("grid.prior_strength must be positive"));
        }

        let sampler = &self.sampler;
        if sampler.learn_observations < sampler.calibrate_observations {
            return Err(invalid("sampler.learn_observations below calibrate_observations"));
        }
        if !(0.0..=1.0).contains(&sampler.learn_coverage) {
            return Err(invalid("sampler.learn_coverage must be in [0, 1]"));
        }

        let rec = &self.recommender;
        if !(rec.ema_alpha > 0.0 && rec.ema_alpha <= 1.0) {
            return Err(invalid("recommender.ema_alpha must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&rec.watched_penalty) {
            return Err(invalid("recommender.watched_penalty must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&rec.min_domain_overlap) {
            return Err(invalid("recommender.min_domain_overlap must be in [0, 1]"));
        }
        if !(0.0..1.0).contains(&rec.relevance_floor) {
            return Err(invalid("recommender.relevance_floor must be in [0, 1)"));
        }
        if rec.maturity_questions == 0 {
            return Err(invalid("recommender.maturity_questions must be positive"));
        }

        if has_invalid_values(&[self.latent_range.0, self.latent_range.1])
            || self.latent_range.0 >= self.latent_range.1
        {
            return Err(invalid("latent_range must be increasing"));
        }
        if self.domains.is_empty() {
            return Err(invalid("at least one domain is required"));
        }
        let mut seen = HashSet::new();
        for domain in &self.domains {
            if !seen.insert(domain.name.as_str()) {
                return Err(invalid(format!("duplicate domain {}", domain.name)));
            }
            if domain.discrimination <= 0.0 || !domain.discrimination.is_finite() {
                return Err(invalid(format!("domain {}: discrimination must be positive", domain.name)));
            }
            if has_invalid_values(&domain.thresholds) {
                return Err(invalid(format!("domain {}: thresholds must be finite", domain.name)));
            }
            if domain.thresholds.windows(2).any(|w| w[0] >= w[1]) {
                return Err(invalid(format!(
                    "domain {}: thresholds must be strictly increasing",
                    domain.name
                )));
            }
            if !domain.bounds.is_valid() {
                return Err(invalid(format!("domain {}: bounds outside unit square", domain.name)));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> KmapError {
    KmapError::InvalidConfig(msg.into())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
