//! Common Types and Constants
//!
//! Shared data structures used across the estimator, sampler and recommender.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KmapError, Result};

// ==================== Constants ====================

/// Number of ordinal difficulty levels
pub const DIFFICULTY_LEVELS: usize = 4;

// ==================== Coordinates ====================

/// A point in the shared normalized map frame [0,1]×[0,1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// True when both coordinates are finite and inside the unit square.
    pub fn in_unit_square(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && (0.0..=1.0).contains(&self.x)
            && (0.0..=1.0).contains(&self.y)
    }
}

/// Axis-aligned rectangle in map space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainBounds {
    pub min: Position,
    pub max: Position,
}

impl DomainBounds {
    pub const fn new(min: Position, max: Position) -> Self {
        Self { min, max }
    }

    pub const fn unit() -> Self {
        Self {
            min: Position::new(0.0, 0.0),
            max: Position::new(1.0, 1.0),
        }
    }

    pub fn center(&self) -> Position {
        Position::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
    }

    pub fn contains(&self, p: &Position) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn is_valid(&self) -> bool {
        self.min.in_unit_square() && self.max.in_unit_square() && self.min.x <= self.max.x && self.min.y <= self.max.y
    }
}

impl Default for DomainBounds {
    fn default() -> Self {
        Self::unit()
    }
}

// ==================== Difficulty ====================

/// Ordinal question difficulty, 1 (easiest) to 4 (hardest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DifficultyLevel(u8);

impl DifficultyLevel {
    pub fn new(level: u8) -> Result<Self> {
        if (1..=DIFFICULTY_LEVELS as u8).contains(&level) {
            Ok(Self(level))
        } else {
            Err(KmapError::InvalidDifficulty(level))
        }
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    /// Zero-based index into per-level threshold tables
    pub fn to_index(&self) -> usize {
        (self.0 - 1) as usize
    }

    /// Levels 2 and 3, used to bound ability quickly during calibration
    pub fn is_middle_band(&self) -> bool {
        matches!(self.0, 2 | 3)
    }

    pub fn all() -> impl Iterator<Item = DifficultyLevel> {
        (1..=DIFFICULTY_LEVELS as u8).map(DifficultyLevel)
    }
}

impl TryFrom<u8> for DifficultyLevel {
    type Error = KmapError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DifficultyLevel> for u8 {
    fn from(value: DifficultyLevel) -> Self {
        value.0
    }
}

// ==================== Observations ====================

/// One graded answer, immutable once recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub position: Position,
    pub correct: bool,
    pub difficulty: DifficultyLevel,
    pub domain: String,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    /// Build an observation stamped with the current time.
    pub fn new(position: Position, correct: bool, difficulty: u8, domain: impl Into<String>) -> Result<Self> {
        Self::at(position, correct, difficulty, domain, Utc::now())
    }

    pub fn at(
        position: Position,
        correct: bool,
        difficulty: u8,
        domain: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            position,
            correct,
            difficulty: DifficultyLevel::new(difficulty)?,
            domain: domain.into(),
            timestamp,
        })
    }

    /// Target value cells are blended toward
    pub fn outcome(&self) -> f64 {
        if self.correct {
            1.0
        } else {
            0.0
        }
    }
}

// ==================== Questions ====================

/// An unanswered question offered to the sampler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub position: Position,
    pub difficulty: DifficultyLevel,
    pub domain: String,
}

impl Question {
    pub fn new(id: impl Into<String>, position: Position, difficulty: u8, domain: impl Into<String>) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            position,
            difficulty: DifficultyLevel::new(difficulty)?,
            domain: domain.into(),
        })
    }
}

// ==================== Content ====================

/// Span of source material a window covers (seconds for video, characters for text)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSpan {
    pub start: f64,
    pub end: f64,
}

/// A projected slice of a content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentWindow {
    pub position: Position,
    pub span: WindowSpan,
}

impl ContentWindow {
    pub fn new(position: Position, start: f64, end: f64) -> Self {
        Self {
            position,
            span: WindowSpan { start, end },
        }
    }
}

/// Supplementary content (a video) and its ordered windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub windows: Vec<ContentWindow>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, windows: Vec<ContentWindow>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            windows,
        }
    }
}
