//! Boundary contracts with the host application.
//!
//! The core never fits a projection or fetches content; it only calls these.

use crate::types::{ContentItem, DomainBounds, Position};

/// Kind of content being projected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Question,
    ArticlePassage,
    TranscriptWindow,
}

/// A piece of content handed to the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentUnit<'a> {
    pub kind: UnitKind,
    pub text: &'a str,
}

impl<'a> ContentUnit<'a> {
    pub fn question(text: &'a str) -> Self {
        Self {
            kind: UnitKind::Question,
            text,
        }
    }
}

/// Already-fitted projection into the shared map frame. Must be stable
/// within a session: the same unit always maps to the same position.
pub trait ProjectionOracle {
    fn project(&self, unit: &ContentUnit<'_>) -> Position;
}

impl<F> ProjectionOracle for F
where
    F: Fn(&ContentUnit<'_>) -> Position,
{
    fn project(&self, unit: &ContentUnit<'_>) -> Position {
        self(unit)
    }
}

/// Source of recommendable content and domain extents.
pub trait ContentLibrary {
    fn items(&self) -> &[ContentItem];

    /// Spatial extent of `domain`, `None` to use the configured bounds.
    fn domain_bounds(&self, domain: &str) -> Option<DomainBounds> {
        let _ = domain;
        None
    }
}

impl ContentLibrary for Vec<ContentItem> {
    fn items(&self) -> &[ContentItem] {
        self
    }
}
