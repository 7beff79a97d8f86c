use serde::{Deserialize, Serialize};

use crate::grid::{CellMap, Snapshot};
use crate::types::{ContentItem, ContentWindow};

/// Where the current content-exposure cycle stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExposureState {
    /// No live snapshot
    Idle,
    /// Snapshot taken on first exposure to an item
    Snapshotted,
    /// Further items shown before any post-content question; snapshot reused
    Accumulating,
    /// At least one post-content question answered; difference map available
    Observing,
    /// Enough post-content questions; folded into the running average and
    /// the cycle released. Reported once, by the folding question.
    Matured,
}

/// One comparison window: a snapshot plus everything shown since.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExposureCycle {
    pub(crate) snapshot: Snapshot,
    pub(crate) items: Vec<String>,
    pub(crate) windows: Vec<ContentWindow>,
    pub(crate) consumed: bool,
    pub(crate) post_questions: u32,
    pub(crate) latest_difference: Option<CellMap>,
}

impl ExposureCycle {
    pub(crate) fn open(snapshot: Snapshot, item: &ContentItem) -> Self {
        Self {
            snapshot,
            items: vec![item.id.clone()],
            windows: item.windows.clone(),
            consumed: false,
            post_questions: 0,
            latest_difference: None,
        }
    }

    /// Add another item to the window, ignoring repeats.
    pub(crate) fn extend(&mut self, item: &ContentItem) {
        if !self.items.iter().any(|id| id == &item.id) {
            self.items.push(item.id.clone());
            self.windows.extend(item.windows.iter().cloned());
        }
    }

    pub(crate) fn contains(&self, item_id: &str) -> bool {
        self.items.iter().any(|id| id == item_id)
    }

    pub(crate) fn state(&self) -> ExposureState {
        if self.post_questions > 0 {
            ExposureState::Observing
        } else if self.items.len() > 1 {
            ExposureState::Accumulating
        } else {
            ExposureState::Snapshotted
        }
    }
}

/// Exponentially smoothed, relevance-attributed difference map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningDifference {
    pub(crate) values: CellMap,
    /// Accumulated relevance per cell across folds
    pub(crate) coverage: CellMap,
    pub(crate) folds: u32,
}

impl RunningDifference {
    pub fn values(&self) -> &CellMap {
        &self.values
    }

    pub fn coverage(&self) -> &CellMap {
        &self.coverage
    }

    pub fn folds(&self) -> u32 {
        self.folds
    }
}
