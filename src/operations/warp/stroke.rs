//! Bookkeeping of the part of a stroke that has already been applied.

use crate::core::types::{PathPoint, Stroke};

/// Outcome of checking the processed history against the live stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCheck {
    /// The stroke is exactly the history.
    Unchanged,
    /// The history is a prefix of the stroke; `remaining` points are new.
    Extended { remaining: usize },
    /// The stroke no longer starts with the history.
    Diverged,
}

/// Points already applied to the cached buffer.
///
/// The history is only trusted while it is a point-wise prefix of the live
/// stroke, so `check` runs before every use.
#[derive(Debug, Clone, Default)]
pub struct StrokeHistory {
    processed: Vec<PathPoint>,
}

impl StrokeHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; the whole live stroke becomes remaining.
    pub fn clear(&mut self) {
        self.processed.clear();
    }

    /// Compare the history point-wise against `stroke`.
    ///
    /// On `Diverged` the owner is expected to drop everything derived from
    /// the history and call `clear`.
    pub fn check(&self, stroke: &Stroke) -> HistoryCheck {
        let points = stroke.points();
        let is_prefix = self.processed.len() <= points.len()
            && self
                .processed
                .iter()
                .zip(points)
                .all(|(done, live)| done.x == live.x && done.y == live.y);

        if !is_prefix {
            return HistoryCheck::Diverged;
        }
        match points.len() - self.processed.len() {
            0 => HistoryCheck::Unchanged,
            remaining => HistoryCheck::Extended { remaining },
        }
    }

    /// Points of `stroke` that have not been applied yet.
    pub fn remaining<'a>(&self, stroke: &'a Stroke) -> &'a [PathPoint] {
        let points = stroke.points();
        &points[self.processed.len().min(points.len())..]
    }

    /// Record `points` as applied.
    pub fn append(&mut self, points: &[PathPoint]) {
        self.processed.extend_from_slice(points);
    }

    /// Points applied so far.
    pub fn points(&self) -> &[PathPoint] {
        &self.processed
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}
