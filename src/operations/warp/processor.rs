//! Incremental stroke processing over a cached displacement field.
//!
//! The processor keeps the field produced by the stroke so far. When the
//! stroke is extended only the new points are stamped; when it was edited
//! the cache is dropped and the whole stroke is replayed.

use crate::core::buffer::{BufferAccess, SharedBuffer};
use crate::core::context::ProcessContext;
use crate::core::error::OperationResult;
use crate::core::rect::Rectangle;
use crate::core::types::{PathPoint, Stroke};
use crate::operations::warp::lut::FalloffLut;
use crate::operations::warp::stamp::{Behavior, StampKernel, WorkArea};
use crate::operations::warp::stroke::{HistoryCheck, StrokeHistory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stamp parameters of a warp stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpParams {
    /// Effect strength in percent.
    pub strength: f64,
    /// Stamp diameter in pixels.
    pub size: f64,
    /// Falloff hardness (0 = soft, 1 = flat).
    pub hardness: f64,
    /// Stamp spacing as a fraction of `size`.
    pub spacing: f64,
    pub behavior: Behavior,
}

impl Default for WarpParams {
    fn default() -> Self {
        Self {
            strength: 50.0,
            size: 40.0,
            hardness: 0.5,
            spacing: 0.01,
            behavior: Behavior::Move,
        }
    }
}

impl WarpParams {
    /// Distance between stamps in pixels.
    pub fn stamp_spacing(&self) -> f64 {
        (self.size * self.spacing).max(0.5)
    }
}

/// Cache lifecycle of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No field has been computed yet.
    Empty,
    /// The cached field matches a prefix of the live stroke.
    Valid,
    /// The live stroke no longer starts with the processed points; the
    /// cache is dropped on the next pass.
    Stale,
}

/// A stamp that changed the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampRecord {
    pub x: f32,
    pub y: f32,
    /// Pixels written by the stamp.
    pub area: Rectangle,
}

/// What one `process` call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeReport {
    /// Stroke points consumed.
    pub points: usize,
    /// Stamp positions visited, including skipped ones.
    pub stamps: usize,
    /// Stamps that modified the field.
    pub applied: Vec<StampRecord>,
    /// Union of all pixels written.
    pub region: Option<Rectangle>,
}

impl StrokeReport {
    fn record(&mut self, x: f32, y: f32, area: Rectangle) {
        self.region = Some(match self.region {
            Some(region) => region.union(&area),
            None => area,
        });
        self.applied.push(StampRecord { x, y, area });
    }
}

/// Applies strokes to a cached field, reusing the work of earlier calls.
#[derive(Debug, Default)]
pub struct StrokeProcessor {
    lut: Option<FalloffLut>,
    cache: Option<SharedBuffer>,
    history: StrokeHistory,
    /// Set when an assigned stroke diverged from the history.
    diverged: bool,
    /// Position of the last stamp.
    last: (f32, f32),
}

impl StrokeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CacheState {
        match (&self.cache, self.diverged) {
            (None, _) => CacheState::Empty,
            (Some(_), true) => CacheState::Stale,
            (Some(_), false) => CacheState::Valid,
        }
    }

    /// The cached field, if any.
    pub fn cached(&self) -> Option<&SharedBuffer> {
        self.cache.as_ref()
    }

    /// Points applied to the cached field.
    pub fn history(&self) -> &StrokeHistory {
        &self.history
    }

    /// Drop the cached field and the history.
    pub fn clear_cache(&mut self) {
        if self.cache.take().is_some() {
            log::debug!("Dropped cached warp field ({} points)", self.history.len());
        }
        self.history.clear();
        self.diverged = false;
    }

    /// Drop everything derived from the stamp parameters.
    pub fn reset(&mut self) {
        self.clear_cache();
        self.lut = None;
    }

    /// The live stroke was replaced by `stroke`.
    ///
    /// An extension keeps the cache valid; an edit marks it stale.
    pub fn stroke_changed(&mut self, stroke: &Stroke) {
        self.diverged = self.history.check(stroke) == HistoryCheck::Diverged;
    }

    /// Check the history against `stroke` and build the falloff table.
    pub fn prepare(&mut self, stroke: &Stroke, params: &WarpParams) {
        match self.history.check(stroke) {
            HistoryCheck::Diverged => {
                log::debug!("Stroke no longer extends the processed history, starting over");
                self.clear_cache();
            }
            HistoryCheck::Extended { remaining } => {
                log::trace!("Stroke extended by {} point(s)", remaining);
            }
            HistoryCheck::Unchanged => {}
        }

        if self.lut.is_none() {
            self.lut = Some(FalloffLut::new(params.size, params.hardness));
        }
    }

    /// Apply the unprocessed part of `stroke` and return the resulting field.
    ///
    /// The returned buffer is shared with the cache; writers must fork it.
    pub fn process(
        &mut self,
        ctx: &ProcessContext,
        input: &SharedBuffer,
        stroke: &Stroke,
        params: &WarpParams,
    ) -> OperationResult<(SharedBuffer, StrokeReport)> {
        self.prepare(stroke, params);

        let remaining = self.history.remaining(stroke);
        let mut report = StrokeReport::default();

        if remaining.is_empty() || params.strength == 0.0 {
            let output = self.cache.clone().unwrap_or_else(|| input.clone());
            return Ok((output, report));
        }

        let lut = self
            .lut
            .get_or_insert_with(|| FalloffLut::new(params.size, params.hardness));
        let cache = self.cache.get_or_insert_with(|| {
            log::debug!("Caching warp field over {}", input.extent());
            Arc::new(input.dup())
        });

        let mut prev = match self.history.points().last() {
            Some(_) => PathPoint::new(self.last.0 as f64, self.last.1 as f64),
            None => {
                let first = remaining[0];
                self.last = (first.x as f32, first.y as f32);
                first
            }
        };

        // Working area: every remaining point plus the previous position,
        // grown by the stamp radius and one pixel of slack.
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (prev.x, prev.x, prev.y, prev.y);
        for point in remaining {
            min_x = min_x.min(point.x);
            max_x = max_x.max(point.x);
            min_y = min_y.min(point.y);
            max_y = max_y.max(point.y);
        }
        let half = params.size / 2.0;
        let x0 = (min_x - half).floor() as i32 - 1;
        let y0 = (min_y - half).floor() as i32 - 1;
        let bounds = Rectangle::new(
            x0,
            y0,
            (max_x + half).ceil() as i32 + 1 - x0,
            (max_y + half).ceil() as i32 + 1 - y0,
        );

        report.points = remaining.len();

        let Some(extent) = bounds.intersect(&cache.extent()) else {
            // Entirely outside the field: bookkeeping only
            if let Some(last) = remaining.last() {
                self.last = (last.x as f32, last.y as f32);
            }
            self.history.append(remaining);
            log::trace!("Stroke remainder lies outside {}, nothing stamped", cache.extent());
            return Ok((cache.clone(), report));
        };

        let mut work = WorkArea::read(cache, extent)?;
        let kernel = StampKernel {
            lut,
            behavior: params.behavior,
            strength: params.strength as f32,
            size: params.size as f32,
            distributor: ctx.distributor(),
            pixels_per_thread: ctx.config().pixels_per_thread,
        };

        let spacing = params.stamp_spacing();
        let total = remaining.len();

        for (index, next) in remaining.iter().enumerate() {
            let dist = prev.distance(next);
            let stamps = (dist / spacing).floor() as usize + 1;

            // The last stamp of each segment lands exactly on `next`
            for i in 0..stamps {
                let point = if stamps == 1 {
                    *next
                } else {
                    let t = 1.0 - ((stamps - i - 1) as f64 * spacing) / dist;
                    prev.lerp(next, t)
                };
                let (x, y) = (point.x as f32, point.y as f32);
                report.stamps += 1;

                let motion = (self.last.0 - x, self.last.1 - y);
                self.last = (x, y);
                if params.behavior == Behavior::Move && motion == (0.0, 0.0) {
                    continue;
                }

                if let Some(area) = kernel.apply(&mut work, x, y, motion) {
                    report.record(x, y, area);
                }
            }

            prev = *next;
            ctx.set_progress((index + 1) as f32 / total as f32);
        }

        work.write_back(Arc::make_mut(cache))?;
        self.history.append(remaining);

        log::debug!(
            "Warp stamped {} of {} positions for {} point(s), region {:?}",
            report.applied.len(),
            report.stamps,
            report.points,
            report.region
        );

        Ok((cache.clone(), report))
    }
}
