//! The warp stamp kernel and its padded working area.
//!
//! A stroke is applied by stamping a radial kernel at evenly spaced points.
//! All stamps of one processing call work on a single `WorkArea`: a copy of
//! the cached displacement field covering the stroke's bounding box, read
//! in bulk before stamping and written back in bulk afterwards.

use crate::core::buffer::{Buffer, BufferAccess};
use crate::core::error::OperationResult;
use crate::core::format::{AbyssPolicy, PixelFormat};
use crate::core::parallel::Distributor;
use crate::core::rect::{pixel_range, Rectangle};
use crate::core::view::PixelView;
use crate::operations::warp::lut::FalloffLut;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// How a stamp changes the displacement field under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Behavior {
    /// Drag pixels along with the stroke
    #[default]
    Move,
    /// Push pixels away from the stamp center
    Grow,
    /// Pull pixels towards the stamp center
    Shrink,
    /// Rotate clockwise around the stamp center
    SwirlCw,
    /// Rotate counter-clockwise around the stamp center
    SwirlCcw,
    /// Fade the displacement out
    Erase,
    /// Blend towards the mean displacement under the stamp
    Smooth,
}

impl Behavior {
    /// All behaviors, in declaration order.
    pub const ALL: [Behavior; 7] = [
        Behavior::Move,
        Behavior::Grow,
        Behavior::Shrink,
        Behavior::SwirlCw,
        Behavior::SwirlCcw,
        Behavior::Erase,
        Behavior::Smooth,
    ];

    /// Choice name of this behavior.
    pub fn name(&self) -> &'static str {
        match self {
            Behavior::Move => "move",
            Behavior::Grow => "grow",
            Behavior::Shrink => "shrink",
            Behavior::SwirlCw => "swirl-cw",
            Behavior::SwirlCcw => "swirl-ccw",
            Behavior::Erase => "erase",
            Behavior::Smooth => "smooth",
        }
    }

    /// Look a behavior up by its choice name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    /// Choice names of all behaviors.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Behavior::name).collect()
    }
}

/// A rectangle of the displacement field copied out for stamping.
///
/// The data is padded at the back by one row plus one pixel of `(0, 0)`
/// vectors, so bilinear sampling at the right and bottom edges may read one
/// texel past the extent without a bounds check.
#[derive(Debug, Clone)]
pub struct WorkArea {
    extent: Rectangle,
    stride: usize,
    data: Vec<f32>,
}

impl WorkArea {
    /// Copy `extent` out of `buffer`; pixels outside the buffer read as zero.
    pub fn read(buffer: &Buffer, extent: Rectangle) -> OperationResult<Self> {
        let stride = 2 * extent.width.max(0) as usize;
        let mut data = buffer.get(&extent, PixelFormat::vector2(), AbyssPolicy::None)?;
        data.resize(data.len() + stride + 2, 0.0);
        Ok(Self {
            extent,
            stride,
            data,
        })
    }

    /// Write the area back into `buffer` at the same extent.
    pub fn write_back(&self, buffer: &mut Buffer) -> OperationResult<()> {
        let len = self.extent.area() * 2;
        buffer.set(&self.extent, PixelFormat::vector2(), &self.data[..len])
    }

    pub fn extent(&self) -> Rectangle {
        self.extent
    }

    /// Vector at `(col, row)` relative to the area's origin.
    ///
    /// Positions up to one row plus one pixel past the end read the padding.
    pub fn texel(&self, col: usize, row: usize) -> [f32; 2] {
        let at = row * self.stride + 2 * col;
        [self.data[at], self.data[at + 1]]
    }

    /// View over the area, without the padding.
    pub fn view(&self) -> PixelView<'_> {
        PixelView::new(
            &self.data[..self.extent.area() * 2],
            self.extent.width.max(0) as usize,
            self.extent.height.max(0) as usize,
            2,
        )
    }

    /// Bilinear sample at integer position `(dx, dy)` plus fractional weights.
    fn bilinear(&self, dx: usize, dy: usize, weight_x: f32, weight_y: f32) -> [f32; 2] {
        let p = dy * self.stride + 2 * dx;
        let s = self.stride;
        let d = &self.data;

        let a0 = d[p] + (d[p + 2] - d[p]) * weight_x;
        let b0 = d[p + s] + (d[p + s + 2] - d[p + s]) * weight_x;
        let a1 = d[p + 1] + (d[p + 3] - d[p + 1]) * weight_x;
        let b1 = d[p + s + 1] + (d[p + s + 3] - d[p + s + 1]) * weight_x;

        [a0 + (b0 - a0) * weight_y, a1 + (b1 - a1) * weight_y]
    }
}

/// Covered columns of one stamp row, relative to the stamped area.
#[derive(Debug, Clone, Copy)]
struct RowSpan {
    min_x: usize,
    max_x: usize,
    /// Vertical offset of the row's pixel centers from the stamp center.
    yi: f32,
}

/// Columns of row `row` whose centers lie within the stamp radius.
fn row_span(cx: f32, cy: f32, row: usize, width: usize, radius_sq: f32) -> Option<RowSpan> {
    let yi = -cy + row as f32 + 0.5;
    let lim = radius_sq - yi * yi;
    if lim < 0.0 {
        return None;
    }
    let lim = lim.sqrt();

    let (min_x, max_x) = pixel_range(cx - lim, cx + lim);
    if max_x < 0 || min_x >= width as i32 || max_x < min_x {
        return None;
    }

    let last = width as i32 - 1;
    Some(RowSpan {
        min_x: min_x.clamp(0, last) as usize,
        max_x: max_x.clamp(0, last) as usize,
        yi,
    })
}

/// One stamp configuration, shared by every stamp of a processing call.
pub struct StampKernel<'a> {
    pub lut: &'a FalloffLut,
    pub behavior: Behavior,
    /// Strength in percent (0..100).
    pub strength: f32,
    /// Stamp diameter in pixels.
    pub size: f32,
    pub distributor: &'a Distributor,
    pub pixels_per_thread: f64,
}

impl StampKernel<'_> {
    /// Stamp at `(x, y)` into `work`, with `motion` the offset from the
    /// previous stamp to this one (reversed).
    ///
    /// Returns the pixels written, or `None` when the stamp covers no pixel
    /// of the working area.
    pub fn apply(&self, work: &mut WorkArea, x: f32, y: f32, motion: (f32, f32)) -> Option<Rectangle> {
        let half = self.size / 2.0;
        let area = Rectangle::pixel_extent(x - half, x + half, y - half, y + half)
            .intersect(&work.extent)?;

        // Stamp center relative to the stamped area
        let cx = x - area.x as f32;
        let cy = y - area.y as f32;
        // Stamped area relative to the working area
        let ox = (area.x - work.extent.x) as usize;
        let oy = (area.y - work.extent.y) as usize;
        let aw = area.width as usize;
        let ah = area.height as usize;

        let radius_sq = 0.25 * self.size * self.size;
        let spans: Vec<Option<RowSpan>> =
            (0..ah).map(|row| row_span(cx, cy, row, aw, radius_sq)).collect();
        let touched = Self::touched(&spans, &area)?;

        let row_cost = self.pixels_per_thread / aw as f64;

        let mut strength = 0.01 * self.strength;
        let mut mean = (0.0f32, 0.0f32);
        let (mut s, mut c) = (0.0f32, 0.0f32);
        match self.behavior {
            Behavior::Smooth => mean = self.mean(work, &spans, cx, ox, oy, row_cost),
            Behavior::Grow | Behavior::Shrink => {
                strength *= 0.1;
                if self.behavior == Behavior::Grow {
                    strength = -strength;
                }
            }
            Behavior::SwirlCw | Behavior::SwirlCcw => {
                // 5 degrees per stamp at full strength
                let angle = (0.01 * self.strength as f64 * 5.0).to_radians();
                s = angle.sin() as f32;
                c = (angle.cos() - 1.0) as f32;
                if self.behavior == Behavior::SwirlCw {
                    s = -s;
                }
            }
            Behavior::Move | Behavior::Erase => {}
        }

        // Sample bounds, relative to the stamped area
        let min_sx = -(ox as i32);
        let max_sx = -(ox as i32) + work.extent.width - 1;
        let min_sy = -(oy as i32);
        let max_sy = -(oy as i32) + work.extent.height - 1;

        // Render into a separate buffer first; neighbors are still sampled
        // from the unmodified field.
        let mut stampbuf = vec![0.0f32; 2 * aw * ah];
        let source = &*work;
        let behavior = self.behavior;
        let lut = self.lut;

        self.distributor
            .distribute_rows(&mut stampbuf, 2 * aw, row_cost, |first_row, band| {
                for (i, vals) in band.chunks_exact_mut(2 * aw).enumerate() {
                    let row = first_row + i;
                    let Some(span) = spans[row] else {
                        continue;
                    };
                    let yi = span.yi;
                    let mut xi = -cx + span.min_x as f32 + 0.5;

                    for col in span.min_x..=span.max_x {
                        let src = source.texel(ox + col, oy + row);
                        let force = lut.force(xi, yi);
                        let influence = strength * force;

                        let out = match behavior {
                            Behavior::Erase => {
                                let keep = 1.0 - influence.min(1.0);
                                [src[0] * keep, src[1] * keep]
                            }
                            Behavior::Smooth => [
                                src[0] + influence * (mean.0 - src[0]),
                                src[1] + influence * (mean.1 - src[1]),
                            ],
                            _ => {
                                let (nvx, nvy) = match behavior {
                                    Behavior::Move => (influence * motion.0, influence * motion.1),
                                    Behavior::Grow | Behavior::Shrink => {
                                        (influence * xi, influence * yi)
                                    }
                                    _ => (force * (c * xi - s * yi), force * (s * xi + c * yi)),
                                };

                                let fx = nvx.floor();
                                let fy = nvy.floor();
                                let mut weight_x = nvx - fx;
                                let mut weight_y = nvy - fy;
                                let mut dx = (fx as i32).saturating_add(col as i32);
                                let mut dy = (fy as i32).saturating_add(row as i32);

                                // Clamp the sampled position to the working area
                                if dx < min_sx {
                                    dx = min_sx;
                                    weight_x = 0.0;
                                } else if dx >= max_sx {
                                    dx = max_sx;
                                    weight_x = 0.0;
                                }
                                if dy < min_sy {
                                    dy = min_sy;
                                    weight_y = 0.0;
                                } else if dy >= max_sy {
                                    dy = max_sy;
                                    weight_y = 0.0;
                                }

                                let sampled = source.bilinear(
                                    (dx + ox as i32) as usize,
                                    (dy + oy as i32) as usize,
                                    weight_x,
                                    weight_y,
                                );
                                [sampled[0] + nvx, sampled[1] + nvy]
                            }
                        };

                        vals[2 * col..2 * col + 2].copy_from_slice(&out);
                        xi += 1.0;
                    }
                }
            });

        // Paste the stamp into the working area
        let stride = work.stride;
        let rows = &mut work.data[oy * stride..(oy + ah) * stride];
        let stamped = &stampbuf;
        self.distributor
            .distribute_rows(rows, stride, row_cost, |first_row, band| {
                for (i, dst) in band.chunks_exact_mut(stride).enumerate() {
                    let row = first_row + i;
                    if let Some(span) = spans[row] {
                        let src = 2 * aw * row;
                        let len = 2 * (span.max_x - span.min_x + 1);
                        let from = src + 2 * span.min_x;
                        let to = 2 * (ox + span.min_x);
                        dst[to..to + len].copy_from_slice(&stamped[from..from + len]);
                    }
                }
            });

        Some(touched)
    }

    /// Bounding rectangle of the covered spans, in buffer coordinates.
    fn touched(spans: &[Option<RowSpan>], area: &Rectangle) -> Option<Rectangle> {
        let mut covered = spans
            .iter()
            .enumerate()
            .filter_map(|(row, span)| span.map(|s| (row, s)));
        let (first, span) = covered.next()?;
        let (mut min_x, mut max_x, mut last) = (span.min_x, span.max_x, first);
        for (row, span) in covered {
            min_x = min_x.min(span.min_x);
            max_x = max_x.max(span.max_x);
            last = row;
        }
        Some(Rectangle::new(
            area.x + min_x as i32,
            area.y + first as i32,
            (max_x - min_x + 1) as i32,
            (last - first + 1) as i32,
        ))
    }

    /// Force-weighted mean vector under the stamp.
    fn mean(
        &self,
        work: &WorkArea,
        spans: &[Option<RowSpan>],
        cx: f32,
        ox: usize,
        oy: usize,
        row_cost: f64,
    ) -> (f32, f32) {
        let partials = Mutex::new(Vec::new());

        self.distributor.distribute_range(spans.len(), row_cost, |y0, height| {
            let (mut sum_x, mut sum_y, mut weight) = (0.0f32, 0.0f32, 0.0f32);
            for (row, span) in spans.iter().enumerate().skip(y0).take(height) {
                let Some(span) = span else {
                    continue;
                };
                let mut xi = -cx + span.min_x as f32 + 0.5;
                for col in span.min_x..=span.max_x {
                    let force = self.lut.force(xi, span.yi);
                    let v = work.texel(ox + col, oy + row);
                    sum_x += force * v[0];
                    sum_y += force * v[1];
                    weight += force;
                    xi += 1.0;
                }
            }
            partials.lock().push((y0, sum_x, sum_y, weight));
        });

        // Sum in row order so the result does not depend on scheduling
        let mut partials = partials.into_inner();
        partials.sort_by_key(|p| p.0);
        let (sum_x, sum_y, weight) = partials
            .iter()
            .fold((0.0f32, 0.0f32, 0.0f32), |acc, p| (acc.0 + p.1, acc.1 + p.2, acc.2 + p.3));

        if weight > 0.0 {
            (sum_x / weight, sum_y / weight)
        } else {
            (0.0, 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel<'a>(lut: &'a FalloffLut, distributor: &'a Distributor, behavior: Behavior) -> StampKernel<'a> {
        StampKernel {
            lut,
            behavior,
            strength: 50.0,
            size: 4.0,
            distributor,
            pixels_per_thread: 4096.0,
        }
    }

    fn field(extent: Rectangle, value: [f32; 2]) -> Buffer {
        let data: Vec<f32> = (0..extent.area()).flat_map(|_| value).collect();
        Buffer::from_data(extent, PixelFormat::vector2(), &data).unwrap()
    }

    #[test]
    fn test_behavior_names() {
        assert_eq!(Behavior::from_name("swirl-ccw"), Some(Behavior::SwirlCcw));
        assert_eq!(Behavior::from_name("twist"), None);
        assert_eq!(Behavior::names().len(), 7);
        for behavior in Behavior::ALL {
            assert_eq!(Behavior::from_name(behavior.name()), Some(behavior));
        }
    }

    #[test]
    fn test_padding_reads_zero_vectors() {
        let extent = Rectangle::new(0, 0, 3, 2);
        let work = WorkArea::read(&field(extent, [1.0, 1.0]), extent).unwrap();

        assert_eq!(work.texel(2, 1), [1.0, 1.0]);
        // One row plus one pixel past the last texel
        assert_eq!(work.texel(3, 1), [0.0, 0.0]);
        assert_eq!(work.texel(0, 2), [0.0, 0.0]);
        assert_eq!(work.texel(3, 2), [0.0, 0.0]);
        assert_eq!(work.view().height(), 2);
    }

    #[test]
    fn test_move_stamp_stays_inside_footprint() {
        let extent = Rectangle::new(0, 0, 20, 20);
        let buffer = field(extent, [0.0, 0.0]);
        let mut work = WorkArea::read(&buffer, extent).unwrap();
        let lut = FalloffLut::new(4.0, 0.5);
        let distributor = Distributor::new(2);

        let touched = kernel(&lut, &distributor, Behavior::Move)
            .apply(&mut work, 10.0, 10.0, (-5.0, 0.0))
            .unwrap();

        assert!(touched.x >= 8 && touched.right() <= 12);
        assert!(touched.y >= 8 && touched.bottom() <= 12);

        let view = work.view();
        for y in 0..20 {
            for x in 0..20 {
                let v = view.pixel(x, y);
                if v != [0.0, 0.0] {
                    assert!(touched.contains_point(x as i32, y as i32));
                    // Displacement points back along the motion
                    assert!(v[0] < 0.0);
                    assert_eq!(v[1], 0.0);
                }
            }
        }
        assert_ne!(view.pixel(10, 10), &[0.0, 0.0]);
    }

    #[test]
    fn test_stamp_outside_area_does_nothing() {
        let extent = Rectangle::new(0, 0, 10, 10);
        let mut work = WorkArea::read(&field(extent, [0.0, 0.0]), extent).unwrap();
        let lut = FalloffLut::new(4.0, 0.5);
        let distributor = Distributor::new(1);

        let touched = kernel(&lut, &distributor, Behavior::Grow).apply(&mut work, 50.0, 50.0, (0.0, 0.0));
        assert!(touched.is_none());
    }

    #[test]
    fn test_stamp_at_edge_samples_padding_safely() {
        // A stamp hanging over the bottom-right corner, sampling outwards
        let extent = Rectangle::new(0, 0, 6, 6);
        let mut work = WorkArea::read(&field(extent, [1.0, -1.0]), extent).unwrap();
        let lut = FalloffLut::new(4.0, 1.0);
        let distributor = Distributor::new(1);
        let mut stamp = kernel(&lut, &distributor, Behavior::Move);
        stamp.strength = 100.0;

        let touched = stamp.apply(&mut work, 6.0, 6.0, (3.0, 3.0)).unwrap();
        assert_eq!(touched, Rectangle::new(4, 4, 2, 2));
        for value in work.view().data() {
            assert!(value.is_finite());
        }
        // Sampling was clamped to the edge texel with zero weight
        assert_eq!(work.texel(5, 5), [1.0 + 3.0, -1.0 + 3.0]);
    }

    #[test]
    fn test_erase_fades_displacement() {
        let extent = Rectangle::new(0, 0, 10, 10);
        let mut work = WorkArea::read(&field(extent, [2.0, 2.0]), extent).unwrap();
        let lut = FalloffLut::new(4.0, 1.0);
        let distributor = Distributor::new(1);
        let mut stamp = kernel(&lut, &distributor, Behavior::Erase);
        stamp.strength = 100.0;

        stamp.apply(&mut work, 5.0, 5.0, (0.0, 0.0)).unwrap();
        assert_eq!(work.texel(5, 5), [0.0, 0.0]);
        assert_eq!(work.texel(0, 0), [2.0, 2.0]);
    }

    #[test]
    fn test_smooth_pulls_towards_mean() {
        let extent = Rectangle::new(0, 0, 10, 10);
        let mut data = vec![0.0f32; extent.area() * 2];
        // One displaced pixel under the stamp
        data[2 * (5 * 10 + 5)] = 4.0;
        let buffer = Buffer::from_data(extent, PixelFormat::vector2(), &data).unwrap();
        let mut work = WorkArea::read(&buffer, extent).unwrap();
        let lut = FalloffLut::new(4.0, 1.0);
        let distributor = Distributor::new(2);
        let mut stamp = kernel(&lut, &distributor, Behavior::Smooth);
        stamp.strength = 100.0;

        stamp.apply(&mut work, 5.0, 5.0, (0.0, 0.0)).unwrap();
        let center = work.texel(5, 5)[0];
        let neighbor = work.texel(4, 5)[0];
        // Flat falloff at full strength replaces everything with the mean
        assert!(center > 0.0 && center < 4.0);
        assert!((center - neighbor).abs() < 1e-6);
        assert!((neighbor - 4.0 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_grow_and_shrink_are_opposite() {
        let extent = Rectangle::new(0, 0, 12, 12);
        let lut = FalloffLut::new(4.0, 0.5);
        let distributor = Distributor::new(1);

        let mut grown = WorkArea::read(&field(extent, [0.0, 0.0]), extent).unwrap();
        kernel(&lut, &distributor, Behavior::Grow).apply(&mut grown, 6.0, 6.0, (0.0, 0.0));
        let mut shrunk = WorkArea::read(&field(extent, [0.0, 0.0]), extent).unwrap();
        kernel(&lut, &distributor, Behavior::Shrink).apply(&mut shrunk, 6.0, 6.0, (0.0, 0.0));

        // Pixel left of center: grow samples from the center side
        let g = grown.texel(5, 6)[0];
        let s = shrunk.texel(5, 6)[0];
        assert!(g > 0.0);
        assert!(s < 0.0);
        assert!((g + s).abs() < 1e-6);
    }
}
