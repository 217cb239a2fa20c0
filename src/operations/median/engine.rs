//! Serpentine sliding-window percentile filter.
//!
//! The window starts at the top-left output pixel, runs right along the
//! first row, steps down, runs left along the second row and so on. Every
//! step only removes the pixels leaving the window and adds the ones
//! entering it, using the outline to find them.

use crate::operations::median::bins::BinnedImage;
use crate::operations::median::histogram::Histogram;
use crate::operations::median::outline::{Neighborhood, Outline};

/// Direction of one window step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
    TopToBottom,
}

/// A window over a binned image, positioned by output coordinates.
///
/// The image must extend `radius` pixels beyond the output on every side:
/// output `(x, y)` is centered on image pixel `(x + radius, y + radius)`.
pub struct SlidingWindow<'a> {
    image: &'a BinnedImage,
    outline: &'a Outline,
    histogram: Histogram,
    x: usize,
    y: usize,
}

impl<'a> SlidingWindow<'a> {
    /// Window at output `(0, 0)`.
    pub fn new(image: &'a BinnedImage, outline: &'a Outline) -> Self {
        Self::at(image, outline, 0, 0)
    }

    /// Window built from scratch at output `(x, y)`.
    pub fn at(image: &'a BinnedImage, outline: &'a Outline, x: usize, y: usize) -> Self {
        let mut window = Self {
            image,
            outline,
            histogram: Histogram::new(image),
            x,
            y,
        };

        let r = outline.radius() as i32;
        for dy in -r..=r {
            let half = outline.half_width(dy.unsigned_abs() as usize);
            window.modify(-half, dy, half, dy, 1);
        }
        window
    }

    pub fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Move the window one pixel and update the histogram.
    pub fn step(&mut self, direction: Direction) {
        match direction {
            Direction::LeftToRight => self.x += 1,
            Direction::RightToLeft => self.x -= 1,
            Direction::TopToBottom => self.y += 1,
        }

        // Offsets of the strip leaving and the strip entering at depth `i`
        let leave = |i: i32| match direction {
            Direction::RightToLeft => i + 1,
            _ => -i - 1,
        };
        let enter = |i: i32| match direction {
            Direction::RightToLeft => -i,
            _ => i,
        };

        let r = self.outline.radius() as i32;
        if self.outline.neighborhood() != Neighborhood::Square {
            for i in 0..r {
                let outer = self.outline.half_width(i as usize);
                let inner = self.outline.half_width(i as usize + 1);

                self.strip(direction, leave(i), -outer, -inner - 1, -1);
                self.strip(direction, leave(i), inner + 1, outer, -1);
                self.strip(direction, enter(i), -outer, -inner - 1, 1);
                self.strip(direction, enter(i), inner + 1, outer, 1);
            }
        }

        let half = self.outline.half_width(r as usize);
        self.strip(direction, leave(r), -half, half, -1);
        self.strip(direction, enter(r), -half, half, 1);
    }

    /// Write the percentiles of the current window into `out`.
    pub fn sample(&mut self, percentile: f64, alpha_percentile: f64, out: &mut [f32]) {
        let n_color = self.image.n_color_components();
        for (c, value) in out.iter_mut().enumerate() {
            let p = if c < n_color {
                percentile
            } else {
                alpha_percentile
            };
            *value = self.histogram.percentile(self.image, c, p);
        }
    }

    /// Column (horizontal moves) or row (vertical moves) `at`, spanning
    /// `from..=to` across it.
    fn strip(&mut self, direction: Direction, at: i32, from: i32, to: i32, diff: i64) {
        match direction {
            Direction::TopToBottom => self.modify(from, at, to, at, diff),
            _ => self.modify(at, from, at, to, diff),
        }
    }

    /// Add or remove the pixels of the offset rectangle `[x0, x1] x [y0, y1]`.
    fn modify(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, diff: i64) {
        if x0 > x1 || y0 > y1 {
            return;
        }

        let r = self.outline.radius() as i32;
        let cx = (self.x as i32) + r;
        let cy = (self.y as i32) + r;
        let count = (x1 - x0 + 1) as usize;

        for dy in y0..=y1 {
            let pixels = self
                .image
                .span((cx + x0) as usize, (cy + dy) as usize, count);
            self.histogram.modify_span(self.image, pixels, diff);
        }
    }
}

/// Filter a `width` x `height` output from `image`.
///
/// Returns the percentile of every output pixel, row-major, with the
/// image's component layout.
pub fn filter(
    image: &BinnedImage,
    outline: &Outline,
    width: usize,
    height: usize,
    percentile: f64,
    alpha_percentile: f64,
) -> Vec<f32> {
    let n = image.n_components();
    let mut out = vec![0.0f32; width * height * n];
    if width == 0 || height == 0 {
        return out;
    }

    let mut window = SlidingWindow::new(image, outline);
    window.sample(percentile, alpha_percentile, &mut out[..n]);

    let mut direction = Direction::LeftToRight;
    for _ in 1..width * height {
        let (x, _) = window.position();
        direction = match direction {
            Direction::LeftToRight if x + 1 < width => Direction::LeftToRight,
            Direction::RightToLeft if x > 0 => Direction::RightToLeft,
            Direction::TopToBottom if x == 0 => Direction::LeftToRight,
            Direction::TopToBottom => Direction::RightToLeft,
            _ => Direction::TopToBottom,
        };
        // A one-column output never turns
        if direction != Direction::TopToBottom && width == 1 {
            direction = Direction::TopToBottom;
        }

        window.step(direction);
        let (x, y) = window.position();
        let at = (y * width + x) * n;
        window.sample(percentile, alpha_percentile, &mut out[at..at + n]);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Vec<f32> {
        (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                ((x * 7 + y * 13) % 17) as f32 / 16.0
            })
            .collect()
    }

    #[test]
    fn test_serpentine_never_drifts() {
        let data = gradient(12, 10);
        let image = BinnedImage::new(&data, 12, 10, 1, false, false);

        for neighborhood in Neighborhood::ALL {
            let outline = Outline::new(neighborhood, 2);
            let (width, height) = (8, 6);
            let mut window = SlidingWindow::new(&image, &outline);
            let mut direction = Direction::LeftToRight;

            for _ in 1..width * height {
                let (x, _) = window.position();
                direction = match direction {
                    Direction::LeftToRight if x + 1 < width => Direction::LeftToRight,
                    Direction::RightToLeft if x > 0 => Direction::RightToLeft,
                    Direction::TopToBottom if x == 0 => Direction::LeftToRight,
                    Direction::TopToBottom => Direction::RightToLeft,
                    _ => Direction::TopToBottom,
                };
                window.step(direction);

                let (x, y) = window.position();
                let fresh = SlidingWindow::at(&image, &outline, x, y);
                assert!(
                    window.histogram().same_counts(fresh.histogram()),
                    "{:?} drifted at ({}, {})",
                    neighborhood,
                    x,
                    y
                );
                assert_eq!(window.histogram().size() as usize, outline.window_size());
            }
            assert_eq!(window.position(), (0, height - 1));
        }
    }

    #[test]
    fn test_single_column_output() {
        let data = gradient(3, 6);
        let image = BinnedImage::new(&data, 3, 6, 1, false, true);
        let outline = Outline::new(Neighborhood::Square, 1);

        let out = filter(&image, &outline, 1, 4, 0.5, 0.5);
        assert_eq!(out.len(), 4);
        for (y, &value) in out.iter().enumerate() {
            let fresh_value = {
                let mut fresh = SlidingWindow::at(&image, &outline, 0, y);
                let mut v = [0.0];
                fresh.sample(0.5, 0.5, &mut v);
                v[0]
            };
            assert_eq!(value, fresh_value);
        }
    }

    #[test]
    fn test_radius_zero_is_identity() {
        let data = gradient(5, 4);
        let image = BinnedImage::new(&data, 5, 4, 1, false, false);
        let outline = Outline::new(Neighborhood::Circle, 0);

        assert_eq!(filter(&image, &outline, 5, 4, 0.5, 0.5), data);
    }
}
