//! Fork-join distribution of work over the rayon thread pool.
//!
//! The `Distributor` decides how many workers a job is worth, splits a 1D
//! range, a set of buffer rows or a rectangle into that many near-equal
//! parts, runs them on rayon and joins before returning. There is no
//! suspension point other than the join; callers read their input in bulk
//! before distributing and write results in bulk afterwards.

use crate::core::config::ComputeConfig;
use crate::core::rect::Rectangle;
use rayon::prelude::*;

/// How a rectangle is cut into per-worker areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitStrategy {
    /// Cut across the longer dimension
    #[default]
    Auto,
    /// Horizontal bands (full width, split rows)
    Horizontal,
    /// Vertical bands (full height, split columns)
    Vertical,
}

/// Partitions index ranges and areas across worker threads.
#[derive(Debug, Clone, Copy)]
pub struct Distributor {
    max_threads: usize,
}

/// Start of part `i` out of `n` when splitting `size` elements.
fn part_offset(i: usize, n: usize, size: usize) -> usize {
    (2 * i * size + n) / (2 * n)
}

impl Distributor {
    /// Create a distributor using at most `threads` workers (0 = pool size).
    pub fn new(threads: usize) -> Self {
        let max_threads = if threads == 0 {
            rayon::current_num_threads()
        } else {
            threads
        };
        Self {
            max_threads: max_threads.max(1),
        }
    }

    /// Create a distributor honoring `config.threads`.
    pub fn from_config(config: &ComputeConfig) -> Self {
        Self::new(config.threads)
    }

    /// Maximum number of workers a job is split into.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Worker count minimizing `n_elements / n + thread_cost * n`.
    ///
    /// A non-positive cost means every element is worth its own worker.
    pub fn optimal_threads(&self, n_elements: f64, thread_cost: f64) -> usize {
        if n_elements > 0.0 && thread_cost > 0.0 {
            let n = n_elements;
            let c = thread_cost;
            let threads = ((c + (c * (c + 4.0 * n)).sqrt()) / (2.0 * c)).floor() as usize;
            threads.clamp(1, self.max_threads)
        } else if n_elements > 0.0 {
            (n_elements as usize).clamp(0, self.max_threads)
        } else {
            0
        }
    }

    /// Run `func(i, n)` for every `i < n`, with `n = min(max_n, max_threads)`.
    pub fn distribute<F>(&self, max_n: usize, func: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        let n = max_n.min(self.max_threads);
        match n {
            0 => {}
            1 => func(0, 1),
            _ => (0..n).into_par_iter().for_each(|i| func(i, n)),
        }
    }

    /// Split `[0, size)` into near-equal ranges and run `func(offset, len)` on each.
    pub fn distribute_range<F>(&self, size: usize, thread_cost: f64, func: F)
    where
        F: Fn(usize, usize) + Sync,
    {
        if size == 0 {
            return;
        }

        let n = self.optimal_threads(size as f64, thread_cost).min(size);
        if n <= 1 {
            func(0, size);
            return;
        }

        self.distribute(n, |i, n| {
            let offset = part_offset(i, n, size);
            let end = part_offset(i + 1, n, size);
            func(offset, end - offset);
        });
    }

    /// Split the rows of a flat row-major buffer into disjoint bands and run
    /// `func(first_row, band)` on each; `band` holds whole rows.
    ///
    /// `thread_cost` is expressed in rows.
    pub fn distribute_rows<T, F>(&self, data: &mut [T], row_len: usize, thread_cost: f64, func: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        if row_len == 0 || data.is_empty() {
            return;
        }

        let rows = data.len() / row_len;
        let n = self.optimal_threads(rows as f64, thread_cost).min(rows);
        if n <= 1 {
            func(0, &mut data[..rows * row_len]);
            return;
        }

        let mut bands = Vec::with_capacity(n);
        let mut rest = &mut data[..rows * row_len];
        for i in 0..n {
            let first = part_offset(i, n, rows);
            let count = part_offset(i + 1, n, rows) - first;
            let (band, tail) = rest.split_at_mut(count * row_len);
            bands.push((first, band));
            rest = tail;
        }

        bands
            .into_par_iter()
            .for_each(|(first, band)| func(first, band));
    }

    /// Cut `area` into per-worker sub-areas covering it exactly.
    pub fn split_area(
        &self,
        area: &Rectangle,
        thread_cost: f64,
        strategy: SplitStrategy,
    ) -> Vec<Rectangle> {
        if area.is_empty() {
            return Vec::new();
        }

        let strategy = match strategy {
            SplitStrategy::Auto if area.width > area.height => SplitStrategy::Vertical,
            SplitStrategy::Auto => SplitStrategy::Horizontal,
            other => other,
        };

        let n = self.optimal_threads(area.area() as f64, thread_cost);
        let n = match strategy {
            SplitStrategy::Vertical => n.min(area.width as usize),
            _ => n.min(area.height as usize),
        }
        .max(1);

        (0..n)
            .map(|i| match strategy {
                SplitStrategy::Vertical => {
                    let x0 = part_offset(i, n, area.width as usize) as i32;
                    let x1 = part_offset(i + 1, n, area.width as usize) as i32;
                    Rectangle::new(area.x + x0, area.y, x1 - x0, area.height)
                }
                _ => {
                    let y0 = part_offset(i, n, area.height as usize) as i32;
                    let y1 = part_offset(i + 1, n, area.height as usize) as i32;
                    Rectangle::new(area.x, area.y + y0, area.width, y1 - y0)
                }
            })
            .collect()
    }

    /// Run `func` on every sub-area of `area` and collect the results in order.
    pub fn map_area<R, F>(
        &self,
        area: &Rectangle,
        thread_cost: f64,
        strategy: SplitStrategy,
        func: F,
    ) -> Vec<R>
    where
        R: Send,
        F: Fn(Rectangle) -> R + Sync,
    {
        let parts = self.split_area(area, thread_cost, strategy);
        if parts.len() <= 1 {
            return parts.into_iter().map(func).collect();
        }
        parts.into_par_iter().map(&func).collect()
    }
}

impl Default for Distributor {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_optimal_threads() {
        let distributor = Distributor::new(8);

        assert_eq!(distributor.optimal_threads(0.0, 4096.0), 0);
        // Too little work to be worth a second thread
        assert_eq!(distributor.optimal_threads(100.0, 4096.0), 1);
        // 4096 * 4096 pixels at 4096 per thread saturates the cap
        assert_eq!(distributor.optimal_threads(4096.0 * 4096.0, 4096.0), 8);
        // No cost: one element per worker up to the cap
        assert_eq!(distributor.optimal_threads(3.0, 0.0), 3);
    }

    #[test]
    fn test_distribute_range_covers_everything_once() {
        let distributor = Distributor::new(4);
        let parts = Mutex::new(Vec::new());

        distributor.distribute_range(1001, 1.0, |offset, len| {
            parts.lock().push((offset, len));
        });

        let mut parts = parts.into_inner();
        parts.sort();
        assert_eq!(parts.len(), 4);
        let mut next = 0;
        for (offset, len) in parts {
            assert_eq!(offset, next);
            next += len;
        }
        assert_eq!(next, 1001);
    }

    #[test]
    fn test_distribute_rows_disjoint_bands() {
        let distributor = Distributor::new(3);
        let mut data = vec![0usize; 10 * 4];

        distributor.distribute_rows(&mut data, 4, 1.0, |first_row, band| {
            for (i, row) in band.chunks_mut(4).enumerate() {
                row.fill(first_row + i);
            }
        });

        for (row, chunk) in data.chunks(4).enumerate() {
            assert!(chunk.iter().all(|&v| v == row));
        }
    }

    #[test]
    fn test_split_area_tiles_the_rectangle() {
        let distributor = Distributor::new(4);
        let area = Rectangle::new(-3, 5, 200, 50);
        let parts = distributor.split_area(&area, 64.0, SplitStrategy::Auto);

        assert_eq!(parts.len(), 4);
        assert!(parts.iter().all(|p| p.height == 50));
        assert_eq!(parts.iter().map(|p| p.area()).sum::<usize>(), area.area());
        assert_eq!(parts[0].x, -3);
        assert_eq!(parts[3].right(), area.right());
    }

    #[test]
    fn test_map_area_preserves_order() {
        let distributor = Distributor::new(4);
        let area = Rectangle::new(0, 0, 8, 64);
        let tops = distributor.map_area(&area, 1.0, SplitStrategy::Horizontal, |r| r.y);

        assert!(tops.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_map_area_reads_shared_data() {
        let distributor = Distributor::new(4);
        let area = Rectangle::new(0, 0, 16, 64);
        let pixels: Vec<f32> = (0..area.area()).map(|i| i as f32).collect();

        let sums = distributor.map_area(&area, 16.0, SplitStrategy::Horizontal, |part| {
            let start = (part.y * area.width) as usize;
            pixels[start..start + part.area()].iter().sum::<f32>()
        });

        assert!(sums.len() > 1);
        assert_eq!(sums.iter().sum::<f32>(), pixels.iter().sum::<f32>());
    }
}
