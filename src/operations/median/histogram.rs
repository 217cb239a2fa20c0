//! Per-component bin counts with a memoized percentile cursor.

use crate::operations::median::bins::BinnedImage;

/// Bin counts of one component.
///
/// `cursor_sum` is always the sum of `bins[..=cursor]`, so a percentile
/// query only walks as far as the answer moved since the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Component {
    bins: Vec<i64>,
    cursor: usize,
    cursor_sum: i64,
}

impl Component {
    fn new(n_bins: usize) -> Self {
        Self {
            bins: vec![0; n_bins.max(1)],
            cursor: 0,
            cursor_sum: 0,
        }
    }

    #[inline]
    fn add(&mut self, bin: usize, weight: i64) {
        self.bins[bin] += weight;
        if bin <= self.cursor {
            self.cursor_sum += weight;
        }
    }

    /// Smallest bin whose prefix sum reaches `target`.
    fn seek(&mut self, target: i64) -> usize {
        let mut i = self.cursor;
        let mut sum = self.cursor_sum;

        if sum < target {
            while sum < target && i + 1 < self.bins.len() {
                i += 1;
                sum += self.bins[i];
            }
        } else {
            while i > 0 && sum - self.bins[i] >= target {
                sum -= self.bins[i];
                i -= 1;
            }
        }

        self.cursor = i;
        self.cursor_sum = sum;
        i
    }
}

/// Window histogram over all components of a binned image.
///
/// Color components are weighted by the alpha weight of each pixel; the
/// alpha component itself counts every pixel once.
#[derive(Debug, Clone)]
pub struct Histogram {
    components: Vec<Component>,
    n_color_components: usize,
    has_alpha: bool,
    /// Alpha-weighted number of pixels in the window.
    count: i64,
    /// Number of pixels in the window.
    size: i64,
}

impl Histogram {
    /// Empty histogram sized for `image`.
    pub fn new(image: &BinnedImage) -> Self {
        Self {
            components: (0..image.n_components())
                .map(|c| Component::new(image.bin_count(c)))
                .collect(),
            n_color_components: image.n_color_components(),
            has_alpha: image.has_alpha(),
            count: 0,
            size: 0,
        }
    }

    /// Add (`diff = 1`) or remove (`diff = -1`) one pixel.
    #[inline]
    pub fn modify(&mut self, image: &BinnedImage, pixel: &[u32], diff: i64) {
        let n_color = self.n_color_components;
        let weight = if self.has_alpha {
            diff * image.alpha_weight(pixel[n_color])
        } else {
            diff
        };

        for (component, &bin) in self.components[..n_color].iter_mut().zip(pixel) {
            component.add(bin as usize, weight);
        }
        if self.has_alpha {
            self.components[n_color].add(pixel[n_color] as usize, diff);
        }

        self.count += weight;
        self.size += diff;
    }

    /// Add or remove a run of consecutive pixels.
    pub fn modify_span(&mut self, image: &BinnedImage, pixels: &[u32], diff: i64) {
        for pixel in pixels.chunks_exact(image.n_components()) {
            self.modify(image, pixel, diff);
        }
    }

    /// Alpha-weighted pixel count.
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Pixel count.
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Bin counts of component `c`.
    pub fn bins(&self, c: usize) -> &[i64] {
        &self.components[c].bins
    }

    /// Whether both histograms hold the same counts, ignoring cursors.
    pub fn same_counts(&self, other: &Histogram) -> bool {
        self.count == other.count
            && self.size == other.size
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(a, b)| a.bins == b.bins)
    }

    /// Whether every cursor sum matches the actual prefix sum.
    pub fn cursors_consistent(&self) -> bool {
        self.components
            .iter()
            .all(|c| c.bins[..=c.cursor].iter().sum::<i64>() == c.cursor_sum)
    }

    /// Value at `percentile` (0..=1) of component `c`.
    ///
    /// An empty (or fully transparent) window yields 0.
    pub fn percentile(&mut self, image: &BinnedImage, c: usize, percentile: f64) -> f32 {
        let count = if c == self.n_color_components {
            self.size
        } else {
            self.count
        };
        if count <= 0 {
            return 0.0;
        }

        let target = ((count as f64 * percentile).ceil() as i64).max(1);
        let bin = self.components[c].seek(target);
        image.value(c, bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(values: &[f32]) -> BinnedImage {
        BinnedImage::new(values, values.len(), 1, 1, false, false)
    }

    fn fill(hist: &mut Histogram, image: &BinnedImage) {
        for x in 0..image.width() {
            hist.modify(image, image.pixel(x, 0), 1);
        }
    }

    #[test]
    fn test_median_and_extremes() {
        let image = gray(&[0.5, 0.1, 0.9, 0.3, 0.7]);
        let mut hist = Histogram::new(&image);
        fill(&mut hist, &image);

        assert_eq!(hist.percentile(&image, 0, 0.5), 0.5);
        assert_eq!(hist.percentile(&image, 0, 0.0), 0.1);
        assert_eq!(hist.percentile(&image, 0, 1.0), 0.9);
        assert_eq!(hist.percentile(&image, 0, 0.25), 0.3);
        assert!(hist.cursors_consistent());
    }

    #[test]
    fn test_cursor_follows_updates() {
        let image = gray(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let mut hist = Histogram::new(&image);
        for x in 0..3 {
            hist.modify(&image, image.pixel(x, 0), 1);
        }
        assert_eq!(hist.percentile(&image, 0, 0.5), 0.2);

        // Slide the window right, one pixel at a time
        for x in 3..6 {
            hist.modify(&image, image.pixel(x - 3, 0), -1);
            hist.modify(&image, image.pixel(x, 0), 1);
            assert!(hist.cursors_consistent());
            assert_eq!(hist.percentile(&image, 0, 0.5), image.value(0, x - 1));
        }
        assert_eq!(hist.size(), 3);
    }

    #[test]
    fn test_empty_window_reads_zero() {
        let image = gray(&[0.4]);
        let mut hist = Histogram::new(&image);
        assert_eq!(hist.percentile(&image, 0, 0.5), 0.0);
    }

    #[test]
    fn test_transparent_pixels_do_not_weigh_color() {
        // Y + alpha: a bright transparent pixel among dark opaque ones
        let data = [0.2, 1.0, 0.9, 0.0, 0.3, 1.0];
        let image = BinnedImage::new(&data, 3, 1, 2, true, true);
        let mut hist = Histogram::new(&image);
        fill(&mut hist, &image);

        assert_eq!(hist.size(), 3);
        assert_eq!(hist.count(), 2 * 255);
        assert_eq!(hist.percentile(&image, 0, 1.0), image.value(0, 77));
        // Alpha still sees all three pixels
        assert_eq!(hist.percentile(&image, 1, 0.0), 0.0);
        assert_eq!(hist.bins(1).iter().sum::<i64>(), 3);
    }

    #[test]
    fn test_same_counts_ignores_cursor() {
        let image = gray(&[0.1, 0.9, 0.5]);
        let mut a = Histogram::new(&image);
        let mut b = Histogram::new(&image);
        fill(&mut a, &image);
        fill(&mut b, &image);
        a.percentile(&image, 0, 1.0);

        assert!(a.same_counts(&b));
    }
}
