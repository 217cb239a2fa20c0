//! Conversion of float pixels into histogram bin indices.
//!
//! Two binnings are supported. The quantized one maps every component onto
//! 256 fixed levels shared by the whole process. The exact one ranks the
//! distinct values of each component of the given pixels, so percentiles
//! come out as actual input values.

use std::borrow::Cow;
use std::sync::OnceLock;

/// Number of levels of the quantized binning.
pub const QUANTIZED_BINS: usize = 256;

/// Scale of exact-mode alpha weights (alpha 1.0 weighs this much).
const EXACT_ALPHA_SCALE: f32 = 1024.0;

struct QuantizedTables {
    values: Vec<f32>,
    alpha_weights: Vec<i64>,
}

fn quantized_tables() -> &'static QuantizedTables {
    static TABLES: OnceLock<QuantizedTables> = OnceLock::new();
    TABLES.get_or_init(|| {
        log::trace!("Building quantized histogram tables");
        QuantizedTables {
            values: (0..QUANTIZED_BINS)
                .map(|i| i as f32 / (QUANTIZED_BINS - 1) as f32)
                .collect(),
            alpha_weights: (0..QUANTIZED_BINS as i64).collect(),
        }
    })
}

/// Clamp to `[0, 1]`, mapping NaN to 0.
fn unit_clamp(value: f32) -> f32 {
    if value > 0.0 {
        value.min(1.0)
    } else {
        0.0
    }
}

/// Quantized bin of a component value.
pub fn quantize(value: f32) -> u32 {
    (unit_clamp(value) * (QUANTIZED_BINS - 1) as f32 + 0.5).floor() as u32
}

/// Pixels of a rectangle with every component replaced by its bin index.
#[derive(Debug, Clone)]
pub struct BinnedImage {
    width: usize,
    height: usize,
    n_components: usize,
    n_color_components: usize,
    bins: Vec<u32>,
    /// Value of each bin, per component.
    values: Vec<Cow<'static, [f32]>>,
    /// Weight of each alpha bin; empty without alpha.
    alpha_weights: Cow<'static, [i64]>,
}

impl BinnedImage {
    /// Bin `data` (row-major, `width * height` pixels of `n_components`).
    pub fn new(
        data: &[f32],
        width: usize,
        height: usize,
        n_components: usize,
        has_alpha: bool,
        quantized: bool,
    ) -> Self {
        debug_assert_eq!(data.len(), width * height * n_components);
        let n_color_components = n_components - usize::from(has_alpha);

        let mut image = Self {
            width,
            height,
            n_components,
            n_color_components,
            bins: vec![0; data.len()],
            values: Vec::with_capacity(n_components),
            alpha_weights: Cow::Borrowed(&[]),
        };

        if quantized {
            image.bin_quantized(data);
        } else {
            image.bin_exact(data);
        }
        image
    }

    fn bin_quantized(&mut self, data: &[f32]) {
        let tables = quantized_tables();
        for (bin, &value) in self.bins.iter_mut().zip(data) {
            *bin = quantize(value);
        }
        self.values = (0..self.n_components)
            .map(|_| Cow::Borrowed(tables.values.as_slice()))
            .collect();
        if self.has_alpha() {
            self.alpha_weights = Cow::Borrowed(tables.alpha_weights.as_slice());
        }
    }

    fn bin_exact(&mut self, data: &[f32]) {
        let n = self.n_components;
        let n_pixels = self.width * self.height;
        let mut order: Vec<usize> = (0..n_pixels).collect();

        for c in 0..n {
            let value_of = |pixel: usize| data[pixel * n + c];
            order.sort_by(|&a, &b| value_of(a).total_cmp(&value_of(b)));

            let mut values = Vec::new();
            let mut bin = 0u32;
            for (rank, &pixel) in order.iter().enumerate() {
                let value = value_of(pixel);
                if rank == 0 {
                    values.push(value);
                } else if value != values[bin as usize] {
                    bin += 1;
                    values.push(value);
                }
                self.bins[pixel * n + c] = bin;
            }

            if c == self.n_color_components {
                self.alpha_weights = Cow::Owned(
                    values
                        .iter()
                        .map(|&a| (unit_clamp(a) * EXACT_ALPHA_SCALE + 0.5).floor() as i64)
                        .collect(),
                );
            }
            self.values.push(Cow::Owned(values));
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn n_color_components(&self) -> usize {
        self.n_color_components
    }

    pub fn has_alpha(&self) -> bool {
        self.n_color_components < self.n_components
    }

    /// Number of bins of component `c`.
    pub fn bin_count(&self, c: usize) -> usize {
        self.values[c].len()
    }

    /// Value represented by `bin` of component `c`.
    pub fn value(&self, c: usize, bin: usize) -> f32 {
        self.values[c][bin]
    }

    /// Weight of a pixel with the given alpha bin in color histograms.
    pub fn alpha_weight(&self, bin: u32) -> i64 {
        self.alpha_weights[bin as usize]
    }

    /// Bin indices of pixel `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> &[u32] {
        let at = (y * self.width + x) * self.n_components;
        &self.bins[at..at + self.n_components]
    }

    /// Bin indices of `count` consecutive pixels of row `y`, from column `x`.
    pub fn span(&self, x: usize, y: usize, count: usize) -> &[u32] {
        let at = (y * self.width + x) * self.n_components;
        &self.bins[at..at + count * self.n_components]
    }
}
