//! Distance transform.
//!
//! Computes, for every pixel above a threshold, the distance to the nearest
//! pixel at or below it, in linear time (Meijster, Roerdink and Hesselink,
//! "A General Algorithm for Computing Distance Transforms in Linear Time").
//!
//! The first pass walks every column down and up to find vertical
//! distances. The second pass builds, per row, the lower envelope of the
//! metric's distance functions and reads the final distances back from it.

use crate::core::buffer::{Buffer, BufferAccess};
use crate::core::context::{ProcessContext, INPUT_PORT, OUTPUT_PORT};
use crate::core::error::{OperationError, OperationResult, ParameterError, ParameterResult};
use crate::core::format::{AbyssPolicy, PixelFormat};
use crate::core::operation::{Category, Operation, OperationMetadata};
use crate::core::parallel::Distributor;
use crate::core::port::ParameterDefinition;
use crate::core::rect::Rectangle;
use crate::core::types::{Value, ValueType};
use crate::core::view::{PixelView, PixelViewMut};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const EPSILON: f64 = 1e-12;

/// Distance metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Euclidean, Metric::Manhattan, Metric::Chebyshev];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::Manhattan => "manhattan",
            Metric::Chebyshev => "chebyshev",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Distance from column `x` to minimizer `i` of vertical distance `g_i`.
    #[inline]
    fn f(&self, x: f32, i: f32, g_i: f32) -> f32 {
        match self {
            Metric::Euclidean => ((x - i) * (x - i) + g_i * g_i).sqrt(),
            Metric::Manhattan => (x - i).abs() + g_i,
            Metric::Chebyshev => (x - i).abs().max(g_i),
        }
    }

    /// Last column where minimizer `i` still beats minimizer `u` (`i < u`).
    #[inline]
    fn sep(&self, i: i32, u: i32, g_i: f32, g_u: f32) -> i32 {
        match self {
            Metric::Euclidean => (u * u - i * i + (g_u * g_u - g_i * g_i) as i32) / (2 * (u - i)),
            Metric::Manhattan => {
                if g_u as f64 >= (g_i + u as f32 - i as f32) as f64 + EPSILON {
                    i32::MAX / 4
                } else if g_i as f64 > (g_u + u as f32 - i as f32) as f64 + EPSILON {
                    i32::MIN / 4
                } else {
                    ((g_u - g_i) as i32 + u + i) / 2
                }
            }
            Metric::Chebyshev => {
                if g_i <= g_u {
                    (i + g_u as i32).max((i + u) / 2)
                } else {
                    (u - g_i as i32).min((i + u) / 2)
                }
            }
        }
    }
}

/// How pixels outside the input count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeHandling {
    /// Outside is foreground: distances only grow away from inner background
    Above,
    /// Outside is background: edge pixels are at most 1 away
    #[default]
    Below,
}

impl EdgeHandling {
    pub fn name(&self) -> &'static str {
        match self {
            EdgeHandling::Above => "above",
            EdgeHandling::Below => "below",
        }
    }
}

/// Parameters of the distance transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceParams {
    pub metric: Metric,
    pub edge_handling: EdgeHandling,
    pub threshold_lo: f64,
    pub threshold_hi: f64,
    /// Number of thresholds averaged for grayscale input (0 = binary).
    pub averaging: u32,
    /// Scale the output so its maximum equals `threshold_hi`.
    pub normalize: bool,
}

impl Default for DistanceParams {
    fn default() -> Self {
        Self {
            metric: Metric::Euclidean,
            edge_handling: EdgeHandling::Below,
            threshold_lo: 0.0001,
            threshold_hi: 1.0,
            averaging: 0,
            normalize: true,
        }
    }
}

/// Binary distance transform of a `width` x `height` single-channel image.
///
/// Pixels above `threshold` are foreground.
#[allow(clippy::too_many_arguments)]
pub fn binary_transform(
    distributor: &Distributor,
    pixels_per_thread: f64,
    src: &[f32],
    width: usize,
    height: usize,
    threshold: f32,
    params: &DistanceParams,
    on_first_pass: impl FnOnce(),
) -> Vec<f32> {
    let columns = vertical_pass(distributor, pixels_per_thread, src, width, height, threshold, params);
    on_first_pass();

    // Row `x` of the column-major pass holds column `x`
    let columns = PixelView::new(&columns, height, width, 1);
    let mut dest = vec![0.0f32; width * height];
    let mut rows = PixelViewMut::new(&mut dest, width, height, 1);
    for x in 0..width {
        for (y, &d) in columns.row(x).iter().enumerate() {
            rows.pixel_mut(x, y)[0] = d;
        }
    }

    horizontal_pass(distributor, pixels_per_thread, &mut dest, width, height, params);
    dest
}

/// Vertical distances, column-major.
fn vertical_pass(
    distributor: &Distributor,
    pixels_per_thread: f64,
    src: &[f32],
    width: usize,
    height: usize,
    threshold: f32,
    params: &DistanceParams,
) -> Vec<f32> {
    // Larger than any real distance
    let inf_dist = (width + height) as f32;
    let edge_mult = match params.edge_handling {
        EdgeHandling::Above => inf_dist,
        EdgeHandling::Below => 1.0,
    };
    let foreground = |x: usize, y: usize| src[y * width + x] > threshold;

    let mut columns = vec![0.0f32; width * height];
    distributor.distribute_rows(
        &mut columns,
        height,
        pixels_per_thread / height as f64,
        |first, band| {
            for (offset, d) in band.chunks_exact_mut(height).enumerate() {
                let x = first + offset;
                d[0] = if foreground(x, 0) { edge_mult } else { 0.0 };

                let mut y = 1;
                // No background seen yet: stay infinite until the first one
                if d[0] > 1.0 {
                    while y < height && foreground(x, y) {
                        d[y] = inf_dist;
                        y += 1;
                    }
                }
                if y == height {
                    continue;
                }

                for y in y..height {
                    d[y] = if foreground(x, y) { d[y - 1] + 1.0 } else { 0.0 };
                }

                if params.edge_handling == EdgeHandling::Below {
                    d[height - 1] = d[height - 1].min(1.0);
                }
                for y in (0..height - 1).rev() {
                    if d[y + 1] + 1.0 < d[y] {
                        d[y] = d[y + 1] + 1.0;
                    }
                }
            }
        },
    );
    columns
}

/// Replace the vertical distances of every row with final distances.
fn horizontal_pass(
    distributor: &Distributor,
    pixels_per_thread: f64,
    dest: &mut [f32],
    width: usize,
    height: usize,
    params: &DistanceParams,
) {
    let inf_dist = (width + height) as f32;
    let edge = match params.edge_handling {
        EdgeHandling::Above => inf_dist,
        EdgeHandling::Below => 0.0,
    };
    let metric = params.metric;
    let w = width as i32;

    distributor.distribute_rows(dest, width, pixels_per_thread / width as f64, |_, band| {
        // Minimizer and start column of each envelope segment
        let mut s = vec![0i32; width + 1];
        let mut t = vec![0i32; width + 1];
        // Row with one outside pixel on either side
        let mut g = vec![0.0f32; width + 2];

        for row in band.chunks_exact_mut(width) {
            g[1..=width].copy_from_slice(row);
            g[0] = edge;
            g[width + 1] = edge;

            let mut q: isize = 0;
            s[0] = 0;
            t[0] = 0;

            for u in 1..w + 2 {
                let g_u = g[u as usize];
                while q >= 0 {
                    let (sq, tq) = (s[q as usize], t[q as usize]);
                    let current = metric.f(tq as f32, sq as f32, g[sq as usize]) as f64;
                    let candidate = metric.f(tq as f32, u as f32, g_u) as f64;
                    if current >= candidate + EPSILON {
                        q -= 1;
                    } else {
                        break;
                    }
                }

                if q < 0 {
                    q = 0;
                    s[0] = u;
                } else {
                    let sq = s[q as usize];
                    let boundary = metric.sep(sq, u, g[sq as usize], g_u) + 1;
                    if boundary < w + 1 {
                        q += 1;
                        s[q as usize] = u;
                        t[q as usize] = boundary;
                    }
                }
            }

            for u in (1..=w).rev() {
                let sq = s[q as usize];
                row[(u - 1) as usize] = if u == sq {
                    g[u as usize]
                } else {
                    metric.f(u as f32, sq as f32, g[sq as usize])
                };
                if q > 0 && u == t[q as usize] {
                    q -= 1;
                }
            }
        }
    });
}

/// Distance transform operation on single-channel buffers.
#[derive(Debug, Default)]
pub struct DistanceTransform {
    params: DistanceParams,
}

impl DistanceTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &DistanceParams {
        &self.params
    }
}

impl Operation for DistanceTransform {
    fn metadata(&self) -> OperationMetadata {
        OperationMetadata::builder("distance-transform", "Distance Transform")
            .category(Category::Map)
            .description("Calculate a distance transform")
            .input(INPUT_PORT)
            .output(OUTPUT_PORT)
            .parameter(
                ParameterDefinition::new("metric", ValueType::Choice, Value::Choice("euclidean".into()))
                    .with_choices(&["euclidean", "manhattan", "chebyshev"])
                    .with_description("Metric to use for the distance calculation"),
            )
            .parameter(
                ParameterDefinition::new(
                    "edge-handling",
                    ValueType::Choice,
                    Value::Choice("below".into()),
                )
                .with_choices(&["above", "below"])
                .with_description("How areas outside the input are considered"),
            )
            .parameter(
                ParameterDefinition::new("threshold-lo", ValueType::Float, Value::Float(0.0001))
                    .with_range(0.0, 1.0),
            )
            .parameter(
                ParameterDefinition::new("threshold-hi", ValueType::Float, Value::Float(1.0))
                    .with_range(0.0, 1.0),
            )
            .parameter(
                ParameterDefinition::new("averaging", ValueType::Integer, Value::Integer(0))
                    .with_range(0.0, 1000.0)
                    .with_description("Number of computations for grayscale averaging"),
            )
            .parameter(
                ParameterDefinition::new("normalize", ValueType::Boolean, Value::Boolean(true))
                    .with_description("Normalize output to range 0.0 to threshold-hi"),
            )
            .tags(["distance", "morphology", "map"])
            .build()
    }

    fn set_parameter(&mut self, name: &str, value: Value) -> ParameterResult<()> {
        self.metadata().validate_parameter(name, &value)?;

        match name {
            "metric" => {
                self.params.metric = value
                    .as_choice()
                    .and_then(Metric::from_name)
                    .unwrap_or_default()
            }
            "edge-handling" => {
                self.params.edge_handling = match value.as_choice() {
                    Some("above") => EdgeHandling::Above,
                    _ => EdgeHandling::Below,
                }
            }
            "threshold-lo" => self.params.threshold_lo = value.as_float().unwrap_or(0.0001),
            "threshold-hi" => self.params.threshold_hi = value.as_float().unwrap_or(1.0),
            "averaging" => self.params.averaging = value.as_integer().unwrap_or(0) as u32,
            "normalize" => self.params.normalize = value.as_bool().unwrap_or(true),
            _ => {
                return Err(ParameterError::Unknown {
                    operation: "distance-transform".to_string(),
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }

    fn parameter(&self, name: &str) -> Option<Value> {
        match name {
            "metric" => Some(Value::Choice(self.params.metric.name().to_string())),
            "edge-handling" => Some(Value::Choice(self.params.edge_handling.name().to_string())),
            "threshold-lo" => Some(Value::Float(self.params.threshold_lo)),
            "threshold-hi" => Some(Value::Float(self.params.threshold_hi)),
            "averaging" => Some(Value::Integer(self.params.averaging as i64)),
            "normalize" => Some(Value::Boolean(self.params.normalize)),
            _ => None,
        }
    }

    fn prepare(&mut self, _input_format: Option<PixelFormat>) -> PixelFormat {
        PixelFormat::y()
    }

    fn required_region(&self, input_box: Option<Rectangle>, roi: &Rectangle) -> Rectangle {
        input_box.unwrap_or(*roi)
    }

    fn cached_region(&self, input_box: Option<Rectangle>, roi: &Rectangle) -> Rectangle {
        input_box.unwrap_or(*roi)
    }

    fn process(&mut self, ctx: &mut ProcessContext, roi: &Rectangle) -> OperationResult<()> {
        let input = ctx.get_input(INPUT_PORT)?.clone();
        if input.format().n_components() != 1 {
            return Err(OperationError::FormatMismatch {
                expected: PixelFormat::y(),
                got: input.format(),
            });
        }

        let area = self.cached_region(Some(input.extent()), roi);
        if area.is_empty() {
            return Err(OperationError::EmptyRegion(area));
        }

        let (width, height) = (area.width as usize, area.height as usize);
        let src = input.get(&area, input.format(), AbyssPolicy::None)?;
        let params = self.params;
        let ppt = ctx.config().pixels_per_thread;
        let distributor = *ctx.distributor();
        let progress = ctx.progress().clone();

        log::debug!(
            "Distance transform over {} ({}, averaging {})",
            area,
            params.metric.name(),
            params.averaging
        );
        progress.report(0.0);

        let lo = params.threshold_lo as f32;
        let hi = params.threshold_hi as f32;
        let mut dest = if params.averaging == 0 {
            binary_transform(&distributor, ppt, &src, width, height, lo, &params, || {
                progress.report(0.5)
            })
        } else {
            let n = params.averaging as f32;
            let mut sum = vec![0.0f32; width * height];
            for i in 0..params.averaging {
                let threshold = lo + (i + 1) as f32 * (hi - lo) / (n + 1.0);
                let step = binary_transform(
                    &distributor,
                    ppt,
                    &src,
                    width,
                    height,
                    threshold,
                    &params,
                    || progress.report((i as f32 + 0.5) / n),
                );
                for (total, d) in sum.iter_mut().zip(&step) {
                    *total += d;
                }
                progress.report((i + 1) as f32 / n);
            }
            sum
        };

        let max_value = if params.normalize {
            dest.iter().copied().fold(EPSILON as f32, f32::max)
        } else {
            params.averaging as f32
        };
        if params.averaging > 0 || params.normalize {
            for d in dest.iter_mut() {
                *d = *d * hi / max_value;
            }
        }

        let mut output = Buffer::with_tile_size(area, PixelFormat::y(), ctx.config().tile_size);
        output.set(&area, PixelFormat::y(), &dest)?;
        ctx.set_output(OUTPUT_PORT, Arc::new(output));
        progress.report(1.0);
        Ok(())
    }
}
