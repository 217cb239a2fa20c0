//! Median (percentile) blur.
//!
//! Every output pixel receives a percentile of the values in a square,
//! circular or diamond shaped neighborhood. The percentiles are read from a
//! histogram that slides across the region instead of being rebuilt for
//! every pixel.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tilework::prelude::*;
//! use tilework::operations::median::MedianBlur;
//!
//! let extent = Rectangle::new(0, 0, 16, 16);
//! let data: Vec<f32> = (0..256).map(|i| (i % 16) as f32 / 15.0).collect();
//! let input = Buffer::from_data(extent, PixelFormat::y(), &data).unwrap();
//!
//! let mut median = MedianBlur::new();
//! median.set_parameter("radius", Value::Integer(2)).unwrap();
//! median.prepare(Some(PixelFormat::y()));
//!
//! let mut ctx = ProcessContext::default().with_input(INPUT_PORT, Arc::new(input));
//! ctx.run(&mut median, &extent).unwrap();
//! assert_eq!(ctx.get_output(OUTPUT_PORT).unwrap().extent(), extent);
//! ```

pub mod bins;
pub mod engine;
pub mod histogram;
pub mod outline;

pub use outline::{Neighborhood, Outline};

use crate::core::buffer::{Buffer, BufferAccess};
use crate::core::context::{ProcessContext, INPUT_PORT, OUTPUT_PORT};
use crate::core::error::{OperationError, OperationResult, ParameterError, ParameterResult};
use crate::core::format::{AbyssPolicy, PixelFormat};
use crate::core::operation::{Category, Operation, OperationMetadata};
use crate::core::parallel::SplitStrategy;
use crate::core::port::ParameterDefinition;
use crate::core::rect::Rectangle;
use crate::core::types::{Value, ValueType};
use bins::BinnedImage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Parameters of the median blur.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedianParams {
    pub neighborhood: Neighborhood,
    /// Neighborhood radius; negative values invert both percentiles.
    pub radius: i32,
    /// Color percentile (0..100).
    pub percentile: f64,
    /// Alpha percentile (0..100).
    pub alpha_percentile: f64,
    /// Either `None` or `Clamp`.
    pub abyss_policy: AbyssPolicy,
    /// Rank exact values instead of quantizing to 256 levels.
    pub high_precision: bool,
}

impl Default for MedianParams {
    fn default() -> Self {
        Self {
            neighborhood: Neighborhood::Circle,
            radius: 3,
            percentile: 50.0,
            alpha_percentile: 50.0,
            abyss_policy: AbyssPolicy::Clamp,
            high_precision: false,
        }
    }
}

impl MedianParams {
    /// Color and alpha percentiles as fractions, inverted for negative radii.
    pub fn fractions(&self) -> (f64, f64) {
        if self.radius < 0 {
            (
                (100.0 - self.percentile) / 100.0,
                (100.0 - self.alpha_percentile) / 100.0,
            )
        } else {
            (self.percentile / 100.0, self.alpha_percentile / 100.0)
        }
    }
}

/// Split `area` into at most `max_width` x `max_height` chunks.
pub fn chunk_area(area: &Rectangle, max_width: i32, max_height: i32) -> Vec<Rectangle> {
    let max_width = max_width.max(1);
    let max_height = max_height.max(1);
    if area.width <= max_width && area.height <= max_height {
        return vec![*area];
    }

    let n_x = (area.width + max_width - 1) / max_width;
    let n_y = (area.height + max_height - 1) / max_height;

    let mut chunks = Vec::with_capacity((n_x * n_y) as usize);
    for y in 0..n_y {
        for x in 0..n_x {
            let x0 = area.x + area.width * x / n_x;
            let y0 = area.y + area.height * y / n_y;
            let x1 = area.x + area.width * (x + 1) / n_x;
            let y1 = area.y + area.height * (y + 1) / n_y;
            chunks.push(Rectangle::new(x0, y0, x1 - x0, y1 - y0));
        }
    }
    chunks
}

/// Median blur operation.
#[derive(Debug, Default)]
pub struct MedianBlur {
    params: MedianParams,
    outline: Option<Outline>,
}

impl MedianBlur {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(&self) -> &MedianParams {
        &self.params
    }

    fn radius(&self) -> usize {
        self.params.radius.unsigned_abs() as usize
    }

    fn outline(&mut self) -> &Outline {
        let (neighborhood, radius) = (self.params.neighborhood, self.radius());
        self.outline
            .get_or_insert_with(|| Outline::new(neighborhood, radius))
    }

    /// Filter one area with a fresh histogram.
    fn filter_area(
        &self,
        input: &Buffer,
        outline: &Outline,
        area: &Rectangle,
    ) -> OperationResult<Vec<f32>> {
        let format = input.format();
        let r = outline.radius() as i32;
        let source = area.expand_uniform(r);
        let data = input.get(&source, format, self.params.abyss_policy)?;

        let image = BinnedImage::new(
            &data,
            source.width as usize,
            source.height as usize,
            format.n_components(),
            format.has_alpha(),
            !self.params.high_precision,
        );

        let (percentile, alpha_percentile) = self.params.fractions();
        Ok(engine::filter(
            &image,
            outline,
            area.width as usize,
            area.height as usize,
            percentile,
            alpha_percentile,
        ))
    }

    fn choice<'v>(name: &str, value: &'v Value) -> ParameterResult<&'v str> {
        value.as_choice().ok_or_else(|| ParameterError::TypeMismatch {
            name: name.to_string(),
            expected: ValueType::Choice,
            got: value.get_type(),
        })
    }
}

impl Operation for MedianBlur {
    fn metadata(&self) -> OperationMetadata {
        OperationMetadata::builder("median-blur", "Median Blur")
            .category(Category::Blur)
            .description(
                "Blur resulting from computing the median color in the neighborhood of each pixel",
            )
            .input(INPUT_PORT)
            .output(OUTPUT_PORT)
            .parameter(
                ParameterDefinition::new(
                    "neighborhood",
                    ValueType::Choice,
                    Value::Choice("circle".into()),
                )
                .with_choices(&["square", "circle", "diamond"])
                .with_description("Neighborhood type"),
            )
            .parameter(
                ParameterDefinition::new("radius", ValueType::Integer, Value::Integer(3))
                    .with_range(-400.0, 400.0)
                    .with_description(
                        "Neighborhood radius, a negative value inverts the percentiles",
                    ),
            )
            .parameter(
                ParameterDefinition::new("percentile", ValueType::Float, Value::Float(50.0))
                    .with_range(0.0, 100.0)
                    .with_description("Neighborhood color percentile"),
            )
            .parameter(
                ParameterDefinition::new("alpha-percentile", ValueType::Float, Value::Float(50.0))
                    .with_range(0.0, 100.0)
                    .with_description("Neighborhood alpha percentile"),
            )
            .parameter(
                ParameterDefinition::new(
                    "abyss-policy",
                    ValueType::Choice,
                    Value::Choice("clamp".into()),
                )
                .with_choices(&["none", "clamp"])
                .with_description("How image edges are handled"),
            )
            .parameter(
                ParameterDefinition::new("high-precision", ValueType::Boolean, Value::Boolean(false))
                    .with_description("Avoid clipping and quantization (slower)"),
            )
            .tags(["blur", "median", "percentile", "denoise"])
            .build()
    }

    fn set_parameter(&mut self, name: &str, value: Value) -> ParameterResult<()> {
        self.metadata().validate_parameter(name, &value)?;

        match name {
            "neighborhood" => {
                let choice = Self::choice(name, &value)?;
                self.params.neighborhood =
                    Neighborhood::from_name(choice).ok_or_else(|| ParameterError::InvalidChoice {
                        name: name.to_string(),
                        value: choice.to_string(),
                        choices: vec!["square".into(), "circle".into(), "diamond".into()],
                    })?;
                self.outline = None;
            }
            "radius" => {
                self.params.radius = value.as_integer().unwrap_or(0) as i32;
                self.outline = None;
            }
            "percentile" => self.params.percentile = value.as_float().unwrap_or(50.0),
            "alpha-percentile" => self.params.alpha_percentile = value.as_float().unwrap_or(50.0),
            "abyss-policy" => {
                self.params.abyss_policy = match Self::choice(name, &value)? {
                    "none" => AbyssPolicy::None,
                    _ => AbyssPolicy::Clamp,
                };
            }
            "high-precision" => self.params.high_precision = value.as_bool().unwrap_or(false),
            _ => {
                return Err(ParameterError::Unknown {
                    operation: "median-blur".to_string(),
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }

    fn parameter(&self, name: &str) -> Option<Value> {
        match name {
            "neighborhood" => Some(Value::Choice(self.params.neighborhood.name().to_string())),
            "radius" => Some(Value::Integer(self.params.radius as i64)),
            "percentile" => Some(Value::Float(self.params.percentile)),
            "alpha-percentile" => Some(Value::Float(self.params.alpha_percentile)),
            "abyss-policy" => Some(Value::Choice(
                match self.params.abyss_policy {
                    AbyssPolicy::None => "none",
                    _ => "clamp",
                }
                .to_string(),
            )),
            "high-precision" => Some(Value::Boolean(self.params.high_precision)),
            _ => None,
        }
    }

    fn prepare(&mut self, input_format: Option<PixelFormat>) -> PixelFormat {
        self.outline();
        input_format.unwrap_or(PixelFormat::rgba())
    }

    fn bounding_box(&self, input_box: Option<Rectangle>) -> Rectangle {
        let input_box = input_box.unwrap_or_default();
        match self.params.abyss_policy {
            AbyssPolicy::None => input_box.expand_uniform(self.radius() as i32),
            _ => input_box,
        }
    }

    fn required_region(&self, _input_box: Option<Rectangle>, roi: &Rectangle) -> Rectangle {
        roi.expand_uniform(self.radius() as i32)
    }

    fn process(&mut self, ctx: &mut ProcessContext, roi: &Rectangle) -> OperationResult<()> {
        let input = ctx.get_input(INPUT_PORT)?.clone();
        let format = input.format();
        let n_color = format.n_color_components();
        if !(n_color == 1 || n_color == 3) {
            return Err(OperationError::UnsupportedChannelCount {
                operation: "median-blur".to_string(),
                components: n_color,
            });
        }
        if roi.is_empty() {
            return Err(OperationError::EmptyRegion(*roi));
        }

        let outline = self.outline().clone();
        let config = ctx.config().clone();
        let quantized = !self.params.high_precision;

        let areas = ctx
            .distributor()
            .split_area(roi, config.pixels_per_thread, SplitStrategy::Auto);
        let total = areas.len();
        let done = AtomicUsize::new(0);
        let progress = ctx.progress().clone();
        let this = &*self;

        log::debug!(
            "Median blur over {} in {} area(s), radius {}, {}",
            roi,
            total,
            self.params.radius,
            if quantized { "quantized" } else { "exact" }
        );

        let results: Vec<OperationResult<Vec<(Rectangle, Vec<f32>)>>> = ctx
            .distributor()
            .map_area(roi, config.pixels_per_thread, SplitStrategy::Auto, |area| {
                let chunks = if quantized {
                    vec![area]
                } else {
                    chunk_area(&area, config.chunk_width, config.chunk_height)
                };

                let mut filtered = Vec::with_capacity(chunks.len());
                for chunk in chunks {
                    log::trace!("Median chunk {}", chunk);
                    filtered.push((chunk, this.filter_area(&input, &outline, &chunk)?));
                }

                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress.report(finished as f32 / total as f32);
                Ok(filtered)
            });

        // Nothing is written unless every area succeeded
        let mut output = Buffer::with_tile_size(*roi, format, config.tile_size);
        for result in results {
            for (chunk, data) in result? {
                output.set(&chunk, format, &data)?;
            }
        }

        ctx.set_output(OUTPUT_PORT, Arc::new(output));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ComputeConfig;

    fn run(median: &mut MedianBlur, input: Buffer, roi: Rectangle, config: ComputeConfig) -> Vec<f32> {
        let format = input.format();
        median.prepare(Some(format));
        let mut ctx = ProcessContext::new(config).with_input(INPUT_PORT, Arc::new(input));
        ctx.run(median, &roi).unwrap();
        ctx.take_output(OUTPUT_PORT).unwrap().to_vec()
    }

    fn noise(extent: Rectangle, components: usize) -> Vec<f32> {
        (0..extent.area() * components)
            .map(|i| ((i * 7919) % 101) as f32 / 100.0)
            .collect()
    }

    #[test]
    fn test_chunk_area() {
        let area = Rectangle::new(3, -2, 300, 100);
        let chunks = chunk_area(&area, 128, 128);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.width <= 128 && c.height == 100));
        assert_eq!(chunks.iter().map(|c| c.area()).sum::<usize>(), area.area());
        assert_eq!(chunk_area(&Rectangle::new(0, 0, 10, 10), 128, 128).len(), 1);
    }

    #[test]
    fn test_geometry() {
        let mut median = MedianBlur::new();
        median.set_parameter("radius", Value::Integer(-4)).unwrap();
        let input_box = Rectangle::new(0, 0, 10, 10);
        let roi = Rectangle::new(2, 2, 3, 3);

        assert_eq!(median.required_region(Some(input_box), &roi), Rectangle::new(-2, -2, 11, 11));
        assert_eq!(median.bounding_box(Some(input_box)), input_box);

        median.set_parameter("abyss-policy", Value::Choice("none".into())).unwrap();
        assert_eq!(median.bounding_box(Some(input_box)), Rectangle::new(-4, -4, 18, 18));
    }

    #[test]
    fn test_fractions() {
        let params = MedianParams {
            radius: -2,
            percentile: 25.0,
            alpha_percentile: 100.0,
            ..MedianParams::default()
        };
        assert_eq!(params.fractions(), (0.75, 0.0));

        // Inverting must land on the same fraction as the mirrored percentile
        for p in 0..=100 {
            let inverted = MedianParams {
                radius: -2,
                percentile: p as f64,
                alpha_percentile: p as f64,
                ..MedianParams::default()
            };
            let mirrored = MedianParams {
                radius: 2,
                percentile: (100 - p) as f64,
                alpha_percentile: (100 - p) as f64,
                ..MedianParams::default()
            };
            assert_eq!(inverted.fractions(), mirrored.fractions(), "p={}", p);
        }
    }

    #[test]
    fn test_unsupported_layout_writes_nothing() {
        let extent = Rectangle::new(0, 0, 4, 4);
        let field = Buffer::new(extent, PixelFormat::vector2());
        let mut median = MedianBlur::new();
        let mut ctx = ProcessContext::default().with_input(INPUT_PORT, Arc::new(field));

        let result = ctx.run(&mut median, &extent);
        assert!(matches!(
            result,
            Err(OperationError::UnsupportedChannelCount { .. })
        ));
        assert!(ctx.get_output(OUTPUT_PORT).is_none());
    }

    #[test]
    fn test_threading_and_chunking_do_not_change_results() {
        let extent = Rectangle::new(0, 0, 40, 33);
        let data = noise(extent, 3);
        let input = Buffer::from_data(extent, PixelFormat::rgb(), &data).unwrap();

        let mut median = MedianBlur::new();
        median.set_parameter("high-precision", Value::Boolean(true)).unwrap();

        let single = run(
            &mut median,
            input.clone(),
            extent,
            ComputeConfig::new().with_threads(1),
        );
        let split = run(
            &mut median,
            input,
            extent,
            ComputeConfig::new()
                .with_threads(4)
                .with_pixels_per_thread(16.0)
                .with_chunk_size(8, 8),
        );

        assert_eq!(single, split);
    }

    #[test]
    fn test_constant_image_is_fixed_point() {
        let extent = Rectangle::new(0, 0, 9, 9);
        let input = Buffer::from_data(extent, PixelFormat::y(), &vec![0.4; 81]).unwrap();
        let mut median = MedianBlur::new();
        median.set_parameter("high-precision", Value::Boolean(true)).unwrap();

        let out = run(&mut median, input, extent, ComputeConfig::default());
        assert!(out.iter().all(|&v| v == 0.4));
    }

    #[test]
    fn test_parameter_round_trip() {
        let mut median = MedianBlur::new();
        median.set_parameter("neighborhood", Value::Choice("diamond".into())).unwrap();
        median.set_parameter("alpha-percentile", Value::Float(10.0)).unwrap();

        assert_eq!(median.params().neighborhood, Neighborhood::Diamond);
        assert_eq!(median.parameter("alpha-percentile"), Some(Value::Float(10.0)));
        assert_eq!(median.parameter("abyss-policy"), Some(Value::Choice("clamp".into())));
        assert!(matches!(
            median.set_parameter("radius", Value::Integer(401)),
            Err(ParameterError::OutOfRange { .. })
        ));
    }
}
