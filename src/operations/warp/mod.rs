//! Stroke-driven warp of a displacement field.
//!
//! The operation turns a stroke into a 2-component displacement field by
//! stamping a radial kernel along it. The field is cached between calls so
//! an interactively growing stroke only costs the newly added points.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tilework::prelude::*;
//! use tilework::operations::warp::WarpOperation;
//!
//! let field = Buffer::new(Rectangle::new(0, 0, 64, 64), PixelFormat::vector2());
//! let mut warp = WarpOperation::new();
//! warp.set_parameter("size", Value::Float(16.0)).unwrap();
//! warp.set_parameter("stroke", Value::Path(vec![(10.0, 32.0), (50.0, 32.0)].into())).unwrap();
//!
//! let mut ctx = ProcessContext::default().with_input(INPUT_PORT, Arc::new(field));
//! warp.prepare(Some(PixelFormat::vector2()));
//! ctx.run(&mut warp, &Rectangle::new(0, 0, 64, 64)).unwrap();
//! assert!(ctx.get_output(OUTPUT_PORT).is_some());
//! ```

pub mod lut;
pub mod processor;
pub mod stamp;
pub mod stroke;

pub use processor::{CacheState, StampRecord, StrokeProcessor, StrokeReport, WarpParams};
pub use stamp::Behavior;

use crate::core::buffer::BufferAccess;
use crate::core::context::{ProcessContext, INPUT_PORT, OUTPUT_PORT};
use crate::core::error::{OperationError, OperationResult, ParameterError, ParameterResult};
use crate::core::format::PixelFormat;
use crate::core::operation::{Category, Operation, OperationMetadata};
use crate::core::port::{ParameterDefinition, UiHint};
use crate::core::rect::Rectangle;
use crate::core::types::{Stroke, Value, ValueType};

/// Warp operation: applies a stroke to a cached displacement field.
#[derive(Debug, Default)]
pub struct WarpOperation {
    params: WarpParams,
    stroke: Stroke,
    processor: StrokeProcessor,
    last_report: Option<StrokeReport>,
}

impl WarpOperation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stamp parameters.
    pub fn params(&self) -> &WarpParams {
        &self.params
    }

    /// The live stroke.
    pub fn stroke(&self) -> &Stroke {
        &self.stroke
    }

    pub fn cache_state(&self) -> CacheState {
        self.processor.state()
    }

    /// Report of the most recent `process` call.
    pub fn last_report(&self) -> Option<&StrokeReport> {
        self.last_report.as_ref()
    }

    fn float_param(name: &str, value: &Value) -> ParameterResult<f64> {
        value.as_float().ok_or_else(|| ParameterError::TypeMismatch {
            name: name.to_string(),
            expected: ValueType::Float,
            got: value.get_type(),
        })
    }
}

impl Operation for WarpOperation {
    fn metadata(&self) -> OperationMetadata {
        OperationMetadata::builder("warp", "Warp")
            .category(Category::Distort)
            .description("Compute a displacement field from a painted stroke")
            .input(INPUT_PORT)
            .output(OUTPUT_PORT)
            .parameter(
                ParameterDefinition::new("strength", ValueType::Float, Value::Float(50.0))
                    .with_range(0.0, 100.0)
                    .with_description("Effect strength in percent"),
            )
            .parameter(
                ParameterDefinition::new("size", ValueType::Float, Value::Float(40.0))
                    .with_range(1.0, 10000.0)
                    .logarithmic()
                    .with_description("Stamp diameter in pixels"),
            )
            .parameter(
                ParameterDefinition::new("hardness", ValueType::Float, Value::Float(0.5))
                    .with_range(0.0, 1.0)
                    .with_description("Falloff hardness"),
            )
            .parameter(
                ParameterDefinition::new("spacing", ValueType::Float, Value::Float(0.01))
                    .with_range(0.0, 100.0)
                    .with_description("Stamp spacing relative to the stamp size"),
            )
            .parameter(
                ParameterDefinition::new("stroke", ValueType::Path, Value::Path(Stroke::new()))
                    .with_ui_hint(UiHint::PathEditor)
                    .with_description("Path along which stamps are applied"),
            )
            .parameter(
                ParameterDefinition::new(
                    "behavior",
                    ValueType::Choice,
                    Value::Choice(Behavior::Move.name().to_string()),
                )
                .with_choices(&Behavior::names())
                .with_description("Effect of each stamp"),
            )
            .tags(["warp", "liquify", "displace", "stroke"])
            .single_threaded()
            .no_cache()
            .build()
    }

    fn set_parameter(&mut self, name: &str, value: Value) -> ParameterResult<()> {
        self.metadata().validate_parameter(name, &value)?;

        let mut params = self.params;
        match name {
            "stroke" => {
                self.stroke = value.as_path().cloned().unwrap_or_default();
                self.processor.stroke_changed(&self.stroke);
                return Ok(());
            }
            "strength" => params.strength = Self::float_param(name, &value)?,
            "size" => params.size = Self::float_param(name, &value)?,
            "hardness" => params.hardness = Self::float_param(name, &value)?,
            "spacing" => params.spacing = Self::float_param(name, &value)?,
            "behavior" => {
                let choice = value.as_choice().unwrap_or_default();
                params.behavior =
                    Behavior::from_name(choice).ok_or_else(|| ParameterError::InvalidChoice {
                        name: name.to_string(),
                        value: choice.to_string(),
                        choices: Behavior::names().iter().map(|n| n.to_string()).collect(),
                    })?;
            }
            _ => {
                return Err(ParameterError::Unknown {
                    operation: "warp".to_string(),
                    name: name.to_string(),
                })
            }
        }

        if params != self.params {
            self.params = params;
            self.processor.reset();
        }
        Ok(())
    }

    fn parameter(&self, name: &str) -> Option<Value> {
        match name {
            "strength" => Some(Value::Float(self.params.strength)),
            "size" => Some(Value::Float(self.params.size)),
            "hardness" => Some(Value::Float(self.params.hardness)),
            "spacing" => Some(Value::Float(self.params.spacing)),
            "stroke" => Some(Value::Path(self.stroke.clone())),
            "behavior" => Some(Value::Choice(self.params.behavior.name().to_string())),
            _ => None,
        }
    }

    fn prepare(&mut self, _input_format: Option<PixelFormat>) -> PixelFormat {
        self.processor.prepare(&self.stroke, &self.params);
        PixelFormat::vector2()
    }

    fn required_region(&self, input_box: Option<Rectangle>, roi: &Rectangle) -> Rectangle {
        // The cached field stands in for the input once it exists
        if self.processor.cached().is_some() {
            Rectangle::default()
        } else {
            input_box.unwrap_or(*roi)
        }
    }

    fn cached_region(&self, input_box: Option<Rectangle>, roi: &Rectangle) -> Rectangle {
        input_box.unwrap_or(*roi)
    }

    fn invalidate(&mut self) {
        self.processor.clear_cache();
    }

    fn process(&mut self, ctx: &mut ProcessContext, _roi: &Rectangle) -> OperationResult<()> {
        let input = ctx.get_input(INPUT_PORT)?.clone();
        if input.format().n_components() != 2 {
            return Err(OperationError::FormatMismatch {
                expected: PixelFormat::vector2(),
                got: input.format(),
            });
        }

        let (output, report) = self
            .processor
            .process(ctx, &input, &self.stroke, &self.params)?;

        self.last_report = Some(report);
        ctx.set_output(OUTPUT_PORT, output);
        Ok(())
    }
}
