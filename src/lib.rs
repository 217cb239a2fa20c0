//! # Tilework - Region-driven Buffer Operations
//!
//! Tilework is a small compute library for image operations that work on
//! tiled float buffers, one requested region at a time.
//!
//! ## Features
//!
//! - **Copy-on-write Buffers**: Tiled `f32` buffers that share pixel data until written
//! - **Region Negotiation**: Operations state the input region each output region needs
//! - **Parallel Kernels**: Rows and areas are fanned out over rayon, joined before returning
//! - **Incremental Warping**: Stroke-driven displacement fields that only replay new points
//! - **Order Statistics**: Sliding-histogram percentile (median) filtering
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tilework::prelude::*;
//!
//! let extent = Rectangle::new(0, 0, 32, 32);
//! let image = Buffer::new(extent, PixelFormat::rgba());
//!
//! let mut blur = tilework::operations::create("median-blur").unwrap();
//! blur.set_parameter("radius", Value::Integer(2)).unwrap();
//! blur.prepare(Some(image.format()));
//!
//! let mut ctx = ProcessContext::default().with_input(INPUT_PORT, Arc::new(image));
//! ctx.run(blur.as_mut(), &extent).unwrap();
//! let output = ctx.take_output(OUTPUT_PORT).unwrap();
//! assert_eq!(output.extent(), extent);
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Buffers, rectangles, formats, the work distributor, parameters,
//!   the `Operation` trait and error handling
//! - [`operations`]: The built-in operations (warp, median blur, distance transform)

#![warn(clippy::all)]

pub mod core;
pub mod operations;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust
/// use tilework::prelude::*;
/// ```
pub mod prelude {
    // Buffers and geometry
    pub use crate::core::buffer::{Buffer, BufferAccess, SharedBuffer};
    pub use crate::core::format::{AbyssPolicy, ColorModel, PixelFormat};
    pub use crate::core::rect::Rectangle;

    // Parameters
    pub use crate::core::port::{Constraint, ParameterDefinition, UiHint};
    pub use crate::core::types::{PathPoint, Stroke, Value, ValueType};

    // Operations and contexts
    pub use crate::core::config::ComputeConfig;
    pub use crate::core::context::{
        ProcessContext, ProgressTracker, ProgressUpdate, INPUT_PORT, OUTPUT_PORT,
    };
    pub use crate::core::operation::{Category, Operation, OperationMetadata};
    pub use crate::core::parallel::{Distributor, SplitStrategy};

    // Errors
    pub use crate::core::error::{
        ConfigError, OperationError, OperationResult, ParameterError, ParameterResult,
        TileworkError, TileworkResult,
    };

    // Built-in operations
    pub use crate::operations::{DistanceTransform, MedianBlur, WarpOperation};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "tilework");
    }

    #[test]
    fn test_builtin_operations() {
        let ids: Vec<String> = crate::operations::list().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["warp", "median-blur", "distance-transform"]);
    }

    #[test]
    fn test_prelude_operation_objects() {
        let ops: Vec<Box<dyn Operation>> = vec![
            Box::new(WarpOperation::new()),
            Box::new(MedianBlur::new()),
            Box::new(DistanceTransform::new()),
        ];
        assert!(ops.iter().all(|op| op.metadata().inputs == vec![INPUT_PORT]));
    }
}
