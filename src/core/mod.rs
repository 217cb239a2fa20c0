//! Core types and traits for the Tilework compute model.
//!
//! This module contains the foundational pieces every operation builds on:
//! - Rectangles, pixel formats and abyss policies
//! - Tiled copy-on-write buffers and the `BufferAccess` protocol
//! - 2D views over flat pixel slices
//! - The parallel range distributor
//! - Parameter values, definitions and constraints
//! - The `Operation` trait, its metadata and the processing context
//! - Error types and the compute configuration

pub mod buffer;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod operation;
pub mod parallel;
pub mod port;
pub mod rect;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use buffer::{Buffer, BufferAccess, SharedBuffer};
pub use config::ComputeConfig;
pub use context::{ProcessContext, ProgressTracker, ProgressUpdate, INPUT_PORT, OUTPUT_PORT};
pub use error::{
    ConfigError, OperationError, OperationResult, ParameterError, ParameterResult, TileworkError,
    TileworkResult,
};
pub use format::{AbyssPolicy, ColorModel, Encoding, PixelFormat};
pub use operation::{Category, Operation, OperationMetadata};
pub use parallel::{Distributor, SplitStrategy};
pub use port::{Constraint, ParameterDefinition};
pub use rect::Rectangle;
pub use types::{PathPoint, Stroke, Value, ValueType};
pub use view::{PixelView, PixelViewMut};
