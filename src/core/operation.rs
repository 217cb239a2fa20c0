//! The `Operation` trait and operation metadata.
//!
//! An operation is a region-driven compute unit: the host asks it which
//! input region it needs for a region of interest, hands it the buffers in a
//! `ProcessContext` and lets it write the result for that region.

use crate::core::context::ProcessContext;
use crate::core::error::{OperationResult, ParameterError, ParameterResult};
use crate::core::format::PixelFormat;
use crate::core::port::ParameterDefinition;
use crate::core::rect::Rectangle;
use crate::core::types::Value;
use serde::{Deserialize, Serialize};

/// Category for organizing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Geometric deformations
    Distort,
    /// Blur and smoothing
    Blur,
    /// Noise reduction
    Noise,
    /// Value remapping and transforms
    Map,
    /// Utility operations
    #[default]
    Utility,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Distort => "Distort",
            Category::Blur => "Blur",
            Category::Noise => "Noise",
            Category::Map => "Map",
            Category::Utility => "Utility",
        }
    }
}

/// Metadata describing an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// Unique identifier for this operation type (e.g., "median-blur")
    pub id: String,
    /// Human-readable name (e.g., "Median Blur")
    pub name: String,
    /// Category for organization
    pub category: Category,
    /// Detailed description
    pub description: String,
    /// Version string
    pub version: String,
    /// Names of the input buffer ports
    pub inputs: Vec<String>,
    /// Names of the output buffer ports
    pub outputs: Vec<String>,
    /// Parameter definitions
    pub parameters: Vec<ParameterDefinition>,
    /// Searchable tags
    pub tags: Vec<String>,
    /// Whether `process` distributes work over several threads
    pub threaded: bool,
    /// Whether the host should skip its own result caching
    pub no_cache: bool,
}

impl OperationMetadata {
    /// Create a new metadata builder.
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> OperationMetadataBuilder {
        OperationMetadataBuilder::new(id, name)
    }

    /// Get all parameter names.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Find a parameter by name.
    pub fn get_parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check that `value` may be assigned to parameter `name`.
    pub fn validate_parameter(&self, name: &str, value: &Value) -> ParameterResult<()> {
        self.get_parameter(name)
            .ok_or_else(|| ParameterError::Unknown {
                operation: self.id.clone(),
                name: name.to_string(),
            })?
            .validate(value)
    }
}

/// Builder for OperationMetadata.
pub struct OperationMetadataBuilder {
    metadata: OperationMetadata,
}

impl OperationMetadataBuilder {
    /// Create a new builder with required fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: OperationMetadata {
                id: id.into(),
                name: name.into(),
                category: Category::default(),
                description: String::new(),
                version: "1.0.0".to_string(),
                inputs: Vec::new(),
                outputs: Vec::new(),
                parameters: Vec::new(),
                tags: Vec::new(),
                threaded: true,
                no_cache: false,
            },
        }
    }

    /// Set the category.
    pub fn category(mut self, category: Category) -> Self {
        self.metadata.category = category;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.metadata.version = version.into();
        self
    }

    /// Add an input port.
    pub fn input(mut self, port: impl Into<String>) -> Self {
        self.metadata.inputs.push(port.into());
        self
    }

    /// Add an output port.
    pub fn output(mut self, port: impl Into<String>) -> Self {
        self.metadata.outputs.push(port.into());
        self
    }

    /// Add a parameter.
    pub fn parameter(mut self, param: ParameterDefinition) -> Self {
        self.metadata.parameters.push(param);
        self
    }

    /// Add multiple tags.
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.metadata.tags.extend(tags.into_iter().map(|t| t.into()));
        self
    }

    /// Mark as running on a single thread.
    pub fn single_threaded(mut self) -> Self {
        self.metadata.threaded = false;
        self
    }

    /// Mark the output as cached by the operation itself.
    pub fn no_cache(mut self) -> Self {
        self.metadata.no_cache = true;
        self
    }

    /// Build the metadata.
    pub fn build(self) -> OperationMetadata {
        self.metadata
    }
}

/// The core trait for operations.
///
/// # Design
///
/// Processing is split the same way a demand-driven graph would call it:
///
/// 1. **Preparation** (`prepare`): Called whenever the input format or the
///    parameters may have changed. Returns the output format.
///
/// 2. **Region negotiation** (`bounding_box`, `required_region`,
///    `cached_region`): Tells the host which input pixels a request needs.
///
/// 3. **Processing** (`process`): Reads the inputs from the context, computes
///    the region of interest and stores the result on the output port.
///
/// Operations own their private state (caches, lookup tables) directly;
/// `invalidate` is the host's signal that upstream data changed.
pub trait Operation: Send {
    /// Get the metadata for this operation.
    fn metadata(&self) -> OperationMetadata;

    /// Assign a parameter value.
    fn set_parameter(&mut self, name: &str, value: Value) -> ParameterResult<()>;

    /// Current value of a parameter.
    fn parameter(&self, name: &str) -> Option<Value>;

    /// Negotiate formats; returns the output format.
    fn prepare(&mut self, input_format: Option<PixelFormat>) -> PixelFormat;

    /// Extent of the output given the input extent.
    fn bounding_box(&self, input_box: Option<Rectangle>) -> Rectangle {
        input_box.unwrap_or_default()
    }

    /// Input region needed to compute `roi`.
    fn required_region(&self, _input_box: Option<Rectangle>, roi: &Rectangle) -> Rectangle {
        *roi
    }

    /// Output region computed when `roi` is requested.
    fn cached_region(&self, _input_box: Option<Rectangle>, roi: &Rectangle) -> Rectangle {
        *roi
    }

    /// Drop any state derived from upstream data.
    fn invalidate(&mut self) {}

    /// Compute `roi` from the context's inputs into its output.
    fn process(&mut self, ctx: &mut ProcessContext, roi: &Rectangle) -> OperationResult<()>;
}
