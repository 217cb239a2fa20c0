//! Parameter definitions and constraints.
//!
//! Parameters define the configurable surface of an operation. Each
//! parameter has a type, a default and constraints that assigned values
//! must satisfy. Clamping is the host's job; operations reject out-of-range
//! values instead of silently adjusting them.

use crate::core::error::{ParameterError, ParameterResult};
use crate::core::types::{Value, ValueType};
use serde::{Deserialize, Serialize};

/// UI hints for parameter display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "widget", content = "options")]
pub enum UiHint {
    /// Default input widget based on type
    #[default]
    Default,
    /// Slider for numeric values
    Slider {
        /// Whether to use logarithmic scale
        logarithmic: bool,
    },
    /// Dropdown for selecting from options
    Dropdown,
    /// Checkbox for booleans
    Checkbox,
    /// Spin box for integers
    SpinBox,
    /// On-canvas path editor
    PathEditor,
}

/// Definition of an operation parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Unique name within the operation
    pub name: String,
    /// Human-readable name
    pub display_name: String,
    /// Type of the parameter
    pub param_type: ValueType,
    /// Default value
    pub default_value: Value,
    /// Description for documentation
    pub description: String,
    /// Constraints for validation
    pub constraints: Vec<Constraint>,
    /// UI widget hint
    pub ui_hint: UiHint,
}

/// Constraints that can be applied to parameter values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "params")]
pub enum Constraint {
    /// Numeric value must be within range [min, max]
    Range { min: f64, max: f64 },
    /// Choice must be one of the listed names
    OneOf(Vec<String>),
}

// ============================================================================
// ParameterDefinition Builder Pattern
// ============================================================================

impl ParameterDefinition {
    /// Create a new parameter definition.
    pub fn new(name: impl Into<String>, param_type: ValueType, default_value: Value) -> Self {
        let name = name.into();
        Self {
            display_name: Self::name_to_display(&name),
            name,
            param_type,
            default_value,
            description: String::new(),
            constraints: Vec::new(),
            ui_hint: UiHint::Default,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a range constraint and set UI hint to slider.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        if matches!(self.ui_hint, UiHint::Default) {
            self.ui_hint = UiHint::Slider { logarithmic: false };
        }
        self
    }

    /// Restrict a choice parameter to the given names.
    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.constraints.push(Constraint::OneOf(
            choices.iter().map(|c| c.to_string()).collect(),
        ));
        self.ui_hint = UiHint::Dropdown;
        self
    }

    /// Set UI hint to logarithmic slider.
    pub fn logarithmic(mut self) -> Self {
        self.ui_hint = UiHint::Slider { logarithmic: true };
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Set the UI hint.
    pub fn with_ui_hint(mut self, ui_hint: UiHint) -> Self {
        self.ui_hint = ui_hint;
        self
    }

    /// Convert kebab-case or snake_case name to Title Case display name.
    fn name_to_display(name: &str) -> String {
        name.split(['_', '-'])
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Validate a value against this parameter's type and constraints.
    pub fn validate(&self, value: &Value) -> ParameterResult<()> {
        if !self.param_type.matches(value) {
            return Err(ParameterError::TypeMismatch {
                name: self.name.clone(),
                expected: self.param_type,
                got: value.get_type(),
            });
        }

        for constraint in &self.constraints {
            constraint.validate(&self.name, value)?;
        }

        Ok(())
    }
}

// ============================================================================
// Constraint Validation
// ============================================================================

impl Constraint {
    /// Validate a value against this constraint.
    pub fn validate(&self, name: &str, value: &Value) -> ParameterResult<()> {
        match self {
            Constraint::Range { min, max } => {
                if let Some(num) = value.as_float() {
                    if num.is_nan() || num < *min || num > *max {
                        return Err(ParameterError::OutOfRange {
                            name: name.to_string(),
                            value: num,
                            min: *min,
                            max: *max,
                        });
                    }
                }
            }

            Constraint::OneOf(choices) => {
                if let Some(choice) = value.as_choice() {
                    if !choices.iter().any(|c| c == choice) {
                        return Err(ParameterError::InvalidChoice {
                            name: name.to_string(),
                            value: choice.to_string(),
                            choices: choices.clone(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Get a human-readable description of this constraint.
    pub fn description(&self) -> String {
        match self {
            Constraint::Range { min, max } => format!("Must be between {} and {}", min, max),
            Constraint::OneOf(options) => format!("One of: {}", options.join(", ")),
        }
    }
}
