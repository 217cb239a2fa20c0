//! Core value types of the operation parameter surface.
//!
//! The type system uses an enum-based approach for several reasons:
//! - Closed set of types: operations only take numbers, flags, choices and paths
//! - Zero-cost pattern matching: Compiler optimizes to jump tables
//! - Serialization: serde handles enums natively
//! - Type safety: Exhaustive matching catches missing cases at compile time

use crate::core::rect::Rectangle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Values that can be assigned to an operation parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum Value {
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Name of one enumerated option
    Choice(String),
    /// A stroke path
    Path(Stroke),
}

/// Parameter types for type checking assignments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Integer,
    Float,
    Boolean,
    Choice,
    Path,
}

/// A point of a stroke, in buffer coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
}

/// An ordered, append-only sequence of path points.
///
/// A stroke only ever grows at its end; consumers walk it forward and compare
/// prefixes to find out what they have not seen yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Stroke {
    points: Vec<PathPoint>,
}

// ============================================================================
// Value Implementation
// ============================================================================

impl Value {
    /// Get the type of this value.
    pub fn get_type(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Choice(_) => ValueType::Choice,
            Value::Path(_) => ValueType::Path,
        }
    }

    /// Try to get this value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        if let Value::Integer(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    /// Try to get this value as a float.
    /// Integers are automatically converted to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    /// Try to get this value as a choice name.
    pub fn as_choice(&self) -> Option<&str> {
        if let Value::Choice(s) = self {
            Some(s)
        } else {
            None
        }
    }

    /// Try to get this value as a stroke.
    pub fn as_path(&self) -> Option<&Stroke> {
        if let Value::Path(p) = self {
            Some(p)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{:.4}", fl),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Choice(s) => write!(f, "{}", s),
            Value::Path(p) => write!(f, "Path[{} points]", p.len()),
        }
    }
}

impl From<Stroke> for Value {
    fn from(stroke: Stroke) -> Self {
        Value::Path(stroke)
    }
}

// ============================================================================
// ValueType Implementation
// ============================================================================

impl ValueType {
    /// Check if a value can be assigned to a parameter of this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            // Integer can be used where float is expected (implicit conversion)
            (ValueType::Float, Value::Integer(_)) => true,
            (expected, value) => *expected == value.get_type(),
        }
    }

    /// Get a human-readable name for this type.
    pub fn display_name(&self) -> &'static str {
        match self {
            ValueType::Integer => "Integer",
            ValueType::Float => "Float",
            ValueType::Boolean => "Boolean",
            ValueType::Choice => "Choice",
            ValueType::Path => "Path",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Stroke Implementation
// ============================================================================

impl PathPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &PathPoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Linear interpolation towards `other`.
    pub fn lerp(&self, other: &PathPoint, t: f64) -> PathPoint {
        PathPoint::new(
            self.x + t * (other.x - self.x),
            self.y + t * (other.y - self.y),
        )
    }
}

impl Stroke {
    /// Create an empty stroke.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stroke from a list of points.
    pub fn from_points(points: impl IntoIterator<Item = PathPoint>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    /// Append a point at the end of the stroke.
    pub fn push(&mut self, point: PathPoint) {
        self.points.push(point);
    }

    /// Copy of this stroke extended by `points`.
    pub fn extended(&self, points: impl IntoIterator<Item = PathPoint>) -> Stroke {
        let mut stroke = self.clone();
        stroke.points.extend(points);
        stroke
    }

    /// The points of the stroke, in order.
    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Pixel rectangle covering every point grown by `margin` on each side.
    pub fn bounds(&self, margin: f64) -> Rectangle {
        let Some(first) = self.points.first() else {
            return Rectangle::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for point in &self.points[1..] {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        let x0 = (min_x - margin).floor() as i32;
        let y0 = (min_y - margin).floor() as i32;
        let x1 = (max_x + margin).ceil() as i32;
        let y1 = (max_y + margin).ceil() as i32;
        Rectangle::new(x0, y0, x1 - x0, y1 - y0)
    }
}

impl FromIterator<PathPoint> for Stroke {
    fn from_iter<I: IntoIterator<Item = PathPoint>>(iter: I) -> Self {
        Self::from_points(iter)
    }
}

impl From<Vec<(f64, f64)>> for Stroke {
    fn from(points: Vec<(f64, f64)>) -> Self {
        points.into_iter().map(|(x, y)| PathPoint::new(x, y)).collect()
    }
}
