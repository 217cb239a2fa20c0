//! Pixel formats and abyss policies.
//!
//! A `PixelFormat` is an opaque tag: operations only ask it how many floats
//! make up a pixel and whether the last one is alpha. No color conversion
//! happens anywhere in the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel layout of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorModel {
    /// Single luminance channel
    Y,
    /// Luminance with alpha
    YA,
    /// Red, green, blue
    RGB,
    /// Red, green, blue with alpha
    RGBA,
    /// Two-component displacement vector
    Vector2,
}

/// Numeric encoding of the color components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Linear light
    #[default]
    Linear,
    /// Gamma/perceptually encoded
    Perceptual,
}

/// Pixel format: channel layout plus numeric encoding, always 32-bit float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelFormat {
    pub model: ColorModel,
    pub encoding: Encoding,
}

/// Rule for synthesizing pixels requested outside a buffer's extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbyssPolicy {
    /// Outside pixels read as zero
    #[default]
    None,
    /// Replicate the nearest edge pixel
    Clamp,
    /// Wrap around the extent
    Loop,
}

// ============================================================================
// PixelFormat Implementation
// ============================================================================

impl PixelFormat {
    /// Create a new pixel format.
    pub const fn new(model: ColorModel, encoding: Encoding) -> Self {
        Self { model, encoding }
    }

    /// Linear single channel.
    pub const fn y() -> Self {
        Self::new(ColorModel::Y, Encoding::Linear)
    }

    /// Linear luminance with alpha.
    pub const fn ya() -> Self {
        Self::new(ColorModel::YA, Encoding::Linear)
    }

    /// Linear RGB.
    pub const fn rgb() -> Self {
        Self::new(ColorModel::RGB, Encoding::Linear)
    }

    /// Linear RGBA.
    pub const fn rgba() -> Self {
        Self::new(ColorModel::RGBA, Encoding::Linear)
    }

    /// Two-component float displacement field.
    pub const fn vector2() -> Self {
        Self::new(ColorModel::Vector2, Encoding::Linear)
    }

    /// Number of floats per pixel.
    pub fn n_components(&self) -> usize {
        match self.model {
            ColorModel::Y => 1,
            ColorModel::YA | ColorModel::Vector2 => 2,
            ColorModel::RGB => 3,
            ColorModel::RGBA => 4,
        }
    }

    /// Whether the last component is alpha.
    pub fn has_alpha(&self) -> bool {
        matches!(self.model, ColorModel::YA | ColorModel::RGBA)
    }

    /// Number of non-alpha components.
    pub fn n_color_components(&self) -> usize {
        self.n_components() - usize::from(self.has_alpha())
    }

    /// Same layout with a different encoding.
    pub fn with_encoding(self, encoding: Encoding) -> Self {
        Self { encoding, ..self }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = match self.model {
            ColorModel::Y => "Y",
            ColorModel::YA => "YA",
            ColorModel::RGB => "RGB",
            ColorModel::RGBA => "RGBA",
            ColorModel::Vector2 => "XY",
        };
        let encoding = match self.encoding {
            Encoding::Linear => "",
            Encoding::Perceptual => "'",
        };
        write!(f, "{}{} float", model, encoding)
    }
}

impl AbyssPolicy {
    /// Map a coordinate outside `[start, start + len)` according to the policy.
    ///
    /// Returns `None` when the pixel should read as zero.
    pub fn resolve(&self, coord: i32, start: i32, len: i32) -> Option<i32> {
        if len <= 0 {
            return None;
        }
        if coord >= start && coord < start + len {
            return Some(coord);
        }
        match self {
            AbyssPolicy::None => None,
            AbyssPolicy::Clamp => Some(coord.clamp(start, start + len - 1)),
            AbyssPolicy::Loop => Some(start + (coord - start).rem_euclid(len)),
        }
    }
}
