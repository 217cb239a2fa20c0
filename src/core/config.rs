//! Compute configuration.
//!
//! Controls how much parallelism operations use and how big their working
//! chunks are. Loaded from TOML or built in code:
//!
//! ```
//! use tilework::core::config::ComputeConfig;
//!
//! let config = ComputeConfig::new()
//!     .with_threads(4)
//!     .with_chunk_size(64, 64);
//! assert!(config.validate().is_ok());
//! ```

use crate::core::buffer::{MAX_TILE_SIZE, MIN_TILE_SIZE};
use crate::core::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default per-thread cost, in pixels (one 64x64 block).
pub const DEFAULT_PIXELS_PER_THREAD: f64 = 64.0 * 64.0;

/// Default maximum chunk edge for exact-precision order statistics.
pub const DEFAULT_CHUNK_SIZE: i32 = 128;

/// Configuration shared by all operations of a processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Worker cap for the range distributor (0 = rayon pool size).
    pub threads: usize,
    /// Cost of spawning a worker, expressed in pixels of work.
    pub pixels_per_thread: f64,
    /// Maximum chunk width for exact-precision order statistics.
    pub chunk_width: i32,
    /// Maximum chunk height for exact-precision order statistics.
    pub chunk_height: i32,
    /// Tile edge of buffers created by operations.
    pub tile_size: i32,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            pixels_per_thread: DEFAULT_PIXELS_PER_THREAD,
            chunk_width: DEFAULT_CHUNK_SIZE,
            chunk_height: DEFAULT_CHUNK_SIZE,
            tile_size: crate::core::buffer::DEFAULT_TILE_SIZE,
        }
    }
}

impl ComputeConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker cap (0 = automatic).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the per-thread cost in pixels.
    pub fn with_pixels_per_thread(mut self, pixels: f64) -> Self {
        self.pixels_per_thread = pixels;
        self
    }

    /// Set the maximum chunk size for exact-precision order statistics.
    pub fn with_chunk_size(mut self, width: i32, height: i32) -> Self {
        self.chunk_width = width;
        self.chunk_height = height;
        self
    }

    /// Set the tile size of created buffers.
    pub fn with_tile_size(mut self, tile_size: i32) -> Self {
        self.tile_size = tile_size.clamp(MIN_TILE_SIZE, MAX_TILE_SIZE);
        self
    }

    /// Parse a configuration from TOML text; missing keys take defaults.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: ComputeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("Loaded compute configuration from {}", path.display());
        Ok(config)
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pixels_per_thread.is_nan() || self.pixels_per_thread <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "pixels_per_thread must be positive, got {}",
                self.pixels_per_thread
            )));
        }
        if self.chunk_width <= 0 || self.chunk_height <= 0 {
            return Err(ConfigError::Invalid(format!(
                "chunk size must be positive, got {}x{}",
                self.chunk_width, self.chunk_height
            )));
        }
        if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.tile_size) {
            return Err(ConfigError::Invalid(format!(
                "tile_size must be within [{}, {}], got {}",
                MIN_TILE_SIZE, MAX_TILE_SIZE, self.tile_size
            )));
        }
        Ok(())
    }
}
