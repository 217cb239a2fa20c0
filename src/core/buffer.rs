//! Tiled in-memory pixel buffers.
//!
//! A `Buffer` stores 32-bit float pixels in square tiles laid out over its
//! extent. Tiles are reference counted, so duplicating a buffer only copies
//! the tile table; the first write to a shared tile copies that tile alone.
//! This is what lets an operation hand its cached result downstream as a
//! `SharedBuffer` without copying pixel data.
//!
//! # Example
//!
//! ```
//! use tilework::core::buffer::{Buffer, BufferAccess};
//! use tilework::core::format::{AbyssPolicy, PixelFormat};
//! use tilework::core::rect::Rectangle;
//!
//! let mut buffer = Buffer::new(Rectangle::new(0, 0, 4, 4), PixelFormat::y());
//! buffer.set(&Rectangle::new(1, 1, 1, 1), PixelFormat::y(), &[0.5]).unwrap();
//!
//! let data = buffer.get(&Rectangle::new(0, 0, 2, 2), PixelFormat::y(), AbyssPolicy::None).unwrap();
//! assert_eq!(data, vec![0.0, 0.0, 0.0, 0.5]);
//! ```

use crate::core::error::{OperationError, OperationResult};
use crate::core::format::{AbyssPolicy, PixelFormat};
use crate::core::rect::Rectangle;
use std::sync::Arc;

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: i32 = 128;

/// Minimum tile edge in pixels.
pub const MIN_TILE_SIZE: i32 = 8;

/// Maximum tile edge in pixels.
pub const MAX_TILE_SIZE: i32 = 4096;

/// A buffer handle shared between operations.
///
/// Holders must treat the buffer as read-only; mutation goes through
/// `Arc::make_mut`, which forks the tile table first when it is shared.
pub type SharedBuffer = Arc<Buffer>;

/// Region based pixel access with abyss handling.
///
/// Every call transfers a whole rectangle at once: operations read their
/// working data in bulk, compute on plain slices and write back in bulk.
pub trait BufferAccess {
    /// Rectangle of defined pixels.
    fn extent(&self) -> Rectangle;

    /// Native pixel format.
    fn format(&self) -> PixelFormat;

    /// Read `rect` as row-major floats, synthesizing outside pixels with `abyss`.
    fn get(&self, rect: &Rectangle, format: PixelFormat, abyss: AbyssPolicy)
        -> OperationResult<Vec<f32>>;

    /// Write row-major floats into `rect`; pixels outside the extent are dropped.
    fn set(&mut self, rect: &Rectangle, format: PixelFormat, data: &[f32]) -> OperationResult<()>;
}

/// Tiled, copy-on-write float buffer.
#[derive(Debug, Clone)]
pub struct Buffer {
    extent: Rectangle,
    format: PixelFormat,
    tile_size: i32,
    tiles_x: usize,
    tiles: Vec<Arc<Vec<f32>>>,
}

impl Buffer {
    /// Create a zero-filled buffer with the default tile size.
    pub fn new(extent: Rectangle, format: PixelFormat) -> Self {
        Self::with_tile_size(extent, format, DEFAULT_TILE_SIZE)
    }

    /// Create a zero-filled buffer with a specific tile size.
    ///
    /// The tile size is clamped to `[MIN_TILE_SIZE, MAX_TILE_SIZE]`.
    pub fn with_tile_size(extent: Rectangle, format: PixelFormat, tile_size: i32) -> Self {
        let tile_size = tile_size.clamp(MIN_TILE_SIZE, MAX_TILE_SIZE);
        let (tiles_x, tiles_y) = if extent.is_empty() {
            (0, 0)
        } else {
            (
                ((extent.width + tile_size - 1) / tile_size) as usize,
                ((extent.height + tile_size - 1) / tile_size) as usize,
            )
        };
        let tile_len = (tile_size * tile_size) as usize * format.n_components();
        let blank = Arc::new(vec![0.0f32; tile_len]);

        Self {
            extent,
            format,
            tile_size,
            tiles_x,
            // All tiles start out sharing one zero tile.
            tiles: vec![blank; tiles_x * tiles_y],
        }
    }

    /// Create a buffer holding `data` (row-major, covering `extent`).
    pub fn from_data(extent: Rectangle, format: PixelFormat, data: &[f32]) -> OperationResult<Self> {
        let mut buffer = Self::new(extent, format);
        buffer.set(&extent, format, data)?;
        Ok(buffer)
    }

    /// Duplicate the buffer. Pixel data is shared until written.
    pub fn dup(&self) -> Self {
        self.clone()
    }

    /// Tile edge in pixels.
    pub fn tile_size(&self) -> i32 {
        self.tile_size
    }

    /// Number of tiles in the grid.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Number of tiles whose storage is shared with `other`.
    pub fn shared_tiles(&self, other: &Buffer) -> usize {
        self.tiles
            .iter()
            .zip(other.tiles.iter())
            .filter(|(a, b)| Arc::ptr_eq(a, b))
            .count()
    }

    /// Read a single pixel inside the extent.
    pub fn pixel(&self, x: i32, y: i32) -> Option<&[f32]> {
        if !self.extent.contains_point(x, y) {
            return None;
        }
        let (tile, offset) = self.locate(x, y);
        let n = self.format.n_components();
        Some(&self.tiles[tile][offset..offset + n])
    }

    /// Read the whole extent.
    pub fn to_vec(&self) -> Vec<f32> {
        self.read_unchecked(&self.extent, AbyssPolicy::None)
    }

    /// Tile index and float offset of a pixel inside the extent.
    fn locate(&self, x: i32, y: i32) -> (usize, usize) {
        let lx = x - self.extent.x;
        let ly = y - self.extent.y;
        let tile = (ly / self.tile_size) as usize * self.tiles_x + (lx / self.tile_size) as usize;
        let px = lx % self.tile_size;
        let py = ly % self.tile_size;
        let offset = (py * self.tile_size + px) as usize * self.format.n_components();
        (tile, offset)
    }

    fn check_format(&self, format: PixelFormat) -> OperationResult<()> {
        if format.n_components() != self.format.n_components() {
            return Err(OperationError::FormatMismatch {
                expected: self.format,
                got: format,
            });
        }
        Ok(())
    }

    /// Copy the pixels `[x0, x1)` of row `y` (all inside the extent) into `dst`.
    fn copy_span_out(&self, y: i32, x0: i32, x1: i32, dst: &mut [f32]) {
        let n = self.format.n_components();
        let mut x = x0;
        let mut out = 0;
        while x < x1 {
            let (tile, offset) = self.locate(x, y);
            let tile_end = self.extent.x + ((x - self.extent.x) / self.tile_size + 1) * self.tile_size;
            let run = (tile_end.min(x1) - x) as usize;
            dst[out..out + run * n].copy_from_slice(&self.tiles[tile][offset..offset + run * n]);
            out += run * n;
            x += run as i32;
        }
    }

    /// Copy `src` into the pixels `[x0, x1)` of row `y` (all inside the extent).
    fn copy_span_in(&mut self, y: i32, x0: i32, x1: i32, src: &[f32]) {
        let n = self.format.n_components();
        let mut x = x0;
        let mut read = 0;
        while x < x1 {
            let (tile, offset) = self.locate(x, y);
            let tile_end = self.extent.x + ((x - self.extent.x) / self.tile_size + 1) * self.tile_size;
            let run = (tile_end.min(x1) - x) as usize;
            let data = Arc::make_mut(&mut self.tiles[tile]);
            data[offset..offset + run * n].copy_from_slice(&src[read..read + run * n]);
            read += run * n;
            x += run as i32;
        }
    }

    fn read_unchecked(&self, rect: &Rectangle, abyss: AbyssPolicy) -> Vec<f32> {
        let n = self.format.n_components();
        let mut out = vec![0.0f32; rect.area() * n];
        if rect.is_empty() || self.extent.is_empty() {
            return out;
        }

        let row_len = rect.width as usize * n;
        let inner_x0 = rect.x.max(self.extent.x);
        let inner_x1 = rect.right().min(self.extent.right());

        for (row, dst) in out.chunks_exact_mut(row_len).enumerate() {
            let y = rect.y + row as i32;
            let Some(sy) = abyss.resolve(y, self.extent.y, self.extent.height) else {
                continue;
            };

            if inner_x0 < inner_x1 {
                let start = (inner_x0 - rect.x) as usize * n;
                let end = (inner_x1 - rect.x) as usize * n;
                self.copy_span_out(sy, inner_x0, inner_x1, &mut dst[start..end]);
            }

            if abyss == AbyssPolicy::None {
                continue;
            }
            let outside = (rect.x..rect.right()).filter(|&x| x < inner_x0 || x >= inner_x1);
            for x in outside {
                if let Some(sx) = abyss.resolve(x, self.extent.x, self.extent.width) {
                    let (tile, offset) = self.locate(sx, sy);
                    let at = (x - rect.x) as usize * n;
                    dst[at..at + n].copy_from_slice(&self.tiles[tile][offset..offset + n]);
                }
            }
        }

        out
    }
}

impl BufferAccess for Buffer {
    fn extent(&self) -> Rectangle {
        self.extent
    }

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn get(
        &self,
        rect: &Rectangle,
        format: PixelFormat,
        abyss: AbyssPolicy,
    ) -> OperationResult<Vec<f32>> {
        self.check_format(format)?;
        Ok(self.read_unchecked(rect, abyss))
    }

    fn set(&mut self, rect: &Rectangle, format: PixelFormat, data: &[f32]) -> OperationResult<()> {
        self.check_format(format)?;
        let n = self.format.n_components();
        let expected = rect.area() * n;
        if data.len() != expected {
            return Err(OperationError::SizeMismatch {
                expected,
                got: data.len(),
            });
        }

        let Some(clip) = rect.intersect(&self.extent) else {
            return Ok(());
        };

        let row_len = rect.width as usize * n;
        for y in clip.y..clip.bottom() {
            let row = (y - rect.y) as usize * row_len;
            let start = row + (clip.x - rect.x) as usize * n;
            let end = start + clip.width as usize * n;
            self.copy_span_in(y, clip.x, clip.right(), &data[start..end]);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(extent: Rectangle) -> Buffer {
        let data: Vec<f32> = (0..extent.area()).map(|i| i as f32).collect();
        Buffer::from_data(extent, PixelFormat::y(), &data).unwrap()
    }

    #[test]
    fn test_round_trip_across_tiles() {
        let extent = Rectangle::new(-5, 3, 40, 30);
        let data: Vec<f32> = (0..extent.area() * 2).map(|i| i as f32 * 0.5).collect();
        let mut buffer = Buffer::with_tile_size(extent, PixelFormat::vector2(), 8);
        buffer.set(&extent, PixelFormat::vector2(), &data).unwrap();

        assert!(buffer.tile_count() > 1);
        assert_eq!(buffer.to_vec(), data);
        assert_eq!(buffer.pixel(-5, 3), Some(&[0.0f32, 0.5][..]));
    }

    #[test]
    fn test_abyss_policies() {
        let buffer = ramp(Rectangle::new(0, 0, 3, 2));
        let rect = Rectangle::new(-1, 0, 5, 1);

        let none = buffer.get(&rect, PixelFormat::y(), AbyssPolicy::None).unwrap();
        assert_eq!(none, vec![0.0, 0.0, 1.0, 2.0, 0.0]);

        let clamp = buffer.get(&rect, PixelFormat::y(), AbyssPolicy::Clamp).unwrap();
        assert_eq!(clamp, vec![0.0, 0.0, 1.0, 2.0, 2.0]);

        let wrap = buffer.get(&rect, PixelFormat::y(), AbyssPolicy::Loop).unwrap();
        assert_eq!(wrap, vec![2.0, 0.0, 1.0, 2.0, 0.0]);

        let below = buffer
            .get(&Rectangle::new(0, 2, 3, 1), PixelFormat::y(), AbyssPolicy::Clamp)
            .unwrap();
        assert_eq!(below, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_set_clips_to_extent() {
        let mut buffer = Buffer::new(Rectangle::new(0, 0, 2, 2), PixelFormat::y());
        buffer
            .set(&Rectangle::new(1, 1, 2, 2), PixelFormat::y(), &[1.0, 2.0, 3.0, 4.0])
            .unwrap();
        assert_eq!(buffer.to_vec(), vec![0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_component_mismatch_is_rejected() {
        let buffer = Buffer::new(Rectangle::new(0, 0, 2, 2), PixelFormat::rgb());
        let result = buffer.get(&buffer.extent(), PixelFormat::rgba(), AbyssPolicy::None);
        assert!(matches!(result, Err(OperationError::FormatMismatch { .. })));
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let mut buffer = Buffer::new(Rectangle::new(0, 0, 2, 2), PixelFormat::y());
        let result = buffer.set(&Rectangle::new(0, 0, 2, 2), PixelFormat::y(), &[1.0]);
        assert!(matches!(
            result,
            Err(OperationError::SizeMismatch { expected: 4, got: 1 })
        ));
    }

    #[test]
    fn test_copy_on_write_tiles() {
        let extent = Rectangle::new(0, 0, 32, 32);
        let original = Buffer::with_tile_size(extent, PixelFormat::y(), 16);
        let original = ramp_into(original);
        let mut copy = original.dup();

        assert_eq!(copy.shared_tiles(&original), 4);
        copy.set(&Rectangle::new(20, 20, 1, 1), PixelFormat::y(), &[-1.0])
            .unwrap();

        assert_eq!(copy.shared_tiles(&original), 3);
        assert_eq!(original.pixel(20, 20), Some(&[660.0f32][..]));
        assert_eq!(copy.pixel(20, 20), Some(&[-1.0f32][..]));
    }

    fn ramp_into(mut buffer: Buffer) -> Buffer {
        let extent = buffer.extent();
        let data: Vec<f32> = (0..extent.area()).map(|i| i as f32).collect();
        buffer.set(&extent, PixelFormat::y(), &data).unwrap();
        buffer
    }
}
