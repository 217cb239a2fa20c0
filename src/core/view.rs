//! Two-dimensional views over flat pixel slices.
//!
//! Operations read a rectangle from a buffer into a `Vec<f32>` and then walk
//! it through these views instead of doing offset arithmetic by hand.

/// Read-only row-major view.
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a> {
    data: &'a [f32],
    width: usize,
    height: usize,
    stride: usize,
    components: usize,
}

/// Mutable row-major view.
#[derive(Debug)]
pub struct PixelViewMut<'a> {
    data: &'a mut [f32],
    width: usize,
    height: usize,
    stride: usize,
    components: usize,
}

impl<'a> PixelView<'a> {
    /// View over tightly packed rows (`stride = width * components`).
    pub fn new(data: &'a [f32], width: usize, height: usize, components: usize) -> Self {
        Self::with_stride(data, width, height, width * components, components)
    }

    /// View with an explicit row stride, in floats.
    pub fn with_stride(
        data: &'a [f32],
        width: usize,
        height: usize,
        stride: usize,
        components: usize,
    ) -> Self {
        debug_assert!(stride >= width * components);
        debug_assert!(height == 0 || data.len() >= (height - 1) * stride + width * components);
        Self {
            data,
            width,
            height,
            stride,
            components,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in floats.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// Offset of pixel `(x, y)` in the underlying slice.
    pub fn offset(&self, x: usize, y: usize) -> usize {
        y * self.stride + x * self.components
    }

    /// Components of pixel `(x, y)`.
    pub fn pixel(&self, x: usize, y: usize) -> &'a [f32] {
        let at = self.offset(x, y);
        &self.data[at..at + self.components]
    }

    /// Single component of pixel `(x, y)`.
    pub fn get(&self, x: usize, y: usize, component: usize) -> f32 {
        self.data[self.offset(x, y) + component]
    }

    /// Pixels of row `y`.
    pub fn row(&self, y: usize) -> &'a [f32] {
        let at = y * self.stride;
        &self.data[at..at + self.width * self.components]
    }

    /// The underlying slice.
    pub fn data(&self) -> &'a [f32] {
        self.data
    }
}

impl<'a> PixelViewMut<'a> {
    /// View over tightly packed rows (`stride = width * components`).
    pub fn new(data: &'a mut [f32], width: usize, height: usize, components: usize) -> Self {
        Self::with_stride(data, width, height, width * components, components)
    }

    /// View with an explicit row stride, in floats.
    pub fn with_stride(
        data: &'a mut [f32],
        width: usize,
        height: usize,
        stride: usize,
        components: usize,
    ) -> Self {
        debug_assert!(stride >= width * components);
        debug_assert!(height == 0 || data.len() >= (height - 1) * stride + width * components);
        Self {
            data,
            width,
            height,
            stride,
            components,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn offset(&self, x: usize, y: usize) -> usize {
        y * self.stride + x * self.components
    }

    pub fn pixel(&self, x: usize, y: usize) -> &[f32] {
        let at = self.offset(x, y);
        &self.data[at..at + self.components]
    }

    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [f32] {
        let at = self.offset(x, y);
        &mut self.data[at..at + self.components]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let at = y * self.stride;
        &mut self.data[at..at + self.width * self.components]
    }

    /// Reborrow as a read-only view.
    pub fn as_view(&self) -> PixelView<'_> {
        PixelView::with_stride(self.data, self.width, self.height, self.stride, self.components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strided_access() {
        // 2x2 RG pixels with one float of row padding
        let data = [1.0, 2.0, 3.0, 4.0, 0.0, 5.0, 6.0, 7.0, 8.0, 0.0];
        let view = PixelView::with_stride(&data, 2, 2, 5, 2);

        assert_eq!(view.pixel(1, 0), &[3.0, 4.0]);
        assert_eq!(view.get(0, 1, 1), 6.0);
        assert_eq!(view.row(1), &[5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_mutation() {
        let mut data = vec![0.0f32; 6];
        let mut view = PixelViewMut::new(&mut data, 3, 2, 1);
        view.pixel_mut(2, 1)[0] = 9.0;
        view.row_mut(0).fill(1.0);

        assert_eq!(view.as_view().get(2, 1, 0), 9.0);
        assert_eq!(data, vec![1.0, 1.0, 1.0, 0.0, 0.0, 9.0]);
    }
}
