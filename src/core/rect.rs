//! Integer pixel rectangles.
//!
//! Every region request, buffer extent and working area is a `Rectangle`.
//! Coordinates may be negative: buffers are not anchored at the origin and
//! area filters routinely ask for context beyond an input's extent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rectangular region of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rectangle {
    /// X offset of the left column
    pub x: i32,
    /// Y offset of the top row
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

/// Return the smallest range of pixels `[min, max]` whose centers lie
/// inside `[min_coord, max_coord]`.
///
/// The range is empty (`max < min`) when no pixel center is covered.
pub fn pixel_range(min_coord: f32, max_coord: f32) -> (i32, i32) {
    (
        (min_coord - 0.5).ceil() as i32,
        (max_coord - 0.5).floor() as i32,
    )
}

impl Rectangle {
    /// Create a new rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest rectangle of pixels whose centers lie inside the horizontal
    /// range `[min_x, max_x]` and the vertical range `[min_y, max_y]`.
    pub fn pixel_extent(min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Self {
        let (x0, x1) = pixel_range(min_x, max_x);
        let (y0, y1) = pixel_range(min_y, max_y);
        Self::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1)
    }

    /// Get the right edge coordinate (exclusive).
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Get the bottom edge coordinate (exclusive).
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Calculate the area of this rectangle in pixels (0 when empty).
    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width as usize * self.height as usize
        }
    }

    /// Whether the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection of two rectangles, `None` when they do not overlap.
    pub fn intersect(&self, other: &Rectangle) -> Option<Rectangle> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(Rectangle::new(x0, y0, x1 - x0, y1 - y0))
        }
    }

    /// Bounding rectangle of both; empty rectangles do not contribute.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }

        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());

        Rectangle::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rectangle) -> bool {
        if other.is_empty() {
            return true;
        }
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Whether the pixel `(x, y)` lies inside this rectangle.
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Grow the rectangle by the given amount on each side.
    pub fn expand(&self, left: i32, right: i32, top: i32, bottom: i32) -> Rectangle {
        Rectangle::new(
            self.x - left,
            self.y - top,
            self.width + left + right,
            self.height + top + bottom,
        )
    }

    /// Grow the rectangle by `amount` on every side.
    pub fn expand_uniform(&self, amount: i32) -> Rectangle {
        self.expand(amount, amount, amount, amount)
    }

    /// Move the rectangle by `(dx, dy)`.
    pub fn translate(&self, dx: i32, dy: i32) -> Rectangle {
        Rectangle::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_intersect() {
        let a = Rectangle::new(0, 0, 10, 10);
        let b = Rectangle::new(5, -5, 10, 10);

        assert_eq!(a.intersect(&b), Some(Rectangle::new(5, 0, 5, 5)));
        assert_eq!(a.intersect(&Rectangle::new(10, 0, 5, 5)), None);
    }

    #[test]
    fn test_union_ignores_empty() {
        let a = Rectangle::new(2, 3, 4, 5);
        assert_eq!(a.union(&Rectangle::default()), a);
        assert_eq!(
            a.union(&Rectangle::new(-1, 0, 1, 1)),
            Rectangle::new(-1, 0, 7, 8)
        );
    }

    #[test]
    fn test_pixel_extent() {
        // Centers at 0.5 .. 3.5 are inside [0, 4]
        assert_eq!(
            Rectangle::pixel_extent(0.0, 4.0, 0.0, 4.0),
            Rectangle::new(0, 0, 4, 4)
        );
        // A stamp of size 4 centered at (10, 0)
        assert_eq!(
            Rectangle::pixel_extent(8.0, 12.0, -2.0, 2.0),
            Rectangle::new(8, -2, 4, 4)
        );
        // Range too narrow to cover any pixel center
        assert!(Rectangle::pixel_extent(0.6, 1.4, 0.0, 1.0).is_empty());
    }

    #[test]
    fn test_expand_and_contains() {
        let roi = Rectangle::new(4, 4, 8, 8);
        let grown = roi.expand_uniform(3);

        assert_eq!(grown, Rectangle::new(1, 1, 14, 14));
        assert!(grown.contains(&roi));
        assert!(!roi.contains(&grown));
        assert!(grown.contains_point(1, 14));
        assert!(!grown.contains_point(15, 1));
    }

    fn rect_strategy() -> impl Strategy<Value = Rectangle> {
        (-50i32..50, -50i32..50, 0i32..40, 0i32..40)
            .prop_map(|(x, y, w, h)| Rectangle::new(x, y, w, h))
    }

    proptest! {
        #[test]
        fn prop_intersection_is_contained(a in rect_strategy(), b in rect_strategy()) {
            if let Some(i) = a.intersect(&b) {
                prop_assert!(a.contains(&i));
                prop_assert!(b.contains(&i));
                prop_assert_eq!(Some(i), b.intersect(&a));
            }
        }

        #[test]
        fn prop_union_contains_both(a in rect_strategy(), b in rect_strategy()) {
            let u = a.union(&b);
            prop_assert!(u.contains(&a));
            prop_assert!(u.contains(&b));
        }
    }
}
