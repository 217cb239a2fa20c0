//! Neighborhood shapes as per-row half-widths.

use serde::{Deserialize, Serialize};

/// Shape of the window around each pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Neighborhood {
    Square,
    #[default]
    Circle,
    Diamond,
}

impl Neighborhood {
    pub const ALL: [Neighborhood; 3] = [
        Neighborhood::Square,
        Neighborhood::Circle,
        Neighborhood::Diamond,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Neighborhood::Square => "square",
            Neighborhood::Circle => "circle",
            Neighborhood::Diamond => "diamond",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.name() == name)
    }
}

/// Half-width of the window at each row offset `0..=radius` from its center.
///
/// Row offset `i` covers columns `-half_width(|i|)..=half_width(|i|)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    neighborhood: Neighborhood,
    half_widths: Vec<i32>,
}

impl Outline {
    pub fn new(neighborhood: Neighborhood, radius: usize) -> Self {
        let r = radius as f64;
        let half_widths = (0..=radius)
            .map(|i| match neighborhood {
                Neighborhood::Square => radius as i32,
                Neighborhood::Circle => ((r + 0.5) * (r + 0.5) - (i * i) as f64).sqrt() as i32,
                Neighborhood::Diamond => (radius - i) as i32,
            })
            .collect();

        Self {
            neighborhood,
            half_widths,
        }
    }

    pub fn neighborhood(&self) -> Neighborhood {
        self.neighborhood
    }

    pub fn radius(&self) -> usize {
        self.half_widths.len() - 1
    }

    /// Half-width of row offset `i` (`0 <= i <= radius`).
    pub fn half_width(&self, i: usize) -> i32 {
        self.half_widths[i]
    }

    /// Number of pixels inside the window.
    pub fn window_size(&self) -> usize {
        let r = self.radius() as i32;
        (-r..=r)
            .map(|i| 2 * self.half_width(i.unsigned_abs() as usize) as usize + 1)
            .sum()
    }

    /// Whether offset `(dx, dy)` from the center lies inside the window.
    pub fn contains(&self, dx: i32, dy: i32) -> bool {
        let row = dy.unsigned_abs() as usize;
        row <= self.radius() && dx.abs() <= self.half_width(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        assert_eq!(
            Outline::new(Neighborhood::Square, 2).half_widths,
            vec![2, 2, 2]
        );
        assert_eq!(
            Outline::new(Neighborhood::Diamond, 3).half_widths,
            vec![3, 2, 1, 0]
        );
        // sqrt(3.5^2 - i^2) truncated
        assert_eq!(
            Outline::new(Neighborhood::Circle, 3).half_widths,
            vec![3, 3, 2, 1]
        );
    }

    #[test]
    fn test_window_size() {
        assert_eq!(Outline::new(Neighborhood::Square, 2).window_size(), 25);
        assert_eq!(Outline::new(Neighborhood::Diamond, 2).window_size(), 13);
        assert_eq!(Outline::new(Neighborhood::Circle, 0).window_size(), 1);
        assert_eq!(Outline::new(Neighborhood::Circle, 3).window_size(), 37);
    }

    #[test]
    fn test_contains() {
        let outline = Outline::new(Neighborhood::Diamond, 2);
        assert!(outline.contains(1, -1));
        assert!(!outline.contains(2, 1));
        assert!(!outline.contains(0, 3));
    }

    #[test]
    fn test_names() {
        for n in Neighborhood::ALL {
            assert_eq!(Neighborhood::from_name(n.name()), Some(n));
        }
        assert_eq!(Neighborhood::from_name("hexagon"), None);
    }
}
