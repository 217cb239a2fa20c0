//! Radial falloff lookup table for warp stamps.

/// Hardness values closer to 1 than this produce a flat (all-ones) falloff.
const HARDNESS_EPSILON: f64 = 0.000_000_4;

/// Piecewise-quadratic bell approximating a gaussian on `(-1, 1)`.
fn gauss(f: f64) -> f64 {
    if f < -1.0 {
        0.0
    } else if f < -0.5 {
        let f = -1.0 - f;
        2.0 * f * f
    } else if f < 0.5 {
        1.0 - 2.0 * f * f
    } else if f < 1.0 {
        let f = 1.0 - f;
        2.0 * f * f
    } else {
        0.0
    }
}

/// Stamp force by integer distance from the stamp center.
///
/// Holds `floor(size / 2) + 3` entries so that interpolating at any distance
/// inside the stamp radius has both neighbors available.
#[derive(Debug, Clone, PartialEq)]
pub struct FalloffLut {
    values: Vec<f32>,
}

impl FalloffLut {
    /// Build the table for a stamp of diameter `size` and the given hardness.
    pub fn new(size: f64, hardness: f64) -> Self {
        let radius = size / 2.0;
        let length = radius.floor() as usize + 3;

        let values = if 1.0 - hardness > HARDNESS_EPSILON {
            let exponent = 0.4 / (1.0 - hardness);
            (0..length)
                .map(|i| gauss((i as f64 / radius).powf(exponent)) as f32)
                .collect()
        } else {
            vec![1.0; length]
        };

        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Force at offset `(x, y)` from the stamp center, linearly interpolated.
    pub fn force(&self, x: f32, y: f32) -> f32 {
        let radius = (x * x + y * y).sqrt();
        let a = radius as usize;
        let ratio = radius - a as f32;

        let before = self.values.get(a).copied().unwrap_or(0.0);
        let after = self.values.get(a + 1).copied().unwrap_or(0.0);

        before + ratio * (after - before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauss_shape() {
        assert_eq!(gauss(0.0), 1.0);
        assert_eq!(gauss(0.5), 0.5);
        assert_eq!(gauss(-0.5), 0.5);
        assert_eq!(gauss(1.0), 0.0);
        assert_eq!(gauss(-2.0), 0.0);
    }

    #[test]
    fn test_lut_length_and_falloff() {
        let lut = FalloffLut::new(40.0, 0.5);
        assert_eq!(lut.len(), 23);
        assert_eq!(lut.force(0.0, 0.0), 1.0);
        // Monotonically falling towards the rim
        assert!(lut.force(5.0, 0.0) > lut.force(10.0, 0.0));
        assert!(lut.force(20.0, 0.0) < 1e-6);
    }

    #[test]
    fn test_full_hardness_is_flat() {
        let lut = FalloffLut::new(8.0, 1.0);
        assert_eq!(lut.len(), 7);
        assert_eq!(lut.force(3.0, 2.0), 1.0);
    }

    #[test]
    fn test_interpolation() {
        let lut = FalloffLut::new(10.0, 0.0);
        let mid = lut.force(1.5, 0.0);
        let lo = lut.force(1.0, 0.0);
        let hi = lut.force(2.0, 0.0);
        assert!((mid - (lo + hi) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_table_reads_zero() {
        let lut = FalloffLut::new(4.0, 0.5);
        assert_eq!(lut.force(100.0, 0.0), 0.0);
    }
}
