//! Transfer functions mapping scalar values to color and opacity.

use serde::{Deserialize, Serialize};

/// Color and opacity curves over a value domain.
///
/// Control points are evenly spaced over the normalized domain [0, 1]: the
/// first point sits at `value_range[0]`, the last at `value_range[1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    pub value_range: [f64; 2],
    pub colors: Vec<[f32; 3]>,
    pub opacities: Vec<f32>,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self {
            value_range: [0.0, 1.0],
            colors: vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            opacities: vec![0.0, 1.0],
        }
    }
}

/// Linear interpolation between the two control points nearest to `x`.
fn sample_curve<T: Copy>(points: &[T], x: f32, lerp: impl Fn(T, T, f32) -> T) -> Option<T> {
    match points.len() {
        0 => None,
        1 => Some(points[0]),
        n => {
            let pos = x.clamp(0.0, 1.0) * (n - 1) as f32;
            let i0 = (pos.floor() as usize).min(n - 1);
            let i1 = (i0 + 1).min(n - 1);
            Some(lerp(points[i0], points[i1], pos - i0 as f32))
        }
    }
}

impl TransferFunction {
    /// Map a raw value into [0, 1] using the declared domain.
    pub fn normalize(&self, value: f64) -> f32 {
        let [lo, hi] = self.value_range;
        let span = hi - lo;
        if span.abs() <= f64::EPSILON {
            return if value >= hi { 1.0 } else { 0.0 };
        }
        ((value - lo) / span).clamp(0.0, 1.0) as f32
    }

    /// Color at normalized position `x`. White when no colors are given.
    pub fn sample_color(&self, x: f32) -> [f32; 3] {
        sample_curve(&self.colors, x, |a, b, t| {
            [
                a[0] + (b[0] - a[0]) * t,
                a[1] + (b[1] - a[1]) * t,
                a[2] + (b[2] - a[2]) * t,
            ]
        })
        .unwrap_or([1.0, 1.0, 1.0])
    }

    /// Opacity at normalized position `x`. Opaque when no curve is given.
    pub fn sample_opacity(&self, x: f32) -> f32 {
        sample_curve(&self.opacities, x, |a, b, t| a + (b - a) * t).unwrap_or(1.0)
    }

    /// Color and opacity of a raw value.
    pub fn classify(&self, value: f64) -> ([f32; 3], f32) {
        let x = self.normalize(value);
        (self.sample_color(x), self.sample_opacity(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tf() -> TransferFunction {
        TransferFunction {
            value_range: [0.0, 100.0],
            colors: vec![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
            opacities: vec![0.0, 0.2, 1.0],
        }
    }

    #[test]
    fn test_normalize_clamps() {
        let tf = tf();
        assert_eq!(tf.normalize(-5.0), 0.0);
        assert_eq!(tf.normalize(50.0), 0.5);
        assert_eq!(tf.normalize(500.0), 1.0);
    }

    #[test]
    fn test_linear_interpolation() {
        let tf = tf();
        let c = tf.sample_color(0.5);
        assert!((c[0] - 0.5).abs() < 1e-6 && (c[2] - 0.5).abs() < 1e-6);
        assert!((tf.sample_opacity(0.25) - 0.1).abs() < 1e-6);
        assert!((tf.sample_opacity(0.75) - 0.6).abs() < 1e-6);
        assert_eq!(tf.sample_opacity(1.0), 1.0);
    }

    #[test]
    fn test_degenerate_curves() {
        let tf = TransferFunction {
            value_range: [3.0, 3.0],
            colors: vec![],
            opacities: vec![0.4],
        };
        assert_eq!(tf.classify(10.0), ([1.0, 1.0, 1.0], 0.4));
        assert_eq!(tf.normalize(2.0), 0.0);
    }
}
