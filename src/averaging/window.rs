//! 1D Gaussian window used by the separable averagers.

use crate::{Float, SmoothError, SmoothResult};

const SQRT_2PI: Float = 2.506_628_274_631_000_5;

/// Largest window radius `Window::new` will build.
pub const MAX_RADIUS: usize = 1 << 20;

/// Symmetric Gaussian weights of length `2 * radius + 1`.
///
/// Weights are normalized at build time (`1 / (sqrt(2 pi) sigma)` factor).
/// Averagers never rely on the full sum, they divide by the in-bounds
/// part only, so the constant factor cancels out.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    sigma: Float,
    radius: usize,
    weights: Vec<Float>,
}

impl Window {
    /// `radius = ceil(3 sigma)`, weight at offset k is
    /// `exp(-k^2 / (2 sigma^2)) / (sqrt(2 pi) sigma)`.
    pub fn new(sigma: Float) -> SmoothResult<Window> {
        if !(sigma > 0.0) || !sigma.is_finite() {
            return Err(SmoothError::InvalidParameter(format!(
                "sigma must be positive and finite, got {}",
                sigma
            )));
        }
        let reach = (3.0 * sigma).ceil();
        if reach > MAX_RADIUS as Float {
            return Err(SmoothError::InvalidParameter(format!(
                "sigma {} needs a window radius above {}",
                sigma, MAX_RADIUS
            )));
        }
        let radius = reach as usize;
        let s2 = 2.0 * sigma * sigma;
        let norm = SQRT_2PI * sigma;
        if !(1.0 / norm).is_finite() {
            return Err(SmoothError::InvalidParameter(format!(
                "sigma {} is too small for a finite center weight",
                sigma
            )));
        }

        let mut weights = vec![0.0; 2 * radius + 1];
        weights[radius] = 1.0 / norm;
        for k in 1..=radius {
            let w = (-((k * k) as Float) / s2).exp() / norm;
            weights[radius - k] = w;
            weights[radius + k] = w;
        }

        Ok(Window {
            sigma,
            radius,
            weights,
        })
    }

    pub fn sigma(&self) -> Float {
        self.sigma
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    pub fn weights(&self) -> &[Float] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight for a tap `offset` cells away from the center.
    #[inline(always)]
    pub fn at(&self, offset: isize) -> Float {
        self.weights[(self.radius as isize + offset) as usize]
    }

    /// Weighted average of the taps of `line` that fall inside it, centred
    /// on `center`. The divisor is the sum of the same in-bounds weights, so
    /// cells near an edge are still true weighted means.
    ///
    /// `get(i)` returns the value at line index `i`; `extent` is the line length.
    #[inline(always)]
    pub fn apply<G>(&self, extent: usize, center: usize, get: G) -> Float
    where
        G: Fn(usize) -> Float,
    {
        if !cfg!(feature = "unchecked") {
            assert!(center < extent);
        }
        let start = center.saturating_sub(self.radius);
        let end = (center + self.radius).min(extent - 1);
        // window index of the first in-bounds tap
        let w_start = self.radius + start - center;

        let mut acc = 0.0;
        let mut wsum = 0.0;
        for (w, i) in self.weights[w_start..].iter().zip(start..=end) {
            acc += get(i) * w;
            wsum += w;
        }
        let avg = acc / wsum;
        if wsum == 0.0 || !wsum.is_finite() || !avg.is_finite() {
            return get(center);
        }
        avg
    }

    #[cfg(test)]
    pub(crate) fn from_weights(sigma: Float, weights: Vec<Float>) -> Window {
        let radius = weights.len() / 2;
        Window {
            sigma,
            radius,
            weights,
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn radius_from_sigma() {
        assert_eq!(Window::new(1.0).unwrap().radius(), 3);
        assert_eq!(Window::new(0.3).unwrap().radius(), 1);
        assert_eq!(Window::new(1.5).unwrap().radius(), 5);
        assert_eq!(Window::new(0.3).unwrap().len(), 3);
    }

    #[test]
    fn bad_sigma() {
        for sigma in &[0.0, -1.0, Float::NAN, Float::INFINITY] {
            assert!(matches!(
                Window::new(*sigma),
                Err(SmoothError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn weights_match_formula() {
        let sigma = 2.0;
        let wnd = Window::new(sigma).unwrap();
        let norm = (2.0 * std::f64::consts::PI).sqrt() * sigma;
        assert_relative_eq!(wnd.at(0), 1.0 / norm);
        for k in 1..=wnd.radius() as isize {
            let expected = (-(k * k) as Float / (2.0 * sigma * sigma)).exp() / norm;
            assert_relative_eq!(wnd.at(k), expected);
        }
    }

    #[test]
    fn symmetric_and_peaked() {
        for sigma in &[0.2, 0.7, 1.0, 2.5, 4.0] {
            let wnd = Window::new(*sigma).unwrap();
            let r = wnd.radius() as isize;
            for k in 1..=r {
                assert_eq!(wnd.at(k), wnd.at(-k));
                assert!(wnd.at(k) < wnd.at(k - 1));
                assert!(wnd.at(k) > 0.0);
            }
        }
    }

    #[test]
    fn extreme_sigma_rejected() {
        for sigma in &[1e-309, 1e9, 1e19, Float::MAX] {
            assert!(matches!(
                Window::new(*sigma),
                Err(SmoothError::InvalidParameter(_))
            ));
        }
        let widest = Window::new(349_525.0).unwrap();
        assert_eq!(widest.radius(), MAX_RADIUS - 1);
    }

    #[test]
    fn degenerate_sum_keeps_cell_value() {
        let line = [1.0, 7.0, 3.0];
        let zeros = Window::from_weights(1.0, vec![0.0, 0.0, 0.0]);
        assert_eq!(zeros.apply(3, 1, |i| line[i]), 7.0);
        let infinite = Window::from_weights(1.0, vec![Float::INFINITY; 3]);
        assert_eq!(infinite.apply(3, 0, |i| line[i]), 1.0);
        // tiny but valid sigma with large values overflows the weighted sum
        let sharp = Window::new(1e-300).unwrap();
        assert_eq!(sharp.apply(3, 2, |_| 1e300), 1e300);
    }

    #[test]
    fn deterministic() {
        assert_eq!(Window::new(1.3).unwrap(), Window::new(1.3).unwrap());
    }

    #[test]
    fn apply_renormalizes_at_edges() {
        let wnd = Window::new(0.3).unwrap();
        let line = [0.0, 0.0, 0.0, 0.0, 10.0];
        let w = wnd.weights();
        let right = wnd.apply(line.len(), 4, |i| line[i]);
        assert_relative_eq!(right, (0.0 * w[0] + 10.0 * w[1]) / (w[0] + w[1]));
        let interior = wnd.apply(line.len(), 3, |i| line[i]);
        assert_relative_eq!(interior, 10.0 * w[2] / (w[0] + w[1] + w[2]));
        // single cell line is left alone
        assert_eq!(wnd.apply(1, 0, |_| 4.5), 4.5);
    }

    #[test]
    fn normalization_cancels() {
        // unnormalized weights with a renormalizing divisor give the same result
        let sigma = 1.2;
        let wnd = Window::new(sigma).unwrap();
        let line: Vec<Float> = (0..9).map(|i| (i * i) as Float).collect();
        for center in 0..line.len() {
            let start = center.saturating_sub(wnd.radius());
            let end = (center + wnd.radius()).min(line.len() - 1);
            let mut acc = 0.0;
            let mut wsum = 0.0;
            for i in start..=end {
                let k = i as Float - center as Float;
                let w = (-k * k / (2.0 * sigma * sigma)).exp();
                acc += line[i] * w;
                wsum += w;
            }
            assert_relative_eq!(
                wnd.apply(line.len(), center, |i| line[i]),
                acc / wsum,
                max_relative = 1e-12
            );
        }
    }
}
