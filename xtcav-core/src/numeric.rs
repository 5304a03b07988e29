//! Numeric helpers shared by the extraction and retrieval stages.
#![allow(clippy::cast_precision_loss)]

/// Divides, substituting `default` when the ratio is not finite.
#[inline]
#[must_use]
pub fn safe_divide(numerator: f64, denominator: f64, default: f64) -> f64 {
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        default
    }
}

/// Linear interpolation of `(xs, ys)` at every point of `at`.
///
/// `xs` must be monotonic (increasing or decreasing). Points outside the
/// sampled range evaluate to zero.
#[must_use]
pub fn interp_zero_fill(xs: &[f64], ys: &[f64], at: &[f64]) -> Vec<f64> {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len().min(ys.len());
    if n == 0 {
        return vec![0.0; at.len()];
    }

    let descending = n > 1 && xs[n - 1] < xs[0];
    let (xs, ys): (Vec<f64>, Vec<f64>) = if descending {
        (
            xs[..n].iter().rev().copied().collect(),
            ys[..n].iter().rev().copied().collect(),
        )
    } else {
        (xs[..n].to_vec(), ys[..n].to_vec())
    };

    let first = xs[0];
    let last = xs[n - 1];
    at.iter()
        .map(|&t| {
            if !(first..=last).contains(&t) {
                return 0.0;
            }
            let upper = xs.partition_point(|&v| v <= t);
            if upper >= n {
                return ys[n - 1];
            }
            let lower = upper - 1;
            let dx = xs[upper] - xs[lower];
            if dx == 0.0 {
                return ys[lower];
            }
            let w = (t - xs[lower]) / dx;
            ys[lower] + w * (ys[upper] - ys[lower])
        })
        .collect()
}

/// Squared Pearson correlation coefficient of two equally long series.
///
/// Constant series have no defined correlation; they score 0.
#[must_use]
pub fn squared_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&va, &vb) in a[..n].iter().zip(&b[..n]) {
        let da = va - mean_a;
        let db = vb - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let r2 = safe_divide(cov * cov, var_a * var_b, 0.0);
    // Rounding can push a perfect match a hair above one.
    r2.min(1.0)
}

/// Inclusive sample count between the first and last sample at or above
/// half the profile maximum.
#[must_use]
pub fn fwhm(profile: &[f64]) -> f64 {
    let Some(max) = profile.iter().copied().reduce(f64::max) else {
        return 0.0;
    };
    let half = max / 2.0;
    let first = profile.iter().position(|&v| v >= half);
    let last = profile.iter().rposition(|&v| v >= half);
    match (first, last) {
        (Some(first), Some(last)) => (last - first + 1) as f64,
        _ => 0.0,
    }
}

/// Largest number of samples [`uniform_axis`] will generate.
pub const MAX_AXIS_SAMPLES: usize = 1 << 20;

/// Number of samples [`uniform_axis`] would generate, or `None` if the grid
/// is non-finite or longer than [`MAX_AXIS_SAMPLES`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn axis_len(start: f64, stop: f64, step: f64) -> Option<usize> {
    if !(start.is_finite() && stop.is_finite() && step > 0.0 && step.is_finite()) {
        return None;
    }
    if stop < start {
        return Some(1);
    }
    let intervals = ((stop - start) / step).ceil();
    if !intervals.is_finite() || intervals >= MAX_AXIS_SAMPLES as f64 {
        return None;
    }
    (intervals as usize).checked_add(1)
}

/// Uniform grid `start + k * step` covering `[start, stop]`, with the same
/// sample count as a half-open range to `stop + step`.
///
/// Degenerate or oversized grids collapse to the single sample `[start]`
/// (`[0]` if `start` itself is not finite).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn uniform_axis(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let Some(count) = axis_len(start, stop, step) else {
        return vec![if start.is_finite() { start } else { 0.0 }];
    };
    (0..count).map(|k| start + k as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_safe_divide() {
        assert_relative_eq!(safe_divide(1.0, 4.0, 7.0), 0.25);
        assert_relative_eq!(safe_divide(1.0, 0.0, 7.0), 7.0);
        assert_relative_eq!(safe_divide(0.0, 0.0, -1.0), -1.0);
    }

    #[test]
    fn test_interp_inside_and_outside() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 20.0];
        let out = interp_zero_fill(&xs, &ys, &[-0.5, 0.0, 0.5, 1.5, 2.0, 2.5]);
        assert_eq!(out, vec![0.0, 0.0, 5.0, 15.0, 20.0, 0.0]);
    }

    #[test]
    fn test_interp_descending_axis() {
        let xs = [2.0, 1.0, 0.0];
        let ys = [20.0, 10.0, 0.0];
        let out = interp_zero_fill(&xs, &ys, &[0.5, 1.5]);
        assert_relative_eq!(out[0], 5.0);
        assert_relative_eq!(out[1], 15.0);
    }

    #[test]
    fn test_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let c = [4.0, 3.0, 2.0, 1.0];
        assert_relative_eq!(squared_correlation(&a, &b), 1.0, epsilon = 1e-12);
        assert_relative_eq!(squared_correlation(&a, &c), 1.0, epsilon = 1e-12);
        assert_relative_eq!(squared_correlation(&a, &[5.0; 4]), 0.0);
    }

    #[test]
    fn test_fwhm() {
        assert_relative_eq!(fwhm(&[0.0, 1.0, 4.0, 3.0, 2.0, 0.0]), 3.0);
        assert_relative_eq!(fwhm(&[]), 0.0);
    }

    #[test]
    fn test_uniform_axis() {
        let axis = uniform_axis(-1.0, 1.0, 0.5);
        assert_eq!(axis, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        let axis = uniform_axis(0.0, 1.2, 0.5);
        assert_eq!(axis.len(), 4);
        assert!(*axis.last().unwrap() >= 1.2);
    }

    #[test]
    fn test_uniform_axis_degenerate_grids() {
        assert_eq!(uniform_axis(0.0, 1.0, 0.0), vec![0.0]);
        assert_eq!(uniform_axis(2.0, 1.0, 0.5), vec![2.0]);
        assert_eq!(uniform_axis(f64::NEG_INFINITY, 1.0, 0.5), vec![0.0]);
        assert_eq!(uniform_axis(-1.0, f64::INFINITY, 0.5), vec![-1.0]);
        assert_eq!(uniform_axis(-1.0, 1.0, f64::NAN), vec![-1.0]);
        // A tiny step over a finite span would need too many samples.
        assert_eq!(uniform_axis(-1.0, 1.0, 1e-300), vec![-1.0]);
        assert_eq!(axis_len(-1.0, 1.0, 1e-300), None);
        assert_eq!(axis_len(-1.0, 1.0, 0.5), Some(5));
    }
}
