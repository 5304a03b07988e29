//! Image statistics extraction.
//!
//! Computes projections, centres of mass, spreads and per-column energy
//! moments of a background-subtracted, normalised bunch image. Images are
//! indexed `[y, x]`; multi-bunch stacks are indexed `[bunch, y, x]`.
#![allow(clippy::cast_precision_loss)]

use ndarray::{ArrayView2, ArrayView3, Axis};
use xtcav_core::numeric::{fwhm, safe_divide};
use xtcav_core::{Error, ImageStatistics, RegionOfInterest, Result};

/// Statistics of a single bunch image.
///
/// Never fails on degenerate data: an all-zero image yields `fraction == 0`,
/// centres at the axis midpoints and zero spreads.
///
/// # Errors
/// Returns [`Error::ImageShapeMismatch`] if the image does not match the axes
/// and [`Error::EmptyImage`] if either axis is empty.
pub fn image_statistics(image: ArrayView2<f64>, x: &[f64], y: &[f64]) -> Result<ImageStatistics> {
    let (rows, cols) = image.dim();
    if rows != y.len() || cols != x.len() {
        return Err(Error::ImageShapeMismatch {
            rows,
            cols,
            y_len: y.len(),
            x_len: x.len(),
        });
    }
    if rows == 0 || cols == 0 {
        return Err(Error::EmptyImage);
    }

    let fraction = image.sum();
    let x_profile = image.sum_axis(Axis(0)).to_vec();
    let y_profile = image.sum_axis(Axis(1)).to_vec();

    let (x_com, x_rms, x_fwhm) = axis_moments(&x_profile, x, fraction);
    let (y_com, y_rms, y_fwhm) = axis_moments(&y_profile, y, fraction);

    let mut y_com_slice = Vec::with_capacity(cols);
    let mut y_rms_slice = Vec::with_capacity(cols);
    for (column, &weight) in image.axis_iter(Axis(1)).zip(&x_profile) {
        let first: f64 = column.iter().zip(y).map(|(v, yy)| v * yy).sum();
        let center = safe_divide(first, weight, y_com);
        let second: f64 = column
            .iter()
            .zip(y)
            .map(|(v, yy)| v * (yy - center).powi(2))
            .sum();
        let spread = safe_divide(second, weight, 0.0).sqrt();
        y_com_slice.push(center);
        y_rms_slice.push(if spread.is_finite() { spread } else { 0.0 });
    }

    Ok(ImageStatistics {
        fraction,
        x_profile,
        y_profile,
        x_com,
        y_com,
        x_rms,
        y_rms,
        x_fwhm,
        y_fwhm,
        y_com_slice,
        y_rms_slice,
    })
}

/// Centre, spread and FWHM of one projection.
fn axis_moments(profile: &[f64], axis: &[f64], fraction: f64) -> (f64, f64, f64) {
    if fraction == 0.0 {
        let midpoint = (axis[0] + axis[axis.len() - 1]) / 2.0;
        return (midpoint, 0.0, 0.0);
    }
    let com = profile.iter().zip(axis).map(|(p, a)| p * a).sum::<f64>() / fraction;
    let variance = profile
        .iter()
        .zip(axis)
        .map(|(p, a)| p * (a - com).powi(2))
        .sum::<f64>()
        / fraction;
    (com, variance.sqrt(), fwhm(profile))
}

/// Statistics for every bunch of a `[bunch, y, x]` image stack.
///
/// # Errors
/// Propagates shape errors from [`image_statistics`].
pub fn process_image(
    stack: ArrayView3<f64>,
    roi: &RegionOfInterest,
) -> Result<Vec<ImageStatistics>> {
    stack
        .axis_iter(Axis(0))
        .map(|bunch| image_statistics(bunch, roi.x(), roi.y()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2, Array3};

    fn axes(cols: usize, rows: usize) -> (Vec<f64>, Vec<f64>) {
        (
            (0..cols).map(|v| v as f64 + 10.0).collect(),
            (0..rows).map(|v| v as f64 * 2.0).collect(),
        )
    }

    #[test]
    fn test_projections_and_com() {
        let image = array![[0.0, 0.1, 0.0], [0.1, 0.4, 0.1], [0.0, 0.3, 0.0]];
        let (x, y) = axes(3, 3);
        let stats = image_statistics(image.view(), &x, &y).unwrap();

        assert_relative_eq!(stats.fraction, 1.0, epsilon = 1e-12);
        let sum_x: f64 = stats.x_profile.iter().sum();
        let sum_y: f64 = stats.y_profile.iter().sum();
        assert_relative_eq!(sum_x, sum_y, epsilon = 1e-12);
        assert_relative_eq!(stats.x_com, 11.0, epsilon = 1e-12);
        // y weights: 0.1 at 0, 0.6 at 2, 0.3 at 4
        assert_relative_eq!(stats.y_com, 2.4, epsilon = 1e-12);
        assert!(stats.x_com >= x[0] && stats.x_com <= x[2]);
        assert!(stats.y_com >= y[0] && stats.y_com <= y[2]);
        assert_relative_eq!(stats.x_fwhm, 1.0);
    }

    #[test]
    fn test_rms() {
        let image = array![[0.5, 0.0, 0.5]];
        let x = [0.0, 1.0, 2.0];
        let stats = image_statistics(image.view(), &x, &[3.0]).unwrap();
        assert_relative_eq!(stats.x_com, 1.0);
        assert_relative_eq!(stats.x_rms, 1.0);
        assert_relative_eq!(stats.y_rms, 0.0);
        assert_relative_eq!(stats.x_fwhm, 3.0);
    }

    #[test]
    fn test_slice_moments() {
        // Column 0: all weight at y=0; column 1: split between y=0 and y=2;
        // column 2: empty.
        let image = array![[0.2, 0.3, 0.0], [0.0, 0.0, 0.0], [0.0, 0.3, 0.0]];
        let x = [0.0, 1.0, 2.0];
        let y = [0.0, 1.0, 2.0];
        let stats = image_statistics(image.view(), &x, &y).unwrap();

        assert_relative_eq!(stats.y_com_slice[0], 0.0);
        assert_relative_eq!(stats.y_com_slice[1], 1.0);
        assert_relative_eq!(stats.y_rms_slice[0], 0.0);
        assert_relative_eq!(stats.y_rms_slice[1], 1.0);
        // Empty column falls back to the global centre and zero spread.
        assert_relative_eq!(stats.y_com_slice[2], stats.y_com);
        assert_relative_eq!(stats.y_rms_slice[2], 0.0);
    }

    #[test]
    fn test_all_zero_image() {
        let image = Array2::<f64>::zeros((4, 5));
        let (x, y) = axes(5, 4);
        let stats = image_statistics(image.view(), &x, &y).unwrap();

        assert!(stats.is_empty());
        assert_relative_eq!(stats.x_com, 12.0);
        assert_relative_eq!(stats.y_com, 3.0);
        assert_relative_eq!(stats.x_rms, 0.0);
        assert_relative_eq!(stats.y_rms, 0.0);
        assert_relative_eq!(stats.x_fwhm, 0.0);
        assert_relative_eq!(stats.y_fwhm, 0.0);
        assert!(stats.y_com_slice.iter().all(|v| (v - 3.0).abs() < 1e-12));
        assert!(stats.y_rms_slice.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_shape_mismatch() {
        let image = Array2::<f64>::zeros((4, 5));
        let (x, y) = axes(4, 4);
        assert!(matches!(
            image_statistics(image.view(), &x, &y),
            Err(Error::ImageShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_process_image_per_bunch() {
        let mut stack = Array3::<f64>::zeros((2, 3, 4));
        stack[[0, 1, 1]] = 0.6;
        stack[[1, 2, 3]] = 0.4;
        let roi = RegionOfInterest::full(4, 3);
        let stats = process_image(stack.view(), &roi).unwrap();

        assert_eq!(stats.len(), 2);
        assert_relative_eq!(stats[0].fraction, 0.6);
        assert_relative_eq!(stats[1].fraction, 0.4);
        assert_relative_eq!(stats[0].x_com, 1.0);
        assert_relative_eq!(stats[1].x_com, 3.0);
        assert_relative_eq!(stats[1].y_com, 2.0);
    }
}
