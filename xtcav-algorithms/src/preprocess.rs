//! Image preprocessing ahead of statistics extraction.
//!
//! Dark-background subtraction, median/SNR denoising with unit-sum
//! normalisation, and cropping to the region occupied by the trace.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use log::warn;
use ndarray::{s, Array2, ArrayView2, Axis};
use xtcav_core::{Checked, Error, RegionOfInterest, Result, Warning};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Dark frame together with the ROI it was recorded on.
#[derive(Clone, Debug, PartialEq)]
pub struct DarkBackground {
    pub image: Array2<f64>,
    pub roi: RegionOfInterest,
}

/// Denoising configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DenoiseConfig {
    /// Median filter window edge (pixels).
    pub median_size: usize,
    /// Threshold in units of the border noise standard deviation.
    pub snr_filter: f64,
    /// Edge of the top-left corner assumed to contain only noise (pixels).
    pub snr_border: usize,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            median_size: 3,
            snr_filter: 10.0,
            snr_border: 100,
        }
    }
}

impl DenoiseConfig {
    /// Set the median filter size.
    #[must_use]
    pub fn with_median_size(mut self, size: usize) -> Self {
        self.median_size = size;
        self
    }

    /// Set the SNR threshold factor.
    #[must_use]
    pub fn with_snr_filter(mut self, factor: f64) -> Self {
        self.snr_filter = factor;
        self
    }

    /// Set the noise border size.
    #[must_use]
    pub fn with_snr_border(mut self, border: usize) -> Self {
        self.snr_border = border;
        self
    }
}

/// Trace cropping configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoiConfig {
    /// Fraction of the projection maximum delimiting the trace.
    pub threshold: f64,
    /// Factor applied to the thresholded width.
    pub expand_factor: f64,
}

impl Default for RoiConfig {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            expand_factor: 2.5,
        }
    }
}

impl RoiConfig {
    /// Set the waist threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the expansion factor.
    #[must_use]
    pub fn with_expand_factor(mut self, factor: f64) -> Self {
        self.expand_factor = factor;
        self
    }
}

fn check_shape(image: &ArrayView2<f64>, roi: &RegionOfInterest) -> Result<()> {
    let (rows, cols) = image.dim();
    if rows != roi.y_n() || cols != roi.x_n() {
        return Err(Error::ImageShapeMismatch {
            rows,
            cols,
            y_len: roi.y_n(),
            x_len: roi.x_n(),
        });
    }
    Ok(())
}

/// Subtracts the part of the dark frame lying under `roi`.
///
/// Without a dark frame the image is returned unchanged.
///
/// # Errors
/// Returns [`Error::BackgroundOutOfBounds`] if the dark ROI does not contain
/// `roi`, or a shape error if an image disagrees with its ROI.
pub fn subtract_background(
    image: ArrayView2<f64>,
    roi: &RegionOfInterest,
    dark: Option<&DarkBackground>,
) -> Result<Array2<f64>> {
    check_shape(&image, roi)?;
    let Some(dark) = dark else {
        return Ok(image.to_owned());
    };
    check_shape(&dark.image.view(), &dark.roi)?;
    if !dark.roi.contains(roi) {
        return Err(Error::BackgroundOutOfBounds);
    }

    let min_x = roi.x0() - dark.roi.x0();
    let min_y = roi.y0() - dark.roi.y0();
    let window = dark
        .image
        .slice(s![min_y..min_y + roi.y_n(), min_x..min_x + roi.x_n()]);
    Ok(&image - &window)
}

/// Median filter, border-noise threshold and unit-sum normalisation.
///
/// An image that holds no signal is returned as computed with
/// [`Warning::EmptyImage`] attached.
#[must_use]
pub fn denoise_image(image: ArrayView2<f64>, config: &DenoiseConfig) -> Checked<Array2<f64>> {
    let mut filtered = median_filter(image, config.median_size);
    let mut warnings = Vec::new();

    let (rows, cols) = filtered.dim();
    let border = filtered.slice(s![
        ..config.snr_border.min(rows),
        ..config.snr_border.min(cols)
    ]);
    let (noise_mean, noise_std) = if border.is_empty() {
        (0.0, 0.0)
    } else {
        let mean = border.sum() / border.len() as f64;
        let var = border.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / border.len() as f64;
        (mean, var.sqrt())
    };

    if filtered.sum() <= 0.0 {
        warn!("{}", Warning::EmptyImage);
        warnings.push(Warning::EmptyImage);
    }

    let threshold = config.snr_filter * noise_std;
    filtered.mapv_inplace(|v| {
        let v = v - noise_mean;
        if v < threshold {
            0.0
        } else {
            v
        }
    });

    let total = filtered.sum();
    if total > 0.0 {
        filtered /= total;
    } else if warnings.is_empty() {
        warn!("{}", Warning::EmptyImage);
        warnings.push(Warning::EmptyImage);
    }

    Checked::with_warnings(filtered, warnings)
}

/// Square median filter with mirrored edges.
fn median_filter(image: ArrayView2<f64>, size: usize) -> Array2<f64> {
    if size <= 1 || image.is_empty() {
        return image.to_owned();
    }
    let (rows, cols) = image.dim();
    let before = (size / 2) as isize;
    let after = (size - size / 2) as isize;
    let mut window = Vec::with_capacity(size * size);

    Array2::from_shape_fn((rows, cols), |(r, c)| {
        window.clear();
        for dr in -before..after {
            let rr = reflect(r as isize + dr, rows);
            for dc in -before..after {
                window.push(image[[rr, reflect(c as isize + dc, cols)]]);
            }
        }
        let mid = window.len() / 2;
        let (_, median, _) = window.select_nth_unstable_by(mid, f64::total_cmp);
        *median
    })
}

/// Maps an index onto `0..n` by half-sample symmetric reflection.
fn reflect(index: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut i = index.rem_euclid(period);
    if i >= n {
        i = period - i - 1;
    }
    i as usize
}

/// Crops the image to the trace, expanded around its thresholded waist.
///
/// # Errors
/// Returns [`Error::EmptyImage`] for an image without pixels, or a shape
/// error if the image disagrees with `roi`.
pub fn find_roi(
    image: ArrayView2<f64>,
    roi: &RegionOfInterest,
    config: &RoiConfig,
) -> Result<(Array2<f64>, RegionOfInterest)> {
    check_shape(&image, roi)?;
    if image.is_empty() {
        return Err(Error::EmptyImage);
    }

    let profile_x = image.sum_axis(Axis(0));
    let profile_y = image.sum_axis(Axis(1));
    let (x_start, x_end) = waist_span(profile_x.as_slice().unwrap_or(&[]), config);
    let (y_start, y_end) = waist_span(profile_y.as_slice().unwrap_or(&[]), config);

    let cropped = image.slice(s![y_start..y_end, x_start..x_end]).to_owned();
    let out_roi = roi.crop(x_start, x_end, y_start, y_end)?;
    Ok((cropped, out_roi))
}

/// Half-open index span around the samples at or above threshold.
fn waist_span(profile: &[f64], config: &RoiConfig) -> (usize, usize) {
    let size = profile.len();
    let max = profile.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let threshold = max * config.threshold;
    let first = profile.iter().position(|&v| v >= threshold).unwrap_or(0);
    let last = profile.iter().rposition(|&v| v >= threshold).unwrap_or(size - 1);

    let center = ((first + last) / 2) as f64;
    let width = (last - first + 1) as f64 * config.expand_factor;
    let start = (center - width / 2.0).round_ties_even().max(0.0) as usize;
    let end = ((center + width / 2.0).round_ties_even().max(0.0) as usize).min(size);
    if start >= end {
        let start = start.min(size - 1);
        return (start, start + 1);
    }
    (start, end)
}
