//! Per-bunch image statistics.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Projections and moments of one bunch of a preprocessed XTCAV image.
///
/// Coordinates are in ROI pixel units. The image is expected to be
/// normalised so that all bunches of a shot sum to one, which makes
/// `fraction` the share of the shot's charge carried by this bunch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageStatistics {
    /// Total intensity of the bunch image.
    pub fraction: f64,
    /// Projection onto the x (time) axis.
    pub x_profile: Vec<f64>,
    /// Projection onto the y (energy) axis.
    pub y_profile: Vec<f64>,
    pub x_com: f64,
    pub y_com: f64,
    pub x_rms: f64,
    pub y_rms: f64,
    /// Samples between the half-maximum crossings of `x_profile`.
    pub x_fwhm: f64,
    /// Samples between the half-maximum crossings of `y_profile`.
    pub y_fwhm: f64,
    /// Y centre of mass of every x column.
    pub y_com_slice: Vec<f64>,
    /// Y spread of every x column.
    pub y_rms_slice: Vec<f64>,
}

impl ImageStatistics {
    /// Returns true if the bunch carried no intensity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fraction == 0.0
    }

    /// Number of x samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x_profile.len()
    }
}
