//! Physical axes of a shot.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Time and energy axes of a ROI after calibration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhysicalUnits {
    /// Time axis (fs), aligned with the ROI x coordinates.
    pub xfs: Vec<f64>,
    /// Energy axis (MeV), aligned with the ROI y coordinates.
    pub ymev: Vec<f64>,
    /// Time per pixel (fs); negative when the streak runs backwards.
    pub xfs_per_pix: f64,
    /// Energy per pixel (MeV).
    pub ymev_per_pix: f64,
    /// False when the RF phase was close to quadrature.
    pub valid: bool,
}

impl PhysicalUnits {
    /// Magnitude of the time step between adjacent pixels (fs).
    #[must_use]
    pub fn time_step(&self) -> f64 {
        self.xfs_per_pix.abs()
    }
}
