//! Region of interest on the XTCAV camera.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rectangular window of the detector with explicit pixel coordinates.
///
/// The coordinate vectors always have exactly `x_n` and `y_n` entries.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionOfInterest {
    x_n: usize,
    x0: usize,
    y_n: usize,
    y0: usize,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl RegionOfInterest {
    /// Creates a ROI from explicit coordinate vectors.
    ///
    /// # Errors
    /// Returns [`Error::RoiShapeMismatch`] if a coordinate vector length
    /// differs from the declared extent.
    pub fn new(
        x_n: usize,
        x0: usize,
        y_n: usize,
        y0: usize,
        x: Vec<f64>,
        y: Vec<f64>,
    ) -> Result<Self> {
        if x.len() != x_n {
            return Err(Error::RoiShapeMismatch {
                axis: 'x',
                expected: x_n,
                actual: x.len(),
            });
        }
        if y.len() != y_n {
            return Err(Error::RoiShapeMismatch {
                axis: 'y',
                expected: y_n,
                actual: y.len(),
            });
        }
        Ok(Self {
            x_n,
            x0,
            y_n,
            y0,
            x,
            y,
        })
    }

    /// Contiguous ROI starting at `(x0, y0)` with one coordinate per pixel.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn contiguous(x_n: usize, x0: usize, y_n: usize, y0: usize) -> Self {
        Self {
            x_n,
            x0,
            y_n,
            y0,
            x: (x0..x0 + x_n).map(|v| v as f64).collect(),
            y: (y0..y0 + y_n).map(|v| v as f64).collect(),
        }
    }

    /// Full-frame ROI for a `width x height` image.
    #[must_use]
    pub fn full(width: usize, height: usize) -> Self {
        Self::contiguous(width, 0, height, 0)
    }

    /// Sub-window `[x_start, x_end) x [y_start, y_end)` in local indices.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] if the window is empty or exceeds this ROI.
    pub fn crop(&self, x_start: usize, x_end: usize, y_start: usize, y_end: usize) -> Result<Self> {
        if x_start >= x_end || y_start >= y_end || x_end > self.x_n || y_end > self.y_n {
            return Err(Error::ConfigError(format!(
                "crop [{x_start}, {x_end}) x [{y_start}, {y_end}) outside {}x{} ROI",
                self.x_n, self.y_n
            )));
        }
        Ok(Self {
            x_n: x_end - x_start,
            x0: self.x0 + x_start,
            y_n: y_end - y_start,
            y0: self.y0 + y_start,
            x: self.x[x_start..x_end].to_vec(),
            y: self.y[y_start..y_end].to_vec(),
        })
    }

    #[must_use]
    pub fn x_n(&self) -> usize {
        self.x_n
    }

    #[must_use]
    pub fn y_n(&self) -> usize {
        self.y_n
    }

    #[must_use]
    pub fn x0(&self) -> usize {
        self.x0
    }

    #[must_use]
    pub fn y0(&self) -> usize {
        self.y0
    }

    /// X coordinates (pixels).
    #[must_use]
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Y coordinates (pixels).
    #[must_use]
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Returns true if `other` lies entirely inside this ROI.
    #[must_use]
    pub fn contains(&self, other: &RegionOfInterest) -> bool {
        other.x0 >= self.x0
            && other.y0 >= self.y0
            && other.x0 + other.x_n <= self.x0 + self.x_n
            && other.y0 + other.y_n <= self.y0 + self.y_n
    }
}
