//! Error types for xtcav-core.

use thiserror::Error;

/// Result type alias for xtcav operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Contract violations in the inputs handed to the core.
///
/// Numerically degenerate data (empty images, ill-conditioned calibration,
/// empty reference sets) is never reported here; see [`crate::Warning`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// ROI coordinate vector does not match its declared extent.
    #[error("ROI {axis} axis has {actual} coordinates, expected {expected}")]
    RoiShapeMismatch {
        axis: char,
        expected: usize,
        actual: usize,
    },

    /// Image dimensions do not match the coordinate axes.
    #[error("image is {rows}x{cols} but axes describe {y_len}x{x_len}")]
    ImageShapeMismatch {
        rows: usize,
        cols: usize,
        y_len: usize,
        x_len: usize,
    },

    /// Dark background does not cover the requested ROI.
    #[error("dark background ROI does not contain the image ROI")]
    BackgroundOutOfBounds,

    /// Operation requires at least one pixel.
    #[error("image has no pixels")]
    EmptyImage,

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
