//! Non-fatal quality signals attached to computed values.
//!
//! Degenerate input never aborts processing. Instead every component returns
//! its best-effort result together with the list of [`Warning`]s raised while
//! producing it, so callers can decide to keep, flag or discard a shot.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A recoverable condition encountered during processing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Warning {
    /// Image sums to zero (or less) after background removal.
    EmptyImage,
    /// One bunch of a multi-bunch shot carries no intensity.
    EmptyBunch { bunch: usize },
    /// RF phase too close to quadrature for a trustworthy time calibration.
    PhaseNearQuadrature { cos_phase_diff: f64 },
    /// Shot and reference (or shots within a reference batch) disagree on
    /// the number of bunches.
    BunchCountMismatch { expected: usize, found: usize },
    /// Not enough shots to build a single reference group.
    NoReferenceGroups { shots: usize, shots_per_group: usize },
    /// Reference set holds no group to match against.
    EmptyReference,
    /// Shot has a zero or non-finite time calibration and was left out of
    /// the reference.
    UnusableTimeAxis { shot: usize },
    /// Master time axis would need more samples than allowed; it collapses
    /// to the origin.
    TimeAxisTooLong { span_fs: f64, step_fs: f64 },
    /// Electron current never rises above threshold for this bunch.
    EmptyCurrentWindow { bunch: usize },
    /// No electrons on the master time axis; COM offset left at zero.
    UncalibratedCom,
    /// Dispersion method integrates to zero; RMS power left at zero.
    UncalibratedRms,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyImage => write!(f, "image completely empty after background subtraction"),
            Self::EmptyBunch { bunch } => write!(f, "bunch {bunch} is empty"),
            Self::PhaseNearQuadrature { cos_phase_diff } => write!(
                f,
                "RF phase far from 0 or 180 degrees (cos = {cos_phase_diff:.3})"
            ),
            Self::BunchCountMismatch { expected, found } => {
                write!(f, "expected {expected} bunches, found {found}")
            }
            Self::NoReferenceGroups {
                shots,
                shots_per_group,
            } => write!(
                f,
                "{shots} reference shots cannot fill a group of {shots_per_group}"
            ),
            Self::EmptyReference => write!(f, "reference set has no groups"),
            Self::UnusableTimeAxis { shot } => {
                write!(f, "shot {shot} has no usable time calibration, skipped")
            }
            Self::TimeAxisTooLong { span_fs, step_fs } => write!(
                f,
                "master time axis spanning {span_fs:.3e} fs at {step_fs:.3e} fs steps is too long"
            ),
            Self::EmptyCurrentWindow { bunch } => {
                write!(f, "bunch {bunch} has no current above threshold")
            }
            Self::UncalibratedCom => write!(f, "no electrons to distribute the COM energy offset"),
            Self::UncalibratedRms => write!(f, "RMS power integrates to zero"),
        }
    }
}

/// A value together with the warnings raised while computing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Checked<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Checked<T> {
    /// Wraps a value with no warnings.
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// Wraps a value with the given warnings.
    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    /// Returns true if no warning was raised.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Returns true if the given warning kind was raised.
    #[must_use]
    pub fn has(&self, predicate: impl Fn(&Warning) -> bool) -> bool {
        self.warnings.iter().any(predicate)
    }

    /// Discards the warnings.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Maps the value, keeping the warnings.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Checked<U> {
        Checked {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_map_keeps_warnings() {
        let checked = Checked::with_warnings(2, vec![Warning::EmptyImage]);
        let mapped = checked.map(|v| v * 3);
        assert_eq!(mapped.value, 6);
        assert!(!mapped.is_clean());
        assert!(mapped.has(|w| matches!(w, Warning::EmptyImage)));
    }

    #[test]
    fn test_warning_display() {
        let w = Warning::BunchCountMismatch {
            expected: 2,
            found: 1,
        };
        assert_eq!(w.to_string(), "expected 2 bunches, found 1");
    }
}
