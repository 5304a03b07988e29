//! Conversion of ROI pixel coordinates to femtoseconds and MeV.

use log::warn;
use ndarray::ArrayView3;
use xtcav_core::{
    Checked, GlobalCalibration, ImageStatistics, PhysicalUnits, RegionOfInterest, Result,
    ShotProfile, ShotToShot, Warning,
};

use crate::extraction::process_image;

/// Below this `|cos(phase difference)|` the streak calibration is unreliable.
pub const MIN_COS_PHASE_DIFF: f64 = 0.5;

/// Cosine of the deflector phase offset from its calibrated zero crossing.
#[must_use]
pub fn cos_phase_diff(shot: &ShotToShot, calibration: &GlobalCalibration) -> f64 {
    (calibration.rf_phase_calib - shot.xtcav_rf_phase)
        .to_radians()
        .cos()
}

/// Calibrated axes together with the quadrature warning, if raised.
fn calibrated_units(
    roi: &RegionOfInterest,
    center: (f64, f64),
    shot: &ShotToShot,
    calibration: &GlobalCalibration,
) -> Checked<PhysicalUnits> {
    let ymev_per_pix = calibration.um_per_pix * calibration.dump_e / calibration.dump_disp * 1e-3;
    let xfs_per_pix = -calibration.um_per_pix * calibration.rf_amp_calib
        / (0.3 * calibration.str_strength * shot.xtcav_rf_amp);

    let cos_phase_diff = cos_phase_diff(shot, calibration);
    let valid = cos_phase_diff.abs() >= MIN_COS_PHASE_DIFF;
    let mut warnings = Vec::new();
    if !valid {
        let warning = Warning::PhaseNearQuadrature { cos_phase_diff };
        warn!("{warning}");
        warnings.push(warning);
    }
    let sign = if cos_phase_diff < 0.0 { -1.0 } else { 1.0 };
    let xfs_per_pix = sign * xfs_per_pix;

    let units = PhysicalUnits {
        xfs: roi.x().iter().map(|x| xfs_per_pix * (x - center.0)).collect(),
        ymev: roi.y().iter().map(|y| ymev_per_pix * (y - center.1)).collect(),
        xfs_per_pix,
        ymev_per_pix,
        valid,
    };
    Checked::with_warnings(units, warnings)
}

/// Calibrated axes for a ROI, recentred on `center` (pixel coordinates).
///
/// The result is always computed; `valid` is false when the deflector phase
/// sits near quadrature, in which case absolute delays should not be trusted.
#[must_use]
pub fn physical_units(
    roi: &RegionOfInterest,
    center: (f64, f64),
    shot: &ShotToShot,
    calibration: &GlobalCalibration,
) -> PhysicalUnits {
    calibrated_units(roi, center, shot, calibration).into_inner()
}

/// Builds the full profile of a shot from its preprocessed `[bunch, y, x]`
/// image stack.
///
/// The physical axes are centred on the centre of mass of bunch 0.
///
/// # Errors
/// Returns an error if the stack does not match the ROI or has no bunches.
pub fn profile_shot(
    stack: ArrayView3<f64>,
    roi: &RegionOfInterest,
    shot: &ShotToShot,
    calibration: &GlobalCalibration,
) -> Result<Checked<ShotProfile>> {
    let image_stats = process_image(stack, roi)?;
    let Some(first) = image_stats.first() else {
        return Err(xtcav_core::Error::EmptyImage);
    };

    let units = calibrated_units(roi, (first.x_com, first.y_com), shot, calibration);
    let mut warnings = Vec::new();
    if image_stats.iter().all(ImageStatistics::is_empty) {
        warn!("{}", Warning::EmptyImage);
        warnings.push(Warning::EmptyImage);
    } else {
        for (bunch, _) in image_stats.iter().enumerate().filter(|(_, s)| s.is_empty()) {
            let warning = Warning::EmptyBunch { bunch };
            warn!("{warning}");
            warnings.push(warning);
        }
    }
    warnings.extend(units.warnings);
    let physical_units = units.value;

    Ok(Checked::with_warnings(
        ShotProfile {
            image_stats,
            physical_units,
            roi: roi.clone(),
            shot_to_shot: shot.clone(),
        },
        warnings,
    ))
}
