//! Synthetic shot builders shared by the integration tests.
#![allow(dead_code, clippy::cast_precision_loss)]

use xtcav_algorithms::physical_units;
use xtcav_core::{GlobalCalibration, ImageStatistics, RegionOfInterest, ShotProfile, ShotToShot};

/// Time columns of the synthetic camera.
pub const NX: usize = 50;
/// Energy rows of the synthetic camera.
pub const NY: usize = 20;
/// Pixel at which the physical axes are centred.
pub const CENTER: (f64, f64) = (25.0, 10.0);

/// Calibration giving exactly -1 fs and 1 MeV per pixel at 20 MV.
pub fn calibration() -> GlobalCalibration {
    GlobalCalibration::new(3.0, 10.0, 20.0, 90.0, 1000.0, 3.0)
}

/// No-lasing style machine readings.
pub fn shot(fiducial: u32) -> ShotToShot {
    ShotToShot::default()
        .with_event(1_700_000_000 + u64::from(fiducial), fiducial)
        .with_rf(20.0, 90.0)
        .with_dump_charge(200e-12)
        .with_xray_energy(1e-3)
}

/// Gaussian projection over the `NX` columns, summing to `fraction`.
pub fn gaussian(center: f64, sigma: f64, fraction: f64) -> Vec<f64> {
    let raw: Vec<f64> = (0..NX)
        .map(|i| (-((i as f64 - center).powi(2)) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = raw.iter().sum();
    raw.iter().map(|v| v * fraction / total).collect()
}

/// Bunch statistics with slice energy centre offsets and spreads in MeV
/// (one pixel per MeV).
pub fn bunch(x_profile: Vec<f64>, x_com: f64, e_com: &[f64], e_rms: &[f64]) -> ImageStatistics {
    let fraction = x_profile.iter().sum();
    let y_com = CENTER.1;
    ImageStatistics {
        fraction,
        y_profile: vec![fraction / NY as f64; NY],
        x_com,
        y_com,
        x_rms: 5.0,
        y_rms: 2.0,
        x_fwhm: 10.0,
        y_fwhm: 4.0,
        y_com_slice: e_com.iter().map(|e| y_com + e).collect(),
        y_rms_slice: e_rms.to_vec(),
        x_profile,
    }
}

/// Assembles a shot profile on the synthetic camera.
pub fn profile(bunches: Vec<ImageStatistics>, shot: ShotToShot) -> ShotProfile {
    let roi = RegionOfInterest::full(NX, NY);
    let physical_units = physical_units(&roi, CENTER, &shot, &calibration());
    ShotProfile {
        image_stats: bunches,
        physical_units,
        roi,
        shot_to_shot: shot,
    }
}

/// Single-bunch no-lasing shot with flat slice energy and spread.
pub fn nolasing(x_profile: Vec<f64>, fiducial: u32) -> ShotProfile {
    let flat = vec![0.0; NX];
    let spread = vec![1.0; NX];
    profile(
        vec![bunch(x_profile, CENTER.0, &flat, &spread)],
        shot(fiducial),
    )
}
