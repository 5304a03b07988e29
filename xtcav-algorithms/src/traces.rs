//! Per-bunch traces resampled onto a master time axis.

use xtcav_core::numeric::{interp_zero_fill, safe_divide};
use xtcav_core::ShotProfile;

/// Electron current and slice energy moments of one bunch, in physical
/// units, on a common time axis.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct BunchTraces {
    /// Electrons per second.
    pub current: Vec<f64>,
    /// Slice energy centre relative to the bunch centre (MeV).
    pub e_com: Vec<f64>,
    /// Slice energy spread (MeV).
    pub e_rms: Vec<f64>,
    /// Delay relative to bunch 0 (fs).
    pub dist_t: f64,
    /// Energy offset relative to bunch 0 (MeV).
    pub dist_e: f64,
}

/// Time axis of `bunch` with its own delay removed.
fn aligned_axis(profile: &ShotProfile, bunch: usize) -> Vec<f64> {
    let dist_t = profile.bunch_delay(bunch);
    profile
        .physical_units
        .xfs
        .iter()
        .map(|x| x - dist_t)
        .collect()
}

/// Normalised x projection of `bunch` resampled onto `t`, used for grouping.
pub(crate) fn aligned_shape(profile: &ShotProfile, bunch: usize, t: &[f64]) -> Vec<f64> {
    interp_zero_fill(
        &aligned_axis(profile, bunch),
        &profile.image_stats[bunch].x_profile,
        t,
    )
}

/// Converts `bunch` to physical units and resamples it onto `t`.
pub(crate) fn bunch_traces(profile: &ShotProfile, bunch: usize, t: &[f64]) -> BunchTraces {
    let stats = &profile.image_stats[bunch];
    let units = &profile.physical_units;
    let axis = aligned_axis(profile, bunch);

    let electrons = profile.shot_to_shot.num_electrons();
    let step_seconds = units.time_step() * 1e-15;
    let current: Vec<f64> = stats
        .x_profile
        .iter()
        .map(|&p| safe_divide(p, step_seconds, 0.0) * electrons)
        .collect();
    let e_com: Vec<f64> = stats
        .y_com_slice
        .iter()
        .map(|&y| (y - stats.y_com) * units.ymev_per_pix)
        .collect();
    let e_rms: Vec<f64> = stats
        .y_rms_slice
        .iter()
        .map(|&y| y * units.ymev_per_pix)
        .collect();

    BunchTraces {
        current: interp_zero_fill(&axis, &current, t),
        e_com: interp_zero_fill(&axis, &e_com, t),
        e_rms: interp_zero_fill(&axis, &e_rms, t),
        dist_t: profile.bunch_delay(bunch),
        dist_e: profile.bunch_energy_offset(bunch),
    }
}
