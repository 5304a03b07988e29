//! Single-shot X-ray power retrieval.
//!
//! A lasing shot is matched bunch by bunch to the best correlated no-lasing
//! reference group. Power is then estimated twice: from the loss of slice
//! energy (centre-of-mass method) and from the growth of slice energy spread
//! (dispersion method). Both are cross-calibrated against the gas-detector
//! pulse energy.
#![allow(clippy::cast_precision_loss)]

use log::{debug, warn};
use ndarray::{s, Array1, Array2};
use rayon::prelude::*;
use xtcav_core::numeric::squared_correlation;
use xtcav_core::{AveragedProfiles, PulseCharacterization, ShotProfile, Warning, E_CHARGE};

use crate::traces::bunch_traces;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Power retrieval configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReconstructionConfig {
    /// Fraction of the peak current delimiting the retrieval window.
    pub threshold_level: f64,
    /// Exponent of the current in the dispersion method.
    pub current_exponent: f64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            threshold_level: 0.1,
            current_exponent: 2.0 / 3.0,
        }
    }
}

impl ReconstructionConfig {
    /// Set the current threshold level.
    #[must_use]
    pub fn with_threshold_level(mut self, level: f64) -> Self {
        self.threshold_level = level;
        self
    }

    /// Set the dispersion-method current exponent.
    #[must_use]
    pub fn with_current_exponent(mut self, exponent: f64) -> Self {
        self.current_exponent = exponent;
        self
    }
}

/// Index range (inclusive) where both currents exceed `level` times their
/// own peak.
///
/// If the lasing window starts after the reference window ends, the range
/// collapses onto the reference end. Returns `None` if either current never
/// rises above its threshold.
#[must_use]
pub fn current_window(lasing: &[f64], nolasing: &[f64], level: f64) -> Option<(usize, usize)> {
    let (first_l, last_l) = above_threshold(lasing, level)?;
    let (first_n, last_n) = above_threshold(nolasing, level)?;
    let start = first_l.max(first_n);
    let end = last_l.min(last_n);
    Some((start.min(end), end))
}

fn above_threshold(trace: &[f64], level: f64) -> Option<(usize, usize)> {
    let peak = trace.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let threshold = peak * level;
    let first = trace.iter().position(|&v| v > threshold)?;
    let last = trace.iter().rposition(|&v| v > threshold)?;
    Some((first, last))
}

/// Agreement between two power curves: one minus the summed squared
/// difference over the summed squared deviations from their means.
///
/// Two constant curves score 1 if identical and 0 otherwise.
#[must_use]
pub fn power_agreement(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 1.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let mismatch: f64 = a[..n].iter().zip(&b[..n]).map(|(x, y)| (x - y).powi(2)).sum();
    let spread: f64 = a[..n].iter().map(|x| (x - mean_a).powi(2)).sum::<f64>()
        + b[..n].iter().map(|y| (y - mean_b).powi(2)).sum::<f64>();
    if spread > 0.0 {
        1.0 - mismatch / spread
    } else if mismatch == 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Per-bunch result before gas-detector calibration.
#[derive(Clone, Debug)]
struct BunchRetrieval {
    group: Option<usize>,
    correlation: f64,
    delay: f64,
    delay_change: f64,
    energy_diff: f64,
    energy_diff_change: f64,
    lasing_current: Vec<f64>,
    nolasing_current: Vec<f64>,
    lasing_com: Vec<f64>,
    nolasing_com: Vec<f64>,
    lasing_rms: Vec<f64>,
    nolasing_rms: Vec<f64>,
    /// Energy-loss power (J/s).
    raw_com: Vec<f64>,
    /// Energy-spread power (arbitrary units).
    raw_rms: Vec<f64>,
    warnings: Vec<Warning>,
}

impl BunchRetrieval {
    fn absent(len: usize) -> Self {
        Self {
            group: None,
            correlation: 0.0,
            delay: 0.0,
            delay_change: 0.0,
            energy_diff: 0.0,
            energy_diff_change: 0.0,
            lasing_current: vec![0.0; len],
            nolasing_current: vec![0.0; len],
            lasing_com: vec![0.0; len],
            nolasing_com: vec![0.0; len],
            lasing_rms: vec![0.0; len],
            nolasing_rms: vec![0.0; len],
            raw_com: vec![0.0; len],
            raw_rms: vec![0.0; len],
            warnings: Vec::new(),
        }
    }
}

/// Best correlated reference group for `bunch`; ties go to the higher index.
fn best_group(reference: &AveragedProfiles, bunch: usize, current: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for g in 0..reference.num_groups {
        let candidate = reference.e_current.slice(s![bunch, g, ..]).to_vec();
        let r2 = squared_correlation(current, &candidate);
        if best.map_or(true, |(_, score)| r2 >= score) {
            best = Some((g, r2));
        }
    }
    best
}

fn retrieve_bunch(
    profile: &ShotProfile,
    reference: &AveragedProfiles,
    bunch: usize,
    config: &ReconstructionConfig,
) -> BunchRetrieval {
    let t = reference.t.to_vec();
    let nt = t.len();
    if bunch >= profile.num_bunches() {
        return BunchRetrieval::absent(nt);
    }

    let traces = bunch_traces(profile, bunch, &t);
    let mut result = BunchRetrieval {
        delay: traces.dist_t,
        energy_diff: traces.dist_e,
        lasing_current: traces.current.clone(),
        ..BunchRetrieval::absent(nt)
    };

    let Some((group, correlation)) = best_group(reference, bunch, &traces.current) else {
        return result;
    };
    debug!("bunch {bunch}: matched reference group {group} (r2 = {correlation:.4})");
    result.group = Some(group);
    result.correlation = correlation;
    result.delay_change = traces.dist_t - reference.dist_t[[bunch, group]];
    result.energy_diff_change = traces.dist_e - reference.dist_e[[bunch, group]];
    result.nolasing_current = reference.e_current.slice(s![bunch, group, ..]).to_vec();

    let Some((start, end)) = current_window(
        &result.lasing_current,
        &result.nolasing_current,
        config.threshold_level,
    ) else {
        let warning = Warning::EmptyCurrentWindow { bunch };
        warn!("{warning}");
        result.warnings.push(warning);
        return result;
    };

    for k in start..=end {
        result.lasing_com[k] = traces.e_com[k];
        result.nolasing_com[k] = reference.e_com_slice[[bunch, group, k]];
        result.lasing_rms[k] = traces.e_rms[k];
        result.nolasing_rms[k] = reference.e_rms_slice[[bunch, group, k]];
    }

    for k in 0..nt {
        let current = result.lasing_current[k];
        result.raw_com[k] =
            (result.nolasing_com[k] - result.lasing_com[k]) * E_CHARGE * 1e6 * current;
        // Interpolated current may dip below zero; the fractional power
        // needs a non-negative base.
        result.raw_rms[k] = (result.lasing_rms[k].powi(2) - result.nolasing_rms[k].powi(2))
            * current.max(0.0).powf(config.current_exponent);
    }
    result
}

/// Retrieves the X-ray power profile of a lasing shot.
///
/// Degenerate conditions (bunch-count mismatch, empty reference, currents
/// below threshold, nothing to calibrate against) are recorded in
/// `warnings` and never abort the retrieval.
#[must_use]
pub fn reconstruct_pulse(
    profile: &ShotProfile,
    reference: &AveragedProfiles,
    config: &ReconstructionConfig,
) -> PulseCharacterization {
    let mut warnings = Vec::new();
    let num_bunches = reference.num_bunches;
    if profile.num_bunches() != num_bunches {
        let warning = Warning::BunchCountMismatch {
            expected: num_bunches,
            found: profile.num_bunches(),
        };
        warn!("{warning}");
        warnings.push(warning);
    }
    if reference.is_empty() {
        warn!("{}", Warning::EmptyReference);
        warnings.push(Warning::EmptyReference);
    }

    let bunches: Vec<BunchRetrieval> = (0..num_bunches)
        .into_par_iter()
        .map(|bunch| retrieve_bunch(profile, reference, bunch, config))
        .collect();

    let t = reference.t.clone();
    let nt = t.len();
    let dt_seconds = reference.dt() * 1e-15;
    let xray_energy = profile.shot_to_shot.xray_energy;

    let com_energy: f64 = bunches.iter().flat_map(|b| &b.raw_com).sum::<f64>() * dt_seconds;
    let electrons: f64 = bunches.iter().flat_map(|b| &b.lasing_current).sum::<f64>() * dt_seconds;
    let rms_energy: f64 = bunches.iter().flat_map(|b| &b.raw_rms).sum::<f64>() * dt_seconds;

    // Energy lost per electron that the COM method does not see.
    let offset = if electrons > 0.0 && electrons.is_finite() {
        (xray_energy - com_energy) / electrons
    } else {
        warn!("{}", Warning::UncalibratedCom);
        warnings.push(Warning::UncalibratedCom);
        0.0
    };
    let rms_scale = if rms_energy != 0.0 && rms_energy.is_finite() {
        xray_energy / rms_energy
    } else {
        warn!("{}", Warning::UncalibratedRms);
        warnings.push(Warning::UncalibratedRms);
        0.0
    };

    let mut out = PulseCharacterization {
        t,
        power_raw_com: Array2::zeros((num_bunches, nt)),
        power_raw_rms: Array2::zeros((num_bunches, nt)),
        power_com: Array2::zeros((num_bunches, nt)),
        power_rms: Array2::zeros((num_bunches, nt)),
        power_agreement: vec![0.0; num_bunches],
        bunch_delay: vec![0.0; num_bunches],
        bunch_delay_change: vec![0.0; num_bunches],
        bunch_energy_diff: vec![0.0; num_bunches],
        bunch_energy_diff_change: vec![0.0; num_bunches],
        xray_energy,
        e_bunch_com: vec![0.0; num_bunches],
        e_bunch_rms: vec![0.0; num_bunches],
        lasing_e_current: Array2::zeros((num_bunches, nt)),
        nolasing_e_current: Array2::zeros((num_bunches, nt)),
        lasing_e_com: Array2::zeros((num_bunches, nt)),
        nolasing_e_com: Array2::zeros((num_bunches, nt)),
        lasing_e_rms: Array2::zeros((num_bunches, nt)),
        nolasing_e_rms: Array2::zeros((num_bunches, nt)),
        reference_group: vec![None; num_bunches],
        match_correlation: vec![0.0; num_bunches],
        num_bunches,
        warnings,
    };

    for (j, bunch) in bunches.into_iter().enumerate() {
        let power_com: Vec<f64> = (0..nt)
            .map(|k| {
                ((bunch.nolasing_com[k] - bunch.lasing_com[k]) * E_CHARGE * 1e6 + offset)
                    * bunch.lasing_current[k]
                    * 1e-9
            })
            .collect();
        let power_rms: Vec<f64> = bunch.raw_rms.iter().map(|p| p * rms_scale * 1e-9).collect();

        out.power_agreement[j] = power_agreement(&power_com, &power_rms);
        out.e_bunch_com[j] = power_com.iter().sum::<f64>() * dt_seconds * 1e9;
        out.e_bunch_rms[j] = power_rms.iter().sum::<f64>() * dt_seconds * 1e9;

        out.power_com.row_mut(j).assign(&Array1::from(power_com));
        out.power_rms.row_mut(j).assign(&Array1::from(power_rms));
        out.power_raw_com
            .row_mut(j)
            .assign(&Array1::from_iter(bunch.raw_com.iter().map(|p| p * 1e-9)));
        out.power_raw_rms
            .row_mut(j)
            .assign(&Array1::from(bunch.raw_rms));
        out.lasing_e_current
            .row_mut(j)
            .assign(&Array1::from(bunch.lasing_current));
        out.nolasing_e_current
            .row_mut(j)
            .assign(&Array1::from(bunch.nolasing_current));
        out.lasing_e_com.row_mut(j).assign(&Array1::from(bunch.lasing_com));
        out.nolasing_e_com
            .row_mut(j)
            .assign(&Array1::from(bunch.nolasing_com));
        out.lasing_e_rms.row_mut(j).assign(&Array1::from(bunch.lasing_rms));
        out.nolasing_e_rms
            .row_mut(j)
            .assign(&Array1::from(bunch.nolasing_rms));

        out.bunch_delay[j] = bunch.delay;
        out.bunch_delay_change[j] = bunch.delay_change;
        out.bunch_energy_diff[j] = bunch.energy_diff;
        out.bunch_energy_diff_change[j] = bunch.energy_diff_change;
        out.reference_group[j] = bunch.group;
        out.match_correlation[j] = bunch.correlation;
        out.warnings.extend(bunch.warnings);
    }
    out
}
