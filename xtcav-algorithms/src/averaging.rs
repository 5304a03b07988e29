//! No-lasing reference averaging.
//!
//! Reference shots are resampled onto a master time axis, grouped by the
//! similarity of their current profiles and averaged group by group. Every
//! bunch is grouped independently.
//!
//! Grouping is greedy: the first unassigned shot seeds a group and pulls in
//! the `shots_per_group - 1` unassigned shots best correlated with it. The
//! result depends only on input order, so a reference set is reproducible.
#![allow(clippy::cast_precision_loss)]

use log::{debug, warn};
use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;
use xtcav_core::numeric::{axis_len, squared_correlation, uniform_axis};
use xtcav_core::{AveragedProfiles, Checked, ShotProfile, Warning};

use crate::traces::{aligned_shape, bunch_traces};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reference averaging configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AveragingConfig {
    /// Number of shots averaged into each group.
    pub shots_per_group: usize,
}

impl Default for AveragingConfig {
    fn default() -> Self {
        Self { shots_per_group: 5 }
    }
}

impl AveragingConfig {
    /// Set the group size.
    #[must_use]
    pub fn with_shots_per_group(mut self, shots: usize) -> Self {
        self.shots_per_group = shots;
        self
    }
}

/// Returns true if the shot's time axis can be resampled: a non-zero,
/// finite pixel step and finite coordinates.
fn has_usable_time_axis(profile: &ShotProfile) -> bool {
    let units = &profile.physical_units;
    let step = units.time_step();
    step > 0.0 && step.is_finite() && units.xfs.iter().all(|x| x.is_finite())
}

/// Master time axis covering every usable shot, stepped at half the finest
/// pixel time step.
///
/// Shots with a zero or non-finite time calibration are skipped and flagged
/// with [`Warning::UnusableTimeAxis`]. The axis always contains the origin.
/// Without any usable shot, or if the axis would exceed
/// [`xtcav_core::numeric::MAX_AXIS_SAMPLES`], it degrades to the single sample `[0]`.
#[must_use]
pub fn master_time_axis(profiles: &[ShotProfile]) -> Checked<Vec<f64>> {
    let mut warnings = Vec::new();
    let mut t_min = 0.0_f64;
    let mut t_max = 0.0_f64;
    let mut min_step = f64::INFINITY;
    for (shot, profile) in profiles.iter().enumerate() {
        if !has_usable_time_axis(profile) {
            let warning = Warning::UnusableTimeAxis { shot };
            warn!("{warning}");
            warnings.push(warning);
            continue;
        }
        let units = &profile.physical_units;
        for &x in &units.xfs {
            t_min = t_min.min(x);
            t_max = t_max.max(x);
        }
        min_step = min_step.min(units.time_step());
    }

    if !min_step.is_finite() {
        return Checked::with_warnings(vec![0.0], warnings);
    }
    let step = min_step / 2.0;
    if axis_len(t_min, t_max, step).is_none() {
        let warning = Warning::TimeAxisTooLong {
            span_fs: t_max - t_min,
            step_fs: step,
        };
        warn!("{warning}");
        warnings.push(warning);
        return Checked::with_warnings(vec![0.0], warnings);
    }
    Checked::with_warnings(uniform_axis(t_min, t_max, step), warnings)
}

/// Greedy correlation grouping of equally sampled traces.
///
/// Returns `floor(len / shots_per_group)` groups of shot indices, each sorted
/// ascending. Among equally correlated candidates the earlier shot wins.
#[must_use]
pub fn assign_groups(traces: &[Vec<f64>], shots_per_group: usize) -> Vec<Vec<usize>> {
    if shots_per_group == 0 {
        return Vec::new();
    }
    let num_groups = traces.len() / shots_per_group;
    let mut assigned = vec![false; traces.len()];
    let mut groups = Vec::with_capacity(num_groups);

    for _ in 0..num_groups {
        let Some(seed) = assigned.iter().position(|done| !done) else {
            break;
        };
        assigned[seed] = true;

        let mut candidates: Vec<(usize, f64)> = (seed + 1..traces.len())
            .filter(|&i| !assigned[i])
            .map(|i| (i, squared_correlation(&traces[seed], &traces[i])))
            .collect();
        // Stable sort keeps ascending shot order among ties.
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut members = vec![seed];
        for &(i, _) in candidates.iter().take(shots_per_group - 1) {
            assigned[i] = true;
            members.push(i);
        }
        members.sort_unstable();
        groups.push(members);
    }
    groups
}

/// One shot's share of a group average, or the running sum of several.
#[derive(Clone, Debug)]
struct GroupSum {
    current: Vec<f64>,
    e_com: Vec<f64>,
    e_rms: Vec<f64>,
    dist_t: f64,
    dist_e: f64,
    t_rms: f64,
    e_rms_total: f64,
}

impl GroupSum {
    fn zeros(len: usize) -> Self {
        Self {
            current: vec![0.0; len],
            e_com: vec![0.0; len],
            e_rms: vec![0.0; len],
            dist_t: 0.0,
            dist_e: 0.0,
            t_rms: 0.0,
            e_rms_total: 0.0,
        }
    }

    fn from_shot(profile: &ShotProfile, bunch: usize, t: &[f64]) -> Self {
        let traces = bunch_traces(profile, bunch, t);
        let stats = &profile.image_stats[bunch];
        let units = &profile.physical_units;
        Self {
            current: traces.current,
            e_com: traces.e_com,
            e_rms: traces.e_rms,
            dist_t: traces.dist_t,
            dist_e: traces.dist_e,
            t_rms: stats.x_rms * units.xfs_per_pix,
            e_rms_total: stats.y_rms * units.ymev_per_pix,
        }
    }

    fn combine(mut self, other: Self) -> Self {
        add_into(&mut self.current, &other.current);
        add_into(&mut self.e_com, &other.e_com);
        add_into(&mut self.e_rms, &other.e_rms);
        self.dist_t += other.dist_t;
        self.dist_e += other.dist_e;
        self.t_rms += other.t_rms;
        self.e_rms_total += other.e_rms_total;
        self
    }

    fn scaled(mut self, factor: f64) -> Self {
        for v in self
            .current
            .iter_mut()
            .chain(self.e_com.iter_mut())
            .chain(self.e_rms.iter_mut())
        {
            *v *= factor;
        }
        self.dist_t *= factor;
        self.dist_e *= factor;
        self.t_rms *= factor;
        self.e_rms_total *= factor;
        self
    }
}

fn add_into(acc: &mut [f64], other: &[f64]) {
    for (a, b) in acc.iter_mut().zip(other) {
        *a += b;
    }
}

/// Averages of every group of one bunch.
struct BunchAverage {
    groups: Vec<Vec<usize>>,
    sums: Vec<GroupSum>,
    events: Vec<(u64, u32)>,
}

/// Groups and averages `bunch` over the shots listed in `usable`; group
/// members are reported as indices into `profiles`.
fn average_bunch(
    profiles: &[ShotProfile],
    usable: &[usize],
    bunch: usize,
    t: &[f64],
    shots_per_group: usize,
) -> BunchAverage {
    let shapes: Vec<Vec<f64>> = usable
        .iter()
        .map(|&i| aligned_shape(&profiles[i], bunch, t))
        .collect();
    let groups: Vec<Vec<usize>> = assign_groups(&shapes, shots_per_group)
        .into_iter()
        .map(|members| members.into_iter().map(|m| usable[m]).collect())
        .collect();
    debug!("bunch {bunch}: {} reference groups", groups.len());

    let norm = 1.0 / shots_per_group as f64;
    let sums = groups
        .iter()
        .map(|members| {
            members
                .iter()
                .map(|&i| GroupSum::from_shot(&profiles[i], bunch, t))
                .fold(GroupSum::zeros(t.len()), GroupSum::combine)
                .scaled(norm)
        })
        .collect();

    // The representative event is the last member processed.
    let events = groups
        .iter()
        .map(|members| {
            members.last().map_or((0, 0), |&i| {
                let shot = &profiles[i].shot_to_shot;
                (shot.unix_time, shot.fiducial)
            })
        })
        .collect();

    BunchAverage {
        groups,
        sums,
        events,
    }
}

/// Builds the averaged no-lasing reference from a batch of shots.
///
/// Fewer usable shots than `shots_per_group` produce an empty reference
/// flagged with [`Warning::NoReferenceGroups`]. Shots without a usable time
/// calibration are left out. Shots disagreeing on the number of bunches are
/// averaged over the bunches they all share.
#[must_use]
pub fn average_profiles(profiles: &[ShotProfile], config: &AveragingConfig) -> AveragedProfiles {
    let axis = master_time_axis(profiles);
    let mut warnings = axis.warnings;
    let t = axis.value;

    let usable: Vec<usize> = (0..profiles.len())
        .filter(|&i| has_usable_time_axis(&profiles[i]))
        .collect();
    let bunch_counts: Vec<usize> = usable.iter().map(|&i| profiles[i].num_bunches()).collect();

    let expected_bunches = bunch_counts.first().copied().unwrap_or(0);
    let num_bunches = bunch_counts.iter().copied().min().unwrap_or(0);
    if let Some(&found) = bunch_counts.iter().find(|&&n| n != expected_bunches) {
        let warning = Warning::BunchCountMismatch {
            expected: expected_bunches,
            found,
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    let shots_per_group = config.shots_per_group;
    let num_groups = if shots_per_group == 0 {
        0
    } else {
        usable.len() / shots_per_group
    };
    if num_groups == 0 {
        let warning = Warning::NoReferenceGroups {
            shots: usable.len(),
            shots_per_group,
        };
        warn!("{warning}");
        warnings.push(warning);
    }

    let bunches: Vec<BunchAverage> = (0..num_bunches)
        .into_par_iter()
        .map(|bunch| average_bunch(profiles, &usable, bunch, &t, shots_per_group))
        .collect();

    let nt = t.len();
    let mut e_current = Array3::zeros((num_bunches, num_groups, nt));
    let mut e_com_slice = Array3::zeros((num_bunches, num_groups, nt));
    let mut e_rms_slice = Array3::zeros((num_bunches, num_groups, nt));
    let mut dist_t = Array2::zeros((num_bunches, num_groups));
    let mut dist_e = Array2::zeros((num_bunches, num_groups));
    let mut t_rms = Array2::zeros((num_bunches, num_groups));
    let mut e_rms = Array2::zeros((num_bunches, num_groups));
    let mut event_time = Array2::zeros((num_bunches, num_groups));
    let mut event_fid = Array2::zeros((num_bunches, num_groups));
    let mut group_members = Vec::with_capacity(num_bunches);

    for (j, bunch) in bunches.into_iter().enumerate() {
        for (g, (sum, (time, fid))) in bunch.sums.into_iter().zip(bunch.events).enumerate() {
            for (k, &v) in sum.current.iter().enumerate() {
                e_current[[j, g, k]] = v;
            }
            for (k, &v) in sum.e_com.iter().enumerate() {
                e_com_slice[[j, g, k]] = v;
            }
            for (k, &v) in sum.e_rms.iter().enumerate() {
                e_rms_slice[[j, g, k]] = v;
            }
            dist_t[[j, g]] = sum.dist_t;
            dist_e[[j, g]] = sum.dist_e;
            t_rms[[j, g]] = sum.t_rms;
            e_rms[[j, g]] = sum.e_rms_total;
            event_time[[j, g]] = time;
            event_fid[[j, g]] = fid;
        }
        group_members.push(bunch.groups);
    }

    AveragedProfiles {
        t: Array1::from(t),
        e_current,
        e_com_slice,
        e_rms_slice,
        dist_t,
        dist_e,
        t_rms,
        e_rms,
        event_time,
        event_fid,
        num_bunches,
        num_groups,
        group_members,
        warnings,
    }
}
