//! Shot-level records flowing between the retrieval stages.

use crate::calibration::ShotToShot;
use crate::quality::Warning;
use crate::roi::RegionOfInterest;
use crate::statistics::ImageStatistics;
use crate::units::PhysicalUnits;
use ndarray::{Array1, Array2, Array3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything the retrieval needs to know about one shot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShotProfile {
    /// One entry per bunch, bunch 0 first.
    pub image_stats: Vec<ImageStatistics>,
    pub physical_units: PhysicalUnits,
    pub roi: RegionOfInterest,
    pub shot_to_shot: ShotToShot,
}

impl ShotProfile {
    #[must_use]
    pub fn num_bunches(&self) -> usize {
        self.image_stats.len()
    }

    /// Delay of `bunch` relative to bunch 0 (fs).
    #[must_use]
    pub fn bunch_delay(&self, bunch: usize) -> f64 {
        (self.image_stats[bunch].x_com - self.image_stats[0].x_com)
            * self.physical_units.xfs_per_pix
    }

    /// Energy offset of `bunch` relative to bunch 0 (MeV).
    #[must_use]
    pub fn bunch_energy_offset(&self, bunch: usize) -> f64 {
        (self.image_stats[bunch].y_com - self.image_stats[0].y_com)
            * self.physical_units.ymev_per_pix
    }
}

/// No-lasing reference averaged per bunch and per correlation group.
///
/// Three-dimensional arrays are indexed `[bunch, group, time]`, two-dimensional
/// ones `[bunch, group]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AveragedProfiles {
    /// Master time axis (fs).
    pub t: Array1<f64>,
    /// Electron current (electrons/s).
    pub e_current: Array3<f64>,
    /// Energy centre of mass per time sample (MeV).
    pub e_com_slice: Array3<f64>,
    /// Energy spread per time sample (MeV).
    pub e_rms_slice: Array3<f64>,
    /// Delay relative to bunch 0 (fs).
    pub dist_t: Array2<f64>,
    /// Energy offset relative to bunch 0 (MeV).
    pub dist_e: Array2<f64>,
    /// Bunch duration (fs).
    pub t_rms: Array2<f64>,
    /// Bunch energy spread (MeV).
    pub e_rms: Array2<f64>,
    /// Timestamp of a representative shot per group.
    pub event_time: Array2<u64>,
    /// Fiducial of a representative shot per group.
    pub event_fid: Array2<u32>,
    pub num_bunches: usize,
    pub num_groups: usize,
    /// Shot indices belonging to each group, per bunch.
    pub group_members: Vec<Vec<Vec<usize>>>,
    pub warnings: Vec<Warning>,
}

impl AveragedProfiles {
    /// Master time step (fs); zero for a single-sample axis.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn dt(&self) -> f64 {
        let n = self.t.len();
        if n < 2 {
            return 0.0;
        }
        (self.t[n - 1] - self.t[0]) / (n - 1) as f64
    }

    /// Returns true if no reference group could be formed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_groups == 0
    }
}

/// Retrieved X-ray power of one lasing shot.
///
/// Two-dimensional arrays are indexed `[bunch, time]` on the reference's
/// master time axis.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PulseCharacterization {
    pub t: Array1<f64>,
    /// Energy-loss power before gas-detector normalisation (GW).
    pub power_raw_com: Array2<f64>,
    /// Energy-spread power before normalisation (arbitrary units).
    pub power_raw_rms: Array2<f64>,
    /// Energy-loss power calibrated to the gas detector (GW).
    pub power_com: Array2<f64>,
    /// Energy-spread power calibrated to the gas detector (GW).
    pub power_rms: Array2<f64>,
    /// Agreement between the two methods; 1 is perfect.
    pub power_agreement: Vec<f64>,
    /// Delay relative to bunch 0 (fs).
    pub bunch_delay: Vec<f64>,
    /// Change of that delay with respect to the matched reference (fs).
    pub bunch_delay_change: Vec<f64>,
    /// Energy offset relative to bunch 0 (MeV).
    pub bunch_energy_diff: Vec<f64>,
    /// Change of that offset with respect to the matched reference (MeV).
    pub bunch_energy_diff_change: Vec<f64>,
    /// Gas-detector pulse energy used for calibration (J).
    pub xray_energy: f64,
    /// Pulse energy per bunch from the energy-loss method (J).
    pub e_bunch_com: Vec<f64>,
    /// Pulse energy per bunch from the energy-spread method (J).
    pub e_bunch_rms: Vec<f64>,
    pub lasing_e_current: Array2<f64>,
    pub nolasing_e_current: Array2<f64>,
    pub lasing_e_com: Array2<f64>,
    pub nolasing_e_com: Array2<f64>,
    pub lasing_e_rms: Array2<f64>,
    pub nolasing_e_rms: Array2<f64>,
    /// Matched reference group per bunch.
    pub reference_group: Vec<Option<usize>>,
    /// Squared correlation with the matched group.
    pub match_correlation: Vec<f64>,
    pub num_bunches: usize,
    pub warnings: Vec<Warning>,
}

impl PulseCharacterization {
    /// Returns true if no warning was raised.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
