//! Calibration constants and per-shot machine parameters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Electron charge in coulombs.
pub const E_CHARGE: f64 = 1.602_176_57e-19;

/// Fixed optics and RF calibration of the deflector and the dump screen.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalCalibration {
    /// Camera pixel size (um/pixel).
    pub um_per_pix: f64,
    /// Deflector streaking strength.
    pub str_strength: f64,
    /// RF amplitude at which the streak was calibrated.
    pub rf_amp_calib: f64,
    /// RF phase at zero crossing (degrees).
    pub rf_phase_calib: f64,
    /// Beam energy at the dump (MeV).
    pub dump_e: f64,
    /// Dispersion at the dump screen (m).
    pub dump_disp: f64,
}

impl GlobalCalibration {
    #[must_use]
    pub fn new(
        um_per_pix: f64,
        str_strength: f64,
        rf_amp_calib: f64,
        rf_phase_calib: f64,
        dump_e: f64,
        dump_disp: f64,
    ) -> Self {
        Self {
            um_per_pix,
            str_strength,
            rf_amp_calib,
            rf_phase_calib,
            dump_e,
            dump_disp,
        }
    }

    /// Set the RF phase reference.
    #[must_use]
    pub fn with_rf_phase_calib(mut self, degrees: f64) -> Self {
        self.rf_phase_calib = degrees;
        self
    }

    /// Set the RF amplitude reference.
    #[must_use]
    pub fn with_rf_amp_calib(mut self, amplitude: f64) -> Self {
        self.rf_amp_calib = amplitude;
        self
    }

    /// Set the pixel size.
    #[must_use]
    pub fn with_um_per_pix(mut self, um_per_pix: f64) -> Self {
        self.um_per_pix = um_per_pix;
        self
    }
}

/// Machine readings recorded alongside one camera frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShotToShot {
    /// Event timestamp (seconds since epoch).
    pub unix_time: u64,
    /// Event fiducial.
    pub fiducial: u32,
    /// Deflector RF amplitude (MV).
    pub xtcav_rf_amp: f64,
    /// Deflector RF phase (degrees).
    pub xtcav_rf_phase: f64,
    /// Charge reaching the dump (C).
    pub dump_e_charge: f64,
    /// Gas-detector pulse energy (J).
    pub xray_energy: f64,
}

impl Default for ShotToShot {
    fn default() -> Self {
        Self {
            unix_time: 0,
            fiducial: 0,
            xtcav_rf_amp: 20.0,
            xtcav_rf_phase: 90.0,
            dump_e_charge: 175e-12,
            xray_energy: 0.2e-3,
        }
    }
}

impl ShotToShot {
    /// Number of electrons in the dumped charge.
    #[must_use]
    pub fn num_electrons(&self) -> f64 {
        self.dump_e_charge / E_CHARGE
    }

    #[must_use]
    pub fn with_event(mut self, unix_time: u64, fiducial: u32) -> Self {
        self.unix_time = unix_time;
        self.fiducial = fiducial;
        self
    }

    #[must_use]
    pub fn with_rf(mut self, amplitude: f64, phase_degrees: f64) -> Self {
        self.xtcav_rf_amp = amplitude;
        self.xtcav_rf_phase = phase_degrees;
        self
    }

    #[must_use]
    pub fn with_dump_charge(mut self, charge: f64) -> Self {
        self.dump_e_charge = charge;
        self
    }

    #[must_use]
    pub fn with_xray_energy(mut self, joules: f64) -> Self {
        self.xray_energy = joules;
        self
    }
}
