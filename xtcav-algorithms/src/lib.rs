//! xtcav-algorithms: XTCAV image analysis and X-ray power retrieval.
//!
//! This crate provides the processing stages:
//! - **Preprocessing** - dark subtraction, denoising, trace cropping
//! - **Extraction** - projections, centres of mass and slice moments
//! - **Units** - pixel to femtosecond / MeV calibration
//! - **Averaging** - correlation-grouped no-lasing references
//! - **Reconstruction** - dual-method single-shot power profiles
//!

mod averaging;
mod extraction;
mod preprocess;
mod reconstruction;
mod reference;
mod traces;
mod units;

pub use averaging::{assign_groups, average_profiles, master_time_axis, AveragingConfig};
pub use extraction::{image_statistics, process_image};
pub use preprocess::{
    denoise_image, find_roi, subtract_background, DarkBackground, DenoiseConfig, RoiConfig,
};
pub use reconstruction::{
    current_window, power_agreement, reconstruct_pulse, ReconstructionConfig,
};
pub use reference::ReferenceStore;
pub use units::{cos_phase_diff, physical_units, profile_shot, MIN_COS_PHASE_DIFF};

// Re-export core records for convenience
pub use xtcav_core::{
    AveragedProfiles, Checked, GlobalCalibration, ImageStatistics, PhysicalUnits,
    PulseCharacterization, RegionOfInterest, ShotProfile, ShotToShot, Warning,
};
