//! xtcav-core: Data model and numeric helpers for XTCAV pulse retrieval.
//!
//! This crate holds the records exchanged between the processing stages
//! (image statistics, physical axes, averaged references, retrieved pulses)
//! together with the quality signals attached to them.
//!

pub mod calibration;
pub mod error;
pub mod numeric;
pub mod profiles;
pub mod quality;
pub mod roi;
pub mod statistics;
pub mod units;

pub use calibration::{GlobalCalibration, ShotToShot, E_CHARGE};
pub use error::{Error, Result};
pub use profiles::{AveragedProfiles, PulseCharacterization, ShotProfile};
pub use quality::{Checked, Warning};
pub use roi::RegionOfInterest;
pub use statistics::ImageStatistics;
pub use units::PhysicalUnits;
