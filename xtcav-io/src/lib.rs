//! xtcav-io: JSON persistence for XTCAV analysis.
//!
//! Averaged no-lasing references and global calibration constants are stored
//! as versioned JSON documents. Files are written next to their destination
//! and renamed into place, so a reader never observes a partial file.
//!

mod error;
mod store;

pub use error::{Error, Result};
pub use store::{
    load_calibration, load_reference, save_calibration, save_reference, CALIBRATION_FORMAT,
    FORMAT_VERSION, REFERENCE_FORMAT,
};
