//! Versioned JSON documents for references and calibration constants.

use crate::{Error, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use xtcav_core::{AveragedProfiles, GlobalCalibration};

/// Format tag of an averaged no-lasing reference document.
pub const REFERENCE_FORMAT: &str = "xtcav-reference";
/// Format tag of a global calibration document.
pub const CALIBRATION_FORMAT: &str = "xtcav-calibration";
/// Newest document version this crate reads and the one it writes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    format: &'a str,
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    format: String,
    version: u32,
    data: serde_json::Value,
}

/// Sibling path the document is staged at before the rename.
fn staging_path(path: &Path) -> Result<PathBuf> {
    let Some(name) = path.file_name() else {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", path.display()),
        )));
    };
    let mut staged = name.to_os_string();
    staged.push(".tmp");
    Ok(path.with_file_name(staged))
}

fn write_staged<T: Serialize>(staged: &Path, format: &str, data: &T) -> Result<()> {
    let file = File::create(staged)?;
    let mut writer = BufWriter::new(file);
    let envelope = EnvelopeRef {
        format,
        version: FORMAT_VERSION,
        data,
    };
    serde_json::to_writer(&mut writer, &envelope)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn write_document<T: Serialize>(path: &Path, format: &str, data: &T) -> Result<()> {
    let staged = staging_path(path)?;
    if let Err(err) = write_staged(&staged, format, data) {
        // Best effort; the write error is what the caller needs.
        let _ = fs::remove_file(&staged);
        return Err(err);
    }
    fs::rename(&staged, path)?;
    debug!("wrote {format} v{FORMAT_VERSION} to {}", path.display());
    Ok(())
}

fn read_document<T: DeserializeOwned>(path: &Path, format: &str) -> Result<T> {
    let file = File::open(path)?;
    let envelope: Envelope = serde_json::from_reader(BufReader::new(file))?;
    if envelope.format != format {
        return Err(Error::InvalidFormat(format!(
            "{}: expected {format}, found {}",
            path.display(),
            envelope.format
        )));
    }
    if envelope.version > FORMAT_VERSION {
        return Err(Error::InvalidFormat(format!(
            "{}: version {} is newer than supported version {FORMAT_VERSION}",
            path.display(),
            envelope.version
        )));
    }
    debug!("read {format} v{} from {}", envelope.version, path.display());
    Ok(serde_json::from_value(envelope.data)?)
}

fn check_reference(reference: &AveragedProfiles) -> Result<()> {
    let per_group = (reference.num_bunches, reference.num_groups);
    let per_sample = (reference.num_bunches, reference.num_groups, reference.t.len());
    let consistent = reference.e_current.dim() == per_sample
        && reference.e_com_slice.dim() == per_sample
        && reference.e_rms_slice.dim() == per_sample
        && reference.dist_t.dim() == per_group
        && reference.dist_e.dim() == per_group
        && reference.t_rms.dim() == per_group
        && reference.e_rms.dim() == per_group
        && reference.event_time.dim() == per_group
        && reference.event_fid.dim() == per_group
        && reference.group_members.len() == reference.num_bunches;
    if consistent {
        Ok(())
    } else {
        Err(Error::InvalidFormat(format!(
            "reference arrays disagree with {} bunch(es) x {} group(s) x {} samples",
            reference.num_bunches,
            reference.num_groups,
            reference.t.len()
        )))
    }
}

/// Writes an averaged reference to `path`, replacing any existing file.
///
/// # Errors
/// Returns an error if the document cannot be written or renamed into place.
pub fn save_reference<P: AsRef<Path>>(path: P, reference: &AveragedProfiles) -> Result<()> {
    write_document(path.as_ref(), REFERENCE_FORMAT, reference)
}

/// Reads an averaged reference written by [`save_reference`].
///
/// # Errors
/// Returns [`Error::InvalidFormat`] if the file is not a reference document,
/// has a newer version, or its arrays disagree on the bunch, group and sample
/// counts.
pub fn load_reference<P: AsRef<Path>>(path: P) -> Result<AveragedProfiles> {
    let reference: AveragedProfiles = read_document(path.as_ref(), REFERENCE_FORMAT)?;
    check_reference(&reference)?;
    Ok(reference)
}

/// Writes global calibration constants to `path`.
///
/// # Errors
/// Returns an error if the document cannot be written or renamed into place.
pub fn save_calibration<P: AsRef<Path>>(path: P, calibration: &GlobalCalibration) -> Result<()> {
    write_document(path.as_ref(), CALIBRATION_FORMAT, calibration)
}

/// Reads calibration constants written by [`save_calibration`].
///
/// # Errors
/// Returns [`Error::InvalidFormat`] if the file is not a calibration document.
pub fn load_calibration<P: AsRef<Path>>(path: P) -> Result<GlobalCalibration> {
    read_document(path.as_ref(), CALIBRATION_FORMAT)
}
