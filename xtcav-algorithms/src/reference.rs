//! Shared, atomically replaceable no-lasing reference.

use std::sync::{Arc, PoisonError, RwLock};

use log::info;
use xtcav_core::{AveragedProfiles, PulseCharacterization, ShotProfile};

use crate::reconstruction::{reconstruct_pulse, ReconstructionConfig};

/// Holds the reference set currently used for retrieval.
///
/// Readers take an `Arc` snapshot; a recalibration swaps in a complete new
/// set, so a reader sees either the old or the new reference, never a mix.
#[derive(Debug, Default)]
pub struct ReferenceStore {
    current: RwLock<Option<Arc<AveragedProfiles>>>,
}

impl ReferenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `reference`.
    #[must_use]
    pub fn with_reference(reference: AveragedProfiles) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(reference))),
        }
    }

    /// Installs a new reference set and returns the previous one.
    pub fn replace(&self, reference: AveragedProfiles) -> Option<Arc<AveragedProfiles>> {
        info!(
            "installing reference: {} bunch(es), {} group(s), {} time samples",
            reference.num_bunches,
            reference.num_groups,
            reference.t.len()
        );
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        guard.replace(Arc::new(reference))
    }

    /// Snapshot of the current reference set.
    #[must_use]
    pub fn current(&self) -> Option<Arc<AveragedProfiles>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Retrieves a lasing shot against the current reference, if any.
    #[must_use]
    pub fn reconstruct(
        &self,
        profile: &ShotProfile,
        config: &ReconstructionConfig,
    ) -> Option<PulseCharacterization> {
        let reference = self.current()?;
        Some(reconstruct_pulse(profile, &reference, config))
    }
}
