//! Shared, thread-safe access to one MDIB.
//!
//! Writers hold the exclusive lock for the whole chain run plus commit, so
//! readers only ever observe committed revisions.

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use tracing::info;

use crate::core::entity::{MdibEntity, State};
use crate::core::error::PreprocessingError;
use crate::core::kind::KindFilter;
use crate::core::modification::{DescriptionBatch, StateBatch};
use crate::core::version::MdibVersion;
use crate::io::config::MdibConfig;
use crate::storage::MdibStorage;
use crate::storage::report::{DescriptionReport, StateReport};

struct Inner {
    storage: MdibStorage,
    md_description_version: u64,
    md_state_version: u64,
}

pub struct LocalMdibAccess {
    inner: RwLock<Inner>,
}

impl LocalMdibAccess {
    pub fn new(config: &MdibConfig) -> Self {
        Self::from_storage(MdibStorage::new(config.initial_version()))
    }

    pub fn from_storage(storage: MdibStorage) -> Self {
        Self {
            inner: RwLock::new(Inner {
                storage,
                md_description_version: 0,
                md_state_version: 0,
            }),
        }
    }

    /// Consistent view across several queries; blocks writers while held.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, MdibStorage> {
        RwLockReadGuard::map(self.inner.read(), |inner| &inner.storage)
    }

    pub fn mdib_version(&self) -> MdibVersion {
        self.inner.read().storage.mdib_version().clone()
    }

    /// Number of committed description batches.
    pub fn md_description_version(&self) -> u64 {
        self.inner.read().md_description_version
    }

    /// Number of committed batches of either type.
    pub fn md_state_version(&self) -> u64 {
        self.inner.read().md_state_version
    }

    pub fn entity(&self, handle: &str) -> Option<MdibEntity> {
        self.read().entity(handle).cloned()
    }

    pub fn state(&self, handle: &str, filter: impl Into<KindFilter>) -> Option<State> {
        self.read().state(handle, filter).cloned()
    }

    pub fn apply_description(
        &self,
        batch: DescriptionBatch,
    ) -> Result<DescriptionReport, PreprocessingError> {
        let mut inner = self.inner.write();
        let stamp = inner.storage.mdib_version().increment();
        let report = inner.storage.apply_description(stamp, batch)?;
        inner.md_description_version += 1;
        inner.md_state_version += 1;
        info!(
            mdib_version = %report.mdib_version,
            inserted = report.inserted.len(),
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            "description committed"
        );
        Ok(report)
    }

    pub fn apply_states(&self, batch: StateBatch) -> Result<StateReport, PreprocessingError> {
        let mut inner = self.inner.write();
        let stamp = inner.storage.mdib_version().increment();
        let report = inner.storage.apply_states(stamp, batch)?;
        inner.md_state_version += 1;
        info!(
            mdib_version = %report.mdib_version,
            category = %report.category,
            states = report.states.len(),
            "states committed"
        );
        Ok(report)
    }
}
