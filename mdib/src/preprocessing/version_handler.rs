//! Assigns descriptor and state versions before a batch is committed.
//!
//! Versions are computed from three sources, in order:
//!
//! 1. versions already assigned earlier in the same batch (a handle touched
//!    twice keeps the first assignment),
//! 2. committed storage,
//! 3. versions recorded when a handle was deleted, so a re-inserted handle
//!    keeps counting upwards.
//!
//! The handler never mutates storage. Deletion history gathered during a
//! batch is staged and only becomes persistent once the whole chain accepted
//! the batch.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::core::entity::{MdibEntity, State};
use crate::core::error::{SegmentError, SegmentFailure, VersioningError};
use crate::core::kind::KindFilter;
use crate::core::modification::{DescriptionBatch, Modification, ModificationKind, StateBatch};
use crate::core::version::{VersionPair, next_version};
use crate::preprocessing::PreprocessingSegment;
use crate::storage::tree::MdibTree;

#[derive(Debug, Default)]
pub struct VersionHandler {
    /// Versions recorded at deletion time, kept for the lifetime of the storage.
    deleted: HashMap<String, VersionPair>,
    current: BatchVersions,
}

/// Bookkeeping for the batch in flight; replaced at the start of every batch.
#[derive(Debug, Default)]
struct BatchVersions {
    assigned: HashMap<String, VersionPair>,
    /// Descriptor handles inserted in this batch, with their parent.
    inserted: HashMap<String, Option<String>>,
    /// Descriptor handles removed by deletes in this batch.
    removed: HashSet<String>,
    /// Context state handles written in this batch, with their descriptor.
    context_owners: HashMap<String, String>,
    /// Deletion history staged until the batch is accepted.
    deleted: HashMap<String, VersionPair>,
    /// Batch positions of parent updates queued by this handler.
    cascades: HashSet<usize>,
}

impl VersionHandler {
    /// Versions recorded when `handle` was last deleted.
    pub fn deleted_versions(&self, handle: &str) -> Option<VersionPair> {
        self.deleted.get(handle).copied()
    }

    /// Assigned-or-deleted history used when a handle is (re)inserted.
    fn insert_history(&self, handle: &str) -> Option<VersionPair> {
        self.current
            .assigned
            .get(handle)
            .or_else(|| self.current.deleted.get(handle))
            .or_else(|| self.deleted.get(handle))
            .copied()
    }

    fn deleted_history(&self, handle: &str) -> Option<VersionPair> {
        self.current
            .deleted
            .get(handle)
            .or_else(|| self.deleted.get(handle))
            .copied()
    }

    /// Next state version of a context state written by a description change.
    fn next_context_state_version(&self, handle: &str, tree: &MdibTree) -> u64 {
        if let Some(pair) = self.current.assigned.get(handle) {
            return pair.state_version;
        }
        let previous = tree
            .context_lineage(handle)
            .or_else(|| self.deleted_history(handle));
        next_version(previous.map(|pair| pair.state_version))
    }

    fn assign(&mut self, handle: &str, pair: VersionPair) {
        trace!(
            handle,
            descriptor_version = pair.descriptor_version,
            state_version = pair.state_version,
            "assigned versions"
        );
        self.current.assigned.insert(handle.to_string(), pair);
    }

    fn version_insert(
        &mut self,
        batch: &mut DescriptionBatch,
        index: usize,
        tree: &MdibTree,
    ) -> Result<(), VersioningError> {
        let Some(modification) = batch.get_mut(index) else {
            return Ok(());
        };
        let handle = modification.handle().to_string();
        let parent = modification.parent.clone();
        let kind = modification.descriptor.kind;
        let history = self.insert_history(&handle);
        let descriptor_version = next_version(history.map(|pair| pair.descriptor_version));
        modification.descriptor.descriptor_version = descriptor_version;

        let mut assignments = Vec::with_capacity(modification.states.len() + 1);
        if kind.is_multi_state() {
            let state_version = history.map_or(0, |pair| pair.state_version);
            assignments.push((handle.clone(), VersionPair::new(descriptor_version, state_version)));
            for state in &mut modification.states {
                let previous = self.insert_history(state.state_handle());
                let pair = VersionPair::new(
                    descriptor_version,
                    next_version(previous.map(|pair| pair.state_version)),
                );
                state.stamp(pair);
                assignments.push((state.state_handle().to_string(), pair));
            }
        } else {
            let pair = VersionPair::new(
                descriptor_version,
                next_version(history.map(|pair| pair.state_version)),
            );
            for state in &mut modification.states {
                state.stamp(pair);
            }
            assignments.push((handle.clone(), pair));
        }
        for (assigned, pair) in assignments {
            if assigned != handle {
                self.current.context_owners.insert(assigned.clone(), handle.clone());
            }
            self.assign(&assigned, pair);
        }

        self.current.removed.remove(&handle);
        self.current.inserted.insert(handle.clone(), parent.clone());
        if let Some(parent) = parent {
            self.cascade_parent_update(batch, &parent, &handle, tree)?;
        }
        Ok(())
    }

    fn version_update(
        &mut self,
        batch: &mut DescriptionBatch,
        index: usize,
        tree: &MdibTree,
    ) -> Result<(), VersioningError> {
        let Some(modification) = batch.get_mut(index) else {
            return Ok(());
        };
        let handle = modification.handle().to_string();
        let stored = tree.entity(&handle);
        if self.current.removed.contains(&handle) {
            if self.current.cascades.contains(&index) {
                // The parent went away with a later ancestor delete; commit drops it.
                debug!(%handle, "skipping cascaded update of removed parent");
                return Ok(());
            }
            return Err(VersioningError::UnknownHandle(handle));
        }
        if let Some(entity) = stored {
            if entity.kind() != modification.descriptor.kind {
                return Err(VersioningError::Malformed(format!(
                    "update of '{handle}' changes its kind from {} to {}",
                    entity.kind(),
                    modification.descriptor.kind
                )));
            }
        }

        let pair = match self.current.assigned.get(&handle) {
            Some(pair) => *pair,
            None => {
                let current = stored
                    .map(|entity| entity.versions())
                    .ok_or_else(|| VersioningError::UnknownHandle(handle.clone()))?;
                VersionPair::new(current.descriptor_version + 1, current.state_version + 1)
            }
        };
        modification.descriptor.descriptor_version = pair.descriptor_version;

        let mut assignments = vec![(handle.clone(), pair)];
        if modification.descriptor.kind.is_multi_state() {
            for state in &mut modification.states {
                let context_pair = VersionPair::new(
                    pair.descriptor_version,
                    self.next_context_state_version(state.state_handle(), tree),
                );
                state.stamp(context_pair);
                assignments.push((state.state_handle().to_string(), context_pair));
            }
            // Every live sibling is re-stamped with the new descriptor version.
            let listed: HashSet<String> = modification
                .states
                .iter()
                .map(|state| state.state_handle().to_string())
                .collect();
            for stored_state in tree.context_states(&handle, KindFilter::Any) {
                if listed.contains(stored_state.state_handle()) {
                    continue;
                }
                let mut state = stored_state.clone();
                let context_pair = VersionPair::new(
                    pair.descriptor_version,
                    self.next_context_state_version(state.state_handle(), tree),
                );
                state.stamp(context_pair);
                assignments.push((state.state_handle().to_string(), context_pair));
                modification.states.push(state);
            }
        } else {
            if modification.states.is_empty() {
                if let Some(state) = stored.and_then(|entity| entity.states.first()) {
                    modification.states.push(state.clone());
                }
            }
            for state in &mut modification.states {
                state.stamp(pair);
            }
        }
        for (assigned, pair) in assignments {
            if assigned != handle {
                self.current.context_owners.insert(assigned.clone(), handle.clone());
            }
            self.assign(&assigned, pair);
        }
        Ok(())
    }

    fn version_delete(
        &mut self,
        batch: &mut DescriptionBatch,
        index: usize,
        tree: &MdibTree,
    ) -> Result<(), VersioningError> {
        let Some(handle) = batch.get(index).map(|m| m.handle().to_string()) else {
            return Ok(());
        };
        if self.current.removed.contains(&handle) {
            trace!(%handle, "already removed with an ancestor");
            return Ok(());
        }
        let inserted_parent = self.current.inserted.get(&handle).cloned();
        let parent = match (tree.entity(&handle), inserted_parent) {
            (_, Some(parent)) => parent,
            (Some(entity), None) => entity.parent.clone(),
            (None, None) => return Err(VersioningError::UnknownHandle(handle)),
        };

        for removed in self.removed_handles(&handle, tree) {
            self.record_deletion(&removed, tree);
            self.current.inserted.remove(&removed);
            self.current.removed.insert(removed);
        }

        if let Some(parent) = parent {
            self.cascade_parent_update(batch, &parent, &handle, tree)?;
        }
        Ok(())
    }

    /// `handle` plus every descendant, committed or inserted in this batch.
    fn removed_handles(&self, handle: &str, tree: &MdibTree) -> Vec<String> {
        let mut removed: Vec<String> = tree
            .subtree(handle)
            .into_iter()
            .filter(|h| !self.current.removed.contains(h))
            .collect();
        if removed.is_empty() {
            removed.push(handle.to_string());
        }
        loop {
            let extra: Vec<String> = self
                .current
                .inserted
                .iter()
                .filter(|&(child, parent)| {
                    !removed.contains(child)
                        && parent.as_ref().is_some_and(|p| removed.contains(p))
                })
                .map(|(child, _)| child.clone())
                .collect();
            if extra.is_empty() {
                return removed;
            }
            removed.extend(extra);
        }
    }

    /// Stage the last versions of a removed descriptor and its context states.
    fn record_deletion(&mut self, handle: &str, tree: &MdibTree) {
        let mut staged: Vec<(String, Option<VersionPair>)> =
            vec![(handle.to_string(), tree.entity(handle).map(MdibEntity::versions))];
        staged.extend(
            tree.context_lineage_of(handle)
                .into_iter()
                .map(|state| (state.state_handle().to_string(), Some(state.versions()))),
        );
        staged.extend(
            self.current
                .context_owners
                .iter()
                .filter(|(_, owner)| owner.as_str() == handle)
                .map(|(state_handle, _)| (state_handle.clone(), None)),
        );

        for (staged_handle, stored) in staged {
            let assigned = self.current.assigned.get(&staged_handle).copied();
            if let Some(pair) = assigned.or(stored) {
                self.current.deleted.insert(staged_handle, pair);
            }
        }
    }

    /// Queue an update of `parent` so its descriptor version reflects the
    /// structural change of `child`.
    fn cascade_parent_update(
        &mut self,
        batch: &mut DescriptionBatch,
        parent: &str,
        child: &str,
        tree: &MdibTree,
    ) -> Result<(), VersioningError> {
        if self.current.inserted.contains_key(parent) || batch.contains_delete(parent) {
            return Ok(());
        }
        let Some(entity) = tree.entity(parent) else {
            return Err(VersioningError::MissingParent {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        };
        let (descriptor, states) = match batch.latest_write(parent) {
            Some(queued) => (queued.descriptor.clone(), queued.states.clone()),
            None => (entity.descriptor.clone(), entity.states.clone()),
        };
        trace!(%parent, %child, "queueing cascaded parent update");
        self.current.cascades.insert(batch.len());
        batch.push(Modification::update(descriptor, states));
        Ok(())
    }

    fn version_state(
        &self,
        state: &State,
        tree: &MdibTree,
    ) -> Result<VersionPair, VersioningError> {
        let handle = state.state_handle();
        let descriptor_version = self.current_descriptor_version(state, tree)?;

        let previous = match self.current.assigned.get(handle) {
            Some(pair) => Some(*pair),
            None if !state.is_context() => {
                let stored = tree
                    .state(handle, KindFilter::Any)
                    .ok_or_else(|| VersioningError::UnknownHandle(handle.to_string()))?;
                Some(stored.versions())
            }
            None => {
                if let Some(owner) = tree.context_owner(handle) {
                    if owner != state.descriptor_handle {
                        return Err(VersioningError::Malformed(format!(
                            "context state '{handle}' belongs to '{owner}', not '{}'",
                            state.descriptor_handle
                        )));
                    }
                }
                tree.context_lineage(handle)
                    .or_else(|| self.deleted_history(handle))
            }
        };
        Ok(VersionPair::new(
            descriptor_version,
            next_version(previous.map(|pair| pair.state_version)),
        ))
    }

    /// Descriptor version a state written in a state batch is stamped with.
    fn current_descriptor_version(
        &self,
        state: &State,
        tree: &MdibTree,
    ) -> Result<u64, VersioningError> {
        let owner = &state.descriptor_handle;
        if let Some(pair) = self.current.assigned.get(owner) {
            return Ok(pair.descriptor_version);
        }
        let descriptor = tree.descriptor(owner, KindFilter::Any).ok_or_else(|| {
            if state.is_context() {
                VersioningError::UnknownDescriptor(owner.clone())
            } else {
                VersioningError::UnknownHandle(state.state_handle().to_string())
            }
        })?;
        if descriptor.kind != state.kind {
            return Err(VersioningError::Malformed(format!(
                "{} state '{}' written to {} '{}'",
                state.kind,
                state.state_handle(),
                descriptor.kind,
                owner
            )));
        }
        Ok(descriptor.descriptor_version)
    }
}

impl PreprocessingSegment for VersionHandler {
    fn name(&self) -> &'static str {
        "version_handler"
    }

    fn before_first_modification(&mut self, _tree: &MdibTree) {
        self.current = BatchVersions::default();
    }

    fn process_description(
        &mut self,
        batch: &mut DescriptionBatch,
        tree: &MdibTree,
    ) -> Result<(), SegmentFailure> {
        let mut index = 0;
        while let Some(modification) = batch.get(index) {
            let handle = modification.handle().to_string();
            let kind = modification.kind;
            let result = match kind {
                ModificationKind::Insert => self.version_insert(batch, index, tree),
                ModificationKind::Update => self.version_update(batch, index, tree),
                ModificationKind::Delete => self.version_delete(batch, index, tree),
            };
            result.map_err(|err| SegmentFailure::at(handle, err))?;
            index += 1;
        }
        Ok(())
    }

    fn process_states(
        &mut self,
        batch: &mut StateBatch,
        tree: &MdibTree,
    ) -> Result<(), SegmentFailure> {
        if let Some(state) = batch.first_mismatch() {
            return Err(SegmentFailure::at(
                state.state_handle(),
                SegmentError::CategoryMismatch {
                    category: batch.category,
                    kind: state.kind,
                    handle: state.state_handle().to_string(),
                },
            ));
        }
        for state in &mut batch.states {
            let pair = self
                .version_state(state, tree)
                .map_err(|err| SegmentFailure::at(state.state_handle(), err))?;
            state.stamp(pair);
            let handle = state.state_handle().to_string();
            if state.is_context() {
                self.current
                    .context_owners
                    .insert(handle.clone(), state.descriptor_handle.clone());
            }
            self.assign(&handle, pair);
        }
        Ok(())
    }

    fn after_last_modification(&mut self, _tree: &MdibTree) {
        let staged = std::mem::take(&mut self.current.deleted);
        if !staged.is_empty() {
            trace!(handles = staged.len(), "recording deletion history");
        }
        self.deleted.extend(staged);
    }
}
