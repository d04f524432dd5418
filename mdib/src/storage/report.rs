//! Change reports returned by a successful commit.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::entity::{MdibEntity, State};
use crate::core::kind::StateCategory;
use crate::core::version::MdibVersion;
use crate::storage::tree::MdibTree;

/// Entities written by one description batch.
///
/// Each handle appears at most once in `inserted` and `updated`, and never in
/// both. Entities are snapshots taken right after the commit, plus any context
/// state the batch wrote as not associated, so retired states stay visible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionReport {
    pub mdib_version: MdibVersion,
    pub inserted: Vec<MdibEntity>,
    pub updated: Vec<MdibEntity>,
    /// Removed descriptor handles: explicit deletes first, then their descendants.
    pub deleted: Vec<String>,
}

impl DescriptionReport {
    pub fn inserted_handles(&self) -> Vec<&str> {
        self.inserted.iter().map(MdibEntity::handle).collect()
    }

    pub fn updated_handles(&self) -> Vec<&str> {
        self.updated.iter().map(MdibEntity::handle).collect()
    }

    pub fn updated_entity(&self, handle: &str) -> Option<&MdibEntity> {
        self.updated.iter().find(|entity| entity.handle() == handle)
    }

    pub fn inserted_entity(&self, handle: &str) -> Option<&MdibEntity> {
        self.inserted.iter().find(|entity| entity.handle() == handle)
    }
}

/// States written by one state batch, exactly as committed.
///
/// Retired context states are listed even though they left the live tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateReport {
    pub mdib_version: MdibVersion,
    pub category: StateCategory,
    pub states: Vec<State>,
}

/// Collects handles while a batch is committed.
#[derive(Debug, Default)]
pub(crate) struct ReportBuilder {
    inserted: Vec<String>,
    updated: Vec<String>,
    deleted: Vec<String>,
    deleted_descendants: Vec<String>,
    /// Not-associated context states written per descriptor, in write order.
    retired: HashMap<String, Vec<State>>,
}

impl ReportBuilder {
    pub(crate) fn record_insert(&mut self, handle: &str) {
        self.retired.remove(handle);
        self.updated.retain(|h| h != handle);
        push_unique(&mut self.inserted, handle);
    }

    pub(crate) fn record_update(&mut self, handle: &str) {
        if self.inserted.iter().any(|h| h == handle) {
            return;
        }
        push_unique(&mut self.updated, handle);
    }

    /// Remember a context state that left (or never joined) the live list.
    pub(crate) fn record_retired(&mut self, handle: &str, state: &State) {
        let states = self.retired.entry(handle.to_string()).or_default();
        states.retain(|existing| existing.state_handle() != state.state_handle());
        states.push(state.clone());
    }

    /// `removed` is the explicitly deleted handle followed by its descendants.
    pub(crate) fn record_delete(&mut self, removed: &[String]) {
        for (index, handle) in removed.iter().enumerate() {
            self.retired.remove(handle);
            self.inserted.retain(|h| h != handle);
            self.updated.retain(|h| h != handle);
            if index == 0 {
                self.deleted_descendants.retain(|h| h != handle);
                push_unique(&mut self.deleted, handle);
            } else if !self.deleted.contains(handle) {
                push_unique(&mut self.deleted_descendants, handle);
            }
        }
    }

    pub(crate) fn build(self, tree: &MdibTree, mdib_version: MdibVersion) -> DescriptionReport {
        let retired = &self.retired;
        let snapshot = |handles: Vec<String>| -> Vec<MdibEntity> {
            handles
                .iter()
                .filter_map(|handle| {
                    let mut entity = tree.entity(handle).cloned()?;
                    for state in retired.get(handle).into_iter().flatten() {
                        let live = entity
                            .states
                            .iter()
                            .any(|existing| existing.state_handle() == state.state_handle());
                        if !live {
                            entity.states.push(state.clone());
                        }
                    }
                    Some(entity)
                })
                .collect()
        };
        DescriptionReport {
            mdib_version,
            inserted: snapshot(self.inserted),
            updated: snapshot(self.updated),
            deleted: self.deleted.into_iter().chain(self.deleted_descendants).collect(),
        }
    }
}

fn push_unique(handles: &mut Vec<String>, handle: &str) {
    if !handles.iter().any(|h| h == handle) {
        handles.push(handle.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::ContextAssociation;
    use crate::core::kind::DescriptorKind;
    use crate::test_support::{context_state, descriptor};

    #[test]
    fn insert_absorbs_later_updates_of_same_handle() {
        let mut builder = ReportBuilder::default();
        builder.record_insert("ch0");
        builder.record_update("ch0");
        builder.record_update("vmd0");
        builder.record_update("vmd0");
        assert_eq!(builder.inserted, vec!["ch0"]);
        assert_eq!(builder.updated, vec!["vmd0"]);
    }

    #[test]
    fn delete_drops_pending_insert_and_update_entries() {
        let mut builder = ReportBuilder::default();
        builder.record_insert("ch0");
        builder.record_update("vmd0");
        builder.record_delete(&["vmd0".to_string(), "ch0".to_string()]);
        assert!(builder.inserted.is_empty());
        assert!(builder.updated.is_empty());
        assert_eq!(builder.deleted, vec!["vmd0"]);
        assert_eq!(builder.deleted_descendants, vec!["ch0"]);
    }

    #[test]
    fn retired_states_are_dropped_with_their_descriptor() {
        let ops = descriptor("ops", DescriptorKind::OperatorContext);
        let retired = context_state(&ops, "op.1", Some(ContextAssociation::NotAssociated));
        let mut builder = ReportBuilder::default();
        builder.record_update("ops");
        builder.record_retired("ops", &retired);
        builder.record_retired("ops", &retired);
        assert_eq!(builder.retired["ops"].len(), 1);

        builder.record_delete(&["sc0".to_string(), "ops".to_string()]);
        assert!(builder.retired.is_empty());
    }

    #[test]
    fn explicit_deletes_are_listed_before_descendants() {
        let mut builder = ReportBuilder::default();
        builder.record_delete(&["ch0".to_string(), "m0".to_string()]);
        builder.record_delete(&["ch1".to_string(), "m1".to_string()]);
        let tree = MdibTree::new(MdibVersion::new("seq", 0, 0));
        let report = builder.build(&tree, MdibVersion::new("seq", 0, 1));
        assert_eq!(report.deleted, vec!["ch0", "ch1", "m0", "m1"]);
    }
}
