//! Committed MDIB tree: indices, read queries and the infallible commit step.
//!
//! Reads never fail on a miss; they return `None` or an empty list. Writes
//! only happen through [`MdibTree::commit_description`] and
//! [`MdibTree::commit_states`], after the preprocessing chain accepted the
//! batch.

use std::collections::HashMap;

use tracing::debug;

use crate::core::entity::{Descriptor, MdibEntity, State};
use crate::core::kind::{DescriptorKind, KindFilter};
use crate::core::modification::{DescriptionBatch, Modification, ModificationKind, StateBatch};
use crate::core::version::{MdibVersion, VersionPair};
use crate::storage::report::{DescriptionReport, ReportBuilder, StateReport};

#[derive(Debug, Clone)]
pub struct MdibTree {
    entities: HashMap<String, MdibEntity>,
    roots: Vec<String>,
    by_kind: HashMap<DescriptorKind, Vec<String>>,
    /// Every committed context state keyed by its own handle, retired ones included.
    context_states: HashMap<String, State>,
    mdib_version: MdibVersion,
}

impl MdibTree {
    pub fn new(mdib_version: MdibVersion) -> Self {
        Self {
            entities: HashMap::new(),
            roots: Vec::new(),
            by_kind: HashMap::new(),
            context_states: HashMap::new(),
            mdib_version,
        }
    }

    /// Revision of the last successful commit (or the initial revision).
    pub fn mdib_version(&self) -> &MdibVersion {
        &self.mdib_version
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.entities.contains_key(handle)
    }

    pub fn entity(&self, handle: &str) -> Option<&MdibEntity> {
        self.entities.get(handle)
    }

    pub fn descriptor(&self, handle: &str, filter: impl Into<KindFilter>) -> Option<&Descriptor> {
        let filter = filter.into();
        self.entities
            .get(handle)
            .map(|entity| &entity.descriptor)
            .filter(|descriptor| filter.matches(descriptor.kind))
    }

    /// Live state by handle: a single-state descriptor handle or a context state handle.
    pub fn state(&self, handle: &str, filter: impl Into<KindFilter>) -> Option<&State> {
        let filter = filter.into();
        let state = match self.entities.get(handle) {
            Some(entity) if !entity.kind().is_multi_state() => entity.states.first(),
            Some(_) => None,
            None => self.context_states.get(handle).filter(|state| state.is_live()),
        };
        state.filter(|state| filter.matches(state.kind))
    }

    /// Live context states of one context descriptor.
    pub fn context_states(
        &self,
        descriptor_handle: &str,
        filter: impl Into<KindFilter>,
    ) -> Vec<&State> {
        let filter = filter.into();
        match self.entities.get(descriptor_handle) {
            Some(entity) if entity.kind().is_multi_state() && filter.matches(entity.kind()) => {
                entity.states.iter().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Live context states across all context descriptors matching `filter`.
    pub fn find_context_states(&self, filter: impl Into<KindFilter>) -> Vec<&State> {
        let filter = filter.into();
        DescriptorKind::ALL
            .into_iter()
            .filter(|kind| kind.is_multi_state() && filter.matches(*kind))
            .flat_map(|kind| self.handles_of_kind(kind))
            .filter_map(|handle| self.entities.get(handle))
            .flat_map(|entity| entity.states.iter())
            .collect()
    }

    pub fn root_entities(&self) -> Vec<&MdibEntity> {
        self.roots
            .iter()
            .filter_map(|handle| self.entities.get(handle))
            .collect()
    }

    pub fn children(&self, handle: &str, filter: impl Into<KindFilter>) -> Vec<&MdibEntity> {
        let filter = filter.into();
        let Some(parent) = self.entities.get(handle) else {
            return Vec::new();
        };
        parent
            .children
            .iter()
            .filter_map(|child| self.entities.get(child))
            .filter(|child| filter.matches(child.kind()))
            .collect()
    }

    pub fn entities_by_kind(&self, filter: impl Into<KindFilter>) -> Vec<&MdibEntity> {
        let filter = filter.into();
        DescriptorKind::ALL
            .into_iter()
            .filter(|kind| filter.matches(*kind))
            .flat_map(|kind| self.handles_of_kind(kind))
            .filter_map(|handle| self.entities.get(handle))
            .collect()
    }

    /// Entities in depth-first order, roots in insertion order.
    pub fn depth_first(&self) -> Vec<&MdibEntity> {
        let mut output = Vec::with_capacity(self.entities.len());
        let mut stack: Vec<&str> = self.roots.iter().rev().map(String::as_str).collect();
        while let Some(handle) = stack.pop() {
            let Some(entity) = self.entities.get(handle) else {
                continue;
            };
            output.push(entity);
            stack.extend(entity.children.iter().rev().map(String::as_str));
        }
        output
    }

    /// Versions of a committed context state, retired or live.
    pub(crate) fn context_lineage(&self, handle: &str) -> Option<VersionPair> {
        self.context_states.get(handle).map(State::versions)
    }

    /// Descriptor a committed context state belongs to.
    pub(crate) fn context_owner(&self, handle: &str) -> Option<&str> {
        self.context_states
            .get(handle)
            .map(|state| state.descriptor_handle.as_str())
    }

    /// Handles of `handle` and all of its descendants, parent before children.
    pub(crate) fn subtree(&self, handle: &str) -> Vec<String> {
        let mut output = Vec::new();
        let mut stack = vec![handle.to_string()];
        while let Some(current) = stack.pop() {
            let Some(entity) = self.entities.get(&current) else {
                continue;
            };
            stack.extend(entity.children.iter().rev().cloned());
            output.push(current);
        }
        output
    }

    /// Context states (retired included) owned by `descriptor_handle`.
    pub(crate) fn context_lineage_of(&self, descriptor_handle: &str) -> Vec<&State> {
        let mut states: Vec<&State> = self
            .context_states
            .values()
            .filter(|state| state.descriptor_handle == descriptor_handle)
            .collect();
        states.sort_by(|a, b| a.state_handle().cmp(b.state_handle()));
        states
    }

    fn handles_of_kind(&self, kind: DescriptorKind) -> impl Iterator<Item = &String> {
        self.by_kind.get(&kind).into_iter().flatten()
    }

    pub(crate) fn commit_description(
        &mut self,
        stamp: MdibVersion,
        batch: DescriptionBatch,
    ) -> DescriptionReport {
        let mut report = ReportBuilder::default();
        for modification in batch.into_modifications() {
            match modification.kind {
                ModificationKind::Insert => self.commit_insert(&stamp, modification, &mut report),
                ModificationKind::Update => self.commit_update(&stamp, modification, &mut report),
                ModificationKind::Delete => self.commit_delete(modification.handle(), &mut report),
            }
        }
        self.mdib_version = stamp.clone();
        report.build(self, stamp)
    }

    pub(crate) fn commit_states(&mut self, stamp: MdibVersion, batch: StateBatch) -> StateReport {
        for state in &batch.states {
            let Some(entity) = self.entities.get_mut(&state.descriptor_handle) else {
                debug!(handle = %state.state_handle(), "skipping state of removed descriptor");
                continue;
            };
            entity.last_changed = stamp.clone();
            if state.is_context() {
                upsert_live_state(&mut entity.states, state);
                self.context_states
                    .insert(state.state_handle().to_string(), state.clone());
            } else {
                entity.states = vec![state.clone()];
            }
        }
        self.mdib_version = stamp.clone();
        StateReport {
            mdib_version: stamp,
            category: batch.category,
            states: batch.states,
        }
    }

    fn commit_insert(
        &mut self,
        stamp: &MdibVersion,
        modification: Modification,
        report: &mut ReportBuilder,
    ) {
        let handle = modification.descriptor.handle.clone();
        if self.entities.contains_key(&handle) {
            // Only reachable for a repeated insert inside one batch; last write wins.
            debug!(%handle, "insert replaces entity inserted earlier in the batch");
            self.remove_subtree(&handle);
        }
        if let Some(parent) = &modification.parent {
            let Some(parent_entity) = self.entities.get_mut(parent) else {
                debug!(%handle, %parent, "skipping insert under removed parent");
                return;
            };
            parent_entity.children.push(handle.clone());
        } else {
            self.roots.push(handle.clone());
        }

        let kind = modification.descriptor.kind;
        let mut live = Vec::with_capacity(modification.states.len());
        let mut retired = Vec::new();
        for state in modification.states {
            if state.is_context() {
                self.context_states
                    .insert(state.state_handle().to_string(), state.clone());
            }
            if state.is_live() {
                live.push(state);
            } else {
                retired.push(state);
            }
        }

        self.by_kind.entry(kind).or_default().push(handle.clone());
        self.entities.insert(
            handle.clone(),
            MdibEntity {
                descriptor: modification.descriptor,
                states: live,
                parent: modification.parent,
                children: Vec::new(),
                last_changed: stamp.clone(),
            },
        );
        report.record_insert(&handle);
        for state in &retired {
            report.record_retired(&handle, state);
        }
    }

    fn commit_update(
        &mut self,
        stamp: &MdibVersion,
        modification: Modification,
        report: &mut ReportBuilder,
    ) {
        let handle = modification.descriptor.handle.clone();
        let Some(entity) = self.entities.get_mut(&handle) else {
            debug!(%handle, "skipping update of entity removed earlier in the batch");
            return;
        };
        entity.descriptor = modification.descriptor;
        entity.last_changed = stamp.clone();
        if entity.kind().is_multi_state() {
            for state in &modification.states {
                upsert_live_state(&mut entity.states, state);
                self.context_states
                    .insert(state.state_handle().to_string(), state.clone());
                if !state.is_live() {
                    report.record_retired(&handle, state);
                }
            }
        } else if let Some(state) = modification.states.into_iter().next() {
            entity.states = vec![state];
        }
        report.record_update(&handle);
    }

    fn commit_delete(&mut self, handle: &str, report: &mut ReportBuilder) {
        if !self.entities.contains_key(handle) {
            debug!(%handle, "skipping delete of entity removed earlier in the batch");
            return;
        }
        let removed = self.remove_subtree(handle);
        report.record_delete(&removed);
    }

    /// Detach `handle` from its parent and drop its whole subtree from every index.
    fn remove_subtree(&mut self, handle: &str) -> Vec<String> {
        let parent = self.entities.get(handle).and_then(|e| e.parent.clone());
        match parent.and_then(|p| self.entities.get_mut(&p)) {
            Some(parent) => parent.children.retain(|child| child != handle),
            None => self.roots.retain(|root| root != handle),
        }

        let removed = self.subtree(handle);
        for current in &removed {
            let Some(entity) = self.entities.remove(current) else {
                continue;
            };
            if let Some(handles) = self.by_kind.get_mut(&entity.kind()) {
                handles.retain(|h| h != current);
            }
            if entity.kind().is_multi_state() {
                self.context_states
                    .retain(|_, state| &state.descriptor_handle != current);
            }
        }
        removed
    }
}

/// Write a context state into a live list, honouring its association.
fn upsert_live_state(states: &mut Vec<State>, state: &State) {
    let position = states
        .iter()
        .position(|existing| existing.state_handle() == state.state_handle());
    match (position, state.is_live()) {
        (Some(index), true) => states[index] = state.clone(),
        (Some(index), false) => {
            states.remove(index);
        }
        (None, true) => states.push(state.clone()),
        (None, false) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::ContextAssociation;
    use crate::test_support::{context_state, descriptor, initial_version, single_state};

    fn committed(batch: DescriptionBatch) -> MdibTree {
        let mut tree = MdibTree::new(initial_version());
        tree.commit_description(initial_version().increment(), batch);
        tree
    }

    fn base_batch() -> DescriptionBatch {
        let mds = descriptor("mds0", DescriptorKind::Mds);
        let vmd = descriptor("vmd0", DescriptorKind::Vmd);
        let ch = descriptor("ch0", DescriptorKind::Channel);
        let metric = descriptor("m0", DescriptorKind::NumericMetric);
        DescriptionBatch::new()
            .insert(mds.clone(), vec![single_state(&mds)], None)
            .insert(vmd.clone(), vec![single_state(&vmd)], Some("mds0"))
            .insert(ch.clone(), vec![single_state(&ch)], Some("vmd0"))
            .insert(metric.clone(), vec![single_state(&metric)], Some("ch0"))
    }

    #[test]
    fn insert_links_parent_and_indexes_kind() {
        let tree = committed(base_batch());
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.entity("vmd0").expect("vmd0").children, vec!["ch0"]);
        assert_eq!(tree.root_entities().len(), 1);
        assert_eq!(
            tree.entities_by_kind(DescriptorKind::Channel)[0].handle(),
            "ch0"
        );
        let order: Vec<&str> = tree.depth_first().into_iter().map(MdibEntity::handle).collect();
        assert_eq!(order, vec!["mds0", "vmd0", "ch0", "m0"]);
    }

    #[test]
    fn queries_return_empty_on_miss_or_filter_mismatch() {
        let tree = committed(base_batch());
        assert!(tree.entity("missing").is_none());
        assert!(tree.descriptor("vmd0", DescriptorKind::Channel).is_none());
        assert!(tree.descriptor("vmd0", KindFilter::Any).is_some());
        assert!(tree.state("m0", crate::core::kind::StateCategory::Alert).is_none());
        assert!(tree.state("m0", crate::core::kind::StateCategory::Metric).is_some());
        assert!(tree.context_states("vmd0", KindFilter::Any).is_empty());
        assert!(tree.children("missing", KindFilter::Any).is_empty());
    }

    #[test]
    fn delete_removes_subtree_and_reports_descendants() {
        let mut tree = committed(base_batch());
        let vmd = descriptor("vmd0", DescriptorKind::Vmd);
        let report = tree.commit_description(
            initial_version().increment().increment(),
            DescriptionBatch::new().delete(vmd),
        );
        assert_eq!(report.deleted, vec!["vmd0", "ch0", "m0"]);
        assert_eq!(tree.len(), 1);
        assert!(tree.entity("mds0").expect("mds0").children.is_empty());
        assert!(tree.entities_by_kind(DescriptorKind::NumericMetric).is_empty());
    }

    #[test]
    fn retired_context_state_leaves_live_list_but_keeps_lineage() {
        let mut tree = committed(base_batch());
        let sc = descriptor("sc0", DescriptorKind::SystemContext);
        let pat = descriptor("pat", DescriptorKind::PatientContext);
        let associated = context_state(&pat, "pat.0", Some(ContextAssociation::Associated));
        tree.commit_description(
            initial_version(),
            DescriptionBatch::new()
                .insert(sc.clone(), vec![single_state(&sc)], Some("mds0"))
                .insert(pat.clone(), vec![associated.clone()], Some("sc0")),
        );
        assert_eq!(tree.find_context_states(KindFilter::Any).len(), 1);

        let mut retired = associated;
        retired.context_association = Some(ContextAssociation::NotAssociated);
        retired.state_version = 1;
        let report = tree.commit_states(
            initial_version(),
            StateBatch::new(crate::core::kind::StateCategory::Context).with(retired),
        );

        assert_eq!(report.states.len(), 1);
        assert!(tree.context_states("pat", KindFilter::Any).is_empty());
        assert!(tree.state("pat.0", KindFilter::Any).is_none());
        assert_eq!(
            tree.context_lineage("pat.0").map(|v| v.state_version),
            Some(1)
        );
    }
}
