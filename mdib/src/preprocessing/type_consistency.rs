//! Parent/child type rules and state shape checks.
//!
//! - The root kind is inserted without a parent.
//! - Every other kind names a parent that exists (committed or inserted
//!   earlier in the batch, and not deleted earlier in the batch) and whose kind
//!   is in the child's allowed-parent set.
//! - Carried states match their descriptor: same kind, at most one state for
//!   single-state kinds, own handles exactly for context states.

use std::collections::{HashMap, HashSet};

use crate::core::error::{SegmentError, SegmentFailure};
use crate::core::kind::DescriptorKind;
use crate::core::modification::{DescriptionBatch, Modification, ModificationKind};
use crate::preprocessing::PreprocessingSegment;
use crate::storage::tree::MdibTree;

#[derive(Debug, Default)]
pub struct TypeConsistencyChecker {
    inserted: HashMap<String, DescriptorKind>,
    deleted: HashSet<String>,
}

impl TypeConsistencyChecker {
    fn parent_kind(&self, parent: &str, tree: &MdibTree) -> Option<DescriptorKind> {
        if let Some(kind) = self.inserted.get(parent) {
            return Some(*kind);
        }
        if self.deleted.contains(parent) {
            return None;
        }
        tree.entity(parent).map(|entity| entity.kind())
    }

    fn check_insert(
        &self,
        modification: &Modification,
        tree: &MdibTree,
    ) -> Result<(), SegmentError> {
        let kind = modification.descriptor.kind;
        let parent_kind = modification
            .parent
            .as_deref()
            .and_then(|parent| self.parent_kind(parent, tree));

        let consistent = if kind.is_root() {
            modification.parent.is_none()
        } else {
            parent_kind.is_some_and(|parent| kind.allows_parent(parent))
        };
        if consistent {
            return Ok(());
        }
        Err(SegmentError::TypeConsistency {
            kind,
            handle: modification.handle().to_string(),
            parent_kind,
            allowed: kind.shape().allowed_parents.to_vec(),
        })
    }
}

impl PreprocessingSegment for TypeConsistencyChecker {
    fn name(&self) -> &'static str {
        "type_consistency"
    }

    fn before_first_modification(&mut self, _tree: &MdibTree) {
        self.inserted.clear();
        self.deleted.clear();
    }

    fn process_description(
        &mut self,
        batch: &mut DescriptionBatch,
        tree: &MdibTree,
    ) -> Result<(), SegmentFailure> {
        for modification in batch.iter() {
            let handle = modification.handle();
            match modification.kind {
                ModificationKind::Insert => {
                    self.check_insert(modification, tree)
                        .and_then(|()| check_state_shape(modification))
                        .map_err(|err| SegmentFailure::at(handle, err))?;
                    self.deleted.remove(handle);
                    self.inserted
                        .insert(handle.to_string(), modification.descriptor.kind);
                }
                ModificationKind::Update => {
                    check_state_shape(modification)
                        .map_err(|err| SegmentFailure::at(handle, err))?;
                }
                ModificationKind::Delete => {
                    self.inserted.remove(handle);
                    self.deleted.extend(tree.subtree(handle));
                }
            }
        }
        Ok(())
    }
}

fn check_state_shape(modification: &Modification) -> Result<(), SegmentError> {
    let descriptor = &modification.descriptor;
    let malformed = |reason: String| SegmentError::StateShape {
        handle: descriptor.handle.clone(),
        reason,
    };

    if !descriptor.kind.is_multi_state() && modification.states.len() > 1 {
        return Err(malformed(format!(
            "{} carries {} states but allows one",
            descriptor.kind,
            modification.states.len()
        )));
    }
    for state in &modification.states {
        if state.kind != descriptor.kind {
            return Err(malformed(format!(
                "state kind {} does not match descriptor kind {}",
                state.kind, descriptor.kind
            )));
        }
        match (descriptor.kind.is_multi_state(), state.handle.is_some()) {
            (true, false) => {
                return Err(malformed("context state requires its own handle".to_string()));
            }
            (false, true) => {
                return Err(malformed(
                    "single state must not carry its own handle".to_string(),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}
