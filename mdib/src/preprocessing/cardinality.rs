//! At most one child of a `Single` kind per parent.

use std::collections::{HashMap, HashSet};

use crate::core::error::{SegmentError, SegmentFailure};
use crate::core::kind::{Cardinality, DescriptorKind};
use crate::core::modification::{DescriptionBatch, ModificationKind};
use crate::preprocessing::PreprocessingSegment;
use crate::storage::tree::MdibTree;

#[derive(Debug, Default)]
pub struct CardinalityChecker {
    /// Kinds inserted under each parent earlier in the batch.
    inserted: HashMap<String, Vec<(String, DescriptorKind)>>,
    deleted: HashSet<String>,
}

impl CardinalityChecker {
    fn has_sibling(&self, parent: &str, kind: DescriptorKind, tree: &MdibTree) -> bool {
        let committed = tree
            .children(parent, kind)
            .into_iter()
            .any(|sibling| !self.deleted.contains(sibling.handle()));
        let in_batch = self.inserted.get(parent).is_some_and(|children| {
            children
                .iter()
                .any(|(handle, k)| *k == kind && !self.deleted.contains(handle))
        });
        committed || in_batch
    }
}

impl PreprocessingSegment for CardinalityChecker {
    fn name(&self) -> &'static str {
        "cardinality"
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
            match (modification.kind, modification.parent.as_deref()) {
                (ModificationKind::Insert, Some(parent)) => {
                    let kind = modification.descriptor.kind;
                    if kind.shape().cardinality == Cardinality::Single
                        && self.has_sibling(parent, kind, tree)
                    {
                        return Err(SegmentFailure::at(
                            handle,
                            SegmentError::Cardinality {
                                kind,
                                handle: handle.to_string(),
                                parent: parent.to_string(),
                            },
                        ));
                    }
                    self.deleted.remove(handle);
                    self.inserted
                        .entry(parent.to_string())
                        .or_default()
                        .push((handle.to_string(), kind));
                }
                (ModificationKind::Delete, _) => {
                    self.deleted.extend(tree.subtree(handle));
                    self.deleted.insert(handle.to_string());
                }
                _ => {}
            }
        }
        Ok(())
    }
}
