//! Rejects inserts of handles that already exist in committed storage.
//!
//! Only committed storage is consulted. Two inserts of the same fresh handle
//! inside one batch pass this segment; the commit step resolves them as
//! last-write-wins.

use crate::core::error::{SegmentError, SegmentFailure};
use crate::core::modification::DescriptionBatch;
use crate::preprocessing::PreprocessingSegment;
use crate::storage::tree::MdibTree;

pub struct DuplicateHandleChecker;

impl PreprocessingSegment for DuplicateHandleChecker {
    fn name(&self) -> &'static str {
        "duplicate_handle"
    }

    fn process_description(
        &mut self,
        batch: &mut DescriptionBatch,
        tree: &MdibTree,
    ) -> Result<(), SegmentFailure> {
        for modification in batch.iter().filter(|m| m.is_insert()) {
            let handle = modification.handle();
            if tree.contains(handle) {
                return Err(duplicate(handle));
            }
            for state in modification.states.iter().filter(|s| s.handle.is_some()) {
                let state_handle = state.state_handle();
                if tree.contains(state_handle) || tree.context_lineage(state_handle).is_some() {
                    return Err(duplicate(state_handle));
                }
            }
        }
        Ok(())
    }
}

fn duplicate(handle: &str) -> SegmentFailure {
    SegmentFailure::at(handle, SegmentError::DuplicateHandle(handle.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kind::DescriptorKind;
    use crate::test_support::{context_state, descriptor, single_state, standard_storage};

    #[test]
    fn rejects_insert_of_committed_handle() {
        let storage = standard_storage();
        let vmd = descriptor("vmd0", DescriptorKind::Vmd);
        let mut batch =
            DescriptionBatch::new().insert(vmd.clone(), vec![single_state(&vmd)], Some("mds0"));

        let err = DuplicateHandleChecker
            .process_description(&mut batch, storage.tree())
            .expect_err("duplicate");
        assert_eq!(err.handle.as_deref(), Some("vmd0"));
        assert_eq!(err.error, SegmentError::DuplicateHandle("vmd0".to_string()));
    }

    #[test]
    fn rejects_context_state_handle_colliding_with_descriptor() {
        let storage = standard_storage();
        let ens = descriptor("ens", DescriptorKind::EnsembleContext);
        let state = context_state(&ens, "vmd0", None);
        let mut batch = DescriptionBatch::new().insert(ens, vec![state], Some("sc0"));

        let err = DuplicateHandleChecker
            .process_description(&mut batch, storage.tree())
            .expect_err("duplicate");
        assert_eq!(err.handle.as_deref(), Some("vmd0"));
    }

    #[test]
    fn in_batch_duplicates_are_not_this_segments_concern() {
        let storage = standard_storage();
        let vmd = descriptor("vmd9", DescriptorKind::Vmd);
        let mut batch = DescriptionBatch::new()
            .insert(vmd.clone(), vec![single_state(&vmd)], Some("mds0"))
            .insert(vmd.clone(), vec![single_state(&vmd)], Some("mds0"));

        DuplicateHandleChecker
            .process_description(&mut batch, storage.tree())
            .expect("storage-only check");
    }
}
