//! Points every carried state at its modification's descriptor.

use crate::core::error::SegmentFailure;
use crate::core::modification::DescriptionBatch;
use crate::preprocessing::PreprocessingSegment;
use crate::storage::tree::MdibTree;

pub struct HandleReferenceHandler;

impl PreprocessingSegment for HandleReferenceHandler {
    fn name(&self) -> &'static str {
        "handle_reference"
    }

    fn process_description(
        &mut self,
        batch: &mut DescriptionBatch,
        _tree: &MdibTree,
    ) -> Result<(), SegmentFailure> {
        let mut index = 0;
        while let Some(modification) = batch.get_mut(index) {
            let handle = &modification.descriptor.handle;
            for state in &mut modification.states {
                if state.descriptor_handle != *handle {
                    state.descriptor_handle.clone_from(handle);
                }
            }
            index += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kind::DescriptorKind;
    use crate::test_support::{context_state, descriptor, initial_version, single_state};

    #[test]
    fn rewrites_descriptor_handle_of_every_state() {
        let ens = descriptor("ens", DescriptorKind::EnsembleContext);
        let mut stray = context_state(&ens, "ens.0", None);
        stray.descriptor_handle = "other".to_string();
        let vmd = descriptor("vmd0", DescriptorKind::Vmd);
        let mut vmd_state = single_state(&vmd);
        vmd_state.descriptor_handle = String::new();
        let mut batch = DescriptionBatch::new()
            .insert(ens, vec![stray], Some("sc0"))
            .update(vmd, vec![vmd_state]);

        let tree = MdibTree::new(initial_version());
        HandleReferenceHandler
            .process_description(&mut batch, &tree)
            .expect("always succeeds");

        let first = batch.get(0).expect("first");
        assert_eq!(first.states[0].descriptor_handle, "ens");
        let second = batch.get(1).expect("second");
        assert_eq!(second.states[0].descriptor_handle, "vmd0");
        assert_eq!(second.states[0].state_handle(), "vmd0");
    }
}
