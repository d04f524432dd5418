//! Validation and versioning applied to a batch before it is committed.
//!
//! A chain runs its segments in declared order. Each segment sees the whole
//! batch and may append to a description batch; segments that run later see
//! the appended entries. Per-batch segment state is reset in
//! `before_first_modification`, and `after_last_modification` only runs when
//! every segment accepted the batch.

pub mod cardinality;
pub mod chain;
pub mod duplicate_handle;
pub mod handle_reference;
pub mod type_consistency;
pub mod version_handler;

use crate::core::error::SegmentFailure;
use crate::core::modification::{DescriptionBatch, StateBatch};
use crate::storage::tree::MdibTree;

/// One step of the preprocessing chain.
///
/// Segments only override the batch types they care about; the defaults
/// accept the batch unchanged.
pub trait PreprocessingSegment {
    /// Stable identifier used in error reports and logs.
    fn name(&self) -> &'static str;

    fn before_first_modification(&mut self, _tree: &MdibTree) {}

    /// Validate or extend a description batch.
    ///
    /// Implementations that append iterate by index against the current
    /// length so the appended entries are processed as well.
    fn process_description(
        &mut self,
        _batch: &mut DescriptionBatch,
        _tree: &MdibTree,
    ) -> Result<(), SegmentFailure> {
        Ok(())
    }

    /// Validate or rewrite a state batch. The batch is handled as a whole.
    fn process_states(
        &mut self,
        _batch: &mut StateBatch,
        _tree: &MdibTree,
    ) -> Result<(), SegmentFailure> {
        Ok(())
    }

    fn after_last_modification(&mut self, _tree: &MdibTree) {}
}

pub type BoxedSegment = Box<dyn PreprocessingSegment + Send + Sync>;
