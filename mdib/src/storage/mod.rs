//! MDIB storage: the committed tree plus the chain every batch passes first.
//!
//! A batch is either rejected by the chain, leaving the tree untouched, or
//! committed as a whole.

pub mod report;
pub mod tree;

use tracing::debug;

use crate::core::entity::{Descriptor, MdibEntity, State};
use crate::core::error::PreprocessingError;
use crate::core::kind::KindFilter;
use crate::core::modification::{DescriptionBatch, StateBatch};
use crate::core::version::MdibVersion;
use crate::preprocessing::chain::PreprocessingChain;
use report::{DescriptionReport, StateReport};
use tree::MdibTree;

pub struct MdibStorage {
    tree: MdibTree,
    chain: PreprocessingChain,
}

impl MdibStorage {
    /// Empty storage with the default preprocessing chain.
    pub fn new(mdib_version: MdibVersion) -> Self {
        Self::with_chain(mdib_version, PreprocessingChain::default())
    }

    pub fn with_chain(mdib_version: MdibVersion, chain: PreprocessingChain) -> Self {
        Self {
            tree: MdibTree::new(mdib_version),
            chain,
        }
    }

    pub fn tree(&self) -> &MdibTree {
        &self.tree
    }

    pub fn mdib_version(&self) -> &MdibVersion {
        self.tree.mdib_version()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn entity(&self, handle: &str) -> Option<&MdibEntity> {
        self.tree.entity(handle)
    }

    pub fn descriptor(&self, handle: &str, filter: impl Into<KindFilter>) -> Option<&Descriptor> {
        self.tree.descriptor(handle, filter)
    }

    pub fn state(&self, handle: &str, filter: impl Into<KindFilter>) -> Option<&State> {
        self.tree.state(handle, filter)
    }

    pub fn context_states(
        &self,
        descriptor_handle: &str,
        filter: impl Into<KindFilter>,
    ) -> Vec<&State> {
        self.tree.context_states(descriptor_handle, filter)
    }

    pub fn find_context_states(&self, filter: impl Into<KindFilter>) -> Vec<&State> {
        self.tree.find_context_states(filter)
    }

    pub fn root_entities(&self) -> Vec<&MdibEntity> {
        self.tree.root_entities()
    }

    pub fn children(&self, handle: &str, filter: impl Into<KindFilter>) -> Vec<&MdibEntity> {
        self.tree.children(handle, filter)
    }

    pub fn entities_by_kind(&self, filter: impl Into<KindFilter>) -> Vec<&MdibEntity> {
        self.tree.entities_by_kind(filter)
    }

    /// Run the chain over `batch` and commit it under `stamp`.
    pub fn apply_description(
        &mut self,
        stamp: MdibVersion,
        mut batch: DescriptionBatch,
    ) -> Result<DescriptionReport, PreprocessingError> {
        self.chain.run_description(&mut batch, &self.tree)?;
        debug!(mdib_version = %stamp, modifications = batch.len(), "committing description");
        Ok(self.tree.commit_description(stamp, batch))
    }

    pub fn apply_states(
        &mut self,
        stamp: MdibVersion,
        mut batch: StateBatch,
    ) -> Result<StateReport, PreprocessingError> {
        self.chain.run_states(&mut batch, &self.tree)?;
        debug!(mdib_version = %stamp, states = batch.len(), "committing states");
        Ok(self.tree.commit_states(stamp, batch))
    }
}
