//! Descriptors, states and the entities the storage hands out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::kind::DescriptorKind;
use crate::core::version::{MdibVersion, VersionPair};

/// Structural node of the device tree.
///
/// `content` is opaque to the store; only handle, kind and version are
/// interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub handle: String,
    pub kind: DescriptorKind,
    #[serde(default)]
    pub descriptor_version: u64,
    #[serde(default)]
    pub content: Value,
}

impl Descriptor {
    pub fn new(handle: impl Into<String>, kind: DescriptorKind) -> Self {
        Self {
            handle: handle.into(),
            kind,
            descriptor_version: 0,
            content: Value::Null,
        }
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }
}

/// Lifecycle tag of a context state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextAssociation {
    Associated,
    Disassociated,
    /// Retired: kept out of the live tree, lineage preserved.
    #[serde(rename = "NONE")]
    NotAssociated,
}

/// Mutable value of a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub descriptor_handle: String,
    /// Own handle of a context state. Single states are identified by their
    /// descriptor handle and leave this empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    pub kind: DescriptorKind,
    #[serde(default)]
    pub state_version: u64,
    #[serde(default)]
    pub descriptor_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_association: Option<ContextAssociation>,
    #[serde(default)]
    pub content: Value,
}

impl State {
    /// State of a single-state descriptor.
    pub fn single(descriptor: &Descriptor) -> Self {
        Self {
            descriptor_handle: descriptor.handle.clone(),
            handle: None,
            kind: descriptor.kind,
            state_version: 0,
            descriptor_version: 0,
            context_association: None,
            content: Value::Null,
        }
    }

    /// Context state with its own handle under `descriptor`.
    pub fn context(
        descriptor: &Descriptor,
        handle: impl Into<String>,
        association: Option<ContextAssociation>,
    ) -> Self {
        Self {
            handle: Some(handle.into()),
            context_association: association,
            ..Self::single(descriptor)
        }
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    /// Handle that identifies this state for versioning and lookups.
    pub fn state_handle(&self) -> &str {
        self.handle.as_deref().unwrap_or(&self.descriptor_handle)
    }

    pub fn is_context(&self) -> bool {
        self.kind.is_multi_state()
    }

    /// True when the state belongs in the live tree.
    pub fn is_live(&self) -> bool {
        self.context_association != Some(ContextAssociation::NotAssociated)
    }

    pub fn versions(&self) -> VersionPair {
        VersionPair::new(self.descriptor_version, self.state_version)
    }

    pub(crate) fn stamp(&mut self, versions: VersionPair) {
        self.descriptor_version = versions.descriptor_version;
        self.state_version = versions.state_version;
    }
}

/// Descriptor with its live states and position in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdibEntity {
    pub descriptor: Descriptor,
    pub states: Vec<State>,
    pub parent: Option<String>,
    pub children: Vec<String>,
    /// Revision of the last commit that wrote this entity.
    pub last_changed: MdibVersion,
}

impl MdibEntity {
    pub fn handle(&self) -> &str {
        &self.descriptor.handle
    }

    pub fn kind(&self) -> DescriptorKind {
        self.descriptor.kind
    }

    /// Versions of the descriptor and, for single-state kinds, its state.
    ///
    /// Context descriptors report a state version of 0; each context state
    /// carries its own lineage.
    pub fn versions(&self) -> VersionPair {
        let state_version = if self.kind().is_multi_state() {
            0
        } else {
            self.states.first().map_or(0, |state| state.state_version)
        };
        VersionPair::new(self.descriptor.descriptor_version, state_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_state_is_identified_by_descriptor_handle() {
        let descriptor = Descriptor::new("vmd0", DescriptorKind::Vmd);
        let state = State::single(&descriptor);
        assert_eq!(state.state_handle(), "vmd0");
        assert!(!state.is_context());
        assert!(state.is_live());
    }

    #[test]
    fn retired_context_state_is_not_live() {
        let descriptor = Descriptor::new("pat", DescriptorKind::PatientContext);
        let state = State::context(
            &descriptor,
            "pat.0",
            Some(ContextAssociation::NotAssociated),
        );
        assert_eq!(state.state_handle(), "pat.0");
        assert!(state.is_context());
        assert!(!state.is_live());
    }

    #[test]
    fn association_uses_wire_labels() {
        let json = serde_json::to_string(&ContextAssociation::NotAssociated).expect("serialize");
        assert_eq!(json, "\"NONE\"");
        let parsed: ContextAssociation =
            serde_json::from_str("\"DISASSOCIATED\"").expect("deserialize");
        assert_eq!(parsed, ContextAssociation::Disassociated);
    }
}
