//! Batches of changes submitted to the storage.

use serde::{Deserialize, Serialize};

use crate::core::entity::{Descriptor, State};
use crate::core::kind::StateCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationKind {
    Insert,
    Update,
    Delete,
}

/// One change to the description (descriptor tree) of the MDIB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    #[serde(rename = "type")]
    pub kind: ModificationKind,
    pub descriptor: Descriptor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<State>,
    /// Required for inserts of non-root kinds, forbidden for the root kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Modification {
    pub fn insert(descriptor: Descriptor, states: Vec<State>, parent: Option<&str>) -> Self {
        Self {
            kind: ModificationKind::Insert,
            descriptor,
            states,
            parent: parent.map(str::to_string),
        }
    }

    pub fn update(descriptor: Descriptor, states: Vec<State>) -> Self {
        Self {
            kind: ModificationKind::Update,
            descriptor,
            states,
            parent: None,
        }
    }

    pub fn delete(descriptor: Descriptor) -> Self {
        Self {
            kind: ModificationKind::Delete,
            descriptor,
            states: Vec::new(),
            parent: None,
        }
    }

    pub fn handle(&self) -> &str {
        &self.descriptor.handle
    }

    pub fn is_insert(&self) -> bool {
        self.kind == ModificationKind::Insert
    }
}

/// Ordered description changes committed together.
///
/// Segments may append while the batch is being traversed, so consumers
/// iterate by index against the current [`len`](Self::len).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptionBatch {
    modifications: Vec<Modification>,
}

impl DescriptionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        mut self,
        descriptor: Descriptor,
        states: Vec<State>,
        parent: Option<&str>,
    ) -> Self {
        self.push(Modification::insert(descriptor, states, parent));
        self
    }

    pub fn update(mut self, descriptor: Descriptor, states: Vec<State>) -> Self {
        self.push(Modification::update(descriptor, states));
        self
    }

    pub fn delete(mut self, descriptor: Descriptor) -> Self {
        self.push(Modification::delete(descriptor));
        self
    }

    pub fn push(&mut self, modification: Modification) {
        self.modifications.push(modification);
    }

    pub fn len(&self) -> usize {
        self.modifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Modification> {
        self.modifications.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Modification> {
        self.modifications.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Modification> {
        self.modifications.iter()
    }

    /// Latest queued insert or update for `handle`, if any.
    pub fn latest_write(&self, handle: &str) -> Option<&Modification> {
        self.modifications
            .iter()
            .rev()
            .find(|m| m.kind != ModificationKind::Delete && m.handle() == handle)
    }

    pub fn contains_delete(&self, handle: &str) -> bool {
        self.modifications
            .iter()
            .any(|m| m.kind == ModificationKind::Delete && m.handle() == handle)
    }

    pub fn into_modifications(self) -> Vec<Modification> {
        self.modifications
    }
}

impl From<Vec<Modification>> for DescriptionBatch {
    fn from(modifications: Vec<Modification>) -> Self {
        Self { modifications }
    }
}

impl<'a> IntoIterator for &'a DescriptionBatch {
    type Item = &'a Modification;
    type IntoIter = std::slice::Iter<'a, Modification>;

    fn into_iter(self) -> Self::IntoIter {
        self.modifications.iter()
    }
}

/// State updates of a single category committed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateBatch {
    pub category: StateCategory,
    #[serde(default)]
    pub states: Vec<State>,
}

impl StateBatch {
    pub fn new(category: StateCategory) -> Self {
        Self {
            category,
            states: Vec::new(),
        }
    }

    pub fn with(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// First state whose kind does not belong to the batch category.
    pub fn first_mismatch(&self) -> Option<&State> {
        self.states
            .iter()
            .find(|state| state.kind.category() != self.category)
    }
}
