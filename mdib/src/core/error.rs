//! Failures raised while preprocessing a batch.
//!
//! Every error is a deterministic rejection of the whole batch. Nothing is
//! committed when one is returned.

use thiserror::Error;

use crate::core::kind::{DescriptorKind, StateCategory};

/// Lookup or structural failure raised by the version handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersioningError {
    #[error("missing parent '{parent}' to be inserted before child '{child}'")]
    MissingParent { parent: String, child: String },

    #[error("handle '{0}' not found in storage or earlier in the batch")]
    UnknownHandle(String),

    #[error("descriptor '{0}' of state not found in storage or earlier in the batch")]
    UnknownDescriptor(String),

    #[error("malformed batch: {0}")]
    Malformed(String),
}

/// Rejection reported by a single preprocessing segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    #[error("cardinality violated: parent '{parent}' already holds a {kind}, cannot insert '{handle}'")]
    Cardinality {
        kind: DescriptorKind,
        handle: String,
        parent: String,
    },

    #[error("handle '{0}' already exists")]
    DuplicateHandle(String),

    #[error(
        "type inconsistency for {kind} '{handle}': parent type {}, allowed {}",
        parent_label(.parent_kind),
        allowed_label(.allowed)
    )]
    TypeConsistency {
        kind: DescriptorKind,
        handle: String,
        parent_kind: Option<DescriptorKind>,
        allowed: Vec<DescriptorKind>,
    },

    #[error("state of '{handle}' is malformed: {reason}")]
    StateShape { handle: String, reason: String },

    #[error("state batch of category {category} contains {kind} state '{handle}'")]
    CategoryMismatch {
        category: StateCategory,
        kind: DescriptorKind,
        handle: String,
    },

    #[error(transparent)]
    Versioning(#[from] VersioningError),
}

fn parent_label(kind: &Option<DescriptorKind>) -> String {
    match kind {
        Some(kind) => kind.to_string(),
        None => "<none>".to_string(),
    }
}

fn allowed_label(allowed: &[DescriptorKind]) -> String {
    if allowed.is_empty() {
        return "<none>".to_string();
    }
    let labels: Vec<&str> = allowed.iter().map(|kind| kind.label()).collect();
    format!("[{}]", labels.join(", "))
}

/// Chain-level wrapper naming the segment and handle that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("preprocessing segment '{segment}' failed{}: {source}", handle_suffix(.handle))]
pub struct PreprocessingError {
    pub segment: &'static str,
    pub handle: Option<String>,
    #[source]
    pub source: SegmentError,
}

fn handle_suffix(handle: &Option<String>) -> String {
    match handle {
        Some(handle) => format!(" at handle '{handle}'"),
        None => String::new(),
    }
}

/// Segment-side failure carrying the handle under processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFailure {
    pub handle: Option<String>,
    pub error: SegmentError,
}

impl SegmentFailure {
    pub fn at(handle: impl Into<String>, error: impl Into<SegmentError>) -> Self {
        Self {
            handle: Some(handle.into()),
            error: error.into(),
        }
    }

    pub(crate) fn into_preprocessing(self, segment: &'static str) -> PreprocessingError {
        PreprocessingError {
            segment,
            handle: self.handle,
            source: self.error,
        }
    }
}
