//! Version numbers carried by descriptors, states and the MDIB as a whole.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Descriptor and state version assigned to one handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionPair {
    pub descriptor_version: u64,
    pub state_version: u64,
}

impl VersionPair {
    pub const fn new(descriptor_version: u64, state_version: u64) -> Self {
        Self {
            descriptor_version,
            state_version,
        }
    }
}

/// Next version after an optional previous one.
///
/// A handle without history starts at 0.
pub fn next_version(previous: Option<u64>) -> u64 {
    previous.map_or(0, |version| version + 1)
}

/// Identity and sequence number of one committed MDIB revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdibVersion {
    pub sequence_id: String,
    pub instance_id: u64,
    pub version: u64,
}

impl MdibVersion {
    pub fn new(sequence_id: impl Into<String>, instance_id: u64, version: u64) -> Self {
        Self {
            sequence_id: sequence_id.into(),
            instance_id,
            version,
        }
    }

    /// The revision that follows this one within the same sequence.
    pub fn increment(&self) -> Self {
        Self {
            sequence_id: self.sequence_id.clone(),
            instance_id: self.instance_id,
            version: self.version + 1,
        }
    }
}

impl fmt::Display for MdibVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}/{}",
            self.sequence_id, self.instance_id, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_version_starts_at_zero() {
        assert_eq!(next_version(None), 0);
        assert_eq!(next_version(Some(0)), 1);
        assert_eq!(next_version(Some(41)), 42);
    }

    #[test]
    fn increment_keeps_sequence_identity() {
        let version = MdibVersion::new("urn:test", 3, 7);
        let next = version.increment();
        assert_eq!(next.sequence_id, "urn:test");
        assert_eq!(next.instance_id, 3);
        assert_eq!(next.version, 8);
        assert_eq!(next.to_string(), "urn:test#3/8");
    }
}
