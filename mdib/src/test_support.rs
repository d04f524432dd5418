//! Test-only builders for descriptors, states and a populated storage.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::entity::{ContextAssociation, Descriptor, State};
use crate::core::kind::DescriptorKind;
use crate::core::modification::DescriptionBatch;
use crate::core::version::MdibVersion;
use crate::io::script::ReplayScript;
use crate::storage::MdibStorage;

/// Sequence id used by every helper in this module.
pub const SEQUENCE_ID: &str = "urn:uuid:test-sequence";

pub fn initial_version() -> MdibVersion {
    MdibVersion::new(SEQUENCE_ID, 0, 0)
}

/// Descriptor with null content and version 0.
pub fn descriptor(handle: &str, kind: DescriptorKind) -> Descriptor {
    Descriptor::new(handle, kind)
}

pub fn single_state(descriptor: &Descriptor) -> State {
    State::single(descriptor)
}

pub fn context_state(
    descriptor: &Descriptor,
    handle: &str,
    association: Option<ContextAssociation>,
) -> State {
    State::context(descriptor, handle, association)
}

/// Description batch that builds the standard tree:
///
/// ```text
/// mds0
/// ├── vmd0
/// │   └── ch0
/// │       └── m0            (numeric metric)
/// └── sc0                   (system context)
///     ├── loc               loc.0 associated
///     └── ops               op.0, op.1 associated, op.2 disassociated
/// ```
pub fn standard_batch() -> DescriptionBatch {
    let mds = descriptor("mds0", DescriptorKind::Mds);
    let vmd = descriptor("vmd0", DescriptorKind::Vmd);
    let ch = descriptor("ch0", DescriptorKind::Channel);
    let metric = descriptor("m0", DescriptorKind::NumericMetric);
    let sc = descriptor("sc0", DescriptorKind::SystemContext);
    let loc = descriptor("loc", DescriptorKind::LocationContext);
    let ops = descriptor("ops", DescriptorKind::OperatorContext);
    let associated = Some(ContextAssociation::Associated);

    DescriptionBatch::new()
        .insert(mds.clone(), vec![single_state(&mds)], None)
        .insert(vmd.clone(), vec![single_state(&vmd)], Some("mds0"))
        .insert(ch.clone(), vec![single_state(&ch)], Some("vmd0"))
        .insert(metric.clone(), vec![single_state(&metric)], Some("ch0"))
        .insert(sc.clone(), vec![single_state(&sc)], Some("mds0"))
        .insert(
            loc.clone(),
            vec![context_state(&loc, "loc.0", associated)],
            Some("sc0"),
        )
        .insert(
            ops.clone(),
            vec![
                context_state(&ops, "op.0", associated),
                context_state(&ops, "op.1", associated),
                context_state(&ops, "op.2", Some(ContextAssociation::Disassociated)),
            ],
            Some("sc0"),
        )
}

/// Storage holding the standard tree, committed as one batch at MDIB version 1.
///
/// Every descriptor and state starts at version 0.
pub fn standard_storage() -> MdibStorage {
    let mut storage = MdibStorage::new(initial_version());
    storage
        .apply_description(initial_version().increment(), standard_batch())
        .expect("standard tree is consistent");
    storage
}

/// Replay script written to a temporary directory.
pub struct TestScript {
    _dir: TempDir,
    path: PathBuf,
}

impl TestScript {
    pub fn write(script: &ReplayScript) -> Self {
        let contents = serde_json::to_string_pretty(script).expect("serialize script");
        Self::raw(&contents)
    }

    /// Write arbitrary text, e.g. to exercise parse failures.
    pub fn raw(contents: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script.json");
        fs::write(&path, contents).expect("write script");
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
