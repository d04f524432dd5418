//! Replays a script into a fresh store, batch by batch.
//!
//! Replay stops at the first rejected batch; everything before it stays
//! committed, matching what a live producer would have observed.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::access::LocalMdibAccess;
use crate::core::error::PreprocessingError;
use crate::io::config::MdibConfig;
use crate::io::script::{ReplayScript, ScriptBatch, load_script};
use crate::storage::report::{DescriptionReport, StateReport};

/// Report of one committed batch, tagged like the script entry it came from.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "batch", rename_all = "snake_case")]
pub enum BatchReport {
    Description(DescriptionReport),
    States(StateReport),
}

#[derive(Debug, Clone)]
pub struct Rejection {
    /// Zero-based position of the rejected batch in the script.
    pub index: usize,
    pub label: &'static str,
    pub error: PreprocessingError,
}

#[derive(Debug, Default)]
pub struct ReplayOutcome {
    pub reports: Vec<BatchReport>,
    pub rejection: Option<Rejection>,
}

impl ReplayOutcome {
    pub fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

pub fn replay(access: &LocalMdibAccess, script: ReplayScript) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    for (index, batch) in script.batches.into_iter().enumerate() {
        let label = batch.label();
        debug!(index, label, "replaying batch");
        let result = match batch {
            ScriptBatch::Description(batch) => {
                access.apply_description(batch).map(BatchReport::Description)
            }
            ScriptBatch::States(batch) => access.apply_states(batch).map(BatchReport::States),
        };
        match result {
            Ok(report) => outcome.reports.push(report),
            Err(error) => {
                warn!(index, label, %error, "batch rejected; stopping replay");
                outcome.rejection = Some(Rejection { index, label, error });
                break;
            }
        }
    }
    outcome
}

/// Load `script_path` and replay it into a store built from `config`.
pub fn replay_file(
    script_path: &Path,
    config: &MdibConfig,
) -> Result<(LocalMdibAccess, ReplayOutcome)> {
    let script = load_script(script_path)?;
    let access = LocalMdibAccess::new(config);
    let outcome = replay(&access, script);
    Ok((access, outcome))
}
