//! Replay scripts: ordered description and state batches stored as JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::core::modification::{DescriptionBatch, StateBatch};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    pub batches: Vec<ScriptBatch>,
}

/// One batch of a script, tagged by the key it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptBatch {
    Description(DescriptionBatch),
    States(StateBatch),
}

impl ScriptBatch {
    pub fn label(&self) -> &'static str {
        match self {
            ScriptBatch::Description(_) => "description",
            ScriptBatch::States(_) => "states",
        }
    }
}

impl ReplayScript {
    pub fn push_description(&mut self, batch: DescriptionBatch) -> &mut Self {
        self.batches.push(ScriptBatch::Description(batch));
        self
    }

    pub fn push_states(&mut self, batch: StateBatch) -> &mut Self {
        self.batches.push(ScriptBatch::States(batch));
        self
    }
}

pub fn load_script(path: &Path) -> Result<ReplayScript> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_script(&contents).with_context(|| format!("parse {}", path.display()))
}

pub fn parse_script(contents: &str) -> Result<ReplayScript> {
    let script: ReplayScript = serde_json::from_str(contents).context("parse script json")?;
    if let Some(index) = script.batches.iter().position(|batch| match batch {
        ScriptBatch::Description(batch) => batch.is_empty(),
        ScriptBatch::States(batch) => batch.is_empty(),
    }) {
        bail!("batch {index} is empty");
    }
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kind::{DescriptorKind, StateCategory};

    #[test]
    fn parses_tagged_batches() {
        let script = parse_script(
            r#"{
                "batches": [
                    { "description": [
                        { "type": "insert",
                          "descriptor": { "handle": "mds0", "kind": "mds" },
                          "states": [ { "descriptor_handle": "mds0", "kind": "mds" } ] }
                    ] },
                    { "states": { "category": "component", "states": [
                        { "descriptor_handle": "mds0", "kind": "mds",
                          "content": { "activation": "on" } }
                    ] } }
                ]
            }"#,
        )
        .expect("parse");

        assert_eq!(script.batches.len(), 2);
        let ScriptBatch::Description(description) = &script.batches[0] else {
            panic!("expected description batch");
        };
        let insert = description.get(0).expect("insert");
        assert!(insert.is_insert());
        assert_eq!(insert.descriptor.kind, DescriptorKind::Mds);
        assert!(insert.parent.is_none());

        let ScriptBatch::States(states) = &script.batches[1] else {
            panic!("expected state batch");
        };
        assert_eq!(states.category, StateCategory::Component);
        assert_eq!(states.states[0].content["activation"], "on");
    }

    #[test]
    fn rejects_empty_batches_and_unknown_tags() {
        let err = parse_script(r#"{ "batches": [ { "description": [] } ] }"#).expect_err("empty");
        assert!(err.to_string().contains("batch 0 is empty"));

        assert!(parse_script(r#"{ "batches": [ { "metrics": [] } ] }"#).is_err());
    }
}
