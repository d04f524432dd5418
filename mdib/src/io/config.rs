//! MDIB identity configuration, stored as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::version::MdibVersion;

/// Identity of the MDIB a store serves.
///
/// Missing fields fall back to the defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MdibConfig {
    /// Sequence id stamped on every MDIB version (a URI).
    pub sequence_id: String,

    pub instance_id: u64,

    /// MDIB version of the empty store; the first commit gets this plus one.
    pub initial_mdib_version: u64,
}

impl Default for MdibConfig {
    fn default() -> Self {
        Self {
            sequence_id: "urn:uuid:00000000-0000-0000-0000-000000000000".to_string(),
            instance_id: 0,
            initial_mdib_version: 0,
        }
    }
}

impl MdibConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sequence_id.trim().is_empty() {
            return Err(anyhow!("sequence_id must be non-empty"));
        }
        if self.sequence_id.chars().any(char::is_whitespace) {
            return Err(anyhow!("sequence_id must not contain whitespace"));
        }
        if !self.sequence_id.contains(':') {
            return Err(anyhow!("sequence_id must be a URI, got {:?}", self.sequence_id));
        }
        Ok(())
    }

    pub fn initial_version(&self) -> MdibVersion {
        MdibVersion::new(
            self.sequence_id.clone(),
            self.instance_id,
            self.initial_mdib_version,
        )
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `MdibConfig::default()`.
pub fn load_config(path: &Path) -> Result<MdibConfig> {
    if !path.exists() {
        let cfg = MdibConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MdibConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &MdibConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, MdibConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("mdib.toml");
        let cfg = MdibConfig {
            sequence_id: "urn:uuid:5f1c0a4e-9d0b-4c1e-8f7a-3b2d1c0e9f8a".to_string(),
            instance_id: 7,
            initial_mdib_version: 41,
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.initial_version().increment().version, 42);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("mdib.toml");
        fs::write(&path, "instance_id = 3\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.instance_id, 3);
        assert_eq!(cfg.sequence_id, MdibConfig::default().sequence_id);
    }

    #[test]
    fn rejects_sequence_id_that_is_not_a_uri() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("mdib.toml");
        fs::write(&path, "sequence_id = \"plain\"\n").expect("write");
        let err = load_config(&path).expect_err("invalid");
        assert!(format!("{err:#}").contains("sequence_id must be a URI"));
    }
}
