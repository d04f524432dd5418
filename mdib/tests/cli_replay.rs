//! CLI tests for `mdib validate` and `mdib replay`.
//!
//! Spawns the binary and checks exit codes and stdout for accepted,
//! rejected and unreadable scripts.

use std::process::{Command, Output};

use mdib::core::kind::{DescriptorKind, StateCategory};
use mdib::core::modification::{DescriptionBatch, StateBatch};
use mdib::exit_codes;
use mdib::io::config::{MdibConfig, write_config};
use mdib::io::script::ReplayScript;
use mdib::test_support::{TestScript, descriptor, single_state, standard_batch};
use serde_json::Value;

fn mdib(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mdib"))
        .args(args)
        .output()
        .expect("spawn mdib")
}

fn accepted_script() -> ReplayScript {
    let metric = descriptor("m0", DescriptorKind::NumericMetric);
    let mut script = ReplayScript::default();
    script
        .push_description(standard_batch())
        .push_states(StateBatch::new(StateCategory::Metric).with(single_state(&metric)));
    script
}

#[test]
fn validate_accepted_script_exits_ok() {
    let script = TestScript::write(&accepted_script());
    let output = mdib(&["validate", script.path().to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("ok: 2 batches applied, 7 entities"), "{stdout}");
}

#[test]
fn validate_rejected_batch_exits_with_rejected_code() {
    let mut script = accepted_script();
    let duplicate = descriptor("vmd0", DescriptorKind::Vmd);
    script.push_description(DescriptionBatch::new().insert(
        duplicate.clone(),
        vec![single_state(&duplicate)],
        Some("mds0"),
    ));
    let script = TestScript::write(&script);
    let output = mdib(&["validate", script.path().to_str().expect("utf-8 path")]);

    assert_eq!(output.status.code(), Some(exit_codes::REJECTED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rejected: batch 2 (description)"), "{stderr}");
    assert!(stderr.contains("duplicate_handle"), "{stderr}");
}

#[test]
fn unparsable_script_exits_invalid() {
    let script = TestScript::raw("{ \"batches\": [ { \"description\": ");
    let output = mdib(&["validate", script.path().to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));

    let output = mdib(&["replay", "/nonexistent/mdib-script.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn replay_prints_one_json_report_per_batch_and_dump() {
    let script = TestScript::write(&accepted_script());
    let temp = tempfile::tempdir().expect("tempdir");
    let config_path = temp.path().join("mdib.toml");
    let config = MdibConfig {
        sequence_id: "urn:uuid:replay-test".to_string(),
        instance_id: 4,
        initial_mdib_version: 10,
    };
    write_config(&config_path, &config).expect("write config");

    let output = mdib(&[
        "replay",
        script.path().to_str().expect("utf-8 path"),
        "--dump",
        "--config",
        config_path.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    let first: Value = serde_json::from_str(lines.next().expect("first report")).expect("json");
    assert_eq!(first["batch"], "description");
    assert_eq!(first["mdib_version"]["sequence_id"], "urn:uuid:replay-test");
    assert_eq!(first["mdib_version"]["instance_id"], 4);
    assert_eq!(first["mdib_version"]["version"], 11);

    let second: Value = serde_json::from_str(lines.next().expect("second report")).expect("json");
    assert_eq!(second["batch"], "states");
    assert_eq!(second["states"][0]["state_version"], 1);

    let dump: Value = serde_json::from_str(&lines.collect::<Vec<_>>().join("\n")).expect("dump");
    let handles: Vec<&str> = dump
        .as_array()
        .expect("entity list")
        .iter()
        .filter_map(|entity| entity["descriptor"]["handle"].as_str())
        .collect();
    assert_eq!(handles, vec!["mds0", "vmd0", "ch0", "m0", "sc0", "loc", "ops"]);
}
