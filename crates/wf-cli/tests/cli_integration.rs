// SPDX-License-Identifier: MIT OR Apache-2.0
//! Comprehensive CLI integration tests for the `wf` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn wf() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("wf").expect("binary `wf` should be built")
}

/// Writes a config claiming `adapter_id` as both the adapter's name and its
/// sole step type — `build_registry` registers a mock adapter under its own
/// id with itself as the claimed step type.
fn mock_config(dir: &std::path::Path, adapter_id: &str) -> std::path::PathBuf {
    let path = dir.join("wf.toml");
    std::fs::write(&path, format!("[adapters.{adapter_id}]\ntype = \"mock\"\n")).unwrap();
    path
}

fn noop_workflow(dir: &std::path::Path, step_type: &str) -> std::path::PathBuf {
    let path = dir.join("workflow.json");
    let doc = serde_json::json!({
        "workflow": "demo",
        "steps": [{"id": "s1", "type": step_type}],
    });
    std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    path
}

// ── 1. Help & version ────────────────────────────────────────────────

#[test]
fn help_exits_zero_and_lists_subcommands() {
    wf()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("replay"))
        .stdout(predicate::str::contains("schema"))
        .stdout(predicate::str::contains("inspect"));
}

#[test]
fn version_shows_version_string() {
    wf()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ── 2. Schema subcommand ────────────────────────────────────────────

#[test]
fn schema_workflow_prints_json_schema() {
    let assert = wf().args(["schema", "workflow"]).assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON schema");
    assert!(value.get("properties").is_some() || value.get("$defs").is_some());
}

#[test]
fn schema_config_prints_json_schema() {
    wf().args(["schema", "config"]).assert().success();
}

// ── 3. Run with a mock adapter ──────────────────────────────────────

#[test]
fn run_mock_workflow_succeeds_and_writes_receipts() {
    let tmp = tempfile::tempdir().unwrap();
    let config = mock_config(tmp.path(), "noop");
    let workflow = noop_workflow(tmp.path(), "noop");
    let out_dir = tmp.path().join("receipts");

    wf()
        .args([
            "run",
            workflow.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--out",
            out_dir.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("success"));

    assert!(out_dir.join("s1.json").exists());
}

#[test]
fn run_without_matching_adapter_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let config = mock_config(tmp.path(), "noop");
    let workflow = noop_workflow(tmp.path(), "unregistered-type");

    wf()
        .args([
            "run",
            workflow.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .failure();
}

#[test]
fn run_json_format_emits_parseable_json() {
    let tmp = tempfile::tempdir().unwrap();
    let config = mock_config(tmp.path(), "noop");
    let workflow = noop_workflow(tmp.path(), "noop");

    let output = wf()
        .args([
            "--format",
            "json",
            "run",
            workflow.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .output()
        .expect("execute wf");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("valid JSON");
    assert_eq!(value["status"], "success");
}

// ── 4. Validate subcommand ──────────────────────────────────────────

#[test]
fn validate_accepts_a_well_formed_workflow() {
    let tmp = tempfile::tempdir().unwrap();
    let workflow = noop_workflow(tmp.path(), "noop");
    wf()
        .args(["validate", workflow.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid workflow document"));
}

#[test]
fn validate_rejects_malformed_json() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bad.json");
    std::fs::write(&path, "not json").unwrap();
    wf().args(["validate", path.to_str().unwrap()]).assert().failure();
}

#[test]
fn validate_rejects_structurally_invalid_document() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("wrong.json");
    std::fs::write(&path, r#"{"foo": "bar"}"#).unwrap();
    wf().args(["validate", path.to_str().unwrap()]).assert().failure();
}

// ── 5. Replay and inspect ───────────────────────────────────────────

#[test]
fn replay_confirms_a_successful_run() {
    let tmp = tempfile::tempdir().unwrap();
    let config = mock_config(tmp.path(), "noop");
    let workflow = noop_workflow(tmp.path(), "noop");

    let output = wf()
        .args([
            "--format",
            "json",
            "run",
            workflow.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .output()
        .expect("execute wf run");
    assert!(output.status.success());

    let result_path = tmp.path().join("result.json");
    std::fs::write(&result_path, &output.stdout).unwrap();

    wf()
        .args(["replay", result_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("verified"));
}

#[test]
fn inspect_pretty_prints_a_workflow_document() {
    let tmp = tempfile::tempdir().unwrap();
    let workflow = noop_workflow(tmp.path(), "noop");
    wf()
        .args(["inspect", workflow.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"));
}

// ── 6. Config check ─────────────────────────────────────────────────

#[test]
fn config_check_reports_ok_for_a_valid_file() {
    let tmp = tempfile::tempdir().unwrap();
    let config = mock_config(tmp.path(), "noop");
    wf()
        .args(["config", "check", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn config_check_reports_error_for_malformed_toml() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("bad.toml");
    std::fs::write(&path, "not valid [[[ toml").unwrap();
    wf()
        .args(["config", "check", path.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("error:"));
}

// ── 7. Error handling / exit codes ──────────────────────────────────

#[test]
fn unknown_subcommand_fails_with_helpful_error() {
    wf()
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn no_subcommand_shows_usage_hint() {
    wf().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn debug_flag_is_accepted() {
    let tmp = tempfile::tempdir().unwrap();
    let workflow = noop_workflow(tmp.path(), "noop");
    wf()
        .args(["--debug", "validate", workflow.to_str().unwrap()])
        .assert()
        .success();
}
