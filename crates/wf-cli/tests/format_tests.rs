// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output-format coverage for `wf_cli::format::Formatter` across every
//! [`OutputFormat`] variant and wire type it renders.

use chrono::Utc;
use serde_json::Map;
use wf_cli::format::{Formatter, OutputFormat};
use wf_core::{
    ExecutionMetadata, Receipt, ReceiptError, ReceiptStatus, RunExecutionMetadata, RunResult,
    RunStatus, Step, StepSummary, Workflow,
};
use wf_runtime::{replay, StepVerification};

fn sample_receipt(status: ReceiptStatus) -> Receipt {
    let mut output = Map::new();
    output.insert("value".to_string(), serde_json::json!(42));
    Receipt {
        step_id: "s1".to_string(),
        status,
        output: if status == ReceiptStatus::Error { None } else { Some(output) },
        error: if status == ReceiptStatus::Error {
            Some(ReceiptError {
                code: "adapter_error".to_string(),
                message: "boom".to_string(),
                retryable: false,
            })
        } else {
            None
        },
        execution_metadata: ExecutionMetadata::new(Utc::now(), 15),
        merkle_proof: None,
    }
}

fn sample_run_result(status: RunStatus) -> RunResult {
    let now = Utc::now();
    RunResult {
        workflow_id: "demo-run".to_string(),
        status,
        steps: vec![StepSummary {
            step_id: "s1".to_string(),
            status: ReceiptStatus::Success,
            latency_ms: 15,
        }],
        receipts: vec![sample_receipt(ReceiptStatus::Success).with_leaf_hash().unwrap()],
        merkle_root: Some("abc123".to_string()),
        execution_metadata: RunExecutionMetadata {
            start_time: now,
            end_time: now,
            duration_ms: 15,
        },
        failed_step: None,
        error: None,
    }
}

fn sample_workflow() -> Workflow {
    Workflow::new("demo", vec![Step::new("s1", "noop")])
}

// ── RunResult ────────────────────────────────────────────────────────

#[test]
fn run_result_json_is_parseable() {
    let formatter = Formatter::new(OutputFormat::Json);
    let rendered = formatter.format_run_result(&sample_run_result(RunStatus::Success));
    let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
    assert_eq!(value["status"], "success");
    assert!(!rendered.contains('\n'));
}

#[test]
fn run_result_json_pretty_is_multiline_and_parseable() {
    let formatter = Formatter::new(OutputFormat::JsonPretty);
    let rendered = formatter.format_run_result(&sample_run_result(RunStatus::Success));
    assert!(rendered.contains('\n'));
    let _value: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
}

#[test]
fn run_result_text_mentions_status_and_duration() {
    let formatter = Formatter::new(OutputFormat::Text);
    let rendered = formatter.format_run_result(&sample_run_result(RunStatus::Success));
    assert!(rendered.contains("success"));
    assert!(rendered.contains("15ms"));
}

#[test]
fn run_result_table_lists_step_ids() {
    let formatter = Formatter::new(OutputFormat::Table);
    let rendered = formatter.format_run_result(&sample_run_result(RunStatus::Failed));
    assert!(rendered.contains("failed"));
    assert!(rendered.contains("s1"));
}

#[test]
fn run_result_compact_is_a_single_line() {
    let formatter = Formatter::new(OutputFormat::Compact);
    let rendered = formatter.format_run_result(&sample_run_result(RunStatus::Success));
    assert_eq!(rendered.lines().count(), 1);
}

// ── Receipt ──────────────────────────────────────────────────────────

#[test]
fn receipt_json_roundtrips() {
    let formatter = Formatter::new(OutputFormat::Json);
    let receipt = sample_receipt(ReceiptStatus::Success);
    let rendered = formatter.format_receipt(&receipt);
    let parsed: Receipt = serde_json::from_str(&rendered).expect("valid receipt JSON");
    assert_eq!(parsed.step_id, receipt.step_id);
}

#[test]
fn error_receipt_table_includes_error_message() {
    let formatter = Formatter::new(OutputFormat::Table);
    let rendered = formatter.format_receipt(&sample_receipt(ReceiptStatus::Error));
    assert!(rendered.contains("boom"));
}

#[test]
fn receipt_table_renders_status() {
    let formatter = Formatter::new(OutputFormat::Table);
    let rendered = formatter.format_receipt(&sample_receipt(ReceiptStatus::Degraded));
    assert!(rendered.contains("degraded"));
}

#[test]
fn receipt_compact_is_terse() {
    let formatter = Formatter::new(OutputFormat::Compact);
    let rendered = formatter.format_receipt(&sample_receipt(ReceiptStatus::Success));
    assert_eq!(rendered.lines().count(), 1);
}

// ── Workflow ─────────────────────────────────────────────────────────

#[test]
fn workflow_json_pretty_contains_step_ids() {
    let formatter = Formatter::new(OutputFormat::JsonPretty);
    let rendered = formatter.format_workflow(&sample_workflow());
    assert!(rendered.contains("s1"));
    assert!(rendered.contains("demo"));
}

#[test]
fn workflow_text_mentions_name_and_step_count() {
    let formatter = Formatter::new(OutputFormat::Text);
    let rendered = formatter.format_workflow(&sample_workflow());
    assert!(rendered.contains("demo"));
    assert!(rendered.contains("Steps: 1"));
}

#[test]
fn workflow_table_lists_step_ids_and_types() {
    let formatter = Formatter::new(OutputFormat::Table);
    let rendered = formatter.format_workflow(&sample_workflow());
    assert!(rendered.contains("s1"));
    assert!(rendered.contains("noop"));
}

#[test]
fn workflow_compact_is_a_single_line() {
    let formatter = Formatter::new(OutputFormat::Compact);
    let rendered = formatter.format_workflow(&sample_workflow());
    assert_eq!(rendered.lines().count(), 1);
}

// ── ReplayReport ─────────────────────────────────────────────────────

#[test]
fn replay_report_json_is_parseable() {
    let receipts = vec![sample_receipt(ReceiptStatus::Success).with_leaf_hash().unwrap()];
    let report = replay(&receipts);
    let formatter = Formatter::new(OutputFormat::Json);
    let rendered = formatter.format_replay_report(&report);
    let _value: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
}

#[test]
fn replay_report_table_shows_verification_outcome() {
    let verification = StepVerification { step_id: "s1".to_string(), verified: true };
    let report = wf_runtime::ReplayReport { steps: vec![verification], merkle_root: Some("abc".into()) };
    let formatter = Formatter::new(OutputFormat::Table);
    let rendered = formatter.format_replay_report(&report);
    assert!(rendered.contains("s1"));
}

#[test]
fn replay_report_compact_is_a_single_line() {
    let receipts = vec![sample_receipt(ReceiptStatus::Success).with_leaf_hash().unwrap()];
    let report = replay(&receipts);
    let formatter = Formatter::new(OutputFormat::Compact);
    let rendered = formatter.format_replay_report(&report);
    assert_eq!(rendered.lines().count(), 1);
}

// ── Errors ───────────────────────────────────────────────────────────

#[test]
fn format_error_json_wraps_message() {
    let formatter = Formatter::new(OutputFormat::Json);
    let rendered = formatter.format_error("something went wrong");
    let value: serde_json::Value = serde_json::from_str(&rendered).expect("valid JSON");
    assert_eq!(value["error"], "something went wrong");
}

#[test]
fn format_error_text_is_prefixed() {
    let formatter = Formatter::new(OutputFormat::Text);
    let rendered = formatter.format_error("bad input");
    assert!(rendered.starts_with("Error:"));
}

// ── OutputFormat parsing ─────────────────────────────────────────────

#[test]
fn output_format_parses_all_known_spellings() {
    assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    assert_eq!("json-pretty".parse::<OutputFormat>().unwrap(), OutputFormat::JsonPretty);
    assert_eq!("json_pretty".parse::<OutputFormat>().unwrap(), OutputFormat::JsonPretty);
    assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
    assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
    assert_eq!("compact".parse::<OutputFormat>().unwrap(), OutputFormat::Compact);
}

#[test]
fn output_format_rejects_unknown_spelling() {
    assert!("xml".parse::<OutputFormat>().is_err());
}
