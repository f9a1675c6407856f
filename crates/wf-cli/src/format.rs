// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting utilities for the workflow engine CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use wf_core::{Receipt, ReceiptStatus, RunResult, RunStatus, Workflow};
use wf_runtime::ReplayReport;

/// Supported output formats for CLI display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Compact JSON (single line).
    Json,
    /// Pretty-printed JSON.
    JsonPretty,
    /// Human-readable multi-line text.
    Text,
    /// Key-value aligned table.
    Table,
    /// Single-line summary.
    Compact,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
            Self::Text => "text",
            Self::Table => "table",
            Self::Compact => "compact",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "json-pretty" | "json_pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "text" => Ok(Self::Text),
            "table" => Ok(Self::Table),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Formats workflow-engine wire types for CLI output.
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Create a new formatter with the given output format.
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format a [`RunResult`] according to the configured output format.
    #[must_use]
    pub fn format_run_result(&self, result: &RunResult) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => format_run_result_text(result),
            OutputFormat::Table => format_run_result_table(result),
            OutputFormat::Compact => format_run_result_compact(result),
        }
    }

    /// Format a [`Receipt`] according to the configured output format.
    #[must_use]
    pub fn format_receipt(&self, receipt: &Receipt) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(receipt).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(receipt).unwrap_or_default(),
            OutputFormat::Text => format_receipt_text(receipt),
            OutputFormat::Table => format_receipt_table(receipt),
            OutputFormat::Compact => format_receipt_compact(receipt),
        }
    }

    /// Format a [`Workflow`] according to the configured output format.
    #[must_use]
    pub fn format_workflow(&self, wf: &Workflow) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(wf).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(wf).unwrap_or_default(),
            OutputFormat::Text => format_workflow_text(wf),
            OutputFormat::Table => format_workflow_table(wf),
            OutputFormat::Compact => format_workflow_compact(wf),
        }
    }

    /// Format a [`ReplayReport`] according to the configured output format.
    #[must_use]
    pub fn format_replay_report(&self, report: &ReplayReport) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(report).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text | OutputFormat::Table => format_replay_report_table(report),
            OutputFormat::Compact => format_replay_report_compact(report),
        }
    }

    /// Format an error message according to the configured output format.
    #[must_use]
    pub fn format_error(&self, err: &str) -> String {
        match &self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                serde_json::json!({"error": err}).to_string()
            }
            OutputFormat::Text => format!("Error: {err}"),
            OutputFormat::Table => format!("error  {err}"),
            OutputFormat::Compact => format!("[error] {err}"),
        }
    }
}

// ── Text helpers ──────────────────────────────────────────────────────

fn run_status_str(s: RunStatus) -> &'static str {
    match s {
        RunStatus::Success => "success",
        RunStatus::Failed => "failed",
    }
}

fn receipt_status_str(s: ReceiptStatus) -> &'static str {
    match s {
        ReceiptStatus::Success => "success",
        ReceiptStatus::Error => "error",
        ReceiptStatus::Degraded => "degraded",
    }
}

fn truncate(s: &str, max: usize) -> String {
    let truncated: String = s.chars().take(max).collect();
    if truncated.chars().count() == s.chars().count() {
        truncated
    } else {
        format!("{truncated}…")
    }
}

// ── RunResult formatters ──────────────────────────────────────────────

fn format_run_result_text(r: &RunResult) -> String {
    let mut out = format!(
        "Workflow: {}\nStatus: {}\nSteps: {}\nMerkle root: {}\nDuration: {}ms",
        r.workflow_id,
        run_status_str(r.status),
        r.steps.len(),
        r.merkle_root.as_deref().unwrap_or("<none>"),
        r.execution_metadata.duration_ms,
    );
    if let Some(ref step) = r.failed_step {
        out.push_str(&format!("\nFailed step: {step}"));
    }
    if let Some(ref err) = r.error {
        out.push_str(&format!("\nError: {} ({})", err.message, err.code));
    }
    out
}

fn format_run_result_table(r: &RunResult) -> String {
    let mut lines = Vec::new();
    lines.push(format!("{:<12} {}", "workflow", r.workflow_id));
    lines.push(format!("{:<12} {}", "status", run_status_str(r.status)));
    lines.push(format!("{:<12} {}", "steps", r.steps.len()));
    lines.push(format!(
        "{:<12} {}",
        "root",
        r.merkle_root.as_deref().unwrap_or("<none>")
    ));
    lines.push(format!("{:<12} {}ms", "duration", r.execution_metadata.duration_ms));
    for step in &r.steps {
        lines.push(format!(
            "  {:<20} {:<10} {}ms",
            step.step_id,
            receipt_status_str(step.status),
            step.latency_ms
        ));
    }
    lines.join("\n")
}

fn format_run_result_compact(r: &RunResult) -> String {
    format!(
        "[{}] {} steps={} root={}",
        run_status_str(r.status),
        r.workflow_id,
        r.steps.len(),
        r.merkle_root.as_deref().unwrap_or("<none>"),
    )
}

// ── Receipt formatters ────────────────────────────────────────────────

fn format_receipt_text(r: &Receipt) -> String {
    format!(
        "Step: {}\nStatus: {}\nLatency: {}ms\nMerkle proof: {}",
        r.step_id,
        receipt_status_str(r.status),
        r.execution_metadata.latency_ms,
        r.merkle_proof.as_deref().unwrap_or("<none>"),
    )
}

fn format_receipt_table(r: &Receipt) -> String {
    let mut lines = Vec::new();
    lines.push(format!("{:<12} {}", "step_id", r.step_id));
    lines.push(format!("{:<12} {}", "status", receipt_status_str(r.status)));
    lines.push(format!("{:<12} {}ms", "latency", r.execution_metadata.latency_ms));
    if let Some(ref hash) = r.merkle_proof {
        lines.push(format!("{:<12} {hash}", "leaf_hash"));
    }
    if let Some(ref err) = r.error {
        lines.push(format!("{:<12} {} ({})", "error", err.message, err.code));
    }
    lines.join("\n")
}

fn format_receipt_compact(r: &Receipt) -> String {
    format!(
        "[{}] step={} latency={}ms",
        receipt_status_str(r.status),
        r.step_id,
        r.execution_metadata.latency_ms,
    )
}

// ── Workflow formatters ───────────────────────────────────────────────

fn format_workflow_text(wf: &Workflow) -> String {
    format!(
        "Workflow: {}\nVersion: {}\nSteps: {}",
        wf.workflow,
        wf.version.as_deref().unwrap_or("<none>"),
        wf.steps.len(),
    )
}

fn format_workflow_table(wf: &Workflow) -> String {
    let mut lines = Vec::new();
    lines.push(format!("{:<12} {}", "workflow", wf.workflow));
    lines.push(format!("{:<12} {}", "version", wf.version.as_deref().unwrap_or("<none>")));
    lines.push(format!("{:<12} {}", "steps", wf.steps.len()));
    for step in &wf.steps {
        lines.push(format!("  {:<20} {}", step.id, truncate(&step.step_type, 30)));
    }
    lines.join("\n")
}

fn format_workflow_compact(wf: &Workflow) -> String {
    format!("[{}] steps={}", wf.workflow, wf.steps.len())
}

// ── ReplayReport formatters ───────────────────────────────────────────

fn format_replay_report_table(report: &ReplayReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{:<12} {}",
        "root",
        report.merkle_root.as_deref().unwrap_or("<none>")
    ));
    for step in &report.steps {
        lines.push(format!(
            "  {:<20} {}",
            step.step_id,
            if step.verified { "verified" } else { "UNVERIFIED" }
        ));
    }
    lines.join("\n")
}

fn format_replay_report_compact(report: &ReplayReport) -> String {
    let verified = report.steps.iter().filter(|s| s.verified).count();
    format!(
        "[replay] {}/{} verified root={}",
        verified,
        report.steps.len(),
        report.merkle_root.as_deref().unwrap_or("<none>"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_display_roundtrips() {
        for fmt in &[
            OutputFormat::Json,
            OutputFormat::JsonPretty,
            OutputFormat::Text,
            OutputFormat::Table,
            OutputFormat::Compact,
        ] {
            let s = fmt.to_string();
            let parsed: OutputFormat = s.parse().unwrap();
            assert_eq!(&parsed, fmt);
        }
    }

    #[test]
    fn output_format_from_str_rejects_unknown() {
        assert!("nope".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_long_string() {
        let long = "a".repeat(100);
        let t = truncate(&long, 10);
        assert!(t.len() < 100);
        assert!(t.ends_with('…'));
    }

    #[test]
    fn truncate_does_not_split_a_multibyte_codepoint() {
        // Byte offset 30 lands inside the second `中` (a 3-byte codepoint
        // starting at byte 28), which would panic a byte-index slice.
        let s = format!("{}{}", "a".repeat(28), "中".repeat(5));
        let t = truncate(&s, 30);
        assert_eq!(t.chars().count(), 31);
        assert!(t.ends_with('…'));
    }

    fn sample_receipt() -> Receipt {
        use wf_core::ExecutionMetadata;
        Receipt {
            step_id: "s1".into(),
            status: ReceiptStatus::Success,
            output: None,
            error: None,
            execution_metadata: ExecutionMetadata::new(chrono::Utc::now(), 7),
            merkle_proof: Some("abc123".into()),
        }
    }

    #[test]
    fn format_receipt_compact_includes_status_and_step() {
        let f = Formatter::new(OutputFormat::Compact);
        let s = f.format_receipt(&sample_receipt());
        assert!(s.contains("success"));
        assert!(s.contains("s1"));
    }

    #[test]
    fn format_receipt_table_includes_leaf_hash() {
        let f = Formatter::new(OutputFormat::Table);
        let s = f.format_receipt(&sample_receipt());
        assert!(s.contains("abc123"));
    }

    #[test]
    fn format_error_json_wraps_message() {
        let f = Formatter::new(OutputFormat::Json);
        let s = f.format_error("boom");
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["error"], "boom");
    }
}
