// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the workflow engine CLI.
//!
//! These functions are library-level so they can be tested without
//! spawning the binary.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use schemars::schema_for;
use wf_adapter::{AdapterRegistry, MockAdapter, ProcessAdapter};
use wf_config::{AdapterSource, EngineConfig};
use wf_core::{Receipt, RunResult, Workflow};
use wf_runtime::{Engine, ReplayReport};
use wf_schema::{validate_receipt_doc, validate_workflow_doc};

/// Schema types that can be printed by the `schema` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// JSON schema for [`Workflow`].
    Workflow,
    /// JSON schema for [`Receipt`].
    Receipt,
    /// JSON schema for [`RunResult`].
    RunResult,
    /// JSON schema for [`EngineConfig`].
    Config,
}

/// Return the JSON schema string for the given kind.
pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let value = match kind {
        SchemaKind::Workflow => serde_json::to_value(schema_for!(Workflow))?,
        SchemaKind::Receipt => serde_json::to_value(schema_for!(Receipt))?,
        SchemaKind::RunResult => serde_json::to_value(schema_for!(RunResult))?,
        SchemaKind::Config => serde_json::to_value(schema_for!(EngineConfig))?,
    };
    serde_json::to_string_pretty(&value).context("serialize schema")
}

/// The detected type of a validated JSON file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatedType {
    /// The file is a structurally valid [`Workflow`] document.
    Workflow,
    /// The file is a structurally valid [`Receipt`] document.
    Receipt,
}

/// Validate a JSON file, auto-detecting whether it is a workflow or a
/// receipt document.
///
/// Returns the detected type on success.
pub fn validate_file(path: &Path) -> Result<ValidatedType> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read file '{}'", path.display()))?;

    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parse JSON from '{}'", path.display()))?;

    if validate_workflow_doc(&value).is_ok() {
        return Ok(ValidatedType::Workflow);
    }
    if validate_receipt_doc(&value).is_ok() {
        return Ok(ValidatedType::Receipt);
    }

    anyhow::bail!(
        "file '{}' is not a valid workflow or receipt document",
        path.display()
    )
}

/// Validate a JSON file against the workflow schema.
///
/// Returns `Ok(())` if the file is valid, or an error describing the first
/// validation failure found.
pub fn validate_workflow_file(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read workflow file '{}'", path.display()))?;

    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parse JSON from '{}'", path.display()))?;

    validate_workflow_doc(&value)
        .map_err(|e| anyhow::anyhow!("{}: {}", e.path.as_deref().unwrap_or("<root>"), e.message))
        .with_context(|| format!("validate workflow from '{}'", path.display()))
}

/// Load a workflow document from a JSON file.
pub fn load_workflow_file(path: &Path) -> Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read workflow file '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse workflow from '{}'", path.display()))
}

/// A document recognized by the `inspect` subcommand.
#[derive(Debug, Clone)]
pub enum InspectedDocument {
    /// A completed engine run result.
    RunResult(RunResult),
    /// A workflow document.
    Workflow(Workflow),
    /// A single step receipt.
    Receipt(Receipt),
}

/// Load a JSON file and parse it as a run result, workflow, or receipt,
/// trying each shape in turn and returning whichever one fits.
///
/// Run results are tried first since they are the most specific shape —
/// a bare workflow or receipt document can never satisfy a `RunResult`'s
/// required fields.
pub fn inspect_file(path: &Path) -> Result<InspectedDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read file '{}'", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("parse JSON from '{}'", path.display()))?;

    if let Ok(result) = serde_json::from_value::<RunResult>(value.clone()) {
        return Ok(InspectedDocument::RunResult(result));
    }
    if validate_workflow_doc(&value).is_ok() {
        let workflow: Workflow = serde_json::from_value(value)
            .with_context(|| format!("parse workflow from '{}'", path.display()))?;
        return Ok(InspectedDocument::Workflow(workflow));
    }
    if validate_receipt_doc(&value).is_ok() {
        let receipt: Receipt = serde_json::from_value(value)
            .with_context(|| format!("parse receipt from '{}'", path.display()))?;
        return Ok(InspectedDocument::Receipt(receipt));
    }

    anyhow::bail!(
        "file '{}' is not a recognized run result, workflow, or receipt document",
        path.display()
    )
}

/// Build an [`AdapterRegistry`] from an [`EngineConfig`]'s adapter map.
///
/// # Errors
///
/// Returns an error if two configured adapters claim overlapping step
/// types.
pub fn build_registry(config: &EngineConfig) -> Result<AdapterRegistry> {
    let mut registry = AdapterRegistry::new();
    for (id, source) in &config.adapters {
        let adapter: Arc<dyn wf_adapter::Adapter> = match source {
            AdapterSource::Mock {} => Arc::new(MockAdapter::new(id.clone(), vec![id.clone()])),
            AdapterSource::Process {
                command,
                args,
                step_types,
                ..
            } => Arc::new(ProcessAdapter::new(
                id.clone(),
                command.clone(),
                args.clone(),
                step_types.clone(),
            )),
        };
        registry
            .register(adapter)
            .map_err(|e| anyhow::anyhow!("registering adapter '{id}': {e}"))?;
    }
    Ok(registry)
}

/// Build an [`Engine`] from an [`EngineConfig`].
pub fn build_engine(config: &EngineConfig) -> Result<Engine> {
    let registry = build_registry(config)?;
    let timeout = config
        .default_timeout_ms
        .unwrap_or_else(wf_runtime::Executor::default_timeout_ms);
    Ok(Engine::new(registry, config.resource_limits, timeout))
}

/// Load and validate a configuration file.
///
/// Returns a list of human-readable diagnostic messages (errors and
/// advisory warnings).
pub fn config_check(path: Option<&Path>) -> Result<Vec<String>> {
    let mut diagnostics = Vec::new();

    let config = match wf_config::load_config(path) {
        Ok(c) => c,
        Err(e) => {
            diagnostics.push(format!("error: {e}"));
            return Ok(diagnostics);
        }
    };

    match wf_config::validate_config(&config) {
        Ok(warnings) => {
            diagnostics.push("config: ok".into());
            for w in &warnings {
                diagnostics.push(format!("warning: {w}"));
            }
        }
        Err(e) => {
            diagnostics.push(format!("error: {e}"));
        }
    }

    Ok(diagnostics)
}

/// Load a run result or a bare receipt array from a JSON file and replay
/// its Merkle inclusion.
pub fn replay_file(path: &Path) -> Result<ReplayReport> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read file '{}'", path.display()))?;
    let receipts = extract_receipts(&content)
        .with_context(|| format!("parse receipts from '{}'", path.display()))?;
    Ok(wf_runtime::replay(&receipts))
}

fn extract_receipts(content: &str) -> Result<Vec<Receipt>> {
    if let Ok(result) = serde_json::from_str::<RunResult>(content) {
        return Ok(result.receipts);
    }
    serde_json::from_str::<Vec<Receipt>>(content).context("expected a run result or a receipt array")
}

/// Write every receipt of a completed run to `dir`, one file per step,
/// named `<step_id>.json`.
pub fn write_receipts(dir: &Path, result: &RunResult) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create receipts directory '{}'", dir.display()))?;
    for receipt in &result.receipts {
        let path = dir.join(format!("{}.json", receipt.step_id));
        let json = serde_json::to_string_pretty(receipt)?;
        std::fs::write(&path, json).with_context(|| format!("write receipt '{}'", path.display()))?;
    }
    Ok(())
}
