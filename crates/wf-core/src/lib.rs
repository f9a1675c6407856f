// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Core data model for the workflow engine.
//!
//! Defines the wire shapes every other crate builds on — [`Workflow`],
//! [`Step`], [`Receipt`] — and the canonical-JSON hashing rules the Merkle
//! accumulator and receipt store hash against. If you only take one
//! dependency from this workspace, take this one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// A workflow document: a name, an optional version, and its ordered steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Workflow {
    /// Non-empty workflow name.
    pub workflow: String,
    /// Optional version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Ordered sequence of steps. Declaration order is load-bearing: it
    /// breaks topological-sort ties and orders unrelated roots.
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Construct an empty, unnamed-version workflow with the given steps.
    #[must_use]
    pub fn new(workflow: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            workflow: workflow.into(),
            version: None,
            steps,
        }
    }
}

/// A single step in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    /// Unique non-empty id within the workflow.
    pub id: String,
    /// Step type string, used to look up an adapter in the registry.
    #[serde(rename = "type")]
    pub step_type: String,
    /// Parameter tree. Leaves may be literals or reference tokens
    /// (`$stepId[.path]`); see the reference resolver.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Ids that must complete (with `status` in `{success, degraded}`)
    /// before this step becomes ready. Absent means no dependency.
    #[serde(default)]
    pub parent_step_ids: Vec<String>,
    /// Optional resource policy. Unknown keys inside it are ignored by the
    /// scheduler, not rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requirements: Option<ResourceRequirements>,
}

impl Step {
    /// Construct a step with no params, no parents, no resource policy.
    #[must_use]
    pub fn new(id: impl Into<String>, step_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step_type: step_type.into(),
            params: Map::new(),
            parent_step_ids: Vec::new(),
            resource_requirements: None,
        }
    }
}

/// Recognized resource policy options. Unrecognized keys present in the
/// wire document are dropped during deserialization rather than rejected —
/// §3 requires unknown options be ignored, not that the document fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceRequirements {
    /// Requested RAM, in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_mb: Option<u64>,
    /// Whether a GPU is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<bool>,
    /// Requested qubit count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qubits: Option<u64>,
    /// Requested gas limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Per-step timeout override, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// A descriptor for one step type an adapter supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepTypeDescriptor {
    /// Step type string this descriptor covers.
    #[serde(rename = "type")]
    pub step_type: String,
    /// Informational JSON schema for this step type's params.
    #[serde(default)]
    pub param_schema: Value,
    /// Informational only — never enforced by the scheduler or executor.
    /// Surfaced to replay tooling so hosts can flag adapters whose
    /// receipts may not actually be reproducible.
    pub deterministic: bool,
}

/// Static description of an adapter, produced by its `manifest()` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AdapterManifest {
    /// Adapter identifier, unique within a registry.
    pub id: String,
    /// Adapter version string.
    pub version: String,
    /// Step types this adapter claims. The registry rejects registration if
    /// any of these collides with an already-registered adapter's claim.
    pub step_types: Vec<StepTypeDescriptor>,
}

/// Outcome of a single step's execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// The step completed normally.
    Success,
    /// The step failed terminally (or, for timeouts, retryably).
    Error,
    /// The step completed with reduced fidelity; counts as success for
    /// dependency purposes.
    Degraded,
}

impl ReceiptStatus {
    /// Whether dependents may be dispatched once a parent reaches this
    /// status — true for `success` and `degraded`, false for `error`.
    #[must_use]
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, Self::Success | Self::Degraded)
    }
}

/// Error detail attached to a receipt with `status: error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReceiptError {
    /// Closed-taxonomy code (core-raised) or an opaque adapter-defined code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether a retry might succeed. The core itself never retries; this
    /// is informational for hosts wrapping the engine.
    pub retryable: bool,
}

/// Execution timing and provenance metadata attached to every receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionMetadata {
    /// When execution of this step started, UTC.
    pub timestamp: DateTime<Utc>,
    /// Wall-clock duration of the adapter call, in milliseconds.
    pub latency_ms: u64,
    /// Adapter version, if the adapter reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_version: Option<String>,
    /// Adapter-defined fields beyond the required two.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExecutionMetadata {
    /// Construct metadata with no adapter version and no extra fields.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, latency_ms: u64) -> Self {
        Self {
            timestamp,
            latency_ms,
            adapter_version: None,
            extra: Map::new(),
        }
    }
}

/// The structured result of executing one step.
///
/// `merkle_proof` holds the leaf hash (not an authentication path — see
/// `DESIGN.md` for why) and is filled in by the receipt store at append
/// time; adapters never set it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Receipt {
    /// The step that produced this receipt.
    pub step_id: String,
    /// Outcome status.
    pub status: ReceiptStatus,
    /// Output tree, present on success/degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    /// Error detail, present when `status == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReceiptError>,
    /// Timing and provenance metadata.
    pub execution_metadata: ExecutionMetadata,
    /// Leaf hash assigned by the receipt store at append time. `None`
    /// before the receipt has been appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_proof: Option<String>,
}

impl Receipt {
    /// Canonical leaf bytes for this receipt: `merkle_proof` elided,
    /// object keys sorted at every level, no insignificant whitespace,
    /// strings NFC-normalized, then UTF-8 encoded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`] if the receipt cannot be serialized.
    pub fn canonical_leaf_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("merkle_proof");
        }
        canonical_bytes(&value)
    }

    /// Hash of [`Self::canonical_leaf_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`] if the receipt cannot be serialized.
    pub fn leaf_hash(&self) -> Result<String, CoreError> {
        Ok(sha256_hex(&self.canonical_leaf_bytes()?))
    }

    /// Returns a copy of this receipt with `merkle_proof` set to its own
    /// leaf hash. Mirrors what the receipt store does at append time —
    /// useful for tests and for reconstructing a receipt outside a run.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`] if the receipt cannot be serialized.
    pub fn with_leaf_hash(mut self) -> Result<Self, CoreError> {
        let hash = self.leaf_hash()?;
        self.merkle_proof = Some(hash);
        Ok(self)
    }
}

/// Errors from canonicalization and hashing.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// JSON serialization or deserialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recursively NFC-normalize every string (object keys and leaf string
/// values) in a JSON value tree. Non-string leaves pass through unchanged.
#[must_use]
pub fn normalize_nfc(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.nfc().collect()),
        Value::Array(items) => Value::Array(items.iter().map(normalize_nfc).collect()),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                let key: String = k.nfc().collect();
                out.insert(key, normalize_nfc(v));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Produce canonical bytes for `value`: NFC-normalized strings, object keys
/// sorted lexicographically at every nesting level (`serde_json::Map` is a
/// `BTreeMap` by default, which sorts on serialization), no insignificant
/// whitespace, numbers in `serde_json`'s shortest round-trip form, UTF-8
/// encoded.
///
/// # Errors
///
/// Returns [`CoreError::Json`] if `value` cannot be serialized.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let v = serde_json::to_value(value)?;
    let normalized = normalize_nfc(&v);
    Ok(serde_json::to_vec(&normalized)?)
}

/// Canonical JSON string for `value` (see [`canonical_bytes`]).
///
/// # Errors
///
/// Returns [`CoreError::Json`] if `value` cannot be serialized.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, CoreError> {
    let bytes = canonical_bytes(value)?;
    // canonical_bytes always produces valid UTF-8 JSON text.
    Ok(String::from_utf8(bytes).expect("canonical bytes are valid UTF-8"))
}

/// Hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Per-run run-result summary returned by the engine facade, mirroring §6's
/// run-result wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunResult {
    /// Identifier of this run (host-supplied or generated).
    pub workflow_id: String,
    /// Terminal run status.
    pub status: RunStatus,
    /// Per-step summaries, in append order.
    pub steps: Vec<StepSummary>,
    /// Full receipts, in append order.
    pub receipts: Vec<Receipt>,
    /// Merkle root over the appended receipts, or `None` for an empty run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,
    /// Start/end timestamps and total duration.
    pub execution_metadata: RunExecutionMetadata,
    /// The step that caused a failed run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    /// The error that caused a failed run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReceiptError>,
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step produced a `success`/`degraded` receipt.
    Success,
    /// A terminal step error stopped the run.
    Failed,
}

/// Per-step entry in a [`RunResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepSummary {
    /// Step id.
    pub step_id: String,
    /// Step's receipt status.
    pub status: ReceiptStatus,
    /// Step's adapter call latency, in milliseconds.
    pub latency_ms: u64,
}

/// Start/end timestamps and total duration for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunExecutionMetadata {
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When the run ended.
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time`, in milliseconds.
    pub duration_ms: u64,
}
