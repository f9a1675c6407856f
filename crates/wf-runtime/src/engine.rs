// SPDX-License-Identifier: MIT OR Apache-2.0
//! Engine facade: composes the schema validator, DAG builder, scheduler,
//! and executor into the two primary operations — `execute` and `replay`
//! (§4.I) — and owns nothing beyond a run's adapter registry and policy.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wf_adapter::AdapterRegistry;
use wf_core::{
    Receipt, ReceiptError, RunExecutionMetadata, RunResult, RunStatus, StepSummary, Workflow,
};
use wf_dag::StepGraph;
use wf_error::{ErrorInfo, ErrorKind};
use wf_receipt_store::ReceiptStore;
use wf_resource::{ResourceLimits, ResourcePool};
use wf_schema::validate_workflow_doc;
use wf_telemetry::TelemetrySpan;

use crate::executor::Executor;
use crate::scheduler::Scheduler;

/// Owns a run's adapter registry and policy; stateless between runs
/// otherwise — a fresh execution context (and a fresh [`ResourcePool`]) is
/// built per `execute` call (§9 "no engine-wide mutable state during a
/// run").
#[derive(Clone)]
pub struct Engine {
    registry: Arc<AdapterRegistry>,
    resource_limits: ResourceLimits,
    default_timeout_ms: u64,
}

impl Engine {
    /// Build an engine over a fixed, already-populated registry.
    #[must_use]
    pub fn new(registry: AdapterRegistry, resource_limits: ResourceLimits, default_timeout_ms: u64) -> Self {
        Self {
            registry: Arc::new(registry),
            resource_limits,
            default_timeout_ms,
        }
    }

    /// Build an engine with no resource limits and the reference default
    /// timeout (30,000 ms).
    #[must_use]
    pub fn with_defaults(registry: AdapterRegistry) -> Self {
        Self::new(registry, ResourceLimits::default(), Executor::default_timeout_ms())
    }

    /// Run an already-parsed [`Workflow`] to completion (§4.I).
    ///
    /// Never returns an `Err` — every rejection (bad schema, cyclic graph,
    /// missing adapter) and every step failure is reported inside the
    /// returned [`RunResult`] instead, per §7's "run rejected"/"run failed"
    /// surfacing rules.
    pub async fn execute(&self, workflow: Workflow) -> RunResult {
        let start = Utc::now();
        let workflow_id = workflow.workflow.clone();

        let doc = match serde_json::to_value(&workflow) {
            Ok(doc) => doc,
            Err(e) => {
                return rejected(
                    workflow_id,
                    start,
                    ErrorInfo::new(ErrorKind::WorkflowSchemaInvalid, e.to_string()),
                )
            }
        };
        if let Err(info) = validate_workflow_doc(&doc) {
            return rejected(workflow_id, start, info);
        }

        let graph = match StepGraph::build(&workflow) {
            Ok(graph) => graph,
            Err(info) => return rejected(workflow_id, start, info),
        };

        if let Some(info) = self.precheck_adapters(&workflow) {
            return rejected(workflow_id, start, info);
        }

        let scheduler = Scheduler::new(
            Arc::clone(&self.registry),
            ResourcePool::new(self.resource_limits),
            Executor::new(self.default_timeout_ms),
        );
        let outcome = scheduler.run(&workflow, &graph).await;
        let end = Utc::now();

        TelemetrySpan::new("workflow_run")
            .with_attribute("workflow_id", workflow_id.clone())
            .with_attribute("steps_recorded", outcome.metrics.count.to_string())
            .with_attribute("error_rate", outcome.metrics.error_rate.to_string())
            .with_attribute(
                "mean_duration_ms",
                outcome.metrics.mean_duration_ms.to_string(),
            )
            .emit();

        let status = if outcome.failed_step.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
        let steps = outcome
            .receipts
            .iter()
            .map(|r| StepSummary {
                step_id: r.step_id.clone(),
                status: r.status,
                latency_ms: r.execution_metadata.latency_ms,
            })
            .collect();

        RunResult {
            workflow_id,
            status,
            steps,
            receipts: outcome.receipts,
            merkle_root: outcome.merkle_root,
            execution_metadata: run_metadata(start, end),
            failed_step: outcome.failed_step,
            error: outcome.error,
        }
    }

    /// Parse and validate a raw wire-format workflow document, then run it.
    ///
    /// Exists alongside [`Self::execute`] for hosts that read workflows off
    /// the wire (§6) rather than constructing a [`Workflow`] directly.
    pub async fn execute_document(&self, document: Value) -> RunResult {
        let start = Utc::now();
        let workflow_id = document
            .get("workflow")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        if let Err(info) = validate_workflow_doc(&document) {
            return rejected(workflow_id, start, info);
        }
        match serde_json::from_value::<Workflow>(document) {
            Ok(workflow) => self.execute(workflow).await,
            Err(e) => rejected(
                workflow_id,
                start,
                ErrorInfo::new(ErrorKind::WorkflowSchemaInvalid, e.to_string()),
            ),
        }
    }

    /// Re-verify a receipt sequence's Merkle inclusion without invoking any
    /// adapter (§4.I). Rebuilds a fresh accumulator from the receipts' own
    /// canonical leaf bytes, in the order given, then checks each receipt
    /// against the rebuilt root. Idempotent: running it twice on the same
    /// receipts yields an identical report.
    #[must_use]
    pub fn replay(&self, receipts: &[Receipt]) -> ReplayReport {
        replay(receipts)
    }

    fn precheck_adapters(&self, workflow: &Workflow) -> Option<ErrorInfo> {
        for (index, step) in workflow.steps.iter().enumerate() {
            if !self.registry.supports(&step.step_type) {
                return Some(
                    ErrorInfo::new(
                        ErrorKind::NoAdapterForType,
                        format!("no adapter claims step type `{}`", step.step_type),
                    )
                    .with_path(format!("steps[{index}].type")),
                );
            }
        }
        None
    }
}

/// Per-step outcome of a [`replay`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepVerification {
    /// Step id this verification covers.
    pub step_id: String,
    /// Whether the receipt's recomputed leaf hash verifies against the
    /// rebuilt root's authentication path.
    pub verified: bool,
}

/// Result of re-checking Merkle inclusion for a receipt sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Per-step verification outcomes, in the order given to [`replay`].
    pub steps: Vec<StepVerification>,
    /// The root rebuilt from the given receipts' canonical leaf bytes.
    pub merkle_root: Option<String>,
}

/// Free-function form of [`Engine::replay`] — it needs no engine state
/// because it never invokes an adapter.
#[must_use]
pub fn replay(receipts: &[Receipt]) -> ReplayReport {
    let mut store = ReceiptStore::new();
    for receipt in receipts {
        let mut bare = receipt.clone();
        bare.merkle_proof = None;
        // A malformed replay input (duplicate step ids) should not panic a
        // read-only verification operation; the duplicate is simply never
        // recorded, and its entry below reports unverified.
        let _ = store.append(bare);
    }
    let merkle_root = store.root();
    let steps = receipts
        .iter()
        .map(|r| StepVerification {
            step_id: r.step_id.clone(),
            verified: store.verify(&r.step_id).unwrap_or(false),
        })
        .collect();
    ReplayReport { steps, merkle_root }
}

fn run_metadata(start: DateTime<Utc>, end: DateTime<Utc>) -> RunExecutionMetadata {
    RunExecutionMetadata {
        start_time: start,
        end_time: end,
        duration_ms: (end - start).num_milliseconds().max(0) as u64,
    }
}

fn rejected(workflow_id: String, start: DateTime<Utc>, info: ErrorInfo) -> RunResult {
    let end = Utc::now();
    RunResult {
        workflow_id,
        status: RunStatus::Failed,
        steps: Vec::new(),
        receipts: Vec::new(),
        merkle_root: None,
        execution_metadata: run_metadata(start, end),
        failed_step: None,
        error: Some(ReceiptError {
            code: info.kind.code().to_string(),
            message: info.message,
            retryable: info.kind.default_retryable(),
        }),
    }
}
