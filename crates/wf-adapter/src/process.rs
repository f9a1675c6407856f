// SPDX-License-Identifier: MIT OR Apache-2.0
//! An adapter that delegates a step's execution to an external process,
//! speaking one JSON request/response pair over stdio.
//!
//! The process is spawned fresh for every `execute` call — there is no
//! persistent session the way a sidecar's would be, which keeps the wire
//! contract and failure modes simple at the cost of one process-spawn per
//! step. A request looks like:
//!
//! ```json
//! {"step_id": "s1", "step_type": "compute", "params": {...}, "outputs": {"s0": {...}}}
//! ```
//!
//! and the process must write exactly one JSON line to stdout before
//! exiting:
//!
//! ```json
//! {"status": "success", "output": {...}}
//! {"status": "error", "error": {"code": "adapter_exception", "message": "...", "retryable": false}}
//! ```

use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use wf_core::{AdapterManifest, ExecutionMetadata, Receipt, ReceiptError, ReceiptStatus, Step, StepTypeDescriptor};
use wf_error::ErrorKind;

use crate::{Adapter, AdapterContext, HealthStatus, ValidationError};

#[derive(Serialize)]
struct ProcessRequest<'a> {
    step_id: &'a str,
    step_type: &'a str,
    params: &'a Map<String, Value>,
    outputs: &'a std::collections::BTreeMap<String, Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ProcessResponse {
    Success { output: Map<String, Value> },
    Degraded { output: Map<String, Value>, error: ProcessErrorBody },
    Error { error: ProcessErrorBody },
}

#[derive(Deserialize)]
struct ProcessErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    retryable: bool,
}

/// Delegates a step's execution to a spawned external process.
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    id: String,
    command: String,
    args: Vec<String>,
    step_types: Vec<String>,
}

impl ProcessAdapter {
    /// Build a process adapter that spawns `command args...` once per step
    /// and claims the given step types.
    #[must_use]
    pub fn new(id: impl Into<String>, command: impl Into<String>, args: Vec<String>, step_types: Vec<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args,
            step_types,
        }
    }

    async fn run_process(&self, step: &Step, context: &AdapterContext) -> Result<ProcessResponse, String> {
        let request = ProcessRequest {
            step_id: &step.id,
            step_type: &step.step_type,
            params: &step.params,
            outputs: context.outputs(),
        };
        let mut line = serde_json::to_vec(&request).map_err(|e| format!("encode request: {e}"))?;
        line.push(b'\n');

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("spawn {}: {e}", self.command))?;

        let mut stdin = child.stdin.take().ok_or("child stdin not captured")?;
        stdin.write_all(&line).await.map_err(|e| format!("write stdin: {e}"))?;
        drop(stdin);

        let stdout = child.stdout.take().ok_or("child stdout not captured")?;
        let mut reader = BufReader::new(stdout);
        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .map_err(|e| format!("read stdout: {e}"))?;

        let _ = child.wait().await;

        serde_json::from_str(response_line.trim()).map_err(|e| format!("decode response: {e}"))
    }
}

#[async_trait]
impl Adapter for ProcessAdapter {
    fn manifest(&self) -> AdapterManifest {
        AdapterManifest {
            id: self.id.clone(),
            version: "1.0.0".to_string(),
            step_types: self
                .step_types
                .iter()
                .map(|t| StepTypeDescriptor {
                    step_type: t.clone(),
                    param_schema: Value::Null,
                    deterministic: false,
                })
                .collect(),
        }
    }

    fn validate(&self, _step: &Step) -> Result<(), ValidationError> {
        Ok(())
    }

    async fn execute(&self, step: &Step, context: &AdapterContext) -> Receipt {
        let started = Utc::now();
        match self.run_process(step, context).await {
            Ok(ProcessResponse::Success { output }) => Receipt {
                step_id: step.id.clone(),
                status: ReceiptStatus::Success,
                output: Some(output),
                error: None,
                execution_metadata: ExecutionMetadata::new(started, 0),
                merkle_proof: None,
            },
            Ok(ProcessResponse::Degraded { output, error }) => Receipt {
                step_id: step.id.clone(),
                status: ReceiptStatus::Degraded,
                output: Some(output),
                error: Some(ReceiptError {
                    code: error.code,
                    message: error.message,
                    retryable: error.retryable,
                }),
                execution_metadata: ExecutionMetadata::new(started, 0),
                merkle_proof: None,
            },
            Ok(ProcessResponse::Error { error }) => Receipt {
                step_id: step.id.clone(),
                status: ReceiptStatus::Error,
                output: None,
                error: Some(ReceiptError {
                    code: error.code,
                    message: error.message,
                    retryable: error.retryable,
                }),
                execution_metadata: ExecutionMetadata::new(started, 0),
                merkle_proof: None,
            },
            Err(message) => Receipt {
                step_id: step.id.clone(),
                status: ReceiptStatus::Error,
                output: None,
                error: Some(ReceiptError {
                    code: ErrorKind::AdapterException.code().to_string(),
                    message,
                    retryable: ErrorKind::AdapterException.default_retryable(),
                }),
                execution_metadata: ExecutionMetadata::new(started, 0),
                merkle_proof: None,
            },
        }
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}
