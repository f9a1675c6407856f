// SPDX-License-Identifier: MIT OR Apache-2.0
//! Single-step execution under a timeout, with receipt schema enforcement
//! (§4.H).
//!
//! [`Executor::run`] is the only place in the engine that awaits adapter
//! code directly. It never returns an `Err` — a timeout or a schema
//! violation is synthesized into an error [`Receipt`] so the scheduler's
//! reorder buffer can treat every dispatch uniformly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use wf_adapter::{Adapter, AdapterContext};
use wf_core::{ExecutionMetadata, Receipt, ReceiptError, ReceiptStatus, Step};
use wf_error::ErrorKind;
use wf_schema::validate_receipt_doc;

/// Runs one adapter `execute` call under a per-step timeout and validates
/// the receipt it returns.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    default_timeout_ms: u64,
}

impl Executor {
    /// Build an executor with the given default timeout, used when a step
    /// does not declare `resource_requirements.timeout_ms`.
    #[must_use]
    pub fn new(default_timeout_ms: u64) -> Self {
        Self { default_timeout_ms }
    }

    /// The default step timeout, reference value 30,000 ms (§4.H).
    #[must_use]
    pub const fn default_timeout_ms() -> u64 {
        30_000
    }

    /// Run `adapter.execute(step, context)` under `step`'s effective
    /// timeout, then validate the returned receipt's schema.
    pub async fn run(&self, adapter: &Arc<dyn Adapter>, step: &Step, context: &AdapterContext) -> Receipt {
        let timeout_ms = step
            .resource_requirements
            .as_ref()
            .and_then(|r| r.timeout_ms)
            .unwrap_or(self.default_timeout_ms);
        let started = Utc::now();

        match tokio::time::timeout(Duration::from_millis(timeout_ms), adapter.execute(step, context)).await {
            Ok(receipt) => enforce_schema(receipt, &step.id),
            Err(_elapsed) => timeout_receipt(&step.id, started, timeout_ms),
        }
    }
}

fn enforce_schema(receipt: Receipt, step_id: &str) -> Receipt {
    let doc = match serde_json::to_value(&receipt) {
        Ok(v) => v,
        Err(e) => return invalid_receipt(step_id, format!("receipt does not serialize to JSON: {e}")),
    };
    match validate_receipt_doc(&doc) {
        Ok(()) => receipt,
        Err(info) => invalid_receipt(step_id, info.message),
    }
}

fn timeout_receipt(step_id: &str, started: DateTime<Utc>, timeout_ms: u64) -> Receipt {
    Receipt {
        step_id: step_id.to_string(),
        status: ReceiptStatus::Error,
        output: None,
        error: Some(ReceiptError {
            code: ErrorKind::ExecutionTimeout.code().to_string(),
            message: format!("adapter exceeded its {timeout_ms}ms timeout"),
            retryable: ErrorKind::ExecutionTimeout.default_retryable(),
        }),
        execution_metadata: ExecutionMetadata::new(started, timeout_ms),
        merkle_proof: None,
    }
}

fn invalid_receipt(step_id: &str, message: String) -> Receipt {
    Receipt {
        step_id: step_id.to_string(),
        status: ReceiptStatus::Error,
        output: None,
        error: Some(ReceiptError {
            code: ErrorKind::InvalidReceipt.code().to_string(),
            message,
            retryable: ErrorKind::InvalidReceipt.default_retryable(),
        }),
        execution_metadata: ExecutionMetadata::new(Utc::now(), 0),
        merkle_proof: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use wf_adapter::{AdapterManifest, HealthStatus, ValidationError};
    use wf_core::StepTypeDescriptor;

    struct SlowAdapter {
        delay_ms: u64,
    }

    #[async_trait]
    impl Adapter for SlowAdapter {
        fn manifest(&self) -> AdapterManifest {
            AdapterManifest {
                id: "slow".to_string(),
                version: "1.0.0".to_string(),
                step_types: vec![StepTypeDescriptor {
                    step_type: "slow".to_string(),
                    param_schema: Value::Null,
                    deterministic: false,
                }],
            }
        }
        fn validate(&self, _step: &Step) -> Result<(), ValidationError> {
            Ok(())
        }
        async fn execute(&self, step: &Step, _context: &AdapterContext) -> Receipt {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            Receipt {
                step_id: step.id.clone(),
                status: ReceiptStatus::Success,
                output: Some(Map::new()),
                error: None,
                execution_metadata: ExecutionMetadata::new(Utc::now(), self.delay_ms),
                merkle_proof: None,
            }
        }
        async fn health_check(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    struct MalformedAdapter;

    #[async_trait]
    impl Adapter for MalformedAdapter {
        fn manifest(&self) -> AdapterManifest {
            AdapterManifest {
                id: "malformed".to_string(),
                version: "1.0.0".to_string(),
                step_types: vec![StepTypeDescriptor {
                    step_type: "malformed".to_string(),
                    param_schema: Value::Null,
                    deterministic: true,
                }],
            }
        }
        fn validate(&self, _step: &Step) -> Result<(), ValidationError> {
            Ok(())
        }
        async fn execute(&self, step: &Step, _context: &AdapterContext) -> Receipt {
            // Claims success but omits the output the schema requires.
            Receipt {
                step_id: step.id.clone(),
                status: ReceiptStatus::Success,
                output: None,
                error: None,
                execution_metadata: ExecutionMetadata::new(Utc::now(), 0),
                merkle_proof: None,
            }
        }
        async fn health_check(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    #[tokio::test]
    async fn fast_adapter_completes_within_timeout() {
        let adapter: Arc<dyn Adapter> = Arc::new(SlowAdapter { delay_ms: 5 });
        let executor = Executor::new(1_000);
        let step = Step::new("s1", "slow");
        let context = AdapterContext::default();
        let receipt = executor.run(&adapter, &step, &context).await;
        assert_eq!(receipt.status, ReceiptStatus::Success);
    }

    #[tokio::test]
    async fn slow_adapter_times_out() {
        let adapter: Arc<dyn Adapter> = Arc::new(SlowAdapter { delay_ms: 500 });
        let executor = Executor::new(50);
        let step = Step::new("s1", "slow");
        let context = AdapterContext::default();
        let receipt = executor.run(&adapter, &step, &context).await;
        assert_eq!(receipt.status, ReceiptStatus::Error);
        assert_eq!(
            receipt.error.unwrap().code,
            ErrorKind::ExecutionTimeout.code()
        );
    }

    #[tokio::test]
    async fn per_step_timeout_override_takes_precedence() {
        let adapter: Arc<dyn Adapter> = Arc::new(SlowAdapter { delay_ms: 500 });
        let executor = Executor::new(10_000);
        let mut step = Step::new("s1", "slow");
        step.resource_requirements = Some(wf_core::ResourceRequirements {
            timeout_ms: Some(20),
            ..Default::default()
        });
        let context = AdapterContext::default();
        let receipt = executor.run(&adapter, &step, &context).await;
        assert_eq!(
            receipt.error.unwrap().code,
            ErrorKind::ExecutionTimeout.code()
        );
    }

    #[tokio::test]
    async fn malformed_receipt_becomes_invalid_receipt() {
        let adapter: Arc<dyn Adapter> = Arc::new(MalformedAdapter);
        let executor = Executor::new(1_000);
        let step = Step::new("s1", "malformed");
        let context = AdapterContext::default();
        let receipt = executor.run(&adapter, &step, &context).await;
        assert_eq!(receipt.status, ReceiptStatus::Error);
        assert_eq!(receipt.error.unwrap().code, ErrorKind::InvalidReceipt.code());
    }
}
