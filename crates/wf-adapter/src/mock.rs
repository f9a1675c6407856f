// SPDX-License-Identifier: MIT OR Apache-2.0
//! An in-process adapter useful for tests, demos, and the CLI's `mock`
//! adapter source — it performs no I/O and never fails validation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Map;
use wf_core::{AdapterManifest, ExecutionMetadata, Receipt, ReceiptStatus, Step, StepTypeDescriptor};

use crate::{Adapter, AdapterContext, HealthStatus, ValidationError};

/// Echoes a step's resolved params back as its output.
///
/// Registered under a configurable id and set of step types, so a single
/// config file can stand up several independently-named mock adapters.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    id: String,
    step_types: Vec<String>,
}

impl MockAdapter {
    /// Build a mock adapter claiming the given step types.
    #[must_use]
    pub fn new(id: impl Into<String>, step_types: Vec<String>) -> Self {
        Self {
            id: id.into(),
            step_types,
        }
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn manifest(&self) -> AdapterManifest {
        AdapterManifest {
            id: self.id.clone(),
            version: "1.0.0".to_string(),
            step_types: self
                .step_types
                .iter()
                .map(|t| StepTypeDescriptor {
                    step_type: t.clone(),
                    param_schema: serde_json::Value::Null,
                    deterministic: true,
                })
                .collect(),
        }
    }

    fn validate(&self, _step: &Step) -> Result<(), ValidationError> {
        Ok(())
    }

    async fn execute(&self, step: &Step, _context: &AdapterContext) -> Receipt {
        Receipt {
            step_id: step.id.clone(),
            status: ReceiptStatus::Success,
            output: Some(step.params.clone()),
            error: None,
            execution_metadata: ExecutionMetadata::new(Utc::now(), 0),
            merkle_proof: None,
        }
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

/// A mock adapter that always produces a terminal error receipt, useful for
/// exercising failure propagation without a real adapter.
#[derive(Debug, Clone)]
pub struct FailingMockAdapter {
    id: String,
    step_types: Vec<String>,
    message: String,
}

impl FailingMockAdapter {
    /// Build a mock adapter claiming the given step types that always fails
    /// with `message`.
    #[must_use]
    pub fn new(id: impl Into<String>, step_types: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step_types,
            message: message.into(),
        }
    }
}

#[async_trait]
impl Adapter for FailingMockAdapter {
    fn manifest(&self) -> AdapterManifest {
        AdapterManifest {
            id: self.id.clone(),
            version: "1.0.0".to_string(),
            step_types: self
                .step_types
                .iter()
                .map(|t| StepTypeDescriptor {
                    step_type: t.clone(),
                    param_schema: serde_json::Value::Null,
                    deterministic: true,
                })
                .collect(),
        }
    }

    fn validate(&self, _step: &Step) -> Result<(), ValidationError> {
        Ok(())
    }

    async fn execute(&self, step: &Step, _context: &AdapterContext) -> Receipt {
        Receipt {
            step_id: step.id.clone(),
            status: ReceiptStatus::Error,
            output: None,
            error: Some(wf_core::ReceiptError {
                code: wf_error::ErrorKind::AdapterException.code().to_string(),
                message: self.message.clone(),
                retryable: wf_error::ErrorKind::AdapterException.default_retryable(),
            }),
            execution_metadata: ExecutionMetadata::new(Utc::now(), 0),
            merkle_proof: None,
        }
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[tokio::test]
    async fn mock_adapter_echoes_params() {
        let adapter = MockAdapter::new("m1", vec!["noop".to_string()]);
        let mut params = Map::new();
        params.insert("x".to_string(), Value::from(7));
        let step = Step {
            params: params.clone(),
            ..Step::new("s1", "noop")
        };
        let context = AdapterContext::default();
        let receipt = adapter.execute(&step, &context).await;
        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert_eq!(receipt.output, Some(params));
    }

    #[test]
    fn mock_adapter_manifest_lists_claimed_types() {
        let adapter = MockAdapter::new("m1", vec!["a".to_string(), "b".to_string()]);
        let manifest = adapter.manifest();
        assert_eq!(manifest.step_types.len(), 2);
        assert!(manifest.step_types.iter().all(|d| d.deterministic));
    }

    #[tokio::test]
    async fn failing_mock_adapter_returns_error_receipt() {
        let adapter = FailingMockAdapter::new("f1", vec!["noop".to_string()], "boom");
        let step = Step::new("s1", "noop");
        let context = AdapterContext::default();
        let receipt = adapter.execute(&step, &context).await;
        assert_eq!(receipt.status, ReceiptStatus::Error);
        assert_eq!(receipt.error.unwrap().message, "boom");
    }
}
