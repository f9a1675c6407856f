// SPDX-License-Identifier: MIT OR Apache-2.0
//! Drives a [`StepGraph`] to completion (§4.G, §5).
//!
//! Ready steps are dispatched concurrently as `tokio` tasks — each may
//! suspend inside its adapter's `execute` call — but their receipts are
//! committed to the [`ReceiptStore`] strictly in the graph's precomputed
//! topological order. A receipt that completes out of order waits in a
//! fixed-slot reorder buffer until every slot before it has been filled;
//! this is what turns task-completion non-determinism into a Merkle root
//! that depends only on workflow text and adapter outputs (§4.G, §9
//! "Reorder buffer for concurrent dispatch").
//!
//! A step becomes ready, and is dispatched, only once every parent's
//! receipt has actually been appended (not merely completed) — so
//! reference resolution for a step never races the store (§5, ordering
//! guarantee 3).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;

use wf_adapter::{Adapter, AdapterContext, AdapterRegistry};
use wf_core::{ExecutionMetadata, Receipt, ReceiptError, ReceiptStatus, Step, Workflow};
use wf_dag::StepGraph;
use wf_error::ErrorKind;
use wf_receipt_store::ReceiptStore;
use wf_resource::ResourcePool;
use wf_telemetry::{MetricsCollector, MetricsSummary, StepMetrics};

use crate::executor::Executor;

/// Everything the scheduler produced driving one workflow to completion.
#[derive(Debug, Clone)]
pub struct SchedulerOutcome {
    /// Every appended receipt, in append (topological) order.
    pub receipts: Vec<Receipt>,
    /// Merkle root over the appended prefix, or `None` if nothing appended.
    pub merkle_root: Option<String>,
    /// The first step (in append order) whose receipt was terminal-error,
    /// if any.
    pub failed_step: Option<String>,
    /// That step's error detail.
    pub error: Option<ReceiptError>,
    /// Aggregated per-step metrics recorded while appending receipts (§5
    /// "shared resources" — the same single-writer append phase that
    /// serializes the receipt store also records these).
    pub metrics: MetricsSummary,
}

fn receipt_status_str(status: ReceiptStatus) -> &'static str {
    match status {
        ReceiptStatus::Success => "success",
        ReceiptStatus::Error => "error",
        ReceiptStatus::Degraded => "degraded",
    }
}

/// Drives the DAG to completion: dispatch, reorder buffer, append.
pub struct Scheduler {
    registry: Arc<AdapterRegistry>,
    resources: ResourcePool,
    executor: Executor,
}

impl Scheduler {
    /// Build a scheduler over a fixed adapter registry and resource pool.
    #[must_use]
    pub fn new(registry: Arc<AdapterRegistry>, resources: ResourcePool, executor: Executor) -> Self {
        Self {
            registry,
            resources,
            executor,
        }
    }

    /// Run `workflow` to completion against its precomputed `graph`.
    ///
    /// Assumes every step's adapter already exists in the registry (the
    /// facade pre-checks this before calling in, per §4.G policy point 1).
    pub async fn run(&self, workflow: &Workflow, graph: &StepGraph) -> SchedulerOutcome {
        let order = graph.order().to_vec();
        let n = order.len();
        if n == 0 {
            return SchedulerOutcome {
                receipts: Vec::new(),
                merkle_root: None,
                failed_step: None,
                error: None,
                metrics: MetricsCollector::new().summary(),
            };
        }

        let slot_of: HashMap<String, usize> =
            order.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
        let mut indegree: HashMap<String, usize> =
            order.iter().map(|id| (id.clone(), graph.indegree_of(id))).collect();

        let metrics = MetricsCollector::new();
        let store = AsyncMutex::new(ReceiptStore::new());
        let outputs: AsyncMutex<Map<String, Value>> = AsyncMutex::new(Map::new());

        let mut pending: Vec<Option<Receipt>> = (0..n).map(|_| None).collect();
        let mut join_set: JoinSet<Receipt> = JoinSet::new();
        let mut task_steps: HashMap<tokio::task::Id, String> = HashMap::new();
        let mut dispatch_halted = false;
        let mut failed_step: Option<String> = None;
        let mut failed_error: Option<ReceiptError> = None;

        let dispatch = |join_set: &mut JoinSet<Receipt>,
                         task_steps: &mut HashMap<tokio::task::Id, String>,
                         step_id: &str| {
            let step = graph.step(step_id).expect("step id drawn from the graph").clone();
            let adapter = self
                .registry
                .lookup(&step.step_type)
                .cloned()
                .expect("adapter existence pre-checked by the facade");
            let resources = self.resources.clone();
            let executor = self.executor;
            let outputs_snapshot = {
                // Best-effort synchronous snapshot; safe because this closure
                // only runs from the single orchestrating task, which is the
                // only writer of `outputs` between awaits.
                outputs.try_lock().map(|g| g.clone()).unwrap_or_default()
            };
            let handle = join_set.spawn(dispatch_one(
                step,
                outputs_snapshot,
                adapter,
                resources,
                executor,
            ));
            task_steps.insert(handle.id(), step_id.to_string());
        };

        for step_id in &order {
            if indegree[step_id] == 0 {
                dispatch(&mut join_set, &mut task_steps, step_id);
            }
        }

        let mut append_cursor = 0usize;
        while append_cursor < n {
            let Some(joined) = join_set.join_next_with_id().await else {
                // No in-flight work left; whatever remains in `order` is
                // unreachable because an ancestor failed.
                break;
            };

            let receipt = match joined {
                Ok((_id, receipt)) => receipt,
                Err(join_error) => {
                    let task_id = join_error.id();
                    let step_id = task_steps
                        .remove(&task_id)
                        .unwrap_or_else(|| "unknown".to_string());
                    adapter_exception_receipt(&step_id, &join_error.to_string())
                }
            };
            pending[slot_of[&receipt.step_id]] = Some(receipt);

            while append_cursor < n {
                let Some(receipt) = pending[append_cursor].take() else {
                    break;
                };
                let step_id = order[append_cursor].clone();

                let stored = {
                    let mut store_guard = store.lock().await;
                    store_guard
                        .append(receipt)
                        .expect("each step is dispatched and appended at most once per run")
                        .clone()
                };

                let step_type = graph.step(&step_id).map(|s| s.step_type.clone()).unwrap_or_default();
                let adapter_id = self
                    .registry
                    .lookup(&step_type)
                    .map(|a| a.manifest().id)
                    .unwrap_or_default();
                metrics.record(StepMetrics {
                    step_type,
                    adapter_id,
                    duration_ms: stored.execution_metadata.latency_ms,
                    status: receipt_status_str(stored.status).to_string(),
                    retryable: stored.error.as_ref().is_some_and(|e| e.retryable),
                    errors_count: u64::from(stored.status == ReceiptStatus::Error),
                });

                if stored.status.satisfies_dependency() {
                    if let Some(output) = stored.output.clone() {
                        outputs.lock().await.insert(step_id.clone(), Value::Object(output));
                    }
                    if !dispatch_halted {
                        for child in graph.children_of(&step_id) {
                            let degree = indegree.get_mut(child).expect("child tracked by indegree map");
                            *degree -= 1;
                            if *degree == 0 {
                                dispatch(&mut join_set, &mut task_steps, child);
                            }
                        }
                    }
                } else {
                    dispatch_halted = true;
                    if failed_step.is_none() {
                        failed_step = Some(step_id.clone());
                        failed_error = stored.error.clone();
                    }
                }
                append_cursor += 1;
            }
        }

        let store = store.into_inner();
        SchedulerOutcome {
            receipts: store.all().to_vec(),
            merkle_root: store.root(),
            failed_step,
            error: failed_error,
            metrics: metrics.summary(),
        }
    }
}

async fn dispatch_one(
    step: Step,
    outputs_snapshot: Map<String, Value>,
    adapter: Arc<dyn Adapter>,
    resources: ResourcePool,
    executor: Executor,
) -> Receipt {
    let outputs_for_resolver: HashMap<String, Value> = outputs_snapshot
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let resolved_params = match wf_resolver::resolve(&Value::Object(step.params.clone()), &outputs_for_resolver) {
        Ok(Value::Object(map)) => map,
        Ok(_) => step.params.clone(),
        Err(info) => {
            return synthetic_receipt(&step.id, info.kind, info.message);
        }
    };
    let resolved_step = Step {
        params: resolved_params,
        ..step
    };

    if let Err(validation_err) = adapter.validate(&resolved_step) {
        return synthetic_receipt(
            &resolved_step.id,
            ErrorKind::StepValidationFailed,
            validation_err.to_string(),
        );
    }

    let guard = match resources.try_reserve(resolved_step.resource_requirements.as_ref()) {
        Ok(guard) => guard,
        Err(resource_err) => {
            return synthetic_receipt(
                &resolved_step.id,
                ErrorKind::ResourceUnavailable,
                resource_err.to_string(),
            );
        }
    };

    let context = AdapterContext::new(
        outputs_snapshot
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::Object(map) => Some((k, map)),
                _ => None,
            })
            .collect(),
    );

    let receipt = executor.run(&adapter, &resolved_step, &context).await;
    drop(guard);
    receipt
}

fn synthetic_receipt(step_id: &str, kind: ErrorKind, message: String) -> Receipt {
    Receipt {
        step_id: step_id.to_string(),
        status: ReceiptStatus::Error,
        output: None,
        error: Some(ReceiptError {
            code: kind.code().to_string(),
            message,
            retryable: kind.default_retryable(),
        }),
        execution_metadata: ExecutionMetadata::new(Utc::now(), 0),
        merkle_proof: None,
    }
}

fn adapter_exception_receipt(step_id: &str, message: &str) -> Receipt {
    synthetic_receipt(step_id, ErrorKind::AdapterException, message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use wf_adapter::{AdapterManifest, HealthStatus, ValidationError};
    use wf_core::StepTypeDescriptor;

    struct EchoAdapter {
        delay_ms: u64,
    }

    #[async_trait]
    impl Adapter for EchoAdapter {
        fn manifest(&self) -> AdapterManifest {
            AdapterManifest {
                id: "echo".to_string(),
                version: "1.0.0".to_string(),
                step_types: vec![StepTypeDescriptor {
                    step_type: "echo".to_string(),
                    param_schema: Value::Null,
                    deterministic: true,
                }],
            }
        }
        fn validate(&self, _step: &Step) -> Result<(), ValidationError> {
            Ok(())
        }
        async fn execute(&self, step: &Step, _context: &AdapterContext) -> Receipt {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            Receipt {
                step_id: step.id.clone(),
                status: ReceiptStatus::Success,
                output: Some(step.params.clone()),
                error: None,
                execution_metadata: ExecutionMetadata::new(Utc::now(), self.delay_ms),
                merkle_proof: None,
            }
        }
        async fn health_check(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl Adapter for FailingAdapter {
        fn manifest(&self) -> AdapterManifest {
            AdapterManifest {
                id: "failing".to_string(),
                version: "1.0.0".to_string(),
                step_types: vec![StepTypeDescriptor {
                    step_type: "failing".to_string(),
                    param_schema: Value::Null,
                    deterministic: true,
                }],
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
                error: Some(ReceiptError {
                    code: "ADAPTER-OOPS".to_string(),
                    message: "deliberate failure".to_string(),
                    retryable: false,
                }),
                execution_metadata: ExecutionMetadata::new(Utc::now(), 0),
                merkle_proof: None,
            }
        }
        async fn health_check(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    fn registry_with(adapters: Vec<(&str, u64)>) -> Arc<AdapterRegistry> {
        let mut registry = AdapterRegistry::new();
        for (step_type, delay_ms) in adapters {
            registry
                .register(Arc::new(EchoAdapter { delay_ms }) as Arc<dyn Adapter>)
                .unwrap();
            let _ = step_type;
        }
        Arc::new(registry)
    }

    fn step(id: &str, step_type: &str, parents: &[&str]) -> Step {
        let mut s = Step::new(id, step_type);
        s.parent_step_ids = parents.iter().map(|p| (*p).to_string()).collect();
        s
    }

    #[tokio::test]
    async fn linear_chain_appends_in_dependency_order() {
        let wf = Workflow::new(
            "linear",
            vec![
                step("s1", "echo", &[]),
                step("s2", "echo", &["s1"]),
                step("s3", "echo", &["s2"]),
            ],
        );
        let graph = StepGraph::build(&wf).unwrap();
        let scheduler = Scheduler::new(
            registry_with(vec![("echo", 0)]),
            ResourcePool::unconstrained(),
            Executor::new(5_000),
        );
        let outcome = scheduler.run(&wf, &graph).await;
        let ids: Vec<&str> = outcome.receipts.iter().map(|r| r.step_id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2", "s3"]);
        assert!(outcome.failed_step.is_none());
        assert!(outcome.merkle_root.is_some());
        assert_eq!(outcome.metrics.count, 3);
        assert_eq!(outcome.metrics.error_rate, 0.0);
        assert_eq!(outcome.metrics.step_type_counts["echo"], 3);
    }

    #[tokio::test]
    async fn diamond_appends_by_declaration_order_regardless_of_completion_order() {
        let mut wf = Workflow::new(
            "diamond",
            vec![
                step("start", "echo", &[]),
                step("a", "echo", &["start"]),
                step("b", "echo", &["start"]),
                step("merge", "echo", &["a", "b"]),
            ],
        );
        // `a` is slower than `b`, yet must still be appended first.
        wf.steps[1].params.insert("x".to_string(), Value::from(1));

        let mut registry = AdapterRegistry::new();
        registry
            .register(Arc::new(PerStepDelayAdapter) as Arc<dyn Adapter>)
            .unwrap();
        let graph = StepGraph::build(&wf).unwrap();
        let scheduler = Scheduler::new(Arc::new(registry), ResourcePool::unconstrained(), Executor::new(5_000));
        let outcome = scheduler.run(&wf, &graph).await;
        let ids: Vec<&str> = outcome.receipts.iter().map(|r| r.step_id.as_str()).collect();
        assert_eq!(ids, ["start", "a", "b", "merge"]);
    }

    struct PerStepDelayAdapter;

    #[async_trait]
    impl Adapter for PerStepDelayAdapter {
        fn manifest(&self) -> AdapterManifest {
            AdapterManifest {
                id: "delay".to_string(),
                version: "1.0.0".to_string(),
                step_types: vec![StepTypeDescriptor {
                    step_type: "echo".to_string(),
                    param_schema: Value::Null,
                    deterministic: true,
                }],
            }
        }
        fn validate(&self, _step: &Step) -> Result<(), ValidationError> {
            Ok(())
        }
        async fn execute(&self, step: &Step, _context: &AdapterContext) -> Receipt {
            let delay = if step.id == "a" { 40 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Receipt {
                step_id: step.id.clone(),
                status: ReceiptStatus::Success,
                output: Some(Map::new()),
                error: None,
                execution_metadata: ExecutionMetadata::new(Utc::now(), delay),
                merkle_proof: None,
            }
        }
        async fn health_check(&self) -> HealthStatus {
            HealthStatus::Healthy
        }
    }

    #[tokio::test]
    async fn terminal_failure_halts_dependents_but_keeps_earlier_receipts() {
        let wf = Workflow::new(
            "fail",
            vec![
                step("s1", "echo", &[]),
                step("s2", "failing", &["s1"]),
                step("s3", "echo", &["s2"]),
            ],
        );
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(EchoAdapter { delay_ms: 0 })).unwrap();
        registry.register(Arc::new(FailingAdapter)).unwrap();
        let graph = StepGraph::build(&wf).unwrap();
        let scheduler = Scheduler::new(Arc::new(registry), ResourcePool::unconstrained(), Executor::new(5_000));
        let outcome = scheduler.run(&wf, &graph).await;

        assert_eq!(outcome.failed_step.as_deref(), Some("s2"));
        let ids: Vec<&str> = outcome.receipts.iter().map(|r| r.step_id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);
        assert_eq!(outcome.metrics.count, 2);
        assert_eq!(outcome.metrics.error_rate, 0.5);
        assert_eq!(outcome.metrics.step_type_counts["failing"], 1);
    }

    #[tokio::test]
    async fn unrelated_roots_keep_declaration_order() {
        let wf = Workflow::new("roots", vec![step("x", "echo", &[]), step("y", "echo", &[])]);
        let graph = StepGraph::build(&wf).unwrap();
        let scheduler = Scheduler::new(
            registry_with(vec![("echo", 0)]),
            ResourcePool::unconstrained(),
            Executor::new(5_000),
        );
        let outcome = scheduler.run(&wf, &graph).await;
        let ids: Vec<&str> = outcome.receipts.iter().map(|r| r.step_id.as_str()).collect();
        assert_eq!(ids, ["x", "y"]);
    }

    #[tokio::test]
    async fn empty_workflow_produces_no_receipts() {
        let wf = Workflow::new("empty", vec![]);
        let graph = StepGraph::build(&wf).unwrap();
        let scheduler = Scheduler::new(Arc::new(AdapterRegistry::new()), ResourcePool::unconstrained(), Executor::new(5_000));
        let outcome = scheduler.run(&wf, &graph).await;
        assert!(outcome.receipts.is_empty());
        assert!(outcome.merkle_root.is_none());
        assert_eq!(outcome.metrics.count, 0);
    }
}
