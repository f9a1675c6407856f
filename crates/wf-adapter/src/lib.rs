// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The adapter capability contract and the registry that maps step types to
//! adapter instances.
//!
//! An adapter is a plugin satisfying four operations — [`Adapter::manifest`],
//! [`Adapter::validate`], [`Adapter::execute`], [`Adapter::health_check`] —
//! with no inheritance relationship required; composition by registration
//! in an [`AdapterRegistry`] is sufficient. Domain-specific adapters (AI
//! inference, IPFS, vault, …) are external collaborators addressed only
//! through this boundary. [`mock`] and [`process`] hold two generic,
//! host-agnostic adapters — an in-memory echo and a spawned-process
//! delegate — concrete enough for a host to register and run against
//! without writing a domain adapter first.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wf_core::{AdapterManifest, Receipt, Step};

pub mod mock;
pub mod process;

pub use mock::{FailingMockAdapter, MockAdapter};
pub use process::ProcessAdapter;

/// Read-only execution context handed to [`Adapter::execute`].
///
/// Exposes the outputs of every step completed so far in the run, plus any
/// run-scoped helpers the host chooses to supply (a vault lookup, a
/// telemetry sink). It exposes no mutable state — adapters report their
/// result as a returned [`Receipt`], not by mutating the context.
#[derive(Clone, Default)]
pub struct AdapterContext {
    outputs: Arc<BTreeMap<String, Map<String, Value>>>,
    helpers: Arc<BTreeMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl AdapterContext {
    /// Build a context from the completed-step outputs map.
    #[must_use]
    pub fn new(outputs: BTreeMap<String, Map<String, Value>>) -> Self {
        Self {
            outputs: Arc::new(outputs),
            helpers: Arc::new(BTreeMap::new()),
        }
    }

    /// Attach named host helpers (vault, telemetry sink, …) to this
    /// context. Consumes and returns `self` for chaining.
    #[must_use]
    pub fn with_helpers(mut self, helpers: BTreeMap<String, Arc<dyn Any + Send + Sync>>) -> Self {
        self.helpers = Arc::new(helpers);
        self
    }

    /// The recorded output of a completed step, if any.
    #[must_use]
    pub fn output(&self, step_id: &str) -> Option<&Map<String, Value>> {
        self.outputs.get(step_id)
    }

    /// Every completed step's output, by step id.
    #[must_use]
    pub fn outputs(&self) -> &BTreeMap<String, Map<String, Value>> {
        &self.outputs
    }

    /// Look up a named helper and downcast it to `T`.
    #[must_use]
    pub fn helper<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.helpers.get(name)?.clone().downcast::<T>().ok()
    }
}

/// Liveness probe result from [`Adapter::health_check`]. Not called on the
/// execution path (§4.F) — purely informational for host monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum HealthStatus {
    /// The adapter is ready to accept work.
    Healthy,
    /// The adapter can accept work but with reduced confidence.
    Degraded {
        /// Human-readable explanation.
        reason: String,
    },
    /// The adapter cannot currently accept work.
    Unhealthy {
        /// Human-readable explanation.
        reason: String,
    },
}

/// Rejection detail from [`Adapter::validate`]. Surfaced by the scheduler
/// as a synthetic `StepValidationFailed` receipt (§4.G step 3).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Human-readable rejection reason.
    pub message: String,
}

impl ValidationError {
    /// Construct a validation error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A capability plugin satisfying the four-operation adapter contract.
///
/// The engine calls `validate` at most once per step and always before
/// `execute`; it calls `execute` at most once per step — the core itself
/// never retries (§6). `health_check` is never called on the execution
/// path.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Static description of this adapter: its id, version, and the step
    /// types it claims. Called once, at registration time.
    fn manifest(&self) -> AdapterManifest;

    /// Pre-execution check on a step's already-resolved params. Must not
    /// touch any state beyond reading `step`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing why the step is rejected.
    fn validate(&self, step: &Step) -> Result<(), ValidationError>;

    /// Perform the capability and produce a receipt. May suspend on I/O;
    /// this is the only suspension point the core schedules around (§5).
    async fn execute(&self, step: &Step, context: &AdapterContext) -> Receipt;

    /// Cheap liveness probe.
    async fn health_check(&self) -> HealthStatus;
}

/// Errors raised while registering adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Two adapters claim the same step type. The reference policy is
    /// "reject on duplicate" (§3 invariants) — first registration wins
    /// only in the sense that it stays registered; the second is refused.
    #[error("step type `{step_type}` is already claimed by adapter `{existing_adapter}`")]
    DuplicateStepType {
        /// The contested step type.
        step_type: String,
        /// The adapter id that claimed it first.
        existing_adapter: String,
    },
}

/// Maps step-type strings to adapter instances via their manifests (§4.F).
///
/// Configured at construction and not mutated during a run — every engine
/// run shares one registry, never races registration against dispatch.
#[derive(Default)]
pub struct AdapterRegistry {
    by_id: BTreeMap<String, Arc<dyn Adapter>>,
    by_type: BTreeMap<String, String>,
}

impl AdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, indexing every step type in its manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateStepType`] if any step type in the
    /// adapter's manifest is already claimed by a different adapter; in
    /// that case no part of the adapter's manifest is registered.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> Result<(), RegistryError> {
        let manifest = adapter.manifest();
        for descriptor in &manifest.step_types {
            if let Some(existing) = self.by_type.get(&descriptor.step_type) {
                if existing != &manifest.id {
                    return Err(RegistryError::DuplicateStepType {
                        step_type: descriptor.step_type.clone(),
                        existing_adapter: existing.clone(),
                    });
                }
            }
        }
        for descriptor in &manifest.step_types {
            self.by_type
                .insert(descriptor.step_type.clone(), manifest.id.clone());
        }
        self.by_id.insert(manifest.id.clone(), adapter);
        Ok(())
    }

    /// Look up the adapter registered for a step type, if any.
    #[must_use]
    pub fn lookup(&self, step_type: &str) -> Option<&Arc<dyn Adapter>> {
        let id = self.by_type.get(step_type)?;
        self.by_id.get(id)
    }

    /// Whether any adapter claims this step type.
    #[must_use]
    pub fn supports(&self, step_type: &str) -> bool {
        self.by_type.contains_key(step_type)
    }

    /// Manifests of every registered adapter, in id order.
    #[must_use]
    pub fn manifests(&self) -> Vec<AdapterManifest> {
        self.by_id.values().map(|a| a.manifest()).collect()
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether no adapters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
