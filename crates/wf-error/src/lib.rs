// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Closed error taxonomy for the workflow engine.
//!
//! Every code raised by the core follows the pattern `WF-X###` where `X` is
//! the owning component letter from the system overview and `###` is a
//! three-digit number:
//!
//! - **A** — schema validator
//! - **B** — DAG builder
//! - **E** — reference resolver
//! - **F** — adapter registry
//! - **G** — scheduler
//! - **H** — executor

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Enumeration of every error kind the core itself may raise.
///
/// Adapter-specific errors are opaque strings and are not members of this
/// enum — they surface through [`ErrorInfo::context`] or a receipt's
/// `error.message` untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Structural violation in the workflow document.
    WorkflowSchemaInvalid,
    /// The DAG contains a cycle.
    WorkflowCyclic,
    /// `parent_step_ids` references an unknown step.
    WorkflowBadParent,
    /// No registered adapter claims `step.type`.
    NoAdapterForType,
    /// The adapter's `validate` call rejected the step's params.
    StepValidationFailed,
    /// The resource policy rejected the step.
    ResourceUnavailable,
    /// The adapter exceeded its step timeout.
    ExecutionTimeout,
    /// The adapter returned a receipt that failed schema validation.
    InvalidReceipt,
    /// A `$stepId[.path]` reference points at a missing output or field.
    ReferenceUnresolved,
    /// The adapter failed unexpectedly (panicked, returned an opaque error).
    AdapterException,
}

impl ErrorKind {
    /// Machine-readable code string, e.g. `"WF-B001"`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::WorkflowSchemaInvalid => "WF-A001",
            Self::WorkflowCyclic => "WF-B001",
            Self::WorkflowBadParent => "WF-B002",
            Self::ReferenceUnresolved => "WF-E001",
            Self::NoAdapterForType => "WF-F001",
            Self::StepValidationFailed => "WF-G001",
            Self::ResourceUnavailable => "WF-G002",
            Self::ExecutionTimeout => "WF-H001",
            Self::InvalidReceipt => "WF-H002",
            Self::AdapterException => "WF-H003",
        }
    }

    /// Owning component letter, matching the system overview table.
    #[must_use]
    pub fn component(&self) -> &'static str {
        match self {
            Self::WorkflowSchemaInvalid => "A",
            Self::WorkflowCyclic | Self::WorkflowBadParent => "B",
            Self::ReferenceUnresolved => "E",
            Self::NoAdapterForType => "F",
            Self::StepValidationFailed | Self::ResourceUnavailable => "G",
            Self::ExecutionTimeout | Self::InvalidReceipt | Self::AdapterException => "H",
        }
    }

    /// Whether a receipt for this kind defaults `retryable` to `true`.
    ///
    /// Only [`Self::ExecutionTimeout`] does; every kind is terminal for the
    /// run regardless — there is no engine-level retry loop (see
    /// `DESIGN.md`, "Retryable step receipts are terminal").
    #[must_use]
    pub fn default_retryable(&self) -> bool {
        matches!(self, Self::ExecutionTimeout)
    }

    /// Short human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::WorkflowSchemaInvalid => "structural violation in workflow document",
            Self::WorkflowCyclic => "dependency graph contains a cycle",
            Self::WorkflowBadParent => "parent_step_ids references an unknown step",
            Self::NoAdapterForType => "no registered adapter claims this step type",
            Self::StepValidationFailed => "adapter validate() rejected the step params",
            Self::ResourceUnavailable => "resource policy rejected the step",
            Self::ExecutionTimeout => "adapter exceeded its step timeout",
            Self::InvalidReceipt => "adapter returned a receipt failing schema validation",
            Self::ReferenceUnresolved => "reference token resolves to a missing output or field",
            Self::AdapterException => "adapter failed unexpectedly",
        }
    }

    /// All ten members, in system-overview order.
    #[must_use]
    pub fn all() -> &'static [ErrorKind] {
        &[
            Self::WorkflowSchemaInvalid,
            Self::WorkflowCyclic,
            Self::WorkflowBadParent,
            Self::NoAdapterForType,
            Self::StepValidationFailed,
            Self::ResourceUnavailable,
            Self::ExecutionTimeout,
            Self::InvalidReceipt,
            Self::ReferenceUnresolved,
            Self::AdapterException,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::error::Error for ErrorKind {}

/// Rich error value: an [`ErrorKind`], a human message, an optional
/// JSON-path-style location, and structured key-value context.
#[derive(Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// The catalog error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// JSON-path-style location within the document being validated, e.g.
    /// `steps[2].params.x`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Arbitrary key-value context, kept in sorted order for determinism.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl ErrorInfo {
    /// Start building an [`ErrorInfo`] for the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a JSON-path-style location.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a key-value context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.code(), self.message)?;
        if let Some(path) = &self.path {
            write!(f, " at {path}")?;
        }
        if !self.context.is_empty() {
            write!(f, " (")?;
            for (i, (k, v)) in self.context.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k}={v}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorInfo")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("path", &self.path)
            .field("context", &self.context)
            .finish()
    }
}

impl std::error::Error for ErrorInfo {}

/// Top-level error type threaded through the engine crates.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A classified, catalog error.
    #[error(transparent)]
    Classified(#[from] ErrorInfo),
    /// JSON (de)serialization failed before a kind could be assigned.
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Shorthand for constructing a classified error.
    #[must_use]
    pub fn kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Classified(ErrorInfo::new(kind, message))
    }

    /// The [`ErrorKind`], if this error has been classified.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Classified(info) => Some(info.kind),
            Self::Json(_) => None,
        }
    }
}

/// Static lookup table over the closed set of [`ErrorKind`] values.
pub struct ErrorCatalog;

impl ErrorCatalog {
    /// Look up a kind by its code string, e.g. `"WF-B001"`.
    #[must_use]
    pub fn lookup(code: &str) -> Option<ErrorKind> {
        ErrorKind::all().iter().copied().find(|k| k.code() == code)
    }

    /// All ten kinds.
    #[must_use]
    pub fn all() -> &'static [ErrorKind] {
        ErrorKind::all()
    }

    /// All kinds owned by a given component letter (e.g. `"G"`).
    #[must_use]
    pub fn by_component(component: &str) -> Vec<ErrorKind> {
        ErrorKind::all()
            .iter()
            .copied()
            .filter(|k| k.component() == component)
            .collect()
    }
}
