// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Schema-driven structural validation for workflow and receipt documents
//! (§4.A).
//!
//! Rather than hand-writing a validator per document shape, every document
//! is checked by one recursive walk ([`validate`]) keyed on a [`Schema`]
//! value describing the expected structure. [`workflow_schema`] and
//! [`receipt_schema`] describe the §3 wire shapes; [`validate_workflow_doc`]
//! and [`validate_receipt_doc`] additionally apply the handful of
//! cross-field rules (conditional requiredness on `status`) that a purely
//! structural schema can't express.

use serde_json::Value;
use wf_error::{ErrorInfo, ErrorKind};

/// One node of a structural schema.
#[derive(Debug, Clone)]
pub enum Schema {
    /// A JSON string.
    String,
    /// A JSON number with no fractional component.
    Integer,
    /// A JSON boolean.
    Boolean,
    /// A JSON string restricted to one of a fixed set of values.
    Enum(Vec<&'static str>),
    /// A JSON object with a fixed, named field list. Fields absent from
    /// this list are present in the document but not validated — §3
    /// requires unrecognized `resource_requirements` options be ignored,
    /// not rejected, and the same tolerance is extended to every mapping.
    Mapping(Vec<Field>),
    /// A JSON object whose keys are unconstrained strings, each mapping
    /// to a value satisfying the same inner schema (used for `params` and
    /// `output`, which are `mapping string -> any`).
    Map(Box<Schema>),
    /// A JSON array whose elements all satisfy the same inner schema.
    Sequence(Box<Schema>),
    /// Any JSON value at all — used for the opaque leaves of `params`,
    /// `output`, and informational param schemas.
    Any,
}

/// A named, possibly-required field inside a [`Schema::Mapping`].
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name as it appears in the JSON object.
    pub name: &'static str,
    /// Schema the field's value must satisfy, if present.
    pub schema: Schema,
    /// Whether the document is invalid if this field is absent.
    pub required: bool,
}

impl Field {
    /// Construct a required field.
    #[must_use]
    pub fn required(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: true,
        }
    }

    /// Construct an optional field.
    #[must_use]
    pub fn optional(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: false,
        }
    }
}

/// A structural validation failure: a human message and a JSON-path-style
/// location (e.g. `steps[2].params.x`), joined with `.` for object fields
/// and `[i]` for array indices, rooted at the empty path.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} at {path}")]
pub struct SchemaError {
    /// Human-readable description of the mismatch.
    pub message: String,
    /// Location of the offending value.
    pub path: String,
}

impl SchemaError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() {
                "<root>".to_string()
            } else {
                path.to_string()
            },
            message: message.into(),
        }
    }
}

fn join_field(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn join_index(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

/// Recursively check `value` against `schema`, starting at `path`.
///
/// # Errors
///
/// Returns a [`SchemaError`] describing the first mismatch found, depth
/// first, in field-declaration order.
pub fn validate(value: &Value, schema: &Schema, path: &str) -> Result<(), SchemaError> {
    match schema {
        Schema::Any => Ok(()),
        Schema::String => {
            if value.is_string() {
                Ok(())
            } else {
                Err(SchemaError::new(path, "expected a string"))
            }
        }
        Schema::Integer => match value.as_i64().or_else(|| value.as_u64().map(|n| n as i64)) {
            Some(_) => Ok(()),
            None => Err(SchemaError::new(path, "expected an integer")),
        },
        Schema::Boolean => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(SchemaError::new(path, "expected a boolean"))
            }
        }
        Schema::Enum(variants) => match value.as_str() {
            Some(s) if variants.contains(&s) => Ok(()),
            Some(s) => Err(SchemaError::new(
                path,
                format!("`{s}` is not one of {variants:?}"),
            )),
            None => Err(SchemaError::new(path, "expected a string")),
        },
        Schema::Mapping(fields) => {
            let Some(object) = value.as_object() else {
                return Err(SchemaError::new(path, "expected an object"));
            };
            for field in fields {
                match object.get(field.name) {
                    Some(v) => validate(v, &field.schema, &join_field(path, field.name))?,
                    None if field.required => {
                        return Err(SchemaError::new(
                            path,
                            format!("missing required field `{}`", field.name),
                        ));
                    }
                    None => {}
                }
            }
            Ok(())
        }
        Schema::Map(inner) => {
            let Some(object) = value.as_object() else {
                return Err(SchemaError::new(path, "expected an object"));
            };
            for (key, v) in object {
                validate(v, inner, &join_field(path, key))?;
            }
            Ok(())
        }
        Schema::Sequence(inner) => {
            let Some(items) = value.as_array() else {
                return Err(SchemaError::new(path, "expected an array"));
            };
            for (index, item) in items.iter().enumerate() {
                validate(item, inner, &join_index(path, index))?;
            }
            Ok(())
        }
    }
}

fn resource_requirements_schema() -> Schema {
    Schema::Mapping(vec![
        Field::optional("ram_mb", Schema::Integer),
        Field::optional("gpu", Schema::Boolean),
        Field::optional("qubits", Schema::Integer),
        Field::optional("gas_limit", Schema::Integer),
        Field::optional("timeout_ms", Schema::Integer),
    ])
}

fn step_schema() -> Schema {
    Schema::Mapping(vec![
        Field::required("id", Schema::String),
        Field::required("type", Schema::String),
        Field::optional("params", Schema::Map(Box::new(Schema::Any))),
        Field::optional(
            "parent_step_ids",
            Schema::Sequence(Box::new(Schema::String)),
        ),
        Field::optional("resource_requirements", resource_requirements_schema()),
    ])
}

/// Structural schema for a workflow document (§3, §6).
#[must_use]
pub fn workflow_schema() -> Schema {
    Schema::Mapping(vec![
        Field::required("workflow", Schema::String),
        Field::optional("version", Schema::String),
        Field::required("steps", Schema::Sequence(Box::new(step_schema()))),
    ])
}

fn receipt_error_schema() -> Schema {
    Schema::Mapping(vec![
        Field::required("code", Schema::String),
        Field::required("message", Schema::String),
        Field::required("retryable", Schema::Boolean),
    ])
}

fn execution_metadata_schema() -> Schema {
    Schema::Mapping(vec![
        Field::required("timestamp", Schema::String),
        Field::required("latency_ms", Schema::Integer),
        Field::optional("adapter_version", Schema::String),
    ])
}

/// Structural schema for a receipt document (§3, §6).
///
/// `merkle_proof` is optional here even though the wire format calls it
/// required: the executor validates a receipt against this schema *before*
/// the receipt store has had a chance to fill the field in (§4.H runs
/// before §4.D).
#[must_use]
pub fn receipt_schema() -> Schema {
    Schema::Mapping(vec![
        Field::required("step_id", Schema::String),
        Field::required("status", Schema::Enum(vec!["success", "error", "degraded"])),
        Field::optional("output", Schema::Map(Box::new(Schema::Any))),
        Field::optional("error", receipt_error_schema()),
        Field::required("execution_metadata", execution_metadata_schema()),
        Field::optional("merkle_proof", Schema::String),
    ])
}

/// Validate a workflow document, returning a classified
/// [`ErrorKind::WorkflowSchemaInvalid`] error on the first mismatch.
///
/// # Errors
///
/// See above.
pub fn validate_workflow_doc(value: &Value) -> Result<(), ErrorInfo> {
    validate(value, &workflow_schema(), "").map_err(|e| {
        ErrorInfo::new(ErrorKind::WorkflowSchemaInvalid, e.message).with_path(e.path)
    })
}

/// Validate a receipt document: structural schema plus the status-
/// conditional rules §3/§6 describe (`output` required on
/// success/degraded, `error.*` required on error) that a pure structural
/// schema can't express. Returns a classified [`ErrorKind::InvalidReceipt`]
/// error on the first mismatch.
///
/// # Errors
///
/// See above.
pub fn validate_receipt_doc(value: &Value) -> Result<(), ErrorInfo> {
    validate(value, &receipt_schema(), "")
        .map_err(|e| ErrorInfo::new(ErrorKind::InvalidReceipt, e.message).with_path(e.path))?;

    let object = value.as_object().expect("validated as object above");
    let status = object.get("status").and_then(Value::as_str).unwrap_or("");
    match status {
        "success" | "degraded" => {
            if !object.contains_key("output") {
                return Err(ErrorInfo::new(
                    ErrorKind::InvalidReceipt,
                    "output is required when status is success or degraded",
                )
                .with_path("output"));
            }
        }
        "error" => {
            if !object.contains_key("error") {
                return Err(ErrorInfo::new(
                    ErrorKind::InvalidReceipt,
                    "error is required when status is error",
                )
                .with_path("error"));
            }
        }
        _ => {}
    }
    Ok(())
}
