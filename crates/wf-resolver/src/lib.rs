// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Pure `$stepId[.path]` reference resolution (§4.E).
//!
//! A value tree is copied leaf by leaf. A leaf that is a string matching
//! `^\$[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z0-9_]+)*$` is a reference token: the
//! segment after `$` selects a completed step's recorded output, and each
//! subsequent `.segment` navigates into a nested object field. Every other
//! scalar passes through unchanged; arrays and objects recurse. Resolution
//! touches no state beyond its two arguments — same inputs always produce
//! the same output tree.

use std::collections::HashMap;

use serde_json::{Map, Value};
use wf_error::{ErrorInfo, ErrorKind};

/// Parse `token` as a reference if it matches the full reference grammar;
/// returns the step id and the (possibly empty) sequence of path segments.
/// Not a reference (including partial-string interpolation attempts) if
/// `None`.
#[must_use]
pub fn parse_reference(token: &str) -> Option<(&str, Vec<&str>)> {
    let rest = token.strip_prefix('$')?;
    let mut parts = rest.split('.');
    let step_id = parts.next()?;
    if step_id.is_empty() || !is_ident_start(step_id) {
        return None;
    }
    let mut segments = Vec::new();
    for segment in parts {
        if segment.is_empty() || !is_ident_segment(segment) {
            return None;
        }
        segments.push(segment);
    }
    Some((step_id, segments))
}

fn is_ident_start(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn is_ident_segment(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Resolve every reference token in `value` against `outputs` (step id to
/// that step's recorded output), recursing through arrays and objects.
///
/// # Errors
///
/// Returns [`ErrorKind::ReferenceUnresolved`] if a reference token's step id
/// has no recorded output, or a path segment does not navigate to an
/// existing object field.
pub fn resolve(value: &Value, outputs: &HashMap<String, Value>) -> Result<Value, ErrorInfo> {
    match value {
        Value::String(s) => match parse_reference(s) {
            Some((step_id, segments)) => resolve_reference(s, step_id, &segments, outputs),
            None => Ok(value.clone()),
        },
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve(item, outputs)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                out.insert(key.clone(), resolve(val, outputs)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_reference(
    token: &str,
    step_id: &str,
    segments: &[&str],
    outputs: &HashMap<String, Value>,
) -> Result<Value, ErrorInfo> {
    let mut current = outputs.get(step_id).ok_or_else(|| {
        ErrorInfo::new(
            ErrorKind::ReferenceUnresolved,
            format!("reference `{token}` points at step `{step_id}`, which has no output"),
        )
    })?;
    for segment in segments {
        current = current.get(segment).ok_or_else(|| {
            ErrorInfo::new(
                ErrorKind::ReferenceUnresolved,
                format!("reference `{token}` has no field `{segment}` on step `{step_id}`'s output"),
            )
        })?;
    }
    Ok(current.clone())
}
