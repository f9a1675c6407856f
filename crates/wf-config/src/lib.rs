// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the workflow engine.
//!
//! This crate provides [`EngineConfig`] — the top-level runtime settings a
//! host reads before building an [`wf_runtime::Engine`] — together with
//! helpers for loading from TOML files, merging overlays, and producing
//! advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wf_resource::ResourceLimits;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },

    /// Two configs could not be merged because of conflicting constraints.
    #[error("merge conflict: {reason}")]
    MergeConflict {
        /// Description of the conflict.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A deprecated field was used in the configuration.
    DeprecatedField {
        /// Name of the deprecated field.
        field: String,
        /// Suggested replacement, if any.
        suggestion: Option<String>,
    },
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// An adapter timeout is unusually large.
    LargeTimeout {
        /// Adapter name.
        adapter: String,
        /// Timeout value in seconds.
        secs: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::DeprecatedField { field, suggestion } => {
                write!(f, "deprecated field '{field}'")?;
                if let Some(s) = suggestion {
                    write!(f, " — use '{s}' instead")?;
                }
                Ok(())
            }
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { adapter, secs } => {
                write!(f, "adapter '{adapter}' has a large timeout ({secs}s)")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for the workflow engine.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct EngineConfig {
    /// Default per-step timeout in milliseconds, used when a step does not
    /// declare `resource_requirements.timeout_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<u64>,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Directory for persisting receipt JSON files. Purely a host-side
    /// concern — the engine itself holds receipts only in memory (§4.D).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipts_dir: Option<String>,

    /// Pool-wide resource limits enforced across concurrently dispatched
    /// steps.
    #[serde(default)]
    pub resource_limits: ResourceLimits,

    /// Named adapter definitions, keyed by adapter id.
    #[serde(default)]
    pub adapters: BTreeMap<String, AdapterSource>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: None,
            log_level: Some("info".into()),
            receipts_dir: None,
            resource_limits: ResourceLimits::default(),
            adapters: BTreeMap::new(),
        }
    }
}

/// Declares how a single adapter should be constructed and registered.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum AdapterSource {
    /// An in-process mock adapter (for testing and demos).
    #[serde(rename = "mock")]
    Mock {},
    /// An external process adapter, invoked once per step over stdio JSON.
    #[serde(rename = "process")]
    Process {
        /// Command to spawn.
        command: String,
        /// Extra CLI arguments.
        #[serde(default)]
        args: Vec<String>,
        /// Step types this adapter instance claims.
        #[serde(default)]
        step_types: Vec<String>,
        /// Optional timeout in seconds (1..=86,400).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_secs: Option<u64>,
    },
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed timeout in seconds (24 hours).
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Threshold above which a timeout generates a warning.
const LARGE_TIMEOUT_THRESHOLD: u64 = 3_600;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load an [`EngineConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`EngineConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] if `path` is `Some` and the file
/// cannot be read, or [`ConfigError::ParseError`] if its contents are not
/// valid TOML for this shape.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => EngineConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into an [`EngineConfig`].
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] if `content` is not valid TOML for
/// this shape.
pub fn parse_toml(content: &str) -> Result<EngineConfig, ConfigError> {
    toml::from_str::<EngineConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `WF_DEFAULT_TIMEOUT_MS`
/// - `WF_LOG_LEVEL`
/// - `WF_RECEIPTS_DIR`
pub fn apply_env_overrides(config: &mut EngineConfig) {
    if let Ok(val) = std::env::var("WF_DEFAULT_TIMEOUT_MS")
        && let Ok(parsed) = val.parse::<u64>()
    {
        config.default_timeout_ms = Some(parsed);
    }
    if let Ok(val) = std::env::var("WF_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Ok(val) = std::env::var("WF_RECEIPTS_DIR") {
        config.receipts_dir = Some(val);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (empty process commands, out-of-range timeouts, adapters
/// with no claimed step types) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if any hard rule is violated.
pub fn validate_config(config: &EngineConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    for (name, adapter) in &config.adapters {
        if name.is_empty() {
            errors.push("adapter name must not be empty".into());
        }

        match adapter {
            AdapterSource::Process {
                command,
                step_types,
                timeout_secs,
                ..
            } => {
                if command.trim().is_empty() {
                    errors.push(format!("adapter '{name}': process command must not be empty"));
                }
                if step_types.is_empty() {
                    errors.push(format!("adapter '{name}': process adapter claims no step types"));
                }
                if let Some(t) = timeout_secs {
                    if *t == 0 || *t > MAX_TIMEOUT_SECS {
                        errors.push(format!(
                            "adapter '{name}': timeout {t}s out of range (1..{MAX_TIMEOUT_SECS})"
                        ));
                    } else if *t > LARGE_TIMEOUT_THRESHOLD {
                        warnings.push(ConfigWarning::LargeTimeout {
                            adapter: name.clone(),
                            secs: *t,
                        });
                    }
                }
            }
            AdapterSource::Mock {} => {}
        }
    }

    if config.adapters.is_empty() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "adapters".into(),
            hint: "no adapters configured; every step type will be rejected".into(),
        });
    }
    if config.receipts_dir.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "receipts_dir".into(),
            hint: "receipts will not be persisted to disk".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over `base`.
///
/// Adapter maps are combined; on name collisions the overlay entry wins.
/// Resource limits are merged dimension-by-dimension, overlay wins per
/// dimension where it sets a value.
#[must_use]
pub fn merge_configs(base: EngineConfig, overlay: EngineConfig) -> EngineConfig {
    let mut adapters = base.adapters;
    adapters.extend(overlay.adapters);
    EngineConfig {
        default_timeout_ms: overlay.default_timeout_ms.or(base.default_timeout_ms),
        log_level: overlay.log_level.or(base.log_level),
        receipts_dir: overlay.receipts_dir.or(base.receipts_dir),
        resource_limits: ResourceLimits {
            max_ram_mb: overlay.resource_limits.max_ram_mb.or(base.resource_limits.max_ram_mb),
            max_gpu_slots: overlay
                .resource_limits
                .max_gpu_slots
                .or(base.resource_limits.max_gpu_slots),
            max_qubits: overlay.resource_limits.max_qubits.or(base.resource_limits.max_qubits),
            max_gas_limit: overlay
                .resource_limits
                .max_gas_limit
                .or(base.resource_limits.max_gas_limit),
        },
        adapters,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
