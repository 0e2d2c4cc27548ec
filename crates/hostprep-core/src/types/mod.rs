//! # Core Type Definitions
//!
//! This module contains the types shared by every stage and the orchestrator:
//! - Verification outcome of a stage (`Verification`)
//! - Error types (`ConfigureError`)
//!
//! ## Failure Model
//!
//! - `apply` and `revert` failures are `ConfigureError` values and abort the run
//! - `verify` never fails; a host that does not match is a `Verification`,
//!   not an error

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// VERIFICATION
// =============================================================================

/// Outcome of a read-only `verify` call on a stage.
///
/// Produced fresh on every call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "message", rename_all = "snake_case")]
pub enum Verification {
    /// The host is configured exactly as the stage would configure it.
    Ok,
    /// The host is not configured. The message names what is missing.
    NotConfigured(String),
    /// The state could not be determined, or is only partly configured.
    Error(String),
}

impl Verification {
    /// Check if the outcome is `Ok`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Verification::Ok)
    }

    /// Get the explanatory message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Verification::Ok => None,
            Verification::NotConfigured(msg) | Verification::Error(msg) => Some(msg),
        }
    }
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verification::Ok => write!(f, "ok"),
            Verification::NotConfigured(msg) => write!(f, "not configured: {}", msg),
            Verification::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while configuring a host.
///
/// - No silent failures
/// - Every message names the path, and where relevant the interface and setting
/// - Nothing here is retried; a host that rejects these operations needs an operator
#[derive(Debug, Error)]
pub enum ConfigureError {
    /// One or more required capabilities are missing.
    #[error("insufficient permissions:\n{}", .0.join("\n"))]
    PermissionDenied(Vec<String>),

    /// A sysfs entry does not exist.
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    /// The kernel rejected a write.
    #[error("write of \"{value}\" to {path} rejected: {reason}")]
    WriteRejected {
        path: String,
        value: u64,
        reason: String,
    },

    /// A sysfs entry exists but could not be read.
    #[error("read of {path} failed: {reason}")]
    ReadFailed { path: String, reason: String },

    /// A sysfs entry held something other than an unsigned decimal.
    #[error("{path} does not contain an unsigned integer: {content:?}")]
    InvalidValue { path: String, content: String },

    /// A sysfs path would exceed PATH_MAX.
    #[error("path for setting `{setting}` on interface `{interface}` exceeds PATH_MAX")]
    PathTooLong { interface: String, setting: String },

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stage name was requested that is not registered.
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// A stage did not reach the state its lifecycle step promised.
    #[error("stage {stage} failed: {reason}")]
    StageFailed { stage: String, reason: String },

    /// An I/O error occurred outside of a sysfs operation.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
