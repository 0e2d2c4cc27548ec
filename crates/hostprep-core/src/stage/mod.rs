//! # Stage Module
//!
//! The lifecycle contract every configuration stage implements, and the
//! per-run state a stage moves through.
//!
//! ## Lifecycle
//!
//! | Step | Call | Side effects |
//! |------|------|--------------|
//! | 1 | `enabled` | None. Pure function of the config |
//! | 2 | `declare_permissions` | Records requirements in a [`CapsCtx`] |
//! | 3 | `apply` | Privileged writes. Idempotent |
//! | 4 | `verify` | None. Read-only |
//! | 5 | `revert` | Privileged writes back to defaults |
//!
//! `declare_permissions` covers both `apply` and `revert`.

mod sysfs_poll;

pub use sysfs_poll::*;

use crate::{CapsCtx, Config, ConfigureError, Verification};
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE TRAIT
// =============================================================================

/// One unit of idempotent host configuration.
///
/// Implementations hold only immutable collaborators. The config is passed
/// into every call and is never stored.
pub trait Stage {
    /// Identifier used on the command line and in capability messages.
    fn name(&self) -> &'static str;

    /// Whether this stage applies to `config`. Must not fail or touch the host.
    fn enabled(&self, config: &Config) -> bool;

    /// Declare the capabilities `apply` and `revert` need.
    fn declare_permissions(&self, caps: &mut CapsCtx<'_>, config: &Config);

    /// Configure the host. Running it twice leaves the same state as once.
    fn apply(&self, config: &Config) -> Result<(), ConfigureError>;

    /// Report whether the host is configured. Never mutates anything.
    fn verify(&self, config: &Config) -> Verification;

    /// Return the host to defaults.
    ///
    /// `was_pre_init` is true when the orchestrator is clearing state that
    /// existed before this run, ahead of an `apply`. Stages may ignore it.
    fn revert(&self, config: &Config, was_pre_init: bool) -> Result<(), ConfigureError>;
}

// =============================================================================
// STAGE STATE
// =============================================================================

/// Where a stage is within one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Unchecked,
    Applicable,
    Skipped,
    PermissionsDeclared,
    Applied,
    Verified(Verification),
    Reverted,
    Failed,
}

impl StageState {
    /// Check whether moving to `next` is a legal step.
    #[must_use]
    pub fn can_transition(&self, next: &StageState) -> bool {
        use StageState::*;

        if matches!(next, Failed) {
            return !self.is_terminal();
        }

        match (self, next) {
            (Unchecked, Applicable | Skipped) => true,
            // `check` verifies without declaring permissions
            (Applicable, PermissionsDeclared | Verified(_)) => true,
            (PermissionsDeclared, Verified(_) | Applied | Reverted) => true,
            (Verified(_), Applied | Reverted | Verified(_)) => true,
            (Applied, Verified(_) | Reverted) => true,
            // pre-existing partial state is reverted before apply
            (Reverted, Applied | Verified(_)) => true,
            _ => false,
        }
    }

    /// Move to `next`, rejecting steps the lifecycle does not allow.
    pub fn transition(&mut self, stage: &str, next: StageState) -> Result<(), ConfigureError> {
        if !self.can_transition(&next) {
            return Err(ConfigureError::StageFailed {
                stage: stage.to_string(),
                reason: format!("illegal transition {:?} -> {:?}", self, next),
            });
        }
        tracing::debug!(stage, from = ?self, to = ?next, "stage transition");
        *self = next;
        Ok(())
    }

    /// Skipped and Failed end a stage's run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Skipped | StageState::Failed)
    }
}

impl std::fmt::Display for StageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageState::Unchecked => write!(f, "unchecked"),
            StageState::Applicable => write!(f, "applicable"),
            StageState::Skipped => write!(f, "skipped"),
            StageState::PermissionsDeclared => write!(f, "permissions declared"),
            StageState::Applied => write!(f, "applied"),
            StageState::Verified(v) => write!(f, "verified ({})", v),
            StageState::Reverted => write!(f, "reverted"),
            StageState::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
