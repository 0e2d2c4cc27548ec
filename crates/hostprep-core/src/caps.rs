//! # Capability Checks
//!
//! Stages declare the privileges their `apply` and `revert` steps need before
//! anything is written. Missing capabilities are collected, not reported one
//! at a time, so an operator sees the whole list in a single run.
//!
//! The live effective set comes from the `caps` crate (`ProcessCaps`); a
//! fixed `EffectiveSet` stands in where the answer must not depend on who
//! runs the binary.

use crate::ConfigureError;

// =============================================================================
// CAPABILITY
// =============================================================================

/// Linux capabilities stages may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    NetAdmin,
}

impl Capability {
    /// Bit index in the kernel capability mask.
    #[must_use]
    pub const fn bit(&self) -> u32 {
        match self {
            Capability::NetAdmin => 12,
        }
    }

    /// Kernel name of the capability.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Capability::NetAdmin => "CAP_NET_ADMIN",
        }
    }

    fn to_caps(self) -> caps::Capability {
        match self {
            Capability::NetAdmin => caps::Capability::CAP_NET_ADMIN,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// CAPABILITY SOURCES
// =============================================================================

/// Source of truth for which capabilities the process holds.
pub trait CapabilitySource {
    fn has_capability(&self, capability: Capability) -> bool;
}

/// The effective set of the running process, queried from the kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessCaps;

impl CapabilitySource for ProcessCaps {
    fn has_capability(&self, capability: Capability) -> bool {
        // An unreadable set counts as missing, so init/fini report it.
        caps::has_cap(None, caps::CapSet::Effective, capability.to_caps()).unwrap_or_else(|e| {
            tracing::warn!("Cannot determine capability {}: {}", capability, e);
            false
        })
    }
}

/// A fixed effective capability mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectiveSet(pub u64);

impl EffectiveSet {
    /// A set holding every capability.
    #[must_use]
    pub const fn all() -> Self {
        Self(u64::MAX)
    }

    /// A set holding nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// A set holding exactly `capabilities`.
    #[must_use]
    pub fn of(capabilities: &[Capability]) -> Self {
        Self(capabilities.iter().fold(0, |mask, c| mask | (1u64 << c.bit())))
    }
}

impl CapabilitySource for EffectiveSet {
    fn has_capability(&self, capability: Capability) -> bool {
        self.0 & (1u64 << capability.bit()) != 0
    }
}

// =============================================================================
// CAPS CONTEXT
// =============================================================================

/// Collects capability requirements declared by stages.
pub struct CapsCtx<'a> {
    source: &'a dyn CapabilitySource,
    missing: Vec<String>,
}

impl<'a> CapsCtx<'a> {
    /// Create a context that checks against `source`.
    #[must_use]
    pub fn new(source: &'a dyn CapabilitySource) -> Self {
        Self {
            source,
            missing: Vec::new(),
        }
    }

    /// Record that `name` needs `capability` for `reason`.
    pub fn check_capability(&mut self, name: &str, capability: Capability, reason: &str) {
        if self.source.has_capability(capability) {
            return;
        }
        self.missing.push(format!(
            "{} ... process requires capability `{}` to {}",
            name, capability, reason
        ));
    }

    /// Messages for every capability that was missing.
    #[must_use]
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Turn the collected requirements into a result.
    pub fn into_result(self) -> Result<(), ConfigureError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigureError::PermissionDenied(self.missing))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
