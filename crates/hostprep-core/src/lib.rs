//! # hostprep-core
//!
//! Staged host configuration for low-latency networking - THE LOGIC.
//!
//! A host is prepared by a fixed, ordered list of stages. Each stage knows
//! whether it applies to the current configuration, which capabilities it
//! needs, how to apply and undo its change, and how to check it without
//! touching anything.
//!
//! ## Modules
//!
//! - `types` - verification outcome and error taxonomy
//! - `config` - TOML configuration snapshot
//! - `sysfs` - unsigned integer knobs under `/sys/class/net`
//! - `caps` - capability requirements
//! - `stage` - lifecycle contract and the stages themselves
//! - `configure` - the orchestrator running `init`, `check` and `fini`
//!
//! ## Architectural Constraints
//!
//! - Synchronous and single-threaded; stages run one after another
//! - Stages read `&Config` and never keep it
//! - `apply` and `revert` failures abort the run; `verify` never fails

// =============================================================================
// MODULES
// =============================================================================

pub mod caps;
pub mod config;
pub mod configure;
pub mod stage;
pub mod sysfs;
pub mod types;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use self::caps::{Capability, CapabilitySource, CapsCtx, EffectiveSet, ProcessCaps};
pub use config::{Config, NetConfig, TilesConfig, XdpConfig};
pub use configure::{Command, Configurator, RunReport, StageRegistry, StageReport};
pub use stage::{Stage, StageState, SysfsPoll};
pub use sysfs::Sysfs;
pub use types::{ConfigureError, Verification};
