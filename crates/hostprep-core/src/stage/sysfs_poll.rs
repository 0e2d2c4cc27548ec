//! # sysfs-poll
//!
//! Configures the kernel for preferred busy polling on the workload's NIC,
//! which lets the XDP path poll for packets instead of waiting on interrupts.
//!
//! Three knobs under `/sys/class/net/<interface>/` are raised to
//! [`VERY_HIGH_VAL`] by `apply` and reset to zero by `revert`.

use crate::config::POLL_MODE_PREF_BUSY;
use crate::{Capability, CapsCtx, Config, ConfigureError, Stage, Sysfs, Verification};

/// Stage identifier.
pub const SYSFS_POLL: &str = "sysfs-poll";

/// Value written by `apply`. Large enough that the kernel never hits the limit.
pub const VERY_HIGH_VAL: u64 = 1_000_000_000;

/// Value written by `revert`.
pub const DEFAULT_VAL: u64 = 0;

/// The knobs this stage owns, in the order they are written and checked.
pub const SETTINGS: [&str; 3] = [
    "napi_defer_hard_irqs",
    "gro_flush_timeout",
    "irq_suspend_timeout",
];

const ENOENT_MSG: &str = "Interface not found or XDP preferred busy polling not supported:";

/// Preferred busy polling stage.
#[derive(Debug, Clone, Default)]
pub struct SysfsPoll {
    sysfs: Sysfs,
}

impl SysfsPoll {
    /// Create the stage over a sysfs tree.
    #[must_use]
    pub fn new(sysfs: Sysfs) -> Self {
        Self { sysfs }
    }

    fn set(&self, interface: &str, setting: &str, value: u64) -> Result<(), ConfigureError> {
        let path = self.sysfs.net_path(interface, setting)?;
        tracing::info!("RUN: `echo \"{}\" > {}`", value, path.display());
        self.sysfs.write_uint_value(&path, value)
    }

    fn set_all(&self, config: &Config, value: u64) -> Result<(), ConfigureError> {
        let interface = config.tiles.net.interface.as_str();
        for setting in SETTINGS {
            self.set(interface, setting, value)?;
        }
        Ok(())
    }
}

impl Stage for SysfsPoll {
    fn name(&self) -> &'static str {
        SYSFS_POLL
    }

    fn enabled(&self, config: &Config) -> bool {
        config.tiles.xdp.poll_mode == POLL_MODE_PREF_BUSY
    }

    fn declare_permissions(&self, caps: &mut CapsCtx<'_>, _config: &Config) {
        caps.check_capability(
            SYSFS_POLL,
            Capability::NetAdmin,
            "configure preferred busy polling via `/sys/class/net/*/{napi_defer_hard_irqs, gro_flush_timeout, irq_suspend_timeout}`",
        );
    }

    fn apply(&self, config: &Config) -> Result<(), ConfigureError> {
        self.set_all(config, VERY_HIGH_VAL)
    }

    fn verify(&self, config: &Config) -> Verification {
        let interface = config.tiles.net.interface.as_str();

        for setting in SETTINGS {
            let path = match self.sysfs.net_path(interface, setting) {
                Ok(path) => path,
                Err(e) => return Verification::Error(e.to_string()),
            };

            match self.sysfs.read_uint_value(&path) {
                Ok(VERY_HIGH_VAL) => {}
                Ok(value) => {
                    return Verification::NotConfigured(format!(
                        "Setting {} failed. {} is {} but expected {}. Interface `{}` may not exist or the kernel/driver may not support preferred busy polling.",
                        setting,
                        path.display(),
                        value,
                        VERY_HIGH_VAL,
                        interface
                    ));
                }
                Err(ConfigureError::PathNotFound { path }) => {
                    return Verification::NotConfigured(format!(
                        "{} {}. Setting {} failed.",
                        ENOENT_MSG, path, setting
                    ));
                }
                Err(e) => return Verification::Error(e.to_string()),
            }
        }

        Verification::Ok
    }

    fn revert(&self, config: &Config, _was_pre_init: bool) -> Result<(), ConfigureError> {
        self.set_all(config, DEFAULT_VAL)
    }
}

// =============================================================================
// TESTS
// =============================================================================
