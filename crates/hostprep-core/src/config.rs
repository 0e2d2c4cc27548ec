//! # Configuration
//!
//! The global configuration snapshot every stage reads.
//!
//! Loaded once from TOML before any stage runs and then handed to each
//! lifecycle call as `&Config`. Stages never mutate it.
//!
//! ```toml
//! [tiles.net]
//! interface = "eth0"
//!
//! [tiles.xdp]
//! poll_mode = "pref_busy"
//! ```

use crate::ConfigureError;
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Poll mode that enables preferred busy polling.
pub const POLL_MODE_PREF_BUSY: &str = "pref_busy";

/// Every poll mode the loader accepts.
pub const POLL_MODES: &[&str] = &[POLL_MODE_PREF_BUSY, "busy", "none"];

/// Kernel limit on interface names, including the trailing NUL.
pub const IFNAMSIZ: usize = 16;

// =============================================================================
// CONFIG
// =============================================================================

/// Process-wide configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tiles: TilesConfig,
}

/// Per-tile settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilesConfig {
    pub net: NetConfig,
    pub xdp: XdpConfig,
}

/// Network tile settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetConfig {
    /// Name of the NIC the workload binds to.
    pub interface: String,
}

/// XDP tile settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct XdpConfig {
    /// One of `pref_busy`, `busy` or `none`.
    pub poll_mode: String,
}

impl Default for XdpConfig {
    fn default() -> Self {
        Self {
            poll_mode: "none".to_string(),
        }
    }
}

impl Config {
    /// Create a config for an interface and poll mode.
    #[must_use]
    pub fn new(interface: impl Into<String>, poll_mode: impl Into<String>) -> Self {
        Self {
            tiles: TilesConfig {
                net: NetConfig {
                    interface: interface.into(),
                },
                xdp: XdpConfig {
                    poll_mode: poll_mode.into(),
                },
            },
        }
    }

    /// Parse a config from TOML text without validating it.
    pub fn parse(content: &str) -> Result<Self, ConfigureError> {
        toml::from_str(content).map_err(|e| ConfigureError::InvalidConfig(e.to_string()))
    }

    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigureError> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file without validating it.
    ///
    /// Callers that layer overrides on top validate afterwards.
    pub fn read(path: &Path) -> Result<Self, ConfigureError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigureError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigureError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no stage could act on.
    ///
    /// The interface is only required when a stage will touch it.
    pub fn validate(&self) -> Result<(), ConfigureError> {
        let poll_mode = self.tiles.xdp.poll_mode.as_str();
        if !POLL_MODES.contains(&poll_mode) {
            return Err(ConfigureError::InvalidConfig(format!(
                "tiles.xdp.poll_mode `{}` is not one of {}",
                poll_mode,
                POLL_MODES.join(", ")
            )));
        }

        if poll_mode == POLL_MODE_PREF_BUSY {
            validate_interface(&self.tiles.net.interface)?;
        }
        Ok(())
    }
}

fn validate_interface(name: &str) -> Result<(), ConfigureError> {
    if name.is_empty() {
        return Err(ConfigureError::InvalidConfig(
            "tiles.net.interface must be set".to_string(),
        ));
    }
    if name.len() >= IFNAMSIZ {
        return Err(ConfigureError::InvalidConfig(format!(
            "tiles.net.interface `{}` is longer than {} bytes",
            name,
            IFNAMSIZ - 1
        )));
    }
    if name == "." || name == ".." || name.contains('/') || name.chars().any(char::is_whitespace)
    {
        return Err(ConfigureError::InvalidConfig(format!(
            "tiles.net.interface `{}` is not a valid interface name",
            name
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
