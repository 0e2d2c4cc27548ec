//! # hostprep CLI Module
//!
//! This module implements the CLI interface for hostprep.
//!
//! ## Available Commands
//!
//! - `init` - Configure the host (only what is not configured yet)
//! - `check` - Report whether the host is configured
//! - `fini` - Reset every enabled stage to its defaults
//! - `list` - Show registered stages and whether they apply

mod commands;

use clap::{Parser, Subcommand};
use hostprep_core::{Command, Config, ConfigureError, sysfs::SYSFS_ROOT};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// hostprep - prepare a Linux host for kernel-bypass networking
///
/// Runs a fixed sequence of configuration stages. Each stage is applied,
/// checked and undone independently.
#[derive(Parser, Debug)]
#[command(name = "hostprep")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress the per-stage summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override tiles.net.interface
    #[arg(short, long, global = true)]
    pub interface: Option<String>,

    /// Override tiles.xdp.poll_mode (pref_busy, busy, none)
    #[arg(short, long, global = true)]
    pub poll_mode: Option<String>,

    /// Root of the sysfs tree
    #[arg(long, global = true, default_value = SYSFS_ROOT)]
    pub sysfs_root: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configure the host
    Init {
        /// Stages to run (default: all)
        stages: Vec<String>,
    },

    /// Check whether the host is configured
    Check {
        /// Stages to run (default: all)
        stages: Vec<String>,
    },

    /// Reset host configuration to defaults
    Fini {
        /// Stages to run (default: all)
        stages: Vec<String>,
    },

    /// List stages
    List,
}

// =============================================================================
// CONFIG LOADING
// =============================================================================

/// Build the configuration snapshot: file first, then command line overrides.
pub fn load_config(cli: &Cli) -> Result<Config, ConfigureError> {
    let mut config = match &cli.config {
        Some(path) => Config::read(path)?,
        None => Config::default(),
    };

    if let Some(interface) = &cli.interface {
        config.tiles.net.interface = interface.clone();
    }
    if let Some(poll_mode) = &cli.poll_mode {
        config.tiles.xdp.poll_mode = poll_mode.clone();
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
///
/// Returns `Ok(false)` when the run completed but the host is not configured.
pub fn execute(cli: Cli) -> Result<bool, ConfigureError> {
    let config = load_config(&cli)?;
    let output = Output {
        json_mode: cli.json_mode,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Init { stages } => {
            cmd_configure(Command::Init, &stages, &config, &cli.sysfs_root, output)
        }
        Commands::Check { stages } => {
            cmd_configure(Command::Check, &stages, &config, &cli.sysfs_root, output)
        }
        Commands::Fini { stages } => {
            cmd_configure(Command::Fini, &stages, &config, &cli.sysfs_root, output)
        }
        Commands::List => cmd_list(&config, &cli.sysfs_root, output),
    }
}
