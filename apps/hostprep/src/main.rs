//! # hostprep
//!
//! Prepares a Linux host for kernel-bypass networking.
//!
//! ## Usage
//!
//! ```bash
//! # Configure everything the config asks for
//! hostprep -c hostprep.toml init
//!
//! # Check a single stage, machine-readable
//! hostprep -c hostprep.toml --json-mode check sysfs-poll
//!
//! # Undo
//! hostprep -c hostprep.toml fini
//! ```

use clap::Parser;
use hostprep::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing — HOSTPREP_LOG_FORMAT=json enables machine-parseable output.
    // Logs go to stderr; stdout carries the report.
    let log_format = std::env::var("HOSTPREP_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "hostprep=debug,hostprep_core=debug"
    } else {
        "hostprep=info,hostprep_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Execute command
    match cli::execute(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
