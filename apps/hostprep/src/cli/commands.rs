//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use hostprep_core::{
    Command, Config, ConfigureError, Configurator, ProcessCaps, RunReport, StageRegistry, Sysfs,
};
use std::path::Path;

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json_mode: bool,
    pub quiet: bool,
}

// =============================================================================
// INIT / CHECK / FINI
// =============================================================================

/// Run a configure command over the selected stages.
pub fn cmd_configure(
    command: Command,
    stages: &[String],
    config: &Config,
    sysfs_root: &Path,
    output: Output,
) -> Result<bool, ConfigureError> {
    let registry = StageRegistry::standard(Sysfs::new(sysfs_root));

    let source = ProcessCaps;

    tracing::info!(
        "{} on interface `{}` (poll mode {})",
        command,
        config.tiles.net.interface,
        config.tiles.xdp.poll_mode
    );

    let report = Configurator::new(&registry, &source).run(command, stages, config)?;
    print_report(&report, output);
    Ok(report.success)
}

fn print_report(report: &RunReport, output: Output) {
    if output.json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
        return;
    }
    if output.quiet {
        return;
    }

    println!("hostprep {}", report.command);
    println!("=============");
    for stage in &report.stages {
        match &stage.detail {
            Some(detail) => println!("  {:<12} {} - {}", stage.name, stage.state, detail),
            None => println!("  {:<12} {}", stage.name, stage.state),
        }
    }
    println!();
    println!("Result: {}", if report.success { "ok" } else { "not configured" });
}

// =============================================================================
// LIST COMMAND
// =============================================================================

/// List registered stages and whether each applies to the config.
pub fn cmd_list(config: &Config, sysfs_root: &Path, output: Output) -> Result<bool, ConfigureError> {
    let registry = StageRegistry::standard(Sysfs::new(sysfs_root));

    if output.json_mode {
        let stages: Vec<_> = registry
            .iter()
            .map(|s| {
                serde_json::json!({
                    "name": s.name(),
                    "enabled": s.enabled(config),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&stages).unwrap_or_default()
        );
        return Ok(true);
    }

    println!("Stages");
    println!("======");
    for stage in registry.iter() {
        let status = if stage.enabled(config) {
            "enabled"
        } else {
            "disabled"
        };
        println!("  {:<12} {}", stage.name(), status);
    }
    Ok(true)
}
