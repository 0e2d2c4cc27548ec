//! # Configure
//!
//! Runs `init`, `check` or `fini` over an ordered selection of stages.
//!
//! ## Run Sequence
//!
//! 1. Select stages by name (registry order; reversed for `fini`)
//! 2. Skip stages whose `enabled` is false
//! 3. For `init` and `fini`, collect every stage's capability requirements and
//!    abort before any write if one is missing
//! 4. Run the command on each remaining stage, one after another
//!
//! `init` first asks each stage whether it is already configured, and rolls
//! back stages applied earlier in the same run if a later stage fails.
//! `fini` reverts every enabled stage whatever its current state.

use crate::{
    CapabilitySource, CapsCtx, Config, ConfigureError, Stage, StageState, Sysfs, SysfsPoll,
    Verification,
};
use serde::{Deserialize, Serialize};

/// Stage selector meaning every registered stage.
pub const ALL_STAGES: &str = "all";

// =============================================================================
// COMMAND
// =============================================================================

/// What a run does to the selected stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Configure every stage that is not already configured.
    Init,
    /// Report whether every stage is configured.
    Check,
    /// Reset every stage to its defaults, including partially applied ones.
    Fini,
}

impl Command {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::Check => "check",
            Command::Fini => "fini",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// STAGE REGISTRY
// =============================================================================

/// Fixed, ordered set of stages built at startup.
#[derive(Default)]
pub struct StageRegistry {
    stages: Vec<Box<dyn Stage>>,
}

impl StageRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stages hostprep ships with, over the given sysfs tree.
    #[must_use]
    pub fn standard(sysfs: Sysfs) -> Self {
        Self::new().with_stage(Box::new(SysfsPoll::new(sysfs)))
    }

    /// Append a stage. Order of registration is order of execution.
    #[must_use]
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Names of every registered stage, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Iterate over registered stages in order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Stage> {
        self.stages.iter().map(|s| &**s)
    }

    /// Resolve stage names to stages, keeping registry order.
    ///
    /// An empty selection or `all` selects every stage.
    pub fn select(&self, names: &[String]) -> Result<Vec<&dyn Stage>, ConfigureError> {
        if names.is_empty() || names.iter().any(|n| n == ALL_STAGES) {
            return Ok(self.iter().collect());
        }

        if let Some(unknown) = names
            .iter()
            .find(|n| !self.stages.iter().any(|s| s.name() == n.as_str()))
        {
            return Err(ConfigureError::UnknownStage(unknown.clone()));
        }

        Ok(self
            .iter()
            .filter(|s| names.iter().any(|n| n == s.name()))
            .collect())
    }
}

// =============================================================================
// REPORTS
// =============================================================================

/// Final state of one stage after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub name: String,
    pub state: StageState,
    pub detail: Option<String>,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub command: Command,
    pub stages: Vec<StageReport>,
    pub success: bool,
}

struct Entry<'r> {
    stage: &'r dyn Stage,
    state: StageState,
    detail: Option<String>,
    applied: bool,
}

impl<'r> Entry<'r> {
    fn new(stage: &'r dyn Stage) -> Self {
        Self {
            stage,
            state: StageState::Unchecked,
            detail: None,
            applied: false,
        }
    }

    fn name(&self) -> &'static str {
        self.stage.name()
    }

    fn advance(&mut self, next: StageState) -> Result<(), ConfigureError> {
        self.state.transition(self.stage.name(), next)
    }

    fn verify(&mut self, config: &Config) -> Result<Verification, ConfigureError> {
        let result = self.stage.verify(config);
        self.advance(StageState::Verified(result.clone()))?;
        Ok(result)
    }

    fn fail(&mut self, err: &ConfigureError) {
        tracing::error!("{} ... failed: {}", self.name(), err);
        if self.state.can_transition(&StageState::Failed) {
            self.state = StageState::Failed;
        }
        self.detail = Some(err.to_string());
    }

    fn report(self) -> StageReport {
        StageReport {
            name: self.name().to_string(),
            state: self.state,
            detail: self.detail,
        }
    }
}

// =============================================================================
// CONFIGURATOR
// =============================================================================

/// Sequences stages through a command.
pub struct Configurator<'a> {
    registry: &'a StageRegistry,
    source: &'a dyn CapabilitySource,
}

impl<'a> Configurator<'a> {
    /// Create an orchestrator over `registry`, checking capabilities with `source`.
    #[must_use]
    pub fn new(registry: &'a StageRegistry, source: &'a dyn CapabilitySource) -> Self {
        Self { registry, source }
    }

    /// Run `command` on the named stages.
    ///
    /// Fatal failures return an error. A `check` that finds unconfigured
    /// stages is not fatal; it returns a report with `success == false`.
    pub fn run(
        &self,
        command: Command,
        names: &[String],
        config: &Config,
    ) -> Result<RunReport, ConfigureError> {
        let mut selected = self.registry.select(names)?;
        if command == Command::Fini {
            selected.reverse();
        }

        let mut entries: Vec<Entry<'_>> = selected.into_iter().map(Entry::new).collect();

        for entry in &mut entries {
            if entry.stage.enabled(config) {
                entry.advance(StageState::Applicable)?;
            } else {
                tracing::info!("{} ... skipping (not enabled)", entry.name());
                entry.advance(StageState::Skipped)?;
            }
        }

        if command != Command::Check {
            self.declare_permissions(&mut entries, config)?;
        }

        let success = match command {
            Command::Init => {
                self.init(&mut entries, config)?;
                true
            }
            Command::Check => self.check(&mut entries, config)?,
            Command::Fini => {
                self.fini(&mut entries, config)?;
                true
            }
        };

        Ok(RunReport {
            command,
            stages: entries.into_iter().map(Entry::report).collect(),
            success,
        })
    }

    fn declare_permissions(
        &self,
        entries: &mut [Entry<'_>],
        config: &Config,
    ) -> Result<(), ConfigureError> {
        let mut caps = CapsCtx::new(self.source);
        for entry in entries.iter().filter(|e| !e.state.is_terminal()) {
            entry.stage.declare_permissions(&mut caps, config);
        }
        caps.into_result()?;

        for entry in entries.iter_mut().filter(|e| !e.state.is_terminal()) {
            entry.advance(StageState::PermissionsDeclared)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // INIT
    // -------------------------------------------------------------------------

    fn init(&self, entries: &mut [Entry<'_>], config: &Config) -> Result<(), ConfigureError> {
        for i in 0..entries.len() {
            if entries[i].state.is_terminal() {
                continue;
            }
            if let Err(err) = init_stage(&mut entries[i], config) {
                rollback(entries, config);
                entries[i].fail(&err);
                return Err(err);
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // CHECK
    // -------------------------------------------------------------------------

    fn check(&self, entries: &mut [Entry<'_>], config: &Config) -> Result<bool, ConfigureError> {
        let mut all_ok = true;
        for entry in entries.iter_mut().filter(|e| !e.state.is_terminal()) {
            let result = entry.verify(config)?;
            match &result {
                Verification::Ok => tracing::info!("{} ... ok", entry.name()),
                other => {
                    all_ok = false;
                    tracing::warn!("{} ... {}", entry.name(), other);
                }
            }
            entry.detail = result.message().map(str::to_string);
        }
        Ok(all_ok)
    }

    // -------------------------------------------------------------------------
    // FINI
    // -------------------------------------------------------------------------

    fn fini(&self, entries: &mut [Entry<'_>], config: &Config) -> Result<(), ConfigureError> {
        for entry in entries.iter_mut().filter(|e| !e.state.is_terminal()) {
            if let Err(err) = fini_stage(entry, config) {
                entry.fail(&err);
                return Err(err);
            }
        }
        Ok(())
    }
}

fn init_stage(entry: &mut Entry<'_>, config: &Config) -> Result<(), ConfigureError> {
    let name = entry.name();

    match entry.verify(config)? {
        Verification::Ok => {
            tracing::info!("{} ... already valid", name);
            entry.detail = Some("already configured".to_string());
            return Ok(());
        }
        Verification::NotConfigured(msg) => {
            tracing::info!("{} ... initializing ({})", name, msg);
        }
        Verification::Error(msg) => {
            tracing::warn!("{} ... undoing existing configuration ({})", name, msg);
            entry.stage.revert(config, true)?;
            entry.advance(StageState::Reverted)?;
        }
    }

    entry.stage.apply(config)?;
    entry.applied = true;
    entry.advance(StageState::Applied)?;

    match entry.verify(config)? {
        Verification::Ok => {
            tracing::info!("{} ... configured", name);
            entry.detail = Some("configured".to_string());
            Ok(())
        }
        other => Err(ConfigureError::StageFailed {
            stage: name.to_string(),
            reason: format!("not configured after init: {}", other),
        }),
    }
}

/// Revert every stage applied in this run, newest first.
///
/// Failures are logged; the caller reports the error that caused the rollback.
fn rollback(entries: &mut [Entry<'_>], config: &Config) {
    for entry in entries.iter_mut().rev().filter(|e| e.applied) {
        tracing::warn!("{} ... rolling back", entry.name());
        match entry.stage.revert(config, false) {
            Ok(()) => {
                entry.applied = false;
                entry.detail = Some("rolled back".to_string());
                if let Err(err) = entry.advance(StageState::Reverted) {
                    tracing::warn!("{} ... {}", entry.name(), err);
                }
            }
            Err(err) => tracing::warn!("{} ... rollback failed: {}", entry.name(), err),
        }
    }
}

fn fini_stage(entry: &mut Entry<'_>, config: &Config) -> Result<(), ConfigureError> {
    let name = entry.name();

    // A half-applied stage verifies as NotConfigured, so revert regardless.
    if let Verification::NotConfigured(msg) = entry.verify(config)? {
        tracing::info!("{} ... not fully configured ({}), resetting anyway", name, msg);
    }

    entry.stage.revert(config, false)?;
    entry.advance(StageState::Reverted)?;

    if entry.stage.verify(config).is_ok() {
        return Err(ConfigureError::StageFailed {
            stage: name.to_string(),
            reason: "still configured after fini".to_string(),
        });
    }

    tracing::info!("{} ... undone", name);
    entry.detail = Some("reverted".to_string());
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capability, EffectiveSet};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// In-memory stage that records every lifecycle call.
    struct Recorder {
        name: &'static str,
        configured: Cell<bool>,
        fail_apply: bool,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &'static str, calls: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                name,
                configured: Cell::new(false),
                fail_apply: false,
                calls: Rc::clone(calls),
            }
        }

        fn log(&self, what: &str) {
            self.calls.borrow_mut().push(format!("{}:{}", self.name, what));
        }
    }

    impl Stage for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn enabled(&self, config: &Config) -> bool {
            config.tiles.xdp.poll_mode != "none"
        }

        fn declare_permissions(&self, caps: &mut CapsCtx<'_>, _config: &Config) {
            caps.check_capability(self.name, Capability::NetAdmin, "record calls");
        }

        fn apply(&self, _config: &Config) -> Result<(), ConfigureError> {
            self.log("apply");
            if self.fail_apply {
                return Err(ConfigureError::PathNotFound {
                    path: format!("/fake/{}", self.name),
                });
            }
            self.configured.set(true);
            Ok(())
        }

        fn verify(&self, _config: &Config) -> Verification {
            if self.configured.get() {
                Verification::Ok
            } else {
                Verification::NotConfigured(format!("{} not set", self.name))
            }
        }

        fn revert(&self, _config: &Config, was_pre_init: bool) -> Result<(), ConfigureError> {
            self.log(&format!("revert({})", was_pre_init));
            self.configured.set(false);
            Ok(())
        }
    }

    fn calls() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn select_keeps_registry_order() {
        let log = calls();
        let registry = StageRegistry::new()
            .with_stage(Box::new(Recorder::new("a", &log)))
            .with_stage(Box::new(Recorder::new("b", &log)));

        let names: Vec<_> = registry
            .select(&["b".to_string(), "a".to_string()])
            .expect("select")
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        assert_eq!(registry.select(&[]).expect("select").len(), 2);
        assert_eq!(
            registry.select(&["all".to_string()]).expect("select").len(),
            2
        );
    }

    #[test]
    fn select_unknown_stage() {
        let registry = StageRegistry::standard(Sysfs::default());
        let result = registry.select(&["ethtool".to_string()]);
        assert!(matches!(result, Err(ConfigureError::UnknownStage(n)) if n == "ethtool"));
    }

    #[test]
    fn standard_registry() {
        let registry = StageRegistry::standard(Sysfs::default());
        assert_eq!(registry.names(), vec!["sysfs-poll"]);
    }

    #[test]
    fn init_applies_then_skips_when_valid() {
        let log = calls();
        let registry = StageRegistry::new().with_stage(Box::new(Recorder::new("a", &log)));
        let source = EffectiveSet::all();
        let configurator = Configurator::new(&registry, &source);
        let config = Config::new("eth0", "busy");

        let report = configurator.run(Command::Init, &[], &config).expect("init");
        assert!(report.success);
        assert_eq!(report.stages[0].state, StageState::Verified(Verification::Ok));

        let report = configurator.run(Command::Init, &[], &config).expect("init");
        assert_eq!(report.stages[0].detail.as_deref(), Some("already configured"));
        assert_eq!(*log.borrow(), vec!["a:apply"]);
    }

    #[test]
    fn disabled_stage_untouched() {
        let log = calls();
        let registry = StageRegistry::new().with_stage(Box::new(Recorder::new("a", &log)));
        let source = EffectiveSet::empty();
        let configurator = Configurator::new(&registry, &source);

        // Nothing enabled, so no capability is required either.
        let report = configurator
            .run(Command::Init, &[], &Config::new("eth0", "none"))
            .expect("init");
        assert_eq!(report.stages[0].state, StageState::Skipped);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn missing_capability_aborts_before_apply() {
        let log = calls();
        let registry = StageRegistry::new()
            .with_stage(Box::new(Recorder::new("a", &log)))
            .with_stage(Box::new(Recorder::new("b", &log)));
        let source = EffectiveSet::empty();
        let configurator = Configurator::new(&registry, &source);

        let result = configurator.run(Command::Init, &[], &Config::new("eth0", "busy"));
        assert!(matches!(result, Err(ConfigureError::PermissionDenied(list)) if list.len() == 2));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn check_needs_no_capability() {
        let log = calls();
        let registry = StageRegistry::new().with_stage(Box::new(Recorder::new("a", &log)));
        let source = EffectiveSet::empty();
        let configurator = Configurator::new(&registry, &source);

        let report = configurator
            .run(Command::Check, &[], &Config::new("eth0", "busy"))
            .expect("check");
        assert!(!report.success);
        assert_eq!(report.stages[0].detail.as_deref(), Some("a not set"));
    }

    #[test]
    fn later_failure_rolls_back_earlier_stages() {
        let log = calls();
        let mut failing = Recorder::new("b", &log);
        failing.fail_apply = true;
        let registry = StageRegistry::new()
            .with_stage(Box::new(Recorder::new("a", &log)))
            .with_stage(Box::new(failing));
        let source = EffectiveSet::all();
        let configurator = Configurator::new(&registry, &source);

        let result = configurator.run(Command::Init, &[], &Config::new("eth0", "busy"));
        assert!(matches!(result, Err(ConfigureError::PathNotFound { .. })));
        assert_eq!(*log.borrow(), vec!["a:apply", "b:apply", "a:revert(false)"]);
    }

    #[test]
    fn fini_runs_in_reverse_and_always_reverts() {
        let log = calls();
        let registry = StageRegistry::new()
            .with_stage(Box::new(Recorder::new("a", &log)))
            .with_stage(Box::new(Recorder::new("b", &log)));
        let source = EffectiveSet::all();
        let configurator = Configurator::new(&registry, &source);
        let config = Config::new("eth0", "busy");

        // Not configured still reverts; revert is safe without a prior apply.
        let report = configurator.run(Command::Fini, &[], &config).expect("fini");
        assert_eq!(*log.borrow(), vec!["b:revert(false)", "a:revert(false)"]);
        assert_eq!(report.stages[0].detail.as_deref(), Some("reverted"));

        configurator.run(Command::Init, &[], &config).expect("init");
        log.borrow_mut().clear();

        let report = configurator.run(Command::Fini, &[], &config).expect("fini");
        assert_eq!(*log.borrow(), vec!["b:revert(false)", "a:revert(false)"]);
        assert_eq!(report.stages[0].name, "b");
        assert_eq!(report.stages[0].state, StageState::Reverted);
    }
}
