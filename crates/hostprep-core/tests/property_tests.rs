//! # Property-Based Tests
//!
//! Invariants of the sysfs-poll stage over arbitrary configs and host states.

use hostprep_core::stage::{SETTINGS, VERY_HIGH_VAL};
use hostprep_core::{
    Command, Config, Configurator, EffectiveSet, Stage, StageRegistry, StageState, Sysfs,
    SysfsPoll, Verification,
};
use proptest::prelude::*;
use std::path::Path;

fn fake_interface(root: &Path, interface: &str, values: &[u64; 3]) {
    let dir = root.join("class/net").join(interface);
    std::fs::create_dir_all(&dir).expect("mkdir");
    for (setting, value) in SETTINGS.iter().zip(values) {
        std::fs::write(dir.join(setting), format!("{}\n", value)).expect("write");
    }
}

fn read_all(root: &Path, interface: &str) -> Vec<u64> {
    SETTINGS
        .iter()
        .map(|s| {
            std::fs::read_to_string(root.join("class/net").join(interface).join(s))
                .expect("read")
                .trim()
                .parse()
                .expect("parse")
        })
        .collect()
}

/// A knob value: mostly arbitrary, sometimes the sentinel or zero.
fn knob_value() -> impl Strategy<Value = u64> {
    prop_oneof![Just(VERY_HIGH_VAL), Just(0u64), 0u64..=u64::from(u32::MAX)]
}

proptest! {
    /// Any poll mode other than pref_busy disables the stage.
    #[test]
    fn enabled_only_for_pref_busy(mode in "[a-z_]{0,12}") {
        let stage = SysfsPoll::default();
        let config = Config::new("eth0", mode.clone());
        prop_assert_eq!(stage.enabled(&config), mode == "pref_busy");
    }

    /// A disabled stage is never touched by init.
    #[test]
    fn disabled_stage_writes_nothing(
        mode in prop_oneof![Just("busy"), Just("none")],
        values in [knob_value(), knob_value(), knob_value()],
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        fake_interface(dir.path(), "eth0", &values);
        let registry = StageRegistry::standard(Sysfs::new(dir.path()));
        let source = EffectiveSet::all();

        let report = Configurator::new(&registry, &source)
            .run(Command::Init, &[], &Config::new("eth0", mode))
            .expect("init");

        prop_assert_eq!(&report.stages[0].state, &StageState::Skipped);
        prop_assert_eq!(read_all(dir.path(), "eth0"), values.to_vec());
    }

    /// verify is Ok iff every knob holds the sentinel.
    #[test]
    fn verify_matches_host_state(values in [knob_value(), knob_value(), knob_value()]) {
        let dir = tempfile::tempdir().expect("tempdir");
        fake_interface(dir.path(), "eth0", &values);
        let stage = SysfsPoll::new(Sysfs::new(dir.path()));

        let result = stage.verify(&Config::new("eth0", "pref_busy"));
        let expected = values.iter().all(|&v| v == VERY_HIGH_VAL);
        prop_assert_eq!(result == Verification::Ok, expected);
    }

    /// From any starting state, apply then revert leave fixed states.
    #[test]
    fn apply_and_revert_converge(
        values in [knob_value(), knob_value(), knob_value()],
        applies in 1usize..4,
        pre_init in any::<bool>(),
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        fake_interface(dir.path(), "eth0", &values);
        let stage = SysfsPoll::new(Sysfs::new(dir.path()));
        let config = Config::new("eth0", "pref_busy");

        for _ in 0..applies {
            stage.apply(&config).expect("apply");
        }
        prop_assert_eq!(read_all(dir.path(), "eth0"), vec![VERY_HIGH_VAL; 3]);

        stage.revert(&config, pre_init).expect("revert");
        prop_assert_eq!(read_all(dir.path(), "eth0"), vec![0; 3]);
    }
}
