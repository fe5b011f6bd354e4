use satt_config::{DeviceKind, TieBreak, load_toml};
use rstest::rstest;

const LEGACY: &str = r#"
[device]
kind = "legacy"
prefix = "XPP:ATT"
n_filters = 10

[estimator]
poll_ms = 10
settle_timeout_ms = 1000
tie_break = "floor"

[simulation]
blade_states = [2, 2, 1, 2]
stuck = [0, 0, 0, 2]
setpoint = 0.3
floor = 0.25
ceiling = 0.4
"#;

#[test]
fn accepts_legacy_config() {
    let cfg = load_toml(LEGACY).expect("parse TOML");
    cfg.validate().expect("valid config");
    assert_eq!(cfg.device.kind, DeviceKind::Legacy);
    assert_eq!(cfg.device.blade_count(), 10);
    assert_eq!(cfg.estimator.tie_break, TieBreak::Floor);
    assert_eq!(cfg.simulation.blade_states.len(), 4);
}

#[rstest]
#[case("n_filters = 10", "n_filters = 13", "n_filters must be in 1..=12")]
#[case("n_filters = 10", "", "n_filters is required")]
#[case("poll_ms = 10", "poll_ms = 0", "poll_ms must be >= 1")]
#[case("settle_timeout_ms = 1000", "settle_timeout_ms = 600000", "unreasonably large")]
#[case("floor = 0.25", "floor = 0.5", "floor must be <= simulation.ceiling")]
#[case("setpoint = 0.3", "setpoint = 1.5", "setpoint must be in [0.0, 1.0]")]
#[case("blade_states = [2, 2, 1, 2]", "blade_states = [2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2]", "blade_states has 11 entries")]
fn rejects_out_of_range_values(#[case] from: &str, #[case] to: &str, #[case] msg: &str) {
    let toml = LEGACY.replace(from, to);
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(format!("{err}").contains(msg), "unexpected error: {err}");
}

#[test]
fn requires_prefix_except_for_fee() {
    let cfg = load_toml("[device]\nkind = \"at2l0\"\n").unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(format!("{err}").contains("device.prefix is required"));

    let cfg = load_toml("[device]\nkind = \"fee\"\n").unwrap();
    cfg.validate().unwrap();
}

#[test]
fn ladder_defaults_and_target_limit() {
    let cfg = load_toml("[device]\nkind = \"sxr_ladder\"\nprefix = \"AT1K4:L2SI\"\n").unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.device.blade_count(), 4);
    assert_eq!(cfg.device.ladder_targets(), 8);

    let cfg = load_toml("[device]\nkind = \"sxr_ladder\"\nprefix = \"X\"\ntargets = 9\n").unwrap();
    assert!(cfg.validate().is_err());
}

#[rstest]
#[case("[faults]\ngroup_size = 0\n", "group_size must be >= 1")]
#[case("[faults]\ngroup_count = 65\n", "group_count must be in 1..=64")]
#[case("[lightpath]\nretry_delay_ms = 0\n", "retry_delay_ms must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation")]
#[case("[[simulation.faults]]\nblade = 20\nsignal = \"state.error\"\nvalue = 1\n", "out of range")]
fn rejects_bad_sections(#[case] extra: &str, #[case] msg: &str) {
    let toml = format!("[device]\nkind = \"at2l0\"\nprefix = \"AT2L0:XTES\"\n\n{extra}");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(format!("{err}").contains(msg), "unexpected error: {err}");
}

#[test]
fn unknown_kind_fails_to_parse() {
    assert!(load_toml("[device]\nkind = \"gas\"\n").is_err());
}
