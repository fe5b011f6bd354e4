use satt_core::faults::{error_bitmask, error_bitmask_with};
use satt_core::FaultCfg;
use satt_traits::{FaultSignal, SignalValue};

const FIELDS: [&str; 5] = [
    "state.error",
    "state.error_id",
    "state.error_message",
    "motor.plc.err_code",
    "motor.user_readback",
];

/// 19 blades x 5 signals, all clear.
fn clean() -> Vec<FaultSignal> {
    (1..=19)
        .flat_map(|b| {
            FIELDS.iter().map(move |f| FaultSignal {
                name: format!("blade_{b:02}.{f}"),
                value: if f.ends_with("error_message") {
                    SignalValue::Text(String::new())
                } else {
                    SignalValue::Int(0)
                },
                severity: 0,
            })
        })
        .collect()
}

fn set(signals: &mut [FaultSignal], blade: usize, field: usize, value: SignalValue) {
    signals[(blade - 1) * 5 + field].value = value;
}

#[test]
fn no_faults_is_zero() {
    assert_eq!(error_bitmask(&clean(), 5, 1, 18), 0);
}

#[test]
fn last_blade_is_lowest_bit() {
    let mut s = clean();
    set(&mut s, 19, 0, SignalValue::Int(1));
    assert_eq!(error_bitmask(&s, 5, 1, 18), 0b1);
}

#[test]
fn third_from_last_adds_bit_two() {
    let mut s = clean();
    set(&mut s, 19, 0, SignalValue::Int(1));
    set(&mut s, 17, 2, SignalValue::Text("axis error".into()));
    assert_eq!(error_bitmask(&s, 5, 1, 18), 0b101);
}

#[test]
fn first_reported_blade_is_highest_bit() {
    let mut s = clean();
    set(&mut s, 2, 1, SignalValue::Int(4402));
    assert_eq!(error_bitmask(&s, 5, 1, 18), 1 << 17);
}

#[test]
fn excluded_window_is_ignored() {
    let mut s = clean();
    for f in 0..4 {
        set(&mut s, 1, f, SignalValue::Int(1));
    }
    s[4].severity = 3;
    assert_eq!(error_bitmask(&s, 5, 1, 18), 0);
}

#[test]
fn motor_readback_alarm_counts() {
    let mut s = clean();
    // blade 18 motor readback: value is a position, severity decides
    s[(18 - 1) * 5 + 4].value = SignalValue::Float(3.5);
    assert_eq!(error_bitmask(&s, 5, 1, 18), 0);
    s[(18 - 1) * 5 + 4].severity = 2;
    assert_eq!(error_bitmask(&s, 5, 1, 18), 0b10);
}

#[test]
fn missing_signals_are_clear() {
    let s = clean();
    assert_eq!(error_bitmask(&s[..40], 5, 1, 18), 0);
    assert_eq!(error_bitmask(&[], 5, 1, 18), 0);
}

#[test]
fn config_wrapper_matches_defaults() {
    let mut s = clean();
    set(&mut s, 19, 3, SignalValue::Int(9));
    assert_eq!(error_bitmask_with(&s, &FaultCfg::default()), 0b1);
}
