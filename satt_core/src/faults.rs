//! Fault reporting: error bitmask, text summary and bulk reset.
//!
//! Fault signals arrive as one flat, ordered list with a fixed number of
//! signals per blade. Signals named after exactly one of the motor record or
//! the PLC report through their alarm severity rather than their value.

use crate::config::FaultCfg;
use satt_traits::{CommandSink, FaultSignal, SignalValue};

/// The value that decides whether `signal` is faulted.
pub fn effective_value(signal: &FaultSignal) -> SignalValue {
    let motor = signal.name.contains("motor");
    let plc = signal.name.contains("plc");
    if motor ^ plc {
        SignalValue::Int(signal.severity)
    } else {
        signal.value.clone()
    }
}

#[inline]
pub fn is_faulted(signal: &FaultSignal) -> bool {
    effective_value(signal).is_set()
}

/// Pack per-window fault flags into an integer, first window in the highest bit.
///
/// Windows of `group_size` signals start after `excluded_leading_groups`
/// windows. Signals past the end of the list count as not faulted.
pub fn error_bitmask(
    signals: &[FaultSignal],
    group_size: usize,
    excluded_leading_groups: usize,
    group_count: usize,
) -> u64 {
    debug_assert!(group_count <= 64, "bitmask holds at most 64 windows");
    let mut mask = 0u64;
    for window in 0..group_count {
        let start = (excluded_leading_groups + window).saturating_mul(group_size);
        let end = start.saturating_add(group_size).min(signals.len());
        let start = start.min(end);
        let bit = signals[start..end].iter().any(is_faulted);
        mask = (mask << 1) | u64::from(bit);
    }
    mask
}

#[inline]
pub fn error_bitmask_with(signals: &[FaultSignal], cfg: &FaultCfg) -> u64 {
    error_bitmask(
        signals,
        cfg.group_size,
        cfg.excluded_leading_groups,
        cfg.group_count,
    )
}

/// Human-readable listing of every faulted signal.
pub fn error_summary(signals: &[FaultSignal]) -> String {
    let lines: Vec<String> = signals
        .iter()
        .filter_map(|s| {
            let v = effective_value(s);
            v.is_set().then(|| format!("{}: {v}", s.name))
        })
        .collect();
    if lines.is_empty() {
        return "No Errors".to_string();
    }
    let mut out = String::from("Error summary:");
    for l in lines {
        out.push('\n');
        out.push_str(&l);
    }
    out
}

/// Reset command channels of one blade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BladeFaultChannels {
    pub motor_reset: String,
    pub state_reset: String,
}

/// A reset put that was issued, whether or not the channel accepted it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetCommand {
    pub channel: String,
    pub value: SignalValue,
    pub accepted: bool,
}

/// Write 1 to both reset channels of every blade without waiting.
///
/// A rejected put is logged and the remaining commands are still sent.
pub fn reset_all_faults(
    sink: &mut dyn CommandSink,
    blades: &[BladeFaultChannels],
) -> Vec<ResetCommand> {
    let mut issued = Vec::with_capacity(blades.len() * 2);
    for b in blades {
        for channel in [&b.motor_reset, &b.state_reset] {
            let value = SignalValue::Int(1);
            let accepted = match sink.put(channel, value.clone()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "fault reset put failed");
                    false
                }
            };
            issued.push(ResetCommand {
                channel: channel.clone(),
                value,
                accepted,
            });
        }
    }
    tracing::debug!(count = issued.len(), "fault reset issued");
    issued
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str, value: impl Into<SignalValue>, severity: i64) -> FaultSignal {
        FaultSignal {
            name: name.to_string(),
            value: value.into(),
            severity,
        }
    }

    #[test]
    fn motor_readback_uses_severity() {
        assert!(!is_faulted(&sig("blade_02.motor.user_readback", 12.5, 0)));
        assert!(is_faulted(&sig("blade_02.motor.user_readback", 0.0, 2)));
    }

    #[test]
    fn plc_error_code_uses_value() {
        // Both words present: XOR is false, so the value decides.
        assert!(is_faulted(&sig("blade_02.motor.plc.err_code", 7, 0)));
        assert!(!is_faulted(&sig("blade_02.motor.plc.err_code", 0, 3)));
    }

    #[test]
    fn empty_text_is_clear() {
        assert!(!is_faulted(&sig("blade_02.state.error_message", "", 0)));
        assert!(is_faulted(&sig("blade_02.state.error_message", "limit", 0)));
    }

    #[test]
    fn short_list_pads_with_clear_windows() {
        let mut v: Vec<_> = (0..12).map(|i| sig(&format!("s{i}"), 0, 0)).collect();
        v[11] = sig("s11", 1, 0);
        // windows: [5..10) clear, [10..12) faulted, rest empty
        assert_eq!(error_bitmask(&v, 5, 1, 4), 0b0100);
    }

    #[test]
    fn summary_lists_faulted_signals() {
        let v = vec![
            sig("blade_03.state.error", 0, 0),
            sig("blade_03.state.error_id", 17, 0),
            sig("blade_03.motor.user_readback", 1.0, 2),
        ];
        assert_eq!(
            error_summary(&v),
            "Error summary:\nblade_03.state.error_id: 17\nblade_03.motor.user_readback: 2"
        );
        assert_eq!(error_summary(&v[..1]), "No Errors");
    }
}
