//! Human-readable error descriptions and structured JSON error formatting.

use satt_core::error::{AttError, BuildError};

/// Stable name for each attenuator error variant.
pub fn att_error_name(e: &AttError) -> &'static str {
    match e {
        AttError::Channel(_) => "Channel",
        AttError::Disconnected(_) => "Disconnected",
        AttError::OutOfRange { .. } => "OutOfRange",
        AttError::BladeCount { .. } => "BladeCount",
        AttError::MissingChannel(_) => "MissingChannel",
        AttError::Unsupported(_) => "Unsupported",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingBlades => {
                "What happened: No blade reader was provided to the attenuator.\nLikely causes: The channel backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure a blade reader is passed via blade_reader(...).".to_string()
            }
            BuildError::MissingBounds => {
                "What happened: No transmission bounds reader was provided.\nLikely causes: Legacy and FEE attenuators need the calculator floor/ceiling channels.\nHow to fix: Check device.kind and device.prefix in the config.".to_string()
            }
            BuildError::MissingSink => {
                "What happened: No command sink was provided to the attenuator.\nLikely causes: The channel backend failed to initialize.\nHow to fix: Ensure a sink is passed via sink(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ae) = err.downcast_ref::<AttError>() {
        return match ae {
            AttError::Disconnected(ch) => format!(
                "What happened: Channel {ch} is not connected.\nLikely causes: The IOC or PLC is down, or device.prefix is wrong.\nHow to fix: Check device.prefix and seed the channel under [simulation] when running simulated."
            ),
            AttError::OutOfRange { value, low, high } => format!(
                "What happened: Transmission {value} is outside the allowed range [{low}, {high}].\nLikely causes: A percentage was given instead of a fraction.\nHow to fix: Pass a value between {low} and {high}, e.g. 0.25."
            ),
            AttError::BladeCount { expected, found } => format!(
                "What happened: Expected {expected} blade readbacks but got {found}.\nLikely causes: device.n_filters or device.blades does not match the hardware.\nHow to fix: Fix the blade count in the [device] section."
            ),
            AttError::Unsupported(what) => format!(
                "What happened: This attenuator does not support {what}.\nLikely causes: The command only applies to another attenuator family.\nHow to fix: Check device.kind in the config."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config <FILE> pointing at a TOML config. Original: {msg}"
        );
    }

    if lower.contains("transmission csv must have headers") {
        return "Invalid headers in transmission CSV. Expected 'blade,target,transmission'."
            .to_string();
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Missing [device] fields or out-of-range values.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map attenuator errors to stable exit codes; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<AttError>() {
        Some(AttError::Disconnected(_)) => 3,
        Some(AttError::OutOfRange { .. }) => 4,
        Some(AttError::Unsupported(_)) => 5,
        Some(AttError::BladeCount { .. }) => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(ae) = err.downcast_ref::<AttError>() {
        let msg = humanize(err);
        let obj = match ae {
            AttError::OutOfRange { value, low, high } => json!({
                "reason": att_error_name(ae),
                "details": { "value": value, "low": low, "high": high },
                "message": msg,
            }),
            AttError::Disconnected(ch) | AttError::MissingChannel(ch) => json!({
                "reason": att_error_name(ae),
                "details": { "channel": ch },
                "message": msg,
            }),
            _ => json!({ "reason": att_error_name(ae), "message": msg }),
        };
        return obj.to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_is_explained_and_coded() {
        let err = eyre::Report::new(AttError::OutOfRange {
            value: 1.5,
            low: 0.0,
            high: 1.0,
        });
        assert!(humanize(&err).contains("outside the allowed range"));
        assert_eq!(exit_code_for_error(&err), 4);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "OutOfRange");
        assert_eq!(v["details"]["value"], 1.5);
    }

    #[test]
    fn wrapped_disconnect_is_still_typed() {
        use eyre::WrapErr;
        let err: eyre::Report = Err::<(), _>(AttError::Disconnected("XPP:ATT:COM:GO".into()))
            .wrap_err("put actuate")
            .unwrap_err();
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("XPP:ATT:COM:GO"));
    }

    #[test]
    fn untyped_errors_fall_back_to_generic_text() {
        let err = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).starts_with("Something went wrong."));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Error");
    }
}
