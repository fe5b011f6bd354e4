//! Subcommand execution and output (text or JSON lines).

use crate::sim::SimRig;
use eyre::{Result, WrapErr};
use satt_config::Config;
use satt_core::estimator::choose_bracket_with;
use satt_core::{
    AggregateResult, AttError, BladeState, FaultReporting, Lightpath, TieBreak,
    TransmissionPositioner,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn state_codes(states: &[Option<BladeState>]) -> Vec<Option<i64>> {
    states.iter().map(|s| s.map(BladeState::code)).collect()
}

fn lightpath_json(name: &str, r: &AggregateResult) -> serde_json::Value {
    json!({
        "device": name,
        "inserted": r.inserted,
        "removed": r.removed,
        "transmission": r.transmission,
        "num_in": r.num_in,
        "num_out": r.num_out,
    })
}

fn lightpath_line(r: &AggregateResult) -> String {
    format!(
        "inserted: {}  removed: {}  transmission: {:.6}  in/out: {}/{}",
        r.inserted, r.removed, r.transmission, r.num_in, r.num_out
    )
}

pub fn status(rig: &mut SimRig, no_cache: bool, json_mode: bool) -> Result<()> {
    let att = &mut rig.device;
    let result = att.lightpath_state(!no_cache)?;
    let states = att.blade_states()?;
    if json_mode {
        let mut obj = lightpath_json(att.name(), &result);
        obj["kind"] = json!(att.kind().label());
        obj["blades"] = json!(state_codes(&states));
        println!("{obj}");
    } else {
        println!("{} ({})", att.name(), att.kind().label());
        println!("{}", lightpath_line(&result));
        for line in att.render()? {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn bracket(
    rig: &mut SimRig,
    cfg: &Config,
    setpoint: f64,
    bounds: Option<(f64, f64)>,
    json_mode: bool,
) -> Result<()> {
    rig.device.check_setpoint(setpoint)?;
    let (code, floor, ceiling) = match bounds {
        Some((floor, ceiling)) => {
            if floor > ceiling {
                eyre::bail!("floor {floor} must not be above ceiling {ceiling}");
            }
            let tie = TieBreak::from(cfg.estimator.tie_break);
            (choose_bracket_with(setpoint, floor, ceiling, tie), floor, ceiling)
        }
        None => {
            let Some(b) = rig.map.bounds_channels() else {
                return Err(AttError::Unsupported("floor/ceiling bracket selection").into());
            };
            rig.channels.sim_put(&b.setpoint, setpoint);
            let code = rig.device.actuate_value()?;
            let floor = rig.channels.number(&b.floor)?.unwrap_or(f64::NAN);
            let ceiling = rig.channels.number(&b.ceiling)?.unwrap_or(f64::NAN);
            (code, floor, ceiling)
        }
    };
    if json_mode {
        println!(
            "{}",
            json!({
                "setpoint": setpoint,
                "floor": floor,
                "ceiling": ceiling,
                "bracket": code.label(),
                "code": code.value(),
            })
        );
    } else {
        println!(
            "setpoint {setpoint} -> {} (GO={}) between floor {floor} and ceiling {ceiling}",
            code.label(),
            code.value()
        );
    }
    Ok(())
}

pub fn move_to(
    rig: &mut SimRig,
    transmission: f64,
    energy: Option<f64>,
    json_mode: bool,
) -> Result<()> {
    let att = &mut rig.device;
    att.check_setpoint(transmission)?;
    att.set_energy(energy)?;
    let outcome = att.move_to(transmission)?;
    if json_mode {
        println!(
            "{}",
            json!({
                "device": att.name(),
                "transmission": transmission,
                "bracket": outcome.code.map(|c| c.label()),
                "completed": outcome.completed,
            })
        );
    } else {
        match outcome.code {
            Some(code) => println!(
                "requested {transmission} using the {} bracket{}",
                code.label(),
                if outcome.completed { " (already there)" } else { "" }
            ),
            None => println!("requested {transmission}; calculator configuration applied"),
        }
    }
    Ok(())
}

pub fn errors(rig: &mut SimRig, json_mode: bool) -> Result<()> {
    let att = &mut rig.device;
    let mask = att.error_bitmask()?;
    let summary = att.error_summary()?;
    if json_mode {
        println!(
            "{}",
            json!({ "device": att.name(), "bitmask": mask, "summary": summary })
        );
    } else {
        println!("bitmask: {mask:#b} ({mask})");
        println!("{summary}");
    }
    Ok(())
}

pub fn reset(rig: &mut SimRig, json_mode: bool) -> Result<()> {
    let commands = rig.device.reset_faults()?;
    let rejected: Vec<&str> = commands
        .iter()
        .filter(|c| !c.accepted)
        .map(|c| c.channel.as_str())
        .collect();
    if json_mode {
        println!(
            "{}",
            json!({ "sent": commands.len(), "rejected": rejected })
        );
    } else {
        println!("reset sent to {} channels", commands.len());
        for ch in &rejected {
            println!("  rejected: {ch}");
        }
    }
    Ok(())
}

/// Refresh the lightpath state until `count` refreshes or Ctrl-C.
///
/// The device is shared so that a fired retry can update the cached result
/// between refreshes.
pub fn watch(rig: SimRig, interval: Duration, count: Option<u64>, json_mode: bool) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    let shared = rig.device.into_shared();
    let mut n = 0u64;
    while !shutdown.load(Ordering::Relaxed) {
        let (name, result) = {
            let mut att = shared
                .lock()
                .map_err(|_| eyre::eyre!("attenuator lock poisoned"))?;
            let result = att.lightpath_state(true)?;
            (att.name().to_string(), result)
        };
        if json_mode {
            println!("{}", lightpath_json(&name, &result));
        } else {
            println!("{}", lightpath_line(&result));
        }
        n += 1;
        if count.is_some_and(|c| n >= c) {
            break;
        }
        sleep_unless_stopped(interval, &shutdown);
    }
    tracing::debug!(refreshes = n, "watch finished");
    Ok(())
}

fn sleep_unless_stopped(total: Duration, shutdown: &AtomicBool) {
    let step = Duration::from_millis(20);
    let mut left = total;
    while !left.is_zero() && !shutdown.load(Ordering::Relaxed) {
        let d = left.min(step);
        std::thread::sleep(d);
        left -= d;
    }
}

pub fn self_check(rig: &mut SimRig, json_mode: bool) -> Result<()> {
    let bindings = rig.map.bindings().count();
    let states = rig.device.blade_states()?;
    let reporting = states.iter().filter(|s| s.is_some()).count();
    let bounds_ok = match rig.map.bounds_channels() {
        Some(b) => Some(
            rig.channels.number(&b.floor)?.is_some() && rig.channels.number(&b.ceiling)?.is_some(),
        ),
        None => None,
    };
    if reporting < states.len() {
        tracing::warn!(
            reporting,
            blades = states.len(),
            "some blades have not reported a state"
        );
    }
    if json_mode {
        println!(
            "{}",
            json!({
                "ok": true,
                "device": rig.device.name(),
                "channels": bindings,
                "blades": states.len(),
                "blades_reporting": reporting,
                "bounds_available": bounds_ok,
            })
        );
    } else {
        println!(
            "ok: {} with {bindings} channels, {reporting}/{} blades reporting",
            rig.device.name(),
            states.len()
        );
        if let Some(ok) = bounds_ok {
            println!("bounds available: {ok}");
        }
    }
    Ok(())
}
