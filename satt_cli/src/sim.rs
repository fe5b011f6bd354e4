//! Config mapping and assembly of an attenuator over the simulated channels.

use eyre::{Result, WrapErr};
use satt_config::{Config, SimValue};
use satt_core::{
    AttenuatorKind, ChannelMap, EstimatorCfg, FaultCfg, LightpathCfg, SolidAttenuator,
    TransmissionTable,
};
use satt_hardware::{
    BladeAddress, BoundsAddress, SimBladeReader, SimBoundsReader, SimChannels, SimFaultReader,
};
use satt_traits::SignalValue;
use std::path::Path;

/// A device wired to simulated channels, plus the handles needed to inspect them.
pub struct SimRig {
    pub channels: SimChannels,
    pub map: ChannelMap,
    pub device: SolidAttenuator,
}

/// Read, parse and validate the TOML config.
pub fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = satt_config::load_toml(&text)
        .map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Load the transmission CSV and check it against the device's blade count.
pub fn load_table(path: &Path, blade_count: usize) -> Result<TransmissionTable> {
    let rows = satt_config::load_transmission_csv(path)?;
    if let Some(row) = rows.iter().find(|r| r.blade > blade_count) {
        eyre::bail!(
            "transmission CSV names blade {} but the device has {} blades",
            row.blade,
            blade_count
        );
    }
    tracing::debug!(rows = rows.len(), path = %path.display(), "transmission table loaded");
    Ok(TransmissionTable::from(rows.as_slice()))
}

fn to_signal(v: &SimValue) -> SignalValue {
    match v {
        SimValue::Int(i) => SignalValue::Int(*i),
        SimValue::Float(f) => SignalValue::Float(*f),
        SimValue::Text(s) => SignalValue::Text(s.clone()),
    }
}

/// Build the channel map, seed `[simulation]` values and assemble the device.
pub fn build(cfg: &Config, table: TransmissionTable) -> Result<SimRig> {
    let kind = AttenuatorKind::from(&cfg.device);
    let prefix = cfg
        .device
        .prefix_or_default()
        .ok_or_else(|| eyre::eyre!("device.prefix is required for this attenuator kind"))?;
    let map = ChannelMap::build(kind, prefix, cfg.device.calculator_prefix.as_deref())?;
    let channels = SimChannels::new();
    seed(&channels, &map, cfg)?;

    let blades = map
        .blades()
        .iter()
        .map(|b| BladeAddress {
            state: b.state.clone(),
            stuck: b.stuck.clone(),
        })
        .collect();
    let name = cfg
        .device
        .name
        .clone()
        .unwrap_or_else(|| kind.label().to_string());

    let mut builder = SolidAttenuator::builder(map.clone())
        .name(name)
        .blade_reader(SimBladeReader::new(channels.clone(), blades))
        .fault_reader(SimFaultReader::new(channels.clone(), map.fault_signals()))
        .sink(channels.clone())
        .transmission_table(table)
        .estimator_cfg(EstimatorCfg::from(&cfg.estimator))
        .lightpath_cfg(LightpathCfg::from(&cfg.lightpath))
        .fault_cfg(FaultCfg::from(&cfg.faults));
    if let Some(b) = map.bounds_channels() {
        builder = builder.bounds_reader(SimBoundsReader::new(
            channels.clone(),
            BoundsAddress {
                calc_pending: b.calc_pending,
                setpoint: b.setpoint,
                readback: b.readback,
                floor: b.floor,
                ceiling: b.ceiling,
            },
        ));
    }
    let device = builder.build()?;
    tracing::info!(device = device.name(), kind = kind.label(), prefix, "simulated attenuator ready");
    Ok(SimRig {
        channels,
        map,
        device,
    })
}

fn seed(ch: &SimChannels, map: &ChannelMap, cfg: &Config) -> Result<()> {
    let sim = &cfg.simulation;
    for (blade, raw) in map.blades().iter().zip(&sim.blade_states) {
        ch.sim_put(&blade.state, *raw);
    }
    for (blade, raw) in map.blades().iter().zip(&sim.stuck) {
        if let Some(addr) = &blade.stuck {
            ch.sim_put(addr, *raw);
        }
    }

    if let Some(b) = map.bounds_channels() {
        let seeded = [
            (&b.setpoint, sim.setpoint),
            (&b.readback, sim.readback),
            (&b.floor, sim.floor),
            (&b.ceiling, sim.ceiling),
        ];
        for (addr, value) in seeded {
            if let Some(v) = value {
                ch.sim_put(addr, v);
            }
        }
        if let Some(addr) = &b.calc_pending {
            ch.sim_put(addr, i64::from(sim.calc_pending));
        }
    }

    for f in &sim.faults {
        let name = format!("blade_{:02}.{}", f.blade, f.signal);
        let Some(addr) = map.address(&name) else {
            eyre::bail!(
                "simulation fault on blade {} signal {:?} has no fault channel on this device",
                f.blade,
                f.signal
            );
        };
        ch.sim_put(addr, to_signal(&f.value));
        ch.set_severity(addr, f.severity);
    }
    Ok(())
}
