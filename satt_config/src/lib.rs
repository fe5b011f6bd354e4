#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and transmission-table parsing for the attenuator tools.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Transmission CSV loader enforces headers and rejects duplicate or
//!   out-of-range entries.
use serde::Deserialize;
use std::collections::BTreeSet;

/// Transmission CSV schema.
///
/// Expected headers:
/// blade,target,transmission
///
/// Example:
/// blade,target,transmission
/// 2,1,0.52
/// 3,1,0.27
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TransmissionRow {
    pub blade: usize,
    pub target: u8,
    pub transmission: f64,
}

/// Pre-L2SI filter attenuators carry at most this many filters.
pub const MAX_LEGACY_FILTERS: usize = 12;
/// Ladder blades carry at most this many filter targets.
pub const MAX_LADDER_TARGETS: u8 = 8;
pub const DEFAULT_FEE_PREFIX: &str = "SATT:FEE1:320";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Legacy,
    Fee,
    At2l0,
    SxrLadder,
}

#[derive(Debug, Deserialize)]
pub struct Device {
    pub kind: DeviceKind,
    /// Display name; defaults to the kind.
    #[serde(default)]
    pub name: Option<String>,
    /// Channel prefix. Optional only for the FEE attenuator.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Calculator prefix for PLC attenuators.
    #[serde(default)]
    pub calculator_prefix: Option<String>,
    /// Legacy attenuators: number of filters (1..=12).
    #[serde(default)]
    pub n_filters: Option<usize>,
    /// Ladder attenuators: number of blades (default 4).
    #[serde(default)]
    pub blades: Option<usize>,
    /// Ladder attenuators: filter targets per blade (default 8).
    #[serde(default)]
    pub targets: Option<u8>,
}

impl Device {
    /// Number of blades the configured device has.
    pub fn blade_count(&self) -> usize {
        match self.kind {
            DeviceKind::Legacy => self.n_filters.unwrap_or(0),
            DeviceKind::Fee => 9,
            DeviceKind::At2l0 => 19,
            DeviceKind::SxrLadder => self.blades.unwrap_or(4),
        }
    }

    pub fn ladder_targets(&self) -> u8 {
        self.targets.unwrap_or(MAX_LADDER_TARGETS)
    }

    pub fn prefix_or_default(&self) -> Option<&str> {
        match (&self.prefix, self.kind) {
            (Some(p), _) => Some(p.as_str()),
            (None, DeviceKind::Fee) => Some(DEFAULT_FEE_PREFIX),
            (None, _) => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    #[default]
    Ceiling,
    Floor,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Estimator {
    /// Interval between reads of the calculation-pending flag (ms).
    pub poll_ms: u64,
    /// How long to wait for a pending calculation before using current bounds (ms).
    pub settle_timeout_ms: u64,
    /// Bracket chosen when the setpoint is exactly halfway.
    pub tie_break: TieBreak,
}

impl Default for Estimator {
    fn default() -> Self {
        Self {
            poll_ms: 10,
            settle_timeout_ms: 1000,
            tie_break: TieBreak::Ceiling,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Lightpath {
    pub retry_delay_ms: u64,
}

impl Default for Lightpath {
    fn default() -> Self {
        Self {
            retry_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Faults {
    pub group_size: usize,
    pub excluded_leading_groups: usize,
    pub group_count: usize,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            group_size: 5,
            excluded_leading_groups: 1,
            group_count: 18,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// A channel value in the simulation tables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SimValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// One injected fault on the simulated device.
#[derive(Debug, Deserialize, Clone)]
pub struct SimFault {
    /// One-based blade number.
    pub blade: usize,
    /// Field under the blade, e.g. "state.error_id" or "motor.user_readback".
    pub signal: String,
    #[serde(default = "SimFault::default_value")]
    pub value: SimValue,
    #[serde(default)]
    pub severity: i64,
}

impl SimFault {
    fn default_value() -> SimValue {
        SimValue::Int(0)
    }
}

/// Initial channel values for the simulated backend.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Simulation {
    /// Raw position readback per blade; blades past the end never report.
    pub blade_states: Vec<i64>,
    /// Raw stuck flags per blade (legacy filters only).
    pub stuck: Vec<i64>,
    pub setpoint: Option<f64>,
    pub readback: Option<f64>,
    pub floor: Option<f64>,
    pub ceiling: Option<f64>,
    pub calc_pending: bool,
    pub faults: Vec<SimFault>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub device: Device,
    #[serde(default)]
    pub estimator: Estimator,
    #[serde(default)]
    pub lightpath: Lightpath,
    #[serde(default)]
    pub faults: Faults,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulation: Simulation,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_transmission_csv(path: &std::path::Path) -> eyre::Result<Vec<TransmissionRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open transmission CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["blade", "target", "transmission"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "transmission CSV must have headers 'blade,target,transmission', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    let mut seen = BTreeSet::new();
    for (idx, rec) in rdr.deserialize::<TransmissionRow>().enumerate() {
        let line = idx + 2;
        let row = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", line, e),
        };
        if row.blade == 0 || row.target == 0 {
            eyre::bail!("CSV row {}: blade and target are 1-based", line);
        }
        if !(0.0..=1.0).contains(&row.transmission) {
            eyre::bail!(
                "CSV row {}: transmission must be in [0.0, 1.0], got {}",
                line,
                row.transmission
            );
        }
        if !seen.insert((row.blade, row.target)) {
            eyre::bail!(
                "CSV row {}: duplicate entry for blade {} target {}",
                line,
                row.blade,
                row.target
            );
        }
        rows.push(row);
    }
    Ok(rows)
}

fn in_unit_range(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        let d = &self.device;
        if d.prefix_or_default().is_none() {
            eyre::bail!("device.prefix is required for this attenuator kind");
        }
        if let Some(p) = &d.prefix
            && p.trim().is_empty()
        {
            eyre::bail!("device.prefix must not be empty");
        }
        match d.kind {
            DeviceKind::Legacy => match d.n_filters {
                None => eyre::bail!("device.n_filters is required for legacy attenuators"),
                Some(n) if n == 0 || n > MAX_LEGACY_FILTERS => {
                    eyre::bail!("device.n_filters must be in 1..=12")
                }
                Some(_) => {}
            },
            DeviceKind::SxrLadder => {
                if d.blade_count() == 0 {
                    eyre::bail!("device.blades must be >= 1");
                }
                let t = d.ladder_targets();
                if t == 0 || t > MAX_LADDER_TARGETS {
                    eyre::bail!("device.targets must be in 1..=8");
                }
            }
            DeviceKind::Fee | DeviceKind::At2l0 => {}
        }

        // Estimator
        if self.estimator.poll_ms == 0 {
            eyre::bail!("estimator.poll_ms must be >= 1");
        }
        if self.estimator.settle_timeout_ms > 60 * 1000 {
            eyre::bail!("estimator.settle_timeout_ms is unreasonably large (>60s)");
        }

        // Lightpath
        if self.lightpath.retry_delay_ms == 0 {
            eyre::bail!("lightpath.retry_delay_ms must be >= 1");
        }
        if self.lightpath.retry_delay_ms > 5 * 60 * 1000 {
            eyre::bail!("lightpath.retry_delay_ms is unreasonably large (>5min)");
        }

        // Faults
        if self.faults.group_size == 0 {
            eyre::bail!("faults.group_size must be >= 1");
        }
        if self.faults.group_count == 0 || self.faults.group_count > 64 {
            eyre::bail!("faults.group_count must be in 1..=64");
        }

        // Logging
        if let Some(r) = &self.logging.rotation
            && !matches!(r.as_str(), "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        // Simulation
        let sim = &self.simulation;
        let blades = d.blade_count();
        if sim.blade_states.len() > blades {
            eyre::bail!(
                "simulation.blade_states has {} entries but the device has {} blades",
                sim.blade_states.len(),
                blades
            );
        }
        if sim.stuck.len() > blades {
            eyre::bail!("simulation.stuck has more entries than the device has blades");
        }
        for (key, v) in [
            ("setpoint", sim.setpoint),
            ("readback", sim.readback),
            ("floor", sim.floor),
            ("ceiling", sim.ceiling),
        ] {
            if let Some(v) = v
                && !in_unit_range(v)
            {
                eyre::bail!("simulation.{key} must be in [0.0, 1.0]");
            }
        }
        if let (Some(f), Some(c)) = (sim.floor, sim.ceiling)
            && f > c
        {
            eyre::bail!("simulation.floor must be <= simulation.ceiling");
        }
        for f in &sim.faults {
            if f.blade == 0 || f.blade > blades {
                eyre::bail!("simulation.faults blade {} is out of range 1..={}", f.blade, blades);
            }
        }

        Ok(())
    }
}
