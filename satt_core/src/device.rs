//! Attenuator device composition.
//!
//! `SolidAttenuator` wires a `ChannelMap` to the collaborator readers and the
//! command sink, and exposes the engine through capability traits. Which
//! capabilities work depends on the attenuator family: bracket selection needs
//! a floor/ceiling calculator, fault reporting needs per-blade fault channels.

use crate::aggregator::{AggregateResult, BladeArrayAggregator};
use crate::blade::{self, BladeState, LadderBladeState};
use crate::channels::{AttenuatorKind, ChannelMap};
use crate::config::{EstimatorCfg, FaultCfg, LightpathCfg};
use crate::error::{AttError, BuildError, Result};
use crate::estimator::{ActuationCode, TransmissionEstimator, near_bound};
use crate::faults::{self, ResetCommand};
use crate::hw_error::map_hw_error;
use crate::render::render_ascii;
use crate::scheduler::ThreadScheduler;
use crate::transmission::TransmissionTable;
use eyre::WrapErr;
use satt_traits::clock::{Clock, MonotonicClock};
use satt_traits::{
    BladeReadback, BladeStateReader, CommandSink, FaultSignal, FaultSignalReader, SignalValue,
    TaskScheduler, TransmissionBoundsReader,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ── Capabilities ─────────────────────────────────────────────────────────────

/// Summarized beam-path state.
pub trait Lightpath {
    /// Decoded state of every blade; `None` for blades with no readback yet.
    fn blade_states(&mut self) -> Result<Vec<Option<BladeState>>>;
    fn lightpath_state(&mut self, use_cache: bool) -> Result<AggregateResult>;
}

/// Result of commanding a new transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    /// Bracket sent to the GO channel, for bracket-based calculators.
    pub code: Option<ActuationCode>,
    /// The attenuator was already at one of the bounds, so nothing will move.
    pub completed: bool,
}

pub trait TransmissionPositioner {
    fn limits(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn check_setpoint(&self, value: f64) -> Result<()> {
        let (low, high) = self.limits();
        if !value.is_finite() || value < low || value > high {
            return Err(AttError::OutOfRange { value, low, high }.into());
        }
        Ok(())
    }

    fn actuate_value(&mut self) -> Result<ActuationCode>;
    fn move_to(&mut self, transmission: f64) -> Result<MoveOutcome>;

    /// Block the beam.
    fn insert(&mut self) -> Result<MoveOutcome> {
        self.move_to(0.0)
    }

    /// Full transmission.
    fn remove(&mut self) -> Result<MoveOutcome> {
        self.move_to(1.0)
    }
}

pub trait FaultReporting {
    fn error_bitmask(&mut self) -> Result<u64>;
    fn error_summary(&mut self) -> Result<String>;
    fn reset_faults(&mut self) -> Result<Vec<ResetCommand>>;
}

// ── SolidAttenuator ──────────────────────────────────────────────────────────

pub type SharedAttenuator = Arc<Mutex<SolidAttenuator>>;

pub struct SolidAttenuator {
    name: String,
    channels: ChannelMap,
    blades: Box<dyn BladeStateReader + Send>,
    bounds: Option<Box<dyn TransmissionBoundsReader + Send>>,
    faults: Option<Box<dyn FaultSignalReader + Send>>,
    sink: Box<dyn CommandSink + Send>,
    table: TransmissionTable,
    estimator: TransmissionEstimator,
    aggregator: BladeArrayAggregator,
    fault_cfg: FaultCfg,
}

impl core::fmt::Debug for SolidAttenuator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SolidAttenuator")
            .field("name", &self.name)
            .field("kind", &self.channels.kind())
            .field("prefix", &self.channels.prefix())
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

fn read_snapshot(
    reader: &mut dyn BladeStateReader,
    kind: AttenuatorKind,
    table: &TransmissionTable,
) -> Result<(Vec<Option<BladeState>>, BTreeMap<usize, f64>)> {
    let raw = read_raw(reader, kind)?;
    let encoding = kind.encoding();
    let states: Vec<_> = raw.iter().map(|r| blade::resolve(encoding, r)).collect();
    let positions: Vec<_> = raw.iter().map(|r| r.state).collect();
    let per_blade = table.factors_for(encoding, &states, &positions);
    Ok((states, per_blade))
}

fn read_raw(reader: &mut dyn BladeStateReader, kind: AttenuatorKind) -> Result<Vec<BladeReadback>> {
    let raw = reader
        .read_blades()
        .map_err(|e| map_hw_error(e.as_ref()))
        .wrap_err("reading blade states")?;
    let expected = kind.blade_count();
    if raw.len() != expected {
        return Err(AttError::BladeCount {
            expected,
            found: raw.len(),
        }
        .into());
    }
    Ok(raw)
}

impl SolidAttenuator {
    pub fn builder(channels: ChannelMap) -> AttenuatorBuilder {
        AttenuatorBuilder::new(channels)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttenuatorKind {
        self.channels.kind()
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn estimator(&self) -> &TransmissionEstimator {
        &self.estimator
    }

    pub fn aggregator(&self) -> &BladeArrayAggregator {
        &self.aggregator
    }

    fn put(&mut self, name: &str, value: impl Into<SignalValue>) -> Result<()> {
        let channel = self.channels.require(name)?.to_string();
        let value = value.into();
        self.sink
            .put(&channel, value)
            .map_err(|e| map_hw_error(e.as_ref()))
            .wrap_err_with(|| format!("writing {channel}"))
    }

    fn bounds_reader(&mut self) -> Result<&mut (dyn TransmissionBoundsReader + Send)> {
        match self.bounds.as_deref_mut() {
            Some(b) => Ok(b),
            None => Err(AttError::Unsupported("floor/ceiling bracket selection").into()),
        }
    }

    fn read_fault_signals(&mut self) -> Result<Vec<FaultSignal>> {
        let supported = self.kind().has_fault_channels();
        let Some(reader) = self.faults.as_deref_mut().filter(|_| supported) else {
            return Err(AttError::Unsupported("fault reporting").into());
        };
        let signals = reader
            .read_faults()
            .map_err(|e| map_hw_error(e.as_ref()))
            .wrap_err("reading fault signals")?;
        Ok(signals)
    }

    /// Positions of ladder blades, `None` where unknown or unreported.
    pub fn ladder_states(&mut self) -> Result<Vec<Option<LadderBladeState>>> {
        let AttenuatorKind::SxrLadder { targets, .. } = self.kind() else {
            return Err(AttError::Unsupported("ladder positions").into());
        };
        let kind = self.kind();
        let raw = read_raw(self.blades.as_mut(), kind)?;
        Ok(raw
            .iter()
            .map(|r| r.state.and_then(|v| LadderBladeState::from_value(v, targets)))
            .collect())
    }

    /// Blade table with one-based filter numbers; unreported blades show `?`.
    pub fn render(&mut self) -> Result<Vec<String>> {
        let codes: Vec<i64> = self
            .blade_states()?
            .into_iter()
            .map(|s| s.map_or(BladeState::Unknown.code(), BladeState::code))
            .collect();
        Ok(render_ascii(&codes, 1))
    }

    /// Choose the photon energy used by the calculator.
    ///
    /// `None` selects the live beam energy.
    pub fn set_energy(&mut self, energy: Option<f64>) -> Result<()> {
        if self.kind().uses_brackets() {
            match energy {
                None => {
                    tracing::debug!(device = %self.name, "using live energy");
                    self.put("eget_cmd", 6)
                }
                Some(e) => {
                    tracing::debug!(device = %self.name, energy = e, "using fixed energy");
                    self.put("eget_cmd", 0)?;
                    self.put("user_energy", e)
                }
            }
        } else {
            match energy {
                None => {
                    tracing::debug!(device = %self.name, "using actual photon energy");
                    self.put("calculator.energy_source", "Actual")
                }
                Some(e) => {
                    tracing::debug!(device = %self.name, energy = e, "using custom photon energy");
                    self.put("calculator.energy_source", "Custom")?;
                    self.put("calculator.energy_custom", e)
                }
            }
        }
    }

    /// Ask the calculator for a configuration without applying it.
    pub fn calculate(&mut self, transmission: f64, energy: Option<f64>, use_floor: bool) -> Result<()> {
        if self.kind().uses_brackets() {
            return Err(AttError::Unsupported("calculator configuration request").into());
        }
        self.check_setpoint(transmission)?;
        self.set_energy(energy)?;
        self.put("calculator.calc_mode", if use_floor { "Floor" } else { "Ceiling" })?;
        self.put("calculator.desired_transmission", transmission)?;
        self.put("calculator.run_calculation", 1)
    }

    /// Share the device and let fired lightpath retries refresh its cache.
    pub fn into_shared(self) -> SharedAttenuator {
        let shared = Arc::new(Mutex::new(self));
        let weak = Arc::downgrade(&shared);
        if let Ok(mut dev) = shared.lock() {
            dev.aggregator.set_on_retry(move || {
                let Some(dev) = weak.upgrade() else { return };
                let Ok(mut dev) = dev.lock() else { return };
                match dev.lightpath_state(false) {
                    Ok(r) => tracing::debug!(
                        device = %dev.name,
                        inserted = r.inserted,
                        removed = r.removed,
                        "lightpath retry recomputed"
                    ),
                    Err(e) => tracing::warn!(device = %dev.name, error = %e, "lightpath retry failed"),
                }
            });
        }
        shared
    }
}

impl Lightpath for SolidAttenuator {
    fn blade_states(&mut self) -> Result<Vec<Option<BladeState>>> {
        let kind = self.kind();
        let (states, _) = read_snapshot(self.blades.as_mut(), kind, &self.table)?;
        Ok(states)
    }

    fn lightpath_state(&mut self, use_cache: bool) -> Result<AggregateResult> {
        let kind = self.kind();
        let reader = self.blades.as_mut();
        let table = &self.table;
        self.aggregator
            .get_or_aggregate(use_cache, || read_snapshot(reader, kind, table))
    }
}

impl TransmissionPositioner for SolidAttenuator {
    fn actuate_value(&mut self) -> Result<ActuationCode> {
        let estimator = &self.estimator;
        let reader = match self.bounds.as_deref_mut() {
            Some(b) => b,
            None => return Err(AttError::Unsupported("floor/ceiling bracket selection").into()),
        };
        estimator.actuate_value(reader)
    }

    fn move_to(&mut self, transmission: f64) -> Result<MoveOutcome> {
        self.check_setpoint(transmission)?;
        if !self.kind().uses_brackets() {
            self.put("calculator.desired_transmission", transmission)?;
            self.put("calculator.run_calculation", 1)?;
            self.put("calculator.apply_config", 1)?;
            return Ok(MoveOutcome {
                code: None,
                completed: false,
            });
        }

        let old = self
            .bounds_reader()?
            .readback()
            .map_err(|e| map_hw_error(e.as_ref()))?;
        self.put("setpoint", transmission)?;
        let code = self.actuate_value()?;
        self.put("actuate", code.value())?;
        let (floor, ceiling) = self
            .bounds_reader()?
            .bounds()
            .map_err(|e| map_hw_error(e.as_ref()))?;
        // The calculator never reports done for a move to where it already is.
        let completed = near_bound(old, floor, ceiling);
        tracing::info!(
            device = %self.name,
            transmission,
            code = code.label(),
            completed,
            "transmission move requested"
        );
        Ok(MoveOutcome {
            code: Some(code),
            completed,
        })
    }
}

impl FaultReporting for SolidAttenuator {
    fn error_bitmask(&mut self) -> Result<u64> {
        let signals = self.read_fault_signals()?;
        Ok(faults::error_bitmask_with(&signals, &self.fault_cfg))
    }

    fn error_summary(&mut self) -> Result<String> {
        let signals = self.read_fault_signals()?;
        Ok(faults::error_summary(&signals))
    }

    fn reset_faults(&mut self) -> Result<Vec<ResetCommand>> {
        let blades = self.channels.reset_channels();
        if blades.is_empty() {
            return Err(AttError::Unsupported("fault reset").into());
        }
        tracing::info!(device = %self.name, blades = blades.len(), "resetting blade faults");
        Ok(faults::reset_all_faults(self.sink.as_mut(), &blades))
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

pub struct AttenuatorBuilder {
    channels: ChannelMap,
    name: Option<String>,
    blades: Option<Box<dyn BladeStateReader + Send>>,
    bounds: Option<Box<dyn TransmissionBoundsReader + Send>>,
    faults: Option<Box<dyn FaultSignalReader + Send>>,
    sink: Option<Box<dyn CommandSink + Send>>,
    table: TransmissionTable,
    estimator: EstimatorCfg,
    lightpath: LightpathCfg,
    fault_cfg: FaultCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    scheduler: Option<Arc<dyn TaskScheduler + Send + Sync>>,
}

impl AttenuatorBuilder {
    pub fn new(channels: ChannelMap) -> Self {
        Self {
            channels,
            name: None,
            blades: None,
            bounds: None,
            faults: None,
            sink: None,
            table: TransmissionTable::default(),
            estimator: EstimatorCfg::default(),
            lightpath: LightpathCfg::default(),
            fault_cfg: FaultCfg::default(),
            clock: None,
            scheduler: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn blade_reader(mut self, r: impl BladeStateReader + Send + 'static) -> Self {
        self.blades = Some(Box::new(r));
        self
    }

    pub fn bounds_reader(mut self, r: impl TransmissionBoundsReader + Send + 'static) -> Self {
        self.bounds = Some(Box::new(r));
        self
    }

    pub fn fault_reader(mut self, r: impl FaultSignalReader + Send + 'static) -> Self {
        self.faults = Some(Box::new(r));
        self
    }

    pub fn sink(mut self, s: impl CommandSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(s));
        self
    }

    pub fn transmission_table(mut self, t: TransmissionTable) -> Self {
        self.table = t;
        self
    }

    pub fn estimator_cfg(mut self, c: EstimatorCfg) -> Self {
        self.estimator = c;
        self
    }

    pub fn lightpath_cfg(mut self, c: LightpathCfg) -> Self {
        self.lightpath = c;
        self
    }

    pub fn fault_cfg(mut self, c: FaultCfg) -> Self {
        self.fault_cfg = c;
        self
    }

    pub fn clock(mut self, c: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(c);
        self
    }

    pub fn scheduler(mut self, s: Arc<dyn TaskScheduler + Send + Sync>) -> Self {
        self.scheduler = Some(s);
        self
    }

    pub fn build(self) -> std::result::Result<SolidAttenuator, BuildError> {
        let blades = self.blades.ok_or(BuildError::MissingBlades)?;
        let sink = self.sink.ok_or(BuildError::MissingSink)?;
        let kind = self.channels.kind();
        if kind.uses_brackets() && self.bounds.is_none() {
            return Err(BuildError::MissingBounds);
        }
        if self.fault_cfg.group_size == 0 {
            return Err(BuildError::InvalidConfig("faults.group_size must be >= 1"));
        }
        if self.fault_cfg.group_count > 64 {
            return Err(BuildError::InvalidConfig("faults.group_count must be <= 64"));
        }
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn Clock + Send + Sync>);
        let scheduler = self.scheduler.unwrap_or_else(|| {
            Arc::new(ThreadScheduler::spawn()) as Arc<dyn TaskScheduler + Send + Sync>
        });
        Ok(SolidAttenuator {
            name: self
                .name
                .unwrap_or_else(|| kind.label().to_string()),
            channels: self.channels,
            blades,
            bounds: self.bounds,
            faults: self.faults,
            sink,
            table: self.table,
            estimator: TransmissionEstimator::new(self.estimator, clock),
            aggregator: BladeArrayAggregator::new(scheduler, self.lightpath.retry_delay),
            fault_cfg: self.fault_cfg,
        })
    }
}
