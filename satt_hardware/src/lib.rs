//! Simulated channel backend.
//!
//! `SimChannels` is an in-memory channel table that stands in for the
//! control-system client. The reader types wrap it with the channel addresses
//! of one device and implement the `satt_traits` contracts, so the engine can
//! run unchanged against simulation in the CLI and in tests.
pub mod error;

use crate::error::{HwError, Result};
use satt_traits::{
    BladeReadback, BladeStateReader, CommandSink, FaultSignal, FaultSignalReader, SignalValue,
    TransmissionBoundsReader,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct SimState {
    values: BTreeMap<String, SignalValue>,
    severity: BTreeMap<String, i64>,
    read_only: BTreeSet<String>,
    puts: Vec<(String, SignalValue)>,
    offline: bool,
}

/// Shared in-memory channel table. Clones share the same channels.
#[derive(Debug, Clone, Default)]
pub struct SimChannels {
    inner: Arc<Mutex<SimState>>,
}

impl SimChannels {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Inject a value as if a monitor update had arrived.
    pub fn sim_put(&self, channel: &str, value: impl Into<SignalValue>) {
        self.lock().values.insert(channel.to_string(), value.into());
    }

    /// Set the alarm severity metadata of a channel.
    pub fn set_severity(&self, channel: &str, severity: i64) {
        self.lock().severity.insert(channel.to_string(), severity);
    }

    /// Forget a channel value, returning it to the never-updated state.
    pub fn clear(&self, channel: &str) {
        self.lock().values.remove(channel);
    }

    pub fn mark_read_only(&self, channel: &str) {
        self.lock().read_only.insert(channel.to_string());
    }

    /// Simulate losing the connection to every channel.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Current value, or `None` when no update has been received.
    pub fn value(&self, channel: &str) -> Result<Option<SignalValue>> {
        let st = self.lock();
        if st.offline {
            return Err(HwError::Disconnected(channel.to_string()));
        }
        Ok(st.values.get(channel).cloned())
    }

    pub fn severity(&self, channel: &str) -> i64 {
        self.lock().severity.get(channel).copied().unwrap_or(0)
    }

    /// Numeric value, or `None` when no update has been received.
    pub fn number(&self, channel: &str) -> Result<Option<f64>> {
        match self.value(channel)? {
            None => Ok(None),
            Some(SignalValue::Int(v)) => Ok(Some(v as f64)),
            Some(SignalValue::Float(v)) => Ok(Some(v)),
            Some(SignalValue::Text(s)) => Err(HwError::NotNumeric {
                channel: channel.to_string(),
                found: s,
            }),
        }
    }

    fn integer(&self, channel: &str) -> Result<Option<i64>> {
        Ok(self.number(channel)?.map(|v| v.round() as i64))
    }

    /// Every put issued through the `CommandSink` interface, in order.
    pub fn put_history(&self) -> Vec<(String, SignalValue)> {
        self.lock().puts.clone()
    }
}

impl CommandSink for SimChannels {
    fn put(
        &mut self,
        channel: &str,
        value: SignalValue,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.lock();
        if st.offline {
            return Err(Box::new(HwError::Disconnected(channel.to_string())));
        }
        if st.read_only.contains(channel) {
            return Err(Box::new(HwError::ReadOnly(channel.to_string())));
        }
        tracing::trace!(channel, %value, "sim put");
        st.puts.push((channel.to_string(), value.clone()));
        st.values.insert(channel.to_string(), value);
        Ok(())
    }
}

/// Channel addresses for one blade's position readback and optional stuck flag.
#[derive(Debug, Clone)]
pub struct BladeAddress {
    pub state: String,
    pub stuck: Option<String>,
}

/// Reads every blade of one device from the simulated channel table.
#[derive(Debug, Clone)]
pub struct SimBladeReader {
    channels: SimChannels,
    blades: Vec<BladeAddress>,
}

impl SimBladeReader {
    pub fn new(channels: SimChannels, blades: Vec<BladeAddress>) -> Self {
        Self { channels, blades }
    }
}

impl BladeStateReader for SimBladeReader {
    fn read_blades(
        &mut self,
    ) -> std::result::Result<Vec<BladeReadback>, Box<dyn std::error::Error + Send + Sync>> {
        let mut out = Vec::with_capacity(self.blades.len());
        for blade in &self.blades {
            let state = self.channels.integer(&blade.state)?;
            let stuck = match &blade.stuck {
                Some(addr) => self.channels.integer(addr)?,
                None => None,
            };
            out.push(BladeReadback { state, stuck });
        }
        Ok(out)
    }
}

/// Calculator channels needed to pick an actuation bracket.
#[derive(Debug, Clone)]
pub struct BoundsAddress {
    /// Some calculators have no pending flag; those never report pending.
    pub calc_pending: Option<String>,
    pub setpoint: String,
    pub readback: String,
    pub floor: String,
    pub ceiling: String,
}

#[derive(Debug, Clone)]
pub struct SimBoundsReader {
    channels: SimChannels,
    addr: BoundsAddress,
}

impl SimBoundsReader {
    pub fn new(channels: SimChannels, addr: BoundsAddress) -> Self {
        Self { channels, addr }
    }

    fn required(&self, channel: &str) -> Result<f64> {
        self.channels
            .number(channel)?
            .ok_or_else(|| HwError::Disconnected(channel.to_string()))
    }
}

impl TransmissionBoundsReader for SimBoundsReader {
    fn calc_pending(&mut self) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let Some(addr) = &self.addr.calc_pending else {
            return Ok(false);
        };
        Ok(self.channels.number(addr)?.is_some_and(|v| v != 0.0))
    }

    fn setpoint(&mut self) -> std::result::Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.required(&self.addr.setpoint)?)
    }

    fn readback(&mut self) -> std::result::Result<f64, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.required(&self.addr.readback)?)
    }

    fn bounds(
        &mut self,
    ) -> std::result::Result<(f64, f64), Box<dyn std::error::Error + Send + Sync>> {
        let floor = self.required(&self.addr.floor)?;
        let ceiling = self.required(&self.addr.ceiling)?;
        Ok((floor, ceiling))
    }
}

/// Reads fault channels as `(symbolic name, address)` pairs, in order.
#[derive(Debug, Clone)]
pub struct SimFaultReader {
    channels: SimChannels,
    signals: Vec<(String, String)>,
}

impl SimFaultReader {
    pub fn new(channels: SimChannels, signals: Vec<(String, String)>) -> Self {
        Self { channels, signals }
    }
}

impl FaultSignalReader for SimFaultReader {
    fn read_faults(
        &mut self,
    ) -> std::result::Result<Vec<FaultSignal>, Box<dyn std::error::Error + Send + Sync>> {
        let mut out = Vec::with_capacity(self.signals.len());
        for (name, addr) in &self.signals {
            // Channels that never updated read as a cleared fault.
            let value = self.channels.value(addr)?.unwrap_or(SignalValue::Int(0));
            out.push(FaultSignal {
                name: name.clone(),
                value,
                severity: self.channels.severity(addr),
            });
        }
        Ok(out)
    }
}
