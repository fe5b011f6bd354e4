//! Collaborator contracts between the attenuator engine and the channel layer.
//!
//! The engine never talks to control-system channels directly. Readbacks and
//! commands cross this boundary through the traits below, using
//! `Box<dyn Error + Send + Sync>` so that any channel backend can plug in.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::fmt;
use std::time::Duration;

/// A raw channel value as delivered by the control system.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl SignalValue {
    /// Non-zero numbers and non-empty strings count as "set".
    pub fn is_set(&self) -> bool {
        match self {
            SignalValue::Int(v) => *v != 0,
            SignalValue::Float(v) => *v != 0.0,
            SignalValue::Text(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalValue::Int(v) => write!(f, "{v}"),
            SignalValue::Float(v) => write!(f, "{v}"),
            SignalValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        SignalValue::Int(v)
    }
}

impl From<i32> for SignalValue {
    fn from(v: i32) -> Self {
        SignalValue::Int(i64::from(v))
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        SignalValue::Float(v)
    }
}

impl From<&str> for SignalValue {
    fn from(v: &str) -> Self {
        SignalValue::Text(v.to_string())
    }
}

impl From<String> for SignalValue {
    fn from(v: String) -> Self {
        SignalValue::Text(v)
    }
}

/// One fault channel: its symbolic name, current value and alarm severity.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultSignal {
    pub name: String,
    pub value: SignalValue,
    pub severity: i64,
}

/// Raw readback for one blade. `None` means no monitor update has arrived yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BladeReadback {
    /// Position state readback (encoding depends on the blade IOC).
    pub state: Option<i64>,
    /// Stuck flag: 0 = free, 1 = stuck in, 2 = stuck out.
    pub stuck: Option<i64>,
}

pub trait BladeStateReader {
    fn read_blades(
        &mut self,
    ) -> Result<Vec<BladeReadback>, Box<dyn std::error::Error + Send + Sync>>;
}

pub trait TransmissionBoundsReader {
    /// True while the calculation engine is still working on new bounds.
    fn calc_pending(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
    fn setpoint(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>>;
    /// Transmission the attenuator currently reports.
    fn readback(&mut self) -> Result<f64, Box<dyn std::error::Error + Send + Sync>>;
    /// Returns `(floor, ceiling)`.
    fn bounds(&mut self) -> Result<(f64, f64), Box<dyn std::error::Error + Send + Sync>>;
}

pub trait FaultSignalReader {
    fn read_faults(
        &mut self,
    ) -> Result<Vec<FaultSignal>, Box<dyn std::error::Error + Send + Sync>>;
}

pub trait CommandSink {
    fn put(
        &mut self,
        channel: &str,
        value: SignalValue,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Fire-and-forget deferred execution. A scheduled task cannot be cancelled.
pub trait TaskScheduler {
    fn schedule(&self, task: Box<dyn FnOnce() + Send + 'static>, delay: Duration);
}
