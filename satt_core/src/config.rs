//! Runtime configuration for the attenuator engine.
//!
//! These are separate from the TOML-deserialized config in `satt_config`;
//! see `conversions` for the bridge.

use std::time::Duration;

/// Which bracket wins when the setpoint is exactly halfway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Ties go to the ceiling (the calculator's long-standing behavior).
    #[default]
    Ceiling,
    /// Ties go to the floor.
    Floor,
}

/// Settle polling and bracket selection.
#[derive(Debug, Clone)]
pub struct EstimatorCfg {
    /// Interval between reads of the calculation-pending flag.
    pub poll: Duration,
    /// Give up waiting for the calculation after this long.
    pub settle_timeout: Duration,
    pub tie_break: TieBreak,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(10),
            settle_timeout: Duration::from_secs(1),
            tie_break: TieBreak::Ceiling,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LightpathCfg {
    /// Delay before re-evaluating a snapshot that had uninitialized blades.
    pub retry_delay: Duration,
}

impl Default for LightpathCfg {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Window layout of the fault-signal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultCfg {
    /// Signals per blade.
    pub group_size: usize,
    /// Leading windows that never contribute a bit (blade 1 is a mirror).
    pub excluded_leading_groups: usize,
    /// Number of bits produced; at most 64.
    pub group_count: usize,
}

impl Default for FaultCfg {
    fn default() -> Self {
        Self {
            group_size: crate::channels::ChannelMap::fault_group_size(),
            excluded_leading_groups: 1,
            group_count: 18,
        }
    }
}
