//! `From` implementations bridging `satt_config` types to `satt_core` types.

use crate::channels::AttenuatorKind;
use crate::config::{EstimatorCfg, FaultCfg, LightpathCfg, TieBreak};
use crate::transmission::TransmissionTable;
use std::time::Duration;

// ── TieBreak ─────────────────────────────────────────────────────────────────

impl From<satt_config::TieBreak> for TieBreak {
    fn from(t: satt_config::TieBreak) -> Self {
        match t {
            satt_config::TieBreak::Ceiling => Self::Ceiling,
            satt_config::TieBreak::Floor => Self::Floor,
        }
    }
}

// ── EstimatorCfg ─────────────────────────────────────────────────────────────

impl From<&satt_config::Estimator> for EstimatorCfg {
    fn from(c: &satt_config::Estimator) -> Self {
        Self {
            poll: Duration::from_millis(c.poll_ms),
            settle_timeout: Duration::from_millis(c.settle_timeout_ms),
            tie_break: c.tie_break.into(),
        }
    }
}

// ── LightpathCfg ─────────────────────────────────────────────────────────────

impl From<&satt_config::Lightpath> for LightpathCfg {
    fn from(c: &satt_config::Lightpath) -> Self {
        Self {
            retry_delay: Duration::from_millis(c.retry_delay_ms),
        }
    }
}

// ── FaultCfg ─────────────────────────────────────────────────────────────────

impl From<&satt_config::Faults> for FaultCfg {
    fn from(c: &satt_config::Faults) -> Self {
        Self {
            group_size: c.group_size,
            excluded_leading_groups: c.excluded_leading_groups,
            group_count: c.group_count,
        }
    }
}

// ── AttenuatorKind ───────────────────────────────────────────────────────────

impl From<&satt_config::Device> for AttenuatorKind {
    fn from(d: &satt_config::Device) -> Self {
        match d.kind {
            satt_config::DeviceKind::Legacy => Self::Legacy {
                n_filters: d.n_filters.unwrap_or(0),
            },
            satt_config::DeviceKind::Fee => Self::Fee,
            satt_config::DeviceKind::At2l0 => Self::At2l0,
            satt_config::DeviceKind::SxrLadder => Self::SxrLadder {
                blades: d.blade_count(),
                targets: d.ladder_targets(),
            },
        }
    }
}

// ── TransmissionTable ────────────────────────────────────────────────────────

impl From<&[satt_config::TransmissionRow]> for TransmissionTable {
    fn from(rows: &[satt_config::TransmissionRow]) -> Self {
        rows.iter()
            .map(|r| (r.blade, r.target, r.transmission))
            .collect()
    }
}
