//! Symbolic-name to channel-address bindings for each attenuator family.
//!
//! A `ChannelMap` is built once at startup from the device prefix. Everything
//! downstream (readers, sinks, fault lists) looks channels up by symbolic name
//! such as `blade_03.state.error` or `calculator.desired_transmission`.

use crate::blade::StateEncoding;
use crate::error::{AttError, BuildError};
use crate::faults::BladeFaultChannels;
use std::collections::BTreeMap;

pub use satt_config::{DEFAULT_FEE_PREFIX, MAX_LEGACY_FILTERS};

pub const FEE_FILTERS: usize = 9;
pub const AT2L0_BLADES: usize = 19;
pub const DEFAULT_AT2L0_CALCULATOR: &str = "AT2L0:CALC";

/// Fault signal suffixes per blade, in reporting order.
const FAULT_FIELDS: [&str; 5] = [
    "state.error",
    "state.error_id",
    "state.error_message",
    "motor.plc.err_code",
    "motor.user_readback",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttenuatorKind {
    /// Filter-IOC attenuator with an EPICS calculation record.
    Legacy { n_filters: usize },
    /// The FEE gas-detector-era solid attenuator.
    Fee,
    /// 19-blade PLC solid attenuator; blade 1 is the inspection mirror.
    At2l0,
    /// PLC ladder blades, each with several filter targets.
    SxrLadder { blades: usize, targets: u8 },
}

impl AttenuatorKind {
    pub fn blade_count(self) -> usize {
        match self {
            Self::Legacy { n_filters } => n_filters,
            Self::Fee => FEE_FILTERS,
            Self::At2l0 => AT2L0_BLADES,
            Self::SxrLadder { blades, .. } => blades,
        }
    }

    pub fn encoding(self) -> StateEncoding {
        match self {
            Self::Legacy { .. } | Self::Fee => StateEncoding::Legacy,
            Self::At2l0 => StateEncoding::TwinCat { state_count: 2 },
            Self::SxrLadder { targets, .. } => StateEncoding::TwinCat {
                state_count: targets.saturating_add(1),
            },
        }
    }

    /// Bracket-based calculators publish floor/ceiling transmissions.
    pub fn uses_brackets(self) -> bool {
        matches!(self, Self::Legacy { .. } | Self::Fee)
    }

    pub fn has_fault_channels(self) -> bool {
        matches!(self, Self::At2l0)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Legacy { .. } => "legacy",
            Self::Fee => "fee",
            Self::At2l0 => "at2l0",
            Self::SxrLadder { .. } => "sxr_ladder",
        }
    }
}

/// Channels of one blade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BladeChannels {
    /// One-based blade number.
    pub index: usize,
    pub state: String,
    pub stuck: Option<String>,
    pub faults: Option<BladeFaultChannels>,
}

/// Calculator channels used for bracket selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundsChannels {
    pub calc_pending: Option<String>,
    pub setpoint: String,
    pub readback: String,
    pub floor: String,
    pub ceiling: String,
}

#[derive(Debug, Clone)]
pub struct ChannelMap {
    kind: AttenuatorKind,
    prefix: String,
    bindings: BTreeMap<String, String>,
    blades: Vec<BladeChannels>,
}

impl ChannelMap {
    /// Bind every channel of `kind` under `prefix`.
    ///
    /// `calculator_prefix` only applies to the PLC families; when absent,
    /// AT2L0 uses its fixed calculator and ladders use `<prefix>:CALC`.
    pub fn build(
        kind: AttenuatorKind,
        prefix: &str,
        calculator_prefix: Option<&str>,
    ) -> Result<Self, BuildError> {
        let mut map = Self {
            kind,
            prefix: prefix.to_string(),
            bindings: BTreeMap::new(),
            blades: Vec::new(),
        };
        match kind {
            AttenuatorKind::Legacy { n_filters } => {
                if n_filters == 0 || n_filters > MAX_LEGACY_FILTERS {
                    return Err(BuildError::InvalidConfig(
                        "legacy attenuators carry 1 to 12 filters",
                    ));
                }
                map.bind_legacy_calculator(":COM:", true);
                for n in 1..=n_filters {
                    let base = format!("{prefix}:{n:02}");
                    map.push_filter(n, format!("{base}:STATE"), Some(format!("{base}:IS_STUCK")));
                }
            }
            AttenuatorKind::Fee => {
                map.bind_legacy_calculator(":", false);
                // Filter records drop the last character of the device prefix.
                let mut stem = prefix.to_string();
                stem.pop();
                for n in 1..=FEE_FILTERS {
                    map.push_filter(n, format!("{stem}{n}:STATE"), None);
                }
            }
            AttenuatorKind::At2l0 | AttenuatorKind::SxrLadder { .. } => {
                if kind.blade_count() == 0 {
                    return Err(BuildError::InvalidConfig("attenuator needs at least one blade"));
                }
                if let AttenuatorKind::SxrLadder { targets: 0, .. } = kind {
                    return Err(BuildError::InvalidConfig("ladder blades need at least one target"));
                }
                let calc = match (calculator_prefix, kind) {
                    (Some(c), _) => c.to_string(),
                    (None, AttenuatorKind::At2l0) => DEFAULT_AT2L0_CALCULATOR.to_string(),
                    (None, _) => format!("{prefix}:CALC"),
                };
                map.bind_new_calculator(&calc);
                for n in 1..=kind.blade_count() {
                    map.push_plc_blade(n, kind.has_fault_channels());
                }
            }
        }
        Ok(map)
    }

    fn bind(&mut self, name: impl Into<String>, address: impl Into<String>) {
        self.bindings.insert(name.into(), address.into());
    }

    fn bind_legacy_calculator(&mut self, sep: &str, full_record: bool) {
        let p = format!("{}{sep}", self.prefix);
        let (setpoint, readback) = if full_record {
            ("R_DES", "R_CUR")
        } else {
            ("RDES", "RACT")
        };
        self.bind("setpoint", format!("{p}{setpoint}"));
        self.bind("readback", format!("{p}{readback}"));
        self.bind("actuate", format!("{p}GO"));
        self.bind("trans_ceil", format!("{p}R_CEIL"));
        self.bind("trans_floor", format!("{p}R_FLOOR"));
        self.bind("user_energy", format!("{p}EDES"));
        self.bind("eget_cmd", format!("{p}EACT.SCAN"));
        if full_record {
            self.bind("done", format!("{p}STATUS"));
            self.bind("calcpend", format!("{p}CALCP"));
        }
    }

    fn bind_new_calculator(&mut self, calc: &str) {
        for (name, suffix) in [
            ("desired_transmission", ":SYS:DesiredTransmission"),
            ("actual_transmission", ":SYS:ActualTransmission_RBV"),
            ("apply_config", ":SYS:ApplyConfiguration"),
            ("run_calculation", ":SYS:Run"),
            ("energy_source", ":SYS:EnergySource"),
            ("energy_custom", ":SYS:CustomPhotonEnergy"),
            ("calc_mode", ":SYS:CalcMode"),
        ] {
            self.bind(format!("calculator.{name}"), format!("{calc}{suffix}"));
        }
    }

    fn push_filter(&mut self, n: usize, state: String, stuck: Option<String>) {
        self.bind(format!("filter{n}.state"), state.clone());
        if let Some(s) = &stuck {
            self.bind(format!("filter{n}.stuck"), s.clone());
        }
        self.blades.push(BladeChannels {
            index: n,
            state,
            stuck,
            faults: None,
        });
    }

    fn push_plc_blade(&mut self, n: usize, with_faults: bool) {
        let motor = format!("{}:MMS:{n:02}", self.prefix);
        let name = format!("blade_{n:02}");
        let state = format!("{motor}:STATE:GET_RBV");
        self.bind(format!("{name}.state.state"), state.clone());
        let faults = if with_faults {
            for (field, suffix) in [
                ("state.error", ":STATE:ERR_RBV"),
                ("state.error_id", ":STATE:ERRID_RBV"),
                ("state.error_message", ":STATE:ERRMSG_RBV"),
                ("state.reset_cmd", ":STATE:RESET"),
                ("motor.plc.err_code", ":PLC:nErrorId_RBV"),
                ("motor.plc.cmd_err_reset", ":PLC:bReset"),
                ("motor.user_readback", ".RBV"),
            ] {
                self.bind(format!("{name}.{field}"), format!("{motor}{suffix}"));
            }
            Some(BladeFaultChannels {
                motor_reset: format!("{motor}:PLC:bReset"),
                state_reset: format!("{motor}:STATE:RESET"),
            })
        } else {
            None
        };
        self.blades.push(BladeChannels {
            index: n,
            state,
            stuck: None,
            faults,
        });
    }

    pub fn kind(&self) -> AttenuatorKind {
        self.kind
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn address(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&str, AttError> {
        self.address(name)
            .ok_or_else(|| AttError::MissingChannel(name.to_string()))
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn blades(&self) -> &[BladeChannels] {
        &self.blades
    }

    /// Reset channels of every blade that has them.
    pub fn reset_channels(&self) -> Vec<BladeFaultChannels> {
        self.blades.iter().filter_map(|b| b.faults.clone()).collect()
    }

    /// `(symbolic name, address)` of every fault signal, blade by blade.
    pub fn fault_signals(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for b in self.blades.iter().filter(|b| b.faults.is_some()) {
            for field in FAULT_FIELDS {
                let name = format!("blade_{:02}.{field}", b.index);
                if let Some(addr) = self.address(&name) {
                    out.push((name, addr.to_string()));
                }
            }
        }
        out
    }

    pub fn fault_group_size() -> usize {
        FAULT_FIELDS.len()
    }

    pub fn bounds_channels(&self) -> Option<BoundsChannels> {
        if !self.kind.uses_brackets() {
            return None;
        }
        Some(BoundsChannels {
            calc_pending: self.address("calcpend").map(str::to_string),
            setpoint: self.address("setpoint")?.to_string(),
            readback: self.address("readback")?.to_string(),
            floor: self.address("trans_floor")?.to_string(),
            ceiling: self.address("trans_ceil")?.to_string(),
        })
    }
}
