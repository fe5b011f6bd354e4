//! Blade state model and decoding of raw blade readbacks.

use satt_traits::BladeReadback;

/// Aggregated position of one attenuator blade.
///
/// Stuck signals take priority over the position readback: a blade reporting
/// stuck is in that state regardless of where the encoder says it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BladeState {
    Unknown = 0,
    Out = 1,
    In = 2,
    StuckOut = 3,
    StuckIn = 4,
}

impl BladeState {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Out),
            2 => Some(Self::In),
            3 => Some(Self::StuckOut),
            4 => Some(Self::StuckIn),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    #[inline]
    pub fn is_inserted(self) -> bool {
        matches!(self, Self::In | Self::StuckIn)
    }

    #[inline]
    pub fn is_removed(self) -> bool {
        matches!(self, Self::Out | Self::StuckOut)
    }

    /// Transmission used when no per-blade factor is configured.
    ///
    /// Unknown blades report NaN so that the product makes the uncertainty visible.
    pub fn default_transmission(self) -> f64 {
        match self {
            Self::Out | Self::StuckOut => 1.0,
            Self::In | Self::StuckIn => 0.0,
            Self::Unknown => f64::NAN,
        }
    }

    /// Cell contents for the OUT row of the ASCII table.
    pub fn out_row(self) -> &'static str {
        match self {
            Self::Out => "X",
            Self::StuckOut => "S",
            Self::In | Self::StuckIn => "",
            Self::Unknown => "?",
        }
    }

    /// Cell contents for the IN row of the ASCII table.
    pub fn in_row(self) -> &'static str {
        match self {
            Self::In => "X",
            Self::StuckIn => "S",
            Self::Out | Self::StuckOut => "",
            Self::Unknown => "?",
        }
    }
}

/// How a blade IOC encodes its position readback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEncoding {
    /// Filter IOCs predating the PLC-based attenuators: 1 = in, 2 = out.
    Legacy,
    /// PLC state-record positioners: 0 = unknown, 1 = out, then one state per
    /// inserted target up to `state_count`.
    TwinCat { state_count: u8 },
}

impl StateEncoding {
    pub fn decode(self, raw: i64) -> BladeState {
        match self {
            Self::Legacy => match raw {
                1 => BladeState::In,
                2 => BladeState::Out,
                _ => BladeState::Unknown,
            },
            Self::TwinCat { state_count } => match raw {
                1 => BladeState::Out,
                r if r >= 2 && r <= i64::from(state_count) => BladeState::In,
                _ => BladeState::Unknown,
            },
        }
    }

    /// One-based target number for an inserted readback.
    ///
    /// Legacy blades carry a single filter, which is target 1.
    pub fn inserted_target(self, raw: i64) -> Option<u8> {
        if !self.decode(raw).is_inserted() {
            return None;
        }
        match self {
            Self::Legacy => Some(1),
            Self::TwinCat { .. } => u8::try_from(raw - 1).ok(),
        }
    }
}

/// Decode one readback. `None` means the blade has not reported yet.
pub fn resolve(encoding: StateEncoding, readback: &BladeReadback) -> Option<BladeState> {
    let raw = readback.state?;
    Some(match readback.stuck {
        Some(1) => BladeState::StuckIn,
        Some(2) => BladeState::StuckOut,
        _ => encoding.decode(raw),
    })
}

/// Motion state of one SXR ladder blade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderBladeState {
    /// Also reported while between states or when the position is unknown.
    Moving,
    Out,
    /// Inserted at the given one-based target.
    In(u8),
}

impl LadderBladeState {
    /// Decode a raw ladder readback; values beyond the last target are `None`.
    pub fn from_value(value: i64, targets: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Moving),
            1 => Some(Self::Out),
            v if v >= 2 && v <= i64::from(targets) + 1 => u8::try_from(v - 1).ok().map(Self::In),
            _ => None,
        }
    }

    pub fn value(self) -> i64 {
        match self {
            Self::Moving => 0,
            Self::Out => 1,
            Self::In(k) => i64::from(k) + 1,
        }
    }

    /// The one-based filter index, if inserted.
    pub fn filter_index(self) -> Option<u8> {
        match self {
            Self::In(k) => Some(k),
            _ => None,
        }
    }

    pub fn is_inserted(self) -> bool {
        matches!(self, Self::In(_))
    }

    pub fn is_moving(self) -> bool {
        self == Self::Moving
    }

    pub fn to_blade_state(self) -> BladeState {
        match self {
            Self::Moving => BladeState::Unknown,
            Self::Out => BladeState::Out,
            Self::In(_) => BladeState::In,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rb(state: Option<i64>, stuck: Option<i64>) -> BladeReadback {
        BladeReadback { state, stuck }
    }

    #[rstest]
    #[case(rb(Some(1), Some(0)), Some(BladeState::In))]
    #[case(rb(Some(2), None), Some(BladeState::Out))]
    #[case(rb(Some(7), None), Some(BladeState::Unknown))]
    #[case(rb(Some(2), Some(1)), Some(BladeState::StuckIn))]
    #[case(rb(Some(1), Some(2)), Some(BladeState::StuckOut))]
    #[case(rb(None, Some(1)), None)]
    fn legacy_resolution(#[case] readback: BladeReadback, #[case] want: Option<BladeState>) {
        assert_eq!(resolve(StateEncoding::Legacy, &readback), want);
    }

    #[rstest]
    #[case(0, BladeState::Unknown)]
    #[case(1, BladeState::Out)]
    #[case(2, BladeState::In)]
    #[case(9, BladeState::In)]
    #[case(10, BladeState::Unknown)]
    #[case(-1, BladeState::Unknown)]
    fn twincat_decoding(#[case] raw: i64, #[case] want: BladeState) {
        let enc = StateEncoding::TwinCat { state_count: 9 };
        assert_eq!(enc.decode(raw), want);
    }

    #[test]
    fn inserted_target_numbers() {
        let enc = StateEncoding::TwinCat { state_count: 9 };
        assert_eq!(enc.inserted_target(1), None);
        assert_eq!(enc.inserted_target(2), Some(1));
        assert_eq!(enc.inserted_target(9), Some(8));
        assert_eq!(StateEncoding::Legacy.inserted_target(1), Some(1));
        assert_eq!(StateEncoding::Legacy.inserted_target(2), None);
    }

    #[test]
    fn default_transmissions() {
        assert_eq!(BladeState::Out.default_transmission(), 1.0);
        assert_eq!(BladeState::StuckIn.default_transmission(), 0.0);
        assert!(BladeState::Unknown.default_transmission().is_nan());
    }

    #[test]
    fn ladder_states() {
        assert_eq!(LadderBladeState::from_value(0, 8), Some(LadderBladeState::Moving));
        assert_eq!(LadderBladeState::from_value(1, 8), Some(LadderBladeState::Out));
        let s = LadderBladeState::from_value(9, 8).unwrap();
        assert_eq!(s, LadderBladeState::In(8));
        assert_eq!(s.filter_index(), Some(8));
        assert_eq!(s.value(), 9);
        assert!(s.is_inserted());
        assert_eq!(LadderBladeState::from_value(10, 8), None);
        assert_eq!(LadderBladeState::Out.filter_index(), None);
        assert!(LadderBladeState::Moving.is_moving());
        assert_eq!(LadderBladeState::Moving.to_blade_state(), BladeState::Unknown);
    }
}
