//! Bracket selection for a desired transmission.
//!
//! The calculation engine publishes the closest achievable transmissions below
//! (floor) and above (ceiling) the setpoint. Moving the attenuator means
//! telling it which of the two configurations to apply, encoded as an
//! actuation code.

use crate::config::{EstimatorCfg, TieBreak};
use crate::error::Result;
use crate::hw_error::map_hw_error;
use satt_traits::TransmissionBoundsReader;
use satt_traits::clock::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Value written to the GO channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActuationCode {
    Floor = 2,
    Ceiling = 3,
}

impl ActuationCode {
    pub fn value(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Floor => "floor",
            Self::Ceiling => "ceiling",
        }
    }
}

/// Pick the bracket closest to `setpoint`.
///
/// The floor wins only when the ceiling is strictly farther away, so an exact
/// tie selects the ceiling.
#[inline]
pub fn choose_bracket(setpoint: f64, floor: f64, ceiling: f64) -> ActuationCode {
    choose_bracket_with(setpoint, floor, ceiling, TieBreak::Ceiling)
}

pub fn choose_bracket_with(
    setpoint: f64,
    floor: f64,
    ceiling: f64,
    tie: TieBreak,
) -> ActuationCode {
    if floor > ceiling {
        tracing::warn!(floor, ceiling, "transmission bounds reported out of order");
    }
    let to_ceiling = (setpoint - ceiling).abs();
    let to_floor = (setpoint - floor).abs();
    if to_ceiling > to_floor || (to_ceiling == to_floor && tie == TieBreak::Floor) {
        ActuationCode::Floor
    } else {
        ActuationCode::Ceiling
    }
}

/// Poll `pending` until it reads false or `timeout` elapses.
///
/// Returns `true` once settled, `false` on timeout. The timeout check is
/// strict, so one extra poll may happen exactly at the deadline.
pub fn is_settled(
    clock: &dyn Clock,
    mut pending: impl FnMut() -> bool,
    timeout: Duration,
    poll: Duration,
) -> bool {
    let start = clock.now();
    while pending() {
        if clock.since(start) > timeout {
            return false;
        }
        clock.sleep(poll);
    }
    true
}

/// `|a - b| <= atol + rtol * |b|` with the usual floating-point defaults.
#[inline]
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

/// True when `old_position` already matches one of the bounds, so a move can
/// be reported complete without waiting for readback changes.
pub fn near_bound(old_position: f64, floor: f64, ceiling: f64) -> bool {
    is_close(old_position, floor) || is_close(old_position, ceiling)
}

pub struct TransmissionEstimator {
    cfg: EstimatorCfg,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl core::fmt::Debug for TransmissionEstimator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransmissionEstimator")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl TransmissionEstimator {
    pub fn new(cfg: EstimatorCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self { cfg, clock }
    }

    pub fn cfg(&self) -> &EstimatorCfg {
        &self.cfg
    }

    pub fn choose(&self, setpoint: f64, floor: f64, ceiling: f64) -> ActuationCode {
        choose_bracket_with(setpoint, floor, ceiling, self.cfg.tie_break)
    }

    pub fn is_settled(&self, pending: impl FnMut() -> bool) -> bool {
        is_settled(
            self.clock.as_ref(),
            pending,
            self.cfg.settle_timeout,
            self.cfg.poll,
        )
    }

    /// Wait for the calculator to settle, then choose a bracket for the
    /// current setpoint.
    ///
    /// A settle timeout is logged and the current bounds are used anyway.
    pub fn actuate_value(&self, source: &mut dyn TransmissionBoundsReader) -> Result<ActuationCode> {
        let mut poll_err = None;
        let settled = self.is_settled(|| match source.calc_pending() {
            Ok(p) => p,
            Err(e) => {
                poll_err = Some(e);
                false
            }
        });
        if let Some(e) = poll_err {
            return Err(map_hw_error(e.as_ref()).into());
        }
        if !settled {
            tracing::warn!(
                timeout_ms = self.cfg.settle_timeout.as_millis() as u64,
                "transmission calculation still pending; using current bounds"
            );
        }
        let setpoint = source.setpoint().map_err(|e| map_hw_error(e.as_ref()))?;
        let (floor, ceiling) = source.bounds().map_err(|e| map_hw_error(e.as_ref()))?;
        let code = self.choose(setpoint, floor, ceiling);
        tracing::debug!(setpoint, floor, ceiling, code = code.label(), "bracket chosen");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use satt_traits::clock::test_clock::TestClock;
    use std::cell::Cell;

    #[rstest]
    #[case(0.5, 0.4, 0.55, ActuationCode::Ceiling)]
    #[case(0.5, 0.48, 0.9, ActuationCode::Floor)]
    #[case(0.1, 0.0, 1.0, ActuationCode::Floor)]
    #[case(0.9, 0.0, 1.0, ActuationCode::Ceiling)]
    fn picks_nearest_bracket(
        #[case] s: f64,
        #[case] f: f64,
        #[case] c: f64,
        #[case] want: ActuationCode,
    ) {
        assert_eq!(choose_bracket(s, f, c), want);
    }

    #[rstest]
    #[case(0.85, 0.9, 0.1, ActuationCode::Floor)]
    #[case(0.2, 0.9, 0.1, ActuationCode::Ceiling)]
    fn unordered_bounds_compare_distance_only(
        #[case] setpoint: f64,
        #[case] floor: f64,
        #[case] ceiling: f64,
        #[case] expected: ActuationCode,
    ) {
        assert_eq!(choose_bracket(setpoint, floor, ceiling), expected);
    }

    #[test]
    fn exact_tie_goes_to_ceiling_unless_floor_requested() {
        assert_eq!(choose_bracket(0.5, 0.25, 0.75), ActuationCode::Ceiling);
        assert_eq!(
            choose_bracket_with(0.5, 0.25, 0.75, TieBreak::Floor),
            ActuationCode::Floor
        );
    }

    #[test]
    fn settles_after_pending_clears() {
        let clock = TestClock::new();
        let polls = Cell::new(0);
        let ok = is_settled(
            &clock,
            || {
                polls.set(polls.get() + 1);
                polls.get() < 4
            },
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        assert!(ok);
        assert_eq!(polls.get(), 4);
        assert_eq!(clock.sleep_count(), 3);
    }

    #[test]
    fn gives_up_after_timeout() {
        let clock = TestClock::new();
        let ok = is_settled(
            &clock,
            || true,
            Duration::from_millis(100),
            Duration::from_millis(10),
        );
        assert!(!ok);
        // Strict comparison: elapsed must exceed the timeout before giving up.
        assert!(clock.elapsed() > Duration::from_millis(100));
        assert_eq!(clock.sleep_count(), 11);
    }

    #[test]
    fn near_bound_uses_relative_tolerance() {
        assert!(near_bound(0.5, 0.5 + 1e-7, 0.9));
        assert!(near_bound(0.9, 0.1, 0.9));
        assert!(!near_bound(0.5, 0.49, 0.51));
    }
}
