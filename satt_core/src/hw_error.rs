//! Maps `Box<dyn Error>` from trait boundaries to typed `AttError`.
//!
//! The traits in `satt_traits` use `Box<dyn Error + Send + Sync>` so any
//! channel backend can plug in; this module converts those to our typed error
//! enum, with an optional feature-gated path for `satt_hardware::HwError`
//! downcasting.

use crate::error::AttError;

/// Map a trait-boundary error to a typed `AttError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> AttError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<satt_hardware::error::HwError>() {
            return match hw {
                satt_hardware::error::HwError::Disconnected(ch) => {
                    AttError::Disconnected(ch.clone())
                }
                other => AttError::Channel(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("disconnected") {
        AttError::Disconnected(s)
    } else {
        AttError::Channel(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plain(&'static str);

    impl std::fmt::Display for Plain {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Plain {}

    #[test]
    fn string_fallback_detects_disconnects() {
        assert!(matches!(
            map_hw_error(&Plain("PV Disconnected")),
            AttError::Disconnected(_)
        ));
        assert_eq!(
            map_hw_error(&Plain("bad value")),
            AttError::Channel("bad value".into())
        );
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_error_is_downcast() {
        let e = satt_hardware::error::HwError::Disconnected("AT2L0:MMS:02".into());
        assert_eq!(
            map_hw_error(&e),
            AttError::Disconnected("AT2L0:MMS:02".into())
        );
        let e = satt_hardware::error::HwError::ReadOnly("X".into());
        assert!(matches!(map_hw_error(&e), AttError::Channel(_)));
    }
}
