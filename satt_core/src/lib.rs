#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Solid attenuator transmission and blade-state engine (channel-agnostic).
//!
//! All channel access goes through the `satt_traits` collaborator contracts,
//! so the engine runs unchanged against a live control system or the
//! simulated backend in `satt_hardware`.
//!
//! ## Architecture
//!
//! - **Estimator**: floor/ceiling bracket choice and settle wait (`estimator`)
//! - **Aggregator**: blade states to inserted/removed/transmission with the
//!   uninitialized-state retry and cache (`aggregator`)
//! - **Faults**: error bitmask, summary and bulk reset (`faults`)
//! - **Channels**: symbolic channel bindings per attenuator family (`channels`)
//! - **Device**: capability traits and `SolidAttenuator` (`device`)
//! - **Scheduler**: deferred retry execution (`scheduler`)

pub mod aggregator;
pub mod blade;
pub mod channels;
pub mod config;
pub mod conversions;
pub mod device;
pub mod error;
pub mod estimator;
pub mod faults;
pub mod hw_error;
pub mod render;
pub mod scheduler;
pub mod transmission;

pub use aggregator::{AggregateResult, BladeArrayAggregator};
pub use blade::{BladeState, LadderBladeState, StateEncoding};
pub use channels::{AttenuatorKind, ChannelMap};
pub use config::{EstimatorCfg, FaultCfg, LightpathCfg, TieBreak};
pub use device::{
    AttenuatorBuilder, FaultReporting, Lightpath, MoveOutcome, SharedAttenuator, SolidAttenuator,
    TransmissionPositioner,
};
pub use error::{AttError, BuildError, Result};
pub use estimator::{ActuationCode, TransmissionEstimator, choose_bracket, is_settled};
pub use faults::{BladeFaultChannels, ResetCommand, error_bitmask, error_summary, reset_all_faults};
pub use scheduler::{ManualScheduler, ThreadScheduler};
pub use transmission::TransmissionTable;
