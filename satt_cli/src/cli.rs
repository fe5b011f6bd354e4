//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "satt", version, about = "Solid attenuator CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/satt_config.toml")]
    pub config: PathBuf,

    /// Optional per-blade transmission CSV (strict header)
    #[arg(long, value_name = "FILE")]
    pub transmission: Option<PathBuf>,

    /// Print results and logs as JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show inserted/removed/transmission and the blade table
    Status {
        /// Recompute instead of reusing a cached lightpath result
        #[arg(long, action = ArgAction::SetTrue)]
        no_cache: bool,
    },
    /// Pick the floor or ceiling bracket for a desired transmission
    Bracket {
        /// Desired transmission in [0, 1]
        #[arg(long)]
        setpoint: f64,
        /// Floor bound; read from the device when omitted
        #[arg(long, requires = "ceiling")]
        floor: Option<f64>,
        /// Ceiling bound; read from the device when omitted
        #[arg(long, requires = "floor")]
        ceiling: Option<f64>,
    },
    /// Request a new transmission
    Move {
        /// Desired transmission in [0, 1]
        #[arg(long)]
        transmission: f64,
        /// Fixed photon energy in eV; the live beam energy is used when omitted
        #[arg(long, value_name = "EV")]
        energy: Option<f64>,
    },
    /// Print the blade fault bitmask and summary
    Errors,
    /// Clear faults on every blade
    Reset,
    /// Periodically print the lightpath state (Ctrl-C to stop)
    Watch {
        /// Interval between refreshes
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many refreshes
        #[arg(long)]
        count: Option<u64>,
    },
    /// Quick health check (config, channels, readbacks)
    SelfCheck,
}
