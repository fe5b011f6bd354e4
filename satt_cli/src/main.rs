//! `satt` command-line entry point: logging setup, config loading and dispatch.

mod cli;
mod commands;
mod error_fmt;
mod sim;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use eyre::{Result, WrapErr};
use satt_core::TransmissionTable;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    color_eyre::install()?;

    let cfg = match sim::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Still give the user console logs for a bad config.
            init_tracing(cli.json, &cli.log_level, &satt_config::Logging::default())?;
            return Err(e);
        }
    };
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), kind = ?cfg.device.kind, "config loaded");

    let table = match &cli.transmission {
        Some(path) => sim::load_table(path, cfg.device.blade_count())?,
        None => TransmissionTable::new(),
    };
    let mut rig = sim::build(&cfg, table)?;

    match cli.cmd {
        Commands::Status { no_cache } => commands::status(&mut rig, no_cache, cli.json),
        Commands::Bracket {
            setpoint,
            floor,
            ceiling,
        } => {
            let bounds = floor.zip(ceiling);
            commands::bracket(&mut rig, &cfg, setpoint, bounds, cli.json)
        }
        Commands::Move {
            transmission,
            energy,
        } => commands::move_to(&mut rig, transmission, energy, cli.json),
        Commands::Errors => commands::errors(&mut rig, cli.json),
        Commands::Reset => commands::reset(&mut rig, cli.json),
        Commands::Watch { interval_ms, count } => {
            commands::watch(rig, Duration::from_millis(interval_ms), count, cli.json)
        }
        Commands::SelfCheck => commands::self_check(&mut rig, cli.json),
    }
}

/// Console logs go to stderr so stdout stays parseable in `--json` mode.
/// `[logging] file` adds a JSON-lines file sink with optional rotation.
fn init_tracing(json: bool, level: &str, logging: &satt_config::Logging) -> Result<()> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .wrap_err_with(|| format!("invalid --log-level {level:?}"))?,
    };
    let console: BoxedLayer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    };

    let mut layers = vec![console];
    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let Some(name) = path.file_name() else {
            eyre::bail!("logging.file must name a file, got {file:?}");
        };
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
            .wrap_err("invalid logging.level")?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| eyre::eyre!("init tracing: {e}"))
}
